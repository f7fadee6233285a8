use serde::{Deserialize, Serialize};
use std::path::Path;

/// The two artifact categories under a package root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Receives the other category's output on cross-merge
    Primary,
    Secondary,
}

/// Markers used to turn archive file names into output directory names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    pub primary_dir: String,
    pub secondary_dir: String,
    pub release_marker: String,
    pub vendor_marker: String,
    pub secondary_prefix: String,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            primary_dir: "MCU".to_string(),
            secondary_dir: "SOC".to_string(),
            release_marker: "VBF_ReleasePackage_".to_string(),
            vendor_marker: "VBF_".to_string(),
            secondary_prefix: "SOC_".to_string(),
        }
    }
}

impl NamingConvention {
    pub fn category_dir(&self, category: Category) -> &str {
        match category {
            Category::Primary => &self.primary_dir,
            Category::Secondary => &self.secondary_dir,
        }
    }

    /// Output directory name for an archive of the given category.
    pub fn output_name(&self, archive: &Path, category: Category) -> String {
        let stem = archive
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        match category {
            Category::Primary => self.primary_name(&stem),
            Category::Secondary => self.secondary_name(&stem),
        }
    }

    // VBF_ReleasePackage_FX12-A2-M1_MCU_R3.3.7B1 -> FX12-A2-M1
    fn primary_name(&self, stem: &str) -> String {
        let tag = format!("_{}", self.primary_dir);

        if let Some(model) = between(stem, &self.release_marker, &tag) {
            tracing::debug!("Model name from {}: {}", stem, model);
            return model.to_string();
        }

        if let Some(idx) = stem.find(&tag) {
            let head = &stem[..idx];
            let model = head
                .strip_prefix(self.release_marker.as_str())
                .or_else(|| head.strip_prefix(self.vendor_marker.as_str()))
                .unwrap_or(head);
            if !model.is_empty() {
                tracing::debug!("Fallback model name from {}: {}", stem, model);
                return model.to_string();
            }
        }

        tracing::warn!("Cannot derive model name from {}, using stem", stem);
        stem.to_string()
    }

    // VBF_P181_SOC_J3.3.7B10 -> SOC_P181
    fn secondary_name(&self, stem: &str) -> String {
        let tag = format!("_{}", self.secondary_dir);
        match between(stem, &self.vendor_marker, &tag) {
            Some(model) => format!("{}{}", self.secondary_prefix, model),
            None => format!("{}{}", self.secondary_prefix, stem),
        }
    }
}

/// Non-empty text after the first `start` and before the next `end`.
fn between<'a>(s: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = s.find(start)? + start.len();
    let len = s[from..].find(end)?;
    if len == 0 {
        return None;
    }
    Some(&s[from..from + len])
}
