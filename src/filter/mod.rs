//! Inclusion filter for discovered entries.
//!
//! Allow-list categories (extension, prefix, suffix) are AND'ed together,
//! values inside one category are OR'ed, and an empty category imposes no
//! constraint. Exclude patterns veto anything they match.

use crate::catalog::CatalogEntry;
use glob::{MatchOptions, Pattern};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize};

/// Prefix marking an exclude pattern as a regular expression.
pub const REGEX_PREFIX: &str = "regex:";

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Declarative filter criteria as they appear in config files and CLI flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Allowed extensions, without the dot
    pub extensions: Vec<String>,
    /// Largest accepted file size in bytes (inclusive)
    #[serde(deserialize_with = "lenient_size")]
    pub max_size: Option<u64>,
    /// Globs, or regexes tagged with `regex:`
    pub exclude_patterns: Vec<String>,
    pub include_directories: bool,
    pub filename_prefixes: Vec<String>,
    /// Matched against the name with its extension stripped
    pub filename_suffixes: Vec<String>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            max_size: None,
            exclude_patterns: Vec::new(),
            include_directories: true,
            filename_prefixes: Vec::new(),
            filename_suffixes: Vec::new(),
        }
    }
}

impl FilterSpec {
    /// True when no criterion would reject anything.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
            && self.max_size.is_none()
            && self.exclude_patterns.is_empty()
            && self.filename_prefixes.is_empty()
            && self.filename_suffixes.is_empty()
            && self.include_directories
    }
}

/// Accepts `1024`, `"1024"` or nothing. Anything else means "no ceiling".
fn lenient_size<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| coerce_size(&value)))
}

fn coerce_size(value: &serde_json::Value) -> Option<u64> {
    use serde_json::Value;

    let parsed = match value {
        Value::Null => return None,
        Value::String(s) if s.trim().is_empty() => return None,
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    if parsed.is_none() {
        tracing::warn!("Invalid max_size value {}, ignoring size ceiling", value);
    }
    parsed
}

#[derive(Debug, Clone)]
enum ExcludePattern {
    Glob(Pattern),
    Regex(Regex),
}

impl ExcludePattern {
    fn compile(raw: &str) -> Option<Self> {
        if let Some(expr) = raw.strip_prefix(REGEX_PREFIX) {
            match RegexBuilder::new(expr).case_insensitive(true).build() {
                Ok(re) => Some(ExcludePattern::Regex(re)),
                Err(e) => {
                    tracing::warn!("Ignoring invalid regex pattern {:?}: {}", expr, e);
                    None
                }
            }
        } else {
            match Pattern::new(raw) {
                Ok(p) => Some(ExcludePattern::Glob(p)),
                Err(e) => {
                    tracing::warn!("Ignoring invalid glob pattern {:?}: {}", raw, e);
                    None
                }
            }
        }
    }

    fn matches(&self, name: &str, path: &str) -> bool {
        match self {
            ExcludePattern::Glob(p) => {
                p.matches_with(name, GLOB_OPTIONS) || p.matches_with(path, GLOB_OPTIONS)
            }
            ExcludePattern::Regex(re) => re.is_match(name),
        }
    }
}

/// Compiled form of a [`FilterSpec`].
#[derive(Debug, Clone)]
pub struct InclusionFilter {
    extensions: Vec<String>,
    max_size: Option<u64>,
    excludes: Vec<ExcludePattern>,
    exclude_sources: Vec<String>,
    include_directories: bool,
    prefixes: Vec<String>,
    suffixes: Vec<String>,
}

impl Default for InclusionFilter {
    fn default() -> Self {
        Self::new(&FilterSpec::default())
    }
}

impl InclusionFilter {
    pub fn new(spec: &FilterSpec) -> Self {
        let filter = Self {
            extensions: spec
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            max_size: spec.max_size,
            excludes: spec
                .exclude_patterns
                .iter()
                .filter_map(|p| ExcludePattern::compile(p))
                .collect(),
            exclude_sources: spec.exclude_patterns.clone(),
            include_directories: spec.include_directories,
            prefixes: spec.filename_prefixes.iter().map(|p| p.to_lowercase()).collect(),
            suffixes: spec.filename_suffixes.iter().map(|s| s.to_lowercase()).collect(),
        };

        tracing::debug!(
            extensions = ?filter.extensions,
            max_size = ?filter.max_size,
            excludes = ?filter.exclude_sources,
            prefixes = ?filter.prefixes,
            suffixes = ?filter.suffixes,
            "Built inclusion filter"
        );

        filter
    }

    pub fn should_include(&self, entry: &CatalogEntry) -> bool {
        let path = entry.path.to_string_lossy();

        if entry.is_dir {
            return self.include_directories && !self.is_excluded(&entry.name, &path);
        }

        if let Some(limit) = self.max_size {
            if entry.size > limit {
                tracing::debug!(
                    "{} exceeds size limit: {} > {}",
                    entry.name,
                    entry.size,
                    limit
                );
                return false;
            }
        }

        if !self.extensions.is_empty() {
            let ext = extension_of(&entry.name);
            if !self.extensions.iter().any(|allowed| *allowed == ext) {
                return false;
            }
        }

        if !self.prefixes.is_empty() {
            let lower = entry.name.to_lowercase();
            if !self.prefixes.iter().any(|p| lower.starts_with(p.as_str())) {
                return false;
            }
        }

        if !self.suffixes.is_empty() {
            let lower = stem_of(&entry.name).to_lowercase();
            if !self.suffixes.iter().any(|s| lower.ends_with(s.as_str())) {
                return false;
            }
        }

        !self.is_excluded(&entry.name, &path)
    }

    fn is_excluded(&self, name: &str, path: &str) -> bool {
        self.excludes.iter().any(|p| p.matches(name, path))
    }

    pub fn summary(&self) -> FilterSummary {
        FilterSummary {
            extensions: self.extensions.clone(),
            max_size: self.max_size,
            exclude_patterns: self.exclude_sources.clone(),
            include_directories: self.include_directories,
            filename_prefixes: self.prefixes.clone(),
            filename_suffixes: self.suffixes.clone(),
        }
    }
}

/// Normalized view of an active filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSummary {
    pub extensions: Vec<String>,
    pub max_size: Option<u64>,
    pub exclude_patterns: Vec<String>,
    pub include_directories: bool,
    pub filename_prefixes: Vec<String>,
    pub filename_suffixes: Vec<String>,
}

/// Lowercased text after the last dot, or "" without one.
fn extension_of(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

fn stem_of(name: &str) -> &str {
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::SystemTime;

    fn file(path: &str, size: u64) -> CatalogEntry {
        CatalogEntry::new(path, size, SystemTime::UNIX_EPOCH, false)
    }

    fn dir(path: &str) -> CatalogEntry {
        CatalogEntry::new(path, 0, SystemTime::UNIX_EPOCH, true)
    }

    fn filter(spec: FilterSpec) -> InclusionFilter {
        InclusionFilter::new(&spec)
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let f = filter(FilterSpec {
            extensions: vec!["zip".to_string()],
            ..Default::default()
        });
        assert!(f.should_include(&file("/share/PKG.ZIP", 10)));
        assert!(!f.should_include(&file("/share/notes.txt", 10)));
        assert!(!f.should_include(&file("/share/README", 10)));
    }

    #[test]
    fn test_extension_with_leading_dot_in_filter() {
        let f = filter(FilterSpec {
            extensions: vec![".VBF".to_string()],
            ..Default::default()
        });
        assert!(f.should_include(&file("/share/ecu.vbf", 1)));
    }

    #[test]
    fn test_max_size_boundary_inclusive() {
        let f = filter(FilterSpec {
            max_size: Some(1024),
            ..Default::default()
        });
        assert!(f.should_include(&file("/share/a.bin", 1024)));
        assert!(!f.should_include(&file("/share/a.bin", 1025)));
    }

    #[test]
    fn test_prefix_and_suffix() {
        let f = filter(FilterSpec {
            filename_prefixes: vec!["VBF_".to_string()],
            filename_suffixes: vec!["_final".to_string(), "_mcu".to_string()],
            ..Default::default()
        });
        assert!(f.should_include(&file("/s/vbf_pack_FINAL.zip", 1)));
        assert!(f.should_include(&file("/s/VBF_x_MCU.zip", 1)));
        assert!(!f.should_include(&file("/s/pack_final.zip", 1)));
        // Suffix ignores the extension
        assert!(!f.should_include(&file("/s/VBF_x.final", 1)));
    }

    #[test]
    fn test_categories_are_anded() {
        let f = filter(FilterSpec {
            extensions: vec!["zip".to_string()],
            filename_prefixes: vec!["vbf_".to_string()],
            ..Default::default()
        });
        assert!(f.should_include(&file("/s/VBF_a.zip", 1)));
        assert!(!f.should_include(&file("/s/VBF_a.txt", 1)));
        assert!(!f.should_include(&file("/s/other.zip", 1)));
    }

    #[test]
    fn test_exclude_glob_on_name_and_path() {
        let f = filter(FilterSpec {
            exclude_patterns: vec!["*.tmp".to_string(), "*/archive/*".to_string()],
            ..Default::default()
        });
        assert!(!f.should_include(&file("/s/build.TMP", 1)));
        assert!(!f.should_include(&file("/s/archive/old.zip", 1)));
        assert!(f.should_include(&file("/s/current/new.zip", 1)));
    }

    #[test]
    fn test_exclude_regex() {
        let f = filter(FilterSpec {
            exclude_patterns: vec!["regex:^debug_.*\\.log$".to_string()],
            ..Default::default()
        });
        assert!(!f.should_include(&file("/s/DEBUG_run.log", 1)));
        assert!(f.should_include(&file("/s/run_debug.log", 1)));
    }

    #[test]
    fn test_invalid_patterns_are_dropped() {
        let f = filter(FilterSpec {
            exclude_patterns: vec!["regex:(".to_string(), "[".to_string()],
            ..Default::default()
        });
        assert!(f.should_include(&file("/s/anything", 1)));
        assert_eq!(f.summary().exclude_patterns.len(), 2);
    }

    #[test]
    fn test_directories_only_see_flag_and_excludes() {
        let f = filter(FilterSpec {
            extensions: vec!["zip".to_string()],
            max_size: Some(0),
            exclude_patterns: vec!["tmp*".to_string()],
            ..Default::default()
        });
        assert!(f.should_include(&dir("/s/MCU")));
        assert!(!f.should_include(&dir("/s/tmp_build")));

        let no_dirs = filter(FilterSpec {
            include_directories: false,
            ..Default::default()
        });
        assert!(!no_dirs.should_include(&dir("/s/MCU")));
    }

    #[test]
    fn test_lenient_max_size() {
        let spec: FilterSpec = serde_json::from_str(r#"{"max_size": "4096"}"#).unwrap();
        assert_eq!(spec.max_size, Some(4096));

        let spec: FilterSpec = serde_json::from_str(r#"{"max_size": "lots"}"#).unwrap();
        assert_eq!(spec.max_size, None);

        let spec: FilterSpec = serde_json::from_str(r#"{"max_size": 12}"#).unwrap();
        assert_eq!(spec.max_size, Some(12));
        assert!(spec.include_directories);
    }

    #[test]
    fn test_spec_is_empty() {
        assert!(FilterSpec::default().is_empty());
        assert!(!FilterSpec {
            max_size: Some(1),
            ..Default::default()
        }
        .is_empty());
    }

    proptest! {
        #[test]
        fn prop_empty_filter_accepts_everything(
            name in "[A-Za-z0-9_.-]{1,24}",
            size in any::<u64>(),
            is_dir in any::<bool>(),
        ) {
            let entry = CatalogEntry::new(
                format!("/share/{}", name),
                size,
                SystemTime::UNIX_EPOCH,
                is_dir,
            );
            prop_assert!(InclusionFilter::default().should_include(&entry));
        }

        #[test]
        fn prop_size_ceiling(limit in 0u64..1_000_000, size in 0u64..2_000_000) {
            let f = InclusionFilter::new(&FilterSpec {
                max_size: Some(limit),
                ..Default::default()
            });
            prop_assert_eq!(f.should_include(&file("/share/x.bin", size)), size <= limit);
        }
    }
}
