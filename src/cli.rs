use clap::{Args, Parser, Subcommand};
use sharesync::FilterSpec;
use std::path::PathBuf;

/// Mirror a network share and unpack its release archives.
#[derive(Parser, Debug)]
#[command(name = "sharesync")]
#[command(version)]
pub struct Cli {
    /// TOML or JSON config file
    #[arg(long, global = true, env = "SHARESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Maximum concurrent file copies
    #[arg(short = 'j', long, global = true)]
    pub jobs: Option<usize>,

    /// Retries for share operations and each file copy
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a share and print its diagnostic info as JSON
    Probe {
        share: String,
    },

    /// List entries on a share
    List {
        share: String,

        /// Only list beneath this path on the share
        #[arg(long)]
        subpath: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Print entries as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Mirror a share into a local directory
    Sync {
        share: String,
        dest: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Replace files that already exist locally
        #[arg(long)]
        overwrite: bool,

        /// Do not clear the destination before copying
        #[arg(long)]
        keep_destination: bool,

        #[arg(long)]
        no_progress: bool,

        /// Extract category archives after the sync
        #[arg(long)]
        process_archives: bool,

        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Extract and merge category archives in a local directory
    Process {
        dir: PathBuf,

        /// Output directory (default: <DIR>/extracted)
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Extract every archive under a directory
    Extract {
        dir: PathBuf,

        /// Output directory (default: in place)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Keep archives after extraction
        #[arg(long)]
        keep_archives: bool,

        /// Extract into the output directory instead of one subdirectory per archive
        #[arg(long)]
        flat: bool,
    },

    /// Run every package from the config file
    Run,
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Allowed extensions (repeatable, without the dot)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Largest file size in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<u64>,

    /// Exclude glob, or regex with a `regex:` prefix (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Allowed file name prefixes (repeatable)
    #[arg(long = "prefix", value_name = "PREFIX")]
    pub prefixes: Vec<String>,

    /// Allowed file name suffixes, before the extension (repeatable)
    #[arg(long = "suffix", value_name = "SUFFIX")]
    pub suffixes: Vec<String>,

    /// Leave directory entries out of the result
    #[arg(long)]
    pub no_dirs: bool,
}

impl FilterArgs {
    /// `None` when no flag narrows the selection.
    pub fn to_spec(&self) -> Option<FilterSpec> {
        let spec = FilterSpec {
            extensions: self.extensions.clone(),
            max_size: self.max_size,
            exclude_patterns: self.exclude.clone(),
            include_directories: !self.no_dirs,
            filename_prefixes: self.prefixes.clone(),
            filename_suffixes: self.suffixes.clone(),
        };
        (!spec.is_empty()).then_some(spec)
    }
}

#[derive(Args, Debug, Default)]
pub struct ArchiveArgs {
    /// Keep archives and category directories after extraction
    #[arg(long)]
    pub keep_archives: bool,

    /// Do not copy secondary output into primary output directories
    #[arg(long)]
    pub no_cross_merge: bool,
}
