//! Network-share mirroring with bounded-concurrency transfers and package
//! archive post-processing.
//!
//! The share is reached through the host's existing mount or redirector;
//! every remote operation is plain filesystem access on the normalized path.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod progress;
pub mod share;
pub mod sync;
pub mod transfer;

pub use archive::{ArchiveOptions, ArchiveProcessor, ArchiveSummary, NamingConvention};
pub use catalog::{CatalogBuilder, CatalogEntry};
pub use config::{ConfigFile, PackageSpec, SyncConfig};
pub use error::{Result, SyncError};
pub use filter::{FilterSpec, InclusionFilter};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use share::{ShareEndpoint, ShareInfo};
pub use sync::{PackageReport, ShareSync, SyncRequest};
pub use transfer::{TransferCoordinator, TransferOutcome, TransferSummary};
