pub mod clean;
pub mod direct;
pub mod error;
pub mod identity;
pub mod merge;
pub mod store;

use std::path::PathBuf;

pub use clean::*;
pub use error::{Error, Result};
pub use identity::same_cluster;
pub use merge::{merge, unique_name, MergeOutcome};
pub use store::{ConfigDir, MergeOptions, MergeSummary, MergedFile, PendingConfig, CANONICAL};

/// `~/.kube`
pub fn kube_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".kube"))
        .ok_or(Error::NoHomeDir)
}
