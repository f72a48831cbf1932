//! Reading and writing kubeconfigs inside a single configuration directory.

use std::{
    fs, io,
    io::Write as _,
    path::{Component, Path, PathBuf},
};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::clean::{ContextExtension, KubeConfig};
use crate::error::{Error, Result};
use crate::merge::{merge, MergeOutcome};

/// File name of the merged kubeconfig.
pub const CANONICAL: &str = "config";
/// Downloaded per-cluster documents are named `<label>-kubeconfig.yaml`.
pub const PENDING_SUFFIX: &str = "-kubeconfig.yaml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfig {
    /// Desired context name, taken from the file name.
    pub label: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub extension: Option<ContextExtension>,
    /// Keep a timestamped copy of the previous canonical file.
    pub backup: bool,
}

#[derive(Debug)]
pub struct MergedFile {
    pub label: String,
    pub outcomes: Vec<MergeOutcome>,
}

#[derive(Debug, Default)]
pub struct MergeSummary {
    pub merged: Vec<MergedFile>,
    pub backup: Option<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub not_removed: Vec<(PathBuf, io::Error)>,
    /// The document as written.
    pub config: KubeConfig,
}

#[derive(Debug, Clone)]
pub struct ConfigDir {
    root: PathBuf,
}

impl ConfigDir {
    /// Opens (creating if needed) the directory all reads and writes are
    /// confined to.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(Error::io(&root))?;
        let root = root.canonicalize().map_err(Error::io(&root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `name` inside the directory. Anything that isn't a plain file
    /// name, or that resolves outside the directory, is rejected.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let traversal = || Error::PathTraversal {
            name: name.to_owned(),
            root: self.root.clone(),
        };

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => {}
            _ => return Err(traversal()),
        }

        let path = self.root.join(name);
        if path.is_symlink() {
            let target = path.canonicalize().map_err(Error::io(&path))?;
            if !target.starts_with(&self.root) {
                return Err(traversal());
            }
        }
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<KubeConfig> {
        let path = self.resolve(name)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotFound(path)),
            Err(e) => return Err(Error::io(path)(e)),
        };
        KubeConfig::from_yaml(&contents).map_err(|source| Error::Parse { path, source })
    }

    /// Writes `kc` through a temporary file in the same directory, so the
    /// destination is either the old document or the new one.
    pub fn save(&self, kc: &KubeConfig, name: &str) -> Result<()> {
        let yaml = kc.to_yaml()?;
        self.write_atomic(name, &yaml)
    }

    fn write_atomic(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.resolve(name)?;
        // Temporary files are created owner-only.
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".tmp")
            .tempfile_in(&self.root)
            .map_err(Error::io(&self.root))?;
        tmp.write_all(contents.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(Error::io(tmp.path()))?;
        tmp.persist(&path)
            .map_err(|e| Error::io(&path)(e.error))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    /// Copies `name` to `<name>_<timestamp>`. Nothing to copy is not an error.
    pub fn backup(&self, name: &str) -> Result<Option<PathBuf>> {
        let path = self.resolve(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let now = Local::now().format("%Y-%m-%dT%H-%M-%S");
        let backup = self.resolve(&format!("{name}_{now}"))?;
        fs::copy(&path, &backup).map_err(Error::io(&backup))?;
        info!("Backed up {} to {}", path.display(), backup.display());
        Ok(Some(backup))
    }

    /// Per-cluster documents waiting to be merged, ordered by label.
    pub fn pending(&self) -> Result<Vec<PendingConfig>> {
        let entries = fs::read_dir(&self.root).map_err(Error::io(&self.root))?;
        let mut pending = Vec::new();
        for entry in entries {
            let entry = entry.map_err(Error::io(&self.root))?;
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            let Some(label) = file_name.strip_suffix(PENDING_SUFFIX) else {
                continue;
            };
            if label.is_empty() || !entry.path().is_file() {
                continue;
            }
            pending.push(PendingConfig {
                label: label.to_owned(),
                file_name,
            });
        }
        pending.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(pending)
    }

    /// Stores a downloaded kubeconfig as `<label>-kubeconfig.yaml`.
    pub fn write_pending(&self, label: &str, contents: &str) -> Result<PathBuf> {
        let name = format!("{label}{PENDING_SUFFIX}");
        let path = self.resolve(&name)?;
        self.write_atomic(&name, contents)?;
        info!("Kubeconfig saved to {}", path.display());
        Ok(path)
    }

    /// Merges every pending document into the canonical one, writes it, then
    /// removes the pending files.
    ///
    /// A missing canonical file starts an empty document; a malformed one, or
    /// a malformed pending file, stops the run before anything is written.
    /// Failing to remove a pending file only produces a warning.
    pub fn merge_pending(&self, options: &MergeOptions) -> Result<MergeSummary> {
        let mut config = match self.load(CANONICAL) {
            Ok(config) => config,
            Err(Error::NotFound(path)) => {
                info!("No existing kubeconfig found at {}, creating a new one", path.display());
                KubeConfig::new()
            }
            Err(e) => return Err(e),
        };

        let pending = self.pending()?;
        let mut summary = MergeSummary::default();
        if pending.is_empty() {
            info!("No downloaded kubeconfigs to merge in {}", self.root.display());
            summary.config = config;
            return Ok(summary);
        }

        for file in &pending {
            info!("Merging kubeconfig from {}", file.file_name);
            let src = self.load(&file.file_name)?;
            let outcomes = merge(&mut config, &src, &file.label, options.extension.as_ref());
            summary.merged.push(MergedFile {
                label: file.label.clone(),
                outcomes,
            });
        }

        if options.backup {
            summary.backup = self.backup(CANONICAL)?;
        }
        self.save(&config, CANONICAL)?;
        info!("Successfully merged kubeconfigs into {}", self.root.join(CANONICAL).display());
        summary.config = config;

        summary.remove_consumed(pending.iter().map(|file| self.root.join(&file.file_name)));

        Ok(summary)
    }
}

impl MergeSummary {
    /// Deletes merged pending files. A failure is recorded and logged, never
    /// returned, so the remaining files are still attempted.
    fn remove_consumed(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!("Deleted file {}", path.display());
                    self.removed.push(path);
                }
                Err(e) => {
                    warn!("Failed to delete file {}: {e}", path.display());
                    self.not_removed.push((path, e));
                }
            }
        }
    }
}
