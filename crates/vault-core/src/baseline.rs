//! Persisted path → digest baseline.
//!
//! The on-disk form is a pretty-printed JSON object mapping normalized paths to
//! lowercase hex SHA-256 digests. Keys are sorted, so rebuilding an unchanged tree
//! rewrites a byte-identical file.

use crate::error::{Result, VaultError};
use crate::exclusion::{is_excluded_dir, should_ignore_path};
use crate::hasher::{hash_file, Digest};
use crate::paths::{canonical_root, NormalizedPath};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Known-good digest per file.
pub type BaselineSnapshot = BTreeMap<NormalizedPath, Digest>;

pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Walk `root`, hash every file that is not noise and persist the result.
    ///
    /// Excluded directories are pruned before descent. Files named in
    /// `skip_names` (the baseline, the activity log, the honeypot) are skipped
    /// wherever they appear in the tree.
    pub fn build(&self, root: &Path, skip_names: &[&str]) -> Result<BaselineSnapshot> {
        let root = canonical_root(root);
        info!(root = %root.display(), "building baseline");

        let mut snapshot = BaselineSnapshot::new();
        let mut unreadable = 0usize;

        for entry in tree_walker(&root) {
            let entry = match entry {
                Ok(e) => e,
                // The root itself must be walkable; anything below may be skipped.
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    debug!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if skip_names.iter().any(|skip| *skip == name) {
                continue;
            }
            let path = entry.path();
            if should_ignore_path(path) {
                continue;
            }

            match hash_file(path) {
                Some(digest) => {
                    snapshot.insert(NormalizedPath::new(path), digest);
                }
                None => unreadable += 1,
            }
        }

        if unreadable > 0 {
            warn!(unreadable, "some files could not be read and were left out of the baseline");
        }

        self.save(&snapshot)?;
        info!(files = snapshot.len(), path = %self.path.display(), "baseline created");
        Ok(snapshot)
    }

    /// Load the persisted baseline.
    pub fn load(&self) -> Result<BaselineSnapshot> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(VaultError::BaselineMissing(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot: BaselineSnapshot = serde_json::from_str(&json)?;
        debug!(path = %self.path.display(), entries = snapshot.len(), "baseline loaded");
        Ok(snapshot)
    }

    /// Replace the persisted baseline.
    ///
    /// Written to a sibling temp file and renamed into place so readers see either
    /// the old or the new file, never a partial one.
    pub fn save(&self, snapshot: &BaselineSnapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(snapshot)?;
        let mut tmp = staging_file(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| VaultError::Io(e.error))?;
        debug!(path = %self.path.display(), "baseline saved");
        Ok(())
    }
}

/// Walk `root` without following links, pruning excluded directories before
/// they are opened.
fn tree_walker(root: &Path) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !is_excluded_dir(&entry.file_name().to_string_lossy())
        })
}

/// Staging file for an atomic save. The `.tmp` suffix keeps it out of the
/// monitors when the data dir sits inside the watched tree.
fn staging_file(dir: &Path) -> std::io::Result<NamedTempFile> {
    Builder::new().prefix(".hash_db.").suffix(".tmp").tempfile_in(dir)
}
