//! One-shot verification of the persisted baseline.
//!
//! Only files recorded in the baseline are checked. New files are the real-time
//! monitor's concern.

use crate::baseline::BaselineStore;
use crate::error::Result;
use crate::hasher::hash_file;
use crate::paths::NormalizedPath;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Discrepancy {
    Modified(NormalizedPath),
    Deleted(NormalizedPath),
}

impl Discrepancy {
    pub fn path(&self) -> &NormalizedPath {
        match self {
            Discrepancy::Modified(p) | Discrepancy::Deleted(p) => p,
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::Modified(p) => write!(f, "{p}"),
            Discrepancy::Deleted(p) => write!(f, "{p} (deleted)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub checked: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Compare every baseline entry against the file currently on disk.
///
/// A recorded file that still exists but can no longer be hashed (locked,
/// permissions stripped, replaced by a directory) counts as modified.
pub fn scan(store: &BaselineStore) -> Result<ScanReport> {
    let baseline = store.load()?;
    info!(entries = baseline.len(), "running integrity scan against baseline");

    let mut discrepancies = Vec::new();
    for (path, expected) in &baseline {
        if !path.as_path().exists() {
            discrepancies.push(Discrepancy::Deleted(path.clone()));
            continue;
        }
        match hash_file(path.as_path()) {
            Some(actual) if actual != *expected => {
                discrepancies.push(Discrepancy::Modified(path.clone()))
            }
            Some(_) => {}
            None => {
                warn!(path = %path, "baseline file no longer readable");
                discrepancies.push(Discrepancy::Modified(path.clone()))
            }
        }
    }

    if discrepancies.is_empty() {
        info!(files = baseline.len(), "integrity scan passed");
    } else {
        error!(
            count = discrepancies.len(),
            "INTEGRITY VIOLATION: modified or deleted files"
        );
    }

    Ok(ScanReport {
        checked: baseline.len(),
        discrepancies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_scan_reports_modified_and_deleted() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("tree");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("keep.txt"), b"same").unwrap();
        fs::write(root.join("edit.txt"), b"before").unwrap();
        fs::write(root.join("gone.txt"), b"bye").unwrap();

        let store = BaselineStore::new(dir.path().join("hash_db.json"));
        store.build(&root, &[]).unwrap();

        fs::write(root.join("edit.txt"), b"after").unwrap();
        fs::remove_file(root.join("gone.txt")).unwrap();
        fs::write(root.join("new.txt"), b"fresh").unwrap();

        let report = scan(&store).unwrap();
        assert_eq!(report.checked, 3);
        assert_eq!(report.discrepancies.len(), 2);
        assert!(report
            .discrepancies
            .iter()
            .any(|d| matches!(d, Discrepancy::Modified(p) if p.file_name() == "edit.txt")));
        assert!(report
            .discrepancies
            .iter()
            .any(|d| matches!(d, Discrepancy::Deleted(p) if p.file_name() == "gone.txt")));
        assert!(!report
            .discrepancies
            .iter()
            .any(|d| d.path().file_name() == "new.txt"));
    }

    #[test]
    fn test_scan_clean_tree() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let store = BaselineStore::new(dir.path().join("hash_db.json"));
        store.build(dir.path(), &["hash_db.json"]).unwrap();

        let before = fs::read(store.path()).unwrap();
        let report = scan(&store).unwrap();
        assert!(report.is_clean());
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_unreadable_baseline_file_is_modified() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("tree");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("victim.docx"), b"quarterly report").unwrap();
        fs::write(root.join("other.txt"), b"fine").unwrap();

        let store = BaselineStore::new(dir.path().join("hash_db.json"));
        store.build(&root, &[]).unwrap();

        // Same name, but nothing left to hash.
        fs::remove_file(root.join("victim.docx")).unwrap();
        fs::create_dir(root.join("victim.docx")).unwrap();

        let report = scan(&store).unwrap();
        assert_eq!(report.discrepancies.len(), 1);
        assert!(matches!(
            &report.discrepancies[0],
            Discrepancy::Modified(p) if p.file_name() == "victim.docx"
        ));
    }

    #[test]
    fn test_scan_without_baseline() {
        let dir = tempdir().unwrap();
        let store = BaselineStore::new(dir.path().join("hash_db.json"));
        assert!(scan(&store).unwrap_err().is_baseline_missing());
    }
}
