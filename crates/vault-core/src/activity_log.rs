//! Append-only activity log.
//!
//! One line per event: `[YYYY-MM-DD HH:MM:SS] <message>`. The file is opened for
//! every append and each line goes out in a single write, so both monitors can
//! append to it concurrently without holding a handle.

use crate::error::Result;
use chrono::{Local, NaiveDateTime};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format_line(at: NaiveDateTime, message: &str) -> String {
        // Embedded newlines would split one event across lines.
        let flat = message.replace(['\r', '\n'], " ");
        format!("[{}] {}\n", at.format(TIMESTAMP_FORMAT), flat)
    }

    pub fn append(&self, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let line = Self::format_line(Local::now().naive_local(), message);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Append, logging instead of failing. Used on monitor hot paths.
    pub fn record(&self, message: &str) {
        if let Err(e) = self.append(message) {
            warn!(path = %self.path.display(), error = %e, "cannot write activity log");
        }
    }

    /// Most recent lines first.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .rev()
            .filter(|l| !l.trim().is_empty())
            .take(limit)
            .map(str::to_owned)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn line_format() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap();
        assert_eq!(
            ActivityLog::format_line(at, "Modified: /a/b.txt"),
            "[2024-03-09 07:05:01] Modified: /a/b.txt\n"
        );
        assert_eq!(
            ActivityLog::format_line(at, "two\nlines"),
            "[2024-03-09 07:05:01] two lines\n"
        );
    }

    #[test]
    fn appends_in_order() {
        let dir = tempdir().unwrap();
        let log = ActivityLog::new(dir.path().join("logs").join("suspicious_activity.log"));
        log.append("first").unwrap();
        log.append("second").unwrap();

        let recent = log.read_recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].ends_with("] second"));
        assert!(recent[1].ends_with("] first"));
        assert!(recent[1].starts_with('['));
    }

    #[test]
    fn concurrent_appends_keep_whole_lines() {
        let dir = tempdir().unwrap();
        let log = Arc::new(ActivityLog::new(dir.path().join("activity.log")));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.append(&format!("thread {t} event {i}")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 200);
        assert!(lines
            .iter()
            .all(|l| l.starts_with('[') && l.contains("] thread ")));
    }
}
