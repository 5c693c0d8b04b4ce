use crate::alert::DEFAULT_ALERT_CAPACITY;
use crate::error::{Result, VaultError};
use crate::honeypot::HONEYPOT_FILE;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const BASELINE_FILE: &str = "hash_db.json";
pub const LOG_FILE: &str = "suspicious_activity.log";
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileMonitorSettings {
    pub mass_change_window_secs: u64,
    /// Alert once the window holds more than this many modifications.
    pub mass_change_threshold: usize,
    pub event_queue_capacity: usize,
}

impl Default for FileMonitorSettings {
    fn default() -> Self {
        Self {
            mass_change_window_secs: 10,
            mass_change_threshold: 5,
            event_queue_capacity: 1024,
        }
    }
}

impl FileMonitorSettings {
    pub fn mass_change_window(&self) -> Duration {
        Duration::from_secs(self.mass_change_window_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessMonitorSettings {
    pub cpu_threshold_percent: f32,
    pub lookback_secs: u64,
    pub repeat_limit: usize,
    pub poll_interval_secs: u64,
    pub status_interval_secs: u64,
    pub sample_slice_ms: u64,
}

impl Default for ProcessMonitorSettings {
    fn default() -> Self {
        Self {
            cpu_threshold_percent: 10.0,
            lookback_secs: 30,
            repeat_limit: 3,
            poll_interval_secs: 5,
            status_interval_secs: 10,
            sample_slice_ms: 200,
        }
    }
}

impl ProcessMonitorSettings {
    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn sample_slice(&self) -> Duration {
        Duration::from_millis(self.sample_slice_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Tree that is baselined and watched.
    pub root: PathBuf,
    /// Where the baseline and the activity log live.
    pub data_dir: PathBuf,
    pub baseline_file: String,
    pub log_file: String,
    pub honeypot_file: String,
    pub alert_capacity: usize,
    pub file_monitor: FileMonitorSettings,
    pub process_monitor: ProcessMonitorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            data_dir: paths::data_dir().unwrap_or_else(|_| PathBuf::from(".")),
            baseline_file: BASELINE_FILE.into(),
            log_file: LOG_FILE.into(),
            honeypot_file: HONEYPOT_FILE.into(),
            alert_capacity: DEFAULT_ALERT_CAPACITY,
            file_monitor: FileMonitorSettings::default(),
            process_monitor: ProcessMonitorSettings::default(),
        }
    }
}

impl Settings {
    pub fn baseline_path(&self) -> PathBuf {
        self.data_dir.join(&self.baseline_file)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file)
    }

    pub fn honeypot_path(&self) -> PathBuf {
        self.root.join(&self.honeypot_file)
    }

    /// File names the engine writes itself; never baselined or reported.
    pub fn own_file_names(&self) -> [&str; 3] {
        [
            self.baseline_file.as_str(),
            self.log_file.as_str(),
            self.honeypot_file.as_str(),
        ]
    }

    /// Default location of the settings file.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        Ok(paths::config_dir()?.join(SETTINGS_FILE))
    }

    /// Read settings from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Settings::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for name in self.own_file_names() {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(VaultError::Config(format!(
                    "file name must be a bare, non-empty name: {name:?}"
                )));
            }
        }
        let fm = &self.file_monitor;
        if fm.mass_change_window_secs == 0 {
            return Err(VaultError::Config("mass change window must be at least 1s".into()));
        }
        if fm.event_queue_capacity == 0 || self.alert_capacity == 0 {
            return Err(VaultError::Config("queue capacities must be non-zero".into()));
        }
        let pm = &self.process_monitor;
        if !(pm.cpu_threshold_percent > 0.0 && pm.cpu_threshold_percent.is_finite()) {
            return Err(VaultError::Config("CPU threshold must be a positive percentage".into()));
        }
        if pm.repeat_limit == 0 {
            return Err(VaultError::Config("repeat limit must be at least 1".into()));
        }
        if pm.lookback_secs == 0 || pm.poll_interval_secs == 0 {
            return Err(VaultError::Config("lookback and poll interval must be at least 1s".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.file_monitor.mass_change_threshold, 5);
        assert_eq!(s.file_monitor.mass_change_window(), Duration::from_secs(10));
        assert_eq!(s.process_monitor.cpu_threshold_percent, 10.0);
        assert_eq!(s.process_monitor.repeat_limit, 3);
        assert_eq!(s.process_monitor.lookback(), Duration::from_secs(30));
        assert_eq!(s.process_monitor.poll_interval(), Duration::from_secs(5));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"root": "/srv/share", "process_monitor": {"repeat_limit": 4}}"#).unwrap();

        let s = Settings::load(&path).unwrap();
        assert_eq!(s.root, PathBuf::from("/srv/share"));
        assert_eq!(s.process_monitor.repeat_limit, 4);
        assert_eq!(s.process_monitor.lookback_secs, 30);
        assert_eq!(s.baseline_file, BASELINE_FILE);
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempdir().unwrap();
        let s = Settings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(s.file_monitor, FileMonitorSettings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg").join(SETTINGS_FILE);
        let mut s = Settings::default();
        s.data_dir = dir.path().to_path_buf();
        s.file_monitor.mass_change_threshold = 20;
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), s);
    }

    #[test]
    fn rejects_bad_values() {
        let mut s = Settings::default();
        s.process_monitor.repeat_limit = 0;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.baseline_file = "../escape.json".into();
        assert!(s.validate().is_err());
    }
}
