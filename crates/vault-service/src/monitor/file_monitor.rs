//! Real-time file monitor.
//!
//! Holds a private copy of the baseline loaded at start, reacts to watcher
//! events one at a time, and runs the mass-change heuristic over recent
//! modifications. A baseline rebuilt while the monitor runs is not picked up
//! until the next start.

use crate::monitor::watcher::{ChangeEvent, ChangeKind, FileWatcher};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use vault_core::activity_log::ActivityLog;
use vault_core::alert::{AlertEvent, AlertSender};
use vault_core::baseline::{BaselineSnapshot, BaselineStore};
use vault_core::exclusion::{basename, should_ignore};
use vault_core::hasher::hash_file;
use vault_core::paths::canonical_root;
use vault_core::settings::Settings;
use vault_core::window::SlidingWindow;

pub const MASS_CHANGE_ALERT: &str = "🚨 MASS FILE CHANGES DETECTED! Possible ransomware activity!";
pub const BASELINE_MISSING_ALERT: &str = "❌ Baseline not found. Please create one first.";
pub const MONITOR_STOPPED_ALERT: &str = "🛑 Real-time monitoring stopped";

/// Burst detector over modification timestamps.
///
/// Fires when more than `threshold` modifications fall inside the window, then
/// starts over so one burst yields one alert.
#[derive(Debug, Clone)]
pub struct MassChangeDetector {
    window: SlidingWindow,
    threshold: usize,
}

impl MassChangeDetector {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            window: SlidingWindow::new(window),
            threshold,
        }
    }

    /// Record one modification; `true` means a mass change was detected.
    pub fn record(&mut self, at: Instant) -> bool {
        if self.window.record(at) > self.threshold {
            self.window.clear();
            true
        } else {
            false
        }
    }

    pub fn pending(&self) -> usize {
        self.window.len()
    }
}

#[derive(Debug, Clone)]
pub struct FileMonitorConfig {
    pub root: PathBuf,
    pub baseline_path: PathBuf,
    pub log_path: PathBuf,
    /// Names of the engine's own files; events for them are ignored.
    pub own_files: Vec<String>,
    pub mass_change_window: Duration,
    pub mass_change_threshold: usize,
    pub event_queue_capacity: usize,
}

impl From<&Settings> for FileMonitorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            root: settings.root.clone(),
            baseline_path: settings.baseline_path(),
            log_path: settings.log_path(),
            own_files: settings
                .own_file_names()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            mass_change_window: settings.file_monitor.mass_change_window(),
            mass_change_threshold: settings.file_monitor.mass_change_threshold,
            event_queue_capacity: settings.file_monitor.event_queue_capacity,
        }
    }
}

/// Event handling state, owned by the monitor task.
pub struct FileMonitorState {
    baseline: BaselineSnapshot,
    mass: MassChangeDetector,
    own_files: Vec<String>,
    log: ActivityLog,
    alerts: AlertSender,
}

impl FileMonitorState {
    pub fn new(
        baseline: BaselineSnapshot,
        config: &FileMonitorConfig,
        log: ActivityLog,
        alerts: AlertSender,
    ) -> Self {
        Self {
            baseline,
            mass: MassChangeDetector::new(config.mass_change_window, config.mass_change_threshold),
            own_files: config.own_files.clone(),
            log,
            alerts,
        }
    }

    pub fn baseline(&self) -> &BaselineSnapshot {
        &self.baseline
    }

    fn is_ignored(&self, event: &ChangeEvent) -> bool {
        let path = event.path.as_str();
        let name = basename(path);
        if self.own_files.iter().any(|own| own == name) || should_ignore(path) {
            return true;
        }
        // A recorded file replaced by a directory still has to be checked.
        event.kind != ChangeKind::Deleted
            && !self.baseline.contains_key(&event.path)
            && event.path.as_path().is_dir()
    }

    pub fn handle(&mut self, event: ChangeEvent) {
        if self.is_ignored(&event) {
            return;
        }
        match event.kind {
            ChangeKind::Created => self.on_created(&event),
            ChangeKind::Modified => self.on_modified(&event),
            ChangeKind::Deleted => self.on_deleted(&event),
        }
    }

    fn on_created(&mut self, event: &ChangeEvent) {
        // New files stay unknown until the next baseline build adopts them.
        self.log.record(&format!("New file created: {}", event.path));
        self.alerts.emit(AlertEvent::info(format!(
            "New file created: {}",
            event.path.file_name()
        )));
    }

    fn on_modified(&mut self, event: &ChangeEvent) {
        match hash_file(event.path.as_path()) {
            Some(digest) if self.baseline.get(&event.path) == Some(&digest) => return,
            Some(digest) => {
                warn!(path = %event.path, "file changed");
                self.baseline.insert(event.path.clone(), digest);
            }
            None if self.baseline.contains_key(&event.path) && event.path.as_path().exists() => {
                // Forgotten until it can be read again, so it alerts once.
                warn!(path = %event.path, "known file no longer readable");
                self.baseline.remove(&event.path);
            }
            None => {
                // Gone files are reported by their delete event.
                debug!(path = %event.path, "file unreadable or gone, skipped");
                return;
            }
        }

        self.log.record(&format!("Modified: {}", event.path));
        self.alerts.emit(AlertEvent::warning(format!(
            "File modified: {}",
            event.path.file_name()
        )));

        if self.mass.record(event.at) {
            warn!("{}", MASS_CHANGE_ALERT);
            self.log.record(MASS_CHANGE_ALERT);
            self.alerts.emit(AlertEvent::critical(MASS_CHANGE_ALERT));
        }
    }

    fn on_deleted(&mut self, event: &ChangeEvent) {
        // The entry is kept so a restored file is checked against its last digest.
        info!(path = %event.path, "file deleted");
        self.log.record(&format!("Deleted: {}", event.path));
        self.alerts.emit(AlertEvent::warning(format!(
            "File deleted: {}",
            event.path.file_name()
        )));
    }
}

/// Run the monitor until `stop` flips to `true` (or its sender is dropped).
///
/// Every exit path after a successful start ends with exactly one
/// "monitoring stopped" alert, and nothing is emitted after it.
pub async fn run_file_monitor(
    config: FileMonitorConfig,
    alerts: AlertSender,
    mut stop: watch::Receiver<bool>,
) {
    let store = BaselineStore::new(&config.baseline_path);
    let log = ActivityLog::new(&config.log_path);

    let baseline = match store.load() {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "real-time monitor cannot start");
            let message = if e.is_baseline_missing() {
                BASELINE_MISSING_ALERT.to_string()
            } else {
                format!("❌ Baseline unreadable: {e}")
            };
            alerts.emit(AlertEvent::warning(message));
            return;
        }
    };

    let root = canonical_root(&config.root);
    let (watcher, mut events) = match FileWatcher::watch(&root, config.event_queue_capacity) {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, "real-time monitor cannot subscribe");
            let message = format!("❌ Real-time monitoring failed to start: {e:#}");
            log.record(&message);
            alerts.emit(AlertEvent::warning(message));
            return;
        }
    };

    let mut state = FileMonitorState::new(baseline, &config, log, alerts.clone());
    info!(root = %root.display(), entries = state.baseline().len(), "real-time monitoring started");
    alerts.emit(AlertEvent::info(format!(
        "👁️ Real-time monitoring started on: {}",
        root.display()
    )));

    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            next = events.recv() => match next {
                Some(event) => state.handle(event),
                None => {
                    warn!("watcher channel closed");
                    break;
                }
            }
        }
    }

    // Close the queue first so the notify thread cannot block on a full channel.
    drop(events);
    watcher.stop();
    info!("real-time monitoring stopped");
    alerts.emit(AlertEvent::info(MONITOR_STOPPED_ALERT));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use vault_core::alert::{alert_channel, AlertReceiver, Severity};
    use vault_core::hasher::Digest;
    use vault_core::paths::NormalizedPath;

    fn drain(rx: &mut AlertReceiver) -> Vec<AlertEvent> {
        let mut out = Vec::new();
        while let Ok(a) = rx.try_recv() {
            out.push(a);
        }
        out
    }

    fn config(dir: &std::path::Path) -> FileMonitorConfig {
        FileMonitorConfig {
            root: dir.to_path_buf(),
            baseline_path: dir.join("hash_db.json"),
            log_path: dir.join("suspicious_activity.log"),
            own_files: vec![
                "hash_db.json".into(),
                "suspicious_activity.log".into(),
                "honeypot_fake_sensitive.txt".into(),
            ],
            mass_change_window: Duration::from_secs(10),
            mass_change_threshold: 5,
            event_queue_capacity: 64,
        }
    }

    fn modified_at(path: &std::path::Path, at: Instant) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Modified,
            path: NormalizedPath::new(path),
            at,
        }
    }

    #[test]
    fn mass_change_needs_more_than_threshold() {
        let start = Instant::now();
        let mut d = MassChangeDetector::new(Duration::from_secs(10), 5);
        let fired: Vec<bool> = (0..5)
            .map(|i| d.record(start + Duration::from_secs(i)))
            .collect();
        assert!(fired.iter().all(|f| !f));
        assert!(d.record(start + Duration::from_secs(5)));
        assert_eq!(d.pending(), 0);
    }

    #[test]
    fn mass_change_ignores_spread_out_edits() {
        let start = Instant::now();
        let mut d = MassChangeDetector::new(Duration::from_secs(10), 5);
        for i in 0..20 {
            assert!(!d.record(start + Duration::from_secs(i * 3)));
        }
    }

    #[test]
    fn six_modifications_give_one_critical() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let (tx, mut rx) = alert_channel(64);
        let mut state =
            FileMonitorState::new(BaselineSnapshot::new(), &cfg, ActivityLog::new(&cfg.log_path), tx);

        let start = Instant::now();
        for i in 0..6 {
            let p = dir.path().join(format!("doc{i}.txt"));
            fs::write(&p, format!("encrypted {i}")).unwrap();
            state.handle(modified_at(&p, start + Duration::from_millis(i * 100)));
        }

        let alerts = drain(&mut rx);
        let critical: Vec<_> = alerts
            .iter()
            .filter(|a| a.severity == Severity::Critical)
            .collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].message, MASS_CHANGE_ALERT);
        assert_eq!(
            alerts
                .iter()
                .filter(|a| a.message.starts_with("File modified: "))
                .count(),
            6
        );
        assert_eq!(state.mass.pending(), 0);
    }

    #[test]
    fn five_modifications_stay_quiet() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let (tx, mut rx) = alert_channel(64);
        let mut state =
            FileMonitorState::new(BaselineSnapshot::new(), &cfg, ActivityLog::new(&cfg.log_path), tx);

        let start = Instant::now();
        for i in 0..5 {
            let p = dir.path().join(format!("doc{i}.txt"));
            fs::write(&p, b"x").unwrap();
            state.handle(modified_at(&p, start));
        }
        assert!(drain(&mut rx)
            .iter()
            .all(|a| a.severity != Severity::Critical));
    }

    #[test]
    fn unchanged_digest_is_not_a_modification() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let file = dir.path().join("same.txt");
        fs::write(&file, b"stable").unwrap();

        let mut baseline = BaselineSnapshot::new();
        baseline.insert(NormalizedPath::new(&file), Digest::of_bytes(b"stable"));
        let (tx, mut rx) = alert_channel(8);
        let mut state = FileMonitorState::new(baseline, &cfg, ActivityLog::new(&cfg.log_path), tx);

        state.handle(modified_at(&file, Instant::now()));
        assert!(drain(&mut rx).is_empty());

        fs::write(&file, b"changed").unwrap();
        state.handle(modified_at(&file, Instant::now()));
        let alerts = drain(&mut rx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "File modified: same.txt");
        assert_eq!(
            state.baseline().get(&NormalizedPath::new(&file)),
            Some(&Digest::of_bytes(b"changed"))
        );
        let log = fs::read_to_string(&cfg.log_path).unwrap();
        assert!(log.contains("] Modified: "));
    }

    #[test]
    fn known_file_turned_unreadable_is_a_modification() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let victim = dir.path().join("victim.docx");
        let mut baseline = BaselineSnapshot::new();
        baseline.insert(NormalizedPath::new(&victim), Digest::of_bytes(b"report"));
        let (tx, mut rx) = alert_channel(8);
        let mut state = FileMonitorState::new(baseline, &cfg, ActivityLog::new(&cfg.log_path), tx);

        fs::create_dir(&victim).unwrap();
        state.handle(modified_at(&victim, Instant::now()));

        let alerts = drain(&mut rx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "File modified: victim.docx");
        assert_eq!(state.mass.pending(), 1);
        assert!(state.baseline().is_empty());
        let log = fs::read_to_string(&cfg.log_path).unwrap();
        assert!(log.contains("] Modified: "));

        // Still unreadable and now unknown: no repeat alert.
        state.handle(modified_at(&victim, Instant::now()));
        assert!(drain(&mut rx).is_empty());

        // A recorded file that is simply gone is left to its delete event.
        let gone = dir.path().join("gone.txt");
        state.baseline.insert(NormalizedPath::new(&gone), Digest::of_bytes(b"gone"));
        state.handle(modified_at(&gone, Instant::now()));
        assert!(drain(&mut rx).is_empty());

        // An unknown unreadable path stays quiet from the start.
        let stranger = dir.path().join("stranger.bin");
        fs::create_dir(&stranger).unwrap();
        state.handle(modified_at(&stranger, Instant::now()));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn created_and_deleted_leave_baseline_alone() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let kept = dir.path().join("kept.txt");
        let mut baseline = BaselineSnapshot::new();
        baseline.insert(NormalizedPath::new(&kept), Digest::of_bytes(b"k"));
        let (tx, mut rx) = alert_channel(8);
        let mut state = FileMonitorState::new(baseline, &cfg, ActivityLog::new(&cfg.log_path), tx);

        let fresh = dir.path().join("fresh.txt");
        fs::write(&fresh, b"new").unwrap();
        state.handle(ChangeEvent::new(ChangeKind::Created, &fresh));
        state.handle(ChangeEvent::new(ChangeKind::Deleted, &kept));

        let alerts = drain(&mut rx);
        assert_eq!(alerts[0].message, "New file created: fresh.txt");
        assert_eq!(alerts[0].severity, Severity::Info);
        assert_eq!(alerts[1].message, "File deleted: kept.txt");
        assert_eq!(alerts[1].severity, Severity::Warning);
        assert_eq!(state.baseline().len(), 1);
        assert!(state.baseline().contains_key(&NormalizedPath::new(&kept)));
    }

    #[test]
    fn own_files_and_noise_are_ignored() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let (tx, mut rx) = alert_channel(8);
        let mut state =
            FileMonitorState::new(BaselineSnapshot::new(), &cfg, ActivityLog::new(&cfg.log_path), tx);

        for name in ["hash_db.json", "honeypot_fake_sensitive.txt", "build.tmp", "~lock.docx"] {
            let p = dir.path().join(name);
            fs::write(&p, b"x").unwrap();
            state.handle(modified_at(&p, Instant::now()));
            state.handle(ChangeEvent::new(ChangeKind::Created, &p));
        }
        state.handle(ChangeEvent::new(ChangeKind::Created, dir.path()));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn missing_baseline_fails_fast() {
        let dir = tempdir().unwrap();
        let (tx, mut rx) = alert_channel(8);
        let (_stop_tx, stop_rx) = watch::channel(false);

        run_file_monitor(config(dir.path()), tx, stop_rx).await;

        let alerts = drain(&mut rx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, BASELINE_MISSING_ALERT);
    }
}
