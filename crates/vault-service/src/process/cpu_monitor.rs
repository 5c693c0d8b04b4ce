//! Sustained-CPU process monitor.
//!
//! Bulk encryption keeps a process busy across several polls. A single spike is
//! ignored; `repeat_limit` over-threshold samples inside the lookback window
//! raise one alert, after which that process has to offend again from scratch.

use crate::process::sampler::{CpuSampler, ProcessSample};
use anyhow::anyhow;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use vault_core::activity_log::ActivityLog;
use vault_core::alert::{AlertEvent, AlertSender};
use vault_core::settings::Settings;
use vault_core::window::SlidingWindow;

pub const HEARTBEAT_ALERT: &str = "⏳ Monitoring... no threats yet.";
pub const CPU_MONITOR_STOPPED_ALERT: &str = "🛑 CPU monitoring stopped";

pub fn sustained_cpu_message(name: &str, pid: u32, cpu: f32) -> String {
    format!("🚨 High sustained CPU: {name} (PID: {pid}) - {cpu:.2}%")
}

#[derive(Debug, Clone)]
pub struct CpuMonitorConfig {
    pub threshold_percent: f32,
    pub lookback: Duration,
    pub repeat_limit: usize,
    pub poll_interval: Duration,
    pub status_interval: Duration,
    pub log_path: PathBuf,
}

impl From<&Settings> for CpuMonitorConfig {
    fn from(settings: &Settings) -> Self {
        let pm = &settings.process_monitor;
        Self {
            threshold_percent: pm.cpu_threshold_percent,
            lookback: pm.lookback(),
            repeat_limit: pm.repeat_limit,
            poll_interval: pm.poll_interval(),
            status_interval: pm.status_interval(),
            log_path: settings.log_path(),
        }
    }
}

/// Per-pid windows of over-threshold sample times.
#[derive(Debug)]
pub struct SustainedCpuDetector {
    threshold_percent: f32,
    lookback: Duration,
    repeat_limit: usize,
    windows: HashMap<u32, SlidingWindow>,
}

impl SustainedCpuDetector {
    pub fn new(threshold_percent: f32, lookback: Duration, repeat_limit: usize) -> Self {
        Self {
            threshold_percent,
            lookback,
            repeat_limit,
            windows: HashMap::new(),
        }
    }

    /// Feed one sample. Returns the alert message when this sample completes a
    /// sustained run.
    pub fn observe(&mut self, sample: &ProcessSample) -> Option<String> {
        if sample.is_idle() || sample.cpu_percent <= self.threshold_percent {
            return None;
        }
        let lookback = self.lookback;
        let window = self
            .windows
            .entry(sample.pid)
            .or_insert_with(|| SlidingWindow::new(lookback));
        if window.record(sample.at) < self.repeat_limit {
            return None;
        }
        window.clear();
        Some(sustained_cpu_message(
            &sample.name,
            sample.pid,
            sample.cpu_percent,
        ))
    }

    /// Forget pids that are no longer running so reused pids start clean.
    pub fn retain_pids(&mut self, live: &HashSet<u32>) {
        self.windows.retain(|pid, _| live.contains(pid));
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

/// Rate limiter for the "still alive, nothing found" status line.
#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    last: Option<Instant>,
    alert_since_last: bool,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            alert_since_last: false,
        }
    }

    pub fn note_alert(&mut self) {
        self.alert_since_last = true;
    }

    /// `true` when a heartbeat should go out now.
    pub fn due(&mut self, now: Instant) -> bool {
        let elapsed = self
            .last
            .map_or(true, |last| now.saturating_duration_since(last) > self.interval);
        if !elapsed {
            return false;
        }
        let quiet = !self.alert_since_last;
        self.last = Some(now);
        self.alert_since_last = false;
        quiet
    }
}

async fn primed<S: CpuSampler>(mut sampler: S) -> Result<S, JoinError> {
    tokio::task::spawn_blocking(move || {
        sampler.prime();
        sampler
    })
    .await
}

/// Poll processes until `stop` flips to `true` (or its sender is dropped).
///
/// `make_sampler` is called once at start and again whenever a sampler panics,
/// so one bad poll does not end monitoring.
pub async fn run_cpu_monitor<S, F>(
    config: CpuMonitorConfig,
    mut make_sampler: F,
    alerts: AlertSender,
    mut stop: watch::Receiver<bool>,
) where
    S: CpuSampler,
    F: FnMut() -> S + Send + 'static,
{
    let log = ActivityLog::new(&config.log_path);
    let mut detector =
        SustainedCpuDetector::new(config.threshold_percent, config.lookback, config.repeat_limit);
    let mut heartbeat = Heartbeat::new(config.status_interval);

    info!(
        threshold = config.threshold_percent,
        interval_secs = config.poll_interval.as_secs_f32(),
        "process monitor started"
    );
    alerts.emit(AlertEvent::info(format!(
        "🔎 Monitoring for processes with sustained CPU > {}%...",
        config.threshold_percent
    )));

    let mut sampler = match primed(make_sampler()).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "process sampler failed to initialise");
            alerts.emit(AlertEvent::warning(format!("❌ CPU monitoring failed to start: {e}")));
            return;
        }
    };

    loop {
        if *stop.borrow() {
            break;
        }

        let result = tokio::task::spawn_blocking(move || {
            let samples = sampler.sample();
            (sampler, samples)
        })
        .await;
        let samples = match result {
            Ok((s, samples)) => {
                sampler = s;
                samples
            }
            Err(e) => {
                // The sampler panicked and is gone with its thread.
                warn!(error = %e, "process sampler crashed, rebuilding");
                match primed(make_sampler()).await {
                    Ok(s) => {
                        sampler = s;
                        Err(anyhow!("sampler crashed: {e}"))
                    }
                    Err(e) => {
                        warn!(error = %e, "process sampler cannot be rebuilt");
                        break;
                    }
                }
            }
        };

        // Stop requested while sampling: report nothing from this pass.
        if *stop.borrow() {
            break;
        }

        match samples {
            Ok(samples) => {
                let live: HashSet<u32> = samples.iter().map(|s| s.pid).collect();
                detector.retain_pids(&live);
                for sample in &samples {
                    if let Some(message) = detector.observe(sample) {
                        warn!(pid = sample.pid, name = %sample.name, cpu = sample.cpu_percent, "sustained high CPU");
                        log.record(&message);
                        alerts.emit(AlertEvent::critical(message));
                        heartbeat.note_alert();
                    }
                }
                debug!(processes = samples.len(), tracked = detector.tracked(), "process poll done");
            }
            Err(e) => warn!(error = %e, "process poll failed, retrying next interval"),
        }

        if heartbeat.due(Instant::now()) {
            alerts.emit(AlertEvent::routine(HEARTBEAT_ALERT));
        }

        tokio::select! {
            _ = tokio::time::sleep(config.poll_interval) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("process monitor stopped");
    alerts.emit(AlertEvent::info(CPU_MONITOR_STOPPED_ALERT));
}
