//! Entry points used by the CLI and by any front end.
//!
//! One-shot operations are blocking and return their outcome. The two monitors
//! are spawned onto the tokio runtime and report only through the alert channel;
//! `supervise` drives them until shutdown.

use crate::monitor::file_monitor::{run_file_monitor, FileMonitorConfig};
use crate::process::cpu_monitor::{run_cpu_monitor, CpuMonitorConfig};
use crate::process::sampler::{CpuSampler, SysinfoSampler};
use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use vault_core::activity_log::ActivityLog;
use vault_core::alert::{AlertEvent, AlertReceiver, AlertSender};
use vault_core::baseline::{BaselineSnapshot, BaselineStore};
use vault_core::detector::{self, ScanReport};
use vault_core::honeypot;
use vault_core::settings::Settings;

pub struct Engine {
    settings: Settings,
    log: ActivityLog,
}

impl Engine {
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate().context("invalid settings")?;
        std::fs::create_dir_all(&settings.data_dir)
            .with_context(|| format!("cannot create {}", settings.data_dir.display()))?;
        let log = ActivityLog::new(settings.log_path());
        Ok(Self { settings, log })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn activity_log(&self) -> &ActivityLog {
        &self.log
    }

    fn store(&self) -> BaselineStore {
        BaselineStore::new(self.settings.baseline_path())
    }

    /// Hash the monitored tree and replace the persisted baseline.
    pub fn build_baseline(&self) -> Result<BaselineSnapshot> {
        let snapshot = self
            .store()
            .build(&self.settings.root, &self.settings.own_file_names())
            .with_context(|| format!("baseline build failed for {}", self.settings.root.display()))?;
        Ok(snapshot)
    }

    /// Verify every baseline entry once.
    ///
    /// A missing baseline is logged and returned as an error for the caller to
    /// display; it never panics or aborts.
    pub fn scan_once(&self) -> Result<ScanReport> {
        match detector::scan(&self.store()) {
            Ok(report) => {
                for d in &report.discrepancies {
                    self.log.record(&format!("Scan: {d}"));
                }
                Ok(report)
            }
            Err(e) => {
                if e.is_baseline_missing() {
                    self.log.record("Baseline not found. Please create one first.");
                }
                Err(e.into())
            }
        }
    }

    /// Place the decoy at the monitored root. Failures are reported, not raised.
    pub fn create_honeypot(&self, alerts: Option<&AlertSender>) -> Option<PathBuf> {
        let path = self.settings.honeypot_path();
        let event = match honeypot::create_if_absent(&path) {
            Ok(true) => AlertEvent::info(format!("📦 Honeypot created: {}", path.display())),
            Ok(false) => {
                info!(path = %path.display(), "honeypot already present");
                return Some(path);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "honeypot creation failed");
                let message = format!("⚠️ Honeypot creation error: {e}");
                self.log.record(&message);
                if let Some(alerts) = alerts {
                    alerts.emit(AlertEvent::warning(message));
                }
                return None;
            }
        };
        if let Some(alerts) = alerts {
            alerts.emit(event);
        }
        Some(path)
    }

    pub fn start_file_monitor(
        &self,
        alerts: AlertSender,
        stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let config = FileMonitorConfig::from(&self.settings);
        tokio::spawn(run_file_monitor(config, alerts, stop))
    }

    pub fn start_process_monitor(
        &self,
        alerts: AlertSender,
        stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let slice = self.settings.process_monitor.sample_slice();
        self.start_process_monitor_with(move || SysinfoSampler::new(slice), alerts, stop)
    }

    /// Same as `start_process_monitor` with a caller-supplied sampler factory.
    pub fn start_process_monitor_with<S, F>(
        &self,
        make_sampler: F,
        alerts: AlertSender,
        stop: watch::Receiver<bool>,
    ) -> JoinHandle<()>
    where
        S: CpuSampler,
        F: FnMut() -> S + Send + 'static,
    {
        let config = CpuMonitorConfig::from(&self.settings);
        tokio::spawn(run_cpu_monitor(config, make_sampler, alerts, stop))
    }
}

/// Forward alerts to `on_alert` until `shutdown` resolves or every monitor has
/// finished, then stop the monitors and deliver what they emit on the way out.
///
/// The monitors are always stopped and awaited, also when `shutdown` fails;
/// that failure is returned afterwards.
pub async fn supervise<F, P>(
    mut alerts: AlertReceiver,
    tasks: Vec<JoinHandle<()>>,
    stop: watch::Sender<bool>,
    shutdown: F,
    mut on_alert: P,
) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
    P: FnMut(&AlertEvent),
{
    tokio::pin!(shutdown);
    let mut outcome = Ok(());
    loop {
        tokio::select! {
            alert = alerts.recv() => match alert {
                Some(alert) => on_alert(&alert),
                None => break,
            },
            res = &mut shutdown => {
                match res {
                    Ok(()) => info!("stopping monitors"),
                    Err(e) => {
                        warn!(error = %e, "shutdown signal unavailable, stopping monitors");
                        outcome = Err(anyhow::Error::new(e).context("cannot listen for shutdown signal"));
                    }
                }
                break;
            }
        }
    }

    let _ = stop.send(true);
    while let Some(alert) = alerts.recv().await {
        on_alert(&alert);
    }
    for task in tasks {
        task.await.context("monitor task panicked")?;
    }
    outcome
}
