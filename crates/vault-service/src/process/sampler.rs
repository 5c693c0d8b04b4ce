//! CPU sampling of live processes.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tracing::trace;

/// Names of idle pseudo-processes that always look busy.
const IDLE_PROCESS_NAMES: &[&str] = &["System Idle Process", "idle"];

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub at: Instant,
}

impl ProcessSample {
    /// The idle process and pid 0 are never candidates.
    pub fn is_idle(&self) -> bool {
        self.pid == 0 || IDLE_PROCESS_NAMES.iter().any(|n| n.eq_ignore_ascii_case(&self.name))
    }
}

/// Source of per-process CPU utilisation.
///
/// `sample` may block for the measurement slice; the monitor runs it on the
/// blocking pool.
pub trait CpuSampler: Send + 'static {
    /// Establish the first reference point so the next sample has a delta.
    fn prime(&mut self) {}

    fn sample(&mut self) -> Result<Vec<ProcessSample>>;
}

/// `sysinfo`-backed sampler. Keeps one `System` alive across polls.
pub struct SysinfoSampler {
    system: System,
    slice: Duration,
}

impl SysinfoSampler {
    pub fn new(slice: Duration) -> Self {
        Self {
            system: System::new(),
            slice: slice.max(MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    fn refresh(&mut self) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
    }
}

impl CpuSampler for SysinfoSampler {
    fn prime(&mut self) {
        self.refresh();
    }

    fn sample(&mut self) -> Result<Vec<ProcessSample>> {
        self.refresh();
        std::thread::sleep(self.slice);
        // Processes that exit during the slice are dropped here.
        self.refresh();

        let at = Instant::now();
        let samples: Vec<ProcessSample> = self
            .system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessSample {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                cpu_percent: process.cpu_usage(),
                at,
            })
            .filter(|s| s.cpu_percent.is_finite())
            .collect();

        if samples.is_empty() {
            return Err(anyhow!("no processes found during enumeration"));
        }
        trace!(count = samples.len(), "sampled processes");
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_detection() {
        let at = Instant::now();
        let s = |pid, name: &str| ProcessSample {
            pid,
            name: name.into(),
            cpu_percent: 99.0,
            at,
        };
        assert!(s(0, "anything").is_idle());
        assert!(s(4, "System Idle Process").is_idle());
        assert!(!s(4242, "encryptor").is_idle());
    }

    #[test]
    fn sysinfo_sees_this_process() {
        let mut sampler = SysinfoSampler::new(Duration::from_millis(10));
        sampler.prime();
        let samples = sampler.sample().unwrap();
        let me = std::process::id();
        assert!(samples.iter().any(|s| s.pid == me));
    }
}
