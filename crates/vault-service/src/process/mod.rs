pub mod cpu_monitor;
pub mod sampler;

pub use cpu_monitor::{run_cpu_monitor, CpuMonitorConfig, SustainedCpuDetector};
pub use sampler::{CpuSampler, ProcessSample, SysinfoSampler};
