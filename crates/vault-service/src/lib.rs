//! Long-running detection for SecureVault: the real-time file monitor, the
//! sustained-CPU process monitor and the engine that starts them.

pub mod engine;
pub mod monitor;
pub mod process;

pub use engine::{supervise, Engine};
