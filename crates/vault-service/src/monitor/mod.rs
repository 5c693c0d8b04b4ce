pub mod file_monitor;
pub mod watcher;

pub use file_monitor::{run_file_monitor, FileMonitorConfig, MassChangeDetector};
pub use watcher::{ChangeEvent, ChangeKind, FileWatcher};
