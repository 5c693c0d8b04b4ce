//! Alert events and the channel that carries them out of the monitors.
//!
//! The channel is bounded and multi-producer/single-consumer. Producers never
//! block: when the consumer is slow or gone, the alert is dropped and a warning
//! is logged instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Default number of undelivered alerts held before producers start dropping.
pub const DEFAULT_ALERT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Heartbeats and lifecycle chatter.
    Routine,
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Severity as older consumers infer it from message text.
    pub fn classify(message: &str) -> Severity {
        let lower = message.to_lowercase();
        if message.contains("MASS FILE CHANGES") || message.contains('🚨') {
            Severity::Critical
        } else if message.contains("High sustained CPU")
            || lower.contains("modified")
            || lower.contains("deleted")
        {
            Severity::Warning
        } else if lower.contains("created") {
            Severity::Info
        } else {
            Severity::Routine
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Routine => "ROUTINE",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertEvent {
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn routine(message: impl Into<String>) -> Self {
        Self::new(Severity::Routine, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, message)
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Producer half; cheap to clone, one per monitor.
#[derive(Debug, Clone)]
pub struct AlertSender {
    tx: mpsc::Sender<AlertEvent>,
}

pub type AlertReceiver = mpsc::Receiver<AlertEvent>;

pub fn alert_channel(capacity: usize) -> (AlertSender, AlertReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (AlertSender { tx }, rx)
}

impl AlertSender {
    /// Queue an alert. Returns `false` if it was dropped.
    pub fn emit(&self, event: AlertEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(message = %event.message, "alert channel full, dropping alert");
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!(message = %event.message, "alert consumer gone, dropping alert");
                false
            }
        }
    }
}
