use async_trait::async_trait;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "INFO"),
            AlertSeverity::Warning => write!(f, "WARNING"),
            AlertSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Notification collaborator. Delivery (Discord, email, whatever) lives
/// outside this core; we only hand messages over.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, severity: AlertSeverity, message: &str);
}

/// Default sink: alerts land in the log stream.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn send(&self, severity: AlertSeverity, message: &str) {
        match severity {
            AlertSeverity::Info => tracing::info!("🔔 {}", message),
            AlertSeverity::Warning => tracing::warn!("🔔 {}", message),
            AlertSeverity::Critical => tracing::error!("🚨 {}", message),
        }
    }
}
