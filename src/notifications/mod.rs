use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Notification severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Transient notices shown to the user while optimizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AlertType {
    // Sweep lifecycle
    SweepStarted {
        strategy: String,
        symbol: String,
        trials: u32,
    },
    SweepCompleted {
        strategy: String,
        results: usize,
    },
    SweepFailed {
        message: String,
    },
    SweepTimedOut {
        seconds: u64,
    },

    // Ultimate optimization
    ChainStarted {
        strategies: Vec<String>,
    },
    ChainStepCompleted {
        strategy: String,
        results: usize,
        remaining: usize,
    },
    ChainCompleted {
        strategies: usize,
        results: usize,
    },
    ChainAborted {
        strategy: String,
        message: String,
    },
    UpgradeRequired {
        plan: String,
    },

    // Channel
    ChannelNotConnected,
    ConnectionLost {
        service: String,
    },

    ResultsCleared,
}

impl AlertType {
    /// Get default severity for this alert type
    pub fn default_severity(&self) -> Severity {
        match self {
            AlertType::ConnectionLost { .. } => Severity::Critical,

            AlertType::SweepFailed { .. } => Severity::Warning,
            AlertType::SweepTimedOut { .. } => Severity::Warning,
            AlertType::ChainAborted { .. } => Severity::Warning,
            AlertType::ChannelNotConnected => Severity::Warning,

            // Everything else, upsell prompts included
            _ => Severity::Info,
        }
    }

    /// Get a human-readable title for this alert
    pub fn title(&self) -> String {
        match self {
            AlertType::SweepStarted { strategy, .. } => format!("Optimizing {}", strategy),
            AlertType::SweepCompleted { strategy, .. } => format!("Optimization Complete: {}", strategy),
            AlertType::SweepFailed { .. } => "Optimization Failed".to_string(),
            AlertType::SweepTimedOut { .. } => "Optimization Timed Out".to_string(),

            AlertType::ChainStarted { .. } => "Ultimate Optimization Started".to_string(),
            AlertType::ChainStepCompleted { strategy, .. } => format!("Finished {}", strategy),
            AlertType::ChainCompleted { .. } => "Ultimate Optimization Complete".to_string(),
            AlertType::ChainAborted { strategy, .. } => format!("Ultimate Optimization Aborted at {}", strategy),
            AlertType::UpgradeRequired { .. } => "Upgrade to Unlock Ultimate Optimization".to_string(),

            AlertType::ChannelNotConnected => "Optimizer Not Connected".to_string(),
            AlertType::ConnectionLost { service } => format!("Connection Lost: {}", service),

            AlertType::ResultsCleared => "Results Cleared".to_string(),
        }
    }

    /// One-line body text
    pub fn message(&self) -> String {
        match self {
            AlertType::SweepStarted { symbol, trials, .. } => {
                format!("{} trials on {}", trials, symbol)
            }
            AlertType::SweepCompleted { results, .. } => format!("{} unique results", results),
            AlertType::SweepFailed { message } => message.clone(),
            AlertType::SweepTimedOut { seconds } => {
                format!("No response from the optimizer for {}s", seconds)
            }
            AlertType::ChainStarted { strategies } => strategies.join(" -> "),
            AlertType::ChainStepCompleted { results, remaining, .. } => {
                format!("{} results, {} strategies remaining", results, remaining)
            }
            AlertType::ChainCompleted { strategies, results } => {
                format!("{} results across {} strategies", results, strategies)
            }
            AlertType::ChainAborted { message, .. } => message.clone(),
            AlertType::UpgradeRequired { plan } => {
                format!("Your {} plan does not include ultimate optimization", plan)
            }
            AlertType::ChannelNotConnected => {
                "The optimizer channel is not connected. Reload to reconnect.".to_string()
            }
            AlertType::ConnectionLost { .. } => "Reload to reconnect.".to_string(),
            AlertType::ResultsCleared => String::new(),
        }
    }
}

/// A notification/alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub alert_type: AlertType,
}

impl Notification {
    pub fn new(alert_type: AlertType) -> Self {
        let severity = alert_type.default_severity();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            severity,
            alert_type,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// Notification manager
pub struct NotificationManager {
    notifications: Arc<RwLock<Vec<Notification>>>,
    max_notifications: usize,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self {
            notifications: Arc::new(RwLock::new(Vec::new())),
            max_notifications: 200,
        }
    }

    /// Send a notification
    pub async fn notify(&self, alert_type: AlertType) {
        self.notify_with_severity(alert_type, None).await;
    }

    /// Send a notification with custom severity
    pub async fn notify_with_severity(&self, alert_type: AlertType, severity: Option<Severity>) {
        let mut notification = Notification::new(alert_type);
        if let Some(sev) = severity {
            notification = notification.with_severity(sev);
        }

        let title = notification.alert_type.title();
        let message = notification.alert_type.message();
        match notification.severity {
            Severity::Critical => error!("{} - {}", title, message),
            Severity::Warning => warn!("{} - {}", title, message),
            Severity::Info => info!("{} - {}", title, message),
        }

        let mut notifications = self.notifications.write().await;
        notifications.insert(0, notification);

        if notifications.len() > self.max_notifications {
            notifications.truncate(self.max_notifications);
        }
    }

    /// Get all notifications, newest first
    #[cfg(test)]
    pub async fn get_all(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }

    /// Most recent notification, if any
    #[cfg(test)]
    pub async fn latest(&self) -> Option<Notification> {
        self.notifications.read().await.first().cloned()
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}
