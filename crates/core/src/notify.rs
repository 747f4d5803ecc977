use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::traits::NotificationBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Background task flag changed
    Status,
    /// Front-ends should reload everything
    Reload,
    /// Repository data changed after a sweep
    Repository,
    /// Urgent user-facing alert
    Alert,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Status => "custodian/status",
            Topic::Reload => "custodian/reload",
            Topic::Repository => "custodian/repository",
            Topic::Alert => "custodian/alert",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: Topic,
    pub payload: Value,
}

/// In-process notification bus backed by a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl NotificationBus for BroadcastBus {
    fn publish(&self, topic: Topic, payload: Value) {
        debug!("Publishing {} {}", topic, payload);
        // No subscribers is not an error
        let _ = self.sender.send(Notification { topic, payload });
    }

    fn urgent_alert(&self, title: &str, message: &str) {
        error!("{} {}", title, message);
        let _ = self.sender.send(Notification {
            topic: Topic::Alert,
            payload: serde_json::json!({ "title": title, "message": message }),
        });
    }
}
