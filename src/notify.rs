//! Notification channel.
//!
//! The pipeline reports its terminal states through the [`Notifier`] trait.
//! [`NotificationBus`] implements it as a publish/subscribe channel with two
//! named topics:
//!
//! - [`Topic::Status`]: short progress text ("Processing image…"), meant for
//!   a status line or a screen-reader live region.
//! - [`Topic::PhotoStatus`]: the outcome notifications (success, error).
//!
//! Subscribers pick a topic with [`NotificationBus::subscribe`]. Publishing
//! never blocks and never fails; with no subscriber the message is dropped.

use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

const BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Topic {
    #[serde(rename = "status")]
    Status,
    #[serde(rename = "photoStatus")]
    PhotoStatus,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Status => "status",
            Topic::PhotoStatus => "photoStatus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Loading,
    Info,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Loading => "loading",
            NotificationKind::Info => "info",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub topic: Topic,
    pub kind: NotificationKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Receiver side of the notification collaborator.
pub trait Notifier: Send + Sync {
    /// Report a pipeline outcome.
    fn notify(&self, kind: NotificationKind, title: &str, detail: Option<&str>);

    /// Publish progress text on a topic. Ignored by default.
    fn announce(&self, _topic: Topic, _text: &str) {}
}

/// Broadcast-backed [`Notifier`].
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, notification: Notification) {
        // No subscriber is not an error
        let _ = self.sender.send(notification);
    }

    /// Subscribe to one topic. Messages published before this call are not seen.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            topic: Some(topic),
        }
    }

    pub fn subscribe_all(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            topic: None,
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for NotificationBus {
    fn notify(&self, kind: NotificationKind, title: &str, detail: Option<&str>) {
        self.publish(Notification {
            topic: Topic::PhotoStatus,
            kind,
            title: title.to_string(),
            detail: detail.map(str::to_string),
        });
    }

    fn announce(&self, topic: Topic, text: &str) {
        self.publish(Notification {
            topic,
            kind: NotificationKind::Info,
            title: text.to_string(),
            detail: None,
        });
    }
}

/// A topic-filtered view of the bus.
pub struct Subscription {
    receiver: broadcast::Receiver<Notification>,
    topic: Option<Topic>,
}

impl Subscription {
    fn wants(&self, notification: &Notification) -> bool {
        self.topic.is_none_or(|t| t == notification.topic)
    }

    /// Wait for the next matching notification. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(n) if self.wants(&n) => return Some(n),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching notification already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.try_recv() {
                Ok(n) if self.wants(&n) => return Some(n),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Everything currently queued for this subscription.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
