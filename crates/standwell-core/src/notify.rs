//! Notifications and their delivery path.
//!
//! State machines never wait on delivery. They push a [`Notification`] into
//! an [`Outbox`] and move on; a delivery task drains the other end and hands
//! each item to a [`NotificationSink`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::NotifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A sit/stand phase or Pomodoro session ended.
    PhaseTransition,
    /// Threshold-triggered poor posture alert (subject to backoff).
    PostureAlert,
    /// Randomly timed low-urgency reminder.
    PostureNudge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            body: body.into(),
            created_at,
        }
    }
}

/// Anything that can show a notification to the user.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Sending half of the delivery queue. Never blocks.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// An outbox whose receiver is already gone; everything sent is dropped.
    pub fn disconnected() -> Self {
        Self::channel().0
    }

    /// Queue a notification. Returns `false` if the delivery side has shut down.
    pub fn send(&self, notification: Notification) -> bool {
        match self.tx.send(notification) {
            Ok(()) => true,
            Err(mpsc::error::SendError(n)) => {
                tracing::warn!(kind = ?n.kind, title = %n.title, "notification dropped, delivery task gone");
                false
            }
        }
    }
}
