//! Transient user-facing notices
//!
//! The engine raises short messages ("Live updates paused. Reconnecting…")
//! that a front end shows as toasts. Subscribers receive every notice as it
//! is raised; [`NoticeCenter::current`] returns the latest one until its
//! display time runs out.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub const RECONNECTING: &str = "Live updates paused. Reconnecting…";
pub const STREAM_STOPPED: &str = "Live updates stopped.";
pub const SUBMIT_OK: &str = "Narrative checked successfully.";

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub id: Uuid,
    pub message: String,
    pub tone: Tone,
    pub raised_at: DateTime<Utc>,
    #[serde(skip)]
    expires_at: Instant,
}

impl Notice {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Fan-out point for notices
#[derive(Clone)]
pub struct NoticeCenter {
    tx: broadcast::Sender<Notice>,
    latest: Arc<Mutex<Option<Notice>>>,
    ttl: Duration,
}

impl NoticeCenter {
    pub fn new(ttl: Duration) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            latest: Arc::new(Mutex::new(None)),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) -> Notice {
        self.raise(message.into(), Tone::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> Notice {
        self.raise(message.into(), Tone::Error)
    }

    /// Latest notice, unless its display time has passed
    pub fn current(&self) -> Option<Notice> {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        latest.as_ref().filter(|notice| !notice.is_expired()).cloned()
    }

    fn raise(&self, message: String, tone: Tone) -> Notice {
        match tone {
            Tone::Success => info!(notice = %message, "Notice raised"),
            Tone::Error => warn!(notice = %message, "Notice raised"),
        }

        let notice = Notice {
            id: Uuid::new_v4(),
            message,
            tone,
            raised_at: Utc::now(),
            expires_at: Instant::now() + self.ttl,
        };

        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(notice.clone());
        // No subscribers is fine; `current` still sees it
        let _ = self.tx.send(notice.clone());
        notice
    }
}
