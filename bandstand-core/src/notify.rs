//! Notification sink and stored notification history.

use crate::storage::{keys, StateStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Notification severity, mirrored in the stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Info,
    Success,
    Error,
}

impl NoteKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Fire-and-forget notification sink.
///
/// Used for the prompts the player is required to surface (playback blocked,
/// consent requests, track errors). Delivery is best-effort; no caller waits
/// on it.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: NoteKind);
}

/// A single entry in the stored notification history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNote {
    pub id: String,
    pub message: String,
    pub kind: NoteKind,
    pub created_at: String,
    pub read: bool,
}

/// Notifier that logs each notification and appends it, newest first, to the
/// durable notification history.
pub struct StoredNotifier {
    store: Arc<dyn StateStore>,
}

impl StoredNotifier {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Append a notification to the stored history and return the entry.
    pub async fn record(&self, message: &str, kind: NoteKind) -> StoredNote {
        let now = Utc::now();
        let note = StoredNote {
            id: format!("n_{}", now.timestamp_millis()),
            message: message.to_string(),
            kind,
            created_at: now.to_rfc3339(),
            read: false,
        };

        let mut history = self.history().await;
        history.insert(0, note.clone());
        self.persist(&history).await;

        note
    }

    /// The stored history, newest first. Unreadable history is treated as
    /// empty rather than fatal.
    pub async fn history(&self) -> Vec<StoredNote> {
        let Some(raw) = self.store.get(keys::NOTIFICATIONS).await else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(notes) => notes,
            Err(e) => {
                warn!("Discarding unreadable notification history: {e}");
                Vec::new()
            }
        }
    }

    /// Mark a stored notification as read. Unknown ids are ignored.
    pub async fn mark_read(&self, id: &str) {
        let mut history = self.history().await;
        let mut changed = false;
        for note in &mut history {
            if note.id == id && !note.read {
                note.read = true;
                changed = true;
            }
        }
        if changed {
            self.persist(&history).await;
        }
    }

    async fn persist(&self, history: &[StoredNote]) {
        match serde_json::to_string(history) {
            Ok(encoded) => self.store.set(keys::NOTIFICATIONS, &encoded).await,
            Err(e) => warn!("Failed to encode notification history: {e}"),
        }
    }
}

impl Notifier for StoredNotifier {
    fn notify(&self, message: &str, kind: NoteKind) {
        match kind {
            NoteKind::Error => error!("{message}"),
            _ => info!("{message}"),
        }

        // Persist in the background; the caller never waits on delivery.
        let store = Arc::clone(&self.store);
        let message = message.to_string();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let _ = handle.spawn(async move {
                let _ = StoredNotifier::new(store).record(&message, kind).await;
            });
        }
    }
}
