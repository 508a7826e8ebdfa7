//! Transient notifications and the time-boxed undo stack.
//!
//! Undo commands are plain data with their own expiry, so they can be
//! exercised without any toast or rendering surface. A toast only carries
//! the id of the command it offers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use lifeboard_shared::{Status, TaskCreate};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Warning,
}

impl NotificationKind {
    pub fn icon(self) -> &'static str {
        match self {
            NotificationKind::Success => "✅",
            NotificationKind::Error => "❌",
            NotificationKind::Info => "ℹ️",
            NotificationKind::Warning => "⚠️",
        }
    }
}

/// Reverse of a user action, replayed through the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoInverse {
    /// Put a task back to the status it had before.
    RestoreStatus { task_id: String, status: Status },
    /// Recreate a deleted task. The remote store assigns a new id.
    Recreate { payload: TaskCreate },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoCommand {
    pub id: Uuid,
    pub label: String,
    pub inverse: UndoInverse,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UndoCommand {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UndoError {
    #[error("nothing to undo for {0}")]
    Unknown(Uuid),
    #[error("undo window for \"{0}\" has closed")]
    Expired(String),
}

#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    entries: Vec<UndoCommand>,
}

impl UndoStack {
    pub fn push(
        &mut self,
        label: impl Into<String>,
        inverse: UndoInverse,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Uuid {
        let command = UndoCommand {
            id: Uuid::new_v4(),
            label: label.into(),
            inverse,
            created_at: now,
            expires_at: now + to_chrono(window),
        };
        let id = command.id;
        debug!(undo_id = %id, label = %command.label, "registered undo command");
        self.entries.push(command);
        id
    }

    /// Removes and returns the command if its window is still open.
    pub fn take(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<UndoCommand, UndoError> {
        let idx = self
            .entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(UndoError::Unknown(id))?;
        let command = self.entries.remove(idx);
        if !command.is_live(now) {
            return Err(UndoError::Expired(command.label));
        }
        Ok(command)
    }

    pub fn latest_live(&self, now: DateTime<Utc>) -> Option<&UndoCommand> {
        self.entries.iter().rev().find(|entry| entry.is_live(now))
    }

    /// Drops expired commands, returning how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.is_live(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: Uuid,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub undo_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct NotifyOptions {
    pub undo: Option<UndoInverse>,
    pub delay: Option<Duration>,
}

impl NotifyOptions {
    pub fn with_undo(inverse: UndoInverse) -> Self {
        Self {
            undo: Some(inverse),
            delay: None,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            undo: None,
            delay: Some(delay),
        }
    }
}

/// Visible toast list. Expiry removes the prompt and nothing else.
#[derive(Debug, Clone)]
pub struct Notifier {
    default_delay: Duration,
    undo_delay: Duration,
    toasts: Vec<Toast>,
}

impl Notifier {
    pub fn new(default_delay: Duration, undo_delay: Duration) -> Self {
        Self {
            default_delay,
            undo_delay,
            toasts: Vec::new(),
        }
    }

    /// Shows a toast. An attached inverse is registered on `undo` with the
    /// same window as the toast.
    pub fn notify(
        &mut self,
        message: impl Into<String>,
        kind: NotificationKind,
        options: NotifyOptions,
        undo: &mut UndoStack,
        now: DateTime<Utc>,
    ) -> Toast {
        let message = message.into();
        let delay = options.delay.unwrap_or(if options.undo.is_some() {
            self.undo_delay
        } else {
            self.default_delay
        });
        let undo_id = options
            .undo
            .map(|inverse| undo.push(message.clone(), inverse, now, delay));

        let toast = Toast {
            id: Uuid::new_v4(),
            message,
            kind,
            created_at: now,
            expires_at: now + to_chrono(delay),
            undo_id,
        };
        debug!(toast_id = %toast.id, kind = ?kind, message = %toast.message, "toast shown");
        self.toasts.push(toast.clone());
        toast
    }

    pub fn visible(&self, now: DateTime<Utc>) -> Vec<&Toast> {
        self.toasts.iter().filter(|toast| now < toast.expires_at).collect()
    }

    /// Removes expired toasts and returns them.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<Toast> {
        let (expired, kept): (Vec<Toast>, Vec<Toast>) =
            self.toasts.drain(..).partition(|toast| now >= toast.expires_at);
        self.toasts = kept;
        expired
    }

    pub fn dismiss_undo(&mut self, undo_id: Uuid) {
        self.toasts.retain(|toast| toast.undo_id != Some(undo_id));
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
