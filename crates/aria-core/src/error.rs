//! Error types for Aria

use crate::types::{Channel, EntryId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The backing medium rejected a read or write. The in-memory copy stays
    /// authoritative; `entry_id` names the entry that was kept without being
    /// persisted, if any.
    #[error("persistence error{}: {reason}", .entry_id.map(|id| format!(" (entry {id})")).unwrap_or_default())]
    Persistence {
        entry_id: Option<EntryId>,
        reason: String,
    },

    #[error("invalid search filter: {0}")]
    InvalidFilter(String),

    #[error("consumer failure: {consumer} on {channel} - {message}")]
    ConsumerFailure {
        consumer: String,
        channel: Channel,
        message: String,
    },

    #[error("coordinator stopped")]
    CoordinatorStopped,

    /// `start` was called with no async runtime to host the worker.
    #[error("no async runtime: {0}")]
    RuntimeUnavailable(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn persistence(entry_id: Option<EntryId>, reason: impl Into<String>) -> Self {
        Self::Persistence {
            entry_id,
            reason: reason.into(),
        }
    }

    pub fn invalid_filter(reason: impl Into<String>) -> Self {
        Self::InvalidFilter(reason.into())
    }

    pub fn consumer_failure(
        consumer: impl Into<String>,
        channel: Channel,
        message: impl Into<String>,
    ) -> Self {
        Self::ConsumerFailure {
            consumer: consumer.into(),
            channel,
            message: message.into(),
        }
    }

    /// Errors that leave the system usable in a reduced mode.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::ConsumerFailure { .. })
    }
}
