// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replicator.
//!
//! Errors are categorized by their scope, matching the run lifecycle:
//! a fatal error aborts the whole run before fan-out, a recipient-scoped
//! error is confined to one recipient's task, and a notification error is
//! only counted against the run's failure total.
//!
//! # Error Categories
//!
//! | Error Type | Fatal | Description |
//! |------------|-------|-------------|
//! | `Config` | Yes | Required environment missing or malformed |
//! | `TunnelAuth` | Yes | SSH agent socket unreachable or empty |
//! | `Store` | Yes | Source store unreachable, enumeration failed |
//! | `MissingCollection` | Yes | A configured hash does not exist at the source |
//! | `RecipientFormat` | No | Recipient descriptor failed to parse |
//! | `Tunnel` | No | Tunnel to one recipient failed |
//! | `Remote` | No | Connect or write to one recipient failed |
//! | `Notify` | No | Failure report was not delivered |
//!
//! Use [`ReplicationError::is_fatal()`] to decide whether an error must
//! abort the run. Non-fatal errors are converted into failure records at
//! the task boundary and never propagate past it.

use thiserror::Error;

/// Result type alias for replication operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Errors that can occur during a replication run.
///
/// Each variant carries enough context to log where the error occurred.
/// Use [`is_fatal()`](Self::is_fatal) to check if the run must abort.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// Invalid or missing configuration.
    ///
    /// Raised before any work begins. Fix the environment and re-run.
    #[error("configuration error: {0}")]
    Config(String),

    /// SSH credential source unavailable.
    ///
    /// The agent socket could not be dialed, or the agent holds no
    /// identities. Nothing can be replicated without it.
    #[error("ssh auth error: {0}")]
    TunnelAuth(String),

    /// Source store connection or command error.
    ///
    /// Occurs while connecting to or reading from the authoritative store.
    /// Always fatal: fan-out never starts from an incomplete snapshot.
    #[error("store error ({operation}): {message}")]
    Store {
        operation: String,
        message: String,
        #[source]
        source: Option<redis::RedisError>,
    },

    /// A configured hash is absent from the source store.
    ///
    /// An operator configuration error, not a recoverable condition.
    #[error("hash {0} not found in source store")]
    MissingCollection(String),

    /// Recipient descriptor failed to parse.
    ///
    /// Scoped to one recipient: the orchestrator logs and skips it.
    #[error("{0}")]
    RecipientFormat(String),

    /// Tunnel establishment failure for one recipient.
    #[error("tunnel error ({recipient}): {message}")]
    Tunnel { recipient: String, message: String },

    /// Remote store connect or write failure for one recipient.
    #[error("remote store error ({recipient}): {message}")]
    Remote { recipient: String, message: String },

    /// Failure report delivery error.
    ///
    /// Counted against the run but never escalated to fatal.
    #[error("notification error: {0}")]
    Notify(String),
}

impl ReplicationError {
    /// Create a `Store` error from a redis error.
    pub fn store(operation: impl Into<String>, source: redis::RedisError) -> Self {
        Self::Store {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a `Store` error without a source.
    pub fn store_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a `Tunnel` error for a recipient.
    pub fn tunnel(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tunnel {
            recipient: recipient.into(),
            message: message.into(),
        }
    }

    /// Create a `Remote` error for a recipient.
    pub fn remote(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            recipient: recipient.into(),
            message: message.into(),
        }
    }

    /// Check if this error aborts the run.
    ///
    /// Fatal errors stop the process before fan-out. Everything else is
    /// confined to a single recipient task or to the notification step.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::TunnelAuth(_) => true,
            Self::Store { .. } => true,
            Self::MissingCollection(_) => true,
            Self::RecipientFormat(_) => false,
            Self::Tunnel { .. } => false,
            Self::Remote { .. } => false,
            Self::Notify(_) => false,
        }
    }
}
