//! Recipient descriptor parsing.
//!
//! A recipient is one destination store, written in configuration as a
//! compact descriptor:
//!
//! ```text
//! host            → host, default port, default db
//! host:port       → host, port, default db
//! host:port:db    → host, port, db
//! ```
//!
//! Parsing is a pure function of the descriptor and the configured
//! defaults. A malformed descriptor is rejected with a recipient-scoped
//! error; the orchestrator logs it and moves on to the next descriptor
//! without counting a replication failure.

use crate::error::{ReplicationError, Result};

/// One resolved destination store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Short host name, before the domain suffix is appended.
    pub host: String,
    /// Store port on the recipient host.
    pub port: u16,
    /// Database index to select after connecting.
    pub db: u32,
}

impl Recipient {
    /// Parse a raw descriptor, applying defaults for omitted fields.
    ///
    /// Surrounding whitespace is ignored. A whitespace-only descriptor,
    /// or one with more than three segments, is rejected with the
    /// format error.
    pub fn parse(raw: &str, default_port: u16, default_db: u32) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(format_error());
        }
        let segments: Vec<&str> = raw.split(':').collect();
        match segments.as_slice() {
            [host] => Ok(Self {
                host: host.to_string(),
                port: default_port,
                db: default_db,
            }),
            [host, port] => Ok(Self {
                host: host.to_string(),
                port: parse_port(port)?,
                db: default_db,
            }),
            [host, port, db] => Ok(Self {
                host: host.to_string(),
                port: parse_port(port)?,
                db: parse_db(db)?,
            }),
            _ => Err(format_error()),
        }
    }

    /// Fully-qualified host name with the configured domain appended.
    pub fn fqdn(&self, domain: &str) -> String {
        format!("{}.{}", self.host, domain)
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.port, self.db)
    }
}

fn format_error() -> ReplicationError {
    ReplicationError::RecipientFormat("undefined format, required host:port:db".to_string())
}

fn parse_port(raw: &str) -> Result<u16> {
    raw.parse::<u16>()
        .map_err(|_| ReplicationError::RecipientFormat(format!("invalid port: {raw}")))
}

fn parse_db(raw: &str) -> Result<u32> {
    raw.parse::<u32>()
        .map_err(|_| ReplicationError::RecipientFormat(format!("invalid db: {raw}")))
}
