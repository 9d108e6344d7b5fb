//! Configuration for the replicator.
//!
//! All configuration is sourced from the environment; there is no config
//! file. [`Config::from_env()`] reads and validates every variable before
//! any work begins, so a misconfigured run fails immediately instead of
//! half-way through fan-out.
//!
//! # Environment Surface
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `REDIS_PRODUCTION_HOST` | no | `127.0.0.1` |
//! | `REDIS_PRODUCTION_PORT` | no | `6379` |
//! | `REDIS_PRODUCTION_DB` | no | `0` |
//! | `RECIPIENTS` | yes | — |
//! | `HASHES` | yes | — |
//! | `RECIPIENT_REDIS_PORT` | no | `6379` |
//! | `RECIPIENT_REDIS_DB_NUM` | no | `0` |
//! | `SSH_USERNAME` | yes | — |
//! | `SSH_AUTH_SOCK` | yes | — |
//! | `RECIPIENT_DOMAIN` | yes | — |
//! | `DEBUG` | no | `false` |
//! | `EXIT_IF_ERROR` | no | `false` |
//! | `BUILD_URL` | no | `https://example.com` |
//! | `SLACK_HOOK_URL` | yes | — |
//!
//! `RECIPIENTS` and `HASHES` are comma-separated lists; entries are
//! trimmed and empty entries dropped. Recipient entries use the
//! `host[:port[:db]]` descriptor format resolved by
//! [`Recipient::parse`](crate::recipient::Recipient::parse).

use crate::error::{ReplicationError, Result};

/// Immutable run configuration, read once at process start.
#[derive(Debug, Clone)]
pub struct Config {
    /// Authoritative store host.
    pub source_host: String,
    /// Authoritative store port.
    pub source_port: u16,
    /// Authoritative store database index.
    pub source_db: u32,
    /// Raw recipient descriptors (`host[:port[:db]]`).
    pub recipients: Vec<String>,
    /// Hash names to replicate.
    pub hashes: Vec<String>,
    /// Default recipient store port when the descriptor omits one.
    pub recipient_port: u16,
    /// Default recipient database index when the descriptor omits one.
    pub recipient_db: u32,
    /// SSH user for tunnel identities.
    pub ssh_username: String,
    /// Path to the SSH agent socket.
    pub ssh_auth_socket: String,
    /// Domain suffix appended to each resolved recipient host.
    pub recipient_domain: String,
    /// Lower the log filter to debug level.
    pub debug: bool,
    /// Exit non-zero when the run accumulated failures.
    pub exit_if_error: bool,
    /// Link attached to the failure report (CI build page).
    pub build_url: String,
    /// Webhook endpoint for the failure report.
    pub slack_hook_url: String,
}

impl Config {
    /// Read and validate configuration from the process environment.
    ///
    /// Missing required variables produce a fatal
    /// [`Config`](ReplicationError::Config) error naming the variable.
    pub fn from_env() -> Result<Self> {
        Self::load(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary lookup function.
    ///
    /// `from_env()` passes `std::env::var`; tests pass a map.
    pub fn load<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            source_host: get("REDIS_PRODUCTION_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            source_port: parse_var(&get, "REDIS_PRODUCTION_PORT", 6379)?,
            source_db: parse_var(&get, "REDIS_PRODUCTION_DB", 0)?,
            recipients: required_list(&get, "RECIPIENTS")?,
            hashes: required_list(&get, "HASHES")?,
            recipient_port: parse_var(&get, "RECIPIENT_REDIS_PORT", 6379)?,
            recipient_db: parse_var(&get, "RECIPIENT_REDIS_DB_NUM", 0)?,
            ssh_username: required(&get, "SSH_USERNAME")?,
            ssh_auth_socket: required(&get, "SSH_AUTH_SOCK")?,
            recipient_domain: required(&get, "RECIPIENT_DOMAIN")?,
            debug: bool_var(&get, "DEBUG"),
            exit_if_error: bool_var(&get, "EXIT_IF_ERROR"),
            build_url: get("BUILD_URL").unwrap_or_else(|| "https://example.com".to_string()),
            slack_hook_url: required(&get, "SLACK_HOOK_URL")?,
        })
    }

    /// `host:port` address of the authoritative store.
    pub fn source_addr(&self) -> String {
        format!("{}:{}", self.source_host, self.source_port)
    }

    /// Create a minimal config for tests.
    pub fn for_testing() -> Self {
        Self {
            source_host: "127.0.0.1".to_string(),
            source_port: 6379,
            source_db: 0,
            recipients: Vec::new(),
            hashes: Vec::new(),
            recipient_port: 6379,
            recipient_db: 0,
            ssh_username: "deploy".to_string(),
            ssh_auth_socket: "/tmp/agent.sock".to_string(),
            recipient_domain: "example.net".to_string(),
            debug: false,
            exit_if_error: false,
            build_url: "https://example.com".to_string(),
            slack_hook_url: "https://hooks.example.com/services/T0/B0/x".to_string(),
        }
    }
}

fn required<F>(get: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ReplicationError::Config(format!("{name} is required"))),
    }
}

fn required_list<F>(get: &F, name: &str) -> Result<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = required(get, name)?;
    let entries: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect();
    if entries.is_empty() {
        return Err(ReplicationError::Config(format!("{name} is required")));
    }
    Ok(entries)
}

fn parse_var<F, T>(get: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(name) {
        Some(value) => value.trim().parse::<T>().map_err(|_| {
            ReplicationError::Config(format!("{name} has an invalid value: {value}"))
        }),
        None => Ok(default),
    }
}

fn bool_var<F>(get: &F, name: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    matches!(
        get(name).as_deref().map(str::trim),
        Some("true") | Some("1")
    )
}
