//! # refclone
//!
//! Fan-out replicator for Redis reference hashes over per-host SSH
//! tunnels.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            refclone                              │
//! │                                                                  │
//! │  ┌──────────────┐      ┌───────────────────────────────────────┐ │
//! │  │ SourceFetch  │─────►│ Snapshot (Arc, read-only after build) │ │
//! │  │ (sequential) │      └──────────────────┬────────────────────┘ │
//! │  └──────────────┘                         │ shared by all tasks  │
//! │                                           ▼                      │
//! │  ┌─────────────┐   per recipient   ┌──────────────┐              │
//! │  │ Orchestrator│──────────────────►│ Replication  │ × N          │
//! │  │ (fan-out +  │                   │ Task (tunnel │              │
//! │  │ join)       │◄──────────────────│ + copy)      │              │
//! │  └──────┬──────┘   failure log     └──────────────┘              │
//! │         │                                                        │
//! │         ▼ after join barrier                                     │
//! │  ┌──────────────┐                                                │
//! │  │ FailureNotify│──► webhook (one message, capped host list)     │
//! │  └──────────────┘                                                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every run is a fresh process and a full copy: fetch all configured
//! hashes from the authoritative store once, then fan out one concurrent
//! task per recipient, each owning its own SSH tunnel and store
//! connection. Failures are confined to their recipient, aggregated
//! under one lock, and reported once after all tasks have joined.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use refclone::{Config, HttpWebhook, Orchestrator, RedisConnector, SshTunnelFactory};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> refclone::Result<()> {
//!     let config = Config::from_env()?;
//!     let tunnels = Arc::new(SshTunnelFactory::from_agent(&config.ssh_auth_socket).await?);
//!     let orchestrator = Orchestrator::new(
//!         config,
//!         Arc::new(RedisConnector),
//!         tunnels,
//!         HttpWebhook::new(),
//!     );
//!     let result = orchestrator.run().await?;
//!     println!("{} of {} failed", result.failed_count, result.total_recipients);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod failure;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod recipient;
pub mod snapshot;
pub mod store;
pub mod task;
pub mod tunnel;

// Re-exports for convenience
pub use config::Config;
pub use error::{ReplicationError, Result};
pub use failure::{FailureLog, FailureRecord, RunResult};
pub use notify::{FailureNotifier, HttpWebhook, NotifyTransport};
pub use orchestrator::Orchestrator;
pub use recipient::Recipient;
pub use snapshot::{HashEntry, Snapshot};
pub use store::{RedisConnector, StoreConnector, StoreHandle};
pub use task::{TaskContext, TaskState};
pub use tunnel::{SshTunnelFactory, TunnelFactory, TunnelHandle};
