//! Per-recipient replication task.
//!
//! One task owns the complete lifecycle for one recipient: tunnel up,
//! connect through it, write the snapshot, tear everything down. Tasks
//! run concurrently and share nothing mutable except the failure log.
//!
//! # State Machine
//!
//! ```text
//! Resolving → TunnelUp → Connected → Copying → Succeeded
//!     │           │          │          │
//!     └───────────┴──────────┴──────────┴────→ Failed
//! ```
//!
//! - **Resolving**: form the tunnel identity from the resolved recipient.
//! - **TunnelUp**: tunnel open and forwarding, settle interval elapsed.
//! - **Connected**: store connection established through the tunnel.
//! - **Copying**: writing snapshot entries; the first failed write
//!   abandons the rest of the copy for this recipient. Keys already
//!   written stay written; there is no rollback.
//! - **Succeeded** / **Failed**: terminal. Either way the tunnel and the
//!   store connection are released, and the task completes exactly once.
//!
//! A failure is recorded in the shared [`FailureLog`] and never
//! propagates past the task boundary; other recipients are unaffected.

use crate::failure::FailureLog;
use crate::metrics;
use crate::recipient::Recipient;
use crate::snapshot::Snapshot;
use crate::store::StoreConnector;
use crate::tunnel::TunnelFactory;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Settle interval between starting the tunnel and connecting through it.
///
/// The tunnel exposes no readiness signal; the forward loop is assumed to
/// be accepting after this fixed grace period.
pub const TUNNEL_SETTLE: Duration = Duration::from_millis(100);

/// State of a replication task.
///
/// See module docs for the transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Forming the tunnel identity for the resolved recipient.
    Resolving,
    /// Tunnel open and forwarding.
    TunnelUp,
    /// Store connection established through the tunnel.
    Connected,
    /// Writing snapshot entries to the recipient.
    Copying,
    /// All hashes fully written.
    Succeeded,
    /// Terminal failure; a record was appended to the failure log.
    Failed,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Resolving => write!(f, "Resolving"),
            TaskState::TunnelUp => write!(f, "TunnelUp"),
            TaskState::Connected => write!(f, "Connected"),
            TaskState::Copying => write!(f, "Copying"),
            TaskState::Succeeded => write!(f, "Succeeded"),
            TaskState::Failed => write!(f, "Failed"),
        }
    }
}

/// Everything one task needs, assembled by the orchestrator per run.
///
/// Holds only shared read-only state (snapshot, collaborators, identity
/// parts) and the write-only failure sink.
#[derive(Clone)]
pub struct TaskContext {
    pub snapshot: Arc<Snapshot>,
    pub failures: Arc<FailureLog>,
    pub stores: Arc<dyn StoreConnector>,
    pub tunnels: Arc<dyn TunnelFactory>,
    pub ssh_username: String,
    pub recipient_domain: String,
}

/// Replicate the snapshot to one recipient; returns the terminal state.
pub async fn replicate(ctx: TaskContext, recipient: Recipient) -> TaskState {
    let state = TaskState::Resolving;
    let fqdn = recipient.fqdn(&ctx.recipient_domain);
    let identity = format!("{}@{}", ctx.ssh_username, fqdn);
    let target = format!("127.0.0.1:{}", recipient.port);
    debug!(recipient = %fqdn, state = %state, "starting replication task");

    let mut tunnel = match ctx.tunnels.open(identity, target).await {
        Ok(tunnel) => tunnel,
        Err(e) => {
            error!(recipient = %fqdn, error = %e, "tunnel failed");
            metrics::record_tunnel_open(&recipient.host, false);
            return fail(&ctx, &recipient);
        }
    };
    tunnel.start();
    metrics::record_tunnel_open(&recipient.host, true);
    let state = TaskState::TunnelUp;
    debug!(recipient = %fqdn, local_port = tunnel.local_port(), state = %state, "tunnel forwarding");
    tokio::time::sleep(TUNNEL_SETTLE).await;

    let local_addr = format!("127.0.0.1:{}", tunnel.local_port());
    let mut store = match ctx.stores.connect(local_addr, recipient.db).await {
        Ok(store) => store,
        Err(e) => {
            error!(recipient = %fqdn, error = %e, "connect through tunnel failed");
            tunnel.stop();
            return fail(&ctx, &recipient);
        }
    };
    let state = TaskState::Connected;
    debug!(recipient = %fqdn, db = recipient.db, state = %state, "store connected");

    let state = TaskState::Copying;
    info!(recipient = %fqdn, state = %state, "copying data");
    let mut copied = 0usize;
    for (hash, entries) in ctx.snapshot.iter() {
        debug!(recipient = %fqdn, hash = %hash, "copying hash");
        for entry in entries {
            if let Err(e) = store.set(hash, &entry.key, &entry.value).await {
                error!(recipient = %fqdn, hash = %hash, error = %e, "write failed");
                metrics::record_entries_copied(&recipient.host, copied);
                tunnel.stop();
                return fail(&ctx, &recipient);
            }
            copied += 1;
        }
    }
    metrics::record_entries_copied(&recipient.host, copied);
    tunnel.stop();
    info!(recipient = %fqdn, entries = copied, "copying data succeeded");
    metrics::record_recipient_result(&recipient.host, true);
    TaskState::Succeeded
}

fn fail(ctx: &TaskContext, recipient: &Recipient) -> TaskState {
    ctx.failures.record(recipient.host.clone());
    metrics::record_recipient_result(&recipient.host, false);
    TaskState::Failed
}
