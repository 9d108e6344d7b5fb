// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication orchestrator.
//!
//! Ties the run together:
//! 1. Connect to the source store and build the [`Snapshot`] (fatal on
//!    any error — fan-out never starts from an incomplete data set).
//! 2. Resolve each raw recipient descriptor; malformed descriptors are
//!    logged and skipped without counting as replication failures.
//! 3. Spawn one [`task::replicate`] per resolved recipient, unbounded —
//!    every recipient gets its own tokio task and its own tunnel.
//! 4. Join barrier: wait for every spawned task, no timeout, no partial
//!    join.
//! 5. If anything failed, deliver one failure report. A failed delivery
//!    is counted but never escalated.
//!
//! The returned [`RunResult`] carries the aggregate outcome; the binary
//! maps it to the process exit status.

use crate::config::Config;
use crate::error::Result;
use crate::failure::{FailureLog, RunResult};
use crate::notify::{FailureNotifier, NotifyTransport};
use crate::recipient::Recipient;
use crate::snapshot;
use crate::store::StoreConnector;
use crate::task::{self, TaskContext};
use crate::tunnel::TunnelFactory;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drives one full replication run.
pub struct Orchestrator<S, T, N>
where
    S: StoreConnector,
    T: TunnelFactory,
    N: NotifyTransport,
{
    config: Config,
    stores: Arc<S>,
    tunnels: Arc<T>,
    notifier: FailureNotifier<N>,
}

impl<S, T, N> Orchestrator<S, T, N>
where
    S: StoreConnector,
    T: TunnelFactory,
    N: NotifyTransport,
{
    pub fn new(config: Config, stores: Arc<S>, tunnels: Arc<T>, transport: N) -> Self {
        let notifier = FailureNotifier::new(
            transport,
            config.slack_hook_url.clone(),
            config.build_url.clone(),
        );
        Self {
            config,
            stores,
            tunnels,
            notifier,
        }
    }

    /// Run a full copy of every configured hash to every recipient.
    ///
    /// Returns `Err` only for fatal pre-fan-out errors; per-recipient
    /// failures land in the returned [`RunResult`].
    pub async fn run(&self) -> Result<RunResult> {
        let mut source = self
            .stores
            .connect(self.config.source_addr(), self.config.source_db)
            .await?;
        let fetched = snapshot::fetch(source.as_mut(), &self.config.hashes).await?;
        drop(source);
        let snapshot = Arc::new(fetched);

        let failures = Arc::new(FailureLog::new());
        let mut handles = Vec::with_capacity(self.config.recipients.len());
        for raw in &self.config.recipients {
            let recipient = match Recipient::parse(
                raw,
                self.config.recipient_port,
                self.config.recipient_db,
            ) {
                Ok(recipient) => recipient,
                Err(e) => {
                    warn!(recipient = %raw.trim(), error = %e, "skipping malformed recipient");
                    continue;
                }
            };
            debug!(
                recipient = %recipient.host,
                port = recipient.port,
                db = recipient.db,
                "launching replication task"
            );
            let ctx = TaskContext {
                snapshot: Arc::clone(&snapshot),
                failures: Arc::clone(&failures),
                stores: Arc::clone(&self.stores) as Arc<dyn StoreConnector>,
                tunnels: Arc::clone(&self.tunnels) as Arc<dyn TunnelFactory>,
                ssh_username: self.config.ssh_username.clone(),
                recipient_domain: self.config.recipient_domain.clone(),
            };
            handles.push(tokio::spawn(task::replicate(ctx, recipient)));
        }

        let total_recipients = handles.len();
        info!(recipients = total_recipients, "waiting for replication tasks");
        for joined in join_all(handles).await {
            if let Err(e) = joined {
                // A panicked task already lost its chance to record;
                // surface it loudly rather than silently under-counting.
                error!(error = %e, "replication task aborted");
            }
        }

        let records = failures.snapshot();
        if !records.is_empty() {
            debug!(failed = records.len(), "sending failure notification");
            if let Err(e) = self.notifier.send(&records).await {
                error!(error = %e, "failure notification not delivered");
                failures.bump();
            }
        }

        let result = RunResult {
            total_recipients,
            failed_count: failures.count(),
            records,
        };
        if result.has_failures() {
            warn!(
                failed = result.failed_count,
                total = result.total_recipients,
                "run finished with failures"
            );
        } else {
            info!(total = result.total_recipients, "run finished cleanly");
        }
        Ok(result)
    }
}
