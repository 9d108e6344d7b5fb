//! Operator notification for aggregate failures.
//!
//! After the join barrier, accumulated recipient failures are formatted
//! into a single webhook message and delivered once. At most
//! [`MAX_LISTED`] failed hosts are named in the message body; the footer
//! summarizes `showing K of N`. Delivery failure is logged and counted
//! against the run, but never retried and never escalated to fatal.
//!
//! The webhook contract is strict: delivery counts as successful only if
//! the raw response body equals the literal string `ok`.

use crate::error::{ReplicationError, Result};
use crate::failure::FailureRecord;
use crate::metrics;
use crate::store::BoxFuture;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Most failed hosts named individually in one message.
pub const MAX_LISTED: usize = 4;

/// Delivery timeout for one webhook post.
const POST_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound notification channel.
///
/// Returns the raw response body; the caller decides what counts as a
/// successful delivery.
pub trait NotifyTransport: Send + Sync + 'static {
    fn post(&self, url: String, json_body: String) -> BoxFuture<'_, String>;
}

/// HTTP webhook transport.
pub struct HttpWebhook {
    client: reqwest::Client,
}

impl HttpWebhook {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(POST_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self { client }
    }
}

impl Default for HttpWebhook {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyTransport for HttpWebhook {
    fn post(&self, url: String, json_body: String) -> BoxFuture<'_, String> {
        Box::pin(async move {
            let response = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .body(json_body)
                .send()
                .await
                .map_err(|e| ReplicationError::Notify(e.to_string()))?;
            response
                .text()
                .await
                .map_err(|e| ReplicationError::Notify(e.to_string()))
        })
    }
}

#[derive(Debug, Serialize)]
struct WebhookMessage {
    attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
struct Attachment {
    color: String,
    title: String,
    title_link: String,
    text: String,
    footer: String,
}

/// Formats and delivers the aggregate failure report.
pub struct FailureNotifier<N: NotifyTransport> {
    transport: N,
    hook_url: String,
    build_url: String,
}

impl<N: NotifyTransport> FailureNotifier<N> {
    pub fn new(transport: N, hook_url: impl Into<String>, build_url: impl Into<String>) -> Self {
        Self {
            transport,
            hook_url: hook_url.into(),
            build_url: build_url.into(),
        }
    }

    /// Deliver one failure report for the given records.
    ///
    /// Succeeds only when the webhook responds with the literal `ok`.
    pub async fn send(&self, records: &[FailureRecord]) -> Result<()> {
        let body = serde_json::to_string(&build_message(&self.build_url, records))
            .map_err(|e| ReplicationError::Notify(e.to_string()))?;
        debug!(failed = records.len(), "delivering failure report");
        match self.transport.post(self.hook_url.clone(), body).await {
            Ok(response) if response == "ok" => {
                metrics::record_notification(true);
                Ok(())
            }
            Ok(response) => {
                metrics::record_notification(false);
                Err(ReplicationError::Notify(format!(
                    "response from webhook not ok: {response}"
                )))
            }
            Err(e) => {
                metrics::record_notification(false);
                Err(e)
            }
        }
    }
}

fn build_message(build_url: &str, records: &[FailureRecord]) -> WebhookMessage {
    let listed: Vec<&str> = records
        .iter()
        .take(MAX_LISTED)
        .map(|r| r.recipient.as_str())
        .collect();
    let text = format!(
        "Failed to copy configured hashes to:\n{}",
        listed.join(", ")
    );
    let footer = format!(
        "showing {} of {} failed recipients; the rest are in the run log",
        listed.len(),
        records.len()
    );
    WebhookMessage {
        attachments: vec![Attachment {
            color: "warning".to_string(),
            title: "Reference hash replication failed".to_string(),
            title_link: build_url.to_string(),
            text,
            footer,
        }],
    }
}
