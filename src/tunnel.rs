// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-recipient SSH tunnel lifecycle.
//!
//! Each replication task reaches its recipient's store through a
//! dedicated tunnel: an SSH session to the recipient host, forwarding a
//! local loopback listener to `127.0.0.1:<store port>` on the far side.
//!
//! # Lifecycle
//!
//! ```text
//! open() ──→ start() ──→ (settle) ──→ connect through local_port()
//!                                          │
//!                    stop() / Drop ←───────┘
//! ```
//!
//! - [`TunnelFactory::open()`] dials the host, authenticates with agent
//!   identities, and binds the local listener on an ephemeral port.
//! - [`TunnelHandle::start()`] spawns the forwarding accept loop and
//!   returns immediately; the loop runs until explicitly stopped.
//! - There is no readiness signal: callers wait a fixed settle interval
//!   before connecting (see [`crate::task::TUNNEL_SETTLE`]).
//! - [`TunnelHandle::stop()`] aborts the forward task; `Drop` does the
//!   same, so the tunnel is released on every task exit path.
//!
//! Credentials come from the SSH agent socket. The factory verifies the
//! agent is reachable and non-empty at construction; that check failing
//! aborts the run before any fan-out.

use crate::error::{ReplicationError, Result};
use crate::store::BoxFuture;
use async_trait::async_trait;
use russh::client;
use russh_keys::agent::client::AgentClient;
use russh_keys::key;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, warn};

/// Standard SSH port on recipient hosts.
const SSH_PORT: u16 = 22;

/// Opens tunnels to recipient hosts.
pub trait TunnelFactory: Send + Sync + 'static {
    /// Open a tunnel for `identity` (`user@host`) forwarding a local
    /// loopback port to `remote_target` (`host:port` as seen from the
    /// recipient host).
    fn open(&self, identity: String, remote_target: String) -> BoxFuture<'_, Box<dyn TunnelHandle>>;
}

/// One established tunnel.
pub trait TunnelHandle: Send {
    /// Local loopback port the remote service is reachable through.
    fn local_port(&self) -> u16;

    /// Begin forwarding. Non-blocking; runs until stopped.
    fn start(&mut self);

    /// Tear the tunnel down. Idempotent; also invoked by `Drop`.
    fn stop(&mut self);
}

/// SSH tunnel factory authenticating via the agent socket.
#[derive(Debug)]
pub struct SshTunnelFactory {
    agent_socket: PathBuf,
}

impl SshTunnelFactory {
    /// Create a factory after verifying the agent socket is usable.
    ///
    /// Fails with a fatal [`TunnelAuth`](ReplicationError::TunnelAuth)
    /// error when the socket cannot be dialed or holds no identities.
    pub async fn from_agent(socket: impl Into<PathBuf>) -> Result<Self> {
        let socket = socket.into();
        let mut agent = AgentClient::connect_uds(&socket).await.map_err(|e| {
            ReplicationError::TunnelAuth(format!(
                "can't connect to agent socket {}: {e}",
                socket.display()
            ))
        })?;
        let identities = agent.request_identities().await.map_err(|e| {
            ReplicationError::TunnelAuth(format!("agent identity listing failed: {e}"))
        })?;
        if identities.is_empty() {
            return Err(ReplicationError::TunnelAuth(
                "agent holds no identities".to_string(),
            ));
        }
        Ok(Self {
            agent_socket: socket,
        })
    }
}

impl TunnelFactory for SshTunnelFactory {
    fn open(&self, identity: String, remote_target: String) -> BoxFuture<'_, Box<dyn TunnelHandle>> {
        Box::pin(async move {
            let (user, host) = split_identity(&identity)?;
            let (target_host, target_port) = split_target(&host, &remote_target)?;

            let mut agent = AgentClient::connect_uds(&self.agent_socket)
                .await
                .map_err(|e| ReplicationError::tunnel(&host, format!("agent dial failed: {e}")))?;
            let identities = agent.request_identities().await.map_err(|e| {
                ReplicationError::tunnel(&host, format!("agent identity listing failed: {e}"))
            })?;

            let config = Arc::new(client::Config::default());
            let mut handle =
                client::connect(config, (host.as_str(), SSH_PORT), AcceptingHost)
                    .await
                    .map_err(|e| {
                        ReplicationError::tunnel(&host, format!("ssh connect failed: {e}"))
                    })?;

            let mut authenticated = false;
            for identity_key in identities {
                let (returned, auth) = handle
                    .authenticate_future(user.clone(), identity_key, agent)
                    .await;
                agent = returned;
                if matches!(auth, Ok(true)) {
                    authenticated = true;
                    break;
                }
            }
            if !authenticated {
                return Err(ReplicationError::tunnel(
                    &host,
                    "no agent identity accepted",
                ));
            }

            let listener = TcpListener::bind(("127.0.0.1", 0)).await.map_err(|e| {
                ReplicationError::tunnel(&host, format!("local listener bind failed: {e}"))
            })?;
            let local_port = listener
                .local_addr()
                .map_err(|e| ReplicationError::tunnel(&host, e.to_string()))?
                .port();

            debug!(recipient = %host, local_port, "tunnel established");
            Ok(Box::new(SshTunnel {
                recipient: host,
                local_port,
                parts: Some(ForwardParts {
                    handle,
                    listener,
                    target_host,
                    target_port,
                }),
                forward: None,
            }) as Box<dyn TunnelHandle>)
        })
    }
}

/// Client handler for fleet hosts.
///
/// Host keys are not pinned; fleet hosts are rebuilt and re-keyed
/// routinely, and the agent-held identity is the trust anchor here.
struct AcceptingHost;

#[async_trait]
impl client::Handler for AcceptingHost {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

struct ForwardParts {
    handle: client::Handle<AcceptingHost>,
    listener: TcpListener,
    target_host: String,
    target_port: u16,
}

/// An established SSH tunnel with an idle or running forward loop.
struct SshTunnel {
    recipient: String,
    local_port: u16,
    parts: Option<ForwardParts>,
    forward: Option<tokio::task::JoinHandle<()>>,
}

impl TunnelHandle for SshTunnel {
    fn local_port(&self) -> u16 {
        self.local_port
    }

    fn start(&mut self) {
        if let Some(parts) = self.parts.take() {
            let recipient = self.recipient.clone();
            self.forward = Some(tokio::spawn(run_forward(recipient, parts)));
        }
    }

    fn stop(&mut self) {
        self.parts = None;
        if let Some(task) = self.forward.take() {
            task.abort();
            debug!(recipient = %self.recipient, "tunnel stopped");
        }
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Accept loop: each local connection gets its own direct-tcpip channel.
async fn run_forward(recipient: String, parts: ForwardParts) {
    let ForwardParts {
        handle,
        listener,
        target_host,
        target_port,
    } = parts;
    loop {
        let (mut inbound, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "tunnel accept failed");
                break;
            }
        };
        match handle
            .channel_open_direct_tcpip(
                target_host.clone(),
                u32::from(target_port),
                "127.0.0.1".to_string(),
                0,
            )
            .await
        {
            Ok(channel) => {
                tokio::spawn(async move {
                    let mut stream = channel.into_stream();
                    let _ = forward_streams(&mut inbound, &mut stream).await;
                });
            }
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "direct-tcpip channel failed");
            }
        }
    }
}

async fn forward_streams<A, B>(a: &mut A, b: &mut B) -> std::io::Result<()>
where
    A: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    B: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    tokio::io::copy_bidirectional(a, b).await.map(|_| ())
}

fn split_identity(identity: &str) -> Result<(String, String)> {
    match identity.split_once('@') {
        Some((user, host)) if !user.is_empty() && !host.is_empty() => {
            Ok((user.to_string(), host.to_string()))
        }
        _ => Err(ReplicationError::tunnel(
            identity,
            "identity must be user@host",
        )),
    }
}

fn split_target(recipient: &str, target: &str) -> Result<(String, u16)> {
    let (host, port) = target.rsplit_once(':').ok_or_else(|| {
        ReplicationError::tunnel(recipient, format!("target must be host:port, got {target}"))
    })?;
    let port = port.parse::<u16>().map_err(|_| {
        ReplicationError::tunnel(recipient, format!("invalid target port: {port}"))
    })?;
    Ok((host.to_string(), port))
}
