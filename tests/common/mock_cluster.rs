//! Mock collaborators for fan-out tests.
//!
//! [`MockCluster`] is a shared in-memory data plane standing in for the
//! whole fleet: the source store, every recipient store, and the routing
//! a tunnel would provide. The connector, tunnel factory, and webhook
//! mocks all record their calls for assertions, and failures can be
//! injected per recipient host.

use refclone::error::ReplicationError;
use refclone::notify::NotifyTransport;
use refclone::store::{BoxFuture, StoreConnector, StoreHandle};
use refclone::tunnel::{TunnelFactory, TunnelHandle};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared in-memory fleet: one source, N recipient stores, tunnel routes.
#[derive(Default)]
pub struct MockCluster {
    /// Source data: hash name -> ordered entries.
    source: Mutex<Vec<(String, Vec<(String, String)>)>>,
    /// Recipient stores keyed by fully-qualified host name.
    recipients: Mutex<HashMap<String, BTreeMap<String, BTreeMap<String, String>>>>,
    /// Local tunnel endpoints: `127.0.0.1:<port>` -> fqdn.
    routes: Mutex<HashMap<String, String>>,
    /// Hosts (fqdn) whose store writes fail.
    failing_writes: Mutex<HashSet<String>>,
    /// Hosts (fqdn) whose store connect fails.
    failing_connects: Mutex<HashSet<String>>,
    /// Per-host artificial write delay, to exercise the join barrier.
    write_delays: Mutex<HashMap<String, Duration>>,
    /// When false, connecting to the source fails.
    source_reachable: AtomicBool,
    /// Tunnels currently open (opened minus stopped).
    active_tunnels: AtomicIsize,
}

impl MockCluster {
    pub const SOURCE_ADDR: &'static str = "127.0.0.1:6379";

    pub fn new() -> Arc<Self> {
        let cluster = Self {
            source_reachable: AtomicBool::new(true),
            ..Self::default()
        };
        Arc::new(cluster)
    }

    /// Seed one source hash with ordered entries.
    pub fn seed_hash(&self, name: &str, entries: &[(&str, &str)]) {
        self.source.lock().unwrap().push((
            name.to_string(),
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
    }

    pub fn set_source_unreachable(&self) {
        self.source_reachable.store(false, Ordering::SeqCst);
    }

    pub fn fail_writes_for(&self, fqdn: &str) {
        self.failing_writes.lock().unwrap().insert(fqdn.to_string());
    }

    pub fn fail_connect_for(&self, fqdn: &str) {
        self.failing_connects
            .lock()
            .unwrap()
            .insert(fqdn.to_string());
    }

    pub fn delay_writes_for(&self, fqdn: &str, delay: Duration) {
        self.write_delays
            .lock()
            .unwrap()
            .insert(fqdn.to_string(), delay);
    }

    /// Full contents of one recipient store.
    pub fn recipient_state(&self, fqdn: &str) -> BTreeMap<String, BTreeMap<String, String>> {
        self.recipients
            .lock()
            .unwrap()
            .get(fqdn)
            .cloned()
            .unwrap_or_default()
    }

    /// Tunnels opened but not yet stopped.
    pub fn active_tunnels(&self) -> isize {
        self.active_tunnels.load(Ordering::SeqCst)
    }

    fn route(&self, addr: &str) -> Option<String> {
        self.routes.lock().unwrap().get(addr).cloned()
    }
}

// =============================================================================
// Store mocks
// =============================================================================

/// Connector routing source and tunneled recipient addresses onto the
/// shared cluster.
pub struct MockConnector {
    cluster: Arc<MockCluster>,
    pub connect_count: AtomicUsize,
}

impl MockConnector {
    pub fn new(cluster: Arc<MockCluster>) -> Self {
        Self {
            cluster,
            connect_count: AtomicUsize::new(0),
        }
    }
}

impl StoreConnector for MockConnector {
    fn connect(&self, addr: String, _db: u32) -> BoxFuture<'_, Box<dyn StoreHandle>> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if addr == MockCluster::SOURCE_ADDR {
                if !self.cluster.source_reachable.load(Ordering::SeqCst) {
                    return Err(ReplicationError::store_msg("CONNECT", "connection refused"));
                }
                return Ok(Box::new(SourceHandle {
                    cluster: Arc::clone(&self.cluster),
                }) as Box<dyn StoreHandle>);
            }
            let fqdn = self.cluster.route(&addr).ok_or_else(|| {
                ReplicationError::store_msg("CONNECT", format!("no tunnel route for {addr}"))
            })?;
            if self.cluster.failing_connects.lock().unwrap().contains(&fqdn) {
                return Err(ReplicationError::store_msg("CONNECT", "connection refused"));
            }
            Ok(Box::new(RecipientHandle {
                cluster: Arc::clone(&self.cluster),
                fqdn,
            }) as Box<dyn StoreHandle>)
        })
    }
}

/// Read-only handle over the seeded source data.
pub struct SourceHandle {
    cluster: Arc<MockCluster>,
}

impl StoreHandle for SourceHandle {
    fn collection_exists(&mut self, collection: &str) -> BoxFuture<'_, bool> {
        let collection = collection.to_string();
        Box::pin(async move {
            Ok(self
                .cluster
                .source
                .lock()
                .unwrap()
                .iter()
                .any(|(name, _)| *name == collection))
        })
    }

    fn collection_keys(&mut self, collection: &str) -> BoxFuture<'_, Vec<String>> {
        let collection = collection.to_string();
        Box::pin(async move {
            let source = self.cluster.source.lock().unwrap();
            let entries = source
                .iter()
                .find(|(name, _)| *name == collection)
                .map(|(_, entries)| entries.iter().map(|(k, _)| k.clone()).collect())
                .unwrap_or_default();
            Ok(entries)
        })
    }

    fn get(&mut self, collection: &str, key: &str) -> BoxFuture<'_, String> {
        let collection = collection.to_string();
        let key = key.to_string();
        Box::pin(async move {
            let source = self.cluster.source.lock().unwrap();
            let value = source
                .iter()
                .find(|(name, _)| *name == collection)
                .and_then(|(_, entries)| entries.iter().find(|(k, _)| *k == key))
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            Ok(value)
        })
    }

    fn set(&mut self, _collection: &str, _key: &str, _value: &str) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            Err(ReplicationError::store_msg(
                "HSET",
                "source store is read-only in tests",
            ))
        })
    }
}

/// Writable handle over one recipient store.
pub struct RecipientHandle {
    cluster: Arc<MockCluster>,
    fqdn: String,
}

impl StoreHandle for RecipientHandle {
    fn collection_exists(&mut self, collection: &str) -> BoxFuture<'_, bool> {
        let collection = collection.to_string();
        Box::pin(async move {
            Ok(self
                .cluster
                .recipient_state(&self.fqdn)
                .contains_key(&collection))
        })
    }

    fn collection_keys(&mut self, collection: &str) -> BoxFuture<'_, Vec<String>> {
        let collection = collection.to_string();
        Box::pin(async move {
            Ok(self
                .cluster
                .recipient_state(&self.fqdn)
                .get(&collection)
                .map(|entries| entries.keys().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn get(&mut self, collection: &str, key: &str) -> BoxFuture<'_, String> {
        let collection = collection.to_string();
        let key = key.to_string();
        Box::pin(async move {
            Ok(self
                .cluster
                .recipient_state(&self.fqdn)
                .get(&collection)
                .and_then(|entries| entries.get(&key).cloned())
                .unwrap_or_default())
        })
    }

    fn set(&mut self, collection: &str, key: &str, value: &str) -> BoxFuture<'_, ()> {
        let collection = collection.to_string();
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move {
            let delay = self
                .cluster
                .write_delays
                .lock()
                .unwrap()
                .get(&self.fqdn)
                .copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self
                .cluster
                .failing_writes
                .lock()
                .unwrap()
                .contains(&self.fqdn)
            {
                return Err(ReplicationError::store_msg("HSET", "injected write failure"));
            }
            self.cluster
                .recipients
                .lock()
                .unwrap()
                .entry(self.fqdn.clone())
                .or_default()
                .entry(collection)
                .or_default()
                .insert(key, value);
            Ok(())
        })
    }
}

// =============================================================================
// Tunnel mocks
// =============================================================================

/// Tunnel factory assigning fake local ports and registering routes on
/// the cluster.
pub struct MockTunnelFactory {
    cluster: Arc<MockCluster>,
    pub open_count: AtomicUsize,
    pub opened_identities: Mutex<Vec<String>>,
    failing_hosts: Mutex<HashSet<String>>,
    next_port: AtomicU16,
}

impl MockTunnelFactory {
    pub fn new(cluster: Arc<MockCluster>) -> Self {
        Self {
            cluster,
            open_count: AtomicUsize::new(0),
            opened_identities: Mutex::new(Vec::new()),
            failing_hosts: Mutex::new(HashSet::new()),
            next_port: AtomicU16::new(40000),
        }
    }

    /// Make tunnel establishment fail for one fqdn.
    pub fn fail_open_for(&self, fqdn: &str) {
        self.failing_hosts.lock().unwrap().insert(fqdn.to_string());
    }
}

impl TunnelFactory for MockTunnelFactory {
    fn open(&self, identity: String, _remote_target: String) -> BoxFuture<'_, Box<dyn TunnelHandle>> {
        Box::pin(async move {
            self.open_count.fetch_add(1, Ordering::SeqCst);
            self.opened_identities.lock().unwrap().push(identity.clone());
            let fqdn = identity
                .split_once('@')
                .map(|(_, host)| host.to_string())
                .unwrap_or(identity);
            if self.failing_hosts.lock().unwrap().contains(&fqdn) {
                return Err(ReplicationError::tunnel(&fqdn, "injected tunnel failure"));
            }
            let port = self.next_port.fetch_add(1, Ordering::SeqCst);
            self.cluster
                .routes
                .lock()
                .unwrap()
                .insert(format!("127.0.0.1:{port}"), fqdn);
            self.cluster.active_tunnels.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockTunnel {
                cluster: Arc::clone(&self.cluster),
                port,
                open: true,
            }) as Box<dyn TunnelHandle>)
        })
    }
}

pub struct MockTunnel {
    cluster: Arc<MockCluster>,
    port: u16,
    open: bool,
}

impl TunnelHandle for MockTunnel {
    fn local_port(&self) -> u16 {
        self.port
    }

    fn start(&mut self) {}

    fn stop(&mut self) {
        if self.open {
            self.open = false;
            self.cluster.active_tunnels.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockTunnel {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Webhook mock
// =============================================================================

#[derive(Default)]
struct WebhookState {
    posts: Mutex<Vec<(String, String)>>,
    response: Mutex<Option<String>>,
}

/// Records posted messages; response body is configurable.
///
/// Clones share state, so tests can keep a handle while the orchestrator
/// owns another.
#[derive(Clone, Default)]
pub struct MockWebhook {
    inner: Arc<WebhookState>,
}

impl MockWebhook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, body: &str) {
        *self.inner.response.lock().unwrap() = Some(body.to_string());
    }

    pub fn post_count(&self) -> usize {
        self.inner.posts.lock().unwrap().len()
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.inner.posts.lock().unwrap().clone()
    }
}

impl NotifyTransport for MockWebhook {
    fn post(&self, url: String, json_body: String) -> BoxFuture<'_, String> {
        self.inner.posts.lock().unwrap().push((url, json_body));
        let response = self
            .inner
            .response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "ok".to_string());
        Box::pin(async move { Ok(response) })
    }
}
