// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Key-value store collaborator traits and the Redis implementation.
//!
//! The replicator talks to two kinds of store through the same seam: the
//! authoritative source (read) and each recipient (write, through a
//! tunnel). [`StoreConnector`] opens a connection to an address;
//! [`StoreHandle`] is the connected store. The traits keep the
//! orchestrator and tasks testable with recording mocks.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> refclone::Result<()> {
//! use refclone::store::{RedisConnector, StoreConnector};
//!
//! let connector = RedisConnector;
//! let mut handle = connector.connect("127.0.0.1:6379".to_string(), 0).await?;
//! if handle.collection_exists("refs:countries").await? {
//!     let keys = handle.collection_keys("refs:countries").await?;
//!     println!("{} keys", keys.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Connection teardown is `Drop`: the multiplexed manager closes its
//! socket when the handle goes out of scope, so each task releases its
//! connection on every exit path without an explicit close.

use crate::error::{ReplicationError, Result};
use redis::aio::ConnectionManager;
use std::future::Future;
use std::pin::Pin;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Opens connections to stores by address.
///
/// One connector serves the whole run: the orchestrator connects it to the
/// source once, and every task connects it to a recipient's local tunnel
/// endpoint.
pub trait StoreConnector: Send + Sync + 'static {
    /// Connect to `addr` (`host:port`) and select database `db`.
    fn connect(&self, addr: String, db: u32) -> BoxFuture<'_, Box<dyn StoreHandle>>;
}

/// A connected store.
///
/// Methods mirror the operations the replicator needs: existence check,
/// key enumeration, field read, field write.
pub trait StoreHandle: Send {
    /// Whether the named hash exists.
    fn collection_exists(&mut self, collection: &str) -> BoxFuture<'_, bool>;

    /// All field names of the named hash.
    fn collection_keys(&mut self, collection: &str) -> BoxFuture<'_, Vec<String>>;

    /// Read one field of the named hash.
    fn get(&mut self, collection: &str, key: &str) -> BoxFuture<'_, String>;

    /// Write one field of the named hash (unconditional overwrite).
    fn set(&mut self, collection: &str, key: &str, value: &str) -> BoxFuture<'_, ()>;
}

/// Redis-backed [`StoreConnector`].
///
/// Uses `redis::aio::ConnectionManager` internally, which provides a
/// multiplexed connection over a single TCP socket. The database index is
/// selected through the connection URL.
pub struct RedisConnector;

impl StoreConnector for RedisConnector {
    fn connect(&self, addr: String, db: u32) -> BoxFuture<'_, Box<dyn StoreHandle>> {
        Box::pin(async move {
            let url = format!("redis://{addr}/{db}");
            let client = redis::Client::open(url.as_str())
                .map_err(|e| ReplicationError::store("CONNECT", e))?;
            let conn = client
                .get_connection_manager()
                .await
                .map_err(|e| ReplicationError::store("CONNECT", e))?;
            Ok(Box::new(RedisHandle { conn }) as Box<dyn StoreHandle>)
        })
    }
}

/// A connected Redis store.
pub struct RedisHandle {
    conn: ConnectionManager,
}

impl StoreHandle for RedisHandle {
    fn collection_exists(&mut self, collection: &str) -> BoxFuture<'_, bool> {
        let collection = collection.to_string();
        Box::pin(async move {
            let exists: i64 = redis::cmd("EXISTS")
                .arg(&collection)
                .query_async(&mut self.conn)
                .await
                .map_err(|e| ReplicationError::store("EXISTS", e))?;
            Ok(exists == 1)
        })
    }

    fn collection_keys(&mut self, collection: &str) -> BoxFuture<'_, Vec<String>> {
        let collection = collection.to_string();
        Box::pin(async move {
            redis::cmd("HKEYS")
                .arg(&collection)
                .query_async(&mut self.conn)
                .await
                .map_err(|e| ReplicationError::store("HKEYS", e))
        })
    }

    fn get(&mut self, collection: &str, key: &str) -> BoxFuture<'_, String> {
        let collection = collection.to_string();
        let key = key.to_string();
        Box::pin(async move {
            // A field deleted between HKEYS and HGET reads as empty,
            // same as the nil reply the source would hand any client.
            let value: Option<String> = redis::cmd("HGET")
                .arg(&collection)
                .arg(&key)
                .query_async(&mut self.conn)
                .await
                .map_err(|e| ReplicationError::store("HGET", e))?;
            Ok(value.unwrap_or_default())
        })
    }

    fn set(&mut self, collection: &str, key: &str, value: &str) -> BoxFuture<'_, ()> {
        let collection = collection.to_string();
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move {
            redis::cmd("HSET")
                .arg(&collection)
                .arg(&key)
                .arg(&value)
                .query_async::<_, ()>(&mut self.conn)
                .await
                .map_err(|e| ReplicationError::store("HSET", e))?;
            Ok(())
        })
    }
}
