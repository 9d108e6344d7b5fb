// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Testcontainers setup for Redis.
//!
//! Provides helpers to spin up Redis containers for integration tests.

use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

/// Create a vanilla Redis container.
///
/// Uses official redis:7 image. Waits for "Ready to accept connections".
pub fn redis_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    docker.run(image)
}

/// Get the `host:port` address for a container.
pub fn redis_addr(container: &Container<'_, GenericImage>) -> String {
    let port = container.get_host_port_ipv4(6379);
    format!("127.0.0.1:{port}")
}

/// Seed a hash on a Redis instance.
pub async fn seed_hash(
    addr: &str,
    hash: &str,
    entries: &[(&str, &str)],
) -> redis::RedisResult<()> {
    let client = redis::Client::open(format!("redis://{addr}/0"))?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    for (key, value) in entries {
        redis::cmd("HSET")
            .arg(hash)
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await?;
    }
    Ok(())
}

/// Read a whole hash from a Redis instance.
pub async fn read_hash(
    addr: &str,
    hash: &str,
) -> redis::RedisResult<std::collections::BTreeMap<String, String>> {
    let client = redis::Client::open(format!("redis://{addr}/0"))?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    redis::cmd("HGETALL").arg(hash).query_async(&mut conn).await
}
