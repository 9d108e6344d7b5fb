//! Binary entry point.
//!
//! Loads configuration from the environment (with `.env` pickup for
//! local runs), wires the production collaborators, runs one replication
//! pass, and maps the result to the process exit status: non-zero only
//! when `EXIT_IF_ERROR` is set and the run accumulated failures.

use refclone::{Config, HttpWebhook, Orchestrator, RedisConnector, SshTunnelFactory};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // The debug flag only widens the filter; RUST_LOG still wins.
    let debug = matches!(
        std::env::var("DEBUG").as_deref().map(str::trim),
        Ok("true") | Ok("1")
    );
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "reference hash replicator starting"
    );

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "config init");
            std::process::exit(1);
        }
    };

    let tunnels = match SshTunnelFactory::from_agent(&config.ssh_auth_socket).await {
        Ok(factory) => Arc::new(factory),
        Err(e) => {
            error!(error = %e, "ssh agent init");
            std::process::exit(1);
        }
    };

    let exit_if_error = config.exit_if_error;
    let orchestrator =
        Orchestrator::new(config, Arc::new(RedisConnector), tunnels, HttpWebhook::new());

    match orchestrator.run().await {
        Ok(result) => {
            if exit_if_error && result.has_failures() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!(error = %e, "replication run aborted");
            std::process::exit(1);
        }
    }
}
