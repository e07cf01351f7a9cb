// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Domain Block Checker Service
//!
//! Checks domains against an external censorship-detection API with a
//! per-client quota and global usage statistics.
//!
//! ## Configuration
//!
//! Configuration is loaded from `blockcheck.toml` (or the file named by
//! `BLOCKCHECK_CONFIG`) and `BLOCKCHECK__*` environment variables:
//!
//! - `BLOCKCHECK__BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `BLOCKCHECK__CHECKER__ENDPOINT`: Block-check API endpoint
//! - `BLOCKCHECK__RATE_LIMIT__MAX_DOMAINS`: Domains per client per window (default: 1000)
//! - `BLOCKCHECK__RATE_LIMIT__WINDOW_MINUTES`: Window length (default: 10)
//! - `BLOCKCHECK__STORE__ENDPOINT`: SurrealDB endpoint (default: mem://)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blockcheck::{
    config::Config,
    handlers::AppState,
    router,
    store::SurrealStore,
    HttpBlockLookup,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::load()?;
    info!(
        bind_addr = %config.bind_addr,
        max_domains = config.rate_limit.max_domains,
        window_minutes = config.rate_limit.window_minutes,
        checker_endpoint = %config.checker.endpoint,
        store_endpoint = %config.store.endpoint,
        "Starting block checker"
    );

    let store = Arc::new(SurrealStore::connect(&config.store).await?);
    info!("Connected to SurrealDB");

    let lookup = Arc::new(HttpBlockLookup::new(
        config.checker.endpoint.clone(),
        config.checker.timeout(),
    )?);

    let state = Arc::new(AppState::new(config.clone(), store, lookup)?);

    // Spawn cleanup task
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_state.limiter.config().sweep_interval());
        loop {
            interval.tick().await;
            cleanup_state.limiter.cleanup().await;
        }
    });

    let app = router(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
