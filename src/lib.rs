// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Domain Block Checker
//!
//! This crate checks lists of domains against an external censorship
//! detection API and keeps shared bookkeeping in a persistent store:
//!
//! - Per-client domain quota over a fixed window (fail-open on store errors)
//! - Global usage statistics updated with atomic increments
//! - Batched outbound lookups, 30 domains per request
//!
//! No cross-request state is held in process; every instance can be
//! recycled or run in parallel.

pub mod checker;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod stats;
pub mod store;
pub mod validator;

pub use crate::checker::{BatchChecker, BlockLookup, DomainCheckResult, HttpBlockLookup};
pub use crate::config::Config;
pub use crate::limiter::{RateLimitDecision, RateLimiter};
pub use crate::stats::StatsAggregator;
pub use crate::store::{Store, SurrealStore};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the service router.
pub fn router(state: Arc<handlers::AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::health))
        .route("/check", post(handlers::check))
        .route("/stats/data", get(handlers::stats_data));

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(handlers::metrics));
    }

    router
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
