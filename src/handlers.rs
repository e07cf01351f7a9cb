// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the block-check service.
//!
//! Handlers keep no state of their own between requests; everything shared
//! across requests goes through the store.

use crate::checker::{BatchChecker, BlockLookup, DomainCheckResult};
use crate::config::Config;
use crate::error::{AppError, Result, StatusResponse};
use crate::limiter::RateLimiter;
use crate::metrics::{Metrics, RequestOutcome};
use crate::stats::{CheckOutcome, StatsAggregator, StatsSnapshot};
use crate::store::Store;
use crate::validator::{CheckRequestValidator, ValidationError};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Client identifier used when the IP header is missing.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Shared application state.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub limiter: RateLimiter,
    pub stats: StatsAggregator,
    pub checker: BatchChecker,
    pub validator: CheckRequestValidator,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        lookup: Arc<dyn BlockLookup>,
    ) -> prometheus::Result<Self> {
        Ok(Self {
            limiter: RateLimiter::new(config.rate_limit.clone(), store.clone()),
            stats: StatsAggregator::new(store.clone()),
            checker: BatchChecker::new(lookup, config.checker.batch_size),
            validator: CheckRequestValidator::new(config.checker.max_domains_per_request),
            metrics: Metrics::new()?,
            store,
            config,
        })
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Successful check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub results: Vec<DomainCheckResult>,
    pub remaining: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub reset_time: DateTime<Utc>,
}

/// Rate limited response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedResponse {
    pub error: String,
    pub remaining: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub reset_time: DateTime<Utc>,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "blockcheck",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Extract the client identifier from the configured header.
pub fn client_id(headers: &HeaderMap, header_name: &str) -> String {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Check a list of domains against the block-check API.
pub async fn check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Response> {
    let validated = body
        .map_err(|rejection| {
            debug!(error = %rejection, "Rejected check body");
            ValidationError::InvalidBody
        })
        .and_then(|Json(body)| state.validator.validate(&body));

    let domains = match validated {
        Ok(domains) => domains,
        Err(err) => {
            state.metrics.observe_request(RequestOutcome::Invalid);
            return Err(err.into());
        }
    };

    let client = client_id(&headers, &state.config.client_ip_header);
    debug!(client = %client, count = domains.len(), "Processing check request");

    state.store.ensure_schema().await?;
    state.stats.record_request().await;

    let requested = u32::try_from(domains.len()).unwrap_or(u32::MAX);
    let decision = state.limiter.check_and_consume(&client, requested).await;

    if !decision.allowed {
        state.metrics.observe_request(RequestOutcome::RateLimited);
        let window = state.limiter.config();
        info!(
            client = %client,
            requested,
            remaining = decision.remaining,
            "Request rate limited"
        );
        return Ok((
            StatusCode::TOO_MANY_REQUESTS,
            Json(RateLimitedResponse {
                error: format!(
                    "Rate limit exceeded. You can check up to {} domains every {} minutes.",
                    window.max_domains, window.window_minutes
                ),
                remaining: decision.remaining,
                reset_time: decision.reset_time,
            }),
        )
            .into_response());
    }

    let results = state.checker.check_domains(&domains).await;
    let outcome = CheckOutcome::from_results(&results);

    state.stats.record_check_outcome(outcome).await;
    state.stats.record_unique_user(&client).await;
    state.metrics.observe_request(RequestOutcome::Allowed);
    state.metrics.observe_outcome(&outcome);

    debug!(
        client = %client,
        blocked = outcome.blocked,
        errors = outcome.errors,
        remaining = decision.remaining,
        "Check completed"
    );

    Ok(Json(CheckResponse {
        results,
        remaining: decision.remaining,
        reset_time: decision.reset_time,
    })
    .into_response())
}

/// Aggregate usage statistics.
pub async fn stats_data(State(state): State<Arc<AppState>>) -> Result<Json<StatsSnapshot>> {
    state.store.ensure_schema().await?;
    Ok(Json(state.stats.snapshot().await?))
}

/// Prometheus exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response> {
    let body = state.metrics.render().map_err(AppError::from)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Fallback for unmatched routes.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(StatusResponse::new(StatusCode::NOT_FOUND)),
    )
}
