// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Shared fixtures: a scripted block-check API, a store with injectable
//! failures, and request helpers for driving the router.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use blockcheck::{
    checker::{BlockLookup, LookupError, LookupResponse},
    config::Config,
    handlers::AppState,
    router,
    store::{RateLimitEntry, Stats, StatsDelta, Store, StoreError, StoreResult, SurrealStore},
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Domains starting with `bad` are blocked, domains starting with `missing`
/// are left out of the response, everything else is reachable.
pub struct ScriptedLookup {
    pub failing: bool,
}

#[async_trait]
impl BlockLookup for ScriptedLookup {
    async fn lookup(&self, domains: &[String]) -> Result<LookupResponse, LookupError> {
        if self.failing {
            return Err(LookupError::MalformedBody);
        }

        Ok(domains
            .iter()
            .filter(|d| !d.starts_with("missing"))
            .map(|d| (d.clone(), json!({ "blocked": d.starts_with("bad") })))
            .collect())
    }
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("connection reset".to_string())
}

/// In-memory store whose operations can be made to fail.
pub struct FlakyStore {
    pub inner: SurrealStore,
    /// Fail schema setup and stats reads (hard dependencies)
    pub fail_hard: bool,
    /// Fail stats increments and rate-limit operations (soft dependencies)
    pub fail_soft: bool,
}

impl FlakyStore {
    pub async fn new(fail_hard: bool, fail_soft: bool) -> Self {
        Self {
            inner: SurrealStore::memory().await.unwrap(),
            fail_hard,
            fail_soft,
        }
    }

    fn soft(&self) -> StoreResult<()> {
        if self.fail_soft {
            Err(unavailable())
        } else {
            Ok(())
        }
    }

    fn hard(&self) -> StoreResult<()> {
        if self.fail_hard {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn ensure_schema(&self) -> StoreResult<()> {
        self.hard()?;
        self.inner.ensure_schema().await
    }

    async fn read_stats(&self) -> StoreResult<Stats> {
        self.hard()?;
        self.inner.read_stats().await
    }

    async fn apply_stats_delta(&self, delta: &StatsDelta) -> StoreResult<()> {
        self.soft()?;
        self.inner.apply_stats_delta(delta).await
    }

    async fn add_unique_user(&self, client_id: &str) -> StoreResult<()> {
        self.soft()?;
        self.inner.add_unique_user(client_id).await
    }

    async fn read_rate_limit(&self, client_id: &str) -> StoreResult<Option<RateLimitEntry>> {
        self.soft()?;
        self.inner.read_rate_limit(client_id).await
    }

    async fn write_rate_limit(
        &self,
        client_id: &str,
        count: u32,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.soft()?;
        self.inner.write_rate_limit(client_id, count, timestamp).await
    }

    async fn add_rate_limit_usage(
        &self,
        client_id: &str,
        amount: u32,
        now: DateTime<Utc>,
        window: Duration,
    ) -> StoreResult<RateLimitEntry> {
        self.soft()?;
        self.inner
            .add_rate_limit_usage(client_id, amount, now, window)
            .await
    }

    async fn purge_expired_rate_limits(&self, threshold: DateTime<Utc>) -> StoreResult<()> {
        self.soft()?;
        self.inner.purge_expired_rate_limits(threshold).await
    }
}

pub fn test_config(max_domains: u32) -> Config {
    let mut config = Config::default();
    config.rate_limit.max_domains = max_domains;
    config
}

pub fn app_with(config: Config, store: Arc<dyn Store>, lookup: ScriptedLookup) -> Router {
    let state = AppState::new(config, store, Arc::new(lookup)).unwrap();
    router(Arc::new(state))
}

pub async fn app(max_domains: u32) -> Router {
    app_with(
        test_config(max_domains),
        Arc::new(SurrealStore::memory().await.unwrap()),
        ScriptedLookup { failing: false },
    )
}

pub fn domains(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("site{i}.example")).collect()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub async fn post_check(app: &Router, client: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/check")
        .header("content-type", "application/json");
    if let Some(client) = client {
        request = request.header("cf-connecting-ip", client);
    }

    send(app, request.body(Body::from(body.to_string())).unwrap()).await
}

pub async fn post_raw(app: &Router, body: &'static str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/check")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    send(app, request).await
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}
