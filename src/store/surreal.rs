// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! SurrealDB-backed store.

use super::{RateLimitEntry, Stats, StatsDelta, Store, StoreError, StoreResult};
use crate::config::StoreConfig;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use surrealdb::{
    engine::any::{self, Any},
    Surreal,
};
use tracing::debug;

// Redefining a table leaves its records and indexes in place.
const DEFINE_TABLES: &str = r#"
    DEFINE TABLE stats SCHEMALESS;
    DEFINE TABLE rate_limits SCHEMALESS;
"#;

// Redefining an index rebuilds it, so indexes are defined once per connection.
const DEFINE_INDEXES: &str = r#"
    DEFINE INDEX rate_limits_timestamp_idx ON rate_limits FIELDS timestamp;
"#;

// UPDATE on a record id creates it when missing; `??` keeps existing values.
const SEED_STATS: &str = r#"
    UPDATE stats:global SET
        total_requests = total_requests ?? 0,
        total_domains_checked = total_domains_checked ?? 0,
        blocked_domains = blocked_domains ?? 0,
        not_blocked_domains = not_blocked_domains ?? 0,
        error_domains = error_domains ?? 0,
        last_reset = last_reset ?? $now,
        unique_users = unique_users ?? [];
"#;

const SELECT_STATS: &str = r#"
    SELECT total_requests, total_domains_checked, blocked_domains,
        not_blocked_domains, error_domains, last_reset, unique_users
    FROM stats:global;
"#;

const INCREMENT_STATS: &str = r#"
    UPDATE stats:global SET
        total_requests += $total_requests,
        total_domains_checked += $total_domains_checked,
        blocked_domains += $blocked_domains,
        not_blocked_domains += $not_blocked_domains,
        error_domains += $error_domains;
"#;

const ADD_UNIQUE_USER: &str = r#"
    UPDATE stats:global SET unique_users = array::add(unique_users ?? [], $client);
"#;

const SELECT_RATE_LIMIT: &str = r#"
    SELECT count, timestamp FROM type::thing('rate_limits', $client);
"#;

const WRITE_RATE_LIMIT: &str = r#"
    UPDATE type::thing('rate_limits', $client)
        CONTENT { client: $client, count: $count, timestamp: $timestamp };
"#;

// An ended window is dropped first, so the increment below either opens a
// fresh window at $now or adds to the live one.
const ADD_RATE_LIMIT_USAGE: &str = r#"
    DELETE type::thing('rate_limits', $client) WHERE timestamp <= $ended_before;
    UPDATE type::thing('rate_limits', $client) SET
        client = $client,
        count += $amount,
        timestamp = timestamp ?? $now
    RETURN count, timestamp;
"#;

const PURGE_RATE_LIMITS: &str = r#"
    DELETE rate_limits WHERE timestamp < $threshold;
"#;

/// Database connection wrapper
#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Any>,
}

impl SurrealStore {
    /// Connect to SurrealDB and initialize the schema.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let db = any::connect(config.endpoint.as_str())
            .await
            .map_err(|err| StoreError::Unavailable(format!("{}: {err}", config.endpoint)))?;
        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;

        let store = Self { db };
        store.ensure_schema().await?;
        store.db.query(DEFINE_INDEXES).await?.check()?;

        debug!(endpoint = %config.endpoint, "Connected to SurrealDB");
        Ok(store)
    }

    /// Connect to a fresh in-memory database.
    pub async fn memory() -> StoreResult<Self> {
        Self::connect(&StoreConfig::default()).await
    }
}

#[async_trait]
impl Store for SurrealStore {
    async fn ensure_schema(&self) -> StoreResult<()> {
        self.db
            .query(DEFINE_TABLES)
            .query(SEED_STATS)
            .bind(("now", Utc::now().to_rfc3339()))
            .await?
            .check()?;
        Ok(())
    }

    async fn read_stats(&self) -> StoreResult<Stats> {
        let mut result = self
            .db
            .query(SEED_STATS)
            .query(SELECT_STATS)
            .bind(("now", Utc::now().to_rfc3339()))
            .await?;

        let stats: Vec<Stats> = result.take(1)?;
        stats
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("stats:global missing after seeding".to_string()))
    }

    async fn apply_stats_delta(&self, delta: &StatsDelta) -> StoreResult<()> {
        if delta.is_empty() {
            return Ok(());
        }

        self.db
            .query(INCREMENT_STATS)
            .bind(("total_requests", delta.total_requests))
            .bind(("total_domains_checked", delta.total_domains_checked))
            .bind(("blocked_domains", delta.blocked_domains))
            .bind(("not_blocked_domains", delta.not_blocked_domains))
            .bind(("error_domains", delta.error_domains))
            .await?
            .check()?;
        Ok(())
    }

    async fn add_unique_user(&self, client_id: &str) -> StoreResult<()> {
        self.db
            .query(ADD_UNIQUE_USER)
            .bind(("client", client_id.to_string()))
            .await?
            .check()?;
        Ok(())
    }

    async fn read_rate_limit(&self, client_id: &str) -> StoreResult<Option<RateLimitEntry>> {
        let mut result = self
            .db
            .query(SELECT_RATE_LIMIT)
            .bind(("client", client_id.to_string()))
            .await?;

        let entries: Vec<RateLimitEntry> = result.take(0)?;
        Ok(entries.into_iter().next())
    }

    async fn write_rate_limit(
        &self,
        client_id: &str,
        count: u32,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.db
            .query(WRITE_RATE_LIMIT)
            .bind(("client", client_id.to_string()))
            .bind(("count", count))
            .bind(("timestamp", timestamp.timestamp_millis()))
            .await?
            .check()?;
        Ok(())
    }

    async fn add_rate_limit_usage(
        &self,
        client_id: &str,
        amount: u32,
        now: DateTime<Utc>,
        window: Duration,
    ) -> StoreResult<RateLimitEntry> {
        let mut result = self
            .db
            .query(ADD_RATE_LIMIT_USAGE)
            .bind(("client", client_id.to_string()))
            .bind(("amount", amount))
            .bind(("now", now.timestamp_millis()))
            .bind(("ended_before", (now - window).timestamp_millis()))
            .await?
            .check()?;

        let entries: Vec<RateLimitEntry> = result.take(1)?;
        entries
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("rate limit entry for {client_id} missing after update")))
    }

    async fn purge_expired_rate_limits(&self, threshold: DateTime<Utc>) -> StoreResult<()> {
        self.db
            .query(PURGE_RATE_LIMITS)
            .bind(("threshold", threshold.timestamp_millis()))
            .await?
            .check()?;
        Ok(())
    }
}
