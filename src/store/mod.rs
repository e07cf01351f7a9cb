// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Persistent storage for usage statistics and rate-limit windows.
//!
//! The store is the only place cross-request state lives. Counters are
//! always changed with server-side increments so concurrent handlers never
//! overwrite each other's updates.

mod surreal;

pub use surreal::SurrealStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("Malformed record: {0}")]
    Decode(String),
}

/// Result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Global usage counters, stored as the single `stats:global` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_requests: u64,
    pub total_domains_checked: u64,
    pub blocked_domains: u64,
    pub not_blocked_domains: u64,
    pub error_domains: u64,
    pub last_reset: DateTime<Utc>,
    /// Distinct client identifiers in first-seen order
    pub unique_users: Vec<String>,
}

/// Increments applied to the stats record in one atomic update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub total_requests: u64,
    pub total_domains_checked: u64,
    pub blocked_domains: u64,
    pub not_blocked_domains: u64,
    pub error_domains: u64,
}

impl StatsDelta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A client's consumption in its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    /// Domains consumed since the window opened
    pub count: u32,
    /// Window start (first request of the window)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Abstract storage interface for stats and rate-limit state.
///
/// Implementations must be usable from many request handlers at once and
/// must not cache state between calls.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Creates tables if absent and seeds the stats record if missing.
    /// Safe to call on every request.
    async fn ensure_schema(&self) -> StoreResult<()>;

    /// Reads the stats record, seeding it first if missing.
    async fn read_stats(&self) -> StoreResult<Stats>;

    /// Adds each counter in `delta` server-side.
    async fn apply_stats_delta(&self, delta: &StatsDelta) -> StoreResult<()>;

    /// Adds a client to the unique-user set; no-op if already present.
    async fn add_unique_user(&self, client_id: &str) -> StoreResult<()>;

    async fn read_rate_limit(&self, client_id: &str) -> StoreResult<Option<RateLimitEntry>>;

    /// Replaces a client's entry.
    async fn write_rate_limit(
        &self,
        client_id: &str,
        count: u32,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Adds `amount` to a client's count server-side and returns the updated
    /// entry. The stored window start is kept unless the client has no entry
    /// or its window ended at or before `now`, in which case a window opens
    /// at `now` with `amount` as its count.
    async fn add_rate_limit_usage(
        &self,
        client_id: &str,
        amount: u32,
        now: DateTime<Utc>,
        window: Duration,
    ) -> StoreResult<RateLimitEntry>;

    /// Deletes every entry whose window started before `threshold`.
    async fn purge_expired_rate_limits(&self, threshold: DateTime<Utc>) -> StoreResult<()>;
}
