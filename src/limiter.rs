// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window domain quota per client, persisted in the store.
//!
//! A window opens with a client's first request and lasts
//! `window_minutes`. Every request consumes as many units as it submits
//! domains. The reset time reported to clients is always the end of the
//! window that was opened by the first request, on both the allow and the
//! reject path.
//!
//! Store failures fail open: the request is allowed and the error logged.

use crate::config::RateLimitConfig;
use crate::store::{Store, StoreResult};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Domains the client may still submit in this window
    pub remaining: u32,
    /// When the current window ends
    pub reset_time: DateTime<Utc>,
}

/// Store-backed rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn Store>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig, store: Arc<dyn Store>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check whether `client_id` may check `requested` more domains and, if
    /// so, consume them.
    pub async fn check_and_consume(&self, client_id: &str, requested: u32) -> RateLimitDecision {
        self.check_and_consume_at(client_id, requested, Utc::now()).await
    }

    /// Same as [`check_and_consume`](Self::check_and_consume) with an
    /// explicit clock.
    pub async fn check_and_consume_at(
        &self,
        client_id: &str,
        requested: u32,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let max = self.config.max_domains;
        let window = self.config.window_duration();
        // Window starts are persisted with millisecond precision.
        let now = Utc
            .timestamp_millis_opt(now.timestamp_millis())
            .single()
            .unwrap_or(now);

        match self.try_consume(client_id, requested, now, window).await {
            Ok(decision) => decision,
            Err(err) => {
                warn!(client = %client_id, error = %err, "Rate limit store unavailable, failing open");
                RateLimitDecision {
                    allowed: true,
                    remaining: max.saturating_sub(requested),
                    reset_time: now + window,
                }
            }
        }
    }

    async fn try_consume(
        &self,
        client_id: &str,
        requested: u32,
        now: DateTime<Utc>,
        window: Duration,
    ) -> StoreResult<RateLimitDecision> {
        let max = self.config.max_domains;

        self.store.purge_expired_rate_limits(now - window).await?;

        // An entry exactly one window old survives the purge but is expired.
        let current = self
            .store
            .read_rate_limit(client_id)
            .await?
            .filter(|entry| entry.timestamp + window > now);
        let used = current.map_or(0, |entry| entry.count);

        if used.saturating_add(requested) > max {
            debug!(client = %client_id, used, requested, max, "Domain quota exceeded");
            return Ok(RateLimitDecision {
                allowed: false,
                remaining: max.saturating_sub(used),
                reset_time: current.map_or(now + window, |entry| entry.timestamp + window),
            });
        }

        // The store opens the window or adds to it; concurrent requests that
        // both saw no entry end up sharing one window.
        let entry = self
            .store
            .add_rate_limit_usage(client_id, requested, now, window)
            .await?;

        Ok(RateLimitDecision {
            allowed: true,
            remaining: max.saturating_sub(entry.count),
            reset_time: entry.timestamp + window,
        })
    }

    /// Purge every entry whose window has elapsed (called periodically).
    pub async fn cleanup(&self) {
        let threshold = Utc::now() - self.config.window_duration();
        if let Err(err) = self.store.purge_expired_rate_limits(threshold).await {
            warn!(error = %err, "Failed to purge expired rate limits");
        }
    }
}
