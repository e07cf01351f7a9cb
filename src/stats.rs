// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Global usage statistics.
//!
//! Recording is best-effort: a store failure is logged and swallowed so it
//! never fails the check that triggered it. Reading a snapshot is not.

use crate::checker::DomainCheckResult;
use crate::store::{Stats, StatsDelta, Store, StoreResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Tallies of a single check request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOutcome {
    pub domains_checked: u64,
    pub blocked: u64,
    pub not_blocked: u64,
    pub errors: u64,
}

impl CheckOutcome {
    pub fn from_results(results: &[DomainCheckResult]) -> Self {
        results.iter().fold(Self::default(), |mut outcome, result| {
            outcome.domains_checked += 1;
            if result.error {
                outcome.errors += 1;
            } else if result.blocked {
                outcome.blocked += 1;
            } else {
                outcome.not_blocked += 1;
            }
            outcome
        })
    }
}

impl From<CheckOutcome> for StatsDelta {
    fn from(outcome: CheckOutcome) -> Self {
        Self {
            total_requests: 0,
            total_domains_checked: outcome.domains_checked,
            blocked_domains: outcome.blocked,
            not_blocked_domains: outcome.not_blocked,
            error_domains: outcome.errors,
        }
    }
}

/// Public view of the stats record, as served by `/stats/data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub total_domains_checked: u64,
    pub blocked_domains: u64,
    pub not_blocked_domains: u64,
    pub error_domains: u64,
    pub last_reset: DateTime<Utc>,
    /// Number of distinct clients
    pub unique_users: usize,
}

impl From<Stats> for StatsSnapshot {
    fn from(stats: Stats) -> Self {
        Self {
            total_requests: stats.total_requests,
            total_domains_checked: stats.total_domains_checked,
            blocked_domains: stats.blocked_domains,
            not_blocked_domains: stats.not_blocked_domains,
            error_domains: stats.error_domains,
            last_reset: stats.last_reset,
            unique_users: stats.unique_users.len(),
        }
    }
}

pub struct StatsAggregator {
    store: Arc<dyn Store>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Count one inbound check request.
    pub async fn record_request(&self) {
        let delta = StatsDelta {
            total_requests: 1,
            ..Default::default()
        };
        if let Err(err) = self.store.apply_stats_delta(&delta).await {
            warn!(error = %err, "Failed to record request");
        }
    }

    pub async fn record_check_outcome(&self, outcome: CheckOutcome) {
        if let Err(err) = self.store.apply_stats_delta(&outcome.into()).await {
            warn!(
                error = %err,
                domains = outcome.domains_checked,
                "Failed to record check outcome"
            );
        }
    }

    pub async fn record_unique_user(&self, client_id: &str) {
        if let Err(err) = self.store.add_unique_user(client_id).await {
            warn!(client = %client_id, error = %err, "Failed to record unique user");
        }
    }

    pub async fn snapshot(&self) -> StoreResult<StatsSnapshot> {
        Ok(self.store.read_stats().await?.into())
    }
}
