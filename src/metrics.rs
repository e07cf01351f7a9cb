// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for check traffic.
//!
//! Counters live in a per-process registry and are only ever exported;
//! nothing reads them back to make decisions.

use crate::stats::CheckOutcome;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Outcome label of a `/check` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Allowed,
    RateLimited,
    Invalid,
}

impl RequestOutcome {
    fn as_label(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::RateLimited => "rate_limited",
            Self::Invalid => "invalid",
        }
    }
}

pub struct Metrics {
    registry: Registry,
    check_requests: IntCounterVec,
    domains_checked: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("blockcheck".to_string()), None)?;

        let check_requests = IntCounterVec::new(
            Opts::new("check_requests_total", "Check requests by outcome"),
            &["outcome"],
        )?;
        let domains_checked = IntCounterVec::new(
            Opts::new("domains_checked_total", "Checked domains by result"),
            &["result"],
        )?;

        registry.register(Box::new(check_requests.clone()))?;
        registry.register(Box::new(domains_checked.clone()))?;

        Ok(Self {
            registry,
            check_requests,
            domains_checked,
        })
    }

    pub fn observe_request(&self, outcome: RequestOutcome) {
        self.check_requests
            .with_label_values(&[outcome.as_label()])
            .inc();
    }

    pub fn observe_outcome(&self, outcome: &CheckOutcome) {
        for (label, count) in [
            ("blocked", outcome.blocked),
            ("not_blocked", outcome.not_blocked),
            ("error", outcome.errors),
        ] {
            self.domains_checked.with_label_values(&[label]).inc_by(count);
        }
    }

    /// Render all counters in the Prometheus text format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}
