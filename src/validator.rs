// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Check request validator.
//!
//! Validation happens before any side effect: a rejected body touches
//! neither the rate limiter nor the statistics.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Validation error types. The display text is what clients see.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid JSON body")]
    InvalidBody,

    #[error("Domains must be an array")]
    NotAnArray,

    #[error("No domains provided")]
    NoDomains,

    #[error("Maximum {0} domains per request")]
    TooManyDomains(usize),

    #[error("Domains must be strings")]
    NonStringDomain,
}

/// Validator for `POST /check` bodies.
pub struct CheckRequestValidator {
    max_domains_per_request: usize,
}

impl CheckRequestValidator {
    pub fn new(max_domains_per_request: usize) -> Self {
        Self {
            max_domains_per_request,
        }
    }

    /// Validate a body of the form `{"domains": [...]}` and return the
    /// domains exactly as submitted.
    pub fn validate(&self, body: &Value) -> Result<Vec<String>, ValidationError> {
        let domains = body
            .get("domains")
            .and_then(Value::as_array)
            .ok_or(ValidationError::NotAnArray)?;

        if domains.is_empty() {
            return Err(ValidationError::NoDomains);
        }

        if domains.len() > self.max_domains_per_request {
            debug!(
                count = domains.len(),
                max = self.max_domains_per_request,
                "Too many domains in request"
            );
            return Err(ValidationError::TooManyDomains(self.max_domains_per_request));
        }

        domains
            .iter()
            .map(|domain| {
                domain
                    .as_str()
                    .map(str::to_string)
                    .ok_or(ValidationError::NonStringDomain)
            })
            .collect()
    }
}
