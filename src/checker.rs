// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Batched domain checks against the external block-check API.
//!
//! Domains are split into fixed-size batches, one outbound request per batch,
//! processed in order. A failed batch marks each of its domains as errored;
//! a domain missing from an otherwise good response is errored on its own.

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Reason given to every domain of a batch whose request failed.
pub const API_REQUEST_FAILED: &str = "API request failed";

/// Reason given to a domain missing or malformed in the response.
pub const INVALID_RESPONSE: &str = "Invalid response";

/// Lookup error types.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(reqwest::StatusCode),

    #[error("Response body is not a JSON object")]
    MalformedBody,
}

/// Raw API response: domain → `{ "blocked": bool, ... }`.
pub type LookupResponse = Map<String, Value>;

/// The external service answering "is this domain blocked?".
#[async_trait]
pub trait BlockLookup: Send + Sync + 'static {
    /// Looks up one batch of domains.
    async fn lookup(&self, domains: &[String]) -> Result<LookupResponse, LookupError>;
}

/// Block-check API client.
pub struct HttpBlockLookup {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpBlockLookup {
    /// Create a new client. Without a timeout a hung request waits for the
    /// caller's own deadline.
    pub fn new(endpoint: String, timeout: Option<Duration>) -> Result<Self, LookupError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            endpoint,
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl BlockLookup for HttpBlockLookup {
    async fn lookup(&self, domains: &[String]) -> Result<LookupResponse, LookupError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("domains", domains.join(",")), ("json", "true".to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status));
        }

        match response.json::<Value>().await? {
            Value::Object(map) => Ok(map),
            _ => Err(LookupError::MalformedBody),
        }
    }
}

/// Outcome of checking one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Blocked,
    NotBlocked,
    Error(String),
}

impl CheckStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocked => write!(f, "Blocked"),
            Self::NotBlocked => write!(f, "Not Blocked"),
            Self::Error(reason) => write!(f, "Error: {reason}"),
        }
    }
}

impl Serialize for CheckStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result for a single submitted domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCheckResult {
    /// The domain exactly as submitted
    pub original_url: String,
    pub status: CheckStatus,
    pub blocked: bool,
    pub error: bool,
}

impl DomainCheckResult {
    fn checked(domain: &str, blocked: bool) -> Self {
        Self {
            original_url: domain.to_string(),
            status: if blocked {
                CheckStatus::Blocked
            } else {
                CheckStatus::NotBlocked
            },
            blocked,
            error: false,
        }
    }

    fn failed(domain: &str, reason: &str) -> Self {
        Self {
            original_url: domain.to_string(),
            status: CheckStatus::Error(reason.to_string()),
            blocked: false,
            error: true,
        }
    }

    fn from_entry(domain: &str, entry: Option<&Value>) -> Self {
        match entry
            .and_then(Value::as_object)
            .and_then(|fields| fields.get("blocked"))
            .and_then(Value::as_bool)
        {
            Some(blocked) => Self::checked(domain, blocked),
            None => Self::failed(domain, INVALID_RESPONSE),
        }
    }
}

/// Splits domain lists into batches and checks them one batch at a time.
pub struct BatchChecker {
    lookup: Arc<dyn BlockLookup>,
    batch_size: usize,
}

impl BatchChecker {
    pub fn new(lookup: Arc<dyn BlockLookup>, batch_size: usize) -> Self {
        Self {
            lookup,
            batch_size: batch_size.max(1),
        }
    }

    /// Check every domain, returning one result per input in input order.
    pub async fn check_domains(&self, domains: &[String]) -> Vec<DomainCheckResult> {
        let mut results = Vec::with_capacity(domains.len());

        for (index, batch) in domains.chunks(self.batch_size).enumerate() {
            match self.lookup.lookup(batch).await {
                Ok(response) => {
                    debug!(batch = index, size = batch.len(), "Batch checked");
                    results.extend(
                        batch
                            .iter()
                            .map(|domain| DomainCheckResult::from_entry(domain, response.get(domain))),
                    );
                }
                Err(err) => {
                    warn!(batch = index, size = batch.len(), error = %err, "Block-check API request failed");
                    results.extend(
                        batch
                            .iter()
                            .map(|domain| DomainCheckResult::failed(domain, API_REQUEST_FAILED)),
                    );
                }
            }
        }

        results
    }
}
