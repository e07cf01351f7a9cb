// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the HTTP surface

use crate::store::StoreError;
use crate::validator::ValidationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Client error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Generic status body: `{"message": "...", "status": 404}`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub message: &'static str,
    pub status: u16,
}

impl StatusResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            message: status.canonical_reason().unwrap_or("Unknown"),
            status: status.as_u16(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(err) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            )
                .into_response(),
            err => {
                error!(error = %err, "Request failed");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, Json(StatusResponse::new(status))).into_response()
            }
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
