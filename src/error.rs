// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The stored tokens cannot be used and the user has to go through
    /// the authorization redirect again.
    #[error("Re-authorization required: {0}")]
    ReauthorizationRequired(String),

    /// The provider answered a token request with a 4xx.
    #[error("Provider rejected the grant: {0}")]
    ProviderRejected(String),

    #[error("MyAnimeList API error: {0}")]
    MalApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the user must re-run the authorization flow.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(
            self,
            AppError::ReauthorizationRequired(_) | AppError::ProviderRejected(_)
        )
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::Configuration(msg) => {
                tracing::error!(error = %msg, "Configuration error");
                (StatusCode::BAD_REQUEST, "configuration_error", None)
            }
            AppError::ReauthorizationRequired(msg) => (
                StatusCode::UNAUTHORIZED,
                "reauthorization_required",
                Some(format!("{}; please re-authorize with MyAnimeList", msg)),
            ),
            AppError::ProviderRejected(msg) => (
                StatusCode::UNAUTHORIZED,
                "provider_rejected",
                Some(format!(
                    "Could not authorize with MyAnimeList ({}); please re-authorize",
                    msg
                )),
            ),
            AppError::MalApi(msg) => (
                StatusCode::BAD_GATEWAY,
                "mal_error",
                Some(format!("{}; please retry", msg)),
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
