// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound HTTP with a timeout and bounded retries.
//!
//! Retries cover transport failures (connect, timeout) and 5xx responses.
//! A 4xx is returned to the caller immediately. Requests that must never be
//! replayed go through [`HttpClient::send_once`].

use crate::error::AppError;
use reqwest::{RequestBuilder, Response};
use std::time::Duration;

/// reqwest client plus retry policy.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    max_attempts: usize,
    base_backoff: Duration,
}

impl HttpClient {
    pub fn new(
        timeout: Duration,
        max_attempts: usize,
        base_backoff: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("paisen/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            client,
            max_attempts: max_attempts.max(1),
            base_backoff,
        })
    }

    /// The underlying client, for building requests.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send `builder`, retrying transient failures with exponential backoff.
    ///
    /// The request body must be cloneable (forms and JSON are).
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, AppError> {
        self.send_attempts(builder, self.max_attempts).await
    }

    /// Send `builder` exactly once. For requests that must not be replayed,
    /// such as redeeming a single-use authorization code.
    pub async fn send_once(&self, builder: RequestBuilder) -> Result<Response, AppError> {
        self.send_attempts(builder, 1).await
    }

    async fn send_attempts(
        &self,
        builder: RequestBuilder,
        max_attempts: usize,
    ) -> Result<Response, AppError> {
        for attempt in 1..=max_attempts {
            let request = builder
                .try_clone()
                .ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!("Request body cannot be retried"))
                })?
                .build()
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid request: {}", e)))?;

            let method = request.method().clone();
            let url = redact_query(request.url());
            let last_attempt = attempt == max_attempts;

            match self.client.execute(request).await {
                Ok(response) if response.status().is_server_error() && !last_attempt => {
                    tracing::warn!(
                        attempt,
                        %method,
                        url = %url,
                        status = %response.status(),
                        "Upstream server error, retrying"
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if !last_attempt && is_transient(&e) => {
                    tracing::warn!(attempt, %method, url = %url, error = %e, "Request failed, retrying");
                }
                Err(e) => {
                    return Err(AppError::MalApi(format!("Request to {} failed: {}", url, e)));
                }
            }

            tokio::time::sleep(self.backoff_delay(attempt)).await;
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "HTTP retries exhausted without a response"
        )))
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(8) as u32;
        self.base_backoff.saturating_mul(1u32 << shift)
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Drop the query string so tokens or codes never reach the logs.
fn redact_query(url: &reqwest::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
