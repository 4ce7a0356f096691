// ABOUTME: Text generator that posts {prompt} to an HTTP generation route and reads {content}
// ABOUTME: Surfaces the route's {error, details} body as a structured external-service error
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{GenerationRequest, GenerationResponse, TextGenerator};
use crate::constants::generation;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct RouteError {
    error: Option<String>,
    details: Option<String>,
}

/// Client for a `{prompt}` -> `{content}` generation route
#[derive(Debug, Clone)]
pub struct HttpTextGenerator {
    client: Client,
    endpoint: Url,
}

impl HttpTextGenerator {
    /// Generator posting to `endpoint`
    ///
    /// # Errors
    ///
    /// Returns a config error if the endpoint is not a valid URL or the HTTP
    /// client cannot be built
    pub fn new(endpoint: &str) -> AppResult<Self> {
        Self::with_timeout(
            endpoint,
            Duration::from_secs(generation::REQUEST_TIMEOUT_SECS),
        )
    }

    /// Generator posting to `endpoint` with a request timeout
    ///
    /// # Errors
    ///
    /// Returns a config error if the endpoint is not a valid URL or the HTTP
    /// client cannot be built
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> AppResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AppError::config_invalid(format!("invalid generation URL: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self, request), fields(endpoint = %self.endpoint))]
    async fn generate(&self, request: &GenerationRequest) -> AppResult<GenerationResponse> {
        request.validate()?;
        debug!(prompt_len = request.prompt.len(), "Posting generation request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let reason = serde_json::from_str::<RouteError>(&body)
                .ok()
                .map_or_else(
                    || body.clone(),
                    |e| match (e.error, e.details) {
                        (Some(error), Some(details)) => format!("{error}: {details}"),
                        (Some(error), None) => error,
                        (None, Some(details)) => details,
                        (None, None) => body.clone(),
                    },
                );
            warn!(status = %status, reason = %reason, "Generation route returned an error");
            return Err(AppError::external_service(
                "generation route",
                format!("{status}: {reason}"),
            )
            .with_details(json!({ "status": status.as_u16() })));
        }

        serde_json::from_str(&body).map_err(|e| {
            AppError::external_service("generation route", format!("unexpected response: {e}"))
        })
    }
}
