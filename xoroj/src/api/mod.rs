//! `XorOJ` REST client.
//!
//! Thin `reqwest` wrapper over the handful of contest endpoints the
//! controller needs. Every request is bounded by the configured timeout
//! and response bodies are capped at [`MAX_RESPONSE_SIZE`].

pub mod models;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, redirect};
use serde::de::DeserializeOwned;
use tracing::debug;
use xoroj_core::{ContestId, ContestWindow};

use crate::config::ApiConfig;
use crate::error::{ApiError, NetworkFailure};
use crate::phase::RegistrationService;

pub use models::{ContestClock, ContestDetail, DEFAULT_REJECTION, RegisterResponse, RegistrationStatus};

/// Largest response body accepted from the backend.
pub const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Client for the `XorOJ` backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl ApiClient {
    /// Builds a client from configuration.
    ///
    /// Redirects are not followed, so the bearer token never leaves the
    /// configured host.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout: config.timeout,
        })
    }

    /// Base URL requests are issued against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether requests carry a bearer token.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Fetches contest details.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failures, non-2xx answers or
    /// undecodable bodies.
    pub async fn fetch_contest(&self, id: ContestId) -> Result<ContestDetail, ApiError> {
        self.send(self.http.get(self.url(&format!("/api/contests/{id}"))))
            .await
    }

    /// Asks whether the current user is registered.
    ///
    /// Without a token there is no current user and the answer is `false`
    /// without a request.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] as for [`fetch_contest`](Self::fetch_contest).
    pub async fn is_registered(&self, id: ContestId) -> Result<bool, ApiError> {
        if self.token.is_none() {
            return Ok(false);
        }
        let status: RegistrationStatus = self
            .send(self.http.get(self.url(&format!("/api/contests/{id}/is-registered"))))
            .await?;
        Ok(status.registered)
    }

    /// Fetches the contest window with the live registration flag.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if either request fails.
    pub async fn fetch_window(&self, id: ContestId) -> Result<(ContestDetail, ContestWindow), ApiError> {
        let detail = self.fetch_contest(id).await?;
        let registered = self.is_registered(id).await?;
        let window = detail.window.with_registered(registered);
        Ok((detail, window))
    }

    /// Registers the current user.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] when the backend answers
    /// `success: false`, otherwise an [`ApiError`] as for
    /// [`fetch_contest`](Self::fetch_contest).
    pub async fn register(&self, id: ContestId) -> Result<(), ApiError> {
        let response: RegisterResponse = self
            .send(self.http.post(self.url(&format!("/api/contests/{id}/register"))))
            .await?;
        if response.success {
            Ok(())
        } else {
            Err(ApiError::Rejected(
                response
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_REJECTION.to_string()),
            ))
        }
    }

    /// Fetches the contest clock from the standings snapshot.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] as for [`fetch_contest`](Self::fetch_contest).
    pub async fn fetch_contest_clock(&self, id: ContestId) -> Result<ContestClock, ApiError> {
        self.send(self.http.get(self.url(&format!("/api/standings/contests/{id}"))))
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, mut req: RequestBuilder) -> Result<T, ApiError> {
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let req = req.build().map_err(|e| ApiError::Network(e.to_string()))?;
        let url = req.url().to_string();
        debug!(method = %req.method(), url = %url, "api request");

        let response = tokio::time::timeout(self.timeout, self.http.execute(req))
            .await
            .map_err(|_| ApiError::Timeout(url.clone()))?
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        let bytes = tokio::time::timeout(self.timeout, response.bytes())
            .await
            .map_err(|_| ApiError::Timeout(url.clone()))?
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if bytes.len() > MAX_RESPONSE_SIZE {
            return Err(ApiError::InvalidResponse(format!(
                "response body exceeds {MAX_RESPONSE_SIZE} byte limit"
            )));
        }

        if status == StatusCode::UNAUTHORIZED {
            let message = serde_json::from_slice::<models::ErrorBody>(&bytes)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| "Unauthorized".to_string());
            return Err(ApiError::Unauthorized(message));
        }
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                body: if text.is_empty() {
                    format!("HTTP {}", status.as_u16())
                } else {
                    text
                },
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl RegistrationService for ApiClient {
    async fn submit(&self, contest_id: ContestId) -> Result<(), NetworkFailure> {
        self.register(contest_id).await.map_err(NetworkFailure::from)
    }
}
