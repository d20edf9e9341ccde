use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{CredentialRecord, CredentialResolver};
use crate::error::{transport_error_kind, ApiError, AuthError};

/// Build the pooled HTTP client shared by authentication and business calls
///
/// The request timeout bounds every token exchange and probe; a timeout is
/// handled like any other transport failure.
pub fn build_client(connect_timeout_secs: u64, request_timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(request_timeout_secs))
        .build()
        .context("Failed to create HTTP client")
}

/// HTTP client for the Viridem API
/// Injects a resolved Authorization header before each outbound call
pub struct ViridemHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Credential resolver
    resolver: Arc<CredentialResolver>,
}

impl ViridemHttpClient {
    pub fn new(client: Client, resolver: Arc<CredentialResolver>) -> Self {
        Self { client, resolver }
    }

    /// Send `method {base_url}{path}` with resolved credentials
    pub async fn request(
        &self,
        credentials: &CredentialRecord,
        method: Method,
        path: &str,
    ) -> Result<Response, ApiError> {
        let base_url = credentials
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(AuthError::Validation {
                missing: vec!["base_url"],
            })?;

        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        let builder = self
            .client
            .request(method, url)
            .header("Content-Type", "application/json");

        self.execute(credentials, builder).await
    }

    /// Resolve the Authorization header, attach it, and send the request once
    ///
    /// A 401 drops the cached credential so the next call authenticates again.
    pub async fn execute(
        &self,
        credentials: &CredentialRecord,
        builder: RequestBuilder,
    ) -> Result<Response, ApiError> {
        let header = self.resolver.resolve_authorization_header(credentials).await?;

        let request = builder
            .header("Authorization", header)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(
            method = %method,
            url = %url,
            "Sending HTTP request"
        );

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                let error_kind = transport_error_kind(&e);
                tracing::warn!(
                    error_kind = error_kind,
                    error = %e,
                    url = %url,
                    "HTTP request error"
                );
                return Err(ApiError::Transport(format!("{} (kind: {})", e, error_kind)));
            }
        };

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = %status, "Request successful");
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED && self.resolver.invalidate(credentials) {
            tracing::warn!("Received 401, dropped cached credentials for next call");
        }

        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            status = status.as_u16(),
            url = %url,
            response_body = %error_text,
            "HTTP request failed with error response"
        );

        Err(ApiError::Status {
            status: status.as_u16(),
            message: error_text,
        })
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn resolver(&self) -> &Arc<CredentialResolver> {
        &self.resolver
    }
}
