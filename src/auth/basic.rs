// Basic Auth validation against the Viridem API

use reqwest::Client;

use super::credentials::{basic_auth_header, endpoint_url};
use super::types::ValidatedCredentials;
use crate::error::AttemptFailure;

/// Lightweight versioned endpoint used to check Basic Auth credentials
pub const PROBE_PATH: &str = "/api/v1/viridem/versions";

/// Check username/password directly against the API
///
/// Returns the full `Basic ...` header value on any 2xx response.
pub async fn probe(
    client: &Client,
    creds: &ValidatedCredentials<'_>,
) -> Result<String, AttemptFailure> {
    let url = endpoint_url(creds.base_url, PROBE_PATH);
    let header = basic_auth_header(creds.username, creds.password);

    tracing::debug!("Basic Auth probe: url={}, username={}", url, creds.username);

    let response = client
        .get(&url)
        .header("Authorization", &header)
        .header("Content-Type", "application/json")
        .send()
        .await
        .map_err(|e| AttemptFailure::from_transport(&e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("Basic Auth probe failed: status={}, body={}", status, body);
        return Err(AttemptFailure::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(header)
}
