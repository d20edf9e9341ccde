// OAuth2 password grant

use reqwest::Client;

use super::credentials::{basic_auth_header, endpoint_url, mask};
use super::types::{OAuthTokenResponse, TokenGrant, ValidatedCredentials};
use crate::error::AttemptFailure;

/// Token endpoint path, relative to the base URL
pub const TOKEN_PATH: &str = "/api/oauth/token";

/// Lifetime assumed when the server omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Exchange username/password plus client credentials for an access token
///
/// Any failure is returned as an `AttemptFailure`; callers decide whether to
/// fall back to Basic Auth.
pub async fn password_grant(
    client: &Client,
    creds: &ValidatedCredentials<'_>,
) -> Result<TokenGrant, AttemptFailure> {
    let url = endpoint_url(creds.base_url, TOKEN_PATH);

    tracing::debug!(
        "OAuth2 password grant request: url={}, client_id={}, username={}",
        url,
        mask(creds.client_id),
        creds.username
    );

    let form = [
        ("grant_type", "password"),
        ("client_id", creds.client_id),
        ("client_secret", creds.client_secret),
        ("username", creds.username),
        ("password", creds.password),
    ];

    let response = client
        .post(&url)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .header(
            "Authorization",
            basic_auth_header(creds.client_id, creds.client_secret),
        )
        .form(&form)
        .send()
        .await
        .map_err(|e| AttemptFailure::from_transport(&e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AttemptFailure::from_transport(&e))?;

    if !status.is_success() {
        tracing::warn!(
            "OAuth2 token request failed: status={}, body={}",
            status,
            body
        );
        return Err(AttemptFailure::Status {
            status: status.as_u16(),
            body,
        });
    }

    parse_token_response(&body)
}

/// Interpret a 2xx token endpoint body
pub fn parse_token_response(body: &str) -> Result<TokenGrant, AttemptFailure> {
    let data: OAuthTokenResponse =
        serde_json::from_str(body).map_err(|e| AttemptFailure::Malformed(e.to_string()))?;

    if let Some(error) = data.error {
        return Err(AttemptFailure::Rejected {
            error,
            description: data.error_description,
        });
    }

    match data.access_token {
        Some(access_token) if !access_token.is_empty() => Ok(TokenGrant {
            access_token,
            expires_in: data.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        }),
        _ => Err(AttemptFailure::MissingToken),
    }
}
