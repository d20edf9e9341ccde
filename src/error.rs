// Error handling module
// Defines resolver and outbound-call error types

use thiserror::Error;

/// Why a single authentication attempt (OAuth2 or Basic Auth) failed
///
/// Recoverable on its own; only becomes terminal once both schemes have failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttemptFailure {
    /// Request could not be sent or the response could not be read
    #[error("transport error: {0}")]
    Transport(String),

    /// Server answered with a non-2xx status
    #[error("HTTP {status} - {body}")]
    Status { status: u16, body: String },

    /// Token endpoint answered with an `error` field
    #[error("server rejected credentials: {error}{}", describe(.description))]
    Rejected {
        error: String,
        description: Option<String>,
    },

    /// Token response parsed but carried no access token
    #[error("response does not contain access_token")]
    MissingToken,

    /// Token response body was not valid JSON
    #[error("malformed response: {0}")]
    Malformed(String),
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

/// Categorize a reqwest error for logs and messages
pub fn transport_error_kind(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connection_failed"
    } else if err.is_request() {
        "request_error"
    } else if err.is_body() {
        "body_error"
    } else if err.is_decode() {
        "decode_error"
    } else {
        "unknown"
    }
}

impl AttemptFailure {
    /// Classify a transport error from reqwest
    pub fn from_transport(err: &reqwest::Error) -> Self {
        AttemptFailure::Transport(format!("{} (kind: {})", err, transport_error_kind(err)))
    }
}

/// Errors surfaced by credential resolution
#[derive(Error, Debug)]
pub enum AuthError {
    /// Required credential fields are missing
    #[error("Missing required credential fields: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    /// Every authentication path was exhausted
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },
}

impl AuthError {
    /// Terminal error after both OAuth2 and Basic Auth failed
    pub fn exhausted(oauth: &AttemptFailure, basic: &AttemptFailure) -> Self {
        AuthError::Authentication {
            reason: format!("OAuth2 failed: {}; Basic Auth failed: {}", oauth, basic),
        }
    }

    /// Terminal error when only the OAuth2 path was attempted
    pub fn oauth_only(oauth: &AttemptFailure) -> Self {
        AuthError::Authentication {
            reason: format!("OAuth2 failed: {}", oauth),
        }
    }
}

/// Errors from an authorized outbound business call
#[derive(Error, Debug)]
pub enum ApiError {
    /// No Authorization header could be resolved
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Viridem API answered with a non-2xx status
    #[error("Viridem API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Request could not be sent
    #[error("HTTP request failed: {0}")]
    Transport(String),
}
