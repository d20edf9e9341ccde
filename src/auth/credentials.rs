// Credential validation and header helpers

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::types::{CredentialRecord, ValidatedCredentials};
use crate::error::AuthError;

/// Check that every field needed for authentication is present
///
/// Empty strings count as missing. Missing names are reported in a fixed order.
pub fn validate(record: &CredentialRecord) -> Result<ValidatedCredentials<'_>, AuthError> {
    fn present(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|v| !v.is_empty())
    }

    let client_id = present(&record.client_id);
    let client_secret = present(&record.client_secret);
    let username = present(&record.username);
    let password = present(&record.password);
    let base_url = present(&record.base_url);

    match (client_id, client_secret, username, password, base_url) {
        (Some(client_id), Some(client_secret), Some(username), Some(password), Some(base_url)) => {
            Ok(ValidatedCredentials {
                base_url,
                username,
                password,
                client_id,
                client_secret,
            })
        }
        _ => {
            let missing = [
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("username", username),
                ("password", password),
                ("base_url", base_url),
            ]
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();

            Err(AuthError::Validation { missing })
        }
    }
}

/// `Basic base64(user:secret)` header value
pub fn basic_auth_header(user: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, secret)))
}

/// Join an API path onto a base URL, ignoring a trailing slash
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Key derivation by OAuth client and base URL, for integrations where one
/// client identity is shared by every user
pub fn client_cache_key(record: &CredentialRecord) -> String {
    format!(
        "{}-{}",
        record.client_id.as_deref().unwrap_or("unknown-client"),
        record.base_url.as_deref().unwrap_or("unknown")
    )
}

/// Shortened form of a secret for logs; never more than half of it is shown
pub fn mask(value: &str) -> String {
    let shown = (value.chars().count() / 2).min(8);
    let visible: String = value.chars().take(shown).collect();
    format!("{}...", visible)
}
