// Authentication types

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::AttemptFailure;

/// Credential type used when none is configured
pub const DEFAULT_CREDENTIAL_TYPE: &str = "viridem-api";

/// Raw credential record handed over by the plugin framework
///
/// Accepts both snake_case and camelCase keys so a decrypted credential map
/// can be deserialized directly.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CredentialRecord {
    #[serde(default, alias = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, alias = "clientId")]
    pub client_id: Option<String>,
    #[serde(default, alias = "clientSecret")]
    pub client_secret: Option<String>,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("CredentialRecord")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .finish()
    }
}

/// Credential record with every required field present
#[derive(Clone, Copy)]
pub struct ValidatedCredentials<'a> {
    pub base_url: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

/// Token granted by a successful password-grant exchange
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: u64,
}

/// Password-grant token response
#[derive(Debug, Deserialize)]
pub struct OAuthTokenResponse {
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lifetime_secs")]
    pub expires_in: Option<u64>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Token lifetime as sent by servers in the wild: integer, float, numeric
/// string or null. Negative or non-numeric values read as absent.
fn deserialize_lifetime_secs<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct LifetimeVisitor;

    impl<'de> Visitor<'de> for LifetimeVisitor {
        type Value = Option<u64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number of seconds, a numeric string, or null")
        }

        fn visit_u64<E>(self, value: u64) -> Result<Option<u64>, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Option<u64>, E>
        where
            E: de::Error,
        {
            Ok(u64::try_from(value).ok())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Option<u64>, E>
        where
            E: de::Error,
        {
            Ok(secs_from_f64(value))
        }

        fn visit_str<E>(self, value: &str) -> Result<Option<u64>, E>
        where
            E: de::Error,
        {
            let value = value.trim();
            Ok(value
                .parse::<u64>()
                .ok()
                .or_else(|| value.parse::<f64>().ok().and_then(secs_from_f64)))
        }

        fn visit_bool<E>(self, _value: bool) -> Result<Option<u64>, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Option<u64>, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Option<u64>, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(LifetimeVisitor)
}

fn secs_from_f64(value: f64) -> Option<u64> {
    (0.0..=u64::MAX as f64).contains(&value).then(|| value as u64)
}

/// Result of one resolution attempt, threaded through OAuth2 then Basic Auth
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// OAuth2 password grant succeeded
    Bearer(TokenGrant),

    /// Basic Auth probe succeeded; holds the full header value
    Basic(String),

    /// OAuth2 failed; Basic Auth has not been tried yet
    OAuthFailed(AttemptFailure),

    /// Both schemes failed
    BasicFailed {
        oauth: AttemptFailure,
        basic: AttemptFailure,
    },
}

impl AuthOutcome {
    /// Outcome after the OAuth2 attempt
    pub fn from_oauth(result: Result<TokenGrant, AttemptFailure>) -> Self {
        match result {
            Ok(grant) => AuthOutcome::Bearer(grant),
            Err(failure) => AuthOutcome::OAuthFailed(failure),
        }
    }

    /// Whether the Basic Auth fallback should run
    pub fn needs_fallback(&self) -> bool {
        matches!(self, AuthOutcome::OAuthFailed(_))
    }

    /// Fold the Basic Auth attempt into an OAuth2 failure
    ///
    /// Outcomes other than `OAuthFailed` are returned unchanged.
    pub fn with_basic(self, result: Result<String, AttemptFailure>) -> Self {
        match self {
            AuthOutcome::OAuthFailed(oauth) => match result {
                Ok(header) => AuthOutcome::Basic(header),
                Err(basic) => AuthOutcome::BasicFailed { oauth, basic },
            },
            other => other,
        }
    }
}
