use reqwest::Client;
use std::sync::Arc;

use super::credentials::{self, mask};
use super::types::{AuthOutcome, CredentialRecord, DEFAULT_CREDENTIAL_TYPE};
use super::{basic, oauth};
use crate::cache::TokenCache;
use crate::error::AuthError;

/// Return `raw` unchanged if it already names a scheme, else treat it as a
/// bare bearer token
pub fn format_authorization_header(raw: &str) -> String {
    if raw.starts_with("Basic ") || raw.starts_with("Bearer ") {
        raw.to_string()
    } else {
        format!("Bearer {}", raw)
    }
}

/// Credential resolver
/// Turns a credential record into an `Authorization` header value, using the
/// shared token cache and falling back from OAuth2 to Basic Auth
pub struct CredentialResolver {
    /// Shared token cache
    cache: Arc<TokenCache>,

    /// HTTP client for token and probe requests
    client: Client,

    /// Namespace for cache keys and cache tuning
    credential_type: String,
}

impl CredentialResolver {
    /// Create a resolver for the default `viridem-api` credential type
    pub fn new(cache: Arc<TokenCache>, client: Client) -> Self {
        Self {
            cache,
            client,
            credential_type: DEFAULT_CREDENTIAL_TYPE.to_string(),
        }
    }

    /// Use a different credential type for cache keys and tuning
    pub fn with_credential_type(mut self, credential_type: impl Into<String>) -> Self {
        self.credential_type = credential_type.into();
        self
    }

    pub fn credential_type(&self) -> &str {
        &self.credential_type
    }

    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    /// Cache key for a record under this resolver's credential type
    pub fn cache_key(&self, credentials: &CredentialRecord) -> String {
        self.cache.derive_key(&self.credential_type, credentials)
    }

    /// Resolve the `Authorization` header value for a credential record
    ///
    /// Cache hit → no network. Miss → OAuth2 password grant, then Basic Auth
    /// probe if OAuth2 fails for any reason. The winner is cached; if both
    /// fail the cache is left untouched.
    pub async fn resolve_authorization_header(
        &self,
        credentials: &CredentialRecord,
    ) -> Result<String, AuthError> {
        let key = self.cache_key(credentials);

        if let Some(entry) = self.cache.get(&key) {
            tracing::debug!("Token cache hit for {} ({:?})", key, entry.auth_kind);
            return Ok(format_authorization_header(&entry.credential_value));
        }
        tracing::debug!("Token cache miss for {}", key);

        let creds = credentials::validate(credentials)?;

        let mut outcome =
            AuthOutcome::from_oauth(oauth::password_grant(&self.client, &creds).await);

        // Broad fallback: any OAuth2 failure, including 5xx and transport
        // errors, moves on to Basic Auth
        if let AuthOutcome::OAuthFailed(ref failure) = outcome {
            tracing::warn!(
                "OAuth2 authentication failed for {}, falling back to Basic Auth: {}",
                key,
                failure
            );
        }
        if outcome.needs_fallback() {
            outcome = outcome.with_basic(basic::probe(&self.client, &creds).await);
        }

        match outcome {
            AuthOutcome::Bearer(grant) => {
                let entry = self.cache.create_oauth_entry(
                    &self.credential_type,
                    grant.access_token.as_str(),
                    grant.expires_in,
                );
                tracing::info!(
                    "Authenticated {} via OAuth2 (token: {}, expires_in: {}s)",
                    key,
                    mask(&grant.access_token),
                    grant.expires_in
                );
                self.cache.set(key, entry);
                Ok(format!("Bearer {}", grant.access_token))
            }
            AuthOutcome::Basic(header) => {
                let entry = self
                    .cache
                    .create_basic_auth_entry(&self.credential_type, header.as_str());
                tracing::info!("Authenticated {} via Basic Auth", key);
                self.cache.set(key, entry);
                Ok(header)
            }
            AuthOutcome::OAuthFailed(oauth) => Err(AuthError::oauth_only(&oauth)),
            AuthOutcome::BasicFailed { oauth, basic } => {
                let err = AuthError::exhausted(&oauth, &basic);
                tracing::error!("{} ({})", err, key);
                Err(err)
            }
        }
    }

    /// Check the OAuth2 path only, as configured
    ///
    /// No Basic Auth fallback and no cache write.
    pub async fn test_connection(&self, credentials: &CredentialRecord) -> Result<(), AuthError> {
        let creds = credentials::validate(credentials)?;

        match oauth::password_grant(&self.client, &creds).await {
            Ok(_) => {
                tracing::info!("OAuth2 connection test succeeded for {}", creds.base_url);
                Ok(())
            }
            Err(failure) => {
                tracing::warn!("OAuth2 connection test failed: {}", failure);
                Err(AuthError::oauth_only(&failure))
            }
        }
    }

    /// Drop the cached entry for a record; returns whether one existed
    pub fn invalidate(&self, credentials: &CredentialRecord) -> bool {
        let key = self.cache_key(credentials);
        let removed = self.cache.delete(&key);
        if removed {
            tracing::debug!("Invalidated cached credentials for {}", key);
        }
        removed
    }
}
