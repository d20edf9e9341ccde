// Authentication module
// Resolves credential records into Authorization headers

mod basic;
mod credentials;
mod oauth;
mod resolver;
mod types;

pub use basic::PROBE_PATH;
pub use credentials::{basic_auth_header, client_cache_key, validate};
pub use oauth::{parse_token_response, DEFAULT_EXPIRES_IN_SECS, TOKEN_PATH};
pub use resolver::{format_authorization_header, CredentialResolver};
pub use types::{
    AuthOutcome, CredentialRecord, TokenGrant, ValidatedCredentials, DEFAULT_CREDENTIAL_TYPE,
};
