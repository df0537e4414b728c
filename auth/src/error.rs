use thiserror::Error;

/// Failures produced by the SSO components.
///
/// Token, key and nonce failures never leave the interceptor: they restart the
/// authentication flow. `InvalidState` is the only variant surfaced to the
/// client, as a 401.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SsoError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("signing key too weak: {bits} bits")]
    WeakKey { bits: usize },

    #[error("nonce claim does not match the request forgery protection token")]
    NonceMismatch,

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("malformed key set: {0}")]
    MalformedKeySet(String),

    #[error("invalid state parameter: {0}")]
    InvalidState(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = SsoError> = std::result::Result<T, E>;
