//! OAuth `state` parameter encoding
//!
//! The state carries the original request target through the identity
//! provider round trip.
//!
//! # Format
//!
//! `base64(json)` with the standard alphabet, where the JSON is `{"path": "<path+query>"}`
//!
//! # Example
//!
//! ```rust
//! use midway_sso_auth::oauth_state::{decode_state, encode_state};
//!
//! let state = encode_state("/orders?x=1");
//! assert_eq!(decode_state(&state).expect("valid state"), "/orders?x=1");
//! ```

use crate::error::{Result, SsoError};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// OAuth state stored in the state parameter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuthState {
    /// Path and query string to return to after authentication
    pub path: String,
}

/// Encode a path (with optional query string) as a state parameter
pub fn encode_state(path: &str) -> String {
    let state_json = serde_json::json!({ "path": path }).to_string();
    base64::engine::general_purpose::STANDARD.encode(state_json)
}

/// Decode a state parameter back into the path it carries
///
/// Fails with [`SsoError::InvalidState`] when the value is not base64, not
/// JSON, or has no string `path` field.
pub fn decode_state(state: &str) -> Result<String> {
    let state_bytes = base64::engine::general_purpose::STANDARD
        .decode(state.trim())
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(state.trim()))
        .map_err(|e| SsoError::InvalidState(format!("not base64: {e}")))?;
    let decoded: OAuthState = serde_json::from_slice(&state_bytes)
        .map_err(|e| SsoError::InvalidState(format!("not a state document: {e}")))?;
    Ok(decoded.path)
}
