use crate::config::ProviderConfig;
use crate::error::{Result, SsoError};
use crate::jwks::KeySetCache;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Accepted clock skew between this host and the identity provider
pub const CLOCK_SKEW_LEEWAY_SECS: u64 = 7 * 60;

/// Smallest accepted RSA modulus
pub const MIN_KEY_BITS: usize = 2048;

/// Audience can be either a string or an array of strings in OIDC tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, aud: &str) -> bool {
        match self {
            Audience::Single(s) => s == aud,
            Audience::Multiple(v) => v.iter().any(|a| a == aud),
        }
    }
}

/// Verified claims of an identity token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    /// `<user>` or `<user>@<realm>`
    pub sub: String,
    pub aud: Audience,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl IdTokenClaims {
    /// Subject without its realm
    pub fn user(&self) -> &str {
        self.sub.split('@').next().unwrap_or_default()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// OIDC `nonce` bound to a request forgery protection token: hex SHA-256 of its bytes
pub fn nonce_for(rfp: &[u8]) -> String {
    hex::encode(Sha256::digest(rfp))
}

fn is_rsa_algorithm(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

/// Verifies identity tokens against the provider's published signing keys
pub struct TokenValidator {
    keys: Arc<KeySetCache>,
    jwks_url: String,
    issuer: String,
}

impl TokenValidator {
    pub fn new(config: &ProviderConfig, keys: Arc<KeySetCache>) -> Self {
        Self {
            keys,
            jwks_url: config.jwks_url.clone(),
            issuer: config.issuer(),
        }
    }

    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        &self.keys
    }

    /// Verify signature and claims, then bind the token to the RFP token.
    ///
    /// Checks, in order: header (`kid`, RSA algorithm), key strength, signature,
    /// `exp` (required), `nbf`, `iss`, `aud`, and finally `nonce`.
    pub async fn verify(&self, token: &str, rfp: &[u8], audience: &str) -> Result<IdTokenClaims> {
        let header = decode_header(token)
            .map_err(|e| SsoError::InvalidToken(format!("Invalid JWT header: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| SsoError::InvalidToken("JWT missing kid (key ID) in header".to_string()))?;
        if !is_rsa_algorithm(header.alg) {
            return Err(SsoError::InvalidToken(format!(
                "unsupported signing algorithm {:?}",
                header.alg
            )));
        }

        let key = self.keys.get(&kid, &self.jwks_url).await?;
        if key.modulus_bits < MIN_KEY_BITS {
            return Err(SsoError::WeakKey {
                bits: key.modulus_bits,
            });
        }
        if let Some(expected) = key.algorithm.filter(|alg| *alg != header.alg) {
            return Err(SsoError::InvalidToken(format!(
                "algorithm {:?} does not match key algorithm {expected:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(header.alg);
        validation.leeway = CLOCK_SKEW_LEEWAY_SECS;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[audience]);

        let claims = decode::<IdTokenClaims>(token, key.decoding_key(), &validation)
            .map_err(|e| SsoError::InvalidToken(format!("Token validation failed: {e}")))?
            .claims;

        let expected_nonce = nonce_for(rfp);
        let nonce_matches = claims
            .nonce
            .as_deref()
            .is_some_and(|nonce| bool::from(nonce.as_bytes().ct_eq(expected_nonce.as_bytes())));
        if !nonce_matches {
            return Err(SsoError::NonceMismatch);
        }
        Ok(claims)
    }
}
