//! Signing key retrieval and caching
//!
//! Keys are looked up by `(kid, jwks_url)`. A cache miss fetches the whole key
//! set and keeps only the requested key. The cache is deliberately tiny: during
//! a key rotation only the current and the previous signing key are in use.

use crate::error::{Result, SsoError};
use async_trait::async_trait;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey};
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use rsa::pkcs1::EncodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Number of signing keys kept in memory
pub const KEY_CACHE_CAPACITY: u64 = 2;

/// A JSON Web Key as published by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default)]
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

/// A JSON Web Key Set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }
}

/// RSA public key ready for signature verification
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    /// Algorithm pinned by the key set, if any
    pub algorithm: Option<Algorithm>,
    /// Size of the RSA modulus
    pub modulus_bits: usize,
    n: String,
    e: String,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("modulus_bits", &self.modulus_bits)
            .finish()
    }
}

impl PartialEq for SigningKey {
    fn eq(&self, other: &Self) -> bool {
        self.kid == other.kid
            && self.algorithm == other.algorithm
            && self.n == other.n
            && self.e == other.e
    }
}

impl SigningKey {
    /// Convert an RSA JWK into a verification key
    pub fn from_jwk(jwk: &Jwk) -> Result<Self> {
        let kid = jwk
            .kid
            .clone()
            .ok_or_else(|| SsoError::MalformedKeySet("JWK missing 'kid'".to_string()))?;
        if jwk.kty != "RSA" {
            return Err(SsoError::MalformedKeySet(format!(
                "unsupported key type '{}' for kid '{kid}'",
                jwk.kty
            )));
        }
        let algorithm = jwk
            .alg
            .as_deref()
            .map(|alg| {
                alg.parse::<Algorithm>().map_err(|e| {
                    SsoError::MalformedKeySet(format!("unknown algorithm '{alg}': {e}"))
                })
            })
            .transpose()?;

        let n = jwk
            .n
            .clone()
            .ok_or_else(|| SsoError::MalformedKeySet("JWK missing 'n' parameter".to_string()))?;
        let e = jwk
            .e
            .clone()
            .ok_or_else(|| SsoError::MalformedKeySet("JWK missing 'e' parameter".to_string()))?;

        let n_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(n.as_bytes())
            .map_err(|e| SsoError::MalformedKeySet(format!("Failed to decode 'n': {e:?}")))?;
        let e_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(e.as_bytes())
            .map_err(|e| SsoError::MalformedKeySet(format!("Failed to decode 'e': {e:?}")))?;

        let public_key = RsaPublicKey::new(
            BigUint::from_bytes_be(&n_bytes),
            BigUint::from_bytes_be(&e_bytes),
        )
        .map_err(|e| SsoError::MalformedKeySet(format!("Failed to create RSA public key: {e:?}")))?;
        let modulus_bits = public_key.n().bits();

        let pem = public_key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .map_err(|e| {
                SsoError::MalformedKeySet(format!("Failed to encode public key as PEM: {e:?}"))
            })?;
        let decoding_key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| SsoError::MalformedKeySet(format!("Failed to create decoding key: {e:?}")))?;

        Ok(Self {
            kid,
            algorithm,
            modulus_bits,
            n,
            e,
            decoding_key,
        })
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// Where key sets come from
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the complete key set published at `jwks_url`
    async fn fetch_key_set(&self, jwks_url: &str) -> Result<JwkSet>;
}

/// Fetches key sets over HTTPS
pub struct HttpKeySource {
    client: reqwest::Client,
}

impl HttpKeySource {
    /// Every fetch is bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        // no redirects: the key set URL is configuration, never user input
        let client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| SsoError::InvalidConfig(format!("Failed to create HTTP client: {e:?}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch_key_set(&self, jwks_url: &str) -> Result<JwkSet> {
        let unavailable =
            |e: reqwest::Error| SsoError::KeyNotFound(format!("Failed to fetch JWKS from {jwks_url}: {e}"));
        let body = self
            .client
            .get(jwks_url)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?
            .bytes()
            .await
            .map_err(unavailable)?;
        serde_json::from_slice(&body)
            .map_err(|e| SsoError::MalformedKeySet(format!("Failed to parse JWKS: {e}")))
    }
}

/// Bounded cache of signing keys, keyed by `(kid, jwks_url)`.
///
/// Concurrent misses on the same key are coalesced by moka; a failed fetch is
/// not cached.
pub struct KeySetCache {
    source: Arc<dyn KeySource>,
    cache: Cache<(String, String), Arc<SigningKey>>,
}

impl KeySetCache {
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self::with_capacity(source, KEY_CACHE_CAPACITY)
    }

    pub fn with_capacity(source: Arc<dyn KeySource>, capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { source, cache }
    }

    /// Get the signing key `kid`, fetching the key set on a miss
    pub async fn get(&self, kid: &str, jwks_url: &str) -> Result<Arc<SigningKey>> {
        let source = self.source.clone();
        let kid_owned = kid.to_string();
        let url_owned = jwks_url.to_string();

        self.cache
            .try_get_with((kid.to_string(), jwks_url.to_string()), async move {
                debug!("signing key cache miss: kid={kid_owned} jwks_url={url_owned}");
                let key_set = source.fetch_key_set(&url_owned).await?;
                let jwk = key_set.find(&kid_owned).ok_or_else(|| {
                    SsoError::KeyNotFound(format!("Error finding key for kid: {kid_owned}"))
                })?;
                Ok::<_, SsoError>(Arc::new(SigningKey::from_jwk(jwk)?))
            })
            .await
            .map_err(|e: Arc<SsoError>| (*e).clone())
    }

    pub fn contains(&self, kid: &str, jwks_url: &str) -> bool {
        self.cache
            .contains_key(&(kid.to_string(), jwks_url.to_string()))
    }

    /// Approximate number of cached keys; call `run_pending_tasks` first for an exact count
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Apply pending evictions
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}
