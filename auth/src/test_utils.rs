use crate::error::Result;
use crate::jwks::{Jwk, JwkSet, KeySource};
use crate::token::nonce_for;
use crate::types::HttpRequestParts;
use async_trait::async_trait;
use axum_extra::extract::cookie::Cookie;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Test identity token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestClaims {
    /// Subject (user ID, optionally with realm)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Anti-forgery nonce
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Expiration time (seconds since Unix epoch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issued at (seconds since Unix epoch)
    pub iat: i64,
}

impl TestClaims {
    /// Claims valid for one hour, bound to `rfp`
    pub fn valid(issuer: &str, audience: &str, subject: &str, rfp: &[u8]) -> Self {
        let now = Utc::now();
        Self {
            sub: subject.to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            nonce: Some(nonce_for(rfp)),
            exp: Some((now + Duration::hours(1)).timestamp()),
            iat: now.timestamp(),
        }
    }

    /// Claims that expired an hour ago, well beyond the clock skew allowance
    pub fn expired(issuer: &str, audience: &str, subject: &str, rfp: &[u8]) -> Self {
        let now = Utc::now();
        Self {
            exp: Some((now - Duration::hours(1)).timestamp()),
            iat: (now - Duration::hours(2)).timestamp(),
            ..Self::valid(issuer, audience, subject, rfp)
        }
    }
}

/// Test key pair for signing tokens and publishing the matching JWK
pub struct TestKeyPair {
    pub kid: String,
    pub encoding_key: EncodingKey,
    pub private_key: RsaPrivateKey,
}

impl TestKeyPair {
    /// Generate a new 2048-bit RSA key pair
    pub fn generate(kid: &str) -> Self {
        Self::generate_with_bits(kid, 2048)
    }

    pub fn generate_with_bits(kid: &str, bits: usize) -> Self {
        let mut rng = rand::thread_rng();
        let private_key =
            RsaPrivateKey::new(&mut rng, bits).expect("failed to generate RSA private key");
        let private_pem = private_key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .expect("failed to encode private key as PEM");
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .expect("failed to create encoding key");

        Self {
            kid: kid.to_string(),
            encoding_key,
            private_key,
        }
    }

    /// Public half as a JWK
    pub fn jwk(&self) -> Jwk {
        let public_key = self.private_key.to_public_key();
        let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        Jwk {
            kid: Some(self.kid.clone()),
            kty: "RSA".to_string(),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            n: Some(b64.encode(public_key.n().to_bytes_be())),
            e: Some(b64.encode(public_key.e().to_bytes_be())),
        }
    }

    /// Sign `claims` with RS256, announcing this key's `kid`
    pub fn create_token(&self, claims: &TestClaims) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &self.encoding_key).expect("failed to encode token")
    }
}

/// In-memory key source counting its fetches
pub struct StaticKeySource {
    key_set: JwkSet,
    fetches: AtomicUsize,
}

impl StaticKeySource {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self {
            key_set: JwkSet { keys },
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch_key_set(&self, _jwks_url: &str) -> Result<JwkSet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.key_set.clone())
    }
}

/// Builder for inbound test requests
pub struct TestRequest {
    uri: String,
    host: String,
    cookies: Vec<String>,
    headers: Vec<(String, String)>,
}

impl TestRequest {
    /// GET `uri` (path and query) on `app.example.com`
    pub fn get(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            host: "app.example.com".to_string(),
            cookies: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies
            .push(Cookie::new(name.to_string(), value.to_string()).to_string());
        self
    }

    pub fn user_agent(self, user_agent: &str) -> Self {
        self.header(http::header::USER_AGENT.as_str(), user_agent)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn into_request<B>(self, body: B) -> http::Request<B> {
        let mut builder = http::Request::builder()
            .method(http::Method::GET)
            .uri(self.uri.as_str())
            .header(http::header::HOST, self.host.as_str());
        if !self.cookies.is_empty() {
            builder = builder.header(http::header::COOKIE, self.cookies.join("; "));
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(body).expect("failed to build request")
    }

    pub fn build(self) -> HttpRequestParts {
        let (parts, _body) = self.into_request(()).into_parts();
        HttpRequestParts::from_parts(&parts)
    }
}
