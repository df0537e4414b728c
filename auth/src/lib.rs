//! Single-sign-on interceptor for Midway and Federate identity providers
//!
//! This crate authenticates browser requests with an OpenID Connect identity
//! provider, in front of an arbitrary downstream handler:
//!
//! - **Redirect flow**: unauthenticated browsers are sent to the provider with
//!   a request-forgery-protection nonce and come back with an `id_token`
//! - **Token verification**: RS256-family signatures checked against the
//!   provider's key set, cached by key id
//! - **Session cookies**: `Secure`, `HttpOnly`, and `SameSite=None` only for
//!   browsers known to handle it
//!
//! # Example
//!
//! ```rust,no_run
//! use midway_sso_auth::config::ProviderConfig;
//! use midway_sso_auth::interceptor::SsoInterceptor;
//! use midway_sso_auth::types::{HttpRequestParts, InterceptResult};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ProviderConfig::midway("midway-auth.amazon.com");
//! let interceptor = SsoInterceptor::new(config, Duration::from_secs(10))?;
//!
//! let request = http::Request::builder()
//!     .uri("/orders?x=1")
//!     .header(http::header::HOST, "app.example.com")
//!     .body(())?;
//! let (parts, _body) = request.into_parts();
//!
//! match interceptor.authenticate(&HttpRequestParts::from_parts(&parts)).await {
//!     InterceptResult::PassThrough(identity) => println!("hello {}", identity.user),
//!     InterceptResult::Respond(response) => println!("intercepted: {}", response.status),
//! }
//! # Ok(())
//! # }
//! ```

/// Request and response abstractions
pub mod types;

/// Error taxonomy
pub mod error;

/// Identity provider configuration and presets
pub mod config;

/// `SameSite=None` browser compatibility
pub mod same_site;

/// Signing key retrieval and caching
pub mod jwks;

/// Identity token verification
pub mod token;

/// OAuth state parameter encoding
pub mod oauth_state;

/// Redirect target validation
pub mod url_validation;

/// Authentication state machine
pub mod interceptor;

/// Axum middleware for HTTP authentication
pub mod axum;

/// Tower service layer
pub mod tower;

/// Key pairs, tokens and requests for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
