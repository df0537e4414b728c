//! Axum middleware for SSO authentication
//!
//! For every request the middleware:
//! 1. Builds a [`HttpRequestParts`] view of the request
//! 2. Runs the [`SsoInterceptor`]
//! 3. On success, writes the forwarded-identity headers and injects the
//!    [`crate::types::Identity`] into request extensions
//! 4. Otherwise, answers with the interceptor's redirect, JSON or error response

use crate::interceptor::SsoInterceptor;
use crate::types::{HttpRequestParts, InterceptResponse, InterceptResult};
use axum::{
    body::Body,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

/// Axum middleware for single-sign-on
///
/// # Example
///
/// ```rust,ignore
/// use axum::{Router, middleware};
/// use midway_sso_auth::axum::sso_middleware;
/// use midway_sso_auth::config::ProviderConfig;
/// use midway_sso_auth::interceptor::SsoInterceptor;
/// use std::sync::Arc;
///
/// let interceptor = Arc::new(SsoInterceptor::new(ProviderConfig::midway("midway-auth.amazon.com"), timeout)?);
/// let app = Router::new()
///     .layer(middleware::from_fn(move |req, next| {
///         sso_middleware(interceptor.clone(), req, next)
///     }));
/// ```
pub async fn sso_middleware(interceptor: Arc<SsoInterceptor>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();
    let request_view = HttpRequestParts::from_parts(&parts);

    match interceptor.authenticate(&request_view).await {
        InterceptResult::PassThrough(identity) => {
            identity.apply_to(&mut parts.headers);
            parts.extensions.insert(identity);
            next.run(Request::from_parts(parts, body)).await
        }
        InterceptResult::Respond(response) => {
            debug!(
                "request intercepted: status={} path={}",
                response.status,
                parts.uri.path()
            );
            response.into_response()
        }
    }
}

impl IntoResponse for InterceptResponse {
    fn into_response(self) -> Response {
        self.into_http::<Body>()
    }
}
