//! Tower service layer for SSO authentication.
//!
//! Wraps any `http` service, so the interceptor can sit in front of hyper,
//! tonic or axum services alike.

use crate::interceptor::SsoInterceptor;
use crate::types::{HttpRequestParts, InterceptResult};
use futures::future::BoxFuture;
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::debug;

/// Layer producing [`SsoService`]
#[derive(Clone)]
pub struct SsoLayer {
    interceptor: Arc<SsoInterceptor>,
}

impl SsoLayer {
    pub fn new(interceptor: Arc<SsoInterceptor>) -> Self {
        Self { interceptor }
    }
}

impl<S> Layer<S> for SsoLayer {
    type Service = SsoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SsoService {
            inner,
            interceptor: self.interceptor.clone(),
        }
    }
}

/// Authentication service wrapper.
///
/// 1. Runs the [`SsoInterceptor`] on the request
/// 2. Authenticated: sets the forwarded-identity headers, injects the
///    [`crate::types::Identity`] into request extensions and calls the inner service
/// 3. Otherwise: answers with the interceptor's response without calling the
///    inner service
///
/// # Example
///
/// ```rust,no_run
/// use midway_sso_auth::config::ProviderConfig;
/// use midway_sso_auth::interceptor::SsoInterceptor;
/// use midway_sso_auth::tower::SsoLayer;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = ProviderConfig::federate("idp.federate.amazon.com").with_client_id("my-client");
/// let interceptor = Arc::new(SsoInterceptor::new(config, Duration::from_secs(10))?);
/// let layer = SsoLayer::new(interceptor);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SsoService<S> {
    /// The inner service to wrap
    pub inner: S,
    pub interceptor: Arc<SsoInterceptor>,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for SsoService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: From<String> + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let interceptor = self.interceptor.clone();

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            let request_view = HttpRequestParts::from_parts(&parts);

            match interceptor.authenticate(&request_view).await {
                InterceptResult::PassThrough(identity) => {
                    identity.apply_to(&mut parts.headers);
                    parts.extensions.insert(identity);
                    inner.call(http::Request::from_parts(parts, body)).await
                }
                InterceptResult::Respond(response) => {
                    debug!(
                        "request intercepted: status={} path={}",
                        response.status,
                        parts.uri.path()
                    );
                    Ok(response.into_http())
                }
            }
        })
    }
}
