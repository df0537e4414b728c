use axum::{
    Router,
    body::Body,
    extract::Request,
    http::{StatusCode, header::LOCATION, header::SET_COOKIE},
};
use midway_sso_auth::{
    axum::sso_middleware,
    config::ProviderConfig,
    interceptor::{COOKIE_RFP, COOKIE_TOKEN, JS_SSO_PATH, SsoInterceptor},
    jwks::KeySetCache,
    test_utils::{StaticKeySource, TestClaims, TestKeyPair, TestRequest},
    types::{Identity, SsoStatus},
};
use std::sync::{Arc, LazyLock};
use tower::ServiceExt;

const ISSUER: &str = "https://idp.example.com";
const CLIENT_ID: &str = "test-client";
const RFP: &[u8] = b"0123456789abcdef0123456789abcdef";

static KEY_PAIR: LazyLock<TestKeyPair> = LazyLock::new(|| TestKeyPair::generate("key-1"));

fn app() -> Router {
    let source = Arc::new(StaticKeySource::new(vec![KEY_PAIR.jwk()]));
    let interceptor = Arc::new(SsoInterceptor::with_key_cache(
        ProviderConfig::federate("idp.example.com").with_client_id(CLIENT_ID),
        Arc::new(KeySetCache::new(source)),
    ));

    Router::new()
        .route(
            "/test",
            axum::routing::get(|req: Request| async move {
                let identity = req.extensions().get::<Identity>().expect("identity");
                assert_eq!(identity.user, "test-user");
                let forwarded = req
                    .headers()
                    .get("x-forwarded-user")
                    .and_then(|v| v.to_str().ok())
                    .expect("forwarded user");
                assert_eq!(forwarded, "test-user");
                assert_eq!(
                    req.headers().get("x-client-verify").map(|v| v.as_bytes()),
                    Some(&b"SUCCESS"[..])
                );
                "ok"
            }),
        )
        .layer(axum::middleware::from_fn(move |req, next| {
            sso_middleware(interceptor.clone(), req, next)
        }))
}

fn session_token() -> String {
    KEY_PAIR.create_token(&TestClaims::valid(
        ISSUER,
        CLIENT_ID,
        "test-user@ANT.AMAZON.COM",
        RFP,
    ))
}

#[tokio::test]
async fn test_valid_session() {
    let request = TestRequest::get("/test")
        .cookie(COOKIE_RFP, &hex::encode(RFP))
        .cookie(COOKIE_TOKEN, &session_token())
        // client-supplied identity headers are replaced
        .header("x-forwarded-user", "admin")
        .into_request(Body::empty());

    let response = app().oneshot(request).await.expect("call service");
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_missing_session_redirects() {
    let request = TestRequest::get("/test").into_request(Body::empty());

    let response = app().oneshot(request).await.expect("call service");
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location");
    assert!(location.starts_with("https://idp.example.com/api/oauth2/v1/authorize?"));
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie");
    assert!(set_cookie.starts_with("amzn_sso_rfp="));
    assert!(set_cookie.contains("Secure"));
    assert!(set_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_javascript_endpoint_returns_json() {
    let request = TestRequest::get(JS_SSO_PATH)
        .cookie(COOKIE_RFP, &hex::encode(RFP))
        .cookie(COOKIE_TOKEN, &session_token())
        .into_request(Body::empty());

    let response = app().oneshot(request).await.expect("call service");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").map(|v| v.as_bytes()),
        Some(&b"application/json"[..])
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let status: SsoStatus = serde_json::from_slice(&body).expect("status json");
    assert!(status.is_authenticated);
    assert!(status.expires_at.is_some());
}

#[tokio::test]
async fn test_idp_error_response() {
    let request = TestRequest::get("/test?error=access_denied&error_description=denied")
        .into_request(Body::empty());

    let response = app().oneshot(request).await.expect("call service");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    assert_eq!(&body[..], b"denied");
}

#[tokio::test]
async fn test_every_method_is_intercepted() {
    let source = Arc::new(StaticKeySource::new(vec![KEY_PAIR.jwk()]));
    let interceptor = Arc::new(SsoInterceptor::with_key_cache(
        ProviderConfig::federate("idp.example.com").with_client_id(CLIENT_ID),
        Arc::new(KeySetCache::new(source)),
    ));
    let app = Router::new()
        .route("/{*path}", axum::routing::any(|| async { "ok" }))
        .layer(axum::middleware::from_fn(move |req, next| {
            sso_middleware(interceptor.clone(), req, next)
        }));

    for method in [http::Method::POST, http::Method::PUT, http::Method::DELETE] {
        let mut request = TestRequest::get("/orders").into_request(Body::empty());
        *request.method_mut() = method.clone();

        let response = app.clone().oneshot(request).await.expect("call service");
        assert_eq!(
            response.status(),
            StatusCode::TEMPORARY_REDIRECT,
            "{method}"
        );
    }
}
