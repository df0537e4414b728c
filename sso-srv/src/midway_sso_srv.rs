use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Extension, Router, http::HeaderMap, middleware, routing::any};
use clap::Parser;
use midway_sso_auth::axum::sso_middleware;
use midway_sso_auth::config::ProviderSettings;
use midway_sso_auth::interceptor::SsoInterceptor;
use midway_sso_auth::types::{FORWARDED_USER_HEADER, Identity};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "Midway SSO demo server")]
#[clap(about = "Serves a protected page behind the Midway / Federate SSO interceptor", version)]
struct Cli {
    #[clap(long, default_value = "127.0.0.1:8080")]
    listen_endpoint: SocketAddr,
}

async fn whoami(Extension(identity): Extension<Identity>, headers: HeaderMap) -> String {
    let forwarded = headers
        .get(FORWARDED_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    format!(
        "hello {} (forwarded as {forwarded}), session expires at {}\n",
        identity.user, identity.expires_at
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Cli::parse();

    let settings = ProviderSettings::from_env()?;
    let timeout = settings.jwks_timeout();
    let config = settings.into_config();
    info!(
        "identity provider: host={} jwks_url={}",
        config.identity_provider_host, config.jwks_url
    );
    let interceptor = Arc::new(
        SsoInterceptor::new(config, timeout).with_context(|| "creating sso interceptor")?,
    );

    let app = Router::new()
        .route("/", any(whoami))
        .route("/{*path}", any(whoami))
        .layer(middleware::from_fn(move |req, next| {
            sso_middleware(interceptor.clone(), req, next)
        }));

    let listener = tokio::net::TcpListener::bind(args.listen_endpoint).await?;
    info!("Server running on {}", args.listen_endpoint);
    axum::serve(listener, app).await?;
    Ok(())
}
