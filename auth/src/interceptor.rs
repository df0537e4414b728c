//! Single-sign-on interceptor
//!
//! Decides, per request, between four outcomes:
//!
//! - the identity provider reported an error: answer with the mapped status
//! - the request carries no valid identity token: start the authentication
//!   flow (307 to the provider, or a JSON offer on the JS-SSO endpoint)
//! - the provider just called back with a fresh `id_token`: store it in the
//!   session cookie and send the browser back to where it started
//! - the session cookie holds a valid token: let the request through
//!
//! Token, key and claim failures are never reported to the client; they
//! silently restart the flow. A corrupted `state` parameter is the only
//! verification problem answered with an error (401).

use crate::config::ProviderConfig;
use crate::error::{Result, SsoError};
use crate::jwks::{HttpKeySource, KeySetCache};
use crate::oauth_state::{decode_state, encode_state};
use crate::same_site::same_site_for;
use crate::token::{IdTokenClaims, TokenValidator, nonce_for};
use crate::types::{
    Identity, InterceptResponse, InterceptResult, RequestParts, SsoStatus, port_from_host,
    site_cookie,
};
use crate::url_validation::is_safe_redirect_target;
use http::{HeaderValue, StatusCode};
use rand::RngCore;
use rand::rngs::OsRng;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

/// Request forgery protection cookie
pub const COOKIE_RFP: &str = "amzn_sso_rfp";
/// Session cookie holding the identity token
pub const COOKIE_TOKEN: &str = "amzn_sso_token";
/// Query parameter carrying a fresh identity token
pub const PARAM_TOKEN: &str = "id_token";
/// Endpoint reserved for script integrations; answers in JSON
pub const JS_SSO_PATH: &str = "/sso/login";

pub const OIDC_SCOPE: &str = "openid";
pub const OIDC_RESPONSE_TYPE: &str = "id_token";
pub const SENTRY_HANDLER_VERSION: &str = "RustMidwayServerHandler-1.0";

const RFP_TOKEN_LEN: usize = 32;

/// Status for an OAuth2 error code returned by the identity provider.
///
/// Unrecognized codes get no special handling.
pub fn idp_error_status(code: &str) -> Option<StatusCode> {
    match code {
        "invalid_request"
        | "unauthorized_client"
        | "invalid_client"
        | "unsupported_response_type"
        | "invalid_scope"
        | "server_error" => Some(StatusCode::UNAUTHORIZED),
        "access_denied" => Some(StatusCode::FORBIDDEN),
        "temporarily_unavailable" => Some(StatusCode::INTERNAL_SERVER_ERROR),
        _ => None,
    }
}

/// Authentication interceptor for one identity provider
pub struct SsoInterceptor {
    config: ProviderConfig,
    validator: TokenValidator,
}

impl std::fmt::Debug for SsoInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsoInterceptor")
            .field("config", &self.config)
            .finish()
    }
}

impl SsoInterceptor {
    /// Interceptor fetching signing keys over HTTPS, each fetch bounded by `jwks_timeout`
    pub fn new(config: ProviderConfig, jwks_timeout: Duration) -> Result<Self> {
        let source = Arc::new(HttpKeySource::new(jwks_timeout)?);
        Ok(Self::with_key_cache(
            config,
            Arc::new(KeySetCache::new(source)),
        ))
    }

    /// Interceptor using an existing key cache
    pub fn with_key_cache(config: ProviderConfig, keys: Arc<KeySetCache>) -> Self {
        let validator = TokenValidator::new(&config, keys);
        Self { config, validator }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Authenticate a request.
    ///
    /// Never fails: every problem resolves to a response or to a restart of
    /// the authentication flow.
    pub async fn authenticate(&self, req: &dyn RequestParts) -> InterceptResult {
        if let Some(response) = idp_error_response(req) {
            return InterceptResult::Respond(response);
        }

        let cookie_token = non_empty(req.cookie(COOKIE_TOKEN));
        let id_token = non_empty(req.query_param(PARAM_TOKEN));
        let rfp = read_rfp(req);

        // the query string token takes precedence over the session cookie
        let (token, rfp) = match (id_token.or(cookie_token), rfp) {
            (Some(token), Some(rfp)) => (token, rfp),
            _ => return InterceptResult::Respond(self.require_authentication(req)),
        };

        let claims = match self
            .validator
            .verify(token, &rfp, &self.audience(req))
            .await
        {
            Ok(claims) => claims,
            Err(e) => {
                warn!("identity token rejected, restarting authentication: {e}");
                return InterceptResult::Respond(self.require_authentication(req));
            }
        };

        let user = claims.user();
        if user.is_empty() {
            warn!("identity token has an empty subject, restarting authentication");
            return InterceptResult::Respond(self.require_authentication(req));
        }
        let Some(expires_at) = claims.expires_at() else {
            warn!("identity token expiry out of range: exp={}", claims.exp);
            return InterceptResult::Respond(self.require_authentication(req));
        };

        if let Some(id_token) = id_token {
            info!("authentication completed: user={user} expires_at={expires_at}");
            return InterceptResult::Respond(self.complete_authentication(
                req, id_token, &rfp, &claims,
            ));
        }

        if is_javascript_sso_request(req) {
            return InterceptResult::Respond(InterceptResponse::json(SsoStatus {
                is_authenticated: true,
                expires_at: Some(claims.exp),
                authn_endpoint: None,
            }));
        }

        debug!("authenticated: user={user} path={}", req.path());
        InterceptResult::PassThrough(Identity {
            user: user.to_string(),
            id_token: token.to_string(),
            expires_at,
        })
    }

    /// Store a freshly issued token and send the browser back where it started
    fn complete_authentication(
        &self,
        req: &dyn RequestParts,
        id_token: &str,
        rfp: &[u8],
        claims: &IdTokenClaims,
    ) -> InterceptResponse {
        let redirect_target = match req.query_param("state") {
            Some(state) => match decode_redirect_target(state) {
                Ok(target) => target,
                Err(e) => {
                    error!("{e}: state={state}");
                    return InterceptResponse::text(
                        StatusCode::UNAUTHORIZED,
                        "Invalid state parameter",
                    );
                }
            },
            None => format!("{}{}", req.path(), tokenless_query_string(req)),
        };

        let expires = OffsetDateTime::from_unix_timestamp(claims.exp).ok();
        let same_site = same_site_for(req.user_agent());
        let domain = cookie_domain(req.host());
        let session_cookie = site_cookie(
            COOKIE_TOKEN,
            id_token.to_string(),
            domain.clone(),
            expires,
            same_site,
        );
        let rfp_cookie = site_cookie(COOKIE_RFP, hex::encode(rfp), domain, expires, same_site);

        let response = if is_javascript_sso_request(req) {
            InterceptResponse::json(SsoStatus {
                is_authenticated: true,
                expires_at: Some(claims.exp),
                authn_endpoint: None,
            })
        } else {
            InterceptResponse::redirect(&redirect_target)
        };
        response.with_cookie(session_cookie).with_cookie(rfp_cookie)
    }

    /// Start the authentication flow
    ///
    /// A new RFP token is minted when the request has none; its cookie gets no
    /// expiry until authentication completes.
    fn require_authentication(&self, req: &dyn RequestParts) -> InterceptResponse {
        let (rfp, minted) = match read_rfp(req) {
            Some(rfp) => (rfp, false),
            None => {
                let mut rfp = vec![0u8; RFP_TOKEN_LEN];
                OsRng.fill_bytes(&mut rfp);
                (rfp, true)
            }
        };

        let mut response = if is_javascript_sso_request(req) {
            InterceptResponse::json(SsoStatus {
                is_authenticated: false,
                expires_at: None,
                authn_endpoint: Some(self.authentication_url(req, &rfp, &self.config.auth_path)),
            })
        } else {
            InterceptResponse::redirect(&self.authentication_url(
                req,
                &rfp,
                &self.config.auth_redirect_path,
            ))
        };

        if minted {
            response = response.with_cookie(site_cookie(
                COOKIE_RFP,
                hex::encode(&rfp),
                cookie_domain(req.host()),
                None,
                same_site_for(req.user_agent()),
            ));
        }
        response
    }

    /// OAuth 2.0 authorization request URL (implicit flow, `id_token` in query)
    pub fn authentication_url(&self, req: &dyn RequestParts, rfp: &[u8], endpoint: &str) -> String {
        let query_string = tokenless_query_string(req);
        let redirect_uri = self.redirect_uri(req, &query_string);
        let state = encode_state(&format!("{}{}", req.path(), query_string));

        let parameters = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("client_id", &self.audience(req))
            .append_pair("scope", OIDC_SCOPE)
            .append_pair("response_type", OIDC_RESPONSE_TYPE)
            .append_pair("response_mode", "query")
            .append_pair("state", &state)
            .append_pair("nonce", &nonce_for(rfp))
            .append_pair("sentry_handler_version", SENTRY_HANDLER_VERSION)
            .finish();

        let separator = if endpoint.contains('?') { '&' } else { '?' };
        format!("{endpoint}{separator}{parameters}")
    }

    /// Callback URI sent to the identity provider.
    ///
    /// A configured URI is used as-is when absolute, or as a path on the
    /// request host. Without one, the current URL (minus `id_token`) is used.
    fn redirect_uri(&self, req: &dyn RequestParts, query_string: &str) -> String {
        match self.config.redirect_uri.as_deref() {
            Some(uri) if uri.starts_with("https://") || uri.starts_with("http://") => {
                uri.to_string()
            }
            Some(path) => format!("https://{}{path}", req.host()),
            None => format!("https://{}{}{query_string}", req.host(), req.path()),
        }
    }

    /// Expected token audience: the client id, or the request origin with explicit port
    pub fn audience(&self, req: &dyn RequestParts) -> String {
        if let Some(client_id) = &self.config.client_id {
            return client_id.clone();
        }
        let host = req.host();
        if port_from_host(host).is_some() {
            format!("{}://{host}", req.scheme())
        } else {
            format!("{}://{host}:{}", req.scheme(), req.port())
        }
    }
}

fn idp_error_response(req: &dyn RequestParts) -> Option<InterceptResponse> {
    let code = req.query_param("error")?;
    let status = idp_error_status(code)?;
    let description = req.query_param("error_description").unwrap_or_default();
    debug!("IDP generated error {code} - {description}");
    Some(InterceptResponse::text(status, escape_html(description)))
}

fn decode_redirect_target(state: &str) -> Result<String> {
    let target = decode_state(state)?;
    if !is_safe_redirect_target(&target) {
        return Err(SsoError::InvalidState(format!(
            "redirect target is not a relative path: {target}"
        )));
    }
    if HeaderValue::from_str(&target).is_err() {
        return Err(SsoError::InvalidState(format!(
            "redirect target is not a valid Location header: {target:?}"
        )));
    }
    Ok(target)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// RFP token bytes from the cookie; a missing or non-hex value counts as absent
fn read_rfp(req: &dyn RequestParts) -> Option<Vec<u8>> {
    let value = non_empty(req.cookie(COOKIE_RFP))?;
    match hex::decode(value) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        _ => {
            debug!("ignoring malformed {COOKIE_RFP} cookie");
            None
        }
    }
}

fn is_javascript_sso_request(req: &dyn RequestParts) -> bool {
    req.path() == JS_SSO_PATH
}

/// Query string (with leading `?`) without the `id_token` parameter, or empty
pub fn tokenless_query_string(req: &dyn RequestParts) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (name, value) in req.query_params() {
        if name != PARAM_TOKEN {
            serializer.append_pair(name, value);
            any = true;
        }
    }
    if any {
        format!("?{}", serializer.finish())
    } else {
        String::new()
    }
}

/// Cookie `Domain`: the request host without port
fn cookie_domain(host: &str) -> String {
    if host.starts_with('[') {
        return host
            .split_once(']')
            .map(|(addr, _)| format!("{addr}]"))
            .unwrap_or_else(|| host.to_string());
    }
    host.split(':').next().unwrap_or_default().to_string()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
