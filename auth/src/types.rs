use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{DateTime, Utc};
use http::header::{CONTENT_TYPE, HOST, HeaderName, LOCATION, SET_COOKIE, USER_AGENT};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use axum_extra::extract::cookie::SameSite;

/// Read-only view of an inbound request, as needed by the interceptor.
///
/// Host servers implement this for their own request type, or build an
/// [`HttpRequestParts`] from `http::request::Parts`.
pub trait RequestParts: Send + Sync {
    /// HTTP method, e.g. `GET`
    fn method(&self) -> &str;
    /// URL scheme the client used (`https` behind most proxies)
    fn scheme(&self) -> &str;
    /// Host as sent by the client, possibly including a port
    fn host(&self) -> &str;
    /// Server port
    fn port(&self) -> u16;
    /// Request path, without query string
    fn path(&self) -> &str;
    /// Decoded query parameters, in request order
    fn query_params(&self) -> &[(String, String)];
    /// Cookie value by name
    fn cookie(&self, name: &str) -> Option<&str>;
    /// Header value by (case-insensitive) name
    fn header(&self, name: &str) -> Option<&str>;

    /// First value of a query parameter
    fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn user_agent(&self) -> Option<&str> {
        self.header(USER_AGENT.as_str())
    }
}

/// Owned request parts with query and cookies already parsed.
#[derive(Debug, Clone)]
pub struct HttpRequestParts {
    pub method: http::Method,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub cookies: CookieJar,
    pub headers: HeaderMap,
}

impl HttpRequestParts {
    /// Builds the request view from `http` parts.
    ///
    /// The scheme comes from the URI, then `X-Forwarded-Proto`, and defaults to
    /// `https`. The port comes from the host, then `X-Forwarded-Port`, then the
    /// scheme default.
    pub fn from_parts(parts: &http::request::Parts) -> Self {
        let headers = parts.headers.clone();
        let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        let scheme = parts
            .uri
            .scheme_str()
            .or_else(|| header_str("x-forwarded-proto"))
            .unwrap_or("https")
            .to_ascii_lowercase();

        let host = header_str(HOST.as_str())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();

        let port = port_from_host(&host)
            .or_else(|| parts.uri.port_u16())
            .or_else(|| header_str("x-forwarded-port").and_then(|p| p.parse().ok()))
            .unwrap_or(if scheme == "http" { 80 } else { 443 });

        let query = parts
            .uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let cookies = CookieJar::from_headers(&headers);

        Self {
            method: parts.method.clone(),
            scheme,
            host,
            port,
            path: parts.uri.path().to_string(),
            query,
            cookies,
            headers,
        }
    }
}

pub(crate) fn port_from_host(host: &str) -> Option<u16> {
    // bracketed IPv6 literals contain colons of their own
    let after_bracket = host.rsplit(']').next().unwrap_or(host);
    after_bracket.rsplit_once(':')?.1.parse().ok()
}

impl RequestParts for HttpRequestParts {
    fn method(&self) -> &str {
        self.method.as_str()
    }

    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|c| c.value())
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Header carrying the authenticated user id
pub const FORWARDED_USER_HEADER: &str = "x-forwarded-user";
/// CGI-style remote user header
pub const REMOTE_USER_HEADER: &str = "remote-user";
/// Verification marker header, always `SUCCESS` when present
pub const CLIENT_VERIFY_HEADER: &str = "x-client-verify";
/// Raw identity token header
pub const CLIENT_ID_TOKEN_HEADER: &str = "x-client-idtoken";

/// Identity resolved for a request that is allowed through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// `sub` claim without its `@realm` suffix
    pub user: String,
    /// Raw identity token the user presented
    pub id_token: String,
    /// Token expiration time
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    /// Forwarded-identity fields for the downstream handler
    pub fn forwarded_headers(&self) -> Vec<(HeaderName, String)> {
        vec![
            (
                HeaderName::from_static(FORWARDED_USER_HEADER),
                self.user.clone(),
            ),
            (HeaderName::from_static(REMOTE_USER_HEADER), self.user.clone()),
            (
                HeaderName::from_static(CLIENT_VERIFY_HEADER),
                "SUCCESS".to_string(),
            ),
            (
                HeaderName::from_static(CLIENT_ID_TOKEN_HEADER),
                self.id_token.clone(),
            ),
        ]
    }

    /// Overwrites the forwarded-identity headers, dropping any client-supplied values
    pub fn apply_to(&self, headers: &mut HeaderMap) {
        for (name, value) in self.forwarded_headers() {
            headers.remove(&name);
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(name, value);
            }
        }
    }
}

/// Outcome of [`crate::interceptor::SsoInterceptor::authenticate`]
#[derive(Debug, Clone)]
pub enum InterceptResult {
    /// Authenticated: invoke the downstream handler
    PassThrough(Identity),
    /// Answer the client directly
    Respond(InterceptResponse),
}

/// Builds a `Set-Cookie` entry for the whole site.
///
/// Every cookie this crate emits is `Secure` and `HttpOnly`. Without `expires`
/// the cookie lives for the browser session; without `same_site` the attribute
/// is omitted.
pub fn site_cookie(
    name: &str,
    value: String,
    domain: String,
    expires: Option<OffsetDateTime>,
    same_site: Option<SameSite>,
) -> Cookie<'static> {
    let mut cookie = Cookie::build((name.to_string(), value))
        .http_only(true)
        .secure(true)
        .path("/");

    if !domain.is_empty() {
        cookie = cookie.domain(domain);
    }
    if let Some(expires) = expires {
        cookie = cookie.expires(expires);
    }
    if let Some(same_site) = same_site {
        cookie = cookie.same_site(same_site);
    }

    cookie.build()
}

/// JSON body returned on the JS-SSO endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoStatus {
    pub is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authn_endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Empty,
    Text(String),
    Json(SsoStatus),
}

/// Response produced when the interceptor answers the client itself
#[derive(Debug, Clone)]
pub struct InterceptResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub cookies: Vec<Cookie<'static>>,
    pub body: ResponseBody,
}

impl InterceptResponse {
    pub fn new(status: StatusCode, body: ResponseBody) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body,
        }
    }

    /// 307 to `location`
    pub fn redirect(location: &str) -> Self {
        let mut response = Self::new(StatusCode::TEMPORARY_REDIRECT, ResponseBody::Empty);
        if let Ok(value) = HeaderValue::from_str(location) {
            response.headers.insert(LOCATION, value);
        }
        response
    }

    /// 200 with a JS-SSO status document
    pub fn json(status: SsoStatus) -> Self {
        Self::new(StatusCode::OK, ResponseBody::Json(status))
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::new(status, ResponseBody::Text(text.into()))
    }

    pub fn with_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Converts into an `http` response whose body type accepts a `String`.
    pub fn into_http<B: From<String>>(self) -> http::Response<B> {
        let (content_type, body) = match self.body {
            ResponseBody::Empty => (None, String::new()),
            ResponseBody::Text(text) => (Some("text/plain; charset=utf-8"), text),
            ResponseBody::Json(status) => (
                Some("application/json"),
                serde_json::to_string(&status).unwrap_or_default(),
            ),
        };

        let mut response = http::Response::new(B::from(body));
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        headers.extend(self.headers);
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        for cookie in self.cookies {
            if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
                headers.append(SET_COOKIE, value);
            }
        }
        response
    }
}
