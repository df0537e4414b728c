use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::time::Duration;

/// Default Midway identity provider host
pub const DEFAULT_MIDWAY_PROVIDER_HOST: &str = "midway-auth.amazon.com";
/// Default Federate identity provider host
pub const DEFAULT_FEDERATE_PROVIDER_HOST: &str = "idp.federate.amazon.com";

const DEFAULT_JWKS_TIMEOUT_SECS: u64 = 10;

/// Identity provider flavour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Internal Midway SSO, callback URI derived from each request
    #[default]
    Midway,
    /// Generic OAuth2/OIDC federation, pre-registered callback URI
    Federate,
}

/// Identity provider endpoints and client registration.
///
/// Immutable once built; one value per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Authorization endpoint for JS-SSO requests
    pub auth_path: String,
    /// Authorization endpoint for browser redirects
    pub auth_redirect_path: String,
    /// Registered client id; derived from the request origin when `None`
    pub client_id: Option<String>,
    /// Provider host, also used to build the expected issuer
    pub identity_provider_host: String,
    /// Key set endpoint
    pub jwks_url: String,
    /// Fixed callback URI (absolute, or a path on the request host); derived when `None`
    pub redirect_uri: Option<String>,
}

impl ProviderConfig {
    /// Midway preset for the given provider host
    pub fn midway(host: &str) -> Self {
        Self {
            auth_path: format!("https://{host}/SSO"),
            auth_redirect_path: format!("https://{host}/SSO/redirect"),
            client_id: None,
            identity_provider_host: host.to_string(),
            jwks_url: format!("https://{host}/jwks.json"),
            redirect_uri: None,
        }
    }

    /// Federate preset for the given provider host
    pub fn federate(host: &str) -> Self {
        Self {
            auth_path: format!("https://{host}/api/oauth2/v1/authorize"),
            auth_redirect_path: format!("https://{host}/api/oauth2/v1/authorize"),
            client_id: None,
            identity_provider_host: host.to_string(),
            jwks_url: format!("https://{host}/api/oauth2/v2/certs"),
            redirect_uri: None,
        }
    }

    pub fn for_profile(profile: Profile, host: Option<&str>) -> Self {
        match profile {
            Profile::Midway => Self::midway(host.unwrap_or(DEFAULT_MIDWAY_PROVIDER_HOST)),
            Profile::Federate => Self::federate(host.unwrap_or(DEFAULT_FEDERATE_PROVIDER_HOST)),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = non_empty(Some(client_id.into()));
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = non_empty(Some(redirect_uri.into()));
        self
    }

    pub fn with_jwks_url(mut self, jwks_url: impl Into<String>) -> Self {
        self.jwks_url = jwks_url.into();
        self
    }

    pub fn with_auth_path(mut self, auth_path: impl Into<String>) -> Self {
        self.auth_path = auth_path.into();
        self
    }

    pub fn with_auth_redirect_path(mut self, auth_redirect_path: impl Into<String>) -> Self {
        self.auth_redirect_path = auth_redirect_path.into();
        self
    }

    /// Issuer expected in every identity token
    pub fn issuer(&self) -> String {
        format!("https://{}", self.identity_provider_host)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Serialized form of the provider configuration: a profile plus overrides
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub profile: Profile,
    pub identity_provider_host: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub jwks_url: Option<String>,
    pub auth_path: Option<String>,
    pub auth_redirect_path: Option<String>,
    /// Key set fetch timeout in seconds (default: 10)
    pub jwks_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            identity_provider_host: None,
            client_id: None,
            redirect_uri: None,
            jwks_url: None,
            auth_path: None,
            auth_redirect_path: None,
            jwks_timeout_secs: DEFAULT_JWKS_TIMEOUT_SECS,
        }
    }
}

impl ProviderSettings {
    /// Load settings from the `MIDWAY_SSO_CONFIG` environment variable (JSON)
    pub fn from_env() -> Result<Self> {
        let json = std::env::var("MIDWAY_SSO_CONFIG")
            .map_err(|_| anyhow!("MIDWAY_SSO_CONFIG environment variable not set"))?;
        let settings: ProviderSettings = serde_json::from_str(&json)
            .map_err(|e| anyhow!("Failed to parse MIDWAY_SSO_CONFIG: {e:?}"))?;
        Ok(settings)
    }

    pub fn jwks_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_timeout_secs)
    }

    /// Applies the overrides on top of the profile preset
    pub fn into_config(self) -> ProviderConfig {
        let host = non_empty(self.identity_provider_host);
        let mut config = ProviderConfig::for_profile(self.profile, host.as_deref());
        config.client_id = non_empty(self.client_id);
        config.redirect_uri = non_empty(self.redirect_uri);
        if let Some(jwks_url) = non_empty(self.jwks_url) {
            config.jwks_url = jwks_url;
        }
        if let Some(auth_path) = non_empty(self.auth_path) {
            config.auth_path = auth_path;
        }
        if let Some(auth_redirect_path) = non_empty(self.auth_redirect_path) {
            config.auth_redirect_path = auth_redirect_path;
        }
        config
    }
}
