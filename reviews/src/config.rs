use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const ENV_STORE_DOMAIN: &str = "SHOPIFY_STORE_DOMAIN";
pub const ENV_ACCESS_TOKEN: &str = "SHOPIFY_API_TOKEN";
pub const ENV_PORT: &str = "PORT";
pub const ENV_CORS_ALLOWED_ORIGIN: &str = "CORS_ALLOWED_ORIGIN";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Listener and admin listener cannot share {0}")]
    ListenerConflict(String),

    #[error("Store domain is not set (config `store.domain` or SHOPIFY_STORE_DOMAIN)")]
    MissingStoreDomain,

    #[error("Store access token is not set (config `store.access_token` or SHOPIFY_API_TOKEN)")]
    MissingAccessToken,

    #[error("Invalid PORT value: {0}")]
    InvalidPortValue(String),

    #[error("Store domain does not form a valid URL: {0}")]
    InvalidStoreDomain(String),
}

/// Review relay configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Public listener serving the review endpoints
    #[serde(default)]
    pub listener: Listener,
    /// Admin listener serving health and readiness
    #[serde(default = "Listener::admin_default")]
    pub admin_listener: Listener,
    /// Remote metafield store
    #[serde(default)]
    pub store: StoreConfig,
    /// Cross-origin policy. No CORS headers are sent when absent.
    #[serde(default)]
    pub cors: Option<CorsConfig>,
}

impl Config {
    /// Overlays values found through `lookup` onto the config.
    ///
    /// `lookup` is normally `|key| std::env::var(key).ok()`; it is only
    /// consulted here, once, at startup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(domain) = lookup(ENV_STORE_DOMAIN) {
            self.store.domain = domain;
        }
        if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
            self.store.access_token = token;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.listener.port = port
                .trim()
                .parse()
                .map_err(|_| ValidationError::InvalidPortValue(port.clone()))?;
        }
        if let Some(origin) = lookup(ENV_CORS_ALLOWED_ORIGIN) {
            self.cors = Some(CorsConfig {
                allowed_origin: origin,
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.listener.overlaps(&self.admin_listener) {
            return Err(ValidationError::ListenerConflict(format!(
                "{}:{}",
                self.listener.host, self.listener.port
            )));
        }

        self.store.validate()
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }

    /// Whether both listeners would claim the same socket. A wildcard host
    /// binds the port on every interface.
    fn overlaps(&self, other: &Listener) -> bool {
        self.port == other.port
            && (self.host == other.host || self.is_wildcard() || other.is_wildcard())
    }

    fn is_wildcard(&self) -> bool {
        matches!(self.host.as_str(), "0.0.0.0" | "::" | "[::]")
    }

    fn admin_default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 10001,
        }
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 10000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listener: Listener::default(),
            admin_listener: Listener::admin_default(),
            store: StoreConfig::default(),
            cors: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Shop domain, e.g. "your-store.myshopify.com". Not needed when
    /// `base_url` is set.
    #[serde(default)]
    pub domain: String,
    /// Admin API access token sent as `X-Shopify-Access-Token`
    #[serde(default)]
    pub access_token: String,
    /// Admin REST API version segment of the endpoint path
    #[serde(default = "StoreConfig::default_api_version")]
    pub api_version: String,
    /// Overrides `https://{domain}` as the API origin
    #[serde(default)]
    pub base_url: Option<Url>,
}

impl StoreConfig {
    fn default_api_version() -> String {
        "2023-04".into()
    }

    /// Origin all Admin API requests are sent to.
    pub fn origin(&self) -> Result<Url, ValidationError> {
        match &self.base_url {
            Some(url) => Ok(url.clone()),
            None => Url::parse(&format!("https://{}", self.domain.trim()))
                .map_err(|e| ValidationError::InvalidStoreDomain(e.to_string())),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_url.is_none() && self.domain.trim().is_empty() {
            return Err(ValidationError::MissingStoreDomain);
        }
        if self.access_token.is_empty() {
            return Err(ValidationError::MissingAccessToken);
        }
        self.origin().map(|_| ())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            domain: String::new(),
            access_token: String::new(),
            api_version: Self::default_api_version(),
            base_url: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CorsConfig {
    /// The single origin allowed to call the relay from a browser
    pub allowed_origin: String,
}
