//! Configuration management.
//!
//! One strongly-typed [`SsoConfig`] is assembled at startup from an optional
//! YAML file plus `SSO_`-prefixed environment variables (nested fields split
//! on `__`, e.g. `SSO_CLIENT_CREDENTIALS__CLIENT_SECRET`) and passed to the
//! components that need it. There are no runtime config lookups.

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SsoConfig {
    /// Base URL of the identity authority. Used for the issuer check and as
    /// the base for every authority HTTP call.
    pub authority: String,
    /// Expected audience. When unset the audience check is skipped.
    pub audience: Option<String>,
    /// Explicit audience-check toggle; `false` skips the check even when an
    /// audience is configured.
    pub validate_audience: bool,
    /// Verify the authority's TLS certificate. Disable only against
    /// development authorities with self-signed certificates.
    pub authority_verify_ssl: bool,
    /// Request timeout for authority calls, in seconds.
    pub http_timeout_secs: u64,
    /// Refresh cadence for local identities, in minutes. An identity whose
    /// checkpoint is older than this is refreshed from the authority.
    pub regular_update_minutes: u64,
    /// Relative paths of the authority endpoints.
    pub urls: EndpointConfig,
    /// Cache lifetimes.
    pub cache: CacheConfig,
    /// Client-credentials grant parameters.
    pub client_credentials: ClientCredentialsConfig,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            authority: String::new(),
            audience: None,
            validate_audience: true,
            authority_verify_ssl: true,
            http_timeout_secs: 30,
            regular_update_minutes: 120,
            urls: EndpointConfig::default(),
            cache: CacheConfig::default(),
            client_credentials: ClientCredentialsConfig::default(),
        }
    }
}

/// Relative paths of the authority endpoints, joined onto `authority`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Token endpoint (client-credentials grant).
    pub token: String,
    /// Userinfo endpoint.
    pub userinfo: String,
    /// User-creation endpoint.
    pub create_user: String,
    /// JWKS endpoint (public signing keys).
    pub public_keys: String,
    /// Discovery document endpoint.
    pub discovery_document: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            token: "/connect/token".to_string(),
            userinfo: "/connect/userinfo".to_string(),
            create_user: "/api/v1/users".to_string(),
            public_keys: "/.well-known/openid-configuration/jwks".to_string(),
            discovery_document: "/.well-known/openid-configuration".to_string(),
        }
    }
}

/// Cache lifetimes for authority-supplied values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for the signing key set, in seconds.
    pub lifetime_secs: u64,
    /// TTL for the discovery document, in seconds.
    pub long_lifetime_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: 60,
            long_lifetime_secs: 600,
        }
    }
}

/// Parameters for the client-credentials grant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientCredentialsConfig {
    /// OAuth2 client identifier.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Space-delimited scopes to request.
    pub scope: String,
}

impl SsoConfig {
    /// Load configuration from file and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("SSO_").split("__"));

        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }

    /// Checkpoint TTL as a [`Duration`].
    #[must_use]
    pub fn regular_update(&self) -> Duration {
        Duration::from_secs(self.regular_update_minutes * 60)
    }

    /// Signing-key-set TTL as a [`Duration`].
    #[must_use]
    pub fn key_lifetime(&self) -> Duration {
        Duration::from_secs(self.cache.lifetime_secs)
    }

    /// Discovery-document TTL as a [`Duration`].
    #[must_use]
    pub fn long_lifetime(&self) -> Duration {
        Duration::from_secs(self.cache.long_lifetime_secs)
    }

    /// Authority request timeout as a [`Duration`].
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
