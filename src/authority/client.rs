//! HTTP client for the identity authority.
//!
//! [`AuthorityClient`] is the collaborator contract the rest of the crate
//! verifies against; [`HttpAuthorityClient`] is the production implementation
//! over `reqwest`. Every call here is uncached; the caching wrappers
//! ([`KeyRing`](super::KeyRing), [`DiscoveryCache`](super::DiscoveryCache),
//! [`ClientCredentialsTokenSource`](super::ClientCredentialsTokenSource))
//! decide when a call actually happens.

use std::collections::HashMap;

use jsonwebtoken::jwk::JwkSet;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::claims::ClaimSet;
use crate::config::{ClientCredentialsConfig, EndpointConfig, SsoConfig};
use crate::{Error, Result};

/// Discovery document published by the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// Issuer URL the authority signs tokens as.
    pub issuer: String,

    /// JWKS endpoint URL.
    pub jwks_uri: String,

    /// Token endpoint URL (optional).
    #[serde(default)]
    pub token_endpoint: Option<String>,

    /// Userinfo endpoint URL (optional).
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,

    /// End-session endpoint URL (optional).
    #[serde(default)]
    pub end_session_endpoint: Option<String>,

    /// Supported scopes (may be string or array depending on the authority).
    #[serde(default, deserialize_with = "deserialize_scopes")]
    pub scopes_supported: Vec<String>,

    /// Supported claims.
    #[serde(default)]
    pub claims_supported: Vec<String>,
}

/// Deserialize scopes that may be either a string or an array.
fn deserialize_scopes<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    match StringOrVec::deserialize(deserializer)? {
        StringOrVec::String(s) => Ok(s.split_whitespace().map(String::from).collect()),
        StringOrVec::Vec(v) => Ok(v),
    }
}

/// Response body of a successful client-credentials grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrantResponse {
    /// The access token to present on outbound calls.
    pub access_token: String,
    /// Token type, normally `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds, as reported by the authority.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Scopes actually granted.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Body of a user-creation call, prefilled from profile claims.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateUserRequest {
    /// Preferred e-mail address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Login name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Full display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Given name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Family name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    /// Telephone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl CreateUserRequest {
    /// Prefill the request from the standard profile claims.
    #[must_use]
    pub fn from_claims(claims: &ClaimSet) -> Self {
        let field = |name: &str| claims.string(name).map(str::to_owned);
        Self {
            email: field(crate::claims::EMAIL),
            username: field(crate::claims::PREFERRED_USERNAME),
            name: field(crate::claims::NAME),
            given_name: field(crate::claims::GIVEN_NAME),
            family_name: field(crate::claims::FAMILY_NAME),
            phone_number: field(crate::claims::PHONE_NUMBER),
        }
    }
}

/// Contract for talking to the authority.
///
/// Implementations must be `Send + Sync` because the client is shared across
/// request tasks behind an `Arc`.
#[async_trait::async_trait]
pub trait AuthorityClient: Send + Sync + 'static {
    /// Fetch the current public signing keys.
    async fn fetch_public_keys(&self) -> Result<JwkSet>;

    /// Fetch the discovery document.
    async fn fetch_discovery_document(&self) -> Result<DiscoveryDocument>;

    /// Fetch userinfo for the caller, forwarding the caller's own
    /// `Authorization` header value verbatim.
    async fn fetch_userinfo(&self, authorization: &str) -> Result<ClaimSet>;

    /// Perform a client-credentials grant.
    ///
    /// Returns [`Error::TokenRequestFailed`] for any non-2xx response, after
    /// logging authority, status and body.
    async fn request_token(&self, grant: &ClientCredentialsConfig) -> Result<TokenGrantResponse>;

    /// Create a user record at the authority.
    ///
    /// `authorization` is a client-credentials bearer header value. Returns
    /// the identifier of the created user.
    async fn create_user(&self, authorization: &str, request: &CreateUserRequest)
    -> Result<String>;
}

/// `reqwest`-backed [`AuthorityClient`].
pub struct HttpAuthorityClient {
    http: Client,
    authority: String,
    urls: EndpointConfig,
}

impl HttpAuthorityClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the authority URL does not parse or the HTTP
    /// client cannot be constructed.
    pub fn from_config(config: &SsoConfig) -> Result<Self> {
        Url::parse(&config.authority)
            .map_err(|e| Error::Config(format!("Invalid authority URL {:?}: {e}", config.authority)))?;

        let http = Client::builder()
            .timeout(config.http_timeout())
            .danger_accept_invalid_certs(!config.authority_verify_ssl)
            .build()?;

        Ok(Self {
            http,
            authority: config.authority.trim_end_matches('/').to_string(),
            urls: config.urls.clone(),
        })
    }

    /// Absolute URL of an authority endpoint.
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.authority, path.trim_start_matches('/'))
    }

    /// GET a JSON document from an authority endpoint.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        authorization: Option<&str>,
    ) -> Result<T> {
        let mut request = self.http.get(url);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::AuthorityUnreachable(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::AuthorityUnreachable(format!(
                "{url} returned HTTP {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::AuthorityUnreachable(format!("{url}: invalid JSON: {e}")))
    }
}

#[async_trait::async_trait]
impl AuthorityClient for HttpAuthorityClient {
    async fn fetch_public_keys(&self) -> Result<JwkSet> {
        let url = self.endpoint(&self.urls.public_keys);
        debug!(url = %url, "Fetching public signing keys");
        self.get_json(&url, None).await
    }

    async fn fetch_discovery_document(&self) -> Result<DiscoveryDocument> {
        let url = self.endpoint(&self.urls.discovery_document);
        debug!(url = %url, "Fetching discovery document");
        self.get_json(&url, None).await
    }

    async fn fetch_userinfo(&self, authorization: &str) -> Result<ClaimSet> {
        let url = self.endpoint(&self.urls.userinfo);
        debug!(url = %url, "Fetching userinfo");
        self.get_json(&url, Some(authorization)).await
    }

    async fn request_token(&self, grant: &ClientCredentialsConfig) -> Result<TokenGrantResponse> {
        let url = self.endpoint(&self.urls.token);

        let mut params = HashMap::new();
        params.insert("client_id", grant.client_id.as_str());
        params.insert("client_secret", grant.client_secret.as_str());
        params.insert("grant_type", "client_credentials");
        params.insert("scope", grant.scope.as_str());

        let response = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::AuthorityUnreachable(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(
                authority = %self.authority,
                status = %status,
                body = %body,
                "Client-credentials token request failed"
            );
            return Err(Error::TokenRequestFailed {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::AuthorityUnreachable(format!("{url}: invalid token response: {e}")))
    }

    async fn create_user(
        &self,
        authorization: &str,
        request: &CreateUserRequest,
    ) -> Result<String> {
        let url = self.endpoint(&self.urls.create_user);
        debug!(url = %url, "Creating user at authority");

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::AuthorityUnreachable(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(
                authority = %self.authority,
                status = %status,
                body = %body,
                "User creation at authority failed"
            );
            return Err(Error::AuthorityUnreachable(format!(
                "{url} returned HTTP {status}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::AuthorityUnreachable(format!("{url}: invalid JSON: {e}")))?;

        match body.get("id") {
            Some(serde_json::Value::String(id)) => Ok(id.clone()),
            Some(serde_json::Value::Number(id)) => Ok(id.to_string()),
            _ => Err(Error::AuthorityUnreachable(format!(
                "{url}: response carries no user id"
            ))),
        }
    }
}
