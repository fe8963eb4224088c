//! Client-credentials tokens for outbound service-to-service calls.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::AuthorityClient;
use crate::Result;
use crate::cache::TtlCache;
use crate::config::ClientCredentialsConfig;

const TOKEN_CACHE_KEY: &str = "client-credentials-token";

/// Acquires and caches an access token via the client-credentials grant.
///
/// The token is cached for two minutes less than its reported lifetime so it
/// never expires mid-flight on an outbound call. Tokens whose remaining
/// lifetime after the margin would be zero or negative are returned but not
/// cached.
pub struct ClientCredentialsTokenSource {
    authority: Arc<dyn AuthorityClient>,
    cache: Arc<TtlCache<String>>,
    grant: ClientCredentialsConfig,
}

impl ClientCredentialsTokenSource {
    /// Create a token source over an authority client and an injected cache.
    #[must_use]
    pub fn new(
        authority: Arc<dyn AuthorityClient>,
        cache: Arc<TtlCache<String>>,
        grant: ClientCredentialsConfig,
    ) -> Self {
        Self {
            authority,
            cache,
            grant,
        }
    }

    /// The current access token, from cache or a fresh grant.
    ///
    /// Fails with
    /// [`Error::TokenRequestFailed`](crate::Error::TokenRequestFailed) when
    /// the authority rejects the grant; nothing is cached in that case.
    pub async fn token(&self) -> Result<String> {
        if let Some(token) = self.cache.get(TOKEN_CACHE_KEY) {
            return Ok((*token).clone());
        }

        let response = self.authority.request_token(&self.grant).await?;

        if let Some(expires_in) = response.expires_in {
            let lifetime_minutes = (expires_in / 60).saturating_sub(2);
            if lifetime_minutes > 0 {
                debug!(
                    client_id = %self.grant.client_id,
                    lifetime_minutes,
                    "Caching client-credentials token"
                );
                self.cache.put(
                    TOKEN_CACHE_KEY,
                    response.access_token.clone(),
                    Duration::from_secs(lifetime_minutes * 60),
                );
            }
        }

        Ok(response.access_token)
    }

    /// The current access token as an `Authorization` header value.
    pub async fn bearer_token(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.token().await?))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use jsonwebtoken::jwk::JwkSet;

    use super::*;
    use crate::authority::{CreateUserRequest, DiscoveryDocument, TokenGrantResponse};
    use crate::claims::ClaimSet;
    use crate::{Error, Result};

    struct GrantAuthority {
        grants: AtomicU32,
        expires_in: Option<u64>,
        status: Option<u16>,
    }

    impl GrantAuthority {
        fn succeeding(expires_in: Option<u64>) -> Self {
            Self {
                grants: AtomicU32::new(0),
                expires_in,
                status: None,
            }
        }

        fn rejecting(status: u16) -> Self {
            Self {
                grants: AtomicU32::new(0),
                expires_in: None,
                status: Some(status),
            }
        }
    }

    #[async_trait::async_trait]
    impl AuthorityClient for GrantAuthority {
        async fn fetch_public_keys(&self) -> Result<JwkSet> {
            unreachable!("not used by the token source")
        }

        async fn fetch_discovery_document(&self) -> Result<DiscoveryDocument> {
            unreachable!("not used by the token source")
        }

        async fn fetch_userinfo(&self, _authorization: &str) -> Result<ClaimSet> {
            unreachable!("not used by the token source")
        }

        async fn request_token(
            &self,
            _grant: &ClientCredentialsConfig,
        ) -> Result<TokenGrantResponse> {
            let call = self.grants.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.status {
                return Err(Error::TokenRequestFailed { status });
            }
            Ok(TokenGrantResponse {
                access_token: format!("token-{call}"),
                token_type: Some("Bearer".to_string()),
                expires_in: self.expires_in,
                scope: None,
            })
        }

        async fn create_user(
            &self,
            _authorization: &str,
            _request: &CreateUserRequest,
        ) -> Result<String> {
            unreachable!("not used by the token source")
        }
    }

    fn source(authority: Arc<GrantAuthority>) -> ClientCredentialsTokenSource {
        ClientCredentialsTokenSource::new(
            authority,
            Arc::new(TtlCache::new()),
            ClientCredentialsConfig {
                client_id: "billing-service".to_string(),
                client_secret: "s3cret".to_string(),
                scope: "billing.read".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn token_is_cached_for_reported_lifetime() {
        let authority = Arc::new(GrantAuthority::succeeding(Some(3600)));
        let source = source(authority.clone());

        assert_eq!(source.token().await.unwrap(), "token-0");
        assert_eq!(source.token().await.unwrap(), "token-0");

        assert_eq!(authority.grants.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_lived_token_is_returned_but_not_cached() {
        // 120 s lifetime minus the 2-minute margin leaves nothing to cache.
        let authority = Arc::new(GrantAuthority::succeeding(Some(120)));
        let source = source(authority.clone());

        assert_eq!(source.token().await.unwrap(), "token-0");
        assert_eq!(source.token().await.unwrap(), "token-1");

        assert_eq!(authority.grants.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_without_lifetime_is_not_cached() {
        let authority = Arc::new(GrantAuthority::succeeding(None));
        let source = source(authority.clone());

        source.token().await.unwrap();
        source.token().await.unwrap();

        assert_eq!(authority.grants.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bearer_token_carries_scheme_prefix() {
        let authority = Arc::new(GrantAuthority::succeeding(Some(3600)));
        let source = source(authority);

        assert_eq!(source.bearer_token().await.unwrap(), "Bearer token-0");
    }

    #[tokio::test]
    async fn rejected_grant_surfaces_status_and_caches_nothing() {
        let authority = Arc::new(GrantAuthority::rejecting(400));
        let source = source(authority.clone());

        assert!(matches!(
            source.token().await,
            Err(Error::TokenRequestFailed { status: 400 })
        ));
        assert!(matches!(
            source.token().await,
            Err(Error::TokenRequestFailed { status: 400 })
        ));

        assert_eq!(authority.grants.load(Ordering::SeqCst), 2);
    }
}
