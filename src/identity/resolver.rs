//! `IdentityResolver` maps verified token claims to a local identity.
//!
//! Resolution is a small state machine. The correlation claim (by default
//! `sub`) is looked up in the [`IdentityStore`]:
//!
//! - **not found**: a fresh record is imported from the authority's userinfo
//!   endpoint, run through the handler pipeline, saved, and a refresh
//!   checkpoint is written.
//! - **found, checkpoint live**: the record is returned as-is with no
//!   authority traffic.
//! - **found, checkpoint expired**: the record is re-imported through the
//!   same pipeline and saved, and the checkpoint is renewed.
//!
//! The checkpoint cache de-duplicates refreshes, it does not serialize them;
//! see [`TtlCache`] for the concurrency caveat. A failed import or refresh
//! leaves the store and the checkpoint untouched.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use super::{Identity, IdentityStore, ImportHandler};
use crate::authority::AuthorityClient;
use crate::cache::TtlCache;
use crate::claims::ClaimSet;
use crate::{Error, Result};

/// Resolves verified claims to a local identity record.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use sso_guard::authority::HttpAuthorityClient;
/// use sso_guard::cache::TtlCache;
/// use sso_guard::config::SsoConfig;
/// use sso_guard::identity::{Identity, IdentityResolver, InMemoryIdentityStore};
///
/// #[derive(Default, Clone)]
/// struct Account {
///     id: String,
/// }
///
/// impl Identity for Account {
///     fn identifier(&self) -> &str {
///         &self.id
///     }
///
///     fn set_identifier(&mut self, identifier: &str) {
///         self.id = identifier.to_string();
///     }
/// }
///
/// let config = SsoConfig {
///     authority: "https://sso.example.com".to_string(),
///     ..SsoConfig::default()
/// };
/// let authority = Arc::new(HttpAuthorityClient::from_config(&config).unwrap());
///
/// let _resolver = IdentityResolver::<Account>::builder(
///     Arc::new(InMemoryIdentityStore::new()),
///     authority,
///     Arc::new(TtlCache::new()),
///     config.regular_update(),
/// )
/// .build();
/// ```
pub struct IdentityResolver<U> {
    store: Arc<dyn IdentityStore<U>>,
    authority: Arc<dyn AuthorityClient>,
    checkpoints: Arc<TtlCache<String>>,
    handlers: Vec<Arc<dyn ImportHandler<U>>>,
    regular_update: Duration,
}

impl<U> IdentityResolver<U>
where
    U: Identity + Default,
{
    /// Start building a resolver.
    #[must_use]
    pub fn builder(
        store: Arc<dyn IdentityStore<U>>,
        authority: Arc<dyn AuthorityClient>,
        checkpoints: Arc<TtlCache<String>>,
        regular_update: Duration,
    ) -> IdentityResolverBuilder<U> {
        IdentityResolverBuilder {
            store,
            authority,
            checkpoints,
            handlers: Vec::new(),
            regular_update,
        }
    }

    /// Resolve `claims` to a local identity, importing or refreshing it from
    /// the authority as needed.
    ///
    /// `authorization` is the caller's own `Authorization` header value; the
    /// userinfo endpoint answers for the token's subject, so the caller's
    /// token is forwarded rather than a service token.
    ///
    /// Fails with [`Error::MalformedToken`] when the correlation claim is
    /// absent, and wraps any import or refresh failure in
    /// [`Error::UnprocessableIdentity`]. Store lookup errors pass through
    /// unwrapped.
    pub async fn resolve(&self, claims: &ClaimSet, authorization: &str) -> Result<U> {
        let claim = U::correlation_claim();
        let Some(identifier) = claims.string(claim) else {
            return Err(Error::MalformedToken(format!(
                "token carries no '{claim}' claim"
            )));
        };
        let identifier = identifier.to_string();

        match self.store.find_by_identifier(&identifier).await? {
            Some(existing) => {
                self.refresh_if_due(identifier, existing, claims, authorization)
                    .await
            }
            None => self.import(identifier, claims, authorization).await,
        }
    }

    /// Import a brand-new identity from the authority.
    ///
    /// The checkpoint is written only after the record has been saved, so a
    /// failed import is retried on the next request.
    async fn import(
        &self,
        identifier: String,
        claims: &ClaimSet,
        authorization: &str,
    ) -> Result<U> {
        debug!(identifier = %identifier, "Importing identity from authority");

        let mut identity = U::default();
        identity.set_identifier(&identifier);

        if let Err(e) = self
            .apply_authority_data(&mut identity, claims, authorization)
            .await
        {
            error!(identifier = %identifier, error = %e, "Identity import failed");
            return Err(Error::unprocessable(e));
        }

        self.checkpoints
            .put(&identifier, identifier.clone(), self.regular_update);
        Ok(identity)
    }

    /// Re-import an existing identity unless its checkpoint is still live.
    async fn refresh_if_due(
        &self,
        identifier: String,
        mut identity: U,
        claims: &ClaimSet,
        authorization: &str,
    ) -> Result<U> {
        let marker = identifier.clone();
        let record = &mut identity;
        let outcome = self
            .checkpoints
            .remember(&identifier, self.regular_update, || async move {
                debug!(identifier = %marker, "Refreshing identity from authority");
                self.apply_authority_data(record, claims, authorization)
                    .await?;
                Ok(marker)
            })
            .await;

        match outcome {
            Ok(_) => Ok(identity),
            Err(e) => {
                error!(identifier = %identifier, error = %e, "Identity refresh failed");
                Err(Error::unprocessable(e))
            }
        }
    }

    /// Fetch userinfo, run the handler pipeline in order, and persist.
    async fn apply_authority_data(
        &self,
        identity: &mut U,
        claims: &ClaimSet,
        authorization: &str,
    ) -> Result<()> {
        let userinfo = self.authority.fetch_userinfo(authorization).await?;
        for handler in &self.handlers {
            handler.apply(identity, claims, &userinfo)?;
        }
        self.store.save(identity).await?;
        Ok(())
    }
}

/// Builder for [`IdentityResolver`].
pub struct IdentityResolverBuilder<U> {
    store: Arc<dyn IdentityStore<U>>,
    authority: Arc<dyn AuthorityClient>,
    checkpoints: Arc<TtlCache<String>>,
    handlers: Vec<Arc<dyn ImportHandler<U>>>,
    regular_update: Duration,
}

impl<U> IdentityResolverBuilder<U>
where
    U: Identity + Default,
{
    /// Append an import handler to the pipeline.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn ImportHandler<U>>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Finalise and produce an [`IdentityResolver`].
    #[must_use]
    pub fn build(self) -> IdentityResolver<U> {
        IdentityResolver {
            store: self.store,
            authority: self.authority,
            checkpoints: self.checkpoints,
            handlers: self.handlers,
            regular_update: self.regular_update,
        }
    }
}
