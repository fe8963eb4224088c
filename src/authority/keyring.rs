//! Public signing keys with short-TTL caching.
//!
//! The authority rotates its signing keys; verifying tokens against a stale
//! set would reject freshly signed tokens. The key set is therefore cached
//! only briefly (60 s by default) and always replaced wholesale.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::JwkSet;
use tracing::debug;

use super::AuthorityClient;
use crate::Result;
use crate::cache::TtlCache;

const PUBLIC_KEYS_CACHE_KEY: &str = "public-keys";

/// Cached view of the authority's public signing keys.
pub struct KeyRing {
    authority: Arc<dyn AuthorityClient>,
    cache: Arc<TtlCache<JwkSet>>,
    ttl: Duration,
}

impl KeyRing {
    /// Create a key ring over an authority client and an injected cache.
    #[must_use]
    pub fn new(
        authority: Arc<dyn AuthorityClient>,
        cache: Arc<TtlCache<JwkSet>>,
        ttl: Duration,
    ) -> Self {
        Self {
            authority,
            cache,
            ttl,
        }
    }

    /// The current signing key set.
    ///
    /// Served from cache while unexpired; otherwise fetched, cached for the
    /// configured lifetime and returned. Fails with
    /// [`Error::AuthorityUnreachable`](crate::Error::AuthorityUnreachable)
    /// when the fetch fails; an expired entry is never served as a fallback.
    pub async fn keys(&self) -> Result<Arc<JwkSet>> {
        self.cache
            .remember(PUBLIC_KEYS_CACHE_KEY, self.ttl, || async {
                debug!("Refreshing signing key set from authority");
                self.authority.fetch_public_keys().await
            })
            .await
    }
}
