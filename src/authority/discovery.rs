//! Discovery document with long-TTL caching.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::{AuthorityClient, DiscoveryDocument};
use crate::Result;
use crate::cache::TtlCache;

const DISCOVERY_CACHE_KEY: &str = "discovery";

/// Cached view of the authority's discovery document.
///
/// The document changes rarely, so it lives in cache far longer (600 s by
/// default) than the signing keys. It is a convenience for hosts that want
/// dynamic endpoint metadata; token verification itself never needs it.
pub struct DiscoveryCache {
    authority: Arc<dyn AuthorityClient>,
    cache: Arc<TtlCache<DiscoveryDocument>>,
    ttl: Duration,
}

impl DiscoveryCache {
    /// Create a discovery cache over an authority client.
    #[must_use]
    pub fn new(
        authority: Arc<dyn AuthorityClient>,
        cache: Arc<TtlCache<DiscoveryDocument>>,
        ttl: Duration,
    ) -> Self {
        Self {
            authority,
            cache,
            ttl,
        }
    }

    /// The current discovery document, fetched on first use.
    pub async fn document(&self) -> Result<Arc<DiscoveryDocument>> {
        self.cache
            .remember(DISCOVERY_CACHE_KEY, self.ttl, || async {
                debug!("Refreshing discovery document from authority");
                self.authority.fetch_discovery_document().await
            })
            .await
    }
}
