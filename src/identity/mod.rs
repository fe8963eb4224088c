//! Local identities and the collaborators that persist and enrich them.
//!
//! The host application owns the identity record type; this crate only asks
//! it to implement [`Identity`]. Records are read and written through the
//! [`IdentityStore`] collaborator and filled from authority data by an
//! ordered pipeline of [`ImportHandler`]s. The resolution state machine
//! itself lives in [`IdentityResolver`].

mod resolver;

pub use resolver::{IdentityResolver, IdentityResolverBuilder};

use dashmap::DashMap;

use crate::Result;
use crate::claims::ClaimSet;

/// Capability surface an identity record exposes to the guard and resolver.
///
/// The two provided methods are the extension points: override
/// [`correlation_claim`](Identity::correlation_claim) to correlate tokens by
/// a claim other than `sub`, and [`attach_claims`](Identity::attach_claims)
/// to hold the request's claim set on the record for the duration of the
/// request.
pub trait Identity: Send + Sync + 'static {
    /// Stable identifier correlating this record with the authority subject.
    fn identifier(&self) -> &str;

    /// Set the identifier when the record is first imported.
    fn set_identifier(&mut self, identifier: &str);

    /// Name of the claim whose value identifies this record.
    #[must_use]
    fn correlation_claim() -> &'static str
    where
        Self: Sized,
    {
        crate::claims::SUBJECT
    }

    /// Attach the request's claim set to the record.
    ///
    /// The default does nothing; the attached claims are transient and never
    /// persisted.
    fn attach_claims(&mut self, _claims: &ClaimSet) {}
}

/// Ordered mutator mapping authority data onto an identity record.
///
/// Import and refresh share the same pipeline, so handlers must be
/// idempotent. Handlers run in the order they were registered on the
/// resolver.
pub trait ImportHandler<U>: Send + Sync {
    /// Map claims and userinfo onto the record.
    fn apply(&self, identity: &mut U, claims: &ClaimSet, userinfo: &ClaimSet) -> Result<()>;
}

/// Storage collaborator for identity records.
///
/// Implementations must be `Send + Sync`; the store is shared across request
/// tasks.
#[async_trait::async_trait]
pub trait IdentityStore<U>: Send + Sync + 'static {
    /// Look up a record by its correlation identifier.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<U>>;

    /// Persist a record, replacing any previous version.
    async fn save(&self, identity: &U) -> Result<()>;
}

/// In-memory [`IdentityStore`] backed by a `DashMap`.
///
/// Suitable for tests and single-process deployments.
pub struct InMemoryIdentityStore<U> {
    records: DashMap<String, U>,
}

impl<U> InMemoryIdentityStore<U> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<U> Default for InMemoryIdentityStore<U> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<U> IdentityStore<U> for InMemoryIdentityStore<U>
where
    U: Identity + Clone,
{
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<U>> {
        Ok(self.records.get(identifier).map(|r| r.clone()))
    }

    async fn save(&self, identity: &U) -> Result<()> {
        self.records
            .insert(identity.identifier().to_string(), identity.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct TestUser {
        id: String,
        email: Option<String>,
    }

    impl Identity for TestUser {
        fn identifier(&self) -> &str {
            &self.id
        }

        fn set_identifier(&mut self, identifier: &str) {
            self.id = identifier.to_string();
        }
    }

    #[tokio::test]
    async fn store_round_trips_records() {
        let store = InMemoryIdentityStore::new();
        let user = TestUser {
            id: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
        };

        store.save(&user).await.unwrap();

        let found = store.find_by_identifier("alice").await.unwrap();
        assert_eq!(found, Some(user));
        assert!(
            store
                .find_by_identifier("bob")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn save_replaces_previous_record() {
        let store = InMemoryIdentityStore::new();
        let mut user = TestUser {
            id: "alice".to_string(),
            email: None,
        };

        store.save(&user).await.unwrap();
        user.email = Some("alice@example.com".to_string());
        store.save(&user).await.unwrap();

        assert_eq!(store.len(), 1);
        let found = store.find_by_identifier("alice").await.unwrap().unwrap();
        assert_eq!(found.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn default_correlation_claim_is_subject() {
        assert_eq!(TestUser::correlation_claim(), crate::claims::SUBJECT);
    }

    #[test]
    fn attach_claims_defaults_to_a_no_op() {
        let mut user = TestUser::default();
        let before = user.clone();
        user.attach_claims(&ClaimSet::new());
        assert_eq!(user, before);
    }
}
