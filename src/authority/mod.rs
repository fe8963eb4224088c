//! Integration with the identity authority.
//!
//! Everything that crosses the wire to the authority lives here:
//!
//! - [`AuthorityClient`]: the collaborator contract (userinfo, JWKS,
//!   discovery, token grant, user creation), implemented for production by
//!   [`HttpAuthorityClient`].
//! - [`KeyRing`]: public signing keys behind a short-TTL cache.
//! - [`DiscoveryCache`]: discovery document behind a long-TTL cache.
//! - [`ClientCredentialsTokenSource`]: cached machine-to-machine access
//!   token for outbound calls.
//!
//! The cached wrappers take their [`TtlCache`](crate::cache::TtlCache)
//! handles by injection so deployments can share or scope them as they see
//! fit.

mod client;
mod credentials;
mod discovery;
mod keyring;

pub use client::{
    AuthorityClient, CreateUserRequest, DiscoveryDocument, HttpAuthorityClient, TokenGrantResponse,
};
pub use credentials::ClientCredentialsTokenSource;
pub use discovery::DiscoveryCache;
pub use keyring::KeyRing;
