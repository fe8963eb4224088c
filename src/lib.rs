//! SSO Guard Library
//!
//! JWT authentication bridge between a protected application and an external
//! single sign-on authority.
//!
//! # Features
//!
//! - **Bearer-token verification**: RS256 signature checks against the
//!   authority's rotating key set, cached with a short TTL
//! - **Claim validation**: issuer and optional audience enforcement
//! - **Identity resolution**: imports and refreshes local identity records
//!   from authority userinfo, de-duplicated by time-windowed checkpoints
//! - **Request guard**: lazy, memoized "who is the current caller" evaluation
//! - **Scope enforcement**: checks for client-credentials endpoints that
//!   carry no local identity
//! - **Outbound tokens**: cached client-credentials grant for
//!   service-to-service calls
//!
//! # Signing Algorithm
//!
//! Tokens are verified against RS256 only; any other algorithm is rejected
//! as malformed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authority;
pub mod cache;
pub mod claims;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod jwt;
pub mod scope;
pub mod validation;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
