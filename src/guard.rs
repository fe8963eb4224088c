//! `AuthGuard` answers "who is the current caller" for one request.
//!
//! The guard composes token decoding, claim validation and identity
//! resolution, and memoizes the outcome: the first call to
//! [`current_identity`](AuthGuard::current_identity) does the work, later
//! calls return the stored answer. An absent, malformed or invalid token is
//! the anonymous outcome, not an error; only
//! [`Error::UnprocessableIdentity`] escapes, because it means the authority
//! or the identity store is misbehaving rather than the caller.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::identity::{Identity, IdentityResolver};
use crate::jwt::Jwt;
use crate::validation::ClaimValidator;
use crate::{Error, Result};

/// Per-request authentication guard.
///
/// Construct one guard per request; the resolver behind it is shared.
pub struct AuthGuard<U> {
    jwt: Jwt,
    validator: ClaimValidator,
    resolver: Arc<IdentityResolver<U>>,
    user: Option<U>,
    resolved: bool,
}

impl<U> AuthGuard<U>
where
    U: Identity + Default,
{
    /// Create a guard for one request's token.
    #[must_use]
    pub fn new(jwt: Jwt, validator: ClaimValidator, resolver: Arc<IdentityResolver<U>>) -> Self {
        Self {
            jwt,
            validator,
            resolver,
            user: None,
            resolved: false,
        }
    }

    /// The authenticated caller, or `None` for an anonymous request.
    ///
    /// Resolution runs at most once per guard; the outcome (including the
    /// anonymous one) is memoized. A failed resolution is not memoized, so a
    /// later call retries. On success the request's claim set is attached to
    /// the identity before it is stored.
    ///
    /// # Errors
    ///
    /// Re-raises [`Error::UnprocessableIdentity`] after logging it. All
    /// other resolution failures degrade to `Ok(None)`.
    pub async fn current_identity(&mut self) -> Result<Option<&U>> {
        if !self.resolved {
            let user = self.resolve_caller().await?;
            self.user = user;
            self.resolved = true;
        }
        Ok(self.user.as_ref())
    }

    /// Whether the current caller is authenticated.
    ///
    /// Absorbs every resolution failure into `false`.
    pub async fn check(&mut self) -> bool {
        matches!(self.current_identity().await, Ok(Some(_)))
    }

    /// Whether the current caller is anonymous.
    pub async fn guest(&mut self) -> bool {
        !self.check().await
    }

    /// The authenticated caller's identifier, or `None`.
    pub async fn id(&mut self) -> Option<String> {
        match self.current_identity().await {
            Ok(Some(identity)) => Some(identity.identifier().to_string()),
            _ => None,
        }
    }

    /// Whether a caller identity has already been materialized.
    ///
    /// Unlike [`check`](AuthGuard::check) this never triggers resolution.
    #[must_use]
    pub fn has_user(&self) -> bool {
        self.user.is_some()
    }

    /// Short-circuit resolution with a known identity.
    ///
    /// Subsequent [`current_identity`](AuthGuard::current_identity) calls
    /// return this value directly.
    pub fn set_user(&mut self, identity: U) {
        self.user = Some(identity);
        self.resolved = true;
    }

    /// Credential validation is not supported; this guard is strictly
    /// bearer-token driven.
    ///
    /// # Errors
    ///
    /// Always fails with [`Error::UnsupportedOperation`].
    pub fn validate_credentials(&self) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "bearer-token guard cannot validate credentials",
        ))
    }

    async fn resolve_caller(&self) -> Result<Option<U>> {
        let Ok(authorization) = self.jwt.authorization_header() else {
            return Ok(None);
        };
        let claims = match self.jwt.claims().await {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Request carries no usable token");
                return Ok(None);
            }
        };
        if !self.validator.is_valid(claims) {
            debug!("Token claims failed issuer or audience validation");
            return Ok(None);
        }

        match self.resolver.resolve(claims, authorization).await {
            Ok(mut identity) => {
                identity.attach_claims(claims);
                Ok(Some(identity))
            }
            Err(e @ Error::UnprocessableIdentity(_)) => {
                error!(error = %e, "Failed to resolve caller identity");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Identity resolution degraded to anonymous");
                Ok(None)
            }
        }
    }
}
