//! Issuer and audience checks on a decoded claim set.

use crate::claims::ClaimSet;
use crate::config::SsoConfig;

/// Validates issuer and audience claims against the configuration.
///
/// All checks are predicates: a missing claim, a wrong type or any other
/// irregularity yields `false`, never an error. "Not authenticated" is a
/// normal outcome on these paths and the caller decides what it means.
#[derive(Debug, Clone)]
pub struct ClaimValidator {
    authority: String,
    audience: Option<String>,
    validate_audience: bool,
}

impl ClaimValidator {
    /// Capture the issuer/audience expectations from configuration.
    #[must_use]
    pub fn new(config: &SsoConfig) -> Self {
        Self {
            authority: config.authority.clone(),
            audience: config.audience.clone(),
            validate_audience: config.validate_audience,
        }
    }

    /// Whether the `iss` claim equals the configured authority.
    #[must_use]
    pub fn valid_issuer(&self, claims: &ClaimSet) -> bool {
        claims.issuer().is_some_and(|iss| iss == self.authority)
    }

    /// Whether the configured audience is among the token's audiences.
    ///
    /// Trivially true when no audience is configured or the check is
    /// disabled. The `aud` claim may be a scalar or an array; both forms are
    /// accepted.
    #[must_use]
    pub fn valid_audience(&self, claims: &ClaimSet) -> bool {
        if !self.validate_audience {
            return true;
        }
        match &self.audience {
            None => true,
            Some(expected) => claims.audiences().iter().any(|aud| aud == expected),
        }
    }

    /// Whether both the issuer and the audience check pass.
    #[must_use]
    pub fn is_valid(&self, claims: &ClaimSet) -> bool {
        self.valid_issuer(claims) && self.valid_audience(claims)
    }
}
