//! Scope checks for client-credentials callers.
//!
//! Machine-to-machine requests carry no local identity, so scope
//! enforcement works on the token alone: the token must decode and pass
//! claim validation, and its `scope` claim must cover every required scope.
//! Identity resolution is never involved.

use tracing::debug;

use crate::jwt::Jwt;
use crate::validation::ClaimValidator;
use crate::{Error, Result};

/// Validates token scopes for endpoints restricted to the
/// client-credentials grant.
#[derive(Debug, Clone)]
pub struct ScopeEnforcer {
    validator: ClaimValidator,
}

impl ScopeEnforcer {
    /// Create an enforcer over the configured claim validator.
    #[must_use]
    pub fn new(validator: ClaimValidator) -> Self {
        Self { validator }
    }

    /// Check that `jwt` is valid and carries every scope in `required`.
    ///
    /// An empty `required` list passes trivially once the token itself is
    /// valid.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Unauthenticated`] when the token cannot be
    /// decoded or its claims fail issuer/audience validation, and with
    /// [`Error::MissingScopes`] naming the absent scopes in `required`
    /// order.
    pub async fn validate(&self, jwt: &Jwt, required: &[String]) -> Result<()> {
        let Ok(claims) = jwt.claims().await else {
            return Err(Error::Unauthenticated);
        };
        if !self.validator.is_valid(claims) {
            return Err(Error::Unauthenticated);
        }
        if required.is_empty() {
            return Ok(());
        }

        let granted = claims.scopes();
        let missing = missing_scopes(required, &granted);
        if missing.is_empty() {
            Ok(())
        } else {
            debug!(missing = ?missing, "Token lacks required scopes");
            Err(Error::MissingScopes(missing))
        }
    }
}

/// Required scopes absent from `granted`, preserving `required` order.
fn missing_scopes(required: &[String], granted: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|&scope| !granted.contains(scope))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn missing_scopes_preserve_required_order() {
        let missing = missing_scopes(&scopes(&["write", "read", "admin"]), &scopes(&["read"]));
        assert_eq!(missing, scopes(&["write", "admin"]));
    }

    #[test]
    fn fully_granted_scopes_leave_nothing_missing() {
        let missing = missing_scopes(&scopes(&["read", "write"]), &scopes(&["write", "read"]));
        assert!(missing.is_empty());
    }

    #[test]
    fn empty_required_list_is_never_missing() {
        let missing = missing_scopes(&[], &scopes(&["read"]));
        assert!(missing.is_empty());
    }

    #[test]
    fn no_granted_scopes_means_all_are_missing() {
        let missing = missing_scopes(&scopes(&["read", "write"]), &[]);
        assert_eq!(missing, scopes(&["read", "write"]));
    }
}
