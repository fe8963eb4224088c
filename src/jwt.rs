//! Bearer-token extraction and verification.
//!
//! A [`Jwt`] wraps the raw `Authorization` header of one request. Extraction
//! and decoding are lazy: nothing touches the network until [`Jwt::claims`]
//! is called, and the first successful decode is memoized so later claim
//! reads never re-verify.
//!
//! # Verification flow
//!
//! 1. Parse the header value (`Bearer <token>`, scheme case-insensitive).
//! 2. Decode the JWT header (no verification) to extract `kid`.
//! 3. Look the key up in the [`KeyRing`] and verify with RS256 only.
//! 4. Expired tokens surface as [`Error::ExpiredToken`]; every other decode
//!    failure is [`Error::MalformedToken`]. Both are logged with the raw
//!    token so rejected tokens can be inspected later.

use std::sync::Arc;

use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tokio::sync::OnceCell;
use tracing::info;

use crate::authority::KeyRing;
use crate::claims::ClaimSet;
use crate::{Error, Result};

/// The bearer token of one request, decoded on demand.
pub struct Jwt {
    authorization: Option<String>,
    keyring: Arc<KeyRing>,
    claims: OnceCell<ClaimSet>,
}

impl Jwt {
    /// Wrap the raw `Authorization` header of a request.
    #[must_use]
    pub fn from_header(authorization: Option<&str>, keyring: Arc<KeyRing>) -> Self {
        Self {
            authorization: authorization.map(str::to_owned),
            keyring,
            claims: OnceCell::new(),
        }
    }

    /// The raw `Authorization` header value as received.
    ///
    /// Forwarded verbatim to the userinfo endpoint during identity
    /// resolution.
    pub fn authorization_header(&self) -> Result<&str> {
        match self.authorization.as_deref() {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(Error::MissingAuthorization),
        }
    }

    /// The bearer token carried by the header.
    ///
    /// Fails with [`Error::MissingAuthorization`] when the header is absent
    /// or empty, [`Error::NotBearerScheme`] when it uses another scheme, and
    /// [`Error::EmptyToken`] when nothing follows the scheme marker.
    pub fn bearer_token(&self) -> Result<&str> {
        let header = self.authorization_header()?;

        let Some(remainder) = strip_bearer_scheme(header) else {
            return Err(Error::NotBearerScheme);
        };

        let token = remainder.trim();
        if token.is_empty() {
            return Err(Error::EmptyToken);
        }
        Ok(token)
    }

    /// The verified claim set of the token.
    ///
    /// The first successful decode is cached for the lifetime of this value;
    /// failures are returned each time and never cached.
    pub async fn claims(&self) -> Result<&ClaimSet> {
        self.claims.get_or_try_init(|| self.decode()).await
    }

    async fn decode(&self) -> Result<ClaimSet> {
        let token = self.bearer_token()?;
        match self.verify(token).await {
            Ok(claims) => Ok(claims),
            Err(e) => {
                info!(token = %token, error = %e, "Token decode failed");
                Err(e)
            }
        }
    }

    async fn verify(&self, token: &str) -> Result<ClaimSet> {
        let header =
            jsonwebtoken::decode_header(token).map_err(|e| Error::MalformedToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| Error::MalformedToken("header carries no key id".to_string()))?;

        let keys = self.keyring.keys().await?;
        let decoding_key = find_key(&keys, &kid)
            .ok_or_else(|| Error::MalformedToken(format!("unknown key id '{kid}'")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        // Audience membership is the ClaimValidator's job; it tolerates both
        // the scalar and the array form.
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<ClaimSet>(token, &decoding_key, &validation)
            .map_err(map_decode_error)?;
        Ok(data.claims)
    }
}

/// Strip the bearer scheme marker, matched case-insensitively.
fn strip_bearer_scheme(header: &str) -> Option<&str> {
    const MARKER: &str = "bearer ";
    let prefix = header.get(..MARKER.len())?;
    if prefix.eq_ignore_ascii_case(MARKER) {
        header.get(MARKER.len()..)
    } else {
        None
    }
}

/// Find an RSA key by `kid` in the set and convert it to a [`DecodingKey`].
fn find_key(jwks: &JwkSet, kid: &str) -> Option<DecodingKey> {
    jwks.keys.iter().find_map(|jwk| {
        if jwk.common.key_id.as_deref() != Some(kid) {
            return None;
        }
        match &jwk.algorithm {
            AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e).ok(),
            _ => None,
        }
    })
}

/// Keep "stale" and "forged" apart; callers word the two differently.
fn map_decode_error(e: jsonwebtoken::errors::Error) -> Error {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::ExpiredToken,
        _ => Error::MalformedToken(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::authority::{
        AuthorityClient, CreateUserRequest, DiscoveryDocument, TokenGrantResponse,
    };
    use crate::cache::TtlCache;
    use crate::config::ClientCredentialsConfig;

    struct NoAuthority;

    #[async_trait::async_trait]
    impl AuthorityClient for NoAuthority {
        async fn fetch_public_keys(&self) -> Result<JwkSet> {
            Ok(JwkSet { keys: Vec::new() })
        }

        async fn fetch_discovery_document(&self) -> Result<DiscoveryDocument> {
            unreachable!("not used by extraction tests")
        }

        async fn fetch_userinfo(&self, _authorization: &str) -> Result<ClaimSet> {
            unreachable!("not used by extraction tests")
        }

        async fn request_token(
            &self,
            _grant: &ClientCredentialsConfig,
        ) -> Result<TokenGrantResponse> {
            unreachable!("not used by extraction tests")
        }

        async fn create_user(
            &self,
            _authorization: &str,
            _request: &CreateUserRequest,
        ) -> Result<String> {
            unreachable!("not used by extraction tests")
        }
    }

    fn jwt(header: Option<&str>) -> Jwt {
        let keyring = Arc::new(KeyRing::new(
            Arc::new(NoAuthority),
            Arc::new(TtlCache::new()),
            Duration::from_secs(60),
        ));
        Jwt::from_header(header, keyring)
    }

    // ========================================================================
    // Bearer extraction
    // ========================================================================

    #[test]
    fn standard_bearer_header_yields_token() {
        let jwt = jwt(Some("Bearer abc.def.ghi"));
        assert_eq!(jwt.bearer_token().unwrap(), "abc.def.ghi");
    }

    #[test]
    fn lowercase_scheme_is_accepted() {
        let jwt = jwt(Some("bearer abc.def.ghi"));
        assert_eq!(jwt.bearer_token().unwrap(), "abc.def.ghi");
    }

    #[test]
    fn mixed_case_scheme_is_accepted() {
        let jwt = jwt(Some("BeArEr abc.def.ghi"));
        assert_eq!(jwt.bearer_token().unwrap(), "abc.def.ghi");
    }

    #[test]
    fn surrounding_whitespace_is_trimmed_from_token() {
        let jwt = jwt(Some("Bearer   abc.def.ghi  "));
        assert_eq!(jwt.bearer_token().unwrap(), "abc.def.ghi");
    }

    #[test]
    fn absent_header_is_missing_authorization() {
        let jwt = jwt(None);
        assert!(matches!(
            jwt.bearer_token(),
            Err(Error::MissingAuthorization)
        ));
    }

    #[test]
    fn empty_header_is_missing_authorization() {
        let jwt = jwt(Some(""));
        assert!(matches!(
            jwt.bearer_token(),
            Err(Error::MissingAuthorization)
        ));
    }

    #[test]
    fn basic_scheme_is_not_bearer() {
        let jwt = jwt(Some("Basic dXNlcjpwYXNz"));
        assert!(matches!(jwt.bearer_token(), Err(Error::NotBearerScheme)));
    }

    #[test]
    fn bare_token_without_scheme_is_not_bearer() {
        let jwt = jwt(Some("abc.def.ghi"));
        assert!(matches!(jwt.bearer_token(), Err(Error::NotBearerScheme)));
    }

    #[test]
    fn scheme_without_token_is_empty_token() {
        let jwt = jwt(Some("Bearer   "));
        assert!(matches!(jwt.bearer_token(), Err(Error::EmptyToken)));
    }

    #[test]
    fn scheme_word_alone_is_not_bearer() {
        // No trailing space after the scheme word, so the marker never matches.
        let jwt = jwt(Some("Bearer"));
        assert!(matches!(jwt.bearer_token(), Err(Error::NotBearerScheme)));
    }

    #[test]
    fn authorization_header_returns_raw_value() {
        let jwt = jwt(Some("Bearer abc"));
        assert_eq!(jwt.authorization_header().unwrap(), "Bearer abc");
    }

    // ========================================================================
    // Decode failures that need no signing keys
    // ========================================================================

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let jwt = jwt(Some("Bearer not-a-jwt"));
        assert!(matches!(
            jwt.claims().await,
            Err(Error::MalformedToken(_))
        ));
    }

    #[tokio::test]
    async fn missing_header_surfaces_from_claims() {
        let jwt = jwt(None);
        assert!(matches!(
            jwt.claims().await,
            Err(Error::MissingAuthorization)
        ));
    }
}
