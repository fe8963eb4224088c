//! Claim names and the decoded claim set.
//!
//! [`ClaimSet`] wraps the raw JSON payload of a verified token and gives
//! normalized accessors for the claims this crate consumes. The `aud` and
//! `scope` claims may arrive as a single string or an array depending on the
//! authority; both accessors fold the two shapes into one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Subject identifier (`sub`).
pub const SUBJECT: &str = "sub";
/// Token issuer (`iss`).
pub const ISSUER: &str = "iss";
/// Intended audience(s) (`aud`).
pub const AUDIENCE: &str = "aud";
/// Expiration time, seconds since the epoch (`exp`).
pub const EXPIRATION: &str = "exp";
/// Not-valid-before time (`nbf`).
pub const NOT_BEFORE: &str = "nbf";
/// Issued-at time (`iat`).
pub const ISSUED_AT: &str = "iat";
/// Unique token identifier (`jti`).
pub const JWT_ID: &str = "jti";
/// Granted scopes, space-delimited string or array (`scope`).
pub const SCOPE: &str = "scope";
/// OAuth2 client that requested the token (`client_id`).
pub const CLIENT_ID: &str = "client_id";
/// Authority session identifier (`sid`).
pub const SESSION_ID: &str = "sid";
/// Identity provider the subject authenticated through (`idp`).
pub const IDENTITY_PROVIDER: &str = "idp";
/// Authentication method references (`amr`).
pub const AUTH_METHODS: &str = "amr";
/// Time of the original authentication (`auth_time`).
pub const AUTH_TIME: &str = "auth_time";
/// Full display name (`name`).
pub const NAME: &str = "name";
/// Given name (`given_name`).
pub const GIVEN_NAME: &str = "given_name";
/// Family name (`family_name`).
pub const FAMILY_NAME: &str = "family_name";
/// Middle name (`middle_name`).
pub const MIDDLE_NAME: &str = "middle_name";
/// Casual name (`nickname`).
pub const NICKNAME: &str = "nickname";
/// Username the subject prefers to be addressed by (`preferred_username`).
pub const PREFERRED_USERNAME: &str = "preferred_username";
/// Preferred e-mail address (`email`).
pub const EMAIL: &str = "email";
/// Whether the e-mail address has been verified (`email_verified`).
pub const EMAIL_VERIFIED: &str = "email_verified";
/// Preferred telephone number (`phone_number`).
pub const PHONE_NUMBER: &str = "phone_number";
/// Whether the telephone number has been verified (`phone_number_verified`).
pub const PHONE_NUMBER_VERIFIED: &str = "phone_number_verified";
/// Profile picture URL (`picture`).
pub const PICTURE: &str = "picture";
/// Profile page URL (`profile`).
pub const PROFILE: &str = "profile";
/// Locale, BCP47 tag (`locale`).
pub const LOCALE: &str = "locale";
/// Time zone (`zoneinfo`).
pub const ZONEINFO: &str = "zoneinfo";
/// Birthday, ISO 8601 date (`birthdate`).
pub const BIRTHDATE: &str = "birthdate";
/// Time the profile was last updated (`updated_at`).
pub const UPDATED_AT: &str = "updated_at";
/// Group memberships (`groups`).
pub const GROUPS: &str = "groups";
/// Role memberships (`role`).
pub const ROLE: &str = "role";

/// The decoded payload of a verified token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    /// Create an empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Raw value of a claim, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String value of a claim, if present and a string.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Whether the claim exists at all.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Set a claim, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// The `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.string(SUBJECT)
    }

    /// The `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.string(ISSUER)
    }

    /// The `exp` claim as epoch seconds.
    #[must_use]
    pub fn expiration(&self) -> Option<u64> {
        self.0.get(EXPIRATION).and_then(Value::as_u64)
    }

    /// The `aud` claim normalized to a list.
    ///
    /// A scalar audience becomes a one-element list; non-string array
    /// members are ignored.
    #[must_use]
    pub fn audiences(&self) -> Vec<&str> {
        match self.0.get(AUDIENCE) {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// The `scope` claim normalized to a list, preserving token order.
    ///
    /// Accepts both the space-delimited string form and the array form.
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        match self.0.get(SCOPE) {
            Some(Value::String(s)) => s.split_whitespace().map(str::to_owned).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Iterate over all claims.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of claims present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set carries no claims.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> ClaimSet {
        serde_json::from_value(value).unwrap()
    }

    // ========================================================================
    // Audience normalization
    // ========================================================================

    #[test]
    fn scalar_audience_becomes_single_entry() {
        let c = claims(json!({"aud": "billing-api"}));
        assert_eq!(c.audiences(), vec!["billing-api"]);
    }

    #[test]
    fn array_audience_keeps_all_entries() {
        let c = claims(json!({"aud": ["billing-api", "reports-api"]}));
        assert_eq!(c.audiences(), vec!["billing-api", "reports-api"]);
    }

    #[test]
    fn non_string_audience_members_are_ignored() {
        let c = claims(json!({"aud": ["billing-api", 42, null]}));
        assert_eq!(c.audiences(), vec!["billing-api"]);
    }

    #[test]
    fn missing_audience_is_empty() {
        let c = claims(json!({"sub": "alice"}));
        assert!(c.audiences().is_empty());
    }

    // ========================================================================
    // Scope normalization
    // ========================================================================

    #[test]
    fn space_delimited_scope_string_splits_in_order() {
        let c = claims(json!({"scope": "openid profile offline_access"}));
        assert_eq!(c.scopes(), vec!["openid", "profile", "offline_access"]);
    }

    #[test]
    fn scope_array_preserves_order() {
        let c = claims(json!({"scope": ["read", "write"]}));
        assert_eq!(c.scopes(), vec!["read", "write"]);
    }

    #[test]
    fn missing_scope_is_empty() {
        let c = claims(json!({}));
        assert!(c.scopes().is_empty());
    }

    // ========================================================================
    // Typed accessors
    // ========================================================================

    #[test]
    fn subject_and_issuer_read_string_claims() {
        let c = claims(json!({"sub": "alice", "iss": "https://sso.example.com"}));
        assert_eq!(c.subject(), Some("alice"));
        assert_eq!(c.issuer(), Some("https://sso.example.com"));
    }

    #[test]
    fn non_string_subject_reads_as_none() {
        let c = claims(json!({"sub": 12345}));
        assert_eq!(c.subject(), None);
    }

    #[test]
    fn expiration_reads_epoch_seconds() {
        let c = claims(json!({"exp": 1_700_000_000_u64}));
        assert_eq!(c.expiration(), Some(1_700_000_000));
    }

    #[test]
    fn insert_replaces_existing_value() {
        let mut c = ClaimSet::new();
        c.insert(SUBJECT, json!("alice"));
        c.insert(SUBJECT, json!("bob"));
        assert_eq!(c.subject(), Some("bob"));
        assert_eq!(c.len(), 1);
    }
}
