//! Error types for the SSO guard.

use thiserror::Error;

/// Result type alias for the SSO guard.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication and authority-integration errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Authorization header absent or empty
    #[error("Authorization header is missing")]
    MissingAuthorization,

    /// Authorization header carries a scheme other than Bearer
    #[error("Authorization header does not use the Bearer scheme")]
    NotBearerScheme,

    /// Bearer marker present but no token follows it
    #[error("Bearer token is empty")]
    EmptyToken,

    /// Token expiration claim is in the past
    #[error("Token has expired")]
    ExpiredToken,

    /// Any other decode or signature-verification failure
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Authority endpoint could not be reached or returned garbage
    #[error("Authority unreachable: {0}")]
    AuthorityUnreachable(String),

    /// Client-credentials grant rejected with a non-200 status
    #[error("Token request failed with status {status}")]
    TokenRequestFailed {
        /// HTTP status returned by the token endpoint
        status: u16,
    },

    /// Identity import or refresh failed; carries the original cause
    #[error("Unable to process identity: {0}")]
    UnprocessableIdentity(#[source] Box<Error>),

    /// Identity storage failure
    #[error("Identity store error: {0}")]
    Store(String),

    /// Import-handler failure
    #[error("Import handler error: {0}")]
    Handler(String),

    /// Token invalid for a scope-protected endpoint
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Required scopes absent from the token, in request order
    #[error("Missing required scopes: {}", .0.join(", "))]
    MissingScopes(Vec<String>),

    /// Operation not supported by this guard
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Wrap a resolution failure so the guard can tell it apart from an
    /// ordinary "not authenticated" outcome.
    #[must_use]
    pub fn unprocessable(cause: Error) -> Self {
        Self::UnprocessableIdentity(Box::new(cause))
    }

    /// Suggested HTTP status for surfacing this error at the edge.
    ///
    /// The mapping itself is a host concern; this is the conventional
    /// translation (401 for token problems, 403 for scope problems, 422 for
    /// identity-resolution failures, 502 for a misbehaving authority).
    #[must_use]
    pub fn status_code(&self) -> reqwest::StatusCode {
        use reqwest::StatusCode;
        match self {
            Self::MissingAuthorization
            | Self::NotBearerScheme
            | Self::EmptyToken
            | Self::ExpiredToken
            | Self::MalformedToken(_)
            | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::MissingScopes(_) => StatusCode::FORBIDDEN,
            Self::UnprocessableIdentity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AuthorityUnreachable(_) | Self::TokenRequestFailed { .. } | Self::Http(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Store(_) | Self::Handler(_) | Self::UnsupportedOperation(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
