//! Realm Guard error types.
//!
//! Every per-request failure is an [`AuthError`] variant. Variants stay
//! distinct so the transport layer can pick its own status codes; this crate
//! never maps them to responses. Display strings are generic and never carry
//! token contents.

use crate::identity::Credentials;
use thiserror::Error;

/// Why a request did not authenticate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No token in the bearer header or the configured input field.
    #[error("Empty token sent")]
    EmptyToken,

    /// Token exceeds the maximum accepted size; rejected before parsing.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Signature matched but the token expired beyond the configured leeway.
    #[error("Token expired")]
    ExpiredToken,

    /// Signature matched but `nbf` or `iat` lies in the future beyond leeway.
    #[error("Token is not valid yet")]
    TokenNotYetValid,

    /// Malformed token structure, claims payload or key material.
    #[error("Token could not be decoded: {0}")]
    DecodeError(String),

    /// No key in the ring verifies the token signature.
    #[error("Realm token not decoded: no key in the ring verifies the signature")]
    NoValidKey,

    /// Token `resource_access` shares no resource with the allow-list.
    #[error(
        "The decoded JWT token has not a valid `resource_access` allowed by API. Allowed resources by API: {}",
        .allowed.join(",")
    )]
    ResourceAccessDenied {
        /// The configured allow-list, for diagnostics.
        allowed: Vec<String>,
    },

    /// The identity lookup completed but found no record.
    #[error("User not found. Credentials: {credentials}")]
    UserNotFound {
        /// The credential mapping that was looked up.
        credentials: Credentials,
    },

    /// The identity store or retrieval hook itself failed.
    #[error("Identity store error: {0}")]
    IdentityStore(String),
}

impl AuthError {
    /// Stable snake_case code for metrics labels and transport mapping.
    pub fn error_type(&self) -> &'static str {
        match self {
            AuthError::EmptyToken => "empty_token",
            AuthError::TokenTooLarge => "token_too_large",
            AuthError::ExpiredToken => "expired_token",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::DecodeError(_) => "decode_error",
            AuthError::NoValidKey => "no_valid_key",
            AuthError::ResourceAccessDenied { .. } => "resource_access_denied",
            AuthError::UserNotFound { .. } => "user_not_found",
            AuthError::IdentityStore(_) => "identity_store",
        }
    }
}

/// Failure reported by an identity store or retrieval hook.
///
/// A store that finds nothing returns `Ok(None)`; this error is for lookups
/// that could not be performed at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::IdentityStore(err.0)
    }
}
