//! Token verification against the realm key ring.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only the configured asymmetric algorithm is accepted
//! - Keys are tried strictly in ring order; the first signature match ends
//!   the loop, and its time checks decide the result
//! - Time checks (`exp`, `nbf`, `iat`) use the configured leeway and an
//!   explicit `now`, so boundaries are testable without wall-clock timing

use crate::auth::claims::DecodedClaims;
use crate::auth::keys::KeyRing;
use crate::errors::AuthError;
use crate::observability::metrics::record_key_trials;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, Validation};
use std::time::Duration;

/// Maximum accepted token size in bytes (8KB).
///
/// Larger tokens are rejected before any base64 decoding or signature work.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Claims of a verified token, with the ring position of the key that
/// verified it.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    claims: DecodedClaims,
    key_index: usize,
}

impl VerifiedToken {
    pub fn claims(&self) -> &DecodedClaims {
        &self.claims
    }

    /// Ring position of the verifying key.
    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn into_claims(self) -> DecodedClaims {
        self.claims
    }
}

/// What a single key trial means for the loop.
enum TrialFailure {
    /// This key does not verify the token; try the next one.
    KeyMismatch,
    /// The token itself is malformed; no key can help.
    MalformedToken,
}

/// Key material is validated when the ring is built, so a key the crypto
/// backend still rejects here only counts as a mismatch.
fn classify(err: &JwtError) -> TrialFailure {
    match err.kind() {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidEcdsaKey => TrialFailure::KeyMismatch,
        _ => TrialFailure::MalformedToken,
    }
}

/// Verifies raw tokens against a key ring.
#[derive(Debug, Clone, Copy)]
pub struct TokenVerifier<'a> {
    key_ring: &'a KeyRing,
    leeway: Duration,
}

impl<'a> TokenVerifier<'a> {
    pub fn new(key_ring: &'a KeyRing, leeway: Duration) -> Self {
        Self { key_ring, leeway }
    }

    /// Verify `token` at the current time.
    ///
    /// # Errors
    ///
    /// See [`TokenVerifier::verify_at`].
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify `token` as of `now` (Unix epoch seconds).
    ///
    /// # Errors
    ///
    /// - `EmptyToken` - empty input, no key is tried
    /// - `TokenTooLarge` - input exceeds `MAX_TOKEN_SIZE_BYTES`
    /// - `DecodeError` - malformed token or claims
    /// - `ExpiredToken` / `TokenNotYetValid` - the first matching key's
    ///   token fails the time checks; later keys are not tried
    /// - `NoValidKey` - no key verifies the signature
    pub fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedToken, AuthError> {
        if token.is_empty() {
            tracing::debug!(target: "guard.verifier", "Token rejected: empty");
            return Err(AuthError::EmptyToken);
        }

        if token.len() > MAX_TOKEN_SIZE_BYTES {
            tracing::debug!(
                target: "guard.verifier",
                token_size = token.len(),
                max_size = MAX_TOKEN_SIZE_BYTES,
                "Token rejected: size exceeds maximum allowed"
            );
            return Err(AuthError::TokenTooLarge);
        }

        let validation = self.validation();
        let mut trials = 0;

        for key in self.key_ring.keys() {
            trials += 1;

            let err = match decode::<serde_json::Value>(token, key.decoding_key(), &validation) {
                Ok(data) => {
                    record_key_trials(trials);
                    return self.accept(data.claims, key.index(), now);
                }
                Err(err) => err,
            };

            match classify(&err) {
                TrialFailure::KeyMismatch => {
                    tracing::debug!(
                        target: "guard.verifier",
                        key_index = key.index(),
                        key_fingerprint = key.fingerprint(),
                        error = %err,
                        "Key did not verify token"
                    );
                }
                TrialFailure::MalformedToken => {
                    tracing::debug!(
                        target: "guard.verifier",
                        key_index = key.index(),
                        error = %err,
                        "Token rejected: malformed"
                    );
                    record_key_trials(trials);
                    return Err(AuthError::DecodeError(err.to_string()));
                }
            }
        }

        record_key_trials(trials);

        tracing::debug!(
            target: "guard.verifier",
            key_count = self.key_ring.len(),
            "Token rejected: no key in the ring verifies the signature"
        );
        Err(AuthError::NoValidKey)
    }

    /// Signature-only validation; time claims are checked in `check_times`.
    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.key_ring.algorithm());
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation
    }

    fn accept(
        &self,
        payload: serde_json::Value,
        key_index: usize,
        now: i64,
    ) -> Result<VerifiedToken, AuthError> {
        let claims = DecodedClaims::from_payload(payload).map_err(|e| {
            tracing::debug!(
                target: "guard.verifier",
                key_index,
                error = %e,
                "Token rejected: claims payload invalid"
            );
            AuthError::DecodeError(e.to_string())
        })?;

        self.check_times(&claims, now)?;

        tracing::debug!(target: "guard.verifier", key_index, "Token verified");
        Ok(VerifiedToken { claims, key_index })
    }

    fn check_times(&self, claims: &DecodedClaims, now: i64) -> Result<(), AuthError> {
        let leeway = i64::try_from(self.leeway.as_secs()).unwrap_or(i64::MAX);

        let expired_by = now.saturating_sub(claims.expires_at());
        if expired_by > leeway {
            tracing::debug!(
                target: "guard.verifier",
                exp = claims.expires_at(),
                now,
                leeway_secs = leeway,
                "Token rejected: expired"
            );
            return Err(AuthError::ExpiredToken);
        }

        for (claim, timestamp) in [("nbf", claims.not_before()), ("iat", claims.issued_at())] {
            let Some(timestamp) = timestamp else {
                continue;
            };
            if timestamp.saturating_sub(now) > leeway {
                tracing::debug!(
                    target: "guard.verifier",
                    claim,
                    timestamp,
                    now,
                    leeway_secs = leeway,
                    "Token rejected: not valid yet"
                );
                return Err(AuthError::TokenNotYetValid);
            }
        }

        Ok(())
    }
}
