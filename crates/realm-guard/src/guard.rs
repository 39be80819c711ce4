//! Per-request authentication guard.
//!
//! An [`AuthGuard`] is produced by a single evaluation of one request:
//!
//! ```text
//! extract token -> verify -> resource policy -> resolve identity -> bind
//! ```
//!
//! Any failing step ends the evaluation with the guard unauthenticated and
//! the failure recorded. The guard never re-evaluates; its accessors are
//! read-only.

use crate::auth::claims::DecodedClaims;
use crate::auth::policy::ResourceAccessPolicy;
use crate::auth::verifier::TokenVerifier;
use crate::config::{ConfigError, GuardConfig};
use crate::errors::AuthError;
use crate::identity::{Identity, IdentityResolver, IdentityStore, RetrievalHooks};
use crate::observability::metrics::record_authentication;
use crate::request::{extract_token, TokenSource};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Process-wide state shared by every guard evaluation.
///
/// Built once at start-up; read-only afterwards.
#[derive(Debug)]
pub struct GuardContext<S: IdentityStore> {
    config: Arc<GuardConfig>,
    policy: ResourceAccessPolicy,
    resolver: IdentityResolver<S>,
}

impl<S: IdentityStore> GuardContext<S> {
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownRetrievalHook` if the configured hook is
    /// not in `hooks`.
    pub fn new(
        config: Arc<GuardConfig>,
        store: Arc<S>,
        hooks: &RetrievalHooks<S::Identity>,
    ) -> Result<Self, ConfigError> {
        let resolver = IdentityResolver::new(&config, store, hooks)?;
        let policy = config.resource_policy();

        Ok(Self {
            config,
            policy,
            resolver,
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn policy(&self) -> &ResourceAccessPolicy {
        &self.policy
    }

    pub fn resolver(&self) -> &IdentityResolver<S> {
        &self.resolver
    }

    pub fn verifier(&self) -> TokenVerifier<'_> {
        TokenVerifier::new(&self.config.key_ring, self.config.leeway)
    }
}

/// A resolved identity, optionally carrying the decoded token.
#[derive(Debug, Clone)]
pub struct BoundIdentity<I> {
    identity: I,
    decoded_token: Option<Arc<DecodedClaims>>,
}

impl<I> BoundIdentity<I> {
    pub fn identity(&self) -> &I {
        &self.identity
    }

    /// The request's claims, present when decoded tokens are appended to
    /// identities.
    pub fn decoded_token(&self) -> Option<&DecodedClaims> {
        self.decoded_token.as_deref()
    }

    pub fn into_identity(self) -> I {
        self.identity
    }
}

/// Result of one guard evaluation.
#[derive(Debug, Clone)]
pub enum AuthOutcome<I> {
    Unauthenticated(AuthError),
    Authenticated {
        identity: BoundIdentity<I>,
        claims: Arc<DecodedClaims>,
    },
}

/// Authentication state of one request.
#[derive(Debug, Clone)]
pub struct AuthGuard<I> {
    outcome: AuthOutcome<I>,
}

impl<I: Identity> AuthGuard<I> {
    /// Evaluate `source` once.
    ///
    /// Never fails: failures are recorded in the returned guard.
    #[instrument(skip_all, name = "guard.authenticate")]
    pub async fn authenticate<S, T>(ctx: &GuardContext<S>, source: &T) -> Self
    where
        S: IdentityStore<Identity = I>,
        T: TokenSource + ?Sized,
    {
        let token = extract_token(source, ctx.config.input_key.as_deref());
        Self::authenticate_token(ctx, &token).await
    }

    /// Evaluate an already extracted raw token.
    pub async fn authenticate_token<S>(ctx: &GuardContext<S>, token: &SecretString) -> Self
    where
        S: IdentityStore<Identity = I>,
    {
        let start = Instant::now();
        let result = Self::evaluate(ctx, token).await;
        let duration = start.elapsed();

        let outcome = match result {
            Ok((identity, claims)) => {
                tracing::debug!(
                    target: "guard.auth",
                    duration_ms = duration.as_millis(),
                    "Request authenticated"
                );
                record_authentication(None, duration);
                AuthOutcome::Authenticated { identity, claims }
            }
            Err(err) => {
                tracing::debug!(
                    target: "guard.auth",
                    error_type = err.error_type(),
                    duration_ms = duration.as_millis(),
                    "Request not authenticated"
                );
                record_authentication(Some(err.error_type()), duration);
                AuthOutcome::Unauthenticated(err)
            }
        };

        Self { outcome }
    }

    async fn evaluate<S>(
        ctx: &GuardContext<S>,
        token: &SecretString,
    ) -> Result<(BoundIdentity<I>, Arc<DecodedClaims>), AuthError>
    where
        S: IdentityStore<Identity = I>,
    {
        let verified = ctx.verifier().verify(token.expose_secret())?;
        let claims = Arc::new(verified.into_claims());

        ctx.policy.validate(&claims)?;

        let identity = ctx.resolver.resolve(&claims).await?;
        let decoded_token = ctx
            .config
            .append_decoded_token
            .then(|| Arc::clone(&claims));

        Ok((
            BoundIdentity {
                identity,
                decoded_token,
            },
            claims,
        ))
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.outcome, AuthOutcome::Authenticated { .. })
    }

    pub fn is_guest(&self) -> bool {
        !self.is_authenticated()
    }

    pub fn bound_identity(&self) -> Option<&BoundIdentity<I>> {
        match &self.outcome {
            AuthOutcome::Authenticated { identity, .. } => Some(identity),
            AuthOutcome::Unauthenticated(_) => None,
        }
    }

    pub fn identity(&self) -> Option<&I> {
        self.bound_identity().map(BoundIdentity::identity)
    }

    pub fn identity_id(&self) -> Option<I::Id> {
        self.identity().and_then(Identity::id)
    }

    pub fn claims(&self) -> Option<&DecodedClaims> {
        match &self.outcome {
            AuthOutcome::Authenticated { claims, .. } => Some(claims),
            AuthOutcome::Unauthenticated(_) => None,
        }
    }

    /// The decoded claims serialised as JSON.
    pub fn raw_claims(&self) -> Option<String> {
        self.claims().map(DecodedClaims::to_json)
    }

    /// Whether the authenticated token grants `role` on `resource`.
    /// Always false for an unauthenticated request.
    pub fn has_role(&self, resource: &str, role: &str) -> bool {
        self.claims()
            .is_some_and(|claims| claims.has_role(resource, role))
    }

    /// Why authentication failed, if it did.
    pub fn failure(&self) -> Option<&AuthError> {
        match &self.outcome {
            AuthOutcome::Unauthenticated(err) => Some(err),
            AuthOutcome::Authenticated { .. } => None,
        }
    }

    pub fn outcome(&self) -> &AuthOutcome<I> {
        &self.outcome
    }

    pub fn into_outcome(self) -> AuthOutcome<I> {
        self.outcome
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::auth::keys::KeyRing;
    use crate::identity::mock::{MockIdentity, MockIdentityStore};
    use crate::observability::metrics::testing::counter_value;
    use crate::observability::metrics::AUTHENTICATIONS_TOTAL;
    use jsonwebtoken::Algorithm;
    use metrics_util::debugging::DebuggingRecorder;
    use realm_guard_test_utils::{
        TestSigningKey, TestTokenBuilder, TEST_IDENTITY_ID_ALICE, TEST_RESOURCE_APP_A,
        TEST_ROLE_ADMIN, TEST_USERNAME_ALICE,
    };

    fn context(
        key: &TestSigningKey,
        append_decoded_token: bool,
    ) -> GuardContext<MockIdentityStore> {
        let ring = KeyRing::from_pems(&[key.public_key_pem()], Algorithm::EdDSA).unwrap();
        let mut config = GuardConfig::with_key_ring(ring, [TEST_RESOURCE_APP_A]);
        config.append_decoded_token = append_decoded_token;
        let store = MockIdentityStore::with_identities(vec![MockIdentity::new(
            TEST_IDENTITY_ID_ALICE,
            TEST_USERNAME_ALICE,
        )]);
        GuardContext::new(Arc::new(config), Arc::new(store), &RetrievalHooks::new()).unwrap()
    }

    fn token(key: &TestSigningKey) -> SecretString {
        SecretString::from(
            TestTokenBuilder::new()
                .with_resource_role(TEST_RESOURCE_APP_A, TEST_ROLE_ADMIN)
                .sign_with(key),
        )
    }

    #[tokio::test]
    async fn test_authenticated_accessors() {
        let key = TestSigningKey::ed25519(1);
        let ctx = context(&key, false);

        let guard = AuthGuard::authenticate_token(&ctx, &token(&key)).await;

        assert!(guard.is_authenticated());
        assert!(!guard.is_guest());
        assert_eq!(guard.identity_id(), Some(TEST_IDENTITY_ID_ALICE));
        assert_eq!(guard.identity().unwrap().username, TEST_USERNAME_ALICE);
        assert!(guard.has_role(TEST_RESOURCE_APP_A, TEST_ROLE_ADMIN));
        assert!(guard.failure().is_none());
        assert!(guard.bound_identity().unwrap().decoded_token().is_none());

        let raw: serde_json::Value = serde_json::from_str(&guard.raw_claims().unwrap()).unwrap();
        assert_eq!(raw["preferred_username"], TEST_USERNAME_ALICE);
    }

    #[tokio::test]
    async fn test_append_decoded_token_shares_claims() {
        let key = TestSigningKey::ed25519(1);
        let ctx = context(&key, true);

        let guard = AuthGuard::authenticate_token(&ctx, &token(&key)).await;

        match guard.outcome() {
            AuthOutcome::Authenticated { identity, claims } => {
                let attached = identity.decoded_token().unwrap();
                assert!(std::ptr::eq(attached, claims.as_ref()));
            }
            AuthOutcome::Unauthenticated(err) => panic!("Expected authenticated, got {err:?}"),
        }
    }

    #[tokio::test]
    async fn test_unauthenticated_accessors() {
        let key = TestSigningKey::ed25519(1);
        let ctx = context(&key, false);

        let guard = AuthGuard::authenticate_token(&ctx, &SecretString::from(String::new())).await;

        assert!(guard.is_guest());
        assert!(guard.identity().is_none());
        assert!(guard.identity_id().is_none());
        assert!(guard.claims().is_none());
        assert!(guard.raw_claims().is_none());
        assert!(!guard.has_role(TEST_RESOURCE_APP_A, TEST_ROLE_ADMIN));
        assert_eq!(guard.failure(), Some(&AuthError::EmptyToken));
        assert!(matches!(
            guard.into_outcome(),
            AuthOutcome::Unauthenticated(AuthError::EmptyToken)
        ));
    }

    #[tokio::test]
    async fn test_accessors_are_stable() {
        let key = TestSigningKey::ed25519(1);
        let ctx = context(&key, false);
        let guard = AuthGuard::authenticate_token(&ctx, &token(&key)).await;

        let first = (guard.identity_id(), guard.raw_claims(), guard.has_role("app-a", "admin"));
        let second = (guard.identity_id(), guard.raw_claims(), guard.has_role("app-a", "admin"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_outcome_metrics_recorded() {
        let key = TestSigningKey::ed25519(1);
        let ctx = context(&key, false);
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        ::metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                AuthGuard::authenticate_token(&ctx, &token(&key)).await;
                AuthGuard::authenticate_token(&ctx, &SecretString::from(String::new())).await;
            });
        });

        assert_eq!(
            counter_value(
                &snapshotter,
                AUTHENTICATIONS_TOTAL,
                &[("outcome", "authenticated")]
            ),
            1
        );
        assert_eq!(
            counter_value(
                &snapshotter,
                AUTHENTICATIONS_TOTAL,
                &[("outcome", "unauthenticated"), ("error_type", "empty_token")]
            ),
            1
        );
    }
}
