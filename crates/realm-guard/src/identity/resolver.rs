//! Claims to identity resolution.

use super::{Credentials, IdentityStore, RetrievalHook, RetrievalHooks};
use crate::auth::claims::DecodedClaims;
use crate::config::{ConfigError, GuardConfig};
use crate::errors::AuthError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Resolves verified claims to an identity from `S`.
///
/// The retrieval hook, if configured, is selected once at construction.
pub struct IdentityResolver<S: IdentityStore> {
    store: Arc<S>,
    hook: Option<Arc<dyn RetrievalHook<S::Identity>>>,
    load_user_from_store: bool,
    principal_attribute: String,
    credential_field: String,
}

impl<S: IdentityStore> fmt::Debug for IdentityResolver<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("has_hook", &self.hook.is_some())
            .field("load_user_from_store", &self.load_user_from_store)
            .field("principal_attribute", &self.principal_attribute)
            .field("credential_field", &self.credential_field)
            .finish_non_exhaustive()
    }
}

impl<S: IdentityStore> IdentityResolver<S> {
    /// Build a resolver from `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownRetrievalHook` if the configured hook
    /// name is not registered in `hooks`.
    pub fn new(
        config: &GuardConfig,
        store: Arc<S>,
        hooks: &RetrievalHooks<S::Identity>,
    ) -> Result<Self, ConfigError> {
        let hook = match config.retrieval_hook.as_deref() {
            Some(name) => Some(hooks.get(name).ok_or_else(|| {
                tracing::error!(
                    target: "guard.config",
                    hook = name,
                    registered = ?hooks.names(),
                    "Configured retrieval hook is not registered"
                );
                ConfigError::UnknownRetrievalHook(name.to_string())
            })?),
            None => None,
        };

        Ok(Self {
            store,
            hook,
            load_user_from_store: config.load_user_from_store,
            principal_attribute: config.principal_attribute.clone(),
            credential_field: config.credential_field.clone(),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The credential mapping derived from `claims`: the configured
    /// credential field bound to the principal claim (`null` if absent).
    pub fn credentials(&self, claims: &DecodedClaims) -> Credentials {
        let principal = claims
            .claim(&self.principal_attribute)
            .cloned()
            .unwrap_or(Value::Null);
        Credentials::single(self.credential_field.clone(), principal)
    }

    /// Resolve `claims` to an identity.
    ///
    /// # Errors
    ///
    /// - `AuthError::UserNotFound` - the lookup found no record
    /// - `AuthError::IdentityStore` - the store or hook failed
    pub async fn resolve(&self, claims: &DecodedClaims) -> Result<S::Identity, AuthError> {
        if !self.load_user_from_store {
            tracing::debug!(target: "guard.identity", "Identity built from claims");
            return Ok(self.store.identity_from_claims(claims));
        }

        let credentials = self.credentials(claims);
        let found = match &self.hook {
            Some(hook) => hook.retrieve(claims, &credentials).await,
            None => self.store.retrieve_by_credentials(&credentials).await,
        }
        .map_err(|e| {
            tracing::warn!(
                target: "guard.identity",
                error = %e,
                via_hook = self.hook.is_some(),
                "Identity lookup failed"
            );
            AuthError::from(e)
        })?;

        match found {
            Some(identity) => Ok(identity),
            None => {
                tracing::debug!(
                    target: "guard.identity",
                    via_hook = self.hook.is_some(),
                    "No identity matches token credentials"
                );
                Err(AuthError::UserNotFound { credentials })
            }
        }
    }
}
