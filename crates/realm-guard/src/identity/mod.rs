//! Identity resolution.
//!
//! Maps verified claims to an application identity, either through an
//! identity store lookup (optionally replaced by a named retrieval hook)
//! or by building a claims-only identity without touching the store.

pub mod mock;
pub mod resolver;

pub use resolver::IdentityResolver;

use crate::auth::claims::DecodedClaims;
use crate::errors::StoreError;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// An application-level identity.
pub trait Identity: Send + Sync {
    /// Identifier type exposed through `AuthGuard::identity_id`.
    type Id;

    /// The identity's identifier, if it has one (claims-only identities
    /// often do not).
    fn id(&self) -> Option<Self::Id>;
}

/// Credential mapping used for identity lookups, e.g. `{"username": "alice"}`.
///
/// Displays as compact JSON so it can be carried in diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, Value>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mapping with one field.
    pub fn single(field: impl Into<String>, value: Value) -> Self {
        let mut credentials = Self::new();
        credentials.insert(field, value);
        credentials
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Backing store for application identities.
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    type Identity: Identity + Send + Sync + 'static;

    /// Look up an identity by credential mapping.
    ///
    /// Returns `Ok(None)` when no record matches. `Err` is reserved for
    /// lookups that could not be performed.
    async fn retrieve_by_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<Self::Identity>, StoreError>;

    /// Build an identity from claims alone, without a lookup.
    fn identity_from_claims(&self, claims: &DecodedClaims) -> Self::Identity;
}

/// Custom lookup replacing `IdentityStore::retrieve_by_credentials`.
#[async_trait::async_trait]
pub trait RetrievalHook<I: Send + 'static>: Send + Sync {
    async fn retrieve(
        &self,
        claims: &DecodedClaims,
        credentials: &Credentials,
    ) -> Result<Option<I>, StoreError>;
}

/// Named retrieval hooks, one of which may be selected by configuration.
pub struct RetrievalHooks<I: Send + 'static> {
    hooks: HashMap<String, Arc<dyn RetrievalHook<I>>>,
}

impl<I: Send + 'static> RetrievalHooks<I> {
    pub fn new() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    /// Register `hook` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, hook: Arc<dyn RetrievalHook<I>>) {
        self.hooks.insert(name.into(), hook);
    }

    /// Builder form of [`RetrievalHooks::register`].
    pub fn with(mut self, name: impl Into<String>, hook: Arc<dyn RetrievalHook<I>>) -> Self {
        self.register(name, hook);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RetrievalHook<I>>> {
        self.hooks.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<I: Send + 'static> Default for RetrievalHooks<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Send + 'static> fmt::Debug for RetrievalHooks<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalHooks")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::mock::{MockIdentity, MockRetrievalHook};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credentials_display_is_json() {
        let credentials = Credentials::single("username", json!("mallory"));
        assert_eq!(credentials.to_string(), r#"{"username":"mallory"}"#);
    }

    #[test]
    fn test_credentials_display_null_principal() {
        let credentials = Credentials::single("username", Value::Null);
        assert_eq!(credentials.to_string(), r#"{"username":null}"#);
    }

    #[test]
    fn test_credentials_are_ordered() {
        let mut credentials = Credentials::new();
        credentials.insert("username", json!("alice"));
        credentials.insert("realm", json!("main"));

        let fields: Vec<&str> = credentials.iter().map(|(field, _)| field).collect();
        assert_eq!(fields, vec!["realm", "username"]);
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials.get("username"), Some(&json!("alice")));
    }

    #[test]
    fn test_retrieval_hooks_lookup() {
        let hook = Arc::new(MockRetrievalHook::returning(MockIdentity::new(7, "alice")));
        let hooks = RetrievalHooks::<MockIdentity>::new()
            .with("by_email", hook.clone())
            .with("by_subject", hook);

        assert!(hooks.get("by_email").is_some());
        assert!(hooks.get("by_phone").is_none());
        assert_eq!(hooks.names(), vec!["by_email", "by_subject"]);
    }
}
