//! Mock identity store and retrieval hook.
//!
//! Used by this crate's tests and by embedding services that need a store
//! without a database behind it.

use super::{Credentials, Identity, IdentityStore, RetrievalHook};
use crate::auth::claims::DecodedClaims;
use crate::errors::StoreError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Identity record returned by the mocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockIdentity {
    pub id: Option<u64>,
    pub username: String,
}

impl MockIdentity {
    pub fn new(id: u64, username: &str) -> Self {
        Self {
            id: Some(id),
            username: username.to_string(),
        }
    }
}

impl Identity for MockIdentity {
    type Id = u64;

    fn id(&self) -> Option<u64> {
        self.id
    }
}

/// In-memory identity store.
///
/// A record matches when every credential value equals its username.
#[derive(Debug, Default)]
pub struct MockIdentityStore {
    records: Vec<MockIdentity>,
    return_error: bool,
    lookup_count: AtomicUsize,
    constructed_count: AtomicUsize,
    last_credentials: Mutex<Option<Credentials>>,
}

impl MockIdentityStore {
    /// A store with no records.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A store holding `records`.
    pub fn with_identities(records: Vec<MockIdentity>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// A store whose lookups always fail.
    pub fn failing() -> Self {
        Self {
            return_error: true,
            ..Self::default()
        }
    }

    /// Number of `retrieve_by_credentials` calls made.
    pub fn lookup_count(&self) -> usize {
        self.lookup_count.load(Ordering::SeqCst)
    }

    /// Number of claims-only identities built.
    pub fn constructed_count(&self) -> usize {
        self.constructed_count.load(Ordering::SeqCst)
    }

    /// Credentials passed to the most recent lookup.
    pub fn last_credentials(&self) -> Option<Credentials> {
        self.last_credentials
            .lock()
            .ok()
            .and_then(|last| last.clone())
    }
}

#[async_trait::async_trait]
impl IdentityStore for MockIdentityStore {
    type Identity = MockIdentity;

    async fn retrieve_by_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<MockIdentity>, StoreError> {
        self.lookup_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_credentials.lock() {
            *last = Some(credentials.clone());
        }

        if self.return_error {
            return Err(StoreError::new("Mock identity store error"));
        }

        let found = self.records.iter().find(|record| {
            !credentials.is_empty()
                && credentials
                    .iter()
                    .all(|(_, value)| value.as_str() == Some(record.username.as_str()))
        });

        Ok(found.cloned())
    }

    fn identity_from_claims(&self, claims: &DecodedClaims) -> MockIdentity {
        self.constructed_count.fetch_add(1, Ordering::SeqCst);

        let username = claims
            .claim("preferred_username")
            .or_else(|| claims.claim("sub"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        MockIdentity { id: None, username }
    }
}

/// Retrieval hook returning a fixed result.
#[derive(Debug, Default)]
pub struct MockRetrievalHook {
    result: Option<MockIdentity>,
    return_error: bool,
    call_count: AtomicUsize,
    last_credentials: Mutex<Option<Credentials>>,
}

impl MockRetrievalHook {
    /// A hook that always returns `identity`.
    pub fn returning(identity: MockIdentity) -> Self {
        Self {
            result: Some(identity),
            ..Self::default()
        }
    }

    /// A hook that never finds anything.
    pub fn returning_none() -> Self {
        Self::default()
    }

    /// A hook whose lookups always fail.
    pub fn failing() -> Self {
        Self {
            return_error: true,
            ..Self::default()
        }
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Credentials passed to the most recent call.
    pub fn last_credentials(&self) -> Option<Credentials> {
        self.last_credentials
            .lock()
            .ok()
            .and_then(|last| last.clone())
    }
}

#[async_trait::async_trait]
impl RetrievalHook<MockIdentity> for MockRetrievalHook {
    async fn retrieve(
        &self,
        _claims: &DecodedClaims,
        credentials: &Credentials,
    ) -> Result<Option<MockIdentity>, StoreError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_credentials.lock() {
            *last = Some(credentials.clone());
        }

        if self.return_error {
            return Err(StoreError::new("Mock retrieval hook error"));
        }

        Ok(self.result.clone())
    }
}
