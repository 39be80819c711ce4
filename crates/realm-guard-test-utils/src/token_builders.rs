//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating realm-style token claims.

use crate::crypto_fixtures::TestSigningKey;
use crate::test_ids::{TEST_SUBJECT_ALICE, TEST_USERNAME_ALICE};
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_resource_role("app-a", "admin")
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestTokenBuilder {
    sub: String,
    preferred_username: Option<String>,
    exp: Option<i64>,
    iat: i64,
    nbf: Option<i64>,
    resource_access: Option<Map<String, Value>>,
    extra: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults (alice, valid for one hour)
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: TEST_SUBJECT_ALICE.to_string(),
            preferred_username: Some(TEST_USERNAME_ALICE.to_string()),
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            iat: now.timestamp(),
            nbf: None,
            resource_access: None,
            extra: Map::new(),
        }
    }

    /// Set the `preferred_username` claim
    pub fn for_user(mut self, username: &str) -> Self {
        self.preferred_username = Some(username.to_string());
        self
    }

    /// Drop the `preferred_username` claim
    pub fn without_username(mut self) -> Self {
        self.preferred_username = None;
        self
    }

    /// Set the subject
    pub fn with_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Grant `role` on `resource` in the `resource_access` claim
    pub fn with_resource_role(mut self, resource: &str, role: &str) -> Self {
        let access = self.resource_access.get_or_insert_with(Map::new);
        let entry = access
            .entry(resource.to_string())
            .or_insert_with(|| json!({ "roles": [] }));
        if let Some(roles) = entry.get_mut("roles").and_then(Value::as_array_mut) {
            roles.push(Value::String(role.to_string()));
        }
        self
    }

    /// Add `resource` to `resource_access` with an arbitrary value
    pub fn with_resource_entry(mut self, resource: &str, value: Value) -> Self {
        self.resource_access
            .get_or_insert_with(Map::new)
            .insert(resource.to_string(), value);
        self
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Set an absolute expiration timestamp
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = Some(timestamp);
        self
    }

    /// Drop the `exp` claim
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Set not-before timestamp
    pub fn not_before(mut self, timestamp: i64) -> Self {
        self.nbf = Some(timestamp);
        self
    }

    /// Add an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = self.extra;
        claims.insert("sub".to_string(), Value::String(self.sub));
        claims.insert("iat".to_string(), json!(self.iat));
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), json!(exp));
        }
        if let Some(nbf) = self.nbf {
            claims.insert("nbf".to_string(), json!(nbf));
        }
        if let Some(username) = self.preferred_username {
            claims.insert("preferred_username".to_string(), Value::String(username));
        }
        if let Some(access) = self.resource_access {
            claims.insert("resource_access".to_string(), Value::Object(access));
        }
        Value::Object(claims)
    }

    /// Build the claims and sign them with `key`
    pub fn sign_with(self, key: &TestSigningKey) -> String {
        key.sign(&self.build())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creates_valid_claims() {
        let claims = TestTokenBuilder::new()
            .for_user("bob")
            .with_resource_role("app-a", "admin")
            .with_resource_role("app-a", "user")
            .build();

        assert_eq!(claims["preferred_username"], "bob");
        assert_eq!(claims["resource_access"]["app-a"]["roles"], json!(["admin", "user"]));
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn test_builder_default_has_no_resource_access() {
        let claims = TestTokenBuilder::default().build();

        assert_eq!(claims["preferred_username"], TEST_USERNAME_ALICE);
        assert!(claims.get("resource_access").is_none());
    }

    #[test]
    fn test_builder_without_expiry() {
        let claims = TestTokenBuilder::new().without_expiry().build();
        assert!(claims.get("exp").is_none());
    }
}
