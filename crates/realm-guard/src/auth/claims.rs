//! Decoded token claims.
//!
//! Contains the claims extracted from a verified token. The registered time
//! claims and `resource_access` are typed; the full payload is kept so any
//! other claim can be read later. Debug output redacts everything except
//! timestamps and resource names.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Roles granted on a single resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResourceRoles {
    /// Role names, compared exactly and case-sensitively.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// The `resource_access` claim: resource name to granted roles.
///
/// Absent or `null` in the token decodes to an empty mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ResourceAccess(BTreeMap<String, ResourceRoles>);

impl ResourceAccess {
    pub fn new(resources: BTreeMap<String, ResourceRoles>) -> Self {
        Self(resources)
    }

    /// Resource names in the claim.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Roles granted on `resource`, if the resource is present.
    pub fn roles(&self, resource: &str) -> Option<&[String]> {
        self.0.get(resource).map(|r| r.roles.as_slice())
    }

    pub fn contains_resource(&self, resource: &str) -> bool {
        self.0.contains_key(resource)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Typed view of the claims the guard itself relies on.
#[derive(Deserialize)]
struct RegisteredClaims {
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    nbf: Option<i64>,
    #[serde(default)]
    resource_access: Option<ResourceAccess>,
}

/// Claims of a verified token.
#[derive(Clone, PartialEq)]
pub struct DecodedClaims {
    expires_at: i64,
    issued_at: Option<i64>,
    not_before: Option<i64>,
    resource_access: ResourceAccess,
    payload: Map<String, Value>,
}

/// Custom Debug implementation that redacts claim values.
///
/// Principal identifiers and custom claims are sensitive; only timestamps
/// and the resource names are shown.
impl fmt::Debug for DecodedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedClaims")
            .field("exp", &self.expires_at)
            .field("iat", &self.issued_at)
            .field("nbf", &self.not_before)
            .field(
                "resource_access",
                &self.resource_access.resources().collect::<Vec<_>>(),
            )
            .field("payload", &"[REDACTED]")
            .finish()
    }
}

impl DecodedClaims {
    /// Build claims from a decoded JSON payload.
    ///
    /// # Errors
    ///
    /// Fails if the payload is not an object, `exp` is missing or not an
    /// integer, or `resource_access` has the wrong shape.
    pub fn from_payload(payload: Value) -> Result<Self, serde_json::Error> {
        let registered = RegisteredClaims::deserialize(&payload)?;
        let Value::Object(payload) = payload else {
            return Err(serde::de::Error::custom("claims payload is not an object"));
        };

        Ok(Self {
            expires_at: registered.exp,
            issued_at: registered.iat,
            not_before: registered.nbf,
            resource_access: registered.resource_access.unwrap_or_default(),
            payload,
        })
    }

    /// Expiration timestamp (Unix epoch seconds).
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Issued-at timestamp (Unix epoch seconds), if present.
    pub fn issued_at(&self) -> Option<i64> {
        self.issued_at
    }

    /// Not-before timestamp (Unix epoch seconds), if present.
    pub fn not_before(&self) -> Option<i64> {
        self.not_before
    }

    pub fn resource_access(&self) -> &ResourceAccess {
        &self.resource_access
    }

    /// Any claim of the payload by name.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// The full claims payload.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// The payload serialized as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.payload).unwrap_or_default()
    }

    /// Whether the token grants `role` on `resource`.
    pub fn has_role(&self, resource: &str, role: &str) -> bool {
        crate::auth::roles::has_role(&self.resource_access, resource, role)
    }
}
