//! Resource allow-list policy.
//!
//! A token passes when at least one resource named in its `resource_access`
//! claim is on the operator's allow-list. Deployments that do not scope
//! tokens per resource switch the check off entirely.

use crate::auth::claims::DecodedClaims;
use crate::errors::AuthError;
use std::collections::BTreeSet;

/// Allow-list check over the `resource_access` claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAccessPolicy {
    allowed: BTreeSet<String>,
    ignore: bool,
}

impl ResourceAccessPolicy {
    pub fn new<I, S>(allowed: I, ignore: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            ignore,
        }
    }

    /// Parse a comma-separated allow-list. Names are trimmed and empty
    /// entries dropped.
    pub fn parse_allowed(list: &str) -> BTreeSet<String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    pub fn allowed(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    /// Check `claims` against the allow-list.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ResourceAccessDenied` when the claim's resources
    /// and the allow-list do not intersect (an empty claim never does).
    pub fn validate(&self, claims: &DecodedClaims) -> Result<(), AuthError> {
        if self.ignore {
            return Ok(());
        }

        let permitted = claims
            .resource_access()
            .resources()
            .any(|resource| self.allowed.contains(resource));

        if !permitted {
            tracing::debug!(
                target: "guard.policy",
                token_resources = ?claims.resource_access().resources().collect::<Vec<_>>(),
                "Token rejected: no allowed resource in resource_access"
            );
            return Err(AuthError::ResourceAccessDenied {
                allowed: self.allowed.iter().cloned().collect(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims_with(resource_access: serde_json::Value) -> DecodedClaims {
        DecodedClaims::from_payload(json!({"exp": 1, "resource_access": resource_access}))
            .unwrap()
    }

    #[test]
    fn test_parse_allowed_trims_and_drops_empty() {
        let allowed = ResourceAccessPolicy::parse_allowed(" app-a, app-b ,,");
        assert_eq!(
            allowed.into_iter().collect::<Vec<_>>(),
            vec!["app-a".to_string(), "app-b".to_string()]
        );
    }

    #[test]
    fn test_validate_passes_on_intersection() {
        let policy = ResourceAccessPolicy::new(["app-a", "app-b"], false);
        let claims = claims_with(json!({"app-a": {"roles": ["admin"]}}));

        assert!(policy.validate(&claims).is_ok());
    }

    #[test]
    fn test_validate_passes_with_extra_token_resources() {
        let policy = ResourceAccessPolicy::new(["app-b"], false);
        let claims = claims_with(json!({"account": {"roles": []}, "app-b": {}}));

        assert!(policy.validate(&claims).is_ok());
    }

    #[test]
    fn test_validate_rejects_disjoint_resources() {
        let policy = ResourceAccessPolicy::new(["app-a", "app-b"], false);
        let claims = claims_with(json!({"app-c": {"roles": ["admin"]}}));

        let err = policy.validate(&claims).unwrap_err();
        assert_eq!(
            err,
            AuthError::ResourceAccessDenied {
                allowed: vec!["app-a".to_string(), "app-b".to_string()]
            }
        );
    }

    #[test]
    fn test_validate_rejects_empty_resource_access() {
        let policy = ResourceAccessPolicy::new(["app-a"], false);
        let claims = DecodedClaims::from_payload(json!({"exp": 1})).unwrap();

        assert!(matches!(
            policy.validate(&claims),
            Err(AuthError::ResourceAccessDenied { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_with_empty_allow_list() {
        let policy = ResourceAccessPolicy::new(Vec::<String>::new(), false);
        let claims = claims_with(json!({"app-a": {}}));

        assert!(policy.validate(&claims).is_err());
    }

    #[test]
    fn test_ignore_flag_always_passes() {
        let policy = ResourceAccessPolicy::new(Vec::<String>::new(), true);
        let empty = DecodedClaims::from_payload(json!({"exp": 1})).unwrap();
        let disjoint = claims_with(json!({"app-c": {}}));

        assert!(policy.is_ignored());
        assert!(policy.validate(&empty).is_ok());
        assert!(policy.validate(&disjoint).is_ok());
    }
}
