//! Resource role checks.

use crate::auth::claims::ResourceAccess;

/// Whether `resource_access` grants `role` on `resource`.
///
/// Pure query. False when the resource is absent, when it has no roles, or
/// when no role matches exactly (case-sensitive).
pub fn has_role(resource_access: &ResourceAccess, resource: &str, role: &str) -> bool {
    resource_access
        .roles(resource)
        .is_some_and(|roles| roles.iter().any(|r| r == role))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::claims::DecodedClaims;
    use serde_json::json;

    fn access(value: serde_json::Value) -> ResourceAccess {
        DecodedClaims::from_payload(json!({"exp": 1, "resource_access": value}))
            .unwrap()
            .resource_access()
            .clone()
    }

    #[test]
    fn test_has_role_granted() {
        let access = access(json!({"app-a": {"roles": ["admin"]}}));

        assert!(has_role(&access, "app-a", "admin"));
        assert!(!has_role(&access, "app-a", "user"));
        assert!(!has_role(&access, "app-c", "admin"));
    }

    #[test]
    fn test_has_role_is_case_sensitive() {
        let access = access(json!({"app-a": {"roles": ["Admin"]}}));

        assert!(has_role(&access, "app-a", "Admin"));
        assert!(!has_role(&access, "app-a", "admin"));
        assert!(!has_role(&access, "APP-A", "Admin"));
    }

    #[test]
    fn test_has_role_without_roles_list() {
        let access = access(json!({"app-a": {}}));
        assert!(!has_role(&access, "app-a", "admin"));
    }

    #[test]
    fn test_has_role_on_empty_access() {
        assert!(!has_role(&ResourceAccess::default(), "app-a", "admin"));
    }

    #[test]
    fn test_has_role_no_partial_match() {
        let access = access(json!({"app-a": {"roles": ["administrator"]}}));
        assert!(!has_role(&access, "app-a", "admin"));
    }
}
