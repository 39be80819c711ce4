//! Realm Guard configuration.
//!
//! Configuration is loaded from environment variables once at start-up and
//! shared read-only afterwards. Key material is parsed here, so a malformed
//! key is a start-up failure rather than a per-request one. Key bodies are
//! never printed; Debug output shows fingerprints only.

use crate::auth::keys::{parse_algorithm, KeyRing};
use crate::auth::policy::ResourceAccessPolicy;
use jsonwebtoken::Algorithm;
use std::collections::{BTreeSet, HashMap};
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default signature algorithm.
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::RS256;

/// Default claim naming the principal to look up.
pub const DEFAULT_PRINCIPAL_ATTRIBUTE: &str = "preferred_username";

/// Default identity store field the principal is matched against.
pub const DEFAULT_CREDENTIAL_FIELD: &str = "username";

/// Maximum allowed leeway for time-based claims (1 hour).
pub const MAX_LEEWAY: Duration = Duration::from_secs(3600);

/// Guard configuration.
#[derive(Clone)]
pub struct GuardConfig {
    /// Trusted realm keys, in trial order.
    pub key_ring: KeyRing,

    /// Tolerance applied to `exp`, `nbf` and `iat` checks.
    pub leeway: Duration,

    /// Request field consulted when no bearer header is present.
    pub input_key: Option<String>,

    /// Resources a token must name in `resource_access`.
    pub allowed_resources: BTreeSet<String>,

    /// Skip the resource allow-list check entirely.
    pub ignore_resources_validation: bool,

    /// Look identities up in the identity store (otherwise build them from claims).
    pub load_user_from_store: bool,

    /// Attach the decoded claims to the resolved identity.
    pub append_decoded_token: bool,

    /// Name of a registered retrieval hook that replaces the default lookup.
    pub retrieval_hook: Option<String>,

    /// Claim carrying the lookup principal.
    pub principal_attribute: String,

    /// Identity store field matched against the principal.
    pub credential_field: String,
}

/// Custom Debug implementation that keeps key material out of logs.
impl fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field("algorithm", &self.key_ring.algorithm())
            .field("key_count", &self.key_ring.len())
            .field("key_fingerprints", &self.key_ring.fingerprints())
            .field("leeway", &self.leeway)
            .field("input_key", &self.input_key)
            .field("allowed_resources", &self.allowed_resources)
            .field(
                "ignore_resources_validation",
                &self.ignore_resources_validation,
            )
            .field("load_user_from_store", &self.load_user_from_store)
            .field("append_decoded_token", &self.append_decoded_token)
            .field("retrieval_hook", &self.retrieval_hook)
            .field("principal_attribute", &self.principal_attribute)
            .field("credential_field", &self.credential_field)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("No realm public keys configured")]
    EmptyKeyRing,

    #[error("Invalid realm key list: {0}")]
    InvalidKeyList(String),

    #[error("Invalid realm public key at index {index}: {reason}")]
    InvalidKey { index: usize, reason: String },

    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid leeway configuration: {0}")]
    InvalidLeeway(String),

    #[error("Invalid boolean for {name}: '{value}'")]
    InvalidBool { name: String, value: String },

    #[error("Unknown identity retrieval hook: {0}")]
    UnknownRetrievalHook(String),
}

impl GuardConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let raw_keys = vars
            .get("REALM_PUBLIC_KEYS")
            .ok_or_else(|| ConfigError::MissingEnvVar("REALM_PUBLIC_KEYS".to_string()))?;

        let algorithm = match non_empty(vars, "TOKEN_ALGORITHM") {
            Some(name) => parse_algorithm(name)?,
            None => DEFAULT_ALGORITHM,
        };

        let pems = KeyRing::parse_key_list(raw_keys)?;
        let key_ring = KeyRing::from_pems(&pems, algorithm)?;

        // Parse leeway with validation
        let leeway = if let Some(value_str) = non_empty(vars, "TOKEN_LEEWAY_SECONDS") {
            let value: u64 = value_str.trim().parse().map_err(|e| {
                ConfigError::InvalidLeeway(format!(
                    "TOKEN_LEEWAY_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_LEEWAY.as_secs() {
                return Err(ConfigError::InvalidLeeway(format!(
                    "TOKEN_LEEWAY_SECONDS must not exceed {} seconds, got {}",
                    MAX_LEEWAY.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            Duration::ZERO
        };

        let ignore_resources_validation =
            parse_bool(vars, "IGNORE_RESOURCES_VALIDATION", false)?;

        let allowed_resources = match vars.get("ALLOWED_RESOURCES") {
            Some(list) => ResourceAccessPolicy::parse_allowed(list),
            None if ignore_resources_validation => BTreeSet::new(),
            None => return Err(ConfigError::MissingEnvVar("ALLOWED_RESOURCES".to_string())),
        };

        let load_user_from_store = parse_bool(vars, "LOAD_USER_FROM_STORE", true)?;
        let append_decoded_token = parse_bool(vars, "APPEND_DECODED_TOKEN", false)?;

        let principal_attribute = non_empty(vars, "TOKEN_PRINCIPAL_ATTRIBUTE")
            .unwrap_or(DEFAULT_PRINCIPAL_ATTRIBUTE)
            .to_string();

        let credential_field = non_empty(vars, "IDENTITY_CREDENTIAL_FIELD")
            .unwrap_or(DEFAULT_CREDENTIAL_FIELD)
            .to_string();

        let config = GuardConfig {
            key_ring,
            leeway,
            input_key: non_empty(vars, "TOKEN_INPUT_KEY").map(ToString::to_string),
            allowed_resources,
            ignore_resources_validation,
            load_user_from_store,
            append_decoded_token,
            retrieval_hook: non_empty(vars, "IDENTITY_RETRIEVAL_HOOK").map(ToString::to_string),
            principal_attribute,
            credential_field,
        };

        tracing::info!(target: "guard.config", config = ?config, "Guard configuration loaded");

        Ok(config)
    }

    /// Build a configuration around an already parsed key ring, with every
    /// other setting at its default.
    pub fn with_key_ring<I, S>(key_ring: KeyRing, allowed_resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GuardConfig {
            key_ring,
            leeway: Duration::ZERO,
            input_key: None,
            allowed_resources: allowed_resources.into_iter().map(Into::into).collect(),
            ignore_resources_validation: false,
            load_user_from_store: true,
            append_decoded_token: false,
            retrieval_hook: None,
            principal_attribute: DEFAULT_PRINCIPAL_ATTRIBUTE.to_string(),
            credential_field: DEFAULT_CREDENTIAL_FIELD.to_string(),
        }
    }

    /// The resource policy described by this configuration.
    pub fn resource_policy(&self) -> ResourceAccessPolicy {
        ResourceAccessPolicy::new(
            self.allowed_resources.iter().cloned(),
            self.ignore_resources_validation,
        )
    }
}

fn non_empty<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

fn parse_bool(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = non_empty(vars, name) else {
        return Ok(default);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use realm_guard_test_utils::TestSigningKey;

    fn base_vars() -> HashMap<String, String> {
        let key = TestSigningKey::ed25519(1);
        HashMap::from([
            (
                "REALM_PUBLIC_KEYS".to_string(),
                serde_json::to_string(&[key.public_key_pem()]).unwrap(),
            ),
            ("TOKEN_ALGORITHM".to_string(), "EdDSA".to_string()),
            ("ALLOWED_RESOURCES".to_string(), "app-a,app-b".to_string()),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let vars = base_vars();

        let config = GuardConfig::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.key_ring.len(), 1);
        assert_eq!(config.key_ring.algorithm(), Algorithm::EdDSA);
        assert_eq!(config.leeway, Duration::ZERO);
        assert_eq!(config.input_key, None);
        assert_eq!(
            config.allowed_resources.iter().collect::<Vec<_>>(),
            vec!["app-a", "app-b"]
        );
        assert!(!config.ignore_resources_validation);
        assert!(config.load_user_from_store);
        assert!(!config.append_decoded_token);
        assert_eq!(config.retrieval_hook, None);
        assert_eq!(config.principal_attribute, DEFAULT_PRINCIPAL_ATTRIBUTE);
        assert_eq!(config.credential_field, DEFAULT_CREDENTIAL_FIELD);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("TOKEN_LEEWAY_SECONDS".to_string(), "30".to_string());
        vars.insert("TOKEN_INPUT_KEY".to_string(), "api_token".to_string());
        vars.insert("LOAD_USER_FROM_STORE".to_string(), "no".to_string());
        vars.insert("APPEND_DECODED_TOKEN".to_string(), "TRUE".to_string());
        vars.insert("IDENTITY_RETRIEVAL_HOOK".to_string(), "by_email".to_string());
        vars.insert("TOKEN_PRINCIPAL_ATTRIBUTE".to_string(), "email".to_string());
        vars.insert("IDENTITY_CREDENTIAL_FIELD".to_string(), "mail".to_string());

        let config = GuardConfig::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.leeway, Duration::from_secs(30));
        assert_eq!(config.input_key.as_deref(), Some("api_token"));
        assert!(!config.load_user_from_store);
        assert!(config.append_decoded_token);
        assert_eq!(config.retrieval_hook.as_deref(), Some("by_email"));
        assert_eq!(config.principal_attribute, "email");
        assert_eq!(config.credential_field, "mail");
    }

    #[test]
    fn test_from_vars_missing_keys() {
        let mut vars = base_vars();
        vars.remove("REALM_PUBLIC_KEYS");

        let result = GuardConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "REALM_PUBLIC_KEYS"));
    }

    #[test]
    fn test_from_vars_empty_key_list() {
        let mut vars = base_vars();
        vars.insert("REALM_PUBLIC_KEYS".to_string(), "[]".to_string());

        let result = GuardConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::EmptyKeyRing)));
    }

    #[test]
    fn test_from_vars_single_bare_key() {
        let key = TestSigningKey::rsa(1);
        let mut vars = base_vars();
        vars.remove("TOKEN_ALGORITHM");
        vars.insert("REALM_PUBLIC_KEYS".to_string(), key.bare_public_key());

        let config = GuardConfig::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.key_ring.algorithm(), Algorithm::RS256);
        assert_eq!(config.key_ring.len(), 1);
    }

    #[test]
    fn test_from_vars_rejects_key_for_other_algorithm() {
        let mut vars = base_vars();
        vars.insert("TOKEN_ALGORITHM".to_string(), "RS256".to_string());

        let result = GuardConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidKey { index: 0, .. })));
    }

    #[test]
    fn test_from_vars_rejects_symmetric_algorithm() {
        let mut vars = base_vars();
        vars.insert("TOKEN_ALGORITHM".to_string(), "HS256".to_string());

        let result = GuardConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_leeway_accepts_max() {
        let mut vars = base_vars();
        vars.insert("TOKEN_LEEWAY_SECONDS".to_string(), "3600".to_string());

        let config = GuardConfig::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.leeway, MAX_LEEWAY);
    }

    #[test]
    fn test_leeway_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("TOKEN_LEEWAY_SECONDS".to_string(), "3601".to_string());

        let result = GuardConfig::from_vars(&vars);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidLeeway(msg)) if msg.contains("must not exceed 3600")
        ));
    }

    #[test]
    fn test_leeway_rejects_negative() {
        let mut vars = base_vars();
        vars.insert("TOKEN_LEEWAY_SECONDS".to_string(), "-5".to_string());

        let result = GuardConfig::from_vars(&vars);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidLeeway(msg)) if msg.contains("non-negative integer")
        ));
    }

    #[test]
    fn test_allowed_resources_required_unless_ignored() {
        let mut vars = base_vars();
        vars.remove("ALLOWED_RESOURCES");

        let result = GuardConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "ALLOWED_RESOURCES"));

        vars.insert("IGNORE_RESOURCES_VALIDATION".to_string(), "1".to_string());
        let config = GuardConfig::from_vars(&vars).expect("Config should load successfully");
        assert!(config.ignore_resources_validation);
        assert!(config.allowed_resources.is_empty());
        assert!(config.resource_policy().is_ignored());
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let mut vars = base_vars();
        vars.insert("APPEND_DECODED_TOKEN".to_string(), "maybe".to_string());

        let result = GuardConfig::from_vars(&vars);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidBool { name, .. }) if name == "APPEND_DECODED_TOKEN"
        ));
    }

    #[test]
    fn test_debug_omits_key_material() {
        let key = TestSigningKey::ed25519(1);
        let config = GuardConfig::from_vars(&base_vars()).unwrap();

        let debug = format!("{config:?}");
        assert!(debug.contains("key_fingerprints"));
        assert!(!debug.contains(&key.bare_public_key()));
        assert!(!debug.contains("BEGIN PUBLIC KEY"));
    }

    #[test]
    fn test_with_key_ring_defaults() {
        let key = TestSigningKey::ed25519(1);
        let ring = KeyRing::from_pems(&[key.public_key_pem()], Algorithm::EdDSA).unwrap();

        let config = GuardConfig::with_key_ring(ring, ["app-a"]);
        let policy = config.resource_policy();

        assert!(!policy.is_ignored());
        assert!(policy.allowed().contains("app-a"));
        assert!(config.load_user_from_store);
        assert_eq!(config.principal_attribute, DEFAULT_PRINCIPAL_ATTRIBUTE);
    }
}
