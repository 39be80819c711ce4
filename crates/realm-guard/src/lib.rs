//! Realm Guard
//!
//! Per-request authentication for services that accept access tokens
//! issued by an identity realm (Keycloak-style `resource_access` claims):
//!
//! - Token verification against an ordered ring of realm public keys
//! - Resource allow-list enforcement
//! - Identity resolution through an identity store or a named retrieval hook
//! - Resource role queries for downstream authorization
//!
//! # Flow
//!
//! ```text
//! request -> extract token -> TokenVerifier -> ResourceAccessPolicy
//!         -> IdentityResolver -> AuthGuard (authenticated | unauthenticated)
//! ```
//!
//! # Modules
//!
//! - `auth` - Key ring, verifier, claims, resource policy, role checks
//! - `config` - Guard configuration from environment
//! - `errors` - Per-request error kinds
//! - `guard` - Per-request orchestration and accessors
//! - `identity` - Identity store seams and resolution
//! - `observability` - Metrics
//! - `request` - Token extraction from HTTP requests

pub mod auth;
pub mod config;
pub mod errors;
pub mod guard;
pub mod identity;
pub mod observability;
pub mod request;

pub use config::{ConfigError, GuardConfig};
pub use errors::{AuthError, StoreError};
pub use guard::{AuthGuard, AuthOutcome, BoundIdentity, GuardContext};
pub use identity::{Credentials, Identity, IdentityStore, RetrievalHook, RetrievalHooks};
pub use request::{extract_token, TokenSource};
