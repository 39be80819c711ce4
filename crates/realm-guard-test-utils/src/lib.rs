//! # Realm Guard Test Utilities
//!
//! Shared test utilities for the `realm-guard` crate.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (seeded Ed25519 keys, fixed RSA keys)
//! - Test data builders (`TestTokenBuilder`)
//! - Fixed test IDs and names
//!
//! ## Usage
//!
//! ```rust,ignore
//! use realm_guard_test_utils::*;
//!
//! let key = TestSigningKey::ed25519(1);
//!
//! let token = TestTokenBuilder::new()
//!     .for_user("alice")
//!     .with_resource_role(TEST_RESOURCE_APP_A, "admin")
//!     .sign_with(&key);
//! ```

pub mod crypto_fixtures;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use test_ids::*;
pub use token_builders::*;
