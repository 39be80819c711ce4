//! Token verification, claims, resource policy and role checks.

pub mod claims;
pub mod keys;
pub mod policy;
pub mod roles;
pub mod verifier;

pub use claims::{DecodedClaims, ResourceAccess, ResourceRoles};
pub use keys::{KeyRing, RealmKey};
pub use policy::ResourceAccessPolicy;
pub use verifier::{TokenVerifier, VerifiedToken, MAX_TOKEN_SIZE_BYTES};
