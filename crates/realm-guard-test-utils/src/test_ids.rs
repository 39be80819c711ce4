//! Fixed test IDs for deterministic tests
//!
//! All test IDs are deterministic to ensure reproducible test results.

use uuid::Uuid;

// Subjects (token `sub` claims)
pub const TEST_SUBJECT_ALICE: Uuid = Uuid::from_u128(100);

// Usernames (token `preferred_username` claims)
pub const TEST_USERNAME_ALICE: &str = "alice";
pub const TEST_USERNAME_BOB: &str = "bob";
pub const TEST_USERNAME_UNKNOWN: &str = "mallory";

// Store identity IDs
pub const TEST_IDENTITY_ID_ALICE: u64 = 1;
pub const TEST_IDENTITY_ID_BOB: u64 = 2;

// Resources (token `resource_access` keys)
pub const TEST_RESOURCE_APP_A: &str = "app-a";
pub const TEST_RESOURCE_APP_B: &str = "app-b";
pub const TEST_RESOURCE_APP_C: &str = "app-c";

// Roles
pub const TEST_ROLE_ADMIN: &str = "admin";
pub const TEST_ROLE_USER: &str = "user";

// Signing key ID
pub const TEST_KEY_ID: &str = "test-realm-key-01";

// Request field used as the fallback token source
pub const TEST_INPUT_KEY: &str = "api_token";
