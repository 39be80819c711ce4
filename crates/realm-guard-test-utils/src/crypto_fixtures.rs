//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs derived from seed values and two
//! fixed RSA-2048 keypairs for the RS256 path. Public keys are produced in
//! the same shapes a realm exposes them: full PEM blocks, or the bare base64
//! body without armour.

use base64::engine::general_purpose;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use thiserror::Error;

const RSA_1_PRIVATE_PEM: &str = include_str!("fixtures/rsa-1-private.pem");
const RSA_1_PUBLIC_PEM: &str = include_str!("fixtures/rsa-1-public.pem");
const RSA_2_PRIVATE_PEM: &str = include_str!("fixtures/rsa-2-private.pem");
const RSA_2_PUBLIC_PEM: &str = include_str!("fixtures/rsa-2-public.pem");

/// DER prefix of an Ed25519 `SubjectPublicKeyInfo` (RFC 8410), followed by
/// the 32 raw public key bytes.
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// Generate a deterministic Ed25519 signing key for testing.
///
/// The same seed always produces the same keypair, ensuring test reproducibility.
///
/// # Returns
/// * `Ok((public_key_pem, private_key_pkcs8))` - Public key as an SPKI PEM block,
///   private key in PKCS#8 DER
pub fn test_signing_key(seed: u8) -> Result<(String, Vec<u8>), FixtureError> {
    let seed_bytes = seed_bytes(seed);

    let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
        .map_err(|e| FixtureError::Crypto(format!("Failed to generate test keypair: {:?}", e)))?;

    let mut spki = ED25519_SPKI_PREFIX.to_vec();
    spki.extend_from_slice(key_pair.public_key().as_ref());

    let public_key_pem = format!(
        "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----",
        general_purpose::STANDARD.encode(spki)
    );

    Ok((public_key_pem, build_pkcs8_from_seed(&seed_bytes)))
}

fn seed_bytes(seed: u8) -> [u8; 32] {
    let mut seed_bytes = [0u8; 32];
    seed_bytes[0] = seed;
    for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
        *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
    }
    seed_bytes
}

/// Build PKCS#8 v1 document from Ed25519 seed
///
/// This is a test-only utility. Production code never sees private keys.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    // SEQUENCE { version INTEGER (0), algorithm AlgorithmIdentifier,
    //            privateKey OCTET STRING { OCTET STRING seed } }
    let mut pkcs8 = Vec::with_capacity(48);

    pkcs8.push(0x30);
    pkcs8.push(0x2e); // Length: 46 bytes

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // Algorithm Identifier: OID 1.3.101.112 (Ed25519)
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);

    // Private Key: OCTET STRING wrapping the 32-byte seed
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);

    pkcs8
}

/// A signing key with its matching public key, ready to mint test tokens.
///
/// # Example
/// ```rust,ignore
/// let key = TestSigningKey::ed25519(1);
/// let token = key.sign(&TestTokenBuilder::new().build());
/// let ring = vec![key.public_key_pem().to_string()];
/// ```
#[derive(Clone)]
pub struct TestSigningKey {
    kid: String,
    algorithm: Algorithm,
    public_key_pem: String,
    encoding_key: EncodingKey,
}

impl TestSigningKey {
    /// Deterministic Ed25519 key (`EdDSA`) derived from `seed`.
    pub fn ed25519(seed: u8) -> Self {
        let (public_key_pem, pkcs8) =
            test_signing_key(seed).expect("Failed to create Ed25519 test key");
        Self {
            kid: format!("test-ed25519-{seed}"),
            algorithm: Algorithm::EdDSA,
            public_key_pem,
            encoding_key: EncodingKey::from_ed_der(&pkcs8),
        }
    }

    /// One of the two fixed RSA-2048 keys (`RS256`). `index` must be 1 or 2.
    pub fn rsa(index: u8) -> Self {
        let (private_pem, public_pem) = match index {
            1 => (RSA_1_PRIVATE_PEM, RSA_1_PUBLIC_PEM),
            2 => (RSA_2_PRIVATE_PEM, RSA_2_PUBLIC_PEM),
            other => panic!("No RSA fixture with index {other}"),
        };
        Self {
            kid: format!("test-rsa-{index}"),
            algorithm: Algorithm::RS256,
            public_key_pem: public_pem.trim().to_string(),
            encoding_key: EncodingKey::from_rsa_pem(private_pem.as_bytes())
                .expect("Invalid RSA fixture"),
        }
    }

    /// Override the `kid` header written into signed tokens.
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = kid.to_string();
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The public key as a full PEM block.
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// The public key body without PEM armour or line breaks, as realm
    /// consoles display it.
    pub fn bare_public_key(&self) -> String {
        self.public_key_pem
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect::<String>()
    }

    /// Sign `claims` with this key.
    pub fn sign(&self, claims: &serde_json::Value) -> String {
        let mut header = Header::new(self.algorithm);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());

        self.sign_with_header(&header, claims)
    }

    /// Sign `claims` with a caller-supplied header.
    pub fn sign_with_header(&self, header: &Header, claims: &serde_json::Value) -> String {
        encode(header, claims, &self.encoding_key).expect("Failed to sign test token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_is_deterministic() {
        let (pub1, priv1) = test_signing_key(1).unwrap();
        let (pub2, priv2) = test_signing_key(1).unwrap();

        assert_eq!(pub1, pub2, "Public keys should be identical for same seed");
        assert_eq!(
            priv1, priv2,
            "Private keys should be identical for same seed"
        );
    }

    #[test]
    fn test_different_seeds_produce_different_keys() {
        let (pub1, _) = test_signing_key(1).unwrap();
        let (pub2, _) = test_signing_key(2).unwrap();

        assert_ne!(pub1, pub2, "Different seeds should produce different keys");
    }

    #[test]
    fn test_public_key_pem_is_spki() {
        let (pem, _) = test_signing_key(7).unwrap();
        let body: String = pem.lines().filter(|l| !l.starts_with("-----")).collect();
        let der = general_purpose::STANDARD.decode(body).unwrap();

        assert_eq!(der.len(), 44);
        assert!(der.starts_with(&ED25519_SPKI_PREFIX));
    }

    #[test]
    fn test_bare_public_key_strips_armour() {
        let key = TestSigningKey::rsa(1);
        let bare = key.bare_public_key();

        assert!(!bare.contains("-----"));
        assert!(!bare.contains('\n'));
        assert!(key.public_key_pem().contains(&bare[..64]));
    }

    #[test]
    fn test_sign_produces_three_segments() {
        let key = TestSigningKey::ed25519(3);
        let token = key.sign(&serde_json::json!({"exp": 4_102_444_800_i64}));

        assert_eq!(token.split('.').count(), 3);
    }
}
