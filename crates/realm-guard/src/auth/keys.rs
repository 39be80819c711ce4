//! Realm public key ring.
//!
//! Keys are parsed once at configuration time. Each key may be a full PEM
//! block or the bare base64 body that realm consoles display; bare bodies
//! are armoured as `PUBLIC KEY` blocks before parsing. Ring order is the
//! configured order and is the order the verifier tries keys in.

use crate::config::ConfigError;
use jsonwebtoken::{Algorithm, DecodingKey};
use ring::digest;
use std::fmt;
use std::str::FromStr;

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";
const PEM_LINE_WIDTH: usize = 64;

/// Number of digest bytes shown in a key fingerprint.
const FINGERPRINT_BYTES: usize = 8;

/// A parsed realm public key.
#[derive(Clone)]
pub struct RealmKey {
    index: usize,
    fingerprint: String,
    decoding_key: DecodingKey,
}

impl fmt::Debug for RealmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealmKey")
            .field("index", &self.index)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl RealmKey {
    /// Position of this key in the configured ring.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Short SHA-256 fingerprint of the PEM body, safe to log.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// Ordered set of trusted public keys for one signature algorithm.
#[derive(Clone)]
pub struct KeyRing {
    algorithm: Algorithm,
    keys: Vec<RealmKey>,
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("algorithm", &self.algorithm)
            .field("fingerprints", &self.fingerprints())
            .finish()
    }
}

impl KeyRing {
    /// Parse `pems` into a ring for `algorithm`.
    ///
    /// # Errors
    ///
    /// - `ConfigError::EmptyKeyRing` if no keys are given
    /// - `ConfigError::UnsupportedAlgorithm` for symmetric algorithms
    /// - `ConfigError::InvalidKey` if a key is not valid for the algorithm
    pub fn from_pems<S: AsRef<str>>(pems: &[S], algorithm: Algorithm) -> Result<Self, ConfigError> {
        if pems.is_empty() {
            return Err(ConfigError::EmptyKeyRing);
        }
        ensure_asymmetric(algorithm)?;

        let keys = pems
            .iter()
            .enumerate()
            .map(|(index, pem)| parse_key(index, pem.as_ref(), algorithm))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            target: "guard.keys",
            algorithm = ?algorithm,
            key_count = keys.len(),
            "Key ring loaded"
        );

        Ok(Self { algorithm, keys })
    }

    /// Split a configured key list into individual keys.
    ///
    /// Accepts a JSON array of strings, or a single key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidKeyList` if the value looks like a JSON
    /// array but does not parse as one.
    pub fn parse_key_list(raw: &str) -> Result<Vec<String>, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.starts_with('[') {
            let keys: Vec<String> = serde_json::from_str(trimmed)
                .map_err(|e| ConfigError::InvalidKeyList(e.to_string()))?;
            return Ok(keys.into_iter().filter(|k| !k.trim().is_empty()).collect());
        }
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![trimmed.to_string()])
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn keys(&self) -> &[RealmKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn fingerprints(&self) -> Vec<&str> {
        self.keys.iter().map(RealmKey::fingerprint).collect()
    }
}

/// Parse a configured algorithm name.
///
/// # Errors
///
/// Returns `ConfigError::UnsupportedAlgorithm` for unknown names and for
/// HMAC algorithms, which need a shared secret rather than a public key.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, ConfigError> {
    let algorithm = Algorithm::from_str(name.trim())
        .map_err(|_| ConfigError::UnsupportedAlgorithm(name.to_string()))?;
    ensure_asymmetric(algorithm)?;
    Ok(algorithm)
}

fn ensure_asymmetric(algorithm: Algorithm) -> Result<(), ConfigError> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Err(
            ConfigError::UnsupportedAlgorithm(format!("{algorithm:?}")),
        ),
        _ => Ok(()),
    }
}

fn parse_key(index: usize, raw: &str, algorithm: Algorithm) -> Result<RealmKey, ConfigError> {
    let pem = normalize_pem(raw);

    let decoding_key = match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem.as_bytes()),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem.as_bytes()),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem.as_bytes()),
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            return Err(ConfigError::UnsupportedAlgorithm(format!("{algorithm:?}")));
        }
    }
    .map_err(|e| {
        tracing::error!(target: "guard.keys", index, error = %e, "Invalid realm public key");
        ConfigError::InvalidKey {
            index,
            reason: e.to_string(),
        }
    })?;

    Ok(RealmKey {
        index,
        fingerprint: fingerprint(&pem),
        decoding_key,
    })
}

/// Armour a bare key body as a `PUBLIC KEY` PEM block; full PEM blocks pass
/// through. Escaped `\n` sequences (single-line environment values) are
/// turned into real line breaks.
pub(crate) fn normalize_pem(raw: &str) -> String {
    let unescaped = raw.trim().replace("\\n", "\n");
    if unescaped.starts_with("-----BEGIN") {
        return unescaped;
    }

    let body: Vec<char> = unescaped.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    pem.push_str(PEM_HEADER);
    pem.push('\n');
    for line in body.chunks(PEM_LINE_WIDTH) {
        pem.extend(line);
        pem.push('\n');
    }
    pem.push_str(PEM_FOOTER);
    pem
}

fn fingerprint(pem: &str) -> String {
    let body: String = pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .flat_map(str::chars)
        .filter(|c| !c.is_whitespace())
        .collect();
    let hash = digest::digest(&digest::SHA256, body.as_bytes());
    hex::encode(hash.as_ref().iter().take(FINGERPRINT_BYTES).copied().collect::<Vec<u8>>())
}
