//! API key generation and hashing

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::domain::api_key::{lookup_prefix, KEY_SECRET_HEX_LENGTH, KEY_TYPE_PREFIX};

/// A freshly minted key; `key` is shown to the owner exactly once
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    pub key: String,
    /// Stored lookup prefix (first 12 characters)
    pub prefix: String,
    /// Stored hash
    pub hash: String,
}

/// Mints `sk_live_` keys with a 128-bit random secret
#[derive(Debug, Clone, Default)]
pub struct ApiKeyGenerator;

impl ApiKeyGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self) -> GeneratedApiKey {
        let mut secret = [0u8; KEY_SECRET_HEX_LENGTH / 2];
        rand::thread_rng().fill_bytes(&mut secret);

        self.from_key(format!("{}{}", KEY_TYPE_PREFIX, hex::encode(secret)))
    }

    /// Derive prefix and hash for a known key string
    pub fn from_key(&self, key: String) -> GeneratedApiKey {
        GeneratedApiKey {
            prefix: lookup_prefix(&key).to_string(),
            hash: self.hash_key(&key),
            key,
        }
    }

    pub fn hash_key(&self, key: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        format!("sha256${}", URL_SAFE_NO_PAD.encode(digest))
    }

    /// Compare a presented key with a stored hash in constant time
    pub fn verify_key(&self, key: &str, stored_hash: &str) -> bool {
        constant_time_compare(&self.hash_key(key), stored_hash)
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
