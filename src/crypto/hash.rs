//! Fixed-width key fingerprints

use std::fmt;

use serde::{Deserialize, Serialize};

/// Length of a `HashedKey` in hex characters
pub const HASHED_KEY_LEN: usize = 40;

/// 40-character lowercase hex fingerprint of a key's string form.
///
/// One-way: never decoded, only compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HashedKey(String);

impl HashedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HashedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash a key's string form into a `HashedKey`
pub fn hash_key(input: &str) -> HashedKey {
    let digest = blake3::hash(input.as_bytes());
    let mut hex = hex::encode(digest.as_bytes());
    hex.truncate(HASHED_KEY_LEN);
    HashedKey(hex)
}
