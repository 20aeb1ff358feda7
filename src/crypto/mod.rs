//! Crypto Module
//!
//! Key fingerprints and payload encryption.
//!
//! ## Responsibilities
//! - Hash row keys into fixed-width `HashedKey`s for indexing
//! - Fingerprint the encryption key so a wrong key is rejected at open
//! - Encrypt/decrypt serialized payloads (identity when disabled)
//!
//! Both primitives are built on BLAKE3. The store treats their output as
//! opaque: hashes are only compared for equality, ciphertexts only round-trip.

mod cipher;
mod hash;

pub use cipher::Cipher;
pub use hash::{hash_key, HashedKey, HASHED_KEY_LEN};
