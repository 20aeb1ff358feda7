//! Payload cipher
//!
//! XORs payloads with a BLAKE3 keystream derived from the table key. The
//! transform is deterministic, so equal plaintexts produce equal ciphertexts;
//! the row directory relies on that to filter entries by encrypted key.

/// Context string for deriving the keystream key from the user key
const KEYSTREAM_CONTEXT: &str = "rowvault 2024-01-01 payload keystream v1";

/// Symmetric payload cipher; the identity transform when disabled
#[derive(Clone)]
pub struct Cipher {
    key: [u8; 32],
    enabled: bool,
}

impl Cipher {
    pub fn new(key: &str, enabled: bool) -> Self {
        Self {
            key: blake3::derive_key(KEYSTREAM_CONTEXT, key.as_bytes()),
            enabled,
        }
    }

    /// Whether this cipher transforms data at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        self.apply(plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        self.apply(ciphertext)
    }

    fn apply(&self, input: &[u8]) -> Vec<u8> {
        if !self.enabled {
            return input.to_vec();
        }

        let mut stream = vec![0u8; input.len()];
        blake3::Hasher::new_keyed(&self.key)
            .finalize_xof()
            .fill(&mut stream);

        input.iter().zip(stream).map(|(b, k)| b ^ k).collect()
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
