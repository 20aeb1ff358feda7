//! Tests for Key Hashing and the Payload Cipher
//!
//! These tests verify:
//! - decrypt(encrypt(p)) == p when enabled, identity when disabled
//! - The transform is deterministic per key and differs across keys
//! - Hashed keys are fixed-length lowercase hex and collision-free on
//!   distinct inputs in practice

use rowvault::crypto::{hash_key, Cipher, HASHED_KEY_LEN};

// =============================================================================
// Helper Functions
// =============================================================================

fn samples() -> Vec<Vec<u8>> {
    vec![
        Vec::new(),
        b"a".to_vec(),
        b"Alice".to_vec(),
        (0..=255u8).collect(),
        vec![0u8; 10_000],
    ]
}

// =============================================================================
// Cipher Tests
// =============================================================================

#[test]
fn test_round_trip_when_enabled() {
    let cipher = Cipher::new("secret", true);

    for plaintext in samples() {
        let ciphertext = cipher.encrypt(&plaintext);
        assert_eq!(ciphertext.len(), plaintext.len());
        assert_eq!(cipher.decrypt(&ciphertext), plaintext);
    }
}

#[test]
fn test_identity_when_disabled() {
    let cipher = Cipher::new("secret", false);

    assert!(!cipher.is_enabled());
    for plaintext in samples() {
        assert_eq!(cipher.encrypt(&plaintext), plaintext);
        assert_eq!(cipher.decrypt(&plaintext), plaintext);
    }
}

#[test]
fn test_encryption_changes_bytes() {
    let cipher = Cipher::new("secret", true);
    let plaintext = vec![0u8; 64];

    assert_ne!(cipher.encrypt(&plaintext), plaintext);
}

#[test]
fn test_deterministic_per_key() {
    let a = Cipher::new("secret", true);
    let b = Cipher::new("secret", true);

    assert_eq!(a.encrypt(b"row-key"), b.encrypt(b"row-key"));
}

#[test]
fn test_different_keys_differ() {
    let a = Cipher::new("secret", true);
    let b = Cipher::new("other", true);
    let ciphertext = a.encrypt(b"payload bytes");

    assert_ne!(ciphertext, b.encrypt(b"payload bytes"));
    assert_ne!(b.decrypt(&ciphertext), b"payload bytes");
}

#[test]
fn test_debug_does_not_leak_key() {
    let cipher = Cipher::new("super-secret-key", true);

    let rendered = format!("{:?}", cipher);

    assert!(!rendered.contains("super-secret-key"));
    assert!(rendered.contains("enabled: true"));
}

// =============================================================================
// Key Hashing Tests
// =============================================================================

#[test]
fn test_hash_is_fixed_length_hex() {
    for input in ["", "1", "a much longer row key with spaces"] {
        let hashed = hash_key(input);
        assert_eq!(hashed.as_str().len(), HASHED_KEY_LEN);
        assert!(hashed
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}

#[test]
fn test_hash_is_stable_and_distinct() {
    assert_eq!(hash_key("1"), hash_key("1"));
    assert_ne!(hash_key("1"), hash_key("2"));
    assert_ne!(hash_key("people"), hash_key("People"));
}
