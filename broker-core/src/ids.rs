//! Random identifier generation.
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;

/// 32 hex characters from a cryptographic RNG. Used for the `state` key
/// handed to the provider; full 128 bits of entropy, not a RFC 4122 UUID.
#[must_use]
pub fn random_state_key() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A 32-character hex `keyId` for a new blob-store entry.
#[must_use]
pub fn random_key_id() -> String {
    Uuid::new_v4().to_simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_keys_are_32_hex_chars() {
        let key = random_state_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn key_ids_are_32_hex_chars() {
        let id = random_key_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn state_keys_are_not_trivially_repeated() {
        let a = random_state_key();
        let b = random_state_key();
        assert_ne!(a, b);
    }
}
