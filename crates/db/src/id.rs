//! Record key generation and validation
//!
//! Keys are short lowercase hex strings taken from a SHA-256 digest of a
//! seed (usually the record's title or email) mixed with a random nonce.

use crate::error::{DbError, DbResult};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of generated keys in hex characters
pub const ID_LENGTH: usize = 8;

/// Maximum length accepted by [`validate_id`]
pub const MAX_ID_LENGTH: usize = 32;

/// Number of candidates produced before giving up
pub const MAX_ATTEMPTS: usize = 16;

/// Produces candidate keys for a single record insertion.
///
/// Each call to [`IdGenerator::next_id`] yields a fresh candidate until
/// `MAX_ATTEMPTS` is reached. Callers check each candidate for collisions.
pub struct IdGenerator {
    seed: String,
    attempts: usize,
}

impl IdGenerator {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            attempts: 0,
        }
    }

    /// Next candidate key, or `None` once the attempt budget is spent.
    pub fn next_id(&mut self) -> Option<String> {
        if self.attempts >= MAX_ATTEMPTS {
            return None;
        }
        self.attempts += 1;

        let nonce: u64 = rand::rng().random();
        let mut hasher = Sha256::new();
        hasher.update(self.seed.as_bytes());
        hasher.update(nonce.to_le_bytes());
        let digest = hasher.finalize();

        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Some(hex[..ID_LENGTH].to_string())
    }
}

/// Validate a record key received from outside the store.
///
/// Keys must be 1 to 32 lowercase ASCII letters or digits.
pub fn validate_id(id: &str) -> DbResult<()> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LENGTH
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());

    if valid {
        Ok(())
    } else {
        Err(DbError::invalid(format!("invalid id '{}'", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_hex_of_fixed_length() {
        let mut generator = IdGenerator::new("Write the release notes");
        let id = generator.next_id().unwrap();
        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(validate_id(&id).is_ok());
    }

    #[test]
    fn test_generator_stops_after_max_attempts() {
        let mut generator = IdGenerator::new("seed");
        let produced = std::iter::from_fn(|| generator.next_id()).count();
        assert_eq!(produced, MAX_ATTEMPTS);
    }

    #[test]
    fn test_candidates_differ() {
        let mut generator = IdGenerator::new("same seed");
        let a = generator.next_id().unwrap();
        let b = generator.next_id().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_id_rejects_query_syntax() {
        assert!(validate_id("").is_err());
        assert!(validate_id("abc;DELETE user").is_err());
        assert!(validate_id("task:abc").is_err());
        assert!(validate_id("ABC123").is_err());
        assert!(validate_id(&"a".repeat(MAX_ID_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_id_accepts_plain_keys() {
        assert!(validate_id("u1").is_ok());
        assert!(validate_id("0f3a9c21").is_ok());
    }
}
