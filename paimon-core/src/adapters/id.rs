//! Random identifier generator

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::ports::IdGenerator;

/// Length of generated identifiers unless configured otherwise
pub const DEFAULT_ID_LENGTH: usize = 16;

/// Alphanumeric ids drawn from the thread-local RNG
///
/// 62^16 possible values; collisions are left to the UNIQUE constraint on
/// `user_transactions.transaction_id`.
#[derive(Debug, Clone)]
pub struct RandomIdGenerator {
    length: usize,
}

impl RandomIdGenerator {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_LENGTH)
    }
}

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generates_alphanumeric_of_length() {
        let ids = RandomIdGenerator::new(24);
        let id = ids.generate();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_zero_length_is_clamped() {
        assert_eq!(RandomIdGenerator::new(0).generate().len(), 1);
    }

    #[test]
    fn test_ids_are_distinct() {
        let ids = RandomIdGenerator::default();
        let seen: HashSet<String> = (0..10_000).map(|_| ids.generate()).collect();
        assert_eq!(seen.len(), 10_000);
    }
}
