//! Username bucket hashing.
//!
//! A username maps to a bucket by summing the Unicode scalar values of its
//! characters and reducing modulo the range's bucket count. The function is
//! deliberately simple and deliberately frozen: every row already written
//! was placed by exactly this computation, so any "improvement" to its
//! distribution quality would silently re-route history. Distribution
//! skew (anagrams collide, for instance) is an accepted property.

use crate::types::{BucketIndex, Modulus};

/// Map `username` to a bucket in `0..modulus`.
///
/// Pure and total: any string, including the empty string, hashes to a
/// valid bucket. Callers that require non-empty usernames enforce that
/// before hashing.
pub fn bucket(username: &str, modulus: Modulus) -> BucketIndex {
    let sum = username
        .chars()
        .fold(0u64, |acc, c| acc.wrapping_add(c as u64));
    BucketIndex::new((sum % u64::from(modulus.value())) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modulus(value: u32) -> Modulus {
        Modulus::new(value).unwrap()
    }

    #[test]
    fn test_bucket_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(bucket("alice", modulus(7)), bucket("alice", modulus(7)));
        }
    }

    #[test]
    fn test_bucket_known_values() {
        // 'a' + 'b' + 'c' = 97 + 98 + 99 = 294
        assert_eq!(bucket("abc", modulus(2)).value(), 0);
        assert_eq!(bucket("abc", modulus(5)).value(), 4);
        assert_eq!(bucket("abc", modulus(7)).value(), 0);
    }

    #[test]
    fn test_bucket_within_modulus() {
        let names = ["", "a", "alice", "bob-2024", "Ω", "user_9999"];
        for m in 1..=16 {
            for name in names {
                assert!(bucket(name, modulus(m)).value() < m);
            }
        }
    }

    #[test]
    fn test_bucket_unicode_scalar_values() {
        // 'é' is U+00E9 = 233.
        assert_eq!(bucket("é", modulus(1000)).value(), 233);
    }

    #[test]
    fn test_bucket_anagrams_collide() {
        // Character order does not matter; this is an accepted property.
        assert_eq!(bucket("listen", modulus(97)), bucket("silent", modulus(97)));
    }

    #[test]
    fn test_bucket_empty_username() {
        assert_eq!(bucket("", modulus(5)).value(), 0);
    }

    #[test]
    fn test_bucket_modulus_one_collapses() {
        assert_eq!(bucket("anything", modulus(1)).value(), 0);
        assert_eq!(bucket("else", modulus(1)).value(), 0);
    }
}
