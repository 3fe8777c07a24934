//! Stable hashing for cache keys

use sha2::{Digest, Sha256};

/// Hex SHA-256 of a snippet's text.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        let a = content_hash("x = 5");
        assert_eq!(a.len(), 64);
        assert_eq!(a, content_hash("x = 5"));
        assert_ne!(a, content_hash("x = 6"));
    }
}
