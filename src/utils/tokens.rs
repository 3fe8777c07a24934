//! Token estimation

/// Estimate tokens using a simple heuristic (chars / 4).
///
/// Counts Unicode code points, not bytes, so multi-byte UTF-8 content
/// (CJK text, emoji) is not over-counted.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("日本語日本語日本"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }
}
