//! Token estimation.
//!
//! Character-based heuristic, ~4 characters per token. Cheap, deterministic
//! and tokenizer-free; close enough for an upper-bound budget check.

/// Unicode scalar count.
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Approximate token count: zero for blank text, otherwise
/// `max(1, chars_of_trimmed / 4)`.
pub fn approx_tokens(text: &str) -> usize {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    (char_count(trimmed) / 4).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_zero() {
        assert_eq!(approx_tokens(""), 0);
        assert_eq!(approx_tokens(" \n\t "), 0);
    }

    #[test]
    fn short_text_is_at_least_one() {
        assert_eq!(approx_tokens("a"), 1);
        assert_eq!(approx_tokens("abc"), 1);
    }

    #[test]
    fn four_chars_per_token_rounding_down() {
        assert_eq!(approx_tokens("test"), 1);
        assert_eq!(approx_tokens("hello"), 1);
        assert_eq!(approx_tokens(&"a".repeat(100)), 25);
        assert_eq!(approx_tokens(&"a".repeat(103)), 25);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(approx_tokens("   abcdefgh   "), 2);
    }

    #[test]
    fn counts_scalars_not_bytes() {
        // 8 scalars, 16 bytes.
        let text = "→→→→→→→→";
        assert_eq!(char_count(text), 8);
        assert_eq!(approx_tokens(text), 2);
    }
}
