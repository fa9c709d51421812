//! Whitespace tokenization for chain input.

/// Splits `text` into word tokens on Unicode whitespace.
///
/// Punctuation stays attached to its word and case is preserved, so
/// `"Hello, world!"` yields `["Hello,", "world!"]`. Never yields an empty token.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_any_whitespace() {
        let tokens = tokenize("  the cat\tsat\n\non   the mat ");
        assert_eq!(tokens, vec!["the", "cat", "sat", "on", "the", "mat"]);
    }

    #[test]
    fn test_keeps_punctuation_and_case() {
        assert_eq!(tokenize("Hello, World! :)"), vec!["Hello,", "World!", ":)"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \t\n ").is_empty());
    }
}
