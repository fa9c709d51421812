use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-length run of trailing words identifying a chain state.
///
/// Blank words only appear in keys derived from the start key; real tokens
/// are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrefixKey(Vec<String>);

impl PrefixKey {
    /// The start key: `len` blank words.
    pub fn start(len: usize) -> Self {
        Self(vec![String::new(); len])
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(words.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn words(&self) -> &[String] {
        &self.0
    }

    /// True for keys that still carry blank padding from the start key.
    pub fn is_opening(&self) -> bool {
        self.0.iter().any(String::is_empty)
    }

    /// Drops the oldest word and appends `word`.
    pub fn shift(&mut self, word: &str) {
        if self.0.is_empty() {
            return;
        }
        self.0.remove(0);
        self.0.push(word.to_owned());
    }
}

/// Space-joined words, for log fields. State files go through serde.
impl fmt::Display for PrefixKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_key_is_blank() {
        let key = PrefixKey::start(3);
        assert_eq!(key.len(), 3);
        assert!(key.words().iter().all(String::is_empty));
        assert!(key.is_opening());
    }

    #[test]
    fn test_shift_drops_oldest() {
        let mut key = PrefixKey::from_words(["the", "cat"]);
        key.shift("sat");
        assert_eq!(key, PrefixKey::from_words(["cat", "sat"]));
        assert!(!key.is_opening());
    }

    #[test]
    fn test_order_matters() {
        assert_ne!(
            PrefixKey::from_words(["a", "b"]),
            PrefixKey::from_words(["b", "a"])
        );
    }

    #[test]
    fn test_display_joins_words() {
        assert_eq!(PrefixKey::from_words(["on", "the"]).to_string(), "on the");
        assert_eq!(PrefixKey::from_words(["", "hello"]).to_string(), " hello");
    }
}
