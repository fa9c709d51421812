use super::prefix::PrefixKey;
use super::tokenizer::tokenize;
use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;

/// Prefix → next-word table. Repeated entries encode frequency.
pub type TransitionTable = FxHashMap<PrefixKey, Vec<String>>;

/// The unlocked Markov model: trained transitions plus the lead-in
/// transitions that leave the start key.
///
/// `Chain` wraps this behind a lock; use it directly only from a single owner.
#[derive(Debug, Clone)]
pub struct ChainStore {
    prefix_len: usize,
    transitions: TransitionTable,
    openings: TransitionTable,
}

impl ChainStore {
    /// Creates an empty store. A `prefix_len` of zero is raised to one.
    pub fn new(prefix_len: usize) -> Self {
        Self {
            prefix_len: prefix_len.max(1),
            transitions: FxHashMap::default(),
            openings: FxHashMap::default(),
        }
    }

    /// Rebuilds a store from persisted tables.
    pub fn from_parts(
        prefix_len: usize,
        transitions: TransitionTable,
        openings: TransitionTable,
    ) -> Self {
        Self {
            prefix_len: prefix_len.max(1),
            transitions,
            openings,
        }
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    pub fn openings(&self) -> &TransitionTable {
        &self.openings
    }

    /// Tokenizes `text` and learns from it. Returns the number of
    /// prefix → word associations added to the transition table.
    pub fn train(&mut self, text: &str) -> usize {
        self.train_tokens(&tokenize(text))
    }

    /// Slides a `prefix_len + 1` window over `tokens`.
    ///
    /// Inputs shorter than the window are ignored entirely, openings included.
    pub fn train_tokens(&mut self, tokens: &[String]) -> usize {
        let width = self.prefix_len + 1;
        if tokens.len() < width {
            return 0;
        }

        for window in tokens.windows(width) {
            let (prefix, next) = window.split_at(self.prefix_len);
            self.transitions
                .entry(PrefixKey::from_words(prefix.iter().cloned()))
                .or_default()
                .push(next[0].clone());
        }

        let mut key = PrefixKey::start(self.prefix_len);
        for word in &tokens[..self.prefix_len] {
            self.openings.entry(key.clone()).or_default().push(word.clone());
            key.shift(word);
        }

        tokens.len() - self.prefix_len
    }

    /// Candidate continuations for `key`, looked up in the opening table
    /// while the key still carries start padding.
    pub fn next_words(&self, key: &PrefixKey) -> Option<&[String]> {
        let table = if key.is_opening() {
            &self.openings
        } else {
            &self.transitions
        };
        table.get(key).map(Vec::as_slice)
    }

    /// Random walk from the start key.
    pub fn generate<R: Rng + ?Sized>(&self, max_words: usize, rng: &mut R) -> String {
        self.walk(PrefixKey::start(self.prefix_len), max_words, rng)
    }

    /// Random walk from `start`, emitting at most `max_words` words and
    /// stopping early at a dead end.
    pub fn walk<R: Rng + ?Sized>(&self, start: PrefixKey, max_words: usize, rng: &mut R) -> String {
        if start.len() != self.prefix_len {
            return String::new();
        }

        let mut key = start;
        let mut words: Vec<&str> = Vec::new();
        while words.len() < max_words {
            let Some(word) = self.next_words(&key).and_then(|nexts| nexts.choose(&mut *rng)) else {
                break;
            };
            words.push(word);
            key.shift(word);
        }
        words.join(" ")
    }

    /// Number of distinct prefixes in the transition table.
    pub fn prefix_count(&self) -> usize {
        self.transitions.len()
    }

    /// Total prefix → word associations, counting repeats.
    pub fn association_count(&self) -> usize {
        self.transitions.values().map(Vec::len).sum()
    }

    /// Total lead-in associations in the opening table.
    pub fn opening_count(&self) -> usize {
        self.openings.values().map(Vec::len).sum()
    }
}
