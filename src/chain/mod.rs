//! The shared Markov chain: a `ChainStore` and its ingestion cursor behind a
//! reader/writer lock.
//!
//! `Chain` is the only way the rest of the process touches the model. It is
//! `Send + Sync` and meant to be shared as `Arc<Chain>` between the webhook
//! handlers and the timeline poller:
//!
//! - `train` and `load` take the write lock
//! - `generate`, `save`, `stats` and cursor reads take the read lock
//!
//! No lock is ever held across file or network I/O. `save` snapshots under the
//! read lock and writes afterwards; `load` decodes first and swaps under the
//! write lock.

pub mod prefix;
pub mod store;
pub mod tokenizer;

pub use prefix::PrefixKey;
pub use store::{ChainStore, TransitionTable};
pub use tokenizer::tokenize;

use crate::storage::compression::CompressionAlgorithm;
use crate::storage::{self, ChainSnapshot, StorageError};
use parking_lot::RwLock;
use rand::Rng;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

struct ChainState {
    store: ChainStore,
    since_id: u64,
}

pub struct Chain {
    state: RwLock<ChainState>,
    prefix_len: usize,
    compression: CompressionAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    pub prefix_len: usize,
    pub prefixes: usize,
    pub associations: usize,
    pub openings: usize,
    pub since_id: u64,
}

impl Chain {
    /// Creates an empty chain that saves uncompressed state files.
    pub fn new(prefix_len: usize) -> Self {
        Self::with_compression(prefix_len, CompressionAlgorithm::None)
    }

    pub fn with_compression(prefix_len: usize, compression: CompressionAlgorithm) -> Self {
        let store = ChainStore::new(prefix_len);
        Self {
            prefix_len: store.prefix_len(),
            state: RwLock::new(ChainState { store, since_id: 0 }),
            compression,
        }
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    /// Learns from `text`. Too-short input is silently ignored.
    pub fn train(&self, text: &str) -> usize {
        let tokens = tokenize(text);
        if tokens.len() <= self.prefix_len {
            return 0;
        }
        let added = self.state.write().store.train_tokens(&tokens);
        debug!(added, "trained chain");
        added
    }

    /// Generates up to `max_words` words using the thread-local RNG.
    pub fn generate(&self, max_words: usize) -> String {
        self.generate_with_rng(max_words, &mut rand::thread_rng())
    }

    pub fn generate_with_rng<R: Rng + ?Sized>(&self, max_words: usize, rng: &mut R) -> String {
        if max_words == 0 {
            return String::new();
        }
        self.state.read().store.generate(max_words, rng)
    }

    /// Walks from an arbitrary prefix instead of the start key.
    pub fn generate_from<R: Rng + ?Sized>(
        &self,
        prefix: PrefixKey,
        max_words: usize,
        rng: &mut R,
    ) -> String {
        if prefix.len() != self.prefix_len {
            debug!(%prefix, expected = self.prefix_len, "prefix length does not match chain");
            return String::new();
        }
        self.state.read().store.walk(prefix, max_words, rng)
    }

    /// Continuations recorded for `prefix`, in training order.
    pub fn next_words(&self, prefix: &PrefixKey) -> Vec<String> {
        self.state
            .read()
            .store
            .next_words(prefix)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    pub fn since_id(&self) -> u64 {
        self.state.read().since_id
    }

    /// Moves the cursor forward to `id`. Lower values are ignored, so the
    /// cursor never regresses. Returns the resulting cursor.
    pub fn advance_since_id(&self, id: u64) -> u64 {
        let mut state = self.state.write();
        if id > state.since_id {
            state.since_id = id;
        }
        state.since_id
    }

    pub fn stats(&self) -> ChainStats {
        let state = self.state.read();
        ChainStats {
            prefix_len: self.prefix_len,
            prefixes: state.store.prefix_count(),
            associations: state.store.association_count(),
            openings: state.store.opening_count(),
            since_id: state.since_id,
        }
    }

    /// Copies the current model and cursor under the read lock.
    pub fn snapshot(&self) -> ChainSnapshot {
        let state = self.state.read();
        ChainSnapshot::capture(&state.store, state.since_id)
    }

    /// Writes the chain and cursor to `path`, replacing any previous file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let path = path.as_ref();
        let bytes = storage::encode(&self.snapshot(), self.compression)?;
        storage::write_atomic(path, &bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "saved chain state");
        Ok(())
    }

    /// Replaces the chain and cursor with the contents of `path`.
    ///
    /// On error the in-memory chain is left as it was.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ChainStats, StorageError> {
        let path = path.as_ref();
        let bytes = storage::read_file(path)?;
        let snapshot = storage::decode(&bytes, path)?;

        let found = snapshot.prefix_len as usize;
        if found != self.prefix_len {
            return Err(StorageError::IncompatiblePrefix {
                expected: self.prefix_len,
                found,
            });
        }

        let since_id = snapshot.since_id;
        let store = snapshot.into_store();
        {
            let mut state = self.state.write();
            state.store = store;
            state.since_id = since_id;
        }

        let stats = self.stats();
        info!(
            path = %path.display(),
            prefixes = stats.prefixes,
            since_id = stats.since_id,
            "loaded chain state"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_train_and_generate() {
        let chain = Chain::new(2);
        assert_eq!(chain.train("the cat sat on the mat"), 4);

        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(chain.generate_with_rng(3, &mut rng), "the cat sat");
        assert_eq!(chain.generate(0), "");
    }

    #[test]
    fn test_short_text_leaves_chain_unchanged() {
        let chain = Chain::new(3);
        chain.train("one two three four five");
        let before = chain.snapshot();

        for text in ["", "one", "one two", "a b c"] {
            assert_eq!(chain.train(text), 0);
        }
        assert_eq!(chain.snapshot(), before);
    }

    #[test]
    fn test_cursor_never_regresses() {
        let chain = Chain::new(2);
        assert_eq!(chain.since_id(), 0);
        assert_eq!(chain.advance_since_id(100), 100);
        assert_eq!(chain.advance_since_id(50), 100);
        assert_eq!(chain.since_id(), 100);
    }

    #[test]
    fn test_save_load_round_trip() -> Result<(), StorageError> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state");

        let chain = Chain::with_compression(2, CompressionAlgorithm::Lz4);
        chain.train("the cat sat on the mat");
        chain.train("the cat ate the rat and the dog sat on the cat");
        chain.advance_since_id(1234);
        chain.save(&path)?;

        let restored = Chain::new(2);
        let stats = restored.load(&path)?;
        assert_eq!(stats, chain.stats());
        assert_eq!(restored.since_id(), 1234);

        for seed in 0..20 {
            let a = chain.generate_with_rng(30, &mut StdRng::seed_from_u64(seed));
            let b = restored.generate_with_rng(30, &mut StdRng::seed_from_u64(seed));
            assert_eq!(a, b);
        }
        Ok(())
    }

    #[test]
    fn test_load_rejects_other_prefix_length() -> Result<(), StorageError> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state");

        let chain = Chain::new(2);
        chain.train("the cat sat on the mat");
        chain.save(&path)?;

        let other = Chain::new(3);
        other.train("a b c d e");
        let before = other.snapshot();
        assert!(matches!(
            other.load(&path),
            Err(StorageError::IncompatiblePrefix { expected: 3, found: 2 })
        ));
        assert_eq!(other.snapshot(), before);
        Ok(())
    }

    #[test]
    fn test_concurrent_training_loses_nothing() {
        let chain = Arc::new(Chain::new(1));
        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));

        let handles: Vec<_> = (0..workers)
            .map(|w| {
                let chain = Arc::clone(&chain);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..50 {
                        chain.train(&format!("w{w}-{i}-a w{w}-{i}-b w{w}-{i}-c"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = chain.stats();
        assert_eq!(stats.associations, workers * 50 * 2);
        assert_eq!(stats.prefixes, workers * 50 * 2);
        for w in 0..workers {
            let key = PrefixKey::from_words([format!("w{w}-49-b")]);
            assert_eq!(chain.next_words(&key), vec![format!("w{w}-49-c")]);
        }
    }

    #[test]
    fn test_generate_while_training() {
        let chain = Chain::new(2);
        chain.train("seed words to start from");

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for i in 0..200 {
                        chain.train(&format!("message {i} goes here today"));
                    }
                });
                scope.spawn(|| {
                    for _ in 0..200 {
                        let text = chain.generate(20);
                        assert!(text.split_whitespace().count() <= 20);
                    }
                });
            }
        });

        assert!(chain.stats().associations > 0);
    }
}
