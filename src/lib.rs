//! Markov chain chat bot.
//!
//! The model lives in [`chain`]: a word-level Markov chain guarded by a
//! reader/writer lock, trained from chat messages and timeline posts and
//! persisted through [`storage`]. [`bot`] decides what to learn and when to
//! answer, [`poller`] feeds a remote timeline into the chain, and [`import`]
//! bulk-trains from a chat export.
//!
//! ```rust
//! use markov_chatter::chain::Chain;
//!
//! let chain = Chain::new(2);
//! chain.train("the cat sat on the mat");
//! assert_eq!(chain.generate(100), "the cat sat on the mat");
//! ```

pub mod bot;
pub mod chain;
pub mod config;
pub mod import;
pub mod poller;
pub mod storage;

pub use chain::{Chain, ChainStats, PrefixKey};
pub use storage::StorageError;
