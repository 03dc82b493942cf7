//! Pipeline components
//!
//! Leaf services first (normalizer, ledger, stability gate), then the
//! per-file processor, then the two scheduling drivers that feed it.

pub mod distributor;
pub mod janitor;
pub mod ledger;
pub mod normalizer;
pub mod poller;
pub mod processor;
pub mod scanner;
pub mod stability;
pub mod tag_codec;
pub mod tempo;
pub mod watcher;
