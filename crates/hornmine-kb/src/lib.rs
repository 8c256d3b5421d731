//! Hornmine KB - Knowledge base access for rule mining
//!
//! This crate provides the [`KnowledgeBase`] trait the mining engine
//! queries, the pattern evaluator shared by the bundled backends, and the
//! cache that persists example sets between runs.

#![allow(clippy::result_large_err)]

pub mod cache;
pub mod error;
pub mod eval;
pub mod loader;
pub mod memory;
pub mod traits;

#[cfg(feature = "redb")]
pub mod redb;

pub use cache::{
    format_examples, parse_examples, ExampleKey, ExampleStore, FileExampleStore, MemoryExampleStore,
};
pub use error::{KbError, KbResult};
pub use eval::{evaluate, FactIter, FactSource};
pub use loader::{load_facts, parse_facts};
pub use memory::MemoryKb;
pub use traits::KnowledgeBase;

#[cfg(feature = "redb")]
pub use redb::RedbKb;
