//! Hornmine Miner - Horn rule discovery engine
//!
//! Generates positive and negative examples for a target relation, searches
//! for the Horn rules that best separate them, instantiates rules into
//! concrete entity pairs and builds the surrounding graph of those pairs.
//! [`Miner`] is the entry point.

pub mod api;
pub mod config;
pub mod examples;
pub mod instantiate;
pub mod runner;
pub mod search;
pub mod surrounding;

#[cfg(test)]
mod fixtures;

pub use api::Miner;
pub use config::MinerConfig;
pub use examples::ExampleGenerator;
pub use instantiate::RuleInstantiator;
pub use runner::QueryRunner;
pub use search::{score, score_upper_bound, RuleSearch, SearchTask};
pub use surrounding::GraphBuilder;
