//! Miner configuration

use std::collections::BTreeSet;
use std::time::Duration;

use hornmine_core::limits::{
    validate_max_rule_length, validate_positive, DEFAULT_MAX_INSTANTIATIONS,
    DEFAULT_MAX_RULE_LENGTH, DEFAULT_TIMEOUT_SECS,
};
use hornmine_core::{Deadline, Error, Predicate, Result};
use serde::{Deserialize, Serialize};

/// Tuning knobs for example generation, rule search and instantiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Maximum number of body atoms in a discovered rule
    #[serde(default = "default_max_rule_length")]
    pub max_rule_length: usize,

    /// Cap on instantiations returned per rule
    #[serde(default = "default_max_instantiations")]
    pub max_instantiations: usize,

    /// Wall-clock budget of each public operation, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Examples sampled per example set
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,

    /// Candidate pairs fetched before sampling
    #[serde(default = "default_example_pool_size")]
    pub example_pool_size: usize,

    /// Seed for example sampling
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Rules retained by the search; the K-th best score drives pruning
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Frontier entities inspected when proposing extensions of a rule
    #[serde(default = "default_frontier_sample")]
    pub frontier_sample: usize,

    /// Incident facts kept per seed entity of a surrounding graph
    #[serde(default = "default_edges_per_entity")]
    pub edges_per_entity: usize,

    /// Fraction of the best achievable score at which a rule counts as good
    /// enough (0.0-1.0]
    #[serde(default = "default_satisfied_score")]
    pub satisfied_score: f64,

    /// Stop searching once this many rules are good enough
    #[serde(default = "default_satisfied_rules")]
    pub satisfied_rules: usize,

    /// Hard cap on expanded search nodes
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,

    /// Predicates never used in rule bodies
    #[serde(default)]
    pub excluded_predicates: BTreeSet<Predicate>,

    /// Concurrent neighbourhood lookups when building surrounding graphs
    #[serde(default = "default_graph_concurrency")]
    pub graph_concurrency: usize,
}

fn default_max_rule_length() -> usize {
    DEFAULT_MAX_RULE_LENGTH
}

fn default_max_instantiations() -> usize {
    DEFAULT_MAX_INSTANTIATIONS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_examples() -> usize {
    200
}

fn default_example_pool_size() -> usize {
    5000
}

fn default_seed() -> u64 {
    42
}

fn default_top_k() -> usize {
    30
}

fn default_frontier_sample() -> usize {
    25
}

fn default_edges_per_entity() -> usize {
    50
}

fn default_satisfied_score() -> f64 {
    1.0
}

fn default_satisfied_rules() -> usize {
    5
}

fn default_max_expansions() -> usize {
    10_000
}

fn default_graph_concurrency() -> usize {
    8
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            max_rule_length: default_max_rule_length(),
            max_instantiations: default_max_instantiations(),
            timeout_secs: default_timeout_secs(),
            max_examples: default_max_examples(),
            example_pool_size: default_example_pool_size(),
            seed: default_seed(),
            top_k: default_top_k(),
            frontier_sample: default_frontier_sample(),
            edges_per_entity: default_edges_per_entity(),
            satisfied_score: default_satisfied_score(),
            satisfied_rules: default_satisfied_rules(),
            max_expansions: default_max_expansions(),
            excluded_predicates: BTreeSet::new(),
            graph_concurrency: default_graph_concurrency(),
        }
    }
}

impl MinerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_rule_length(mut self, len: usize) -> Self {
        self.max_rule_length = len;
        self
    }

    pub fn with_max_instantiations(mut self, n: usize) -> Self {
        self.max_instantiations = n;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_examples(mut self, n: usize) -> Self {
        self.max_examples = n;
        self
    }

    pub fn with_example_pool_size(mut self, n: usize) -> Self {
        self.example_pool_size = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_edges_per_entity(mut self, n: usize) -> Self {
        self.edges_per_entity = n;
        self
    }

    pub fn with_excluded_predicate(mut self, predicate: impl Into<Predicate>) -> Self {
        self.excluded_predicates.insert(predicate.into());
        self
    }

    /// Per-operation budget
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Deadline for an operation starting now
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.timeout())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_max_rule_length(self.max_rule_length)?;
        validate_positive(self.timeout_secs as usize, "timeout_secs")?;
        validate_positive(self.max_examples, "max_examples")?;
        validate_positive(self.example_pool_size, "example_pool_size")?;
        validate_positive(self.top_k, "top_k")?;
        validate_positive(self.frontier_sample, "frontier_sample")?;
        validate_positive(self.edges_per_entity, "edges_per_entity")?;
        validate_positive(self.satisfied_rules, "satisfied_rules")?;
        validate_positive(self.max_expansions, "max_expansions")?;
        validate_positive(self.graph_concurrency, "graph_concurrency")?;

        if !(self.satisfied_score > 0.0 && self.satisfied_score <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "satisfied_score must be in (0, 1] (got {})",
                self.satisfied_score
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MinerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_rule_length, 3);
        assert_eq!(config.max_instantiations, 1000);
        assert_eq!(config.timeout(), Duration::from_secs(600));
        assert_eq!(config.top_k, 30);
        assert_eq!(config.edges_per_entity, 50);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let zero_length = MinerConfig::new().with_max_rule_length(0);
        assert!(matches!(
            zero_length.validate(),
            Err(Error::InvalidConfiguration(_))
        ));

        let too_long = MinerConfig::new().with_max_rule_length(7);
        assert!(too_long.validate().is_err());

        let no_rules = MinerConfig::new().with_top_k(0);
        assert!(matches!(no_rules.validate(), Err(Error::InvalidConfiguration(_))));

        let mut bad_score = MinerConfig::new();
        bad_score.satisfied_score = 1.5;
        assert!(bad_score.validate().is_err());
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: MinerConfig =
            serde_json::from_str(r#"{"max_rule_length": 2, "excluded_predicates": ["sameAs"]}"#)
                .unwrap();
        assert_eq!(config.max_rule_length, 2);
        assert_eq!(config.seed, 42);
        assert!(config.excluded_predicates.contains(&Predicate::from("sameAs")));
    }
}
