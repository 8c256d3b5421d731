//! CLI configuration
//!
//! Stored as TOML:
//!
//! ```toml
//! data_dir = "/var/lib/hornmine"
//! type_predicate = "rdf:type"
//!
//! [miner]
//! max_rule_length = 3
//! timeout_secs = 600
//! excluded_predicates = ["owl:sameAs"]
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use hornmine_core::Predicate;
use hornmine_miner::MinerConfig;
use serde::{Deserialize, Serialize};

/// Get default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hornmine")
}

/// Get default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hornmine")
        .join("config.toml")
}

/// Configuration for the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Predicate recording entity types (default `rdf:type`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_predicate: Option<String>,

    #[serde(default)]
    pub miner: MinerConfig,
}

const KEYS: &[&str] = &[
    "data_dir",
    "type_predicate",
    "miner.max_rule_length",
    "miner.max_instantiations",
    "miner.timeout_secs",
    "miner.max_examples",
    "miner.example_pool_size",
    "miner.seed",
    "miner.top_k",
    "miner.frontier_sample",
    "miner.edges_per_entity",
    "miner.satisfied_score",
    "miner.satisfied_rules",
    "miner.max_expansions",
    "miner.excluded_predicates",
    "miner.graph_concurrency",
];

impl Config {
    /// Load from `path`; a missing file gives the defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.miner.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn keys() -> &'static [&'static str] {
        KEYS
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let m = &self.miner;
        let value = match key {
            "data_dir" => return self.data_dir.as_ref().map(|p| p.display().to_string()),
            "type_predicate" => return self.type_predicate.clone(),
            "miner.max_rule_length" => m.max_rule_length.to_string(),
            "miner.max_instantiations" => m.max_instantiations.to_string(),
            "miner.timeout_secs" => m.timeout_secs.to_string(),
            "miner.max_examples" => m.max_examples.to_string(),
            "miner.example_pool_size" => m.example_pool_size.to_string(),
            "miner.seed" => m.seed.to_string(),
            "miner.top_k" => m.top_k.to_string(),
            "miner.frontier_sample" => m.frontier_sample.to_string(),
            "miner.edges_per_entity" => m.edges_per_entity.to_string(),
            "miner.satisfied_score" => m.satisfied_score.to_string(),
            "miner.satisfied_rules" => m.satisfied_rules.to_string(),
            "miner.max_expansions" => m.max_expansions.to_string(),
            "miner.excluded_predicates" => m
                .excluded_predicates
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(","),
            "miner.graph_concurrency" => m.graph_concurrency.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Set a key from its text form; the result must be a valid config
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let m = &mut self.miner;
        match key {
            "data_dir" => self.data_dir = Some(PathBuf::from(value)),
            "type_predicate" => self.type_predicate = Some(Predicate::parse(value)?.0),
            "miner.max_rule_length" => m.max_rule_length = parse(key, value)?,
            "miner.max_instantiations" => m.max_instantiations = parse(key, value)?,
            "miner.timeout_secs" => m.timeout_secs = parse(key, value)?,
            "miner.max_examples" => m.max_examples = parse(key, value)?,
            "miner.example_pool_size" => m.example_pool_size = parse(key, value)?,
            "miner.seed" => m.seed = parse(key, value)?,
            "miner.top_k" => m.top_k = parse(key, value)?,
            "miner.frontier_sample" => m.frontier_sample = parse(key, value)?,
            "miner.edges_per_entity" => m.edges_per_entity = parse(key, value)?,
            "miner.satisfied_score" => m.satisfied_score = parse(key, value)?,
            "miner.satisfied_rules" => m.satisfied_rules = parse(key, value)?,
            "miner.max_expansions" => m.max_expansions = parse(key, value)?,
            "miner.excluded_predicates" => {
                m.excluded_predicates = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(Predicate::parse)
                    .collect::<Result<_, _>>()?;
            }
            "miner.graph_concurrency" => m.graph_concurrency = parse(key, value)?,
            _ => anyhow::bail!(
                "Unknown config key: {}. Available keys: {}",
                key,
                KEYS.join(", ")
            ),
        }
        self.miner.validate()?;
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", key, value, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("miner.max_rule_length", "2").unwrap();
        config.set("miner.excluded_predicates", "sameAs, seeAlso").unwrap();
        config.set("data_dir", "/tmp/kb").unwrap();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.get("miner.max_rule_length").as_deref(), Some("2"));
        assert_eq!(
            loaded.get("miner.excluded_predicates").as_deref(),
            Some("sameAs,seeAlso")
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[miner]\ntimeout_secs = 30\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.miner.timeout_secs, 30);
        assert_eq!(config.miner.max_rule_length, 3);
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("miner.max_rule_length", "many").is_err());
        assert!(config.set("miner.max_rule_length", "0").is_err());
        assert!(config.set("no.such.key", "1").is_err());
        assert_eq!(config.get("no.such.key"), None);
    }

    #[test]
    fn test_every_key_is_readable() {
        let mut config = Config::default();
        config.set("type_predicate", "a").unwrap();
        config.set("data_dir", ".").unwrap();
        for key in Config::keys() {
            assert!(config.get(key).is_some(), "{}", key);
        }
    }
}
