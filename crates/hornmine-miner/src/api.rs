//! The `Miner` facade
//!
//! Ties the components together: type resolution, cached or freshly sampled
//! examples, the rule search, instantiation and surrounding graphs. Each
//! public operation runs under its own deadline derived from
//! [`MinerConfig::timeout_secs`].

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use hornmine_core::limits::validate_max_rule_length;
use hornmine_core::{
    Bounded, Deadline, Entity, Error, ExampleRole, ExampleSet, HornRule, HornRuleResult,
    Predicate, PredicateTypes, Result, RuleKind, RuleResult, SurroundingGraph,
};
use hornmine_kb::{ExampleKey, ExampleStore, KnowledgeBase};

use crate::config::MinerConfig;
use crate::examples::ExampleGenerator;
use crate::instantiate::RuleInstantiator;
use crate::runner::QueryRunner;
use crate::search::{RuleSearch, SearchTask};
use crate::surrounding::GraphBuilder;

/// Rule mining over one knowledge base
pub struct Miner {
    runner: QueryRunner,
    store: Arc<dyn ExampleStore>,
    config: MinerConfig,
}

impl Miner {
    /// Create a miner; fails with `InvalidConfiguration` on bad settings
    pub fn new(
        kb: Arc<dyn KnowledgeBase>,
        store: Arc<dyn ExampleStore>,
        config: MinerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            runner: QueryRunner::new(kb),
            store,
            config,
        })
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    pub fn kb(&self) -> &Arc<dyn KnowledgeBase> {
        self.runner.kb()
    }

    /// Cap on instantiations per rule; zero disables instantiation
    pub fn set_max_instantiation_count(&mut self, n: usize) {
        self.config.max_instantiations = n;
    }

    pub fn set_max_rule_length(&mut self, len: usize) -> Result<()> {
        validate_max_rule_length(len)?;
        self.config.max_rule_length = len;
        Ok(())
    }

    /// Discover the best rules of `kind` for `target`.
    ///
    /// Returns a result with `complete == false` when the timeout cut any
    /// stage short; the rules found up to that point are kept.
    pub async fn discover_rules(&self, target: &Predicate, kind: RuleKind) -> Result<RuleResult> {
        let deadline = self.config.deadline();
        let mut result = RuleResult::new(target.clone(), kind);

        let Some(types) = self.resolve_types(target, deadline).await? else {
            result.mark_partial();
            return Ok(result);
        };
        tracing::info!(
            "Discovering {} rules for {} ({} -> {})",
            kind,
            target,
            types.subject,
            types.object
        );

        let examples = self.prepare_examples(target, kind, &types, deadline).await?;
        let (positives, negatives) = &examples.value;
        tracing::info!(
            "{} positive and {} negative examples",
            positives.len(),
            negatives.len()
        );

        let target_relations = BTreeSet::from([target.clone()]);
        let task = SearchTask {
            target,
            target_relations: &target_relations,
            kind,
            positives,
            negatives,
            max_rule_length: self.config.max_rule_length,
        };
        let rules = RuleSearch::new(self.runner.clone(), &self.config)
            .discover(&task, deadline)
            .await?;

        if !examples.complete || !rules.complete {
            result.mark_partial();
        }
        for scored in rules.value {
            result.add_result(HornRuleResult::new(scored.rule).with_score(scored.score));
        }
        Ok(result)
    }

    /// Instantiate `rule` as a rule of `kind` for `target`, with the
    /// surrounding graph of every instantiated entity.
    pub async fn instantiate_rule(
        &self,
        rule: &HornRule,
        target: &Predicate,
        kind: RuleKind,
    ) -> Result<RuleResult> {
        let deadline = self.config.deadline();
        let mut result = RuleResult::new(target.clone(), kind);
        let rule = HornRule::new(target.clone(), rule.body.clone());

        let Some(types) = self.resolve_types(target, deadline).await? else {
            result.mark_partial();
            return Ok(result);
        };

        let instantiations = RuleInstantiator::new(self.runner.clone())
            .instantiate(
                target,
                &rule,
                &types,
                kind,
                self.config.max_instantiations,
                deadline,
            )
            .await?;
        let entities: Vec<Entity> = instantiations
            .value
            .iter()
            .flat_map(|i| [i.subject.clone(), i.object.clone()])
            .collect();
        let graph = self.graph_builder().build_graph(entities, deadline).await?;

        if !instantiations.complete || !graph.complete {
            result.mark_partial();
        }
        let mut rule_result = HornRuleResult::new(rule);
        rule_result.instantiations = instantiations.value;
        rule_result.surrounding_graph = Some(graph.value);
        result.add_result(rule_result);
        Ok(result)
    }

    /// Surrounding graph of arbitrary entities
    pub async fn build_graph(
        &self,
        entities: impl IntoIterator<Item = Entity>,
    ) -> Result<Bounded<SurroundingGraph>> {
        self.graph_builder()
            .build_graph(entities, self.config.deadline())
            .await
    }

    /// All relations of the knowledge base except the type predicate
    pub async fn list_relations(&self) -> Result<BTreeSet<Predicate>> {
        let relations = self.runner.predicates(self.config.deadline()).await?;
        if !relations.complete {
            tracing::warn!("Deadline reached while listing relations");
        }
        Ok(relations.value)
    }

    /// Positive and negative examples for mining `kind` rules on `target`,
    /// from the example store when available.
    ///
    /// Missing sets are generated concurrently and written back once
    /// complete. A malformed stored set is discarded and regenerated.
    pub async fn prepare_examples(
        &self,
        target: &Predicate,
        kind: RuleKind,
        types: &PredicateTypes,
        deadline: Deadline,
    ) -> Result<Bounded<(ExampleSet, ExampleSet)>> {
        let positive_key = ExampleKey::new(target.clone(), kind, ExampleRole::of_positives(kind));
        let negative_key = ExampleKey::new(target.clone(), kind, ExampleRole::of_negatives(kind));
        let targets = BTreeSet::from([target.clone()]);
        let generator = ExampleGenerator::new(self.runner.clone(), &self.config);

        let (positives, negatives) = tokio::join!(
            self.stored_or_generated(
                &positive_key,
                generator.generate_positive_examples(&targets, types, deadline)
            ),
            self.stored_or_generated(
                &negative_key,
                generator.generate_negative_examples(&targets, types, deadline)
            ),
        );
        let (positives, negatives) = (positives?, negatives?);

        let complete = positives.complete && negatives.complete;
        let sets = (positives.value, negatives.value);
        Ok(if complete {
            Bounded::complete(sets)
        } else {
            Bounded::partial(sets)
        })
    }

    fn graph_builder(&self) -> GraphBuilder {
        GraphBuilder::new(
            self.runner.clone(),
            self.config.edges_per_entity,
            self.config.graph_concurrency,
        )
    }

    /// `None` when the deadline elapsed before the types were known
    async fn resolve_types(
        &self,
        target: &Predicate,
        deadline: Deadline,
    ) -> Result<Option<PredicateTypes>> {
        let types = self.runner.predicate_types(target, deadline).await?;
        if !types.complete {
            tracing::warn!("Deadline reached while resolving types of {}", target);
            return Ok(None);
        }
        match types.value {
            Some(types) => Ok(Some(types)),
            None => Err(Error::UnknownPredicate(target.to_string())),
        }
    }

    /// The stored set under `key`, or a freshly generated one.
    ///
    /// A generated set is written back only when generation completed. A set
    /// cut short by the deadline serves this run but is never persisted, so
    /// later runs regenerate it instead of reusing a truncated sample.
    async fn stored_or_generated(
        &self,
        key: &ExampleKey,
        generate: impl Future<Output = Result<Bounded<ExampleSet>>>,
    ) -> Result<Bounded<ExampleSet>> {
        if let Some(examples) = self.load_stored(key).await? {
            return Ok(Bounded::complete(examples));
        }

        let examples = generate.await?;
        if examples.complete {
            self.store.store(key, &examples.value).await?;
            tracing::debug!("Stored {} examples as {}", examples.value.len(), key);
        } else {
            tracing::debug!("Not storing partial example set {}", key);
        }
        Ok(examples)
    }

    async fn load_stored(&self, key: &ExampleKey) -> Result<Option<ExampleSet>> {
        match self.store.load(key).await {
            Ok(Some(examples)) => {
                tracing::debug!("Loaded {} stored examples from {}", examples.len(), key);
                Ok(Some(examples))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                let err = Error::from(err);
                if !err.is_cache_format() {
                    return Err(err);
                }
                tracing::warn!("Discarding stored examples {}: {}", key, err);
                self.store.discard(key).await?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{capital_types, capitals_kb, FailingKb, SlowKb};
    use hornmine_core::{Atom, Example, Var};
    use hornmine_kb::{FileExampleStore, MemoryExampleStore};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn miner(kb: impl KnowledgeBase + 'static, store: Arc<dyn ExampleStore>) -> Miner {
        Miner::new(Arc::new(kb), store, MinerConfig::default()).unwrap()
    }

    fn capital_of() -> Predicate {
        Predicate::from("capitalOf")
    }

    #[tokio::test]
    async fn test_discover_rules_end_to_end() {
        let store = Arc::new(MemoryExampleStore::new());
        let miner = miner(capitals_kb(), store.clone());

        let result = miner
            .discover_rules(&capital_of(), RuleKind::Positive)
            .await
            .unwrap();
        assert!(result.complete);
        assert_eq!(result.target_predicate, capital_of());
        let best = &result.results[0];
        assert_eq!(best.score, Some(0.5));
        assert_eq!(
            best.rule.body,
            vec![Atom::new(Var::Object, "hasCapital", Var::Subject)]
        );

        // Both example sets were persisted and are reused
        assert_eq!(store.len(), 2);
        let again = miner
            .discover_rules(&capital_of(), RuleKind::Positive)
            .await
            .unwrap();
        let rules = |r: &RuleResult| r.results.iter().map(|h| h.rule.clone()).collect::<Vec<_>>();
        assert_eq!(rules(&result), rules(&again));
    }

    #[tokio::test]
    async fn test_negative_rules_swap_roles() {
        let store = Arc::new(MemoryExampleStore::new());
        let miner = miner(capitals_kb(), store.clone());
        let types = capital_types();
        let deadline = miner.config().deadline();

        let examples = miner
            .prepare_examples(&capital_of(), RuleKind::Negative, &types, deadline)
            .await
            .unwrap();
        let generation = store
            .load(&ExampleKey::new("capitalOf", RuleKind::Negative, ExampleRole::Generation))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(generation, examples.value.1);

        let result = miner
            .discover_rules(&capital_of(), RuleKind::Negative)
            .await
            .unwrap();
        assert!(result.complete);
        for rule in &result.results {
            assert!(rule.rule.is_connected_path());
        }
    }

    #[tokio::test]
    async fn test_stored_examples_are_used() {
        let store = Arc::new(MemoryExampleStore::new());
        let key = ExampleKey::new("capitalOf", RuleKind::Positive, ExampleRole::Generation);
        let stored: ExampleSet = [
            Example::new("City01", "Country01"),
            Example::new("City02", "Country02"),
        ]
        .into_iter()
        .collect();
        store.store(&key, &stored).await.unwrap();

        let miner = miner(capitals_kb(), store);
        let examples = miner
            .prepare_examples(
                &capital_of(),
                RuleKind::Positive,
                &capital_types(),
                miner.config().deadline(),
            )
            .await
            .unwrap();
        assert_eq!(examples.value.0, stored);
        assert_eq!(examples.value.1.len(), 20);
    }

    #[tokio::test]
    async fn test_malformed_store_is_regenerated() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileExampleStore::new(dir.path()));
        let key = ExampleKey::new("capitalOf", RuleKind::Positive, ExampleRole::Generation);
        std::fs::write(store.path_for(&key), "City01\tCountry01\nbroken line\n").unwrap();

        let miner = miner(capitals_kb(), store.clone());
        let result = miner
            .discover_rules(&capital_of(), RuleKind::Positive)
            .await
            .unwrap();
        assert!(result.complete);

        let rewritten = store.load(&key).await.unwrap().unwrap();
        assert_eq!(rewritten.len(), 20);
    }

    #[tokio::test]
    async fn test_unknown_predicate_fails() {
        let miner = miner(capitals_kb(), Arc::new(MemoryExampleStore::new()));
        let err = miner
            .discover_rules(&Predicate::from("marriedTo"), RuleKind::Positive)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownPredicate(_)));
    }

    #[tokio::test]
    async fn test_instantiate_rule_with_graph() {
        let mut miner = miner(capitals_kb(), Arc::new(MemoryExampleStore::new()));
        miner.set_max_instantiation_count(3);
        let rule = HornRule::parse_body("capitalOf", "hasCapital(object,subject)").unwrap();

        let result = miner
            .instantiate_rule(&rule, &capital_of(), RuleKind::Positive)
            .await
            .unwrap();
        assert!(result.complete);
        let rule_result = &result.results[0];
        assert_eq!(rule_result.rule.head, capital_of());
        assert_eq!(rule_result.instantiations.len(), 3);

        let graph = rule_result.surrounding_graph.as_ref().unwrap();
        for inst in &rule_result.instantiations {
            assert!(graph.nodes.contains(&inst.subject));
            assert!(graph.nodes.contains(&inst.object));
        }
    }

    #[tokio::test]
    async fn test_zero_instantiations_means_empty_graph() {
        let mut miner = miner(capitals_kb(), Arc::new(MemoryExampleStore::new()));
        miner.set_max_instantiation_count(0);
        let rule = HornRule::parse_body("capitalOf", "hasCapital(object,subject)").unwrap();

        let result = miner
            .instantiate_rule(&rule, &capital_of(), RuleKind::Positive)
            .await
            .unwrap();
        let rule_result = &result.results[0];
        assert!(rule_result.instantiations.is_empty());
        assert_eq!(rule_result.surrounding_graph, Some(SurroundingGraph::new()));
    }

    #[tokio::test]
    async fn test_setters() {
        let mut miner = miner(capitals_kb(), Arc::new(MemoryExampleStore::new()));
        miner.set_max_rule_length(2).unwrap();
        assert_eq!(miner.config().max_rule_length, 2);

        assert!(matches!(
            miner.set_max_rule_length(0),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            miner.set_max_rule_length(7),
            Err(Error::InvalidConfiguration(_))
        ));
        assert_eq!(miner.config().max_rule_length, 2);

        miner.set_max_instantiation_count(12);
        assert_eq!(miner.config().max_instantiations, 12);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = MinerConfig::new().with_max_rule_length(9);
        let err = Miner::new(
            Arc::new(capitals_kb()),
            Arc::new(MemoryExampleStore::new()),
            config,
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_list_relations_and_build_graph() {
        let miner = miner(capitals_kb(), Arc::new(MemoryExampleStore::new()));
        let relations = miner.list_relations().await.unwrap();
        let names: Vec<&str> = relations.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["borders", "capitalOf", "hasCapital", "locatedIn"]);

        let graph = miner
            .build_graph([Entity::from("Country05")])
            .await
            .unwrap();
        assert!(graph.complete);
        assert!(graph.value.nodes.contains(&Entity::from("City05")));
        assert!(graph.value.nodes.contains(&Entity::from("Country06")));
    }

    #[tokio::test]
    async fn test_slow_kb_gives_partial_result_within_timeout() {
        let slow = SlowKb::new(capitals_kb(), Duration::from_secs(30));
        let config = MinerConfig::new().with_timeout_secs(1);
        let miner = Miner::new(Arc::new(slow), Arc::new(MemoryExampleStore::new()), config).unwrap();

        let started = Instant::now();
        let result = miner
            .discover_rules(&capital_of(), RuleKind::Positive)
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!result.complete);
        assert!(result.results.is_empty());
    }

    #[tokio::test]
    async fn test_partial_examples_are_not_stored() {
        let store = Arc::new(MemoryExampleStore::new());
        let slow = SlowKb::new(capitals_kb(), Duration::from_secs(30));
        let miner = miner(slow, store.clone());

        let examples = miner
            .prepare_examples(
                &capital_of(),
                RuleKind::Positive,
                &capital_types(),
                Deadline::after(Duration::from_millis(50)),
            )
            .await
            .unwrap();
        assert!(!examples.complete);

        for role in [ExampleRole::Generation, ExampleRole::Validation] {
            let key = ExampleKey::new("capitalOf", RuleKind::Positive, role);
            assert!(store.load(&key).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_query_failures_propagate() {
        let store = Arc::new(MemoryExampleStore::new());
        let miner = miner(FailingKb::new(), store.clone());
        let err = miner
            .discover_rules(&capital_of(), RuleKind::Positive)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QueryExecution(_)));
        let positives = ExampleKey::new("capitalOf", RuleKind::Positive, ExampleRole::Generation);
        assert!(store.load(&positives).await.unwrap().is_none());
    }
}
