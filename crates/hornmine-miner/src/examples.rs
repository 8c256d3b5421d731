//! Example generation
//!
//! Positive examples are pairs connected by a target relation; negative
//! examples are pairs connected by some other relation but not by any
//! target relation (closed-world assumption). Both are type-consistent with
//! the target and sampled with a seeded RNG, so a given knowledge base and
//! seed always produce the same sets.

use std::collections::BTreeSet;

use hornmine_core::{
    Bounded, Deadline, Example, ExampleSet, PatternAtom, PatternQuery, Predicate, PredicateTypes,
    Result, Var,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::MinerConfig;
use crate::runner::QueryRunner;

/// Samples positive and negative examples for a target relation
pub struct ExampleGenerator {
    runner: QueryRunner,
    max_examples: usize,
    pool_size: usize,
    seed: u64,
    excluded: BTreeSet<Predicate>,
}

impl ExampleGenerator {
    pub fn new(runner: QueryRunner, config: &MinerConfig) -> Self {
        Self {
            runner,
            max_examples: config.max_examples,
            pool_size: config.example_pool_size,
            seed: config.seed,
            excluded: config.excluded_predicates.clone(),
        }
    }

    /// Pairs linked by any of `targets`
    pub async fn generate_positive_examples(
        &self,
        targets: &BTreeSet<Predicate>,
        types: &PredicateTypes,
        deadline: Deadline,
    ) -> Result<Bounded<ExampleSet>> {
        let queries = targets
            .iter()
            .map(|target| self.typed_query(target, types))
            .collect();
        let pool = self.collect_pool(queries, deadline).await?;
        tracing::debug!(
            "Positive example pool for {:?}: {} pairs",
            targets,
            pool.value.len()
        );
        Ok(pool.map(|pool| self.sample(pool)))
    }

    /// Pairs linked by some other relation but by none of `targets`
    pub async fn generate_negative_examples(
        &self,
        targets: &BTreeSet<Predicate>,
        types: &PredicateTypes,
        deadline: Deadline,
    ) -> Result<Bounded<ExampleSet>> {
        let relations = self.runner.predicates(deadline).await?;
        if !relations.complete {
            tracing::warn!("Deadline reached while listing relations; no negative examples");
            return Ok(Bounded::expired());
        }

        let queries = relations
            .value
            .iter()
            .filter(|p| !targets.contains(*p) && !self.excluded.contains(*p))
            .map(|p| {
                targets.iter().fold(self.typed_query(p, types), |query, target| {
                    query.with_atom(PatternAtom::new(Var::Subject, target.clone(), Var::Object).negated())
                })
            })
            .collect();
        let pool = self.collect_pool(queries, deadline).await?;
        tracing::debug!(
            "Negative example pool for {:?}: {} pairs",
            targets,
            pool.value.len()
        );
        Ok(pool.map(|pool| self.sample(pool)))
    }

    /// `relation(subject, object)` with both endpoints typed
    fn typed_query(&self, relation: &Predicate, types: &PredicateTypes) -> PatternQuery {
        let type_predicate = self.runner.type_predicate();
        PatternQuery::new(vec![
            PatternAtom::new(Var::Subject, relation.clone(), Var::Object),
            PatternAtom::has_type(Var::Subject, type_predicate, &types.subject),
            PatternAtom::has_type(Var::Object, type_predicate, &types.object),
        ])
        .distinct_on(vec![Var::Subject, Var::Object])
    }

    /// Run the queries in order until the pool is full or time runs out.
    ///
    /// Each query may fill an even share of the room left, so later
    /// relations still contribute when earlier ones have many pairs. Room a
    /// query leaves unused passes to the queries after it.
    async fn collect_pool(
        &self,
        queries: Vec<PatternQuery>,
        deadline: Deadline,
    ) -> Result<Bounded<BTreeSet<Example>>> {
        let mut pool = BTreeSet::new();
        let total = queries.len();
        for (i, query) in queries.into_iter().enumerate() {
            let remaining = self.pool_size.saturating_sub(pool.len());
            if remaining == 0 {
                break;
            }
            let share = remaining.div_ceil(total - i);
            let rows = self.runner.select(&query.with_limit(share), deadline).await?;
            for row in &rows.value {
                if let (Some(subject), Some(object)) = (row.get(&Var::Subject), row.get(&Var::Object)) {
                    pool.insert(Example::new(subject.clone(), object.clone()));
                }
            }
            if !rows.complete {
                tracing::warn!(
                    "Deadline reached during example generation; keeping {} pairs",
                    pool.len()
                );
                return Ok(Bounded::partial(pool));
            }
        }
        Ok(Bounded::complete(pool))
    }

    /// Seeded sample without replacement
    fn sample(&self, pool: BTreeSet<Example>) -> ExampleSet {
        let pool: Vec<Example> = pool.into_iter().collect();
        if pool.len() <= self.max_examples {
            return pool.into_iter().collect();
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        pool.choose_multiple(&mut rng, self.max_examples)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{capital_types, capitals_kb, linked_kb, SlowKb};
    use hornmine_core::{Entity, Fact};
    use hornmine_kb::{KnowledgeBase, MemoryKb};
    use std::sync::Arc;
    use std::time::Duration;

    fn generator(kb: impl KnowledgeBase + 'static, config: &MinerConfig) -> ExampleGenerator {
        ExampleGenerator::new(QueryRunner::new(Arc::new(kb)), config)
    }

    fn targets() -> BTreeSet<Predicate> {
        BTreeSet::from([Predicate::from("capitalOf")])
    }

    fn later() -> Deadline {
        Deadline::after(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_positive_examples_follow_the_target() {
        let generator = generator(capitals_kb(), &MinerConfig::default());
        let examples = generator
            .generate_positive_examples(&targets(), &capital_types(), later())
            .await
            .unwrap();

        assert!(examples.complete);
        assert_eq!(examples.value.len(), 20);
        assert!(examples.value.contains(&Example::new("City03", "Country03")));
    }

    #[tokio::test]
    async fn test_negative_examples_avoid_the_target() {
        let generator = generator(capitals_kb(), &MinerConfig::default());
        let negatives = generator
            .generate_negative_examples(&targets(), &capital_types(), later())
            .await
            .unwrap();

        assert!(negatives.complete);
        assert_eq!(negatives.value.len(), 20);
        for example in &negatives.value {
            assert!(example.subject.as_str().starts_with("Town"));
        }
    }

    #[tokio::test]
    async fn test_examples_are_type_consistent() {
        let kb = capitals_kb();
        // Untyped and mistyped endpoints never become examples
        kb.extend([
            Fact::new("Atlantis", "capitalOf", "Country00"),
            Fact::new("City00", "capitalOf", "Town05"),
        ])
        .unwrap();
        let kb = Arc::new(kb);
        let generator = ExampleGenerator::new(QueryRunner::new(kb.clone()), &MinerConfig::default());

        let positives = generator
            .generate_positive_examples(&targets(), &capital_types(), later())
            .await
            .unwrap();
        let negatives = generator
            .generate_negative_examples(&targets(), &capital_types(), later())
            .await
            .unwrap();

        let type_predicate = kb.type_predicate().clone();
        for example in positives.value.iter().chain(negatives.value.iter()) {
            for (entity, expected) in [(&example.subject, "City"), (&example.object, "Country")] {
                let query = PatternQuery::new(vec![PatternAtom::new(
                    Entity::from(entity.as_str()),
                    type_predicate.clone(),
                    Entity::from(expected),
                )]);
                assert_eq!(kb.ask(&query, later()).await.unwrap(), Some(true), "{}", example);
            }
        }
    }

    #[tokio::test]
    async fn test_sampling_is_capped_and_seeded() {
        let config = MinerConfig::new().with_max_examples(10).with_seed(7);
        let targets = BTreeSet::from([Predicate::from("linked")]);
        let types = PredicateTypes::new("Source", "Target");

        let first = generator(linked_kb(200), &config)
            .generate_positive_examples(&targets, &types, later())
            .await
            .unwrap();
        let second = generator(linked_kb(200), &config)
            .generate_positive_examples(&targets, &types, later())
            .await
            .unwrap();
        assert_eq!(first.value.len(), 10);
        assert_eq!(first.value, second.value);

        let reseeded = generator(linked_kb(200), &config.clone().with_seed(8))
            .generate_positive_examples(&targets, &types, later())
            .await
            .unwrap();
        assert_ne!(first.value, reseeded.value);
    }

    #[tokio::test]
    async fn test_negative_pool_draws_from_every_relation() {
        let kb = MemoryKb::new();
        for relation in ["aaNear", "mmSees", "zzTwinned"] {
            kb.extend((0..30).flat_map(|i| {
                let source = format!("{relation}Source{i:02}");
                let target = format!("{relation}Target{i:02}");
                [
                    Fact::new(source.as_str(), relation, target.as_str()),
                    Fact::new(source.as_str(), "rdf:type", "Source"),
                    Fact::new(target.as_str(), "rdf:type", "Target"),
                ]
            }))
            .unwrap();
        }
        kb.extend([Fact::new("aaNearSource00", "linked", "aaNearTarget00")]).unwrap();

        let config = MinerConfig::new().with_example_pool_size(30).with_max_examples(30);
        let negatives = generator(kb, &config)
            .generate_negative_examples(
                &BTreeSet::from([Predicate::from("linked")]),
                &PredicateTypes::new("Source", "Target"),
                later(),
            )
            .await
            .unwrap();

        assert!(negatives.complete);
        assert_eq!(negatives.value.len(), 30);
        for relation in ["aaNear", "mmSees", "zzTwinned"] {
            let drawn = negatives
                .value
                .iter()
                .filter(|e| e.subject.as_str().starts_with(relation))
                .count();
            assert!(drawn >= 9, "{relation} contributed {drawn}");
        }
        assert!(!negatives.value.contains(&Example::new("aaNearSource00", "aaNearTarget00")));
    }

    #[tokio::test]
    async fn test_deadline_returns_partial_examples() {
        let slow = SlowKb::new(capitals_kb(), Duration::from_secs(30));
        let generator = generator(slow, &MinerConfig::default());

        let examples = generator
            .generate_positive_examples(&targets(), &capital_types(), Deadline::after(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(!examples.complete);
        assert!(examples.value.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_relation_yields_no_examples() {
        let generator = generator(MemoryKb::new(), &MinerConfig::default());
        let examples = generator
            .generate_positive_examples(&targets(), &capital_types(), later())
            .await
            .unwrap();
        assert!(examples.complete);
        assert!(examples.value.is_empty());
    }
}
