//! Knowledge bases shared by the unit tests

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use hornmine_core::{
    Binding, Bounded, Deadline, Direction, Entity, Fact, PatternQuery, Predicate, PredicateTypes,
    DEFAULT_TYPE_PREDICATE,
};
use hornmine_kb::{KbError, KbResult, KnowledgeBase, MemoryKb};

/// Twenty countries, each with a capital and a second city.
///
/// `capitalOf(CityNN, CountryNN)` is mirrored by `hasCapital`; every city is
/// `locatedIn` its country and every country `borders` the next one.
pub fn capitals_kb() -> MemoryKb {
    let kb = MemoryKb::new();
    let mut facts = Vec::new();
    for i in 0..20 {
        let capital = format!("City{:02}", i);
        let town = format!("Town{:02}", i);
        let country = format!("Country{:02}", i);
        let neighbour = format!("Country{:02}", (i + 1) % 20);

        facts.push(Fact::new(capital.as_str(), "capitalOf", country.as_str()));
        facts.push(Fact::new(country.as_str(), "hasCapital", capital.as_str()));
        facts.push(Fact::new(capital.as_str(), "locatedIn", country.as_str()));
        facts.push(Fact::new(town.as_str(), "locatedIn", country.as_str()));
        facts.push(Fact::new(country.as_str(), "borders", neighbour.as_str()));

        facts.push(Fact::new(capital.as_str(), DEFAULT_TYPE_PREDICATE, "City"));
        facts.push(Fact::new(town.as_str(), DEFAULT_TYPE_PREDICATE, "City"));
        facts.push(Fact::new(country.as_str(), DEFAULT_TYPE_PREDICATE, "Country"));
    }
    kb.extend(facts).unwrap();
    kb
}

pub fn capital_types() -> PredicateTypes {
    PredicateTypes::new("City", "Country")
}

/// `n` disjoint `linked(SourceN, TargetN)` facts between typed entities
pub fn linked_kb(n: usize) -> MemoryKb {
    let kb = MemoryKb::new();
    for i in 0..n {
        let source = format!("Source{:04}", i);
        let target = format!("Target{:04}", i);
        kb.extend([
            Fact::new(source.as_str(), "linked", target.as_str()),
            Fact::new(source.as_str(), DEFAULT_TYPE_PREDICATE, "Source"),
            Fact::new(target.as_str(), DEFAULT_TYPE_PREDICATE, "Target"),
        ])
        .unwrap();
    }
    kb
}

/// Delays every call by a fixed amount before delegating
pub struct SlowKb<K> {
    inner: K,
    delay: Duration,
}

impl<K> SlowKb<K> {
    pub fn new(inner: K, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<K: KnowledgeBase> KnowledgeBase for SlowKb<K> {
    fn type_predicate(&self) -> &Predicate {
        self.inner.type_predicate()
    }

    async fn select(
        &self,
        query: &PatternQuery,
        deadline: Deadline,
    ) -> KbResult<Bounded<Vec<Binding>>> {
        tokio::time::sleep(self.delay).await;
        self.inner.select(query, deadline).await
    }

    async fn incident_facts(
        &self,
        entity: &Entity,
        direction: Direction,
        limit: usize,
        deadline: Deadline,
    ) -> KbResult<Bounded<Vec<Fact>>> {
        tokio::time::sleep(self.delay).await;
        self.inner
            .incident_facts(entity, direction, limit, deadline)
            .await
    }

    async fn predicates(&self) -> KbResult<BTreeSet<Predicate>> {
        tokio::time::sleep(self.delay).await;
        self.inner.predicates().await
    }

    async fn predicate_types(&self, predicate: &Predicate) -> KbResult<Option<PredicateTypes>> {
        tokio::time::sleep(self.delay).await;
        self.inner.predicate_types(predicate).await
    }
}

/// Resolves types but fails every data query
pub struct FailingKb {
    type_predicate: Predicate,
}

impl FailingKb {
    pub fn new() -> Self {
        Self {
            type_predicate: Predicate::from(DEFAULT_TYPE_PREDICATE),
        }
    }
}

#[async_trait]
impl KnowledgeBase for FailingKb {
    fn type_predicate(&self) -> &Predicate {
        &self.type_predicate
    }

    async fn select(
        &self,
        _query: &PatternQuery,
        _deadline: Deadline,
    ) -> KbResult<Bounded<Vec<Binding>>> {
        Err(KbError::Query("connection reset".to_string()))
    }

    async fn incident_facts(
        &self,
        _entity: &Entity,
        _direction: Direction,
        _limit: usize,
        _deadline: Deadline,
    ) -> KbResult<Bounded<Vec<Fact>>> {
        Err(KbError::Query("connection reset".to_string()))
    }

    async fn predicates(&self) -> KbResult<BTreeSet<Predicate>> {
        Ok(BTreeSet::from([Predicate::from("capitalOf")]))
    }

    async fn predicate_types(&self, _predicate: &Predicate) -> KbResult<Option<PredicateTypes>> {
        Ok(Some(capital_types()))
    }
}
