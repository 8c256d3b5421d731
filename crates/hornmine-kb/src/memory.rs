//! In-memory knowledge base
//!
//! Useful for testing and for graphs small enough to load on every run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;
use hornmine_core::limits::validate_name;
use hornmine_core::{
    Binding, Bounded, Deadline, Direction, Entity, Fact, PatternQuery, Predicate, PredicateTypes,
    DEFAULT_TYPE_PREDICATE,
};

use crate::error::{KbError, KbResult};
use crate::eval::{self, FactIter, FactSource, PredicateIter};
use crate::traits::{KnowledgeBase, DEFAULT_TYPE_SAMPLE};

type Adjacency = BTreeMap<Entity, BTreeSet<Entity>>;

/// Ordered permutation indexes over a set of facts
#[derive(Debug, Default)]
pub(crate) struct TripleIndex {
    /// predicate -> subject -> objects
    pso: BTreeMap<Predicate, Adjacency>,
    /// predicate -> object -> subjects
    pos: BTreeMap<Predicate, Adjacency>,
    /// subject -> predicate -> objects
    spo: BTreeMap<Entity, BTreeMap<Predicate, BTreeSet<Entity>>>,
    /// object -> predicate -> subjects
    ops: BTreeMap<Entity, BTreeMap<Predicate, BTreeSet<Entity>>>,
    len: usize,
}

impl TripleIndex {
    /// Insert a fact, returning false if it was already present
    pub(crate) fn insert(&mut self, fact: Fact) -> bool {
        let Fact {
            subject,
            predicate,
            object,
        } = fact;

        let added = self
            .pso
            .entry(predicate.clone())
            .or_default()
            .entry(subject.clone())
            .or_default()
            .insert(object.clone());
        if !added {
            return false;
        }

        self.pos
            .entry(predicate.clone())
            .or_default()
            .entry(object.clone())
            .or_default()
            .insert(subject.clone());
        self.spo
            .entry(subject.clone())
            .or_default()
            .entry(predicate.clone())
            .or_default()
            .insert(object.clone());
        self.ops
            .entry(object)
            .or_default()
            .entry(predicate)
            .or_default()
            .insert(subject);
        self.len += 1;
        true
    }
}

fn found(subject: &Entity, predicate: &Predicate, object: &Entity) -> KbResult<Fact> {
    Ok(Fact::new(subject.clone(), predicate.clone(), object.clone()))
}

impl FactSource for TripleIndex {
    fn scan<'a>(
        &'a self,
        subject: Option<&Entity>,
        predicate: &Predicate,
        object: Option<&Entity>,
    ) -> FactIter<'a> {
        let p = predicate.clone();
        match (subject, object) {
            (Some(s), Some(o)) => {
                let exists = self
                    .pso
                    .get(predicate)
                    .and_then(|by_subject| by_subject.get(s))
                    .is_some_and(|objects| objects.contains(o));
                let fact = exists.then(|| found(s, &p, o));
                Box::new(fact.into_iter())
            }
            (Some(s), None) => {
                let s = s.clone();
                let objects = self
                    .pso
                    .get(predicate)
                    .and_then(|by_subject| by_subject.get(&s));
                Box::new(objects.into_iter().flatten().map(move |o| found(&s, &p, o)))
            }
            (None, Some(o)) => {
                let o = o.clone();
                let subjects = self
                    .pos
                    .get(predicate)
                    .and_then(|by_object| by_object.get(&o));
                Box::new(subjects.into_iter().flatten().map(move |s| found(s, &p, &o)))
            }
            (None, None) => {
                let pairs = self.pso.get(predicate).into_iter().flat_map(|by_subject| {
                    by_subject
                        .iter()
                        .flat_map(|(s, objects)| objects.iter().map(move |o| (s, o)))
                });
                Box::new(pairs.map(move |(s, o)| found(s, &p, o)))
            }
        }
    }

    fn incident<'a>(&'a self, entity: &Entity, direction: Direction) -> FactIter<'a> {
        let e = entity.clone();
        let outgoing = matches!(direction, Direction::Outgoing | Direction::Both)
            .then(|| self.spo.get(entity))
            .flatten()
            .into_iter()
            .flat_map(|by_predicate| {
                by_predicate
                    .iter()
                    .flat_map(|(p, objects)| objects.iter().map(move |o| (p, o)))
            })
            .map({
                let e = e.clone();
                move |(p, o)| found(&e, p, o)
            });

        // Self-loops were already reported as outgoing
        let skip_loops = direction == Direction::Both;
        let incoming = matches!(direction, Direction::Incoming | Direction::Both)
            .then(|| self.ops.get(entity))
            .flatten()
            .into_iter()
            .flat_map(|by_predicate| {
                by_predicate
                    .iter()
                    .flat_map(|(p, subjects)| subjects.iter().map(move |s| (p, s)))
            })
            .filter({
                let e = e.clone();
                move |(_, s)| !(skip_loops && **s == e)
            })
            .map(move |(p, s)| found(s, p, &e));

        Box::new(outgoing.chain(incoming))
    }

    fn incident_predicates<'a>(&'a self, entity: &Entity, direction: Direction) -> PredicateIter<'a> {
        let outgoing = matches!(direction, Direction::Outgoing | Direction::Both)
            .then(|| self.spo.get(entity))
            .flatten();
        let incoming = matches!(direction, Direction::Incoming | Direction::Both)
            .then(|| self.ops.get(entity))
            .flatten();
        Box::new(
            outgoing
                .into_iter()
                .chain(incoming)
                .flat_map(|by_predicate| by_predicate.keys().cloned().map(Ok)),
        )
    }

    fn predicates(&self) -> KbResult<BTreeSet<Predicate>> {
        Ok(self.pso.keys().cloned().collect())
    }
}

/// In-memory knowledge base
pub struct MemoryKb {
    index: RwLock<TripleIndex>,
    type_predicate: Predicate,
    type_sample: usize,
}

impl MemoryKb {
    pub fn new() -> Self {
        Self::with_type_predicate(DEFAULT_TYPE_PREDICATE)
    }

    pub fn with_type_predicate(type_predicate: impl Into<Predicate>) -> Self {
        Self {
            index: RwLock::new(TripleIndex::default()),
            type_predicate: type_predicate.into(),
            type_sample: DEFAULT_TYPE_SAMPLE,
        }
    }

    /// Build a knowledge base holding the given facts
    pub fn from_facts(facts: impl IntoIterator<Item = Fact>) -> KbResult<Self> {
        let kb = Self::new();
        kb.extend(facts)?;
        Ok(kb)
    }

    /// Insert a fact, returning false if it was already present
    pub fn insert(&self, fact: Fact) -> KbResult<bool> {
        validate_name(fact.subject.as_str())?;
        validate_name(fact.predicate.as_str())?;
        validate_name(fact.object.as_str())?;

        let mut index = self
            .index
            .write()
            .map_err(|e| KbError::Database(format!("Lock error: {}", e)))?;
        Ok(index.insert(fact))
    }

    /// Insert many facts, returning how many were new
    pub fn extend(&self, facts: impl IntoIterator<Item = Fact>) -> KbResult<usize> {
        let mut added = 0;
        for fact in facts {
            if self.insert(fact)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Number of stored facts
    pub fn len(&self) -> KbResult<usize> {
        let index = self
            .index
            .read()
            .map_err(|e| KbError::Database(format!("Lock error: {}", e)))?;
        Ok(index.len)
    }

    pub fn is_empty(&self) -> KbResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for MemoryKb {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeBase for MemoryKb {
    fn type_predicate(&self) -> &Predicate {
        &self.type_predicate
    }

    async fn select(
        &self,
        query: &PatternQuery,
        deadline: Deadline,
    ) -> KbResult<Bounded<Vec<Binding>>> {
        let index = self
            .index
            .read()
            .map_err(|e| KbError::Database(format!("Lock error: {}", e)))?;
        eval::evaluate(&*index, query, deadline)
    }

    async fn incident_facts(
        &self,
        entity: &Entity,
        direction: Direction,
        limit: usize,
        deadline: Deadline,
    ) -> KbResult<Bounded<Vec<Fact>>> {
        let index = self
            .index
            .read()
            .map_err(|e| KbError::Database(format!("Lock error: {}", e)))?;
        eval::collect_incident(&*index, entity, direction, limit, deadline)
    }

    async fn incident_predicates(
        &self,
        entity: &Entity,
        deadline: Deadline,
    ) -> KbResult<Bounded<BTreeSet<(Predicate, Direction)>>> {
        let index = self
            .index
            .read()
            .map_err(|e| KbError::Database(format!("Lock error: {}", e)))?;
        eval::collect_incident_predicates(&*index, entity, deadline)
    }

    async fn predicates(&self) -> KbResult<BTreeSet<Predicate>> {
        let index = self
            .index
            .read()
            .map_err(|e| KbError::Database(format!("Lock error: {}", e)))?;
        let mut predicates = index.predicates()?;
        predicates.remove(&self.type_predicate);
        Ok(predicates)
    }

    async fn predicate_types(&self, predicate: &Predicate) -> KbResult<Option<PredicateTypes>> {
        let index = self
            .index
            .read()
            .map_err(|e| KbError::Database(format!("Lock error: {}", e)))?;
        eval::infer_predicate_types(&*index, predicate, &self.type_predicate, self.type_sample)
    }
}
