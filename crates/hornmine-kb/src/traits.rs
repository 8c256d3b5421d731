//! Knowledge base trait definitions

use std::collections::BTreeSet;

use async_trait::async_trait;
use hornmine_core::{
    Binding, Bounded, Deadline, Direction, Entity, Fact, PatternQuery, Predicate, PredicateTypes,
};

use crate::error::KbResult;

/// Facts sampled per predicate when inferring its types
pub const DEFAULT_TYPE_SAMPLE: usize = 1000;

/// Read access to a knowledge graph.
///
/// Implementations must answer every query by its deadline, returning a
/// partial [`Bounded`] rather than blocking past it. An `Err` always means
/// the query failed; an empty result means nothing matched.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Predicate that records entity types
    fn type_predicate(&self) -> &Predicate;

    /// Pattern match with variable bindings
    async fn select(
        &self,
        query: &PatternQuery,
        deadline: Deadline,
    ) -> KbResult<Bounded<Vec<Binding>>>;

    /// Does any binding exist? `None` when the deadline elapsed first.
    async fn ask(&self, query: &PatternQuery, deadline: Deadline) -> KbResult<Option<bool>> {
        let first = query.clone().with_limit(1);
        let rows = self.select(&first, deadline).await?;
        Ok(match (rows.value.is_empty(), rows.complete) {
            (false, _) => Some(true),
            (true, true) => Some(false),
            (true, false) => None,
        })
    }

    /// Up to `limit` facts touching `entity`
    async fn incident_facts(
        &self,
        entity: &Entity,
        direction: Direction,
        limit: usize,
        deadline: Deadline,
    ) -> KbResult<Bounded<Vec<Fact>>>;

    /// Distinct predicates on the facts touching `entity`. `Outgoing` pairs
    /// have the entity as subject, `Incoming` pairs as object.
    ///
    /// The default walks every incident fact; the bundled backends answer
    /// from their indexes instead.
    async fn incident_predicates(
        &self,
        entity: &Entity,
        deadline: Deadline,
    ) -> KbResult<Bounded<BTreeSet<(Predicate, Direction)>>> {
        let facts = self
            .incident_facts(entity, Direction::Both, usize::MAX, deadline)
            .await?;
        let mut found = BTreeSet::new();
        for fact in facts.value {
            if &fact.subject == entity {
                found.insert((fact.predicate.clone(), Direction::Outgoing));
            }
            if &fact.object == entity {
                found.insert((fact.predicate, Direction::Incoming));
            }
        }
        Ok(Bounded {
            value: found,
            complete: facts.complete,
        })
    }

    /// All relations except the type predicate
    async fn predicates(&self) -> KbResult<BTreeSet<Predicate>>;

    /// Dominant subject and object types of a predicate
    async fn predicate_types(&self, predicate: &Predicate) -> KbResult<Option<PredicateTypes>>;

    /// Health check
    async fn health_check(&self) -> KbResult<bool> {
        Ok(true)
    }
}
