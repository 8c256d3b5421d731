//! Deadline-enforcing access to the knowledge base
//!
//! Every knowledge base call made by the miner goes through [`QueryRunner`].
//! A call is skipped when the deadline has already passed and abandoned when
//! it runs past it; both cases yield an empty partial result, never an
//! error.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use hornmine_core::{
    Binding, Bounded, Deadline, Direction, Entity, Fact, PatternQuery, Predicate, PredicateTypes,
    Result,
};
use hornmine_kb::{KbResult, KnowledgeBase};

/// Shared, cloneable handle over a knowledge base
#[derive(Clone)]
pub struct QueryRunner {
    kb: Arc<dyn KnowledgeBase>,
}

impl QueryRunner {
    pub fn new(kb: Arc<dyn KnowledgeBase>) -> Self {
        Self { kb }
    }

    pub fn kb(&self) -> &Arc<dyn KnowledgeBase> {
        &self.kb
    }

    pub fn type_predicate(&self) -> &Predicate {
        self.kb.type_predicate()
    }

    pub async fn select(
        &self,
        query: &PatternQuery,
        deadline: Deadline,
    ) -> Result<Bounded<Vec<Binding>>> {
        tracing::trace!("select: {} patterns, limit {}", query.atoms.len(), query.limit);
        bounded(deadline, self.kb.select(query, deadline)).await
    }

    /// Existence check; `None` when the deadline elapsed first
    pub async fn ask(&self, query: &PatternQuery, deadline: Deadline) -> Result<Option<bool>> {
        let answer = bounded(deadline, async {
            self.kb.ask(query, deadline).await.map(Bounded::complete)
        })
        .await?;
        Ok(if answer.complete { answer.value } else { None })
    }

    pub async fn incident_facts(
        &self,
        entity: &Entity,
        direction: Direction,
        limit: usize,
        deadline: Deadline,
    ) -> Result<Bounded<Vec<Fact>>> {
        bounded(
            deadline,
            self.kb.incident_facts(entity, direction, limit, deadline),
        )
        .await
    }

    /// Distinct predicates around an entity, tagged with its side
    pub async fn incident_predicates(
        &self,
        entity: &Entity,
        deadline: Deadline,
    ) -> Result<Bounded<BTreeSet<(Predicate, Direction)>>> {
        bounded(deadline, self.kb.incident_predicates(entity, deadline)).await
    }

    pub async fn predicates(&self, deadline: Deadline) -> Result<Bounded<BTreeSet<Predicate>>> {
        bounded(deadline, async {
            self.kb.predicates().await.map(Bounded::complete)
        })
        .await
    }

    pub async fn predicate_types(
        &self,
        predicate: &Predicate,
        deadline: Deadline,
    ) -> Result<Bounded<Option<PredicateTypes>>> {
        bounded(deadline, async {
            self.kb.predicate_types(predicate).await.map(Bounded::complete)
        })
        .await
    }
}

async fn bounded<T: Default>(
    deadline: Deadline,
    call: impl Future<Output = KbResult<Bounded<T>>>,
) -> Result<Bounded<T>> {
    if deadline.expired() {
        return Ok(Bounded::expired());
    }
    let until = tokio::time::Instant::from_std(deadline.instant());
    match tokio::time::timeout_at(until, call).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            tracing::debug!("Knowledge base call abandoned at deadline");
            Ok(Bounded::expired())
        }
    }
}
