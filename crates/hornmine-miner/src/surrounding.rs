//! Surrounding graphs
//!
//! The neighbourhood of a set of entities: every seed entity plus the facts
//! incident to it, capped per entity. Lookups run concurrently with a
//! bounded degree of parallelism and are assembled in seed order, so the
//! graph does not depend on which lookup finishes first.

use std::collections::BTreeSet;

use futures::stream::{self, StreamExt};
use hornmine_core::{Bounded, Deadline, Direction, Entity, Result, SurroundingGraph};

use crate::runner::QueryRunner;

pub struct GraphBuilder {
    runner: QueryRunner,
    edges_per_entity: usize,
    concurrency: usize,
}

impl GraphBuilder {
    pub fn new(runner: QueryRunner, edges_per_entity: usize, concurrency: usize) -> Self {
        Self {
            runner,
            edges_per_entity,
            concurrency: concurrency.max(1),
        }
    }

    /// Graph over `entities` and at most `edges_per_entity` incident facts
    /// of each. Seeds are nodes even when nothing touches them.
    pub async fn build_graph(
        &self,
        entities: impl IntoIterator<Item = Entity>,
        deadline: Deadline,
    ) -> Result<Bounded<SurroundingGraph>> {
        let seeds: BTreeSet<Entity> = entities.into_iter().collect();
        let runner = &self.runner;
        let limit = self.edges_per_entity;

        let mut lookups = stream::iter(seeds.iter())
            .map(|entity| async move {
                runner
                    .incident_facts(entity, Direction::Both, limit, deadline)
                    .await
            })
            .buffered(self.concurrency);

        let mut graph = SurroundingGraph::new().with_nodes(seeds.iter().cloned());
        let mut complete = true;
        while let Some(lookup) = lookups.next().await {
            let facts = lookup?;
            complete &= facts.complete;
            if deadline.expired() {
                complete = false;
                break;
            }
            for fact in facts.value {
                graph.add_edge(fact);
            }
        }

        tracing::debug!(
            "Surrounding graph of {} seeds: {} nodes, {} edges",
            seeds.len(),
            graph.node_count(),
            graph.edge_count()
        );
        if complete {
            Ok(Bounded::complete(graph))
        } else {
            tracing::warn!("Deadline reached while building surrounding graph");
            Ok(Bounded::partial(graph))
        }
    }
}
