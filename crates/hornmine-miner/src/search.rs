//! Rule search with dynamic pruning
//!
//! Candidate bodies are paths of atoms grown from `subject`: each step joins
//! the current end of the path to a fresh variable, or closes the path by
//! joining it to `object`. Only predicates actually found around the
//! entities a path reaches are tried, which keeps the branching factor
//! proportional to the local structure of the graph rather than to its
//! vocabulary.
//!
//! A path covers a target example when some binding satisfies its body with
//! `subject` (and, once closed, `object`) bound to the example. Extending a
//! path only adds conjuncts, so a child covers a subset of what its parent
//! covers; children are therefore only checked against their parent's
//! covered examples, and the optimistic bound
//! `covered_target / (|target| + |counter|)` never grows along a branch.
//! Open paths are explored best-first on that bound and dropped as soon as
//! it cannot beat the K-th best rule found so far.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashSet};

use hornmine_core::{
    Atom, Bounded, Deadline, Direction, Entity, Example, ExampleSet, HornRule, PatternAtom,
    PatternQuery, Predicate, Result, RuleKind, ScoredRule, Var,
};

use crate::config::MinerConfig;
use crate::runner::QueryRunner;

/// Inputs of one search
#[derive(Debug, Clone, Copy)]
pub struct SearchTask<'a> {
    /// Head predicate of the discovered rules
    pub target: &'a Predicate,
    /// Relations treated as the target (the head predicate and its aliases)
    pub target_relations: &'a BTreeSet<Predicate>,
    pub kind: RuleKind,
    pub positives: &'a ExampleSet,
    pub negatives: &'a ExampleSet,
    pub max_rule_length: usize,
}

impl<'a> SearchTask<'a> {
    /// (examples to cover, examples to avoid) for the task's rule kind
    pub fn roles(&self) -> (&'a ExampleSet, &'a ExampleSet) {
        match self.kind {
            RuleKind::Positive => (self.positives, self.negatives),
            RuleKind::Negative => (self.negatives, self.positives),
        }
    }
}

/// Coverage score in [-1, 1]
pub fn score(covered_target: usize, covered_counter: usize, targets: usize, counters: usize) -> f64 {
    let total = targets + counters;
    if total == 0 {
        return 0.0;
    }
    (covered_target as f64 - covered_counter as f64) / total as f64
}

/// Best score any extension of a path covering `covered_target` target
/// examples can reach: every covered target kept, no counter example hit.
pub fn score_upper_bound(covered_target: usize, targets: usize, counters: usize) -> f64 {
    score(covered_target, 0, targets, counters)
}

/// Which end of a new atom the path attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Orientation {
    /// `p(frontier, next)`
    Forward,
    /// `p(next, frontier)`
    Backward,
}

impl Orientation {
    fn atom(self, frontier: Var, predicate: &Predicate, next: Var) -> Atom {
        match self {
            Self::Forward => Atom::new(frontier, predicate.clone(), next),
            Self::Backward => Atom::new(next, predicate.clone(), frontier),
        }
    }
}

/// An open path awaiting expansion
#[derive(Debug)]
struct Node {
    body: Vec<Atom>,
    frontier: Var,
    covered: Vec<Example>,
    reached: BTreeSet<Entity>,
    bound: f64,
}

impl Ord for Node {
    /// Highest bound first, then shorter bodies, then smaller bodies
    fn cmp(&self, other: &Self) -> Ordering {
        self.bound
            .total_cmp(&other.bound)
            .then_with(|| other.body.len().cmp(&self.body.len()))
            .then_with(|| other.body.cmp(&self.body))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

/// The K best rules seen so far, in output order
#[derive(Debug)]
struct TopK {
    k: usize,
    rules: Vec<ScoredRule>,
}

impl TopK {
    fn new(k: usize) -> Self {
        Self {
            k,
            rules: Vec::with_capacity(k + 1),
        }
    }

    /// Keep a rule if it ranks among the best K; equivalent rules keep the
    /// higher score
    fn offer(&mut self, candidate: ScoredRule) {
        if let Some(idx) = self.rules.iter().position(|r| r.rule == candidate.rule) {
            if self.rules[idx].score >= candidate.score {
                return;
            }
            self.rules.remove(idx);
        }
        let pos = self
            .rules
            .partition_point(|r| r.rank_cmp(&candidate) == Ordering::Less);
        self.rules.insert(pos, candidate);
        self.rules.truncate(self.k);
    }

    fn kth_score(&self) -> Option<f64> {
        if self.rules.len() < self.k {
            return None;
        }
        self.rules.last().map(|r| r.score)
    }

    /// Whether a branch with this bound cannot improve the retained set
    fn prunes(&self, bound: f64) -> bool {
        self.kth_score().is_some_and(|kth| bound <= kth)
    }

    fn count_at_least(&self, threshold: f64) -> usize {
        self.rules.iter().filter(|r| r.score >= threshold).count()
    }
}

/// Outcome of one expansion
enum Step {
    Continue,
    Satisfied,
    Expired,
}

/// Mutable state of one search
struct SearchState<'a> {
    task: SearchTask<'a>,
    counters: Vec<Example>,
    target_count: usize,
    counter_count: usize,
    excluded: BTreeSet<Predicate>,
    best: TopK,
    open: BinaryHeap<Node>,
    visited: HashSet<Vec<Atom>>,
    good_enough: f64,
}

impl SearchState<'_> {
    /// Records a body, returning false if an equivalent one was seen before
    fn first_visit(&mut self, body: &[Atom]) -> bool {
        let canonical = HornRule::new(self.task.target.clone(), body.to_vec()).canonical();
        self.visited.insert(canonical.body)
    }
}

/// Dynamic-pruning Horn rule search
pub struct RuleSearch {
    runner: QueryRunner,
    top_k: usize,
    frontier_sample: usize,
    satisfied_score: f64,
    satisfied_rules: usize,
    max_expansions: usize,
    excluded: BTreeSet<Predicate>,
}

impl RuleSearch {
    pub fn new(runner: QueryRunner, config: &MinerConfig) -> Self {
        Self {
            runner,
            top_k: config.top_k,
            frontier_sample: config.frontier_sample,
            satisfied_score: config.satisfied_score,
            satisfied_rules: config.satisfied_rules,
            max_expansions: config.max_expansions,
            excluded: config.excluded_predicates.clone(),
        }
    }

    /// Discover the best rules for a task.
    ///
    /// Returns at most `top_k` canonical rules ordered by score, then body
    /// length, then body. When the deadline cuts the search short the rules
    /// found so far are returned as a partial result.
    pub async fn discover(
        &self,
        task: &SearchTask<'_>,
        deadline: Deadline,
    ) -> Result<Bounded<Vec<ScoredRule>>> {
        let (targets, counters) = task.roles();
        if targets.is_empty() || task.max_rule_length == 0 {
            tracing::info!("No {} examples for {}; nothing to search", task.kind, task.target);
            return Ok(Bounded::complete(Vec::new()));
        }

        let mut excluded = self.excluded.clone();
        excluded.insert(self.runner.type_predicate().clone());

        let target_count = targets.len();
        let counter_count = counters.len();
        let perfect = score_upper_bound(target_count, target_count, counter_count);

        let mut state = SearchState {
            task: *task,
            counters: counters.to_vec(),
            target_count,
            counter_count,
            excluded,
            best: TopK::new(self.top_k),
            open: BinaryHeap::new(),
            visited: HashSet::new(),
            good_enough: perfect * self.satisfied_score,
        };

        let root_reached: BTreeSet<Entity> = targets
            .iter()
            .map(|e| e.subject.clone())
            .take(self.frontier_sample)
            .collect();
        state.open.push(Node {
            body: Vec::new(),
            frontier: Var::Subject,
            covered: targets.to_vec(),
            reached: root_reached,
            bound: perfect,
        });

        let mut expansions = 0;
        let mut complete = true;
        while let Some(node) = state.open.pop() {
            if deadline.expired() {
                complete = false;
                break;
            }
            if state.best.prunes(node.bound) {
                continue;
            }
            if expansions >= self.max_expansions {
                tracing::debug!("Stopping after {} expansions", expansions);
                break;
            }
            expansions += 1;

            match self.expand(&mut state, &node, deadline).await? {
                Step::Continue => {}
                Step::Satisfied => {
                    tracing::debug!("Found {} good enough rules", self.satisfied_rules);
                    break;
                }
                Step::Expired => {
                    complete = false;
                    break;
                }
            }
        }

        let rules = state.best.rules;
        if complete {
            tracing::info!(
                "Search for {} {} rules finished: {} rules after {} expansions",
                task.kind,
                task.target,
                rules.len(),
                expansions
            );
            Ok(Bounded::complete(rules))
        } else {
            tracing::warn!(
                "Deadline reached searching {} {} rules; returning {} rules found so far",
                task.kind,
                task.target,
                rules.len()
            );
            Ok(Bounded::partial(rules))
        }
    }

    async fn expand(&self, state: &mut SearchState<'_>, node: &Node, deadline: Deadline) -> Result<Step> {
        let Some(candidates) = self.extensions(node, &state.excluded, deadline).await? else {
            return Ok(Step::Expired);
        };

        let length = node.body.len();
        let next = Var::Fresh(length as u8);
        for (predicate, orientation) in candidates {
            if deadline.expired() {
                return Ok(Step::Expired);
            }

            // The head itself is never a body
            let trivial = length == 0
                && orientation == Orientation::Forward
                && state.task.target_relations.contains(&predicate);
            if !trivial {
                let mut body = node.body.clone();
                body.push(orientation.atom(node.frontier, &predicate, Var::Object));
                if state.first_visit(&body) {
                    let Some(covered) = self.count_closed(&body, &node.covered, deadline).await? else {
                        return Ok(Step::Expired);
                    };
                    if covered > 0 {
                        let Some(hit) = self.count_closed(&body, &state.counters, deadline).await? else {
                            return Ok(Step::Expired);
                        };
                        let rule = HornRule::new(state.task.target.clone(), body).canonical();
                        let value = score(covered, hit, state.target_count, state.counter_count);
                        tracing::trace!("{} scored {:.4}", rule, value);
                        state.best.offer(ScoredRule::new(rule, value));

                        if state.best.count_at_least(state.good_enough) >= self.satisfied_rules {
                            return Ok(Step::Satisfied);
                        }
                    }
                }
            }

            if length + 1 < state.task.max_rule_length {
                let mut body = node.body.clone();
                body.push(orientation.atom(node.frontier, &predicate, next));
                if state.first_visit(&body) {
                    let Some((covered, reached)) =
                        self.cover_open(&body, next, &node.covered, deadline).await?
                    else {
                        return Ok(Step::Expired);
                    };
                    let bound = score_upper_bound(covered.len(), state.target_count, state.counter_count);
                    if !covered.is_empty() && !state.best.prunes(bound) {
                        state.open.push(Node {
                            body,
                            frontier: next,
                            covered,
                            reached,
                            bound,
                        });
                    }
                }
            }
        }
        Ok(Step::Continue)
    }

    /// Predicates around the entities a path reaches, with the side the
    /// path would attach to. `None` when the deadline elapsed.
    async fn extensions(
        &self,
        node: &Node,
        excluded: &BTreeSet<Predicate>,
        deadline: Deadline,
    ) -> Result<Option<BTreeSet<(Predicate, Orientation)>>> {
        let mut candidates = BTreeSet::new();
        for entity in node.reached.iter().take(self.frontier_sample) {
            let around = self.runner.incident_predicates(entity, deadline).await?;
            for (predicate, direction) in around.value {
                if excluded.contains(&predicate) {
                    continue;
                }
                let orientation = match direction {
                    Direction::Incoming => Orientation::Backward,
                    _ => Orientation::Forward,
                };
                candidates.insert((predicate, orientation));
            }
            if !around.complete {
                return Ok(None);
            }
        }
        Ok(Some(candidates))
    }

    /// Examples covered by an open path, plus a sample of the entities its
    /// end variable reaches. `None` when the deadline elapsed.
    async fn cover_open(
        &self,
        body: &[Atom],
        end: Var,
        examples: &[Example],
        deadline: Deadline,
    ) -> Result<Option<(Vec<Example>, BTreeSet<Entity>)>> {
        let patterns: Vec<PatternAtom> = body.iter().map(Atom::to_pattern).collect();
        let mut by_subject: BTreeMap<&Entity, Option<Entity>> = BTreeMap::new();
        let mut covered = Vec::new();
        let mut reached = BTreeSet::new();

        for example in examples {
            let end_entity = match by_subject.get(&example.subject) {
                Some(known) => known.clone(),
                None => {
                    let query = PatternQuery::new(patterns.clone())
                        .bind(Var::Subject, example.subject.clone())
                        .with_limit(1);
                    let rows = self.runner.select(&query, deadline).await?;
                    if rows.value.is_empty() && !rows.complete {
                        return Ok(None);
                    }
                    let found = rows.value.first().and_then(|row| row.get(&end).cloned());
                    by_subject.insert(&example.subject, found.clone());
                    found
                }
            };

            if let Some(entity) = end_entity {
                covered.push(example.clone());
                if reached.len() < self.frontier_sample {
                    reached.insert(entity);
                }
            }
        }
        Ok(Some((covered, reached)))
    }

    /// Number of examples a closed path covers. `None` when the deadline
    /// elapsed.
    async fn count_closed(
        &self,
        body: &[Atom],
        examples: &[Example],
        deadline: Deadline,
    ) -> Result<Option<usize>> {
        let patterns: Vec<PatternAtom> = body.iter().map(Atom::to_pattern).collect();
        let mut covered = 0;
        for example in examples {
            let query = PatternQuery::new(patterns.clone())
                .bind(Var::Subject, example.subject.clone())
                .bind(Var::Object, example.object.clone());
            match self.runner.ask(&query, deadline).await? {
                Some(true) => covered += 1,
                Some(false) => {}
                None => return Ok(None),
            }
        }
        Ok(Some(covered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::examples::ExampleGenerator;
    use crate::fixtures::{capital_types, capitals_kb, FailingKb, SlowKb};
    use hornmine_core::{Error, Fact};
    use hornmine_kb::KnowledgeBase;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn later() -> Deadline {
        Deadline::after(Duration::from_secs(60))
    }

    fn runner(kb: impl KnowledgeBase + 'static) -> QueryRunner {
        QueryRunner::new(Arc::new(kb))
    }

    async fn capital_examples() -> (ExampleSet, ExampleSet) {
        let generator = ExampleGenerator::new(runner(capitals_kb()), &MinerConfig::default());
        let targets = BTreeSet::from([Predicate::from("capitalOf")]);
        let positives = generator
            .generate_positive_examples(&targets, &capital_types(), later())
            .await
            .unwrap();
        let negatives = generator
            .generate_negative_examples(&targets, &capital_types(), later())
            .await
            .unwrap();
        (positives.value, negatives.value)
    }

    fn task<'a>(
        target: &'a Predicate,
        relations: &'a BTreeSet<Predicate>,
        kind: RuleKind,
        examples: &'a (ExampleSet, ExampleSet),
        max_rule_length: usize,
    ) -> SearchTask<'a> {
        SearchTask {
            target,
            target_relations: relations,
            kind,
            positives: &examples.0,
            negatives: &examples.1,
            max_rule_length,
        }
    }

    #[test]
    fn test_score_and_bound() {
        assert_eq!(score(20, 0, 20, 20), 0.5);
        assert_eq!(score(20, 20, 20, 20), 0.0);
        assert_eq!(score(0, 20, 20, 20), -0.5);
        assert_eq!(score(0, 0, 0, 0), 0.0);

        // Fewer covered targets never raise the bound
        for covered in 1..=20 {
            assert!(score_upper_bound(covered - 1, 20, 20) <= score_upper_bound(covered, 20, 20));
            for hit in 0..=20 {
                assert!(score(covered, hit, 20, 20) <= score_upper_bound(covered, 20, 20));
            }
        }
    }

    #[test]
    fn test_top_k_keeps_best_and_deduplicates() {
        let rule = |p: &str| HornRule::new("capitalOf", vec![Atom::new(Var::Subject, p, Var::Object)]);
        let mut best = TopK::new(2);
        best.offer(ScoredRule::new(rule("a"), 0.1));
        best.offer(ScoredRule::new(rule("b"), 0.3));
        assert!(best.prunes(0.0));
        assert!(!best.prunes(0.2));

        best.offer(ScoredRule::new(rule("c"), 0.2));
        best.offer(ScoredRule::new(rule("b"), 0.1));
        let kept: Vec<f64> = best.rules.iter().map(|r| r.score).collect();
        assert_eq!(kept, vec![0.3, 0.2]);
        assert!(best.prunes(0.2));
        assert!(!best.prunes(0.25));
    }

    #[tokio::test]
    async fn test_capital_rules_are_found() {
        let examples = capital_examples().await;
        assert_eq!(examples.0.len(), 20);
        assert_eq!(examples.1.len(), 20);

        let target = Predicate::from("capitalOf");
        let relations = BTreeSet::from([target.clone()]);
        let search = RuleSearch::new(runner(capitals_kb()), &MinerConfig::default());
        let rules = search
            .discover(&task(&target, &relations, RuleKind::Positive, &examples, 3), later())
            .await
            .unwrap();

        assert!(rules.complete);
        let best = &rules.value[0];
        assert_eq!(best.score, 0.5);
        assert_eq!(best.rule.to_string(), "hasCapital(object,subject) => capitalOf(subject,object)");
        assert!(rules.value.iter().any(|r| r.score > 0.0));
    }

    #[tokio::test]
    async fn test_busy_entities_do_not_hide_predicates() {
        let examples = capital_examples().await;
        let kb = capitals_kb();
        for i in 0..20 {
            let city = format!("City{:02}", i);
            kb.extend((0..60).map(|n| {
                Fact::new(city.as_str(), "aaNear", format!("Spot{:02}_{:02}", i, n))
            }))
            .unwrap();
        }

        let target = Predicate::from("capitalOf");
        let relations = BTreeSet::from([target.clone()]);
        let config = MinerConfig::default();
        assert!(config.edges_per_entity < 60);
        let rules = RuleSearch::new(runner(kb), &config)
            .discover(&task(&target, &relations, RuleKind::Positive, &examples, 3), later())
            .await
            .unwrap();

        assert!(rules.complete);
        let best = &rules.value[0];
        assert_eq!(best.score, 0.5);
        assert_eq!(best.rule.to_string(), "hasCapital(object,subject) => capitalOf(subject,object)");
    }

    #[tokio::test]
    async fn test_rules_are_connected_paths_within_length() {
        let examples = capital_examples().await;
        let target = Predicate::from("capitalOf");
        let relations = BTreeSet::from([target.clone()]);
        let search = RuleSearch::new(runner(capitals_kb()), &MinerConfig::default());

        for kind in [RuleKind::Positive, RuleKind::Negative] {
            for max_len in 1..=3 {
                let rules = search
                    .discover(&task(&target, &relations, kind, &examples, max_len), later())
                    .await
                    .unwrap();
                for scored in &rules.value {
                    assert!(scored.rule.is_connected_path(), "{}", scored.rule);
                    assert!(scored.rule.len() <= max_len, "{}", scored.rule);
                    assert_ne!(
                        scored.rule.body,
                        vec![Atom::new(Var::Subject, "capitalOf", Var::Object)]
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_discover_is_idempotent() {
        let examples = capital_examples().await;
        let target = Predicate::from("capitalOf");
        let relations = BTreeSet::from([target.clone()]);
        let search = RuleSearch::new(runner(capitals_kb()), &MinerConfig::default());
        let task = task(&target, &relations, RuleKind::Positive, &examples, 3);

        let first = search.discover(&task, later()).await.unwrap();
        let second = search.discover(&task, later()).await.unwrap();
        assert_eq!(first.value, second.value);
    }

    #[tokio::test]
    async fn test_excluded_predicates_never_appear() {
        let examples = capital_examples().await;
        let target = Predicate::from("capitalOf");
        let relations = BTreeSet::from([target.clone()]);
        let config = MinerConfig::default().with_excluded_predicate("hasCapital");
        let search = RuleSearch::new(runner(capitals_kb()), &config);

        let rules = search
            .discover(&task(&target, &relations, RuleKind::Positive, &examples, 3), later())
            .await
            .unwrap();
        for scored in &rules.value {
            for atom in &scored.rule.body {
                assert_ne!(atom.predicate.as_str(), "hasCapital");
                assert_ne!(atom.predicate.as_str(), "rdf:type");
            }
        }
    }

    #[tokio::test]
    async fn test_bound_never_grows_along_a_branch() {
        let examples = capital_examples().await;
        let search = RuleSearch::new(runner(capitals_kb()), &MinerConfig::default());
        let targets = examples.0.to_vec();

        let chain = [
            Atom::new(Var::Subject, "locatedIn", Var::Fresh(0)),
            Atom::new(Var::Fresh(0), "borders", Var::Fresh(1)),
            Atom::new(Var::Fresh(1), "hasCapital", Var::Fresh(2)),
        ];
        let mut covered = targets.clone();
        let mut bound = score_upper_bound(covered.len(), 20, 20);
        for len in 1..=chain.len() {
            let (child, _) = search
                .cover_open(&chain[..len], Var::Fresh(len as u8 - 1), &covered, later())
                .await
                .unwrap()
                .unwrap();
            let child_bound = score_upper_bound(child.len(), 20, 20);
            assert!(!child.is_empty());
            assert!(child_bound <= bound);

            // Checking only the parent's examples loses nothing
            let (unrestricted, _) = search
                .cover_open(&chain[..len], Var::Fresh(len as u8 - 1), &targets, later())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(child, unrestricted);

            covered = child;
            bound = child_bound;
        }
    }

    #[tokio::test]
    async fn test_slow_kb_returns_partial_result_in_time() {
        let examples = capital_examples().await;
        let target = Predicate::from("capitalOf");
        let relations = BTreeSet::from([target.clone()]);
        let slow = SlowKb::new(capitals_kb(), Duration::from_secs(10));
        let search = RuleSearch::new(runner(slow), &MinerConfig::default());

        let started = Instant::now();
        let rules = search
            .discover(
                &task(&target, &relations, RuleKind::Positive, &examples, 3),
                Deadline::after(Duration::from_millis(100)),
            )
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!rules.complete);
    }

    #[tokio::test]
    async fn test_query_failures_abort_the_search() {
        let examples = capital_examples().await;
        let target = Predicate::from("capitalOf");
        let relations = BTreeSet::from([target.clone()]);
        let search = RuleSearch::new(runner(FailingKb::new()), &MinerConfig::default());

        let err = search
            .discover(&task(&target, &relations, RuleKind::Positive, &examples, 3), later())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QueryExecution(_)));
    }

    #[tokio::test]
    async fn test_no_target_examples_means_no_rules() {
        let examples = (ExampleSet::new(), ExampleSet::new());
        let target = Predicate::from("capitalOf");
        let relations = BTreeSet::from([target.clone()]);
        let search = RuleSearch::new(runner(capitals_kb()), &MinerConfig::default());

        let rules = search
            .discover(&task(&target, &relations, RuleKind::Positive, &examples, 3), later())
            .await
            .unwrap();
        assert!(rules.complete);
        assert!(rules.value.is_empty());
    }
}
