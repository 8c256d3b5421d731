//! Pattern evaluation shared by the bundled backends
//!
//! Backends expose their indexes through [`FactSource`]; [`evaluate`] runs a
//! backtracking join over them. The join always extends the most-bound
//! positive pattern next, checks negated patterns once every positive one is
//! matched, and polls the deadline every [`DEADLINE_POLL_STEPS`] candidate
//! facts so it never runs far past it.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use hornmine_core::{
    Binding, Bounded, Deadline, Direction, Entity, Fact, PatternAtom, PatternQuery, Predicate,
    PredicateTypes, Term, Var,
};

use crate::error::KbResult;

/// Candidate facts examined between two deadline checks
pub const DEADLINE_POLL_STEPS: u64 = 256;

/// Boxed iterator over facts read from a backend
pub type FactIter<'a> = Box<dyn Iterator<Item = KbResult<Fact>> + 'a>;

/// Boxed iterator over predicates read from a backend
pub type PredicateIter<'a> = Box<dyn Iterator<Item = KbResult<Predicate>> + 'a>;

/// Ordered, synchronous access to stored facts
pub trait FactSource {
    /// Facts of `predicate` with the given endpoints; `None` is a wildcard
    fn scan<'a>(
        &'a self,
        subject: Option<&Entity>,
        predicate: &Predicate,
        object: Option<&Entity>,
    ) -> FactIter<'a>;

    /// Facts touching `entity` in the given direction
    fn incident<'a>(&'a self, entity: &Entity, direction: Direction) -> FactIter<'a>;

    /// Each predicate of the facts touching `entity` once per direction,
    /// without visiting every fact
    fn incident_predicates<'a>(&'a self, entity: &Entity, direction: Direction) -> PredicateIter<'a>;

    /// All predicates with at least one fact
    fn predicates(&self) -> KbResult<BTreeSet<Predicate>>;
}

/// Evaluate a pattern query against a fact source
pub fn evaluate<S: FactSource + ?Sized>(
    source: &S,
    query: &PatternQuery,
    deadline: Deadline,
) -> KbResult<Bounded<Vec<Binding>>> {
    if query.limit == 0 {
        return Ok(Bounded::complete(Vec::new()));
    }
    if deadline.expired() {
        return Ok(Bounded::expired());
    }

    let mut pending: Vec<&PatternAtom> = query.atoms.iter().filter(|a| !a.negated).collect();
    let mut evaluator = Evaluator {
        source,
        negated: query.atoms.iter().filter(|a| a.negated).collect(),
        distinct_on: query.distinct_on.as_deref(),
        limit: query.limit,
        deadline,
        rows: Vec::new(),
        seen: HashSet::new(),
        steps: 0,
        expired: false,
    };

    let mut binding = query.bound.clone();
    evaluator.solve(&mut binding, &mut pending)?;

    tracing::trace!(
        "Evaluated {} patterns: {} rows after {} steps (expired: {})",
        query.atoms.len(),
        evaluator.rows.len(),
        evaluator.steps,
        evaluator.expired
    );

    Ok(if evaluator.expired {
        Bounded::partial(evaluator.rows)
    } else {
        Bounded::complete(evaluator.rows)
    })
}

/// Up to `limit` facts around an entity
pub fn collect_incident<S: FactSource + ?Sized>(
    source: &S,
    entity: &Entity,
    direction: Direction,
    limit: usize,
    deadline: Deadline,
) -> KbResult<Bounded<Vec<Fact>>> {
    let mut facts = Vec::new();
    for (step, fact) in source.incident(entity, direction).enumerate() {
        if facts.len() >= limit {
            break;
        }
        if step as u64 % DEADLINE_POLL_STEPS == 0 && deadline.expired() {
            return Ok(Bounded::partial(facts));
        }
        facts.push(fact?);
    }
    Ok(Bounded::complete(facts))
}

/// Distinct predicates around an entity. `Outgoing` pairs have the entity
/// as subject, `Incoming` pairs as object.
pub fn collect_incident_predicates<S: FactSource + ?Sized>(
    source: &S,
    entity: &Entity,
    deadline: Deadline,
) -> KbResult<Bounded<BTreeSet<(Predicate, Direction)>>> {
    let mut found = BTreeSet::new();
    let mut step: u64 = 0;
    for direction in [Direction::Outgoing, Direction::Incoming] {
        for predicate in source.incident_predicates(entity, direction) {
            if step % DEADLINE_POLL_STEPS == 0 && deadline.expired() {
                return Ok(Bounded::partial(found));
            }
            step += 1;
            found.insert((predicate?, direction));
        }
    }
    Ok(Bounded::complete(found))
}

/// Most frequent subject and object types over the first `sample` facts of
/// a predicate. Ties go to the lexicographically smallest type.
pub fn infer_predicate_types<S: FactSource + ?Sized>(
    source: &S,
    predicate: &Predicate,
    type_predicate: &Predicate,
    sample: usize,
) -> KbResult<Option<PredicateTypes>> {
    let mut subject_types: BTreeMap<Entity, usize> = BTreeMap::new();
    let mut object_types: BTreeMap<Entity, usize> = BTreeMap::new();

    for fact in source.scan(None, predicate, None).take(sample) {
        let fact = fact?;
        for t in source.scan(Some(&fact.subject), type_predicate, None) {
            *subject_types.entry(t?.object).or_default() += 1;
        }
        for t in source.scan(Some(&fact.object), type_predicate, None) {
            *object_types.entry(t?.object).or_default() += 1;
        }
    }

    Ok(most_frequent(subject_types)
        .zip(most_frequent(object_types))
        .map(|(s, o)| PredicateTypes::new(s.0, o.0)))
}

fn most_frequent(counts: BTreeMap<Entity, usize>) -> Option<Entity> {
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(entity, _)| entity)
}

struct Evaluator<'s, 'q, S: ?Sized> {
    source: &'s S,
    negated: Vec<&'q PatternAtom>,
    distinct_on: Option<&'q [Var]>,
    limit: usize,
    deadline: Deadline,
    rows: Vec<Binding>,
    seen: HashSet<Vec<Option<Entity>>>,
    steps: u64,
    expired: bool,
}

impl<'s, 'q, S: FactSource + ?Sized> Evaluator<'s, 'q, S> {
    /// Returns true once evaluation must stop (limit reached or expired)
    fn solve(&mut self, binding: &mut Binding, pending: &mut Vec<&'q PatternAtom>) -> KbResult<bool> {
        if pending.is_empty() {
            return self.emit(binding);
        }

        let idx = pending
            .iter()
            .enumerate()
            .max_by_key(|(i, atom)| (bound_terms(atom, binding), std::cmp::Reverse(*i)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let atom = pending.remove(idx);

        let subject = atom.subject.resolve(binding).cloned();
        let object = atom.object.resolve(binding).cloned();
        let source = self.source;

        let mut stop = false;
        for fact in source.scan(subject.as_ref(), &atom.predicate, object.as_ref()) {
            let fact = fact?;
            if self.tick() {
                stop = true;
                break;
            }

            let mut newly_bound = Vec::with_capacity(2);
            let consistent = bind_term(&atom.subject, &fact.subject, binding, &mut newly_bound)
                && bind_term(&atom.object, &fact.object, binding, &mut newly_bound);
            if consistent && self.solve(binding, pending)? {
                stop = true;
            }
            for var in newly_bound {
                binding.remove(&var);
            }
            if stop {
                break;
            }
        }

        pending.insert(idx, atom);
        Ok(stop)
    }

    fn emit(&mut self, binding: &Binding) -> KbResult<bool> {
        for atom in &self.negated {
            let subject = atom.subject.resolve(binding);
            let object = atom.object.resolve(binding);
            if let Some(found) = self.source.scan(subject, &atom.predicate, object).next() {
                found?;
                return Ok(false);
            }
        }

        if let Some(vars) = self.distinct_on {
            let key: Vec<Option<Entity>> = vars.iter().map(|v| binding.get(v).cloned()).collect();
            if !self.seen.insert(key) {
                return Ok(false);
            }
        }

        self.rows.push(binding.clone());
        Ok(self.rows.len() >= self.limit)
    }

    fn tick(&mut self) -> bool {
        self.steps += 1;
        if self.steps % DEADLINE_POLL_STEPS == 0 && self.deadline.expired() {
            self.expired = true;
        }
        self.expired
    }
}

fn bound_terms(atom: &PatternAtom, binding: &Binding) -> usize {
    [&atom.subject, &atom.object]
        .into_iter()
        .filter(|t| t.resolve(binding).is_some())
        .count()
}

fn bind_term(term: &Term, value: &Entity, binding: &mut Binding, newly_bound: &mut Vec<Var>) -> bool {
    match term {
        Term::Const(constant) => constant == value,
        Term::Var(var) => match binding.get(var) {
            Some(existing) => existing == value,
            None => {
                binding.insert(*var, value.clone());
                newly_bound.push(*var);
                true
            }
        },
    }
}
