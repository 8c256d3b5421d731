//! ReDB knowledge base backend
//!
//! Each fact is stored four times, keyed by the tab-joined permutations
//! SPO, POS, PSO and OPS, so every scan the evaluator issues is a prefix
//! range over one table. A separate table counts facts per predicate.

use std::collections::{BTreeSet, VecDeque};
use std::ops::Bound;
use std::path::Path;

use async_trait::async_trait;
use hornmine_core::limits::validate_name;
use hornmine_core::{
    Binding, Bounded, Deadline, Direction, Entity, Fact, PatternQuery, Predicate, PredicateTypes,
    DEFAULT_TYPE_PREDICATE,
};
use redb::{Database, ReadOnlyTable, ReadableTable, TableDefinition};

use crate::error::{KbError, KbResult};
use crate::eval::{self, FactIter, FactSource, PredicateIter};
use crate::traits::{KnowledgeBase, DEFAULT_TYPE_SAMPLE};

// Table definitions
const SPO: TableDefinition<&str, ()> = TableDefinition::new("spo");
const POS: TableDefinition<&str, ()> = TableDefinition::new("pos");
const PSO: TableDefinition<&str, ()> = TableDefinition::new("pso");
const OPS: TableDefinition<&str, ()> = TableDefinition::new("ops");
const PREDICATES: TableDefinition<&str, u64> = TableDefinition::new("predicates");

/// Keys fetched per range read
const SCAN_PAGE: usize = 512;

/// Order of the fact components inside a key
#[derive(Debug, Clone, Copy)]
enum Layout {
    Spo,
    Pos,
    Pso,
    Ops,
}

impl Layout {
    fn key(self, fact: &Fact) -> String {
        let (s, p, o) = (
            fact.subject.as_str(),
            fact.predicate.as_str(),
            fact.object.as_str(),
        );
        match self {
            Self::Spo => format!("{}\t{}\t{}", s, p, o),
            Self::Pos => format!("{}\t{}\t{}", p, o, s),
            Self::Pso => format!("{}\t{}\t{}", p, s, o),
            Self::Ops => format!("{}\t{}\t{}", o, p, s),
        }
    }

    fn decode(self, key: &str) -> KbResult<Fact> {
        let mut parts = key.split('\t');
        let (Some(a), Some(b), Some(c), None) = (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(KbError::Database(format!("Corrupt index key: {:?}", key)));
        };
        Ok(match self {
            Self::Spo => Fact::new(a, b, c),
            Self::Pos => Fact::new(c, a, b),
            Self::Pso => Fact::new(b, a, c),
            Self::Ops => Fact::new(c, b, a),
        })
    }
}

/// Key prefix for the leading components
fn prefix(parts: &[&str]) -> String {
    let mut prefix = parts.join("\t");
    prefix.push('\t');
    prefix
}

/// Paged range scan over every key starting with a prefix.
///
/// Keys never contain `\t` or `\n` inside a component, so the keys sharing
/// `prefix` are exactly those in `[prefix, prefix with its trailing tab
/// replaced by a newline)`.
struct PrefixScan<'a> {
    table: &'a ReadOnlyTable<&'static str, ()>,
    start: String,
    end: String,
    cursor: Option<String>,
    buffer: VecDeque<String>,
    exhausted: bool,
}

impl<'a> PrefixScan<'a> {
    fn new(table: &'a ReadOnlyTable<&'static str, ()>, start: String) -> Self {
        let mut end = start.clone();
        end.pop();
        end.push('\n');
        Self {
            table,
            start,
            end,
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fill(&mut self) -> KbResult<()> {
        let cursor = self.cursor.clone();
        let lower = match cursor.as_deref() {
            Some(last) => Bound::Excluded(last),
            None => Bound::Included(self.start.as_str()),
        };
        let upper = Bound::Excluded(self.end.as_str());

        let mut fetched = 0;
        for entry in self.table.range::<&str>((lower, upper))?.take(SCAN_PAGE) {
            let (key, _) = entry?;
            self.buffer.push_back(key.value().to_string());
            fetched += 1;
        }

        self.exhausted = fetched < SCAN_PAGE;
        self.cursor = self.buffer.back().cloned();
        Ok(())
    }
}

impl Iterator for PrefixScan<'_> {
    type Item = KbResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

/// Distinct predicates under an entity prefix of the SPO or OPS table.
///
/// After reading a key with predicate `p` the scan seeks straight to
/// `entity\tp\n`, the first key past every fact of `p`, so it costs one
/// range read per predicate however many facts each has.
struct PredicateSkip<'a> {
    table: &'a ReadOnlyTable<&'static str, ()>,
    start: String,
    next: String,
    end: String,
    done: bool,
}

impl<'a> PredicateSkip<'a> {
    fn new(table: &'a ReadOnlyTable<&'static str, ()>, start: String) -> Self {
        let mut end = start.clone();
        end.pop();
        end.push('\n');
        Self {
            table,
            next: start.clone(),
            start,
            end,
            done: false,
        }
    }

    fn first_key(&self) -> KbResult<Option<String>> {
        let lower = Bound::Included(self.next.as_str());
        let upper = Bound::Excluded(self.end.as_str());
        let mut range = self.table.range::<&str>((lower, upper))?;
        match range.next() {
            Some(entry) => {
                let (key, _) = entry?;
                Ok(Some(key.value().to_string()))
            }
            None => Ok(None),
        }
    }
}

impl Iterator for PredicateSkip<'_> {
    type Item = KbResult<Predicate>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let key = match self.first_key() {
            Ok(Some(key)) => key,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        let predicate = key[self.start.len()..]
            .split('\t')
            .next()
            .unwrap_or_default()
            .to_string();
        self.next = format!("{}{}\n", self.start, predicate);
        Some(Ok(Predicate::from(predicate)))
    }
}

/// Read-only view over one transaction
struct Snapshot {
    spo: ReadOnlyTable<&'static str, ()>,
    pos: ReadOnlyTable<&'static str, ()>,
    pso: ReadOnlyTable<&'static str, ()>,
    ops: ReadOnlyTable<&'static str, ()>,
    predicates: ReadOnlyTable<&'static str, u64>,
}

impl Snapshot {
    fn table(&self, layout: Layout) -> &ReadOnlyTable<&'static str, ()> {
        match layout {
            Layout::Spo => &self.spo,
            Layout::Pos => &self.pos,
            Layout::Pso => &self.pso,
            Layout::Ops => &self.ops,
        }
    }

    fn prefix_facts<'a>(&'a self, layout: Layout, start: String) -> impl Iterator<Item = KbResult<Fact>> + 'a {
        PrefixScan::new(self.table(layout), start)
            .map(move |key| key.and_then(|key| layout.decode(&key)))
    }

    fn contains(&self, fact: &Fact) -> KbResult<bool> {
        Ok(self.spo.get(Layout::Spo.key(fact).as_str())?.is_some())
    }
}

impl FactSource for Snapshot {
    fn scan<'a>(
        &'a self,
        subject: Option<&Entity>,
        predicate: &Predicate,
        object: Option<&Entity>,
    ) -> FactIter<'a> {
        let p = predicate.as_str();
        match (subject, object) {
            (Some(s), Some(o)) => {
                let fact = Fact::new(s.clone(), predicate.clone(), o.clone());
                let found = self
                    .contains(&fact)
                    .map(|exists| exists.then_some(fact))
                    .transpose();
                Box::new(found.into_iter())
            }
            (Some(s), None) => Box::new(self.prefix_facts(Layout::Spo, prefix(&[s.as_str(), p]))),
            (None, Some(o)) => Box::new(self.prefix_facts(Layout::Pos, prefix(&[p, o.as_str()]))),
            (None, None) => Box::new(self.prefix_facts(Layout::Pso, prefix(&[p]))),
        }
    }

    fn incident<'a>(&'a self, entity: &Entity, direction: Direction) -> FactIter<'a> {
        let start = prefix(&[entity.as_str()]);
        let outgoing = matches!(direction, Direction::Outgoing | Direction::Both)
            .then(|| self.prefix_facts(Layout::Spo, start.clone()))
            .into_iter()
            .flatten();

        // Self-loops were already reported as outgoing
        let skip_loops = direction == Direction::Both;
        let e = entity.clone();
        let incoming = matches!(direction, Direction::Incoming | Direction::Both)
            .then(|| self.prefix_facts(Layout::Ops, start))
            .into_iter()
            .flatten()
            .filter(move |fact| {
                !(skip_loops && fact.as_ref().is_ok_and(|f| f.subject == e))
            });

        Box::new(outgoing.chain(incoming))
    }

    fn incident_predicates<'a>(&'a self, entity: &Entity, direction: Direction) -> PredicateIter<'a> {
        let start = prefix(&[entity.as_str()]);
        let outgoing = matches!(direction, Direction::Outgoing | Direction::Both)
            .then(|| PredicateSkip::new(&self.spo, start.clone()));
        let incoming = matches!(direction, Direction::Incoming | Direction::Both)
            .then(|| PredicateSkip::new(&self.ops, start));
        Box::new(outgoing.into_iter().flatten().chain(incoming.into_iter().flatten()))
    }

    fn predicates(&self) -> KbResult<BTreeSet<Predicate>> {
        let mut predicates = BTreeSet::new();
        for entry in self.predicates.iter()? {
            let (key, count) = entry?;
            if count.value() > 0 {
                predicates.insert(Predicate::from(key.value()));
            }
        }
        Ok(predicates)
    }
}

/// ReDB knowledge base backend
pub struct RedbKb {
    db: Database,
    type_predicate: Predicate,
    type_sample: usize,
}

impl RedbKb {
    /// Open or create a ReDB knowledge base at the given path
    pub fn open(path: impl AsRef<Path>) -> KbResult<Self> {
        let db = Database::create(path)?;

        // Initialize tables
        {
            let write_txn = db.begin_write()?;
            {
                write_txn.open_table(SPO)?;
                write_txn.open_table(POS)?;
                write_txn.open_table(PSO)?;
                write_txn.open_table(OPS)?;
                write_txn.open_table(PREDICATES)?;
            }
            write_txn.commit()?;
        }

        Ok(Self {
            db,
            type_predicate: Predicate::from(DEFAULT_TYPE_PREDICATE),
            type_sample: DEFAULT_TYPE_SAMPLE,
        })
    }

    /// Use a different predicate for entity types
    pub fn with_type_predicate(mut self, type_predicate: impl Into<Predicate>) -> Self {
        self.type_predicate = type_predicate.into();
        self
    }

    /// Insert facts in a single transaction, returning how many were new
    pub fn insert_facts(&self, facts: &[Fact]) -> KbResult<usize> {
        for fact in facts {
            validate_name(fact.subject.as_str())?;
            validate_name(fact.predicate.as_str())?;
            validate_name(fact.object.as_str())?;
        }

        let write_txn = self.db.begin_write()?;
        let mut added = 0;
        {
            let mut spo = write_txn.open_table(SPO)?;
            let mut pos = write_txn.open_table(POS)?;
            let mut pso = write_txn.open_table(PSO)?;
            let mut ops = write_txn.open_table(OPS)?;
            let mut predicates = write_txn.open_table(PREDICATES)?;

            for fact in facts {
                let key = Layout::Spo.key(fact);
                if spo.get(key.as_str())?.is_some() {
                    continue;
                }
                spo.insert(key.as_str(), ())?;
                pos.insert(Layout::Pos.key(fact).as_str(), ())?;
                pso.insert(Layout::Pso.key(fact).as_str(), ())?;
                ops.insert(Layout::Ops.key(fact).as_str(), ())?;

                let p = fact.predicate.as_str();
                let count = predicates.get(p)?.map(|c| c.value()).unwrap_or(0);
                predicates.insert(p, count + 1)?;
                added += 1;
            }
        }
        write_txn.commit()?;
        tracing::debug!(
            "Batch inserted {} of {} facts in single transaction",
            added,
            facts.len()
        );

        Ok(added)
    }

    /// Number of stored facts
    pub fn len(&self) -> KbResult<u64> {
        let read_txn = self.db.begin_read()?;
        let predicates = read_txn.open_table(PREDICATES)?;
        let mut total = 0;
        for entry in predicates.iter()? {
            let (_, count) = entry?;
            total += count.value();
        }
        Ok(total)
    }

    pub fn is_empty(&self) -> KbResult<bool> {
        Ok(self.len()? == 0)
    }

    fn snapshot(&self) -> KbResult<Snapshot> {
        let read_txn = self.db.begin_read()?;
        Ok(Snapshot {
            spo: read_txn.open_table(SPO)?,
            pos: read_txn.open_table(POS)?,
            pso: read_txn.open_table(PSO)?,
            ops: read_txn.open_table(OPS)?,
            predicates: read_txn.open_table(PREDICATES)?,
        })
    }
}

#[async_trait]
impl KnowledgeBase for RedbKb {
    fn type_predicate(&self) -> &Predicate {
        &self.type_predicate
    }

    async fn select(
        &self,
        query: &PatternQuery,
        deadline: Deadline,
    ) -> KbResult<Bounded<Vec<Binding>>> {
        let snapshot = self.snapshot()?;
        eval::evaluate(&snapshot, query, deadline)
    }

    async fn incident_facts(
        &self,
        entity: &Entity,
        direction: Direction,
        limit: usize,
        deadline: Deadline,
    ) -> KbResult<Bounded<Vec<Fact>>> {
        let snapshot = self.snapshot()?;
        eval::collect_incident(&snapshot, entity, direction, limit, deadline)
    }

    async fn incident_predicates(
        &self,
        entity: &Entity,
        deadline: Deadline,
    ) -> KbResult<Bounded<BTreeSet<(Predicate, Direction)>>> {
        let snapshot = self.snapshot()?;
        eval::collect_incident_predicates(&snapshot, entity, deadline)
    }

    async fn predicates(&self) -> KbResult<BTreeSet<Predicate>> {
        let mut predicates = self.snapshot()?.predicates()?;
        predicates.remove(&self.type_predicate);
        Ok(predicates)
    }

    async fn predicate_types(&self, predicate: &Predicate) -> KbResult<Option<PredicateTypes>> {
        let snapshot = self.snapshot()?;
        eval::infer_predicate_types(&snapshot, predicate, &self.type_predicate, self.type_sample)
    }

    async fn health_check(&self) -> KbResult<bool> {
        self.db.begin_read()?;
        Ok(true)
    }
}
