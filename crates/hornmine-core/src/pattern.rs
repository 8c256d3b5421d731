//! Graph-pattern queries sent to a knowledge base

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityType, Fact, Predicate};
use crate::rule::{Atom, Var};

/// A variable or a constant in a pattern position
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Var(Var),
    Const(Entity),
}

impl Term {
    /// Resolve against a binding: constants and bound variables yield an entity
    pub fn resolve<'a>(&'a self, binding: &'a Binding) -> Option<&'a Entity> {
        match self {
            Self::Const(e) => Some(e),
            Self::Var(v) => binding.get(v),
        }
    }
}

impl From<Var> for Term {
    fn from(v: Var) -> Self {
        Self::Var(v)
    }
}

impl From<Entity> for Term {
    fn from(e: Entity) -> Self {
        Self::Const(e)
    }
}

/// A triple pattern, possibly negated (NOT EXISTS)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternAtom {
    pub subject: Term,
    pub predicate: Predicate,
    pub object: Term,
    #[serde(default)]
    pub negated: bool,
}

impl PatternAtom {
    pub fn new(subject: impl Into<Term>, predicate: impl Into<Predicate>, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            negated: false,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    /// `var` has type `entity_type` under the given type predicate
    pub fn has_type(var: Var, type_predicate: &Predicate, entity_type: &EntityType) -> Self {
        Self::new(var, type_predicate.clone(), entity_type.as_entity())
    }

    /// The concrete fact this pattern denotes under a complete binding
    pub fn ground(&self, binding: &Binding) -> Option<Fact> {
        Some(Fact {
            subject: self.subject.resolve(binding)?.clone(),
            predicate: self.predicate.clone(),
            object: self.object.resolve(binding)?.clone(),
        })
    }
}

impl From<&Atom> for PatternAtom {
    fn from(atom: &Atom) -> Self {
        atom.to_pattern()
    }
}

/// Variable assignment produced by a query
pub type Binding = BTreeMap<Var, Entity>;

/// Query builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternQuery {
    /// Conjunction of patterns; negated ones act as NOT EXISTS filters
    pub atoms: Vec<PatternAtom>,

    /// Variables pre-bound to constants
    pub bound: Binding,

    /// Deduplicate rows on these variables, keeping the first binding
    pub distinct_on: Option<Vec<Var>>,

    /// Maximum rows (or distinct keys when `distinct_on` is set)
    pub limit: usize,
}

fn default_limit() -> usize {
    1000
}

impl PatternQuery {
    pub fn new(atoms: Vec<PatternAtom>) -> Self {
        Self {
            atoms,
            bound: Binding::new(),
            distinct_on: None,
            limit: default_limit(),
        }
    }

    /// Add a pattern
    pub fn with_atom(mut self, atom: PatternAtom) -> Self {
        self.atoms.push(atom);
        self
    }

    /// Pre-bind a variable to a constant
    pub fn bind(mut self, var: Var, entity: impl Into<Entity>) -> Self {
        self.bound.insert(var, entity.into());
        self
    }

    /// Deduplicate on a projection
    pub fn distinct_on(mut self, vars: Vec<Var>) -> Self {
        self.distinct_on = Some(vars);
        self
    }

    /// Set the row limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}
