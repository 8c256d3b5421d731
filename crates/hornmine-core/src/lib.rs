//! Hornmine Core - Data model for Horn rule mining
//!
//! This crate provides the core data types shared by the knowledge base
//! backends, the mining engine and the CLI.

pub mod deadline;
pub mod entity;
pub mod error;
pub mod example;
pub mod graph;
pub mod limits;
pub mod pattern;
pub mod result;
pub mod rule;

pub use deadline::{Bounded, Deadline};
pub use entity::{Direction, Entity, EntityType, Fact, Predicate, PredicateTypes, DEFAULT_TYPE_PREDICATE};
pub use error::{Error, Result};
pub use example::{Example, ExampleRole, ExampleSet, RuleKind};
pub use graph::SurroundingGraph;
pub use pattern::{Binding, PatternAtom, PatternQuery, Term};
pub use result::{HornRuleResult, Instantiation, RuleResult, RunId, ScoredRule};
pub use rule::{Atom, HornRule, Var};
