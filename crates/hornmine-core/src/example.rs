//! Training examples for rule discovery

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// Kind of rule being mined
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Satisfying the body implies the target relation holds
    #[default]
    Positive,
    /// Satisfying the body implies the target relation does not hold
    Negative,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            other => Err(crate::Error::Validation(format!("Unknown rule kind: {}", other))),
        }
    }
}

/// Role an example set plays for a rule kind.
///
/// The generation set holds the examples a rule of the kind should cover
/// (positives for positive rules, negatives for negative rules); the
/// validation set holds the ones it should avoid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExampleRole {
    Generation,
    Validation,
}

impl ExampleRole {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Validation => "validation",
        }
    }

    /// Role of the positive example set when mining rules of `kind`
    pub fn of_positives(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Positive => Self::Generation,
            RuleKind::Negative => Self::Validation,
        }
    }

    /// Role of the negative example set when mining rules of `kind`
    pub fn of_negatives(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Positive => Self::Validation,
            RuleKind::Negative => Self::Generation,
        }
    }
}

/// An ordered (subject, object) pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Example {
    pub subject: Entity,
    pub object: Entity,
}

impl Example {
    pub fn new(subject: impl Into<Entity>, object: impl Into<Entity>) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
        }
    }
}

impl std::fmt::Display for Example {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.subject, self.object)
    }
}

/// Deduplicated, ordered set of examples
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExampleSet(BTreeSet<Example>);

impl ExampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an example, returning false if it was already present
    pub fn insert(&mut self, example: Example) -> bool {
        self.0.insert(example)
    }

    pub fn contains(&self, example: &Example) -> bool {
        self.0.contains(example)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Example> + '_ {
        self.0.iter()
    }

    /// Examples in their canonical order
    pub fn to_vec(&self) -> Vec<Example> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<Example> for ExampleSet {
    fn from_iter<I: IntoIterator<Item = Example>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ExampleSet {
    type Item = Example;
    type IntoIter = std::collections::btree_set::IntoIter<Example>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ExampleSet {
    type Item = &'a Example;
    type IntoIter = std::collections::btree_set::Iter<'a, Example>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_set_deduplicates() {
        let mut set = ExampleSet::new();
        assert!(set.insert(Example::new("Paris", "France")));
        assert!(!set.insert(Example::new("Paris", "France")));
        assert!(set.insert(Example::new("Berlin", "Germany")));

        assert_eq!(set.len(), 2);
        // Ordered iteration
        assert_eq!(set.to_vec()[0], Example::new("Berlin", "Germany"));
    }

    #[test]
    fn test_roles_swap_with_kind() {
        assert_eq!(ExampleRole::of_positives(RuleKind::Positive), ExampleRole::Generation);
        assert_eq!(ExampleRole::of_negatives(RuleKind::Positive), ExampleRole::Validation);
        assert_eq!(ExampleRole::of_positives(RuleKind::Negative), ExampleRole::Validation);
        assert_eq!(ExampleRole::of_negatives(RuleKind::Negative), ExampleRole::Generation);
    }

    #[test]
    fn test_rule_kind_parse() {
        assert_eq!("Negative".parse::<RuleKind>().unwrap(), RuleKind::Negative);
        assert!("sideways".parse::<RuleKind>().is_err());
    }
}
