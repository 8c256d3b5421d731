//! Mining results returned to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::entity::{Entity, Fact, Predicate};
use crate::example::RuleKind;
use crate::graph::SurroundingGraph;
use crate::rule::HornRule;

/// Unique identifier for a mining run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rule with its coverage score in [-1, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRule {
    pub rule: HornRule,
    pub score: f64,
}

impl ScoredRule {
    pub fn new(rule: HornRule, score: f64) -> Self {
        Self { rule, score }
    }

    /// Deterministic output order: higher score, then shorter body, then
    /// the rule's canonical form.
    pub fn rank_cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.rule.len().cmp(&other.rule.len()))
            .then_with(|| self.rule.cmp(&other.rule))
    }
}

/// A grounding of a rule's head variables with the facts that justify it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instantiation {
    pub subject: Entity,
    pub object: Entity,
    /// One fact per positive body atom, in body order
    pub supporting_facts: Vec<Fact>,
}

/// Result for one rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HornRuleResult {
    pub rule: HornRule,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instantiations: Vec<Instantiation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub surrounding_graph: Option<SurroundingGraph>,
}

impl HornRuleResult {
    pub fn new(rule: HornRule) -> Self {
        Self {
            rule,
            score: None,
            instantiations: Vec::new(),
            surrounding_graph: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// Rules (and optionally their instantiations) for one target predicate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResult {
    pub id: RunId,
    pub target_predicate: Predicate,
    pub kind: RuleKind,
    pub results: Vec<HornRuleResult>,
    /// False when the deadline cut any stage short
    pub complete: bool,
    pub created_at: DateTime<Utc>,
}

impl RuleResult {
    pub fn new(target_predicate: impl Into<Predicate>, kind: RuleKind) -> Self {
        Self {
            id: RunId::new(),
            target_predicate: target_predicate.into(),
            kind,
            results: Vec::new(),
            complete: true,
            created_at: Utc::now(),
        }
    }

    pub fn add_result(&mut self, result: HornRuleResult) {
        self.results.push(result);
    }

    pub fn mark_partial(&mut self) {
        self.complete = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Atom, Var};

    fn rule(predicates: &[&str]) -> HornRule {
        let mut body = Vec::new();
        let mut from = Var::Subject;
        for (i, p) in predicates.iter().enumerate() {
            let to = if i + 1 == predicates.len() {
                Var::Object
            } else {
                Var::Fresh(i as u8)
            };
            body.push(Atom::new(from, *p, to));
            from = to;
        }
        HornRule::new("target", body)
    }

    #[test]
    fn test_rank_order() {
        let mut rules = vec![
            ScoredRule::new(rule(&["b", "c"]), 0.5),
            ScoredRule::new(rule(&["z"]), 0.5),
            ScoredRule::new(rule(&["a"]), 0.5),
            ScoredRule::new(rule(&["q"]), 0.9),
        ];
        rules.sort_by(|a, b| a.rank_cmp(b));

        let order: Vec<String> = rules.iter().map(|r| r.rule.body_string()).collect();
        assert_eq!(
            order,
            vec![
                "q(subject,object)",
                "a(subject,object)",
                "z(subject,object)",
                "b(subject,v0) & c(v0,object)",
            ]
        );
    }

    #[test]
    fn test_rule_result_serializes() {
        let mut result = RuleResult::new("capitalOf", RuleKind::Positive);
        result.add_result(HornRuleResult::new(rule(&["hasCapital"])).with_score(0.5));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["target_predicate"], "capitalOf");
        assert_eq!(json["kind"], "positive");
        assert_eq!(json["results"][0]["score"], 0.5);
        assert!(json["results"][0].get("instantiations").is_none());
    }
}
