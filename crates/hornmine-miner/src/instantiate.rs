//! Rule instantiation

use hornmine_core::{
    Bounded, Deadline, HornRule, Instantiation, PatternAtom, PatternQuery, Predicate,
    PredicateTypes, Result, RuleKind, Var,
};

use crate::runner::QueryRunner;

/// Finds the `(subject, object)` pairs a rule derives
pub struct RuleInstantiator {
    runner: QueryRunner,
}

impl RuleInstantiator {
    pub fn new(runner: QueryRunner) -> Self {
        Self { runner }
    }

    /// Up to `max_count` distinct type-consistent pairs satisfying the body
    /// of `rule`, each with one supporting fact per positive body atom.
    ///
    /// For negative rules only pairs not already linked by `target` are
    /// returned: those are the facts the rule predicts to be wrong or
    /// missing.
    pub async fn instantiate(
        &self,
        target: &Predicate,
        rule: &HornRule,
        types: &PredicateTypes,
        kind: RuleKind,
        max_count: usize,
        deadline: Deadline,
    ) -> Result<Bounded<Vec<Instantiation>>> {
        rule.validate()?;
        if max_count == 0 {
            return Ok(Bounded::complete(Vec::new()));
        }

        let type_predicate = self.runner.type_predicate();
        let mut query = PatternQuery::new(rule.body_patterns())
            .with_atom(PatternAtom::has_type(Var::Subject, type_predicate, &types.subject))
            .with_atom(PatternAtom::has_type(Var::Object, type_predicate, &types.object));
        if kind == RuleKind::Negative {
            query = query.with_atom(PatternAtom::new(Var::Subject, target.clone(), Var::Object).negated());
        }
        let query = query
            .distinct_on(vec![Var::Subject, Var::Object])
            .with_limit(max_count);

        let rows = self.runner.select(&query, deadline).await?;
        let complete = rows.complete;
        let instantiations: Vec<Instantiation> = rows
            .value
            .iter()
            .filter_map(|row| {
                let supporting_facts = rule
                    .body
                    .iter()
                    .filter(|atom| !atom.negated)
                    .map(|atom| atom.to_pattern().ground(row))
                    .collect::<Option<Vec<_>>>()?;
                Some(Instantiation {
                    subject: row.get(&Var::Subject)?.clone(),
                    object: row.get(&Var::Object)?.clone(),
                    supporting_facts,
                })
            })
            .collect();

        if complete {
            tracing::debug!("{}: {} instantiations", rule, instantiations.len());
            Ok(Bounded::complete(instantiations))
        } else {
            tracing::warn!(
                "Deadline reached instantiating {}; returning {} instantiations",
                rule,
                instantiations.len()
            );
            Ok(Bounded::partial(instantiations))
        }
    }
}
