//! Horn rules: variables, body atoms, canonical form and text syntax
//!
//! A rule always has the head `target(subject, object)`; its body is a
//! conjunction of atoms over the head variables and fresh intermediate
//! variables. Rules are written as
//!
//! ```text
//! bornIn(subject,v0) & locatedIn(v0,object) => country(subject,object)
//! ```
//!
//! with a leading `!` marking a negated atom. Predicates containing
//! reserved characters can be wrapped in angle brackets.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::entity::Predicate;
use crate::error::{Error, Result};
use crate::limits::{ValidationError, MAX_FRESH_VARS};
use crate::pattern::{PatternAtom, Term};

/// Logical variable of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Var {
    /// Head subject
    Subject,
    /// Head object
    Object,
    /// Intermediate variable
    Fresh(u8),
}

impl Var {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

impl std::fmt::Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subject => f.write_str("subject"),
            Self::Object => f.write_str("object"),
            Self::Fresh(n) => write!(f, "v{}", n),
        }
    }
}

impl std::str::FromStr for Var {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "subject" => Ok(Self::Subject),
            "object" => Ok(Self::Object),
            other => other
                .strip_prefix('v')
                .and_then(|n| n.parse::<u8>().ok())
                .map(Self::Fresh)
                .ok_or_else(|| Error::RuleSyntax(format!("Unknown variable: {}", other))),
        }
    }
}

/// A body literal `predicate(subject, object)`, possibly negated
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Atom {
    pub subject: Var,
    pub predicate: Predicate,
    pub object: Var,
    #[serde(default)]
    pub negated: bool,
}

impl Atom {
    pub fn new(subject: Var, predicate: impl Into<Predicate>, object: Var) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
            negated: false,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    pub fn mentions(&self, var: Var) -> bool {
        self.subject == var || self.object == var
    }

    /// The variable on the other side of `var`, if the atom mentions it
    pub fn other_end(&self, var: Var) -> Option<Var> {
        if self.subject == var {
            Some(self.object)
        } else if self.object == var {
            Some(self.subject)
        } else {
            None
        }
    }

    fn renamed(&self, rename: &BTreeMap<Var, Var>, unknown: Var) -> Atom {
        let map = |v: Var| rename.get(&v).copied().unwrap_or(unknown);
        Atom {
            subject: map(self.subject),
            predicate: self.predicate.clone(),
            object: map(self.object),
            negated: self.negated,
        }
    }

    pub fn to_pattern(&self) -> PatternAtom {
        PatternAtom {
            subject: Term::Var(self.subject),
            predicate: self.predicate.clone(),
            object: Term::Var(self.object),
            negated: self.negated,
        }
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        write_predicate(f, &self.predicate)?;
        write!(f, "({},{})", self.subject, self.object)
    }
}

fn write_predicate(f: &mut std::fmt::Formatter<'_>, predicate: &Predicate) -> std::fmt::Result {
    let name = predicate.as_str();
    if name.contains(['(', ')', '&', ',', ' ', '!', '=']) {
        write!(f, "<{}>", name)
    } else {
        f.write_str(name)
    }
}

/// A Horn rule `body => head(subject, object)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HornRule {
    pub head: Predicate,
    pub body: Vec<Atom>,
}

impl HornRule {
    pub fn new(head: impl Into<Predicate>, body: Vec<Atom>) -> Self {
        Self {
            head: head.into(),
            body,
        }
    }

    /// Number of body atoms
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// All variables mentioned by the body
    pub fn vars(&self) -> BTreeSet<Var> {
        self.body
            .iter()
            .flat_map(|a| [a.subject, a.object])
            .collect()
    }

    /// Next unused fresh variable
    pub fn next_fresh(&self) -> Var {
        let next = self
            .body
            .iter()
            .flat_map(|a| [a.subject, a.object])
            .filter_map(|v| match v {
                Var::Fresh(n) => Some(n + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        Var::Fresh(next)
    }

    /// Whether the body's atoms link `subject` to `object` through shared
    /// variables, with every atom attached to that connected component.
    pub fn is_connected_path(&self) -> bool {
        if self.body.is_empty() {
            return false;
        }
        let mut reached: BTreeSet<Var> = BTreeSet::from([Var::Subject]);
        let mut attached = vec![false; self.body.len()];
        loop {
            let mut grew = false;
            for (i, atom) in self.body.iter().enumerate() {
                if attached[i] {
                    continue;
                }
                if reached.contains(&atom.subject) || reached.contains(&atom.object) {
                    attached[i] = true;
                    reached.insert(atom.subject);
                    reached.insert(atom.object);
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }
        reached.contains(&Var::Object) && attached.iter().all(|a| *a)
    }

    /// Check structural invariants of a rule supplied from outside the search
    pub fn validate(&self) -> Result<()> {
        if self.body.is_empty() {
            return Err(ValidationError::EmptyRuleBody.into());
        }
        if !self.is_connected_path() {
            return Err(ValidationError::DisconnectedRule {
                rule: self.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Canonical form used for deduplication up to variable renaming.
    ///
    /// Atoms are ordered by walking from `subject`, always taking the
    /// smallest atom attached to the current frontier; fresh variables are
    /// renumbered in order of first appearance.
    pub fn canonical(&self) -> HornRule {
        const UNNAMED: Var = Var::Fresh(u8::MAX);

        let mut rename: BTreeMap<Var, Var> =
            BTreeMap::from([(Var::Subject, Var::Subject), (Var::Object, Var::Object)]);
        let mut remaining: Vec<&Atom> = self.body.iter().collect();
        let mut ordered = Vec::with_capacity(self.body.len());
        let mut next_fresh: u8 = 0;
        let mut current = Var::Subject;

        while !remaining.is_empty() {
            // Prefer atoms continuing the walk, then atoms attached to named
            // variables, then the smallest renamed atom.
            let idx = remaining
                .iter()
                .enumerate()
                .min_by_key(|(_, atom)| {
                    let renamed = atom.renamed(&rename, UNNAMED);
                    let touches_current = renamed.mentions(current);
                    let touches_known = rename.contains_key(&atom.subject)
                        || rename.contains_key(&atom.object);
                    (!touches_current, !touches_known, renamed)
                })
                .map(|(i, _)| i)
                .unwrap_or(0);

            let atom = remaining.remove(idx);
            for var in [atom.subject, atom.object] {
                if !rename.contains_key(&var) {
                    rename.insert(var, Var::Fresh(next_fresh));
                    next_fresh = next_fresh.saturating_add(1);
                }
            }
            let renamed = atom.renamed(&rename, UNNAMED);
            current = renamed.other_end(current).unwrap_or(renamed.object);
            ordered.push(renamed);
        }

        HornRule {
            head: self.head.clone(),
            body: ordered,
        }
    }

    /// Parse a rule body such as `p(subject,v0) & q(v0,object)`
    pub fn parse_body(head: impl Into<Predicate>, text: &str) -> Result<Self> {
        let mut body = Vec::new();
        for part in split_top_level(text, '&')? {
            body.push(parse_atom(part.trim())?);
        }
        let rule = HornRule::new(head, body);
        if rule.vars().iter().filter(|v| v.is_fresh()).count() > MAX_FRESH_VARS {
            return Err(Error::RuleSyntax(format!(
                "Too many intermediate variables (max {})",
                MAX_FRESH_VARS
            )));
        }
        Ok(rule)
    }

    /// Body patterns for querying the knowledge base
    pub fn body_patterns(&self) -> Vec<PatternAtom> {
        self.body.iter().map(Atom::to_pattern).collect()
    }

    /// Body text without the head
    pub fn body_string(&self) -> String {
        self.body
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" & ")
    }
}

impl std::fmt::Display for HornRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} => ", self.body_string())?;
        write_predicate(f, &self.head)?;
        f.write_str("(subject,object)")
    }
}

impl std::str::FromStr for HornRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (body, head) = s
            .rsplit_once("=>")
            .ok_or_else(|| Error::RuleSyntax("Missing '=> head(subject,object)'".to_string()))?;
        let head_atom = parse_atom(head.trim())?;
        if head_atom.subject != Var::Subject || head_atom.object != Var::Object || head_atom.negated {
            return Err(Error::RuleSyntax(format!(
                "Head must be target(subject,object), got {}",
                head.trim()
            )));
        }
        Self::parse_body(head_atom.predicate, body)
    }
}

fn split_top_level(text: &str, sep: char) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' if depth > 0 => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Error::RuleSyntax(format!("Unbalanced '<' in: {}", text)));
    }
    parts.push(&text[start..]);
    if parts.iter().any(|p| p.trim().is_empty()) {
        return Err(Error::RuleSyntax(format!("Empty atom in: {}", text)));
    }
    Ok(parts)
}

fn parse_atom(text: &str) -> Result<Atom> {
    let (negated, text) = match text.strip_prefix('!') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    };

    let (name, args) = if let Some(rest) = text.strip_prefix('<') {
        let (name, args) = rest
            .split_once('>')
            .ok_or_else(|| Error::RuleSyntax(format!("Unclosed '<' in atom: {}", text)))?;
        (name, args.trim_start())
    } else {
        let open = text
            .find('(')
            .ok_or_else(|| Error::RuleSyntax(format!("Expected '(' in atom: {}", text)))?;
        (text[..open].trim(), &text[open..])
    };

    let inner = args
        .strip_prefix('(')
        .and_then(|a| a.trim_end().strip_suffix(')'))
        .ok_or_else(|| Error::RuleSyntax(format!("Expected '(a,b)' in atom: {}", text)))?;
    let (subject, object) = inner
        .split_once(',')
        .ok_or_else(|| Error::RuleSyntax(format!("Expected two arguments in atom: {}", text)))?;

    let predicate = Predicate::parse(name.trim()).map_err(|e| Error::RuleSyntax(e.to_string()))?;
    let atom = Atom::new(subject.parse()?, predicate, object.parse()?);
    Ok(if negated { atom.negated() } else { atom })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_rule() -> HornRule {
        HornRule::new(
            "country",
            vec![
                Atom::new(Var::Subject, "bornIn", Var::Fresh(0)),
                Atom::new(Var::Fresh(0), "locatedIn", Var::Object),
            ],
        )
    }

    #[test]
    fn test_connected_path() {
        assert!(path_rule().is_connected_path());

        let dangling = HornRule::new(
            "country",
            vec![
                Atom::new(Var::Subject, "bornIn", Var::Fresh(0)),
                Atom::new(Var::Fresh(1), "locatedIn", Var::Object),
            ],
        );
        assert!(!dangling.is_connected_path());
        assert!(dangling.validate().is_err());

        let never_reaches_object = HornRule::new(
            "country",
            vec![Atom::new(Var::Subject, "bornIn", Var::Fresh(0))],
        );
        assert!(!never_reaches_object.is_connected_path());
        assert!(!HornRule::new("country", vec![]).is_connected_path());
    }

    #[test]
    fn test_canonical_ignores_variable_names_and_order() {
        let renamed = HornRule::new(
            "country",
            vec![
                Atom::new(Var::Fresh(3), "locatedIn", Var::Object),
                Atom::new(Var::Subject, "bornIn", Var::Fresh(3)),
            ],
        );

        assert_eq!(renamed.canonical(), path_rule().canonical());
        assert_eq!(path_rule().canonical(), path_rule());
    }

    #[test]
    fn test_canonical_distinguishes_direction() {
        let reversed = HornRule::new(
            "country",
            vec![
                Atom::new(Var::Fresh(0), "bornIn", Var::Subject),
                Atom::new(Var::Fresh(0), "locatedIn", Var::Object),
            ],
        );
        assert_ne!(reversed.canonical(), path_rule().canonical());
    }

    #[test]
    fn test_display_and_parse() {
        let rule = path_rule();
        let text = rule.to_string();
        assert_eq!(
            text,
            "bornIn(subject,v0) & locatedIn(v0,object) => country(subject,object)"
        );
        assert_eq!(text.parse::<HornRule>().unwrap(), rule);
    }

    #[test]
    fn test_parse_negated_and_bracketed() {
        let rule = HornRule::parse_body(
            "spouse",
            "<http://x.org/p(a)>(subject,object) & !sibling(subject, object)",
        )
        .unwrap();

        assert_eq!(rule.body[0].predicate.as_str(), "http://x.org/p(a)");
        assert!(rule.body[1].negated);
        assert_eq!(rule.body[1].object, Var::Object);
    }

    #[test]
    fn test_parse_errors() {
        assert!(HornRule::parse_body("p", "q(subject)").is_err());
        assert!(HornRule::parse_body("p", "q(subject,w)").is_err());
        assert!(HornRule::parse_body("p", "q(subject,object) &").is_err());
        assert!("q(subject,object)".parse::<HornRule>().is_err());
        assert!("q(subject,object) => p(object,subject)".parse::<HornRule>().is_err());
    }

    #[test]
    fn test_next_fresh() {
        assert_eq!(path_rule().next_fresh(), Var::Fresh(1));
        let direct = HornRule::new("p", vec![Atom::new(Var::Subject, "q", Var::Object)]);
        assert_eq!(direct.next_fresh(), Var::Fresh(0));
    }
}
