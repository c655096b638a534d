use crate::SolutionMapping;
use oxrdf::{Term, Triple, Variable};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One slot of a triple pattern: either a ground term or a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternTerm {
    Variable(String),
    Term(Term),
}

impl PatternTerm {
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Self::Variable(name) => Some(name),
            Self::Term(_) => None,
        }
    }

    pub fn as_term(&self) -> Option<&Term> {
        match self {
            Self::Variable(_) => None,
            Self::Term(term) => Some(term),
        }
    }
}

impl From<Term> for PatternTerm {
    fn from(term: Term) -> Self {
        Self::Term(term)
    }
}

impl fmt::Display for PatternTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(name) => write!(f, "?{name}"),
            Self::Term(term) => write!(f, "{term}"),
        }
    }
}

/// Error raised when a pattern slot cannot be parsed from its text form.
#[derive(Debug, thiserror::Error)]
#[error("invalid pattern term '{0}'")]
pub struct PatternTermParseError(String);

impl FromStr for PatternTerm {
    type Err = PatternTermParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if let Some(name) = text.strip_prefix('?') {
            let variable = Variable::new(name)
                .map_err(|_| PatternTermParseError(text.to_owned()))?;
            Ok(Self::Variable(variable.into_string()))
        } else {
            Term::from_str(text)
                .map(Self::Term)
                .map_err(|_| PatternTermParseError(text.to_owned()))
        }
    }
}

impl Serialize for PatternTerm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PatternTerm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

/// A triple pattern: three slots, each a ground term or a variable.
///
/// Patterns are the static configuration of scan operators. Binding a
/// pattern with a solution mapping substitutes its bound variables, which
/// is how index-nested-loop joins re-parameterize their inner scans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl TriplePattern {
    pub fn new(
        subject: impl Into<PatternTerm>,
        predicate: impl Into<PatternTerm>,
        object: impl Into<PatternTerm>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    fn slots(&self) -> [&PatternTerm; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    /// The distinct variable names this pattern can bind, in slot order.
    pub fn variables(&self) -> Vec<String> {
        let mut variables = Vec::new();
        for slot in self.slots() {
            if let Some(name) = slot.as_variable() {
                if !variables.iter().any(|v| v == name) {
                    variables.push(name.to_owned());
                }
            }
        }
        variables
    }

    /// The number of ground slots, used as an optimizer tie-breaker.
    pub fn bound_term_count(&self) -> usize {
        self.slots().iter().filter(|slot| !slot.is_variable()).count()
    }

    /// Substitutes every variable bound in `mapping` with its term.
    pub fn bind(&self, mapping: &SolutionMapping) -> Self {
        let bind_slot = |slot: &PatternTerm| match slot {
            PatternTerm::Variable(name) => mapping
                .get(name)
                .map_or_else(|| slot.clone(), |term| PatternTerm::Term(term.clone())),
            PatternTerm::Term(_) => slot.clone(),
        };
        Self {
            subject: bind_slot(&self.subject),
            predicate: bind_slot(&self.predicate),
            object: bind_slot(&self.object),
        }
    }

    /// Matches a ground triple against this pattern, producing the mapping
    /// of the pattern's variables. Repeated variables must agree.
    pub fn match_triple(&self, triple: &Triple) -> Option<SolutionMapping> {
        let terms: [Term; 3] = [
            triple.subject.clone().into(),
            triple.predicate.clone().into(),
            triple.object.clone(),
        ];
        let mut mapping = SolutionMapping::new();
        for (slot, term) in self.slots().into_iter().zip(terms) {
            match slot {
                PatternTerm::Term(expected) => {
                    if *expected != term {
                        return None;
                    }
                }
                PatternTerm::Variable(name) => match mapping.get(name) {
                    Some(existing) if *existing != term => return None,
                    Some(_) => {}
                    None => mapping.insert(name.clone(), term),
                },
            }
        }
        Some(mapping)
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::NamedNode;

    fn iri(value: &str) -> Term {
        NamedNode::new_unchecked(value).into()
    }

    fn triple(s: &str, p: &str, o: &str) -> Triple {
        Triple::new(
            NamedNode::new_unchecked(s),
            NamedNode::new_unchecked(p),
            NamedNode::new_unchecked(o),
        )
    }

    #[test]
    fn matching_binds_variables() {
        let pattern = TriplePattern::new(
            PatternTerm::variable("s"),
            iri("http://example.org/p"),
            PatternTerm::variable("o"),
        );
        let mapping = pattern
            .match_triple(&triple(
                "http://example.org/a",
                "http://example.org/p",
                "http://example.org/b",
            ))
            .unwrap();
        assert_eq!(mapping.get("s"), Some(&iri("http://example.org/a")));
        assert_eq!(mapping.get("o"), Some(&iri("http://example.org/b")));
    }

    #[test]
    fn repeated_variables_must_agree() {
        let pattern = TriplePattern::new(
            PatternTerm::variable("x"),
            iri("http://example.org/p"),
            PatternTerm::variable("x"),
        );
        assert!(pattern
            .match_triple(&triple(
                "http://example.org/a",
                "http://example.org/p",
                "http://example.org/b",
            ))
            .is_none());
        assert!(pattern
            .match_triple(&triple(
                "http://example.org/a",
                "http://example.org/p",
                "http://example.org/a",
            ))
            .is_some());
    }

    #[test]
    fn binding_substitutes_only_bound_variables() {
        let pattern = TriplePattern::new(
            PatternTerm::variable("s"),
            iri("http://example.org/p"),
            PatternTerm::variable("o"),
        );
        let mapping =
            SolutionMapping::from_iter([("s".to_owned(), iri("http://example.org/a"))]);
        let bound = pattern.bind(&mapping);
        assert_eq!(bound.subject, PatternTerm::Term(iri("http://example.org/a")));
        assert!(bound.object.is_variable());
    }

    #[test]
    fn pattern_term_text_round_trip() {
        for text in ["?x", "<http://example.org/a>", "\"12\"^^<http://www.w3.org/2001/XMLSchema#integer>"] {
            let parsed: PatternTerm = text.parse().unwrap();
            assert_eq!(parsed.to_string(), text);
        }
    }
}
