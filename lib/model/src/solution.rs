use oxrdf::Term;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::str::FromStr;

/// A partial mapping from variable names to ground RDF terms.
///
/// Solution mappings are the values that flow between the operators of a
/// physical query plan. They are kept in a sorted map so that two equal
/// mappings always render to the same canonical text, which the distinct
/// operator and the plan serializer rely on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SolutionMapping {
    bindings: BTreeMap<String, Term>,
}

impl SolutionMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, variable: &str) -> Option<&Term> {
        self.bindings.get(variable)
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.bindings.contains_key(variable)
    }

    /// Binds `variable` to `term`, replacing any previous binding.
    pub fn insert(&mut self, variable: impl Into<String>, term: Term) {
        self.bindings.insert(variable.into(), term);
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Term> {
        self.bindings.iter()
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Two mappings are compatible iff they agree on every shared variable.
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.bindings
            .iter()
            .all(|(variable, term)| other.get(variable).map_or(true, |t| t == term))
    }

    /// Merges two compatible mappings, or returns `None` if they disagree
    /// on a shared variable.
    pub fn merged(&self, other: &Self) -> Option<Self> {
        if !self.is_compatible_with(other) {
            return None;
        }
        let mut bindings = self.bindings.clone();
        for (variable, term) in &other.bindings {
            bindings.insert(variable.clone(), term.clone());
        }
        Some(Self { bindings })
    }

    /// Restricts the mapping to the given variables.
    pub fn project(&self, variables: &[String]) -> Self {
        let bindings = self
            .bindings
            .iter()
            .filter(|(variable, _)| variables.contains(variable))
            .map(|(variable, term)| (variable.clone(), term.clone()))
            .collect();
        Self { bindings }
    }

    /// A canonical text form usable as a deduplication key.
    pub fn canonical_key(&self) -> String {
        let mut key = String::new();
        for (variable, term) in &self.bindings {
            key.push('?');
            key.push_str(variable);
            key.push('=');
            key.push_str(&term.to_string());
            key.push(';');
        }
        key
    }
}

impl FromIterator<(String, Term)> for SolutionMapping {
    fn from_iter<I: IntoIterator<Item = (String, Term)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for SolutionMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (variable, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "?{variable} -> {term}")?;
        }
        write!(f, "}}")
    }
}

impl Serialize for SolutionMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.bindings
                .iter()
                .map(|(variable, term)| (variable, term.to_string())),
        )
    }
}

impl<'de> Deserialize<'de> for SolutionMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        let bindings = raw
            .into_iter()
            .map(|(variable, text)| {
                Term::from_str(&text)
                    .map(|term| (variable, term))
                    .map_err(D::Error::custom)
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { bindings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::NamedNode;

    fn iri(value: &str) -> Term {
        NamedNode::new_unchecked(value).into()
    }

    fn mapping(pairs: &[(&str, &str)]) -> SolutionMapping {
        pairs
            .iter()
            .map(|(variable, value)| ((*variable).to_owned(), iri(value)))
            .collect()
    }

    #[test]
    fn compatible_mappings_merge() {
        let left = mapping(&[("x", "http://example.org/a")]);
        let right = mapping(&[
            ("x", "http://example.org/a"),
            ("y", "http://example.org/b"),
        ]);
        assert!(left.is_compatible_with(&right));
        let merged = left.merged(&right).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("y"), Some(&iri("http://example.org/b")));
    }

    #[test]
    fn incompatible_mappings_do_not_merge() {
        let left = mapping(&[("x", "http://example.org/a")]);
        let right = mapping(&[("x", "http://example.org/b")]);
        assert!(!left.is_compatible_with(&right));
        assert!(left.merged(&right).is_none());
    }

    #[test]
    fn projection_keeps_only_requested_variables() {
        let full = mapping(&[
            ("x", "http://example.org/a"),
            ("y", "http://example.org/b"),
        ]);
        let projected = full.project(&["x".to_owned()]);
        assert_eq!(projected.len(), 1);
        assert!(projected.contains("x"));
    }

    #[test]
    fn canonical_key_is_order_independent() {
        let mut a = SolutionMapping::new();
        a.insert("y", iri("http://example.org/b"));
        a.insert("x", iri("http://example.org/a"));
        let mut b = SolutionMapping::new();
        b.insert("x", iri("http://example.org/a"));
        b.insert("y", iri("http://example.org/b"));
        assert_eq!(a.canonical_key(), b.canonical_key());
    }
}
