//! Serde adapters persisting RDF terms through their N-Triples text form.
//!
//! Saved query plans must survive a round trip through an opaque token, so
//! every term they carry is stored as its canonical text and re-parsed on
//! load. Use with `#[serde(with = "rdf_quanta_model::term_serde")]`.

use oxrdf::Term;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use std::str::FromStr;

pub fn serialize<S: Serializer>(term: &Term, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(term)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Term, D::Error> {
    let text = String::deserialize(deserializer)?;
    Term::from_str(&text).map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use oxrdf::{Literal, NamedNode, Term};
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        term: Term,
    }

    #[test]
    fn literal_round_trip() {
        let term: Term = Literal::new_language_tagged_literal("chat", "fr")
            .unwrap()
            .into();
        let json = serde_json::to_string(&Wrapper { term: term.clone() }).unwrap();
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.term, term);
    }

    #[test]
    fn iri_round_trip() {
        let term: Term = NamedNode::new_unchecked("http://example.org/a").into();
        let json = serde_json::to_string(&Wrapper { term: term.clone() }).unwrap();
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.term, term);
    }
}
