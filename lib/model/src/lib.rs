//! This crate contains the RDF Quanta data model: triple patterns with
//! variable slots, solution mappings (partial variable → term maps) and the
//! text-based serde used to persist terms inside saved query plans.
//!
//! Large portions of the available types are re-exported from
//! [Oxigraph](https://github.com/oxigraph/oxigraph)'s `oxrdf` crate.

mod pattern;
mod solution;
pub mod term_serde;

pub use pattern::{PatternTerm, PatternTermParseError, TriplePattern};
pub use solution::SolutionMapping;

// Re-export some oxrdf types.
pub use oxrdf::{
    BlankNode, IriParseError, Literal, NamedNode, NamedNodeRef, Subject, Term,
    TermParseError, TermRef, Triple, TripleRef, Variable, VariableNameParseError,
    VariableRef, vocab,
};
