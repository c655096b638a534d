use oxrdf::vocab::xsd;
use oxrdf::{Literal, Term};
use rdf_quanta_model::SolutionMapping;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A filter/BIND expression over solution mappings.
///
/// This is a closed, serializable mirror of the supported subset of
/// `spargebra::algebra::Expression`, so that plans carrying filters can
/// round-trip through a continuation token without re-parsing query text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Term(#[serde(with = "rdf_quanta_model::term_serde")] Term),
    Variable(String),
    Or(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Equal(Box<Expression>, Box<Expression>),
    SameTerm(Box<Expression>, Box<Expression>),
    Greater(Box<Expression>, Box<Expression>),
    GreaterOrEqual(Box<Expression>, Box<Expression>),
    Less(Box<Expression>, Box<Expression>),
    LessOrEqual(Box<Expression>, Box<Expression>),
    In(Box<Expression>, Vec<Expression>),
    Add(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    UnaryPlus(Box<Expression>),
    UnaryMinus(Box<Expression>),
    Not(Box<Expression>),
    If(Box<Expression>, Box<Expression>, Box<Expression>),
    Coalesce(Vec<Expression>),
    Bound(String),
    FunctionCall(Function, Vec<Expression>),
}

/// The supported built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Function {
    Str,
    Lang,
    Datatype,
    IsIri,
    IsBlank,
    IsLiteral,
    IsNumeric,
    StrLen,
    UCase,
    LCase,
    Contains,
    StrStarts,
    StrEnds,
    Regex,
}

impl Expression {
    /// Collects every variable the expression reads, for filter push-down.
    pub fn collect_variables(&self, out: &mut Vec<String>) {
        let mut push = |name: &str| {
            if !out.iter().any(|v| v == name) {
                out.push(name.to_owned());
            }
        };
        match self {
            Self::Term(_) => {}
            Self::Variable(name) | Self::Bound(name) => push(name),
            Self::Or(a, b)
            | Self::And(a, b)
            | Self::Equal(a, b)
            | Self::SameTerm(a, b)
            | Self::Greater(a, b)
            | Self::GreaterOrEqual(a, b)
            | Self::Less(a, b)
            | Self::LessOrEqual(a, b)
            | Self::Add(a, b)
            | Self::Subtract(a, b)
            | Self::Multiply(a, b)
            | Self::Divide(a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
            Self::UnaryPlus(inner) | Self::UnaryMinus(inner) | Self::Not(inner) => {
                inner.collect_variables(out);
            }
            Self::If(cond, then, otherwise) => {
                cond.collect_variables(out);
                then.collect_variables(out);
                otherwise.collect_variables(out);
            }
            Self::In(needle, haystack) => {
                needle.collect_variables(out);
                for expression in haystack {
                    expression.collect_variables(out);
                }
            }
            Self::Coalesce(expressions) | Self::FunctionCall(_, expressions) => {
                for expression in expressions {
                    expression.collect_variables(out);
                }
            }
        }
    }

    /// Evaluates the expression over a mapping.
    ///
    /// `None` models the SPARQL "error" value: filters drop the solution,
    /// BIND leaves the target variable unbound.
    pub fn evaluate(&self, mapping: &SolutionMapping) -> Option<Term> {
        match self {
            Self::Term(term) => Some(term.clone()),
            Self::Variable(name) => mapping.get(name).cloned(),
            Self::Or(a, b) => {
                // SPARQL three-valued logic: an error on one side is
                // recoverable if the other side decides the result.
                match (a.boolean(mapping), b.boolean(mapping)) {
                    (Some(true), _) | (_, Some(true)) => Some(bool_term(true)),
                    (Some(false), Some(false)) => Some(bool_term(false)),
                    _ => None,
                }
            }
            Self::And(a, b) => match (a.boolean(mapping), b.boolean(mapping)) {
                (Some(false), _) | (_, Some(false)) => Some(bool_term(false)),
                (Some(true), Some(true)) => Some(bool_term(true)),
                _ => None,
            },
            Self::Equal(a, b) => {
                value_equal(&a.evaluate(mapping)?, &b.evaluate(mapping)?).map(bool_term)
            }
            Self::SameTerm(a, b) => {
                Some(bool_term(a.evaluate(mapping)? == b.evaluate(mapping)?))
            }
            Self::Greater(a, b) => comparison(a, b, mapping, Ordering::is_gt),
            Self::GreaterOrEqual(a, b) => comparison(a, b, mapping, Ordering::is_ge),
            Self::Less(a, b) => comparison(a, b, mapping, Ordering::is_lt),
            Self::LessOrEqual(a, b) => comparison(a, b, mapping, Ordering::is_le),
            Self::In(needle, haystack) => {
                let needle = needle.evaluate(mapping)?;
                let mut errored = false;
                for candidate in haystack {
                    match candidate
                        .evaluate(mapping)
                        .and_then(|c| value_equal(&needle, &c))
                    {
                        Some(true) => return Some(bool_term(true)),
                        Some(false) => {}
                        None => errored = true,
                    }
                }
                if errored { None } else { Some(bool_term(false)) }
            }
            Self::Add(a, b) => arithmetic(a, b, mapping, NumericOp::Add),
            Self::Subtract(a, b) => arithmetic(a, b, mapping, NumericOp::Subtract),
            Self::Multiply(a, b) => arithmetic(a, b, mapping, NumericOp::Multiply),
            Self::Divide(a, b) => arithmetic(a, b, mapping, NumericOp::Divide),
            Self::UnaryPlus(inner) => {
                numeric_value(&inner.evaluate(mapping)?).map(NumericValue::into_term)
            }
            Self::UnaryMinus(inner) => {
                Some(numeric_value(&inner.evaluate(mapping)?)?.negated().into_term())
            }
            Self::Not(inner) => inner.boolean(mapping).map(|value| bool_term(!value)),
            Self::If(cond, then, otherwise) => {
                if cond.boolean(mapping)? {
                    then.evaluate(mapping)
                } else {
                    otherwise.evaluate(mapping)
                }
            }
            Self::Coalesce(expressions) => {
                expressions.iter().find_map(|e| e.evaluate(mapping))
            }
            Self::Bound(name) => Some(bool_term(mapping.contains(name))),
            Self::FunctionCall(function, args) => {
                evaluate_function(*function, args, mapping)
            }
        }
    }

    /// The effective boolean value of the expression, or `None` on error.
    pub fn boolean(&self, mapping: &SolutionMapping) -> Option<bool> {
        effective_boolean_value(&self.evaluate(mapping)?)
    }
}

fn comparison(
    a: &Expression,
    b: &Expression,
    mapping: &SolutionMapping,
    test: impl Fn(Ordering) -> bool,
) -> Option<Term> {
    let ordering = value_compare(&a.evaluate(mapping)?, &b.evaluate(mapping)?)?;
    Some(bool_term(test(ordering)))
}

fn arithmetic(
    a: &Expression,
    b: &Expression,
    mapping: &SolutionMapping,
    op: NumericOp,
) -> Option<Term> {
    let a = numeric_value(&a.evaluate(mapping)?)?;
    let b = numeric_value(&b.evaluate(mapping)?)?;
    a.apply(op, b).map(NumericValue::into_term)
}

fn bool_term(value: bool) -> Term {
    Literal::from(value).into()
}

/// A numeric literal value with SPARQL promotion rules: integer arithmetic
/// stays integral except for division.
#[derive(Debug, Clone, Copy, PartialEq)]
enum NumericValue {
    Integer(i64),
    Double(f64),
}

#[derive(Debug, Clone, Copy)]
enum NumericOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl NumericValue {
    fn as_f64(self) -> f64 {
        match self {
            Self::Integer(value) => value as f64,
            Self::Double(value) => value,
        }
    }

    fn negated(self) -> Self {
        match self {
            Self::Integer(value) => Self::Integer(-value),
            Self::Double(value) => Self::Double(-value),
        }
    }

    fn apply(self, op: NumericOp, other: Self) -> Option<Self> {
        if let (Self::Integer(a), Self::Integer(b)) = (self, other) {
            let result = match op {
                NumericOp::Add => a.checked_add(b),
                NumericOp::Subtract => a.checked_sub(b),
                NumericOp::Multiply => a.checked_mul(b),
                NumericOp::Divide => None, // falls through to double division
            };
            if let Some(result) = result {
                return Some(Self::Integer(result));
            }
            if matches!(op, NumericOp::Divide) && b == 0 {
                return None;
            }
        }
        let (a, b) = (self.as_f64(), other.as_f64());
        let result = match op {
            NumericOp::Add => a + b,
            NumericOp::Subtract => a - b,
            NumericOp::Multiply => a * b,
            NumericOp::Divide => a / b,
        };
        Some(Self::Double(result))
    }

    fn into_term(self) -> Term {
        match self {
            Self::Integer(value) => Literal::from(value).into(),
            Self::Double(value) => Literal::from(value).into(),
        }
    }
}

fn numeric_value(term: &Term) -> Option<NumericValue> {
    let Term::Literal(literal) = term else {
        return None;
    };
    let datatype = literal.datatype();
    if datatype == xsd::INTEGER
        || datatype == xsd::LONG
        || datatype == xsd::INT
        || datatype == xsd::SHORT
        || datatype == xsd::BYTE
        || datatype == xsd::NON_NEGATIVE_INTEGER
        || datatype == xsd::POSITIVE_INTEGER
        || datatype == xsd::UNSIGNED_LONG
        || datatype == xsd::UNSIGNED_INT
        || datatype == xsd::UNSIGNED_SHORT
        || datatype == xsd::UNSIGNED_BYTE
    {
        literal.value().parse().ok().map(NumericValue::Integer)
    } else if datatype == xsd::DOUBLE
        || datatype == xsd::FLOAT
        || datatype == xsd::DECIMAL
    {
        literal.value().parse().ok().map(NumericValue::Double)
    } else {
        None
    }
}

/// The string value of a plain, `xsd:string` or language-tagged literal.
fn string_value(term: &Term) -> Option<(&str, Option<&str>)> {
    let Term::Literal(literal) = term else {
        return None;
    };
    if literal.language().is_some() || literal.datatype() == xsd::STRING {
        Some((literal.value(), literal.language()))
    } else {
        None
    }
}

fn boolean_value(term: &Term) -> Option<bool> {
    let Term::Literal(literal) = term else {
        return None;
    };
    if literal.datatype() != xsd::BOOLEAN {
        return None;
    }
    match literal.value() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// SPARQL effective boolean value.
pub fn effective_boolean_value(term: &Term) -> Option<bool> {
    if let Some(value) = boolean_value(term) {
        return Some(value);
    }
    if let Some(value) = numeric_value(term) {
        return Some(match value {
            NumericValue::Integer(v) => v != 0,
            NumericValue::Double(v) => v != 0.0 && !v.is_nan(),
        });
    }
    if let Term::Literal(literal) = term {
        if literal.language().is_none() && literal.datatype() == xsd::STRING {
            return Some(!literal.value().is_empty());
        }
    }
    None
}

/// SPARQL `=` value equality.
pub fn value_equal(a: &Term, b: &Term) -> Option<bool> {
    if a == b {
        return Some(true);
    }
    if let (Some(a), Some(b)) = (numeric_value(a), numeric_value(b)) {
        return Some(a.as_f64() == b.as_f64());
    }
    if let Some(ordering) = value_compare(a, b) {
        return Some(ordering == Ordering::Equal);
    }
    match (a, b) {
        // Unknown datatypes only support term equality; differing lexical
        // forms are an error, not `false`.
        (Term::Literal(_), Term::Literal(_)) => None,
        _ => Some(false),
    }
}

/// SPARQL operator comparison over numerics, strings and booleans.
pub fn value_compare(a: &Term, b: &Term) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (numeric_value(a), numeric_value(b)) {
        return a.as_f64().partial_cmp(&b.as_f64());
    }
    if let (Some((a, lang_a)), Some((b, lang_b))) = (string_value(a), string_value(b)) {
        if lang_a == lang_b {
            return Some(a.cmp(b));
        }
        return None;
    }
    if let (Some(a), Some(b)) = (boolean_value(a), boolean_value(b)) {
        return Some(a.cmp(&b));
    }
    None
}

fn evaluate_function(
    function: Function,
    args: &[Expression],
    mapping: &SolutionMapping,
) -> Option<Term> {
    let arg = |i: usize| args.get(i)?.evaluate(mapping);
    match function {
        Function::Str => match arg(0)? {
            Term::NamedNode(node) => Some(Literal::new_simple_literal(node.as_str()).into()),
            Term::Literal(literal) => {
                Some(Literal::new_simple_literal(literal.value()).into())
            }
            _ => None,
        },
        Function::Lang => match arg(0)? {
            Term::Literal(literal) => Some(
                Literal::new_simple_literal(literal.language().unwrap_or_default())
                    .into(),
            ),
            _ => None,
        },
        Function::Datatype => match arg(0)? {
            Term::Literal(literal) => {
                Some(literal.datatype().into_owned().into())
            }
            _ => None,
        },
        Function::IsIri => Some(bool_term(matches!(arg(0)?, Term::NamedNode(_)))),
        Function::IsBlank => Some(bool_term(matches!(arg(0)?, Term::BlankNode(_)))),
        Function::IsLiteral => Some(bool_term(matches!(arg(0)?, Term::Literal(_)))),
        Function::IsNumeric => Some(bool_term(numeric_value(&arg(0)?).is_some())),
        Function::StrLen => {
            let term = arg(0)?;
            let (value, _) = string_value(&term)?;
            Some(Literal::from(i64::try_from(value.chars().count()).ok()?).into())
        }
        Function::UCase | Function::LCase => {
            let term = arg(0)?;
            let (value, language) = string_value(&term)?;
            let transformed = if function == Function::UCase {
                value.to_uppercase()
            } else {
                value.to_lowercase()
            };
            Some(match language {
                Some(language) => {
                    Literal::new_language_tagged_literal(transformed, language)
                        .ok()?
                        .into()
                }
                None => Literal::new_simple_literal(transformed).into(),
            })
        }
        Function::Contains | Function::StrStarts | Function::StrEnds => {
            let haystack = arg(0)?;
            let needle = arg(1)?;
            let (haystack, _) = string_value(&haystack)?;
            let (needle, _) = string_value(&needle)?;
            let result = match function {
                Function::Contains => haystack.contains(needle),
                Function::StrStarts => haystack.starts_with(needle),
                _ => haystack.ends_with(needle),
            };
            Some(bool_term(result))
        }
        Function::Regex => {
            let text = arg(0)?;
            let (text, _) = string_value(&text)?;
            let pattern = arg(1)?;
            let (pattern, _) = string_value(&pattern)?;
            let mut builder = regex::RegexBuilder::new(pattern);
            if let Some(flags) = args.get(2) {
                let flags = flags.evaluate(mapping)?;
                let (flags, _) = string_value(&flags)?;
                for flag in flags.chars() {
                    match flag {
                        'i' => {
                            builder.case_insensitive(true);
                        }
                        's' => {
                            builder.dot_matches_new_line(true);
                        }
                        'm' => {
                            builder.multi_line(true);
                        }
                        'x' => {
                            builder.ignore_whitespace(true);
                        }
                        _ => return None,
                    }
                }
            }
            Some(bool_term(builder.build().ok()?.is_match(text)))
        }
    }
}
