use crate::error::{QueryEvaluationError, UnsupportedSparqlError};
use crate::expression::{Expression, Function};
use rdf_quanta_model::{PatternTerm, TriplePattern};
use spargebra::algebra::{
    Expression as AstExpression, Function as AstFunction, GraphPattern,
};
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern as AstTriplePattern};

/// Whether the query reports solutions or a single boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum QueryForm {
    Select,
    Ask,
}

/// A parsed query, reduced to the supported logical algebra.
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub form: QueryForm,
    pub plan: LogicalPlan,
}

/// The supported logical algebra.
///
/// `spargebra` parses full SPARQL 1.1; this tree only keeps the fragment
/// the physical iterator algebra can execute and suspend. Everything else
/// is rejected at translation time with the offending construct's name.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    Bgp(Vec<TriplePattern>),
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
    },
    LeftJoin {
        left: Box<LogicalPlan>,
        right: Vec<TriplePattern>,
        expression: Option<Expression>,
    },
    Union {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
    },
    Filter {
        expression: Expression,
        inner: Box<LogicalPlan>,
    },
    Extend {
        inner: Box<LogicalPlan>,
        variable: String,
        expression: Expression,
    },
    Project {
        inner: Box<LogicalPlan>,
        variables: Vec<String>,
    },
    Distinct {
        inner: Box<LogicalPlan>,
    },
    Slice {
        inner: Box<LogicalPlan>,
        offset: usize,
        limit: Option<usize>,
    },
}

impl LogicalPlan {
    /// The variables a plan can bind, in first-appearance order.
    pub fn in_scope_variables(&self) -> Vec<String> {
        let mut variables = Vec::new();
        self.collect_in_scope_variables(&mut variables);
        variables
    }

    fn collect_in_scope_variables(&self, out: &mut Vec<String>) {
        fn push(out: &mut Vec<String>, name: &str) {
            if !out.iter().any(|v| v == name) {
                out.push(name.to_owned());
            }
        }
        match self {
            Self::Bgp(patterns) => {
                for pattern in patterns {
                    for variable in pattern.variables() {
                        push(out, &variable);
                    }
                }
            }
            Self::Join { left, right } | Self::Union { left, right } => {
                left.collect_in_scope_variables(out);
                right.collect_in_scope_variables(out);
            }
            Self::LeftJoin { left, right, .. } => {
                left.collect_in_scope_variables(out);
                for pattern in right {
                    for variable in pattern.variables() {
                        push(out, &variable);
                    }
                }
            }
            Self::Filter { inner, .. }
            | Self::Distinct { inner }
            | Self::Slice { inner, .. } => inner.collect_in_scope_variables(out),
            Self::Extend {
                inner, variable, ..
            } => {
                inner.collect_in_scope_variables(out);
                push(out, variable);
            }
            Self::Project { variables, .. } => {
                for variable in variables {
                    push(out, variable);
                }
            }
        }
    }

    fn has_projection_spine(&self) -> bool {
        match self {
            Self::Project { .. } => true,
            Self::Distinct { inner } | Self::Slice { inner, .. } => {
                inner.has_projection_spine()
            }
            _ => false,
        }
    }
}

/// Parses SPARQL text into the supported logical algebra.
///
/// Syntax errors come straight from `spargebra` (with position
/// information); structurally valid queries using constructs outside the
/// supported fragment are rejected with [`UnsupportedSparqlError`].
pub fn parse_query(
    text: &str,
    base_iri: Option<&str>,
) -> Result<ParsedQuery, QueryEvaluationError> {
    match spargebra::Query::parse(text, base_iri)? {
        spargebra::Query::Select { pattern, .. } => {
            let mut plan = translate_pattern(&pattern)?;
            if !plan.has_projection_spine() {
                let variables = plan.in_scope_variables();
                plan = LogicalPlan::Project {
                    inner: Box::new(plan),
                    variables,
                };
            }
            Ok(ParsedQuery {
                form: QueryForm::Select,
                plan,
            })
        }
        spargebra::Query::Ask { pattern, .. } => {
            // ASK only needs existence: project everything away and stop
            // after the first solution.
            let inner = translate_pattern(&pattern)?;
            let plan = LogicalPlan::Slice {
                inner: Box::new(LogicalPlan::Project {
                    inner: Box::new(inner),
                    variables: Vec::new(),
                }),
                offset: 0,
                limit: Some(1),
            };
            Ok(ParsedQuery {
                form: QueryForm::Ask,
                plan,
            })
        }
        spargebra::Query::Construct { .. } => {
            Err(UnsupportedSparqlError::new("CONSTRUCT queries").into())
        }
        spargebra::Query::Describe { .. } => {
            Err(UnsupportedSparqlError::new("DESCRIBE queries").into())
        }
    }
}

fn translate_pattern(pattern: &GraphPattern) -> Result<LogicalPlan, UnsupportedSparqlError> {
    Ok(match pattern {
        GraphPattern::Bgp { patterns } => LogicalPlan::Bgp(
            patterns
                .iter()
                .map(translate_triple_pattern)
                .collect::<Result<_, _>>()?,
        ),
        GraphPattern::Join { left, right } => {
            let left = translate_pattern(left)?;
            let right = translate_pattern(right)?;
            // Adjacent basic patterns fold into one BGP so the optimizer
            // can order all of their triple patterns together.
            match (left, right) {
                (LogicalPlan::Bgp(mut a), LogicalPlan::Bgp(b)) => {
                    a.extend(b);
                    LogicalPlan::Bgp(a)
                }
                (left, right) => LogicalPlan::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                },
            }
        }
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => {
            let left = translate_pattern(left)?;
            let LogicalPlan::Bgp(patterns) = translate_pattern(right)? else {
                return Err(UnsupportedSparqlError::new(
                    "OPTIONAL with a non-basic body",
                ));
            };
            let expression = expression
                .as_ref()
                .map(translate_expression)
                .transpose()?;
            LogicalPlan::LeftJoin {
                left: Box::new(left),
                right: patterns,
                expression,
            }
        }
        GraphPattern::Union { left, right } => LogicalPlan::Union {
            left: Box::new(translate_pattern(left)?),
            right: Box::new(translate_pattern(right)?),
        },
        GraphPattern::Filter { expr, inner } => LogicalPlan::Filter {
            expression: translate_expression(expr)?,
            inner: Box::new(translate_pattern(inner)?),
        },
        GraphPattern::Extend {
            inner,
            variable,
            expression,
        } => LogicalPlan::Extend {
            inner: Box::new(translate_pattern(inner)?),
            variable: variable.as_str().to_owned(),
            expression: translate_expression(expression)?,
        },
        GraphPattern::Project { inner, variables } => LogicalPlan::Project {
            inner: Box::new(translate_pattern(inner)?),
            variables: variables.iter().map(|v| v.as_str().to_owned()).collect(),
        },
        GraphPattern::Distinct { inner } => LogicalPlan::Distinct {
            inner: Box::new(translate_pattern(inner)?),
        },
        // REDUCED permits but does not require deduplication; normalizing
        // to DISTINCT keeps the result set legal.
        GraphPattern::Reduced { inner } => LogicalPlan::Distinct {
            inner: Box::new(translate_pattern(inner)?),
        },
        GraphPattern::Slice {
            inner,
            start,
            length,
        } => LogicalPlan::Slice {
            inner: Box::new(translate_pattern(inner)?),
            offset: *start,
            limit: *length,
        },
        GraphPattern::Path { .. } => {
            return Err(UnsupportedSparqlError::new("property paths"));
        }
        GraphPattern::Graph { .. } => {
            return Err(UnsupportedSparqlError::new("GRAPH patterns"));
        }
        GraphPattern::Minus { .. } => {
            return Err(UnsupportedSparqlError::new("MINUS"));
        }
        GraphPattern::Values { .. } => {
            return Err(UnsupportedSparqlError::new("VALUES"));
        }
        GraphPattern::OrderBy { .. } => {
            return Err(UnsupportedSparqlError::new("ORDER BY"));
        }
        GraphPattern::Group { .. } => {
            return Err(UnsupportedSparqlError::new("aggregates"));
        }
        GraphPattern::Service { .. } => {
            return Err(UnsupportedSparqlError::new("SERVICE"));
        }
        #[allow(unreachable_patterns)]
        _ => {
            return Err(UnsupportedSparqlError::new("this SPARQL construct"));
        }
    })
}

fn translate_triple_pattern(
    pattern: &AstTriplePattern,
) -> Result<TriplePattern, UnsupportedSparqlError> {
    Ok(TriplePattern {
        subject: translate_term_pattern(&pattern.subject)?,
        predicate: match &pattern.predicate {
            NamedNodePattern::NamedNode(node) => PatternTerm::Term(node.clone().into()),
            NamedNodePattern::Variable(variable) => {
                PatternTerm::Variable(variable.as_str().to_owned())
            }
        },
        object: translate_term_pattern(&pattern.object)?,
    })
}

fn translate_term_pattern(
    pattern: &TermPattern,
) -> Result<PatternTerm, UnsupportedSparqlError> {
    match pattern {
        TermPattern::NamedNode(node) => Ok(PatternTerm::Term(node.clone().into())),
        // Blank nodes in query patterns are existential variables. Giving
        // them stable, label-derived names keeps their identity across a
        // continuation lineage.
        TermPattern::BlankNode(node) => Ok(PatternTerm::Variable(blank_node_variable(
            node.as_str(),
        ))),
        TermPattern::Literal(literal) => Ok(PatternTerm::Term(literal.clone().into())),
        TermPattern::Variable(variable) => {
            Ok(PatternTerm::Variable(variable.as_str().to_owned()))
        }
        #[allow(unreachable_patterns)]
        _ => Err(UnsupportedSparqlError::new("RDF-star triple patterns")),
    }
}

pub(crate) fn blank_node_variable(label: &str) -> String {
    format!("__bnode_{label}")
}

fn translate_expression(
    expression: &AstExpression,
) -> Result<Expression, UnsupportedSparqlError> {
    let binary = |a: &AstExpression,
                  b: &AstExpression|
     -> Result<(Box<Expression>, Box<Expression>), UnsupportedSparqlError> {
        Ok((
            Box::new(translate_expression(a)?),
            Box::new(translate_expression(b)?),
        ))
    };
    Ok(match expression {
        AstExpression::NamedNode(node) => Expression::Term(node.clone().into()),
        AstExpression::Literal(literal) => Expression::Term(literal.clone().into()),
        AstExpression::Variable(variable) => {
            Expression::Variable(variable.as_str().to_owned())
        }
        AstExpression::Or(a, b) => {
            let (a, b) = binary(a, b)?;
            Expression::Or(a, b)
        }
        AstExpression::And(a, b) => {
            let (a, b) = binary(a, b)?;
            Expression::And(a, b)
        }
        AstExpression::Equal(a, b) => {
            let (a, b) = binary(a, b)?;
            Expression::Equal(a, b)
        }
        AstExpression::SameTerm(a, b) => {
            let (a, b) = binary(a, b)?;
            Expression::SameTerm(a, b)
        }
        AstExpression::Greater(a, b) => {
            let (a, b) = binary(a, b)?;
            Expression::Greater(a, b)
        }
        AstExpression::GreaterOrEqual(a, b) => {
            let (a, b) = binary(a, b)?;
            Expression::GreaterOrEqual(a, b)
        }
        AstExpression::Less(a, b) => {
            let (a, b) = binary(a, b)?;
            Expression::Less(a, b)
        }
        AstExpression::LessOrEqual(a, b) => {
            let (a, b) = binary(a, b)?;
            Expression::LessOrEqual(a, b)
        }
        AstExpression::In(needle, haystack) => Expression::In(
            Box::new(translate_expression(needle)?),
            haystack
                .iter()
                .map(translate_expression)
                .collect::<Result<_, _>>()?,
        ),
        AstExpression::Add(a, b) => {
            let (a, b) = binary(a, b)?;
            Expression::Add(a, b)
        }
        AstExpression::Subtract(a, b) => {
            let (a, b) = binary(a, b)?;
            Expression::Subtract(a, b)
        }
        AstExpression::Multiply(a, b) => {
            let (a, b) = binary(a, b)?;
            Expression::Multiply(a, b)
        }
        AstExpression::Divide(a, b) => {
            let (a, b) = binary(a, b)?;
            Expression::Divide(a, b)
        }
        AstExpression::UnaryPlus(inner) => {
            Expression::UnaryPlus(Box::new(translate_expression(inner)?))
        }
        AstExpression::UnaryMinus(inner) => {
            Expression::UnaryMinus(Box::new(translate_expression(inner)?))
        }
        AstExpression::Not(inner) => {
            Expression::Not(Box::new(translate_expression(inner)?))
        }
        AstExpression::If(cond, then, otherwise) => Expression::If(
            Box::new(translate_expression(cond)?),
            Box::new(translate_expression(then)?),
            Box::new(translate_expression(otherwise)?),
        ),
        AstExpression::Coalesce(expressions) => Expression::Coalesce(
            expressions
                .iter()
                .map(translate_expression)
                .collect::<Result<_, _>>()?,
        ),
        AstExpression::Bound(variable) => {
            Expression::Bound(variable.as_str().to_owned())
        }
        AstExpression::Exists(_) => {
            return Err(UnsupportedSparqlError::new("EXISTS"));
        }
        AstExpression::FunctionCall(function, args) => {
            let args = args
                .iter()
                .map(translate_expression)
                .collect::<Result<Vec<_>, _>>()?;
            Expression::FunctionCall(translate_function(function)?, args)
        }
        #[allow(unreachable_patterns)]
        _ => {
            return Err(UnsupportedSparqlError::new("this SPARQL expression"));
        }
    })
}

fn translate_function(function: &AstFunction) -> Result<Function, UnsupportedSparqlError> {
    Ok(match function {
        AstFunction::Str => Function::Str,
        AstFunction::Lang => Function::Lang,
        AstFunction::Datatype => Function::Datatype,
        AstFunction::IsIri => Function::IsIri,
        AstFunction::IsBlank => Function::IsBlank,
        AstFunction::IsLiteral => Function::IsLiteral,
        AstFunction::IsNumeric => Function::IsNumeric,
        AstFunction::StrLen => Function::StrLen,
        AstFunction::UCase => Function::UCase,
        AstFunction::LCase => Function::LCase,
        AstFunction::Contains => Function::Contains,
        AstFunction::StrStarts => Function::StrStarts,
        AstFunction::StrEnds => Function::StrEnds,
        AstFunction::Regex => Function::Regex,
        other => {
            return Err(UnsupportedSparqlError::new(format!(
                "the {other:?} function"
            )));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_star_gets_a_projection() {
        let parsed = parse_query(
            "SELECT * WHERE { ?s <http://example.org/p> ?o }",
            None,
        )
        .unwrap();
        assert_eq!(parsed.form, QueryForm::Select);
        let LogicalPlan::Project { variables, .. } = &parsed.plan else {
            panic!("expected a projection, got {:?}", parsed.plan);
        };
        assert_eq!(variables, &["s".to_owned(), "o".to_owned()]);
    }

    #[test]
    fn ask_is_rewritten_to_limit_one() {
        let parsed = parse_query(
            "ASK { ?s <http://example.org/p> ?o }",
            None,
        )
        .unwrap();
        assert_eq!(parsed.form, QueryForm::Ask);
        let LogicalPlan::Slice { limit, .. } = &parsed.plan else {
            panic!("expected a slice, got {:?}", parsed.plan);
        };
        assert_eq!(*limit, Some(1));
    }

    #[test]
    fn adjacent_triple_patterns_fold_into_one_bgp() {
        let parsed = parse_query(
            "SELECT ?y ?z WHERE { ?x <http://example.org/p> ?y . ?y <http://example.org/q> ?z }",
            None,
        )
        .unwrap();
        let LogicalPlan::Project { inner, .. } = parsed.plan else {
            panic!("expected a projection");
        };
        assert!(matches!(*inner, LogicalPlan::Bgp(ref patterns) if patterns.len() == 2));
    }

    #[test]
    fn blank_nodes_become_stable_variables() {
        let parsed = parse_query(
            "SELECT ?o WHERE { _:b <http://example.org/p> ?o }",
            None,
        )
        .unwrap();
        let LogicalPlan::Project { inner, .. } = parsed.plan else {
            panic!("expected a projection");
        };
        let LogicalPlan::Bgp(patterns) = *inner else {
            panic!("expected a basic graph pattern");
        };
        let subject = patterns[0].subject.as_variable().unwrap();
        assert!(subject.starts_with("__bnode_"));
    }

    #[test]
    fn service_is_unsupported() {
        let result = parse_query(
            "SELECT * WHERE { SERVICE <http://example.org/sparql> { ?s ?p ?o } }",
            None,
        );
        assert!(matches!(
            result,
            Err(QueryEvaluationError::Unsupported(_))
        ));
    }

    #[test]
    fn updates_are_syntax_errors() {
        let result = parse_query("INSERT DATA { <a> <b> <c> }", None);
        assert!(matches!(result, Err(QueryEvaluationError::Syntax(_))));
    }

    #[test]
    fn order_by_is_unsupported() {
        let result = parse_query(
            "SELECT ?o WHERE { ?s ?p ?o } ORDER BY ?o",
            None,
        );
        assert!(matches!(
            result,
            Err(QueryEvaluationError::Unsupported(_))
        ));
    }
}
