use crate::algebra::LogicalPlan;
use crate::error::{QueryEvaluationError, UnsupportedSparqlError};
use crate::expression::Expression;
use crate::iterators::{
    BagUnionIterator, BoxedPlan, DistinctIterator, ExtendIterator, FilterIterator,
    IndexJoinIterator, LeftJoinIterator, ProjectionIterator, ScanIterator,
    SliceIterator,
};
use rdf_quanta_model::TriplePattern;
use rdf_quanta_storage::GraphBackend;
use serde::Serialize;
use std::cmp::Reverse;
use std::sync::Arc;

/// A per-leaf cardinality annotation, reported to clients for monitoring.
/// The engine itself never reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardinalityEstimate {
    pub pattern: String,
    pub cardinality: usize,
}

/// Knobs the plan builder takes from the graph configuration.
#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    pub distinct_cap: usize,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            distinct_cap: 100_000,
        }
    }
}

/// Translates a logical plan into a physical iterator plan.
///
/// Deterministic for a fixed backend state: the only inputs are the
/// logical tree and the backend's cardinality estimates, and every
/// ordering ties back to the textual pattern order.
pub fn build_plan(
    plan: &LogicalPlan,
    backend: &Arc<dyn GraphBackend>,
    options: PlanOptions,
) -> Result<(BoxedPlan, Vec<CardinalityEstimate>), QueryEvaluationError> {
    let mut cardinalities = Vec::new();
    let plan = build(plan, backend, options, &mut cardinalities)?;
    Ok((plan, cardinalities))
}

fn build(
    plan: &LogicalPlan,
    backend: &Arc<dyn GraphBackend>,
    options: PlanOptions,
    cardinalities: &mut Vec<CardinalityEstimate>,
) -> Result<BoxedPlan, QueryEvaluationError> {
    Ok(match plan {
        LogicalPlan::Bgp(patterns) => {
            build_bgp(patterns, Vec::new(), backend, cardinalities)?
        }
        LogicalPlan::Filter { expression, inner } => match &**inner {
            // Filters over a BGP are split into conjuncts and pushed to
            // the earliest point of the chain that binds their variables.
            LogicalPlan::Bgp(patterns) => {
                let mut conjuncts = Vec::new();
                split_conjunction(expression, &mut conjuncts);
                build_bgp(patterns, conjuncts, backend, cardinalities)?
            }
            _ => Box::new(FilterIterator::new(
                expression.clone(),
                build(inner, backend, options, cardinalities)?,
            )),
        },
        LogicalPlan::Join { left, right } => match (&**left, &**right) {
            (_, LogicalPlan::Bgp(patterns)) => {
                let probe = build(left, backend, options, cardinalities)?;
                extend_chain(probe, patterns, backend, cardinalities)?
            }
            (LogicalPlan::Bgp(patterns), _) => {
                let probe = build(right, backend, options, cardinalities)?;
                extend_chain(probe, patterns, backend, cardinalities)?
            }
            _ => {
                return Err(UnsupportedSparqlError::new(
                    "joins between two complex sub-patterns",
                )
                .into());
            }
        },
        LogicalPlan::LeftJoin {
            left,
            right,
            expression,
        } => {
            if right.is_empty() {
                return Err(
                    UnsupportedSparqlError::new("OPTIONAL with an empty body").into()
                );
            }
            let ordered = order_patterns(right, backend, cardinalities)?;
            Box::new(LeftJoinIterator::new(
                build(left, backend, options, cardinalities)?,
                ordered,
                expression.clone(),
                Arc::clone(backend),
            ))
        }
        LogicalPlan::Union { .. } => {
            let mut branches = Vec::new();
            flatten_union(plan, &mut branches);
            let children = branches
                .into_iter()
                .map(|branch| build(branch, backend, options, cardinalities))
                .collect::<Result<Vec<_>, _>>()?;
            Box::new(BagUnionIterator::new(children))
        }
        LogicalPlan::Extend {
            inner,
            variable,
            expression,
        } => Box::new(ExtendIterator::new(
            build(inner, backend, options, cardinalities)?,
            variable.clone(),
            expression.clone(),
        )),
        LogicalPlan::Project { inner, variables } => Box::new(ProjectionIterator::new(
            build(inner, backend, options, cardinalities)?,
            variables.clone(),
        )),
        LogicalPlan::Distinct { inner } => Box::new(DistinctIterator::new(
            build(inner, backend, options, cardinalities)?,
            options.distinct_cap,
        )),
        LogicalPlan::Slice {
            inner,
            offset,
            limit,
        } => Box::new(SliceIterator::new(
            build(inner, backend, options, cardinalities)?,
            *offset,
            *limit,
        )),
    })
}

/// Builds the left-deep chain for a BGP: patterns ordered by ascending
/// cardinality estimate (ties: more bound terms first, then textual
/// order), the first as a scan, the rest as index joins, with eligible
/// filters attached as soon as their variables are all produced.
fn build_bgp(
    patterns: &[TriplePattern],
    filters: Vec<Expression>,
    backend: &Arc<dyn GraphBackend>,
    cardinalities: &mut Vec<CardinalityEstimate>,
) -> Result<BoxedPlan, QueryEvaluationError> {
    if patterns.is_empty() {
        return Err(UnsupportedSparqlError::new("empty basic graph patterns").into());
    }
    let ordered = order_patterns(patterns, backend, cardinalities)?;

    let mut pending: Vec<(Vec<String>, Expression)> = filters
        .into_iter()
        .map(|filter| {
            let mut variables = Vec::new();
            filter.collect_variables(&mut variables);
            (variables, filter)
        })
        .collect();

    let mut produced = ordered[0].variables();
    let mut plan: BoxedPlan = Box::new(ScanIterator::new(
        Arc::clone(backend),
        ordered[0].clone(),
    ));
    plan = attach_filters(plan, &produced, &mut pending);

    for pattern in &ordered[1..] {
        for variable in pattern.variables() {
            if !produced.contains(&variable) {
                produced.push(variable);
            }
        }
        plan = Box::new(IndexJoinIterator::new(
            plan,
            pattern.clone(),
            Arc::clone(backend),
        ));
        plan = attach_filters(plan, &produced, &mut pending);
    }

    // Filters whose variables are never produced can only drop solutions;
    // evaluating them at the top keeps the standard unbound-is-error
    // semantics.
    for (_, filter) in pending {
        plan = Box::new(FilterIterator::new(filter, plan));
    }
    Ok(plan)
}

/// Extends an existing probe plan with an ordered chain of index joins.
fn extend_chain(
    mut plan: BoxedPlan,
    patterns: &[TriplePattern],
    backend: &Arc<dyn GraphBackend>,
    cardinalities: &mut Vec<CardinalityEstimate>,
) -> Result<BoxedPlan, QueryEvaluationError> {
    for pattern in order_patterns(patterns, backend, cardinalities)? {
        plan = Box::new(IndexJoinIterator::new(plan, pattern, Arc::clone(backend)));
    }
    Ok(plan)
}

fn attach_filters(
    mut plan: BoxedPlan,
    produced: &[String],
    pending: &mut Vec<(Vec<String>, Expression)>,
) -> BoxedPlan {
    let mut index = 0;
    while index < pending.len() {
        if pending[index]
            .0
            .iter()
            .all(|variable| produced.contains(variable))
        {
            let (_, filter) = pending.remove(index);
            plan = Box::new(FilterIterator::new(filter, plan));
        } else {
            index += 1;
        }
    }
    plan
}

fn order_patterns(
    patterns: &[TriplePattern],
    backend: &Arc<dyn GraphBackend>,
    cardinalities: &mut Vec<CardinalityEstimate>,
) -> Result<Vec<TriplePattern>, QueryEvaluationError> {
    let mut annotated = patterns
        .iter()
        .enumerate()
        .map(|(position, pattern)| {
            let estimate = backend.estimate_cardinality(pattern)?;
            Ok((estimate, position, pattern))
        })
        .collect::<Result<Vec<_>, QueryEvaluationError>>()?;
    annotated.sort_by_key(|(estimate, position, pattern)| {
        (*estimate, Reverse(pattern.bound_term_count()), *position)
    });
    Ok(annotated
        .into_iter()
        .map(|(estimate, _, pattern)| {
            cardinalities.push(CardinalityEstimate {
                pattern: pattern.to_string(),
                cardinality: estimate,
            });
            pattern.clone()
        })
        .collect())
}

fn split_conjunction(expression: &Expression, out: &mut Vec<Expression>) {
    match expression {
        Expression::And(a, b) => {
            split_conjunction(a, out);
            split_conjunction(b, out);
        }
        other => out.push(other.clone()),
    }
}

fn flatten_union<'a>(plan: &'a LogicalPlan, out: &mut Vec<&'a LogicalPlan>) {
    match plan {
        LogicalPlan::Union { left, right } => {
            flatten_union(left, out);
            flatten_union(right, out);
        }
        other => out.push(other),
    }
}
