use crate::algebra::QueryForm;
use crate::error::{InvalidContinuationError, QueryEvaluationError};
use crate::expression::Expression;
use crate::iterators::{
    BagUnionIterator, BoxedPlan, DistinctIterator, ExtendIterator, FilterIterator,
    IndexJoinIterator, LeftJoinIterator, ProjectionIterator, ScanIterator,
    SliceIterator,
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rdf_quanta_model::{SolutionMapping, TriplePattern};
use rdf_quanta_storage::GraphBackend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Version prefix of the continuation token encoding. Bump on any change
/// to [`SavedPlanNode`] that is not forward compatible.
pub const PLAN_FORMAT_VERSION: u16 = 1;

/// A reified operator tree: one closed variant per operator kind, each
/// carrying the operator's static configuration and resumable state.
///
/// Decoding is driven by this enum alone, so a token can only ever
/// reconstruct the fixed operator set, never run arbitrary code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SavedPlanNode {
    Scan {
        pattern: TriplePattern,
        offset: usize,
    },
    IndexJoin {
        left: Box<SavedPlanNode>,
        pattern: TriplePattern,
        current: Option<SolutionMapping>,
        right: Option<Box<SavedPlanNode>>,
    },
    LeftJoin {
        left: Box<SavedPlanNode>,
        patterns: Vec<TriplePattern>,
        expression: Option<Expression>,
        current: Option<SolutionMapping>,
        right: Option<Box<SavedPlanNode>>,
        found: bool,
    },
    Union {
        children: Vec<SavedPlanNode>,
        exhausted: Vec<bool>,
        next_child: usize,
    },
    Filter {
        expression: Expression,
        inner: Box<SavedPlanNode>,
    },
    Extend {
        inner: Box<SavedPlanNode>,
        variable: String,
        expression: Expression,
    },
    Projection {
        inner: Box<SavedPlanNode>,
        variables: Vec<String>,
    },
    Distinct {
        inner: Box<SavedPlanNode>,
        seen: Vec<String>,
        cap: usize,
    },
    Slice {
        inner: Box<SavedPlanNode>,
        remaining_offset: usize,
        remaining_limit: Option<usize>,
    },
}

/// The envelope that travels inside a continuation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPlan {
    pub form: QueryForm,
    pub root: SavedPlanNode,
}

/// Encodes a saved plan into an opaque, URL-safe token.
pub fn encode_saved_plan(plan: &SavedPlan) -> Result<String, QueryEvaluationError> {
    let mut bytes = PLAN_FORMAT_VERSION.to_le_bytes().to_vec();
    let body = bincode::serialize(plan).map_err(|error| {
        QueryEvaluationError::Internal(format!("cannot serialize saved plan: {error}"))
    })?;
    bytes.extend_from_slice(&body);
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Decodes a continuation token back into a saved plan.
pub fn decode_saved_plan(token: &str) -> Result<SavedPlan, InvalidContinuationError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|error| InvalidContinuationError::msg(format!("not base64: {error}")))?;
    let Some((version, body)) = bytes.split_first_chunk::<2>() else {
        return Err(InvalidContinuationError::msg("truncated token"));
    };
    let version = u16::from_le_bytes(*version);
    if version != PLAN_FORMAT_VERSION {
        return Err(InvalidContinuationError::msg(format!(
            "unsupported plan format version {version}"
        )));
    }
    bincode::deserialize(body)
        .map_err(|error| InvalidContinuationError::msg(format!("malformed plan: {error}")))
}

/// Rebuilds a live operator tree from a saved node, rebinding scans to
/// the given backend. One fixed constructor per kind tag.
pub fn load_plan(
    node: SavedPlanNode,
    backend: &Arc<dyn GraphBackend>,
) -> Result<BoxedPlan, InvalidContinuationError> {
    Ok(match node {
        SavedPlanNode::Scan { pattern, offset } => {
            Box::new(ScanIterator::resume(Arc::clone(backend), pattern, offset))
        }
        SavedPlanNode::IndexJoin {
            left,
            pattern,
            current,
            right,
        } => {
            if current.is_some() != right.is_some() {
                return Err(InvalidContinuationError::msg(
                    "inconsistent index join state",
                ));
            }
            let right = right
                .map(|right| match *right {
                    SavedPlanNode::Scan { pattern, offset } => Ok(ScanIterator::resume(
                        Arc::clone(backend),
                        pattern,
                        offset,
                    )),
                    _ => Err(InvalidContinuationError::msg(
                        "the inner side of an index join must be a scan",
                    )),
                })
                .transpose()?;
            Box::new(IndexJoinIterator::resume(
                load_plan(*left, backend)?,
                pattern,
                Arc::clone(backend),
                current,
                right,
            ))
        }
        SavedPlanNode::LeftJoin {
            left,
            patterns,
            expression,
            current,
            right,
            found,
        } => {
            if patterns.is_empty() {
                return Err(InvalidContinuationError::msg(
                    "an optional must carry at least one pattern",
                ));
            }
            if current.is_some() != right.is_some() {
                return Err(InvalidContinuationError::msg(
                    "inconsistent optional state",
                ));
            }
            let right = right
                .map(|right| load_plan(*right, backend))
                .transpose()?;
            Box::new(LeftJoinIterator::resume(
                load_plan(*left, backend)?,
                patterns,
                expression,
                Arc::clone(backend),
                current,
                right,
                found,
            ))
        }
        SavedPlanNode::Union {
            children,
            exhausted,
            next_child,
        } => {
            if children.is_empty()
                || children.len() != exhausted.len()
                || next_child >= children.len()
            {
                return Err(InvalidContinuationError::msg("inconsistent union state"));
            }
            let children = children
                .into_iter()
                .map(|child| load_plan(child, backend))
                .collect::<Result<Vec<_>, _>>()?;
            Box::new(BagUnionIterator::resume(children, exhausted, next_child))
        }
        SavedPlanNode::Filter { expression, inner } => Box::new(FilterIterator::new(
            expression,
            load_plan(*inner, backend)?,
        )),
        SavedPlanNode::Extend {
            inner,
            variable,
            expression,
        } => Box::new(ExtendIterator::new(
            load_plan(*inner, backend)?,
            variable,
            expression,
        )),
        SavedPlanNode::Projection { inner, variables } => Box::new(
            ProjectionIterator::new(load_plan(*inner, backend)?, variables),
        ),
        SavedPlanNode::Distinct { inner, seen, cap } => Box::new(
            DistinctIterator::resume(load_plan(*inner, backend)?, seen, cap),
        ),
        SavedPlanNode::Slice {
            inner,
            remaining_offset,
            remaining_limit,
        } => Box::new(SliceIterator::new(
            load_plan(*inner, backend)?,
            remaining_offset,
            remaining_limit,
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_quanta_model::PatternTerm;

    fn sample_plan() -> SavedPlan {
        SavedPlan {
            form: QueryForm::Select,
            root: SavedPlanNode::Projection {
                inner: Box::new(SavedPlanNode::Scan {
                    pattern: TriplePattern::new(
                        PatternTerm::variable("s"),
                        PatternTerm::variable("p"),
                        PatternTerm::variable("o"),
                    ),
                    offset: 42,
                }),
                variables: vec!["s".to_owned()],
            },
        }
    }

    #[test]
    fn token_round_trip() {
        let plan = sample_plan();
        let token = encode_saved_plan(&plan).unwrap();
        let decoded = decode_saved_plan(&token).unwrap();
        assert_eq!(decoded, plan);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = encode_saved_plan(&sample_plan()).unwrap();
        // Corrupting the version prefix must always be caught.
        let mut broken = token.clone().into_bytes();
        broken[0] = if broken[0] == b'A' { b'B' } else { b'A' };
        let broken = String::from_utf8(broken).unwrap();
        assert!(decode_saved_plan(&broken).is_err());
        // So must cutting the token short.
        let truncated = &token[..token.len() / 2];
        assert!(decode_saved_plan(truncated).is_err());
    }

    #[test]
    fn future_version_is_rejected() {
        let mut bytes = (PLAN_FORMAT_VERSION + 1).to_le_bytes().to_vec();
        bytes.extend_from_slice(&bincode::serialize(&sample_plan()).unwrap());
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let error = decode_saved_plan(&token).unwrap_err();
        assert!(error.to_string().contains("version"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_saved_plan("definitely-not-a-token!").is_err());
        assert!(decode_saved_plan("").is_err());
    }
}
