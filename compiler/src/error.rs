// error.rs — Crate-wide error type
//
// Every failure in the partitioning and routing passes is unrecoverable
// locally and propagates to the driver as one `Error`. Each variant carries
// enough identity (subtree, filter, tile) to diagnose the failure and maps to
// a stable diagnostic code.

use thiserror::Error;

use crate::diag::{codes, DiagCode, DiagLevel, Diagnostic};
use crate::id::TileId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The tile budget is below the minimum tile count of a subtree.
    #[error("{subtree} needs at least {min_tiles} tiles but the budget is {budget}")]
    InfeasibleBudget {
        subtree: String,
        min_tiles: usize,
        budget: usize,
        /// Enclosing subtrees over budget with it, outermost first.
        within: Vec<String>,
    },

    /// A single filter's code does not fit in one tile's instruction store.
    #[error("filter '{filter}' needs {code} code units but a tile holds {limit}")]
    OversizedLeaf {
        filter: String,
        code: u64,
        limit: u64,
    },

    /// The partitioner produced more partitions than the mesh has tiles.
    #[error("{partitions} partitions cannot be placed on {tiles} tiles")]
    TooManyPartitions { partitions: usize, tiles: usize },

    /// A route was given a missing or unknown endpoint.
    #[error("malformed route on tile {tile}: {detail}")]
    MalformedRoute { tile: TileId, detail: String },

    /// A direction was requested between tiles that are not neighbours.
    #[error("tiles {from} and {to} are not adjacent")]
    NotAdjacent { from: TileId, to: TileId },

    /// A splitter/joiner weight was queried for a child that does not exist.
    #[error("child index {child} is out of range for {arity} children")]
    FlowIndex { child: usize, arity: usize },

    /// Channel rates admit no finite periodic schedule.
    #[error("unbalanced rates in {node}: {detail}")]
    RateMismatch { node: String, detail: String },

    /// The stream graph violates a structural invariant.
    #[error("invalid stream graph at {node}: {detail}")]
    InvalidGraph { node: String, detail: String },

    #[error("invalid target configuration: {0}")]
    InvalidConfig(String),

    #[error("malformed JSON input: {0}")]
    Json(#[from] serde_json::Error),

    /// A pass ran without the artifacts it depends on.
    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable diagnostic code for this error.
    pub fn code(&self) -> DiagCode {
        match self {
            Error::InfeasibleBudget { .. } => codes::E0100,
            Error::OversizedLeaf { .. } => codes::E0101,
            Error::TooManyPartitions { .. } => codes::E0102,
            Error::MalformedRoute { .. } => codes::E0200,
            Error::NotAdjacent { .. } => codes::E0201,
            Error::FlowIndex { .. } => codes::E0300,
            Error::RateMismatch { .. } => codes::E0301,
            Error::InvalidGraph { .. } => codes::E0400,
            Error::InvalidConfig(_) => codes::E0401,
            Error::Json(_) => codes::E0402,
            Error::Internal(_) => codes::E0500,
        }
    }

    /// Convert into a driver-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut d = Diagnostic::new(DiagLevel::Error, self.to_string()).with_code(self.code());
        match self {
            Error::InfeasibleBudget {
                subtree, within, ..
            } => {
                d = d.with_subject(subtree.clone());
                for outer in within.iter().rev() {
                    d = d.with_cause(format!("inside {}", outer));
                }
                d = d.with_hint("raise the tile budget or the per-tile code cache size");
            }
            Error::OversizedLeaf { filter, .. } => {
                d = d
                    .with_subject(format!("filter '{}'", filter))
                    .with_hint("a filter is never split across tiles; shrink its code estimate");
            }
            Error::MalformedRoute { tile, .. } => {
                d = d.with_subject(format!("tile {}", tile));
            }
            Error::RateMismatch { node, .. } | Error::InvalidGraph { node, .. } => {
                d = d.with_subject(node.clone());
            }
            _ => {}
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infeasible_budget_diagnostic() {
        let err = Error::InfeasibleBudget {
            subtree: "pipeline 'inner'".into(),
            min_tiles: 3,
            budget: 2,
            within: vec![
                "pipeline 'top' needs at least 5 tiles".into(),
                "split_join 'sj' needs at least 4 tiles".into(),
            ],
        };
        let d = err.to_diagnostic();
        assert_eq!(d.code, Some(codes::E0100));
        assert_eq!(d.subject.as_deref(), Some("pipeline 'inner'"));
        assert!(d
            .message
            .contains("needs at least 3 tiles but the budget is 2"));
        // Innermost enclosing subtree first.
        let causes: Vec<&str> = d.cause_chain.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(
            causes,
            vec![
                "inside split_join 'sj' needs at least 4 tiles",
                "inside pipeline 'top' needs at least 5 tiles"
            ]
        );
    }

    #[test]
    fn internal_errors_have_their_own_code() {
        let d = Error::Internal("pass 'layout' ran early".into()).to_diagnostic();
        assert_eq!(d.code, Some(codes::E0500));
        assert_eq!(
            format!("{d}"),
            "error[E0500]: internal compiler error: pass 'layout' ran early"
        );
    }

    #[test]
    fn every_variant_has_distinct_code() {
        let errors = [
            Error::InfeasibleBudget {
                subtree: String::new(),
                min_tiles: 0,
                budget: 0,
                within: Vec::new(),
            },
            Error::OversizedLeaf {
                filter: String::new(),
                code: 0,
                limit: 0,
            },
            Error::TooManyPartitions {
                partitions: 0,
                tiles: 0,
            },
            Error::MalformedRoute {
                tile: TileId(0),
                detail: String::new(),
            },
            Error::NotAdjacent {
                from: TileId(0),
                to: TileId(1),
            },
            Error::FlowIndex { child: 0, arity: 0 },
            Error::RateMismatch {
                node: String::new(),
                detail: String::new(),
            },
            Error::InvalidGraph {
                node: String::new(),
                detail: String::new(),
            },
            Error::InvalidConfig(String::new()),
            Error::Internal(String::new()),
        ];
        let mut seen = std::collections::HashSet::new();
        for err in &errors {
            assert!(seen.insert(err.code()), "duplicate code for {:?}", err);
        }
    }
}
