// cost.rs — Work, code, and data estimates for (fused) subgraphs
//
// A `FusionInfo` describes a subgraph as if it ran sequentially on one tile
// for one steady state of the root. Leaf infos come from `CostModel`;
// container infos are folds of their members plus splitter/joiner overhead.
//
// Preconditions: multiplicities come from `flow::steady_state`.
// Postconditions: `code` of a leaf never exceeds the code cache; a leaf whose
//                 estimate did exceed it carries `oversized = true`, and any
//                 fold containing it stays oversized.
// Failure modes: none (feasibility is decided by `CostModel::fits`); sums
//                and products saturate at `u64::MAX` instead of wrapping.
// Side effects: none.

use serde::{Deserialize, Serialize};

use crate::config::TargetConfig;
use crate::flow::SteadyState;
use crate::id::NodeId;
use crate::stream::Filter;

/// How instruction-code estimates combine when subgraphs are fused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSizePolicy {
    /// Every fused filter keeps its own code.
    #[default]
    Sum,
    /// Fused filters share code; the largest one dominates.
    Max,
}

impl CodeSizePolicy {
    pub fn combine(self, a: u64, b: u64) -> u64 {
        match self {
            CodeSizePolicy::Sum => a.saturating_add(b),
            CodeSizePolicy::Max => a.max(b),
        }
    }

    pub fn fold(self, codes: impl IntoIterator<Item = u64>) -> u64 {
        codes.into_iter().fold(0, |acc, c| self.combine(acc, c))
    }
}

/// Aggregate metrics of a subgraph collapsed onto one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FusionInfo {
    /// Scheduling cost, including I/O penalties and splitter/joiner work.
    pub work: u64,
    /// Work without I/O penalties.
    pub raw_work: u64,
    pub code: u64,
    /// Some member's own code estimate exceeds the code cache.
    pub oversized: bool,
    pub data: u64,
    pub pop: u64,
    pub peek: u64,
    pub push: u64,
    pub in_bytes: u32,
    pub out_bytes: u32,
}

impl FusionInfo {
    pub fn peeks(&self) -> bool {
        self.peek > self.pop
    }

    /// Fuse `next` downstream of `self`.
    pub fn then(self, next: FusionInfo, policy: CodeSizePolicy) -> FusionInfo {
        FusionInfo {
            work: self.work.saturating_add(next.work),
            raw_work: self.raw_work.saturating_add(next.raw_work),
            code: policy.combine(self.code, next.code),
            oversized: self.oversized || next.oversized,
            data: self.data.saturating_add(next.data),
            pop: self.pop,
            peek: self.peek,
            push: next.push,
            in_bytes: self.in_bytes,
            out_bytes: next.out_bytes,
        }
    }

    /// Fuse `other` as a sibling branch of `self`.
    pub fn alongside(self, other: FusionInfo, policy: CodeSizePolicy) -> FusionInfo {
        FusionInfo {
            work: self.work.saturating_add(other.work),
            raw_work: self.raw_work.saturating_add(other.raw_work),
            code: policy.combine(self.code, other.code),
            oversized: self.oversized || other.oversized,
            data: self.data.saturating_add(other.data),
            pop: self.pop.saturating_add(other.pop),
            peek: self.peek.saturating_add(other.peek),
            push: self.push.saturating_add(other.push),
            in_bytes: self.in_bytes,
            out_bytes: self.out_bytes,
        }
    }

    /// Add splitter/joiner work hosted on the same tile.
    pub fn with_overhead(mut self, overhead: u64) -> FusionInfo {
        self.work = self.work.saturating_add(overhead);
        self.raw_work = self.raw_work.saturating_add(overhead);
        self
    }
}

/// Shared, immutable cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostModel {
    pub code_cache_size: u64,
    pub io_penalty: u64,
    pub splitter_item_work: u64,
    pub joiner_item_work: u64,
    pub policy: CodeSizePolicy,
}

impl CostModel {
    pub fn new(config: &TargetConfig) -> Self {
        CostModel {
            code_cache_size: config.code_cache_size,
            io_penalty: config.io_penalty,
            splitter_item_work: config.splitter_item_work,
            joiner_item_work: config.joiner_item_work,
            policy: config.code_policy,
        }
    }

    /// Cost of `filter` firing `multiplicity` times per steady state.
    pub fn filter_info(&self, filter: &Filter, multiplicity: u64) -> FusionInfo {
        let raw_work = multiplicity.saturating_mul(filter.work);
        let penalty = if filter.io { self.io_penalty } else { 0 };
        let pop = multiplicity.saturating_mul(filter.pop as u64);
        let peek = pop.saturating_add(filter.peek.saturating_sub(filter.pop) as u64);
        FusionInfo {
            work: raw_work.saturating_add(penalty),
            raw_work,
            code: filter.code.min(self.code_cache_size),
            oversized: filter.code > self.code_cache_size,
            data: filter
                .data
                .saturating_add(peek.saturating_mul(filter.in_bytes as u64)),
            pop,
            peek,
            push: multiplicity.saturating_mul(filter.push as u64),
            in_bytes: filter.in_bytes,
            out_bytes: filter.out_bytes,
        }
    }

    /// Splitter plus joiner work of the container `id` per steady state.
    pub fn host_overhead(&self, steady: &SteadyState, id: NodeId) -> u64 {
        steady
            .split_items(id)
            .saturating_mul(self.splitter_item_work)
            .saturating_add(steady.join_items(id).saturating_mul(self.joiner_item_work))
    }

    /// Whether a fused subgraph fits one tile. A code figure sitting at the
    /// cache limit may be a clamp, so the oversized flag is checked as well.
    pub fn fits(&self, info: &FusionInfo) -> bool {
        !info.oversized && info.code <= self.code_cache_size
    }
}
