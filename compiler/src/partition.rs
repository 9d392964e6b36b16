// partition.rs — Partitioner driver: feasibility checks, DP, traceback
//
// Builds the configuration tree for a numbered stream graph, forces the
// memoized cost table for the tile budget, and replays the winning plan into
// an ordered list of `PartitionRecord`s.
//
// Preconditions: `steady` was solved for `graph`; `config` is validated.
// Postconditions: every filter is in exactly one partition; partition count
//                 ≤ tile budget; the largest partition work equals the DP
//                 bottleneck (checked by `verify_partitions`).
// Failure modes: `Error::OversizedLeaf` (checked before the DP),
//                `Error::InfeasibleBudget` (root needs more tiles than the
//                budget; reports the deepest offending subtree and the
//                enclosing subtrees that are over budget with it).
// Side effects: none. Identical inputs yield identical records.

use std::collections::BTreeMap;

use log::info;
use serde::Serialize;

use crate::config::TargetConfig;
use crate::cost::{CodeSizePolicy, CostModel, FusionInfo};
use crate::ctree::{CConfig, CCost};
use crate::error::{Error, Result};
use crate::flow::{steady_state, SteadyState};
use crate::id::NodeId;
use crate::stream::{Filter, StreamGraph, StreamNode, Vertex};

// ── Records ─────────────────────────────────────────────────────────────────

/// Filters (and splitter/joiner hosts) assigned to one tile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionRecord {
    pub index: usize,
    /// Member filters in assignment order.
    pub filters: Vec<NodeId>,
    pub names: Vec<String>,
    /// Split-joins and feedback loops whose splitter and joiner run here.
    pub hosted: Vec<NodeId>,
    pub work: u64,
    pub code: u64,
    pub data: u64,
}

impl PartitionRecord {
    pub fn new(index: usize) -> Self {
        PartitionRecord {
            index,
            ..PartitionRecord::default()
        }
    }

    pub fn add_filter(&mut self, filter: &Filter, info: &FusionInfo, policy: CodeSizePolicy) {
        self.filters.push(filter.id);
        self.names.push(filter.name.clone());
        self.work = self.work.saturating_add(info.work);
        self.code = policy.combine(self.code, info.code);
        self.data = self.data.saturating_add(info.data);
    }

    pub fn host(&mut self, container: NodeId, overhead: u64) {
        self.hosted.push(container);
        self.work = self.work.saturating_add(overhead);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.hosted.is_empty()
    }
}

/// Outcome of one partitioning run.
#[derive(Debug, Clone)]
pub struct PartitionResult {
    pub partitions: Vec<PartitionRecord>,
    pub cost: CCost,
    pub min_tiles: usize,
    pub budget: usize,
    /// The graph with every fused group collapsed into one filter.
    pub rewritten: StreamNode,
    owner: BTreeMap<NodeId, usize>,
}

impl PartitionResult {
    pub fn bottleneck(&self) -> u64 {
        self.cost.bottleneck
    }

    pub fn tiles_used(&self) -> usize {
        self.partitions.len()
    }

    /// Partition holding filter or host `id`.
    pub fn partition_of(&self, id: NodeId) -> Option<usize> {
        self.owner.get(&id).copied()
    }

    /// Partition a channel endpoint runs on. Splitters and joiners run with
    /// the partition hosting their container.
    pub fn partition_of_vertex(&self, vertex: Vertex) -> Option<usize> {
        match vertex {
            Vertex::Filter(id) | Vertex::Splitter(id) | Vertex::Joiner(id) => self.partition_of(id),
        }
    }
}

// ── Driver ──────────────────────────────────────────────────────────────────

/// Partition `graph` onto at most `config.tile_budget()` tiles.
pub fn partition(graph: &StreamGraph, config: &TargetConfig) -> Result<PartitionResult> {
    let steady = steady_state(graph)?;
    partition_with(graph, &steady, config)
}

/// Same as `partition` with a precomputed steady state.
pub fn partition_with(
    graph: &StreamGraph,
    steady: &SteadyState,
    config: &TargetConfig,
) -> Result<PartitionResult> {
    partition_with_model(graph, steady, &CostModel::new(config), config.tile_budget())
}

/// Partition onto at most `budget` tiles under an already built cost model.
pub fn partition_with_model(
    graph: &StreamGraph,
    steady: &SteadyState,
    model: &CostModel,
    budget: usize,
) -> Result<PartitionResult> {
    check_leaf_sizes(graph, model)?;

    let tree = CConfig::build(graph.root(), steady, model);
    let min_tiles = tree.min_tiles();
    if min_tiles > budget {
        let path = tree.over_budget_path(budget);
        let culprit = path.last().copied().unwrap_or(&tree);
        let within = path[..path.len().saturating_sub(1)]
            .iter()
            .map(|c| format!("{} needs at least {} tiles", c.node().describe(), c.min_tiles()))
            .collect();
        return Err(Error::InfeasibleBudget {
            subtree: culprit.node().describe(),
            min_tiles: culprit.min_tiles(),
            budget,
            within,
        });
    }

    let cost = tree.cost(budget);
    let mut partitions = Vec::new();
    let mut current = PartitionRecord::new(0);
    let rewritten = tree.traceback(budget, &mut partitions, &mut current)?;
    current.index = partitions.len();
    partitions.push(current);

    let mut owner = BTreeMap::new();
    for record in &partitions {
        for &id in record.filters.iter().chain(&record.hosted) {
            owner.insert(id, record.index);
        }
    }

    info!(
        "partition: {} filters onto {} of {} tiles, bottleneck {}",
        graph.filter_count(),
        partitions.len(),
        budget,
        cost.bottleneck
    );
    Ok(PartitionResult {
        partitions,
        cost,
        min_tiles,
        budget,
        rewritten,
        owner,
    })
}

/// A single filter larger than a tile can never be placed, whatever the
/// budget.
fn check_leaf_sizes(graph: &StreamGraph, model: &CostModel) -> Result<()> {
    for filter in graph.filters() {
        if filter.code > model.code_cache_size {
            return Err(Error::OversizedLeaf {
                filter: filter.name.clone(),
                code: filter.code,
                limit: model.code_cache_size,
            });
        }
    }
    Ok(())
}

// ── Verification ────────────────────────────────────────────────────────────

/// Machine-checkable evidence for partition postconditions (P1-P4).
#[derive(Debug, Clone)]
pub struct PartitionCert {
    /// P1: Every filter is assigned to exactly one partition.
    pub p1_each_filter_once: bool,
    /// P2: Partition count is within the tile budget.
    pub p2_within_budget: bool,
    /// P3: The largest partition work equals the DP bottleneck.
    pub p3_bottleneck_matches: bool,
    /// P4: Every partition's code fits the code cache.
    pub p4_code_fits: bool,
}

impl crate::pass::StageCert for PartitionCert {
    fn all_pass(&self) -> bool {
        self.p1_each_filter_once
            && self.p2_within_budget
            && self.p3_bottleneck_matches
            && self.p4_code_fits
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("P1_each_filter_once", self.p1_each_filter_once),
            ("P2_within_budget", self.p2_within_budget),
            ("P3_bottleneck_matches", self.p3_bottleneck_matches),
            ("P4_code_fits", self.p4_code_fits),
        ]
    }
}

pub fn verify_partitions(
    graph: &StreamGraph,
    result: &PartitionResult,
    config: &TargetConfig,
) -> PartitionCert {
    let mut assigned: Vec<NodeId> = result
        .partitions
        .iter()
        .flat_map(|p| p.filters.iter().copied())
        .collect();
    assigned.sort();
    let mut expected: Vec<NodeId> = graph.filters().iter().map(|f| f.id).collect();
    expected.sort();

    let max_work = result.partitions.iter().map(|p| p.work).max().unwrap_or(0);
    PartitionCert {
        p1_each_filter_once: assigned == expected,
        p2_within_budget: result.partitions.len() <= result.budget,
        p3_bottleneck_matches: max_work == result.cost.bottleneck,
        p4_code_fits: result
            .partitions
            .iter()
            .all(|p| p.code <= config.code_cache_size),
    }
}
