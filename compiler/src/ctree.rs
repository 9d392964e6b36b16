// ctree.rs — Partition configuration tree: memoized DP and traceback
//
// One `CConfig` per stream node, built bottom-up. A container groups its
// children into contiguous ranges; a range is fused onto one tile, handed
// whole to a single child with a tile allowance, or split in two with the
// allowance divided between the halves. A pipeline range may also isolate
// one inner child on its own tiles and fuse the children around it onto a
// single tile. Costs are memoized per (range, allowance) and never
// recomputed.
//
// Preconditions: the steady state was solved for the same graph; no filter is
//                oversized (the driver checks before building plans).
// Postconditions: `plan(t).cost.bottleneck` is non-increasing in `t`; the
//                 traceback of a feasible plan yields one partition per
//                 leaf of the chosen split tree and assigns every filter
//                 exactly once.
// Failure modes: `Error::InfeasibleBudget` from `traceback` when asked to
//                realise an infeasible plan.
// Side effects: memo tables fill lazily (interior mutability).

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use log::{debug, trace};

use crate::cost::{CostModel, FusionInfo};
use crate::error::{Error, Result};
use crate::flow::SteadyState;
use crate::partition::PartitionRecord;
use crate::stream::{Filter, Joiner, Splitter, StreamNode};

// ── Cost ────────────────────────────────────────────────────────────────────

/// Cost of a subtree under some tile allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CCost {
    /// Largest per-tile work.
    pub bottleneck: u64,
    /// Work of the first partition (where an enclosing splitter lands).
    pub first: u64,
    /// Aggregate code over all partitions.
    pub code: u64,
    /// Aggregate data over all partitions.
    pub data: u64,
    pub tiles: usize,
}

impl CCost {
    pub const INFEASIBLE: CCost = CCost {
        bottleneck: u64::MAX,
        first: u64::MAX,
        code: u64::MAX,
        data: u64::MAX,
        tiles: usize::MAX,
    };

    /// Everything on one tile.
    pub fn single(info: &FusionInfo) -> CCost {
        CCost {
            bottleneck: info.work,
            first: info.work,
            code: info.code,
            data: info.data,
            tiles: 1,
        }
    }

    /// `self` on some tiles followed by `right` on disjoint tiles.
    pub fn combine(self, right: CCost) -> CCost {
        CCost {
            bottleneck: self.bottleneck.max(right.bottleneck),
            first: self.first,
            code: self.code.saturating_add(right.code),
            data: self.data.saturating_add(right.data),
            tiles: self.tiles + right.tiles,
        }
    }

    /// Charge splitter/joiner work to the first partition.
    pub fn with_overhead(self, overhead: u64) -> CCost {
        let first = self.first.saturating_add(overhead);
        CCost {
            bottleneck: self.bottleneck.max(first),
            first,
            ..self
        }
    }

    /// Saturated work still counts as feasible; only the sentinel does not.
    pub fn is_feasible(&self) -> bool {
        self.tiles != usize::MAX
    }
}

impl Ord for CCost {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.bottleneck, self.code, self.tiles, self.first, self.data).cmp(&(
            other.bottleneck,
            other.code,
            other.tiles,
            other.first,
            other.data,
        ))
    }
}

impl PartialOrd for CCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// How a range of children is realised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// The whole range on one tile.
    Fuse,
    /// A single child planned with the full allowance.
    Whole,
    /// Children `..=at` get `left_tiles`, the rest get the remainder.
    Split { at: usize, left_tiles: usize },
    /// Child `at` gets all but one tile; the rest of the range shares the
    /// remaining tile.
    Isolate { at: usize },
    Infeasible,
}

/// A memoized decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub cost: CCost,
    pub choice: Choice,
    /// Tile allowance the choice was made for (may be below the queried
    /// limit when fewer tiles are at least as good).
    pub allowance: usize,
}

impl Plan {
    const INFEASIBLE: Plan = Plan {
        cost: CCost::INFEASIBLE,
        choice: Choice::Infeasible,
        allowance: 0,
    };
}

// ── Configuration nodes ─────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CFilter<'g> {
    node: &'g StreamNode,
    filter: &'g Filter,
    model: &'g CostModel,
    info: FusionInfo,
}

#[derive(Debug)]
pub struct CContainer<'g> {
    node: &'g StreamNode,
    model: &'g CostModel,
    children: Vec<CConfig<'g>>,
    /// Non-adjacent children may share a tile (pipelines only).
    gaps: bool,
    /// Splitter plus joiner work (zero for pipelines).
    overhead: u64,
    info: FusionInfo,
    /// `range_infos[i][j - i]`: children `i..=j` fused.
    range_infos: Vec<Vec<FusionInfo>>,
    /// `min_range[i][j - i]`: fewest tiles children `i..=j` can occupy.
    min_range: Vec<Vec<usize>>,
    ranges: RefCell<BTreeMap<(usize, usize, usize), Plan>>,
    plans: RefCell<BTreeMap<usize, Plan>>,
}

#[derive(Debug)]
pub enum CConfig<'g> {
    Filter(CFilter<'g>),
    Pipeline(CContainer<'g>),
    SplitJoin(CContainer<'g>),
    FeedbackLoop(CContainer<'g>),
}

impl<'g> CConfig<'g> {
    pub fn build(node: &'g StreamNode, steady: &SteadyState, model: &'g CostModel) -> Self {
        match node {
            StreamNode::Filter(f) => CConfig::Filter(CFilter {
                node,
                filter: f,
                model,
                info: model.filter_info(f, steady.multiplicity(f.id)),
            }),
            StreamNode::Pipeline(_) => {
                CConfig::Pipeline(CContainer::build(node, steady, model, FusionInfo::then))
            }
            StreamNode::SplitJoin(_) => {
                CConfig::SplitJoin(CContainer::build(node, steady, model, FusionInfo::alongside))
            }
            StreamNode::FeedbackLoop(_) => {
                CConfig::FeedbackLoop(CContainer::build(node, steady, model, FusionInfo::then))
            }
        }
    }

    pub fn node(&self) -> &'g StreamNode {
        match self {
            CConfig::Filter(f) => f.node,
            CConfig::Pipeline(c) | CConfig::SplitJoin(c) | CConfig::FeedbackLoop(c) => c.node,
        }
    }

    /// The subtree collapsed onto one tile.
    pub fn info(&self) -> FusionInfo {
        match self {
            CConfig::Filter(f) => f.info,
            CConfig::Pipeline(c) | CConfig::SplitJoin(c) | CConfig::FeedbackLoop(c) => c.info,
        }
    }

    pub fn min_tiles(&self) -> usize {
        match self {
            CConfig::Filter(_) => 1,
            CConfig::Pipeline(c) | CConfig::SplitJoin(c) | CConfig::FeedbackLoop(c) => {
                c.min_range(0, c.children.len() - 1)
            }
        }
    }

    /// Best plan using at most `tiles` tiles.
    pub fn plan(&self, tiles: usize) -> Plan {
        match self {
            CConfig::Filter(f) => {
                if tiles == 0 {
                    Plan::INFEASIBLE
                } else {
                    Plan {
                        cost: CCost::single(&f.info),
                        choice: Choice::Fuse,
                        allowance: 1,
                    }
                }
            }
            CConfig::Pipeline(c) | CConfig::SplitJoin(c) | CConfig::FeedbackLoop(c) => {
                c.plan(tiles)
            }
        }
    }

    pub fn cost(&self, tiles: usize) -> CCost {
        self.plan(tiles).cost
    }

    /// Nodes from here down to the deepest one whose minimum tile count
    /// still exceeds `budget`, outermost first. Empty when `budget` suffices.
    pub fn over_budget_path(&self, budget: usize) -> Vec<&CConfig<'g>> {
        let mut path = Vec::new();
        let mut node = self;
        while node.min_tiles() > budget {
            path.push(node);
            match node.children().iter().find(|c| c.min_tiles() > budget) {
                Some(child) => node = child,
                None => break,
            }
        }
        path
    }

    fn children(&self) -> &[CConfig<'g>] {
        match self {
            CConfig::Filter(_) => &[],
            CConfig::Pipeline(c) | CConfig::SplitJoin(c) | CConfig::FeedbackLoop(c) => &c.children,
        }
    }

    /// Realise `plan(tiles)`: filters join `current` or fresh partitions
    /// sealed into `partitions`. Returns the rewritten subtree in which every
    /// fused group is a single filter.
    pub fn traceback(
        &self,
        tiles: usize,
        partitions: &mut Vec<PartitionRecord>,
        current: &mut PartitionRecord,
    ) -> Result<StreamNode> {
        match self {
            CConfig::Filter(f) => {
                if tiles == 0 {
                    return Err(infeasible(f.node, 1, tiles));
                }
                current.add_filter(f.filter, &f.info, f.model.policy);
                Ok(f.node.clone())
            }
            CConfig::Pipeline(c) | CConfig::SplitJoin(c) | CConfig::FeedbackLoop(c) => {
                c.traceback(tiles, partitions, current)
            }
        }
    }

    /// Put the whole subtree into `current`.
    fn absorb(&self, current: &mut PartitionRecord) {
        match self {
            CConfig::Filter(f) => current.add_filter(f.filter, &f.info, f.model.policy),
            CConfig::Pipeline(c) | CConfig::SplitJoin(c) | CConfig::FeedbackLoop(c) => {
                c.host_into(current);
                for child in &c.children {
                    child.absorb(current);
                }
            }
        }
    }
}

fn infeasible(node: &StreamNode, min_tiles: usize, budget: usize) -> Error {
    Error::InfeasibleBudget {
        subtree: node.describe(),
        min_tiles,
        budget,
        within: Vec::new(),
    }
}

/// Close `current` and start a fresh partition.
fn seal(partitions: &mut Vec<PartitionRecord>, current: &mut PartitionRecord) {
    let mut done = std::mem::take(current);
    done.index = partitions.len();
    partitions.push(done);
}

// ── Container DP ────────────────────────────────────────────────────────────

/// A rewritten child slot standing for the children in `members`.
struct Slot {
    members: Vec<usize>,
    node: StreamNode,
}

impl<'g> CContainer<'g> {
    fn build(
        node: &'g StreamNode,
        steady: &SteadyState,
        model: &'g CostModel,
        fuse: fn(FusionInfo, FusionInfo, crate::cost::CodeSizePolicy) -> FusionInfo,
    ) -> Self {
        let children: Vec<CConfig<'g>> = node
            .children()
            .into_iter()
            .map(|c| CConfig::build(c, steady, model))
            .collect();
        let n = children.len();

        let mut range_infos = Vec::with_capacity(n);
        for i in 0..n {
            let mut row = Vec::with_capacity(n - i);
            let mut acc = children[i].info();
            row.push(acc);
            for child in &children[i + 1..] {
                acc = fuse(acc, child.info(), model.policy);
                row.push(acc);
            }
            range_infos.push(row);
        }

        let gaps = matches!(node, StreamNode::Pipeline(_));

        // Shorter ranges first so every split reads finished entries.
        let mut min_range: Vec<Vec<usize>> = (0..n).map(|i| vec![usize::MAX; n - i]).collect();
        for len in 1..=n {
            for i in 0..=n - len {
                let j = i + len - 1;
                let value = if model.fits(&range_infos[i][j - i]) {
                    1
                } else if i == j {
                    children[i].min_tiles()
                } else {
                    let split = (i..j)
                        .map(|at| min_range[i][at - i].saturating_add(min_range[at + 1][j - at - 1]))
                        .min()
                        .unwrap_or(usize::MAX);
                    let isolate = (i + 1..j)
                        .filter(|_| gaps)
                        .filter(|&at| {
                            let rest = range_infos[i][at - 1 - i]
                                .then(range_infos[at + 1][j - at - 1], model.policy);
                            model.fits(&rest)
                        })
                        .map(|at| 1 + children[at].min_tiles())
                        .min()
                        .unwrap_or(usize::MAX);
                    split.min(isolate)
                };
                min_range[i][j - i] = value;
            }
        }

        let overhead = match node {
            StreamNode::SplitJoin(_) | StreamNode::FeedbackLoop(_) => {
                model.host_overhead(steady, node.id())
            }
            _ => 0,
        };
        let boundary = steady.boundary(node.id());
        let mut info = range_infos
            .first()
            .and_then(|row| row.last())
            .copied()
            .unwrap_or_default()
            .with_overhead(overhead);
        info.pop = steady.items_in(node.id());
        info.peek = info.pop + (boundary.peek - boundary.pop);
        info.push = steady.items_out(node.id());

        CContainer {
            node,
            model,
            children,
            gaps,
            overhead,
            info,
            range_infos,
            min_range,
            ranges: RefCell::new(BTreeMap::new()),
            plans: RefCell::new(BTreeMap::new()),
        }
    }

    fn range_info(&self, i: usize, j: usize) -> FusionInfo {
        self.range_infos[i][j - i]
    }

    fn min_range(&self, i: usize, j: usize) -> usize {
        self.min_range[i][j - i]
    }

    /// Children `i..=j` except `at`, fused; `at` lies strictly inside.
    fn rest_info(&self, i: usize, at: usize, j: usize) -> FusionInfo {
        self.range_info(i, at - 1)
            .then(self.range_info(at + 1, j), self.model.policy)
    }

    fn is_host(&self) -> bool {
        matches!(self.node, StreamNode::SplitJoin(_) | StreamNode::FeedbackLoop(_))
    }

    fn host_into(&self, current: &mut PartitionRecord) {
        if self.is_host() {
            current.host(self.node.id(), self.overhead);
        }
    }

    /// Best plan for the whole container, splitter/joiner work included.
    fn plan(&self, tiles: usize) -> Plan {
        if let Some(plan) = self.plans.borrow().get(&tiles).copied() {
            return plan;
        }
        let last = self.children.len() - 1;
        let mut plan = self.best_plan(0, last, tiles, self.overhead);
        if tiles > 1 {
            let fewer = self.plan(tiles - 1);
            if fewer.cost < plan.cost {
                plan = fewer;
            }
        }
        debug!(
            "{}: {} tiles -> bottleneck {} on {} tiles ({:?})",
            self.node.describe(),
            tiles,
            plan.cost.bottleneck,
            plan.cost.tiles,
            plan.choice
        );
        self.plans.borrow_mut().insert(tiles, plan);
        plan
    }

    /// Best plan for children `i..=j` with no splitter/joiner work.
    fn range_plan(&self, i: usize, j: usize, tiles: usize) -> Plan {
        let key = (i, j, tiles);
        if let Some(plan) = self.ranges.borrow().get(&key).copied() {
            return plan;
        }
        let mut plan = self.best_plan(i, j, tiles, 0);
        if tiles > 1 {
            let fewer = self.range_plan(i, j, tiles - 1);
            if fewer.cost < plan.cost {
                plan = fewer;
            }
        }
        self.ranges.borrow_mut().insert(key, plan);
        plan
    }

    /// Candidates in fixed order: fuse, whole child, split points left to
    /// right with ascending left allowances, then isolated inner children
    /// left to right. Only a strictly cheaper candidate replaces the
    /// incumbent.
    fn best_plan(&self, i: usize, j: usize, tiles: usize, overhead: u64) -> Plan {
        let mut best = Plan::INFEASIBLE;
        if tiles == 0 || tiles < self.min_range(i, j) {
            return best;
        }
        let mut consider = |cost: CCost, choice: Choice| {
            let cost = cost.with_overhead(overhead);
            trace!(
                "{} [{}..={}] x{}: {:?} -> {}",
                self.node.describe(),
                i,
                j,
                tiles,
                choice,
                cost.bottleneck
            );
            if cost < best.cost {
                best = Plan {
                    cost,
                    choice,
                    allowance: tiles,
                };
            }
        };

        let fused = self.range_info(i, j);
        if self.model.fits(&fused) {
            consider(CCost::single(&fused), Choice::Fuse);
        }
        if i == j {
            let child = &self.children[i];
            if tiles >= child.min_tiles() {
                let plan = child.plan(tiles);
                if plan.cost.is_feasible() {
                    consider(plan.cost, Choice::Whole);
                }
            }
        }
        for at in i..j {
            let left_min = self.min_range(i, at);
            let right_min = self.min_range(at + 1, j);
            for left_tiles in left_min.max(1)..tiles {
                let right_tiles = tiles - left_tiles;
                if right_tiles < right_min {
                    break;
                }
                let left = self.range_plan(i, at, left_tiles);
                let right = self.range_plan(at + 1, j, right_tiles);
                if left.cost.is_feasible() && right.cost.is_feasible() {
                    consider(
                        left.cost.combine(right.cost),
                        Choice::Split { at, left_tiles },
                    );
                }
            }
        }
        if self.gaps {
            for at in i + 1..j {
                let rest = self.rest_info(i, at, j);
                let child = &self.children[at];
                if !self.model.fits(&rest) || tiles <= child.min_tiles() {
                    continue;
                }
                let plan = child.plan(tiles - 1);
                if plan.cost.is_feasible() {
                    consider(
                        CCost::single(&rest).combine(plan.cost),
                        Choice::Isolate { at },
                    );
                }
            }
        }
        best
    }

    // ── Traceback ───────────────────────────────────────────────────────

    fn traceback(
        &self,
        tiles: usize,
        partitions: &mut Vec<PartitionRecord>,
        current: &mut PartitionRecord,
    ) -> Result<StreamNode> {
        let plan = self.plan(tiles);
        let last = self.children.len() - 1;
        if plan.choice == Choice::Infeasible {
            return Err(infeasible(self.node, self.min_range(0, last), tiles));
        }
        debug!(
            "traceback {} with {} tiles: {:?}",
            self.node.describe(),
            plan.allowance,
            plan.choice
        );
        self.host_into(current);

        if plan.choice == Choice::Fuse {
            for child in &self.children {
                child.absorb(current);
            }
            let all: Vec<usize> = (0..=last).collect();
            return Ok(self.fused_node(&all, self.info));
        }

        let slots = self.trace_range(0, last, plan, partitions, current)?;
        Ok(self.rebuild(slots))
    }

    fn trace_range(
        &self,
        i: usize,
        j: usize,
        plan: Plan,
        partitions: &mut Vec<PartitionRecord>,
        current: &mut PartitionRecord,
    ) -> Result<Vec<Slot>> {
        match plan.choice {
            Choice::Fuse => {
                for child in &self.children[i..=j] {
                    child.absorb(current);
                }
                let members: Vec<usize> = (i..=j).collect();
                let node = self.fused_node(&members, self.range_info(i, j));
                Ok(vec![Slot { members, node }])
            }
            Choice::Whole => {
                let node = self.children[i].traceback(plan.allowance, partitions, current)?;
                Ok(vec![Slot {
                    members: vec![i],
                    node,
                }])
            }
            Choice::Split { at, left_tiles } => {
                let left_plan = self.range_plan(i, at, left_tiles);
                let mut slots = self.trace_range(i, at, left_plan, partitions, current)?;
                seal(partitions, current);
                let right_plan = self.range_plan(at + 1, j, plan.allowance - left_tiles);
                slots.extend(self.trace_range(at + 1, j, right_plan, partitions, current)?);
                Ok(slots)
            }
            Choice::Isolate { at } => {
                let members: Vec<usize> = (i..=j).filter(|&k| k != at).collect();
                for &k in &members {
                    self.children[k].absorb(current);
                }
                let rest = self.fused_node(&members, self.rest_info(i, at, j));
                seal(partitions, current);
                let node = self.children[at].traceback(plan.allowance - 1, partitions, current)?;
                Ok(vec![
                    Slot {
                        members,
                        node: rest,
                    },
                    Slot {
                        members: vec![at],
                        node,
                    },
                ])
            }
            Choice::Infeasible => Err(infeasible(self.node, self.min_range(i, j), plan.allowance)),
        }
    }

    /// One filter standing for the children in `members` fused together
    /// with cost `info`. A lone filter child stays as it is.
    fn fused_node(&self, members: &[usize], info: FusionInfo) -> StreamNode {
        if let [k] = members {
            if let CConfig::Filter(f) = &self.children[*k] {
                return StreamNode::Filter(f.filter.clone());
            }
        }
        let members: Vec<&Filter> = members
            .iter()
            .flat_map(|&k| self.children[k].node().filters())
            .collect();
        let names: Vec<&str> = members.iter().map(|f| f.name.as_str()).collect();
        let clamp = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
        StreamNode::Filter(Filter {
            id: members.first().map(|f| f.id).unwrap_or_default(),
            name: format!("fused({})", names.join(",")),
            pop: clamp(info.pop),
            peek: clamp(info.peek),
            push: clamp(info.push),
            work: info.raw_work,
            code: info.code,
            data: info.data,
            io: members.iter().any(|f| f.io),
            in_bytes: info.in_bytes,
            out_bytes: info.out_bytes,
        })
    }

    /// The container with its children replaced by the traced slots. A
    /// group of non-adjacent pipeline stages sits where its first member was.
    fn rebuild(&self, slots: Vec<Slot>) -> StreamNode {
        let groups: Vec<Vec<usize>> = slots.iter().map(|s| s.members.clone()).collect();
        let mut nodes: Vec<StreamNode> = slots.into_iter().map(|s| s.node).collect();
        match self.node {
            StreamNode::Pipeline(p) => StreamNode::Pipeline(crate::stream::Pipeline {
                id: p.id,
                name: p.name.clone(),
                children: nodes,
            }),
            StreamNode::SplitJoin(s) => StreamNode::SplitJoin(crate::stream::SplitJoin {
                id: s.id,
                name: s.name.clone(),
                splitter: regroup_splitter(&s.splitter, &groups),
                branches: nodes,
                joiner: regroup_joiner(&s.joiner, &groups),
            }),
            StreamNode::FeedbackLoop(l) if nodes.len() == 2 => {
                let loop_path = nodes.pop().map(Box::new).unwrap_or_else(|| l.loop_path.clone());
                let body = nodes.pop().map(Box::new).unwrap_or_else(|| l.body.clone());
                StreamNode::FeedbackLoop(crate::stream::FeedbackLoop {
                    id: l.id,
                    name: l.name.clone(),
                    joiner: l.joiner.clone(),
                    body,
                    splitter: l.splitter.clone(),
                    loop_path,
                    delay: l.delay,
                })
            }
            _ => nodes.pop().unwrap_or_else(|| {
                let all: Vec<usize> = (0..self.children.len()).collect();
                self.fused_node(&all, self.info)
            }),
        }
    }
}

fn regroup(phases: &[Vec<u32>], groups: &[Vec<usize>]) -> Vec<Vec<u32>> {
    phases
        .iter()
        .map(|weights| {
            groups
                .iter()
                .map(|members| members.iter().map(|&k| weights[k]).sum())
                .collect()
        })
        .collect()
}

/// Merge the weights of branches that were fused into one group.
fn regroup_splitter(splitter: &Splitter, groups: &[Vec<usize>]) -> Splitter {
    match splitter {
        Splitter::RoundRobin { phases } => Splitter::RoundRobin {
            phases: regroup(phases, groups),
        },
        other => other.clone(),
    }
}

fn regroup_joiner(joiner: &Joiner, groups: &[Vec<usize>]) -> Joiner {
    match joiner {
        Joiner::RoundRobin { phases } => Joiner::RoundRobin {
            phases: regroup(phases, groups),
        },
        Joiner::Null => Joiner::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;
    use crate::flow::steady_state;
    use crate::stream::{Filter, StreamGraph};

    fn pipeline(works: &[u64]) -> StreamGraph {
        let children = works
            .iter()
            .enumerate()
            .map(|(i, &w)| Filter::new(format!("f{}", i), 1, 1, w).into())
            .collect();
        StreamGraph::new(StreamNode::pipeline("p", children)).unwrap()
    }

    fn with_tree<R>(graph: &StreamGraph, config: &TargetConfig, f: impl FnOnce(&CConfig) -> R) -> R {
        let steady = steady_state(graph).unwrap();
        let model = CostModel::new(config);
        let tree = CConfig::build(graph.root(), &steady, &model);
        f(&tree)
    }

    #[test]
    fn ccost_order_breaks_ties_on_code_then_tiles() {
        let a = CCost {
            bottleneck: 10,
            first: 10,
            code: 5,
            data: 0,
            tiles: 2,
        };
        let b = CCost { code: 6, ..a };
        let c = CCost { tiles: 1, ..a };
        assert!(a < b);
        assert!(c < a);
        assert!(a < CCost::INFEASIBLE);
    }

    #[test]
    fn overhead_lands_on_first_partition() {
        let left = CCost {
            bottleneck: 10,
            first: 10,
            code: 1,
            data: 0,
            tiles: 1,
        };
        let right = CCost { bottleneck: 30, first: 30, ..left };
        let both = left.combine(right).with_overhead(25);
        assert_eq!(both.first, 35);
        assert_eq!(both.bottleneck, 35);
        assert_eq!(both.tiles, 2);
    }

    #[test]
    fn single_tile_fuses_everything() {
        let graph = pipeline(&[10, 40, 10]);
        with_tree(&graph, &TargetConfig::default(), |tree| {
            let plan = tree.plan(1);
            assert_eq!(plan.choice, Choice::Fuse);
            assert_eq!(plan.cost.bottleneck, 60);
            assert_eq!(tree.min_tiles(), 1);
        });
    }

    #[test]
    fn outer_stages_share_a_tile() {
        let graph = pipeline(&[10, 40, 10]);
        with_tree(&graph, &TargetConfig::default(), |tree| {
            let plan = tree.plan(2);
            assert_eq!(plan.choice, Choice::Isolate { at: 1 });
            assert_eq!(plan.cost.bottleneck, 40);
            assert_eq!(plan.cost.first, 20);
            // A third tile matches the bottleneck but loses on tile count.
            assert_eq!(tree.cost(3).bottleneck, 40);
            assert_eq!(tree.cost(3).tiles, 2);
            assert_eq!(tree.cost(8), tree.cost(3));
        });
    }

    #[test]
    fn isolation_needs_the_rest_to_fit() {
        // f0 + f2 need 32 code units; a 24-unit cache rules out isolating f1.
        let graph = pipeline(&[10, 40, 10]);
        let config = TargetConfig::default().with_code_cache(24);
        with_tree(&graph, &config, |tree| {
            assert_eq!(tree.min_tiles(), 3);
            let plan = tree.plan(3);
            assert!(matches!(plan.choice, Choice::Split { .. }));
            assert_eq!(plan.cost.tiles, 3);
        });
    }

    #[test]
    fn isolation_lowers_min_tiles() {
        // The inner pipeline cannot fuse and its neighbours cannot join it,
        // but the neighbours fit together around it.
        let inner = StreamNode::pipeline(
            "inner",
            vec![
                Filter::new("a", 1, 1, 1).with_code(60).into(),
                Filter::new("b", 1, 1, 1).with_code(60).into(),
            ],
        );
        let graph = StreamGraph::new(StreamNode::pipeline(
            "outer",
            vec![
                Filter::new("src", 1, 1, 1).with_code(45).into(),
                inner,
                Filter::new("snk", 1, 1, 1).with_code(45).into(),
            ],
        ))
        .unwrap();
        let config = TargetConfig::default().with_code_cache(100);
        with_tree(&graph, &config, |tree| {
            assert_eq!(tree.min_tiles(), 3);
            assert_eq!(tree.plan(3).choice, Choice::Isolate { at: 1 });
        });
    }

    #[test]
    fn split_join_branches_stay_contiguous() {
        let graph = StreamGraph::new(StreamNode::split_join(
            "sj",
            Splitter::uniform(3),
            vec![
                Filter::new("a", 1, 1, 10).into(),
                Filter::new("b", 1, 1, 40).into(),
                Filter::new("c", 1, 1, 10).into(),
            ],
            Joiner::uniform(3),
        ))
        .unwrap();
        let config = TargetConfig::default().with_overheads(0, 0);
        with_tree(&graph, &config, |tree| {
            assert_eq!(tree.cost(2).bottleneck, 50);
        });
    }

    #[test]
    fn code_cache_forces_min_tiles() {
        let graph = pipeline(&[1, 1, 1, 1]);
        let config = TargetConfig::default().with_code_cache(40);
        with_tree(&graph, &config, |tree| {
            // 16 code units each: two fit per tile.
            assert_eq!(tree.min_tiles(), 2);
            assert!(!tree.plan(1).cost.is_feasible());
            assert!(tree.plan(2).cost.is_feasible());
            let path = tree.over_budget_path(1);
            assert_eq!(path.len(), 1);
            assert_eq!(path[0].node().name(), "p");
            assert!(tree.over_budget_path(2).is_empty());
        });
    }

    #[test]
    fn traceback_rewrites_fused_groups() {
        let graph = pipeline(&[10, 40, 10]);
        with_tree(&graph, &TargetConfig::default(), |tree| {
            let mut partitions = Vec::new();
            let mut current = PartitionRecord::default();
            let rewritten = tree.traceback(2, &mut partitions, &mut current).unwrap();
            seal(&mut partitions, &mut current);
            assert_eq!(partitions.len(), 2);
            assert_eq!(partitions[0].names, vec!["f0", "f2"]);
            assert_eq!(partitions[1].names, vec!["f1"]);
            let names: Vec<String> = rewritten.filters().iter().map(|f| f.name.clone()).collect();
            assert_eq!(names, vec!["fused(f0,f2)", "f1"]);
        });
    }

    #[test]
    fn split_join_groups_sum_weights() {
        let graph = StreamGraph::new(StreamNode::split_join(
            "sj",
            Splitter::round_robin(vec![1, 2, 3]),
            vec![
                Filter::new("a", 1, 1, 50).into(),
                Filter::new("b", 2, 2, 5).into(),
                Filter::new("c", 3, 3, 5).into(),
            ],
            Joiner::round_robin(vec![1, 2, 3]),
        ))
        .unwrap();
        let config = TargetConfig::default().with_overheads(0, 0);
        with_tree(&graph, &config, |tree| {
            let mut partitions = Vec::new();
            let mut current = PartitionRecord::default();
            let rewritten = tree.traceback(2, &mut partitions, &mut current).unwrap();
            match rewritten {
                StreamNode::SplitJoin(sj) => {
                    assert_eq!(sj.splitter, Splitter::round_robin(vec![1, 5]));
                    assert_eq!(sj.joiner, Joiner::round_robin(vec![1, 5]));
                    assert_eq!(sj.branches[1].name(), "fused(b,c)");
                }
                other => panic!("expected split_join, got {}", other.kind_label()),
            }
        });
    }
}
