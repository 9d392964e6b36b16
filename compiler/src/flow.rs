// flow.rs — Splitter/joiner flow accounting and steady-state multiplicities
//
// A splitter or joiner with heterogeneous weights fires through a fixed
// sequence of phases. `SplitFlow`/`JoinFlow` record, per phase and summed
// over one period, how many items move to or from each child. The steady
// state of the whole graph is then found container by container: each
// container's children (plus its splitter and joiner) form a small balance
// graph whose equations are solved by ratio propagation, LCM normalisation,
// and GCD reduction.
//
// Preconditions: `graph` passed `StreamGraph::new` validation.
// Postconditions: every node has a positive global multiplicity; for every
//                 live channel, producer items == consumer items.
// Failure modes: `Error::RateMismatch` when a channel has exactly one zero
//                rate, ratios around a cycle disagree, or firing counts
//                overflow 64 bits; `Error::FlowIndex`
//                when a weight is queried for a child that does not exist.
// Side effects: none.

use std::collections::{BTreeMap, VecDeque};

use crate::error::{Error, Result};
use crate::id::NodeId;
use crate::stream::{Channel, Joiner, Side, Splitter, StreamGraph, StreamNode};

// ── Split and join flows ────────────────────────────────────────────────────

/// Items a splitter consumes and sends to each child, for one phase or one
/// whole period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitFlow {
    /// Every child receives every consumed item.
    pub duplicate: bool,
    pub pop: u64,
    pub push: Vec<u64>,
}

/// Items a joiner collects from each child and produces, for one phase or
/// one whole period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinFlow {
    pub pop: Vec<u64>,
    pub push: u64,
}

impl SplitFlow {
    pub fn arity(&self) -> usize {
        self.push.len()
    }

    /// Items sent to `child`. A valid child with zero weight yields zero.
    pub fn push_weight(&self, child: usize) -> Result<u64> {
        self.push.get(child).copied().ok_or(Error::FlowIndex {
            child,
            arity: self.arity(),
        })
    }

    pub fn total_push(&self) -> u64 {
        self.push.iter().sum()
    }

    /// Round robin: pushed items sum to consumed items. Duplicate: every
    /// child receives exactly the consumed items.
    pub fn is_conserved(&self) -> bool {
        if self.duplicate {
            self.push.iter().all(|&w| w == self.pop)
        } else {
            self.total_push() == self.pop
        }
    }
}

impl JoinFlow {
    pub fn arity(&self) -> usize {
        self.pop.len()
    }

    /// Items collected from `child`. A valid child with zero weight yields zero.
    pub fn pop_weight(&self, child: usize) -> Result<u64> {
        self.pop.get(child).copied().ok_or(Error::FlowIndex {
            child,
            arity: self.arity(),
        })
    }

    pub fn total_pop(&self) -> u64 {
        self.pop.iter().sum()
    }

    pub fn is_conserved(&self) -> bool {
        self.total_pop() == self.push
    }
}

/// Per-phase flows of a splitter feeding `arity` children.
pub fn split_phases(splitter: &Splitter, arity: usize) -> Vec<SplitFlow> {
    match splitter {
        Splitter::Duplicate => vec![SplitFlow {
            duplicate: true,
            pop: 1,
            push: vec![1; arity],
        }],
        Splitter::RoundRobin { phases } => phases
            .iter()
            .map(|weights| {
                let push: Vec<u64> = weights.iter().map(|&w| w as u64).collect();
                SplitFlow {
                    duplicate: false,
                    pop: push.iter().sum(),
                    push,
                }
            })
            .collect(),
        Splitter::Null => vec![SplitFlow {
            duplicate: false,
            pop: 0,
            push: vec![0; arity],
        }],
    }
}

/// Per-phase flows of a joiner collecting from `arity` children.
pub fn join_phases(joiner: &Joiner, arity: usize) -> Vec<JoinFlow> {
    match joiner {
        Joiner::RoundRobin { phases } => phases
            .iter()
            .map(|weights| {
                let pop: Vec<u64> = weights.iter().map(|&w| w as u64).collect();
                JoinFlow {
                    push: pop.iter().sum(),
                    pop,
                }
            })
            .collect(),
        Joiner::Null => vec![JoinFlow {
            pop: vec![0; arity],
            push: 0,
        }],
    }
}

/// Flow of one full splitter period: the elementwise sum of its phases.
pub fn split_steady(splitter: &Splitter, arity: usize) -> SplitFlow {
    let phases = split_phases(splitter, arity);
    let mut steady = SplitFlow {
        duplicate: matches!(splitter, Splitter::Duplicate),
        pop: 0,
        push: vec![0; arity],
    };
    for phase in &phases {
        steady.pop = steady.pop.saturating_add(phase.pop);
        for (acc, w) in steady.push.iter_mut().zip(&phase.push) {
            *acc = acc.saturating_add(*w);
        }
    }
    steady
}

/// Flow of one full joiner period.
pub fn join_steady(joiner: &Joiner, arity: usize) -> JoinFlow {
    let phases = join_phases(joiner, arity);
    let mut steady = JoinFlow {
        pop: vec![0; arity],
        push: 0,
    };
    for phase in &phases {
        steady.push = steady.push.saturating_add(phase.push);
        for (acc, w) in steady.pop.iter_mut().zip(&phase.pop) {
            *acc = acc.saturating_add(*w);
        }
    }
    steady
}

// ── Balance equations ───────────────────────────────────────────────────────

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// `None` when the result does not fit in 64 bits.
fn lcm(a: u64, b: u64) -> Option<u64> {
    if a == 0 || b == 0 {
        Some(0)
    } else {
        (a / gcd(a, b)).checked_mul(b)
    }
}

const OVERFLOW: &str = "steady-state item counts overflow 64 bits";

fn overflow(owner: &StreamNode) -> Error {
    Error::RateMismatch {
        node: owner.describe(),
        detail: OVERFLOW.into(),
    }
}

fn checked(owner: &StreamNode, a: u64, b: u64) -> Result<u64> {
    a.checked_mul(b).ok_or_else(|| overflow(owner))
}

fn reduce_ratio(num: u64, den: u64) -> (u64, u64) {
    let g = gcd(num, den);
    (num / g, den / g)
}

#[derive(Debug, Clone, Copy)]
struct BalanceEdge {
    src: usize,
    dst: usize,
    produced: u64,
    consumed: u64,
}

/// Local balance graph of one container: its children plus, for split-joins
/// and feedback loops, the splitter and joiner.
struct BalanceGraph {
    labels: Vec<String>,
    edges: Vec<BalanceEdge>,
}

impl BalanceGraph {
    fn new(labels: Vec<String>) -> Self {
        BalanceGraph {
            labels,
            edges: Vec::new(),
        }
    }

    fn edge(&mut self, src: usize, dst: usize, produced: u64, consumed: u64) {
        self.edges.push(BalanceEdge {
            src,
            dst,
            produced,
            consumed,
        });
    }

    fn mismatch(&self, owner: &StreamNode, detail: String) -> Error {
        Error::RateMismatch {
            node: owner.describe(),
            detail,
        }
    }

    /// Smallest positive integer firing counts satisfying every live edge.
    fn solve(&self, owner: &StreamNode) -> Result<Vec<u64>> {
        let n = self.labels.len();
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (idx, e) in self.edges.iter().enumerate() {
            match (e.produced, e.consumed) {
                (0, 0) => {}
                (0, _) | (_, 0) => {
                    return Err(self.mismatch(
                        owner,
                        format!(
                            "{} -> {} has a zero rate on a live channel ({} produced, {} consumed)",
                            self.labels[e.src], self.labels[e.dst], e.produced, e.consumed
                        ),
                    ));
                }
                _ => {
                    adjacency[e.src].push(idx);
                    adjacency[e.dst].push(idx);
                }
            }
        }

        let ratios = self.propagate(owner, &adjacency)?;
        let counts = normalize(owner, &ratios)?;
        self.verify(owner, &counts)?;
        Ok(counts)
    }

    fn propagate(&self, owner: &StreamNode, adjacency: &[Vec<usize>]) -> Result<Vec<(u64, u64)>> {
        let n = self.labels.len();
        let mut ratio: Vec<Option<(u64, u64)>> = vec![None; n];
        let mut queue = VecDeque::new();
        for seed in 0..n {
            if ratio[seed].is_some() {
                continue;
            }
            ratio[seed] = Some((1, 1));
            queue.push_back(seed);
            while let Some(current) = queue.pop_front() {
                let Some((num, den)) = ratio[current] else {
                    continue;
                };
                for &idx in &adjacency[current] {
                    let e = self.edges[idx];
                    let (neighbor, scale_num, scale_den) = if e.src == current {
                        (e.dst, e.produced, e.consumed)
                    } else {
                        (e.src, e.consumed, e.produced)
                    };
                    let next = reduce_ratio(
                        checked(owner, num, scale_num)?,
                        checked(owner, den, scale_den)?,
                    );
                    if ratio[neighbor].is_none() {
                        ratio[neighbor] = Some(next);
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        Ok(ratio.into_iter().map(|r| r.unwrap_or((1, 1))).collect())
    }

    fn verify(&self, owner: &StreamNode, counts: &[u64]) -> Result<()> {
        for e in &self.edges {
            if e.produced == 0 && e.consumed == 0 {
                continue;
            }
            let lhs = checked(owner, counts[e.src], e.produced)?;
            let rhs = checked(owner, counts[e.dst], e.consumed)?;
            if lhs != rhs {
                return Err(self.mismatch(
                    owner,
                    format!(
                        "{} -> {}: {}x{} != {}x{}",
                        self.labels[e.src],
                        self.labels[e.dst],
                        counts[e.src],
                        e.produced,
                        counts[e.dst],
                        e.consumed
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn normalize(owner: &StreamNode, ratios: &[(u64, u64)]) -> Result<Vec<u64>> {
    let mut lcm_den = 1u64;
    for &(_, d) in ratios {
        lcm_den = lcm(lcm_den, d).ok_or_else(|| overflow(owner))?;
    }
    let mut counts = ratios
        .iter()
        .map(|&(num, den)| checked(owner, num, lcm_den / den))
        .collect::<Result<Vec<u64>>>()?;
    let g = counts.iter().copied().fold(0u64, gcd);
    if g > 1 {
        for c in &mut counts {
            *c /= g;
        }
    }
    Ok(counts)
}

// ── Steady state ────────────────────────────────────────────────────────────

/// Items crossing a node's boundary during one of its own steady states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Boundary {
    pub pop: u64,
    pub peek: u64,
    pub push: u64,
}

/// Firing multiplicities for one steady state of the root.
///
/// For a filter, the multiplicity is its firing count. For a container it is
/// the number of times the container's own local steady state repeats.
#[derive(Debug, Clone, Default)]
pub struct SteadyState {
    global: BTreeMap<NodeId, u64>,
    local: BTreeMap<NodeId, u64>,
    boundary: BTreeMap<NodeId, Boundary>,
    split_local: BTreeMap<NodeId, u64>,
    join_local: BTreeMap<NodeId, u64>,
    split_flows: BTreeMap<NodeId, SplitFlow>,
    join_flows: BTreeMap<NodeId, JoinFlow>,
}

/// Solve the balance equations of every container of `graph`.
pub fn steady_state(graph: &StreamGraph) -> Result<SteadyState> {
    let mut state = SteadyState::default();
    let root = graph.root();
    state.solve_local(root)?;
    state.assign_global(root, 1)?;
    Ok(state)
}

impl SteadyState {
    /// Global multiplicity of `id` (0 for unknown nodes).
    pub fn multiplicity(&self, id: NodeId) -> u64 {
        self.global.get(&id).copied().unwrap_or(0)
    }

    /// Boundary items of one local steady state of `id`.
    pub fn boundary(&self, id: NodeId) -> Boundary {
        self.boundary.get(&id).copied().unwrap_or_default()
    }

    /// Items `id` consumes per root steady state.
    pub fn items_in(&self, id: NodeId) -> u64 {
        self.multiplicity(id).saturating_mul(self.boundary(id).pop)
    }

    /// Items `id` produces per root steady state.
    pub fn items_out(&self, id: NodeId) -> u64 {
        self.multiplicity(id).saturating_mul(self.boundary(id).push)
    }

    /// Splitter periods of host `id` per root steady state.
    pub fn split_periods(&self, id: NodeId) -> u64 {
        self.multiplicity(id)
            .saturating_mul(self.split_local.get(&id).copied().unwrap_or(0))
    }

    /// Joiner periods of host `id` per root steady state.
    pub fn join_periods(&self, id: NodeId) -> u64 {
        self.multiplicity(id)
            .saturating_mul(self.join_local.get(&id).copied().unwrap_or(0))
    }

    /// Steady (one-period) flow of the splitter owned by `id`.
    pub fn split_flow(&self, id: NodeId) -> Option<&SplitFlow> {
        self.split_flows.get(&id)
    }

    /// Steady (one-period) flow of the joiner owned by `id`.
    pub fn join_flow(&self, id: NodeId) -> Option<&JoinFlow> {
        self.join_flows.get(&id)
    }

    /// Items pushed by the splitter of `id` per root steady state.
    pub fn split_items(&self, id: NodeId) -> u64 {
        self.split_flow(id)
            .map_or(0, |f| self.split_periods(id).saturating_mul(f.total_push()))
    }

    /// Items pushed by the joiner of `id` per root steady state.
    pub fn join_items(&self, id: NodeId) -> u64 {
        self.join_flow(id)
            .map_or(0, |f| self.join_periods(id).saturating_mul(f.push))
    }

    /// Items a channel carries per root steady state.
    pub fn channel_items(&self, channel: &Channel) -> u64 {
        match channel.side {
            Side::Input => self.items_in(channel.carrier),
            Side::Output => self.items_out(channel.carrier),
        }
    }

    fn solve_local(&mut self, node: &StreamNode) -> Result<Boundary> {
        let boundary = match node {
            StreamNode::Filter(f) => Boundary {
                pop: f.pop as u64,
                peek: f.peek as u64,
                push: f.push as u64,
            },
            StreamNode::Pipeline(p) => {
                let inner = self.solve_children(&p.children)?;
                let mut balance = BalanceGraph::new(p.children.iter().map(|c| c.describe()).collect());
                for (i, pair) in inner.windows(2).enumerate() {
                    balance.edge(i, i + 1, pair[0].push, pair[1].pop);
                }
                let counts = balance.solve(node)?;
                for (child, &m) in p.children.iter().zip(&counts) {
                    self.local.insert(child.id(), m);
                }
                let first = inner[0];
                let last = inner[inner.len() - 1];
                let pop = checked(node, counts[0], first.pop)?;
                Boundary {
                    pop,
                    peek: pop
                        .checked_add(first.peek - first.pop)
                        .ok_or_else(|| overflow(node))?,
                    push: checked(node, counts[counts.len() - 1], last.push)?,
                }
            }
            StreamNode::SplitJoin(s) => {
                let n = s.branches.len();
                let inner = self.solve_children(&s.branches)?;
                let split = split_steady(&s.splitter, n);
                let join = join_steady(&s.joiner, n);

                let mut labels = vec![format!("splitter of {}", node.describe())];
                labels.extend(s.branches.iter().map(|b| b.describe()));
                labels.push(format!("joiner of {}", node.describe()));
                let mut balance = BalanceGraph::new(labels);
                for (i, b) in inner.iter().enumerate() {
                    balance.edge(0, i + 1, split.push_weight(i)?, b.pop);
                    balance.edge(i + 1, n + 1, b.push, join.pop_weight(i)?);
                }
                let counts = balance.solve(node)?;
                for (branch, &m) in s.branches.iter().zip(&counts[1..=n]) {
                    self.local.insert(branch.id(), m);
                }
                self.split_local.insert(s.id, counts[0]);
                self.join_local.insert(s.id, counts[n + 1]);
                let pop = checked(node, counts[0], split.pop)?;
                let push = checked(node, counts[n + 1], join.push)?;
                self.split_flows.insert(s.id, split);
                self.join_flows.insert(s.id, join);
                Boundary {
                    pop,
                    peek: pop,
                    push,
                }
            }
            StreamNode::FeedbackLoop(l) => {
                let body = self.solve_local(&l.body)?;
                let back = self.solve_local(&l.loop_path)?;
                let join = join_steady(&l.joiner, 2);
                let split = split_steady(&l.splitter, 2);

                let mut balance = BalanceGraph::new(vec![
                    format!("joiner of {}", node.describe()),
                    l.body.describe(),
                    format!("splitter of {}", node.describe()),
                    l.loop_path.describe(),
                ]);
                balance.edge(0, 1, join.push, body.pop);
                balance.edge(1, 2, body.push, split.pop);
                balance.edge(2, 3, split.push_weight(1)?, back.pop);
                balance.edge(3, 0, back.push, join.pop_weight(1)?);
                let counts = balance.solve(node)?;
                self.local.insert(l.body.id(), counts[1]);
                self.local.insert(l.loop_path.id(), counts[3]);
                self.join_local.insert(l.id, counts[0]);
                self.split_local.insert(l.id, counts[2]);
                let pop = checked(node, counts[0], join.pop_weight(0)?)?;
                let push = checked(node, counts[2], split.push_weight(0)?)?;
                self.split_flows.insert(l.id, split);
                self.join_flows.insert(l.id, join);
                Boundary {
                    pop,
                    peek: pop,
                    push,
                }
            }
        };
        self.boundary.insert(node.id(), boundary);
        Ok(boundary)
    }

    fn solve_children(&mut self, children: &[StreamNode]) -> Result<Vec<Boundary>> {
        children.iter().map(|c| self.solve_local(c)).collect()
    }

    fn assign_global(&mut self, node: &StreamNode, global: u64) -> Result<()> {
        self.global.insert(node.id(), global);
        for child in node.children() {
            let m = self.local.get(&child.id()).copied().unwrap_or(1);
            self.assign_global(child, checked(node, global, m)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Filter;

    #[test]
    fn gcd_lcm_basics() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(lcm(4, 6), Some(12));
        assert_eq!(lcm(0, 6), Some(0));
        assert_eq!(lcm(u64::MAX, u64::MAX - 1), None);
        assert_eq!(reduce_ratio(6, 4), (3, 2));
    }

    #[test]
    fn round_robin_phases_and_steady() {
        let splitter = Splitter::RoundRobin {
            phases: vec![vec![1, 0, 2], vec![0, 3, 1]],
        };
        let phases = split_phases(&splitter, 3);
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].pop, 3);
        assert_eq!(phases[1].push_weight(1).unwrap(), 3);
        assert!(phases.iter().all(SplitFlow::is_conserved));

        let steady = split_steady(&splitter, 3);
        assert_eq!(steady.push, vec![1, 3, 3]);
        assert_eq!(steady.pop, 7);
        assert!(steady.is_conserved());
    }

    #[test]
    fn zero_weight_is_not_an_error() {
        let flow = split_steady(&Splitter::round_robin(vec![2, 0]), 2);
        assert_eq!(flow.push_weight(1).unwrap(), 0);
    }

    #[test]
    fn out_of_range_child_fails() {
        let flow = join_steady(&Joiner::uniform(2), 2);
        let err = flow.pop_weight(2).unwrap_err();
        assert!(matches!(err, Error::FlowIndex { child: 2, arity: 2 }));
        let split = split_steady(&Splitter::Duplicate, 2);
        assert!(split.push_weight(5).is_err());
    }

    #[test]
    fn duplicate_is_conserved_per_child() {
        let flow = split_steady(&Splitter::Duplicate, 3);
        assert_eq!(flow.pop, 1);
        assert_eq!(flow.push, vec![1, 1, 1]);
        assert!(flow.is_conserved());
        assert_eq!(flow.total_push(), 3);
    }

    #[test]
    fn null_flows_are_empty() {
        let split = split_steady(&Splitter::Null, 2);
        let join = join_steady(&Joiner::Null, 2);
        assert_eq!(split.total_push(), 0);
        assert_eq!(join.push, 0);
        assert!(split.is_conserved() && join.is_conserved());
    }

    #[test]
    fn pipeline_multirate() {
        let graph = StreamGraph::new(StreamNode::pipeline(
            "p",
            vec![
                Filter::new("a", 0, 2, 1).into(),
                Filter::new("b", 3, 1, 1).into(),
                Filter::new("c", 1, 0, 1).into(),
            ],
        ))
        .unwrap();
        let ss = steady_state(&graph).unwrap();
        let counts: Vec<u64> = graph
            .filters()
            .iter()
            .map(|f| ss.multiplicity(f.id))
            .collect();
        assert_eq!(counts, vec![3, 2, 2]);
        assert_eq!(ss.items_out(NodeId(1)), 6);
        assert_eq!(ss.items_in(NodeId(2)), 6);
    }

    #[test]
    fn split_join_periods() {
        let graph = StreamGraph::new(StreamNode::split_join(
            "sj",
            Splitter::round_robin(vec![1, 2]),
            vec![Filter::new("a", 1, 1, 1).into(), Filter::new("b", 1, 1, 1).into()],
            Joiner::round_robin(vec![1, 2]),
        ))
        .unwrap();
        let ss = steady_state(&graph).unwrap();
        assert_eq!(ss.multiplicity(NodeId(1)), 1);
        assert_eq!(ss.multiplicity(NodeId(2)), 2);
        assert_eq!(ss.split_periods(NodeId(0)), 1);
        assert_eq!(ss.split_items(NodeId(0)), 3);
        assert_eq!(ss.join_items(NodeId(0)), 3);
        assert_eq!(ss.items_in(NodeId(0)), 3);
    }

    #[test]
    fn feedback_loop_balances() {
        let graph = StreamGraph::new(StreamNode::feedback_loop(
            "fb",
            Joiner::uniform(2),
            Filter::new("body", 2, 2, 1).into(),
            Splitter::uniform(2),
            Filter::new("back", 1, 1, 1).into(),
            1,
        ))
        .unwrap();
        let ss = steady_state(&graph).unwrap();
        assert_eq!(ss.multiplicity(NodeId(1)), 1);
        assert_eq!(ss.multiplicity(NodeId(2)), 1);
        assert_eq!(ss.boundary(NodeId(0)), Boundary { pop: 1, peek: 1, push: 1 });
    }

    #[test]
    fn inconsistent_split_join_rejected() {
        let graph = StreamGraph::new(StreamNode::split_join(
            "sj",
            Splitter::Duplicate,
            vec![Filter::new("a", 1, 1, 1).into(), Filter::new("b", 1, 2, 1).into()],
            Joiner::uniform(2),
        ))
        .unwrap();
        let err = steady_state(&graph).unwrap_err();
        assert!(matches!(err, Error::RateMismatch { .. }), "{err}");
    }

    #[test]
    fn zero_rate_on_live_channel_rejected() {
        let graph = StreamGraph::new(StreamNode::pipeline(
            "p",
            vec![Filter::new("a", 1, 1, 1).into(), Filter::new("b", 0, 1, 1).into()],
        ))
        .unwrap();
        let err = steady_state(&graph).unwrap_err();
        assert!(err.to_string().contains("zero rate"), "{err}");
    }

    #[test]
    fn overflowing_counts_are_a_rate_mismatch() {
        let max = u32::MAX;
        let graph = StreamGraph::new(StreamNode::pipeline(
            "decimate",
            vec![
                Filter::new("a", 1, 1, 1).into(),
                Filter::new("b", max, 1, 1).into(),
                Filter::new("c", max, 1, 1).into(),
                Filter::new("d", max, 1, 1).into(),
            ],
        ))
        .unwrap();
        match steady_state(&graph).unwrap_err() {
            Error::RateMismatch { node, detail } => {
                assert_eq!(node, "pipeline 'decimate' (n0)");
                assert!(detail.contains("overflow"), "{detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn large_but_representable_counts_still_solve() {
        let graph = StreamGraph::new(StreamNode::pipeline(
            "p",
            vec![
                Filter::new("a", 1, 1, 1).into(),
                Filter::new("b", u32::MAX, 1, 1).into(),
            ],
        ))
        .unwrap();
        let ss = steady_state(&graph).unwrap();
        assert_eq!(ss.multiplicity(NodeId(1)), u32::MAX as u64);
        assert_eq!(ss.multiplicity(NodeId(2)), 1);
    }
}
