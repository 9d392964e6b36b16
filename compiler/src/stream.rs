// stream.rs — Hierarchical stream graph: filters, pipelines, split-joins,
// feedback loops
//
// The graph arrives from the front end as JSON (internally tagged by
// `"type"`). `StreamGraph::new` numbers every node in pre-order and checks the
// structural invariants the partitioner relies on. Rate balance is checked
// later by `flow::steady_state`.
//
// Preconditions: none.
// Postconditions: a `StreamGraph` has stable pre-order IDs, peek >= pop on
//                 every filter, non-empty containers, and splitter/joiner
//                 arities matching their branch counts.
// Failure modes: `Error::InvalidGraph`, `Error::Json`.
// Side effects: none.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::{IdAllocator, NodeId};

/// Default byte size of one item on a channel.
pub const DEFAULT_ITEM_BYTES: u32 = 4;

fn default_item_bytes() -> u32 {
    DEFAULT_ITEM_BYTES
}

// ── Nodes ───────────────────────────────────────────────────────────────────

/// A leaf node together with its cost estimates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip)]
    pub id: NodeId,
    pub name: String,
    pub pop: u32,
    /// 0 on input means "same as pop"; normalised by `StreamGraph::new`.
    #[serde(default)]
    pub peek: u32,
    pub push: u32,
    /// Work per firing.
    pub work: u64,
    /// Instruction-code estimate.
    pub code: u64,
    /// Static data footprint in bytes (excluding channel buffers).
    #[serde(default)]
    pub data: u64,
    /// Performs file or external I/O.
    #[serde(default)]
    pub io: bool,
    #[serde(default = "default_item_bytes")]
    pub in_bytes: u32,
    #[serde(default = "default_item_bytes")]
    pub out_bytes: u32,
}

impl Filter {
    pub fn new(name: impl Into<String>, pop: u32, push: u32, work: u64) -> Self {
        Filter {
            id: NodeId::default(),
            name: name.into(),
            pop,
            peek: pop,
            push,
            work,
            code: 16,
            data: 0,
            io: false,
            in_bytes: DEFAULT_ITEM_BYTES,
            out_bytes: DEFAULT_ITEM_BYTES,
        }
    }

    pub fn with_peek(mut self, peek: u32) -> Self {
        self.peek = peek;
        self
    }

    pub fn with_code(mut self, code: u64) -> Self {
        self.code = code;
        self
    }

    pub fn with_data(mut self, data: u64) -> Self {
        self.data = data;
        self
    }

    pub fn with_io(mut self) -> Self {
        self.io = true;
        self
    }

    /// Whether the filter inspects items beyond those it consumes.
    pub fn peeks(&self) -> bool {
        self.peek > self.pop
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(skip)]
    pub id: NodeId,
    pub name: String,
    pub children: Vec<StreamNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitJoin {
    #[serde(skip)]
    pub id: NodeId,
    pub name: String,
    pub splitter: Splitter,
    pub branches: Vec<StreamNode>,
    pub joiner: Joiner,
}

/// A loop whose joiner merges the external input (weight 0) with the
/// feedback path (weight 1), and whose splitter sends items out (weight 0)
/// and back around the loop (weight 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackLoop {
    #[serde(skip)]
    pub id: NodeId,
    pub name: String,
    pub joiner: Joiner,
    pub body: Box<StreamNode>,
    pub splitter: Splitter,
    #[serde(rename = "loop")]
    pub loop_path: Box<StreamNode>,
    /// Items enqueued on the feedback path before the first firing.
    pub delay: u32,
}

/// How a splitter distributes items among its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Splitter {
    /// Every child receives every item.
    Duplicate,
    /// Per phase, child `i` receives `phases[p][i]` items.
    RoundRobin { phases: Vec<Vec<u32>> },
    /// No items flow.
    Null,
}

/// How a joiner collects items from its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Joiner {
    RoundRobin { phases: Vec<Vec<u32>> },
    Null,
}

impl Splitter {
    /// Single-phase round robin.
    pub fn round_robin(weights: Vec<u32>) -> Self {
        Splitter::RoundRobin {
            phases: vec![weights],
        }
    }

    /// Round robin sending one item to each of `n` children.
    pub fn uniform(n: usize) -> Self {
        Splitter::round_robin(vec![1; n])
    }
}

impl Joiner {
    pub fn round_robin(weights: Vec<u32>) -> Self {
        Joiner::RoundRobin {
            phases: vec![weights],
        }
    }

    pub fn uniform(n: usize) -> Self {
        Joiner::round_robin(vec![1; n])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamNode {
    Filter(Filter),
    Pipeline(Pipeline),
    SplitJoin(SplitJoin),
    FeedbackLoop(FeedbackLoop),
}

impl From<Filter> for StreamNode {
    fn from(filter: Filter) -> Self {
        StreamNode::Filter(filter)
    }
}

// ── Channels ────────────────────────────────────────────────────────────────

/// An endpoint of a channel: a filter, or the splitter/joiner owned by a
/// split-join or feedback loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vertex {
    Filter(NodeId),
    Splitter(NodeId),
    Joiner(NodeId),
}

/// Which boundary of the carrier node a channel crosses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Input,
    Output,
}

/// A directed channel. The number of items it carries per steady state is
/// the carrier node's boundary count on `side`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub from: Vertex,
    pub to: Vertex,
    pub carrier: NodeId,
    pub side: Side,
}

// ── Node queries ────────────────────────────────────────────────────────────

impl StreamNode {
    pub fn pipeline(name: impl Into<String>, children: Vec<StreamNode>) -> Self {
        StreamNode::Pipeline(Pipeline {
            id: NodeId::default(),
            name: name.into(),
            children,
        })
    }

    pub fn split_join(
        name: impl Into<String>,
        splitter: Splitter,
        branches: Vec<StreamNode>,
        joiner: Joiner,
    ) -> Self {
        StreamNode::SplitJoin(SplitJoin {
            id: NodeId::default(),
            name: name.into(),
            splitter,
            branches,
            joiner,
        })
    }

    pub fn feedback_loop(
        name: impl Into<String>,
        joiner: Joiner,
        body: StreamNode,
        splitter: Splitter,
        loop_path: StreamNode,
        delay: u32,
    ) -> Self {
        StreamNode::FeedbackLoop(FeedbackLoop {
            id: NodeId::default(),
            name: name.into(),
            joiner,
            body: Box::new(body),
            splitter,
            loop_path: Box::new(loop_path),
            delay,
        })
    }

    pub fn id(&self) -> NodeId {
        match self {
            StreamNode::Filter(f) => f.id,
            StreamNode::Pipeline(p) => p.id,
            StreamNode::SplitJoin(s) => s.id,
            StreamNode::FeedbackLoop(l) => l.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StreamNode::Filter(f) => &f.name,
            StreamNode::Pipeline(p) => &p.name,
            StreamNode::SplitJoin(s) => &s.name,
            StreamNode::FeedbackLoop(l) => &l.name,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            StreamNode::Filter(_) => "filter",
            StreamNode::Pipeline(_) => "pipeline",
            StreamNode::SplitJoin(_) => "split_join",
            StreamNode::FeedbackLoop(_) => "feedback_loop",
        }
    }

    /// Human-readable identity used in diagnostics, e.g. `pipeline 'top' (n0)`.
    pub fn describe(&self) -> String {
        format!("{} '{}' ({})", self.kind_label(), self.name(), self.id())
    }

    /// Direct children in stream order (feedback loops: body, then loop).
    pub fn children(&self) -> Vec<&StreamNode> {
        match self {
            StreamNode::Filter(_) => Vec::new(),
            StreamNode::Pipeline(p) => p.children.iter().collect(),
            StreamNode::SplitJoin(s) => s.branches.iter().collect(),
            StreamNode::FeedbackLoop(l) => vec![l.body.as_ref(), l.loop_path.as_ref()],
        }
    }

    /// All filters of the subtree in pre-order.
    pub fn filters(&self) -> Vec<&Filter> {
        let mut out = Vec::new();
        self.collect_filters(&mut out);
        out
    }

    fn collect_filters<'a>(&'a self, out: &mut Vec<&'a Filter>) {
        match self {
            StreamNode::Filter(f) => out.push(f),
            _ => {
                for child in self.children() {
                    child.collect_filters(out);
                }
            }
        }
    }

    pub fn filter_count(&self) -> usize {
        match self {
            StreamNode::Filter(_) => 1,
            _ => self.children().iter().map(|c| c.filter_count()).sum(),
        }
    }

    /// IDs of split-joins and feedback loops in the subtree, pre-order.
    /// These are the nodes that own a splitter and a joiner.
    pub fn hosts(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_hosts(&mut out);
        out
    }

    fn collect_hosts(&self, out: &mut Vec<NodeId>) {
        if matches!(self, StreamNode::SplitJoin(_) | StreamNode::FeedbackLoop(_)) {
            out.push(self.id());
        }
        for child in self.children() {
            child.collect_hosts(out);
        }
    }

    /// Find a node by ID in the subtree.
    pub fn find(&self, id: NodeId) -> Option<&StreamNode> {
        if self.id() == id {
            return Some(self);
        }
        self.children().into_iter().find_map(|c| c.find(id))
    }

    /// The vertex that receives the node's input.
    pub fn head(&self) -> Vertex {
        match self {
            StreamNode::Filter(f) => Vertex::Filter(f.id),
            StreamNode::Pipeline(p) => p.children[0].head(),
            StreamNode::SplitJoin(s) => Vertex::Splitter(s.id),
            StreamNode::FeedbackLoop(l) => Vertex::Joiner(l.id),
        }
    }

    /// The vertex that produces the node's output.
    pub fn tail(&self) -> Vertex {
        match self {
            StreamNode::Filter(f) => Vertex::Filter(f.id),
            StreamNode::Pipeline(p) => p.children[p.children.len() - 1].tail(),
            StreamNode::SplitJoin(s) => Vertex::Joiner(s.id),
            StreamNode::FeedbackLoop(l) => Vertex::Splitter(l.id),
        }
    }

    /// Every channel inside the subtree, in stream order.
    pub fn channels(&self) -> Vec<Channel> {
        let mut out = Vec::new();
        self.collect_channels(&mut out);
        out
    }

    fn collect_channels(&self, out: &mut Vec<Channel>) {
        match self {
            StreamNode::Filter(_) => {}
            StreamNode::Pipeline(p) => {
                for (i, child) in p.children.iter().enumerate() {
                    child.collect_channels(out);
                    if let Some(next) = p.children.get(i + 1) {
                        out.push(Channel {
                            from: child.tail(),
                            to: next.head(),
                            carrier: child.id(),
                            side: Side::Output,
                        });
                    }
                }
            }
            StreamNode::SplitJoin(s) => {
                for branch in &s.branches {
                    out.push(Channel {
                        from: Vertex::Splitter(s.id),
                        to: branch.head(),
                        carrier: branch.id(),
                        side: Side::Input,
                    });
                    branch.collect_channels(out);
                    out.push(Channel {
                        from: branch.tail(),
                        to: Vertex::Joiner(s.id),
                        carrier: branch.id(),
                        side: Side::Output,
                    });
                }
            }
            StreamNode::FeedbackLoop(l) => {
                for (path, entry, exit) in [
                    (l.body.as_ref(), Vertex::Joiner(l.id), Vertex::Splitter(l.id)),
                    (l.loop_path.as_ref(), Vertex::Splitter(l.id), Vertex::Joiner(l.id)),
                ] {
                    out.push(Channel {
                        from: entry,
                        to: path.head(),
                        carrier: path.id(),
                        side: Side::Input,
                    });
                    path.collect_channels(out);
                    out.push(Channel {
                        from: path.tail(),
                        to: exit,
                        carrier: path.id(),
                        side: Side::Output,
                    });
                }
            }
        }
    }

    // ── Numbering and validation ────────────────────────────────────────

    fn number(&mut self, alloc: &mut IdAllocator) {
        match self {
            StreamNode::Filter(f) => f.id = alloc.alloc_node(),
            StreamNode::Pipeline(p) => {
                p.id = alloc.alloc_node();
                for child in &mut p.children {
                    child.number(alloc);
                }
            }
            StreamNode::SplitJoin(s) => {
                s.id = alloc.alloc_node();
                for branch in &mut s.branches {
                    branch.number(alloc);
                }
            }
            StreamNode::FeedbackLoop(l) => {
                l.id = alloc.alloc_node();
                l.body.number(alloc);
                l.loop_path.number(alloc);
            }
        }
    }

    fn validate(&mut self) -> Result<()> {
        let describe = self.describe();
        let invalid = |detail: String| Error::InvalidGraph {
            node: describe.clone(),
            detail,
        };
        match self {
            StreamNode::Filter(f) => {
                if f.peek == 0 {
                    f.peek = f.pop;
                }
                if f.peek < f.pop {
                    return Err(invalid(format!(
                        "peek rate {} is below pop rate {}",
                        f.peek, f.pop
                    )));
                }
                if f.in_bytes == 0 || f.out_bytes == 0 {
                    return Err(invalid("item byte sizes must be positive".into()));
                }
            }
            StreamNode::Pipeline(p) => {
                if p.children.is_empty() {
                    return Err(invalid("pipeline has no children".into()));
                }
                for child in &mut p.children {
                    child.validate()?;
                }
            }
            StreamNode::SplitJoin(s) => {
                if s.branches.is_empty() {
                    return Err(invalid("split-join has no branches".into()));
                }
                check_splitter_arity(&s.splitter, s.branches.len()).map_err(&invalid)?;
                check_joiner_arity(&s.joiner, s.branches.len()).map_err(&invalid)?;
                for branch in &mut s.branches {
                    branch.validate()?;
                }
            }
            StreamNode::FeedbackLoop(l) => {
                check_splitter_arity(&l.splitter, 2).map_err(&invalid)?;
                check_joiner_arity(&l.joiner, 2).map_err(&invalid)?;
                if l.delay == 0 {
                    return Err(invalid(
                        "feedback loop has no initial items on its loop path and would deadlock"
                            .into(),
                    ));
                }
                l.body.validate()?;
                l.loop_path.validate()?;
            }
        }
        Ok(())
    }
}

fn check_phase_arity(phases: &[Vec<u32>], arity: usize, what: &str) -> std::result::Result<(), String> {
    if phases.is_empty() {
        return Err(format!("round-robin {} has no phases", what));
    }
    for (p, weights) in phases.iter().enumerate() {
        if weights.len() != arity {
            return Err(format!(
                "{} phase {} has {} weights for {} children",
                what,
                p,
                weights.len(),
                arity
            ));
        }
    }
    Ok(())
}

fn check_splitter_arity(splitter: &Splitter, arity: usize) -> std::result::Result<(), String> {
    match splitter {
        Splitter::RoundRobin { phases } => check_phase_arity(phases, arity, "splitter"),
        Splitter::Duplicate | Splitter::Null => Ok(()),
    }
}

fn check_joiner_arity(joiner: &Joiner, arity: usize) -> std::result::Result<(), String> {
    match joiner {
        Joiner::RoundRobin { phases } => check_phase_arity(phases, arity, "joiner"),
        Joiner::Null => Ok(()),
    }
}

// ── Graph ───────────────────────────────────────────────────────────────────

/// A validated, numbered stream graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamGraph {
    root: StreamNode,
    node_count: u32,
}

impl StreamGraph {
    pub fn new(mut root: StreamNode) -> Result<Self> {
        let mut alloc = IdAllocator::new();
        root.number(&mut alloc);
        root.validate()?;
        Ok(StreamGraph {
            root,
            node_count: alloc.allocated(),
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let root: StreamNode = serde_json::from_str(text)?;
        StreamGraph::new(root)
    }

    pub fn root(&self) -> &StreamNode {
        &self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&StreamNode> {
        self.root.find(id)
    }

    pub fn filters(&self) -> Vec<&Filter> {
        self.root.filters()
    }

    pub fn filter_count(&self) -> usize {
        self.root.filter_count()
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }
}

// ── Display ─────────────────────────────────────────────────────────────────

impl fmt::Display for StreamGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, &self.root, 0)
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &StreamNode, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    match node {
        StreamNode::Filter(flt) => writeln!(
            f,
            "{}filter '{}' [{}] pop={} peek={} push={} work={} code={}{}",
            indent,
            flt.name,
            flt.id,
            flt.pop,
            flt.peek,
            flt.push,
            flt.work,
            flt.code,
            if flt.io { " io" } else { "" }
        ),
        _ => {
            writeln!(f, "{}{} '{}' [{}]", indent, node.kind_label(), node.name(), node.id())?;
            for child in node.children() {
                write_node(f, child, depth + 1)?;
            }
            Ok(())
        }
    }
}
