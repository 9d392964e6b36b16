// dot.rs — Graphviz DOT output for partitioned stream graphs
//
// Renders the original stream graph with one cluster per partition. Filters
// are boxes, splitters and joiners are trapezia placed in the cluster of the
// partition that hosts their container. Channels that cross partitions are
// drawn dashed and red.
//
// Preconditions: `result` and `steady` were computed for `graph`.
// Postconditions: returns a valid DOT string; identical inputs give
//                 identical text.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write;

use crate::flow::SteadyState;
use crate::layout::Layout;
use crate::partition::PartitionResult;
use crate::stream::{StreamGraph, StreamNode, Vertex};

/// Emit the partitioned stream graph as a Graphviz DOT string.
pub fn emit_dot(
    graph: &StreamGraph,
    steady: &SteadyState,
    result: &PartitionResult,
    layout: Option<&Layout>,
) -> String {
    let mut buf = String::new();
    writeln!(buf, "digraph {} {{", sanitize(graph.root().name())).unwrap();
    writeln!(buf, "    rankdir=LR;").unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];").unwrap();
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];").unwrap();

    for record in &result.partitions {
        writeln!(buf).unwrap();
        writeln!(buf, "    subgraph cluster_p{} {{", record.index).unwrap();
        let tile = layout
            .and_then(|l| l.tile_of(record.index))
            .map(|t| format!(" @ {}", t))
            .unwrap_or_default();
        writeln!(
            buf,
            "        label=\"partition {}{} (work {})\";",
            record.index, tile, record.work
        )
        .unwrap();
        writeln!(buf, "        style=rounded;").unwrap();
        writeln!(buf, "        color=gray50;").unwrap();
        for &host in &record.hosted {
            let name = graph.node(host).map(|n| n.name()).unwrap_or("?");
            writeln!(
                buf,
                "        {} [label=\"split {}\", shape=trapezium];",
                vertex_id(Vertex::Splitter(host)),
                name
            )
            .unwrap();
            writeln!(
                buf,
                "        {} [label=\"join {}\", shape=invtrapezium];",
                vertex_id(Vertex::Joiner(host)),
                name
            )
            .unwrap();
        }
        for (&id, name) in record.filters.iter().zip(&record.names) {
            let work = match graph.node(id) {
                Some(StreamNode::Filter(f)) => f.work,
                _ => 0,
            };
            writeln!(
                buf,
                "        {} [label=\"{}\\nx{} w={}\", shape=box];",
                vertex_id(Vertex::Filter(id)),
                name,
                steady.multiplicity(id),
                work
            )
            .unwrap();
        }
        writeln!(buf, "    }}").unwrap();
    }

    writeln!(buf).unwrap();
    for channel in graph.root().channels() {
        let items = steady.channel_items(&channel);
        let crosses =
            result.partition_of_vertex(channel.from) != result.partition_of_vertex(channel.to);
        let style = if crosses {
            ", style=dashed, color=red"
        } else {
            ""
        };
        writeln!(
            buf,
            "    {} -> {} [label=\"{}\"{}];",
            vertex_id(channel.from),
            vertex_id(channel.to),
            items,
            style
        )
        .unwrap();
    }

    writeln!(buf, "}}").unwrap();
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Sanitize a name to valid DOT identifier characters.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("g_{}", cleaned)
    } else {
        cleaned
    }
}

fn vertex_id(vertex: Vertex) -> String {
    match vertex {
        Vertex::Filter(id) => format!("f{}", id.0),
        Vertex::Splitter(id) => format!("s{}", id.0),
        Vertex::Joiner(id) => format!("j{}", id.0),
    }
}
