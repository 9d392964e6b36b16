// layout.rs — Placement of partitions on tiles and inter-tile dependencies
//
// Partition `i` goes to the `i`-th tile of the mesh's snake order, so
// consecutive partitions (which mostly talk to each other) are neighbours.
// Every channel whose endpoints landed in different partitions becomes a
// dependency between their tiles; dependencies between the same tile pair
// are merged in discovery order.
//
// Preconditions: `result` was produced for `graph` with the same `steady`.
// Postconditions: placement is injective; every dependency has src != dst
//                 and a positive item count.
// Failure modes: `Error::TooManyPartitions`; `Error::InvalidGraph` if a
//                channel endpoint has no partition.
// Side effects: none.

use log::debug;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::flow::SteadyState;
use crate::id::TileId;
use crate::mesh::Mesh;
use crate::partition::PartitionResult;
use crate::stream::{StreamGraph, Vertex};

/// Items moving from one tile to another per steady state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub src: TileId,
    pub dst: TileId,
    pub items: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
    /// `placement[i]` is the tile of partition `i`.
    pub placement: Vec<TileId>,
    pub dependencies: Vec<Dependency>,
}

impl Layout {
    pub fn tile_of(&self, partition: usize) -> Option<TileId> {
        self.placement.get(partition).copied()
    }
}

/// Assign each partition a tile along the snake order.
pub fn place(result: &PartitionResult, mesh: &Mesh) -> Result<Vec<TileId>> {
    let order = mesh.snake_order();
    if result.partitions.len() > order.len() {
        return Err(Error::TooManyPartitions {
            partitions: result.partitions.len(),
            tiles: order.len(),
        });
    }
    Ok(order.into_iter().take(result.partitions.len()).collect())
}

/// Cross-partition channels, merged per tile pair.
pub fn dependencies(
    graph: &StreamGraph,
    steady: &SteadyState,
    result: &PartitionResult,
    placement: &[TileId],
) -> Result<Vec<Dependency>> {
    let mut deps: Vec<Dependency> = Vec::new();
    for channel in graph.root().channels() {
        let items = steady.channel_items(&channel);
        if items == 0 {
            continue;
        }
        let src = endpoint_tile(graph, result, placement, channel.from)?;
        let dst = endpoint_tile(graph, result, placement, channel.to)?;
        if src == dst {
            continue;
        }
        match deps.iter_mut().find(|d| d.src == src && d.dst == dst) {
            Some(dep) => dep.items = dep.items.saturating_add(items),
            None => deps.push(Dependency { src, dst, items }),
        }
    }
    debug!("layout: {} inter-tile dependencies", deps.len());
    Ok(deps)
}

fn endpoint_tile(
    graph: &StreamGraph,
    result: &PartitionResult,
    placement: &[TileId],
    vertex: Vertex,
) -> Result<TileId> {
    result
        .partition_of_vertex(vertex)
        .and_then(|p| placement.get(p).copied())
        .ok_or_else(|| {
            let id = match vertex {
                Vertex::Filter(id) | Vertex::Splitter(id) | Vertex::Joiner(id) => id,
            };
            Error::InvalidGraph {
                node: graph
                    .node(id)
                    .map(|n| n.describe())
                    .unwrap_or_else(|| id.to_string()),
                detail: "channel endpoint was not assigned to any partition".into(),
            }
        })
}

pub fn layout(
    graph: &StreamGraph,
    steady: &SteadyState,
    result: &PartitionResult,
    mesh: &Mesh,
) -> Result<Layout> {
    let placement = place(result, mesh)?;
    let dependencies = dependencies(graph, steady, result, &placement)?;
    Ok(Layout {
        placement,
        dependencies,
    })
}
