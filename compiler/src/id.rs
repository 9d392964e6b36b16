// id.rs — Stable identifiers for stream nodes and mesh tiles
//
// Node IDs are allocated in pre-order while a stream graph is numbered, so
// the same input always yields the same IDs. Tile IDs are row-major indices
// into the mesh.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier for a stream node (filter or container).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

/// Stable identifier for a tile of the mesh (row-major).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Allocator for node IDs. Produces monotonically increasing IDs in
/// allocation (pre-order) order.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_node: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    /// Number of IDs handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next_node
    }
}
