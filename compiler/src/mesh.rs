// mesh.rs — Rectangular tile mesh: coordinates, directions, XY routes
//
// Tiles are numbered row-major; row 0 is the northern edge. The mesh is
// immutable after construction and answers geometry queries only.
//
// Preconditions: none.
// Postconditions: every returned `TileId` is inside the mesh.
// Failure modes: `Error::NotAdjacent` from `direction`; `Error::MalformedRoute`
//                for tiles outside the mesh.
// Side effects: none.

use std::fmt;

use crate::config::TargetConfig;
use crate::error::{Error, Result};
use crate::id::TileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Direction::North => 'N',
            Direction::East => 'E',
            Direction::South => 'S',
            Direction::West => 'W',
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

/// A tile and its grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub id: TileId,
    pub row: u32,
    pub col: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mesh {
    rows: u32,
    cols: u32,
}

impl Mesh {
    pub fn new(rows: u32, cols: u32) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidConfig(format!(
                "mesh must have at least one row and column (got {}x{})",
                rows, cols
            )));
        }
        Ok(Mesh { rows, cols })
    }

    pub fn from_config(config: &TargetConfig) -> Result<Self> {
        Mesh::new(config.rows, config.cols)
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: TileId) -> bool {
        (id.0 as usize) < self.len()
    }

    pub fn tile(&self, id: TileId) -> Option<Tile> {
        if !self.contains(id) {
            return None;
        }
        Some(Tile {
            id,
            row: id.0 / self.cols,
            col: id.0 % self.cols,
        })
    }

    pub fn tile_at(&self, row: u32, col: u32) -> Option<TileId> {
        (row < self.rows && col < self.cols).then(|| TileId(row * self.cols + col))
    }

    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..self.len() as u32).filter_map(move |i| self.tile(TileId(i)))
    }

    fn lookup(&self, id: TileId) -> Result<Tile> {
        self.tile(id).ok_or_else(|| Error::MalformedRoute {
            tile: id,
            detail: format!("tile is outside the {}x{} mesh", self.rows, self.cols),
        })
    }

    /// Compass direction from `from` to an orthogonally adjacent `to`.
    pub fn direction(&self, from: TileId, to: TileId) -> Result<Direction> {
        let a = self.lookup(from)?;
        let b = self.lookup(to)?;
        match (b.row as i64 - a.row as i64, b.col as i64 - a.col as i64) {
            (-1, 0) => Ok(Direction::North),
            (1, 0) => Ok(Direction::South),
            (0, 1) => Ok(Direction::East),
            (0, -1) => Ok(Direction::West),
            _ => Err(Error::NotAdjacent { from, to }),
        }
    }

    pub fn neighbor(&self, id: TileId, dir: Direction) -> Option<TileId> {
        let t = self.tile(id)?;
        match dir {
            Direction::North => t.row.checked_sub(1).and_then(|r| self.tile_at(r, t.col)),
            Direction::South => self.tile_at(t.row + 1, t.col),
            Direction::East => self.tile_at(t.row, t.col + 1),
            Direction::West => t.col.checked_sub(1).and_then(|c| self.tile_at(t.row, c)),
        }
    }

    pub fn manhattan(&self, a: TileId, b: TileId) -> Result<u32> {
        let a = self.lookup(a)?;
        let b = self.lookup(b)?;
        Ok(a.row.abs_diff(b.row) + a.col.abs_diff(b.col))
    }

    /// Dimension-ordered shortest path (columns first, then rows), both
    /// endpoints included.
    pub fn route(&self, from: TileId, to: TileId) -> Result<Vec<TileId>> {
        let a = self.lookup(from)?;
        let b = self.lookup(to)?;
        let mut path = vec![from];
        let (mut row, mut col) = (a.row, a.col);
        while col != b.col {
            col = if col < b.col { col + 1 } else { col - 1 };
            path.extend(self.tile_at(row, col));
        }
        while row != b.row {
            row = if row < b.row { row + 1 } else { row - 1 };
            path.extend(self.tile_at(row, col));
        }
        Ok(path)
    }

    /// Boustrophedon order: row 0 west to east, row 1 east to west, ...
    /// Consecutive tiles in this order are always neighbours.
    pub fn snake_order(&self) -> Vec<TileId> {
        let mut order = Vec::with_capacity(self.len());
        for row in 0..self.rows {
            let cols: Vec<u32> = if row % 2 == 0 {
                (0..self.cols).collect()
            } else {
                (0..self.cols).rev().collect()
            };
            order.extend(cols.into_iter().filter_map(|c| self.tile_at(row, c)));
        }
        order
    }
}
