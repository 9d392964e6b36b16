// config.rs — Target machine parameters shared by every pass
//
// `TargetConfig` is built once (from defaults, a JSON file, and CLI
// overrides), validated, and then only borrowed. No pass mutates it.
//
// Preconditions: none.
// Postconditions: a validated config has a non-empty mesh, a non-zero code
//                 cache, and a tile budget no larger than the mesh.
// Failure modes: `Error::InvalidConfig`, `Error::Json`.
// Side effects: none.

use serde::{Deserialize, Serialize};

use crate::cost::CodeSizePolicy;
use crate::error::{Error, Result};

/// Default per-tile instruction store, in code units.
pub const DEFAULT_CODE_CACHE: u64 = 8192;

/// Default additive penalty for filters that perform external I/O.
pub const DEFAULT_IO_PENALTY: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    pub rows: u32,
    pub cols: u32,
    /// Tile budget for the partitioner. `None` means the whole mesh.
    pub tiles: Option<usize>,
    pub code_cache_size: u64,
    pub io_penalty: u64,
    pub splitter_item_work: u64,
    pub joiner_item_work: u64,
    pub code_policy: CodeSizePolicy,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            rows: 4,
            cols: 4,
            tiles: None,
            code_cache_size: DEFAULT_CODE_CACHE,
            io_penalty: DEFAULT_IO_PENALTY,
            splitter_item_work: 1,
            joiner_item_work: 1,
            code_policy: CodeSizePolicy::Sum,
        }
    }
}

impl TargetConfig {
    /// Parse a (possibly partial) config from JSON and validate it.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: TargetConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// A `rows x cols` mesh with every tile in the budget.
    pub fn with_mesh(rows: u32, cols: u32) -> Self {
        TargetConfig {
            rows,
            cols,
            ..TargetConfig::default()
        }
    }

    /// The smallest near-square mesh holding `tiles` tiles, with the budget
    /// pinned to exactly `tiles`.
    pub fn for_tile_count(tiles: usize) -> Self {
        let (rows, cols) = near_square(tiles);
        TargetConfig {
            rows,
            cols,
            tiles: Some(tiles),
            ..TargetConfig::default()
        }
    }

    pub fn with_code_cache(mut self, size: u64) -> Self {
        self.code_cache_size = size;
        self
    }

    pub fn with_overheads(mut self, splitter_item_work: u64, joiner_item_work: u64) -> Self {
        self.splitter_item_work = splitter_item_work;
        self.joiner_item_work = joiner_item_work;
        self
    }

    pub fn with_io_penalty(mut self, penalty: u64) -> Self {
        self.io_penalty = penalty;
        self
    }

    pub fn with_code_policy(mut self, policy: CodeSizePolicy) -> Self {
        self.code_policy = policy;
        self
    }

    pub fn mesh_size(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Number of tiles the partitioner may use.
    pub fn tile_budget(&self) -> usize {
        self.tiles.unwrap_or_else(|| self.mesh_size())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(Error::InvalidConfig(format!(
                "mesh must have at least one row and column (got {}x{})",
                self.rows, self.cols
            )));
        }
        if self.code_cache_size == 0 {
            return Err(Error::InvalidConfig(
                "code_cache_size must be positive".into(),
            ));
        }
        let budget = self.tile_budget();
        if budget == 0 {
            return Err(Error::InvalidConfig("tile budget must be positive".into()));
        }
        if budget > self.mesh_size() {
            return Err(Error::InvalidConfig(format!(
                "tile budget {} exceeds the {}x{} mesh",
                budget, self.rows, self.cols
            )));
        }
        Ok(())
    }
}

/// `(rows, cols)` of the smallest near-square grid with at least `n` cells.
fn near_square(n: usize) -> (u32, u32) {
    let n = n.max(1);
    let mut cols = 1usize;
    while cols * cols < n {
        cols += 1;
    }
    let rows = n.div_ceil(cols);
    (rows as u32, cols as u32)
}
