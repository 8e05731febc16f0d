use std::fmt;

use serde::{Deserialize, Serialize};

/// WRS tile identity: a (path, row) pair addressing one fixed footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct TileId {
    pub path: u32,
    pub row: u32,
}

impl TileId {
    pub fn new(path: u32, row: u32) -> Self {
        Self { path, row }
    }
}

impl From<(u32, u32)> for TileId {
    fn from((path, row): (u32, u32)) -> Self {
        Self { path, row }
    }
}

impl From<TileId> for (u32, u32) {
    fn from(t: TileId) -> Self {
        (t.path, t.row)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.path, self.row)
    }
}

/// Deterministic export identifier for one (year, tile) cell.
pub fn export_id(year: i32, tile: TileId) -> String {
    format!("{}_{}_{}", year, tile.path, tile.row)
}
