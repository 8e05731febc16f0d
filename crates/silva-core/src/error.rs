use thiserror::Error;

use crate::bands::Band;
use crate::tile::TileId;

/// Errors produced by the classification pipeline.
///
/// Only a subset is fatal for a cell: anything raised between sampling and
/// training stops that (year, tile) cell. Scene-level problems (a bad scene in
/// an archive batch, a failed query attempt) are logged and skipped upstream.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid period template `{0}`")]
    PeriodTemplate(String),

    #[error("invalid calendar date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("scene query failed: {0}")]
    Query(String),

    #[error("scene `{0}` has no channels")]
    EmptyScene(String),

    #[error("scene `{scene}` is missing channel {band}")]
    MissingChannel { scene: String, band: Band },

    #[error("raster grid for `{0}` does not match the tile grid")]
    GridMismatch(String),

    #[error("feature `{0}` is not present in the assembled mosaic")]
    MissingFeature(String),

    #[error("no tile footprint registered for {0}")]
    UnknownTile(TileId),

    #[error("no reference raster registered for {0}")]
    MissingReference(TileId),

    #[error("sample set is empty")]
    EmptySample,

    #[error("sample set contains a single class ({0})")]
    SingleClass(u8),

    #[error("training failed: {0}")]
    Train(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("invalid run configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
