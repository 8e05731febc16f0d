//! External collaborator seams: the scene archive, the reference label map,
//! and the export sink. The pipeline is written against these traits so it is
//! portable to any raster backend with equivalent primitives.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::bands::Band;
use crate::calendar::DateRange;
use crate::error::Result;
use crate::geometry::Region;
use crate::raster::{ClassifiedRaster, Raster};
use crate::tile::TileId;

/// One satellite acquisition of a tile: raw channels plus a QA cloud mask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub tile: TileId,
    pub date: NaiveDate,
    /// Scene-level cloud cover, percent.
    pub cloud_cover: f32,
    /// Raw reflectance channels, all on the same grid.
    pub channels: BTreeMap<Band, Raster>,
    /// Per-pixel cloud/shadow flag, row-major, aligned to the channel grid.
    /// `true` marks a contaminated pixel.
    pub qa_cloud: Vec<bool>,
}

impl Scene {
    /// The grid template shared by all channels, if any channel exists.
    pub fn grid(&self) -> Option<&Raster> {
        self.channels.values().next()
    }

    /// Scene footprint in projected metres.
    pub fn footprint(&self) -> Option<Region> {
        self.grid().map(Region::from_raster)
    }
}

/// One archive query: tile identity, inclusive date range, cloud ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneQuery {
    pub tile: TileId,
    pub range: DateRange,
    /// Maximum scene-level cloud cover, percent.
    pub max_cloud_cover: f32,
}

/// Raster source collaborator: query scenes by tile, date range and cloud
/// ceiling. Implementations may under-return; the window selector compensates
/// by re-issuing queries.
pub trait SceneSource: Send + Sync {
    fn query(&self, query: &SceneQuery) -> Result<Vec<Scene>>;
}

/// Reference label collaborator: the per-tile ground-truth class raster,
/// aligned to the tile grid. Class values are small integers; no-data is NaN.
pub trait LabelSource: Send + Sync {
    fn reference(&self, tile: TileId) -> Option<Raster>;
}

impl LabelSource for BTreeMap<TileId, Raster> {
    fn reference(&self, tile: TileId) -> Option<Raster> {
        self.get(&tile).cloned()
    }
}

/// Export sink collaborator. Submission is fire-and-forget from the
/// pipeline's perspective; durability and retry are the sink's business.
pub trait ExportSink: Send + Sync {
    fn submit(
        &self,
        raster: &ClassifiedRaster,
        id: &str,
        scale_m: f64,
        max_pixels: f64,
    ) -> Result<()>;
}
