use serde::{Deserialize, Serialize};

use crate::raster::Raster;
use crate::tile::TileId;

/// Axis-aligned region of interest in projected metres.
///
/// Tile footprints are modelled as rectangles; inward buffering (negative
/// margin) shrinks the rectangle to discard tile-edge mosaic seams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Region {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Footprint of a raster's bounds.
    pub fn from_raster(r: &Raster) -> Self {
        Self::new(r.min_x, r.max_x, r.min_y, r.max_y)
    }

    /// Buffer by `margin_m` on every side. Negative margins shrink; a region
    /// shrunk past its own extent collapses to empty.
    pub fn buffer(&self, margin_m: f64) -> Region {
        Region {
            min_x: self.min_x - margin_m,
            max_x: self.max_x + margin_m,
            min_y: self.min_y - margin_m,
            max_y: self.max_y + margin_m,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Mask a raster to a region: pixels whose centre falls outside become no-data.
pub fn clip(raster: &Raster, region: &Region) -> Raster {
    let mut out = raster.clone();
    for row in 0..out.height {
        for col in 0..out.width {
            let (x, y) = out.pixel_center(row, col);
            if !region.contains(x, y) {
                out.set(row, col, f32::NAN);
            }
        }
    }
    out
}

/// Geometry collaborator: per-tile footprint lookup.
pub trait TileFootprints: Send + Sync {
    fn footprint(&self, tile: TileId) -> Option<Region>;
}

impl TileFootprints for std::collections::BTreeMap<TileId, Region> {
    fn footprint(&self, tile: TileId) -> Option<Region> {
        self.get(&tile).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_buffer_shrinks_inward() {
        let r = Region::new(0.0, 10_000.0, 0.0, 10_000.0);
        let b = r.buffer(-4000.0);
        assert_eq!(b, Region::new(4000.0, 6000.0, 4000.0, 6000.0));
        assert!(!b.is_empty());
        assert!(r.buffer(-6000.0).is_empty());
    }

    #[test]
    fn clip_masks_pixels_outside_region() {
        let raster = Raster::new(4, 4, 0.0, 120.0, 0.0, 120.0, 7.0);
        let region = Region::new(0.0, 60.0, 0.0, 60.0);
        let clipped = clip(&raster, &region);
        // Interior 2x2 block survives, the rest is no-data.
        assert_eq!(clipped.valid_count(), 4);
        assert!(clipped.is_valid(0, 0));
        assert!(!clipped.is_valid(0, 3));
        assert!(!clipped.is_valid(3, 3));
    }
}
