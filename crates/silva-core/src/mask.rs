//! Per-scene cloud masking and band building.
//!
//! For each scene this produces the configured band list with contaminated
//! pixels marked no-data: cloud/shadow pixels from the scene QA mask, plus
//! everything outside the scene footprint buffered inward by a fixed margin
//! (tile-edge mosaic seams). Index bands are computed after masking, so
//! no-data propagates into them.

use std::collections::BTreeMap;

use crate::bands::Band;
use crate::error::{Error, Result};
use crate::geometry::Region;
use crate::raster::Raster;
use crate::source::Scene;

/// The per-scene band stack handed to the temporal reducer.
#[derive(Debug, Clone)]
pub struct BandStack {
    pub scene_id: String,
    /// Bands in requested order, all on the scene grid.
    pub bands: Vec<(Band, Raster)>,
}

impl BandStack {
    pub fn grid(&self) -> Option<&Raster> {
        self.bands.first().map(|(_, r)| r)
    }

    pub fn band(&self, band: Band) -> Option<&Raster> {
        self.bands
            .iter()
            .find(|(b, _)| *b == band)
            .map(|(_, r)| r)
    }
}

/// Build the requested bands for one scene, cloud-masked and restricted to
/// the inward-buffered scene footprint (`footprint_buffer_m` is negative for
/// an inward buffer).
pub fn build_bands(scene: &Scene, bands: &[Band], footprint_buffer_m: f64) -> Result<BandStack> {
    let grid = scene
        .grid()
        .ok_or_else(|| Error::EmptyScene(scene.id.clone()))?
        .clone();

    if scene.qa_cloud.len() != grid.data.len() {
        return Err(Error::GridMismatch(format!("{} qa mask", scene.id)));
    }
    for raster in scene.channels.values() {
        if !raster.grid_matches(&grid) {
            return Err(Error::GridMismatch(scene.id.clone()));
        }
    }

    let region = Region::from_raster(&grid).buffer(footprint_buffer_m);

    // Raw channels needed: the requested raws plus every index input.
    let mut needed: Vec<Band> = Vec::new();
    for band in bands {
        let deps = if band.is_index() {
            band.inputs()
        } else {
            std::slice::from_ref(band)
        };
        for dep in deps {
            if !needed.contains(dep) {
                needed.push(*dep);
            }
        }
    }

    let mut masked: BTreeMap<Band, Raster> = BTreeMap::new();
    for band in needed {
        let channel = scene.channels.get(&band).ok_or_else(|| Error::MissingChannel {
            scene: scene.id.clone(),
            band,
        })?;
        masked.insert(band, mask_channel(channel, &scene.qa_cloud, &region));
    }

    let mut out = Vec::with_capacity(bands.len());
    for &band in bands {
        let raster = if band.is_index() {
            compute_index(band, &masked, &grid)
        } else {
            masked[&band].clone()
        };
        out.push((band, raster));
    }

    Ok(BandStack {
        scene_id: scene.id.clone(),
        bands: out,
    })
}

fn mask_channel(channel: &Raster, qa_cloud: &[bool], region: &Region) -> Raster {
    let mut out = channel.clone();
    for row in 0..out.height {
        for col in 0..out.width {
            let idx = row * out.width + col;
            let (x, y) = out.pixel_center(row, col);
            if qa_cloud[idx] || !region.contains(x, y) {
                out.data[idx] = f32::NAN;
            }
        }
    }
    out
}

fn compute_index(band: Band, raws: &BTreeMap<Band, Raster>, grid: &Raster) -> Raster {
    let inputs: Vec<&Raster> = band.inputs().iter().map(|b| &raws[b]).collect();
    let mut out = Raster::like(grid, f32::NAN);

    let mut values = vec![0.0f32; inputs.len()];
    for idx in 0..out.data.len() {
        let mut ok = true;
        for (slot, raster) in values.iter_mut().zip(&inputs) {
            let v = raster.data[idx];
            if !v.is_finite() {
                ok = false;
                break;
            }
            *slot = v;
        }
        if ok {
            out.data[idx] = band.evaluate(&values);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::tile::TileId;

    /// 4x4 scene, 30 m pixels, uniform reflectance per channel.
    fn scene(cloudy: &[usize]) -> Scene {
        let mut channels = BTreeMap::new();
        for (band, value) in [
            (Band::Red, 0.05),
            (Band::Nir, 0.5),
            (Band::Swir1, 0.2),
            (Band::Swir2, 0.1),
        ] {
            channels.insert(band, Raster::new(4, 4, 0.0, 120.0, 0.0, 120.0, value));
        }
        let mut qa = vec![false; 16];
        for &i in cloudy {
            qa[i] = true;
        }
        Scene {
            id: "LC08_220076_20150110".to_string(),
            tile: TileId::new(220, 76),
            date: NaiveDate::from_ymd_opt(2015, 1, 10).unwrap(),
            cloud_cover: cloudy.len() as f32 / 16.0 * 100.0,
            channels,
            qa_cloud: qa,
        }
    }

    #[test]
    fn cloudy_pixels_become_nodata_in_every_band() {
        let stack = build_bands(&scene(&[0, 5]), &[Band::Red, Band::Ndvi], 0.0).unwrap();
        let red = stack.band(Band::Red).unwrap();
        let ndvi = stack.band(Band::Ndvi).unwrap();
        assert!(!red.is_valid(0, 0));
        assert!(!ndvi.is_valid(1, 1));
        assert!(red.is_valid(2, 2));
        assert!((ndvi.get(2, 2) - 0.818_18).abs() < 1e-3);
    }

    #[test]
    fn inward_buffer_discards_edge_pixels() {
        // 30 m margin removes the outer ring of a 4x4 / 120 m scene.
        let stack = build_bands(&scene(&[]), &[Band::Nir], -30.0).unwrap();
        let nir = stack.band(Band::Nir).unwrap();
        assert_eq!(nir.valid_count(), 4);
        assert!(nir.is_valid(1, 1));
        assert!(!nir.is_valid(0, 1));
    }

    #[test]
    fn missing_channel_is_an_error() {
        let mut s = scene(&[]);
        s.channels.remove(&Band::Nir);
        let err = build_bands(&s, &[Band::Ndvi], 0.0).unwrap_err();
        assert!(matches!(err, Error::MissingChannel { band: Band::Nir, .. }));
    }

    #[test]
    fn requested_order_is_preserved() {
        let bands = [Band::Swir2, Band::Ndwi, Band::Red];
        let stack = build_bands(&scene(&[]), &bands, 0.0).unwrap();
        let got: Vec<Band> = stack.bands.iter().map(|(b, _)| *b).collect();
        assert_eq!(got, bands);
    }
}
