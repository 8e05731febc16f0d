//! Feature-space assembly.
//!
//! Per-period reduced rasters are concatenated in declared period order with
//! band names qualified as `{period}_{band}_{reducer}`, clipped to the tile
//! ROI, restricted to the declared feature space, sentinel-filled and scaled.
//! The same assembly runs before sampling and before inference, so feature
//! order and scaling are identical on both sides.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{clip, Region};
use crate::raster::Raster;

/// Sentinel written into no-data pixels after validity is recorded.
pub const SENTINEL: f32 = 0.0;

/// An ordered multi-band raster plus a per-pixel validity mask.
///
/// `valid[i]` is true when every band had data at pixel `i` before the
/// sentinel fill; sampling consults it, inference deliberately does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRaster {
    pub names: Vec<String>,
    pub bands: Vec<Raster>,
    pub valid: Vec<bool>,
}

impl FeatureRaster {
    pub fn width(&self) -> usize {
        self.bands.first().map_or(0, |r| r.width)
    }

    pub fn height(&self) -> usize {
        self.bands.first().map_or(0, |r| r.height)
    }

    /// Pixel count of the grid.
    pub fn len(&self) -> usize {
        self.bands.first().map_or(0, |r| r.data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn grid(&self) -> Option<&Raster> {
        self.bands.first()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Copy the feature vector of pixel `idx` into `out`.
    pub fn pixel(&self, idx: usize, out: &mut Vec<f32>) {
        out.clear();
        out.extend(self.bands.iter().map(|r| r.data[idx]));
    }
}

/// Concatenate per-period reduced rasters, clipped to `roi`. Band names come
/// out as `{period}_{band_name}`; no-data is preserved (not yet filled).
pub fn assemble(
    periods: &[(String, Vec<(String, Raster)>)],
    roi: &Region,
) -> Result<FeatureRaster> {
    let mut names = Vec::new();
    let mut bands: Vec<Raster> = Vec::new();

    for (period, rasters) in periods {
        for (band_name, raster) in rasters {
            if let Some(first) = bands.first() {
                if !raster.grid_matches(first) {
                    return Err(Error::GridMismatch(format!("{}_{}", period, band_name)));
                }
            }
            names.push(format!("{}_{}", period, band_name));
            bands.push(clip(raster, roi));
        }
    }

    let len = bands.first().map_or(0, |r| r.data.len());
    let valid = (0..len)
        .map(|idx| bands.iter().all(|r| r.data[idx].is_finite()))
        .collect();

    Ok(FeatureRaster {
        names,
        bands,
        valid,
    })
}

/// Restrict to the declared feature space (order significant), recompute
/// validity over the selected bands only, fill remaining no-data with the
/// sentinel and apply the integer scaling factor.
pub fn into_feature_space(
    mosaic: FeatureRaster,
    feature_space: &[String],
    scaling: f64,
) -> Result<FeatureRaster> {
    let mut bands = Vec::with_capacity(feature_space.len());
    for name in feature_space {
        let idx = mosaic
            .index_of(name)
            .ok_or_else(|| Error::MissingFeature(name.clone()))?;
        bands.push(mosaic.bands[idx].clone());
    }

    let len = bands.first().map_or(0, |r| r.data.len());
    let valid: Vec<bool> = (0..len)
        .map(|idx| bands.iter().all(|r| r.data[idx].is_finite()))
        .collect();

    for raster in &mut bands {
        for v in &mut raster.data {
            if !v.is_finite() {
                *v = SENTINEL;
            }
            *v = (*v as f64 * scaling) as f32;
        }
    }

    Ok(FeatureRaster {
        names: feature_space.to_vec(),
        bands,
        valid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(fill: f32) -> Raster {
        Raster::new(3, 3, 0.0, 90.0, 0.0, 90.0, fill)
    }

    fn full_roi() -> Region {
        Region::new(0.0, 90.0, 0.0, 90.0)
    }

    fn periods() -> Vec<(String, Vec<(String, Raster)>)> {
        vec![
            (
                "WET1".to_string(),
                vec![
                    ("NIR_qmo".to_string(), raster(0.5)),
                    ("NDVI_qmo".to_string(), raster(0.8)),
                ],
            ),
            (
                "DRY1".to_string(),
                vec![
                    ("NIR_qmo".to_string(), raster(0.3)),
                    ("NDVI_qmo".to_string(), raster(0.4)),
                ],
            ),
        ]
    }

    #[test]
    fn names_are_period_qualified_in_declaration_order() {
        let mosaic = assemble(&periods(), &full_roi()).unwrap();
        assert_eq!(
            mosaic.names,
            vec!["WET1_NIR_qmo", "WET1_NDVI_qmo", "DRY1_NIR_qmo", "DRY1_NDVI_qmo"]
        );
        assert!(mosaic.valid.iter().all(|&v| v));
    }

    #[test]
    fn feature_space_selection_reorders_and_drops() {
        let mosaic = assemble(&periods(), &full_roi()).unwrap();
        let space = vec!["DRY1_NDVI_qmo".to_string(), "WET1_NIR_qmo".to_string()];
        let selected = into_feature_space(mosaic, &space, 10_000.0).unwrap();
        assert_eq!(selected.names, space);
        assert!((selected.bands[0].data[0] - 4000.0).abs() < 1e-3);
        assert!((selected.bands[1].data[0] - 5000.0).abs() < 1e-3);
    }

    #[test]
    fn missing_feature_is_an_error() {
        let mosaic = assemble(&periods(), &full_roi()).unwrap();
        let err =
            into_feature_space(mosaic, &["WET9_NIR_qmo".to_string()], 10_000.0).unwrap_err();
        assert!(matches!(err, Error::MissingFeature(_)));
    }

    #[test]
    fn scaling_is_invertible_within_tolerance() {
        let mosaic = assemble(&periods(), &full_roi()).unwrap();
        let space: Vec<String> = mosaic.names.clone();
        let scaled = into_feature_space(mosaic.clone(), &space, 10_000.0).unwrap();
        for (orig, scaled) in mosaic.bands.iter().zip(&scaled.bands) {
            for (a, b) in orig.data.iter().zip(&scaled.data) {
                assert!((a - b / 10_000.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn nodata_is_sentinel_filled_but_tracked_as_invalid() {
        let mut ps = periods();
        ps[0].1[0].1.data[4] = f32::NAN;
        let mosaic = assemble(&ps, &full_roi()).unwrap();
        assert!(!mosaic.valid[4]);

        let space: Vec<String> = mosaic.names.clone();
        let filled = into_feature_space(mosaic, &space, 10_000.0).unwrap();
        assert_eq!(filled.bands[0].data[4], SENTINEL);
        assert!(!filled.valid[4]);
    }

    #[test]
    fn validity_is_recomputed_over_the_selected_space_only() {
        let mut ps = periods();
        ps[0].1[0].1.data[4] = f32::NAN; // WET1_NIR only
        let mosaic = assemble(&ps, &full_roi()).unwrap();
        let space = vec!["DRY1_NDVI_qmo".to_string()];
        let selected = into_feature_space(mosaic, &space, 1.0).unwrap();
        // The dropped band's gap no longer poisons validity.
        assert!(selected.valid[4]);
    }

    #[test]
    fn clip_to_roi_invalidates_outside_pixels() {
        let roi = Region::new(0.0, 30.0, 0.0, 30.0); // single pixel
        let mosaic = assemble(&periods(), &roi).unwrap();
        assert_eq!(mosaic.valid.iter().filter(|&&v| v).count(), 1);
        assert!(mosaic.valid[0]);
    }
}
