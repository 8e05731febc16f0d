//! Pixel sampling for training.
//!
//! Draws a uniform-at-random, without-replacement sample of valid pixels from
//! the feature raster joined with the reference label raster, restricted to
//! the region of interest. Candidate enumeration runs on the rayon pool; the
//! draw itself is a single seeded pass, so parallelism never changes the
//! output distribution.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::features::FeatureRaster;
use crate::geometry::Region;
use crate::raster::Raster;

/// A finite set of (feature vector, label) pairs.
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f32>>,
    pub labels: Vec<u8>,
}

impl SampleSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Distinct labels, ascending.
    pub fn classes(&self) -> Vec<u8> {
        let mut classes: Vec<u8> = self.labels.clone();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

/// Sample up to `count` labeled pixels. The count is a ceiling: when fewer
/// valid pixels exist, everything available is returned. Pixels are taken on
/// a stride grid matching `scale_m` (native resolution when `scale_m` equals
/// the pixel size) and must be inside `roi`, feature-valid and label-valid.
pub fn sample_pixels(
    mosaic: &FeatureRaster,
    reference: &Raster,
    roi: &Region,
    count: usize,
    scale_m: f64,
    seed: u64,
) -> Result<SampleSet> {
    let grid = match mosaic.grid() {
        Some(g) => g,
        None => return Ok(SampleSet::default()),
    };
    if !grid.grid_matches(reference) {
        return Err(Error::GridMismatch("reference".to_string()));
    }

    let (px, _) = grid.pixel_size();
    let stride = if px > 0.0 {
        ((scale_m / px).round() as usize).max(1)
    } else {
        1
    };

    // Candidate pixel indices, enumerated per stride row in parallel and
    // flattened in row order so the result is independent of scheduling.
    let rows: Vec<usize> = (0..grid.height).step_by(stride).collect();
    let candidates: Vec<usize> = rows
        .par_iter()
        .map(|&row| {
            let mut found = Vec::new();
            let mut col = 0;
            while col < grid.width {
                let idx = row * grid.width + col;
                let (x, y) = grid.pixel_center(row, col);
                if mosaic.valid[idx] && reference.data[idx].is_finite() && roi.contains(x, y)
                {
                    found.push(idx);
                }
                col += stride;
            }
            found
        })
        .collect::<Vec<Vec<usize>>>()
        .into_iter()
        .flatten()
        .collect();

    let amount = count.min(candidates.len());
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut picks: Vec<usize> = rand::seq::index::sample(&mut rng, candidates.len(), amount)
        .iter()
        .map(|i| candidates[i])
        .collect();
    picks.sort_unstable();

    let mut features = Vec::with_capacity(amount);
    let mut labels = Vec::with_capacity(amount);
    for idx in picks {
        let mut vector = Vec::with_capacity(mosaic.names.len());
        mosaic.pixel(idx, &mut vector);
        features.push(vector);
        labels.push(reference.data[idx].round() as u8);
    }

    Ok(SampleSet {
        feature_names: mosaic.names.clone(),
        features,
        labels,
    })
}
