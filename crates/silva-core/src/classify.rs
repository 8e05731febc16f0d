//! Training and application seams.
//!
//! The classifier engine is a collaborator behind a trait: the pipeline hands
//! it a sample set, a label field and the ordered feature-name list, and gets
//! back an opaque model it applies to the full feature raster. A fresh model
//! is trained per (year, tile) cell and discarded after application.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::features::FeatureRaster;
use crate::geometry::Region;
use crate::raster::{ClassifiedRaster, NODATA_CLASS};
use crate::sample::SampleSet;

/// Fixed training configuration. `trees` is the ensemble size; engines that
/// are not tree ensembles may ignore it.
#[derive(Debug, Clone, Copy)]
pub struct TrainConfig {
    pub trees: u32,
    pub seed: u64,
}

/// A trained, cell-local model.
pub trait Model: Send + Sync {
    /// Classify one feature vector, in training feature order.
    fn classify(&self, features: &[f32]) -> u8;
}

impl std::fmt::Debug for dyn Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Model")
    }
}

/// Classifier engine collaborator.
pub trait ClassifierEngine: Send + Sync {
    fn train(
        &self,
        samples: &SampleSet,
        label_field: &str,
        feature_names: &[String],
        config: &TrainConfig,
    ) -> Result<Box<dyn Model>>;
}

/// Validate the sample set and train. An empty or single-class sample set is
/// fatal for the cell; no fallback model is substituted.
pub fn train_classifier(
    engine: &dyn ClassifierEngine,
    samples: &SampleSet,
    label_field: &str,
    feature_names: &[String],
    config: &TrainConfig,
) -> Result<Box<dyn Model>> {
    if samples.is_empty() {
        return Err(Error::EmptySample);
    }
    let classes = samples.classes();
    if classes.len() < 2 {
        return Err(Error::SingleClass(classes[0]));
    }
    if samples
        .features
        .iter()
        .any(|v| v.len() != feature_names.len())
    {
        return Err(Error::Train(
            "sample vector length does not match the feature space".to_string(),
        ));
    }
    engine.train(samples, label_field, feature_names, config)
}

/// Classify every pixel of the feature raster, no-data included (sentinel
/// features classify like any other value; only pixels outside the ROI carry
/// the no-data class). Rows run on the rayon pool.
pub fn apply_model(
    model: &dyn Model,
    mosaic: &FeatureRaster,
    roi: &Region,
    year: i32,
) -> ClassifiedRaster {
    let grid = match mosaic.grid() {
        Some(g) => g,
        None => {
            return ClassifiedRaster {
                data: Vec::new(),
                width: 0,
                height: 0,
                min_x: 0.0,
                max_x: 0.0,
                min_y: 0.0,
                max_y: 0.0,
                year,
            }
        }
    };

    let width = grid.width;
    let data: Vec<u8> = (0..grid.height)
        .into_par_iter()
        .flat_map_iter(|row| {
            let mut vector = Vec::with_capacity(mosaic.names.len());
            let mut out = Vec::with_capacity(width);
            for col in 0..width {
                let (x, y) = grid.pixel_center(row, col);
                if roi.contains(x, y) {
                    mosaic.pixel(row * width + col, &mut vector);
                    out.push(model.classify(&vector));
                } else {
                    out.push(NODATA_CLASS);
                }
            }
            out
        })
        .collect();

    let mut raster = ClassifiedRaster::like(grid, year);
    raster.data = data;
    raster
}
