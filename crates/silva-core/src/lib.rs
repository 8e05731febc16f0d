//! Annual forest-plantation classification from multi-temporal composites.
//!
//! For each (tile, year) cell the pipeline selects cloud-filtered scene
//! windows per phenological period, builds masked band stacks, reduces each
//! period to a composite, assembles an ordered feature raster, samples it
//! against a reference label map, trains a per-cell classifier and exports
//! the classified raster keyed `{year}_{path}_{row}`.
//!
//! The satellite archive, reference labels, classifier engine and export
//! sink are collaborators behind traits (`source`, `classify`); everything
//! in between is deterministic given the run configuration and seed.

pub mod bands;
pub mod calendar;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod geometry;
pub mod mask;
pub mod pipeline;
pub mod raster;
pub mod reduce;
pub mod sample;
pub mod source;
pub mod tile;
pub mod window;

pub use bands::Band;
pub use calendar::{DateRange, PeriodDef};
pub use classify::{ClassifierEngine, Model, TrainConfig};
pub use config::RunConfig;
pub use engine::ForestEngine;
pub use error::{Error, Result};
pub use features::FeatureRaster;
pub use geometry::{Region, TileFootprints};
pub use pipeline::{CellId, Pipeline, RunReport};
pub use raster::{ClassifiedRaster, Raster, NODATA_CLASS};
pub use reduce::Reducer;
pub use sample::SampleSet;
pub use source::{ExportSink, LabelSource, Scene, SceneQuery, SceneSource};
pub use tile::TileId;
pub use window::WindowSelector;
