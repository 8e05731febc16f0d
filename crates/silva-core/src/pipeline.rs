//! Orchestrator: drives the (year × tile) cross product.
//!
//! Cells share no mutable state, so they run in parallel on the rayon pool,
//! bounded only by the source's own limits. Within a cell, data flows
//! strictly forward: window selection → masking/band building → temporal
//! reduction → assembly → sampling → training → application → export. A
//! failed cell is recorded and skipped; the run continues.

use std::fmt;
use std::time::Duration;

use log::{info, warn};
use rayon::prelude::*;

use crate::classify::{apply_model, train_classifier, ClassifierEngine, TrainConfig};
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::features::{assemble, into_feature_space, FeatureRaster};
use crate::geometry::{Region, TileFootprints};
use crate::mask::{build_bands, BandStack};
use crate::raster::{ClassifiedRaster, Raster};
use crate::sample::sample_pixels;
use crate::source::{ExportSink, LabelSource, SceneQuery, SceneSource};
use crate::tile::{export_id, TileId};
use crate::window::WindowSelector;

/// Label field name used for training, as in the reference raster.
pub const LABEL_FIELD: &str = "class";

/// One (year, tile) cell of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellId {
    pub year: i32,
    pub tile: TileId,
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tile {}", self.year, self.tile)
    }
}

/// Outcome of a full run: which cells exported, which failed and why.
#[derive(Debug, Default)]
pub struct RunReport {
    pub completed: Vec<CellId>,
    pub failed: Vec<(CellId, Error)>,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Pipeline<'a> {
    config: &'a RunConfig,
    source: &'a dyn SceneSource,
    footprints: &'a dyn TileFootprints,
    labels: &'a dyn LabelSource,
    engine: &'a dyn ClassifierEngine,
    sink: &'a dyn ExportSink,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a RunConfig,
        source: &'a dyn SceneSource,
        footprints: &'a dyn TileFootprints,
        labels: &'a dyn LabelSource,
        engine: &'a dyn ClassifierEngine,
        sink: &'a dyn ExportSink,
    ) -> Self {
        Self {
            config,
            source,
            footprints,
            labels,
            engine,
            sink,
        }
    }

    /// The (year × tile) cross product, year-major, in declaration order.
    pub fn cells(&self) -> Vec<CellId> {
        self.config
            .years
            .iter()
            .flat_map(|&year| {
                self.config
                    .tiles
                    .iter()
                    .map(move |&tile| CellId { year, tile })
            })
            .collect()
    }

    /// Run every cell, in parallel, collecting per-cell outcomes.
    pub fn run(&self) -> RunReport {
        let cells = self.cells();
        info!("starting run: {} cell(s)", cells.len());

        let outcomes: Vec<(CellId, Result<ClassifiedRaster>)> = cells
            .into_par_iter()
            .map(|cell| {
                let outcome = self.run_cell(cell);
                (cell, outcome)
            })
            .collect();

        let mut report = RunReport::default();
        for (cell, outcome) in outcomes {
            match outcome {
                Ok(_) => {
                    info!("cell {} exported", cell);
                    report.completed.push(cell);
                }
                Err(e) => {
                    warn!("cell {} failed: {}", cell, e);
                    report.failed.push((cell, e));
                }
            }
        }
        report
    }

    /// Run one cell end to end and submit its classification for export.
    pub fn run_cell(&self, cell: CellId) -> Result<ClassifiedRaster> {
        let config = self.config;
        let footprint = self
            .footprints
            .footprint(cell.tile)
            .ok_or(Error::UnknownTile(cell.tile))?;
        let reference = self
            .labels
            .reference(cell.tile)
            .ok_or(Error::MissingReference(cell.tile))?;
        let roi = footprint.buffer(config.roi_buffer_m);

        let mosaic = self.build_mosaic(cell, &reference, &roi)?;
        let mosaic = into_feature_space(mosaic, &config.feature_space, config.scaling)?;

        let cell_seed = self.cell_seed(cell);
        let samples = sample_pixels(
            &mosaic,
            &reference,
            &roi,
            config.samples,
            config.scale_m,
            cell_seed,
        )?;
        info!("cell {}: {} training sample(s)", cell, samples.len());

        let train_config = TrainConfig {
            trees: config.trees,
            seed: cell_seed,
        };
        let model = train_classifier(
            self.engine,
            &samples,
            LABEL_FIELD,
            &config.feature_space,
            &train_config,
        )?;

        let classified = apply_model(model.as_ref(), &mosaic, &roi, cell.year);

        // Fire-and-forget: sink failures are logged, never fatal.
        let id = export_id(cell.year, cell.tile);
        if let Err(e) = self
            .sink
            .submit(&classified, &id, config.scale_m, config.max_pixels)
        {
            warn!("export of {} failed: {}", id, e);
        }

        Ok(classified)
    }

    /// Assemble the per-period composites for one cell, unselected and
    /// unscaled (no-data still present).
    fn build_mosaic(
        &self,
        cell: CellId,
        reference: &Raster,
        roi: &Region,
    ) -> Result<FeatureRaster> {
        let config = self.config;
        let selector = WindowSelector::with_backoff(
            config.retries,
            Duration::from_millis(config.backoff_ms),
        );

        let mut period_rasters = Vec::with_capacity(config.periods.len());
        for period in &config.periods {
            let range = period.resolve(cell.year)?;
            let query = SceneQuery {
                tile: cell.tile,
                range,
                max_cloud_cover: config.cloud_cover,
            };
            let scenes = selector.collect(self.source, &query);

            let mut stacks: Vec<BandStack> = Vec::with_capacity(scenes.len());
            for scene in &scenes {
                match build_bands(scene, &config.bands, config.scene_buffer_m) {
                    Ok(stack) => {
                        let aligned = stack
                            .grid()
                            .map(|g| g.grid_matches(reference))
                            .unwrap_or(false);
                        if aligned {
                            stacks.push(stack);
                        } else {
                            warn!(
                                "cell {}: scene {} is off-grid, skipped",
                                cell, scene.id
                            );
                        }
                    }
                    Err(e) => warn!("cell {}: scene {} unusable: {}", cell, scene.id, e),
                }
            }
            if stacks.is_empty() {
                warn!(
                    "cell {}: period {} has no usable scenes, composite will be no-data",
                    cell, period.name
                );
            }

            let reduced =
                crate::reduce::reduce_period(&stacks, &config.reducers, &config.bands, reference);
            period_rasters.push((period.name.clone(), reduced));
        }

        assemble(&period_rasters, roi)
    }

    /// Stable per-cell seed derived from the run seed and the cell identity.
    fn cell_seed(&self, cell: CellId) -> u64 {
        self.config.seed
            ^ ((cell.year as u64) << 40)
            ^ ((cell.tile.path as u64) << 20)
            ^ cell.tile.row as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;

    #[test]
    fn cells_cross_years_with_tiles_year_major() {
        let config = RunConfig::forest_plantation(
            "out",
            vec![2015, 2016],
            vec![TileId::new(220, 76), TileId::new(220, 75)],
        );
        let sink = NullSink;
        let source = NoSource;
        let footprints: std::collections::BTreeMap<TileId, crate::geometry::Region> =
            std::collections::BTreeMap::new();
        let labels: std::collections::BTreeMap<TileId, Raster> =
            std::collections::BTreeMap::new();
        let engine = crate::engine::ForestEngine;
        let pipeline = Pipeline::new(&config, &source, &footprints, &labels, &engine, &sink);

        let cells = pipeline.cells();
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0].year, 2015);
        assert_eq!(cells[1].tile, TileId::new(220, 75));
        assert_eq!(cells[2].year, 2016);
    }

    struct NullSink;
    impl ExportSink for NullSink {
        fn submit(
            &self,
            _raster: &ClassifiedRaster,
            _id: &str,
            _scale_m: f64,
            _max_pixels: f64,
        ) -> Result<()> {
            Ok(())
        }
    }

    struct NoSource;
    impl SceneSource for NoSource {
        fn query(&self, _query: &SceneQuery) -> Result<Vec<crate::source::Scene>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn unknown_tile_is_a_recorded_failure() {
        let config =
            RunConfig::forest_plantation("out", vec![2015], vec![TileId::new(1, 1)]);
        let sink = NullSink;
        let source = NoSource;
        let footprints: std::collections::BTreeMap<TileId, crate::geometry::Region> =
            std::collections::BTreeMap::new();
        let labels: std::collections::BTreeMap<TileId, Raster> =
            std::collections::BTreeMap::new();
        let engine = crate::engine::ForestEngine;
        let pipeline = Pipeline::new(&config, &source, &footprints, &labels, &engine, &sink);

        let report = pipeline.run();
        assert!(report.completed.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, Error::UnknownTile(_)));
    }
}
