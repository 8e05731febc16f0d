//! Immutable run configuration.
//!
//! One JSON document per run, mirroring the original classification settings
//! block: output destination, year list, WRS tile list, cloud ceiling, retry
//! count, band list, reducer list, period templates, feature space, sample
//! count, ensemble size and spatial resolution. The orchestrator passes it by
//! reference; nothing downstream mutates it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bands::Band;
use crate::calendar::PeriodDef;
use crate::error::{Error, Result};
use crate::reduce::Reducer;
use crate::tile::TileId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Export destination identifier, handed to the sink as-is.
    pub output: String,
    pub years: Vec<i32>,
    pub tiles: Vec<TileId>,
    pub bands: Vec<Band>,
    pub reducers: Vec<Reducer>,
    /// Ordered: feature-raster period order follows declaration order.
    pub periods: Vec<PeriodDef>,
    pub feature_space: Vec<String>,

    /// Maximum scene-level cloud cover, percent.
    #[serde(default = "default_cloud_cover")]
    pub cloud_cover: f32,
    /// Identical queries issued per period window.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Pause between repeated queries, milliseconds.
    #[serde(default)]
    pub backoff_ms: u64,
    /// Training sample ceiling per cell.
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Random-forest ensemble size.
    #[serde(default = "default_trees")]
    pub trees: u32,
    /// Working resolution, metres.
    #[serde(default = "default_scale_m")]
    pub scale_m: f64,
    /// Inward ROI buffer applied to the tile footprint, metres (negative).
    #[serde(default = "default_roi_buffer_m")]
    pub roi_buffer_m: f64,
    /// Inward buffer applied per scene footprint, metres (negative).
    #[serde(default = "default_scene_buffer_m")]
    pub scene_buffer_m: f64,
    /// Integer scaling factor applied to the selected feature space.
    #[serde(default = "default_scaling")]
    pub scaling: f64,
    /// Export pixel-count ceiling, passed through to the sink.
    #[serde(default = "default_max_pixels")]
    pub max_pixels: f64,
    /// Base seed; per-cell seeds derive from it.
    #[serde(default)]
    pub seed: u64,
}

fn default_cloud_cover() -> f32 {
    90.0
}
fn default_retries() -> u32 {
    2
}
fn default_samples() -> usize {
    10_000
}
fn default_trees() -> u32 {
    100
}
fn default_scale_m() -> f64 {
    30.0
}
fn default_roi_buffer_m() -> f64 {
    -4000.0
}
fn default_scene_buffer_m() -> f64 {
    -4200.0
}
fn default_scaling() -> f64 {
    10_000.0
}
fn default_max_pixels() -> f64 {
    1.0e13
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::Config(msg.to_string()));
        if self.years.is_empty() {
            return fail("no years configured");
        }
        if self.tiles.is_empty() {
            return fail("no tiles configured");
        }
        if self.bands.is_empty() {
            return fail("no bands configured");
        }
        if self.reducers.is_empty() {
            return fail("no reducers configured");
        }
        if self.periods.is_empty() {
            return fail("no periods configured");
        }
        if self.feature_space.is_empty() {
            return fail("empty feature space");
        }
        if self.retries == 0 {
            return fail("retries must be at least 1");
        }
        if self.trees == 0 {
            return fail("ensemble size must be at least 1");
        }
        if self.scaling <= 0.0 {
            return fail("scaling factor must be positive");
        }
        if self.scale_m <= 0.0 {
            return fail("scale must be positive");
        }
        Ok(())
    }

    /// The original forest-plantation run: six periods, eight bands,
    /// `qmo(EVI2)`, a 42-name feature space.
    pub fn forest_plantation(output: &str, years: Vec<i32>, tiles: Vec<TileId>) -> Self {
        let bands = crate::bands::default_bands();
        let periods = crate::calendar::default_periods();
        let feature_bands = [
            Band::Green,
            Band::Red,
            Band::Nir,
            Band::Swir1,
            Band::Swir2,
            Band::Ndvi,
            Band::Lai,
        ];
        let feature_space = periods
            .iter()
            .flat_map(|p| {
                feature_bands
                    .iter()
                    .map(move |b| format!("{}_{}_qmo", p.name, b))
            })
            .collect();

        Self {
            output: output.to_string(),
            years,
            tiles,
            bands,
            reducers: vec![Reducer::Qmo { band: Band::Evi2 }],
            periods,
            feature_space,
            cloud_cover: default_cloud_cover(),
            retries: default_retries(),
            backoff_ms: 0,
            samples: default_samples(),
            trees: default_trees(),
            scale_m: default_scale_m(),
            roi_buffer_m: default_roi_buffer_m(),
            scene_buffer_m: default_scene_buffer_m(),
            scaling: default_scaling(),
            max_pixels: default_max_pixels(),
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forest_plantation_defaults_match_the_published_run() {
        let config = RunConfig::forest_plantation(
            "RESULTS/RAW",
            vec![2015],
            vec![TileId::new(220, 76)],
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.feature_space.len(), 42);
        assert_eq!(config.feature_space[0], "WET1_GREEN_qmo");
        assert_eq!(config.feature_space[41], "WET3_LAI_qmo");
        assert_eq!(config.cloud_cover, 90.0);
        assert_eq!(config.retries, 2);
        assert_eq!(config.trees, 100);
        assert_eq!(config.samples, 10_000);
    }

    #[test]
    fn minimal_json_round_trips_with_defaults() {
        let json = r#"{
            "output": "out",
            "years": [2015],
            "tiles": [[220, 76]],
            "bands": ["NIR", "RED", "EVI2"],
            "reducers": [{"kind": "qmo", "band": "EVI2"}],
            "periods": [{"name": "WET1", "range": "(Y-1)-12-01,(Y)-01-31"}],
            "feature_space": ["WET1_NIR_qmo"]
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.tiles[0], TileId::new(220, 76));
        assert_eq!(config.scaling, 10_000.0);
        assert_eq!(config.roi_buffer_m, -4000.0);
    }

    #[test]
    fn zero_retries_is_rejected() {
        let mut config =
            RunConfig::forest_plantation("out", vec![2015], vec![TileId::new(220, 76)]);
        config.retries = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
