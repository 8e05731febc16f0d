//! Temporal reduction: collapse a period's scene stack into one raster.
//!
//! Every reducer tolerates a variable number of contributing scenes per pixel
//! (cloud masking removes different pixels in different scenes) and yields
//! no-data where zero scenes contribute.
//!
//! `qmo` is the quality-mosaic reducer: per pixel it selects the scene whose
//! quality band sits at the top rank of the temporal distribution and emits
//! every built band from that scene. A rank statistic of a single band is
//! robust against residual cloud and shadow outliers in a way a mean is not.

use serde::{Deserialize, Serialize};

use crate::bands::Band;
use crate::mask::BandStack;
use crate::raster::Raster;

/// A named statistical aggregation over the temporal stack of one band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Reducer {
    /// Quality mosaic parameterized by the band it ranks.
    Qmo { band: Band },
    Mean,
    Median,
    Min,
    Max,
    /// Percentile of the per-pixel temporal distribution, rank in 0..=100.
    Percentile { rank: f64 },
}

impl Reducer {
    /// Feature-name suffix: `qmo`, `mean`, `median`, `min`, `max`, `p25`.
    pub fn suffix(&self) -> String {
        match self {
            Reducer::Qmo { .. } => "qmo".to_string(),
            Reducer::Mean => "mean".to_string(),
            Reducer::Median => "median".to_string(),
            Reducer::Min => "min".to_string(),
            Reducer::Max => "max".to_string(),
            Reducer::Percentile { rank } => format!("p{}", rank.round() as i64),
        }
    }
}

/// Reduce one period's scene stacks into `(band_name, raster)` pairs named
/// `{BAND}_{suffix}`, on the grid of `template`. With an empty stack every
/// output pixel is no-data.
pub fn reduce_period(
    stacks: &[BandStack],
    reducers: &[Reducer],
    bands: &[Band],
    template: &Raster,
) -> Vec<(String, Raster)> {
    let mut out = Vec::new();
    for reducer in reducers {
        match reducer {
            Reducer::Qmo { band } => {
                out.extend(quality_mosaic(stacks, *band, bands, template));
            }
            _ => {
                for &band in bands {
                    let raster = reduce_band(stacks, band, reducer, template);
                    out.push((format!("{}_{}", band, reducer.suffix()), raster));
                }
            }
        }
    }
    out
}

/// Per pixel, pick the scene with the highest quality-band value and take all
/// requested bands from it.
fn quality_mosaic(
    stacks: &[BandStack],
    quality: Band,
    bands: &[Band],
    template: &Raster,
) -> Vec<(String, Raster)> {
    let len = template.data.len();

    // Winning stack index per pixel, by max quality value among valid scenes.
    let mut winner: Vec<Option<usize>> = vec![None; len];
    let mut best = vec![f32::NEG_INFINITY; len];
    for (s, stack) in stacks.iter().enumerate() {
        let Some(q) = stack.band(quality) else {
            continue;
        };
        for idx in 0..len {
            let v = q.data[idx];
            if v.is_finite() && v > best[idx] {
                best[idx] = v;
                winner[idx] = Some(s);
            }
        }
    }

    bands
        .iter()
        .map(|&band| {
            let mut raster = Raster::like(template, f32::NAN);
            for idx in 0..len {
                if let Some(s) = winner[idx] {
                    if let Some(src) = stacks[s].band(band) {
                        raster.data[idx] = src.data[idx];
                    }
                }
            }
            (format!("{}_qmo", band), raster)
        })
        .collect()
}

fn reduce_band(stacks: &[BandStack], band: Band, reducer: &Reducer, template: &Raster) -> Raster {
    let mut out = Raster::like(template, f32::NAN);
    let sources: Vec<&Raster> = stacks.iter().filter_map(|s| s.band(band)).collect();

    let mut values: Vec<f32> = Vec::with_capacity(sources.len());
    for idx in 0..out.data.len() {
        values.clear();
        values.extend(
            sources
                .iter()
                .map(|r| r.data[idx])
                .filter(|v| v.is_finite()),
        );
        if values.is_empty() {
            continue;
        }
        out.data[idx] = match reducer {
            Reducer::Mean => values.iter().sum::<f32>() / values.len() as f32,
            Reducer::Median => percentile(&mut values, 50.0),
            Reducer::Min => values.iter().cloned().fold(f32::INFINITY, f32::min),
            Reducer::Max => values.iter().cloned().fold(f32::NEG_INFINITY, f32::max),
            Reducer::Percentile { rank } => percentile(&mut values, *rank),
            Reducer::Qmo { .. } => unreachable!("qmo handled by quality_mosaic"),
        };
    }
    out
}

/// Nearest-rank percentile over a non-empty slice. Sorts in place.
fn percentile(values: &mut [f32], rank: f64) -> f32 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pos = (values.len() - 1) as f64 * (rank / 100.0).clamp(0.0, 1.0);
    values[pos.round() as usize]
}
