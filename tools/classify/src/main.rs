/// Classification driver: runs the (year × tile) pipeline against an on-disk
/// scene archive and writes classified rasters as JSON.
///
/// Archive layout:
///   <archive>/*.json            one Scene per file
///   <reference>/{path}_{row}.json   per-tile label Raster
///   <output>/{year}_{path}_{row}.json  exported ClassifiedRaster
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use silva_core::{
    ClassifiedRaster, ExportSink, ForestEngine, Pipeline, Raster, Region, RunConfig, Scene,
    SceneQuery, SceneSource, TileId,
};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "classify",
    about = "Per-tile-year forest-plantation classification from a scene archive"
)]
struct Args {
    /// Run configuration JSON
    #[arg(short, long)]
    config: PathBuf,

    /// Directory of scene JSON files
    #[arg(long, default_value = "data/scenes")]
    archive: PathBuf,

    /// Directory of per-tile reference label rasters
    #[arg(long, default_value = "data/reference")]
    reference: PathBuf,
}

// ── Scene archive ────────────────────────────────────────────────────────────

/// Eagerly-loaded scene archive; queries filter in memory.
struct FileArchive {
    scenes: Vec<Scene>,
}

impl FileArchive {
    fn load(dir: &Path) -> Result<Self> {
        let mut scenes = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("reading scene archive {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = fs::read_to_string(&path)?;
            let scene: Scene = serde_json::from_str(&text)
                .with_context(|| format!("parsing scene {}", path.display()))?;
            scenes.push(scene);
        }
        scenes.sort_by(|a, b| a.id.cmp(&b.id));
        info!("loaded {} scene(s)", scenes.len());
        Ok(Self { scenes })
    }
}

impl SceneSource for FileArchive {
    fn query(&self, query: &SceneQuery) -> silva_core::Result<Vec<Scene>> {
        Ok(self
            .scenes
            .iter()
            .filter(|s| {
                s.tile == query.tile
                    && s.date >= query.range.start
                    && s.date <= query.range.end
                    && s.cloud_cover <= query.max_cloud_cover
            })
            .cloned()
            .collect())
    }
}

// ── Reference store ──────────────────────────────────────────────────────────

/// Load `{path}_{row}.json` label rasters; tile footprints are the raster
/// bounds.
fn load_reference(
    dir: &Path,
) -> Result<(BTreeMap<TileId, Raster>, BTreeMap<TileId, Region>)> {
    let mut labels = BTreeMap::new();
    let mut footprints = BTreeMap::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("reading reference directory {}", dir.display()))?
    {
        let path = entry?.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(tile) = parse_tile_stem(stem) else {
            continue;
        };
        let text = fs::read_to_string(&path)?;
        let raster: Raster = serde_json::from_str(&text)
            .with_context(|| format!("parsing reference {}", path.display()))?;
        footprints.insert(tile, Region::from_raster(&raster));
        labels.insert(tile, raster);
    }
    info!("loaded {} reference raster(s)", labels.len());
    Ok((labels, footprints))
}

/// `"220_76"` → TileId(220, 76).
fn parse_tile_stem(stem: &str) -> Option<TileId> {
    let (path, row) = stem.split_once('_')?;
    Some(TileId::new(path.parse().ok()?, row.parse().ok()?))
}

// ── Export sink ──────────────────────────────────────────────────────────────

struct DirSink {
    dir: PathBuf,
}

impl ExportSink for DirSink {
    fn submit(
        &self,
        raster: &ClassifiedRaster,
        id: &str,
        scale_m: f64,
        _max_pixels: f64,
    ) -> silva_core::Result<()> {
        let path = self.dir.join(format!("{}.json", id));
        let text = serde_json::to_string(raster)?;
        fs::write(&path, text)?;
        info!("wrote {} ({} m)", path.display(), scale_m);
        Ok(())
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = RunConfig::from_json_file(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let archive = FileArchive::load(&args.archive)?;
    let (labels, footprints) = load_reference(&args.reference)?;

    fs::create_dir_all(&config.output)
        .with_context(|| format!("creating output directory {}", config.output))?;
    let sink = DirSink {
        dir: PathBuf::from(&config.output),
    };
    let engine = ForestEngine;

    let pipeline = Pipeline::new(&config, &archive, &footprints, &labels, &engine, &sink);
    let report = pipeline.run();

    info!(
        "run finished: {} exported, {} failed",
        report.completed.len(),
        report.failed.len()
    );
    for (cell, error) in &report.failed {
        log::error!("cell {}: {}", cell, error);
    }
    if !report.all_succeeded() {
        bail!("{} cell(s) failed", report.failed.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_stems_parse_path_and_row() {
        assert_eq!(parse_tile_stem("220_76"), Some(TileId::new(220, 76)));
        assert_eq!(parse_tile_stem("labels"), None);
    }
}
