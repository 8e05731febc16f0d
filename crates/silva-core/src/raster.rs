use serde::{Deserialize, Serialize};

/// No-data class value in exported classification rasters.
pub const NODATA_CLASS: u8 = 255;

/// A single-band 2D raster, row-major, f32 values in a projected CRS.
/// Bounds are in metres; no-data pixels are NaN. Coordinate math uses f64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raster {
    /// Row-major pixel values. NaN marks no-data.
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Raster {
    /// Create a new Raster filled with the given value.
    pub fn new(
        width: usize,
        height: usize,
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
        fill: f32,
    ) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Create a Raster with the same grid and bounds as `template`.
    pub fn like(template: &Raster, fill: f32) -> Self {
        Self::new(
            template.width,
            template.height,
            template.min_x,
            template.max_x,
            template.min_y,
            template.max_y,
            fill,
        )
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    /// True when the value at (row, col) is usable (finite, not no-data).
    #[inline]
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_finite()
    }

    /// Pixel size (metres) along x and y.
    pub fn pixel_size(&self) -> (f64, f64) {
        (
            (self.max_x - self.min_x) / self.width as f64,
            (self.max_y - self.min_y) / self.height as f64,
        )
    }

    /// Projected coordinates of the centre of pixel (row, col).
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let (px, py) = self.pixel_size();
        (
            self.min_x + (col as f64 + 0.5) * px,
            self.min_y + (row as f64 + 0.5) * py,
        )
    }

    /// True when `other` shares this raster's grid shape and bounds.
    pub fn grid_matches(&self, other: &Raster) -> bool {
        self.width == other.width
            && self.height == other.height
            && (self.min_x - other.min_x).abs() < 1e-6
            && (self.max_x - other.max_x).abs() < 1e-6
            && (self.min_y - other.min_y).abs() < 1e-6
            && (self.max_y - other.max_y).abs() < 1e-6
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }
}

/// Single-band integer classification raster, tagged with the producing year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRaster {
    /// Row-major class values; `NODATA_CLASS` marks pixels outside the ROI.
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub year: i32,
}

impl ClassifiedRaster {
    /// Create a classification raster on the grid of `template`, all no-data.
    pub fn like(template: &Raster, year: i32) -> Self {
        Self {
            data: vec![NODATA_CLASS; template.width * template.height],
            width: template.width,
            height: template.height,
            min_x: template.min_x,
            max_x: template.max_x,
            min_y: template.min_y,
            max_y: template.max_y,
            year,
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.width + col]
    }
}
