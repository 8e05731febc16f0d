//! Spectral bands and vegetation/water indices.
//!
//! Raw reflectance channels come straight from a scene; index bands are
//! derived per scene from the raw channels. Formulas follow the standard
//! two-band definitions (EVI2 per Jiang et al. 2008, LAI as an exponential
//! NDVI transform).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named band: either a raw sensor channel or a computed index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Band {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
    Ndvi,
    Evi2,
    Lai,
    Ndwi,
    Cai,
}

impl Band {
    /// Canonical uppercase name, as used in feature names.
    pub fn name(&self) -> &'static str {
        match self {
            Band::Blue => "BLUE",
            Band::Green => "GREEN",
            Band::Red => "RED",
            Band::Nir => "NIR",
            Band::Swir1 => "SWIR1",
            Band::Swir2 => "SWIR2",
            Band::Ndvi => "NDVI",
            Band::Evi2 => "EVI2",
            Band::Lai => "LAI",
            Band::Ndwi => "NDWI",
            Band::Cai => "CAI",
        }
    }

    pub fn is_index(&self) -> bool {
        !self.inputs().is_empty()
    }

    /// Raw channels an index is computed from; empty for raw channels.
    pub fn inputs(&self) -> &'static [Band] {
        match self {
            Band::Ndvi | Band::Evi2 | Band::Lai => &[Band::Nir, Band::Red],
            Band::Ndwi => &[Band::Nir, Band::Swir1],
            Band::Cai => &[Band::Swir2, Band::Swir1],
            _ => &[],
        }
    }

    /// Evaluate an index from its raw inputs, in `inputs()` order.
    /// Returns NaN when the formula is undefined at this pixel.
    pub fn evaluate(&self, inputs: &[f32]) -> f32 {
        let v = match self {
            Band::Ndvi => {
                let (nir, red) = (inputs[0], inputs[1]);
                (nir - red) / (nir + red)
            }
            Band::Evi2 => {
                let (nir, red) = (inputs[0], inputs[1]);
                2.5 * (nir - red) / (nir + 2.4 * red + 1.0)
            }
            Band::Lai => {
                let (nir, red) = (inputs[0], inputs[1]);
                let ndvi = (nir - red) / (nir + red);
                0.3977 * (2.5556 * ndvi).exp()
            }
            Band::Ndwi => {
                let (nir, swir1) = (inputs[0], inputs[1]);
                (nir - swir1) / (nir + swir1)
            }
            Band::Cai => {
                let (swir2, swir1) = (inputs[0], inputs[1]);
                swir2 / swir1
            }
            _ => f32::NAN,
        };
        if v.is_finite() {
            v
        } else {
            f32::NAN
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The band list from the forest-plantation classification settings.
pub fn default_bands() -> Vec<Band> {
    vec![
        Band::Green,
        Band::Red,
        Band::Nir,
        Band::Swir1,
        Band::Swir2,
        Band::Evi2,
        Band::Ndvi,
        Band::Lai,
    ]
}
