//! Fluorophore spectral properties and the lookup interface used by photometry.
//!
//! Photon-count calculations need four numbers per fluorophore and channel:
//! quantum yield, molar extinction coefficient, excitation efficiency at the
//! laser line and the fraction of emission passed by the detection filter.
//! [`SpectralLibrary`] is the read-only interface for those lookups;
//! [`FluorophoreLibrary`] is the in-memory implementation, built once and
//! shared for the lifetime of a microscope.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::spectrum::{Band, SpectralCurve};

/// Errors from spectral lookups
#[derive(Debug, Error)]
pub enum SpectralError {
    #[error("Unknown fluorophore: {0}")]
    UnknownFluorophore(String),

    #[error("Invalid emission band {lower_nm}..{upper_nm} nm")]
    InvalidBand { lower_nm: f64, upper_nm: f64 },

    #[error("Failed to read spectral library: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse spectral library: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read-only source of fluorophore spectral properties.
///
/// Implementations must be cheap to query repeatedly and safe to share across
/// the worker threads resolving different channels.
pub trait SpectralLibrary: Send + Sync {
    /// Fluorescence quantum yield (0.0-1.0)
    fn quantum_yield(&self, fluor: &str) -> Result<f64, SpectralError>;

    /// Molar extinction coefficient at the excitation peak in M⁻¹cm⁻¹
    fn extinction_coefficient(&self, fluor: &str) -> Result<f64, SpectralError>;

    /// Relative excitation efficiency (0.0-1.0) at a laser wavelength in nm
    fn find_excitation(&self, fluor: &str, wavelength_nm: f64) -> Result<f64, SpectralError>;

    /// Fraction (0.0-1.0) of total emission falling inside `[band_min_nm, band_max_nm]`.
    /// Reversed, negative or non-finite bounds are an error.
    fn find_emission(
        &self,
        fluor: &str,
        band_min_nm: f64,
        band_max_nm: f64,
    ) -> Result<f64, SpectralError>;
}

/// Spectral description of a single fluorophore species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fluorophore {
    /// Name used to reference the fluorophore from volumes and configs
    pub name: String,
    /// Fluorescence quantum yield (0.0-1.0)
    pub quantum_yield: f64,
    /// Molar extinction coefficient in M⁻¹cm⁻¹
    pub extinction_coefficient: f64,
    /// Peak-normalised excitation spectrum
    pub excitation: SpectralCurve,
    /// Peak-normalised emission spectrum
    pub emission: SpectralCurve,
}

impl Fluorophore {
    pub fn new(
        name: impl Into<String>,
        quantum_yield: f64,
        extinction_coefficient: f64,
        excitation: SpectralCurve,
        emission: SpectralCurve,
    ) -> Self {
        Self {
            name: name.into(),
            quantum_yield,
            extinction_coefficient,
            excitation,
            emission,
        }
    }
}

/// In-memory table of fluorophores keyed by name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FluorophoreLibrary {
    fluorophores: BTreeMap<String, Fluorophore>,
}

impl FluorophoreLibrary {
    /// Build a library from a list of fluorophores; later duplicates win.
    pub fn new(fluorophores: impl IntoIterator<Item = Fluorophore>) -> Self {
        Self {
            fluorophores: fluorophores
                .into_iter()
                .map(|f| (f.name.clone(), f))
                .collect(),
        }
    }

    /// Library holding the predefined dye [`models`]
    pub fn standard() -> Self {
        Self::new([
            models::ALEXA_488.clone(),
            models::ATTO_565.clone(),
            models::ALEXA_647.clone(),
        ])
    }

    /// Add or replace a fluorophore
    pub fn insert(&mut self, fluorophore: Fluorophore) {
        self.fluorophores
            .insert(fluorophore.name.clone(), fluorophore);
    }

    pub fn get(&self, name: &str) -> Result<&Fluorophore, SpectralError> {
        self.fluorophores
            .get(name)
            .ok_or_else(|| SpectralError::UnknownFluorophore(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.fluorophores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fluorophores.is_empty()
    }

    /// Save to pretty JSON
    pub fn save_to_file(&self, path: &Path) -> Result<(), SpectralError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON; curves are validated while parsing
    pub fn load_from_file(path: &Path) -> Result<Self, SpectralError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl SpectralLibrary for FluorophoreLibrary {
    fn quantum_yield(&self, fluor: &str) -> Result<f64, SpectralError> {
        Ok(self.get(fluor)?.quantum_yield)
    }

    fn extinction_coefficient(&self, fluor: &str) -> Result<f64, SpectralError> {
        Ok(self.get(fluor)?.extinction_coefficient)
    }

    fn find_excitation(&self, fluor: &str, wavelength_nm: f64) -> Result<f64, SpectralError> {
        Ok(self.get(fluor)?.excitation.at(wavelength_nm))
    }

    fn find_emission(
        &self,
        fluor: &str,
        band_min_nm: f64,
        band_max_nm: f64,
    ) -> Result<f64, SpectralError> {
        let emission = &self.get(fluor)?.emission;
        let valid = band_min_nm.is_finite()
            && band_max_nm.is_finite()
            && band_min_nm >= 0.0
            && band_min_nm <= band_max_nm;
        if !valid {
            return Err(SpectralError::InvalidBand {
                lower_nm: band_min_nm,
                upper_nm: band_max_nm,
            });
        }
        Ok(emission.fraction_in(&Band::from_nm_bounds(band_min_nm, band_max_nm)))
    }
}

/// Common dyes, modelled with Gaussian excitation/emission profiles placed at
/// the published peaks. Widths are approximate.
pub mod models {
    use super::*;

    pub static ALEXA_488: Lazy<Fluorophore> = Lazy::new(|| {
        Fluorophore::new(
            "Alexa488",
            0.92,
            73_000.0,
            SpectralCurve::gaussian(490.0, 35.0),
            SpectralCurve::gaussian(525.0, 40.0),
        )
    });

    pub static ATTO_565: Lazy<Fluorophore> = Lazy::new(|| {
        Fluorophore::new(
            "ATTO565",
            0.90,
            120_000.0,
            SpectralCurve::gaussian(564.0, 35.0),
            SpectralCurve::gaussian(590.0, 40.0),
        )
    });

    pub static ALEXA_647: Lazy<Fluorophore> = Lazy::new(|| {
        Fluorophore::new(
            "Alexa647",
            0.33,
            270_000.0,
            SpectralCurve::gaussian(650.0, 35.0),
            SpectralCurve::gaussian(665.0, 40.0),
        )
    });
}
