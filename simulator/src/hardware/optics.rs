//! Confocal optics configuration.
//!
//! [`OpticsParameters`] is the plain, serializable description of a confocal
//! unit: per-channel laser and filter lists plus the shared objective and
//! detector properties. [`OpticsConfig`] wraps a validated copy together with
//! the laser quantities derived from it (beam radius at the sample and
//! per-channel intensity). Once built it is never mutated.
//!
//! Range checks on physical values (NA > 0, efficiencies in [0,1],
//! wavelengths in [200,1000] nm, ...) belong to whoever produces the
//! parameters; only the structural checks the renderer depends on are made
//! here.

use std::f64::consts::PI;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::photometry::Band;

/// Errors raised while building or loading an optics configuration
#[derive(Debug, Error)]
pub enum OpticsConfigError {
    #[error("Configuration must declare at least one channel")]
    NoChannels,

    #[error("Per-channel list `{field}` has {len} entries but {channels} channels are configured")]
    ChannelListTooShort {
        field: &'static str,
        len: usize,
        channels: usize,
    },

    #[error("Emission filter for channel {channel} is invalid: [{lower}, {upper}] nm")]
    InvalidFilterBand {
        channel: usize,
        lower: f64,
        upper: f64,
    },

    #[error("Failed to read optics configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse optics configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Raw optics parameters as supplied by the configuration producer.
///
/// Per-channel lists are indexed by channel; entries past `num_channels` are
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticsParameters {
    /// Number of detection channels
    pub num_channels: usize,
    /// Excitation laser wavelength per channel in nm
    pub laser_wavelengths_nm: Vec<f64>,
    /// Laser power per channel in mW
    pub laser_powers_mw: Vec<f64>,
    /// Fraction of laser power delivered per channel (0.0-1.0)
    pub laser_percentages: Vec<f64>,
    /// Emission filter passband `[min, max]` per channel in nm
    pub filter_bands_nm: Vec<[f64; 2]>,
    /// Mean baseline photon count per pixel per channel
    pub baseline_means: Vec<f64>,
    /// Objective numerical aperture
    pub numerical_aperture: f64,
    /// Objective back-aperture radius in mm
    pub objective_back_aperture_mm: f64,
    /// Objective magnification
    pub objective_magnification: f64,
    /// Objective transmission efficiency (0.0-1.0)
    pub objective_efficiency: f64,
    /// Detector quantum efficiency (0.0-1.0)
    pub detector_efficiency: f64,
    /// Exposure time per slice in seconds
    pub exposure_time_s: f64,
    /// Detector pixel pitch in nm
    pub pixel_size_nm: f64,
    /// Thickness of one imaged focal plane in nm
    pub focal_plane_depth_nm: f64,
}

/// Optical properties of one detection channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelOptics {
    pub wavelength_nm: f64,
    pub laser_power_mw: f64,
    pub laser_percentage: f64,
    pub filter: Band,
    pub baseline_mean: f64,
    /// Laser intensity at the sample in mW/m²
    pub laser_intensity: f64,
}

/// Validated, immutable confocal optics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OpticsParameters", into = "OpticsParameters")]
pub struct OpticsConfig {
    params: OpticsParameters,
    /// Laser beam radius at the sample in metres
    laser_radius_m: f64,
    /// Per-channel laser intensity in mW/m²
    laser_intensities: Vec<f64>,
}

impl TryFrom<OpticsParameters> for OpticsConfig {
    type Error = OpticsConfigError;

    fn try_from(params: OpticsParameters) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}

impl From<OpticsConfig> for OpticsParameters {
    fn from(config: OpticsConfig) -> Self {
        config.params
    }
}

impl OpticsConfig {
    /// Validate parameters and derive the laser quantities.
    ///
    /// # Errors
    ///
    /// - [`OpticsConfigError::NoChannels`] when `num_channels` is zero
    /// - [`OpticsConfigError::ChannelListTooShort`] when any per-channel list
    ///   is shorter than `num_channels`
    /// - [`OpticsConfigError::InvalidFilterBand`] when a filter band is
    ///   reversed, negative or non-finite
    pub fn new(params: OpticsParameters) -> Result<Self, OpticsConfigError> {
        let channels = params.num_channels;
        if channels == 0 {
            return Err(OpticsConfigError::NoChannels);
        }

        let lists = [
            ("laser_wavelengths_nm", params.laser_wavelengths_nm.len()),
            ("laser_powers_mw", params.laser_powers_mw.len()),
            ("laser_percentages", params.laser_percentages.len()),
            ("filter_bands_nm", params.filter_bands_nm.len()),
            ("baseline_means", params.baseline_means.len()),
        ];
        if let Some(&(field, len)) = lists.iter().find(|(_, len)| *len < channels) {
            return Err(OpticsConfigError::ChannelListTooShort {
                field,
                len,
                channels,
            });
        }

        for (channel, &[lower, upper]) in params.filter_bands_nm.iter().take(channels).enumerate()
        {
            let valid = lower.is_finite() && upper.is_finite() && lower >= 0.0 && lower <= upper;
            if !valid {
                return Err(OpticsConfigError::InvalidFilterBand {
                    channel,
                    lower,
                    upper,
                });
            }
        }

        let laser_radius_m =
            params.objective_back_aperture_mm * 1e-3 / params.objective_magnification;
        let beam_area_m2 = PI * laser_radius_m * laser_radius_m;
        let laser_intensities = (0..channels)
            .map(|c| params.laser_powers_mw[c] * params.laser_percentages[c] / beam_area_m2)
            .collect();

        Ok(Self {
            params,
            laser_radius_m,
            laser_intensities,
        })
    }

    /// Load and validate a JSON configuration file
    pub fn load_from_file(path: &Path) -> Result<Self, OpticsConfigError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save the configuration as pretty JSON (derived values are not stored)
    pub fn save_to_file(&self, path: &Path) -> Result<(), OpticsConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn params(&self) -> &OpticsParameters {
        &self.params
    }

    pub fn num_channels(&self) -> usize {
        self.params.num_channels
    }

    pub fn numerical_aperture(&self) -> f64 {
        self.params.numerical_aperture
    }

    /// Factor from sample-plane distances to detector-plane distances
    pub fn objective_factor(&self) -> f64 {
        self.params.objective_magnification
    }

    pub fn pixel_size_nm(&self) -> f64 {
        self.params.pixel_size_nm
    }

    pub fn focal_plane_depth_nm(&self) -> f64 {
        self.params.focal_plane_depth_nm
    }

    pub fn exposure_time_s(&self) -> f64 {
        self.params.exposure_time_s
    }

    /// Combined objective and detector collection efficiency
    pub fn collection_efficiency(&self) -> f64 {
        self.params.objective_efficiency * self.params.detector_efficiency
    }

    /// Laser beam radius at the sample in metres
    pub fn laser_radius_m(&self) -> f64 {
        self.laser_radius_m
    }

    /// Laser intensity at the sample for a channel in mW/m²
    pub fn laser_intensity(&self, channel: usize) -> f64 {
        self.laser_intensities[channel]
    }

    pub fn wavelength_nm(&self, channel: usize) -> f64 {
        self.params.laser_wavelengths_nm[channel]
    }

    /// Collected view of one channel's optics
    ///
    /// # Panics
    ///
    /// Panics if `channel >= num_channels()`.
    pub fn channel(&self, channel: usize) -> ChannelOptics {
        assert!(
            channel < self.num_channels(),
            "channel {channel} out of range ({} channels)",
            self.num_channels()
        );
        let [lower, upper] = self.params.filter_bands_nm[channel];
        ChannelOptics {
            wavelength_nm: self.params.laser_wavelengths_nm[channel],
            laser_power_mw: self.params.laser_powers_mw[channel],
            laser_percentage: self.params.laser_percentages[channel],
            filter: Band::from_nm_bounds(lower, upper),
            baseline_mean: self.params.baseline_means[channel],
            laser_intensity: self.laser_intensities[channel],
        }
    }
}

/// Reference configurations
pub mod models {
    use super::*;
    use once_cell::sync::Lazy;

    /// Two-colour water-immersion confocal used for expansion imaging:
    /// 488 nm and 561 nm lines, 40x / NA 1.15 objective, 6.5 µm camera pixels.
    pub static TWO_CHANNEL_40X: Lazy<OpticsParameters> = Lazy::new(|| OpticsParameters {
        num_channels: 2,
        laser_wavelengths_nm: vec![488.0, 561.0],
        laser_powers_mw: vec![50.0, 50.0],
        laser_percentages: vec![0.25, 0.25],
        filter_bands_nm: vec![[500.0, 550.0], [575.0, 625.0]],
        baseline_means: vec![30.0, 30.0],
        numerical_aperture: 1.15,
        objective_back_aperture_mm: 5.0,
        objective_magnification: 40.0,
        objective_efficiency: 0.8,
        detector_efficiency: 0.6,
        exposure_time_s: 0.1,
        pixel_size_nm: 6500.0,
        focal_plane_depth_nm: 500.0,
    });
}
