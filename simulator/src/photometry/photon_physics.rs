//! Photon budgets for fluorophores under confocal laser excitation.
//!
//! For fluorophore `f` in channel `c` with laser wavelength λ (nm):
//!
//! ```text
//! emitted  = ⌈ exc_f(λ) · QY_f · (ε_f · 100) · t · I_c · (λ · 1e-9) / (1000 · K) ⌉
//! detected = ⌈ emitted · em_f(filter_c) · η_objective · η_detector ⌉
//! ```
//!
//! where `I_c` is the laser intensity at the sample (mW/m²), `t` the exposure
//! time (s) and `K = N_A · h · c` collapsed to 0.119626566 J·m/mol. Counts are
//! rounded up: physical counts are whole photons and the upward bias is the
//! chosen policy.
//!
//! Per-voxel totals are then drawn by [`sample_photon_counts`].

use ndarray::Array2;

use shared::algo::process_slice_in_parallel_chunks;
use shared::image_proc::poisson_sample;

use super::fluorophore::{SpectralError, SpectralLibrary};
use crate::hardware::OpticsConfig;

/// Avogadro × Planck × speed of light (J·m/mol)
pub const MOLAR_PHOTON_ENERGY_CONSTANT: f64 = 0.119626566;

/// Points handled per RNG stream when sampling photon counts
const SAMPLING_CHUNK: usize = 4096;

/// Photon count calculator bound to one optics configuration and one
/// spectral data source.
pub struct PhotonPhysics<'a, S: SpectralLibrary + ?Sized> {
    config: &'a OpticsConfig,
    spectra: &'a S,
}

impl<'a, S: SpectralLibrary + ?Sized> PhotonPhysics<'a, S> {
    pub fn new(config: &'a OpticsConfig, spectra: &'a S) -> Self {
        Self { config, spectra }
    }

    /// Expected photons emitted by one fluorophore during one exposure.
    pub fn emitted_photons(&self, fluor: &str, channel: usize) -> Result<u64, SpectralError> {
        let wavelength_nm = self.config.wavelength_nm(channel);

        let excitation = self.spectra.find_excitation(fluor, wavelength_nm)?;
        let quantum_yield = self.spectra.quantum_yield(fluor)?;
        let extinction = self.spectra.extinction_coefficient(fluor)? * 100.0;

        let photons = excitation
            * quantum_yield
            * extinction
            * self.config.exposure_time_s()
            * self.config.laser_intensity(channel)
            * (wavelength_nm * 1e-9)
            / (1000.0 * MOLAR_PHOTON_ENERGY_CONSTANT);

        Ok(round_up_count(photons))
    }

    /// Expected photons reaching the detector out of `emitted`.
    pub fn detected_photons(
        &self,
        fluor: &str,
        emitted: u64,
        channel: usize,
    ) -> Result<u64, SpectralError> {
        let filter = self.config.channel(channel).filter;
        let emission = self
            .spectra
            .find_emission(fluor, filter.lower_nm, filter.upper_nm)?;

        let photons = emitted as f64 * emission * self.config.collection_efficiency();
        Ok(round_up_count(photons))
    }

    /// Mean detected photons per fluorophore, in the order of `fluors`.
    pub fn mean_photons_per_fluor<F: AsRef<str>>(
        &self,
        fluors: &[F],
        channel: usize,
    ) -> Result<Vec<u64>, SpectralError> {
        fluors
            .iter()
            .map(|fluor| {
                let fluor = fluor.as_ref();
                let emitted = self.emitted_photons(fluor, channel)?;
                self.detected_photons(fluor, emitted, channel)
            })
            .collect()
    }
}

fn round_up_count(photons: f64) -> u64 {
    if photons.is_finite() && photons > 0.0 {
        photons.ceil() as u64
    } else {
        0
    }
}

/// Draw total detected photons per point.
///
/// `multiplicities` is indexed `[fluor_type, point]`. For every point and
/// fluorophore type present, one Poisson sample with that type's mean is drawn
/// and multiplied by the point's multiplicity; the products are summed over
/// types.
///
/// Scaling a single draw by the multiplicity is not the same distribution as
/// summing one draw per fluorophore (its variance grows with N² instead of N).
/// Renderer output is calibrated against this behaviour.
///
/// # Panics
///
/// Panics if `means` does not have one entry per fluorophore type.
pub fn sample_photon_counts(multiplicities: &Array2<u32>, means: &[u64], seed: u64) -> Vec<u64> {
    let (num_types, num_points) = multiplicities.dim();
    assert_eq!(
        num_types,
        means.len(),
        "one mean photon count is needed per fluorophore type"
    );

    let mut counts = vec![0u64; num_points];
    process_slice_in_parallel_chunks(
        &mut counts,
        seed,
        Some(SAMPLING_CHUNK),
        |chunk, offset, rng| {
            for (i, total) in chunk.iter_mut().enumerate() {
                let point = offset + i;
                *total = (0..num_types)
                    .map(|t| {
                        let n = multiplicities[[t, point]];
                        if n == 0 {
                            return 0;
                        }
                        poisson_sample(means[t] as f64, rng) as u64 * n as u64
                    })
                    .sum();
            }
        },
    );
    counts
}
