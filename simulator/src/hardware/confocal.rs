//! Confocal microscope unit.
//!
//! [`ConfocalMicroscope`] ties an immutable [`OpticsConfig`] to a long-lived
//! spectral data provider and exposes the three entry points used by an
//! imaging run: sizing the ground-truth region, resolving fluorophore volumes
//! into image stacks and resolving label volumes into aligned ground truth.

use log::debug;
use ndarray::{Array3, Array4};
use rand::Rng;
use serde::Serialize;

use super::geometry::DerivedGeometry;
use super::optics::{OpticsConfig, OpticsParameters};
use crate::image_proc::{ChannelResolver, GroundTruthResolver, ResolveError};
use crate::photometry::SpectralLibrary;
use crate::volume::{FluorVolume, LabelVolume};

/// Unit type recorded in parameter snapshots
pub const UNIT_TYPE: &str = "Confocal";

/// Configuration record for provenance metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSnapshot {
    pub unit_type: &'static str,
    #[serde(flatten)]
    pub params: OpticsParameters,
}

/// A confocal imaging unit.
#[derive(Debug, Clone)]
pub struct ConfocalMicroscope<S: SpectralLibrary> {
    config: OpticsConfig,
    spectra: S,
    seed: Option<u64>,
}

impl<S: SpectralLibrary> ConfocalMicroscope<S> {
    /// Create a unit that draws a fresh random seed for every resolve call
    pub fn new(config: OpticsConfig, spectra: S) -> Self {
        Self {
            config,
            spectra,
            seed: None,
        }
    }

    /// Fix the base seed so resolved volumes are reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &OpticsConfig {
        &self.config
    }

    pub fn spectra(&self) -> &S {
        &self.spectra
    }

    /// Sampling geometry for volumes with physical voxel size `[z, x, y]` nm
    pub fn geometry(&self, voxel_dims_nm: [f64; 3]) -> DerivedGeometry {
        DerivedGeometry::new(&self.config, voxel_dims_nm)
    }

    /// Raw (pre-expansion) volume size `(depth, width, height)` needed for
    /// the output to cover `bounds_wanted = [slices, width, height]`.
    ///
    /// # Panics
    ///
    /// Panics if any voxel dimension or the expansion factor is not positive.
    pub fn compute_parameters(
        &self,
        voxel_dims_nm: [f64; 3],
        expansion_factor: f64,
        bounds_wanted: [usize; 3],
    ) -> (usize, usize, usize) {
        let geometry = self.geometry(voxel_dims_nm);
        let [depth, width, height] = geometry.required_volume(expansion_factor, bounds_wanted);
        debug!(
            "Requested output {bounds_wanted:?} at expansion {expansion_factor} needs raw volume {depth}x{width}x{height}"
        );
        (depth, width, height)
    }

    /// Resolve a fluorophore volume into an 8-bit `(z, x, y, channel)` stack.
    ///
    /// `fluor_types` names the rows of the volume's multiplicity matrix.
    pub fn resolve_volume<F: AsRef<str> + Sync>(
        &self,
        geometry: &DerivedGeometry,
        volume: &FluorVolume,
        volume_dims: [usize; 3],
        fluor_types: &[F],
    ) -> Result<Array4<u8>, ResolveError> {
        ChannelResolver::new(&self.config, &self.spectra, geometry, self.resolve_seed())
            .resolve_volume(volume, volume_dims, fluor_types)
    }

    /// Resolve a label volume into a `(z, x, y)` label image aligned with
    /// [`resolve_volume`](Self::resolve_volume).
    pub fn resolve_ground_truth(
        &self,
        geometry: &DerivedGeometry,
        volume: &LabelVolume,
        volume_dims: [usize; 3],
    ) -> Array3<u32> {
        GroundTruthResolver::new(geometry).resolve_ground_truth(volume, volume_dims)
    }

    /// All configuration fields plus the unit type
    pub fn parameters(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            unit_type: UNIT_TYPE,
            params: self.config.params().clone(),
        }
    }

    fn resolve_seed(&self) -> u64 {
        match self.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::thread_rng().gen();
                debug!("No seed configured, using random seed {seed}");
                seed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::optics::models;
    use crate::photometry::fluorophore::FluorophoreLibrary;
    use ndarray::{Array2, Axis};
    use shared::algo::normalize_to_u8;

    fn microscope() -> ConfocalMicroscope<FluorophoreLibrary> {
        let config = OpticsConfig::new(models::TWO_CHANNEL_40X.clone()).unwrap();
        ConfocalMicroscope::new(config, FluorophoreLibrary::standard()).with_seed(17)
    }

    fn volume(dims: [usize; 3]) -> FluorVolume {
        let n = 400;
        let z = (0..n).map(|i| (i * 11) % dims[0]).collect();
        let x = (0..n).map(|i| (i * 5) % dims[1]).collect();
        let y = (0..n).map(|i| (i * 17) % dims[2]).collect();
        let multiplicities = Array2::from_shape_fn((2, n), |(t, i)| ((t + i) % 3) as u32);
        FluorVolume::from_unsorted(z, x, y, multiplicities).unwrap()
    }

    #[test]
    fn test_parameters_snapshot() {
        let scope = microscope();
        let snapshot = scope.parameters();
        assert_eq!(snapshot.unit_type, "Confocal");

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["unit_type"], "Confocal");
        assert_eq!(json["num_channels"], 2);
        assert_eq!(json["numerical_aperture"], 1.15);
        assert_eq!(json["laser_wavelengths_nm"][1], 561.0);
    }

    #[test]
    fn test_compute_parameters_matches_geometry() {
        let scope = microscope();
        let voxel = [50.0, 40.0, 40.0];
        let (depth, width, height) = scope.compute_parameters(voxel, 4.0, [10, 128, 96]);
        let expected = scope.geometry(voxel).required_volume(4.0, [10, 128, 96]);
        assert_eq!([depth, width, height], expected);
    }

    #[test]
    fn test_channel_independence() {
        let scope = microscope();
        let geometry = scope.geometry([100.0, 162.5, 162.5]);
        let dims = [60, 30, 20];
        let volume = volume(dims);
        let fluors = ["Alexa488", "ATTO565"];

        let together = scope.resolve_volume(&geometry, &volume, dims, &fluors).unwrap();

        // each channel resolved on its own, in reverse order
        let resolver =
            ChannelResolver::new(scope.config(), scope.spectra(), &geometry, 17);
        for channel in (0..2).rev() {
            let alone = normalize_to_u8(
                &resolver
                    .resolve_channel(&volume, dims, &fluors, channel)
                    .unwrap(),
            );
            assert_eq!(together.index_axis(Axis(3), channel), alone);
        }
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let scope = microscope();
        let geometry = scope.geometry([100.0, 162.5, 162.5]);
        let dims = [60, 30, 20];
        let volume = volume(dims);
        let fluors = ["Alexa488", "ATTO565"];

        let a = scope.resolve_volume(&geometry, &volume, dims, &fluors).unwrap();
        let b = scope.resolve_volume(&geometry, &volume, dims, &fluors).unwrap();
        assert_eq!(a, b);
    }
}
