//! Slice-by-slice resolution of sparse volumes into image stacks.
//!
//! [`ChannelResolver`] turns a fluorophore point cloud into an 8-bit
//! `(z, x, y, channel)` stack: per channel it samples photon counts, builds
//! the PSF kernel, projects every output slice and adds baseline noise,
//! then normalizes. [`GroundTruthResolver`] scatters labels onto the same
//! output grid without any blur or noise so the two stay aligned.
//!
//! Both walk the slice offsets from [`DerivedGeometry::slice_offsets`] and
//! skip points lying outside the declared volume's x/y extent.

use log::{debug, info, warn};
use ndarray::{Array3, Array4, Axis};
use rayon::prelude::*;
use thiserror::Error;

use shared::algo::{derive_seed, normalize_to_u8};
use shared::image_proc::{gaussian_window, poisson_field};

use super::project::PhotonProjector;
use super::psf::PsfKernelBuilder;
use crate::hardware::{DerivedGeometry, OpticsConfig};
use crate::photometry::{sample_photon_counts, PhotonPhysics, SpectralError, SpectralLibrary};
use crate::volume::{FluorVolume, LabelVolume, SparsePoints};

/// Errors raised while resolving a volume
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Spectral lookup failed: {0}")]
    Spectral(#[from] SpectralError),

    #[error("Volume has {found} fluorophore types but {expected} names were given")]
    FluorCountMismatch { expected: usize, found: usize },
}

/// Random stream used for per-point photon sampling within a channel
const PHOTON_STREAM: u64 = 0;

/// Resolves fluorophore volumes channel by channel.
pub struct ChannelResolver<'a, S: SpectralLibrary + ?Sized> {
    config: &'a OpticsConfig,
    spectra: &'a S,
    geometry: &'a DerivedGeometry,
    seed: u64,
}

impl<'a, S: SpectralLibrary + ?Sized> ChannelResolver<'a, S> {
    pub fn new(
        config: &'a OpticsConfig,
        spectra: &'a S,
        geometry: &'a DerivedGeometry,
        seed: u64,
    ) -> Self {
        Self {
            config,
            spectra,
            geometry,
            seed,
        }
    }

    /// Output `(slices, width, height)` for volume dims `[z, x, y]`
    pub fn output_shape(&self, volume_dims: [usize; 3]) -> (usize, usize, usize) {
        let [slices, width, height] = self.geometry.output_dims(volume_dims);
        (slices, width, height)
    }

    /// Resolve every channel and stack them into an 8-bit
    /// `(z, x, y, channel)` image.
    ///
    /// Each channel is normalized on its own by `255 / max(1, channel max)`.
    /// Channels run in parallel and use independent random streams, so the
    /// result does not depend on scheduling.
    pub fn resolve_volume<F: AsRef<str> + Sync>(
        &self,
        volume: &FluorVolume,
        volume_dims: [usize; 3],
        fluor_types: &[F],
    ) -> Result<Array4<u8>, ResolveError> {
        let (slices, width, height) = self.output_shape(volume_dims);
        let channels = self.config.num_channels();
        info!(
            "Resolving {} points into {slices}x{width}x{height} over {channels} channels",
            volume.points().len()
        );
        warn_outside(volume.points(), volume_dims);

        let resolved = (0..channels)
            .into_par_iter()
            .map(|channel| {
                let photons = self.resolve_channel(volume, volume_dims, fluor_types, channel)?;
                Ok(normalize_to_u8(&photons))
            })
            .collect::<Result<Vec<_>, ResolveError>>()?;

        let mut stack = Array4::zeros((slices, width, height, channels));
        for (channel, image) in resolved.iter().enumerate() {
            stack.index_axis_mut(Axis(3), channel).assign(image);
        }
        Ok(stack)
    }

    /// Resolve one channel to un-normalized photon counts `(z, x, y)`.
    ///
    /// Per slice: project the points within the PSF's axial reach, then add
    /// baseline noise. The baseline is a Poisson field with the channel's
    /// baseline mean, multiplied by a Gaussian window peaking at the frame
    /// centre with standard deviation half the frame size, so it fades
    /// toward the edges. This reproduces the established renderer output;
    /// a flat detector baseline would drop the window.
    pub fn resolve_channel<F: AsRef<str>>(
        &self,
        volume: &FluorVolume,
        volume_dims: [usize; 3],
        fluor_types: &[F],
        channel: usize,
    ) -> Result<Array3<f64>, ResolveError> {
        if volume.num_fluor_types() != fluor_types.len() {
            return Err(ResolveError::FluorCountMismatch {
                expected: fluor_types.len(),
                found: volume.num_fluor_types(),
            });
        }

        let channel_seed = derive_seed(self.seed, channel as u64);
        let means = PhotonPhysics::new(self.config, self.spectra)
            .mean_photons_per_fluor(fluor_types, channel)?;
        debug!("Channel {channel}: mean detected photons per fluorophore {means:?}");

        let mut photons = sample_photon_counts(
            volume.multiplicities(),
            &means,
            derive_seed(channel_seed, PHOTON_STREAM),
        );
        // points outside the volume emit nothing
        let points = volume.points();
        for (i, count) in photons.iter_mut().enumerate() {
            if !points.is_inside(i, volume_dims[1], volume_dims[2]) {
                *count = 0;
            }
        }

        let kernel = PsfKernelBuilder::new(self.config, self.geometry).build_channel(channel);
        debug!(
            "Channel {channel}: PSF kernel {:?} x {} planes",
            kernel.footprint(),
            kernel.axial_len()
        );
        let projector = PhotonProjector::new(&kernel, self.geometry);

        let offsets = self.geometry.slice_offsets(volume_dims[0]);
        let (slices, width, height) = self.output_shape(volume_dims);
        let baseline_mean = self.config.channel(channel).baseline_mean;
        let window = gaussian_window((width, height), (width as f64 / 2.0, height as f64 / 2.0));

        let mut stack = Array3::zeros((slices, width, height));
        stack
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(offsets.par_iter())
            .enumerate()
            .for_each(|(k, (mut slice, &z_offset))| {
                let image = projector.project(points, &photons, z_offset, (width, height));
                let baseline_seed = derive_seed(channel_seed, PHOTON_STREAM + 1 + k as u64);
                let baseline = poisson_field((width, height), baseline_mean, baseline_seed) * &window;

                slice.assign(&image);
                slice += &baseline;
            });

        debug!("Channel {channel}: resolved {slices} slices");
        Ok(stack)
    }
}

/// Scatters label volumes onto the output grid.
pub struct GroundTruthResolver<'a> {
    geometry: &'a DerivedGeometry,
}

impl<'a> GroundTruthResolver<'a> {
    pub fn new(geometry: &'a DerivedGeometry) -> Self {
        Self { geometry }
    }

    /// Label image `(z, x, y)` aligned with [`ChannelResolver::resolve_volume`].
    ///
    /// Slice `k` takes the points with `offset_k ≤ z < offset_k + z_offset_step`
    /// and writes each label at its magnified position. Points outside the
    /// volume's x/y extent are skipped. Unlabelled pixels are 0; when two
    /// points land on one pixel the later point in z order wins.
    pub fn resolve_ground_truth(&self, volume: &LabelVolume, volume_dims: [usize; 3]) -> Array3<u32> {
        let [slices, width, height] = self.geometry.output_dims(volume_dims);
        let offsets = self.geometry.slice_offsets(volume_dims[0]);
        let step = self.geometry.z_offset_step();
        let points = volume.points();
        let labels = volume.labels();
        warn_outside(points, volume_dims);

        let mut truth = Array3::zeros((slices, width, height));
        truth
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(offsets.par_iter())
            .for_each(|(mut slice, &z_offset)| {
                for i in points.z_range(z_offset, z_offset + step) {
                    if !points.is_inside(i, volume_dims[1], volume_dims[2]) {
                        continue;
                    }
                    let px = self.geometry.magnify(points.x()[i]);
                    let py = self.geometry.magnify(points.y()[i]);
                    if px < width && py < height {
                        slice[[px, py]] = labels[i];
                    }
                }
            });

        info!("Resolved ground truth into {slices}x{width}x{height}");
        truth
    }
}

fn warn_outside(points: &SparsePoints, volume_dims: [usize; 3]) {
    let outside = points.count_outside(volume_dims[1], volume_dims[2]);
    if outside > 0 {
        warn!(
            "{outside} of {} points lie outside the {}x{} volume and are skipped",
            points.len(),
            volume_dims[1],
            volume_dims[2]
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::optics::{models, OpticsParameters};
    use crate::photometry::fluorophore::{Fluorophore, FluorophoreLibrary};
    use crate::photometry::SpectralCurve;
    use ndarray::Array2;

    fn library() -> FluorophoreLibrary {
        FluorophoreLibrary::new([Fluorophore::new(
            "Flat",
            0.5,
            50_000.0,
            SpectralCurve::from_table(vec![300.0, 900.0], vec![1.0, 1.0]).unwrap(),
            SpectralCurve::from_table(vec![500.0, 640.0], vec![1.0, 1.0]).unwrap(),
        )])
    }

    fn config(baseline: f64) -> OpticsConfig {
        OpticsConfig::new(OpticsParameters {
            baseline_means: vec![baseline, baseline],
            ..models::TWO_CHANNEL_40X.clone()
        })
        .unwrap()
    }

    fn geometry(config: &OpticsConfig) -> DerivedGeometry {
        DerivedGeometry::new(config, [100.0, 162.5, 162.5])
    }

    fn volume(n: usize, dims: [usize; 3]) -> FluorVolume {
        let z = (0..n).map(|i| (i * 7) % dims[0]).collect();
        let x = (0..n).map(|i| (i * 13) % dims[1]).collect();
        let y = (0..n).map(|i| (i * 29) % dims[2]).collect();
        FluorVolume::from_unsorted(z, x, y, Array2::from_elem((1, n), 1)).unwrap()
    }

    #[test]
    fn test_output_shape_and_range() {
        let config = config(5.0);
        let geometry = geometry(&config);
        let lib = library();
        let dims = [60, 32, 24];

        let resolver = ChannelResolver::new(&config, &lib, &geometry, 1);
        let stack = resolver.resolve_volume(&volume(200, dims), dims, &["Flat"]).unwrap();

        let slices = geometry.slice_offsets(60).len();
        assert!(slices > 0);
        assert_eq!(stack.dim(), (slices, 32, 24, 2));

        for channel in 0..2 {
            let max = stack.index_axis(Axis(3), channel).iter().copied().max().unwrap();
            assert_eq!(max, 255);
        }
    }

    #[test]
    fn test_fluor_count_mismatch() {
        let config = config(0.0);
        let geometry = geometry(&config);
        let lib = library();
        let dims = [60, 16, 16];
        let resolver = ChannelResolver::new(&config, &lib, &geometry, 1);

        let err = resolver
            .resolve_volume(&volume(10, dims), dims, &["Flat", "Flat"])
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::FluorCountMismatch {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_unknown_fluorophore_propagates() {
        let config = config(0.0);
        let geometry = geometry(&config);
        let lib = library();
        let dims = [60, 16, 16];
        let resolver = ChannelResolver::new(&config, &lib, &geometry, 1);

        let err = resolver
            .resolve_volume(&volume(10, dims), dims, &["Missing"])
            .unwrap_err();
        assert!(matches!(err, ResolveError::Spectral(_)));
    }

    #[test]
    fn test_shallow_volume_gives_no_slices() {
        let config = config(5.0);
        let geometry = geometry(&config);
        let lib = library();
        let dims = [4, 16, 16];
        let resolver = ChannelResolver::new(&config, &lib, &geometry, 1);

        let stack = resolver.resolve_volume(&volume(10, dims), dims, &["Flat"]).unwrap();
        assert_eq!(stack.dim(), (0, 16, 16, 2));
    }

    #[test]
    fn test_baseline_only_fades_to_edges() {
        let config = config(1000.0);
        let geometry = geometry(&config);
        let lib = library();
        let dims = [60, 41, 41];
        let resolver = ChannelResolver::new(&config, &lib, &geometry, 9);

        let empty = FluorVolume::new(SparsePoints::default(), Array2::zeros((1, 0))).unwrap();
        let photons = resolver.resolve_channel(&empty, dims, &["Flat"], 0).unwrap();

        let slice = photons.index_axis(Axis(0), 0);
        // window is 1 at the centre and exp(-0.5) at the edge midpoints
        assert!(slice[[20, 20]] > 900.0);
        assert!(slice[[0, 20]] < 700.0);
    }

    #[test]
    fn test_channel_resolution_is_repeatable() {
        let config = config(5.0);
        let geometry = geometry(&config);
        let lib = library();
        let dims = [60, 32, 24];
        let volume = volume(300, dims);

        let a = ChannelResolver::new(&config, &lib, &geometry, 42)
            .resolve_channel(&volume, dims, &["Flat"], 1)
            .unwrap();
        let b = ChannelResolver::new(&config, &lib, &geometry, 42)
            .resolve_channel(&volume, dims, &["Flat"], 1)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ground_truth_scatters_without_blur() {
        let config = config(0.0);
        let geometry = geometry(&config);
        let dims = [60, 20, 20];
        let offsets = geometry.slice_offsets(dims[0]);
        let z0 = offsets[0];

        let volume = LabelVolume::from_unsorted(
            vec![z0, z0, z0 + geometry.z_offset_step()],
            vec![3, 10, 5],
            vec![4, 10, 5],
            vec![7, 9, 11],
        )
        .unwrap();

        let truth = GroundTruthResolver::new(&geometry).resolve_ground_truth(&volume, dims);
        assert_eq!(truth.dim(), (offsets.len(), 20, 20));

        let first = truth.index_axis(Axis(0), 0);
        assert_eq!(first[[3, 4]], 7);
        assert_eq!(first[[10, 10]], 9);
        assert_eq!(first.iter().filter(|&&v| v != 0).count(), 2);

        let second = truth.index_axis(Axis(0), 1);
        assert_eq!(second[[5, 5]], 11);
        assert_eq!(second.iter().filter(|&&v| v != 0).count(), 1);
    }

    #[test]
    fn test_ground_truth_collision_last_wins() {
        let config = config(0.0);
        let geometry = geometry(&config);
        let dims = [60, 20, 20];
        let z0 = geometry.slice_offsets(dims[0])[0];

        let volume = LabelVolume::from_unsorted(
            vec![z0 + 1, z0],
            vec![6, 6],
            vec![6, 6],
            vec![2, 1],
        )
        .unwrap();

        let truth = GroundTruthResolver::new(&geometry).resolve_ground_truth(&volume, dims);
        assert_eq!(truth[[0, 6, 6]], 2);
    }

    // 40 nm voxels at 40x / 6.5 µm pixels: 0.246 pixels per voxel, so
    // x = 10 in a 10 voxel wide volume still magnifies inside the image
    fn fractional_geometry(config: &OpticsConfig) -> DerivedGeometry {
        DerivedGeometry::new(config, [100.0, 40.0, 40.0])
    }

    #[test]
    fn test_ground_truth_skips_points_past_volume_edge() {
        let config = config(0.0);
        let geometry = fractional_geometry(&config);
        let dims = [60, 10, 10];
        let z0 = geometry.slice_offsets(dims[0])[0];
        assert!(geometry.magnify(10) < geometry.magnified_extent(10));
        assert!(geometry.magnify(11) < geometry.magnified_extent(10));

        let volume = LabelVolume::from_unsorted(
            vec![z0, z0, z0],
            vec![10, 11, 2],
            vec![2, 2, 2],
            vec![3, 4, 5],
        )
        .unwrap();

        let truth = GroundTruthResolver::new(&geometry).resolve_ground_truth(&volume, dims);
        let first = truth.index_axis(Axis(0), 0);
        assert_eq!(first.iter().filter(|&&v| v != 0).count(), 1);
        assert_eq!(first[[geometry.magnify(2), geometry.magnify(2)]], 5);
    }

    #[test]
    fn test_points_past_volume_edge_emit_nothing() {
        let config = config(0.0);
        let geometry = fractional_geometry(&config);
        let lib = library();
        let dims = [60, 10, 10];
        let z0 = geometry.slice_offsets(dims[0])[0];

        let outside = FluorVolume::from_unsorted(
            vec![z0, z0],
            vec![10, 3],
            vec![3, 10],
            Array2::from_elem((1, 2), 5),
        )
        .unwrap();

        let photons = ChannelResolver::new(&config, &lib, &geometry, 3)
            .resolve_channel(&outside, dims, &["Flat"], 0)
            .unwrap();
        assert!(!photons.is_empty());
        assert!(photons.iter().all(|&v| v == 0.0));
    }
}
