//! Sampling geometry between the voxel grid and the detector grid.
//!
//! A [`DerivedGeometry`] is computed from an [`OpticsConfig`] and the physical
//! voxel size of the (expanded) volume being imaged. It fixes:
//!
//! - **scale_factor_xy**: output pixels per voxel after magnification,
//!   `voxel_y · objective_factor / pixel_size`
//! - **z_offset_step**: voxels per output slice,
//!   `ceil(focal_plane_depth / voxel_z)`
//! - **std_dev_xy / std_dev_z**: per-channel Gaussian PSF widths, in output
//!   pixels and voxels respectively, from the Gaussian approximation of a
//!   confocal PSF: `σ_xy = scale · λ / (2π · NA · voxel_y)` and
//!   `σ_z = 0.78 · λ / (NA² · voxel_z)`
//!
//! All dims and voxel sizes use `[z, x, y]` ordering.
//!
//! The geometry is a value, recomputed whenever voxel size changes; it is
//! never stored back into the optics configuration.

use std::f64::consts::PI;

use super::optics::OpticsConfig;

/// Number of standard deviations the axial PSF window extends either side
/// of a slice.
pub const AXIAL_SIGMA_REACH: f64 = 4.0;

/// Sampling parameters for one imaging run
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedGeometry {
    /// Output pixels per voxel along x and y
    scale_factor_xy: f64,
    /// Voxels between consecutive output slices
    z_offset_step: usize,
    /// Per-channel lateral PSF standard deviation in output pixels
    std_dev_xy: Vec<f64>,
    /// Per-channel axial PSF standard deviation in voxels
    std_dev_z: Vec<f64>,
}

impl DerivedGeometry {
    /// Derive the sampling geometry for a voxel size.
    ///
    /// # Panics
    ///
    /// Panics if any voxel dimension or the numerical aperture is not
    /// positive and finite; that is a caller contract violation.
    pub fn new(config: &OpticsConfig, voxel_dims_nm: [f64; 3]) -> Self {
        assert!(
            voxel_dims_nm.iter().all(|d| d.is_finite() && *d > 0.0),
            "voxel dimensions must be positive, got {voxel_dims_nm:?}"
        );
        let na = config.numerical_aperture();
        assert!(
            na.is_finite() && na > 0.0,
            "numerical aperture must be positive, got {na}"
        );
        let [voxel_z, _, voxel_y] = voxel_dims_nm;

        let scale_factor_xy = voxel_y * config.objective_factor() / config.pixel_size_nm();
        let z_offset_step = ((config.focal_plane_depth_nm() / voxel_z).ceil() as usize).max(1);

        let (std_dev_xy, std_dev_z) = (0..config.num_channels())
            .map(|c| {
                let wavelength = config.wavelength_nm(c);
                (
                    scale_factor_xy * wavelength / (2.0 * PI * na * voxel_y),
                    0.78 * wavelength / (na * na * voxel_z),
                )
            })
            .unzip();

        Self {
            scale_factor_xy,
            z_offset_step,
            std_dev_xy,
            std_dev_z,
        }
    }

    pub fn scale_factor_xy(&self) -> f64 {
        self.scale_factor_xy
    }

    pub fn z_offset_step(&self) -> usize {
        self.z_offset_step
    }

    pub fn std_dev_xy(&self, channel: usize) -> f64 {
        self.std_dev_xy[channel]
    }

    pub fn std_dev_z(&self, channel: usize) -> f64 {
        self.std_dev_z[channel]
    }

    /// Largest axial standard deviation over all channels
    pub fn max_std_dev_z(&self) -> f64 {
        self.std_dev_z.iter().copied().fold(0.0, f64::max)
    }

    /// Voxels kept clear above and below the imaged slices so every channel's
    /// axial PSF window stays inside the volume: `ceil(4 · max σ_z)`.
    pub fn axial_margin(&self) -> usize {
        (AXIAL_SIGMA_REACH * self.max_std_dev_z()).ceil() as usize
    }

    /// Z offsets (in voxels) of the output slices for a volume of `depth`
    /// voxels.
    ///
    /// Offsets start at `ceil(4 · max σ_z)` and advance by `z_offset_step`
    /// while staying strictly below `floor(depth − 4 · max σ_z)`. Volumes too
    /// shallow for the PSF window produce no slices.
    pub fn slice_offsets(&self, depth: usize) -> Vec<usize> {
        let start = self.axial_margin();
        let stop = (depth as f64 - AXIAL_SIGMA_REACH * self.max_std_dev_z()).floor();
        if stop <= start as f64 {
            return Vec::new();
        }
        (start..stop as usize).step_by(self.z_offset_step).collect()
    }

    /// Output pixel coordinate of a voxel coordinate along x or y
    pub fn magnify(&self, coord: usize) -> usize {
        (coord as f64 * self.scale_factor_xy).floor() as usize
    }

    /// Output transverse size for a volume extent along x or y
    pub fn magnified_extent(&self, extent: usize) -> usize {
        (extent as f64 * self.scale_factor_xy).ceil() as usize
    }

    /// Output stack dims `[slices, width, height]` for volume dims `[z, x, y]`
    pub fn output_dims(&self, volume_dims: [usize; 3]) -> [usize; 3] {
        [
            self.slice_offsets(volume_dims[0]).len(),
            self.magnified_extent(volume_dims[1]),
            self.magnified_extent(volume_dims[2]),
        ]
    }

    /// Smallest pre-expansion volume `[depth, width, height]` whose expanded
    /// image covers `bounds_wanted` output `[slices, width, height]`.
    ///
    /// The expanded depth holds every wanted slice plus the axial PSF margin
    /// on both sides (`2 · ceil(4 · max σ_z)`, at least `8 · max σ_z`);
    /// transverse sizes invert the magnification. Everything is then divided
    /// by the expansion factor and rounded up.
    ///
    /// # Panics
    ///
    /// Panics if `expansion_factor` is not positive and finite.
    pub fn required_volume(&self, expansion_factor: f64, bounds_wanted: [usize; 3]) -> [usize; 3] {
        assert!(
            expansion_factor.is_finite() && expansion_factor > 0.0,
            "expansion factor must be positive, got {expansion_factor}"
        );
        let [slices, width, height] = bounds_wanted;

        let expanded_depth = slices * self.z_offset_step + 2 * self.axial_margin();
        let expanded_width = (width as f64 / self.scale_factor_xy).ceil() as usize;
        let expanded_height = (height as f64 / self.scale_factor_xy).ceil() as usize;

        [
            shrink(expanded_depth, expansion_factor),
            shrink(expanded_width, expansion_factor),
            shrink(expanded_height, expansion_factor),
        ]
    }
}

/// Smallest `n` with `n · expansion_factor ≥ expanded` in floating point.
fn shrink(expanded: usize, expansion_factor: f64) -> usize {
    let target = expanded as f64;
    let mut n = (target / expansion_factor).ceil() as usize;
    while (n as f64) * expansion_factor < target {
        n += 1;
    }
    n
}

/// Volume dims after expanding a raw volume, as produced upstream.
pub fn expanded_dims(raw_dims: [usize; 3], expansion_factor: f64) -> [usize; 3] {
    raw_dims.map(|d| (d as f64 * expansion_factor).floor() as usize)
}
