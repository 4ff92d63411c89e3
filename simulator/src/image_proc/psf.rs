//! Gaussian-beam point spread function kernels.
//!
//! The confocal PSF is approximated by the intensity profile of a focused
//! Gaussian beam:
//!
//! ```text
//! w0  = λ / (π · NA)                      beam waist
//! z_R = π · w0² / λ                       Rayleigh range
//! w(z) = w0 · sqrt(1 + (step_z · z / z_R)²)
//! I(dx, dy, z) = (w0 / w(z))² · exp(-2 · ((r · dx)² + (r · dy)²) / w(z)²)
//! ```
//!
//! with `r = pixel_size / objective_factor` (sample-plane nm per output pixel)
//! and `step_z = focal_plane_depth / z_offset_step` (nm per axial index).
//!
//! The beam is even in z, so only the non-negative axial half is stored and
//! callers index it with `|Z − z_offset|`. The centre value is exactly 1.

use std::f64::consts::PI;

use ndarray::{Array3, ArrayView2, Axis};

use crate::hardware::{DerivedGeometry, OpticsConfig, AXIAL_SIGMA_REACH};

/// Transverse kernel extent in standard deviations (±4σ)
const TRANSVERSE_SIGMA_EXTENT: f64 = 8.0;

/// PSF weights for one channel, indexed `[axial, x, y]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PsfKernel {
    weights: Array3<f64>,
}

impl PsfKernel {
    /// Number of stored axial planes (z = 0 .. axial_len)
    pub fn axial_len(&self) -> usize {
        self.weights.len_of(Axis(0))
    }

    /// Transverse `(width, height)` in output pixels; both odd
    pub fn footprint(&self) -> (usize, usize) {
        (self.weights.len_of(Axis(1)), self.weights.len_of(Axis(2)))
    }

    /// Index of the kernel centre within a transverse plane
    pub fn center(&self) -> (usize, usize) {
        let (w, h) = self.footprint();
        (w / 2, h / 2)
    }

    /// Transverse weights at an axial distance, `None` past the kernel reach
    pub fn plane(&self, axial: usize) -> Option<ArrayView2<'_, f64>> {
        (axial < self.axial_len()).then(|| self.weights.index_axis(Axis(0), axial))
    }

    /// Sum of weights in one axial plane
    pub fn plane_weight(&self, axial: usize) -> f64 {
        self.plane(axial).map_or(0.0, |p| p.sum())
    }

    pub fn weights(&self) -> &Array3<f64> {
        &self.weights
    }
}

/// Builds [`PsfKernel`]s from optics and sampling geometry.
pub struct PsfKernelBuilder<'a> {
    config: &'a OpticsConfig,
    geometry: &'a DerivedGeometry,
}

impl<'a> PsfKernelBuilder<'a> {
    pub fn new(config: &'a OpticsConfig, geometry: &'a DerivedGeometry) -> Self {
        Self { config, geometry }
    }

    /// Kernel for a channel using the geometry's standard deviations.
    pub fn build_channel(&self, channel: usize) -> PsfKernel {
        let sigma_xy = self.geometry.std_dev_xy(channel);
        self.build(sigma_xy, sigma_xy, self.geometry.std_dev_z(channel), channel)
    }

    /// Kernel spanning `ceil(8σx) × ceil(8σy)` pixels (rounded up to odd so
    /// the centre is a pixel) and `ceil(4σz)` axial planes.
    pub fn build(&self, sigma_x: f64, sigma_y: f64, sigma_z: f64, channel: usize) -> PsfKernel {
        let width = odd_extent(sigma_x);
        let height = odd_extent(sigma_y);
        let depth = ((AXIAL_SIGMA_REACH * sigma_z).ceil() as usize).max(1);

        let wavelength = self.config.wavelength_nm(channel);
        let na = self.config.numerical_aperture();
        let w0 = wavelength / (PI * na);
        let rayleigh = PI * w0 * w0 / wavelength;

        let size_r = self.config.pixel_size_nm() / self.config.objective_factor();
        let step_z = self.config.focal_plane_depth_nm() / self.geometry.z_offset_step() as f64;

        let (cx, cy) = (width / 2, height / 2);

        let weights = Array3::from_shape_fn((depth, width, height), |(z, i, j)| {
            let axial = step_z * z as f64 / rayleigh;
            let w = w0 * (1.0 + axial * axial).sqrt();

            let dx = size_r * (i as f64 - cx as f64);
            let dy = size_r * (j as f64 - cy as f64);

            (w0 / w).powi(2) * (-2.0 * (dx * dx + dy * dy) / (w * w)).exp()
        });

        PsfKernel { weights }
    }
}

fn odd_extent(sigma: f64) -> usize {
    ((TRANSVERSE_SIGMA_EXTENT * sigma).ceil() as usize).max(1) | 1
}
