//! Projection of per-point photon counts through a PSF kernel onto one
//! output slice.
//!
//! This is the hot path of the renderer. Every point within the kernel's
//! axial reach of the slice adds `photons × kernel plane` around its
//! magnified position. The points are split into a fixed number of
//! contiguous partitions; each rayon task accumulates into its own padded
//! buffer and the partials are summed in partition order, so the result is
//! identical regardless of thread scheduling.

use std::ops::Range;

use log::trace;
use ndarray::{s, Array2};
use rayon::prelude::*;

use super::psf::PsfKernel;
use crate::hardware::DerivedGeometry;
use crate::volume::SparsePoints;

/// Minimum number of points worth a separate accumulation buffer
const MIN_POINTS_PER_TASK: usize = 2048;

/// Upper bound on private accumulators alive per slice
const MAX_TASKS: usize = 8;

/// Splats photon counts from sparse points into 2D slices for one channel.
pub struct PhotonProjector<'a> {
    kernel: &'a PsfKernel,
    geometry: &'a DerivedGeometry,
}

impl<'a> PhotonProjector<'a> {
    pub fn new(kernel: &'a PsfKernel, geometry: &'a DerivedGeometry) -> Self {
        Self { kernel, geometry }
    }

    /// Indices of points that can reach the slice at `z_offset`, i.e. with
    /// `|z − z_offset| < axial_len`.
    pub fn contributing(&self, points: &SparsePoints, z_offset: usize) -> Range<usize> {
        let reach = self.kernel.axial_len();
        points.z_range(z_offset.saturating_sub(reach - 1), z_offset + reach)
    }

    /// Render the slice at voxel depth `z_offset` into an image of
    /// `dims = (width, height)` output pixels.
    ///
    /// `photons[i]` is the photon total for point `i`. Points whose magnified
    /// position falls outside `dims` are skipped; kernel footprints hanging
    /// over the image edge are cropped.
    ///
    /// # Panics
    ///
    /// Panics if `photons` and `points` differ in length.
    pub fn project(
        &self,
        points: &SparsePoints,
        photons: &[u64],
        z_offset: usize,
        dims: (usize, usize),
    ) -> Array2<f64> {
        assert_eq!(
            points.len(),
            photons.len(),
            "one photon count is needed per point"
        );

        let (width, height) = dims;
        let range = self.contributing(points, z_offset);
        if range.is_empty() || width == 0 || height == 0 {
            return Array2::zeros(dims);
        }

        let (cx, cy) = self.kernel.center();
        let padded = (width + 2 * cx, height + 2 * cy);

        let n = range.len();
        let tasks = n.div_ceil(MIN_POINTS_PER_TASK).clamp(1, MAX_TASKS);
        let per_task = n.div_ceil(tasks);
        trace!(
            "Projecting {n} points onto slice z={z_offset} using {tasks} partitions"
        );

        let partials: Vec<Array2<f64>> = (0..tasks)
            .into_par_iter()
            .map(|task| {
                let lo = range.start + task * per_task;
                let hi = (lo + per_task).min(range.end);
                let mut acc = Array2::zeros(padded);
                for i in lo..hi {
                    self.splat(&mut acc, points, photons[i], i, z_offset, dims);
                }
                acc
            })
            .collect();

        let mut total = Array2::<f64>::zeros(padded);
        for partial in &partials {
            total += partial;
        }
        total.slice(s![cx..cx + width, cy..cy + height]).to_owned()
    }

    fn splat(
        &self,
        acc: &mut Array2<f64>,
        points: &SparsePoints,
        photons: u64,
        index: usize,
        z_offset: usize,
        (width, height): (usize, usize),
    ) {
        if photons == 0 {
            return;
        }
        let Some(plane) = self.kernel.plane(points.z()[index].abs_diff(z_offset)) else {
            return;
        };

        let px = self.geometry.magnify(points.x()[index]);
        let py = self.geometry.magnify(points.y()[index]);
        if px >= width || py >= height {
            return;
        }

        // padded coordinates put the kernel centre at (px + cx, py + cy)
        let (kw, kh) = self.kernel.footprint();
        acc.slice_mut(s![px..px + kw, py..py + kh])
            .scaled_add(photons as f64, &plane);
    }
}
