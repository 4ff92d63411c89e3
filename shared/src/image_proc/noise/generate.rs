//! Noise generation utilities for detector simulation.
//!
//! Provides the noise primitives the confocal renderer needs:
//! - Poisson fields for shot-noise-limited detector baselines
//! - Single Poisson draws that tolerate a zero mean
//! - Centered Gaussian windows used to weight a field spatially
//!
//! # Performance
//!
//! Field generation uses rayon via [`process_array_in_parallel_chunks`], one
//! deterministic RNG per block of rows, so a fixed seed reproduces the same
//! field regardless of thread count.

use crate::algo::process_array_in_parallel_chunks;
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Poisson};

/// Draw one Poisson sample with the given mean.
///
/// A mean of zero (or below) yields zero photons; `rand_distr` rejects
/// non-positive means so that case is short-circuited here.
pub fn poisson_sample<R: Rng + ?Sized>(mean: f64, rng: &mut R) -> f64 {
    if mean > 0.0 && mean.is_finite() {
        // Poisson::new only fails for non-positive or non-finite means
        match Poisson::new(mean) {
            Ok(dist) => dist.sample(rng),
            Err(_) => 0.0,
        }
    } else {
        0.0
    }
}

/// Generate a 2D field of independent Poisson samples with a common mean.
///
/// # Arguments
/// * `shape` - Output dimensions `(rows, cols)`
/// * `mean` - Poisson mean for every element
/// * `rng_seed` - Seed for the per-chunk RNGs
///
/// # Returns
/// A field of whole-number photon counts stored as `f64`
pub fn poisson_field(shape: (usize, usize), mean: f64, rng_seed: u64) -> Array2<f64> {
    let field = Array2::<f64>::zeros(shape);
    if mean <= 0.0 {
        return field;
    }

    process_array_in_parallel_chunks(field, rng_seed, Some(64), |chunk, rng| {
        let dist = match Poisson::new(mean) {
            Ok(dist) => dist,
            Err(_) => return,
        };
        chunk.iter_mut().for_each(|pixel| *pixel = dist.sample(rng));
    })
}

/// Centered, unnormalized 2D Gaussian window.
///
/// The window peaks at 1.0 at the geometric centre of the frame and falls off
/// with the given standard deviation (in elements) along each axis.
/// A non-positive standard deviation collapses that axis to a flat profile.
pub fn gaussian_window(shape: (usize, usize), sigma: (f64, f64)) -> Array2<f64> {
    let (rows, cols) = shape;
    let center_r = (rows as f64 - 1.0) / 2.0;
    let center_c = (cols as f64 - 1.0) / 2.0;

    let profile = |n: usize, center: f64, sigma: f64| -> Vec<f64> {
        (0..n)
            .map(|i| {
                if sigma > 0.0 {
                    let d = i as f64 - center;
                    (-(d * d) / (2.0 * sigma * sigma)).exp()
                } else {
                    1.0
                }
            })
            .collect()
    };

    let row_profile = profile(rows, center_r, sigma.0);
    let col_profile = profile(cols, center_c, sigma.1);

    Array2::from_shape_fn(shape, |(r, c)| row_profile[r] * col_profile[c])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_poisson_field_statistics() {
        let field = poisson_field((200, 200), 25.0, 123);
        assert_eq!(field.dim(), (200, 200));

        let mean = field.mean().unwrap();
        let var = field.var(0.0);
        assert_relative_eq!(mean, 25.0, epsilon = 0.5);
        assert_relative_eq!(var, 25.0, epsilon = 2.0);
        assert!(field.iter().all(|&v| v >= 0.0 && v.fract() == 0.0));
    }

    #[test]
    fn test_poisson_field_deterministic() {
        let a = poisson_field((70, 33), 4.0, 42);
        let b = poisson_field((70, 33), 4.0, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_poisson_field_zero_mean() {
        let field = poisson_field((10, 10), 0.0, 1);
        assert!(field.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_poisson_sample_zero_mean() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(poisson_sample(0.0, &mut rng), 0.0);
        assert_eq!(poisson_sample(-3.0, &mut rng), 0.0);
    }

    #[test]
    fn test_gaussian_window_peak_and_symmetry() {
        let window = gaussian_window((9, 7), (4.5, 3.5));
        assert_relative_eq!(window[[4, 3]], 1.0);
        for r in 0..9 {
            for c in 0..7 {
                assert_relative_eq!(window[[r, c]], window[[8 - r, 6 - c]], epsilon = 1e-12);
                assert!(window[[r, c]] <= 1.0);
            }
        }
        assert!(window[[0, 0]] < window[[4, 3]]);
    }

    #[test]
    fn test_gaussian_window_one_sigma() {
        let window = gaussian_window((1, 21), (0.0, 5.0));
        assert_relative_eq!(window[[0, 15]], (-0.5f64).exp(), epsilon = 1e-12);
    }
}
