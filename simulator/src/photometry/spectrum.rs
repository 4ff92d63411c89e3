//! Wavelength bands and sampled spectral curves for fluorophore photometry.
//!
//! Fluorophore excitation and emission spectra are represented as piecewise
//! linear curves over wavelength in nanometres, with values in [0, 1]
//! (relative efficiency, peak-normalised). Emission filters are plain
//! wavelength [`Band`]s. Integration over a band is exact for the piecewise
//! linear model (trapezoidal rule on the curve's own knots).
//!
//! # Data Requirements
//!
//! Curves must satisfy:
//! - **Wavelength ordering**: strictly ascending wavelength values
//! - **Value bounds**: all values in the [0.0, 1.0] range
//! - **At least two points**
//!
//! Outside its sampled range a curve evaluates to zero.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur building a spectral curve
#[derive(Debug, Error, PartialEq)]
pub enum SpectralCurveError {
    #[error("Wavelength and value vectors must have the same length (at least 2)")]
    LengthMismatch,

    #[error("Wavelengths must be in ascending order")]
    NotAscending,

    #[error("Spectral values must be between 0.0 and 1.0")]
    OutOfRange,
}

/// Wavelength range specification for filters and integration limits.
///
/// # Physical Constraints
/// - Wavelengths must be non-negative and finite
/// - Lower bound must not exceed the upper bound
/// - Wavelengths specified in nanometers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    /// Lower wavelength bound in nanometers
    pub lower_nm: f64,

    /// Upper wavelength bound in nanometers
    pub upper_nm: f64,
}

impl Band {
    /// Create a new Band directly from lower and upper bounds
    ///
    /// # Panics
    ///
    /// Invalid ranges are programming errors, so this panics instead of
    /// returning a Result when a bound is non-finite, negative or the bounds
    /// are reversed.
    pub fn from_nm_bounds(lower_nm: f64, upper_nm: f64) -> Self {
        if !lower_nm.is_finite() || !upper_nm.is_finite() {
            panic!("Wavelength range cannot contain non-finite values");
        }

        if lower_nm > upper_nm {
            panic!(
                "Invalid wavelength range: start must be less than end, got {}..{}",
                lower_nm, upper_nm,
            );
        }
        if lower_nm < 0.0 {
            panic!("Wavelengths must be non-negative");
        }

        Self { lower_nm, upper_nm }
    }
}

/// Raw serialized form, validated through [`SpectralCurve::from_table`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SpectralCurveTable {
    wavelengths: Vec<f64>,
    values: Vec<f64>,
}

/// Piecewise linear spectral response curve.
///
/// Stores wavelength/value pairs and interpolates linearly between them.
/// Used for fluorophore excitation efficiency and relative emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpectralCurveTable", into = "SpectralCurveTable")]
pub struct SpectralCurve {
    /// Wavelengths in nanometers (nm), strictly ascending
    wavelengths: Vec<f64>,

    /// Values (0.0 to 1.0) corresponding to each wavelength
    values: Vec<f64>,
}

impl TryFrom<SpectralCurveTable> for SpectralCurve {
    type Error = SpectralCurveError;

    fn try_from(table: SpectralCurveTable) -> Result<Self, Self::Error> {
        Self::from_table(table.wavelengths, table.values)
    }
}

impl From<SpectralCurve> for SpectralCurveTable {
    fn from(curve: SpectralCurve) -> Self {
        Self {
            wavelengths: curve.wavelengths,
            values: curve.values,
        }
    }
}

impl SpectralCurve {
    /// Create a curve from wavelength and value tables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The vectors have different lengths or fewer than two points
    /// - Wavelengths are not strictly ascending
    /// - Any value is outside the range [0.0, 1.0]
    pub fn from_table(wavelengths: Vec<f64>, values: Vec<f64>) -> Result<Self, SpectralCurveError> {
        if wavelengths.len() != values.len() || wavelengths.len() < 2 {
            return Err(SpectralCurveError::LengthMismatch);
        }

        if wavelengths.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SpectralCurveError::NotAscending);
        }

        if values.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(SpectralCurveError::OutOfRange);
        }

        Ok(Self {
            wavelengths,
            values,
        })
    }

    /// Sampled Gaussian profile with unit peak.
    ///
    /// Sampled every nanometre out to four standard deviations either side of
    /// the peak. Handy for dyes where only peak wavelength and width are known.
    ///
    /// # Panics
    ///
    /// Panics if `fwhm_nm` is not positive or `peak_nm` is not finite.
    pub fn gaussian(peak_nm: f64, fwhm_nm: f64) -> Self {
        assert!(fwhm_nm > 0.0, "FWHM must be positive, got {fwhm_nm}");
        assert!(peak_nm.is_finite(), "Peak wavelength must be finite");

        let sigma = fwhm_nm / (2.0 * (2.0 * 2f64.ln()).sqrt());
        let half_span = (4.0 * sigma).ceil().max(1.0) as i64;

        let (wavelengths, values) = (-half_span..=half_span)
            .map(|i| {
                let d = i as f64;
                (peak_nm + d, (-(d * d) / (2.0 * sigma * sigma)).exp())
            })
            .unzip();

        Self {
            wavelengths,
            values,
        }
    }

    /// Evaluate the curve at a wavelength using linear interpolation.
    ///
    /// Returns 0.0 outside the sampled range.
    pub fn at(&self, wavelength: f64) -> f64 {
        let first = self.wavelengths[0];
        let last = self.wavelengths[self.wavelengths.len() - 1];
        if !(first..=last).contains(&wavelength) {
            return 0.0;
        }

        // index of the first knot strictly greater than the wavelength
        let upper = self
            .wavelengths
            .partition_point(|&w| w <= wavelength)
            .min(self.wavelengths.len() - 1);
        let lower = upper.saturating_sub(1);

        let (w0, w1) = (self.wavelengths[lower], self.wavelengths[upper]);
        if w1 == w0 {
            return self.values[upper];
        }
        let t = (wavelength - w0) / (w1 - w0);
        self.values[lower] * (1.0 - t) + self.values[upper] * t
    }

    /// Wavelength range covered by the samples
    pub fn band(&self) -> Band {
        Band {
            lower_nm: self.wavelengths[0],
            upper_nm: self.wavelengths[self.wavelengths.len() - 1],
        }
    }

    /// Integrate the curve over a wavelength band (units: value × nm).
    ///
    /// The band is clipped to the curve's range; a band that does not overlap
    /// integrates to zero.
    pub fn integrate(&self, band: &Band) -> f64 {
        let range = self.band();
        let lo = band.lower_nm.max(range.lower_nm);
        let hi = band.upper_nm.min(range.upper_nm);
        if lo >= hi {
            return 0.0;
        }

        let mut knots = Vec::with_capacity(self.wavelengths.len() + 2);
        knots.push(lo);
        knots.extend(self.wavelengths.iter().copied().filter(|&w| w > lo && w < hi));
        knots.push(hi);

        knots
            .windows(2)
            .map(|w| 0.5 * (self.at(w[0]) + self.at(w[1])) * (w[1] - w[0]))
            .sum()
    }

    /// Integral over the full sampled range
    pub fn total(&self) -> f64 {
        self.integrate(&self.band())
    }

    /// Fraction of the curve's total area falling inside `band`.
    ///
    /// Returns 0.0 for a curve with no area.
    pub fn fraction_in(&self, band: &Band) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        (self.integrate(band) / total).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> SpectralCurve {
        SpectralCurve::from_table(vec![400.0, 500.0, 600.0], vec![0.0, 1.0, 0.0]).unwrap()
    }

    #[test]
    fn test_from_table_validation() {
        assert_eq!(
            SpectralCurve::from_table(vec![400.0], vec![0.5]),
            Err(SpectralCurveError::LengthMismatch)
        );
        assert_eq!(
            SpectralCurve::from_table(vec![400.0, 500.0], vec![0.5]),
            Err(SpectralCurveError::LengthMismatch)
        );
        assert_eq!(
            SpectralCurve::from_table(vec![500.0, 400.0], vec![0.5, 0.5]),
            Err(SpectralCurveError::NotAscending)
        );
        assert_eq!(
            SpectralCurve::from_table(vec![400.0, 500.0], vec![0.5, 1.5]),
            Err(SpectralCurveError::OutOfRange)
        );
    }

    #[test]
    fn test_interpolation() {
        let curve = triangle();
        assert_relative_eq!(curve.at(500.0), 1.0);
        assert_relative_eq!(curve.at(450.0), 0.5);
        assert_relative_eq!(curve.at(575.0), 0.25);
        assert_eq!(curve.at(399.0), 0.0);
        assert_eq!(curve.at(601.0), 0.0);
        assert_relative_eq!(curve.at(600.0), 0.0);
    }

    #[test]
    fn test_integrate_partial_band() {
        let curve = triangle();
        assert_relative_eq!(curve.total(), 100.0, epsilon = 1e-9);
        // left half of the triangle
        assert_relative_eq!(
            curve.integrate(&Band::from_nm_bounds(300.0, 500.0)),
            50.0,
            epsilon = 1e-9
        );
        // clipped band straddling the peak: 450..550 -> 100 * 0.75
        assert_relative_eq!(
            curve.integrate(&Band::from_nm_bounds(450.0, 550.0)),
            75.0,
            epsilon = 1e-9
        );
        assert_eq!(curve.integrate(&Band::from_nm_bounds(700.0, 800.0)), 0.0);
    }

    #[test]
    fn test_fraction_in() {
        let curve = triangle();
        assert_relative_eq!(
            curve.fraction_in(&Band::from_nm_bounds(450.0, 550.0)),
            0.75,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            curve.fraction_in(&Band::from_nm_bounds(0.0, 1000.0)),
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_gaussian_profile() {
        let curve = SpectralCurve::gaussian(520.0, 40.0);
        assert_relative_eq!(curve.at(520.0), 1.0);
        assert_relative_eq!(curve.at(540.0), 0.5, epsilon = 1e-3);
        assert_relative_eq!(curve.at(500.0), 0.5, epsilon = 1e-3);
        // one FWHM centred on the peak holds ~76% of a Gaussian
        let frac = curve.fraction_in(&Band::from_nm_bounds(500.0, 540.0));
        assert_relative_eq!(frac, 0.761, epsilon = 0.01);
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let json = r#"{"wavelengths":[400.0,500.0],"values":[0.2,0.9]}"#;
        let curve: SpectralCurve = serde_json::from_str(json).unwrap();
        assert_relative_eq!(curve.at(450.0), 0.55, epsilon = 1e-12);

        let bad = r#"{"wavelengths":[500.0,400.0],"values":[0.2,0.9]}"#;
        assert!(serde_json::from_str::<SpectralCurve>(bad).is_err());
    }

    #[test]
    #[should_panic]
    fn test_band_reversed_panics() {
        Band::from_nm_bounds(600.0, 500.0);
    }
}
