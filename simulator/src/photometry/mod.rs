//! Photometry models: spectral curves, fluorophore data and photon budgets

pub mod fluorophore;
pub mod photon_physics;
pub mod spectrum;

pub use fluorophore::{Fluorophore, FluorophoreLibrary, SpectralError, SpectralLibrary};
pub use photon_physics::{sample_photon_counts, PhotonPhysics};
pub use spectrum::{Band, SpectralCurve, SpectralCurveError};
