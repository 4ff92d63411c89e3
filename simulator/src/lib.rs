//! Confocal fluorescence microscope simulation
//!
//! This crate renders the image stack a confocal microscope would record
//! from a sparse, expanded volume of labelled fluorophores: photon budgets
//! from fluorophore photophysics and laser power, a Gaussian-beam PSF,
//! parallel photon projection with shot and baseline noise, and an aligned
//! ground-truth label stack.

pub mod hardware;
pub mod image_proc;
pub mod photometry;
pub mod volume;

// Re-exports for easier access
pub use hardware::{ConfocalMicroscope, DerivedGeometry, OpticsConfig, OpticsParameters};
pub use image_proc::{PhotonProjector, PsfKernelBuilder, ResolveError};
pub use photometry::{FluorophoreLibrary, PhotonPhysics, SpectralLibrary};
pub use volume::{FluorVolume, LabelVolume, SparsePoints};
