//! Image formation specific to the confocal simulator.
//!
//! This module contains the PSF, projection and resolution stages that
//! depend on optics types and are not suitable for the shared crate.

pub mod project;
pub mod psf;
pub mod render;

pub use project::PhotonProjector;
pub use psf::{PsfKernel, PsfKernelBuilder};
pub use render::{ChannelResolver, GroundTruthResolver, ResolveError};

// Re-export all shared image_proc functionality
pub use shared::image_proc::*;
