//! Image processing primitives used by the renderers.
//!
//! # Module Organization
//!
//! - **io**: 8-bit slice output to standard image formats
//! - **noise**: Poisson noise fields and spatial weighting windows

pub mod io;
pub mod noise;

pub use io::{save_u8_image, to_gray_image};
pub use noise::{gaussian_window, poisson_field, poisson_sample};
