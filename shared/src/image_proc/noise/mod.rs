//! Noise processing module for detector simulation
//!
//! - **generate**: seeded Poisson noise fields and spatial weighting windows

pub mod generate;

pub use generate::{gaussian_window, poisson_field, poisson_sample};
