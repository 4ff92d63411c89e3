//! Hardware module for confocal optics and the microscope model

pub mod confocal;
pub mod geometry;
pub mod optics;

pub use confocal::{ConfocalMicroscope, ParameterSnapshot};
pub use geometry::{expanded_dims, DerivedGeometry, AXIAL_SIGMA_REACH};
pub use optics::{ChannelOptics, OpticsConfig, OpticsConfigError, OpticsParameters};
