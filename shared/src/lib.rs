//! Shared components and utilities for the confocal simulator.
//!
//! This crate holds the array-level pieces that carry no optics knowledge:
//! deterministic parallel chunk processing, noise fields, 8-bit
//! normalization and slice image output.

pub mod algo;
pub mod image_proc;
