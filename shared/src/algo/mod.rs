//! Algorithms shared across simulation stages
//!
//! This module provides deterministic parallel processing helpers and
//! small array utilities.

pub mod misc;
pub mod parallel;

pub use misc::{max_value, normalize_to_u8};
pub use parallel::{
    derive_seed, process_array_in_parallel_chunks, process_slice_in_parallel_chunks,
};
