//! Shared numeric helpers.

pub mod interpolation;

pub use interpolation::interpolate_log_log;
