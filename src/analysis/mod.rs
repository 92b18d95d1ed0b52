//! Offline analysis of simulation outputs.
//!
//! Loads a directory of run files, histograms the recorded hit energies,
//! builds the primary-electron yield curve over the scan parameter and
//! calibrates the ionization-count spectrum against known X-ray lines.

pub mod types;
pub mod histogram;
pub mod loader;
pub mod spectra;
pub mod calibration;
pub mod plot;
pub mod report;

pub use types::*;
pub use histogram::{Histogram, Moments};
pub use loader::load_runs;
pub use spectra::{analyze_spectra, analyze_yield};
pub use calibration::calibrate;
pub use report::{generate_json_report, generate_text_report, print_summary};
