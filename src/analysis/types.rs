//! Core data types for offline analysis of run outputs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::histogram::{Histogram, Moments};
use crate::output::TreeFile;

/// One run output together with the scan parameter taken from its file name
#[derive(Debug, Clone)]
pub struct RunFile {
    pub path: PathBuf,
    /// Digits captured from the file name, kept verbatim for labels
    pub label: String,
    pub parameter: f64,
    pub trees: TreeFile,
}

/// Energy histograms of every tree in one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpectra {
    pub file: String,
    pub label: String,
    pub parameter: f64,
    pub spectra: Vec<NamedHistogram>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedHistogram {
    pub name: String,
    pub entries: u64,
    pub mean: f64,
    pub rms: f64,
    pub histogram: Histogram,
}

/// Primary-electron yield of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldPoint {
    pub parameter: f64,
    pub label: String,
    /// Events in the primary tree
    pub events: usize,
    /// Ionization-electron counts of the converted events
    pub primaries: Moments,
}

impl YieldPoint {
    /// Fraction of events that converted in the gas
    pub fn conversion_efficiency(&self) -> f64 {
        if self.events == 0 {
            return 0.0;
        }
        self.primaries.entries as f64 / self.events as f64
    }
}

/// Known two-line calibration sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationSource {
    /// Silver-anode X-ray tube (Kα 22.16 keV, Kβ 24.9 keV)
    Xray,
    /// Fe-55 (5.89 keV line and 6.49 keV Kβ)
    Fe55,
}

impl CalibrationSource {
    /// Reference line energies in keV, lower first
    pub fn peak_energies(&self) -> [f64; 2] {
        match self {
            CalibrationSource::Xray => [22.16, 24.9],
            CalibrationSource::Fe55 => [5.89, 6.49],
        }
    }
}

impl std::fmt::Display for CalibrationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationSource::Xray => write!(f, "xray"),
            CalibrationSource::Fe55 => write!(f, "fe55"),
        }
    }
}

/// Linear map from ionization count to energy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    pub label: String,
    pub source: CalibrationSource,
    pub peak_energies: [f64; 2],
    pub peak_primaries: [f64; 2],
    /// keV per ionization electron
    pub scale: f64,
    /// keV
    pub offset: f64,
    pub primaries: Moments,
}

impl Calibration {
    pub fn energy(&self, primaries: f64) -> f64 {
        primaries * self.scale + self.offset
    }
}

/// Information about the analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub analysis_timestamp: String,
    pub input_dir: String,
    pub files_analyzed: usize,
}

/// Everything one invocation of the analysis tool produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullAnalysisReport {
    pub metadata: AnalysisMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectra: Option<Vec<RunSpectra>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yield_curve: Option<Vec<YieldPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibrations: Option<Vec<Calibration>>,
}
