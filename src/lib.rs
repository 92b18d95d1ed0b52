//! # GemXray - Monte Carlo X-ray transport through layered GEM detector windows
//!
//! This library simulates X-ray photons from an empirical tube spectrum
//! crossing the readout window of a gas detector (copper, FR4 and kapton
//! foils) and converting in the Ar/CO2 drift gap behind it.
//!
//! ## Overview
//!
//! Each run builds a slab stack from an ordered list of (material,
//! thickness) pairs, fires primaries along the beam axis and records, per
//! event, the energy of every photon leaving each layer. Photons and
//! electrons that enter the gas gap are handed to an ionization oracle; an
//! event whose total ionization count exceeds a threshold is recorded as a
//! conversion. All tables are written once, at the end of the run, into a
//! compressed container file that the `gemxray-analysis` tool reads back.
//!
//! ## Architecture
//!
//! - `geometry`: material registry, layer presets and the slab [`geometry::Detector`]
//! - `spectrum` / `source`: spectrum table and the primary generator
//! - `physics` / `transport`: interaction sampling and the slab transport engine
//! - `gas`: the [`gas::IonizationOracle`] trait and the built-in Ar/CO2 gap
//! - `recorder`: per-event bookkeeping behind the [`run::SimulationHooks`] trait
//! - `run`: the run lifecycle driver
//! - `output`: column trees and the `.gxr` container
//! - `config` / `config_loader`: YAML run configuration
//! - `analysis`: spectra, yield curve, calibration, plots and reports
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use gemxray::config_loader::load_config;
//! use gemxray::gas::GasGap;
//! use gemxray::geometry::{Detector, MaterialRegistry};
//! use gemxray::recorder::HitRecorder;
//! use gemxray::run::RunManager;
//! use gemxray::source::PrimaryGenerator;
//! use gemxray::transport::SlabTransport;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("run.yaml"))?;
//! let registry = MaterialRegistry::standard();
//! let detector = Detector::build(&config.resolve_layers(None)?, &registry)?;
//! let generator = PrimaryGenerator::from_file(&config.general.spectrum, &detector)?;
//! let gas = GasGap::new(*detector.gas_gap(), &registry, config.general.seed + 1)?;
//! let mut recorder = HitRecorder::new(&detector, gas, config.conversion_settings())?;
//! let mut manager = RunManager::new(SlabTransport::new(detector), generator, config.general.seed);
//! manager.run(config.general.events, &mut recorder)?;
//! recorder.into_output().write(Path::new("run_35.gxr"))?;
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   events: 100000
//!   seed: 12345
//!   spectrum: xray-spectrum.csv
//!   log_level: info
//!
//! geometry:
//!   preset: custom10x10      # or an explicit list:
//!   # layers:
//!   #   - { material: copper, thickness: 0.035 }
//!   #   - { material: fr4, thickness: 3.0 }
//!
//! conversion:
//!   threshold: 20
//!   w_value: 31.2
//! ```
//!
//! ## Error Handling
//!
//! Library modules return `thiserror` enums (`GeometryError`,
//! `SpectrumError`, `RecorderError`, `OutputError`, `ValidationError`).
//! The binaries and the loaders wrap them in `color_eyre` reports with
//! context.

pub mod analysis;
pub mod config;
pub mod config_loader;
pub mod gas;
pub mod geometry;
pub mod output;
pub mod particle;
pub mod physics;
pub mod recorder;
pub mod run;
pub mod source;
pub mod spectrum;
pub mod transport;
pub mod utils;
