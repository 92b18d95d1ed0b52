//! Offline analysis CLI for GemXray run outputs.
//!
//! Reads every `.gxr` file in a directory, histograms the recorded hit
//! energies, builds the primary-electron yield curve over the scan
//! parameter in the file names and calibrates the ionization spectrum.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Context, Result};

use gemxray::analysis::{
    self,
    calibration::{find_two_peaks, primaries_histogram},
    plot,
    types::{AnalysisMetadata, Calibration, CalibrationSource, FullAnalysisReport, RunFile, RunSpectra, YieldPoint},
};
use gemxray::recorder::CONVERSION_TREE;

#[derive(Parser)]
#[command(name = "gemxray-analysis")]
#[command(about = "Spectra, yield and calibration analysis for GemXray runs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the run output files
    #[arg(short, long, default_value = ".")]
    input: PathBuf,

    /// Output directory for plots and reports
    #[arg(short, long, default_value = "analysis_output")]
    output: PathBuf,

    /// Label of the scan parameter encoded in the file names
    #[arg(long, default_value = "copper thickness [um]")]
    parameter_label: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every analysis
    Full {
        /// Reference lines for the calibration
        #[arg(long, value_enum, default_value_t = CalibrationSource::Xray)]
        source: CalibrationSource,
    },

    /// Hit-energy spectra per run
    Spectra,

    /// Primary-electron yield against the scan parameter
    Yield,

    /// Two-line energy calibration of every run
    Calibrate {
        /// Reference lines for the calibration
        #[arg(long, value_enum, default_value_t = CalibrationSource::Xray)]
        source: CalibrationSource,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    // Set thread pool size
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let runs = analysis::load_runs(&cli.input)?;
    if runs.is_empty() {
        bail!("No run files with a scan parameter found in {}", cli.input.display());
    }

    // Create output directory
    fs::create_dir_all(&cli.output)
        .with_context(|| format!("Failed to create output directory: {}", cli.output.display()))?;

    let (name, report) = match cli.command {
        Commands::Full { source } => {
            let report = FullAnalysisReport {
                metadata: create_metadata(&cli.input, &runs),
                spectra: Some(run_spectra(&runs, &cli.output)?),
                yield_curve: Some(run_yield(&runs, &cli.output, &cli.parameter_label)?),
                calibrations: Some(run_calibration(&runs, source, &cli.output)?),
            };
            ("full_report", report)
        }
        Commands::Spectra => {
            let report = FullAnalysisReport {
                metadata: create_metadata(&cli.input, &runs),
                spectra: Some(run_spectra(&runs, &cli.output)?),
                yield_curve: None,
                calibrations: None,
            };
            ("spectra_report", report)
        }
        Commands::Yield => {
            let report = FullAnalysisReport {
                metadata: create_metadata(&cli.input, &runs),
                spectra: None,
                yield_curve: Some(run_yield(&runs, &cli.output, &cli.parameter_label)?),
                calibrations: None,
            };
            ("yield_report", report)
        }
        Commands::Calibrate { source } => {
            let report = FullAnalysisReport {
                metadata: create_metadata(&cli.input, &runs),
                spectra: None,
                yield_curve: None,
                calibrations: Some(run_calibration(&runs, source, &cli.output)?),
            };
            ("calibration_report", report)
        }
    };

    analysis::generate_json_report(&report, &cli.output.join(format!("{}.json", name)))?;
    analysis::generate_text_report(&report, &cli.output.join(format!("{}.txt", name)))?;
    analysis::print_summary(&report);

    log::info!("Analysis complete. Results written to {}", cli.output.display());
    Ok(())
}

fn run_spectra(runs: &[RunFile], output: &Path) -> Result<Vec<RunSpectra>> {
    let spectra: Vec<RunSpectra> = runs.iter().map(analysis::analyze_spectra).collect();
    for s in &spectra {
        plot::plot_spectra(s, &output.join(format!("spectrum_{}.svg", s.label)))?;
    }
    Ok(spectra)
}

fn run_yield(runs: &[RunFile], output: &Path, parameter_label: &str) -> Result<Vec<YieldPoint>> {
    let curve = analysis::analyze_yield(runs);
    plot::plot_yield(&curve, parameter_label, &output.join("primary_electrons.svg"))?;
    Ok(curve)
}

/// Calibrate each run; runs without two resolvable lines are skipped
fn run_calibration(runs: &[RunFile], source: CalibrationSource, output: &Path) -> Result<Vec<Calibration>> {
    let mut calibrations = Vec::new();
    for run in runs {
        let Some(primaries) = run.trees.tree(CONVERSION_TREE).and_then(|t| t.column("primaries")) else {
            log::warn!("{}: no conversion tree", run.path.display());
            continue;
        };
        let histogram = primaries_histogram(primaries);
        plot::plot_primaries(
            &histogram,
            find_two_peaks(&histogram),
            &run.label,
            &output.join(format!("primaries_{}.svg", run.label)),
        )?;

        match analysis::calibrate(run, source) {
            Ok(calibration) => calibrations.push(calibration),
            Err(e) => log::warn!("Calibration skipped: {}", e),
        }
    }
    Ok(calibrations)
}

fn create_metadata(input: &Path, runs: &[RunFile]) -> AnalysisMetadata {
    AnalysisMetadata {
        analysis_timestamp: chrono::Utc::now().to_rfc3339(),
        input_dir: input.display().to_string(),
        files_analyzed: runs.len(),
    }
}
