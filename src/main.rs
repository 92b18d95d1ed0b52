use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn, LevelFilter};
use std::path::PathBuf;

use gemxray::config_loader;
use gemxray::gas::GasGap;
use gemxray::geometry::{Detector, MaterialRegistry};
use gemxray::output::EXTENSION;
use gemxray::recorder::HitRecorder;
use gemxray::run::RunManager;
use gemxray::source::PrimaryGenerator;
use gemxray::transport::SlabTransport;

/// Output name that runs the simulation without writing anything
const DRY_RUN_OUTPUT: &str = "test";

/// Monte Carlo X-ray transport through a layered GEM detector window
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the run configuration YAML file
    config: PathBuf,

    /// Output container file; "test" runs without writing
    #[arg(default_value = "gemxray.gxr")]
    output: String,

    /// Geometry preset keyword, overriding the configuration
    geometry: Option<String>,
}

impl Args {
    /// Output path, or `None` for a dry run
    fn output_path(&self) -> Option<PathBuf> {
        if self.output == DRY_RUN_OUTPUT {
            return None;
        }
        let mut path = PathBuf::from(&self.output);
        if path.extension().is_none() {
            path.set_extension(EXTENSION);
        }
        Some(path)
    }

    /// Output path for a finished run; empty runs write nothing
    fn output_target(&self, events: u64) -> Option<PathBuf> {
        self.output_path().filter(|_| events > 0)
    }
}

/// Verbosity requested by the configuration, `info` when unset
fn configured_level(level: Option<&str>) -> LevelFilter {
    level.and_then(|l| l.parse().ok()).unwrap_or(LevelFilter::Info)
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over the configured level
    let env_filter = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(Env::default().default_filter_or("trace")).init();
    if !env_filter {
        log::set_max_level(LevelFilter::Info);
    }

    let config = config_loader::load_config(&args.config)?;
    if !env_filter {
        log::set_max_level(configured_level(config.general.log_level.as_deref()));
    }

    info!("Starting GemXray v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {:?}", args.config);

    let registry = MaterialRegistry::standard();
    let layers = config
        .resolve_layers(args.geometry.as_deref())
        .wrap_err("Failed to resolve the layer stack")?;
    let detector = Detector::build(&layers, &registry).wrap_err("Failed to build the detector geometry")?;
    info!("Layer stack: [{}]", detector.branch_names().join(", "));

    let generator = PrimaryGenerator::from_file(&config.general.spectrum, &detector)
        .wrap_err_with(|| format!("Failed to load spectrum '{}'", config.general.spectrum.display()))?;
    info!(
        "Spectrum: {} entries, mean energy {:.2} keV",
        generator.spectrum().len(),
        generator.spectrum().mean_energy()
    );

    let gas = GasGap::new(*detector.gas_gap(), &registry, config.general.seed.wrapping_add(1))
        .wrap_err("Failed to set up the gas gap")?;
    let mut recorder = HitRecorder::new(&detector, gas, config.conversion_settings())
        .wrap_err("Failed to set up the hit recorder")?;
    let mut manager = RunManager::new(SlabTransport::new(detector), generator, config.general.seed);

    let summary = manager
        .run(config.general.events, &mut recorder)
        .wrap_err("Run aborted")?;

    let output = recorder.into_output();
    println!("{}", output.summary());
    info!(
        "Energy absorbed in the window: {:.1} keV over {} events",
        summary.deposited, summary.events
    );

    match args.output_target(summary.events) {
        Some(path) => {
            output
                .write(&path)
                .wrap_err_with(|| format!("Failed to write output '{}'", path.display()))?;
        }
        None if args.output_path().is_none() => info!("Test run, no output written"),
        None => warn!("No events processed, no output written"),
    }

    info!("Run completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["gemxray", "run.yaml"]);

        assert_eq!(args.config, PathBuf::from("run.yaml"));
        assert_eq!(args.output, "gemxray.gxr");
        assert_eq!(args.geometry, None);
        assert_eq!(args.output_path(), Some(PathBuf::from("gemxray.gxr")));
    }

    #[test]
    fn test_positional_overrides() {
        let args = Args::parse_from(["gemxray", "run.yaml", "copper_35", "ME0"]);

        assert_eq!(args.geometry.as_deref(), Some("ME0"));
        assert_eq!(args.output_path(), Some(PathBuf::from("copper_35.gxr")));
    }

    #[test]
    fn test_dry_run() {
        let args = Args::parse_from(["gemxray", "run.yaml", "test"]);
        assert_eq!(args.output_path(), None);
        assert_eq!(args.output_target(10), None);
    }

    #[test]
    fn test_empty_run_writes_nothing() {
        let args = Args::parse_from(["gemxray", "run.yaml", "copper_35"]);
        assert_eq!(args.output_target(0), None);
        assert_eq!(args.output_target(1), Some(PathBuf::from("copper_35.gxr")));
    }

    #[test]
    fn test_configured_level() {
        assert_eq!(configured_level(None), LevelFilter::Info);
        assert_eq!(configured_level(Some("debug")), LevelFilter::Debug);
        assert_eq!(configured_level(Some("OFF")), LevelFilter::Off);
    }
}
