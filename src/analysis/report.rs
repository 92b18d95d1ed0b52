//! Report generation for run analysis.
//!
//! Generates both JSON and human-readable text reports.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};

use super::types::*;

/// Generate JSON report
pub fn generate_json_report(report: &FullAnalysisReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

fn banner(lines: &mut Vec<String>, title: &str) {
    lines.push("=".repeat(80));
    lines.push(format!("{:^80}", title));
    lines.push("=".repeat(80));
    lines.push(String::new());
}

/// Render the text report
pub fn format_text_report(report: &FullAnalysisReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    banner(&mut lines, "GEMXRAY ANALYSIS");

    lines.push(format!("Analysis Date: {}", report.metadata.analysis_timestamp));
    lines.push(format!("Input Directory: {}", report.metadata.input_dir));
    lines.push(format!("Files Analyzed: {}", report.metadata.files_analyzed));
    lines.push(String::new());

    if let Some(ref spectra) = report.spectra {
        banner(&mut lines, "HIT ENERGY SPECTRA");
        for run in spectra {
            lines.push(format!("{} (scan parameter {}):", run.file, run.label));
            for s in &run.spectra {
                lines.push(format!(
                    "  {:<16} {:>8} entries  mean {:>7.2} keV  rms {:>6.2} keV  overflow {}",
                    s.name, s.entries, s.mean, s.rms, s.histogram.overflow
                ));
            }
            lines.push(String::new());
        }
    }

    if let Some(ref curve) = report.yield_curve {
        banner(&mut lines, "PRIMARY ELECTRON YIELD");
        lines.push(format!(
            "  {:>10} {:>10} {:>12} {:>12} {:>10} {:>11}",
            "parameter", "events", "conversions", "mean", "rms", "efficiency"
        ));
        for p in curve {
            lines.push(format!(
                "  {:>10} {:>10} {:>12} {:>12.1} {:>10.1} {:>10.4}%",
                p.label,
                p.events,
                p.primaries.entries,
                p.primaries.mean,
                p.primaries.rms,
                p.conversion_efficiency() * 100.0
            ));
        }
        lines.push(String::new());
    }

    if let Some(ref calibrations) = report.calibrations {
        banner(&mut lines, "ENERGY CALIBRATION");
        for c in calibrations {
            lines.push(format!("Run {} ({} source):", c.label, c.source));
            for (energy, primaries) in c.peak_energies.iter().zip(c.peak_primaries.iter()) {
                lines.push(format!("  {:>6.2} keV line at {:>8.1} primary electrons", energy, primaries));
            }
            lines.push(format!("  Scale:  {:.5} keV per electron", c.scale));
            lines.push(format!("  Offset: {:.3} keV", c.offset));
            if c.scale > 0.0 {
                lines.push(format!("  Effective W-value: {:.1} eV", c.scale * 1000.0));
            }
            lines.push(String::new());
        }
    }

    lines.push("=".repeat(80));
    lines.join("\n")
}

/// Generate human-readable text report
pub fn generate_text_report(report: &FullAnalysisReport, output_path: &Path) -> Result<()> {
    fs::write(output_path, format_text_report(report))
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Print a summary to stdout
pub fn print_summary(report: &FullAnalysisReport) {
    println!("\n=== GEMXRAY ANALYSIS SUMMARY ===\n");
    println!("Files: {}", report.metadata.files_analyzed);

    if let Some(ref spectra) = report.spectra {
        let entries: u64 = spectra
            .iter()
            .flat_map(|r| r.spectra.iter())
            .map(|s| s.entries)
            .sum();
        println!("\nSpectra: {} runs, {} histogram entries", spectra.len(), entries);
    }

    if let Some(ref curve) = report.yield_curve {
        println!("\nPrimary electrons:");
        for p in curve {
            println!(
                "  {:>8}: {:.1} +/- {:.1} ({} conversions)",
                p.label, p.primaries.mean, p.primaries.error, p.primaries.entries
            );
        }
    }

    if let Some(ref calibrations) = report.calibrations {
        println!("\nCalibration:");
        for c in calibrations {
            println!("  {:>8}: E = {:.5} * n + {:.3} keV", c.label, c.scale, c.offset);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::histogram::{Histogram, Moments};
    use tempfile::TempDir;

    fn report() -> FullAnalysisReport {
        FullAnalysisReport {
            metadata: AnalysisMetadata {
                analysis_timestamp: "2026-01-01T00:00:00+00:00".to_string(),
                input_dir: "runs".to_string(),
                files_analyzed: 1,
            },
            spectra: Some(vec![RunSpectra {
                file: "runs/run_35.gxr".to_string(),
                label: "35".to_string(),
                parameter: 35.0,
                spectra: vec![NamedHistogram {
                    name: "primary".to_string(),
                    entries: 0,
                    mean: 0.0,
                    rms: 0.0,
                    histogram: Histogram::spectrum(),
                }],
            }]),
            yield_curve: Some(vec![YieldPoint {
                parameter: 35.0,
                label: "35".to_string(),
                events: 100,
                primaries: Moments::of(&[800.0, 900.0]),
            }]),
            calibrations: None,
        }
    }

    #[test]
    fn test_text_report_sections() {
        let text = format_text_report(&report());
        assert!(text.contains("GEMXRAY ANALYSIS"));
        assert!(text.contains("HIT ENERGY SPECTRA"));
        assert!(text.contains("PRIMARY ELECTRON YIELD"));
        assert!(!text.contains("ENERGY CALIBRATION"));
        assert!(text.contains("2.0000%"));
    }

    #[test]
    fn test_json_report_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analysis.json");
        generate_json_report(&report(), &path).unwrap();
        let parsed: FullAnalysisReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.metadata.files_analyzed, 1);
        assert!(parsed.calibrations.is_none());
        assert_eq!(parsed.yield_curve.unwrap()[0].primaries.mean, 850.0);
    }
}
