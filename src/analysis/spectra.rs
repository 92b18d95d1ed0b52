//! Per-run hit-energy spectra and the primary-electron yield curve.

use super::histogram::{Histogram, Moments};
use super::types::{NamedHistogram, RunFile, RunSpectra, YieldPoint};
use crate::recorder::{CONVERSION_TREE, PRIMARY_TREE};

/// Histogram the `energy` column of every tree in the run, in file order
pub fn analyze_spectra(run: &RunFile) -> RunSpectra {
    let spectra = run
        .trees
        .trees()
        .iter()
        .filter_map(|tree| {
            let energies = tree.column("energy")?;
            let mut histogram = Histogram::spectrum();
            histogram.fill_all(energies);
            Some(NamedHistogram {
                name: tree.name().to_string(),
                entries: histogram.entries(),
                mean: histogram.mean(),
                rms: histogram.rms(),
                histogram,
            })
        })
        .collect();

    RunSpectra {
        file: run.path.display().to_string(),
        label: run.label.clone(),
        parameter: run.parameter,
        spectra,
    }
}

/// Mean ionization count of the converted events of one run
pub fn yield_point(run: &RunFile) -> YieldPoint {
    let primaries = run
        .trees
        .tree(CONVERSION_TREE)
        .and_then(|t| t.column("primaries"))
        .map(Moments::of)
        .unwrap_or_default();
    let events = run.trees.tree(PRIMARY_TREE).map_or(0, |t| t.entries());

    YieldPoint {
        parameter: run.parameter,
        label: run.label.clone(),
        events,
        primaries,
    }
}

/// Yield points for all runs, ordered by scan parameter
pub fn analyze_yield(runs: &[RunFile]) -> Vec<YieldPoint> {
    let mut points: Vec<YieldPoint> = runs.iter().map(yield_point).collect();
    points.sort_by(|a, b| a.parameter.total_cmp(&b.parameter));
    for p in &points {
        log::debug!(
            "{} = {}: {:.1} +/- {:.1} primaries over {} conversions",
            p.label,
            p.parameter,
            p.primaries.mean,
            p.primaries.error,
            p.primaries.entries
        );
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Tree, TreeFile};
    use std::path::PathBuf;

    fn run(parameter: f64, primaries: &[f64]) -> RunFile {
        let mut trees = TreeFile::new();
        let mut primary = Tree::new(PRIMARY_TREE, &["energy"]);
        for e in [22.16, 24.9, 22.16, 60.0] {
            primary.fill(&[e]).unwrap();
        }
        trees.add_tree(primary).unwrap();
        let mut conversion = Tree::new(CONVERSION_TREE, &["energy", "primaries"]);
        for n in primaries {
            conversion.fill(&[n * 0.0312, *n]).unwrap();
        }
        trees.add_tree(conversion).unwrap();
        RunFile {
            path: PathBuf::from(format!("run_{}.gxr", parameter)),
            label: format!("{}", parameter),
            parameter,
            trees,
        }
    }

    #[test]
    fn test_spectra_cover_every_tree() {
        let spectra = analyze_spectra(&run(35.0, &[100.0, 200.0]));
        let names: Vec<&str> = spectra.spectra.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["primary", "conversion"]);
        let primary = &spectra.spectra[0];
        // 60 keV lies above the spectrum range
        assert_eq!(primary.entries, 3);
        assert_eq!(primary.histogram.overflow, 1);
    }

    #[test]
    fn test_yield_point() {
        let point = yield_point(&run(35.0, &[100.0, 200.0]));
        assert_eq!(point.events, 4);
        assert_eq!(point.primaries.entries, 2);
        assert_eq!(point.primaries.mean, 150.0);
        assert_eq!(point.primaries.rms, 50.0);
        assert_eq!(point.conversion_efficiency(), 0.5);
    }

    #[test]
    fn test_yield_curve_sorted() {
        let runs = vec![run(60.0, &[10.0]), run(5.0, &[]), run(35.0, &[30.0])];
        let curve = analyze_yield(&runs);
        let params: Vec<f64> = curve.iter().map(|p| p.parameter).collect();
        assert_eq!(params, vec![5.0, 35.0, 60.0]);
        assert_eq!(curve[0].primaries.entries, 0);
    }
}
