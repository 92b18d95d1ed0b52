//! Empirical primary energy spectrum.
//!
//! The input is a two-column text table of (energy in keV, weight), separated
//! by commas and/or whitespace. Sampling is discrete inverse-CDF: energies are
//! returned exactly as tabulated, never interpolated.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rand::Rng;

/// Errors that can occur while loading a spectrum table
#[derive(Debug, thiserror::Error)]
pub enum SpectrumError {
    #[error("Cannot read spectrum file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Spectrum file {path} contains no usable (energy, weight) rows")]
    Empty { path: PathBuf },

    #[error("Spectrum entry at {energy} keV has negative weight {weight}")]
    NegativeWeight { energy: f64, weight: f64 },

    #[error("Spectrum has {energies} energies but {weights} weights")]
    LengthMismatch { energies: usize, weights: usize },

    #[error("Spectrum weights sum to {total}, expected a finite positive total")]
    InvalidTotal { total: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumTable {
    energies: Vec<f64>,
    weights: Vec<f64>,
    total: f64,
}

impl SpectrumTable {
    /// Build a table from parallel energy/weight sequences
    pub fn new(energies: Vec<f64>, weights: Vec<f64>) -> Result<Self, SpectrumError> {
        if energies.len() != weights.len() {
            return Err(SpectrumError::LengthMismatch {
                energies: energies.len(),
                weights: weights.len(),
            });
        }
        if let Some((e, w)) = energies.iter().zip(weights.iter()).find(|(_, w)| **w < 0.0) {
            return Err(SpectrumError::NegativeWeight {
                energy: *e,
                weight: *w,
            });
        }
        let total: f64 = weights.iter().sum();
        if !(total > 0.0 && total.is_finite()) {
            return Err(SpectrumError::InvalidTotal { total });
        }
        Ok(Self {
            energies,
            weights,
            total,
        })
    }

    /// Read a two-column spectrum file; lines that do not parse are skipped
    pub fn load(path: &Path) -> Result<Self, SpectrumError> {
        let file = File::open(path).map_err(|source| SpectrumError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);

        let mut energies = Vec::new();
        let mut weights = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| SpectrumError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            match parse_line(&line) {
                Some((energy, weight)) => {
                    energies.push(energy);
                    weights.push(weight);
                }
                None => log::debug!("Skipping spectrum line {}: {:?}", line_no + 1, line),
            }
        }

        if energies.is_empty() {
            return Err(SpectrumError::Empty {
                path: path.to_path_buf(),
            });
        }
        let table = Self::new(energies, weights)?;
        log::info!(
            "Loaded spectrum {} with {} entries ({:.1}-{:.1} keV)",
            path.display(),
            table.len(),
            table.energies.iter().copied().fold(f64::INFINITY, f64::min),
            table.energies.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn total_weight(&self) -> f64 {
        self.total
    }

    /// Weighted mean energy of the table
    pub fn mean_energy(&self) -> f64 {
        self.energies
            .iter()
            .zip(self.weights.iter())
            .map(|(e, w)| e * w)
            .sum::<f64>()
            / self.total
    }

    /// Index of the entry selected by a draw `r` in `[0, total)`.
    ///
    /// Weights are accumulated in order until the running sum exceeds `r`.
    pub fn select(&self, r: f64) -> usize {
        let mut cumulative = 0.0;
        for (i, w) in self.weights.iter().enumerate() {
            cumulative += w;
            if cumulative > r {
                return i;
            }
        }
        // Rounding left r at the very top: take the last entry that can be drawn
        self.weights.iter().rposition(|w| *w > 0.0).unwrap_or(0)
    }

    /// Draw one energy (keV)
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let r = rng.gen_range(0.0..self.total);
        self.energies[self.select(r)]
    }
}

/// Parse "energy, weight" or "energy weight"; both values must be finite
fn parse_line(line: &str) -> Option<(f64, f64)> {
    let mut fields = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty());
    let energy: f64 = fields.next()?.parse().ok()?;
    let weight: f64 = fields.next()?.parse().ok()?;
    if energy.is_finite() && weight.is_finite() {
        Some((energy, weight))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_line_separators() {
        assert_eq!(parse_line("22.16, 0.5"), Some((22.16, 0.5)));
        assert_eq!(parse_line("22.16 0.5"), Some((22.16, 0.5)));
        assert_eq!(parse_line("  22.16,\t0.5  "), Some((22.16, 0.5)));
        assert_eq!(parse_line("energy, weight"), None);
        assert_eq!(parse_line("22.16"), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("nan, 1"), None);
    }

    #[test]
    fn test_load_skips_unparsed_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# energy, weight").unwrap();
        writeln!(file, "8.0, 1.0").unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, "22.16 3.0").unwrap();
        let table = SpectrumTable::load(file.path()).unwrap();
        assert_eq!(table.energies(), &[8.0, 22.16]);
        assert_eq!(table.total_weight(), 4.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SpectrumTable::load(Path::new("/nonexistent/xray-spectrum.csv")).unwrap_err();
        assert!(matches!(err, SpectrumError::Io { .. }));
    }

    #[test]
    fn test_load_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let err = SpectrumTable::load(file.path()).unwrap_err();
        assert!(matches!(err, SpectrumError::Empty { .. }));
    }

    #[test]
    fn test_rejects_bad_weights() {
        assert!(matches!(
            SpectrumTable::new(vec![1.0, 2.0], vec![1.0, -1.0]),
            Err(SpectrumError::NegativeWeight { .. })
        ));
        assert!(matches!(
            SpectrumTable::new(vec![1.0], vec![0.0]),
            Err(SpectrumError::InvalidTotal { .. })
        ));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = SpectrumTable::new(vec![1.0], vec![1.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            SpectrumError::LengthMismatch {
                energies: 1,
                weights: 2
            }
        ));
    }

    #[test]
    fn test_load_rejects_overflowing_weights() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "10, 1e308").unwrap();
        writeln!(file, "20, 1e308").unwrap();
        let err = SpectrumTable::load(file.path()).unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidTotal { total } if total.is_infinite()));
    }

    #[test]
    fn test_samples_are_table_energies() {
        let table = SpectrumTable::new(vec![5.9, 6.49, 22.16, 24.9], vec![1.0, 0.2, 3.0, 0.7]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..5000 {
            let e = table.sample(&mut rng);
            assert!(table.energies().contains(&e), "{} not tabulated", e);
        }
    }

    #[test]
    fn test_single_entry_always_returned() {
        let table = SpectrumTable::new(vec![17.4], vec![0.3]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            assert_eq!(table.sample(&mut rng), 17.4);
        }
    }

    #[test]
    fn test_select_boundaries() {
        let table = SpectrumTable::new(vec![1.0, 2.0, 3.0], vec![1.0, 0.0, 1.0]).unwrap();
        assert_eq!(table.select(0.0), 0);
        assert_eq!(table.select(0.999), 0);
        // The zero-weight entry is never selected
        assert_eq!(table.select(1.0), 2);
        assert_eq!(table.select(1.999), 2);
        // Draws at or above the total fall back to the last drawable entry
        assert_eq!(table.select(2.0), 2);
    }

    #[test]
    fn test_cumulative_never_exceeds_total() {
        let weights = vec![0.1, 0.7, 0.05, 0.15];
        let table = SpectrumTable::new(vec![1.0, 2.0, 3.0, 4.0], weights.clone()).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..1000 {
            let r = rng.gen_range(0.0..table.total_weight());
            let i = table.select(r);
            let consumed: f64 = weights[..i].iter().sum();
            assert!(consumed <= table.total_weight());
            assert!(consumed <= r);
        }
    }

    #[test]
    fn test_sampling_frequencies_follow_weights() {
        let table = SpectrumTable::new(vec![1.0, 2.0], vec![1.0, 3.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let n = 20000;
        let high = (0..n).filter(|_| table.sample(&mut rng) == 2.0).count();
        let fraction = high as f64 / n as f64;
        assert!((fraction - 0.75).abs() < 0.02, "fraction {}", fraction);
    }

    #[test]
    fn test_mean_energy() {
        let table = SpectrumTable::new(vec![10.0, 20.0], vec![1.0, 1.0]).unwrap();
        assert_eq!(table.mean_energy(), 15.0);
    }
}
