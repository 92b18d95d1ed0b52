//! Fixed-width 1D histogram with running moments.

use serde::{Deserialize, Serialize};

/// Bins used for hit-energy spectra
pub const SPECTRUM_BINS: usize = 120;

/// Upper edge of hit-energy spectra (keV)
pub const SPECTRUM_MAX_KEV: f64 = 53.0;

/// Equal-width bins over `[low, high)`.
///
/// Mean and RMS are computed from the filled values that landed inside the
/// range, not from bin centres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub low: f64,
    pub high: f64,
    pub counts: Vec<u64>,
    pub underflow: u64,
    pub overflow: u64,
    sum: f64,
    sum_sq: f64,
    in_range: u64,
}

impl Histogram {
    pub fn new(bins: usize, low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            counts: vec![0; bins.max(1)],
            underflow: 0,
            overflow: 0,
            sum: 0.0,
            sum_sq: 0.0,
            in_range: 0,
        }
    }

    /// Hit-energy spectrum binning
    pub fn spectrum() -> Self {
        Self::new(SPECTRUM_BINS, 0.0, SPECTRUM_MAX_KEV)
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn bin_width(&self) -> f64 {
        (self.high - self.low) / self.bins() as f64
    }

    pub fn bin_center(&self, i: usize) -> f64 {
        self.low + (i as f64 + 0.5) * self.bin_width()
    }

    pub fn fill(&mut self, value: f64) {
        if value.is_nan() || value < self.low {
            self.underflow += 1;
            return;
        }
        if value >= self.high {
            self.overflow += 1;
            return;
        }
        let i = ((value - self.low) / self.bin_width()) as usize;
        let i = i.min(self.bins() - 1);
        self.counts[i] += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.in_range += 1;
    }

    pub fn fill_all(&mut self, values: &[f64]) {
        for v in values {
            self.fill(*v);
        }
    }

    /// Entries inside the range
    pub fn entries(&self) -> u64 {
        self.in_range
    }

    pub fn mean(&self) -> f64 {
        if self.in_range == 0 {
            return 0.0;
        }
        self.sum / self.in_range as f64
    }

    pub fn rms(&self) -> f64 {
        if self.in_range == 0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.sum_sq / self.in_range as f64 - mean * mean).max(0.0).sqrt()
    }

    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Mean, RMS spread and standard error of a sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub entries: usize,
    pub mean: f64,
    pub rms: f64,
    /// rms / sqrt(entries)
    pub error: f64,
}

impl Moments {
    pub fn of(values: &[f64]) -> Self {
        let n = values.len();
        if n == 0 {
            return Self::default();
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let rms = var.sqrt();
        Self {
            entries: n,
            mean,
            rms,
            error: rms / (n as f64).sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_and_moments() {
        let mut h = Histogram::new(10, 0.0, 10.0);
        h.fill_all(&[1.0, 3.0, 5.0, -1.0, 10.0, 12.0]);
        assert_eq!(h.entries(), 3);
        assert_eq!(h.underflow, 1);
        assert_eq!(h.overflow, 2);
        assert_eq!(h.counts[1], 1);
        assert_eq!(h.counts[3], 1);
        assert_eq!(h.mean(), 3.0);
        assert!((h.rms() - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_spectrum_binning() {
        let h = Histogram::spectrum();
        assert_eq!(h.bins(), 120);
        assert!((h.bin_width() - 53.0 / 120.0).abs() < 1e-12);
        assert!((h.bin_center(0) - 53.0 / 240.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_histogram() {
        let h = Histogram::new(5, 0.0, 1.0);
        assert_eq!(h.mean(), 0.0);
        assert_eq!(h.rms(), 0.0);
        assert_eq!(h.max_count(), 0);
    }

    #[test]
    fn test_moments() {
        let m = Moments::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(m.entries, 8);
        assert_eq!(m.mean, 5.0);
        assert_eq!(m.rms, 2.0);
        assert!((m.error - 2.0 / 8f64.sqrt()).abs() < 1e-12);
        assert_eq!(Moments::of(&[]), Moments::default());
    }
}
