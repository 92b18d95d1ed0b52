//! Two-line energy calibration of the ionization-count spectrum.
//!
//! The converted-event counts are histogrammed, the two most prominent
//! peaks are located, and a straight line is drawn through
//! (peak count, reference energy) for the lower and upper line.

use super::histogram::{Histogram, Moments};
use super::types::{Calibration, CalibrationSource, RunFile};
use crate::recorder::CONVERSION_TREE;

/// Bins of the ionization-count histogram
pub const PRIMARIES_BINS: usize = 100;

/// Minimum separation between the two peaks, in bins
const MIN_PEAK_SEPARATION: usize = 3;

/// Half-width of the centroid window around a peak bin
const CENTROID_HALF_WIDTH: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("Run {0} has no conversion entries")]
    NoConversions(String),

    #[error("Run {label}: found {found} separated peak(s), need two")]
    PeaksNotFound { label: String, found: usize },
}

/// Histogram of ionization counts spanning the observed range
pub fn primaries_histogram(primaries: &[f64]) -> Histogram {
    let max = primaries.iter().copied().fold(0.0, f64::max);
    let high = if max > 0.0 { (max * 1.1).ceil() } else { 1.0 };
    let mut histogram = Histogram::new(PRIMARIES_BINS, 0.0, high);
    histogram.fill_all(primaries);
    histogram
}

/// Bin indices of local maxima, highest first
fn local_maxima(histogram: &Histogram) -> Vec<usize> {
    let c = &histogram.counts;
    let mut peaks: Vec<usize> = (0..c.len())
        .filter(|&i| {
            let left = if i == 0 { 0 } else { c[i - 1] };
            let right = c.get(i + 1).copied().unwrap_or(0);
            c[i] > 0 && c[i] >= left && c[i] > right
        })
        .collect();
    peaks.sort_by(|a, b| c[*b].cmp(&c[*a]).then(a.cmp(b)));
    peaks
}

/// Count-weighted mean position around bin `i`
fn centroid(histogram: &Histogram, i: usize) -> f64 {
    let lo = i.saturating_sub(CENTROID_HALF_WIDTH);
    let hi = (i + CENTROID_HALF_WIDTH).min(histogram.bins() - 1);
    let (mut weight, mut sum) = (0.0, 0.0);
    for j in lo..=hi {
        let w = histogram.counts[j] as f64;
        weight += w;
        sum += w * histogram.bin_center(j);
    }
    if weight > 0.0 {
        sum / weight
    } else {
        histogram.bin_center(i)
    }
}

/// Positions of the two dominant, well separated peaks, lower first
pub fn find_two_peaks(histogram: &Histogram) -> Option<[f64; 2]> {
    let maxima = local_maxima(histogram);
    let first = *maxima.first()?;
    let second = maxima
        .iter()
        .copied()
        .find(|&j| j.abs_diff(first) >= MIN_PEAK_SEPARATION)?;
    let (lo, hi) = if first < second { (first, second) } else { (second, first) };
    Some([centroid(histogram, lo), centroid(histogram, hi)])
}

/// Calibrate one run against the lines of `source`
pub fn calibrate(run: &RunFile, source: CalibrationSource) -> Result<Calibration, CalibrationError> {
    let primaries = run
        .trees
        .tree(CONVERSION_TREE)
        .and_then(|t| t.column("primaries"))
        .unwrap_or(&[]);
    if primaries.is_empty() {
        return Err(CalibrationError::NoConversions(run.label.clone()));
    }

    let histogram = primaries_histogram(primaries);
    let peaks = find_two_peaks(&histogram).ok_or_else(|| CalibrationError::PeaksNotFound {
        label: run.label.clone(),
        found: local_maxima(&histogram).len().min(1),
    })?;

    let energies = source.peak_energies();
    let scale = (energies[1] - energies[0]) / (peaks[1] - peaks[0]);
    let offset = energies[1] - scale * peaks[1];
    log::info!(
        "{}: {:.2} keV at {:.1} primaries, {:.2} keV at {:.1} primaries; {:.4} keV/primary, offset {:.2} keV",
        run.label,
        energies[0],
        peaks[0],
        energies[1],
        peaks[1],
        scale,
        offset
    );

    Ok(Calibration {
        label: run.label.clone(),
        source,
        peak_energies: energies,
        peak_primaries: peaks,
        scale,
        offset,
        primaries: Moments::of(primaries),
    })
}
