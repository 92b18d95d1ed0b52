//! SVG rendering of spectra and yield curves.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};

use super::histogram::Histogram;
use super::types::{RunSpectra, YieldPoint};

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 600.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;

/// Line colours cycled over series
const PALETTE: [&str; 8] = [
    "#000000", "#1f77b4", "#17becf", "#d62728", "#9467bd", "#2ca02c", "#ff7f0e", "#8c564b",
];

/// Axis-framed SVG document
pub struct SvgPlot {
    content: String,
    x_range: (f64, f64),
    y_range: (f64, f64),
    log_y: bool,
}

impl SvgPlot {
    pub fn new(x_range: (f64, f64), y_range: (f64, f64), log_y: bool) -> Self {
        let y_range = if log_y {
            (y_range.0.max(0.5), y_range.1.max(1.0))
        } else {
            y_range
        };
        Self {
            content: String::with_capacity(16_384),
            x_range,
            y_range,
            log_y,
        }
    }

    fn plot_width() -> f64 {
        WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height() -> f64 {
        HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
    }

    /// Data coordinates to screen coordinates
    fn to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        let (x0, x1) = self.x_range;
        let fx = if x1 > x0 { (x - x0) / (x1 - x0) } else { 0.5 };
        let fy = if self.log_y {
            let (y0, y1) = (self.y_range.0.log10(), self.y_range.1.log10());
            let y = y.max(self.y_range.0).log10();
            if y1 > y0 { (y - y0) / (y1 - y0) } else { 0.5 }
        } else {
            let (y0, y1) = self.y_range;
            if y1 > y0 { (y - y0) / (y1 - y0) } else { 0.5 }
        };
        (
            MARGIN_LEFT + fx * Self::plot_width(),
            MARGIN_TOP + (1.0 - fy.clamp(0.0, 1.0)) * Self::plot_height(),
        )
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, stroke: &str, stroke_width: f64) {
        self.content.push_str(&format!(
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="{:.1}"/>"#,
            x1, y1, x2, y2, stroke, stroke_width
        ));
        self.content.push('\n');
    }

    pub fn text(&mut self, x: f64, y: f64, content: &str, font_size: f64, anchor: &str) {
        self.content.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" font-family="sans-serif" font-size="{:.1}" text-anchor="{}">{}</text>"#,
            x,
            y,
            font_size,
            anchor,
            escape(content)
        ));
        self.content.push('\n');
    }

    /// Frame, ticks and axis titles
    pub fn axes(&mut self, title: &str, x_label: &str, y_label: &str) {
        let (left, top) = (MARGIN_LEFT, MARGIN_TOP);
        let (right, bottom) = (WIDTH - MARGIN_RIGHT, HEIGHT - MARGIN_BOTTOM);
        self.content.push_str(&format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="black" stroke-width="1.0"/>"#,
            left,
            top,
            right - left,
            bottom - top
        ));
        self.content.push('\n');

        let (x0, x1) = self.x_range;
        for i in 0..=5 {
            let x = x0 + (x1 - x0) * i as f64 / 5.0;
            let (sx, _) = self.to_screen(x, self.y_range.0);
            self.line(sx, bottom, sx, bottom - 6.0, "black", 1.0);
            self.text(sx, bottom + 18.0, &format_tick(x), 12.0, "middle");
        }

        if self.log_y {
            let lo = self.y_range.0.log10().floor() as i32;
            let hi = self.y_range.1.log10().ceil() as i32;
            for e in lo.max(0)..=hi {
                let y = 10f64.powi(e);
                if y < self.y_range.0 || y > self.y_range.1 {
                    continue;
                }
                let (_, sy) = self.to_screen(x0, y);
                self.line(left, sy, left + 6.0, sy, "black", 1.0);
                self.text(left - 8.0, sy + 4.0, &format!("1e{}", e), 12.0, "end");
            }
        } else {
            let (y0, y1) = self.y_range;
            for i in 0..=5 {
                let y = y0 + (y1 - y0) * i as f64 / 5.0;
                let (_, sy) = self.to_screen(x0, y);
                self.line(left, sy, left + 6.0, sy, "black", 1.0);
                self.text(left - 8.0, sy + 4.0, &format_tick(y), 12.0, "end");
            }
        }

        self.text(WIDTH / 2.0, top - 18.0, title, 16.0, "middle");
        self.text((left + right) / 2.0, HEIGHT - 15.0, x_label, 14.0, "middle");
        self.content.push_str(&format!(
            r#"<text x="20" y="{:.2}" font-family="sans-serif" font-size="14.0" text-anchor="middle" transform="rotate(-90 20 {:.2})">{}</text>"#,
            (top + bottom) / 2.0,
            (top + bottom) / 2.0,
            escape(y_label)
        ));
        self.content.push('\n');
    }

    /// Histogram outline as a step path
    pub fn histogram(&mut self, histogram: &Histogram, stroke: &str) {
        let mut d = String::new();
        for (i, count) in histogram.counts.iter().enumerate() {
            let lo = histogram.low + i as f64 * histogram.bin_width();
            let hi = lo + histogram.bin_width();
            let (sx0, sy) = self.to_screen(lo, *count as f64);
            let (sx1, _) = self.to_screen(hi, *count as f64);
            if i == 0 {
                d.push_str(&format!("M {:.2} {:.2}", sx0, sy));
            } else {
                d.push_str(&format!(" L {:.2} {:.2}", sx0, sy));
            }
            d.push_str(&format!(" L {:.2} {:.2}", sx1, sy));
        }
        self.content.push_str(&format!(
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="1.5"/>"#,
            d, stroke
        ));
        self.content.push('\n');
    }

    /// Marker with a vertical error bar
    pub fn point(&mut self, x: f64, y: f64, error: f64, stroke: &str) {
        let (sx, sy) = self.to_screen(x, y);
        let (_, sy_lo) = self.to_screen(x, y - error);
        let (_, sy_hi) = self.to_screen(x, y + error);
        self.line(sx, sy_lo, sx, sy_hi, stroke, 1.0);
        self.content.push_str(&format!(
            r#"<circle cx="{:.2}" cy="{:.2}" r="4" fill="{}" stroke="{}"/>"#,
            sx, sy, stroke, stroke
        ));
        self.content.push('\n');
    }

    /// Vertical marker across the whole frame
    pub fn marker(&mut self, x: f64, stroke: &str) {
        let (sx, _) = self.to_screen(x, self.y_range.0);
        self.content.push_str(&format!(
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="1.0" stroke-dasharray="6,4"/>"#,
            sx,
            MARGIN_TOP,
            sx,
            HEIGHT - MARGIN_BOTTOM,
            stroke
        ));
        self.content.push('\n');
    }

    /// Legend box in the upper right corner
    pub fn legend(&mut self, entries: &[(String, &str)]) {
        let x = WIDTH - MARGIN_RIGHT - 170.0;
        let mut y = MARGIN_TOP + 20.0;
        for (label, color) in entries {
            self.line(x, y - 4.0, x + 25.0, y - 4.0, color, 2.0);
            self.text(x + 32.0, y, label, 12.0, "start");
            y += 18.0;
        }
    }

    pub fn to_svg(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">
<rect width="100%" height="100%" fill="white"/>
{}</svg>
"#,
            self.content,
            w = WIDTH,
            h = HEIGHT
        )
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_svg()).with_context(|| format!("Failed to write plot {}", path.display()))?;
        log::info!("Plot written to {}", path.display());
        Ok(())
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn format_tick(v: f64) -> String {
    if v.abs() >= 1000.0 || v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.1}", v)
    }
}

/// Overlay of all energy spectra of one run on a log scale
pub fn plot_spectra(spectra: &RunSpectra, path: &Path) -> Result<()> {
    let (low, high) = spectra
        .spectra
        .first()
        .map_or((0.0, 1.0), |s| (s.histogram.low, s.histogram.high));
    let max = spectra
        .spectra
        .iter()
        .map(|s| s.histogram.max_count())
        .max()
        .unwrap_or(1);

    let mut plot = SvgPlot::new((low, high), (0.5, (max as f64 * 2.0).max(10.0)), true);
    plot.axes(
        &format!("Hit energy spectra, scan parameter {}", spectra.label),
        "hit energy [keV]",
        "counts",
    );
    let mut legend = Vec::new();
    for (i, s) in spectra.spectra.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        plot.histogram(&s.histogram, color);
        legend.push((s.name.clone(), color));
    }
    plot.legend(&legend);
    plot.save(path)
}

/// Mean ionization electrons per conversion against the scan parameter
pub fn plot_yield(points: &[YieldPoint], x_label: &str, path: &Path) -> Result<()> {
    let x_min = points.iter().map(|p| p.parameter).fold(f64::INFINITY, f64::min);
    let x_max = points.iter().map(|p| p.parameter).fold(f64::NEG_INFINITY, f64::max);
    let (x_min, x_max) = if x_min.is_finite() && x_max > x_min {
        let pad = 0.05 * (x_max - x_min);
        (x_min - pad, x_max + pad)
    } else if x_min.is_finite() {
        (x_min - 1.0, x_min + 1.0)
    } else {
        (0.0, 1.0)
    };
    let y_max = points
        .iter()
        .map(|p| p.primaries.mean + p.primaries.rms)
        .fold(0.0, f64::max);

    let mut plot = SvgPlot::new((x_min, x_max), (0.0, (y_max * 1.1).max(1.0)), false);
    plot.axes("Primary electrons", x_label, "primary electrons");
    for p in points.iter().filter(|p| p.primaries.entries > 0) {
        plot.point(p.parameter, p.primaries.mean, p.primaries.rms, PALETTE[1]);
    }
    plot.save(path)
}

/// Ionization-count spectrum with the calibration peaks marked
pub fn plot_primaries(histogram: &Histogram, peaks: Option<[f64; 2]>, label: &str, path: &Path) -> Result<()> {
    let max = histogram.max_count().max(1) as f64;
    let mut plot = SvgPlot::new((histogram.low, histogram.high), (0.0, max * 1.1), false);
    plot.axes(&format!("Primary electrons, run {}", label), "primary electrons", "counts");
    plot.histogram(histogram, PALETTE[4]);
    if let Some(peaks) = peaks {
        for p in peaks {
            plot.marker(p, PALETTE[3]);
        }
    }
    plot.save(path)
}
