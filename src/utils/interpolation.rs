//! Table interpolation helpers.
//!
//! Attenuation tables keep absorption edges as two consecutive rows with the
//! same energy (below-edge value first), so the search below always picks the
//! segment on the correct side of an edge.

/// Log-log interpolation of `y(x)` at `x_new`.
///
/// Values outside the table are clamped to the first or last entry. All `x`
/// and `y` values must be positive.
pub fn interpolate_log_log(x: &[f64], y: &[f64], x_new: f64) -> f64 {
    if x.is_empty() || x.len() != y.len() {
        return f64::NAN;
    }
    if x.len() == 1 || x_new <= x[0] {
        return y[0];
    }
    if x_new >= x[x.len() - 1] {
        return y[y.len() - 1];
    }

    // First index with x[i] > x_new; x[hi - 1] <= x_new < x[hi]
    let hi = x.partition_point(|&xi| xi <= x_new);
    let lo = hi - 1;
    let (x1, x2, y1, y2) = (x[lo], x[hi], y[lo], y[hi]);
    if x1 == x2 {
        return y2;
    }
    let slope = (y2.ln() - y1.ln()) / (x2.ln() - x1.ln());
    (y1.ln() + slope * (x_new.ln() - x1.ln())).exp()
}
