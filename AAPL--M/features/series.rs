//! Elementwise and windowed transforms over a single column.
//!
//! Missing values are `NaN` and propagate the way a dataframe library would:
//! windows count only present values, and a window with fewer than
//! `min_periods` of them yields `NaN`.

use aapl_evaluation::stats;

/// Moves values `periods` rows later (negative: earlier), padding with `NaN`.
#[must_use]
pub fn shift(values: &[f64], periods: isize) -> Vec<f64> {
    let n = values.len();
    let offset = periods.unsigned_abs();
    if offset >= n {
        return vec![f64::NAN; n];
    }
    let mut out = vec![f64::NAN; n];
    if periods >= 0 {
        out[offset..].copy_from_slice(&values[..n - offset]);
    } else {
        out[..n - offset].copy_from_slice(&values[offset..]);
    }
    out
}

/// Relative change from the previous row; the first row is `NaN`.
#[must_use]
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if !values.is_empty() {
        out.push(f64::NAN);
    }
    out.extend(values.windows(2).map(|pair| pair[1] / pair[0] - 1.0));
    out
}

fn rolling<F>(values: &[f64], window: usize, min_periods: usize, reduce: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    if window == 0 {
        return vec![f64::NAN; values.len()];
    }
    let mut present = Vec::with_capacity(window);
    (0..values.len())
        .map(|end| {
            let start = (end + 1).saturating_sub(window);
            present.clear();
            present.extend(values[start..=end].iter().copied().filter(|v| !v.is_nan()));
            if present.len() < min_periods.max(1) {
                f64::NAN
            } else {
                reduce(&present).unwrap_or(f64::NAN)
            }
        })
        .collect()
}

/// Trailing mean over `window` rows.
#[must_use]
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling(values, window, min_periods, |w| Some(stats::mean(w)))
}

/// Trailing sample standard deviation (`ddof = 1`) over `window` rows.
#[must_use]
pub fn rolling_std(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling(values, window, min_periods, stats::sample_std)
}

/// Pearson correlation over rows where both values are present.
///
/// `None` below two such rows or when either side is constant.
#[must_use]
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(x, y)| (*x, *y))
        .unzip();
    if xs.len() < 2 {
        return None;
    }
    let (mx, my) = (stats::mean(&xs), stats::mean(&ys));
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(&ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}
