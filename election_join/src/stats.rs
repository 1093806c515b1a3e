//! Column statistics: least squares fit, studentized residuals, correlation
//! and descriptive summaries.

use log::debug;

use crate::config::{DataErrors, LinearFit, Summary};

fn degenerate(statistic: &'static str, reason: String) -> DataErrors {
    DataErrors::Degenerate { statistic, reason }
}

fn check_pairs(statistic: &'static str, xs: &[f64], ys: &[f64], min: usize) -> Result<(), DataErrors> {
    if xs.len() != ys.len() {
        return Err(DataErrors::LengthMismatch {
            expected: xs.len(),
            found: ys.len(),
        });
    }
    if xs.len() < min {
        return Err(degenerate(
            statistic,
            format!("needs at least {} points, got {}", min, xs.len()),
        ));
    }
    if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
        return Err(degenerate(statistic, "non-finite value".to_string()));
    }
    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

// Sum of (x - mean(x)) * (y - mean(y))
fn co_deviation(xs: &[f64], mean_x: f64, ys: &[f64], mean_y: f64) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum()
}

/// Fits `y = intercept + slope * x` by ordinary least squares.
///
/// The fit is attempted once. It fails when all the x values are equal, in
/// which case the slope is not defined.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Result<LinearFit, DataErrors> {
    check_pairs("linear fit", xs, ys, 2)?;
    let mean_x = mean(xs);
    let mean_y = mean(ys);
    let sxx = co_deviation(xs, mean_x, xs, mean_x);
    if sxx == 0.0 {
        return Err(degenerate(
            "linear fit",
            "fewer than two distinct x values".to_string(),
        ));
    }
    let slope = co_deviation(xs, mean_x, ys, mean_y) / sxx;
    let intercept = mean_y - slope * mean_x;
    debug!("fit_line: n={} slope={} intercept={}", xs.len(), slope, intercept);
    Ok(LinearFit { intercept, slope })
}

/// Internally studentized residuals of the least squares fit of `ys` on `xs`.
///
/// With leverage `h_i = (x_i - mean(x))^2 / Sxx + 1/n` and residual standard
/// error `s = sqrt(SSR / (n - 2))`, the residual of point `i` is
/// `e_i / (s * sqrt(1 - h_i))`.
///
/// An exact fit has no residual spread: all the residuals are reported as 0.
pub fn studentized_residuals(xs: &[f64], ys: &[f64]) -> Result<Vec<f64>, DataErrors> {
    check_pairs("studentized residuals", xs, ys, 3)?;
    let fit = fit_line(xs, ys)?;
    let n = xs.len() as f64;
    let mean_x = mean(xs);
    let sxx = co_deviation(xs, mean_x, xs, mean_x);

    let residuals: Vec<f64> = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| y - fit.predict(*x))
        .collect();
    let ssr: f64 = residuals.iter().map(|e| e * e).sum();
    let s = (ssr / (n - 2.0)).sqrt();
    debug!("studentized_residuals: n={} ssr={} s={}", n, ssr, s);

    // Rounding leaves a tiny spread on exact fits.
    let scale = ys.iter().map(|y| y.abs()).fold(1.0, f64::max);
    if s <= 1e-12 * scale {
        return Ok(vec![0.0; xs.len()]);
    }

    let res = xs
        .iter()
        .zip(residuals)
        .map(|(x, e)| {
            let h = (x - mean_x) * (x - mean_x) / sxx + 1.0 / n;
            let denom = s * (1.0 - h).sqrt();
            // Full leverage forces the residual to zero.
            if denom > 0.0 {
                e / denom
            } else {
                0.0
            }
        })
        .collect();
    Ok(res)
}

/// Pearson correlation coefficient.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Result<f64, DataErrors> {
    check_pairs("correlation", xs, ys, 2)?;
    let mean_x = mean(xs);
    let mean_y = mean(ys);
    let sxx = co_deviation(xs, mean_x, xs, mean_x);
    let syy = co_deviation(ys, mean_y, ys, mean_y);
    if sxx == 0.0 || syy == 0.0 {
        return Err(degenerate("correlation", "constant column".to_string()));
    }
    Ok(co_deviation(xs, mean_x, ys, mean_y) / (sxx * syy).sqrt())
}

/// Value at quantile `q` (0 to 1) of sorted values, interpolating linearly
/// between the two closest ranks.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Count, mean, standard deviation, extremes and the requested percentiles.
pub fn describe(values: &[f64], percentiles: &[f64]) -> Result<Summary, DataErrors> {
    if values.is_empty() {
        return Err(degenerate("summary", "no values".to_string()));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(degenerate("summary", "non-finite value".to_string()));
    }
    if let Some(p) = percentiles.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(degenerate("summary", format!("percentile {} out of [0, 1]", p)));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    let m = mean(&sorted);
    let std = if n > 1 {
        let ss: f64 = sorted.iter().map(|v| (v - m) * (v - m)).sum();
        Some((ss / (n - 1) as f64).sqrt())
    } else {
        None
    };
    Ok(Summary {
        count: n,
        mean: m,
        std,
        min: sorted[0],
        max: sorted[n - 1],
        percentiles: percentiles
            .iter()
            .map(|p| (*p, quantile_sorted(&sorted, *p)))
            .collect(),
    })
}
