// THEORY:
// A single fixation spreads its "attention" over the canvas as an isotropic
// Gaussian blob. `sigma` is the full width at half maximum rather than the
// standard deviation: the blob is exactly `peak` at its center, `peak / 2` at
// distance `sigma / 2` and `peak / 16` at distance `sigma`.
//
//     value(x, y) = peak * exp(-4 ln2 * ((x - x0)^2 + (y - y0)^2) / sigma^2)
//
// The exponent splits into an x term and a y term, so the field is the outer
// product of two 1-D profiles. We evaluate W + H exponentials per fixation
// instead of W * H, which is what makes accumulating hundreds of fixations on
// a full-size stimulus image affordable.
//
// A fixation with a NaN coordinate is a dropped tracker sample. It produces an
// all-zero field rather than an error, so it simply contributes nothing.

use crate::error::{HeatmapError, Result};
use ndarray::Array2;

/// Spread used for a stand-alone call.
pub const DEFAULT_SIGMA: f64 = 33.0;
/// Spread used when accumulating fixations into a heatmap.
pub const FIXATION_SIGMA: f64 = 25.0;
/// Amplitude at the blob's center.
pub const DEFAULT_PEAK: f64 = 1.0;

const FOUR_LN_2: f64 = 4.0 * std::f64::consts::LN_2;

/// Builds the Gaussian field for one fixation on a `height x width` grid
/// (rows are y, columns are x).
///
/// `center` defaults to the canvas midpoint using integer division.
pub fn gaussian_mask(
    width: u32,
    height: u32,
    sigma: f64,
    center: Option<(f64, f64)>,
    peak: f64,
) -> Result<Array2<f64>> {
    check_dimensions(width, height)?;
    check_sigma(sigma)?;

    let (x0, y0) = center.unwrap_or_else(|| midpoint(width, height));
    let mut field = Array2::<f64>::zeros((height as usize, width as usize));
    if x0.is_nan() || y0.is_nan() {
        return Ok(field);
    }

    let gx = axis_profile(width, x0, sigma);
    let gy = axis_profile(height, y0, sigma);
    for ((y, x), cell) in field.indexed_iter_mut() {
        *cell = peak * gy[y] * gx[x];
    }
    Ok(field)
}

/// Adds the Gaussian for `center` into an existing `f32` accumulator without
/// materialising the intermediate field. Each term is computed in `f64` and the
/// sum is narrowed back to `f32`.
///
/// NaN centers are skipped. Returns `true` when the fixation contributed.
pub fn accumulate_gaussian(grid: &mut Array2<f32>, sigma: f64, center: (f64, f64), peak: f64) -> bool {
    let (x0, y0) = center;
    if x0.is_nan() || y0.is_nan() {
        return false;
    }
    let (rows, cols) = grid.dim();
    let gx = axis_profile(cols as u32, x0, sigma);
    let gy = axis_profile(rows as u32, y0, sigma);
    for ((y, x), cell) in grid.indexed_iter_mut() {
        let term = peak * gy[y] * gx[x];
        *cell = (f64::from(*cell) + term) as f32;
    }
    true
}

/// The canvas midpoint with integer division, as used for an omitted center.
pub fn midpoint(width: u32, height: u32) -> (f64, f64) {
    (f64::from(width / 2), f64::from(height / 2))
}

pub(crate) fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(HeatmapError::InvalidDimensions { width, height });
    }
    Ok(())
}

pub(crate) fn check_sigma(sigma: f64) -> Result<()> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(HeatmapError::InvalidSigma(sigma));
    }
    Ok(())
}

pub(crate) fn check_peak(peak: f64) -> Result<()> {
    if !peak.is_finite() || peak <= 0.0 {
        return Err(HeatmapError::InvalidPeak(peak));
    }
    Ok(())
}

// exp(-4 ln2 (i - c)^2 / sigma^2) for i in 0..len
fn axis_profile(len: u32, center: f64, sigma: f64) -> Vec<f64> {
    let sigma_sq = sigma * sigma;
    (0..len)
        .map(|i| {
            let d = f64::from(i) - center;
            (-FOUR_LN_2 * d * d / sigma_sq).exp()
        })
        .collect()
}
