//! Cleveland's robust locally weighted scatterplot smoothing
//!
//! For every evaluation point `x0`, the `r + 1` nearest observations
//! (`r = min(ceil(f * n), n - 1)`) are weighted with the tricube kernel
//! `(1 - (d / h)^3)^3`, where `h` is the distance to the farthest of them.
//! A weighted linear regression through these points gives the fit at `x0`.
//! Robustness iterations downweight observations with large residuals using
//! the bisquare of `residual / (6 * median(|residuals|))`.
//!
//! The plain and the fast variant only differ in their evaluation grid:
//! [`lowess`] evaluates at every distinct `x`, [`lowess_fast`] at evenly
//! spaced anchors and interpolates linearly in between.

use rayon::prelude::*;
use tracing::trace;

use crate::masked::{median_in_place, MaskedVec};
use crate::{f64_from_usize, GeneSigError, GeneSigResult};

/// Residual scales below this fraction of the data range count as a perfect fit
const PERFECT_FIT_TOLERANCE: f64 = 1e-12;

/// Parameters of a LOWESS fit
///
/// # Examples
///
/// ```
/// use genesig::MaskedVec;
/// use genesig::stats::LowessParams;
///
/// let params = LowessParams::default().with_frac(0.5).with_iterations(2);
/// assert!(params.validate().is_ok());
///
/// let x = MaskedVec::from_values((0..20).map(f64::from).collect());
/// let y = x.map(|v| 2.0 * v + 1.0);
/// let fit = params.fit(&x, &y, None);
/// assert!((fit.get(7).unwrap() - 15.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowessParams {
    /// Fraction of observations in each local regression, in `(0, 1]`
    pub frac: f64,
    /// Number of robustness iterations
    pub iterations: usize,
    /// Maximum number of evaluation anchors of the fast variant
    pub anchors: usize,
}

impl Default for LowessParams {
    fn default() -> Self {
        Self {
            frac: 2.0 / 3.0,
            iterations: 1,
            anchors: 100,
        }
    }
}

impl LowessParams {
    #[must_use]
    pub fn with_frac(mut self, frac: f64) -> Self {
        self.frac = frac;
        self
    }

    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    #[must_use]
    pub fn with_anchors(mut self, anchors: usize) -> Self {
        self.anchors = anchors;
        self
    }

    /// Checks that `frac` is in `(0, 1]` and there are at least two anchors
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] for parameters outside of these ranges
    pub fn validate(&self) -> GeneSigResult<()> {
        if !(self.frac > 0.0 && self.frac <= 1.0) {
            return Err(GeneSigError::InvalidInput(format!(
                "LOWESS fraction must be in (0, 1], got {}",
                self.frac
            )));
        }
        if self.anchors < 2 {
            return Err(GeneSigError::InvalidInput(
                "LOWESS needs at least 2 anchors".to_string(),
            ));
        }
        Ok(())
    }

    /// Fits `y ~ x` at every distinct `x`
    ///
    /// `weights` are optional prior weights of the observations, all `1.0`
    /// if `None`. Masked observations are ignored and stay masked in the
    /// result, as do points whose local regression is singular.
    pub fn fit(&self, x: &MaskedVec, y: &MaskedVec, weights: Option<&[f64]>) -> MaskedVec {
        let points = Points::collect(x, y, weights);
        let grid = points.distinct_x();
        points.smooth(x.len(), &grid, self.frac, self.iterations)
    }

    /// Fits `y ~ x` at no more than `anchors` evenly spaced points
    /// and interpolates linearly in between
    pub fn fit_fast(&self, x: &MaskedVec, y: &MaskedVec, weights: Option<&[f64]>) -> MaskedVec {
        let points = Points::collect(x, y, weights);
        let distinct = points.distinct_x();
        let grid = if distinct.len() <= self.anchors {
            distinct
        } else {
            linspace(distinct[0], distinct[distinct.len() - 1], self.anchors)
        };
        points.smooth(x.len(), &grid, self.frac, self.iterations)
    }
}

/// LOWESS fit with fraction `frac` and `iterations` robustness iterations
///
/// # Examples
///
/// ```
/// use genesig::MaskedVec;
/// use genesig::stats::lowess;
///
/// let x = MaskedVec::from_values(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
/// let y = MaskedVec::from_values(vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0]);
///
/// let fit = lowess(&x, &y, 2.0 / 3.0, 3);
/// for (xi, yi) in x.valid().zip(fit.valid()) {
///     assert!((yi - xi / 2.0).abs() < 1e-6);
/// }
/// ```
pub fn lowess(x: &MaskedVec, y: &MaskedVec, frac: f64, iterations: usize) -> MaskedVec {
    LowessParams::default()
        .with_frac(frac)
        .with_iterations(iterations)
        .fit(x, y, None)
}

/// Fast LOWESS: evaluates at `anchors` evenly spaced points and interpolates
pub fn lowess_fast(
    x: &MaskedVec,
    y: &MaskedVec,
    frac: f64,
    iterations: usize,
    anchors: usize,
) -> MaskedVec {
    LowessParams::default()
        .with_frac(frac)
        .with_iterations(iterations)
        .with_anchors(anchors)
        .fit_fast(x, y, None)
}

/// `n` evenly spaced values from `start` to `end` (inclusive)
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![start];
    }
    let step = (end - start) / f64_from_usize(n - 1);
    (0..n)
        .map(|i| {
            if i == n - 1 {
                end
            } else {
                start + step * f64_from_usize(i)
            }
        })
        .collect()
}

/// Valid observations, sorted by `x`
struct Points {
    x: Vec<f64>,
    y: Vec<f64>,
    w: Vec<f64>,
    idx: Vec<usize>,
}

impl Points {
    fn collect(x: &MaskedVec, y: &MaskedVec, weights: Option<&[f64]>) -> Self {
        let mut rows: Vec<(usize, f64, f64, f64)> = x
            .iter()
            .zip(y.iter())
            .enumerate()
            .filter_map(|(i, pair)| match pair {
                (Some(xi), Some(yi)) => {
                    let wi = weights.map_or(1.0, |w| w.get(i).copied().unwrap_or(0.0));
                    if wi.is_finite() && wi > 0.0 {
                        Some((i, xi, yi, wi))
                    } else {
                        None
                    }
                }
                _ => None,
            })
            .collect();
        rows.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let mut points = Points {
            x: Vec::with_capacity(rows.len()),
            y: Vec::with_capacity(rows.len()),
            w: Vec::with_capacity(rows.len()),
            idx: Vec::with_capacity(rows.len()),
        };
        for (i, xi, yi, wi) in rows {
            points.idx.push(i);
            points.x.push(xi);
            points.y.push(yi);
            points.w.push(wi);
        }
        points
    }

    fn len(&self) -> usize {
        self.x.len()
    }

    fn distinct_x(&self) -> Vec<f64> {
        let mut grid = self.x.clone();
        grid.dedup();
        grid
    }

    /// Number of neighbours beyond the closest one, `min(ceil(f * n), n - 1)`
    fn span(&self, frac: f64) -> usize {
        let n = self.len();
        // frac is in (0, 1], so the product is a small non-negative integer
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let r = (frac * f64_from_usize(n)).ceil() as usize;
        r.min(n.saturating_sub(1))
    }

    /// Fits at every grid point, then interpolates back to the observations
    fn smooth(&self, len: usize, grid: &[f64], frac: f64, iterations: usize) -> MaskedVec {
        let mut result = MaskedVec::all_masked(len);
        if self.len() == 0 || grid.is_empty() {
            return result;
        }
        let r = self.span(frac);
        let mut robust = vec![1.0; self.len()];
        let mut fitted = self.fit_grid(grid, &robust, r);

        for iteration in 0..iterations {
            let at_points: Vec<f64> =
                self.x.iter().map(|x| interpolate(grid, &fitted, *x)).collect();
            let residuals: Vec<f64> = self
                .y
                .iter()
                .zip(at_points.iter())
                .map(|(y, f)| y - f)
                .collect();
            let mut abs_res: Vec<f64> = residuals
                .iter()
                .filter(|r| r.is_finite())
                .map(|r| r.abs())
                .collect();
            let Some(s) = median_in_place(&mut abs_res) else {
                break;
            };
            let scale = self.y.iter().fold(0.0f64, |acc, y| acc.max(y.abs()));
            if s <= PERFECT_FIT_TOLERANCE * (1.0 + scale) {
                trace!("LOWESS converged after {} robustness iterations", iteration);
                break;
            }
            for (delta, res) in robust.iter_mut().zip(residuals.iter()) {
                *delta = if res.is_finite() {
                    let u = (res / (6.0 * s)).clamp(-1.0, 1.0);
                    (1.0 - u * u).powi(2)
                } else {
                    1.0
                };
            }
            fitted = self.fit_grid(grid, &robust, r);
        }

        for (i, x) in self.idx.iter().zip(self.x.iter()) {
            result.set(*i, Some(interpolate(grid, &fitted, *x)));
        }
        result
    }

    fn fit_grid(&self, grid: &[f64], robust: &[f64], r: usize) -> Vec<f64> {
        grid.par_iter()
            .map(|x0| self.fit_point(*x0, robust, r))
            .collect()
    }

    /// Weighted local linear regression at `x0` using the `r + 1` nearest points
    fn fit_point(&self, x0: f64, robust: &[f64], r: usize) -> f64 {
        let n = self.len();
        // expand a window [lo, hi) around x0 until it holds r + 1 points
        let mut hi = self.x.partition_point(|x| *x < x0);
        let mut lo = hi;
        let mut h = 0.0f64;
        while hi - lo < r + 1 {
            let left = if lo > 0 { Some(x0 - self.x[lo - 1]) } else { None };
            let right = if hi < n { Some(self.x[hi] - x0) } else { None };
            match (left, right) {
                (Some(l), Some(rr)) if l <= rr => {
                    lo -= 1;
                    h = h.max(l);
                }
                (Some(l), None) => {
                    lo -= 1;
                    h = h.max(l);
                }
                (_, Some(rr)) => {
                    hi += 1;
                    h = h.max(rr);
                }
                (None, None) => break,
            }
        }

        let mut sw = 0.0;
        let mut swx = 0.0;
        let mut swy = 0.0;
        let mut xmin = f64::INFINITY;
        let mut xmax = f64::NEG_INFINITY;
        let mut weights = Vec::with_capacity(hi - lo);
        for j in lo..hi {
            let d = (self.x[j] - x0).abs();
            let kernel = if h > 0.0 {
                let u = (d / h).clamp(0.0, 1.0);
                (1.0 - u * u * u).powi(3)
            } else if d == 0.0 {
                1.0
            } else {
                0.0
            };
            let w = kernel * robust[j] * self.w[j];
            weights.push(w);
            if w > 0.0 {
                sw += w;
                swx += w * self.x[j];
                swy += w * self.y[j];
                xmin = xmin.min(self.x[j]);
                xmax = xmax.max(self.x[j]);
            }
        }
        if !(sw > 0.0) || !(xmax > xmin) {
            return f64::NAN;
        }

        let xbar = swx / sw;
        let ybar = swy / sw;
        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (j, w) in (lo..hi).zip(weights) {
            let dx = self.x[j] - xbar;
            sxx += w * dx * dx;
            sxy += w * dx * (self.y[j] - ybar);
        }
        if !(sxx > 0.0) {
            return f64::NAN;
        }
        ybar + sxy / sxx * (x0 - xbar)
    }
}

/// Linear interpolation of `values` given at the sorted `grid`
///
/// Points outside of the grid take the value of the nearest end.
fn interpolate(grid: &[f64], values: &[f64], x: f64) -> f64 {
    let pos = grid.partition_point(|g| *g < x);
    if pos < grid.len() && grid[pos] == x {
        return values[pos];
    }
    if pos == 0 {
        return values[0];
    }
    if pos == grid.len() {
        return values[grid.len() - 1];
    }
    let (x0, x1) = (grid[pos - 1], grid[pos]);
    let (y0, y1) = (values[pos - 1], values[pos]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

#[cfg(test)]
mod test {
    use super::*;

    fn linear(n: usize, slope: f64, intercept: f64) -> (MaskedVec, MaskedVec) {
        let x: Vec<f64> = (0..n)
            .map(|i| f64_from_usize(i) * 0.37 + (f64_from_usize(i * i) * 0.001))
            .collect();
        let y: Vec<f64> = x.iter().map(|v| slope * v + intercept).collect();
        (MaskedVec::from_values(x), MaskedVec::from_values(y))
    }

    #[test]
    fn recovers_line() {
        let (x, y) = linear(200, -1.7, 3.2);
        for iterations in [0, 1, 3] {
            let fit = lowess(&x, &y, 2.0 / 3.0, iterations);
            for (xi, fi) in x.valid().zip(fit.iter()) {
                let fi = fi.unwrap();
                assert!((fi - (-1.7 * xi + 3.2)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn fast_recovers_line() {
        let (x, y) = linear(1000, 0.5, -2.0);
        let fit = lowess_fast(&x, &y, 0.3, 1, 50);
        for (xi, fi) in x.valid().zip(fit.iter()) {
            assert!((fi.unwrap() - (0.5 * xi - 2.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn masked_points_stay_masked() {
        let x = MaskedVec::from_options(vec![
            Some(1.0),
            Some(2.0),
            None,
            Some(4.0),
            Some(5.0),
            Some(6.0),
        ]);
        let y = MaskedVec::from_options(vec![
            Some(1.0),
            Some(2.0),
            Some(3.0),
            None,
            Some(5.0),
            Some(6.0),
        ]);
        let fit = lowess(&x, &y, 1.0, 0);
        assert_eq!(fit.len(), 6);
        assert!(fit.is_masked(2));
        assert!(fit.is_masked(3));
        assert!((fit.get(4).unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn empty_and_singular() {
        let fit = lowess(&MaskedVec::default(), &MaskedVec::default(), 0.5, 1);
        assert!(fit.is_empty());

        // all x identical: the regression matrix is singular
        let x = MaskedVec::from_values(vec![2.0; 5]);
        let y = MaskedVec::from_values(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let fit = lowess(&x, &y, 1.0, 0);
        assert_eq!(fit.count_valid(), 0);
    }

    #[test]
    fn robustness_downweights_outlier() {
        let x: Vec<f64> = (0..30).map(f64::from).collect();
        let mut y: Vec<f64> = x.iter().map(|v| v * 0.1).collect();
        y[15] = 50.0;
        let x = MaskedVec::from_values(x);
        let y = MaskedVec::from_values(y);

        let plain = lowess(&x, &y, 0.5, 0);
        let robust = lowess(&x, &y, 0.5, 3);
        let plain_err = (plain.get(14).unwrap() - 1.4).abs();
        let robust_err = (robust.get(14).unwrap() - 1.4).abs();
        assert!(robust_err < plain_err);
        assert!(robust_err < 0.1);
    }

    #[test]
    fn prior_weights() {
        let x = MaskedVec::from_values(vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        let y = MaskedVec::from_values(vec![0.0, 1.0, 2.0, 30.0, 4.0]);
        // zero weight removes the outlier from all regressions
        let w = [1.0, 1.0, 1.0, 0.0, 1.0];
        let fit = LowessParams::default().with_frac(1.0).with_iterations(0).fit(&x, &y, Some(&w));
        assert!((fit.get(1).unwrap() - 1.0).abs() < 1e-9);
        assert!(fit.is_masked(3));
    }

    #[test]
    fn interpolation() {
        let grid = [0.0, 1.0, 3.0];
        let values = [0.0, 2.0, 6.0];
        assert!((interpolate(&grid, &values, 2.0) - 4.0).abs() < 1e-12);
        assert!((interpolate(&grid, &values, -1.0) - 0.0).abs() < 1e-12);
        assert!((interpolate(&grid, &values, 5.0) - 6.0).abs() < 1e-12);
        assert!((interpolate(&grid, &values, 1.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn parameter_validation() {
        assert!(LowessParams::default().validate().is_ok());
        assert!(LowessParams::default().with_frac(0.0).validate().is_err());
        assert!(LowessParams::default().with_frac(1.5).validate().is_err());
        assert!(LowessParams::default().with_anchors(1).validate().is_err());
    }
}
