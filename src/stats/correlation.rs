//! Correlation coefficients over pairwise-complete observations
//!
//! Only positions where both vectors have a value are used.

use crate::f64_from_usize;
use crate::masked::MaskedVec;

/// Pearson correlation coefficient of `u` and `v`
///
/// Returns `NaN` with fewer than two complete pairs or if either
/// vector is constant over the complete pairs.
///
/// # Examples
///
/// ```
/// use genesig::MaskedVec;
/// use genesig::stats::pearson_masked;
///
/// let u = MaskedVec::from_options(vec![Some(1.0), Some(2.0), None, Some(3.0)]);
/// let v = MaskedVec::from_options(vec![Some(2.0), Some(4.0), Some(100.0), Some(6.0)]);
/// assert!((pearson_masked(&u, &v) - 1.0).abs() < 1e-12);
/// ```
pub fn pearson_masked(u: &MaskedVec, v: &MaskedVec) -> f64 {
    let (x, y) = u.pairwise_complete(v);
    pearson(&x, &y)
}

/// Spearman rank correlation of `u` and `v`
///
/// The complete pairs are ranked (ties get their average rank) and
/// correlated with Pearson's formula.
pub fn spearman_masked(u: &MaskedVec, v: &MaskedVec) -> f64 {
    let (x, y) = u.pairwise_complete(v);
    pearson(&rank_average(&x), &rank_average(&y))
}

pub(crate) fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let nf = f64_from_usize(n);
    let mean_x = x[..n].iter().sum::<f64>() / nf;
    let mean_y = y[..n].iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x[..n].iter().zip(y[..n].iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if !(sxx > 0.0 && syy > 0.0) {
        return f64::NAN;
    }
    (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}

/// 1-based ranks of `values`, ties receive the average of their ranks
///
/// # Examples
///
/// ```
/// use genesig::stats::rank_average;
///
/// assert_eq!(rank_average(&[10.0, 30.0, 20.0, 20.0]), vec![1.0, 4.0, 2.5, 2.5]);
/// ```
pub fn rank_average(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end share ranks start+1..=end
        let rank = f64_from_usize(start + 1 + end) / 2.0;
        for idx in &order[start..end] {
            ranks[*idx] = rank;
        }
        start = end;
    }
    ranks
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pearson_anticorrelated() {
        let u = MaskedVec::from_values(vec![1.0, 2.0, 3.0, 4.0]);
        let v = MaskedVec::from_values(vec![8.0, 6.0, 4.0, 2.0]);
        assert!((pearson_masked(&u, &v) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_known_value() {
        let u = MaskedVec::from_values(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let v = MaskedVec::from_values(vec![2.0, 1.0, 4.0, 3.0, 5.0]);
        assert!((pearson_masked(&u, &v) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn pearson_pairwise_complete() {
        // the masked outlier would destroy the correlation
        let u = MaskedVec::from_options(vec![Some(1.0), Some(2.0), Some(3.0), None]);
        let v = MaskedVec::from_options(vec![Some(1.0), Some(2.0), Some(3.0), Some(-50.0)]);
        assert!((pearson_masked(&u, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_degenerate() {
        let u = MaskedVec::from_values(vec![1.0, 1.0, 1.0]);
        let v = MaskedVec::from_values(vec![1.0, 2.0, 3.0]);
        assert!(pearson_masked(&u, &v).is_nan());
        let single = MaskedVec::from_values(vec![1.0]);
        assert!(pearson_masked(&single, &single).is_nan());
    }

    #[test]
    fn spearman_monotonic() {
        let u = MaskedVec::from_values(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let v = MaskedVec::from_values(vec![1.0, 4.0, 9.0, 16.0, 1000.0]);
        assert!((spearman_masked(&u, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ranks_with_ties() {
        assert_eq!(rank_average(&[3.0, 1.0, 2.0]), vec![3.0, 1.0, 2.0]);
        assert_eq!(rank_average(&[1.0, 1.0, 1.0]), vec![2.0, 2.0, 2.0]);
        assert!(rank_average(&[]).is_empty());
    }
}
