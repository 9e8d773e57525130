//! Multiple testing corrections
//!
//! `NaN` p-values are passed through unchanged and do not count as a test.

use crate::{cmp_f64, f64_from_usize};

/// Benjamini-Hochberg false discovery rate
///
/// For p-values sorted ascending, `q_i = min_{j >= i} (p_j * m / j)`,
/// capped at `1.0`. The q-values are returned in the input order.
///
/// # Examples
///
/// ```
/// use genesig::stats::fdr_bh;
///
/// let q = fdr_bh(&[0.01, 0.04, 0.03, 0.005, 0.2]);
/// let expected = [0.025, 0.05, 0.05, 0.025, 0.2];
/// for (a, b) in q.iter().zip(expected.iter()) {
///     assert!((a - b).abs() < 1e-12);
/// }
/// ```
pub fn fdr_bh(pvalues: &[f64]) -> Vec<f64> {
    step_up(pvalues, 1.0)
}

/// Benjamini-Yekutieli false discovery rate for dependent tests
///
/// Same as [`fdr_bh`], with every q-value multiplied by the harmonic
/// sum `c(m) = 1 + 1/2 + ... + 1/m`.
pub fn fdr_by(pvalues: &[f64]) -> Vec<f64> {
    let m = pvalues.iter().filter(|p| !p.is_nan()).count();
    let harmonic: f64 = (1..=m).map(|i| 1.0 / f64_from_usize(i)).sum();
    step_up(pvalues, harmonic.max(1.0))
}

fn step_up(pvalues: &[f64], correction: f64) -> Vec<f64> {
    let mut order: Vec<usize> = (0..pvalues.len())
        .filter(|idx| !pvalues[*idx].is_nan())
        .collect();
    order.sort_by(|a, b| cmp_f64(pvalues[*a], pvalues[*b]).then(a.cmp(b)));

    let m = f64_from_usize(order.len());
    let mut qvalues = pvalues.to_vec();
    let mut running_min = 1.0f64;
    for (rank, idx) in order.iter().enumerate().rev() {
        let q = pvalues[*idx] * m * correction / f64_from_usize(rank + 1);
        running_min = running_min.min(q);
        qvalues[*idx] = running_min;
    }
    qvalues
}

/// Bonferroni adjusted p-values, `min(p * m, 1)`
pub fn bonferroni_adjust(pvalues: &[f64]) -> Vec<f64> {
    let m = f64_from_usize(pvalues.iter().filter(|p| !p.is_nan()).count());
    pvalues.iter().map(|p| (p * m).min(1.0)).collect()
}

/// Returns for every p-value whether it is retained at family-wise level `alpha`
///
/// A test is retained if `p * m <= alpha`. `NaN` p-values are never retained.
///
/// # Examples
///
/// ```
/// use genesig::stats::bonferroni;
///
/// let keep = bonferroni(&[0.001, 0.02, 0.5, f64::NAN], 0.05);
/// assert_eq!(keep, vec![true, false, false, false]);
/// ```
pub fn bonferroni(pvalues: &[f64], alpha: f64) -> Vec<bool> {
    bonferroni_adjust(pvalues)
        .into_iter()
        .map(|p| p <= alpha)
        .collect()
}
