//! Statistics comparing the values of two (or more) sample classes
//!
//! Missing values are ignored per vector, never globally.

use statrs::function::beta::beta_reg;

use crate::f64_from_usize;
use crate::masked::MaskedVec;

/// Relative floor of the standard deviation in [`signal_to_noise`]
///
/// The standard deviation of a class is at least `SNR_SIGMA_FLOOR * |mean|`,
/// or `SNR_SIGMA_FLOOR` if the mean is `0`.
pub const SNR_SIGMA_FLOOR: f64 = 0.2;

/// The variance estimate of a two-sample t-test
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TTestKind {
    /// Unequal variances, Welch-Satterthwaite degrees of freedom
    #[default]
    Welch,
    /// Equal variances, pooled estimate with `n1 + n2 - 2` degrees of freedom
    Pooled,
}

/// Two-sample t-test
///
/// Returns the `t` statistic and the two-sided p-value. Both are `NaN` if
/// either vector has fewer than two values or the standard error is `0`.
///
/// # Examples
///
/// ```
/// use genesig::MaskedVec;
/// use genesig::stats::{t_test_two_sample, TTestKind};
///
/// let a = MaskedVec::from_values(vec![5.1, 4.9, 5.6, 5.8, 6.0]);
/// let b = MaskedVec::from_values(vec![4.0, 4.2, 3.9, 4.4, 4.1]);
///
/// let (t, p) = t_test_two_sample(&a, &b, TTestKind::Pooled);
/// assert!(t > 0.0);
/// assert!(p < 0.001);
/// ```
pub fn t_test_two_sample(a: &MaskedVec, b: &MaskedVec, kind: TTestKind) -> (f64, f64) {
    let (Some(mean_a), Some(var_a), Some(mean_b), Some(var_b)) =
        (a.mean(), a.variance(1), b.mean(), b.variance(1))
    else {
        return (f64::NAN, f64::NAN);
    };
    let n_a = f64_from_usize(a.count_valid());
    let n_b = f64_from_usize(b.count_valid());

    let (se2, df) = match kind {
        TTestKind::Pooled => {
            let df = n_a + n_b - 2.0;
            let pooled = ((n_a - 1.0) * var_a + (n_b - 1.0) * var_b) / df;
            (pooled * (1.0 / n_a + 1.0 / n_b), df)
        }
        TTestKind::Welch => {
            let sa = var_a / n_a;
            let sb = var_b / n_b;
            let se2 = sa + sb;
            let df = se2 * se2 / (sa * sa / (n_a - 1.0) + sb * sb / (n_b - 1.0));
            (se2, df)
        }
    };
    if !(se2 > 0.0) || !df.is_finite() {
        return (f64::NAN, f64::NAN);
    }
    let t = (mean_a - mean_b) / se2.sqrt();
    (t, student_t_two_sided(t, df))
}

/// Two-sided p-value of Student's t distribution
fn student_t_two_sided(t: f64, df: f64) -> f64 {
    if !t.is_finite() || !(df > 0.0) {
        return f64::NAN;
    }
    let x = df / (df + t * t);
    beta_reg(0.5 * df, 0.5, x.clamp(0.0, 1.0))
}

/// The standard deviation of a class, with the signal-to-noise floor applied
///
/// Uses the sample standard deviation; a single value has a deviation of `0`.
fn floored_std(values: &MaskedVec, mean: f64) -> f64 {
    let std = values.std_dev(1).unwrap_or(0.0);
    let reference = if mean == 0.0 { 1.0 } else { mean.abs() };
    std.max(SNR_SIGMA_FLOOR * reference)
}

/// Signal-to-noise ratio `(mean(a) - mean(b)) / (σ(a) + σ(b))`
///
/// σ is floored at [`SNR_SIGMA_FLOOR`] times the absolute class mean
/// (or the floor itself for a mean of `0`). Returns `NaN` if either class
/// has no values.
///
/// # Examples
///
/// ```
/// use genesig::MaskedVec;
/// use genesig::stats::signal_to_noise;
///
/// // constant classes: σ is floored at 0.2 * |mean|
/// let a = MaskedVec::from_values(vec![10.0, 10.0, 10.0]);
/// let b = MaskedVec::from_values(vec![5.0, 5.0, 5.0]);
/// assert!((signal_to_noise(&a, &b) - 5.0 / 3.0).abs() < 1e-12);
/// ```
pub fn signal_to_noise(a: &MaskedVec, b: &MaskedVec) -> f64 {
    let (Some(mean_a), Some(mean_b)) = (a.mean(), b.mean()) else {
        return f64::NAN;
    };
    (mean_a - mean_b) / (floored_std(a, mean_a) + floored_std(b, mean_b))
}

/// `mean(a) / mean(b)`
///
/// Returns `NaN` if either class has no values or `mean(b)` is `0`.
pub fn fold_change(a: &MaskedVec, b: &MaskedVec) -> f64 {
    match (a.mean(), b.mean()) {
        (Some(mean_a), Some(mean_b)) if mean_b != 0.0 => mean_a / mean_b,
        _ => f64::NAN,
    }
}

/// `log2(fold_change(a, b))`
///
/// Returns `NaN` where the fold change is not positive.
pub fn log2_fold_change(a: &MaskedVec, b: &MaskedVec) -> f64 {
    let fc = fold_change(a, b);
    if fc > 0.0 {
        fc.log2()
    } else {
        f64::NAN
    }
}

/// One-way analysis of variance
///
/// Returns the `F` statistic and its p-value. Groups without values are
/// ignored. Both values are `NaN` with fewer than two groups, without
/// residual degrees of freedom or without within-group variance.
///
/// # Examples
///
/// ```
/// use genesig::MaskedVec;
/// use genesig::stats::anova_f;
///
/// let groups = vec![
///     MaskedVec::from_values(vec![6.0, 8.0, 4.0, 5.0, 3.0, 4.0]),
///     MaskedVec::from_values(vec![8.0, 12.0, 9.0, 11.0, 6.0, 8.0]),
///     MaskedVec::from_values(vec![13.0, 9.0, 11.0, 8.0, 7.0, 12.0]),
/// ];
/// let (f, p) = anova_f(&groups);
/// assert!((f - 9.264_705_882).abs() < 1e-6);
/// assert!(p < 0.01);
/// ```
pub fn anova_f(groups: &[MaskedVec]) -> (f64, f64) {
    let groups: Vec<&MaskedVec> = groups.iter().filter(|g| g.count_valid() > 0).collect();
    let n_groups = groups.len();
    let n_total: usize = groups.iter().map(|g| g.count_valid()).sum();
    if n_groups < 2 || n_total <= n_groups {
        return (f64::NAN, f64::NAN);
    }

    let grand_mean = groups.iter().map(|g| g.sum()).sum::<f64>() / f64_from_usize(n_total);
    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in &groups {
        let Some(mean) = group.mean() else {
            continue;
        };
        ss_between += f64_from_usize(group.count_valid()) * (mean - grand_mean).powi(2);
        ss_within += group.valid().map(|v| (v - mean).powi(2)).sum::<f64>();
    }

    let df_between = f64_from_usize(n_groups - 1);
    let df_within = f64_from_usize(n_total - n_groups);
    if !(ss_within > 0.0) {
        return (f64::NAN, f64::NAN);
    }
    let f = (ss_between / df_between) / (ss_within / df_within);
    let x = df_within / (df_within + df_between * f);
    let p = beta_reg(0.5 * df_within, 0.5 * df_between, x.clamp(0.0, 1.0));
    (f, p)
}

#[cfg(test)]
mod test {
    use super::*;

    fn mv(v: &[f64]) -> MaskedVec {
        MaskedVec::from_values(v.to_vec())
    }

    #[test]
    fn pooled_t_test() {
        // scipy.stats.ttest_ind([1, 2, 3, 4], [3, 4, 5, 6])
        let (t, p) = t_test_two_sample(
            &mv(&[1.0, 2.0, 3.0, 4.0]),
            &mv(&[3.0, 4.0, 5.0, 6.0]),
            TTestKind::Pooled,
        );
        assert!((t + 2.190_890_230_020_664_5).abs() < 1e-9);
        assert!((p - 0.070_987_654_320_99).abs() < 1e-8);
    }

    #[test]
    fn welch_equals_pooled_for_balanced_equal_variance() {
        let a = mv(&[1.0, 2.0, 3.0, 4.0]);
        let b = mv(&[3.0, 4.0, 5.0, 6.0]);
        let (tw, pw) = t_test_two_sample(&a, &b, TTestKind::Welch);
        let (tp, pp) = t_test_two_sample(&a, &b, TTestKind::Pooled);
        assert!((tw - tp).abs() < 1e-12);
        assert!((pw - pp).abs() < 1e-9);
    }

    #[test]
    fn t_test_ignores_missing_per_vector() {
        let a = MaskedVec::from_options(vec![Some(1.0), None, Some(2.0), Some(3.0), Some(4.0)]);
        let b = MaskedVec::from_options(vec![Some(3.0), Some(4.0), Some(5.0), Some(6.0), None]);
        let (t, _) = t_test_two_sample(&a, &b, TTestKind::Pooled);
        assert!((t + 2.190_890_230_020_664_5).abs() < 1e-9);
    }

    #[test]
    fn t_test_ill_posed() {
        let (t, p) = t_test_two_sample(&mv(&[1.0]), &mv(&[1.0, 2.0]), TTestKind::Welch);
        assert!(t.is_nan() && p.is_nan());
        let (t, p) = t_test_two_sample(&mv(&[1.0, 1.0]), &mv(&[1.0, 1.0]), TTestKind::Pooled);
        assert!(t.is_nan() && p.is_nan());
    }

    #[test]
    fn snr_floor_for_zero_mean() {
        let a = mv(&[0.0, 0.0]);
        let b = mv(&[-1.0, -1.0]);
        // σ(a) = 0.2 (mean 0), σ(b) = 0.2 * 1
        assert!((signal_to_noise(&a, &b) - 1.0 / 0.4).abs() < 1e-12);
    }

    #[test]
    fn snr_regular() {
        let a = mv(&[1.0, 3.0]);
        let b = mv(&[0.0, 0.0, 0.0]);
        // σ(a) = sqrt(2), σ(b) = floor 0.2
        let expected = 2.0 / (2f64.sqrt() + 0.2);
        assert!((signal_to_noise(&a, &b) - expected).abs() < 1e-12);
        assert!((signal_to_noise(&b, &a) + expected).abs() < 1e-12);
    }

    #[test]
    fn snr_empty_class() {
        assert!(signal_to_noise(&mv(&[1.0]), &MaskedVec::all_masked(2)).is_nan());
    }

    #[test]
    fn fold_changes() {
        assert!((fold_change(&mv(&[4.0, 4.0]), &mv(&[1.0, 3.0])) - 2.0).abs() < 1e-12);
        assert!((log2_fold_change(&mv(&[4.0, 4.0]), &mv(&[1.0, 3.0])) - 1.0).abs() < 1e-12);
        assert!(fold_change(&mv(&[4.0]), &mv(&[0.0])).is_nan());
        assert!(log2_fold_change(&mv(&[-4.0]), &mv(&[1.0])).is_nan());
    }

    #[test]
    fn anova_two_groups_matches_t_test() {
        let a = mv(&[1.0, 2.0, 3.0, 4.0]);
        let b = mv(&[3.0, 4.0, 5.0, 6.0]);
        let (f, p) = anova_f(&[a.clone(), b.clone()]);
        let (t, pt) = t_test_two_sample(&a, &b, TTestKind::Pooled);
        assert!((f - t * t).abs() < 1e-9);
        assert!((p - pt).abs() < 1e-9);
    }

    #[test]
    fn anova_ill_posed() {
        assert!(anova_f(&[mv(&[1.0, 2.0])]).0.is_nan());
        assert!(anova_f(&[mv(&[1.0, 1.0]), mv(&[1.0, 1.0])]).0.is_nan());
    }
}
