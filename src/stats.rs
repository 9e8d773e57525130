//! Numeric primitives used by the enrichment, GSEA and normalization engines
//!
//! All functions in this module are pure and deterministic. They never
//! return an error for data-content reasons: ill-posed inputs (empty,
//! all-masked or singular data) produce `NaN` instead, and callers
//! are expected to check for it.
//!
//! - [`hypergeom`]: hypergeometric distribution and Fisher's exact test
//! - [`multitest`]: Benjamini-Hochberg, Benjamini-Yekutieli and Bonferroni corrections
//! - [`twoclass`]: t-tests, signal-to-noise, fold change and one-way ANOVA
//! - [`correlation`]: pairwise-complete Pearson and Spearman correlation
//! - [`lowess`]: Cleveland's robust locally weighted regression

use crate::masked::{median_in_place, MaskedVec};

pub mod correlation;
pub mod hypergeom;
pub mod lowess;
pub mod multitest;
pub mod twoclass;

pub use correlation::{pearson_masked, rank_average, spearman_masked};
pub use hypergeom::{fisher_exact_two_sided, hypergeometric_pvalue, Hypergeometric};
pub use lowess::{lowess, lowess_fast, LowessParams};
pub use multitest::{bonferroni, bonferroni_adjust, fdr_bh, fdr_by};
pub use twoclass::{
    anova_f, fold_change, log2_fold_change, signal_to_noise, t_test_two_sample, TTestKind,
    SNR_SIGMA_FLOOR,
};

/// The median of the absolute deviations from the median
///
/// Returns `NaN` if `x` has no non-masked values
///
/// # Examples
///
/// ```
/// use genesig::MaskedVec;
/// use genesig::stats::median_absolute_deviation;
///
/// let x = MaskedVec::from_values(vec![1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0]);
/// assert!((median_absolute_deviation(&x) - 1.0).abs() < f64::EPSILON);
/// ```
pub fn median_absolute_deviation(x: &MaskedVec) -> f64 {
    let Some(median) = x.median() else {
        return f64::NAN;
    };
    let mut deviations: Vec<f64> = x.valid().map(|v| (v - median).abs()).collect();
    median_in_place(&mut deviations).unwrap_or(f64::NAN)
}
