//! The hypergeometric distribution and tests derived from it
//!
//! The distribution is implemented following <https://github.com/statrs-dev/statrs>
//! but only contains what is needed for over-representation tests. Factorials
//! up to `170!` come from a pre-computed cache, larger ones from the
//! Lanczos approximation of `ln Γ`.
#![allow(clippy::excessive_precision)]
#![allow(clippy::unreadable_literal)]

use std::cmp;

use crate::{f64_from_u64, f64_from_usize, GeneSigError, GeneSigResult};

/// Auxiliary variable when evaluating the `gamma_ln` function
const GAMMA_R: f64 = 10.900_511;

/// Polynomial coefficients for approximating the `gamma_ln` function
const GAMMA_DK: &[f64] = &[
    2.48574089138753565546e-5,
    1.05142378581721974210,
    -3.45687097222016235469,
    4.51227709466894823700,
    -2.98285225323576655721,
    1.05639711577126713077,
    -1.95428773191645869583e-1,
    1.70970543404441224307e-2,
    -5.71926117404305781283e-4,
    4.63399473359905636708e-6,
    -2.71994908488607703910e-9,
];

/// Constant value for `ln(2 * sqrt(e / pi))`
const LN_2_SQRT_E_OVER_PI: f64 = 0.6207822376352452223455184457816472122518527279025978;

/// The largest factorial that fits into a `f64`
const MAX_FACTORIAL: usize = 170;

/// Relative tolerance when comparing point probabilities in Fisher's test
const FISHER_REL_TOLERANCE: f64 = 1e-7;

// 0!...170!
#[allow(clippy::cast_precision_loss)]
const FCACHE: [f64; MAX_FACTORIAL + 1] = {
    let mut fcache = [1.0; MAX_FACTORIAL + 1];

    let mut i = 1;
    while i < MAX_FACTORIAL + 1 {
        fcache[i] = fcache[i - 1] * i as f64;

        i += 1;
    }
    fcache
};

/// The hypergeometric distribution
///
/// Models the number of successes when drawing `draws` items without
/// replacement from a `population` that contains `successes` successes.
///
/// # Examples
///
/// ```
/// use genesig::stats::Hypergeometric;
///
/// // population of 10 genes, 3 of them annotated, 3 genes drawn
/// let hyper = Hypergeometric::new(10, 3, 3).unwrap();
/// // probability of drawing all 3 annotated genes
/// assert!((hyper.pmf(3) - 1.0 / 120.0).abs() < 1e-12);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Hypergeometric {
    population: u64,
    successes: u64,
    draws: u64,
}

impl Hypergeometric {
    /// Constructs a new hypergeometric distribution
    /// with a population (N) of `population`, number
    /// of successes (K) of `successes`, and number of draws
    /// (n) of `draws`
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if `successes > population` or `draws > population`
    pub fn new(population: u64, successes: u64, draws: u64) -> GeneSigResult<Hypergeometric> {
        if successes > population || draws > population {
            Err(GeneSigError::InvalidInput(format!(
                "hypergeometric: N={population}, K={successes}, n={draws}"
            )))
        } else {
            Ok(Hypergeometric {
                population,
                successes,
                draws,
            })
        }
    }

    /// `max(0, n + K - N)`
    pub fn min(&self) -> u64 {
        (self.draws + self.successes).saturating_sub(self.population)
    }

    /// `min(K, n)`
    pub fn max(&self) -> u64 {
        cmp::min(self.successes, self.draws)
    }

    /// The natural logarithm of the probability mass at `x`
    ///
    /// Returns `f64::NEG_INFINITY` outside of the support
    pub fn ln_pmf(&self, x: u64) -> f64 {
        if x < self.min() || x > self.max() {
            return f64::NEG_INFINITY;
        }
        ln_binomial(self.successes, x)
            + ln_binomial(self.population - self.successes, self.draws - x)
            - ln_binomial(self.population, self.draws)
    }

    /// The probability of observing exactly `x` successes
    pub fn pmf(&self, x: u64) -> f64 {
        self.ln_pmf(x).exp()
    }

    /// The probability of observing `x` or fewer successes
    pub fn cdf(&self, x: u64) -> f64 {
        if x < self.min() {
            0.0
        } else if x >= self.max() {
            1.0
        } else {
            (self.min()..=x).map(|i| self.pmf(i)).sum::<f64>().min(1.0)
        }
    }

    /// The probability of observing more than `x` successes
    ///
    /// Calculated as a discrete integral over the probability mass
    /// function evaluated from (x+1)..max
    pub fn sf(&self, x: u64) -> f64 {
        if x < self.min() {
            1.0
        } else if x >= self.max() {
            0.0
        } else {
            ((x + 1)..=self.max())
                .map(|i| self.pmf(i))
                .sum::<f64>()
                .min(1.0)
        }
    }
}

/// The right-tail probability `P(X >= k)` of an over-representation test
///
/// - `k`: observed overlap of sample and annotated items
/// - `population` (N): number of all items
/// - `successes` (m): number of annotated items in the population
/// - `draws` (n): sample size
///
/// Returns `1.0` for `k == 0` and `NaN` if the parameters do not describe a
/// valid distribution (`m > N` or `n > N`).
///
/// # Examples
///
/// ```
/// use genesig::stats::hypergeometric_pvalue;
///
/// let p = hypergeometric_pvalue(3, 100, 10, 10);
/// assert!((p - 0.060_018_581_775).abs() < 1e-9);
///
/// assert!((hypergeometric_pvalue(0, 100, 10, 10) - 1.0).abs() < f64::EPSILON);
/// ```
pub fn hypergeometric_pvalue(k: u64, population: u64, successes: u64, draws: u64) -> f64 {
    if k == 0 {
        return 1.0;
    }
    match Hypergeometric::new(population, successes, draws) {
        // subtracting 1, because we want to test including k
        // e.g. "7 or more", but sf by default calculates "more than 7"
        Ok(hyper) => hyper.sf(k - 1),
        Err(_) => f64::NAN,
    }
}

/// Two-sided Fisher's exact test of a 2x2 contingency table
///
/// Uses the same parametrization as [`hypergeometric_pvalue`]. The p-value
/// is the sum of the probabilities of all tables that are at most as
/// likely as the observed one.
///
/// # Examples
///
/// ```
/// use genesig::stats::fisher_exact_two_sided;
///
/// // the tea tasting lady
/// let p = fisher_exact_two_sided(3, 8, 4, 4);
/// assert!((p - 0.485_714_285_714).abs() < 1e-9);
/// ```
pub fn fisher_exact_two_sided(k: u64, population: u64, successes: u64, draws: u64) -> f64 {
    let Ok(hyper) = Hypergeometric::new(population, successes, draws) else {
        return f64::NAN;
    };
    if k < hyper.min() || k > hyper.max() {
        return 0.0;
    }
    let observed = hyper.pmf(k);
    let threshold = observed * (1.0 + FISHER_REL_TOLERANCE);
    (hyper.min()..=hyper.max())
        .map(|i| hyper.pmf(i))
        .filter(|p| *p <= threshold)
        .sum::<f64>()
        .min(1.0)
}

/// Computes the logarithm of the gamma function
/// with an accuracy of 16 floating point digits.
/// The implementation is derived from
/// "An Analysis of the Lanczos Gamma Approximation",
/// Glendon Ralph Pugh, 2004 p. 116
///
/// Only valid for `x >= 0.5`, which covers all factorial arguments
fn ln_gamma(x: f64) -> f64 {
    let s = GAMMA_DK
        .iter()
        .enumerate()
        .skip(1)
        .fold(GAMMA_DK[0], |s, t| {
            s + t.1 / (x + f64_from_usize(t.0) - 1.0)
        });

    s.ln() + LN_2_SQRT_E_OVER_PI + (x - 0.5) * ((x - 0.5 + GAMMA_R) / std::f64::consts::E).ln()
}

/// `ln(x!)`
fn ln_factorial(x: u64) -> f64 {
    usize::try_from(x)
        .ok()
        .and_then(|idx| FCACHE.get(idx))
        .map_or_else(|| ln_gamma(f64_from_u64(x) + 1.0), |fac| fac.ln())
}

/// Computes the natural logarithm of the binomial coefficient
/// `ln(n choose k)` where `k` and `n` are non-negative values
///
/// # Remarks
///
/// Returns `f64::NEG_INFINITY` if `k > n`
pub(crate) fn ln_binomial(n: u64, k: u64) -> f64 {
    if k > n {
        f64::NEG_INFINITY
    } else {
        ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fcache() {
        assert!((FCACHE[0] - 1.0).abs() < f64::EPSILON);
        assert!((FCACHE[1] - 1.0).abs() < f64::EPSILON);
        assert!((FCACHE[4] - 24.0).abs() < f64::EPSILON);
        assert!((FCACHE[10] - 3_628_800.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ln_factorial_continuity() {
        // the cached and the approximated branch must agree
        let cached = ln_factorial(170);
        let approx = ln_gamma(171.0);
        assert!((cached - approx).abs() / cached < 1e-12);
        // ln(171!) = ln(170!) + ln(171)
        assert!((ln_factorial(171) - (cached + 171f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn build() {
        assert!(Hypergeometric::new(2, 2, 2).is_ok());
        assert!(Hypergeometric::new(2, 3, 2).is_err());
        assert!(Hypergeometric::new(2, 1, 3).is_err());
    }

    #[test]
    fn support() {
        let hyper = Hypergeometric::new(50, 25, 30).unwrap();
        assert_eq!(hyper.min(), 5);
        assert_eq!(hyper.max(), 25);

        let hyper = Hypergeometric::new(50, 10, 13).unwrap();
        assert_eq!(hyper.min(), 0);
        assert_eq!(hyper.max(), 10);
    }

    #[test]
    fn survival_function() {
        // Numbers calculated here https://statisticsbyjim.com/probability/hypergeometric-distribution/
        let hyper = Hypergeometric::new(50, 25, 13).unwrap();

        assert!((hyper.sf(1) - 0.9996189832542451).abs() < 1e-12);
        assert!((hyper.sf(3) - 0.9746644799047702).abs() < 1e-12);
        assert!((hyper.sf(7) - 0.26009737477738537).abs() < 1e-12);
        assert!((hyper.sf(12) - 0.000014654490222007184).abs() < 1e-15);
        assert!(hyper.sf(13) < f64::EPSILON);
    }

    #[test]
    fn cdf_complements_sf() {
        let hyper = Hypergeometric::new(100, 10, 10).unwrap();
        for x in 0..10 {
            assert!((hyper.cdf(x) + hyper.sf(x) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn pvalues() {
        let expected = [
            (3, 0.060_018_581_775_005_78),
            (5, 0.000_671_627_748_265_05),
            (10, 5.776_904_234_533_874e-14),
        ];
        for (k, p) in expected {
            let calc = hypergeometric_pvalue(k, 100, 10, 10);
            assert!((calc - p).abs() / p < 1e-9, "k={k}: {calc} != {p}");
        }
    }

    #[test]
    fn pvalue_bounds_and_monotonicity() {
        let cases = [(100, 10, 10), (20, 20, 5), (20, 0, 5), (500, 37, 60)];
        for (population, successes, draws) in cases {
            let mut last = 1.0;
            for k in 0..=draws {
                let p = hypergeometric_pvalue(k, population, successes, draws);
                assert!((0.0..=1.0).contains(&p), "{p}");
                assert!(p <= last + 1e-15);
                last = p;
            }
        }
    }

    #[test]
    fn degenerate_successes() {
        // nothing is annotated
        assert!((hypergeometric_pvalue(0, 20, 0, 5) - 1.0).abs() < f64::EPSILON);
        assert!(hypergeometric_pvalue(1, 20, 0, 5) < f64::EPSILON);
        // everything is annotated
        assert!((hypergeometric_pvalue(5, 20, 20, 5) - 1.0).abs() < f64::EPSILON);
        // invalid parameters
        assert!(hypergeometric_pvalue(1, 5, 6, 2).is_nan());
    }

    #[test]
    fn fisher() {
        // symmetric table is not significant at all
        assert!((fisher_exact_two_sided(2, 8, 4, 4) - 1.0).abs() < 1e-12);
        let p = fisher_exact_two_sided(4, 8, 4, 4);
        assert!((p - 2.0 / 70.0).abs() < 1e-12);
    }
}
