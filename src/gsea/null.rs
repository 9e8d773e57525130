//! Normalization and significance of enrichment scores against a permutation null
//!
//! Positive and negative scores are compared only against null scores of the
//! same sign. Null scores of exactly `0` belong to neither pool.

use crate::f64_from_usize;

/// NES and nominal p-value of one gene set
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Normalized {
    pub nes: f64,
    pub p_value: f64,
    /// The null scores of the set, normalized like the observed score
    pub null_nes: Vec<f64>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / f64_from_usize(n))
    }
}

/// Fraction of `pool` with a magnitude of at least `|target|`
fn tail_fraction(pool: &[f64], target: f64) -> f64 {
    if pool.is_empty() {
        return f64::NAN;
    }
    let extreme = pool.iter().filter(|v| v.abs() >= target.abs()).count();
    f64_from_usize(extreme) / f64_from_usize(pool.len())
}

/// Divides `es` and the null scores by the mean magnitude of the same-sign null scores
///
/// The NES is `NaN` if there are no null scores of the same sign,
/// and `0` for an enrichment score of `0`.
pub(crate) fn normalize(es: f64, null: &[f64]) -> Normalized {
    let positive: Vec<f64> = null.iter().copied().filter(|v| *v > 0.0).collect();
    let negative: Vec<f64> = null.iter().copied().filter(|v| *v < 0.0).collect();
    let pos_scale = mean(positive.iter().copied());
    let neg_scale = mean(negative.iter().map(|v| v.abs()));

    let (nes, p_value) = if es > 0.0 {
        (
            pos_scale.map_or(f64::NAN, |scale| es / scale),
            tail_fraction(&positive, es),
        )
    } else if es < 0.0 {
        (
            neg_scale.map_or(f64::NAN, |scale| es / scale),
            tail_fraction(&negative, es),
        )
    } else {
        (0.0, 1.0)
    };

    let null_nes = null
        .iter()
        .filter_map(|v| {
            if *v > 0.0 {
                pos_scale.map(|scale| v / scale)
            } else if *v < 0.0 {
                neg_scale.map(|scale| v / scale)
            } else {
                None
            }
        })
        .collect();

    Normalized {
        nes,
        p_value,
        null_nes,
    }
}

/// Magnitudes of the values with the requested sign, sorted ascending
fn sorted_magnitudes(values: &[f64], positive: bool) -> Vec<f64> {
    let mut res: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && if positive { *v > 0.0 } else { *v < 0.0 })
        .map(f64::abs)
        .collect();
    res.sort_by(f64::total_cmp);
    res
}

/// Fraction of the sorted `magnitudes` that are `>= target`
fn fraction_at_least(magnitudes: &[f64], target: f64) -> f64 {
    let below = magnitudes.partition_point(|v| *v < target);
    f64_from_usize(magnitudes.len() - below) / f64_from_usize(magnitudes.len())
}

/// False discovery rate of every observed NES against the NES null pooled over all sets
///
/// For an observed NES of sign σ, the FDR is the fraction of same-signed null
/// NES with at least its magnitude, divided by the same fraction among the
/// observed NES, capped at `1`.
pub(crate) fn fdr(observed: &[f64], pooled_null: &[f64]) -> Vec<f64> {
    let null_pos = sorted_magnitudes(pooled_null, true);
    let null_neg = sorted_magnitudes(pooled_null, false);
    let obs_pos = sorted_magnitudes(observed, true);
    let obs_neg = sorted_magnitudes(observed, false);

    observed
        .iter()
        .map(|nes| {
            if !nes.is_finite() {
                return f64::NAN;
            }
            if *nes == 0.0 {
                return 1.0;
            }
            let (null, obs) = if *nes > 0.0 {
                (&null_pos, &obs_pos)
            } else {
                (&null_neg, &obs_neg)
            };
            if null.is_empty() {
                return f64::NAN;
            }
            let target = nes.abs();
            (fraction_at_least(null, target) / fraction_at_least(obs, target)).min(1.0)
        })
        .collect()
}
