use crate::masked::MaskedVec;
use crate::stats::{log2_fold_change, pearson_masked, signal_to_noise, t_test_two_sample, TTestKind};

/// The per-gene statistic that orders genes for GSEA
///
/// All methods compare the first class against the second, so genes
/// with higher values in the first class get positive scores.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RankingMethod {
    /// `(μ1 - μ2) / (σ1 + σ2)`, see [`signal_to_noise`]
    #[default]
    SignalToNoise,
    /// Welch t statistic
    TTest,
    /// Pearson correlation with the class indicator (1 for the first class, 0 otherwise)
    Pearson,
    /// `log2(μ1 / μ2)`
    FoldChange,
}

impl RankingMethod {
    /// Scores one gene
    ///
    /// `first` holds one entry per value of `row`, `true` for samples of the first class.
    /// Returns `NaN` if the statistic is undefined.
    pub fn score(&self, row: &MaskedVec, first: &[bool]) -> f64 {
        match self {
            RankingMethod::Pearson => {
                let indicator: MaskedVec = first
                    .iter()
                    .map(|is_first| if *is_first { 1.0 } else { 0.0 })
                    .collect::<Vec<f64>>()
                    .into();
                pearson_masked(row, &indicator)
            }
            method => {
                let (a, b) = split_classes(row, first);
                match method {
                    RankingMethod::SignalToNoise => signal_to_noise(&a, &b),
                    RankingMethod::TTest => t_test_two_sample(&a, &b, TTestKind::Welch).0,
                    _ => log2_fold_change(&a, &b),
                }
            }
        }
    }
}

fn split_classes(row: &MaskedVec, first: &[bool]) -> (MaskedVec, MaskedVec) {
    let mut a = MaskedVec::default();
    let mut b = MaskedVec::default();
    for (value, is_first) in row.iter().zip(first.iter()) {
        if *is_first {
            a.push(value);
        } else {
            b.push(value);
        }
    }
    (a, b)
}

/// Number of values of `row` in the first and in the second class
pub(crate) fn values_per_class(row: &MaskedVec, first: &[bool]) -> (usize, usize) {
    row.iter()
        .zip(first.iter())
        .filter(|(value, _)| value.is_some())
        .fold((0, 0), |(a, b), (_, is_first)| {
            if *is_first {
                (a + 1, b)
            } else {
                (a, b + 1)
            }
        })
}

/// Scores every row, undefined scores become `0`
pub(crate) fn score_rows(method: RankingMethod, rows: &[MaskedVec], first: &[bool]) -> Vec<f64> {
    rows.iter()
        .map(|row| {
            let score = method.score(row, first);
            if score.is_finite() {
                score
            } else {
                0.0
            }
        })
        .collect()
}

/// Gene indices ordered by descending score
///
/// Ties with a score of at least `0` keep the index order, negative ties
/// are reversed. Negating the scores therefore reverses the order, except
/// inside a block of genes that all score `0`.
pub(crate) fn rank_order(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| {
        let (score_a, score_b) = (scores[*a], scores[*b]);
        score_b
            .partial_cmp(&score_a)
            .unwrap_or_else(|| score_b.total_cmp(&score_a))
            .then_with(|| {
                if score_a < 0.0 {
                    b.cmp(a)
                } else {
                    a.cmp(b)
                }
            })
    });
    order
}

/// The rank position of every gene index
pub(crate) fn positions(order: &[usize]) -> Vec<usize> {
    let mut pos = vec![0; order.len()];
    for (rank, gene) in order.iter().enumerate() {
        pos[*gene] = rank;
    }
    pos
}

#[cfg(test)]
mod test {
    use super::*;

    fn row(values: &[f64]) -> MaskedVec {
        MaskedVec::from_values(values.to_vec())
    }

    #[test]
    fn methods_agree_in_sign() {
        let r = row(&[6.0, 7.0, 8.0, 1.0, 2.0, 3.0]);
        let first = [true, true, true, false, false, false];
        for method in [
            RankingMethod::SignalToNoise,
            RankingMethod::TTest,
            RankingMethod::Pearson,
            RankingMethod::FoldChange,
        ] {
            let up = method.score(&r, &first);
            assert!(up > 0.0, "{method:?}");
            let flipped: Vec<bool> = first.iter().map(|f| !f).collect();
            let down = method.score(&r, &flipped);
            assert!((up + down).abs() < 1e-12, "{method:?}");
        }
    }

    #[test]
    fn fold_change_is_log2() {
        let r = row(&[8.0, 8.0, 2.0, 2.0]);
        let score = RankingMethod::FoldChange.score(&r, &[true, true, false, false]);
        assert!((score - 2.0).abs() < 1e-12);
    }

    #[test]
    fn missing_values() {
        let r = MaskedVec::from_options(vec![Some(1.0), None, Some(3.0), None]);
        assert_eq!(values_per_class(&r, &[true, true, false, false]), (1, 1));

        let scores = score_rows(RankingMethod::TTest, &[r], &[true, true, false, false]);
        assert_eq!(scores, vec![0.0]);
    }

    #[test]
    fn ranking_breaks_ties_by_index() {
        let order = rank_order(&[0.5, 2.0, 0.5, -1.0]);
        assert_eq!(order, vec![1, 0, 2, 3]);
        assert_eq!(positions(&order), vec![1, 0, 2, 3]);

        let order = rank_order(&[-1.0, 2.0, -1.0, 0.0, -0.0, 0.0]);
        assert_eq!(order, vec![1, 3, 4, 5, 2, 0]);
    }

    #[test]
    fn negated_ties_reverse_the_order() {
        let scores = [0.5, 2.0, 0.5, -1.0, 0.5, -1.0, 3.0, -1.0];
        let negated: Vec<f64> = scores.iter().map(|s| -s).collect();

        let mut reversed = rank_order(&negated);
        reversed.reverse();
        assert_eq!(rank_order(&scores), reversed);
        assert_eq!(rank_order(&scores), vec![6, 1, 0, 2, 4, 7, 5, 3]);
    }
}
