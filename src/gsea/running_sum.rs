//! Weighted Kolmogorov-Smirnov running sum of a gene set over a ranked list

/// The extremum of a running sum
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Extremum {
    /// Signed maximal deviation from `0`
    pub es: f64,
    /// Rank position where the extremum is reached
    pub position: usize,
}

/// Step sizes of the running sum
struct Weights<'a> {
    ranked_scores: &'a [f64],
    alpha: f64,
    hit_norm: f64,
    miss: f64,
}

impl<'a> Weights<'a> {
    fn new(ranked_scores: &'a [f64], hits: &[usize], alpha: f64) -> Option<Self> {
        let n = ranked_scores.len();
        if hits.is_empty() || hits.len() > n {
            return None;
        }
        let hit_norm: f64 = hits.iter().map(|pos| ranked_scores[*pos].abs().powf(alpha)).sum();
        let misses = n - hits.len();
        Some(Self {
            ranked_scores,
            alpha,
            hit_norm,
            miss: if misses == 0 {
                0.0
            } else {
                1.0 / crate::f64_from_usize(misses)
            },
        })
    }

    /// Without any weight, all hits contribute equally
    fn hit(&self, pos: usize, k: usize) -> f64 {
        if self.hit_norm > 0.0 {
            self.ranked_scores[pos].abs().powf(self.alpha) / self.hit_norm
        } else {
            1.0 / crate::f64_from_usize(k)
        }
    }
}

/// Values of the running sum closer than this count as equal
const TIE_TOLERANCE: f64 = 1e-12;

impl Extremum {
    /// Keeps the first position of the maximum
    fn raise(&mut self, running: f64, position: usize) {
        if running > self.es + TIE_TOLERANCE {
            *self = Self { es: running, position };
        } else if running > self.es {
            self.es = running;
        }
    }

    /// Keeps the last position of the minimum
    fn lower(&mut self, running: f64, position: usize) {
        if running < self.es + TIE_TOLERANCE {
            *self = Self {
                es: running.min(self.es),
                position,
            };
        }
    }
}

/// Enrichment score of the set with members at the sorted rank positions `hits`
///
/// Only visits the hits, misses in between are applied in a single step.
/// The maximum is taken at its first position, the minimum at its last one.
/// If both are equally large, the one with fewer steps to its end of the
/// list wins (the start for the maximum, the end for the minimum). If these
/// distances are equal as well, the score is `0`. Unless the set covers the
/// whole list, reversing the ranking and negating the scores negates the
/// enrichment score.
///
/// Returns `None` if the set is empty.
pub(crate) fn enrichment_score(
    ranked_scores: &[f64],
    hits: &[usize],
    alpha: f64,
) -> Option<Extremum> {
    let weights = Weights::new(ranked_scores, hits, alpha)?;
    let n = ranked_scores.len();
    let mut running = 0.0;
    let mut max = Extremum { es: 0.0, position: 0 };
    let mut min = Extremum { es: 0.0, position: 0 };
    let mut next = 0;

    for pos in hits {
        if *pos > next {
            running -= crate::f64_from_usize(pos - next) * weights.miss;
            min.lower(running, pos - 1);
        }
        running += weights.hit(*pos, hits.len());
        max.raise(running, *pos);
        // hits without weight extend the minimum
        min.lower(running, *pos);
        next = pos + 1;
    }
    if next < n {
        running -= crate::f64_from_usize(n - next) * weights.miss;
        min.lower(running, n - 1);
    }

    let difference = max.es - min.es.abs();
    Some(if difference > TIE_TOLERANCE {
        max
    } else if difference < -TIE_TOLERANCE {
        min
    } else {
        let to_start = max.position + 1;
        let to_end = n - 1 - min.position;
        match to_start.cmp(&to_end) {
            std::cmp::Ordering::Less => max,
            std::cmp::Ordering::Greater => min,
            std::cmp::Ordering::Equal => Extremum { es: 0.0, position: 0 },
        }
    })
}

/// The value of the running sum after every rank position
pub(crate) fn running_sum(ranked_scores: &[f64], hits: &[usize], alpha: f64) -> Vec<f64> {
    let Some(weights) = Weights::new(ranked_scores, hits, alpha) else {
        return vec![0.0; ranked_scores.len()];
    };
    let mut is_hit = vec![false; ranked_scores.len()];
    for pos in hits {
        is_hit[*pos] = true;
    }
    let mut running = 0.0;
    is_hit
        .iter()
        .enumerate()
        .map(|(pos, hit)| {
            if *hit {
                running += weights.hit(pos, hits.len());
            } else {
                running -= weights.miss;
            }
            running
        })
        .collect()
}

/// The hits that drive the enrichment score
///
/// For a positive score these are the hits up to and including the peak,
/// for a negative score the hits after the trough.
pub(crate) fn leading_edge(hits: &[usize], extremum: Extremum) -> &[usize] {
    if extremum.es > 0.0 {
        let end = hits.partition_point(|pos| *pos <= extremum.position);
        &hits[..end]
    } else if extremum.es < 0.0 {
        let start = hits.partition_point(|pos| *pos <= extremum.position);
        &hits[start..]
    } else {
        &[]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn scores(n: usize) -> Vec<f64> {
        (0..n).map(|i| 1.0 - crate::f64_from_usize(i) * 0.1).collect()
    }

    #[test]
    fn top_of_the_list() {
        let s = scores(10);
        let ext = enrichment_score(&s, &[0, 1, 2], 1.0).unwrap();
        assert!((ext.es - 1.0).abs() < 1e-12);
        assert_eq!(ext.position, 2);
        assert_eq!(leading_edge(&[0, 1, 2], ext), &[0, 1, 2]);
    }

    #[test]
    fn bottom_of_the_list() {
        let s = scores(10);
        let ext = enrichment_score(&s, &[7, 8, 9], 0.0).unwrap();
        assert!((ext.es + 1.0).abs() < 1e-12);
        assert_eq!(ext.position, 6);
        assert_eq!(leading_edge(&[7, 8, 9], ext), &[7, 8, 9]);
    }

    #[test]
    fn matches_the_full_running_sum() {
        let s = scores(12);
        let hits = [1, 4, 5, 10];
        for alpha in [0.0, 1.0, 2.0] {
            let ext = enrichment_score(&s, &hits, alpha).unwrap();
            let full = running_sum(&s, &hits, alpha);
            assert!(full.last().unwrap().abs() < 1e-12);

            let max = full.iter().copied().fold(0.0, f64::max);
            let min = full.iter().copied().fold(0.0, f64::min);
            let expected = if max > min.abs() { max } else { min };
            assert!((ext.es - expected).abs() < 1e-12);
            assert!((full[ext.position] - ext.es).abs() < 1e-12);
        }
    }

    #[test]
    fn unweighted_equals_classic_ks() {
        let s = scores(4);
        // +1/2, -1/2, +1/2 (=1/2), -1/2 (=0)
        let ext = enrichment_score(&s, &[0, 2], 0.0).unwrap();
        assert!((ext.es - 0.5).abs() < 1e-12);
        assert_eq!(ext.position, 0);
        assert_eq!(leading_edge(&[0, 2], ext), &[0]);
    }

    /// Negated scores in reverse order, with the hits at their mirrored positions
    fn reversed(scores: &[f64], hits: &[usize]) -> (Vec<f64>, Vec<usize>) {
        let n = scores.len();
        let scores = scores.iter().rev().map(|s| -s).collect();
        let mut hits: Vec<usize> = hits.iter().map(|pos| n - 1 - pos).collect();
        hits.sort_unstable();
        (scores, hits)
    }

    #[test]
    fn symmetric_set_has_no_direction() {
        for n in [4, 5, 9] {
            let s: Vec<f64> = (0..n)
                .map(|i| 1.0 - 2.0 * crate::f64_from_usize(i) / crate::f64_from_usize(n - 1))
                .collect();
            for alpha in [0.0, 1.0] {
                let ext = enrichment_score(&s, &[0, n - 1], alpha).unwrap();
                assert!(ext.es.abs() < 1e-12, "n = {n}, alpha = {alpha}");
                assert!(leading_edge(&[0, n - 1], ext).is_empty());
            }
        }

        // +1/2 at the top, -1/2 one step before the bottom
        let ext = enrichment_score(&[4.0, 1.0, -1.0, -4.0], &[0, 3], 1.0).unwrap();
        assert!(ext.es.abs() < 1e-12);
    }

    #[test]
    fn equal_extrema_prefer_the_closer_end() {
        // 1/3, 0, -1/3, 0, 1/3, 0: the maximum is one step from the top,
        // the minimum three steps from the bottom
        let s = [5.0, 4.0, 3.0, 2.0, 1.0, 0.5];
        let hits = [0, 3, 4];
        let ext = enrichment_score(&s, &hits, 0.0).unwrap();
        assert!((ext.es - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(ext.position, 0);
        assert_eq!(leading_edge(&hits, ext), &[0]);

        let (rs, rh) = reversed(&s, &hits);
        assert_eq!(rh, vec![1, 2, 5]);
        let ext = enrichment_score(&rs, &rh, 0.0).unwrap();
        assert!((ext.es + 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(ext.position, 4);
        assert_eq!(leading_edge(&rh, ext), &[5]);
    }

    #[test]
    fn reversal_negates_the_score() {
        let s = [5.0, 3.0, 3.0, 1.0, 0.0, -2.0, -2.0, -4.0];
        let n = s.len();
        let mut sets: Vec<Vec<usize>> = Vec::new();
        for a in 0..n {
            for b in a + 1..n {
                sets.push(vec![a, b]);
                for c in b + 1..n {
                    sets.push(vec![a, b, c]);
                }
            }
        }
        for alpha in [0.0, 1.0, 2.0] {
            for hits in &sets {
                let forward = enrichment_score(&s, hits, alpha).unwrap();
                let (rs, rh) = reversed(&s, hits);
                let backward = enrichment_score(&rs, &rh, alpha).unwrap();
                assert!(
                    (forward.es + backward.es).abs() < 1e-9,
                    "hits = {hits:?}, alpha = {alpha}: {} vs {}",
                    forward.es,
                    backward.es
                );
                assert_eq!(
                    leading_edge(hits, forward).len(),
                    leading_edge(&rh, backward).len()
                );
            }
        }
    }

    #[test]
    fn degenerate_sets() {
        assert!(enrichment_score(&scores(3), &[], 1.0).is_none());
        let all = enrichment_score(&scores(3), &[0, 1, 2], 1.0).unwrap();
        assert!((all.es - 1.0).abs() < 1e-12);
        assert_eq!(running_sum(&scores(2), &[], 1.0), vec![0.0, 0.0]);

        let zeros = vec![0.0; 4];
        let ext = enrichment_score(&zeros, &[0, 1], 1.0).unwrap();
        assert!((ext.es - 1.0).abs() < 1e-12);
    }
}
