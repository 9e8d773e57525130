//! Gene set enrichment analysis
//!
//! Genes are ranked by how well they separate two sample classes. For every
//! gene set, a weighted running sum walks down the ranking, increasing at
//! set members and decreasing otherwise. Its extremum is the enrichment
//! score (ES). The significance of the ES is estimated from permutations:
//!
//! - [`PermutationMode::ClassLabel`] shuffles the sample classes and re-ranks all genes
//! - [`PermutationMode::GeneOrder`] shuffles the scores between genes. This is much
//!   cheaper but ignores the correlation between genes.

use std::collections::HashSet;
use std::fmt::Debug;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, trace};

use crate::geneset::{passes_size_filter, validate_size_filter, GeneSetCollection};
use crate::masked::MaskedVec;
use crate::matcher::{IdentityMatcher, Matcher};
use crate::matrix::ExpressionMatrix;
use crate::progress::{check_cancelled, ProgressGrid, ProgressSink};
use crate::{cmp_f64, GeneSigError, GeneSigResult, Rejections};

mod null;
mod ranking;
mod running_sum;

pub use ranking::RankingMethod;

/// Number of permutations between two progress reports
const PERMUTATION_BATCH: usize = 50;

/// How the null distribution of enrichment scores is generated
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PermutationMode {
    /// Shuffle the sample classes and rescore every gene
    #[default]
    ClassLabel,
    /// Shuffle the scores between genes
    GeneOrder,
}

/// Parameters of a GSEA run
#[derive(Debug, Clone, PartialEq)]
pub struct GseaConfig {
    /// Minimum number of set genes present in the data
    pub min_size: usize,
    /// Maximum number of set genes present in the data
    pub max_size: usize,
    /// Minimum fraction of a set's genes present in the data
    pub min_fraction: f64,
    pub permutations: usize,
    pub permutation_mode: PermutationMode,
    pub ranking: RankingMethod,
    /// Exponent of the score weights of set members. `0` gives the classic
    /// Kolmogorov-Smirnov statistic
    pub alpha: f64,
    pub seed: u64,
    /// Genes with fewer values in either class are excluded
    pub min_values_per_class: usize,
    /// Report the running sum of every set
    pub keep_running_sum: bool,
    /// The class label value that scores positively. Defaults to the
    /// alphabetically first value
    pub positive_class: Option<String>,
}

impl Default for GseaConfig {
    fn default() -> Self {
        Self {
            min_size: 3,
            max_size: 1000,
            min_fraction: 0.1,
            permutations: 1000,
            permutation_mode: PermutationMode::default(),
            ranking: RankingMethod::default(),
            alpha: 1.0,
            seed: 0,
            min_values_per_class: 3,
            keep_running_sum: false,
            positive_class: None,
        }
    }
}

impl GseaConfig {
    #[must_use]
    pub fn with_size_limits(mut self, min_size: usize, max_size: usize) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_min_fraction(mut self, min_fraction: f64) -> Self {
        self.min_fraction = min_fraction;
        self
    }

    #[must_use]
    pub fn with_permutations(mut self, permutations: usize, mode: PermutationMode) -> Self {
        self.permutations = permutations;
        self.permutation_mode = mode;
        self
    }

    #[must_use]
    pub fn with_ranking(mut self, ranking: RankingMethod) -> Self {
        self.ranking = ranking;
        self
    }

    #[must_use]
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_min_values_per_class(mut self, min: usize) -> Self {
        self.min_values_per_class = min;
        self
    }

    #[must_use]
    pub fn with_running_sum(mut self, keep: bool) -> Self {
        self.keep_running_sum = keep;
        self
    }

    #[must_use]
    pub fn with_positive_class(mut self, class: &str) -> Self {
        self.positive_class = Some(class.to_string());
        self
    }

    /// Checks the parameters for consistency
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if the size filter is inconsistent,
    /// `permutations` or `min_values_per_class` is `0`, or `alpha` is
    /// negative or not finite
    pub fn validate(&self) -> GeneSigResult<()> {
        validate_size_filter(self.min_size, self.max_size, self.min_fraction)?;
        if self.permutations == 0 {
            return Err(GeneSigError::InvalidInput(
                "at least one permutation is required".to_string(),
            ));
        }
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(GeneSigError::InvalidInput(format!(
                "alpha must be a non-negative number, got {}",
                self.alpha
            )));
        }
        if self.min_values_per_class == 0 {
            return Err(GeneSigError::InvalidInput(
                "min_values_per_class must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The enrichment of one gene set
#[derive(Debug, Clone, PartialEq)]
pub struct GseaResult {
    /// Canonical name of the gene set, see [`crate::GeneSet::cname`]
    pub set_name: String,
    pub name: String,
    pub enrichment_score: f64,
    /// `NaN` if the null distribution has no score of the same sign
    pub normalized_es: f64,
    pub p_value: f64,
    pub fdr: f64,
    /// Number of genes in the set
    pub set_size: usize,
    /// Number of set genes present in the ranking
    pub matched_size: usize,
    /// Set genes that drive the enrichment score, in rank order
    pub leading_edge_genes: Vec<String>,
    /// One value per ranked gene, only kept on request
    pub running_sum: Option<Vec<f64>>,
}

/// All results of a GSEA run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GseaReport {
    /// Sorted by ascending p-value, then by set name
    pub results: Vec<GseaResult>,
    /// Genes in the input
    pub genes_total: usize,
    /// Genes in the ranking
    pub genes_ranked: usize,
    pub rejections: Rejections,
}

impl GseaReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GseaResult> {
        self.results.iter()
    }

    /// The result of the set with the canonical name `set_name`
    pub fn get(&self, set_name: &str) -> Option<&GseaResult> {
        self.results.iter().find(|r| r.set_name == set_name)
    }
}

/// Where the null scores come from
enum NullModel {
    GeneOrder,
    ClassLabel {
        rows: Vec<MaskedVec>,
        first: Vec<bool>,
    },
}

/// A gene set resolved to gene indices of the ranking
struct RankedSet {
    set_name: String,
    name: String,
    set_size: usize,
    genes: Vec<String>,
    indices: Vec<usize>,
}

/// Everything needed to score sets on the observed and the permuted data
struct Prepared {
    scores: Vec<f64>,
    sets: Vec<RankedSet>,
    null: NullModel,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Runs GSEA on expression data or pre-ranked gene lists
///
/// ```mermaid
/// graph LR
///     M[ExpressionMatrix] -->|RankingMethod| R[ranked genes]
///     S[GeneSetCollection] -->|project| R
///     R --> ES[enrichment scores]
///     R -->|permutations| N[null scores]
///     ES --> NES
///     N --> NES
///     NES --> FDR
/// ```
///
/// # Examples
///
/// ```
/// use genesig::{GeneSet, GeneSetCollection, NoProgress};
/// use genesig::gsea::{GseaConfig, GseaEngine, PermutationMode};
///
/// let ranking: Vec<(String, f64)> = (0..20)
///     .map(|i| (format!("g{i}"), 10.0 - f64::from(i)))
///     .collect();
/// let sets = GeneSetCollection::from_sets([
///     GeneSet::new(["db"], "top", ["g0", "g1", "g2", "g3"]),
/// ]).unwrap();
///
/// let config = GseaConfig::default()
///     .with_permutations(200, PermutationMode::GeneOrder)
///     .with_seed(42);
/// let engine = GseaEngine::new(config).unwrap();
/// let report = engine.gsea_preranked(&ranking, &sets, &NoProgress, None).unwrap();
///
/// let top = &report.results[0];
/// assert!((top.enrichment_score - 1.0).abs() < 1e-12);
/// assert_eq!(top.leading_edge_genes.len(), 4);
/// assert!(top.p_value < 0.05);
/// ```
pub struct GseaEngine {
    config: GseaConfig,
    matcher: Box<dyn Matcher>,
}

impl Debug for GseaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GseaEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GseaEngine {
    /// Creates an engine that uses gene tokens as they are
    ///
    /// Tokens are compared case-sensitively. For case-insensitive matching,
    /// pass an [`IdentityMatcher::new(false)`](crate::matcher::IdentityMatcher)
    /// targeted to the ranked genes to [`GseaEngine::with_matcher`].
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if the config is inconsistent
    pub fn new(config: GseaConfig) -> GeneSigResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            matcher: Box::new(IdentityMatcher::new(true)),
        })
    }

    /// Resolves data and gene set tokens with `matcher`
    #[must_use]
    pub fn with_matcher(mut self, matcher: Box<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn config(&self) -> &GseaConfig {
        &self.config
    }

    /// Runs GSEA on the samples of `matrix`, split into two classes by the label `class_key`
    ///
    /// The permutations run inside `pool`, or on the global rayon pool.
    ///
    /// # Errors
    ///
    /// - [`GeneSigError::InvalidInput`] if a sample lacks the label, the label does not
    ///   have exactly two values, or no gene has enough values in both classes
    /// - [`GeneSigError::Cancelled`] if `progress` requests it
    pub fn run(
        &self,
        matrix: &ExpressionMatrix,
        class_key: &str,
        collection: &GeneSetCollection,
        progress: &dyn ProgressSink,
        pool: Option<&ThreadPool>,
    ) -> GeneSigResult<GseaReport> {
        let first = self.class_indicator(matrix, class_key)?;
        let config = &self.config;

        let mut rejections = Rejections::default();
        let mut genes = Vec::new();
        let mut rows = Vec::new();
        for (gene, row) in matrix.genes().iter().zip(matrix.rows()) {
            let (in_first, in_second) = ranking::values_per_class(&row, &first);
            if in_first < config.min_values_per_class || in_second < config.min_values_per_class {
                trace!("{} has too few values ({} / {})", gene, in_first, in_second);
                rejections.missing_value += 1;
                continue;
            }
            genes.push(gene.clone());
            rows.push(row);
        }
        if genes.is_empty() {
            return Err(GeneSigError::InvalidInput(format!(
                "no gene has at least {} values in both classes",
                config.min_values_per_class
            )));
        }
        debug!(
            "Ranking {} of {} genes by {:?}",
            genes.len(),
            matrix.n_genes(),
            config.ranking
        );

        let scores = ranking::score_rows(config.ranking, &rows, &first);
        let null = match config.permutation_mode {
            PermutationMode::ClassLabel => NullModel::ClassLabel { rows, first },
            PermutationMode::GeneOrder => NullModel::GeneOrder,
        };
        self.analyze(matrix.n_genes(), genes, scores, null, rejections, collection, progress, pool)
    }

    /// Runs GSEA on a precomputed `(gene, score)` ranking
    ///
    /// Only gene order permutations are possible, the configured
    /// permutation mode is ignored. Genes without a finite score are
    /// excluded.
    ///
    /// # Errors
    ///
    /// - [`GeneSigError::InvalidInput`] if the ranking has no finite score
    /// - [`GeneSigError::Cancelled`] if `progress` requests it
    pub fn gsea_preranked(
        &self,
        ranking: &[(String, f64)],
        collection: &GeneSetCollection,
        progress: &dyn ProgressSink,
        pool: Option<&ThreadPool>,
    ) -> GeneSigResult<GseaReport> {
        if self.config.permutation_mode == PermutationMode::ClassLabel {
            debug!("Pre-ranked genes can only be permuted by gene order");
        }
        let mut rejections = Rejections::default();
        let mut genes = Vec::with_capacity(ranking.len());
        let mut scores = Vec::with_capacity(ranking.len());
        for (gene, score) in ranking {
            if score.is_finite() {
                genes.push(gene.clone());
                scores.push(*score);
            } else {
                rejections.missing_value += 1;
            }
        }
        if genes.is_empty() {
            return Err(GeneSigError::InvalidInput(
                "the ranking does not contain any finite score".to_string(),
            ));
        }
        self.analyze(
            ranking.len(),
            genes,
            scores,
            NullModel::GeneOrder,
            rejections,
            collection,
            progress,
            pool,
        )
    }

    /// `true` for every sample of the positive class
    fn class_indicator(
        &self,
        matrix: &ExpressionMatrix,
        class_key: &str,
    ) -> GeneSigResult<Vec<bool>> {
        let groups = matrix.group_by_label(class_key)?;
        if groups.len() != 2 {
            return Err(GeneSigError::InvalidInput(format!(
                "label '{class_key}' must have exactly two values, found {}",
                groups.len()
            )));
        }
        let positive = match &self.config.positive_class {
            Some(class) if groups.contains_key(class) => class.clone(),
            Some(class) => {
                return Err(GeneSigError::InvalidInput(format!(
                    "no sample has '{class_key}' = '{class}'"
                )))
            }
            None => groups.keys().next().cloned().unwrap_or_default(),
        };
        let mut first = vec![false; matrix.n_samples()];
        for idx in groups.get(&positive).map(Vec::as_slice).unwrap_or_default() {
            first[*idx] = true;
        }
        Ok(first)
    }

    #[allow(clippy::too_many_arguments)]
    fn analyze(
        &self,
        genes_total: usize,
        genes: Vec<String>,
        scores: Vec<f64>,
        null: NullModel,
        mut rejections: Rejections,
        collection: &GeneSetCollection,
        progress: &dyn ProgressSink,
        pool: Option<&ThreadPool>,
    ) -> GeneSigResult<GseaReport> {
        let matched = self.matcher.partition(&genes);
        rejections.unknown += matched.unknown.len();
        rejections.ambiguous += matched.ambiguous.len();

        let sets = self.ranked_sets(&genes, collection, &mut rejections);
        debug!(
            "Scoring {} gene sets over {} ranked genes",
            sets.len(),
            genes.len()
        );
        let prepared = Prepared { scores, sets, null };
        let genes_ranked = genes.len();

        let results = match pool {
            Some(pool) => pool.install(|| self.score_sets(&prepared, &genes, progress)),
            None => self.score_sets(&prepared, &genes, progress),
        }?;

        Ok(GseaReport {
            results,
            genes_total,
            genes_ranked,
            rejections,
        })
    }

    fn ranked_sets(
        &self,
        genes: &[String],
        collection: &GeneSetCollection,
        rejections: &mut Rejections,
    ) -> Vec<RankedSet> {
        let config = &self.config;
        collection
            .project(self.matcher.as_ref(), genes)
            .into_iter()
            .filter(|projected| {
                let keep = passes_size_filter(
                    projected.indices().len(),
                    projected.set().len(),
                    config.min_size,
                    config.max_size,
                    config.min_fraction,
                );
                if !keep {
                    trace!(
                        "{} failed the size filter ({} of {} genes)",
                        projected.set().cname(),
                        projected.indices().len(),
                        projected.set().len()
                    );
                    rejections.failed_size_filter += 1;
                }
                keep
            })
            .map(|projected| RankedSet {
                set_name: projected.set().cname(),
                name: projected.set().name().to_string(),
                set_size: projected.set().len(),
                genes: projected.genes().to_vec(),
                indices: projected.indices().to_vec(),
            })
            .collect()
    }

    /// Enrichment scores of all sets for one assignment of scores to genes
    fn set_scores(&self, scores: &[f64], sets: &[RankedSet]) -> Vec<f64> {
        let order = ranking::rank_order(scores);
        let positions = ranking::positions(&order);
        let ranked: Vec<f64> = order.iter().map(|gene| scores[*gene]).collect();
        sets.iter()
            .map(|set| {
                let hits = hit_positions(&set.indices, &positions);
                running_sum::enrichment_score(&ranked, &hits, self.config.alpha)
                    .map_or(0.0, |ext| ext.es)
            })
            .collect()
    }

    /// The gene scores of the `i`-th permutation
    fn permuted_scores(&self, prepared: &Prepared, i: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(i as u64));
        match &prepared.null {
            NullModel::GeneOrder => {
                let mut scores = prepared.scores.clone();
                scores.shuffle(&mut rng);
                scores
            }
            NullModel::ClassLabel { rows, first } => {
                let mut labels = first.clone();
                labels.shuffle(&mut rng);
                ranking::score_rows(self.config.ranking, rows, &labels)
            }
        }
    }

    /// Null enrichment scores, indexed by set and then by permutation
    fn null_scores(
        &self,
        prepared: &Prepared,
        progress: &dyn ProgressSink,
    ) -> GeneSigResult<Vec<Vec<f64>>> {
        let permutations = self.config.permutations;
        let mut null = vec![Vec::with_capacity(permutations); prepared.sets.len()];
        let mut grid = ProgressGrid::new(progress, permutations);
        let mut start = 0;
        while start < permutations {
            let end = (start + PERMUTATION_BATCH).min(permutations);
            let batch: Vec<Vec<f64>> = (start..end)
                .into_par_iter()
                .map(|i| self.set_scores(&self.permuted_scores(prepared, i), &prepared.sets))
                .collect();
            for perm in batch {
                for (set_null, es) in null.iter_mut().zip(perm) {
                    set_null.push(es);
                }
            }
            trace!("Finished permutations {}..{}", start, end);
            grid.tick(end)?;
            start = end;
        }
        Ok(null)
    }

    fn score_sets(
        &self,
        prepared: &Prepared,
        genes: &[String],
        progress: &dyn ProgressSink,
    ) -> GeneSigResult<Vec<GseaResult>> {
        check_cancelled(progress)?;
        let order = ranking::rank_order(&prepared.scores);
        let positions = ranking::positions(&order);
        let ranked: Vec<f64> = order.iter().map(|gene| prepared.scores[*gene]).collect();

        let null_es = self.null_scores(prepared, progress)?;

        let mut results = Vec::with_capacity(prepared.sets.len());
        let mut pooled_null = Vec::new();
        for (set, set_null) in prepared.sets.iter().zip(null_es) {
            let hits = hit_positions(&set.indices, &positions);
            let extremum = running_sum::enrichment_score(&ranked, &hits, self.config.alpha);
            let es = extremum.map_or(0.0, |ext| ext.es);
            let normalized = null::normalize(es, &set_null);
            pooled_null.extend(normalized.null_nes);

            let leading_edge_genes = extremum
                .map(|ext| running_sum::leading_edge(&hits, ext))
                .unwrap_or_default()
                .iter()
                .map(|pos| genes[order[*pos]].clone())
                .collect();

            results.push(GseaResult {
                set_name: set.set_name.clone(),
                name: set.name.clone(),
                enrichment_score: es,
                normalized_es: normalized.nes,
                p_value: normalized.p_value,
                fdr: f64::NAN,
                set_size: set.set_size,
                matched_size: set.indices.len(),
                leading_edge_genes,
                running_sum: self
                    .config
                    .keep_running_sum
                    .then(|| running_sum::running_sum(&ranked, &hits, self.config.alpha)),
            });
        }

        let observed: Vec<f64> = results.iter().map(|r| r.normalized_es).collect();
        for (res, q) in results.iter_mut().zip(null::fdr(&observed, &pooled_null)) {
            res.fdr = q;
        }
        results.sort_by(|a, b| {
            cmp_f64(a.p_value, b.p_value).then_with(|| a.set_name.cmp(&b.set_name))
        });
        Ok(results)
    }
}

/// Sorted rank positions of the gene indices
fn hit_positions(indices: &[usize], positions: &[usize]) -> Vec<usize> {
    let mut hits: Vec<usize> = indices.iter().map(|idx| positions[*idx]).collect();
    hits.sort_unstable();
    hits
}

/// The distinct members of all leading edges
pub fn leading_edge_union(results: &[GseaResult]) -> HashSet<&str> {
    results
        .iter()
        .flat_map(|r| r.leading_edge_genes.iter().map(String::as_str))
        .collect()
}
