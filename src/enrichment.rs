//! Over-representation analysis of a gene cluster
//!
//! For every candidate GO term or gene set, the [`EnrichmentEngine`] counts
//! how many of the cluster genes are annotated to it and calculates the
//! right-tail hypergeometric p-value of observing at least that many:
//!
//! - `N`: number of reference genes
//! - `m`: reference genes annotated to the term
//! - `n`: cluster genes
//! - `k`: cluster genes annotated to the term
//!
//! P-values are corrected for multiple testing with Benjamini-Hochberg.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Debug;

use tracing::{debug, trace};

use crate::annotations::EvidenceMask;
use crate::geneset::{passes_size_filter, validate_size_filter, GeneSetCollection};
use crate::matcher::{IdentityMatcher, Matcher};
use crate::ontology::GoGraph;
use crate::progress::{ProgressGrid, ProgressSink};
use crate::stats::{fdr_bh, hypergeometric_pvalue};
use crate::term::{GoTermId, Namespace, TermSet};
use crate::{cmp_f64, f64_from_usize, GeneSigError, GeneSigResult, Rejections};

/// The annotation source to test the cluster against
#[derive(Debug, Clone, Copy)]
pub enum EnrichmentSource<'a> {
    /// GO terms and their gene annotations
    Go(&'a GoGraph),
    /// Predefined gene sets
    GeneSets(&'a GeneSetCollection),
}

impl<'a> From<&'a GoGraph> for EnrichmentSource<'a> {
    fn from(graph: &'a GoGraph) -> Self {
        EnrichmentSource::Go(graph)
    }
}

impl<'a> From<&'a GeneSetCollection> for EnrichmentSource<'a> {
    fn from(collection: &'a GeneSetCollection) -> Self {
        EnrichmentSource::GeneSets(collection)
    }
}

/// What to do if a p-value is too small to be represented
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnderflowPolicy {
    /// Replace it with `f64::MIN_POSITIVE` and flag the result
    #[default]
    Clamp,
    /// Abort with [`GeneSigError::NumericUnderflow`]
    Fail,
}

/// Parameters of an enrichment analysis
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentConfig {
    /// Minimum number of reference genes annotated to a term
    pub min_size: usize,
    /// Maximum number of reference genes annotated to a term
    pub max_size: usize,
    /// Minimum fraction of a term's genes that must be in the reference
    pub min_fraction: f64,
    /// Annotations with other evidence codes are ignored
    pub evidence: EvidenceMask,
    /// Only test terms of this namespace, `None` tests all
    pub namespace: Option<Namespace>,
    /// Count genes of descendant terms as annotated to a term
    pub propagate: bool,
    /// Calculate Benjamini-Hochberg FDR values, otherwise they are `NaN`
    pub fdr: bool,
    /// Only test these terms
    pub slims_only: Option<Vec<GoTermId>>,
    pub underflow: UnderflowPolicy,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            min_size: 3,
            max_size: 1000,
            min_fraction: 0.1,
            evidence: EvidenceMask::all(),
            namespace: Some(Namespace::BiologicalProcess),
            propagate: true,
            fdr: true,
            slims_only: None,
            underflow: UnderflowPolicy::default(),
        }
    }
}

impl EnrichmentConfig {
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
    pub fn with_evidence(mut self, evidence: EvidenceMask) -> Self {
        self.evidence = evidence;
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: Option<Namespace>) -> Self {
        self.namespace = namespace;
        self
    }

    #[must_use]
    pub fn with_propagation(mut self, propagate: bool) -> Self {
        self.propagate = propagate;
        self
    }

    #[must_use]
    pub fn with_fdr(mut self, fdr: bool) -> Self {
        self.fdr = fdr;
        self
    }

    /// Restricts the tested GO terms to `slims`
    #[must_use]
    pub fn with_slims(mut self, slims: Vec<GoTermId>) -> Self {
        self.slims_only = Some(slims);
        self
    }

    #[must_use]
    pub fn with_underflow(mut self, underflow: UnderflowPolicy) -> Self {
        self.underflow = underflow;
        self
    }

    /// Checks the parameters for consistency
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if `min_size > max_size` or
    /// `min_fraction` is outside of `[0, 1]`
    pub fn validate(&self) -> GeneSigResult<()> {
        validate_size_filter(self.min_size, self.max_size, self.min_fraction)
    }
}

/// The over-representation of one GO term or gene set
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    /// GO id (`GO:0006915`) or the canonical name of the gene set
    pub entity_id: String,
    pub name: String,
    /// Sorted cluster genes annotated to the entity (`k` = its length)
    pub cluster_hits: Vec<String>,
    /// `n`
    pub cluster_size: usize,
    /// `m`
    pub reference_hits: usize,
    /// `N`
    pub reference_size: usize,
    /// All genes annotated to the entity, in or outside the reference
    pub set_size: usize,
    pub p_value: f64,
    /// Benjamini-Hochberg adjusted p-value, `NaN` if disabled
    pub fdr: f64,
    /// `(k / n) / (m / N)`
    pub fold_enrichment: f64,
    /// `true` if the p-value underflowed and was clamped
    pub underflow: bool,
}

impl EnrichmentResult {
    /// `k`
    pub fn hits(&self) -> usize {
        self.cluster_hits.len()
    }
}

/// All results of an enrichment analysis with matching statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentReport {
    /// Sorted by ascending p-value
    pub results: Vec<EnrichmentResult>,
    /// Distinct cluster tokens
    pub cluster_total: usize,
    /// Cluster genes used in the analysis
    pub cluster_matched: usize,
    /// Distinct reference tokens
    pub reference_total: usize,
    /// Reference genes used in the analysis
    pub reference_matched: usize,
    /// Matched cluster genes that are not part of the reference
    pub outside_reference: usize,
    pub rejections: Rejections,
}

impl EnrichmentReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EnrichmentResult> {
        self.results.iter()
    }

    /// Retains only results with `p_value <= max`
    #[must_use]
    pub fn filter_by_p_value(mut self, max: f64) -> Self {
        self.results.retain(|r| r.p_value <= max);
        self
    }

    /// Retains only results with `fdr <= max`
    #[must_use]
    pub fn filter_by_fdr(mut self, max: f64) -> Self {
        self.results.retain(|r| r.fdr <= max);
        self
    }

    /// Retains only results with at least `min` cluster hits
    #[must_use]
    pub fn filter_by_frequency(mut self, min: usize) -> Self {
        self.results.retain(|r| r.hits() >= min);
        self
    }

    /// Retains only results with at least `min` annotated reference genes
    #[must_use]
    pub fn filter_by_ref_frequency(mut self, min: usize) -> Self {
        self.results.retain(|r| r.reference_hits >= min);
        self
    }

    /// Orders the results by descending fold enrichment
    pub fn sort_by_fold_enrichment(&mut self) {
        self.results.sort_by(|a, b| {
            cmp_f64(b.fold_enrichment, a.fold_enrichment)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
    }
}

impl<'a> IntoIterator for &'a EnrichmentReport {
    type Item = &'a EnrichmentResult;
    type IntoIter = std::slice::Iter<'a, EnrichmentResult>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Hypergeometric enrichment of a gene cluster against a reference
///
/// # Examples
///
/// ```
/// use genesig::{GeneSet, GeneSetCollection, NoProgress};
/// use genesig::enrichment::{EnrichmentConfig, EnrichmentEngine};
///
/// let sets = GeneSetCollection::from_sets([
///     GeneSet::new(["pathways"], "p1", ["g1", "g2", "g3"]),
///     GeneSet::new(["pathways"], "p2", ["g4", "g5", "g6", "g7"]),
/// ]).unwrap();
/// let reference: Vec<String> = (1..=10).map(|i| format!("g{i}")).collect();
/// let cluster: Vec<String> = ["g1", "g2", "g3"].iter().map(|s| s.to_string()).collect();
///
/// let engine = EnrichmentEngine::new(EnrichmentConfig::default()).unwrap();
/// let report = engine.enrich((&sets).into(), &cluster, &reference, &NoProgress).unwrap();
///
/// let best = &report.results[0];
/// assert_eq!(best.hits(), 3);
/// assert!((best.p_value - 1.0 / 120.0).abs() < 1e-12);
/// ```
pub struct EnrichmentEngine {
    config: EnrichmentConfig,
    matcher: Box<dyn Matcher>,
}

impl Debug for EnrichmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The matched cluster and reference genes
struct Universe {
    cluster: BTreeSet<String>,
    reference: BTreeSet<String>,
}

impl EnrichmentEngine {
    /// Creates an engine that uses gene tokens as they are
    ///
    /// Tokens are compared case-sensitively, `"BRCA1"` and `"brca1"` are
    /// different genes. For case-insensitive matching, pass an
    /// [`IdentityMatcher::new(false)`](crate::matcher::IdentityMatcher) or a
    /// case-insensitive [`AliasMatcher`](crate::matcher::AliasMatcher) to
    /// [`EnrichmentEngine::with_matcher`], targeted to the annotated genes.
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if the config is inconsistent
    pub fn new(config: EnrichmentConfig) -> GeneSigResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            matcher: Box::new(IdentityMatcher::new(true)),
        })
    }

    /// Resolves cluster, reference and gene set tokens with `matcher`
    ///
    /// The canonical identifiers must be the gene identifiers of the annotation source.
    #[must_use]
    pub fn with_matcher(mut self, matcher: Box<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Tests every candidate term or gene set for over-representation in `cluster`
    ///
    /// Cluster genes that are not part of the reference are dropped.
    /// Only GO terms annotated to at least one cluster gene (or one of
    /// their descendants, if propagation is enabled) are candidates.
    ///
    /// # Errors
    ///
    /// - [`GeneSigError::InvalidInput`] if the reference is empty or smaller than the cluster
    /// - [`GeneSigError::NumericUnderflow`] if a p-value underflows and the policy
    ///   is [`UnderflowPolicy::Fail`]
    /// - [`GeneSigError::Cancelled`] if `progress` requests it
    pub fn enrich(
        &self,
        source: EnrichmentSource<'_>,
        cluster: &[String],
        reference: &[String],
        progress: &dyn ProgressSink,
    ) -> GeneSigResult<EnrichmentReport> {
        let cluster_match = self.matcher.partition(cluster);
        let reference_match = self.matcher.partition(reference);

        let mut report = EnrichmentReport {
            cluster_total: cluster_match.total(),
            reference_total: reference_match.total(),
            ..EnrichmentReport::default()
        };
        report.rejections.unknown = cluster_match.unknown.len() + reference_match.unknown.len();
        report.rejections.ambiguous =
            cluster_match.ambiguous.len() + reference_match.ambiguous.len();

        let reference: BTreeSet<String> = reference_match.canonicals().into_iter().collect();
        let cluster: BTreeSet<String> = cluster_match.canonicals().into_iter().collect();
        if reference.is_empty() {
            return Err(GeneSigError::InvalidInput(
                "the reference does not contain any known gene".to_string(),
            ));
        }
        if reference.len() < cluster.len() {
            return Err(GeneSigError::InvalidInput(format!(
                "the reference ({} genes) is smaller than the cluster ({} genes)",
                reference.len(),
                cluster.len()
            )));
        }

        let before = cluster.len();
        let cluster: BTreeSet<String> = cluster.intersection(&reference).cloned().collect();
        report.outside_reference = before - cluster.len();
        report.cluster_matched = cluster.len();
        report.reference_matched = reference.len();
        if report.outside_reference > 0 {
            debug!("Dropped {} cluster genes outside of the reference", report.outside_reference);
        }
        if cluster.is_empty() {
            debug!("Empty cluster, nothing to test");
            return Ok(report);
        }

        let universe = Universe { cluster, reference };
        let mut results = match source {
            EnrichmentSource::Go(graph) => {
                self.enrich_go(graph, &universe, &mut report.rejections, progress)?
            }
            EnrichmentSource::GeneSets(sets) => {
                self.enrich_sets(sets, &universe, &mut report.rejections, progress)?
            }
        };

        results.sort_by(|a, b| {
            cmp_f64(a.p_value, b.p_value).then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        if self.config.fdr {
            let pvalues: Vec<f64> = results.iter().map(|r| r.p_value).collect();
            for (res, q) in results.iter_mut().zip(fdr_bh(&pvalues)) {
                res.fdr = q;
            }
        }
        debug!(
            "Tested {} entities, {} failed the size filter",
            results.len(),
            report.rejections.failed_size_filter
        );
        report.results = results;
        Ok(report)
    }

    fn enrich_go(
        &self,
        graph: &GoGraph,
        universe: &Universe,
        rejections: &mut Rejections,
        progress: &dyn ProgressSink,
    ) -> GeneSigResult<Vec<EnrichmentResult>> {
        let config = &self.config;
        let reference: HashSet<u32> = universe
            .reference
            .iter()
            .filter_map(|g| graph.gene_index(g))
            .collect();
        let cluster: HashSet<u32> = universe
            .cluster
            .iter()
            .filter_map(|g| graph.gene_index(g))
            .collect();

        let candidates = self.candidate_terms(graph, &cluster)?;
        debug!("Testing {} candidate GO terms", candidates.len());

        let mut grid = ProgressGrid::new(progress, candidates.len());
        let mut results = Vec::new();
        for (done, term) in candidates.iter().enumerate() {
            grid.tick(done)?;
            let genes = graph.term_genes(term, config.evidence, config.namespace, config.propagate);
            let set_size = genes.len();
            let annotated: Vec<u32> = genes.into_iter().filter(|g| reference.contains(g)).collect();
            let internal = graph.internal(term);
            if !passes_size_filter(
                annotated.len(),
                set_size,
                config.min_size,
                config.max_size,
                config.min_fraction,
            ) {
                trace!(
                    "{} failed the size filter ({} of {} genes)",
                    internal.id(),
                    annotated.len(),
                    set_size
                );
                rejections.failed_size_filter += 1;
                continue;
            }
            let mut hits: Vec<String> = annotated
                .iter()
                .filter(|g| cluster.contains(g))
                .map(|g| graph.gene_name(*g).to_string())
                .collect();
            hits.sort_unstable();
            results.push(self.score(
                internal.id().to_string(),
                internal.name().to_string(),
                hits,
                annotated.len(),
                set_size,
                universe,
            )?);
        }
        grid.tick(candidates.len())?;
        Ok(results)
    }

    /// Terms directly annotated to a cluster gene and, with propagation, all their ancestors
    fn candidate_terms(&self, graph: &GoGraph, cluster: &HashSet<u32>) -> GeneSigResult<TermSet> {
        let config = &self.config;
        let in_namespace =
            |term: u32| config.namespace.map_or(true, |ns| graph.internal(term).namespace() == ns);

        let mut direct = TermSet::new();
        for gene in cluster {
            for (term, evidence) in graph.gene_terms(*gene) {
                if config.evidence.contains(*evidence) && in_namespace(*term) {
                    direct.insert(*term);
                }
            }
        }

        let mut candidates = if config.propagate {
            let mut all = TermSet::new();
            for term in direct.iter() {
                all.extend_from(graph.ancestor_set(term));
            }
            all.iter().filter(|t| in_namespace(*t)).collect()
        } else {
            direct
        };

        if let Some(slims) = &config.slims_only {
            let mut allowed = HashSet::with_capacity(slims.len());
            for id in slims {
                let idx = graph.index_of(*id).ok_or_else(|| {
                    GeneSigError::InvalidInput(format!("slim term {id} does not exist"))
                })?;
                allowed.insert(idx);
            }
            candidates = candidates.iter().filter(|t| allowed.contains(t)).collect();
        }
        Ok(candidates)
    }

    fn enrich_sets(
        &self,
        sets: &GeneSetCollection,
        universe: &Universe,
        rejections: &mut Rejections,
        progress: &dyn ProgressSink,
    ) -> GeneSigResult<Vec<EnrichmentResult>> {
        let config = &self.config;
        let mut grid = ProgressGrid::new(progress, sets.len());
        let mut results = Vec::new();
        for (done, set) in sets.iter().enumerate() {
            grid.tick(done)?;
            let annotated: BTreeSet<String> = set
                .genes()
                .iter()
                .filter_map(|g| self.matcher.umatch(g))
                .filter(|g| universe.reference.contains(g))
                .collect();
            if !passes_size_filter(
                annotated.len(),
                set.len(),
                config.min_size,
                config.max_size,
                config.min_fraction,
            ) {
                trace!(
                    "{} failed the size filter ({} of {} genes)",
                    set.cname(),
                    annotated.len(),
                    set.len()
                );
                rejections.failed_size_filter += 1;
                continue;
            }
            let hits: Vec<String> = annotated
                .iter()
                .filter(|g| universe.cluster.contains(*g))
                .cloned()
                .collect();
            results.push(self.score(
                set.cname(),
                set.name().to_string(),
                hits,
                annotated.len(),
                set.len(),
                universe,
            )?);
        }
        grid.tick(sets.len())?;
        Ok(results)
    }

    fn score(
        &self,
        entity_id: String,
        name: String,
        cluster_hits: Vec<String>,
        reference_hits: usize,
        set_size: usize,
        universe: &Universe,
    ) -> GeneSigResult<EnrichmentResult> {
        let k = cluster_hits.len();
        let n = universe.cluster.len();
        let big_n = universe.reference.len();

        let mut p_value =
            hypergeometric_pvalue(k as u64, big_n as u64, reference_hits as u64, n as u64);
        let mut underflow = false;
        if p_value <= 0.0 {
            match self.config.underflow {
                UnderflowPolicy::Clamp => {
                    debug!("p-value of {} underflowed, clamping", entity_id);
                    p_value = f64::MIN_POSITIVE;
                    underflow = true;
                }
                UnderflowPolicy::Fail => return Err(GeneSigError::NumericUnderflow),
            }
        }

        let fold_enrichment = if reference_hits == 0 || n == 0 {
            0.0
        } else {
            (f64_from_usize(k) / f64_from_usize(n))
                / (f64_from_usize(reference_hits) / f64_from_usize(big_n))
        };

        Ok(EnrichmentResult {
            entity_id,
            name,
            cluster_hits,
            cluster_size: n,
            reference_hits,
            reference_size: big_n,
            set_size,
            p_value,
            fdr: f64::NAN,
            fold_enrichment,
            underflow,
        })
    }
}
