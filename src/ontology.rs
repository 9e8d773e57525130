use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use tracing::{debug, trace};

use crate::annotations::{AnnotationRecord, EvidenceCode, EvidenceMask};
use crate::term::internal::GoTermInternal;
use crate::term::{GoTerm, GoTermId, Namespace, Relation, TermRecord, TermSet};
use crate::{GeneSigError, GeneSigResult};

mod builder;
mod termarena;
use builder::Builder;
use termarena::Arena;

/// The category of a problem found while loading a [`GoGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// A term id occurs more than once, the first definition is kept
    DuplicateTerm,
    /// An alt-id collides with another term's primary or alt-id
    UnresolvableAltId,
    /// A parent reference does not resolve, the edge is dropped
    MissingParent,
    /// A parent edge closes a cycle, the edge is dropped
    Cycle,
    /// A namespace has no root term or more than one
    RootCount,
    /// An annotation refers to a term that does not exist
    AbsentTerm,
    /// A `NOT`-qualified annotation was skipped
    NotQualified,
}

/// Problems found while loading a [`GoGraph`]
///
/// Each issue is kept as a [`GeneSigError::OntologyIntegrity`] together with its category.
/// The offending records are dropped, the remaining graph is fully usable.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadIssues {
    issues: Vec<(IssueKind, GeneSigError)>,
}

impl LoadIssues {
    pub(crate) fn push(&mut self, kind: IssueKind, message: String) {
        trace!("{:?}: {}", kind, message);
        self.issues
            .push((kind, GeneSigError::OntologyIntegrity(message)));
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// The number of issues of the given kind
    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IssueKind, &GeneSigError)> {
        self.issues.iter().map(|(kind, err)| (*kind, err))
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// The Gene Ontology graph together with its gene annotations
///
/// Terms are stored in an arena and reference each other by index. The
/// ancestor and descendant closures of each term are computed on first
/// use and cached, so a loaded graph can be shared across threads and
/// queried concurrently.
///
/// ```mermaid
/// erDiagram
///     GOGRAPH ||--|{ TERM : contains
///     TERM ||--o{ TERM : "is_a / part_of / regulates"
///     TERM }o--o{ GENE : "annotated (evidence)"
///     TERM {
///         GoTermId id
///         GoTermIds alt_ids
///         str name
///         Namespace namespace
///     }
/// ```
///
/// # Examples
///
/// ```
/// use genesig::{
///     AnnotationRecord, EvidenceCode, EvidenceMask, GoGraph, GoTermId, Namespace, Relation,
///     TermRecord,
/// };
///
/// let bp = Namespace::BiologicalProcess;
/// let terms = vec![
///     TermRecord::new(8150u32, "biological_process", bp),
///     TermRecord::new(9987u32, "cellular process", bp).with_parent(8150u32, Relation::IsA),
///     TermRecord::new(6915u32, "apoptotic process", bp)
///         .with_parent(9987u32, Relation::IsA)
///         .with_alt_id(6917u32),
/// ];
/// let annotations = vec![
///     AnnotationRecord::new("CASP3", 6917u32, EvidenceCode::Ida),
///     AnnotationRecord::new("TP53", 9987u32, EvidenceCode::Iea),
/// ];
/// let (graph, issues) = GoGraph::load(terms, annotations);
/// assert!(issues.is_empty());
///
/// // alt-ids resolve to the primary id
/// assert_eq!(graph.resolve_id(6917u32.into()), Some(GoTermId::from(6915u32)));
///
/// // annotations propagate to all ancestors
/// let genes = graph
///     .genes_annotated_to(8150u32.into(), EvidenceMask::all(), Some(bp), true)
///     .unwrap();
/// assert_eq!(genes.into_iter().collect::<Vec<_>>(), vec!["CASP3", "TP53"]);
///
/// let genes = graph
///     .genes_annotated_to(8150u32.into(), EvidenceCode::Ida.into(), Some(bp), true)
///     .unwrap();
/// assert_eq!(genes.len(), 1);
/// ```
#[derive(Debug)]
pub struct GoGraph {
    terms: Arena,
    alt_ids: HashMap<GoTermId, u32>,
    genes: Vec<String>,
    gene_index: HashMap<String, u32>,
    gene_terms: Vec<Vec<(u32, EvidenceCode)>>,
}

impl GoGraph {
    /// Builds the graph from parsed terms and annotations
    ///
    /// Loading never fails: records that violate the graph integrity are
    /// dropped and reported in the returned [`LoadIssues`]. The caller
    /// decides whether to proceed with the graph.
    ///
    /// - Parent references and annotations are resolved through alt-ids
    /// - Parent references to absent terms are dropped
    /// - Edges closing a cycle are dropped
    /// - `NOT`-qualified annotations are skipped
    ///
    /// # Examples
    ///
    /// ```
    /// use genesig::{GoGraph, Namespace, Relation, TermRecord};
    /// use genesig::ontology::IssueKind;
    ///
    /// let mf = Namespace::MolecularFunction;
    /// let terms = vec![
    ///     TermRecord::new(3674u32, "molecular_function", mf),
    ///     TermRecord::new(5488u32, "binding", mf)
    ///         .with_parent(3674u32, Relation::IsA)
    ///         .with_parent(9999999u32, Relation::IsA),
    /// ];
    /// let (graph, issues) = GoGraph::load(terms, vec![]);
    /// assert_eq!(graph.len(), 2);
    /// assert_eq!(issues.count(IssueKind::MissingParent), 1);
    /// ```
    pub fn load<T, A>(terms: T, annotations: A) -> (GoGraph, LoadIssues)
    where
        T: IntoIterator<Item = TermRecord>,
        A: IntoIterator<Item = AnnotationRecord>,
    {
        let mut builder = Builder::new();
        for term in terms {
            builder.add_term(term);
        }
        let mut builder = builder.connect_all_terms();
        for annotation in annotations {
            builder.add_annotation(annotation);
        }
        builder.build()
    }

    /// The number of terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.len() == 0
    }

    /// The number of distinct annotated genes
    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    /// Returns `true` if the gene has at least one annotation
    pub fn has_gene(&self, gene: &str) -> bool {
        self.gene_index.contains_key(gene)
    }

    /// All annotated genes, in order of first appearance
    pub fn genes(&self) -> impl Iterator<Item = &str> {
        self.genes.iter().map(String::as_str)
    }

    /// Returns the primary id of `id`
    ///
    /// `id` can be a primary id or an alt-id. Returns `None` if the
    /// id is unknown.
    pub fn resolve_id(&self, id: GoTermId) -> Option<GoTermId> {
        self.index_of(id).map(|idx| self.internal(idx).id())
    }

    /// Returns the term, `id` can be a primary id or an alt-id
    pub fn term<I: Into<GoTermId>>(&self, id: I) -> Option<GoTerm<'_>> {
        self.index_of(id.into()).map(|idx| GoTerm::new(self, idx))
    }

    /// Iterates all terms in load order
    pub fn iter(&self) -> impl Iterator<Item = GoTerm<'_>> {
        self.terms.indices().map(move |idx| GoTerm::new(self, idx))
    }

    /// The root terms, at most one per namespace unless the input was inconsistent
    pub fn roots(&self) -> Vec<GoTerm<'_>> {
        self.iter()
            .filter(|term| term.is_root() && !term.obsolete())
            .collect()
    }

    /// The ids of the direct parents of the term, together with the relation
    ///
    /// # Errors
    ///
    /// [`GeneSigError::DoesNotExist`] if the term is unknown
    pub fn parents(&self, id: GoTermId) -> GeneSigResult<Vec<(GoTermId, Relation)>> {
        let idx = self.index_of(id).ok_or(GeneSigError::DoesNotExist)?;
        Ok(self
            .internal(idx)
            .parents()
            .iter()
            .map(|(p, rel)| (self.internal(*p).id(), *rel))
            .collect())
    }

    /// The ids of the direct children of the term, together with the relation
    ///
    /// # Errors
    ///
    /// [`GeneSigError::DoesNotExist`] if the term is unknown
    pub fn children(&self, id: GoTermId) -> GeneSigResult<Vec<(GoTermId, Relation)>> {
        let idx = self.index_of(id).ok_or(GeneSigError::DoesNotExist)?;
        Ok(self
            .internal(idx)
            .children()
            .iter()
            .map(|(c, rel)| (self.internal(*c).id(), *rel))
            .collect())
    }

    /// All ancestors of the term, including the term itself
    ///
    /// The ids are sorted and unique.
    ///
    /// # Errors
    ///
    /// [`GeneSigError::DoesNotExist`] if the term is unknown
    pub fn ancestors(&self, id: GoTermId) -> GeneSigResult<Vec<GoTermId>> {
        let idx = self.index_of(id).ok_or(GeneSigError::DoesNotExist)?;
        Ok(self.sorted_ids(self.ancestor_set(idx)))
    }

    /// All descendants of the term, including the term itself
    ///
    /// The ids are sorted and unique.
    ///
    /// # Errors
    ///
    /// [`GeneSigError::DoesNotExist`] if the term is unknown
    pub fn descendants(&self, id: GoTermId) -> GeneSigResult<Vec<GoTermId>> {
        let idx = self.index_of(id).ok_or(GeneSigError::DoesNotExist)?;
        Ok(self.sorted_ids(self.descendant_set(idx)))
    }

    /// The union of the ancestors of all terms
    ///
    /// # Errors
    ///
    /// [`GeneSigError::DoesNotExist`] if any term is unknown
    pub fn super_graph(&self, ids: &[GoTermId]) -> GeneSigResult<Vec<GoTermId>> {
        let mut set = TermSet::new();
        for id in ids {
            let idx = self.index_of(*id).ok_or(GeneSigError::DoesNotExist)?;
            set.extend_from(self.ancestor_set(idx));
        }
        Ok(self.sorted_ids(&set))
    }

    /// The union of the descendants of all terms
    ///
    /// # Errors
    ///
    /// [`GeneSigError::DoesNotExist`] if any term is unknown
    pub fn sub_graph(&self, ids: &[GoTermId]) -> GeneSigResult<Vec<GoTermId>> {
        let mut set = TermSet::new();
        for id in ids {
            let idx = self.index_of(*id).ok_or(GeneSigError::DoesNotExist)?;
            set.extend_from(self.descendant_set(idx));
        }
        Ok(self.sorted_ids(&set))
    }

    /// The minimum number of edges between the term and a root
    ///
    /// # Errors
    ///
    /// [`GeneSigError::DoesNotExist`] if the term is unknown
    pub fn term_depth(&self, id: GoTermId) -> GeneSigResult<usize> {
        let idx = self.index_of(id).ok_or(GeneSigError::DoesNotExist)?;
        Ok(self.depth(idx))
    }

    /// The genes annotated to the term
    ///
    /// Only annotations with an evidence code in `evidence` are used. If
    /// `namespace` is given, terms of other namespaces contribute no genes.
    /// With `propagate`, the genes of all descendants are included as well:
    /// a gene annotated to a term is annotated to all of its ancestors.
    ///
    /// # Errors
    ///
    /// [`GeneSigError::DoesNotExist`] if the term is unknown
    pub fn genes_annotated_to(
        &self,
        id: GoTermId,
        evidence: EvidenceMask,
        namespace: Option<Namespace>,
        propagate: bool,
    ) -> GeneSigResult<BTreeSet<&str>> {
        let idx = self.index_of(id).ok_or(GeneSigError::DoesNotExist)?;
        Ok(self
            .term_genes(idx, evidence, namespace, propagate)
            .into_iter()
            .map(|gene| self.gene_name(gene))
            .collect())
    }

    /// The terms annotated to any of the genes, with the genes annotated to them
    ///
    /// Unless `direct_only` is set, the genes also count for all ancestors
    /// of their annotated terms. Unknown genes are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use genesig::{
    ///     AnnotationRecord, EvidenceCode, EvidenceMask, GoGraph, GoTermId, Namespace, Relation,
    ///     TermRecord,
    /// };
    ///
    /// let cc = Namespace::CellularComponent;
    /// let (graph, _) = GoGraph::load(
    ///     vec![
    ///         TermRecord::new(5575u32, "cellular_component", cc),
    ///         TermRecord::new(5634u32, "nucleus", cc).with_parent(5575u32, Relation::IsA),
    ///     ],
    ///     vec![AnnotationRecord::new("TP53", 5634u32, EvidenceCode::Ida)],
    /// );
    ///
    /// let direct = graph.annotated_terms(["TP53", "FOO"], true, EvidenceMask::all());
    /// assert_eq!(direct.len(), 1);
    ///
    /// let all = graph.annotated_terms(["TP53"], false, EvidenceMask::all());
    /// assert!(all[&GoTermId::from(5575u32)].contains("TP53"));
    /// ```
    pub fn annotated_terms<'a, I>(
        &self,
        genes: I,
        direct_only: bool,
        evidence: EvidenceMask,
    ) -> BTreeMap<GoTermId, BTreeSet<&str>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut direct: HashMap<u32, BTreeSet<&str>> = HashMap::new();
        for gene in genes {
            let Some(gene_idx) = self.gene_index(gene) else {
                continue;
            };
            let name = self.gene_name(gene_idx);
            for (term, code) in self.gene_terms(gene_idx) {
                if evidence.contains(*code) {
                    direct.entry(*term).or_default().insert(name);
                }
            }
        }

        let mut res: BTreeMap<GoTermId, BTreeSet<&str>> = BTreeMap::new();
        for (term, genes) in direct {
            if direct_only {
                res.entry(self.internal(term).id())
                    .or_default()
                    .extend(genes.iter());
            } else {
                for ancestor in self.ancestor_set(term).iter() {
                    res.entry(self.internal(ancestor).id())
                        .or_default()
                        .extend(genes.iter());
                }
            }
        }
        res
    }

    /// The ids of all terms that belong to the named slim subset
    pub fn subset_members(&self, subset: &str) -> Vec<GoTermId> {
        let mut ids: Vec<GoTermId> = self
            .terms
            .iter()
            .filter(|term| term.subsets().iter().any(|s| s == subset))
            .map(GoTermInternal::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// The most specific slim terms above (or at) the term
    ///
    /// The search walks up from the term and stops at every slim term it
    /// reaches, so a slim term hidden behind a more specific one is not returned.
    ///
    /// # Errors
    ///
    /// [`GeneSigError::DoesNotExist`] if the term or any slim is unknown
    ///
    /// # Examples
    ///
    /// ```
    /// use genesig::{GoGraph, GoTermId, Namespace, Relation, TermRecord};
    ///
    /// let bp = Namespace::BiologicalProcess;
    /// let (graph, _) = GoGraph::load(vec![
    ///     TermRecord::new(1u32, "root", bp),
    ///     TermRecord::new(2u32, "middle", bp).with_parent(1u32, Relation::IsA),
    ///     TermRecord::new(3u32, "leaf", bp).with_parent(2u32, Relation::IsA),
    /// ], vec![]);
    ///
    /// let slims = [GoTermId::from(1u32), GoTermId::from(2u32)];
    /// assert_eq!(graph.slims_for_term(3u32.into(), &slims).unwrap(), vec![GoTermId::from(2u32)]);
    /// ```
    pub fn slims_for_term(&self, id: GoTermId, slims: &[GoTermId]) -> GeneSigResult<Vec<GoTermId>> {
        let idx = self.index_of(id).ok_or(GeneSigError::DoesNotExist)?;
        let slims = self.slim_indices(slims)?;
        let found = self.nearest_slims(&[idx], &slims);
        Ok(self.sorted_ids(&found))
    }

    /// A new graph with only the terms of one namespace
    ///
    /// Edges to terms of other namespaces are dropped.
    pub fn subset_by_namespace(&self, namespace: Namespace) -> GoGraph {
        let keep: Vec<u32> = self
            .terms
            .indices()
            .filter(|idx| self.internal(*idx).namespace() == namespace)
            .collect();
        let kept: HashSet<u32> = keep.iter().copied().collect();

        let terms = keep.iter().map(|idx| {
            let mut record = self.term_record(*idx);
            record.parents = self
                .internal(*idx)
                .parents()
                .iter()
                .filter(|(p, _)| kept.contains(p))
                .map(|(p, rel)| (self.internal(*p).id(), *rel))
                .collect();
            record
        });
        let annotations: Vec<AnnotationRecord> = keep
            .iter()
            .flat_map(|idx| self.annotation_records(*idx, *idx))
            .collect();
        self.rebuild(terms, annotations)
    }

    /// A new graph with only the slim terms
    ///
    /// Each slim term is connected to its nearest slim ancestors. Annotations
    /// are moved from every term to its nearest slim terms (see
    /// [`GoGraph::slims_for_term`]), annotations of terms without a slim
    /// ancestor are dropped.
    ///
    /// # Errors
    ///
    /// [`GeneSigError::DoesNotExist`] if any slim is unknown
    pub fn slim_subset(&self, slims: &[GoTermId]) -> GeneSigResult<GoGraph> {
        let slim_set = self.slim_indices(slims)?;
        let mut ordered: Vec<u32> = slim_set.iter().copied().collect();
        ordered.sort_unstable();

        let mut terms = Vec::with_capacity(ordered.len());
        for idx in &ordered {
            let term = self.internal(*idx);
            let direct: Vec<u32> = term.parents().iter().map(|p| p.0).collect();
            let mut record = self.term_record(*idx);
            record.parents = self
                .nearest_slims(&direct, &slim_set)
                .iter()
                .map(|p| {
                    let relation = term
                        .parents()
                        .iter()
                        .find(|(parent, _)| *parent == p)
                        .map_or(Relation::IsA, |(_, rel)| *rel);
                    (self.internal(p).id(), relation)
                })
                .collect();
            terms.push(record);
        }

        let mut annotations = Vec::new();
        for idx in self.terms.indices() {
            if self.internal(idx).annotations().is_empty() {
                continue;
            }
            for slim in self.nearest_slims(&[idx], &slim_set).iter() {
                annotations.extend(self.annotation_records(idx, slim));
            }
        }
        Ok(self.rebuild(terms, annotations))
    }
}

/// Crate-internal accessors, based on arena indices
impl GoGraph {
    pub(crate) fn index_of(&self, id: GoTermId) -> Option<u32> {
        self.terms
            .index_of(id)
            .or_else(|| self.alt_ids.get(&id).copied())
    }

    pub(crate) fn internal(&self, idx: u32) -> &GoTermInternal {
        self.terms.get_unchecked(idx)
    }

    pub(crate) fn gene_index(&self, gene: &str) -> Option<u32> {
        self.gene_index.get(gene).copied()
    }

    pub(crate) fn gene_name(&self, gene: u32) -> &str {
        &self.genes[gene as usize]
    }

    /// The direct annotations of the gene, as `(term index, evidence)`
    pub(crate) fn gene_terms(&self, gene: u32) -> &[(u32, EvidenceCode)] {
        &self.gene_terms[gene as usize]
    }

    /// Ancestors of the term including itself, computed once
    pub(crate) fn ancestor_set(&self, idx: u32) -> &TermSet {
        let term = self.internal(idx);
        term.ancestors_cache().get_or_init(|| {
            let mut set = TermSet::with_capacity(crate::DEFAULT_NUM_PARENTS * 4);
            set.insert(idx);
            for (parent, _) in term.parents() {
                set.extend_from(self.ancestor_set(*parent));
            }
            set
        })
    }

    /// Descendants of the term including itself, computed once
    pub(crate) fn descendant_set(&self, idx: u32) -> &TermSet {
        let term = self.internal(idx);
        term.descendants_cache().get_or_init(|| {
            let mut set = TermSet::new();
            set.insert(idx);
            for (child, _) in term.children() {
                set.extend_from(self.descendant_set(*child));
            }
            set
        })
    }

    pub(crate) fn depth(&self, idx: u32) -> usize {
        let term = self.internal(idx);
        *term.depth_cache().get_or_init(|| {
            term.parents()
                .iter()
                .map(|(parent, _)| self.depth(*parent) + 1)
                .min()
                .unwrap_or(0)
        })
    }

    /// Sorted gene indices annotated to the term
    pub(crate) fn term_genes(
        &self,
        idx: u32,
        evidence: EvidenceMask,
        namespace: Option<Namespace>,
        propagate: bool,
    ) -> Vec<u32> {
        let in_namespace =
            |term: u32| namespace.map_or(true, |ns| self.internal(term).namespace() == ns);
        if !in_namespace(idx) {
            return Vec::new();
        }
        let direct = move |term: u32| {
            self.internal(term)
                .annotations()
                .iter()
                .filter(move |(_, code)| evidence.contains(*code))
                .map(|(gene, _)| *gene)
        };

        let mut genes: Vec<u32> = if propagate {
            self.descendant_set(idx)
                .iter()
                .filter(|term| in_namespace(*term))
                .flat_map(direct)
                .collect()
        } else {
            direct(idx).collect()
        };
        genes.sort_unstable();
        genes.dedup();
        genes
    }

    fn sorted_ids(&self, set: &TermSet) -> Vec<GoTermId> {
        let mut ids: Vec<GoTermId> = set.iter().map(|idx| self.internal(idx).id()).collect();
        ids.sort_unstable();
        ids
    }

    fn slim_indices(&self, slims: &[GoTermId]) -> GeneSigResult<HashSet<u32>> {
        slims
            .iter()
            .map(|id| self.index_of(*id).ok_or(GeneSigError::DoesNotExist))
            .collect()
    }

    /// Walks up from `start` and collects the first slim term on every path
    fn nearest_slims(&self, start: &[u32], slims: &HashSet<u32>) -> TermSet {
        let mut found = TermSet::new();
        let mut visited: HashSet<u32> = HashSet::new();
        let mut queue: VecDeque<u32> = start.iter().copied().collect();
        while let Some(idx) = queue.pop_front() {
            if !visited.insert(idx) {
                continue;
            }
            if slims.contains(&idx) {
                found.insert(idx);
            } else {
                queue.extend(self.internal(idx).parents().iter().map(|p| p.0));
            }
        }
        found
    }

    /// The term as record, without parents
    fn term_record(&self, idx: u32) -> TermRecord {
        let term = self.internal(idx);
        TermRecord {
            id: term.id(),
            alt_ids: term.alt_ids().to_vec(),
            name: term.name().to_string(),
            namespace: term.namespace(),
            parents: Vec::new(),
            definition: term.definition().map(str::to_string),
            obsolete: term.obsolete(),
            subsets: term.subsets().to_vec(),
        }
    }

    /// The direct annotations of `source`, attached to `target`
    fn annotation_records(&self, source: u32, target: u32) -> Vec<AnnotationRecord> {
        let target = self.internal(target);
        self.internal(source)
            .annotations()
            .iter()
            .map(|(gene, code)| {
                AnnotationRecord::new(self.gene_name(*gene), target.id(), *code)
                    .with_aspect(target.namespace())
            })
            .collect()
    }

    fn rebuild<T, A>(&self, terms: T, annotations: A) -> GoGraph
    where
        T: IntoIterator<Item = TermRecord>,
        A: IntoIterator<Item = AnnotationRecord>,
    {
        let (graph, issues) = GoGraph::load(terms, annotations);
        if !issues.is_empty() {
            debug!("Subgraph built with {} issues", issues.len());
        }
        graph
    }
}

impl<'a> IntoIterator for &'a GoGraph {
    type Item = GoTerm<'a>;
    type IntoIter = Box<dyn Iterator<Item = GoTerm<'a>> + 'a>;
    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const BP: Namespace = Namespace::BiologicalProcess;
    const MF: Namespace = Namespace::MolecularFunction;

    /// ```text
    ///        1 (BP root)          100 (MF root)
    ///       / \                    |
    ///      2   3                  101
    ///      |  / (part_of)
    ///      4
    /// ```
    fn toy_graph() -> (GoGraph, LoadIssues) {
        let terms = vec![
            TermRecord::new(1u32, "root", BP),
            TermRecord::new(2u32, "two", BP).with_parent(1u32, Relation::IsA),
            TermRecord::new(3u32, "three", BP)
                .with_parent(1u32, Relation::IsA)
                .with_alt_id(33u32),
            TermRecord::new(4u32, "four", BP)
                .with_parent(2u32, Relation::IsA)
                .with_parent(33u32, Relation::PartOf),
            TermRecord::new(100u32, "mf root", MF),
            TermRecord::new(101u32, "mf child", MF)
                .with_parent(100u32, Relation::IsA)
                .with_subset("goslim_test"),
        ];
        let annotations = vec![
            AnnotationRecord::new("g4", 4u32, EvidenceCode::Ida),
            AnnotationRecord::new("g2", 2u32, EvidenceCode::Iea),
            AnnotationRecord::new("g3", 33u32, EvidenceCode::Tas),
            AnnotationRecord::new("g4", 101u32, EvidenceCode::Imp),
            AnnotationRecord::new("gx", 1u32, EvidenceCode::Ida).with_qualifier("NOT"),
            AnnotationRecord::new("gy", 555u32, EvidenceCode::Ida),
        ];
        GoGraph::load(terms, annotations)
    }

    fn id(n: u32) -> GoTermId {
        GoTermId::from(n)
    }

    #[test]
    fn load_reports_skipped_annotations() {
        let (graph, issues) = toy_graph();
        assert_eq!(graph.len(), 6);
        assert_eq!(graph.n_genes(), 3);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues.count(IssueKind::NotQualified), 1);
        assert_eq!(issues.count(IssueKind::AbsentTerm), 1);
        assert!(!graph.has_gene("gx"));
    }

    #[test]
    fn ancestors_include_self() {
        let (graph, _) = toy_graph();
        assert_eq!(graph.ancestors(id(4)).unwrap(), vec![id(1), id(2), id(3), id(4)]);
        assert_eq!(graph.ancestors(id(1)).unwrap(), vec![id(1)]);
        assert_eq!(graph.ancestors(id(33)).unwrap(), vec![id(1), id(3)]);
        assert_eq!(graph.ancestors(id(7)), Err(GeneSigError::DoesNotExist));
    }

    #[test]
    fn descendants_include_self() {
        let (graph, _) = toy_graph();
        assert_eq!(graph.descendants(id(1)).unwrap(), vec![id(1), id(2), id(3), id(4)]);
        assert_eq!(graph.descendants(id(3)).unwrap(), vec![id(3), id(4)]);
        assert_eq!(graph.sub_graph(&[id(2), id(3)]).unwrap(), vec![id(2), id(3), id(4)]);
        assert_eq!(graph.super_graph(&[id(4), id(101)]).unwrap().len(), 6);
    }

    #[test]
    fn relations_and_depth() {
        let (graph, _) = toy_graph();
        let parents = graph.parents(id(4)).unwrap();
        assert!(parents.contains(&(id(3), Relation::PartOf)));
        assert_eq!(graph.children(id(1)).unwrap().len(), 2);
        assert_eq!(graph.term_depth(id(1)).unwrap(), 0);
        assert_eq!(graph.term_depth(id(4)).unwrap(), 2);
        assert_eq!(graph.roots().len(), 2);
    }

    #[test]
    fn propagation_to_every_ancestor() {
        let (graph, _) = toy_graph();
        for ancestor in graph.ancestors(id(4)).unwrap() {
            let genes = graph
                .genes_annotated_to(ancestor, EvidenceMask::all(), None, true)
                .unwrap();
            assert!(genes.contains("g4"), "g4 missing in {ancestor}");
        }
        let root = graph
            .genes_annotated_to(id(1), EvidenceMask::all(), Some(BP), true)
            .unwrap();
        assert_eq!(root.len(), 3);
        let direct = graph
            .genes_annotated_to(id(1), EvidenceMask::all(), Some(BP), false)
            .unwrap();
        assert!(direct.is_empty());
    }

    #[test]
    fn namespace_and_evidence_filter() {
        let (graph, _) = toy_graph();
        let wrong_ns = graph
            .genes_annotated_to(id(1), EvidenceMask::all(), Some(MF), true)
            .unwrap();
        assert!(wrong_ns.is_empty());

        let no_iea = graph
            .genes_annotated_to(id(2), !EvidenceMask::from(EvidenceCode::Iea), Some(BP), true)
            .unwrap();
        assert_eq!(no_iea.into_iter().collect::<Vec<_>>(), vec!["g4"]);
    }

    #[test]
    fn annotated_terms_direct_and_propagated() {
        let (graph, _) = toy_graph();
        let direct = graph.annotated_terms(["g4"], true, EvidenceMask::all());
        assert_eq!(direct.keys().copied().collect::<Vec<_>>(), vec![id(4), id(101)]);
        let all = graph.annotated_terms(["g4"], false, EvidenceMask::all());
        assert_eq!(all.len(), 6);
        let exp = graph.annotated_terms(["g4"], false, EvidenceCode::Imp.into());
        assert_eq!(exp.len(), 2);
    }

    #[test]
    fn alt_id_collisions() {
        let terms = vec![
            TermRecord::new(1u32, "a", BP).with_alt_id(2u32).with_alt_id(10u32),
            TermRecord::new(2u32, "b", BP).with_parent(1u32, Relation::IsA),
            TermRecord::new(3u32, "c", BP)
                .with_parent(1u32, Relation::IsA)
                .with_alt_id(10u32),
            TermRecord::new(3u32, "c again", BP),
        ];
        let (graph, issues) = GoGraph::load(terms, vec![]);
        assert_eq!(issues.count(IssueKind::UnresolvableAltId), 2);
        assert_eq!(issues.count(IssueKind::DuplicateTerm), 1);
        assert_eq!(graph.resolve_id(id(10)), Some(id(1)));
        assert_eq!(graph.resolve_id(id(2)), Some(id(2)));
        assert_eq!(graph.term(3u32).unwrap().name(), "c");
    }

    #[test]
    fn cycles_are_broken() {
        let terms = vec![
            TermRecord::new(1u32, "root", BP),
            TermRecord::new(2u32, "a", BP)
                .with_parent(1u32, Relation::IsA)
                .with_parent(3u32, Relation::IsA),
            TermRecord::new(3u32, "b", BP)
                .with_parent(1u32, Relation::IsA)
                .with_parent(2u32, Relation::IsA),
            TermRecord::new(4u32, "self", BP)
                .with_parent(4u32, Relation::IsA)
                .with_parent(1u32, Relation::IsA),
        ];
        let (graph, issues) = GoGraph::load(terms, vec![]);
        assert_eq!(issues.count(IssueKind::Cycle), 2);
        // every term still reaches the root
        for term in &graph {
            assert!(graph.ancestors(term.id()).unwrap().contains(&id(1)));
        }
    }

    #[test]
    fn root_count_issues() {
        let terms = vec![
            TermRecord::new(1u32, "root", BP),
            TermRecord::new(2u32, "second root", BP),
            TermRecord::new(3u32, "old", BP).obsolete(),
        ];
        let (graph, issues) = GoGraph::load(terms, vec![]);
        assert_eq!(issues.count(IssueKind::RootCount), 1);
        assert_eq!(graph.roots().len(), 2);
    }

    #[test]
    fn namespace_subset() {
        let (graph, _) = toy_graph();
        let mf = graph.subset_by_namespace(MF);
        assert_eq!(mf.len(), 2);
        assert_eq!(mf.n_genes(), 1);
        assert!(mf.term(1u32).is_none());
        assert_eq!(mf.subset_members("goslim_test"), vec![id(101)]);

        let bp = graph.subset_by_namespace(BP);
        assert_eq!(bp.len(), 4);
        assert_eq!(bp.resolve_id(id(33)), Some(id(3)));
        assert_eq!(bp.ancestors(id(4)).unwrap().len(), 4);
    }

    #[test]
    fn slim_graph() {
        let (graph, _) = toy_graph();
        let slim = graph.slim_subset(&[id(1), id(4)]).unwrap();
        assert_eq!(slim.len(), 2);
        assert_eq!(slim.parents(id(4)).unwrap(), vec![(id(1), Relation::IsA)]);

        // g2 and g3 move up to the root, g4 stays at term 4
        let root = slim
            .genes_annotated_to(id(1), EvidenceMask::all(), None, false)
            .unwrap();
        assert_eq!(root.into_iter().collect::<Vec<_>>(), vec!["g2", "g3"]);
        let leaf = slim
            .genes_annotated_to(id(4), EvidenceMask::all(), None, false)
            .unwrap();
        assert_eq!(leaf.len(), 1);

        assert!(graph.slim_subset(&[id(999)]).is_err());
    }

    #[test]
    fn slims_stop_at_first_match() {
        let (graph, _) = toy_graph();
        let slims = [id(1), id(2), id(3)];
        assert_eq!(graph.slims_for_term(id(4), &slims).unwrap(), vec![id(2), id(3)]);
        assert_eq!(graph.slims_for_term(id(1), &slims).unwrap(), vec![id(1)]);
        assert!(graph.slims_for_term(id(101), &slims).unwrap().is_empty());
    }

    #[test]
    fn graph_is_shareable() {
        fn assert_sync<T: Sync + Send>() {}
        assert_sync::<GoGraph>();
    }
}
