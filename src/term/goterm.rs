use core::fmt::Debug;

use crate::annotations::EvidenceCode;
use crate::term::internal::GoTermInternal;
use crate::term::{GoTermId, Namespace, Relation};
use crate::GoGraph;

/// A read-only view of a term inside a [`GoGraph`]
///
/// # Examples
///
/// ```
/// use genesig::{AnnotationRecord, EvidenceCode, GoGraph, Namespace, Relation, TermRecord};
///
/// let bp = Namespace::BiologicalProcess;
/// let (graph, _) = GoGraph::load(
///     vec![
///         TermRecord::new(8150u32, "biological_process", bp),
///         TermRecord::new(6915u32, "apoptotic process", bp)
///             .with_parent(8150u32, Relation::IsA)
///             .with_definition("A programmed cell death process"),
///     ],
///     vec![AnnotationRecord::new("CASP3", 6915u32, EvidenceCode::Ida)],
/// );
///
/// let term = graph.term(6915u32).unwrap();
/// assert_eq!(term.name(), "apoptotic process");
/// assert_eq!(term.depth(), 1);
/// assert!(!term.is_root());
///
/// let (parent, relation) = term.parents().next().unwrap();
/// assert_eq!(parent.name(), "biological_process");
/// assert_eq!(relation, Relation::IsA);
///
/// assert_eq!(term.direct_genes().collect::<Vec<_>>(), vec![("CASP3", EvidenceCode::Ida)]);
/// ```
#[derive(Clone, Copy)]
pub struct GoTerm<'a> {
    graph: &'a GoGraph,
    term: &'a GoTermInternal,
    idx: u32,
}

impl<'a> GoTerm<'a> {
    pub(crate) fn new(graph: &'a GoGraph, idx: u32) -> GoTerm<'a> {
        GoTerm {
            graph,
            term: graph.internal(idx),
            idx,
        }
    }

    pub fn id(&self) -> GoTermId {
        self.term.id()
    }

    pub fn name(&self) -> &'a str {
        self.term.name()
    }

    pub fn namespace(&self) -> Namespace {
        self.term.namespace()
    }

    pub fn definition(&self) -> Option<&'a str> {
        self.term.definition()
    }

    pub fn obsolete(&self) -> bool {
        self.term.obsolete()
    }

    /// The secondary ids that resolve to this term
    pub fn alt_ids(&self) -> &'a [GoTermId] {
        self.term.alt_ids()
    }

    /// The slim subsets the term belongs to
    pub fn subsets(&self) -> &'a [String] {
        self.term.subsets()
    }

    /// `true` if the term has no parents
    pub fn is_root(&self) -> bool {
        self.term.parents().is_empty()
    }

    /// The direct parents with their relation
    pub fn parents(&self) -> impl Iterator<Item = (GoTerm<'a>, Relation)> + 'a {
        let graph = self.graph;
        self.term
            .parents()
            .iter()
            .map(move |(idx, relation)| (GoTerm::new(graph, *idx), *relation))
    }

    /// The direct children with their relation
    pub fn children(&self) -> impl Iterator<Item = (GoTerm<'a>, Relation)> + 'a {
        let graph = self.graph;
        self.term
            .children()
            .iter()
            .map(move |(idx, relation)| (GoTerm::new(graph, *idx), *relation))
    }

    /// The ids of all ancestors, including the term itself
    pub fn ancestor_ids(&self) -> Vec<GoTermId> {
        let mut ids: Vec<GoTermId> = self
            .graph
            .ancestor_set(self.idx)
            .iter()
            .map(|idx| self.graph.internal(idx).id())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// The minimum number of edges to a root
    pub fn depth(&self) -> usize {
        self.graph.depth(self.idx)
    }

    /// The genes directly annotated to the term, with evidence
    pub fn direct_genes(&self) -> impl Iterator<Item = (&'a str, EvidenceCode)> + 'a {
        let graph = self.graph;
        self.term
            .annotations()
            .iter()
            .map(move |(gene, code)| (graph.gene_name(*gene), *code))
    }
}

impl PartialEq for GoTerm<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx && std::ptr::eq(self.graph, other.graph)
    }
}

impl Debug for GoTerm<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GoTerm({} | {})", self.id(), self.name())
    }
}
