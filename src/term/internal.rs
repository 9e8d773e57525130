use std::sync::OnceLock;

use smallvec::SmallVec;

use crate::annotations::EvidenceCode;
use crate::term::{GoTermId, Namespace, Relation, TermRecord, TermSet};
use crate::DEFAULT_NUM_PARENTS;

/// Edges to parents or children, as `(term index, relation)`
pub(crate) type Edges = SmallVec<[(u32, Relation); DEFAULT_NUM_PARENTS]>;

/// A term inside the graph arena
///
/// Relations to other terms are stored as indices into the arena.
/// The ancestor and descendant closures are computed on first access.
#[derive(Debug)]
pub(crate) struct GoTermInternal {
    id: GoTermId,
    name: String,
    namespace: Namespace,
    definition: Option<String>,
    obsolete: bool,
    alt_ids: Vec<GoTermId>,
    subsets: Vec<String>,
    parents: Edges,
    children: Edges,
    annotations: Vec<(u32, EvidenceCode)>,
    ancestors: OnceLock<TermSet>,
    descendants: OnceLock<TermSet>,
    depth: OnceLock<usize>,
}

impl GoTermInternal {
    /// Creates the internal term, parents are connected separately
    pub fn from_record(record: TermRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            namespace: record.namespace,
            definition: record.definition,
            obsolete: record.obsolete,
            alt_ids: record.alt_ids,
            subsets: record.subsets,
            parents: Edges::new(),
            children: Edges::new(),
            annotations: Vec::new(),
            ancestors: OnceLock::new(),
            descendants: OnceLock::new(),
            depth: OnceLock::new(),
        }
    }

    pub fn id(&self) -> GoTermId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    pub fn obsolete(&self) -> bool {
        self.obsolete
    }

    pub fn alt_ids(&self) -> &[GoTermId] {
        &self.alt_ids
    }

    pub fn alt_ids_mut(&mut self) -> &mut Vec<GoTermId> {
        &mut self.alt_ids
    }

    pub fn subsets(&self) -> &[String] {
        &self.subsets
    }

    pub fn parents(&self) -> &Edges {
        &self.parents
    }

    pub fn children(&self) -> &Edges {
        &self.children
    }

    /// Adds the parent edge, returns `false` if the parent was already connected
    pub fn add_parent(&mut self, parent: u32, relation: Relation) -> bool {
        if self.parents.iter().any(|(idx, _)| *idx == parent) {
            return false;
        }
        self.parents.push((parent, relation));
        true
    }

    pub fn remove_parent(&mut self, parent: u32) {
        self.parents.retain(|(idx, _)| *idx != parent);
    }

    pub fn add_child(&mut self, child: u32, relation: Relation) {
        self.children.push((child, relation));
    }

    /// Direct annotations as `(gene index, evidence)`
    pub fn annotations(&self) -> &[(u32, EvidenceCode)] {
        &self.annotations
    }

    pub fn add_annotation(&mut self, gene: u32, evidence: EvidenceCode) {
        self.annotations.push((gene, evidence));
    }

    /// Sorts the annotations and removes exact duplicates
    pub fn finalize_annotations(&mut self) {
        self.annotations.sort_unstable();
        self.annotations.dedup();
        self.annotations.shrink_to_fit();
    }

    pub fn ancestors_cache(&self) -> &OnceLock<TermSet> {
        &self.ancestors
    }

    pub fn descendants_cache(&self) -> &OnceLock<TermSet> {
        &self.descendants
    }

    pub fn depth_cache(&self) -> &OnceLock<usize> {
        &self.depth
    }
}

impl PartialEq for GoTermInternal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GoTermInternal {}
