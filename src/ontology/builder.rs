use std::collections::HashMap;
use std::marker::PhantomData;

use tracing::{debug, warn};

use crate::annotations::{AnnotationRecord, EvidenceCode};
use crate::ontology::termarena::Arena;
use crate::ontology::{GoGraph, IssueKind, LoadIssues};
use crate::term::internal::GoTermInternal;
use crate::term::{GoTermId, Namespace, Relation, TermRecord};

/// State of a builder that still accepts terms
pub(crate) struct LooseTerms;
/// State of a builder whose terms are connected and validated
pub(crate) struct ConnectedTerms;

fn transition_state<TX, TY>(builder: Builder<TX>) -> Builder<TY> {
    Builder::<TY> {
        terms: builder.terms,
        alt_ids: builder.alt_ids,
        pending_parents: builder.pending_parents,
        genes: builder.genes,
        gene_index: builder.gene_index,
        issues: builder.issues,
        state: PhantomData,
    }
}

/// Builds a [`GoGraph`] step by step
///
/// 1. Add all terms ([`Builder::add_term`])
/// 2. Resolve alt-ids and parents, drop cyclic edges ([`Builder::connect_all_terms`])
/// 3. Add annotations ([`Builder::add_annotation`]) and finish ([`Builder::build`])
///
/// Invalid records never abort the build, they are dropped and reported
/// in [`LoadIssues`].
pub(crate) struct Builder<T> {
    terms: Arena,
    alt_ids: HashMap<GoTermId, u32>,
    pending_parents: Vec<(u32, Vec<(GoTermId, Relation)>)>,
    genes: Vec<String>,
    gene_index: HashMap<String, u32>,
    issues: LoadIssues,
    state: PhantomData<T>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

impl Builder<LooseTerms> {
    pub fn new() -> Self {
        Self {
            terms: Arena::default(),
            alt_ids: HashMap::new(),
            pending_parents: Vec::new(),
            genes: Vec::new(),
            gene_index: HashMap::new(),
            issues: LoadIssues::default(),
            state: PhantomData,
        }
    }

    /// Adds a term, parents are connected in [`Builder::connect_all_terms`]
    pub fn add_term(&mut self, mut record: TermRecord) {
        let id = record.id;
        let parents = std::mem::take(&mut record.parents);
        match self.terms.insert(GoTermInternal::from_record(record)) {
            Some(idx) => self.pending_parents.push((idx, parents)),
            None => self
                .issues
                .push(IssueKind::DuplicateTerm, format!("{id} is defined more than once")),
        }
    }

    /// Resolves alt-ids and parent references and removes cycles
    #[must_use]
    pub fn connect_all_terms(mut self) -> Builder<ConnectedTerms> {
        self.register_alt_ids();

        let pending = std::mem::take(&mut self.pending_parents);
        for (idx, parents) in pending {
            let child_id = self.terms.get_unchecked(idx).id();
            for (parent_id, relation) in parents {
                match self.resolve(parent_id) {
                    None => self.issues.push(
                        IssueKind::MissingParent,
                        format!("parent {parent_id} of {child_id} does not exist"),
                    ),
                    Some(parent) if parent == idx => self
                        .issues
                        .push(IssueKind::Cycle, format!("{child_id} is its own parent")),
                    Some(parent) => {
                        self.terms.get_unchecked_mut(idx).add_parent(parent, relation);
                    }
                }
            }
        }

        self.remove_cycles();
        self.connect_children();
        debug!("Connected {} terms", self.terms.len());
        transition_state(self)
    }

    fn register_alt_ids(&mut self) {
        for idx in self.terms.indices() {
            let term_id = self.terms.get_unchecked(idx).id();
            let alt_ids = std::mem::take(self.terms.get_unchecked_mut(idx).alt_ids_mut());
            let mut valid = Vec::with_capacity(alt_ids.len());
            for alt_id in alt_ids {
                if self.terms.index_of(alt_id).is_some() {
                    self.issues.push(
                        IssueKind::UnresolvableAltId,
                        format!("alt-id {alt_id} of {term_id} is the primary id of another term"),
                    );
                    continue;
                }
                match self.alt_ids.get(&alt_id) {
                    Some(other) if *other != idx => {
                        let other_id = self.terms.get_unchecked(*other).id();
                        self.issues.push(
                            IssueKind::UnresolvableAltId,
                            format!("alt-id {alt_id} is claimed by {other_id} and {term_id}"),
                        );
                    }
                    Some(_) => {}
                    None => {
                        self.alt_ids.insert(alt_id, idx);
                        valid.push(alt_id);
                    }
                }
            }
            *self.terms.get_unchecked_mut(idx).alt_ids_mut() = valid;
        }
    }

    /// Drops every parent edge that closes a cycle
    ///
    /// Uses an iterative depth-first search along parent edges. Terms are
    /// visited in insertion order, so the dropped edges are deterministic.
    fn remove_cycles(&mut self) {
        let mut state = vec![Visit::New; self.terms.len()];
        let mut back_edges: Vec<(u32, u32)> = Vec::new();

        for start in self.terms.indices() {
            if state[start as usize] != Visit::New {
                continue;
            }
            state[start as usize] = Visit::Active;
            let mut stack: Vec<(u32, usize)> = vec![(start, 0)];

            while let Some(&(node, pos)) = stack.last() {
                let next = self.terms.get_unchecked(node).parents().get(pos).map(|p| p.0);
                match next {
                    Some(parent) => {
                        if let Some(top) = stack.last_mut() {
                            top.1 += 1;
                        }
                        match state[parent as usize] {
                            Visit::New => {
                                state[parent as usize] = Visit::Active;
                                stack.push((parent, 0));
                            }
                            Visit::Active => back_edges.push((node, parent)),
                            Visit::Done => {}
                        }
                    }
                    None => {
                        state[node as usize] = Visit::Done;
                        stack.pop();
                    }
                }
            }
        }

        for (child, parent) in back_edges {
            let child_id = self.terms.get_unchecked(child).id();
            let parent_id = self.terms.get_unchecked(parent).id();
            warn!("Removing cyclic edge {} -> {}", child_id, parent_id);
            self.issues.push(
                IssueKind::Cycle,
                format!("edge {child_id} -> {parent_id} closes a cycle"),
            );
            self.terms.get_unchecked_mut(child).remove_parent(parent);
        }
    }

    fn connect_children(&mut self) {
        let mut edges: Vec<(u32, u32, Relation)> = Vec::new();
        for child in self.terms.indices() {
            for (parent, relation) in self.terms.get_unchecked(child).parents() {
                edges.push((*parent, child, *relation));
            }
        }
        for (parent, child, relation) in edges {
            self.terms.get_unchecked_mut(parent).add_child(child, relation);
        }
    }
}

impl<T> Builder<T> {
    fn resolve(&self, id: GoTermId) -> Option<u32> {
        self.terms
            .index_of(id)
            .or_else(|| self.alt_ids.get(&id).copied())
    }
}

impl Builder<ConnectedTerms> {
    /// Links the gene to the annotated term
    ///
    /// `NOT`-qualified records and records of absent terms are skipped.
    pub fn add_annotation(&mut self, record: AnnotationRecord) {
        if record.negated {
            self.issues.push(
                IssueKind::NotQualified,
                format!("skipped NOT annotation of {} to {}", record.gene, record.go_id),
            );
            return;
        }
        let Some(term) = self.resolve(record.go_id) else {
            self.issues.push(
                IssueKind::AbsentTerm,
                format!("{} is annotated to the absent term {}", record.gene, record.go_id),
            );
            return;
        };
        let Some(gene) = self.intern_gene(record.gene) else {
            return;
        };
        self.terms
            .get_unchecked_mut(term)
            .add_annotation(gene, record.evidence);
    }

    fn intern_gene(&mut self, gene: String) -> Option<u32> {
        if let Some(idx) = self.gene_index.get(&gene) {
            return Some(*idx);
        }
        let idx = u32::try_from(self.genes.len()).ok()?;
        self.gene_index.insert(gene.clone(), idx);
        self.genes.push(gene);
        Some(idx)
    }

    /// Finalizes the graph
    pub fn build(mut self) -> (GoGraph, LoadIssues) {
        let mut gene_terms: Vec<Vec<(u32, EvidenceCode)>> = vec![Vec::new(); self.genes.len()];
        for idx in self.terms.indices() {
            let term = self.terms.get_unchecked_mut(idx);
            term.finalize_annotations();
            for (gene, evidence) in term.annotations() {
                gene_terms[*gene as usize].push((idx, *evidence));
            }
        }
        self.check_roots();

        if !self.issues.is_empty() {
            warn!("Loaded ontology with {} issues", self.issues.len());
        }
        debug!(
            "Loaded {} terms and {} annotated genes",
            self.terms.len(),
            self.genes.len()
        );

        let graph = GoGraph {
            terms: self.terms,
            alt_ids: self.alt_ids,
            genes: self.genes,
            gene_index: self.gene_index,
            gene_terms,
        };
        (graph, self.issues)
    }

    /// Reports namespaces without exactly one root
    fn check_roots(&mut self) {
        for namespace in Namespace::ALL {
            let mut roots = self
                .terms
                .iter()
                .filter(|t| t.namespace() == namespace && !t.obsolete() && t.parents().is_empty())
                .map(GoTermInternal::id);
            let has_terms = self.terms.iter().any(|t| t.namespace() == namespace);
            match (roots.next(), roots.next()) {
                (Some(_), None) => {}
                (None, _) if has_terms => self
                    .issues
                    .push(IssueKind::RootCount, format!("{namespace} has no root term")),
                (Some(first), Some(second)) => self.issues.push(
                    IssueKind::RootCount,
                    format!("{namespace} has multiple roots, e.g. {first} and {second}"),
                ),
                (None, _) => {}
            }
        }
    }
}
