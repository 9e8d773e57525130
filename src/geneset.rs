//! Named gene sets organized in hierarchical categories
//!
//! A [`GeneSet`] is identified by its hierarchy path and its name, e.g.
//! `("KEGG", "pathway", "hsa")` and `"Cell cycle"`. A [`GeneSetCollection`]
//! never contains two sets with the same identity.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Display;
use std::hash::{Hash, Hasher};

use tracing::{debug, trace};

use crate::matcher::Matcher;
use crate::{f64_from_usize, GeneSigError, GeneSigResult};

/// A named collection of gene tokens
///
/// Two gene sets are equal if their hierarchy and name are equal, the genes
/// and all other fields are not compared.
///
/// # Examples
///
/// ```
/// use genesig::GeneSet;
///
/// let set = GeneSet::new(["KEGG", "pathway"], "Cell cycle", ["CDK1", "CCNB1", "CDK1"])
///     .with_id("hsa04110");
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.cname(), "[ KEGG, pathway ] hsa04110 Cell cycle");
/// ```
#[derive(Debug, Clone)]
pub struct GeneSet {
    hierarchy: Vec<String>,
    name: String,
    genes: BTreeSet<String>,
    id: Option<String>,
    link: Option<String>,
    description: Option<String>,
    organism: Option<String>,
}

impl GeneSet {
    /// Constructs a new gene set, duplicate genes are removed
    pub fn new<H, S, G, T>(hierarchy: H, name: &str, genes: G) -> Self
    where
        H: IntoIterator<Item = S>,
        S: Into<String>,
        G: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            hierarchy: hierarchy.into_iter().map(Into::into).collect(),
            name: name.to_string(),
            genes: genes.into_iter().map(Into::into).collect(),
            id: None,
            link: None,
            description: None,
            organism: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    #[must_use]
    pub fn with_link(mut self, link: &str) -> Self {
        self.link = Some(link.to_string());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    #[must_use]
    pub fn with_organism(mut self, organism: &str) -> Self {
        self.organism = Some(organism.to_string());
        self
    }

    /// The category path of the set
    pub fn hierarchy(&self) -> &[String] {
        &self.hierarchy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn organism(&self) -> Option<&str> {
        self.organism.as_deref()
    }

    /// The genes of the set, sorted
    pub fn genes(&self) -> &BTreeSet<String> {
        &self.genes
    }

    /// The number of genes in the set
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// The unique key `(hierarchy, name)`
    pub fn key(&self) -> (&[String], &str) {
        (&self.hierarchy, &self.name)
    }

    /// A display name: `[ h1, h2 ] id name`
    ///
    /// The id is omitted if the set has none.
    pub fn cname(&self) -> String {
        let mut res = format!("[ {} ] ", self.hierarchy.join(", "));
        if let Some(id) = &self.id {
            res.push_str(id);
            res.push(' ');
        }
        res.push_str(&self.name);
        res
    }

    /// The number of genes of this set that are part of `universe`
    pub fn count_in(&self, universe: &HashSet<String>) -> usize {
        self.genes.iter().filter(|g| universe.contains(*g)).count()
    }
}

impl PartialEq for GeneSet {
    fn eq(&self, other: &Self) -> bool {
        self.hierarchy == other.hierarchy && self.name == other.name
    }
}

impl Eq for GeneSet {}

impl Hash for GeneSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hierarchy.hash(state);
        self.name.hash(state);
    }
}

impl Display for GeneSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cname())
    }
}

/// A gene set resolved to canonical identifiers and target positions
///
/// Returned from [`GeneSetCollection::project`]
#[derive(Debug, Clone)]
pub struct ProjectedSet<'a> {
    set: &'a GeneSet,
    genes: Vec<String>,
    indices: Vec<usize>,
    unmapped: usize,
}

impl<'a> ProjectedSet<'a> {
    /// The original gene set
    pub fn set(&self) -> &'a GeneSet {
        self.set
    }

    /// Canonical identifiers of the genes found in the target order
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    /// Positions of the genes in the target order, aligned with [`ProjectedSet::genes`]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// The number of genes that could not be resolved or are not part of the targets
    pub fn unmapped(&self) -> usize {
        self.unmapped
    }

    /// The fraction of the set's genes that were found
    pub fn coverage(&self) -> f64 {
        if self.set.is_empty() {
            0.0
        } else {
            f64_from_usize(self.indices.len()) / f64_from_usize(self.set.len())
        }
    }
}

/// A catalog of [`GeneSet`]s without duplicate `(hierarchy, name)` keys
///
/// # Examples
///
/// ```
/// use genesig::{GeneSet, GeneSetCollection};
///
/// let mut collection = GeneSetCollection::default();
/// collection.add(GeneSet::new(["GO", "BP"], "apoptosis", ["A", "B", "C"])).unwrap();
/// collection.add(GeneSet::new(["KEGG"], "apoptosis", ["A", "D"])).unwrap();
///
/// // same hierarchy and name
/// assert!(collection.add(GeneSet::new(["KEGG"], "apoptosis", ["X"])).is_err());
/// assert_eq!(collection.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GeneSetCollection {
    sets: Vec<GeneSet>,
    index: HashMap<(Vec<String>, String), usize>,
}

impl GeneSetCollection {
    /// Constructs a new, empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from gene sets
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if two sets share hierarchy and name
    pub fn from_sets<I: IntoIterator<Item = GeneSet>>(sets: I) -> GeneSigResult<Self> {
        let mut collection = Self::new();
        for set in sets {
            collection.add(set)?;
        }
        Ok(collection)
    }

    /// Adds a gene set
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if a set with the same hierarchy and name exists
    pub fn add(&mut self, set: GeneSet) -> GeneSigResult<()> {
        let key = (set.hierarchy.clone(), set.name.clone());
        if self.index.contains_key(&key) {
            return Err(GeneSigError::InvalidInput(format!(
                "duplicate gene set {}",
                set.cname()
            )));
        }
        self.index.insert(key, self.sets.len());
        self.sets.push(set);
        Ok(())
    }

    /// Returns the set with the given hierarchy and name
    pub fn get(&self, hierarchy: &[String], name: &str) -> Option<&GeneSet> {
        self.index
            .get(&(hierarchy.to_vec(), name.to_string()))
            .map(|idx| &self.sets[*idx])
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Iterates the sets in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, GeneSet> {
        self.sets.iter()
    }

    /// The union of the genes of all sets
    pub fn genes(&self) -> BTreeSet<&str> {
        self.sets
            .iter()
            .flat_map(|s| s.genes.iter().map(String::as_str))
            .collect()
    }

    /// The distinct hierarchies, in order of first appearance
    pub fn hierarchies(&self) -> Vec<&[String]> {
        let mut seen = HashSet::new();
        self.sets
            .iter()
            .map(|s| s.hierarchy.as_slice())
            .filter(|h| seen.insert(*h))
            .collect()
    }

    /// The longest hierarchy prefix shared by all sets
    ///
    /// # Examples
    ///
    /// ```
    /// use genesig::{GeneSet, GeneSetCollection};
    ///
    /// let collection = GeneSetCollection::from_sets([
    ///     GeneSet::new(["GO", "BP"], "a", ["A"]),
    ///     GeneSet::new(["GO", "MF"], "b", ["B"]),
    /// ]).unwrap();
    /// assert_eq!(collection.common_hierarchy(), vec!["GO".to_string()]);
    /// ```
    pub fn common_hierarchy(&self) -> Vec<String> {
        let mut sets = self.sets.iter();
        let Some(first) = sets.next() else {
            return Vec::new();
        };
        let mut common = first.hierarchy.len();
        for set in sets {
            common = first
                .hierarchy
                .iter()
                .zip(set.hierarchy.iter())
                .take(common)
                .take_while(|(a, b)| a == b)
                .count();
        }
        first.hierarchy[..common].to_vec()
    }

    /// Splits the collection into one collection per hierarchy
    pub fn split_by_hierarchy(&self) -> Vec<GeneSetCollection> {
        let mut groups: Vec<GeneSetCollection> = Vec::new();
        let mut group_of: HashMap<&[String], usize> = HashMap::new();
        for set in &self.sets {
            let group = *group_of.entry(set.hierarchy.as_slice()).or_insert_with(|| {
                groups.push(GeneSetCollection::new());
                groups.len() - 1
            });
            // keys are unique in self, so they are unique in every group
            let key = (set.hierarchy.clone(), set.name.clone());
            let pos = groups[group].sets.len();
            groups[group].index.insert(key, pos);
            groups[group].sets.push(set.clone());
        }
        groups
    }

    /// Retains sets by their overlap with `universe`
    ///
    /// A set is kept if the number of its genes in `universe` is within
    /// `[min_size, max_size]` and that number divided by the set size is at
    /// least `min_fraction`.
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if `min_fraction` is outside of `[0, 1]`
    /// or `min_size > max_size`
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::HashSet;
    /// use genesig::{GeneSet, GeneSetCollection};
    ///
    /// let collection = GeneSetCollection::from_sets([
    ///     GeneSet::new(["X"], "small", ["A"]),
    ///     GeneSet::new(["X"], "covered", ["A", "B", "C"]),
    ///     GeneSet::new(["X"], "sparse", ["A", "B", "Q", "R", "S", "T", "U", "V", "W"]),
    /// ]).unwrap();
    /// let universe: HashSet<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
    ///
    /// let filtered = collection.filter(&universe, 2, 10, 0.5).unwrap();
    /// assert_eq!(filtered.len(), 1);
    /// assert_eq!(filtered.iter().next().unwrap().name(), "covered");
    /// ```
    pub fn filter(
        &self,
        universe: &HashSet<String>,
        min_size: usize,
        max_size: usize,
        min_fraction: f64,
    ) -> GeneSigResult<Self> {
        validate_size_filter(min_size, max_size, min_fraction)?;
        let mut res = Self::new();
        for set in &self.sets {
            let present = set.count_in(universe);
            if passes_size_filter(present, set.len(), min_size, max_size, min_fraction) {
                res.add(set.clone())?;
            } else {
                trace!("Filtered gene set {} ({} of {} present)", set.cname(), present, set.len());
            }
        }
        debug!("Retained {} of {} gene sets", res.len(), self.len());
        Ok(res)
    }

    /// Resolves the genes of every set to positions in `targets`
    ///
    /// Every target and every gene is canonicalized with `matcher`. Genes
    /// without a unique match, or whose canonical identifier is not among
    /// the targets, are dropped and counted in [`ProjectedSet::unmapped`].
    /// If several targets share a canonical identifier, the first one is used.
    ///
    /// # Examples
    ///
    /// ```
    /// use genesig::{GeneSet, GeneSetCollection};
    /// use genesig::matcher::AliasMatcher;
    ///
    /// let collection = GeneSetCollection::from_sets([
    ///     GeneSet::new(["X"], "s", ["p53", "KRAS", "UNKNOWN"]),
    /// ]).unwrap();
    /// let matcher = AliasMatcher::new([("p53", "TP53"), ("kras", "KRAS")], false);
    /// let targets = vec!["KRAS".to_string(), "MYC".to_string(), "TP53".to_string()];
    ///
    /// let projected = collection.project(&matcher, &targets);
    /// assert_eq!(projected[0].indices(), &[0, 2]);
    /// assert_eq!(projected[0].unmapped(), 1);
    /// ```
    pub fn project<'a>(
        &'a self,
        matcher: &dyn Matcher,
        targets: &[String],
    ) -> Vec<ProjectedSet<'a>> {
        let mut position: HashMap<String, usize> = HashMap::with_capacity(targets.len());
        for (idx, target) in targets.iter().enumerate() {
            if let Some(canonical) = matcher.umatch(target) {
                position.entry(canonical).or_insert(idx);
            }
        }

        self.sets
            .iter()
            .map(|set| {
                let mut found: Vec<(usize, String)> = Vec::with_capacity(set.len());
                let mut seen = HashSet::new();
                let mut unmapped = 0;
                for gene in &set.genes {
                    match matcher
                        .umatch(gene)
                        .and_then(|c| position.get(&c).map(|idx| (*idx, c)))
                    {
                        Some((idx, canonical)) => {
                            if seen.insert(idx) {
                                found.push((idx, canonical));
                            }
                        }
                        None => unmapped += 1,
                    }
                }
                found.sort_unstable();
                let (indices, genes) = found.into_iter().unzip();
                ProjectedSet {
                    set,
                    genes,
                    indices,
                    unmapped,
                }
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a GeneSetCollection {
    type Item = &'a GeneSet;
    type IntoIter = std::slice::Iter<'a, GeneSet>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Checks the parameters shared by all size filters
pub(crate) fn validate_size_filter(
    min_size: usize,
    max_size: usize,
    min_fraction: f64,
) -> GeneSigResult<()> {
    if !(0.0..=1.0).contains(&min_fraction) {
        return Err(GeneSigError::InvalidInput(format!(
            "min_fraction must be within [0, 1], got {min_fraction}"
        )));
    }
    if min_size > max_size {
        return Err(GeneSigError::InvalidInput(format!(
            "min_size ({min_size}) is larger than max_size ({max_size})"
        )));
    }
    Ok(())
}

/// `present` within `[min_size, max_size]` and `present / total >= min_fraction`
pub(crate) fn passes_size_filter(
    present: usize,
    total: usize,
    min_size: usize,
    max_size: usize,
    min_fraction: f64,
) -> bool {
    if present < min_size || present > max_size || total == 0 {
        return false;
    }
    f64_from_usize(present) / f64_from_usize(total) >= min_fraction
}
