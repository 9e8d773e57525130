//! Resolution of gene tokens to canonical gene identifiers
//!
//! An [`AliasMap`] maps every known token (symbol, synonym, accession)
//! to the canonical identifier of its alias class. An [`AliasMatcher`] wraps
//! an `AliasMap` and can be restricted to a target universe, e.g. the genes
//! measured in an experiment. Several matchers can be combined into a
//! [`MatcherChain`].
//!
//! # Examples
//!
//! ```
//! use genesig::matcher::{AliasMatcher, Matcher};
//!
//! let matcher = AliasMatcher::new(
//!     [("A", "G1"), ("a1", "G1"), ("B", "G2")],
//!     false,
//! );
//! assert_eq!(matcher.umatch("a1").as_deref(), Some("G1"));
//! assert_eq!(matcher.umatch("A1").as_deref(), Some("G1"));
//! assert_eq!(matcher.umatch("C"), None);
//! assert_eq!(matcher.umatch("G1").as_deref(), Some("G1"));
//! ```

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;
use tracing::{debug, trace};

/// Canonical identifiers a token resolves to, usually exactly one
type Canonicals = SmallVec<[u32; 1]>;

/// Mapping of gene tokens to canonical identifiers
///
/// Canonical identifiers are keys of the map and resolve to themselves.
/// A token that is registered for two different canonical identifiers
/// is ambiguous and resolves to both of them.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    case_sensitive: bool,
    canonicals: Vec<String>,
    canonical_index: HashMap<String, u32>,
    aliases: HashMap<String, Canonicals>,
}

impl AliasMap {
    /// Constructs an empty `AliasMap`
    ///
    /// Token lookup ignores case unless `case_sensitive` is set. Canonical
    /// identifiers are always returned as they were first inserted.
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            ..Default::default()
        }
    }

    /// Builds an `AliasMap` from `(token, canonical)` pairs
    pub fn from_pairs<I, S, T>(aliases: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut map = Self::new(case_sensitive);
        for (token, canonical) in aliases {
            map.insert(token.as_ref(), canonical.as_ref());
        }
        map
    }

    /// Builds an `AliasMap` from sets of equivalent tokens
    ///
    /// Sets that share a token are merged first (see [`join_alias_sets`]).
    /// The first token of each merged set becomes the canonical identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use genesig::AliasMap;
    ///
    /// let map = AliasMap::from_alias_sets(
    ///     vec![vec!["TP53", "p53"], vec!["p53", "LFS1"], vec!["KRAS"]],
    ///     false,
    /// );
    /// assert_eq!(map.lookup("lfs1"), vec!["TP53"]);
    /// assert_eq!(map.lookup("KRAS"), vec!["KRAS"]);
    /// ```
    pub fn from_alias_sets<I, J, S>(sets: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = J>,
        J: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = Self::new(case_sensitive);
        for set in join_alias_sets(sets, case_sensitive) {
            let Some(canonical) = set.first() else {
                continue;
            };
            for token in &set {
                map.insert(token, canonical);
            }
        }
        map
    }

    fn fold(&self, token: &str) -> String {
        if self.case_sensitive {
            token.to_string()
        } else {
            token.to_lowercase()
        }
    }

    /// Registers `token` as an alias of `canonical`
    ///
    /// `canonical` itself is registered as well. Registering a token for a
    /// second, different canonical identifier makes it ambiguous.
    pub fn insert(&mut self, token: &str, canonical: &str) {
        let folded_canonical = self.fold(canonical);
        let idx = match self.canonical_index.get(&folded_canonical) {
            Some(idx) => *idx,
            None => {
                let idx = u32::try_from(self.canonicals.len()).unwrap_or(u32::MAX);
                self.canonicals.push(canonical.to_string());
                self.canonical_index.insert(folded_canonical.clone(), idx);
                idx
            }
        };
        self.add_alias(folded_canonical, idx);
        let folded_token = self.fold(token);
        self.add_alias(folded_token, idx);
    }

    fn add_alias(&mut self, folded: String, idx: u32) {
        let entry = self.aliases.entry(folded).or_default();
        if !entry.contains(&idx) {
            if !entry.is_empty() {
                trace!("Alias maps to {} canonical identifiers", entry.len() + 1);
            }
            entry.push(idx);
        }
    }

    /// Returns `true` if token lookup respects case
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// The number of canonical identifiers
    pub fn len(&self) -> usize {
        self.canonicals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonicals.is_empty()
    }

    /// All canonical identifiers a token resolves to
    pub fn lookup(&self, token: &str) -> Vec<&str> {
        self.aliases
            .get(&self.fold(token))
            .map(|ids| {
                ids.iter()
                    .map(|idx| self.canonicals[*idx as usize].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns `true` if the token resolves to more than one canonical identifier
    pub fn is_ambiguous(&self, token: &str) -> bool {
        self.aliases
            .get(&self.fold(token))
            .is_some_and(|ids| ids.len() > 1)
    }

    /// Iterates all canonical identifiers
    pub fn canonicals(&self) -> impl Iterator<Item = &str> {
        self.canonicals.iter().map(String::as_str)
    }
}

/// Merges sets of tokens that share at least one token
///
/// The result contains every token once. Sets keep the order of their first
/// appearance, tokens the order in which they were seen.
///
/// # Examples
///
/// ```
/// use genesig::matcher::join_alias_sets;
///
/// let joined = join_alias_sets(vec![vec!["a", "b"], vec!["c"], vec!["B", "d"]], false);
/// assert_eq!(joined, vec![vec!["a", "b", "d"], vec!["c"]]);
/// ```
pub fn join_alias_sets<I, J, S>(sets: I, case_sensitive: bool) -> Vec<Vec<String>>
where
    I: IntoIterator<Item = J>,
    J: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let fold = |s: &str| {
        if case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    };

    let mut tokens: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut parent: Vec<usize> = Vec::new();

    for set in sets {
        let mut first: Option<usize> = None;
        for token in set {
            let token = token.as_ref();
            let idx = *index.entry(fold(token)).or_insert_with(|| {
                tokens.push(token.to_string());
                parent.push(parent.len());
                parent.len() - 1
            });
            match first {
                None => first = Some(idx),
                Some(root) => {
                    let a = find(&mut parent, root);
                    let b = find(&mut parent, idx);
                    if a != b {
                        // the older class stays the root
                        let (keep, merge) = if a < b { (a, b) } else { (b, a) };
                        parent[merge] = keep;
                    }
                }
            }
        }
    }

    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    for idx in 0..tokens.len() {
        let root = find(&mut parent, idx);
        let group = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(tokens[idx].clone());
    }
    groups
}

/// Resolves gene tokens to canonical identifiers
///
/// Implementations must be safe to share across threads after construction.
pub trait Matcher: Send + Sync {
    /// Restricts all subsequent matches to canonical identifiers of `targets`
    ///
    /// Without targets, matches are resolved against the full alias map.
    fn set_targets(&mut self, targets: &[String]);

    /// All canonical identifiers `token` resolves to
    ///
    /// An empty result means the token is unknown, more than one result
    /// means it is ambiguous.
    fn matches(&self, token: &str) -> Vec<String>;

    /// The canonical identifier, if `token` resolves to exactly one
    fn umatch(&self, token: &str) -> Option<String> {
        let mut res = self.matches(token);
        if res.len() == 1 {
            res.pop()
        } else {
            None
        }
    }

    /// Partitions tokens into unique, ambiguous and unknown matches
    ///
    /// Duplicate tokens are only considered once.
    fn partition(&self, tokens: &[String]) -> MatchReport {
        let mut report = MatchReport::default();
        let mut seen: HashSet<&str> = HashSet::new();
        for token in tokens {
            if !seen.insert(token.as_str()) {
                continue;
            }
            let mut res = self.matches(token);
            match res.len() {
                0 => report.unknown.push(token.clone()),
                1 => {
                    if let Some(canonical) = res.pop() {
                        report.unique.push((token.clone(), canonical));
                    }
                }
                _ => report.ambiguous.push((token.clone(), res)),
            }
        }
        debug!(
            "Matched {} of {} genes ({} ambiguous, {} unknown)",
            report.unique.len(),
            seen.len(),
            report.ambiguous.len(),
            report.unknown.len()
        );
        report
    }
}

/// The outcome of [`Matcher::partition`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    /// Tokens with exactly one canonical identifier
    pub unique: Vec<(String, String)>,
    /// Tokens with more than one canonical identifier
    pub ambiguous: Vec<(String, Vec<String>)>,
    /// Tokens without any canonical identifier
    pub unknown: Vec<String>,
}

impl MatchReport {
    /// The distinct canonical identifiers of all unique matches
    pub fn canonicals(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.unique
            .iter()
            .filter(|(_, c)| seen.insert(c.as_str()))
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// The number of tokens that were looked up
    pub fn total(&self) -> usize {
        self.unique.len() + self.ambiguous.len() + self.unknown.len()
    }
}

/// A [`Matcher`] backed by an [`AliasMap`]
///
/// # Examples
///
/// ```
/// use genesig::matcher::{AliasMatcher, Matcher};
///
/// let mut matcher = AliasMatcher::new([("p53", "TP53"), ("K-ras", "KRAS")], false);
/// assert_eq!(matcher.umatch("k-RAS").as_deref(), Some("KRAS"));
///
/// // only genes measured in the experiment
/// matcher.set_targets(&["tp53".to_string()]);
/// assert_eq!(matcher.umatch("p53").as_deref(), Some("TP53"));
/// assert_eq!(matcher.umatch("K-ras"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AliasMatcher {
    aliases: AliasMap,
    targets: Option<HashMap<String, String>>,
}

impl AliasMatcher {
    /// Constructs a matcher from `(token, canonical)` pairs
    pub fn new<I, S, T>(aliases: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self::from_map(AliasMap::from_pairs(aliases, case_sensitive))
    }

    pub fn from_map(aliases: AliasMap) -> Self {
        Self {
            aliases,
            targets: None,
        }
    }

    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    fn fold(&self, token: &str) -> String {
        self.aliases.fold(token)
    }
}

impl Matcher for AliasMatcher {
    /// Every target is canonicalized through the alias map. Targets that are
    /// not part of the map stand for themselves.
    fn set_targets(&mut self, targets: &[String]) {
        let mut canonical_targets = HashMap::new();
        for target in targets {
            let resolved = self.aliases.lookup(target);
            if resolved.is_empty() {
                canonical_targets.insert(self.fold(target), target.clone());
            } else {
                for canonical in resolved {
                    canonical_targets.insert(self.fold(canonical), canonical.to_string());
                }
            }
        }
        debug!(
            "Restricting matcher to {} canonical targets",
            canonical_targets.len()
        );
        self.targets = Some(canonical_targets);
    }

    fn matches(&self, token: &str) -> Vec<String> {
        let resolved = self.aliases.lookup(token);
        match &self.targets {
            None => resolved.into_iter().map(str::to_string).collect(),
            Some(targets) if resolved.is_empty() => targets
                .get(&self.fold(token))
                .map(|t| vec![t.clone()])
                .unwrap_or_default(),
            Some(targets) => resolved
                .into_iter()
                .filter_map(|canonical| targets.get(&self.fold(canonical)).cloned())
                .collect(),
        }
    }
}

/// How a [`MatcherChain`] combines its matchers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    /// The result of the first matcher that resolves the token
    #[default]
    FirstMatch,
    /// The union of the results of all matchers
    Union,
}

/// Several matchers applied in the declared order
///
/// # Examples
///
/// ```
/// use genesig::matcher::{AliasMatcher, ChainMode, Matcher, MatcherChain};
///
/// let symbols = AliasMatcher::new([("p53", "TP53")], false);
/// let entrez = AliasMatcher::new([("7157", "TP53"), ("3845", "KRAS")], false);
///
/// let chain = MatcherChain::new(ChainMode::FirstMatch)
///     .with(Box::new(symbols))
///     .with(Box::new(entrez));
/// assert_eq!(chain.umatch("3845").as_deref(), Some("KRAS"));
/// assert_eq!(chain.umatch("p53").as_deref(), Some("TP53"));
/// ```
#[derive(Default)]
pub struct MatcherChain {
    matchers: Vec<Box<dyn Matcher>>,
    mode: ChainMode,
}

impl MatcherChain {
    pub fn new(mode: ChainMode) -> Self {
        Self {
            matchers: Vec::new(),
            mode,
        }
    }

    /// Appends a matcher to the chain
    #[must_use]
    pub fn with(mut self, matcher: Box<dyn Matcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn push(&mut self, matcher: Box<dyn Matcher>) {
        self.matchers.push(matcher);
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for MatcherChain {
    fn set_targets(&mut self, targets: &[String]) {
        for matcher in &mut self.matchers {
            matcher.set_targets(targets);
        }
    }

    fn matches(&self, token: &str) -> Vec<String> {
        match self.mode {
            ChainMode::FirstMatch => self
                .matchers
                .iter()
                .map(|m| m.matches(token))
                .find(|res| !res.is_empty())
                .unwrap_or_default(),
            ChainMode::Union => {
                let mut res: Vec<String> = Vec::new();
                for matcher in &self.matchers {
                    for canonical in matcher.matches(token) {
                        if !res.contains(&canonical) {
                            res.push(canonical);
                        }
                    }
                }
                res
            }
        }
    }
}

/// A matcher that only accepts tokens that literally are canonical identifiers
///
/// Useful as the last element of a [`MatcherChain`] when the data already
/// uses canonical identifiers.
#[derive(Debug, Clone, Default)]
pub struct IdentityMatcher {
    case_sensitive: bool,
    targets: Option<HashMap<String, String>>,
}

impl IdentityMatcher {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            targets: None,
        }
    }

    fn fold(&self, token: &str) -> String {
        if self.case_sensitive {
            token.to_string()
        } else {
            token.to_lowercase()
        }
    }
}

impl Matcher for IdentityMatcher {
    fn set_targets(&mut self, targets: &[String]) {
        self.targets = Some(
            targets
                .iter()
                .map(|t| (self.fold(t), t.clone()))
                .collect(),
        );
    }

    fn matches(&self, token: &str) -> Vec<String> {
        match &self.targets {
            None => vec![token.to_string()],
            Some(targets) => targets
                .get(&self.fold(token))
                .map(|t| vec![t.clone()])
                .unwrap_or_default(),
        }
    }
}
