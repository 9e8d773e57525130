//! GO terms, their identifiers and relations
//!
//! [`TermRecord`] is the parsed input format of a term, [`GoTerm`] is the
//! read-only view of a term inside a loaded [`crate::GoGraph`].

use std::fmt::Display;
use std::str::FromStr;

use crate::{GeneSigError, GeneSigResult};

mod goterm;
mod gotermid;
pub(crate) mod internal;
mod termset;

pub use goterm::GoTerm;
pub use gotermid::GoTermId;
pub(crate) use termset::TermSet;

/// The three GO namespaces (also called aspects)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    BiologicalProcess,
    MolecularFunction,
    CellularComponent,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [
        Self::BiologicalProcess,
        Self::MolecularFunction,
        Self::CellularComponent,
    ];

    /// The single-letter aspect code: `P`, `F` or `C`
    pub fn code(&self) -> char {
        match self {
            Self::BiologicalProcess => 'P',
            Self::MolecularFunction => 'F',
            Self::CellularComponent => 'C',
        }
    }

    /// The OBO namespace name, e.g. `biological_process`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BiologicalProcess => "biological_process",
            Self::MolecularFunction => "molecular_function",
            Self::CellularComponent => "cellular_component",
        }
    }
}

impl FromStr for Namespace {
    type Err = GeneSigError;

    /// Parses the long namespace name or the single-letter aspect code
    ///
    /// # Examples
    ///
    /// ```
    /// use genesig::Namespace;
    ///
    /// assert_eq!("P".parse::<Namespace>().unwrap(), Namespace::BiologicalProcess);
    /// let cc = "cellular_component".parse::<Namespace>().unwrap();
    /// assert_eq!(cc, Namespace::CellularComponent);
    /// assert!("X".parse::<Namespace>().is_err());
    /// ```
    fn from_str(s: &str) -> GeneSigResult<Self> {
        match s {
            "P" | "biological_process" => Ok(Self::BiologicalProcess),
            "F" | "molecular_function" => Ok(Self::MolecularFunction),
            "C" | "cellular_component" => Ok(Self::CellularComponent),
            _ => Err(GeneSigError::InvalidInput(format!("unknown namespace '{s}'"))),
        }
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of an edge from a term to its parent
///
/// All relations are followed when computing ancestors and descendants.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    #[default]
    IsA,
    PartOf,
    Regulates,
    PositivelyRegulates,
    NegativelyRegulates,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsA => "is_a",
            Self::PartOf => "part_of",
            Self::Regulates => "regulates",
            Self::PositivelyRegulates => "positively_regulates",
            Self::NegativelyRegulates => "negatively_regulates",
        }
    }
}

impl FromStr for Relation {
    type Err = GeneSigError;
    fn from_str(s: &str) -> GeneSigResult<Self> {
        match s {
            "is_a" => Ok(Self::IsA),
            "part_of" => Ok(Self::PartOf),
            "regulates" => Ok(Self::Regulates),
            "positively_regulates" => Ok(Self::PositivelyRegulates),
            "negatively_regulates" => Ok(Self::NegativelyRegulates),
            _ => Err(GeneSigError::InvalidInput(format!("unknown relation '{s}'"))),
        }
    }
}

impl Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed GO term, the input of [`crate::GoGraph::load`]
///
/// # Examples
///
/// ```
/// use genesig::{Namespace, Relation, TermRecord};
///
/// let term = TermRecord::new(6915u32, "apoptotic process", Namespace::BiologicalProcess)
///     .with_parent(12501u32, Relation::IsA)
///     .with_alt_id(6917u32);
/// assert_eq!(term.id.to_string(), "GO:0006915");
/// assert_eq!(term.parents.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TermRecord {
    pub id: GoTermId,
    pub alt_ids: Vec<GoTermId>,
    pub name: String,
    pub namespace: Namespace,
    pub parents: Vec<(GoTermId, Relation)>,
    pub definition: Option<String>,
    pub obsolete: bool,
    /// Names of the slim subsets the term belongs to, e.g. `goslim_generic`
    pub subsets: Vec<String>,
}

impl TermRecord {
    pub fn new<I: Into<GoTermId>>(id: I, name: &str, namespace: Namespace) -> Self {
        Self {
            id: id.into(),
            alt_ids: Vec::new(),
            name: name.to_string(),
            namespace,
            parents: Vec::new(),
            definition: None,
            obsolete: false,
            subsets: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_parent<I: Into<GoTermId>>(mut self, parent: I, relation: Relation) -> Self {
        self.parents.push((parent.into(), relation));
        self
    }

    #[must_use]
    pub fn with_alt_id<I: Into<GoTermId>>(mut self, alt_id: I) -> Self {
        self.alt_ids.push(alt_id.into());
        self
    }

    #[must_use]
    pub fn with_definition(mut self, definition: &str) -> Self {
        self.definition = Some(definition.to_string());
        self
    }

    #[must_use]
    pub fn with_subset(mut self, subset: &str) -> Self {
        self.subsets.push(subset.to_string());
        self
    }

    #[must_use]
    pub fn obsolete(mut self) -> Self {
        self.obsolete = true;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn namespace_codes() {
        for ns in Namespace::ALL {
            assert_eq!(ns.code().to_string().parse::<Namespace>().unwrap(), ns);
            assert_eq!(ns.as_str().parse::<Namespace>().unwrap(), ns);
        }
        assert!("p".parse::<Namespace>().is_err());
    }

    #[test]
    fn relations() {
        assert_eq!("part_of".parse::<Relation>().unwrap(), Relation::PartOf);
        assert_eq!(Relation::default(), Relation::IsA);
        assert!("has_part".parse::<Relation>().is_err());
    }
}
