//! Gene-to-term annotation records and evidence codes
//!
//! Annotations connect canonical gene identifiers to [`GoTermId`]s.
//! Every annotation carries an [`EvidenceCode`], enrichment analyses
//! only consider annotations whose evidence is part of an [`EvidenceMask`].

use std::fmt::Display;
use std::ops::{BitOr, Not};
use std::str::FromStr;

use crate::term::{GoTermId, Namespace};
use crate::{GeneSigError, GeneSigResult};

/// The GO Consortium evidence codes
///
/// The discriminant is the bit position of the code inside an [`EvidenceMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EvidenceCode {
    /// Inferred from Experiment
    Exp = 0,
    /// Inferred from Direct Assay
    Ida,
    /// Inferred from Physical Interaction
    Ipi,
    /// Inferred from Mutant Phenotype
    Imp,
    /// Inferred from Genetic Interaction
    Igi,
    /// Inferred from Expression Pattern
    Iep,
    /// Inferred from Sequence Similarity
    Iss,
    /// Inferred from Sequence Alignment
    Isa,
    /// Inferred from Sequence Orthology
    Iso,
    /// Inferred from Sequence Model
    Ism,
    /// Inferred from Genomic Context
    Igc,
    /// Inferred from Reviewed Computational Analysis
    Rca,
    /// Traceable Author Statement
    Tas,
    /// Non-traceable Author Statement
    Nas,
    /// Inferred by Curator
    Ic,
    /// No biological Data available
    Nd,
    /// Inferred from Electronic Annotation
    Iea,
    /// Not Recorded
    Nr,
}

impl EvidenceCode {
    /// All codes, ordered from experimental to electronic evidence
    pub const ALL: [EvidenceCode; 18] = [
        Self::Exp,
        Self::Ida,
        Self::Ipi,
        Self::Imp,
        Self::Igi,
        Self::Iep,
        Self::Iss,
        Self::Isa,
        Self::Iso,
        Self::Ism,
        Self::Igc,
        Self::Rca,
        Self::Tas,
        Self::Nas,
        Self::Ic,
        Self::Nd,
        Self::Iea,
        Self::Nr,
    ];

    /// The three-letter code, e.g. `IDA`
    pub fn code(&self) -> &'static str {
        match self {
            Self::Exp => "EXP",
            Self::Ida => "IDA",
            Self::Ipi => "IPI",
            Self::Imp => "IMP",
            Self::Igi => "IGI",
            Self::Iep => "IEP",
            Self::Iss => "ISS",
            Self::Isa => "ISA",
            Self::Iso => "ISO",
            Self::Ism => "ISM",
            Self::Igc => "IGC",
            Self::Rca => "RCA",
            Self::Tas => "TAS",
            Self::Nas => "NAS",
            Self::Ic => "IC",
            Self::Nd => "ND",
            Self::Iea => "IEA",
            Self::Nr => "NR",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Exp => "Inferred from Experiment",
            Self::Ida => "Inferred from Direct Assay",
            Self::Ipi => "Inferred from Physical Interaction",
            Self::Imp => "Inferred from Mutant Phenotype",
            Self::Igi => "Inferred from Genetic Interaction",
            Self::Iep => "Inferred from Expression Pattern",
            Self::Iss => "Inferred from Sequence Similarity",
            Self::Isa => "Inferred from Sequence Alignment",
            Self::Iso => "Inferred from Sequence Orthology",
            Self::Ism => "Inferred from Sequence Model",
            Self::Igc => "Inferred from Genomic Context",
            Self::Rca => "Inferred from Reviewed Computational Analysis",
            Self::Tas => "Traceable Author Statement",
            Self::Nas => "Non-traceable Author Statement",
            Self::Ic => "Inferred by Curator",
            Self::Nd => "No biological Data available",
            Self::Iea => "Inferred from Electronic Annotation",
            Self::Nr => "Not Recorded",
        }
    }

    /// `true` for the experimental codes `EXP`, `IDA`, `IPI`, `IMP`, `IGI` and `IEP`
    pub fn is_experimental(&self) -> bool {
        (*self as u8) <= (Self::Iep as u8)
    }

    fn bit(self) -> u32 {
        1 << (self as u8)
    }
}

impl FromStr for EvidenceCode {
    type Err = GeneSigError;

    /// Parses the three-letter code, case-sensitive
    fn from_str(s: &str) -> GeneSigResult<Self> {
        Self::ALL
            .iter()
            .find(|code| code.code() == s)
            .copied()
            .ok_or_else(|| GeneSigError::InvalidInput(format!("unknown evidence code '{s}'")))
    }
}

impl Display for EvidenceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A set of [`EvidenceCode`]s, encoded as a bitset
///
/// The default mask contains all codes.
///
/// # Examples
///
/// ```
/// use genesig::{EvidenceCode, EvidenceMask};
///
/// let mask = EvidenceMask::from_codes([EvidenceCode::Ida, EvidenceCode::Imp]);
/// assert!(mask.contains(EvidenceCode::Ida));
/// assert!(!mask.contains(EvidenceCode::Iea));
///
/// let without_iea = !EvidenceMask::from(EvidenceCode::Iea);
/// assert!(without_iea.contains(EvidenceCode::Ida));
/// assert!(!without_iea.contains(EvidenceCode::Iea));
/// assert_eq!(without_iea.len(), 17);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvidenceMask {
    bits: u32,
}

impl EvidenceMask {
    const FULL: u32 = (1 << EvidenceCode::ALL.len()) - 1;

    /// A mask containing every evidence code
    pub fn all() -> Self {
        Self { bits: Self::FULL }
    }

    /// A mask without any evidence code
    pub fn none() -> Self {
        Self { bits: 0 }
    }

    /// The experimental evidence codes only
    pub fn experimental() -> Self {
        Self::from_codes(EvidenceCode::ALL.iter().copied().filter(EvidenceCode::is_experimental))
    }

    pub fn from_codes<I: IntoIterator<Item = EvidenceCode>>(codes: I) -> Self {
        Self {
            bits: codes.into_iter().fold(0, |bits, code| bits | code.bit()),
        }
    }

    /// Builds a mask from three-letter codes
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if a code is unknown
    pub fn parse<'a, I: IntoIterator<Item = &'a str>>(codes: I) -> GeneSigResult<Self> {
        let codes = codes
            .into_iter()
            .map(EvidenceCode::from_str)
            .collect::<GeneSigResult<Vec<_>>>()?;
        Ok(Self::from_codes(codes))
    }

    pub fn contains(&self, code: EvidenceCode) -> bool {
        self.bits & code.bit() != 0
    }

    pub fn insert(&mut self, code: EvidenceCode) {
        self.bits |= code.bit();
    }

    pub fn remove(&mut self, code: EvidenceCode) {
        self.bits &= !code.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// The number of codes in the mask
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Iterates the codes of the mask in canonical order
    pub fn iter(&self) -> impl Iterator<Item = EvidenceCode> + '_ {
        EvidenceCode::ALL.iter().copied().filter(move |c| self.contains(*c))
    }
}

impl Default for EvidenceMask {
    fn default() -> Self {
        Self::all()
    }
}

impl From<EvidenceCode> for EvidenceMask {
    fn from(code: EvidenceCode) -> Self {
        Self { bits: code.bit() }
    }
}

impl BitOr for EvidenceMask {
    type Output = EvidenceMask;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self {
            bits: self.bits | rhs.bits,
        }
    }
}

impl Not for EvidenceMask {
    type Output = EvidenceMask;
    fn not(self) -> Self::Output {
        Self {
            bits: !self.bits & Self::FULL,
        }
    }
}

/// A single gene-to-term annotation, as parsed from an annotation file
///
/// `gene` is expected to be a canonical gene identifier. `go_id` may be a
/// primary or a secondary (alt) id of the term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRecord {
    pub gene: String,
    pub go_id: GoTermId,
    pub evidence: EvidenceCode,
    /// The aspect column of the annotation, if known
    pub aspect: Option<Namespace>,
    /// `true` if the annotation is qualified with `NOT`
    pub negated: bool,
}

impl AnnotationRecord {
    /// Constructs a positive annotation without aspect
    pub fn new<I: Into<GoTermId>>(gene: &str, go_id: I, evidence: EvidenceCode) -> Self {
        Self {
            gene: gene.to_string(),
            go_id: go_id.into(),
            evidence,
            aspect: None,
            negated: false,
        }
    }

    #[must_use]
    pub fn with_aspect(mut self, aspect: Namespace) -> Self {
        self.aspect = Some(aspect);
        self
    }

    /// Sets the qualifier column
    ///
    /// Any qualifier list that contains `NOT` negates the annotation.
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: &str) -> Self {
        self.negated = qualifier.split('|').any(|q| q.trim() == "NOT");
        self
    }
}
