#![doc = include_str!("../README.md")]

use std::num::ParseIntError;
use thiserror::Error;

pub mod annotations;
pub mod enrichment;
pub mod geneset;
pub mod gsea;
pub mod masked;
pub mod matcher;
pub mod matrix;
pub mod normalize;
pub mod ontology;
pub mod progress;
pub mod stats;
pub mod term;

pub use annotations::{AnnotationRecord, EvidenceCode, EvidenceMask};
pub use enrichment::{
    EnrichmentConfig, EnrichmentEngine, EnrichmentReport, EnrichmentResult, EnrichmentSource,
    UnderflowPolicy,
};
pub use geneset::{GeneSet, GeneSetCollection};
pub use gsea::{GseaConfig, GseaEngine, GseaReport, GseaResult, PermutationMode, RankingMethod};
pub use masked::MaskedVec;
pub use matcher::{AliasMap, AliasMatcher, Matcher};
pub use matrix::{ExpressionMatrix, Sample};
pub use normalize::{CenterMethod, MaConfig, MaNormalizer, MaResult, MergeFn};
pub use ontology::{GoGraph, IssueKind, LoadIssues};
pub use progress::{CancelFlag, NoProgress, ProgressSink};
pub use term::{GoTerm, GoTermId, Namespace, Relation, TermRecord};

const DEFAULT_NUM_PARENTS: usize = 4;

/// Error type of all fallible `genesig` operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneSigError {
    /// The input violates the contract of the called operation
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The ontology data is inconsistent (cycles, dangling references)
    #[error("ontology integrity: {0}")]
    OntologyIntegrity(String),
    /// A probability underflowed to zero
    #[error("numeric underflow")]
    NumericUnderflow,
    /// The caller requested cancellation through its `ProgressSink`
    #[error("cancelled")]
    Cancelled,
    /// The requested term does not exist
    #[error("term does not exist")]
    DoesNotExist,
    /// An identifier could not be parsed into an integer
    #[error("unable to parse Integer")]
    ParseIntError,
}

impl From<ParseIntError> for GeneSigError {
    fn from(_: ParseIntError) -> Self {
        GeneSigError::ParseIntError
    }
}

/// Shortcut for `Result<T, GeneSigError>`
pub type GeneSigResult<T> = Result<T, GeneSigError>;

/// Counts of input records an engine did not use, by reason
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rejections {
    /// Gene tokens the matcher could not resolve
    pub unknown: usize,
    /// Gene tokens that resolve to more than one canonical identifier
    pub ambiguous: usize,
    /// Genes without enough values
    pub missing_value: usize,
    /// Terms or gene sets outside of the configured size limits
    pub failed_size_filter: usize,
}

/// Counts are always far below 2^52, so the conversion is lossless
#[allow(clippy::cast_precision_loss)]
pub(crate) fn f64_from_usize(n: usize) -> f64 {
    n as f64
}

/// Counts are always far below 2^52, so the conversion is lossless
#[allow(clippy::cast_precision_loss)]
pub(crate) fn f64_from_u64(n: u64) -> f64 {
    n as f64
}

/// Orders two `f64`, treating `NaN` as larger than any number
pub(crate) fn cmp_f64(a: f64, b: f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a.total_cmp(&b),
    }
}
