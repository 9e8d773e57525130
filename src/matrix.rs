//! A column-oriented view of expression data
//!
//! Each [`Sample`] is one column: a [`MaskedVec`] with one value per gene row
//! and a set of string labels describing the experimental factors
//! (e.g. `"class" => "tumor"`, `"channel" => "R"`).
//!
//! | gene  | sample 1 | sample 2 | sample 3 |
//! |:----- | --------:| --------:| --------:|
//! | TP53  |      1.2 |      1.4 |        - |
//! | KRAS  |      7.0 |      6.5 |      6.9 |
//!
//! The analysis engines never modify the matrix, they only derive new values.

use std::collections::BTreeMap;

use crate::masked::MaskedVec;
use crate::{GeneSigError, GeneSigResult};

/// One column of an [`ExpressionMatrix`]
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    name: String,
    labels: BTreeMap<String, String>,
    values: MaskedVec,
}

impl Sample {
    pub fn new<V: Into<MaskedVec>>(name: &str, values: V) -> Self {
        Self {
            name: name.to_string(),
            labels: BTreeMap::new(),
            values: values.into(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value of the label `key`, if the sample has it
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// One value per gene row
    pub fn values(&self) -> &MaskedVec {
        &self.values
    }
}

/// Expression values of genes (rows) across samples (columns)
///
/// # Examples
///
/// ```
/// use genesig::{ExpressionMatrix, MaskedVec, Sample};
///
/// let matrix = ExpressionMatrix::new(
///     vec!["TP53".to_string(), "KRAS".to_string()],
///     vec![
///         Sample::new("s1", vec![1.0, 7.0]).with_label("class", "tumor"),
///         Sample::new("s2", MaskedVec::from_options(vec![None, Some(6.5)]))
///             .with_label("class", "normal"),
///     ],
/// ).unwrap();
///
/// assert_eq!(matrix.n_genes(), 2);
/// assert_eq!(matrix.row(1).valid().collect::<Vec<_>>(), vec![7.0, 6.5]);
///
/// let classes = matrix.group_by_label("class").unwrap();
/// assert_eq!(classes["tumor"], vec![0]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionMatrix {
    genes: Vec<String>,
    samples: Vec<Sample>,
}

impl ExpressionMatrix {
    /// Constructs the matrix
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if a sample does not have exactly one value per gene
    pub fn new(genes: Vec<String>, samples: Vec<Sample>) -> GeneSigResult<Self> {
        if let Some(sample) = samples.iter().find(|s| s.values.len() != genes.len()) {
            return Err(GeneSigError::InvalidInput(format!(
                "sample {} has {} values for {} genes",
                sample.name,
                sample.values.len(),
                genes.len()
            )));
        }
        Ok(Self { genes, samples })
    }

    /// Builds a matrix from rows of optional values, one row per gene
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if the rows differ in length from `sample_names`
    pub fn from_rows(
        genes: Vec<String>,
        sample_names: &[&str],
        rows: &[Vec<Option<f64>>],
    ) -> GeneSigResult<Self> {
        if rows.len() != genes.len() {
            return Err(GeneSigError::InvalidInput(format!(
                "{} rows for {} genes",
                rows.len(),
                genes.len()
            )));
        }
        let mut columns: Vec<MaskedVec> = (0..sample_names.len())
            .map(|_| MaskedVec::default())
            .collect();
        for (gene, row) in genes.iter().zip(rows.iter()) {
            if row.len() != sample_names.len() {
                return Err(GeneSigError::InvalidInput(format!(
                    "row {gene} has {} values for {} samples",
                    row.len(),
                    sample_names.len()
                )));
            }
            for (column, value) in columns.iter_mut().zip(row.iter()) {
                column.push(*value);
            }
        }
        let samples = sample_names
            .iter()
            .zip(columns)
            .map(|(name, values)| Sample::new(name, values))
            .collect();
        Self::new(genes, samples)
    }

    /// Adds the label to the sample at `idx`
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if `idx` is out of bounds
    pub fn set_label(&mut self, idx: usize, key: &str, value: &str) -> GeneSigResult<()> {
        let n_samples = self.samples.len();
        let sample = self.samples.get_mut(idx).ok_or_else(|| {
            GeneSigError::InvalidInput(format!("sample {idx} out of {n_samples}"))
        })?;
        sample.labels.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// The gene token of every row
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(&self, idx: usize) -> Option<&Sample> {
        self.samples.get(idx)
    }

    /// The values of one gene across all samples
    ///
    /// # Panics
    ///
    /// If `gene` is not a valid row index
    pub fn row(&self, gene: usize) -> MaskedVec {
        self.samples.iter().map(|s| s.values.get(gene)).collect()
    }

    /// All rows, in gene order
    pub fn rows(&self) -> Vec<MaskedVec> {
        (0..self.n_genes()).map(|gene| self.row(gene)).collect()
    }

    /// The sample indices per value of the label `key`
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if any sample is missing the label
    pub fn group_by_label(&self, key: &str) -> GeneSigResult<BTreeMap<String, Vec<usize>>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, sample) in self.samples.iter().enumerate() {
            let value = sample.label(key).ok_or_else(|| {
                GeneSigError::InvalidInput(format!("sample {} has no label '{key}'", sample.name))
            })?;
            groups.entry(value.to_string()).or_default().push(idx);
        }
        Ok(groups)
    }

    /// The label value of every sample, `None` where it is missing
    pub fn label_values(&self, key: &str) -> Vec<Option<&str>> {
        self.samples.iter().map(|s| s.label(key)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn genes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("g{i}")).collect()
    }

    #[test]
    fn rejects_mismatching_lengths() {
        let res = ExpressionMatrix::new(genes(3), vec![Sample::new("a", vec![1.0, 2.0])]);
        assert!(matches!(res, Err(GeneSigError::InvalidInput(_))));
    }

    #[test]
    fn rows_from_columns() {
        let m = ExpressionMatrix::from_rows(
            genes(2),
            &["a", "b", "c"],
            &[
                vec![Some(1.0), None, Some(3.0)],
                vec![Some(4.0), Some(5.0), Some(6.0)],
            ],
        )
        .unwrap();
        assert_eq!(m.n_samples(), 3);
        assert_eq!(m.samples()[1].values().get(0), None);
        assert_eq!(m.row(0).count_valid(), 2);
        assert_eq!(m.rows()[1].sum(), 15.0);
    }

    #[test]
    fn from_rows_validation() {
        assert!(ExpressionMatrix::from_rows(genes(2), &["a"], &[vec![Some(1.0)]]).is_err());
        assert!(ExpressionMatrix::from_rows(genes(1), &["a"], &[vec![Some(1.0), None]]).is_err());
    }

    #[test]
    fn labels() {
        let mut m = ExpressionMatrix::new(
            genes(1),
            vec![
                Sample::new("a", vec![1.0]).with_label("class", "x"),
                Sample::new("b", vec![2.0]).with_label("class", "y"),
                Sample::new("c", vec![3.0]),
            ],
        )
        .unwrap();
        assert!(m.group_by_label("class").is_err());
        assert_eq!(m.label_values("class"), vec![Some("x"), Some("y"), None]);

        m.set_label(2, "class", "x").unwrap();
        assert!(m.set_label(3, "class", "x").is_err());
        let groups = m.group_by_label("class").unwrap();
        assert_eq!(groups["x"], vec![0, 2]);
        assert_eq!(groups["y"], vec![1]);
    }
}
