//! A vector of `f64` values with an explicit missing-value mask
//!
//! Every statistical routine in this crate operates on [`MaskedVec`], so that
//! the handling of missing measurements is visible in the signature. A masked
//! position is never read; its stored value is meaningless.

use crate::{f64_from_usize, GeneSigError, GeneSigResult};

/// Values plus a boolean mask, `true` marks a missing value
///
/// Non-finite values (`NaN`, `inf`) are masked on construction.
///
/// # Examples
///
/// ```
/// use genesig::MaskedVec;
///
/// let v = MaskedVec::from_options(vec![Some(1.0), None, Some(3.0)]);
/// assert_eq!(v.len(), 3);
/// assert_eq!(v.count_valid(), 2);
/// assert_eq!(v.get(1), None);
/// assert_eq!(v.mean(), Some(2.0));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaskedVec {
    values: Vec<f64>,
    mask: Vec<bool>,
}

impl MaskedVec {
    /// Constructs a `MaskedVec` from values and mask
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if `values` and `mask` differ in length
    pub fn new(values: Vec<f64>, mask: Vec<bool>) -> GeneSigResult<Self> {
        if values.len() != mask.len() {
            return Err(GeneSigError::InvalidInput(format!(
                "values ({}) and mask ({}) differ in length",
                values.len(),
                mask.len()
            )));
        }
        let mask = values
            .iter()
            .zip(mask)
            .map(|(v, m)| m || !v.is_finite())
            .collect();
        Ok(Self { values, mask })
    }

    /// Constructs a `MaskedVec`, masking all non-finite values
    pub fn from_values(values: Vec<f64>) -> Self {
        let mask = values.iter().map(|v| !v.is_finite()).collect();
        Self { values, mask }
    }

    /// Constructs a `MaskedVec` from optional values
    pub fn from_options<I: IntoIterator<Item = Option<f64>>>(values: I) -> Self {
        values.into_iter().collect()
    }

    /// A `MaskedVec` of length `len` where every value is missing
    pub fn all_masked(len: usize) -> Self {
        Self {
            values: vec![f64::NAN; len],
            mask: vec![true; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value at `idx`, `None` if it is masked or out of bounds
    pub fn get(&self, idx: usize) -> Option<f64> {
        match self.mask.get(idx) {
            Some(false) => Some(self.values[idx]),
            _ => None,
        }
    }

    /// Returns `true` if `idx` is masked or out of bounds
    pub fn is_masked(&self, idx: usize) -> bool {
        self.mask.get(idx).copied().unwrap_or(true)
    }

    /// Sets the value at `idx`
    ///
    /// `None` or a non-finite value masks the position.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds
    pub fn set(&mut self, idx: usize, value: Option<f64>) {
        match value {
            Some(v) if v.is_finite() => {
                self.values[idx] = v;
                self.mask[idx] = false;
            }
            _ => {
                self.values[idx] = f64::NAN;
                self.mask[idx] = true;
            }
        }
    }

    /// Appends a value, `None` or non-finite values are masked
    pub fn push(&mut self, value: Option<f64>) {
        match value {
            Some(v) if v.is_finite() => {
                self.values.push(v);
                self.mask.push(false);
            }
            _ => {
                self.values.push(f64::NAN);
                self.mask.push(true);
            }
        }
    }

    /// Iterates all positions, yielding `None` for masked values
    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.values
            .iter()
            .zip(self.mask.iter())
            .map(|(v, m)| if *m { None } else { Some(*v) })
    }

    /// Iterates only the non-masked values
    pub fn valid(&self) -> impl Iterator<Item = f64> + '_ {
        self.iter().flatten()
    }

    /// Iterates the non-masked values together with their index
    pub fn valid_indexed(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.iter()
            .enumerate()
            .filter_map(|(idx, v)| v.map(|v| (idx, v)))
    }

    /// The number of non-masked values
    pub fn count_valid(&self) -> usize {
        self.mask.iter().filter(|m| !**m).count()
    }

    /// The boolean mask, `true` marks a missing value
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Returns the values with `NaN` in all masked positions
    pub fn to_nan_vec(&self) -> Vec<f64> {
        self.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }

    /// Applies `f` to every non-masked value
    ///
    /// Non-finite results are masked.
    #[must_use]
    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        self.iter().map(|v| v.map(&f)).collect()
    }

    /// Applies `f` position-wise to two vectors of equal length
    ///
    /// A position is masked if it is masked in either input or the result
    /// is not finite.
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if the vectors differ in length
    pub fn zip_map<F: Fn(f64, f64) -> f64>(&self, other: &Self, f: F) -> GeneSigResult<Self> {
        if self.len() != other.len() {
            return Err(GeneSigError::InvalidInput(format!(
                "vectors differ in length: {} vs {}",
                self.len(),
                other.len()
            )));
        }
        Ok(self
            .iter()
            .zip(other.iter())
            .map(|pair| match pair {
                (Some(a), Some(b)) => Some(f(a, b)),
                _ => None,
            })
            .collect())
    }

    /// Returns the values of all positions where both vectors have a value
    ///
    /// Surplus positions of the longer vector are ignored.
    pub fn pairwise_complete(&self, other: &Self) -> (Vec<f64>, Vec<f64>) {
        self.iter()
            .zip(other.iter())
            .filter_map(|pair| match pair {
                (Some(a), Some(b)) => Some((a, b)),
                _ => None,
            })
            .unzip()
    }

    /// Returns a new vector with only the selected positions
    ///
    /// Indices out of bounds produce masked values.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        indices.iter().map(|idx| self.get(*idx)).collect()
    }

    pub fn sum(&self) -> f64 {
        self.valid().sum()
    }

    /// The arithmetic mean of all non-masked values
    ///
    /// Returns `None` if there are no values
    pub fn mean(&self) -> Option<f64> {
        let n = self.count_valid();
        if n == 0 {
            None
        } else {
            Some(self.sum() / f64_from_usize(n))
        }
    }

    /// The variance with `ddof` delta degrees of freedom
    ///
    /// `ddof = 0` gives the population variance, `ddof = 1` the sample variance.
    ///
    /// Returns `None` if there are not more than `ddof` values
    pub fn variance(&self, ddof: usize) -> Option<f64> {
        let n = self.count_valid();
        if n <= ddof {
            return None;
        }
        let mean = self.mean()?;
        let ss: f64 = self.valid().map(|v| (v - mean).powi(2)).sum();
        Some(ss / f64_from_usize(n - ddof))
    }

    /// The standard deviation with `ddof` delta degrees of freedom
    pub fn std_dev(&self, ddof: usize) -> Option<f64> {
        self.variance(ddof).map(f64::sqrt)
    }

    /// The median of all non-masked values
    pub fn median(&self) -> Option<f64> {
        let mut values: Vec<f64> = self.valid().collect();
        median_in_place(&mut values)
    }

    /// The smallest and largest non-masked value
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.valid().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Sorts `values` and returns their median
pub(crate) fn median_in_place(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

impl FromIterator<Option<f64>> for MaskedVec {
    fn from_iter<T: IntoIterator<Item = Option<f64>>>(iter: T) -> Self {
        let mut res = MaskedVec::default();
        for v in iter {
            res.push(v);
        }
        res
    }
}

impl From<Vec<f64>> for MaskedVec {
    fn from(values: Vec<f64>) -> Self {
        MaskedVec::from_values(values)
    }
}

impl From<&[f64]> for MaskedVec {
    fn from(values: &[f64]) -> Self {
        MaskedVec::from_values(values.to_vec())
    }
}
