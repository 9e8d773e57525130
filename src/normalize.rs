//! Intensity-dependent normalization of two-channel arrays on an MA plot
//!
//! For every gene, the merged red (`R`) and green (`G`) intensities are
//! transformed to
//!
//! - `M = log2(R / G)`, the log-ratio
//! - `A = log10(R * G) / 2`, the mean log-intensity
//!
//! `M` is then centered against `A`, which removes dye bias that depends
//! on intensity, and divided by the local standard deviation of genes
//! with a similar intensity. Genes with a large `|z|` are differentially
//! expressed.

use std::collections::{BTreeMap, BTreeSet};

use rayon::ThreadPool;
use tracing::{debug, trace};

use crate::masked::MaskedVec;
use crate::matrix::ExpressionMatrix;
use crate::progress::{check_cancelled, ProgressSink};
use crate::stats::LowessParams;
use crate::{f64_from_usize, GeneSigError, GeneSigResult};

/// Windows with a variance below this fraction of their mean square are constant
const CONSTANT_WINDOW_TOLERANCE: f64 = 1e-10;

/// How replicate columns of one channel are reduced to a single value per gene
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MergeFn {
    #[default]
    Mean,
    Median,
    /// Geometric mean, missing if any value is not positive
    GeoMean,
}

impl MergeFn {
    /// Merges the non-masked values, `None` if there are none
    pub fn merge(&self, values: &MaskedVec) -> Option<f64> {
        match self {
            MergeFn::Mean => values.mean(),
            MergeFn::Median => values.median(),
            MergeFn::GeoMean => {
                if values.valid().any(|v| v <= 0.0) {
                    return None;
                }
                values.map(f64::ln).mean().map(f64::exp)
            }
        }
    }
}

/// How `M` is centered against `A`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CenterMethod {
    /// Subtract the mean of all `M`
    GlobalMean,
    /// Subtract a LOWESS fit evaluated at evenly spaced anchors
    #[default]
    FastLowess,
    /// Subtract a LOWESS fit evaluated at every gene
    FullLowess,
}

/// Parameters of an MA normalization
#[derive(Debug, Clone, PartialEq)]
pub struct MaConfig {
    /// The sample label that names the channel
    pub group_key: String,
    /// Value of `group_key` of the red channel
    pub red: String,
    /// Value of `group_key` of the green channel
    pub green: String,
    /// The sample label that pairs red and green columns of the same
    /// hybridization. Only needed if the channels differ in size
    pub pair_key: Option<String>,
    pub merge_fn: MergeFn,
    pub center_method: CenterMethod,
    /// Fraction of genes in the window of the local standard deviation, in `(0, 1]`
    pub z_window_fraction: f64,
    /// Subtract background columns before computing `M` and `A`
    pub subtract_background: bool,
    /// The sample label that marks background columns
    pub background_key: String,
    /// Value of `background_key` of background columns
    pub background_value: String,
    /// Parameters of the LOWESS centering
    pub lowess: LowessParams,
}

impl Default for MaConfig {
    fn default() -> Self {
        Self {
            group_key: "channel".to_string(),
            red: "R".to_string(),
            green: "G".to_string(),
            pair_key: None,
            merge_fn: MergeFn::default(),
            center_method: CenterMethod::default(),
            z_window_fraction: 1.0 / 3.0,
            subtract_background: false,
            background_key: "role".to_string(),
            background_value: "background".to_string(),
            lowess: LowessParams::default().with_iterations(1).with_anchors(500),
        }
    }
}

impl MaConfig {
    /// Uses `key` to split the channels into `red` and `green`
    #[must_use]
    pub fn with_channels(mut self, key: &str, red: &str, green: &str) -> Self {
        self.group_key = key.to_string();
        self.red = red.to_string();
        self.green = green.to_string();
        self
    }

    #[must_use]
    pub fn with_pair_key(mut self, key: &str) -> Self {
        self.pair_key = Some(key.to_string());
        self
    }

    #[must_use]
    pub fn with_merge_fn(mut self, merge_fn: MergeFn) -> Self {
        self.merge_fn = merge_fn;
        self
    }

    #[must_use]
    pub fn with_center_method(mut self, method: CenterMethod) -> Self {
        self.center_method = method;
        self
    }

    #[must_use]
    pub fn with_z_window_fraction(mut self, fraction: f64) -> Self {
        self.z_window_fraction = fraction;
        self
    }

    /// Subtracts the columns with `key` = `value` as background
    #[must_use]
    pub fn with_background(mut self, key: &str, value: &str) -> Self {
        self.subtract_background = true;
        self.background_key = key.to_string();
        self.background_value = value.to_string();
        self
    }

    #[must_use]
    pub fn with_lowess(mut self, lowess: LowessParams) -> Self {
        self.lowess = lowess;
        self
    }

    /// Checks the parameters for consistency
    ///
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if both channels have the same label,
    /// `z_window_fraction` is outside of `(0, 1]` or the LOWESS parameters are invalid
    pub fn validate(&self) -> GeneSigResult<()> {
        if self.red == self.green {
            return Err(GeneSigError::InvalidInput(format!(
                "red and green channel are both labelled '{}'",
                self.red
            )));
        }
        validate_window(self.z_window_fraction)?;
        self.lowess.validate()
    }
}

fn validate_window(fraction: f64) -> GeneSigResult<()> {
    if fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(GeneSigError::InvalidInput(format!(
            "z_window_fraction must be in (0, 1], got {fraction}"
        )))
    }
}

/// Centered log-ratios, intensities and z-scores, one value per gene row
#[derive(Debug, Clone, PartialEq)]
pub struct MaResult {
    pub genes: Vec<String>,
    /// Centered `log2(R / G)`
    pub m: MaskedVec,
    /// `log10(R * G) / 2`
    pub a: MaskedVec,
    pub z: MaskedVec,
    /// Sample indices of the red columns that were used
    pub red_samples: Vec<usize>,
    /// Sample indices of the green columns that were used
    pub green_samples: Vec<usize>,
}

impl MaResult {
    /// Row indices of genes with `|z| >= cutoff`
    pub fn select(&self, cutoff: f64) -> Vec<usize> {
        self.z
            .valid_indexed()
            .filter(|(_, z)| z.abs() >= cutoff)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Names of genes with `|z| >= cutoff`
    pub fn selected_genes(&self, cutoff: f64) -> Vec<&str> {
        self.select(cutoff)
            .into_iter()
            .map(|idx| self.genes[idx].as_str())
            .collect()
    }

    /// The red and green intensities that correspond to the centered `M`
    pub fn intensities(&self) -> (MaskedVec, MaskedVec) {
        let (red, green): (Vec<Option<f64>>, Vec<Option<f64>>) = self
            .m
            .iter()
            .zip(self.a.iter())
            .map(|pair| match pair {
                (Some(m), Some(a)) => {
                    let product = 10f64.powf(2.0 * a);
                    let ratio = m.exp2();
                    (Some((product * ratio).sqrt()), Some((product / ratio).sqrt()))
                }
                _ => (None, None),
            })
            .unzip();
        (MaskedVec::from_options(red), MaskedVec::from_options(green))
    }
}

/// `M = log2(R / G)` and `A = log10(R * G) / 2`
///
/// Genes with a missing or non-positive intensity are masked in both.
///
/// # Errors
///
/// [`GeneSigError::InvalidInput`] if the channels differ in length
///
/// # Examples
///
/// ```
/// use genesig::MaskedVec;
/// use genesig::normalize::ma_ratios;
///
/// let r = MaskedVec::from_values(vec![400.0, 10.0, 0.0]);
/// let g = MaskedVec::from_values(vec![100.0, 10.0, 5.0]);
/// let (m, a) = ma_ratios(&r, &g).unwrap();
/// assert_eq!(m.get(0), Some(2.0));
/// assert_eq!(a.get(1), Some(1.0));
/// assert!(m.is_masked(2) && a.is_masked(2));
/// ```
pub fn ma_ratios(r: &MaskedVec, g: &MaskedVec) -> GeneSigResult<(MaskedVec, MaskedVec)> {
    let positive = |a: f64, b: f64, f: fn(f64, f64) -> f64| {
        if a > 0.0 && b > 0.0 {
            f(a, b)
        } else {
            f64::NAN
        }
    };
    let m = r.zip_map(g, |r, g| positive(r, g, |r, g| (r / g).log2()))?;
    let a = r.zip_map(g, |r, g| positive(r, g, |r, g| (r * g).log10() / 2.0))?;
    Ok((m, a))
}

/// Subtracts the trend of `m` against `a`
///
/// LOWESS methods use `params`. Genes where the fit is undefined are masked.
///
/// # Errors
///
/// [`GeneSigError::InvalidInput`] if the vectors differ in length or the LOWESS
/// parameters are invalid
pub fn center(
    m: &MaskedVec,
    a: &MaskedVec,
    method: CenterMethod,
    params: &LowessParams,
) -> GeneSigResult<MaskedVec> {
    if m.len() != a.len() {
        return Err(GeneSigError::InvalidInput(format!(
            "M ({}) and A ({}) differ in length",
            m.len(),
            a.len()
        )));
    }
    // only genes with both values take part in the fit
    let m = m.zip_map(a, |m, _| m)?;
    let trend = match method {
        CenterMethod::GlobalMean => {
            let Some(mean) = m.mean() else {
                return Ok(m);
            };
            return Ok(m.map(|v| v - mean));
        }
        CenterMethod::FastLowess => {
            params.validate()?;
            params.fit_fast(a, &m, None)
        }
        CenterMethod::FullLowess => {
            params.validate()?;
            params.fit(a, &m, None)
        }
    };
    m.zip_map(&trend, |m, t| m - t)
}

/// `m / σ`, with `σ` the population standard deviation of `m` among the
/// `ceil(fraction * n)` genes closest in `a`
///
/// The window is centered on each gene and shifted inwards at both ends of
/// the intensity range. Genes with a missing value or a constant window are masked.
///
/// # Errors
///
/// [`GeneSigError::InvalidInput`] if the vectors differ in length or `fraction`
/// is outside of `(0, 1]`
///
/// # Examples
///
/// ```
/// use genesig::MaskedVec;
/// use genesig::normalize::z_scores;
///
/// let m = MaskedVec::from_values(vec![1.0, -1.0, 1.0, -1.0]);
/// let a = MaskedVec::from_values(vec![1.0, 2.0, 3.0, 4.0]);
/// let z = z_scores(&m, &a, 1.0).unwrap();
/// assert_eq!(z.get(0), Some(1.0));
/// assert_eq!(z.get(3), Some(-1.0));
/// ```
pub fn z_scores(m: &MaskedVec, a: &MaskedVec, fraction: f64) -> GeneSigResult<MaskedVec> {
    validate_window(fraction)?;
    if m.len() != a.len() {
        return Err(GeneSigError::InvalidInput(format!(
            "M ({}) and A ({}) differ in length",
            m.len(),
            a.len()
        )));
    }
    let mut points: Vec<(usize, f64, f64)> = m
        .iter()
        .zip(a.iter())
        .enumerate()
        .filter_map(|(idx, pair)| match pair {
            (Some(m), Some(a)) => Some((idx, a, m)),
            _ => None,
        })
        .collect();
    points.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));

    let n = points.len();
    let mut z = MaskedVec::all_masked(m.len());
    if n == 0 {
        return Ok(z);
    }
    // window size, rounded up
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let width = ((fraction * f64_from_usize(n)).ceil() as usize).clamp(1, n);

    let mut sum = vec![0.0; n + 1];
    let mut sum_sq = vec![0.0; n + 1];
    for (i, (_, _, m)) in points.iter().enumerate() {
        sum[i + 1] = sum[i] + m;
        sum_sq[i + 1] = sum_sq[i] + m * m;
    }

    for (i, (idx, _, m)) in points.iter().enumerate() {
        let start = i.saturating_sub(width / 2).min(n - width);
        let end = start + width;
        let count = f64_from_usize(width);
        let mean = (sum[end] - sum[start]) / count;
        let mean_sq = (sum_sq[end] - sum_sq[start]) / count;
        let variance = mean_sq - mean * mean;
        if variance > mean_sq * CONSTANT_WINDOW_TOLERANCE {
            z.set(*idx, Some(m / variance.sqrt()));
        }
    }
    Ok(z)
}

/// Merges the columns `samples` of every gene row
pub fn merge_replicates(
    matrix: &ExpressionMatrix,
    samples: &[usize],
    merge_fn: MergeFn,
) -> MaskedVec {
    (0..matrix.n_genes())
        .map(|gene| {
            let values: MaskedVec = samples
                .iter()
                .map(|s| matrix.sample(*s).and_then(|sample| sample.values().get(gene)))
                .collect();
            merge_fn.merge(&values)
        })
        .collect()
}

/// Sample indices of the red and the green channel
#[derive(Debug, Default)]
struct Channels {
    red: Vec<usize>,
    green: Vec<usize>,
}

/// Two-channel MA normalization
///
/// # Examples
///
/// ```
/// use genesig::{ExpressionMatrix, NoProgress, Sample};
/// use genesig::normalize::{CenterMethod, MaConfig, MaNormalizer};
///
/// let genes: Vec<String> = (0..50).map(|i| format!("g{i}")).collect();
/// let green: Vec<f64> = (0..50).map(|i| 100.0 + 20.0 * f64::from(i)).collect();
/// // constant dye bias of factor 2
/// let red: Vec<f64> = green.iter().map(|g| 2.0 * g).collect();
///
/// let matrix = ExpressionMatrix::new(genes, vec![
///     Sample::new("r", red).with_label("channel", "R"),
///     Sample::new("g", green).with_label("channel", "G"),
/// ]).unwrap();
///
/// let config = MaConfig::default().with_center_method(CenterMethod::GlobalMean);
/// let res = MaNormalizer::new(config).unwrap().normalize(&matrix, &NoProgress, None).unwrap();
/// assert!(res.m.valid().all(|m| m.abs() < 1e-12));
/// assert!(res.select(1.0).is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct MaNormalizer {
    config: MaConfig,
}

impl MaNormalizer {
    /// # Errors
    ///
    /// [`GeneSigError::InvalidInput`] if the config is inconsistent
    pub fn new(config: MaConfig) -> GeneSigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MaConfig {
        &self.config
    }

    /// Splits, merges, centers and z-scores the two channels of `matrix`
    ///
    /// LOWESS fits run inside `pool`, or on the global rayon pool.
    ///
    /// # Errors
    ///
    /// - [`GeneSigError::InvalidInput`] if a sample lacks a required label, has an unknown
    ///   channel, or the channels cannot be paired
    /// - [`GeneSigError::Cancelled`] if `progress` requests it
    pub fn normalize(
        &self,
        matrix: &ExpressionMatrix,
        progress: &dyn ProgressSink,
        pool: Option<&ThreadPool>,
    ) -> GeneSigResult<MaResult> {
        let config = &self.config;
        let (foreground, background) = self.split_background(matrix);
        let channels = self.pair(self.split_channels(matrix, &foreground)?, matrix)?;
        debug!(
            "Merging {} red and {} green columns",
            channels.red.len(),
            channels.green.len()
        );

        let mut red = merge_replicates(matrix, &channels.red, config.merge_fn);
        let mut green = merge_replicates(matrix, &channels.green, config.merge_fn);
        if config.subtract_background {
            let bg = self.split_channels(matrix, &background)?;
            if bg.red.is_empty() || bg.green.is_empty() {
                return Err(GeneSigError::InvalidInput(
                    "background subtraction needs background columns of both channels".to_string(),
                ));
            }
            let red_bg = merge_replicates(matrix, &bg.red, config.merge_fn);
            let green_bg = merge_replicates(matrix, &bg.green, config.merge_fn);
            red = red.zip_map(&red_bg, |fg, bg| fg - bg)?;
            green = green.zip_map(&green_bg, |fg, bg| fg - bg)?;
        }
        progress.report(0.1);
        check_cancelled(progress)?;

        let (m, a) = ma_ratios(&red, &green)?;
        trace!("{} of {} genes have M and A", m.count_valid(), m.len());
        let centered = match pool {
            Some(pool) => pool.install(|| center(&m, &a, config.center_method, &config.lowess)),
            None => center(&m, &a, config.center_method, &config.lowess),
        }?;
        progress.report(0.7);
        check_cancelled(progress)?;

        let z = z_scores(&centered, &a, config.z_window_fraction)?;
        progress.report(1.0);

        Ok(MaResult {
            genes: matrix.genes().to_vec(),
            m: centered,
            a,
            z,
            red_samples: channels.red,
            green_samples: channels.green,
        })
    }

    /// Foreground and background sample indices
    fn split_background(&self, matrix: &ExpressionMatrix) -> (Vec<usize>, Vec<usize>) {
        let config = &self.config;
        (0..matrix.n_samples()).partition(|idx| {
            !config.subtract_background
                || matrix
                    .sample(*idx)
                    .and_then(|s| s.label(&config.background_key))
                    != Some(config.background_value.as_str())
        })
    }

    fn split_channels(
        &self,
        matrix: &ExpressionMatrix,
        samples: &[usize],
    ) -> GeneSigResult<Channels> {
        let config = &self.config;
        let mut channels = Channels::default();
        for idx in samples {
            let Some(sample) = matrix.sample(*idx) else {
                continue;
            };
            match sample.label(&config.group_key) {
                Some(value) if value == config.red => channels.red.push(*idx),
                Some(value) if value == config.green => channels.green.push(*idx),
                Some(value) => {
                    return Err(GeneSigError::InvalidInput(format!(
                        "sample {} has the unknown channel '{value}'",
                        sample.name()
                    )))
                }
                None => {
                    return Err(GeneSigError::InvalidInput(format!(
                        "sample {} has no label '{}'",
                        sample.name(),
                        config.group_key
                    )))
                }
            }
        }
        Ok(channels)
    }

    /// Drops columns without a partner in the other channel if the channels differ in size
    fn pair(&self, channels: Channels, matrix: &ExpressionMatrix) -> GeneSigResult<Channels> {
        if channels.red.is_empty() || channels.green.is_empty() {
            return Err(GeneSigError::InvalidInput(format!(
                "need columns of both channels, found {} red and {} green",
                channels.red.len(),
                channels.green.len()
            )));
        }
        if channels.red.len() == channels.green.len() {
            return Ok(channels);
        }
        let Some(pair_key) = &self.config.pair_key else {
            return Err(GeneSigError::InvalidInput(format!(
                "{} red and {} green columns cannot be paired without a pair key",
                channels.red.len(),
                channels.green.len()
            )));
        };

        let pair_ids = |samples: &[usize]| -> GeneSigResult<BTreeMap<usize, String>> {
            samples
                .iter()
                .map(|idx| -> GeneSigResult<(usize, String)> {
                    let sample = matrix.sample(*idx).ok_or_else(|| {
                        GeneSigError::InvalidInput(format!("sample {idx} does not exist"))
                    })?;
                    let id = sample.label(pair_key).ok_or_else(|| {
                        GeneSigError::InvalidInput(format!(
                            "sample {} has no label '{pair_key}'",
                            sample.name()
                        ))
                    })?;
                    Ok((*idx, id.to_string()))
                })
                .collect()
        };
        let red_ids = pair_ids(&channels.red)?;
        let green_ids = pair_ids(&channels.green)?;
        let red_set: BTreeSet<&String> = red_ids.values().collect();
        let green_set: BTreeSet<&String> = green_ids.values().collect();

        let paired = Channels {
            red: red_ids
                .iter()
                .filter(|(_, id)| green_set.contains(id))
                .map(|(idx, _)| *idx)
                .collect(),
            green: green_ids
                .iter()
                .filter(|(_, id)| red_set.contains(id))
                .map(|(idx, _)| *idx)
                .collect(),
        };
        let dropped =
            channels.red.len() + channels.green.len() - paired.red.len() - paired.green.len();
        debug!("Dropped {} unpaired columns", dropped);
        if paired.red.is_empty() {
            return Err(GeneSigError::InvalidInput(format!(
                "no red and green columns share a '{pair_key}' label"
            )));
        }
        Ok(paired)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matrix::Sample;
    use crate::progress::{CancelFlag, NoProgress};

    fn genes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("g{i}")).collect()
    }

    /// Intensities spread over three orders of magnitude
    fn green(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 10f64.powf(1.0 + 3.0 * f64_from_usize(i) / f64_from_usize(n)))
            .collect()
    }

    fn two_channel(red: Vec<f64>, green: Vec<f64>) -> ExpressionMatrix {
        ExpressionMatrix::new(
            genes(red.len()),
            vec![
                Sample::new("r", red).with_label("channel", "R"),
                Sample::new("g", green).with_label("channel", "G"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn merge_functions() {
        let values = MaskedVec::from_options(vec![Some(1.0), Some(4.0), None, Some(16.0)]);
        assert_eq!(MergeFn::Mean.merge(&values), Some(7.0));
        assert_eq!(MergeFn::Median.merge(&values), Some(4.0));
        assert!((MergeFn::GeoMean.merge(&values).unwrap() - 4.0).abs() < 1e-12);

        let negative = MaskedVec::from_values(vec![2.0, -1.0]);
        assert_eq!(MergeFn::GeoMean.merge(&negative), None);
        assert_eq!(MergeFn::Mean.merge(&MaskedVec::all_masked(2)), None);
    }

    #[test]
    fn identical_channels() {
        let g = green(200);
        let matrix = two_channel(g.clone(), g);
        let config = MaConfig::default().with_center_method(CenterMethod::FullLowess);
        let res = MaNormalizer::new(config)
            .unwrap()
            .normalize(&matrix, &NoProgress, None)
            .unwrap();

        assert_eq!(res.m.count_valid(), 200);
        assert!(res.m.valid().all(|m| m.abs() < 1e-12));
        assert!(res.z.iter().all(|z| z.map_or(true, |z| z.abs() < 1e-9)));
        for cutoff in [0.5, 1.0, 3.0] {
            assert!(res.select(cutoff).is_empty());
        }
    }

    #[test]
    fn global_mean_is_idempotent() {
        let g = green(100);
        let r: Vec<f64> = g
            .iter()
            .enumerate()
            .map(|(i, g)| g * (1.5 + 0.3 * (f64_from_usize(i) * 0.7).sin()))
            .collect();
        let config = MaConfig::default().with_center_method(CenterMethod::GlobalMean);
        let normalizer = MaNormalizer::new(config).unwrap();
        let first = normalizer.normalize(&two_channel(r, g), &NoProgress, None).unwrap();
        assert!(first.m.mean().unwrap().abs() < 1e-12);

        let params = LowessParams::default();
        let again = center(&first.m, &first.a, CenterMethod::GlobalMean, &params).unwrap();
        for (x, y) in first.m.valid().zip(again.valid()) {
            assert!((x - y).abs() < 1e-12);
        }

        let (r2, g2) = first.intensities();
        let second = normalizer
            .normalize(&two_channel(r2.to_nan_vec(), g2.to_nan_vec()), &NoProgress, None)
            .unwrap();
        for (x, y) in first.m.valid().zip(second.m.valid()) {
            assert!((x - y).abs() < 1e-12);
        }
        for (x, y) in first.a.valid().zip(second.a.valid()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn lowess_removes_intensity_trend() {
        let g = green(300);
        // log-ratio grows linearly with intensity
        let r: Vec<f64> = g.iter().map(|g| g * (0.5 * g.log10()).exp2()).collect();
        for method in [CenterMethod::FastLowess, CenterMethod::FullLowess] {
            let config = MaConfig::default().with_center_method(method);
            let res = MaNormalizer::new(config)
                .unwrap()
                .normalize(&two_channel(r.clone(), g.clone()), &NoProgress, None)
                .unwrap();
            assert!(res.m.valid().all(|m| m.abs() < 1e-6), "{method:?}");
            assert_eq!(res.m.count_valid(), 300);
        }
    }

    #[test]
    fn outlier_is_selected() {
        let g = green(300);
        let mut r: Vec<f64> = g
            .iter()
            .enumerate()
            .map(|(i, g)| g * (1.0 + 0.1 * (f64_from_usize(i) * 1.3).sin()))
            .collect();
        r[150] *= 16.0;
        let config = MaConfig::default().with_center_method(CenterMethod::GlobalMean);
        let res = MaNormalizer::new(config)
            .unwrap()
            .normalize(&two_channel(r, g), &NoProgress, None)
            .unwrap();
        assert_eq!(res.select(4.0), vec![150]);
        assert_eq!(res.selected_genes(4.0), vec!["g150"]);
    }

    #[test]
    fn non_positive_intensities_are_masked() {
        let matrix = two_channel(vec![10.0, 0.0, 20.0, 30.0], vec![10.0, 5.0, -1.0, 30.0]);
        let config = MaConfig::default().with_center_method(CenterMethod::GlobalMean);
        let res = MaNormalizer::new(config)
            .unwrap()
            .normalize(&matrix, &NoProgress, None)
            .unwrap();
        assert!(res.m.is_masked(1));
        assert!(res.a.is_masked(2));
        assert!(res.z.is_masked(1));
        assert_eq!(res.m.count_valid(), 2);
    }

    #[test]
    fn replicates_and_pairing() {
        let samples = vec![
            Sample::new("r1", vec![100.0, 200.0]).with_label("channel", "R").with_label("rep", "1"),
            Sample::new("r2", vec![300.0, 400.0]).with_label("channel", "R").with_label("rep", "2"),
            Sample::new("r3", vec![500.0, 600.0]).with_label("channel", "R").with_label("rep", "3"),
            Sample::new("g1", vec![100.0, 100.0]).with_label("channel", "G").with_label("rep", "1"),
            Sample::new("g2", vec![100.0, 100.0]).with_label("channel", "G").with_label("rep", "2"),
        ];
        let matrix = ExpressionMatrix::new(genes(2), samples).unwrap();

        let unpaired = MaNormalizer::new(MaConfig::default()).unwrap();
        assert!(matches!(
            unpaired.normalize(&matrix, &NoProgress, None),
            Err(GeneSigError::InvalidInput(_))
        ));

        let config = MaConfig::default()
            .with_pair_key("rep")
            .with_center_method(CenterMethod::GlobalMean);
        let res = MaNormalizer::new(config).unwrap().normalize(&matrix, &NoProgress, None).unwrap();
        assert_eq!(res.red_samples, vec![0, 1]);
        assert_eq!(res.green_samples, vec![3, 4]);
        // merged red: 200 and 300, green: 100 and 100
        let m: Vec<f64> = res.m.valid().collect();
        let raw = [2f64.log2(), 3f64.log2()];
        let mean = (raw[0] + raw[1]) / 2.0;
        assert!((m[0] - (raw[0] - mean)).abs() < 1e-12);
        assert!((m[1] - (raw[1] - mean)).abs() < 1e-12);
    }

    #[test]
    fn missing_and_unknown_channels() {
        let matrix = ExpressionMatrix::new(
            genes(1),
            vec![
                Sample::new("r", vec![1.0]).with_label("channel", "R"),
                Sample::new("x", vec![1.0]),
            ],
        )
        .unwrap();
        let normalizer = MaNormalizer::new(MaConfig::default()).unwrap();
        assert!(matches!(
            normalizer.normalize(&matrix, &NoProgress, None),
            Err(GeneSigError::InvalidInput(_))
        ));

        let matrix = ExpressionMatrix::new(
            genes(1),
            vec![
                Sample::new("r", vec![1.0]).with_label("channel", "R"),
                Sample::new("x", vec![1.0]).with_label("channel", "Cy5"),
            ],
        )
        .unwrap();
        assert!(normalizer.normalize(&matrix, &NoProgress, None).is_err());

        let matrix = two_channel(vec![1.0], vec![1.0]);
        let other = MaNormalizer::new(MaConfig::default().with_channels("dye", "R", "G")).unwrap();
        assert!(other.normalize(&matrix, &NoProgress, None).is_err());
    }

    #[test]
    fn background_subtraction() {
        let samples = vec![
            Sample::new("r", vec![110.0, 210.0]).with_label("channel", "R"),
            Sample::new("g", vec![60.0, 60.0]).with_label("channel", "G"),
            Sample::new("rb", vec![10.0, 10.0])
                .with_label("channel", "R")
                .with_label("role", "background"),
            Sample::new("gb", vec![10.0, 10.0])
                .with_label("channel", "G")
                .with_label("role", "background"),
        ];
        let matrix = ExpressionMatrix::new(genes(2), samples).unwrap();
        let config = MaConfig::default()
            .with_center_method(CenterMethod::GlobalMean)
            .with_background("role", "background");
        let res = MaNormalizer::new(config).unwrap().normalize(&matrix, &NoProgress, None).unwrap();
        assert_eq!(res.red_samples, vec![0]);
        // R - bg = 100, 200 and G - bg = 50, 50
        assert!((res.a.get(0).unwrap() - (100f64 * 50.0).log10() / 2.0).abs() < 1e-12);
        let m: Vec<f64> = res.m.valid().collect();
        assert!((m[1] - m[0] - 1.0).abs() < 1e-12);

        let without_bg = ExpressionMatrix::new(
            genes(1),
            vec![
                Sample::new("r", vec![1.0]).with_label("channel", "R"),
                Sample::new("g", vec![1.0]).with_label("channel", "G"),
            ],
        )
        .unwrap();
        let config = MaConfig::default().with_background("role", "background");
        let normalizer = MaNormalizer::new(config).unwrap();
        assert!(normalizer.normalize(&without_bg, &NoProgress, None).is_err());
    }

    #[test]
    fn z_score_window() {
        let m = MaskedVec::from_options(vec![Some(2.0), None, Some(-2.0), Some(2.0), Some(-2.0)]);
        let a = MaskedVec::from_values(vec![4.0, 1.0, 3.0, 2.0, 1.0]);
        // sorted by A: idx 4 (-2), 3 (2), 2 (-2), 0 (2); windows of 2
        let z = z_scores(&m, &a, 0.5).unwrap();
        assert!(z.is_masked(1));
        assert_eq!(z.get(0), Some(1.0));
        assert_eq!(z.get(4), Some(-1.0));

        assert!(z_scores(&m, &a, 0.0).is_err());
        assert!(z_scores(&m, &a, 1.5).is_err());
        assert!(z_scores(&m, &MaskedVec::from_values(vec![1.0]), 0.5).is_err());
    }

    #[test]
    fn center_validates_lengths() {
        let m = MaskedVec::from_values(vec![1.0, 2.0]);
        let a = MaskedVec::from_values(vec![1.0]);
        assert!(center(&m, &a, CenterMethod::GlobalMean, &LowessParams::default()).is_err());
    }

    #[test]
    fn cancellation() {
        let flag = CancelFlag::default();
        flag.cancel();
        let res = MaNormalizer::new(MaConfig::default())
            .unwrap()
            .normalize(&two_channel(green(10), green(10)), &flag, None);
        assert_eq!(res, Err(GeneSigError::Cancelled));
    }

    #[test]
    fn config_validation() {
        assert!(MaConfig::default().validate().is_ok());
        assert!(MaConfig::default().with_channels("channel", "R", "R").validate().is_err());
        assert!(MaConfig::default().with_z_window_fraction(0.0).validate().is_err());
        assert!(MaConfig::default()
            .with_lowess(LowessParams::default().with_frac(2.0))
            .validate()
            .is_err());
    }
}
