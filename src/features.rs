//! Full named feature vector for the classifier.
//!
//! Four independently computed groups: temporal (moments and Hjorth
//! parameters per channel), spectral (per-channel per-band power, relative
//! power, peak frequency), connectivity (coherence, PLV, PLI per channel
//! pair), and nonlinear (sample entropy, Hurst exponent, DFA alpha, and
//! wavelet sub-band descriptors per channel). The groups run concurrently
//! and write disjoint slices of the output vector.
//!
//! Ordering is load-bearing: a trained classifier is only valid against
//! vectors produced by a [`FeatureSchema`] with the identical id sequence.
//! Unlike quality scoring, extraction does not degrade silently; a
//! non-finite value is an error for the whole epoch.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::SignalConfig;
use crate::error::{Error, Result};
use crate::spectral::{
    coherence_band, default_nperseg, hilbert_phases, phase_lag_index, phase_locking_value, welch,
    Band,
};
use crate::wavelet;

/// Per-channel time-domain metrics, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalMetric {
    Mean,
    Std,
    Kurtosis,
    Skewness,
    Mobility,
    Complexity,
}

impl TemporalMetric {
    pub const ALL: [TemporalMetric; 6] = [
        TemporalMetric::Mean,
        TemporalMetric::Std,
        TemporalMetric::Kurtosis,
        TemporalMetric::Skewness,
        TemporalMetric::Mobility,
        TemporalMetric::Complexity,
    ];

    fn name(self) -> &'static str {
        match self {
            TemporalMetric::Mean => "mean",
            TemporalMetric::Std => "std",
            TemporalMetric::Kurtosis => "kurtosis",
            TemporalMetric::Skewness => "skewness",
            TemporalMetric::Mobility => "mobility",
            TemporalMetric::Complexity => "complexity",
        }
    }
}

/// Per-channel-per-band metrics, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectralMetric {
    Power,
    RelPower,
    PeakFreq,
}

impl SpectralMetric {
    pub const ALL: [SpectralMetric; 3] =
        [SpectralMetric::Power, SpectralMetric::RelPower, SpectralMetric::PeakFreq];

    fn name(self) -> &'static str {
        match self {
            SpectralMetric::Power => "power",
            SpectralMetric::RelPower => "rel_power",
            SpectralMetric::PeakFreq => "peak_freq",
        }
    }
}

/// Per-channel-pair metrics, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairMetric {
    CoherenceAlpha,
    CoherenceBeta,
    Plv,
    Pli,
}

impl PairMetric {
    pub const ALL: [PairMetric; 4] =
        [PairMetric::CoherenceAlpha, PairMetric::CoherenceBeta, PairMetric::Plv, PairMetric::Pli];
}

/// Per-channel nonlinear scalars (the wavelet sub-bands follow separately).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonlinearMetric {
    SampleEntropy,
    HurstExponent,
    Dfa,
}

impl NonlinearMetric {
    pub const ALL: [NonlinearMetric; 3] =
        [NonlinearMetric::SampleEntropy, NonlinearMetric::HurstExponent, NonlinearMetric::Dfa];

    fn name(self) -> &'static str {
        match self {
            NonlinearMetric::SampleEntropy => "sample_entropy",
            NonlinearMetric::HurstExponent => "hurst_exponent",
            NonlinearMetric::Dfa => "dfa",
        }
    }
}

/// Per-wavelet-level descriptors, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubbandMetric {
    Energy,
    Entropy,
    Max,
    Mean,
    Std,
}

impl SubbandMetric {
    pub const ALL: [SubbandMetric; 5] = [
        SubbandMetric::Energy,
        SubbandMetric::Entropy,
        SubbandMetric::Max,
        SubbandMetric::Mean,
        SubbandMetric::Std,
    ];

    fn name(self) -> &'static str {
        match self {
            SubbandMetric::Energy => "energy",
            SubbandMetric::Entropy => "entropy",
            SubbandMetric::Max => "max",
            SubbandMetric::Mean => "mean",
            SubbandMetric::Std => "std",
        }
    }
}

/// One slot of the feature vector. The enum carries everything needed to
/// render the stable string name used in training reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FeatureId {
    Temporal { channel: usize, metric: TemporalMetric },
    Spectral { channel: usize, band: Band, metric: SpectralMetric },
    Pair { a: usize, b: usize, metric: PairMetric },
    Nonlinear { channel: usize, metric: NonlinearMetric },
    Subband { channel: usize, level: usize, metric: SubbandMetric },
}

impl FeatureId {
    /// Stable human-readable name, e.g. `ch3_theta_power` or `plv_ch02`.
    pub fn name(&self) -> String {
        match *self {
            FeatureId::Temporal { channel, metric } => format!("ch{channel}_{}", metric.name()),
            FeatureId::Spectral { channel, band, metric } => {
                format!("ch{channel}_{}_{}", band.name(), metric.name())
            }
            FeatureId::Pair { a, b, metric } => match metric {
                PairMetric::CoherenceAlpha => format!("coherence_alpha_ch{a}{b}"),
                PairMetric::CoherenceBeta => format!("coherence_beta_ch{a}{b}"),
                PairMetric::Plv => format!("plv_ch{a}{b}"),
                PairMetric::Pli => format!("pli_ch{a}{b}"),
            },
            FeatureId::Nonlinear { channel, metric } => format!("ch{channel}_{}", metric.name()),
            FeatureId::Subband { channel, level, metric } => {
                format!("ch{channel}_wavelet_level{level}_{}", metric.name())
            }
        }
    }
}

/// The fixed, ordered feature-id list for a given channel count and window
/// size. Group order: temporal, spectral, connectivity, nonlinear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    ids: Vec<FeatureId>,
    n_channels: usize,
    wavelet_levels: usize,
}

impl FeatureSchema {
    pub fn new(n_channels: usize, n_samples: usize) -> Self {
        let wavelet_levels = 5.min(wavelet::max_level(n_samples));
        let mut ids = Vec::new();

        for channel in 0..n_channels {
            for metric in TemporalMetric::ALL {
                ids.push(FeatureId::Temporal { channel, metric });
            }
        }
        for channel in 0..n_channels {
            for band in Band::ALL {
                for metric in SpectralMetric::ALL {
                    ids.push(FeatureId::Spectral { channel, band, metric });
                }
            }
        }
        for a in 0..n_channels {
            for b in (a + 1)..n_channels {
                for metric in PairMetric::ALL {
                    ids.push(FeatureId::Pair { a, b, metric });
                }
            }
        }
        for channel in 0..n_channels {
            for metric in NonlinearMetric::ALL {
                ids.push(FeatureId::Nonlinear { channel, metric });
            }
            for level in 0..=wavelet_levels {
                for metric in SubbandMetric::ALL {
                    ids.push(FeatureId::Subband { channel, level, metric });
                }
            }
        }

        FeatureSchema { ids, n_channels, wavelet_levels }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[FeatureId] {
        &self.ids
    }

    pub fn names(&self) -> Vec<String> {
        self.ids.iter().map(FeatureId::name).collect()
    }
}

/// Feature values ordered exactly as the schema that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<f64>,
}

/// Computes [`FeatureVector`]s from cleaned epochs.
#[derive(Debug)]
pub struct FeatureExtractor {
    sfreq: f64,
    schema: FeatureSchema,
}

impl FeatureExtractor {
    pub fn new(config: &SignalConfig) -> Self {
        let schema = FeatureSchema::new(config.n_channels(), config.window_size);
        FeatureExtractor { sfreq: config.sfreq, schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Extracts the full feature vector from a cleaned epoch.
    ///
    /// The four groups run on the rayon pool; spectral and nonlinear
    /// dominate the cost, so the join tree pairs each with a cheap group.
    /// Fails with [`Error::Extraction`] if any feature is non-finite.
    pub fn extract(&self, clean: &Array2<f64>) -> Result<FeatureVector> {
        if clean.nrows() != self.schema.n_channels {
            return Err(Error::Extraction(format!(
                "epoch has {} channels, schema expects {}",
                clean.nrows(),
                self.schema.n_channels
            )));
        }

        let ((temporal, spectral), (pairs, nonlinear)) = rayon::join(
            || rayon::join(|| self.temporal_block(clean), || self.spectral_block(clean)),
            || rayon::join(|| self.pair_block(clean), || self.nonlinear_block(clean)),
        );

        let mut values = temporal;
        values.extend(spectral);
        values.extend(pairs);
        values.extend(nonlinear);

        // A shorter epoch yields fewer wavelet levels than the schema was
        // built for, which would misalign every downstream consumer.
        if values.len() != self.schema.len() {
            return Err(Error::Extraction(format!(
                "epoch with {} samples produced {} features, schema expects {}",
                clean.ncols(),
                values.len(),
                self.schema.len()
            )));
        }

        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::Extraction(format!(
                "non-finite value for feature {}",
                self.schema.ids[pos].name()
            )));
        }
        Ok(FeatureVector { values })
    }

    fn temporal_block(&self, clean: &Array2<f64>) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.schema.n_channels * TemporalMetric::ALL.len());
        for row in clean.rows() {
            let x = row.to_vec();
            let n = x.len() as f64;
            let mean = x.iter().sum::<f64>() / n;
            let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            out.push(mean);
            out.push(std);
            out.push(kurtosis(&x, mean, var));
            out.push(skewness(&x, mean, var));
            out.push(hjorth_mobility(&x));
            out.push(hjorth_complexity(&x));
        }
        out
    }

    fn spectral_block(&self, clean: &Array2<f64>) -> Vec<f64> {
        let nperseg = default_nperseg(clean.ncols());
        let mut out =
            Vec::with_capacity(self.schema.n_channels * Band::ALL.len() * SpectralMetric::ALL.len());
        for row in clean.rows() {
            let x = row.to_vec();
            let (freqs, psd) = welch(&x, self.sfreq, nperseg);
            let total_power = psd.iter().sum::<f64>().max(1e-10);
            for band in Band::ALL {
                let (low, high) = band.range();
                let bins: Vec<usize> = freqs
                    .iter()
                    .enumerate()
                    .filter(|(_, &f)| f >= low && f <= high)
                    .map(|(k, _)| k)
                    .collect();
                if bins.is_empty() {
                    out.extend([0.0, 0.0, 0.0]);
                    continue;
                }
                let power = bins.iter().map(|&k| psd[k]).sum::<f64>() / bins.len() as f64;
                let peak = bins
                    .iter()
                    .copied()
                    .max_by(|&a, &b| psd[a].partial_cmp(&psd[b]).unwrap_or(std::cmp::Ordering::Equal))
                    .unwrap_or(bins[0]);
                out.push(power);
                out.push(power / total_power);
                out.push(freqs[peak]);
            }
        }
        out
    }

    fn pair_block(&self, clean: &Array2<f64>) -> Vec<f64> {
        let n_ch = clean.nrows();
        // Phases once per channel; every PLV/PLI pair reuses them.
        let phases: Vec<Option<Vec<f64>>> = clean
            .rows()
            .into_iter()
            .map(|row| hilbert_phases(&row.to_vec()))
            .collect();

        let mut out = Vec::new();
        for a in 0..n_ch {
            for b in (a + 1)..n_ch {
                let xa: Vec<f64> = clean.row(a).to_vec();
                let xb: Vec<f64> = clean.row(b).to_vec();
                out.push(coherence_band(&xa, &xb, self.sfreq, Band::Alpha));
                out.push(coherence_band(&xa, &xb, self.sfreq, Band::Beta));
                let (plv, pli) = match (&phases[a], &phases[b]) {
                    (Some(pa), Some(pb)) => {
                        (phase_locking_value(pa, pb), phase_lag_index(pa, pb))
                    }
                    _ => (0.0, 0.0),
                };
                out.push(plv);
                out.push(pli);
            }
        }
        out
    }

    fn nonlinear_block(&self, clean: &Array2<f64>) -> Vec<f64> {
        let mut out = Vec::new();
        for row in clean.rows() {
            let x = row.to_vec();
            out.push(sample_entropy(&x, 2, 0.2));
            out.push(hurst_exponent(&x));
            out.push(dfa_alpha(&x));
            for sb in wavelet::subband_features(&x, self.schema.wavelet_levels) {
                out.push(sb.energy);
                out.push(sb.entropy);
                out.push(sb.max_abs);
                out.push(sb.mean_abs);
                out.push(sb.std);
            }
        }
        out
    }
}

// ── Temporal helpers ─────────────────────────────────────────────────────────

/// Excess kurtosis (biased, Fisher definition). 0 for a constant signal.
fn kurtosis(x: &[f64], mean: f64, var: f64) -> f64 {
    if var == 0.0 {
        return 0.0;
    }
    let n = x.len() as f64;
    let m4 = x.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / n;
    m4 / (var * var) - 3.0
}

/// Biased skewness. 0 for a constant signal.
fn skewness(x: &[f64], mean: f64, var: f64) -> f64 {
    if var == 0.0 {
        return 0.0;
    }
    let n = x.len() as f64;
    let m3 = x.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;
    m3 / var.powf(1.5)
}

fn variance(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

fn diff(x: &[f64]) -> Vec<f64> {
    x.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Hjorth mobility: `sqrt(var(diff(x)) / var(x))`, 0 when x is constant.
pub fn hjorth_mobility(x: &[f64]) -> f64 {
    let var_x = variance(x);
    if var_x == 0.0 {
        return 0.0;
    }
    (variance(&diff(x)) / var_x).sqrt()
}

/// Hjorth complexity: `sqrt(var(diff2) * var(x)) / var(diff)`, 0 when the
/// first difference is constant.
pub fn hjorth_complexity(x: &[f64]) -> f64 {
    let d1 = diff(x);
    let var_d1 = variance(&d1);
    if var_d1 == 0.0 {
        return 0.0;
    }
    let var_d2 = variance(&diff(&d1));
    (var_d2 * variance(x)).sqrt() / var_d1
}

// ── Nonlinear helpers ────────────────────────────────────────────────────────

/// Sample entropy with embedding dimension `m` and tolerance `r` times the
/// standard deviation of the unit-normalized signal.
///
/// Template matches exclude self-matches; returns 0 for a constant signal
/// or when either match count is 0.
pub fn sample_entropy(x: &[f64], m: usize, r: f64) -> f64 {
    let n = x.len();
    if n <= m + 1 {
        return 0.0;
    }
    let mean = x.iter().sum::<f64>() / n as f64;
    let std = (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
    if std == 0.0 {
        return 0.0;
    }
    let z: Vec<f64> = x.iter().map(|v| (v - mean) / std).collect();
    // After normalization the tolerance is r in units of one standard
    // deviation.
    let tol = r;

    let count_matches = |dim: usize| -> f64 {
        let n_templates = n - dim + 1;
        let mut total = 0i64;
        for i in 0..n_templates {
            let mut count = 0i64;
            for j in 0..n_templates {
                let mut matched = true;
                for k in 0..dim {
                    if (z[i + k] - z[j + k]).abs() > tol {
                        matched = false;
                        break;
                    }
                }
                if matched {
                    count += 1;
                }
            }
            total += count - 1; // remove the self-match
        }
        total as f64
    };

    let a = count_matches(m);
    let b = count_matches(m + 1);
    if a <= 0.0 || b <= 0.0 {
        return 0.0;
    }
    -(b / a).ln()
}

/// Slope of a simple least-squares line through `(x, y)` points.
fn regression_slope(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
    if sxx == 0.0 {
        return 0.0;
    }
    let sxy: f64 = xs.iter().zip(ys.iter()).map(|(x, y)| (x - mx) * (y - my)).sum();
    sxy / sxx
}

/// RMS residual of a segment after removing its least-squares line.
fn detrended_rms(seg: &[f64]) -> f64 {
    let n = seg.len();
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let slope = regression_slope(&xs, seg);
    let mx = xs.iter().sum::<f64>() / n as f64;
    let my = seg.iter().sum::<f64>() / n as f64;
    let intercept = my - slope * mx;
    let ss: f64 = seg
        .iter()
        .zip(xs.iter())
        .map(|(y, x)| (y - (slope * x + intercept)).powi(2))
        .sum();
    (ss / n as f64).sqrt()
}

/// Hurst exponent via rescaled-range analysis over log2-spaced segment
/// sizes from 4 up to N/4. Returns 0.5, the random-walk value, when fewer
/// than two scales produce a valid R/S.
pub fn hurst_exponent(x: &[f64]) -> f64 {
    let n = x.len();
    if n < 16 {
        return 0.5;
    }
    let max_k = ((n / 4) as f64).log2().floor() as u32;

    let mut log_sizes = Vec::new();
    let mut log_rs = Vec::new();
    for k in 2..=max_k {
        let size = 1usize << k;
        let n_segments = n / size;
        let mut rs_values = Vec::new();
        for s in 0..n_segments {
            let seg = &x[s * size..(s + 1) * size];
            // Linear detrend, then range of the cumulative deviation.
            let xs: Vec<f64> = (0..size).map(|i| i as f64).collect();
            let slope = regression_slope(&xs, seg);
            let mx = xs.iter().sum::<f64>() / size as f64;
            let my = seg.iter().sum::<f64>() / size as f64;
            let intercept = my - slope * mx;
            let resid: Vec<f64> =
                seg.iter().zip(xs.iter()).map(|(y, t)| y - (slope * t + intercept)).collect();

            let rmean = resid.iter().sum::<f64>() / size as f64;
            let mut cum = 0.0;
            let mut zmin = f64::INFINITY;
            let mut zmax = f64::NEG_INFINITY;
            for v in &resid {
                cum += v - rmean;
                zmin = zmin.min(cum);
                zmax = zmax.max(cum);
            }
            let svar = resid.iter().map(|v| (v - rmean).powi(2)).sum::<f64>() / size as f64;
            let s_dev = svar.sqrt();
            if s_dev > 0.0 {
                rs_values.push((zmax - zmin) / s_dev);
            }
        }
        if !rs_values.is_empty() {
            let mean_rs = rs_values.iter().sum::<f64>() / rs_values.len() as f64;
            log_sizes.push((size as f64).log2());
            log_rs.push(mean_rs.log2());
        }
    }

    if log_sizes.len() < 2 {
        return 0.5;
    }
    regression_slope(&log_sizes, &log_rs)
}

/// Detrended fluctuation analysis scaling exponent.
///
/// Integrates the demeaned signal, measures the RMS residual from a linear
/// detrend over ~20 log-spaced scales up to N/4, and regresses
/// log(fluctuation) on log(scale). Returns 0.0 on degenerate input.
pub fn dfa_alpha(x: &[f64]) -> f64 {
    let n = x.len();
    if n < 40 {
        return 0.0;
    }
    let mean = x.iter().sum::<f64>() / n as f64;
    let mut profile = Vec::with_capacity(n);
    let mut cum = 0.0;
    for v in x {
        cum += v - mean;
        profile.push(cum);
    }

    // ~20 log-spaced integer scales in [10, n/4].
    let max_scale = (n / 4) as f64;
    let mut scales: Vec<usize> = (0..20)
        .map(|i| {
            let t = i as f64 / 19.0;
            10f64.powf(1.0 + t * (max_scale.log10() - 1.0)).round() as usize
        })
        .filter(|&s| s > 1)
        .collect();
    scales.dedup();
    if scales.is_empty() {
        return 0.0;
    }

    let mut log_scales = Vec::new();
    let mut log_fluct = Vec::new();
    for &scale in &scales {
        let n_segments = n / scale;
        if n_segments == 0 {
            continue;
        }
        let mut acc = 0.0;
        for s in 0..n_segments {
            acc += detrended_rms(&profile[s * scale..(s + 1) * scale]);
        }
        let f = acc / n_segments as f64;
        if f <= 0.0 {
            return 0.0;
        }
        log_scales.push((scale as f64).log10());
        log_fluct.push(f.log10());
    }
    if log_scales.len() < 2 {
        return 0.0;
    }
    regression_slope(&log_scales, &log_fluct)
}
