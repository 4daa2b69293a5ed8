//! Per-epoch signal conditioning.
//!
//! The cleaning chain is: per-channel mean removal, zero-phase notch, zero-
//! phase broadband band-pass, interpolation over above-threshold artifact
//! runs, common-average re-reference, and, only when the amplitude check
//! fails, wavelet denoising. Quality is scored on the cleaned epoch before
//! any denoising so the report describes what the filters actually produced.
//!
//! Quality problems never abort the pipeline. A pathological epoch (NaN,
//! Inf, or every channel flat) is flagged with a degraded [`QualityReport`]
//! and an all-zero cleaned epoch so downstream spectral code stays NaN-free.

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SignalConfig;
use crate::error::{Error, Result};
use crate::filter::FilterBank;
use crate::wavelet;

/// Fraction of total FFT magnitude allowed at the mains frequency.
const LINE_NOISE_LIMIT: f64 = 0.2;
/// Absolute channel-mean bound for the baseline check, in microvolts.
const BASELINE_LIMIT: f64 = 10.0;
/// Sample-to-sample jump counted as an artifact in the ratio.
const DERIVATIVE_LIMIT: f64 = 20.0;
/// Channel variance above this adds one artifact count for the channel.
const VARIANCE_LIMIT: f64 = 50.0;

/// Signal-quality diagnostics for one epoch.
///
/// Four boolean checks plus a continuous artifact ratio in [0, 1]. The
/// overall score is the mean of the booleans scaled by `1 - artifact_ratio`,
/// so a clean epoch scores 1.0 and a degraded one scores 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Every sample within the configured artifact threshold.
    pub amplitude_ok: bool,
    /// Every channel variance above the configured floor (dead-channel check).
    pub variance_ok: bool,
    /// Every channel mean magnitude below 10 uV.
    pub baseline_ok: bool,
    /// Mains-frequency FFT magnitude below 20 % of the total on every channel.
    pub line_noise_ok: bool,
    /// Fraction of artifact-flagged samples, capped at 1.0.
    pub artifact_ratio: f64,
    /// Mean of the four checks times `1 - artifact_ratio`.
    pub overall_score: f64,
}

impl QualityReport {
    /// The all-failed report used for pathological input. An explicit branch
    /// rather than a caught panic, so it can be tested in isolation.
    pub fn degraded() -> Self {
        QualityReport {
            amplitude_ok: false,
            variance_ok: false,
            baseline_ok: false,
            line_noise_ok: false,
            artifact_ratio: 1.0,
            overall_score: 0.0,
        }
    }
}

/// Cleans raw epochs and scores their quality.
#[derive(Debug)]
pub struct SignalConditioner {
    config: SignalConfig,
    filters: FilterBank,
}

impl SignalConditioner {
    pub fn new(config: SignalConfig) -> Result<Self> {
        config.validate()?;
        let filters = FilterBank::new(&config)?;
        Ok(SignalConditioner { config, filters })
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    pub fn filters(&self) -> &FilterBank {
        &self.filters
    }

    /// Runs the full cleaning chain on one epoch.
    ///
    /// Returns the cleaned epoch and its quality report. Only shape errors
    /// are fatal; poor signal quality is reported, never raised.
    pub fn condition(&self, epoch: &Array2<f64>) -> Result<(Array2<f64>, QualityReport)> {
        let n_ch = self.config.n_channels();
        if epoch.nrows() != n_ch {
            return Err(Error::Config(format!(
                "epoch has {} channels, config expects {}",
                epoch.nrows(),
                n_ch
            )));
        }
        if epoch.ncols() == 0 {
            return Err(Error::Config("epoch has no samples".into()));
        }

        if !epoch.iter().all(|v| v.is_finite()) || is_flat(epoch) {
            warn!("pathological epoch (non-finite or flat), reporting degraded quality");
            return Ok((Array2::zeros(epoch.raw_dim()), QualityReport::degraded()));
        }

        let mut clean = epoch.clone();

        // DC removal per channel.
        for mut row in clean.rows_mut() {
            let mean = row.sum() / row.len() as f64;
            row.mapv_inplace(|v| v - mean);
        }

        self.filters.apply_notch(&mut clean)?;
        self.filters.apply_broadband(&mut clean)?;

        interpolate_artifacts(&mut clean, self.config.artifact_threshold);

        // Common-average reference.
        let n_samples = clean.ncols();
        for t in 0..n_samples {
            let col_mean = clean.column(t).sum() / n_ch as f64;
            for c in 0..n_ch {
                clean[[c, t]] -= col_mean;
            }
        }

        let quality = self.check_quality(&clean);

        if !quality.amplitude_ok {
            debug!(
                artifact_ratio = quality.artifact_ratio,
                "amplitude check failed, applying wavelet denoising"
            );
            for mut row in clean.rows_mut() {
                let denoised = wavelet::denoise(&row.to_vec());
                for (dst, src) in row.iter_mut().zip(denoised.iter()) {
                    *dst = *src;
                }
            }
        }

        Ok((clean, quality))
    }

    /// Scores a (cleaned) epoch without modifying it.
    pub fn check_quality(&self, data: &Array2<f64>) -> QualityReport {
        if data.ncols() == 0 || !data.iter().all(|v| v.is_finite()) {
            return QualityReport::degraded();
        }

        let amplitude_ok = data.iter().all(|v| v.abs() < self.config.artifact_threshold);

        let mut variance_ok = true;
        let mut baseline_ok = true;
        for row in data.rows() {
            let n = row.len() as f64;
            let mean = row.sum() / n;
            let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            if var <= self.config.variance_floor {
                variance_ok = false;
            }
            if mean.abs() >= BASELINE_LIMIT {
                baseline_ok = false;
            }
        }

        let line_noise_ok = self.check_line_noise(data);
        let artifact_ratio = self.artifact_ratio(data);

        let checks = [amplitude_ok, variance_ok, baseline_ok, line_noise_ok];
        let bool_mean = checks.iter().filter(|&&b| b).count() as f64 / checks.len() as f64;

        QualityReport {
            amplitude_ok,
            variance_ok,
            baseline_ok,
            line_noise_ok,
            artifact_ratio,
            overall_score: bool_mean * (1.0 - artifact_ratio),
        }
    }

    /// True when no channel carries excessive power at the mains frequency.
    fn check_line_noise(&self, data: &Array2<f64>) -> bool {
        let n = data.ncols();
        let mut planner: FftPlanner<f64> = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);

        // Bin nearest the notch frequency in the full (two-sided) spectrum.
        let bin = ((self.config.notch_freq * n as f64 / self.config.sfreq).round() as usize).min(n - 1);

        for row in data.rows() {
            let mut buf: Vec<Complex<f64>> =
                row.iter().map(|&v| Complex::new(v, 0.0)).collect();
            fft.process(&mut buf);
            let total: f64 = buf.iter().map(|c| c.norm()).sum();
            if total < 1e-12 {
                continue;
            }
            if buf[bin].norm() / total > LINE_NOISE_LIMIT {
                return false;
            }
        }
        true
    }

    /// Fraction of artifact-flagged samples across all channels, capped at 1.
    ///
    /// Counts amplitude violations, large sample-to-sample jumps, and one
    /// count per channel whose variance exceeds the fixed limit.
    fn artifact_ratio(&self, data: &Array2<f64>) -> f64 {
        let mut artifacts = 0usize;
        for row in data.rows() {
            artifacts += row
                .iter()
                .filter(|v| v.abs() > self.config.artifact_threshold)
                .count();
            for w in row.to_vec().windows(2) {
                if (w[1] - w[0]).abs() > DERIVATIVE_LIMIT {
                    artifacts += 1;
                }
            }
            let n = row.len() as f64;
            let mean = row.sum() / n;
            let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            if var > VARIANCE_LIMIT {
                artifacts += 1;
            }
        }
        let total = (data.nrows() * data.ncols()) as f64;
        (artifacts as f64 / total).min(1.0)
    }
}

/// True when every channel is constant (zero peak-to-peak).
fn is_flat(data: &Array2<f64>) -> bool {
    data.rows().into_iter().all(|row| {
        let first = row[0];
        row.iter().all(|&v| v == first)
    })
}

/// Replaces above-threshold runs with linear interpolation from the samples
/// adjacent to the run. Runs touching the first or last sample are left
/// unmodified, there is nothing sound to extrapolate from.
fn interpolate_artifacts(data: &mut Array2<f64>, threshold: f64) {
    let n = data.ncols();
    for mut row in data.rows_mut() {
        let mut start = None;
        let mut runs: Vec<(usize, usize)> = Vec::new();
        for i in 0..n {
            let bad = row[i].abs() > threshold;
            match (bad, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    runs.push((s, i));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push((s, n));
        }
        for (s, e) in runs {
            if s == 0 || e == n {
                continue;
            }
            let left = row[s - 1];
            let right = row[e];
            let span = (e - s + 1) as f64;
            for (k, i) in (s..e).enumerate() {
                let frac = (k + 1) as f64 / span;
                row[i] = left + (right - left) * frac;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn conditioner() -> SignalConditioner {
        SignalConditioner::new(SignalConfig::default()).unwrap()
    }

    fn sine_epoch(n_ch: usize, n: usize, freq: f64, amp: f64) -> Array2<f64> {
        Array2::from_shape_fn((n_ch, n), |(c, t)| {
            amp * (2.0 * std::f64::consts::PI * freq * t as f64 / 128.0 + c as f64 * 0.8).sin()
        })
    }

    #[test]
    fn clean_epoch_scores_well() {
        let sc = conditioner();
        let epoch = sine_epoch(14, 128, 10.0, 20.0);
        let (clean, q) = sc.condition(&epoch).unwrap();
        assert!(q.amplitude_ok);
        assert!(q.baseline_ok, "zero-phase filtering must not add offset");
        assert!(q.overall_score > 0.5, "score = {}", q.overall_score);
        assert!(clean.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn wrong_channel_count_is_an_error() {
        let sc = conditioner();
        let epoch = Array2::<f64>::zeros((3, 128));
        assert!(sc.condition(&epoch).is_err());
    }

    #[test]
    fn quality_of_empty_epoch_is_degraded_not_nan() {
        let sc = conditioner();
        let q = sc.check_quality(&Array2::<f64>::zeros((14, 0)));
        assert_eq!(q, QualityReport::degraded());
        assert!(q.overall_score.is_finite());
    }

    #[test]
    fn flat_epoch_is_degraded() {
        let sc = conditioner();
        let (clean, q) = sc.condition(&Array2::zeros((14, 128))).unwrap();
        assert_eq!(q, QualityReport::degraded());
        assert_eq!(q.overall_score, 0.0);
        assert!(clean.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn non_finite_epoch_is_degraded() {
        let sc = conditioner();
        let mut epoch = sine_epoch(14, 128, 10.0, 20.0);
        epoch[[2, 40]] = f64::NAN;
        let (clean, q) = sc.condition(&epoch).unwrap();
        assert_eq!(q.overall_score, 0.0);
        assert!(clean.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn interior_artifact_runs_are_interpolated() {
        let mut data = Array2::from_elem((1, 10), 1.0);
        data[[0, 3]] = 500.0;
        data[[0, 4]] = -400.0;
        interpolate_artifacts(&mut data, 100.0);
        // Run 3..=4 interpolated between samples 2 and 5, all equal 1.0.
        assert!((data[[0, 3]] - 1.0).abs() < 1e-12);
        assert!((data[[0, 4]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn edge_artifact_runs_are_left_alone() {
        let mut data = Array2::from_elem((1, 8), 1.0);
        data[[0, 0]] = 900.0;
        data[[0, 7]] = -900.0;
        interpolate_artifacts(&mut data, 100.0);
        assert_eq!(data[[0, 0]], 900.0);
        assert_eq!(data[[0, 7]], -900.0);
    }

    #[test]
    fn line_noise_flagged_for_strong_mains_component() {
        let sc = conditioner();
        // Pure 60 Hz concentrates nearly all FFT magnitude in the mains bin.
        let epoch = sine_epoch(14, 128, 60.0, 20.0);
        let q = sc.check_quality(&epoch);
        assert!(!q.line_noise_ok);
    }

    #[test]
    fn artifact_ratio_counts_amplitude_violations() {
        let sc = conditioner();
        let mut data = sine_epoch(14, 128, 10.0, 20.0);
        for t in 40..60 {
            data[[0, t]] = 300.0;
        }
        let ratio = sc.artifact_ratio(&data);
        assert!(ratio > 0.0 && ratio <= 1.0);
    }
}
