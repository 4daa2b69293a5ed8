//! Pipeline configuration.
//!
//! [`SignalConfig`] holds every tunable parameter of the conditioning and
//! analysis pipeline; [`ModelParams`] holds the classifier hyperparameters.
//! Band frequency boundaries are fixed constants of the design (see
//! [`crate::spectral::Band`]), not configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for the signal-conditioning and analysis pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use eeg_attention::SignalConfig;
///
/// let cfg = SignalConfig {
///     sfreq: 256.0,              // device sampled at 256 Hz
///     notch_freq: 50.0,          // European mains
///     ..SignalConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Sampling rate in Hz.
    ///
    /// Default: `128.0` Hz.
    pub sfreq: f64,

    /// Mains interference frequency suppressed by the notch filter.
    ///
    /// Default: `60.0` Hz.
    pub notch_freq: f64,

    /// Low cutoff of the broadband zero-phase band-pass filter in Hz.
    ///
    /// Default: `0.5` Hz.
    pub bandpass_low: f64,

    /// High cutoff of the broadband band-pass filter in Hz. Must stay below
    /// the Nyquist frequency.
    ///
    /// Default: `45.0` Hz.
    pub bandpass_high: f64,

    /// Absolute amplitude (µV) above which a sample counts as an artifact.
    ///
    /// Default: `100.0`.
    pub artifact_threshold: f64,

    /// Minimum per-channel variance below which a channel is flagged as dead
    /// by the quality check. Deliberately quiet test signals can lower this.
    ///
    /// Default: `0.1`.
    pub variance_floor: f64,

    /// Samples per epoch. At the default 128 Hz this is one second.
    ///
    /// Default: `128`.
    pub window_size: usize,

    /// Overlap fraction between consecutive windows, in `[0, 1)`. The core
    /// itself processes one window at a time; this is advisory for callers
    /// slicing a continuous stream.
    ///
    /// Default: `0.5`.
    pub overlap: f64,

    /// Ordered channel names. Every [`crate::Epoch`] processed by a
    /// configured pipeline must have exactly this many rows.
    pub channels: Vec<String>,
}

/// The 14-channel Emotiv EPOC montage the original recordings used.
const DEFAULT_CHANNELS: [&str; 14] = [
    "AF3", "F7", "F3", "FC5", "T7", "P7", "O1", "O2", "P8", "T8", "FC6", "F4", "F8", "AF4",
];

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            sfreq: 128.0,
            notch_freq: 60.0,
            bandpass_low: 0.5,
            bandpass_high: 45.0,
            artifact_threshold: 100.0,
            variance_floor: 0.1,
            window_size: 128,
            overlap: 0.5,
            channels: DEFAULT_CHANNELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SignalConfig {
    /// Nyquist frequency (half the sampling rate).
    pub fn nyquist(&self) -> f64 {
        self.sfreq / 2.0
    }

    /// Number of channels.
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    /// Check every invariant the filter design and the pipeline rely on.
    pub fn validate(&self) -> Result<()> {
        let nyq = self.nyquist();
        if !(self.sfreq.is_finite() && self.sfreq > 0.0) {
            return Err(Error::Config(format!("sampling rate {} Hz", self.sfreq)));
        }
        if self.bandpass_low <= 0.0 || self.bandpass_low >= self.bandpass_high {
            return Err(Error::Config(format!(
                "bandpass low {} Hz must satisfy 0 < low < high ({} Hz)",
                self.bandpass_low, self.bandpass_high
            )));
        }
        if self.bandpass_high >= nyq {
            return Err(Error::Config(format!(
                "bandpass high {} Hz must stay below Nyquist ({nyq} Hz)",
                self.bandpass_high
            )));
        }
        if self.notch_freq >= nyq {
            return Err(Error::Config(format!(
                "notch {} Hz must stay below Nyquist ({nyq} Hz)",
                self.notch_freq
            )));
        }
        if self.channels.is_empty() {
            return Err(Error::Config("channel list is empty".into()));
        }
        if self.window_size == 0 {
            return Err(Error::Config("window size must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(Error::Config(format!("overlap {} not in [0, 1)", self.overlap)));
        }
        Ok(())
    }
}

/// Hyperparameters of the gradient-boosted attention classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    /// Number of boosting rounds. Default: `100`.
    pub n_estimators: usize,
    /// Shrinkage applied to each tree's contribution. Default: `0.1`.
    pub learning_rate: f64,
    /// Maximum depth of each regression tree. Default: `3`.
    pub max_depth: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self { n_estimators: 100, learning_rate: 0.1, max_depth: 3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = SignalConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.n_channels(), 14);
        assert_eq!(cfg.nyquist(), 64.0);
    }

    #[test]
    fn rejects_cutoff_at_nyquist() {
        let cfg = SignalConfig { bandpass_high: 64.0, ..SignalConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_band() {
        let cfg = SignalConfig { bandpass_low: 50.0, bandpass_high: 45.0, ..SignalConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_channel_list() {
        let cfg = SignalConfig { channels: vec![], ..SignalConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
