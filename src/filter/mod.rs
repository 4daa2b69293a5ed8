//! Digital filtering: coefficient design + zero-phase application.
//!
//! [`FilterBank`] derives every filter the pipeline uses once, at
//! construction, from a [`SignalConfig`]; the coefficients are immutable and
//! shared read-only across concurrent epoch invocations.

pub mod apply;
pub mod design;

pub use apply::{filtfilt_1d, filtfilt_inplace};
pub use design::{butter_bandpass, notch, Biquad};

use ndarray::Array2;

use crate::config::SignalConfig;
use crate::error::Result;
use crate::spectral::Band;

/// Mains-notch quality factor, matching `iirnotch(f0, Q=30)`.
const NOTCH_Q: f64 = 30.0;

/// The fixed set of filters used throughout the pipeline.
///
/// * a notch at [`SignalConfig::notch_freq`] (Q = 30) for mains suppression,
/// * a 4th-order broadband band-pass across `[bandpass_low, bandpass_high]`,
/// * one 4th-order band-pass per canonical EEG band.
///
/// All filters are applied zero-phase (forward + reverse), so band powers
/// and phase-based connectivity are not distorted by group delay.
#[derive(Debug, Clone)]
pub struct FilterBank {
    notch: Biquad,
    broadband: Vec<Biquad>,
    bands: [(Band, Vec<Biquad>); Band::ALL.len()],
}

impl FilterBank {
    /// Design all coefficients. Fails with a configuration error when any
    /// cutoff is at or above Nyquist, or a band is inverted.
    pub fn new(cfg: &SignalConfig) -> Result<Self> {
        let notch = notch(cfg.notch_freq, NOTCH_Q, cfg.sfreq)?;
        let broadband = butter_bandpass(cfg.bandpass_low, cfg.bandpass_high, cfg.sfreq)?;
        let mk = |band: Band| -> Result<(Band, Vec<Biquad>)> {
            let (low, high) = band.range();
            Ok((band, butter_bandpass(low, high, cfg.sfreq)?))
        };
        let bands = [
            mk(Band::Delta)?,
            mk(Band::Theta)?,
            mk(Band::Alpha)?,
            mk(Band::Beta)?,
            mk(Band::Gamma)?,
        ];
        Ok(Self { notch, broadband, bands })
    }

    /// Zero-phase notch, applied to every channel in place.
    pub fn apply_notch(&self, data: &mut Array2<f64>) -> Result<()> {
        filtfilt_inplace(data, std::slice::from_ref(&self.notch))
    }

    /// Zero-phase broadband band-pass, applied to every channel in place.
    pub fn apply_broadband(&self, data: &mut Array2<f64>) -> Result<()> {
        filtfilt_inplace(data, &self.broadband)
    }

    /// Zero-phase band isolation filter for one canonical band.
    pub fn apply_band(&self, data: &mut Array2<f64>, band: Band) -> Result<()> {
        // `bands` is built in Band::ALL order.
        let idx = Band::ALL.iter().position(|b| *b == band).unwrap_or(0);
        filtfilt_inplace(data, &self.bands[idx].1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn bank_builds_from_default_config() {
        let cfg = SignalConfig::default();
        assert!(FilterBank::new(&cfg).is_ok());
    }

    #[test]
    fn bank_rejects_notch_above_nyquist() {
        let cfg = SignalConfig { sfreq: 100.0, ..SignalConfig::default() };
        // 60 Hz notch with 50 Hz Nyquist.
        assert!(FilterBank::new(&cfg).is_err());
    }

    #[test]
    fn band_filter_isolates_alpha() {
        let cfg = SignalConfig::default();
        let bank = FilterBank::new(&cfg).unwrap();
        // 10 Hz (alpha) + 25 Hz (beta) mixture.
        let n = 512;
        let mut data = Array2::from_shape_fn((1, n), |(_, t)| {
            let t = t as f64 / cfg.sfreq;
            (2.0 * std::f64::consts::PI * 10.0 * t).sin()
                + (2.0 * std::f64::consts::PI * 25.0 * t).sin()
        });
        bank.apply_band(&mut data, Band::Alpha).unwrap();
        // Interior power: most of the 10 Hz component (0.5, minus the band
        // edges' rolloff) survives, the 25 Hz component (0.5) is gone.
        let interior = data.slice(ndarray::s![0, 128..384]);
        let power: f64 = interior.iter().map(|v| v * v).sum::<f64>() / interior.len() as f64;
        assert!(power > 0.2 && power < 0.55, "alpha-band power {power}");
    }
}
