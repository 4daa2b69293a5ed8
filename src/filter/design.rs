//! IIR coefficient design for the pipeline's fixed filter set.
//!
//! Everything here is a second-order section (biquad) computed from
//! normalized frequencies (cutoff / Nyquist) via the bilinear transform:
//!   • `notch`  — RBJ notch at the mains frequency, quality factor Q
//!   • `butter_bandpass` — 4th-order Butterworth band-pass realized as a
//!     cascade [HP(low), HP(low), LP(high), LP(high)] where the two sections
//!     per edge carry the order-4 Butterworth pole Qs (0.5412, 1.3066)
//!
//! Coefficients are designed once at [`crate::FilterBank`] construction and
//! shared read-only by every pipeline invocation.

use std::f64::consts::PI;

use crate::error::{Error, Result};

/// Butterworth pole quality factors for a 4th-order (two-section) edge.
const BUTTER4_Q: [f64; 2] = [0.541_196_100_146_197, 1.306_562_964_876_376_4];

/// One second-order transfer function, coefficients normalized so `a0 = 1`.
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    /// Numerator `[b0, b1, b2]`.
    pub b: [f64; 3],
    /// Denominator `[1, a1, a2]`.
    pub a: [f64; 3],
}

impl Biquad {
    /// DC gain of the section, `Σb / Σa`.
    pub fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (self.a[0] + self.a[1] + self.a[2])
    }
}

/// Reject a cutoff that the bilinear design cannot realize.
fn check_cutoff(freq: f64, sfreq: f64, what: &str) -> Result<()> {
    let nyq = sfreq / 2.0;
    if !(freq > 0.0 && freq < nyq) {
        return Err(Error::Config(format!(
            "{what} cutoff {freq} Hz outside (0, {nyq}) Hz at {sfreq} Hz sampling"
        )));
    }
    Ok(())
}

/// RBJ notch biquad at `f0` Hz with quality factor `q`.
///
/// Unit gain everywhere except a narrow null at `f0`; Q = 30 at 60 Hz gives
/// a 2 Hz-wide rejection band, matching `scipy.signal.iirnotch(f0, Q=30)`.
pub fn notch(f0: f64, q: f64, sfreq: f64) -> Result<Biquad> {
    check_cutoff(f0, sfreq, "notch")?;
    let w0 = 2.0 * PI * f0 / sfreq;
    let alpha = w0.sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let a0 = 1.0 + alpha;
    Ok(Biquad {
        b: [1.0 / a0, -2.0 * cos_w0 / a0, 1.0 / a0],
        a: [1.0, -2.0 * cos_w0 / a0, (1.0 - alpha) / a0],
    })
}

/// Second-order Butterworth-style low-pass with explicit pole Q.
fn lowpass_q(cutoff: f64, q: f64, sfreq: f64) -> Biquad {
    let w0 = 2.0 * PI * cutoff / sfreq;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);
    let a0 = 1.0 + alpha;
    let b1 = 1.0 - cos_w0;
    Biquad {
        b: [b1 / 2.0 / a0, b1 / a0, b1 / 2.0 / a0],
        a: [1.0, -2.0 * cos_w0 / a0, (1.0 - alpha) / a0],
    }
}

/// Second-order Butterworth-style high-pass with explicit pole Q.
fn highpass_q(cutoff: f64, q: f64, sfreq: f64) -> Biquad {
    let w0 = 2.0 * PI * cutoff / sfreq;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);
    let a0 = 1.0 + alpha;
    let b1 = 1.0 + cos_w0;
    Biquad {
        b: [b1 / 2.0 / a0, -b1 / a0, b1 / 2.0 / a0],
        a: [1.0, -2.0 * cos_w0 / a0, (1.0 - alpha) / a0],
    }
}

/// 4th-order Butterworth band-pass `[low, high]` as four cascaded sections.
///
/// Fails with a configuration error when `low >= high` or either cutoff
/// reaches the Nyquist frequency.
pub fn butter_bandpass(low: f64, high: f64, sfreq: f64) -> Result<Vec<Biquad>> {
    check_cutoff(low, sfreq, "band-pass low")?;
    check_cutoff(high, sfreq, "band-pass high")?;
    if low >= high {
        return Err(Error::Config(format!(
            "band-pass low {low} Hz must stay below high {high} Hz"
        )));
    }
    Ok(vec![
        highpass_q(low, BUTTER4_Q[0], sfreq),
        highpass_q(low, BUTTER4_Q[1], sfreq),
        lowpass_q(high, BUTTER4_Q[0], sfreq),
        lowpass_q(high, BUTTER4_Q[1], sfreq),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Magnitude response of a biquad cascade at frequency `f` Hz.
    fn gain_at(sections: &[Biquad], f: f64, sfreq: f64) -> f64 {
        use rustfft::num_complex::Complex;
        let w = 2.0 * PI * f / sfreq;
        let z1 = Complex::new(w.cos(), -w.sin());
        let z2 = z1 * z1;
        sections
            .iter()
            .map(|s| {
                let num = Complex::new(s.b[0], 0.0) + z1 * s.b[1] + z2 * s.b[2];
                let den = Complex::new(s.a[0], 0.0) + z1 * s.a[1] + z2 * s.a[2];
                (num / den).norm()
            })
            .product()
    }

    #[test]
    fn notch_nulls_its_center_frequency() {
        let n = notch(60.0, 30.0, 128.0).unwrap();
        let g60 = gain_at(&[n], 60.0, 128.0);
        let g10 = gain_at(&[n], 10.0, 128.0);
        assert!(g60 < 1e-6, "gain at 60 Hz = {g60:.2e}");
        assert!((g10 - 1.0).abs() < 1e-2, "gain at 10 Hz = {g10}");
    }

    #[test]
    fn bandpass_passes_midband_rejects_edges() {
        let sos = butter_bandpass(0.5, 45.0, 128.0).unwrap();
        let g10 = gain_at(&sos, 10.0, 128.0);
        let g60 = gain_at(&sos, 60.0, 128.0);
        let g0_05 = gain_at(&sos, 0.05, 128.0);
        assert!((g10 - 1.0).abs() < 1e-3, "passband gain at 10 Hz = {g10}");
        assert!(g60 < 0.15, "stopband gain at 60 Hz = {g60}");
        assert!(g0_05 < 0.01, "stopband gain at 0.05 Hz = {g0_05}");
    }

    #[test]
    fn bandpass_cutoff_gain_is_half_power() {
        let sos = butter_bandpass(0.5, 45.0, 128.0).unwrap();
        let g = gain_at(&sos, 45.0, 128.0);
        assert!((g - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.02, "edge gain {g}");
    }

    #[test]
    fn rejects_cutoffs_at_or_above_nyquist() {
        assert!(butter_bandpass(0.5, 64.0, 128.0).is_err());
        assert!(butter_bandpass(0.5, 70.0, 128.0).is_err());
        assert!(notch(64.0, 30.0, 128.0).is_err());
    }

    #[test]
    fn rejects_inverted_cutoffs() {
        assert!(butter_bandpass(45.0, 0.5, 128.0).is_err());
    }
}
