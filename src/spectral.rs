//! Spectral estimation and pairwise connectivity.
//!
//! Welch's method (periodic Hann window, 50 % overlap, per-segment mean
//! detrend, one-sided density scaling) drives both the per-band power
//! estimates and the coherence spectra; phase-based connectivity (PLV, PLI)
//! comes from the analytic signal via an FFT Hilbert transform.
//!
//! Degenerate input never produces NaN: an all-zero epoch yields all-zero
//! band powers and an all-zero connectivity matrix.

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

/// The five canonical EEG bands. Frequency boundaries are fixed constants
/// of the design, not configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    /// All bands, in canonical low→high order.
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    /// Inclusive frequency range in Hz.
    pub fn range(self) -> (f64, f64) {
        match self {
            Band::Delta => (0.5, 4.0),
            Band::Theta => (4.0, 8.0),
            Band::Alpha => (8.0, 13.0),
            Band::Beta => (13.0, 30.0),
            Band::Gamma => (30.0, 45.0),
        }
    }

    /// Lower-case band name, e.g. `"alpha"`.
    pub fn name(self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }
}

/// Named powers for the five canonical bands.
///
/// As produced by [`band_powers`] these are `log1p`-compressed and
/// normalized to sum to 1 — except for an all-zero epoch, which yields
/// all-zero powers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandPowers {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl BandPowers {
    /// Power of one band.
    pub fn get(&self, band: Band) -> f64 {
        match band {
            Band::Delta => self.delta,
            Band::Theta => self.theta,
            Band::Alpha => self.alpha,
            Band::Beta => self.beta,
            Band::Gamma => self.gamma,
        }
    }

    fn set(&mut self, band: Band, value: f64) {
        match band {
            Band::Delta => self.delta = value,
            Band::Theta => self.theta = value,
            Band::Alpha => self.alpha = value,
            Band::Beta => self.beta = value,
            Band::Gamma => self.gamma = value,
        }
    }

    /// Sum over the five bands.
    pub fn total(&self) -> f64 {
        Band::ALL.iter().map(|&b| self.get(b)).sum()
    }

    /// Band with the largest power (ties resolve to the lower band).
    pub fn dominant(&self) -> Band {
        let mut best = Band::Delta;
        for &b in &Band::ALL[1..] {
            if self.get(b) > self.get(best) {
                best = b;
            }
        }
        best
    }
}

/// How a [`ConnectivityMatrix`] was computed, which determines its
/// interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityMethod {
    /// Phase locking value: `|mean(exp(i·Δφ))|`, in [0, 1].
    Plv,
    /// Magnitude-squared coherence averaged over the alpha band, in [0, 1].
    Coherence,
    /// Phase lag index: `|mean(sign(sin(Δφ)))|`, in [0, 1].
    Pli,
}

/// Symmetric channels × channels connectivity. The diagonal is left at zero
/// (self-connectivity is undefined).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityMatrix {
    pub method: ConnectivityMethod,
    pub values: Array2<f64>,
}

// ── Welch's method ───────────────────────────────────────────────────────────

/// Periodic Hann window (`sym=False`), the `scipy.signal.welch` default.
fn hann_periodic(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos()))
        .collect()
}

/// Segment length used everywhere: `min(64, n)` keeps at least a 2 Hz
/// resolution on one-second windows while still averaging several segments.
pub fn default_nperseg(n: usize) -> usize {
    64.min(n)
}

/// Windowed FFT of each 50 %-overlapping segment of `x`.
///
/// Returns the one-sided spectra (length `nperseg/2 + 1`) of every segment,
/// plus the density scale `1 / (fs · Σw²)`.
fn segment_spectra(x: &[f64], nperseg: usize, sfreq: f64) -> (Vec<Vec<Complex<f64>>>, f64) {
    let step = (nperseg / 2).max(1);
    let win = hann_periodic(nperseg);
    let win_power: f64 = win.iter().map(|w| w * w).sum();
    let scale = 1.0 / (sfreq * win_power);

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(nperseg);
    let n_freqs = nperseg / 2 + 1;

    let mut spectra = Vec::new();
    let mut start = 0;
    while start + nperseg <= x.len() {
        let seg = &x[start..start + nperseg];
        let mean = seg.iter().sum::<f64>() / nperseg as f64;
        let mut buf: Vec<Complex<f64>> = seg
            .iter()
            .zip(win.iter())
            // Guard against NaN/Inf leaking into the FFT.
            .map(|(&v, &w)| {
                let v = if v.is_finite() { v } else { 0.0 };
                Complex::new((v - mean) * w, 0.0)
            })
            .collect();
        fft.process(&mut buf);
        buf.truncate(n_freqs);
        spectra.push(buf);
        start += step;
    }
    (spectra, scale)
}

/// Welch power spectral density of a single channel.
///
/// Returns `(freqs, psd)` with `freqs[k] = k · fs / nperseg` and one-sided
/// density scaling (interior bins doubled).
pub fn welch(x: &[f64], sfreq: f64, nperseg: usize) -> (Vec<f64>, Vec<f64>) {
    let nperseg = nperseg.min(x.len()).max(2);
    let (spectra, scale) = segment_spectra(x, nperseg, sfreq);
    let n_freqs = nperseg / 2 + 1;
    let freqs: Vec<f64> = (0..n_freqs).map(|k| k as f64 * sfreq / nperseg as f64).collect();

    if spectra.is_empty() {
        return (freqs, vec![0.0; n_freqs]);
    }
    let mut psd = vec![0.0; n_freqs];
    for spec in &spectra {
        for (k, v) in spec.iter().enumerate() {
            let mut p = v.norm_sqr() * scale;
            if k != 0 && !(nperseg % 2 == 0 && k == n_freqs - 1) {
                p *= 2.0;
            }
            psd[k] += p;
        }
    }
    let n_seg = spectra.len() as f64;
    for p in psd.iter_mut() {
        *p /= n_seg;
    }
    (freqs, psd)
}

/// Magnitude-squared coherence of two channels, averaged over `band`.
///
/// Welch cross- and auto-spectra with the same segmentation as [`welch`];
/// degenerate (silent) channels report 0 rather than NaN.
pub fn coherence_band(x: &[f64], y: &[f64], sfreq: f64, band: Band) -> f64 {
    let nperseg = default_nperseg(x.len().min(y.len())).max(2);
    let (sx, scale) = segment_spectra(x, nperseg, sfreq);
    let (sy, _) = segment_spectra(y, nperseg, sfreq);
    if sx.is_empty() || sy.is_empty() {
        return 0.0;
    }
    let n_freqs = nperseg / 2 + 1;
    let n_seg = sx.len().min(sy.len());

    let mut pxx = vec![0.0; n_freqs];
    let mut pyy = vec![0.0; n_freqs];
    let mut pxy = vec![Complex::new(0.0, 0.0); n_freqs];
    for s in 0..n_seg {
        for k in 0..n_freqs {
            pxx[k] += sx[s][k].norm_sqr() * scale;
            pyy[k] += sy[s][k].norm_sqr() * scale;
            pxy[k] += sx[s][k] * sy[s][k].conj() * scale;
        }
    }

    let (low, high) = band.range();
    let mut acc = 0.0;
    let mut count = 0;
    for k in 0..n_freqs {
        let f = k as f64 * sfreq / nperseg as f64;
        if f < low || f > high {
            continue;
        }
        let denom = pxx[k] * pyy[k];
        let c = if denom > 1e-20 { pxy[k].norm_sqr() / denom } else { 0.0 };
        acc += c;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        (acc / count as f64).clamp(0.0, 1.0)
    }
}

// ── Band power ───────────────────────────────────────────────────────────────

/// Per-band power of a cleaned epoch.
///
/// Welch PSD per channel with `nperseg = min(64, n)`, band-masked bin means
/// averaged over all channels, `log1p` compression, then normalization so
/// the five powers sum to 1. An all-zero epoch short-circuits to all-zero
/// powers (no NaN).
pub fn band_powers(data: &Array2<f64>, sfreq: f64) -> BandPowers {
    if data.iter().all(|&v| v == 0.0 || !v.is_finite()) {
        return BandPowers::default();
    }
    let n = data.ncols();
    let nperseg = default_nperseg(n);

    // PSD per channel, accumulated per band over channels × bins.
    let mut sums = BandPowers::default();
    let mut counts = [0usize; 5];
    for row in data.rows() {
        let x: Vec<f64> = row.to_vec();
        let (freqs, psd) = welch(&x, sfreq, nperseg);
        for (bi, &band) in Band::ALL.iter().enumerate() {
            let (low, high) = band.range();
            for (k, &f) in freqs.iter().enumerate() {
                if f >= low && f <= high {
                    sums.set(band, sums.get(band) + psd[k]);
                    counts[bi] += 1;
                }
            }
        }
    }

    let mut powers = BandPowers::default();
    for (bi, &band) in Band::ALL.iter().enumerate() {
        let mean = if counts[bi] > 0 { sums.get(band) / counts[bi] as f64 } else { 0.0 };
        powers.set(band, mean.ln_1p());
    }

    let total = powers.total() + 1e-10;
    for band in Band::ALL {
        powers.set(band, powers.get(band) / total);
    }
    powers
}

// ── Analytic signal / phase connectivity ─────────────────────────────────────

/// Instantaneous phase of the analytic (Hilbert) signal.
///
/// Returns `None` for signals with no variation, whose phase is degenerate.
pub fn hilbert_phases(x: &[f64]) -> Option<Vec<f64>> {
    let n = x.len();
    if n == 0 || x.iter().all(|&v| v == x[0]) {
        return None;
    }
    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut buf: Vec<Complex<f64>> = x
        .iter()
        .map(|&v| Complex::new(if v.is_finite() { v } else { 0.0 }, 0.0))
        .collect();
    fft.process(&mut buf);

    // Analytic-signal weights: keep DC (and Nyquist for even n), double the
    // positive frequencies, zero the negative ones.
    let half = n / 2;
    for (k, v) in buf.iter_mut().enumerate() {
        if k == 0 || (n % 2 == 0 && k == half) {
            // unchanged
        } else if k < half || (n % 2 == 1 && k == half) {
            *v *= 2.0;
        } else {
            *v = Complex::new(0.0, 0.0);
        }
    }
    ifft.process(&mut buf);
    let inv = 1.0 / n as f64;
    Some(buf.iter().map(|c| (c.im * inv).atan2(c.re * inv)).collect())
}

/// Phase locking value over a pair's instantaneous phase differences.
pub fn phase_locking_value(pa: &[f64], pb: &[f64]) -> f64 {
    let n = pa.len().min(pb.len());
    if n == 0 {
        return 0.0;
    }
    let (mut re, mut im) = (0.0, 0.0);
    for i in 0..n {
        let d = pa[i] - pb[i];
        re += d.cos();
        im += d.sin();
    }
    ((re / n as f64).powi(2) + (im / n as f64).powi(2)).sqrt()
}

/// Phase lag index over a pair's instantaneous phase differences.
pub fn phase_lag_index(pa: &[f64], pb: &[f64]) -> f64 {
    let n = pa.len().min(pb.len());
    if n == 0 {
        return 0.0;
    }
    let s: f64 = (0..n).map(|i| ((pa[i] - pb[i]).sin()).signum()).sum();
    (s / n as f64).abs()
}

/// Pairwise connectivity of a cleaned epoch.
///
/// The matrix is symmetric with a zero diagonal. Channel pairs where either
/// signal is degenerate (e.g. all-zero) report 0.
pub fn connectivity(data: &Array2<f64>, method: ConnectivityMethod, sfreq: f64) -> ConnectivityMatrix {
    let n_ch = data.nrows();
    let mut values = Array2::<f64>::zeros((n_ch, n_ch));

    // Phases once per channel, shared by every pair.
    let phases: Vec<Option<Vec<f64>>> = match method {
        ConnectivityMethod::Plv | ConnectivityMethod::Pli => data
            .rows()
            .into_iter()
            .map(|row| hilbert_phases(&row.to_vec()))
            .collect(),
        ConnectivityMethod::Coherence => vec![None; n_ch],
    };

    for i in 0..n_ch {
        for j in (i + 1)..n_ch {
            let v = match method {
                ConnectivityMethod::Plv => match (&phases[i], &phases[j]) {
                    (Some(pa), Some(pb)) => phase_locking_value(pa, pb),
                    _ => 0.0,
                },
                ConnectivityMethod::Pli => match (&phases[i], &phases[j]) {
                    (Some(pa), Some(pb)) => phase_lag_index(pa, pb),
                    _ => 0.0,
                },
                ConnectivityMethod::Coherence => {
                    let xi: Vec<f64> = data.row(i).to_vec();
                    let xj: Vec<f64> = data.row(j).to_vec();
                    coherence_band(&xi, &xj, sfreq, Band::Alpha)
                }
            };
            values[[i, j]] = v;
            values[[j, i]] = v;
        }
    }
    ConnectivityMatrix { method, values }
}
