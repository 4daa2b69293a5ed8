//! Daubechies-4 multi-level wavelet transform.
//!
//! Used in two places: conditional denoising of epochs that fail the
//! amplitude check (universal soft threshold on the detail sub-bands) and
//! the per-level sub-band features of the nonlinear feature group.
//!
//! The transform uses a periodic (circular) boundary with the orthonormal
//! db4 filter pair, so analysis and synthesis use the same coefficients and
//! reconstruction is exact for even lengths; odd lengths are right-padded by
//! repeating the last sample and trimmed again on reconstruction. Levels are
//! capped where a sub-band would drop below twice the filter length.

/// db4 scaling (low-pass) coefficients, orthonormal.
const DB4_LO: [f64; 8] = [
    0.230_377_813_308_855_23,
    0.714_846_570_552_541_5,
    0.630_880_767_929_590_4,
    -0.027_983_769_416_983_85,
    -0.187_034_811_718_881_14,
    0.030_841_381_835_986_965,
    0.032_883_011_666_982_945,
    -0.010_597_401_784_997_278,
];

/// Quadrature-mirror high-pass: `g[k] = (-1)^k · h[N-1-k]`.
fn db4_hi() -> [f64; 8] {
    let mut g = [0.0; 8];
    for (k, slot) in g.iter_mut().enumerate() {
        let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
        *slot = sign * DB4_LO[7 - k];
    }
    g
}

/// Deepest decomposition level for a signal of `n` samples.
///
/// Each level needs at least twice the filter length to keep the circular
/// shifts orthonormal; `max_level(128) == 4`, matching `pywt.dwt_max_level`.
pub fn max_level(n: usize) -> usize {
    let mut len = n;
    let mut levels = 0;
    while len >= 2 * DB4_LO.len() {
        if len % 2 == 1 {
            len += 1;
        }
        len /= 2;
        levels += 1;
    }
    levels
}

/// One analysis step: periodic correlation with both filters, stride 2.
fn dwt_step(x: &[f64]) -> (Vec<f64>, Vec<f64>) {
    debug_assert!(x.len() % 2 == 0);
    let n = x.len();
    let hi = db4_hi();
    let half = n / 2;
    let mut ca = vec![0.0; half];
    let mut cd = vec![0.0; half];
    for i in 0..half {
        let mut a = 0.0;
        let mut d = 0.0;
        for k in 0..8 {
            let v = x[(2 * i + k) % n];
            a += DB4_LO[k] * v;
            d += hi[k] * v;
        }
        ca[i] = a;
        cd[i] = d;
    }
    (ca, cd)
}

/// One synthesis step: adjoint of [`dwt_step`], exact inverse for even `n`.
fn idwt_step(ca: &[f64], cd: &[f64]) -> Vec<f64> {
    let n = 2 * ca.len();
    let hi = db4_hi();
    let mut out = vec![0.0; n];
    for i in 0..ca.len() {
        for k in 0..8 {
            let m = (2 * i + k) % n;
            out[m] += DB4_LO[k] * ca[i] + hi[k] * cd[i];
        }
    }
    out
}

/// A multi-level decomposition: `coeffs[0]` is the approximation at the
/// deepest level, followed by detail bands from coarsest to finest
/// (`pywt.wavedec` ordering). `lengths` records the signal length entering
/// each analysis step so reconstruction can trim odd-length padding.
#[derive(Debug, Clone)]
pub struct WaveletDecomposition {
    pub coeffs: Vec<Vec<f64>>,
    lengths: Vec<usize>,
}

/// Decompose `x` to `levels` octaves (clamped to [`max_level`]).
pub fn wavedec(x: &[f64], levels: usize) -> WaveletDecomposition {
    let levels = levels.min(max_level(x.len()));
    let mut details: Vec<Vec<f64>> = Vec::with_capacity(levels);
    let mut lengths = Vec::with_capacity(levels);
    let mut cur = x.to_vec();
    for _ in 0..levels {
        lengths.push(cur.len());
        if cur.len() % 2 == 1 {
            let last = *cur.last().expect("non-empty at every level");
            cur.push(last);
        }
        let (ca, cd) = dwt_step(&cur);
        details.push(cd);
        cur = ca;
    }
    let mut coeffs = Vec::with_capacity(levels + 1);
    coeffs.push(cur);
    details.reverse();
    coeffs.extend(details);
    WaveletDecomposition { coeffs, lengths }
}

/// Reconstruct the signal from a (possibly thresholded) decomposition.
pub fn waverec(dec: &WaveletDecomposition) -> Vec<f64> {
    let mut cur = dec.coeffs[0].clone();
    // coeffs[1..] are detail bands coarsest→finest; lengths are finest→coarsest.
    for (j, cd) in dec.coeffs[1..].iter().enumerate() {
        let orig_len = dec.lengths[dec.lengths.len() - 1 - j];
        let mut rec = idwt_step(&cur, cd);
        rec.truncate(orig_len);
        cur = rec;
    }
    cur
}

/// Robust noise estimate from the finest detail band: `MAD / 0.6745`.
pub fn estimate_noise(detail: &[f64]) -> f64 {
    if detail.is_empty() {
        return 0.0;
    }
    let med = median(detail);
    let abs_dev: Vec<f64> = detail.iter().map(|&v| (v - med).abs()).collect();
    median(&abs_dev) / 0.6745
}

fn median(v: &[f64]) -> f64 {
    let mut s = v.to_vec();
    s.sort_by(|a, b| a.partial_cmp(b).expect("finite values"));
    let n = s.len();
    if n % 2 == 1 {
        s[n / 2]
    } else {
        0.5 * (s[n / 2 - 1] + s[n / 2])
    }
}

/// Soft-threshold in place: shrink magnitudes by `t`, zeroing below it.
fn soft_threshold(coeffs: &mut [f64], t: f64) {
    for c in coeffs.iter_mut() {
        let mag = c.abs() - t;
        *c = if mag > 0.0 { c.signum() * mag } else { 0.0 };
    }
}

/// Wavelet denoising with the universal threshold.
///
/// 4-level decomposition; noise is estimated from the finest detail band
/// and the threshold `σ·sqrt(2·ln N)` is applied softly to every detail
/// band, leaving the approximation untouched. The output is truncated or
/// zero-padded back to the input length.
pub fn denoise(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n < 2 * DB4_LO.len() {
        return x.to_vec();
    }
    let levels = 4.min(max_level(n));
    let mut dec = wavedec(x, levels);
    let sigma = estimate_noise(dec.coeffs.last().expect("finest detail band"));
    let t = sigma * (2.0 * (n as f64).ln()).sqrt();
    for detail in dec.coeffs[1..].iter_mut() {
        soft_threshold(detail, t);
    }
    let mut rec = waverec(&dec);
    rec.resize(n, 0.0);
    rec
}

/// Per-level sub-band descriptors used by the nonlinear feature group.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubbandFeatures {
    pub energy: f64,
    pub entropy: f64,
    pub max_abs: f64,
    pub mean_abs: f64,
    pub std: f64,
}

/// Compute [`SubbandFeatures`] for every coefficient band of a
/// `levels`-deep decomposition, approximation first.
pub fn subband_features(x: &[f64], levels: usize) -> Vec<SubbandFeatures> {
    let dec = wavedec(x, levels);
    dec.coeffs
        .iter()
        .map(|band| {
            let energy: f64 = band.iter().map(|c| c * c).sum();
            let entropy = if energy > 0.0 {
                -band
                    .iter()
                    .map(|c| {
                        let p = c * c / energy;
                        p * (p + 1e-10).log2()
                    })
                    .sum::<f64>()
            } else {
                0.0
            };
            let n = band.len().max(1) as f64;
            let max_abs = band.iter().fold(0.0_f64, |m, c| m.max(c.abs()));
            let mean_abs = band.iter().map(|c| c.abs()).sum::<f64>() / n;
            let mean = band.iter().sum::<f64>() / n;
            let var = band.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
            SubbandFeatures { energy, entropy, max_abs, mean_abs, std: var.sqrt() }
        })
        .collect()
}
