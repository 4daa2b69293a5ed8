mod common;

use common::{sine_plus_noise, FS, N_CHANNELS, N_SAMPLES};
use eeg_attention::spectral::{band_powers, connectivity, welch};
use eeg_attention::{Band, ConnectivityMethod};
use ndarray::Array2;

#[test]
fn band_powers_are_normalized_and_nonnegative() {
    for seed in [1, 2, 3] {
        let epoch = sine_plus_noise(N_CHANNELS, N_SAMPLES, 10.0, 10.0, 1.0, seed);
        let p = band_powers(&epoch, FS);
        let mut total = 0.0;
        for b in Band::ALL {
            assert!(p.get(b) >= 0.0);
            total += p.get(b);
        }
        assert!((total - 1.0).abs() < 1e-6, "sum = {total}");
    }
}

#[test]
fn alpha_tone_dominates_band_powers() {
    let epoch = sine_plus_noise(N_CHANNELS, N_SAMPLES, 10.0, 10.0, 0.3, 5);
    let p = band_powers(&epoch, FS);
    assert_eq!(p.dominant(), Band::Alpha);
    for b in [Band::Delta, Band::Theta, Band::Beta, Band::Gamma] {
        assert!(p.alpha > p.get(b), "{:?} = {} vs alpha = {}", b, p.get(b), p.alpha);
    }
}

#[test]
fn theta_tone_lands_in_theta() {
    let epoch = sine_plus_noise(N_CHANNELS, N_SAMPLES, 6.0, 10.0, 0.3, 6);
    assert_eq!(band_powers(&epoch, FS).dominant(), Band::Theta);
}

#[test]
fn zero_epoch_gives_zero_powers_without_nan() {
    let p = band_powers(&Array2::zeros((N_CHANNELS, N_SAMPLES)), FS);
    for b in Band::ALL {
        assert_eq!(p.get(b), 0.0);
    }
}

#[test]
fn welch_resolution_uses_capped_segment_length() {
    // 128 samples at 128 Hz with nperseg 64 gives 2 Hz bins up to Nyquist.
    let x: Vec<f64> = (0..N_SAMPLES)
        .map(|i| (2.0 * std::f64::consts::PI * 10.0 * i as f64 / FS).sin())
        .collect();
    let (freqs, psd) = welch(&x, FS, 64);
    assert_eq!(freqs.len(), 33);
    assert_eq!(psd.len(), 33);
    assert!((freqs[1] - 2.0).abs() < 1e-12);
    assert!((freqs[32] - 64.0).abs() < 1e-12);
}

#[test]
fn connectivity_is_symmetric_and_bounded_for_all_methods() {
    let epoch = sine_plus_noise(N_CHANNELS, N_SAMPLES, 10.0, 10.0, 0.5, 9);
    for method in [ConnectivityMethod::Plv, ConnectivityMethod::Coherence, ConnectivityMethod::Pli] {
        let m = connectivity(&epoch, method, FS);
        assert_eq!(m.values.nrows(), N_CHANNELS);
        assert_eq!(m.values.ncols(), N_CHANNELS);
        for i in 0..N_CHANNELS {
            assert_eq!(m.values[[i, i]], 0.0, "{method:?} diagonal");
            for j in 0..N_CHANNELS {
                let v = m.values[[i, j]];
                assert!((0.0..=1.0).contains(&v), "{method:?} out of range: {v}");
                assert!((v - m.values[[j, i]]).abs() < 1e-12, "{method:?} asymmetric");
            }
        }
    }
}

#[test]
fn phase_locked_channels_have_high_plv() {
    // Noise-free phase-shifted copies of one tone are perfectly locked.
    let epoch = Array2::from_shape_fn((4, 256), |(c, t)| {
        (2.0 * std::f64::consts::PI * 10.0 * t as f64 / FS + c as f64 * 1.1).sin()
    });
    let m = connectivity(&epoch, ConnectivityMethod::Plv, FS);
    for i in 0..4 {
        for j in (i + 1)..4 {
            assert!(m.values[[i, j]] > 0.99, "plv[{i},{j}] = {}", m.values[[i, j]]);
        }
    }
}

#[test]
fn zero_epoch_yields_zero_connectivity_for_all_methods() {
    let zeros = Array2::zeros((N_CHANNELS, N_SAMPLES));
    for method in [ConnectivityMethod::Plv, ConnectivityMethod::Coherence, ConnectivityMethod::Pli] {
        let m = connectivity(&zeros, method, FS);
        assert!(m.values.iter().all(|&v| v == 0.0), "{method:?} not all zero");
    }
}
