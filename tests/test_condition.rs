mod common;

use common::{sine_plus_noise, FS, N_CHANNELS, N_SAMPLES};
use eeg_attention::{QualityReport, SignalConditioner, SignalConfig};
use ndarray::Array2;

fn conditioner() -> SignalConditioner {
    SignalConditioner::new(SignalConfig::default()).unwrap()
}

#[test]
fn conditioning_is_idempotent_on_clean_epochs() {
    // A 5 Hz tone sits deep inside the 0.5-45 Hz passband, so the second
    // pass through the zero-phase filters must be a numerical no-op.
    let sc = conditioner();
    let epoch = Array2::from_shape_fn((N_CHANNELS, N_SAMPLES), |(c, t)| {
        (2.0 * std::f64::consts::PI * 5.0 * t as f64 / FS + c as f64 * 0.9).sin()
    });

    let (once, q1) = sc.condition(&epoch).unwrap();
    assert!(q1.amplitude_ok, "clean input must not trigger denoising");
    let (twice, _q2) = sc.condition(&once).unwrap();

    let max_err = once
        .iter()
        .zip(twice.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f64, f64::max);
    assert!(max_err < 1e-6, "max elementwise drift {max_err}");
}

#[test]
fn quality_report_fields_are_consistent() {
    let sc = conditioner();
    let epoch = sine_plus_noise(N_CHANNELS, N_SAMPLES, 10.0, 15.0, 1.0, 7);
    let (_, q) = sc.condition(&epoch).unwrap();

    assert!((0.0..=1.0).contains(&q.artifact_ratio));
    assert!((0.0..=1.0).contains(&q.overall_score));
    let bool_mean = [q.amplitude_ok, q.variance_ok, q.baseline_ok, q.line_noise_ok]
        .iter()
        .filter(|&&b| b)
        .count() as f64
        / 4.0;
    let expected = bool_mean * (1.0 - q.artifact_ratio);
    assert!((q.overall_score - expected).abs() < 1e-12);
}

#[test]
fn all_zero_epoch_reports_zero_score() {
    let sc = conditioner();
    let (clean, q) = sc.condition(&Array2::zeros((N_CHANNELS, N_SAMPLES))).unwrap();
    assert_eq!(q, QualityReport::degraded());
    assert_eq!(q.overall_score, 0.0);
    assert!(clean.iter().all(|&v| v == 0.0));
}

#[test]
fn amplitude_violations_trigger_denoising_not_failure() {
    let sc = conditioner();
    let mut epoch = sine_plus_noise(N_CHANNELS, N_SAMPLES, 10.0, 30.0, 1.0, 11);
    // Inject spikes far above the 100 uV artifact threshold across enough
    // channels that re-referencing cannot fully absorb them.
    for c in 0..N_CHANNELS {
        epoch[[c, 64]] = if c % 2 == 0 { 4000.0 } else { -4000.0 };
    }
    let (clean, q) = sc.condition(&epoch).unwrap();
    assert!(clean.iter().all(|v| v.is_finite()));
    assert!(q.overall_score < 1.0);
}

#[test]
fn dc_offset_is_removed() {
    let sc = conditioner();
    let epoch = sine_plus_noise(N_CHANNELS, N_SAMPLES, 10.0, 15.0, 1.0, 3).mapv(|v| v + 50.0);
    let (clean, q) = sc.condition(&epoch).unwrap();
    for row in clean.rows() {
        let mean = row.sum() / row.len() as f64;
        assert!(mean.abs() < 1.0, "residual baseline {mean}");
    }
    assert!(q.baseline_ok);
}

#[test]
fn notch_suppresses_mains_interference() {
    let sc = conditioner();
    // 10 Hz signal of interest plus strong 60 Hz mains on every channel.
    let epoch = Array2::from_shape_fn((N_CHANNELS, N_SAMPLES), |(c, t)| {
        let time = t as f64 / FS;
        let phase = c as f64 * 0.9;
        10.0 * (2.0 * std::f64::consts::PI * 10.0 * time + phase).sin()
            + 20.0 * (2.0 * std::f64::consts::PI * 60.0 * time + phase).sin()
    });
    let (clean, q) = sc.condition(&epoch).unwrap();
    assert!(q.line_noise_ok, "mains residue after notch");

    // Mains bin magnitude must be tiny relative to the 10 Hz bin.
    let row: Vec<f64> = clean.row(0).to_vec();
    let power_at = |freq: f64| -> f64 {
        let n = row.len() as f64;
        let (mut re, mut im) = (0.0, 0.0);
        for (t, &v) in row.iter().enumerate() {
            let ang = 2.0 * std::f64::consts::PI * freq * t as f64 / FS;
            re += v * ang.cos();
            im -= v * ang.sin();
        }
        (re * re + im * im) / (n * n)
    };
    assert!(power_at(60.0) < 0.01 * power_at(10.0));
}
