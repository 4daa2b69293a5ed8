/// Shared synthetic-epoch generators for the integration tests.
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const FS: f64 = 128.0;
pub const N_CHANNELS: usize = 14;
pub const N_SAMPLES: usize = 128;

/// Deterministic RNG so test epochs are reproducible across runs.
#[allow(unused)]
pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Multi-channel sine with per-channel phase offsets (so the common-average
/// reference does not cancel it) plus approximately Gaussian noise.
#[allow(unused)]
pub fn sine_plus_noise(
    n_ch: usize,
    n: usize,
    freq: f64,
    amp: f64,
    noise_sigma: f64,
    seed: u64,
) -> Array2<f64> {
    let mut rng = rng(seed);
    Array2::from_shape_fn((n_ch, n), |(c, t)| {
        let phase = c as f64 * 0.9;
        let s = amp * (2.0 * std::f64::consts::PI * freq * t as f64 / FS + phase).sin();
        // Sum of uniforms is close enough to Gaussian for these tests.
        let g: f64 = (0..12).map(|_| rng.gen::<f64>()).sum::<f64>() - 6.0;
        s + noise_sigma * g
    })
}

/// Epoch dominated by one band: a carrier in the band plus a weak carrier
/// in a second band, used for the synthetic training classes.
#[allow(unused)]
pub fn two_tone_epoch(
    strong_freq: f64,
    weak_freq: f64,
    seed: u64,
) -> Array2<f64> {
    let mut rng = rng(seed);
    Array2::from_shape_fn((N_CHANNELS, N_SAMPLES), |(c, t)| {
        let phase = c as f64 * 0.9;
        let time = t as f64 / FS;
        let strong = 10.0 * (2.0 * std::f64::consts::PI * strong_freq * time + phase).sin();
        let weak = 2.0 * (2.0 * std::f64::consts::PI * weak_freq * time + 1.3 * phase).sin();
        let g: f64 = (0..12).map(|_| rng.gen::<f64>()).sum::<f64>() - 6.0;
        strong + weak + 0.5 * g
    })
}
