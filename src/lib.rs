//! # eeg-attention — real-time EEG attention scoring in pure Rust
//!
//! Turns raw multi-channel EEG epochs into attention/engagement estimates.
//! All DSP is pure Rust + [RustFFT](https://crates.io/crates/rustfft): no
//! Python, no BLAS, no C libraries.
//!
//! ## Pipeline overview
//!
//! ```text
//! raw epoch  [C, T] f64
//!   │
//!   ├─ condition          DC removal → notch (60 Hz, Q 30) → 0.5–45 Hz
//!   │                     zero-phase band-pass → artifact interpolation
//!   │                     → common-average reference → quality report
//!   │                     → wavelet denoise (only on amplitude failure)
//!   ├─ spectral           Welch PSD → five-band powers (log1p, normalized)
//!   │                     + PLV / coherence / PLI connectivity
//!   ├─ features           temporal ∥ spectral ∥ connectivity ∥ nonlinear
//!   │                     fork/join → fixed, ordered feature vector
//!   └─ classify           scaler + gradient-boosted trees (after train)
//!        │
//!        └─→ EpochResult { metrics, band_powers, connectivity, quality }
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use eeg_attention::{AttentionPipeline, Epoch, SignalConfig};
//! use ndarray::Array2;
//!
//! let config = SignalConfig::default();            // 14 ch @ 128 Hz
//! let pipeline = AttentionPipeline::new(config).unwrap();
//!
//! let data = Array2::<f64>::zeros((14, 128));      // one second
//! let result = pipeline.process_epoch(&Epoch::new(data, 0.0)).unwrap();
//! println!("attention = {:.2}", result.metrics.attention_score);
//! ```
//!
//! Training and prediction live on [`AttentionClassifier`]; the per-epoch
//! metrics above need no trained model.

pub mod classify;
pub mod condition;
pub mod config;
pub mod epoch;
pub mod error;
pub mod features;
pub mod filter;
pub mod spectral;
pub mod wavelet;

pub use classify::{
    attention_metrics, AttentionClassifier, AttentionMetrics, EyeState, Prediction,
    TrainingReport,
};
pub use condition::{QualityReport, SignalConditioner};
pub use config::{ModelParams, SignalConfig};
pub use epoch::{Epoch, EpochResult};
pub use error::{Error, Result};
pub use features::{FeatureExtractor, FeatureSchema, FeatureVector};
pub use filter::FilterBank;
pub use spectral::{Band, BandPowers, ConnectivityMatrix, ConnectivityMethod};

use crate::spectral::{band_powers, connectivity};

/// The untrained per-epoch pipeline: conditioning, spectral analysis,
/// feature extraction, and band-power attention metrics.
///
/// Stateless across epochs apart from the immutable filter coefficients,
/// so one instance can serve concurrent callers.
pub struct AttentionPipeline {
    conditioner: SignalConditioner,
    extractor: FeatureExtractor,
}

impl AttentionPipeline {
    pub fn new(config: SignalConfig) -> Result<Self> {
        let extractor = FeatureExtractor::new(&config);
        let conditioner = SignalConditioner::new(config)?;
        Ok(AttentionPipeline { conditioner, extractor })
    }

    pub fn config(&self) -> &SignalConfig {
        self.conditioner.config()
    }

    pub fn conditioner(&self) -> &SignalConditioner {
        &self.conditioner
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Full per-epoch processing, with the spectral summary and the feature
    /// vector computed concurrently on the cleaned epoch.
    pub fn process_epoch(&self, epoch: &Epoch) -> Result<EpochResult> {
        let sfreq = self.conditioner.config().sfreq;
        let (clean, quality) = self.conditioner.condition(&epoch.data)?;

        let ((powers, conn), features) = rayon::join(
            || {
                rayon::join(
                    || band_powers(&clean, sfreq),
                    || connectivity(&clean, ConnectivityMethod::Plv, sfreq),
                )
            },
            || self.extractor.extract(&clean),
        );
        // Extraction failures are fatal to the whole epoch result.
        features?;

        Ok(EpochResult {
            timestamp: epoch.timestamp,
            metrics: attention_metrics(&powers),
            band_powers: powers,
            connectivity: conn,
            quality,
        })
    }

    /// Conditioning plus feature extraction only, for callers that manage
    /// their own model.
    pub fn extract_features(&self, epoch: &Epoch) -> Result<FeatureVector> {
        let (clean, _quality) = self.conditioner.condition(&epoch.data)?;
        self.extractor.extract(&clean)
    }
}
