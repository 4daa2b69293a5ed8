//! Epoch input and per-epoch result types.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::classify::AttentionMetrics;
use crate::condition::QualityReport;
use crate::spectral::{BandPowers, ConnectivityMatrix};

/// One fixed-duration multi-channel window, channels × samples, tagged with
/// its capture time in seconds. Immutable once captured; the caller is
/// responsible for shaping heterogeneous buffers to the configured window
/// size before handing an epoch to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epoch {
    pub data: Array2<f64>,
    pub timestamp: f64,
}

impl Epoch {
    pub fn new(data: Array2<f64>, timestamp: f64) -> Self {
        Epoch { data, timestamp }
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }
}

/// Everything the pipeline emits for one epoch. All floating fields are
/// finite; degenerate input produces zeros, never NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochResult {
    pub timestamp: f64,
    pub metrics: AttentionMetrics,
    pub band_powers: BandPowers,
    pub connectivity: ConnectivityMatrix,
    pub quality: QualityReport,
}
