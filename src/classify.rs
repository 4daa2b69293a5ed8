//! Attention classification on top of the conditioning and feature layers.
//!
//! The trainable model is a per-feature standard scaler feeding a gradient-
//! boosted ensemble of shallow regression trees (logistic loss, Newton leaf
//! values). Training replaces the whole model atomically: readers clone an
//! `Arc` snapshot under a read lock, so prediction never observes a half-
//! built model while `train` runs.
//!
//! Band-power derived attention metrics are stateless and available without
//! a trained model.

use std::sync::Arc;

use ndarray::Array2;
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::condition::SignalConditioner;
use crate::config::{ModelParams, SignalConfig};
use crate::error::{Error, Result};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::spectral::BandPowers;

const EPS: f64 = 1e-10;
/// Alpha-ratio threshold separating closed from open eyes.
const EYE_CLOSED_ALPHA_RATIO: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeState {
    Open,
    Closed,
}

/// Per-epoch attention estimates derived from normalized band powers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttentionMetrics {
    pub attention_score: f64,
    pub engagement_index: f64,
    pub theta_beta_ratio: f64,
    pub eye_state: EyeState,
}

/// Computes the band-power attention metrics. Stateless; valid whether or
/// not a model has been trained.
pub fn attention_metrics(powers: &BandPowers) -> AttentionMetrics {
    let theta_beta_ratio = powers.theta / (powers.beta + EPS);
    let engagement_index =
        (powers.beta / (powers.alpha + powers.theta + EPS)).clamp(0.0, 1.0);
    let attention_score =
        0.6 * (1.0 - theta_beta_ratio / 2.0).clamp(0.0, 1.0) + 0.4 * engagement_index;
    let alpha_ratio = powers.alpha / (powers.theta + powers.beta + EPS);
    let eye_state = if alpha_ratio > EYE_CLOSED_ALPHA_RATIO {
        EyeState::Closed
    } else {
        EyeState::Open
    };
    AttentionMetrics { attention_score, engagement_index, theta_beta_ratio, eye_state }
}

// ── Scaler ───────────────────────────────────────────────────────────────────

/// Per-feature zero-mean unit-variance scaler. Features with zero variance
/// are passed through centered but unscaled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(matrix: &Array2<f64>) -> Self {
        let n = matrix.nrows() as f64;
        let n_features = matrix.ncols();
        let mut mean = vec![0.0; n_features];
        let mut scale = vec![0.0; n_features];
        for j in 0..n_features {
            let col = matrix.column(j);
            let m = col.sum() / n;
            let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            mean[j] = m;
            let s = var.sqrt();
            scale[j] = if s > 0.0 { s } else { 1.0 };
        }
        StandardScaler { mean, scale }
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, matrix: &Array2<f64>) -> Array2<f64> {
        let mut out = matrix.clone();
        for mut row in out.rows_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[j]) / self.scale[j];
            }
        }
        out
    }
}

// ── Gradient-boosted trees ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn evaluate(&self, x: &[f64]) -> f64 {
        match self {
            Node::Leaf { value } => *value,
            Node::Split { feature, threshold, left, right } => {
                if x[*feature] <= *threshold {
                    left.evaluate(x)
                } else {
                    right.evaluate(x)
                }
            }
        }
    }
}

fn sum_sq_error(indices: &[usize], res: &[f64]) -> f64 {
    let n = indices.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = indices.iter().map(|&i| res[i]).sum::<f64>() / n;
    indices.iter().map(|&i| (res[i] - mean).powi(2)).sum()
}

/// Newton step for logistic loss: sum of residuals over sum of hessians.
fn leaf_value(indices: &[usize], res: &[f64], hess: &[f64]) -> f64 {
    let num: f64 = indices.iter().map(|&i| res[i]).sum();
    let den: f64 = indices.iter().map(|&i| hess[i]).sum();
    num / (den + EPS)
}

/// Recursively grows a regression tree on the residuals, recording each
/// split's impurity decrease into `importance`.
fn grow_tree(
    x: &Array2<f64>,
    res: &[f64],
    hess: &[f64],
    indices: &[usize],
    depth: usize,
    max_depth: usize,
    importance: &mut [f64],
) -> Node {
    if depth >= max_depth || indices.len() < 2 {
        return Node::Leaf { value: leaf_value(indices, res, hess) };
    }

    let parent_sse = sum_sq_error(indices, res);
    let n_features = x.ncols();
    let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, gain)

    for feature in 0..n_features {
        let mut order: Vec<usize> = indices.to_vec();
        order.sort_by(|&a, &b| {
            x[[a, feature]]
                .partial_cmp(&x[[b, feature]])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Prefix scan of residual sums turns each candidate split into O(1).
        let total: f64 = order.iter().map(|&i| res[i]).sum();
        let total_sq: f64 = order.iter().map(|&i| res[i] * res[i]).sum();
        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..order.len() - 1 {
            let i = order[k];
            left_sum += res[i];
            left_sq += res[i] * res[i];
            let a = x[[i, feature]];
            let b = x[[order[k + 1], feature]];
            if a == b {
                continue;
            }
            let nl = (k + 1) as f64;
            let nr = (order.len() - k - 1) as f64;
            let sse_left = left_sq - left_sum * left_sum / nl;
            let right_sum = total - left_sum;
            let sse_right = (total_sq - left_sq) - right_sum * right_sum / nr;
            let gain = parent_sse - sse_left - sse_right;
            if best.map_or(gain > 1e-12, |(_, _, g)| gain > g) {
                best = Some((feature, 0.5 * (a + b), gain));
            }
        }
    }

    match best {
        None => Node::Leaf { value: leaf_value(indices, res, hess) },
        Some((feature, threshold, gain)) => {
            importance[feature] += gain;
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);
            let left = grow_tree(x, res, hess, &left_idx, depth + 1, max_depth, importance);
            let right = grow_tree(x, res, hess, &right_idx, depth + 1, max_depth, importance);
            Node::Split { feature, threshold, left: Box::new(left), right: Box::new(right) }
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Gradient-boosted binary classifier: shallow regression trees fit to the
/// logistic-loss residuals, starting from the prior log-odds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostedEnsemble {
    f0: f64,
    learning_rate: f64,
    trees: Vec<Node>,
    /// Normalized split-gain importance per feature, summing to 1.
    pub importance: Vec<f64>,
}

impl BoostedEnsemble {
    /// Fits against binary labels. `matrix` rows are scaled feature rows.
    pub fn fit(matrix: &Array2<f64>, labels: &[u8], params: &ModelParams) -> Self {
        let n = matrix.nrows();
        let y: Vec<f64> = labels.iter().map(|&l| l as f64).collect();
        let prior = y.iter().sum::<f64>() / n as f64;
        let f0 = ((prior + EPS) / (1.0 - prior + EPS)).ln();

        let mut scores = vec![f0; n];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importance = vec![0.0; matrix.ncols()];
        let indices: Vec<usize> = (0..n).collect();

        for _ in 0..params.n_estimators {
            let probs: Vec<f64> = scores.iter().map(|&s| sigmoid(s)).collect();
            let res: Vec<f64> = y.iter().zip(probs.iter()).map(|(yi, pi)| yi - pi).collect();
            let hess: Vec<f64> = probs.iter().map(|p| p * (1.0 - p)).collect();

            let tree =
                grow_tree(matrix, &res, &hess, &indices, 0, params.max_depth, &mut importance);
            for (i, score) in scores.iter_mut().enumerate() {
                *score += params.learning_rate * tree.evaluate(&matrix.row(i).to_vec());
            }
            trees.push(tree);
        }

        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            for v in importance.iter_mut() {
                *v /= total;
            }
        }
        BoostedEnsemble { f0, learning_rate: params.learning_rate, trees, importance }
    }

    /// Class-1 probability for one scaled feature row.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let score = self.f0
            + self.learning_rate * self.trees.iter().map(|t| t.evaluate(row)).sum::<f64>();
        sigmoid(score)
    }
}

// ── Classifier ───────────────────────────────────────────────────────────────

/// Immutable trained-model state, swapped in whole on retrain.
#[derive(Debug)]
pub struct ModelSnapshot {
    pub scaler: StandardScaler,
    pub ensemble: BoostedEnsemble,
    pub n_epochs: usize,
    pub n_features: usize,
}

/// Outcome of one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub accuracy: f64,
    pub n_epochs: usize,
    pub n_features: usize,
    /// Per-feature importance, aligned with the extractor's name order.
    pub feature_importance: Vec<(String, f64)>,
}

/// One prediction from a trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// 0 = low attention, 1 = high attention.
    pub label: u8,
    /// Class-1 probability.
    pub probability: f64,
    /// Probability of the predicted class.
    pub confidence: f64,
}

/// Stateful attention classifier: untrained until the first successful
/// `train` call, after which `predict` is available and `train` may be
/// called again to replace the model.
pub struct AttentionClassifier {
    conditioner: SignalConditioner,
    extractor: FeatureExtractor,
    params: ModelParams,
    model: RwLock<Option<Arc<ModelSnapshot>>>,
}

impl AttentionClassifier {
    pub fn new(config: SignalConfig, params: ModelParams) -> Result<Self> {
        let extractor = FeatureExtractor::new(&config);
        let conditioner = SignalConditioner::new(config)?;
        Ok(AttentionClassifier { conditioner, extractor, params, model: RwLock::new(None) })
    }

    pub fn is_trained(&self) -> bool {
        self.model.read().is_some()
    }

    /// Shape summary of the current model, if any.
    pub fn model_info(&self) -> Option<(usize, usize)> {
        self.model.read().as_ref().map(|m| (m.n_epochs, m.n_features))
    }

    fn features_of(&self, epoch: &Array2<f64>) -> Result<FeatureVector> {
        let (clean, _quality) = self.conditioner.condition(epoch)?;
        self.extractor.extract(&clean)
    }

    /// Trains the scaler and ensemble on labeled raw epochs, replacing any
    /// existing model atomically on success.
    pub fn train(&self, epochs: &[Array2<f64>], labels: &[u8]) -> Result<TrainingReport> {
        if epochs.len() != labels.len() {
            return Err(Error::Training(format!(
                "{} epochs but {} labels",
                epochs.len(),
                labels.len()
            )));
        }
        if epochs.is_empty() {
            return Err(Error::Training("empty training batch".into()));
        }
        let has_zero = labels.iter().any(|&l| l == 0);
        let has_one = labels.iter().any(|&l| l != 0);
        if !(has_zero && has_one) {
            return Err(Error::Training("training batch contains a single class".into()));
        }

        let vectors: Vec<FeatureVector> = epochs
            .par_iter()
            .map(|epoch| self.features_of(epoch))
            .collect::<Result<Vec<_>>>()?;

        let n_features = self.extractor.schema().len();
        let mut matrix = Array2::<f64>::zeros((vectors.len(), n_features));
        for (i, fv) in vectors.iter().enumerate() {
            for (j, &v) in fv.values.iter().enumerate() {
                matrix[[i, j]] = v;
            }
        }

        let scaler = StandardScaler::fit(&matrix);
        let scaled = scaler.transform(&matrix);
        let ensemble = BoostedEnsemble::fit(&scaled, labels, &self.params);

        let correct = (0..scaled.nrows())
            .filter(|&i| {
                let p = ensemble.predict_proba(&scaled.row(i).to_vec());
                (p > 0.5) == (labels[i] != 0)
            })
            .count();
        let accuracy = correct as f64 / scaled.nrows() as f64;

        let feature_importance: Vec<(String, f64)> = self
            .extractor
            .schema()
            .names()
            .into_iter()
            .zip(ensemble.importance.iter().copied())
            .collect();

        let snapshot = ModelSnapshot {
            scaler,
            ensemble,
            n_epochs: epochs.len(),
            n_features,
        };
        *self.model.write() = Some(Arc::new(snapshot));
        info!(n_epochs = epochs.len(), n_features, accuracy, "model trained");

        Ok(TrainingReport { accuracy, n_epochs: epochs.len(), n_features, feature_importance })
    }

    /// Predicts the attention class of one raw epoch.
    ///
    /// Fails with [`Error::NotTrained`] when no model has been fitted yet.
    pub fn predict(&self, epoch: &Array2<f64>) -> Result<Prediction> {
        let snapshot = self.model.read().as_ref().cloned().ok_or(Error::NotTrained)?;
        let fv = self.features_of(epoch)?;
        let scaled = snapshot.scaler.transform_row(&fv.values);
        let probability = snapshot.ensemble.predict_proba(&scaled);
        let label = u8::from(probability > 0.5);
        let confidence = if label == 1 { probability } else { 1.0 - probability };
        Ok(Prediction { label, probability, confidence })
    }
}
