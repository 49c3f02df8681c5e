use log::debug;
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::utils::sigmoid;
use crate::error::ClassifierError;
use crate::features::SparseVector;

/// Classifier families the trainer can fit.
///
/// Both produce a one-vs-rest [`LinearModel`], so scoring code does not care
/// which one was used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// L2-regularized hinge loss, Pegasos sub-gradient descent
    #[default]
    LinearSvm,
    /// L2-regularized log loss, full-batch gradient descent
    LogisticRegression,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::LinearSvm, Algorithm::LogisticRegression];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinearSvm => "linear-svm",
            Self::LogisticRegression => "logistic-regression",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown algorithm '{}' (expected one of: {})",
                    s,
                    Self::ALL.map(|a| a.as_str()).join(", ")
                )
            })
    }
}

/// Optimizer settings shared by both algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParams {
    pub epochs: usize,
    pub regularization: f32,
    pub learning_rate: f32,
    pub seed: u64,
}

/// One-vs-rest linear scoring: row `c` of `weights` plus `biases[c]` scores
/// class `c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
}

impl LinearModel {
    pub fn num_classes(&self) -> usize {
        self.weights.nrows()
    }

    pub fn dimension(&self) -> usize {
        self.weights.ncols()
    }

    /// Raw margin for every class.
    pub fn decision_function(&self, x: &SparseVector) -> Vec<f32> {
        self.weights
            .rows()
            .into_iter()
            .zip(self.biases.iter())
            .map(|(row, &b)| x.dot(row) + b)
            .collect()
    }

    /// Fits a model for `num_classes` classes, where `targets[i]` is the
    /// class index of `features[i]`.
    pub fn fit(
        algorithm: Algorithm,
        features: &[SparseVector],
        targets: &[usize],
        num_classes: usize,
        dimension: usize,
        params: &FitParams,
    ) -> Result<Self, ClassifierError> {
        if features.len() != targets.len() {
            return Err(ClassifierError::ValidationError(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        if features.is_empty() {
            return Err(ClassifierError::ValidationError("Cannot fit on zero rows".into()));
        }
        if num_classes < 2 {
            return Err(ClassifierError::ValidationError(format!(
                "At least 2 classes are required, found {}",
                num_classes
            )));
        }
        if let Some(&bad) = targets.iter().find(|&&t| t >= num_classes) {
            return Err(ClassifierError::ValidationError(format!(
                "Target class {} out of range",
                bad
            )));
        }

        debug!(
            "Fitting {} on {} rows, {} classes, {} features",
            algorithm,
            features.len(),
            num_classes,
            dimension
        );

        let rows: Vec<(Vec<f32>, f32)> = match algorithm {
            Algorithm::LinearSvm => fit_pegasos(features, targets, num_classes, dimension, params),
            Algorithm::LogisticRegression => {
                fit_logistic(features, targets, num_classes, dimension, params)
            }
        };

        let mut weights = Array2::zeros((num_classes, dimension));
        let mut biases = Array1::zeros(num_classes);
        for (c, (row, bias)) in rows.into_iter().enumerate() {
            weights.row_mut(c).assign(&Array1::from(row));
            biases[c] = bias;
        }
        Ok(Self { weights, biases })
    }
}

/// Weight vector stored as `scale * values` so the per-step shrink is O(1).
/// The last entry of `values` is the bias, trained as a feature fixed at 1.
struct ScaledRow {
    scale: f64,
    values: Vec<f64>,
    sq_norm: f64,
}

impl ScaledRow {
    fn new(dimension: usize) -> Self {
        Self {
            scale: 1.0,
            values: vec![0.0; dimension + 1],
            sq_norm: 0.0,
        }
    }

    fn bias_index(&self) -> usize {
        self.values.len() - 1
    }

    fn margin(&self, x: &SparseVector) -> f64 {
        let dot: f64 = x
            .iter()
            .map(|(idx, v)| self.values[idx] * f64::from(v))
            .sum();
        self.scale * (dot + self.values[self.bias_index()])
    }

    fn shrink(&mut self, factor: f64) {
        if factor <= 0.0 {
            self.values.iter_mut().for_each(|v| *v = 0.0);
            self.scale = 1.0;
            self.sq_norm = 0.0;
            return;
        }
        self.scale *= factor;
        if self.scale < 1e-9 {
            self.fold_scale();
        }
    }

    fn fold_scale(&mut self) {
        let scale = self.scale;
        self.values.iter_mut().for_each(|v| *v *= scale);
        self.sq_norm = self.values.iter().map(|v| v * v).sum();
        self.scale = 1.0;
    }

    fn add_scaled(&mut self, x: &SparseVector, coef: f64) {
        let step = coef / self.scale;
        let bias = self.bias_index();
        for (idx, v) in x.iter().map(|(i, v)| (i, f64::from(v))).chain(std::iter::once((bias, 1.0))) {
            let old = self.values[idx];
            let new = old + step * v;
            self.values[idx] = new;
            self.sq_norm += new * new - old * old;
        }
    }

    fn norm(&self) -> f64 {
        self.scale * self.sq_norm.max(0.0).sqrt()
    }

    fn into_row(mut self) -> (Vec<f32>, f32) {
        self.fold_scale();
        let bias = self.values.pop().unwrap_or(0.0) as f32;
        (self.values.into_iter().map(|v| v as f32).collect(), bias)
    }
}

fn fit_pegasos(
    features: &[SparseVector],
    targets: &[usize],
    num_classes: usize,
    dimension: usize,
    params: &FitParams,
) -> Vec<(Vec<f32>, f32)> {
    let lambda = f64::from(params.regularization);
    let radius = 1.0 / lambda.sqrt();
    let mut rows: Vec<ScaledRow> = (0..num_classes).map(|_| ScaledRow::new(dimension)).collect();
    let mut order: Vec<usize> = (0..features.len()).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut step = 0usize;

    for _ in 0..params.epochs {
        order.shuffle(&mut rng);
        for &i in &order {
            step += 1;
            let eta = 1.0 / (lambda * step as f64);
            let x = &features[i];
            for (c, row) in rows.iter_mut().enumerate() {
                let y = if targets[i] == c { 1.0 } else { -1.0 };
                let margin = y * row.margin(x);
                row.shrink(1.0 - eta * lambda);
                if margin < 1.0 {
                    row.add_scaled(x, eta * y);
                }
                let norm = row.norm();
                if norm > radius {
                    row.shrink(radius / norm);
                }
            }
        }
    }

    rows.into_iter().map(ScaledRow::into_row).collect()
}

fn fit_logistic(
    features: &[SparseVector],
    targets: &[usize],
    num_classes: usize,
    dimension: usize,
    params: &FitParams,
) -> Vec<(Vec<f32>, f32)> {
    let lambda = f64::from(params.regularization);
    let lr = f64::from(params.learning_rate);
    let n = features.len() as f64;

    (0..num_classes)
        .map(|c| {
            let mut w = vec![0.0f64; dimension];
            let mut b = 0.0f64;
            let mut grad = vec![0.0f64; dimension];
            for _ in 0..params.epochs {
                grad.iter_mut().zip(&w).for_each(|(g, wi)| *g = lambda * wi);
                let mut grad_b = 0.0;
                for (x, &t) in features.iter().zip(targets) {
                    let y = if t == c { 1.0 } else { 0.0 };
                    let z: f64 = x.iter().map(|(idx, v)| w[idx] * f64::from(v)).sum::<f64>() + b;
                    let err = (sigmoid(z) - y) / n;
                    for (idx, v) in x.iter() {
                        grad[idx] += err * f64::from(v);
                    }
                    grad_b += err;
                }
                w.iter_mut().zip(&grad).for_each(|(wi, g)| *wi -= lr * g);
                b -= lr * grad_b;
            }
            (w.into_iter().map(|v| v as f32).collect(), b as f32)
        })
        .collect()
}
