//! Evaluator: scores an artifact against a labeled dataset.

use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::classifier::{Algorithm, Classifier};
use crate::dataset::{read_dataset, Record};
use crate::error::ClassifierError;
use crate::fsutil::write_atomic;

/// Probabilities are clipped to `[LOG_LOSS_EPSILON, 1]` before taking logs.
pub const LOG_LOSS_EPSILON: f64 = 1e-15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of records whose true label is this class
    pub support: usize,
}

/// Rows are true labels, columns are predicted labels, both in `labels` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn get(&self, truth: &str, predicted: &str) -> Option<usize> {
        let row = self.labels.iter().position(|l| l == truth)?;
        let col = self.labels.iter().position(|l| l == predicted)?;
        Some(self.matrix[row][col])
    }
}

/// Metrics computed from predictions, before any file identity is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub log_loss: f64,
    pub per_class: BTreeMap<String, ClassMetrics>,
    pub confusion_matrix: ConfusionMatrix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetIdentity {
    pub path: PathBuf,
    pub sha256: String,
    /// Records that were scored
    pub records: usize,
    /// Rows that could not be parsed and were skipped
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    pub path: PathBuf,
    pub algorithm: Algorithm,
    pub labels: Vec<String>,
    pub trained_at: String,
}

/// The persisted result of an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    #[serde(flatten)]
    pub metrics: Metrics,
    pub dataset: DatasetIdentity,
    pub artifact: ArtifactIdentity,
    pub evaluated_at: String,
}

/// Scores `classifier` on `records`.
///
/// The label set of the report is every true label plus every predicted
/// label, sorted. A true label the classifier does not know can never be
/// predicted, so its records all count as misses. Precision of a label that
/// is never predicted, and recall of a label with no support, are 0.
///
/// Texts are scored as they are; they are expected to be cleaned the same way
/// as the training data.
pub fn compute_metrics(classifier: &Classifier, records: &[Record]) -> Result<Metrics, ClassifierError> {
    if records.is_empty() {
        return Err(ClassifierError::InputError("Cannot evaluate on zero records".into()));
    }

    let predictions: Vec<_> = records.iter().map(|r| classifier.score_text(&r.text)).collect();

    let labels: Vec<String> = records
        .iter()
        .map(|r| r.label.clone())
        .chain(predictions.iter().map(|p| p.label.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index: HashMap<&str, usize> = labels.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();

    let k = labels.len();
    let mut matrix = vec![vec![0usize; k]; k];
    let mut correct = 0usize;
    let mut total_log_loss = 0.0f64;

    for (record, prediction) in records.iter().zip(&predictions) {
        let row = index[record.label.as_str()];
        let col = index[prediction.label.as_str()];
        matrix[row][col] += 1;
        if row == col {
            correct += 1;
        }
        let p_true = prediction
            .scores
            .get(&record.label)
            .map(|&p| f64::from(p))
            .unwrap_or(0.0)
            .clamp(LOG_LOSS_EPSILON, 1.0);
        total_log_loss -= p_true.ln();
    }

    let mut per_class = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        let tp = matrix[i][i];
        let support: usize = matrix[i].iter().sum();
        let predicted: usize = matrix.iter().map(|row| row[i]).sum();
        let precision = ratio(tp, predicted);
        let recall = ratio(tp, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        per_class.insert(
            label.clone(),
            ClassMetrics {
                precision,
                recall,
                f1,
                support,
            },
        );
    }

    let n = records.len() as f64;
    let mean = |f: fn(&ClassMetrics) -> f64| per_class.values().map(f).sum::<f64>() / k as f64;

    Ok(Metrics {
        accuracy: correct as f64 / n,
        macro_precision: mean(|m| m.precision),
        macro_recall: mean(|m| m.recall),
        macro_f1: mean(|m| m.f1),
        log_loss: total_log_loss / n,
        per_class,
        confusion_matrix: ConfusionMatrix { labels, matrix },
    })
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Loads the artifact at `model`, scores it on the dataset at `data` and
/// writes a JSON report to `output`.
///
/// Unparseable dataset rows are skipped and counted in the report. The
/// artifact file is only read.
pub fn evaluate(model: &Path, data: &Path, output: &Path) -> Result<MetricsReport, ClassifierError> {
    let classifier = Classifier::load(model)?;
    let dataset = read_dataset(data)?;
    if !dataset.dropped.is_empty() {
        warn!(
            "Skipping {} unparseable rows in {}",
            dataset.dropped.len(),
            data.display()
        );
    }
    if dataset.is_empty() {
        return Err(ClassifierError::InputError(format!(
            "No valid records in {}",
            data.display()
        )));
    }

    let known: BTreeSet<&str> = classifier.labels().iter().map(String::as_str).collect();
    let unknown: BTreeSet<&str> = dataset
        .records
        .iter()
        .map(|r| r.label.as_str())
        .filter(|l| !known.contains(l))
        .collect();
    if !unknown.is_empty() {
        warn!(
            "Labels {:?} are not known to the model; their records count as misses",
            unknown
        );
    }

    let metrics = compute_metrics(&classifier, &dataset.records)?;
    let report = MetricsReport {
        metrics,
        dataset: DatasetIdentity {
            path: data.to_path_buf(),
            sha256: dataset.sha256.clone(),
            records: dataset.records.len(),
            dropped: dataset.dropped.len(),
        },
        artifact: ArtifactIdentity {
            path: model.to_path_buf(),
            algorithm: classifier.algorithm(),
            labels: classifier.labels().to_vec(),
            trained_at: classifier.metadata().trained_at.clone(),
        },
        evaluated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };

    let mut json = serde_json::to_string_pretty(&report)?;
    json.push('\n');
    write_atomic(output, json.as_bytes())?;

    info!(
        "Evaluated {} on {} records: accuracy {:.3}, macro F1 {:.3}",
        model.display(),
        report.dataset.records,
        report.metrics.accuracy,
        report.metrics.macro_f1
    );
    Ok(report)
}
