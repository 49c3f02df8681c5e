//! Trainer: cleaned dataset in, model artifact out.

use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::classifier::{Algorithm, Classifier};
use crate::config::TrainConfig;
use crate::dataset::read_dataset;
use crate::error::ClassifierError;
use crate::preprocess::recorded_normalization;
use crate::text::NormalizeOptions;

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainReport {
    pub artifact: PathBuf,
    pub algorithm: Algorithm,
    pub rows: usize,
    pub labels: Vec<String>,
    pub vocabulary_size: usize,
    pub training_accuracy: f64,
    pub degenerate_labels: Vec<String>,
}

/// Normalization to record for a model trained on `data`.
///
/// What the preprocessor recorded next to the dataset describes the data
/// itself and wins over `configured`; a disagreement is logged. Without a
/// record, `configured` applies, and with neither the data is taken as not
/// normalized.
pub fn resolve_normalization(
    data: &Path,
    configured: Option<NormalizeOptions>,
) -> Result<NormalizeOptions, ClassifierError> {
    match (recorded_normalization(data)?, configured) {
        (Some(recorded), Some(configured)) if recorded != configured => {
            warn!(
                "{} was preprocessed with {}, not the configured {}; recording {}",
                data.display(),
                recorded.describe(),
                configured.describe(),
                recorded.describe()
            );
            Ok(recorded)
        }
        (Some(recorded), _) => Ok(recorded),
        (None, Some(configured)) => Ok(configured),
        (None, None) => {
            info!(
                "No preprocessing record for {}; recording no normalization",
                data.display()
            );
            Ok(NormalizeOptions::default())
        }
    }
}

/// Trains a classifier on the dataset at `data` and writes the artifact to
/// `output`, replacing whatever was there.
///
/// The dataset must be cleaned already: any row that fails to parse makes the
/// whole run fail, and nothing is written.
///
/// `normalization` is recorded in the artifact so the service can warn when it
/// is configured differently; the texts themselves are used as they are.
pub fn train(
    data: &Path,
    output: &Path,
    config: &TrainConfig,
    normalization: &NormalizeOptions,
) -> Result<TrainReport, ClassifierError> {
    let dataset = read_dataset(data)?;
    if let Some(first) = dataset.dropped.first() {
        return Err(ClassifierError::InputError(format!(
            "{}:{}: {} ({} unparseable rows in total; run `preprocess` first)",
            data.display(),
            first.line,
            first.reason,
            dataset.dropped.len()
        )));
    }
    if dataset.is_empty() {
        return Err(ClassifierError::InputError(format!(
            "No records in {}",
            data.display()
        )));
    }

    info!(
        "Training {} on {} records from {}",
        config.algorithm,
        dataset.records.len(),
        data.display()
    );

    let classifier = Classifier::builder()
        .with_config(config.clone())
        .with_normalization(*normalization)
        .add_records(dataset.records)?
        .build()?;
    classifier.save(output)?;

    let metadata = classifier.metadata();
    Ok(TrainReport {
        artifact: output.to_path_buf(),
        algorithm: classifier.algorithm(),
        rows: metadata.rows,
        labels: metadata.labels.clone(),
        vocabulary_size: metadata.vocabulary_size,
        training_accuracy: metadata.training_accuracy,
        degenerate_labels: metadata.degenerate_labels.clone(),
    })
}
