use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use std::collections::{BTreeSet, HashMap};

use super::linear::{Algorithm, FitParams, LinearModel};
use super::model::Classifier;
use super::utils::first_argmax;
use crate::artifact::{ModelArtifact, TrainingMetadata};
use crate::config::TrainConfig;
use crate::dataset::Record;
use crate::error::ClassifierError;
use crate::features::{TfidfOptions, TfidfTransform};
use crate::text::NormalizeOptions;

/// Upper bound on distinct labels in one training set.
pub const MAX_CLASSES: usize = 100;

/// A builder for training a Classifier with a fluent interface.
///
/// Records are used in the order they were added; together with the seed in
/// the [`TrainConfig`] that makes training reproducible.
#[derive(Debug, Clone, Default)]
pub struct ClassifierBuilder {
    records: Vec<Record>,
    config: TrainConfig,
    normalization: NormalizeOptions,
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use sentiflow::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            config: TrainConfig::default(),
            normalization: NormalizeOptions::standard(),
        }
    }

    /// Sets all training hyper-parameters at once
    pub fn with_config(mut self, config: TrainConfig) -> Self {
        self.config = config;
        self
    }

    /// Selects the classifier family
    ///
    /// # Example
    /// ```
    /// use sentiflow::{Algorithm, ClassifierBuilder};
    ///
    /// let builder = ClassifierBuilder::new()
    ///     .with_algorithm(Algorithm::LogisticRegression);
    /// ```
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Records which normalization the training texts went through. This is
    /// stored in the artifact metadata and does not change the texts.
    pub fn with_normalization(mut self, options: NormalizeOptions) -> Self {
        self.normalization = options;
        self
    }

    /// Adds one labeled example
    ///
    /// # Returns
    /// * `Err(ClassifierError::ValidationError)` if the label is empty or blank
    pub fn add_example(
        mut self,
        text: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<Self, ClassifierError> {
        let record = Record::new(text, label);
        Self::validate_record(&record, self.records.len())?;
        self.records.push(record);
        Ok(self)
    }

    /// Adds labeled examples in order
    pub fn add_records(
        mut self,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<Self, ClassifierError> {
        for record in records {
            Self::validate_record(&record, self.records.len())?;
            self.records.push(record);
        }
        Ok(self)
    }

    fn validate_record(record: &Record, position: usize) -> Result<(), ClassifierError> {
        if record.label.trim().is_empty() {
            return Err(ClassifierError::ValidationError(format!(
                "Record {} has an empty label",
                position + 1
            )));
        }
        Ok(())
    }

    /// Fits the feature transform and the classifier
    ///
    /// # Returns
    /// * `Result<Classifier, ClassifierError>` - The trained Classifier, or a
    ///   `ValidationError` if:
    ///   - The configuration is invalid
    ///   - Fewer than 2 distinct labels were added
    ///   - More than [`MAX_CLASSES`] distinct labels were added
    ///   - No text contains a usable token
    ///
    /// A label the fitted model never predicts on its own training data is not
    /// an error; it is logged and listed in `degenerate_labels`.
    pub fn build(self) -> Result<Classifier, ClassifierError> {
        self.config.validate()?;

        let labels: Vec<String> = self
            .records
            .iter()
            .map(|r| r.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if labels.len() < 2 {
            return Err(ClassifierError::ValidationError(format!(
                "Training data needs at least 2 distinct labels, found {}",
                labels.len()
            )));
        }
        if labels.len() > MAX_CLASSES {
            return Err(ClassifierError::ValidationError(format!(
                "Maximum number of classes ({}) exceeded",
                MAX_CLASSES
            )));
        }

        let texts: Vec<&str> = self.records.iter().map(|r| r.text.as_str()).collect();
        let transform = TfidfTransform::fit(
            &texts,
            &TfidfOptions {
                max_features: self.config.max_features,
                ngram_max: self.config.ngram_max,
                min_df: self.config.min_df,
            },
        )?;
        let features = transform.transform_batch(&texts);

        let label_index: HashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();
        let targets: Vec<usize> = self
            .records
            .iter()
            .map(|r| label_index[r.label.as_str()])
            .collect();

        let params = FitParams {
            epochs: self.config.epochs,
            regularization: self.config.regularization,
            learning_rate: self.config.learning_rate,
            seed: self.config.seed,
        };
        let model = LinearModel::fit(
            self.config.algorithm,
            &features,
            &targets,
            labels.len(),
            transform.dimension(),
            &params,
        )?;

        let mut correct = 0usize;
        let mut predicted = vec![false; labels.len()];
        for (x, &target) in features.iter().zip(&targets) {
            let best = first_argmax(&model.decision_function(x)).unwrap_or(0);
            predicted[best] = true;
            if best == target {
                correct += 1;
            }
        }
        let training_accuracy = correct as f64 / self.records.len() as f64;
        let degenerate_labels: Vec<String> = labels
            .iter()
            .zip(&predicted)
            .filter(|(_, &hit)| !hit)
            .map(|(label, _)| label.clone())
            .collect();
        if !degenerate_labels.is_empty() {
            warn!(
                "Classifier never predicts {:?} on its training data",
                degenerate_labels
            );
        }

        info!(
            "Trained {} on {} records: {} labels, {} features, training accuracy {:.3}",
            self.config.algorithm,
            self.records.len(),
            labels.len(),
            transform.dimension(),
            training_accuracy
        );

        let metadata = TrainingMetadata {
            rows: self.records.len(),
            trained_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            labels: labels.clone(),
            vocabulary_size: transform.dimension(),
            training_accuracy,
            degenerate_labels,
            normalization: self.normalization,
            config: self.config.clone(),
        };

        Classifier::from_artifact(
            ModelArtifact {
                algorithm: self.config.algorithm,
                labels,
                transform,
                model,
                metadata,
            },
            None,
        )
    }
}
