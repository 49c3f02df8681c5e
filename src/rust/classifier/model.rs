use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::linear::{Algorithm, LinearModel};
use super::utils::{first_argmax, margins_to_confidences};
use crate::artifact::{load_artifact, save_artifact, ModelArtifact, TrainingMetadata};
use crate::error::ClassifierError;
use crate::features::{SparseVector, TfidfTransform};

/// The outcome of classifying one text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    /// Confidence of `label`, in `[0, 1]`
    pub confidence: f32,
    /// Confidence for every label; values sum to 1
    pub scores: BTreeMap<String, f32>,
}

/// A trained, read-only sentiment classifier.
///
/// # Thread Safety
///
/// This type is automatically `Send + Sync`: all of its state sits behind
/// `Arc` and is never mutated after construction. Cloning is cheap and shares
/// the parameters.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use sentiflow::{Classifier, Record};
/// use std::sync::Arc;
/// use std::thread;
///
/// let classifier = Arc::new(Classifier::builder()
///     .add_records(vec![
///         Record::new("great fun", "positive"),
///         Record::new("dull and slow", "negative"),
///     ])?
///     .build()?);
///
/// let shared = Arc::clone(&classifier);
/// let handle = thread::spawn(move || shared.predict("great").map(|p| p.label));
/// assert_eq!(handle.join().unwrap()?, "positive");
/// # Ok(())
/// # }
/// ```
///
/// # Ties
///
/// When two labels score exactly the same, the one that sorts first wins.
/// Every reader of an artifact (evaluation, batch prediction and the
/// service) goes through this type, so the rule is the same everywhere.
#[derive(Debug, Clone)]
pub struct Classifier {
    path: Option<PathBuf>,
    algorithm: Algorithm,
    labels: Arc<Vec<String>>,
    transform: Arc<TfidfTransform>,
    model: Arc<LinearModel>,
    metadata: Arc<TrainingMetadata>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Classifier>();
    }
};

impl Classifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Loads and verifies an artifact written by [`Classifier::save`] or the trainer.
    ///
    /// # Returns
    /// * `Err(ClassifierError::InputError)` if the file does not exist
    /// * `Err(ClassifierError::ModelStateError)` if it is corrupt or incompatible
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let artifact = load_artifact(path)?;
        Self::from_artifact(artifact, Some(path.to_path_buf()))
    }

    /// Wraps an artifact after checking that its parts agree.
    ///
    /// # Returns
    /// * `Err(ClassifierError::ModelStateError)` if the labels, parameters and
    ///   transform are inconsistent
    pub fn from_artifact(artifact: ModelArtifact, path: Option<PathBuf>) -> Result<Self, ClassifierError> {
        artifact.validate()?;
        Ok(Self {
            path,
            algorithm: artifact.algorithm,
            labels: Arc::new(artifact.labels),
            transform: Arc::new(artifact.transform),
            model: Arc::new(artifact.model),
            metadata: Arc::new(artifact.metadata),
        })
    }

    pub fn to_artifact(&self) -> ModelArtifact {
        ModelArtifact {
            algorithm: self.algorithm,
            labels: self.labels.as_ref().clone(),
            transform: self.transform.as_ref().clone(),
            model: self.model.as_ref().clone(),
            metadata: self.metadata.as_ref().clone(),
        }
    }

    /// Persists the classifier atomically at `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ClassifierError> {
        save_artifact(path.as_ref(), &self.to_artifact())
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> super::ClassifierInfo {
        super::ClassifierInfo {
            artifact_path: self.path.clone(),
            algorithm: self.algorithm,
            labels: self.labels.as_ref().clone(),
            vocabulary_size: self.transform.dimension(),
            rows: self.metadata.rows,
            trained_at: self.metadata.trained_at.clone(),
            training_accuracy: self.metadata.training_accuracy,
            degenerate_labels: self.metadata.degenerate_labels.clone(),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Labels in sorted order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    pub fn transform(&self) -> &TfidfTransform {
        &self.transform
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Classifies one text.
    ///
    /// The text is used as given; callers that accept raw input normalize
    /// it first with the configured [`NormalizeOptions`](crate::NormalizeOptions).
    ///
    /// # Returns
    /// * `Err(ClassifierError::ValidationError)` if the text is empty or
    ///   whitespace only. No features are computed in that case.
    ///
    /// # Example
    /// ```rust
    /// # use sentiflow::{Classifier, Record};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let classifier = Classifier::builder()
    /// #     .add_records(vec![Record::new("great", "positive"), Record::new("awful", "negative")])?
    /// #     .build()?;
    /// let prediction = classifier.predict("great")?;
    /// assert!((0.0..=1.0).contains(&prediction.confidence));
    /// # Ok(())
    /// # }
    /// ```
    pub fn predict(&self, text: &str) -> Result<Prediction, ClassifierError> {
        if text.trim().is_empty() {
            return Err(ClassifierError::ValidationError("Input text cannot be empty".into()));
        }
        Ok(self.score_text(text))
    }

    /// Classifies a text without validating it. Empty text scores on the
    /// biases alone.
    pub fn score_text(&self, text: &str) -> Prediction {
        self.score_vector(&self.transform.transform(text))
    }

    /// Classifies an already transformed feature vector.
    pub fn score_vector(&self, features: &SparseVector) -> Prediction {
        let margins = self.model.decision_function(features);
        let confidences = margins_to_confidences(&margins);
        let best = first_argmax(&margins).unwrap_or(0);

        let scores: BTreeMap<String, f32> = self
            .labels
            .iter()
            .cloned()
            .zip(confidences.iter().copied())
            .collect();

        Prediction {
            label: self.labels[best].clone(),
            confidence: confidences[best],
            scores,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;

    fn trained() -> Classifier {
        Classifier::builder()
            .add_records(vec![
                Record::new("great fun film", "positive"),
                Record::new("loved it", "positive"),
                Record::new("boring slow film", "negative"),
                Record::new("hated it", "negative"),
            ])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_predict_rejects_blank_text() {
        let classifier = trained();
        for text in ["", "   ", "\n\t"] {
            assert!(matches!(
                classifier.predict(text),
                Err(ClassifierError::ValidationError(_))
            ));
        }
    }

    #[test]
    fn test_prediction_shape() {
        let classifier = trained();
        let prediction = classifier.predict("great fun").unwrap();
        assert_eq!(prediction.label, "positive");
        assert!((0.0..=1.0).contains(&prediction.confidence));
        assert_eq!(prediction.scores.len(), 2);
        assert_eq!(prediction.scores["positive"], prediction.confidence);
        let total: f32 = prediction.scores.values().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_tie_goes_to_first_label() {
        let mut artifact = trained().to_artifact();
        artifact.model.weights.fill(0.0);
        artifact.model.biases.fill(0.0);
        let classifier = Classifier::from_artifact(artifact, None).unwrap();
        let prediction = classifier.score_text("anything");
        assert_eq!(prediction.label, "negative");
        assert!((prediction.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_from_artifact_rejects_inconsistent_parts() {
        let mut no_labels = trained().to_artifact();
        no_labels.labels.clear();
        assert!(matches!(
            Classifier::from_artifact(no_labels, None),
            Err(ClassifierError::ModelStateError(_))
        ));

        let mut unsorted = trained().to_artifact();
        unsorted.labels.reverse();
        assert!(matches!(
            Classifier::from_artifact(unsorted, None),
            Err(ClassifierError::ModelStateError(_))
        ));
    }

    #[test]
    fn test_save_and_load_predict_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentiment.model");
        let classifier = trained();
        classifier.save(&path).unwrap();

        let loaded = Classifier::load(&path).unwrap();
        assert_eq!(loaded.path(), Some(path.as_path()));
        for text in ["great fun", "boring", "unseen words", "hated it"] {
            assert_eq!(classifier.score_text(text), loaded.score_text(text));
        }
    }

    #[test]
    fn test_info_reports_artifact() {
        let info = trained().info();
        assert_eq!(info.labels, vec!["negative", "positive"]);
        assert_eq!(info.algorithm, Algorithm::LinearSvm);
        assert_eq!(info.rows, 4);
        assert!(info.vocabulary_size > 0);
        assert!(info.artifact_path.is_none());
    }
}
