use serde::Serialize;
use std::path::PathBuf;

pub mod builder;
mod linear;
mod model;
mod utils;

pub use builder::ClassifierBuilder;
pub use linear::{Algorithm, FitParams, LinearModel};
pub use model::{Classifier, Prediction};

/// Information about a loaded or freshly trained classifier
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierInfo {
    /// Where the artifact was loaded from, if it came from disk
    pub artifact_path: Option<PathBuf>,
    pub algorithm: Algorithm,
    /// Labels of the classes, sorted
    pub labels: Vec<String>,
    /// Size of the feature vectors
    pub vocabulary_size: usize,
    /// Number of training records
    pub rows: usize,
    pub trained_at: String,
    pub training_accuracy: f64,
    pub degenerate_labels: Vec<String>,
}
