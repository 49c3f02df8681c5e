//! Pipeline configuration
//!
//! Every field has a default, so an empty YAML file (or no file at all) is a
//! valid configuration. Unknown keys are rejected. Command line flags are
//! applied on top by the binary.

use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::classifier::Algorithm;
use crate::error::ClassifierError;
use crate::text::NormalizeOptions;

/// Top-level configuration shared by every command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Explicit normalization override.
    ///
    /// When unset, `preprocess` runs only the steps named by its flags,
    /// `train` records what the preprocessor wrote next to its output, and
    /// `predict`/`serve` apply what the artifact records.
    #[serde(default)]
    pub normalization: Option<NormalizeOptions>,

    /// Training hyper-parameters
    #[serde(default)]
    pub train: TrainConfig,

    /// Inference service settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// File stem used for artifacts written to the default location
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalization: None,
            train: TrainConfig::default(),
            service: ServiceConfig::default(),
            artifact_name: default_artifact_name(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from an optional YAML file.
    ///
    /// `None` yields the defaults. A path that was given but does not exist is
    /// an error rather than a silent fallback.
    pub fn load(path: Option<&Path>) -> Result<Self, ClassifierError> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ClassifierError::InputError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                let content = std::fs::read_to_string(path)?;
                debug!("Loaded config from {}", path.display());
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from YAML text without validating it.
    pub fn from_yaml(content: &str) -> Result<Self, ClassifierError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.artifact_name.trim().is_empty() {
            return Err(ClassifierError::ValidationError(
                "artifact_name cannot be empty".into(),
            ));
        }
        self.train.validate()?;
        self.service.validate()
    }
}

/// Hyper-parameters for the trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainConfig {
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Passes over the training set
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// L2 regularization strength (lambda)
    #[serde(default = "default_regularization")]
    pub regularization: f32,

    /// Step size for logistic regression; the SVM uses the Pegasos schedule
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,

    /// Seed for the shuffling RNG
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Upper bound on vocabulary size
    #[serde(default = "default_max_features")]
    pub max_features: usize,

    /// 1 for unigrams only, 2 to add bigrams
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,

    /// Minimum number of documents a term must occur in
    #[serde(default = "default_min_df")]
    pub min_df: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            epochs: default_epochs(),
            regularization: default_regularization(),
            learning_rate: default_learning_rate(),
            seed: default_seed(),
            max_features: default_max_features(),
            ngram_max: default_ngram_max(),
            min_df: default_min_df(),
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.epochs == 0 {
            return Err(ClassifierError::ValidationError("epochs must be at least 1".into()));
        }
        if !(self.regularization.is_finite() && self.regularization > 0.0) {
            return Err(ClassifierError::ValidationError(format!(
                "regularization must be positive, got {}",
                self.regularization
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ClassifierError::ValidationError(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_features == 0 {
            return Err(ClassifierError::ValidationError(
                "max_features must be at least 1".into(),
            ));
        }
        if !(1..=2).contains(&self.ngram_max) {
            return Err(ClassifierError::ValidationError(format!(
                "ngram_max must be 1 or 2, got {}",
                self.ngram_max
            )));
        }
        if self.min_df == 0 {
            return Err(ClassifierError::ValidationError("min_df must be at least 1".into()));
        }
        Ok(())
    }
}

/// Inference service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Requests with more characters than this are rejected
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.host.trim().is_empty() {
            return Err(ClassifierError::ValidationError("host cannot be empty".into()));
        }
        if self.max_text_chars == 0 {
            return Err(ClassifierError::ValidationError(
                "max_text_chars must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// `host:port` string suitable for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_artifact_name() -> String {
    "sentiment".to_string()
}

fn default_epochs() -> usize {
    50
}

fn default_regularization() -> f32 {
    0.01
}

fn default_learning_rate() -> f32 {
    1.0
}

fn default_seed() -> u64 {
    42
}

fn default_max_features() -> usize {
    10_000
}

fn default_ngram_max() -> usize {
    1
}

fn default_min_df() -> usize {
    1
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_text_chars() -> usize {
    10_000
}
