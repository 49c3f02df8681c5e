//! Model artifact file format and storage.
//!
//! An artifact file is a single header line followed by a JSON body:
//!
//! ```text
//! sentiflow-artifact v1 sha256=<hex digest of the body>
//! {"algorithm":"linear-svm","labels":[...],"transform":{...},"model":{...},"metadata":{...}}
//! ```
//!
//! The digest lets readers reject truncated or hand-edited files before any
//! of their contents are trusted.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::{Algorithm, LinearModel};
use crate::config::TrainConfig;
use crate::error::ClassifierError;
use crate::features::TfidfTransform;
use crate::fsutil::{sha256_hex, write_atomic};
use crate::text::NormalizeOptions;

pub const ARTIFACT_MAGIC: &str = "sentiflow-artifact";
pub const ARTIFACT_VERSION: u32 = 1;
pub const ARTIFACT_EXTENSION: &str = "model";

/// Facts recorded about a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    /// Number of records the model was fitted on
    pub rows: usize,
    /// RFC 3339 UTC timestamp
    pub trained_at: String,
    /// Label set, sorted
    pub labels: Vec<String>,
    pub vocabulary_size: usize,
    /// Accuracy on the training records themselves
    pub training_accuracy: f64,
    /// Labels that the fitted model never predicts on its own training data
    #[serde(default)]
    pub degenerate_labels: Vec<String>,
    /// Normalization the training data was declared to be cleaned with
    pub normalization: NormalizeOptions,
    pub config: TrainConfig,
}

/// Everything persisted for one trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub algorithm: Algorithm,
    /// Class labels in sorted order; row `i` of the model scores `labels[i]`
    pub labels: Vec<String>,
    pub transform: TfidfTransform,
    pub model: LinearModel,
    pub metadata: TrainingMetadata,
}

impl ModelArtifact {
    /// Checks that the parts of the artifact agree with each other.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        self.transform.validate()?;

        if self.labels.len() < 2 {
            return Err(ClassifierError::ModelStateError(format!(
                "artifact has {} labels, at least 2 are required",
                self.labels.len()
            )));
        }
        if self.labels.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ClassifierError::ModelStateError(
                "artifact labels are not sorted and unique".into(),
            ));
        }
        if self.model.num_classes() != self.labels.len() || self.model.biases.len() != self.labels.len() {
            return Err(ClassifierError::ModelStateError(format!(
                "model scores {} classes but artifact lists {} labels",
                self.model.num_classes(),
                self.labels.len()
            )));
        }
        if self.model.dimension() != self.transform.dimension() {
            return Err(ClassifierError::ModelStateError(format!(
                "model expects {} features but transform produces {}",
                self.model.dimension(),
                self.transform.dimension()
            )));
        }
        if self.model.weights.iter().chain(self.model.biases.iter()).any(|w| !w.is_finite()) {
            return Err(ClassifierError::ModelStateError(
                "model contains non-finite parameters".into(),
            ));
        }
        Ok(())
    }
}

/// Serializes an artifact into its on-disk representation.
pub fn encode_artifact(artifact: &ModelArtifact) -> Result<Vec<u8>, ClassifierError> {
    let body = serde_json::to_vec(artifact)?;
    let header = format!(
        "{} v{} sha256={}\n",
        ARTIFACT_MAGIC,
        ARTIFACT_VERSION,
        sha256_hex(&body)
    );
    let mut bytes = header.into_bytes();
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Parses and verifies an artifact.
///
/// # Returns
/// * `Err(ClassifierError::ModelStateError)` if the header is missing or
///   malformed, the version is unsupported, the checksum does not match, or
///   the body does not describe a consistent model.
pub fn decode_artifact(bytes: &[u8]) -> Result<ModelArtifact, ClassifierError> {
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| ClassifierError::ModelStateError("artifact header is missing".into()))?;
    let header = std::str::from_utf8(&bytes[..newline])
        .map_err(|_| ClassifierError::ModelStateError("artifact header is not UTF-8".into()))?;
    let body = &bytes[newline + 1..];

    let mut parts = header.trim_end_matches('\r').split(' ');
    let (magic, version, digest) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(v), Some(d), None) => (m, v, d),
        _ => {
            return Err(ClassifierError::ModelStateError(format!(
                "malformed artifact header: {:?}",
                header
            )))
        }
    };
    if magic != ARTIFACT_MAGIC {
        return Err(ClassifierError::ModelStateError(
            "not a sentiflow model artifact".into(),
        ));
    }
    let version: u32 = version
        .strip_prefix('v')
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ClassifierError::ModelStateError(format!("bad artifact version {:?}", version)))?;
    if version != ARTIFACT_VERSION {
        return Err(ClassifierError::ModelStateError(format!(
            "unsupported artifact version {} (this build reads v{})",
            version, ARTIFACT_VERSION
        )));
    }
    let expected = digest
        .strip_prefix("sha256=")
        .ok_or_else(|| ClassifierError::ModelStateError(format!("bad artifact digest {:?}", digest)))?;

    let actual = sha256_hex(body);
    if actual != expected {
        return Err(ClassifierError::ModelStateError(format!(
            "artifact checksum mismatch: expected {}, got {}",
            expected, actual
        )));
    }

    let artifact: ModelArtifact = serde_json::from_slice(body)
        .map_err(|e| ClassifierError::ModelStateError(format!("artifact body is invalid: {}", e)))?;
    artifact.validate()?;
    Ok(artifact)
}

/// Writes an artifact to `path` atomically, replacing any previous file.
pub fn save_artifact(path: &Path, artifact: &ModelArtifact) -> Result<(), ClassifierError> {
    artifact.validate()?;
    let bytes = encode_artifact(artifact)?;
    write_atomic(path, &bytes)?;
    info!("Saved {} artifact to {:?}", artifact.algorithm, path);
    Ok(())
}

/// Reads and verifies an artifact from `path`.
pub fn load_artifact(path: &Path) -> Result<ModelArtifact, ClassifierError> {
    if !path.exists() {
        return Err(ClassifierError::InputError(format!(
            "Model artifact not found: {}",
            path.display()
        )));
    }
    let bytes = fs::read(path)?;
    debug!("Read {} bytes from {:?}", bytes.len(), path);
    decode_artifact(&bytes)
}

/// Resolves where artifacts live when no explicit path is given.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    models_dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at the default models directory.
    pub fn new_default() -> Self {
        Self::new(Self::default_models_dir())
    }

    /// Returns the default models directory path
    pub fn default_models_dir() -> PathBuf {
        // 1. Explicit override
        if let Ok(path) = env::var("SENTIFLOW_HOME") {
            if !path.is_empty() {
                return PathBuf::from(path).join("models");
            }
        }

        // 2. Platform data directory
        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("sentiflow").join("models");
        }

        // 3. Home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".sentiflow").join("models");
        }

        // 4. Temp directory as a last resort
        env::temp_dir().join("sentiflow").join("models")
    }

    /// The directory is not created until something is saved into it.
    pub fn new<P: AsRef<Path>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.models_dir.join(format!("{}.{}", name, ARTIFACT_EXTENSION))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.artifact_path(name).exists()
    }

    /// Saves under `name`, returning the path written.
    pub fn save(&self, name: &str, artifact: &ModelArtifact) -> Result<PathBuf, ClassifierError> {
        let path = self.artifact_path(name);
        save_artifact(&path, artifact)?;
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<ModelArtifact, ClassifierError> {
        load_artifact(&self.artifact_path(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::dataset::Record;

    fn sample_artifact() -> ModelArtifact {
        let records = vec![
            Record::new("great fun film", "positive"),
            Record::new("loved every minute", "positive"),
            Record::new("boring and slow", "negative"),
            Record::new("terrible waste of time", "negative"),
        ];
        Classifier::builder()
            .add_records(records)
            .unwrap()
            .build()
            .unwrap()
            .to_artifact()
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let artifact = sample_artifact();
        let bytes = encode_artifact(&artifact).unwrap();
        let header_end = bytes.iter().position(|&b| b == b'\n').unwrap();
        let header = std::str::from_utf8(&bytes[..header_end]).unwrap();
        assert!(header.starts_with("sentiflow-artifact v1 sha256="));
        assert_eq!(decode_artifact(&bytes).unwrap(), artifact);
    }

    #[test]
    fn test_flipped_body_byte_is_rejected() {
        let mut bytes = encode_artifact(&sample_artifact()).unwrap();
        let last = bytes.len() - 2;
        bytes[last] ^= 0x01;
        assert!(matches!(
            decode_artifact(&bytes),
            Err(ClassifierError::ModelStateError(msg)) if msg.contains("checksum")
        ));
    }

    #[test]
    fn test_bad_headers_are_rejected() {
        let body = b"{}";
        for header in [
            "",
            "sentiflow-artifact v1",
            "other-format v1 sha256=00",
            "sentiflow-artifact v2 sha256=00",
            "sentiflow-artifact vX sha256=00",
            "sentiflow-artifact v1 md5=00",
        ] {
            let mut bytes = format!("{}\n", header).into_bytes();
            bytes.extend_from_slice(body);
            assert!(
                matches!(decode_artifact(&bytes), Err(ClassifierError::ModelStateError(_))),
                "header {:?} accepted",
                header
            );
        }
        assert!(decode_artifact(b"no newline at all").is_err());
    }

    #[test]
    fn test_valid_checksum_wrong_schema() {
        let body = br#"{"algorithm":"linear-svm"}"#;
        let mut bytes = format!("sentiflow-artifact v1 sha256={}\n", sha256_hex(body)).into_bytes();
        bytes.extend_from_slice(body);
        assert!(matches!(
            decode_artifact(&bytes),
            Err(ClassifierError::ModelStateError(_))
        ));
    }

    #[test]
    fn test_inconsistent_artifact_rejected() {
        let mut artifact = sample_artifact();
        artifact.labels.push("zzz".into());
        assert!(matches!(artifact.validate(), Err(ClassifierError::ModelStateError(_))));
    }

    #[test]
    fn test_store_paths_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("models"));
        assert_eq!(store.artifact_path("reviews"), dir.path().join("models").join("reviews.model"));
        assert!(!store.exists("reviews"));
        assert!(matches!(store.load("reviews"), Err(ClassifierError::InputError(_))));

        let path = store.save("reviews", &sample_artifact()).unwrap();
        assert!(path.exists());
        assert_eq!(store.load("reviews").unwrap().labels, vec!["negative", "positive"]);
    }

    #[test]
    fn test_default_models_dir_honours_env() {
        env::set_var("SENTIFLOW_HOME", "/tmp/sentiflow-test-home");
        let path = ArtifactStore::default_models_dir();
        env::remove_var("SENTIFLOW_HOME");
        assert_eq!(path, PathBuf::from("/tmp/sentiflow-test-home/models"));
    }
}
