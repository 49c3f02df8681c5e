//! Batch prediction over raw texts, using the same normalization as the service.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::classifier::Classifier;
use crate::error::ClassifierError;
use crate::fsutil::write_atomic;
use crate::text::NormalizeOptions;

/// Result for one input text. Inputs that are empty after normalization get
/// an `error` instead of a label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPrediction {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<BTreeMap<String, f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Normalizes and classifies each text independently.
pub fn predict_batch<S: AsRef<str>>(
    classifier: &Classifier,
    texts: &[S],
    options: &NormalizeOptions,
) -> Vec<BatchPrediction> {
    texts
        .iter()
        .map(|text| {
            let text = text.as_ref();
            match classifier.predict(&options.normalize(text)) {
                Ok(p) => BatchPrediction {
                    text: text.to_string(),
                    label: Some(p.label),
                    confidence: Some(p.confidence),
                    scores: Some(p.scores),
                    error: None,
                },
                Err(e) => BatchPrediction {
                    text: text.to_string(),
                    label: None,
                    confidence: None,
                    scores: None,
                    error: Some(e.to_string()),
                },
            }
        })
        .collect()
}

/// Interprets `input` as a file of texts (one per non-blank line) when such a
/// file exists, and as a single literal text otherwise.
pub fn collect_inputs(input: &str) -> Result<Vec<String>, ClassifierError> {
    let path = Path::new(input);
    if path.is_file() {
        let content = fs::read_to_string(path)?;
        return Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect());
    }
    Ok(vec![input.to_string()])
}

/// Pretty JSON array of predictions, newline terminated.
pub fn render_predictions(predictions: &[BatchPrediction]) -> Result<String, ClassifierError> {
    let mut json = serde_json::to_string_pretty(predictions)?;
    json.push('\n');
    Ok(json)
}

pub fn write_predictions(path: &Path, predictions: &[BatchPrediction]) -> Result<(), ClassifierError> {
    write_atomic(path, render_predictions(predictions)?.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;

    fn classifier() -> Classifier {
        Classifier::builder()
            .add_records(vec![
                Record::new("great film", "positive"),
                Record::new("awful film", "negative"),
            ])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_batch_normalizes_and_reports_errors() {
        let predictions = predict_batch(&classifier(), &["GREAT!", "..."], &NormalizeOptions::standard());
        assert_eq!(predictions[0].label.as_deref(), Some("positive"));
        assert_eq!(predictions[0].text, "GREAT!");
        assert!(predictions[1].label.is_none());
        assert!(predictions[1].error.as_deref().unwrap().contains("empty"));
    }

    #[test]
    fn test_collect_inputs_file_or_literal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("texts.txt");
        fs::write(&path, "first one\n\nsecond one\n").unwrap();
        assert_eq!(
            collect_inputs(path.to_str().unwrap()).unwrap(),
            vec!["first one", "second one"]
        );
        assert_eq!(collect_inputs("just a sentence").unwrap(), vec!["just a sentence"]);
    }

    #[test]
    fn test_rendered_json_omits_missing_fields() {
        let predictions = predict_batch(&classifier(), &["!!"], &NormalizeOptions::standard());
        let json = render_predictions(&predictions).unwrap();
        assert!(!json.contains("\"label\""));
        assert!(json.contains("\"error\""));
    }
}
