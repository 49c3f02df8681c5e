use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::ClassifierError;

/// One labeled text example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub text: String,
    pub label: String,
}

impl Record {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Supported dataset file formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    /// One `{"text": ..., "label": ...}` object per line
    Jsonl,
    /// `label,text` with RFC 4180 quoting
    Csv,
    /// `label<TAB>text`
    Tsv,
}

impl DatasetFormat {
    pub fn from_path(path: &Path) -> Result<Self, ClassifierError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("jsonl") => Ok(Self::Jsonl),
            Some("csv") => Ok(Self::Csv),
            Some("tsv") => Ok(Self::Tsv),
            _ => Err(ClassifierError::InputError(format!(
                "Unsupported dataset format for {:?} (expected .jsonl, .csv or .tsv)",
                path
            ))),
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jsonl => write!(f, "jsonl"),
            Self::Csv => write!(f, "csv"),
            Self::Tsv => write!(f, "tsv"),
        }
    }
}

/// Why a row was left out of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The row could not be parsed
    Malformed(String),
    /// The row parsed but has no usable label
    MissingLabel,
}

impl DropReason {
    /// Stable key used when counting drops by reason.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::MissingLabel => "missing_label",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(detail) => write!(f, "malformed row: {}", detail),
            Self::MissingLabel => write!(f, "missing label"),
        }
    }
}

/// A dropped row and the 1-based line it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRow {
    pub line: usize,
    pub reason: DropReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DatasetFormat::from_path(Path::new("a/b.jsonl")).unwrap(), DatasetFormat::Jsonl);
        assert_eq!(DatasetFormat::from_path(Path::new("b.CSV")).unwrap(), DatasetFormat::Csv);
        assert_eq!(DatasetFormat::from_path(Path::new("b.tsv")).unwrap(), DatasetFormat::Tsv);
        assert!(matches!(
            DatasetFormat::from_path(Path::new("b.parquet")),
            Err(ClassifierError::InputError(_))
        ));
        assert!(DatasetFormat::from_path(Path::new("noext")).is_err());
    }
}
