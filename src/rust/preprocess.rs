//! Preprocessor: raw dataset in, cleaned dataset out.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dataset::{read_dataset, render_dataset, DatasetFormat, Record};
use crate::error::ClassifierError;
use crate::fsutil::{sha256_hex, write_atomic};
use crate::text::NormalizeOptions;

/// Suffix of the report written next to every cleaned dataset.
pub const REPORT_SUFFIX: &str = ".preprocess.json";

/// Summary of one preprocessing run. `total == kept + dropped` always holds.
///
/// A copy is saved at [`report_path`] of the output, so the trainer can record
/// how the data it reads was normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub total: usize,
    pub kept: usize,
    pub dropped: usize,
    /// Dropped row counts keyed by reason
    pub drop_reasons: BTreeMap<String, usize>,
    pub options: NormalizeOptions,
    /// SHA-256 of the cleaned dataset as written
    pub output_sha256: String,
}

/// Where the report for a cleaned dataset at `output` is kept.
pub fn report_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(OsString::from).unwrap_or_default();
    name.push(REPORT_SUFFIX);
    output.with_file_name(name)
}

/// Normalization recorded by the preprocessor for the dataset at `data`.
///
/// Returns `None` when there is no report, or when the dataset changed after
/// the report was written.
pub fn recorded_normalization(data: &Path) -> Result<Option<NormalizeOptions>, ClassifierError> {
    let path = report_path(data);
    if !path.exists() {
        return Ok(None);
    }
    let report: PreprocessReport = serde_json::from_str(&fs::read_to_string(&path)?)
        .map_err(|e| ClassifierError::InputError(format!("{}: {}", path.display(), e)))?;
    if report.output_sha256 != sha256_hex(&fs::read(data)?) {
        warn!(
            "{} no longer matches {}; ignoring its normalization record",
            data.display(),
            path.display()
        );
        return Ok(None);
    }
    debug!("{} was cleaned with {}", data.display(), report.options.describe());
    Ok(Some(report.options))
}

/// Normalizes every record of `input` and writes the result to `output`.
///
/// Rows that cannot be parsed or have no label are dropped and counted; the
/// rest keep their order and their labels. The output format follows the
/// output file extension and is written atomically, so a failed run leaves
/// any previous output untouched.
///
/// # Returns
/// * `Err(ClassifierError::InputError)` if the input is missing, has an
///   unsupported extension, or contains no valid record at all
/// * `Err(ClassifierError::IoError)` if the output cannot be written
pub fn preprocess(
    input: &Path,
    output: &Path,
    options: &NormalizeOptions,
) -> Result<PreprocessReport, ClassifierError> {
    // fail on a bad output extension before doing any work
    DatasetFormat::from_path(output)?;

    let dataset = read_dataset(input)?;
    if dataset.is_empty() {
        return Err(ClassifierError::InputError(format!(
            "No valid records in {} ({} rows dropped)",
            input.display(),
            dataset.dropped.len()
        )));
    }

    let cleaned: Vec<Record> = dataset
        .records
        .iter()
        .map(|r| Record {
            text: options.normalize(&r.text),
            label: r.label.clone(),
        })
        .collect();

    let rendered = render_dataset(&cleaned, DatasetFormat::from_path(output)?)?;
    write_atomic(output, rendered.as_bytes())?;

    let mut drop_reasons = BTreeMap::new();
    for row in &dataset.dropped {
        *drop_reasons.entry(row.reason.key().to_string()).or_insert(0) += 1;
    }
    if !dataset.dropped.is_empty() {
        warn!(
            "Dropped {} of {} rows from {}",
            dataset.dropped.len(),
            dataset.total(),
            input.display()
        );
    }
    info!(
        "Preprocessed {} records ({}) into {}",
        cleaned.len(),
        options.describe(),
        output.display()
    );

    let report = PreprocessReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        total: dataset.total(),
        kept: cleaned.len(),
        dropped: dataset.dropped.len(),
        drop_reasons,
        options: *options,
        output_sha256: sha256_hex(rendered.as_bytes()),
    };
    let mut json = serde_json::to_string_pretty(&report)?;
    json.push('\n');
    write_atomic(&report_path(output), json.as_bytes())?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_counts_add_up() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        fs::write(
            &input,
            "positive,Loved It!!\nnegative,\"Meh, 2/10\"\n,no label\nbroken\nnegative,\n",
        )
        .unwrap();
        let output = dir.path().join("clean.csv");

        let report = preprocess(&input, &output, &NormalizeOptions::standard()).unwrap();
        assert_eq!(report.total, 5);
        assert_eq!(report.kept, 3);
        assert_eq!(report.dropped, 2);
        assert_eq!(report.drop_reasons["malformed"], 1);
        assert_eq!(report.drop_reasons["missing_label"], 1);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "positive,loved it\nnegative,meh 210\nnegative,\n"
        );
    }

    #[test]
    fn test_all_rows_invalid_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.jsonl");
        fs::write(&input, "garbage\n{\"text\": \"x\"}\n").unwrap();
        let output = dir.path().join("clean.jsonl");
        let err = preprocess(&input, &output, &NormalizeOptions::standard()).unwrap_err();
        assert!(matches!(err, ClassifierError::InputError(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_bad_output_extension_fails_early() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.tsv");
        fs::write(&input, "pos\tfine\n").unwrap();
        let err = preprocess(&input, &dir.path().join("clean.xlsx"), &NormalizeOptions::default())
            .unwrap_err();
        assert!(matches!(err, ClassifierError::InputError(_)));
    }

    #[test]
    fn test_format_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.jsonl");
        fs::write(&input, "{\"text\": \"GOOD\", \"label\": 1}\n{\"text\": \"Bad\", \"label\": 0}\n").unwrap();
        let output = dir.path().join("clean.tsv");
        let options = NormalizeOptions::default().with_lowercase(true);
        preprocess(&input, &output, &options).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "1\tgood\n0\tbad\n");
    }

    #[test]
    fn test_header_named_record_survives_a_second_pass() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.jsonl");
        fs::write(
            &input,
            "{\"text\": \"Text\", \"label\": \"label\"}\n{\"text\": \"good\", \"label\": \"pos\"}\n",
        )
        .unwrap();
        let once = dir.path().join("once.csv");
        let twice = dir.path().join("twice.csv");
        let options = NormalizeOptions::standard();

        let first = preprocess(&input, &once, &options).unwrap();
        let second = preprocess(&once, &twice, &options).unwrap();
        assert_eq!((first.kept, second.kept, second.total), (2, 2, 2));
        assert_eq!(fs::read(&once).unwrap(), fs::read(&twice).unwrap());
    }

    #[test]
    fn test_report_records_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        fs::write(&input, "pos,Great!\nneg,Awful.\n").unwrap();
        let output = dir.path().join("clean.csv");
        let options = NormalizeOptions::default().with_lowercase(true);

        let report = preprocess(&input, &output, &options).unwrap();
        assert_eq!(report_path(&output), dir.path().join("clean.csv.preprocess.json"));
        let saved: PreprocessReport =
            serde_json::from_str(&fs::read_to_string(report_path(&output)).unwrap()).unwrap();
        assert_eq!(saved, report);
        assert_eq!(recorded_normalization(&output).unwrap(), Some(options));
    }

    #[test]
    fn test_edited_dataset_has_no_recorded_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        fs::write(&input, "pos,Great!\n").unwrap();
        let output = dir.path().join("clean.csv");
        preprocess(&input, &output, &NormalizeOptions::standard()).unwrap();

        fs::write(&output, "pos,Great!\nneg,hand edited\n").unwrap();
        assert_eq!(recorded_normalization(&output).unwrap(), None);
        assert_eq!(recorded_normalization(&input).unwrap(), None);
    }
}
