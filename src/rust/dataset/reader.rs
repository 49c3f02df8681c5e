use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::record::{DatasetFormat, DropReason, DroppedRow, Record};
use crate::error::ClassifierError;
use crate::fsutil::sha256_hex;

/// A dataset file after parsing: the usable records plus an account of every
/// row that was left out.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub path: PathBuf,
    pub format: DatasetFormat,
    pub records: Vec<Record>,
    pub dropped: Vec<DroppedRow>,
    /// SHA-256 of the raw file bytes
    pub sha256: String,
}

impl Dataset {
    /// Number of rows seen, kept or not. Blank lines and an unquoted CSV header are not rows.
    pub fn total(&self) -> usize {
        self.records.len() + self.dropped.len()
    }

    /// Distinct labels, sorted.
    pub fn labels(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.label.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reads a dataset file, dropping and counting rows that cannot be used.
///
/// # Returns
/// * `Ok(Dataset)` even when every row was dropped; callers decide whether an
///   empty dataset is fatal.
/// * `Err(ClassifierError::InputError)` if the file is missing, is not UTF-8,
///   or has an unsupported extension.
pub fn read_dataset(path: &Path) -> Result<Dataset, ClassifierError> {
    let format = DatasetFormat::from_path(path)?;
    if !path.exists() {
        return Err(ClassifierError::InputError(format!(
            "Dataset file not found: {}",
            path.display()
        )));
    }

    let bytes = fs::read(path)?;
    let sha256 = sha256_hex(&bytes);
    let content = String::from_utf8(bytes).map_err(|e| {
        ClassifierError::InputError(format!("Dataset {} is not valid UTF-8: {}", path.display(), e))
    })?;

    let (records, dropped) = parse_dataset(&content, format);
    for row in &dropped {
        warn!("{}:{}: dropped {}", path.display(), row.line, row.reason);
    }
    debug!(
        "Read {} records ({} dropped) from {} as {}",
        records.len(),
        dropped.len(),
        path.display(),
        format
    );

    Ok(Dataset {
        path: path.to_path_buf(),
        format,
        records,
        dropped,
        sha256,
    })
}

/// Parses dataset text in the given format.
///
/// JSONL and TSV rows are single lines. A CSV row may span lines inside a
/// quoted field, and a dropped row is reported at the line it starts on.
pub fn parse_dataset(content: &str, format: DatasetFormat) -> (Vec<Record>, Vec<DroppedRow>) {
    let mut records = Vec::new();
    let mut dropped = Vec::new();
    let mut seen_row = false;

    for (line, row) in logical_rows(content, format) {
        if row.trim().is_empty() {
            continue;
        }
        let first_row = !seen_row;
        seen_row = true;

        let parsed = match format {
            DatasetFormat::Jsonl => parse_jsonl_row(&row),
            DatasetFormat::Csv => {
                if first_row && is_csv_header(&row) {
                    continue;
                }
                parse_csv_row(&row)
            }
            DatasetFormat::Tsv => parse_tsv_row(&row),
        };

        match parsed {
            Ok(record) => records.push(record),
            Err(reason) => dropped.push(DroppedRow { line, reason }),
        }
    }

    (records, dropped)
}

/// Splits `content` into rows tagged with their 1-based starting line.
///
/// The trailing `\r` of a CRLF line ending is removed, but a line break
/// inside an open CSV quote is part of the field and kept verbatim.
fn logical_rows(content: &str, format: DatasetFormat) -> Vec<(usize, String)> {
    let mut rows = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, line) in content.split('\n').enumerate() {
        let (start, mut row) = match pending.take() {
            Some((start, mut row)) => {
                row.push('\n');
                row.push_str(line);
                (start, row)
            }
            None => (idx + 1, line.to_string()),
        };
        if format == DatasetFormat::Csv && in_open_quote(&row) {
            pending = Some((start, row));
            continue;
        }
        if row.ends_with('\r') {
            row.pop();
        }
        rows.push((start, row));
    }

    // an unterminated quote runs to the end of the file and is dropped as malformed
    rows.extend(pending);
    rows
}

/// Whether a CSV row ends inside a quoted field. Quotes only open at the
/// start of a field, matching [`split_csv_line`].
fn in_open_quote(row: &str) -> bool {
    let mut in_quotes = false;
    let mut field_start = true;
    let mut chars = row.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
        } else {
            in_quotes = c == '"' && field_start;
            field_start = c == ',';
        }
    }
    in_quotes
}

/// Only a bare `label,text` row is a header; quoting either name makes it data.
fn is_csv_header(row: &str) -> bool {
    match row.split_once(',') {
        Some((label, text)) => label.trim() == "label" && text.trim() == "text",
        None => false,
    }
}

fn make_record(label: &str, text: String) -> Result<Record, DropReason> {
    let label = label.trim();
    if label.is_empty() {
        return Err(DropReason::MissingLabel);
    }
    Ok(Record {
        text,
        label: label.to_string(),
    })
}

fn parse_jsonl_row(line: &str) -> Result<Record, DropReason> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| DropReason::Malformed(format!("invalid JSON: {}", e)))?;
    let obj = value
        .as_object()
        .ok_or_else(|| DropReason::Malformed("expected a JSON object".into()))?;

    let text = match obj.get("text") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(DropReason::Malformed("`text` must be a string".into())),
        None => return Err(DropReason::Malformed("missing `text`".into())),
    };

    match obj.get("label") {
        None | Some(Value::Null) => Err(DropReason::MissingLabel),
        Some(Value::String(s)) => make_record(s, text),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => make_record(&n.to_string(), text),
        Some(_) => Err(DropReason::Malformed(
            "`label` must be a string or an integer".into(),
        )),
    }
}

fn parse_csv_row(line: &str) -> Result<Record, DropReason> {
    let fields = split_csv_line(line).map_err(DropReason::Malformed)?;
    match <[String; 2]>::try_from(fields) {
        Ok([label, text]) => make_record(&label, text),
        Err(fields) => Err(DropReason::Malformed(format!(
            "expected 2 fields, found {}",
            fields.len()
        ))),
    }
}

fn parse_tsv_row(line: &str) -> Result<Record, DropReason> {
    let fields: Vec<&str> = line.split('\t').collect();
    match fields.as_slice() {
        [label, text] => make_record(label, text.to_string()),
        _ => Err(DropReason::Malformed(format!(
            "expected 2 fields, found {}",
            fields.len()
        ))),
    }
}

/// Splits one CSV line into fields.
///
/// Quoted fields may contain commas and `""` for a literal quote. A quote
/// that is not at the start of a field, or a quoted field that never closes,
/// makes the line malformed.
pub(crate) fn split_csv_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();

    loop {
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => return Err("unterminated quoted field".into()),
                }
            }
            match chars.next() {
                None => {
                    fields.push(field);
                    return Ok(fields);
                }
                Some(',') => fields.push(std::mem::take(&mut field)),
                Some(c) => return Err(format!("unexpected {:?} after closing quote", c)),
            }
        } else {
            loop {
                match chars.next() {
                    None => {
                        fields.push(field);
                        return Ok(fields);
                    }
                    Some(',') => {
                        fields.push(std::mem::take(&mut field));
                        break;
                    }
                    Some('"') => return Err("stray quote in unquoted field".into()),
                    Some(c) => field.push(c),
                }
            }
        }
    }
}
