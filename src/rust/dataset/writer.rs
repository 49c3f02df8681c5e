use std::path::Path;

use super::record::{DatasetFormat, Record};
use crate::error::ClassifierError;
use crate::fsutil::write_atomic;

/// Serializes records in the given format. Output is deterministic: one row
/// per record in input order, `\n` line endings, no header.
///
/// CSV fields holding a line break are quoted and span lines. TSV rows are
/// single lines, so a TSV field containing a tab or line break is a
/// `ValidationError`.
pub fn render_dataset(records: &[Record], format: DatasetFormat) -> Result<String, ClassifierError> {
    let mut out = String::new();
    for (idx, record) in records.iter().enumerate() {
        match format {
            DatasetFormat::Jsonl => out.push_str(&serde_json::to_string(record)?),
            DatasetFormat::Csv => {
                out.push_str(&csv_field(&record.label));
                out.push(',');
                out.push_str(&csv_field(&record.text));
            }
            DatasetFormat::Tsv => {
                for field in [&record.label, &record.text] {
                    if field.contains(&['\t', '\n', '\r'][..]) {
                        return Err(ClassifierError::ValidationError(format!(
                            "Record {} cannot be written as TSV: field contains a tab or line break",
                            idx + 1
                        )));
                    }
                }
                out.push_str(&record.label);
                out.push('\t');
                out.push_str(&record.text);
            }
        }
        out.push('\n');
    }
    Ok(out)
}

/// Writes records to `path` atomically, choosing the format from its extension.
pub fn write_dataset(path: &Path, records: &[Record]) -> Result<(), ClassifierError> {
    let format = DatasetFormat::from_path(path)?;
    let content = render_dataset(records, format)?;
    write_atomic(path, content.as_bytes())
}

/// Quotes a field when it holds a delimiter, a quote or a line break, or when
/// it reads as a header name; a quoted `label,text` row is never a header.
fn csv_field(value: &str) -> String {
    let header_word = matches!(value.trim(), "label" | "text");
    if header_word || value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::parse_dataset;

    fn sample() -> Vec<Record> {
        vec![
            Record::new("it was \"fine\", i guess", "neutral"),
            Record::new("", "negative"),
            Record::new("plain", "positive"),
        ]
    }

    #[test]
    fn test_csv_quoting_survives_reparse() {
        let rendered = render_dataset(&sample(), DatasetFormat::Csv).unwrap();
        assert_eq!(
            rendered.lines().next().unwrap(),
            r#"neutral,"it was ""fine"", i guess""#
        );
        let (records, dropped) = parse_dataset(&rendered, DatasetFormat::Csv);
        assert!(dropped.is_empty());
        assert_eq!(records, sample());
    }

    #[test]
    fn test_header_lookalike_record_is_kept() {
        let records = vec![Record::new("text", "label"), Record::new("good", "pos")];
        let rendered = render_dataset(&records, DatasetFormat::Csv).unwrap();
        assert_eq!(rendered, "\"label\",\"text\"\npos,good\n");

        let (reparsed, dropped) = parse_dataset(&rendered, DatasetFormat::Csv);
        assert!(dropped.is_empty());
        assert_eq!(reparsed, records);
        assert_eq!(render_dataset(&reparsed, DatasetFormat::Csv).unwrap(), rendered);
    }

    #[test]
    fn test_csv_line_breaks_are_quoted() {
        let records = vec![
            Record::new("first line\nsecond line", "pos"),
            Record::new("windows\r\nbreak", "neg"),
            Record::new("after", "pos"),
        ];
        let rendered = render_dataset(&records, DatasetFormat::Csv).unwrap();
        assert!(rendered.starts_with("pos,\"first line\nsecond line\"\n"));

        let (reparsed, dropped) = parse_dataset(&rendered, DatasetFormat::Csv);
        assert!(dropped.is_empty());
        assert_eq!(reparsed, records);
    }

    #[test]
    fn test_jsonl_field_order() {
        let rendered = render_dataset(&sample()[2..], DatasetFormat::Jsonl).unwrap();
        assert_eq!(rendered, "{\"text\":\"plain\",\"label\":\"positive\"}\n");
    }

    #[test]
    fn test_tsv_rejects_tabs() {
        let records = vec![Record::new("a\tb", "pos")];
        assert!(matches!(
            render_dataset(&records, DatasetFormat::Tsv),
            Err(ClassifierError::ValidationError(_))
        ));
    }

    #[test]
    fn test_write_dataset_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("clean.tsv");
        write_dataset(&path, &sample()[1..]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "negative\t\npositive\tplain\n"
        );
        assert!(write_dataset(&dir.path().join("clean.txt"), &sample()).is_err());
    }
}
