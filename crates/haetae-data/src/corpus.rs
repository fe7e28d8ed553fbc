//! Corpus ingestion and canonical dataset I/O
//!
//! Raw corpora arrive as tab-separated files with `document<TAB>label`
//! columns where `label` is a comma-separated list of category codes. The
//! canonical dataset is a `text,labels` CSV written UTF-8-with-signature so
//! spreadsheet tools render Korean text correctly.

use crate::normalize::normalize_field;
use haetae_core::{Error, Example, Label, RawAnnotation, Result};
use std::fs;
use std::path::Path;

/// UTF-8 byte-order mark emitted at the start of canonical CSV files
const UTF8_BOM: &str = "\u{feff}";

/// How to treat rows whose label field cannot be normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedLabelPolicy {
    /// Fail the whole ingestion on the first malformed row
    #[default]
    Abort,
    /// Drop malformed rows and report how many were skipped
    SkipAndCount,
}

/// Outcome of merging raw sources into the canonical dataset
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Examples kept in the canonical dataset
    pub kept: usize,
    /// Rows dropped under [`MalformedLabelPolicy::SkipAndCount`]
    pub skipped: usize,
}

/// Read a raw KMHAS-style annotation file.
///
/// Expects a `document<TAB>label` header line. Rows without a tab separator
/// are rejected with row context rather than silently coerced.
pub fn read_raw_tsv(path: &Path) -> Result<Vec<RawAnnotation>> {
    if !path.exists() {
        return Err(Error::CorpusNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(&content);

    let mut annotations = Vec::new();
    for (index, line) in content.lines().enumerate() {
        // Header row
        if index == 0 {
            continue;
        }
        if line.is_empty() {
            continue;
        }

        let (text, labels) = line.rsplit_once('\t').ok_or_else(|| {
            Error::malformed_label(line, format!("{}:{}", path.display(), index + 1))
        })?;

        annotations.push(RawAnnotation {
            text: text.to_string(),
            raw_labels: labels.split(',').map(str::to_string).collect(),
        });
    }

    tracing::debug!(
        file = %path.display(),
        rows = annotations.len(),
        "loaded raw annotation file"
    );

    Ok(annotations)
}

/// Merge raw annotation sources into the canonical binary-labeled dataset.
///
/// Source order is preserved and nothing is shuffled at this stage, so
/// downstream splits are reproducible for a fixed seed.
pub fn build_canonical(
    sources: &[Vec<RawAnnotation>],
    policy: MalformedLabelPolicy,
) -> Result<(Vec<Example>, IngestReport)> {
    let mut examples = Vec::new();
    let mut skipped = 0usize;

    for source in sources {
        for annotation in source {
            match normalize_field(&annotation.raw_labels.join(",")) {
                Ok(label) => examples.push(Example::new(annotation.text.clone(), label)),
                Err(err) => match policy {
                    MalformedLabelPolicy::Abort => return Err(err),
                    MalformedLabelPolicy::SkipAndCount => {
                        tracing::warn!(error = %err, "skipping row with malformed label");
                        skipped += 1;
                    }
                },
            }
        }
    }

    let positives = examples.iter().filter(|e| e.label.is_hate()).count();
    tracing::info!(
        total = examples.len(),
        hate = positives,
        clean = examples.len() - positives,
        skipped,
        "canonical dataset built"
    );

    let report = IngestReport {
        kept: examples.len(),
        skipped,
    };
    Ok((examples, report))
}

/// Write the canonical dataset as a `text,labels` CSV with a UTF-8 signature.
pub fn write_canonical_csv(path: &Path, examples: &[Example]) -> Result<()> {
    let mut buffer = Vec::with_capacity(examples.len() * 32);
    buffer.extend_from_slice(UTF8_BOM.as_bytes());

    let mut writer = csv::Writer::from_writer(&mut buffer);
    writer
        .write_record(["text", "labels"])
        .map_err(|e| csv_error(path, e))?;
    for example in examples {
        let label = example.label.as_u8().to_string();
        writer
            .write_record([example.text.as_str(), label.as_str()])
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush()?;
    drop(writer);

    fs::write(path, buffer)?;
    Ok(())
}

/// Read a canonical `text,labels` CSV back into memory.
pub fn read_canonical_csv(path: &Path) -> Result<Vec<Example>> {
    if !path.exists() {
        return Err(Error::CorpusNotFound(path.to_path_buf()));
    }

    let content = fs::read(path)?;
    let content = content.strip_prefix(UTF8_BOM.as_bytes()).unwrap_or(&content);

    let mut reader = csv::Reader::from_reader(content);
    let mut examples = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| csv_error(path, e))?;
        // Line number after the header row; multi-line records make this
        // approximate but it still points at the right record.
        let context = || format!("{}:{}", path.display(), index + 2);

        let text = record
            .get(0)
            .ok_or_else(|| Error::corpus_parse(format!("missing text field at {}", context())))?;
        let label_field = record
            .get(1)
            .ok_or_else(|| Error::corpus_parse(format!("missing label field at {}", context())))?;

        let value: u8 = label_field
            .trim()
            .parse()
            .map_err(|_| Error::malformed_label(label_field, context()))?;
        let label = Label::from_u8(value)
            .map_err(|_| Error::malformed_label(label_field, context()))?;

        examples.push(Example::new(text, label));
    }

    Ok(examples)
}

fn csv_error(path: &Path, err: csv::Error) -> Error {
    Error::corpus_parse(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn raw_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_raw_tsv() {
        let file = raw_file("document\tlabel\n안녕하세요\t8\n혐오 문장\t2,5\n");
        let annotations = read_raw_tsv(file.path()).unwrap();

        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].text, "안녕하세요");
        assert_eq!(annotations[0].raw_labels, vec!["8"]);
        assert_eq!(annotations[1].raw_labels, vec!["2", "5"]);
    }

    #[test]
    fn test_read_raw_tsv_missing_file() {
        let err = read_raw_tsv(Path::new("/nonexistent/kmhas_train.txt")).unwrap_err();
        assert!(matches!(err, Error::CorpusNotFound(_)));
    }

    #[test]
    fn test_build_canonical_preserves_source_order() {
        let a = vec![
            RawAnnotation {
                text: "first".into(),
                raw_labels: vec!["8".into()],
            },
            RawAnnotation {
                text: "second".into(),
                raw_labels: vec!["1".into()],
            },
        ];
        let b = vec![RawAnnotation {
            text: "third".into(),
            raw_labels: vec!["8".into(), "3".into()],
        }];

        let (examples, report) =
            build_canonical(&[a, b], MalformedLabelPolicy::Abort).unwrap();

        assert_eq!(report.kept, 3);
        assert_eq!(report.skipped, 0);
        let texts: Vec<&str> = examples.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(examples[0].label, Label::Clean);
        assert_eq!(examples[1].label, Label::Hate);
        assert_eq!(examples[2].label, Label::Hate);
    }

    #[test]
    fn test_build_canonical_skip_policy() {
        let source = vec![
            RawAnnotation {
                text: "good".into(),
                raw_labels: vec!["8".into()],
            },
            RawAnnotation {
                text: "bad".into(),
                raw_labels: vec!["not-a-code".into()],
            },
        ];

        let err = build_canonical(
            std::slice::from_ref(&vec![source[1].clone()]),
            MalformedLabelPolicy::Abort,
        );
        assert!(err.is_err());

        let (examples, report) =
            build_canonical(&[source], MalformedLabelPolicy::SkipAndCount).unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_canonical_csv_roundtrip() {
        let examples = vec![
            Example::new("plain text", Label::Clean),
            Example::new("text, with commas", Label::Hate),
            Example::new("he said \"no\"", Label::Hate),
            Example::new("한국어 문장입니다", Label::Clean),
        ];

        let file = NamedTempFile::new().unwrap();
        write_canonical_csv(file.path(), &examples).unwrap();

        let written = std::fs::read(file.path()).unwrap();
        // UTF-8 signature for spreadsheet compatibility
        assert_eq!(&written[..3], &[0xEF, 0xBB, 0xBF]);

        let back = read_canonical_csv(file.path()).unwrap();
        assert_eq!(back, examples);
    }

    #[test]
    fn test_canonical_csv_roundtrips_embedded_newlines() {
        let examples = vec![
            Example::new("첫 줄\n둘째 줄", Label::Hate),
            Example::new("line with \"quotes\",\r\nand commas", Label::Clean),
            Example::new("plain", Label::Clean),
        ];

        let file = NamedTempFile::new().unwrap();
        write_canonical_csv(file.path(), &examples).unwrap();

        let back = read_canonical_csv(file.path()).unwrap();
        assert_eq!(back, examples);
    }

    #[test]
    fn test_read_canonical_csv_rejects_ragged_row() {
        let file = raw_file("text,labels\nhello,1,extra\n");
        let err = read_canonical_csv(file.path()).unwrap_err();
        assert!(matches!(err, Error::CorpusParse(_)));
    }

    #[test]
    fn test_read_canonical_csv_rejects_bad_label() {
        let file = raw_file("text,labels\nhello,2\n");
        let err = read_canonical_csv(file.path()).unwrap_err();
        assert!(matches!(err, Error::MalformedLabel { .. }));
    }
}
