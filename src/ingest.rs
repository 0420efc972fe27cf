//! CSV chapter ingestion.

use crate::diagnostics::{DiagnosticKind, Report};
use crate::error::{Error, Result};
use crate::model::ChapterRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Rows that parsed, plus a diagnostic for every row that did not.
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub records: Vec<ChapterRecord>,
    pub diagnostics: Report,
}

pub fn read_chapters(path: impl AsRef<Path>) -> Result<Ingested> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_chapters_named(file, &path.display().to_string())
}

/// Reads `id,title,body` rows after a header row.
pub fn read_chapters_from<R: Read>(reader: R) -> Result<Ingested> {
    read_chapters_named(reader, "input")
}

fn read_chapters_named<R: Read>(reader: R, name: &str) -> Result<Ingested> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    // Surface a broken header as a fatal error rather than a row diagnostic.
    rdr.headers()?;

    let mut out = Ingested::default();
    let mut rows = 0usize;
    for (i, row) in rdr.records().enumerate() {
        rows += 1;
        // Header is line 1.
        let row_label = format!("row {}", i + 2);
        let record = match row {
            Ok(r) => r,
            Err(e) => {
                out.diagnostics.push(
                    DiagnosticKind::InputRecordMalformed,
                    row_label,
                    "",
                    e.to_string(),
                );
                continue;
            }
        };
        let fields: Vec<&str> = record.iter().collect();
        match ChapterRecord::from_fields(&fields) {
            Ok(r) => out.records.push(r),
            Err(msg) => out.diagnostics.push(
                DiagnosticKind::InputRecordMalformed,
                row_label,
                fields.first().copied().unwrap_or(""),
                msg,
            ),
        }
    }

    if rows == 0 {
        return Err(Error::EmptyInput(name.to_string()));
    }
    log::info!(
        "read {} chapters from {} ({} rows skipped)",
        out.records.len(),
        name,
        out.diagnostics.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rows_and_skips_malformed_ones() {
        let csv = "id,title,body\n\
                   1,First,\"<p>a, b</p>\"\n\
                   2,Second\n\
                   3,,<p>x</p>\n\
                   4,Fourth,\"<p>multi\nline</p>\",extra\n";
        let got = read_chapters_from(csv.as_bytes()).unwrap();
        let ids: Vec<_> = got.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "4"]);
        assert_eq!(got.records[0].body, "<p>a, b</p>");
        assert_eq!(got.records[1].body, "<p>multi\nline</p>");
        assert_eq!(got.diagnostics.count(DiagnosticKind::InputRecordMalformed), 2);
        let rows: Vec<_> = got.diagnostics.iter().map(|d| d.record.as_str()).collect();
        assert_eq!(rows, vec!["row 3", "row 4"]);
    }

    #[test]
    fn header_only_is_an_error() {
        let err = read_chapters_from("id,title,body\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::EmptyInput(_)));
    }

    #[test]
    fn all_rows_malformed_is_not_fatal() {
        let got = read_chapters_from("id,title,body\n1,,\n".as_bytes()).unwrap();
        assert!(got.records.is_empty());
        assert_eq!(got.diagnostics.len(), 1);
    }
}
