//! Non-fatal problems collected while compiling a batch.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A CSV row was unreadable or incomplete; the row is skipped.
    InputRecordMalformed,
    /// Inline tags do not balance; the markup is recovered or flattened.
    MarkupUnparseable,
    /// An image could not be fetched or decoded; the image is omitted.
    ImageFetchFailed,
    /// A character reference names nothing; it is left literal.
    EntityUnresolvable,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InputRecordMalformed => "malformed record",
            Self::MarkupUnparseable => "unparseable markup",
            Self::ImageFetchFailed => "image fetch failed",
            Self::EntityUnresolvable => "unresolvable entity",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Chapter id, or `row N` for ingestion problems.
    pub record: String,
    /// The URL or markup fragment at fault.
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.kind, self.record, self.subject, self.message
        )
    }
}

/// Ordered list of diagnostics for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Report {
    items: Vec<Diagnostic>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic and logs it at warn level.
    pub fn push(
        &mut self,
        kind: DiagnosticKind,
        record: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) {
        let d = Diagnostic {
            kind,
            record: record.into(),
            subject: truncate_subject(subject.into()),
            message: message.into(),
        };
        log::warn!("{d}");
        self.items.push(d);
    }

    /// Appends already-logged diagnostics from another report.
    pub fn extend(&mut self, other: Report) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }
}

const MAX_SUBJECT_CHARS: usize = 120;

fn truncate_subject(s: String) -> String {
    if s.chars().count() <= MAX_SUBJECT_CHARS {
        return s;
    }
    let mut out: String = s.chars().take(MAX_SUBJECT_CHARS).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_kind() {
        let mut r = Report::new();
        r.push(DiagnosticKind::ImageFetchFailed, "1", "http://x/a.png", "HTTP 404");
        r.push(DiagnosticKind::EntityUnresolvable, "1", "&bogus;", "unknown name");
        r.push(DiagnosticKind::ImageFetchFailed, "2", "http://x/b.png", "timeout");
        assert_eq!(r.len(), 3);
        assert_eq!(r.count(DiagnosticKind::ImageFetchFailed), 2);
        assert_eq!(r.count(DiagnosticKind::MarkupUnparseable), 0);
    }

    #[test]
    fn long_fragments_are_shortened() {
        let mut r = Report::new();
        r.push(DiagnosticKind::MarkupUnparseable, "1", "x".repeat(500), "unbalanced");
        let d = r.iter().next().unwrap();
        assert_eq!(d.subject.chars().count(), MAX_SUBJECT_CHARS + 1);
        assert!(d.subject.ends_with('…'));
    }
}
