//! Error types for chapters_docx.

use std::io;
use thiserror::Error;

/// Result type alias for chapters_docx operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors. These only come from the I/O collaborators; problems inside a
/// chapter body are reported as [`crate::diagnostics::Diagnostic`]s instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading input or writing the package.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The CSV reader could not be constructed or the header row is unreadable.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The input contained no usable data rows.
    #[error("no chapter rows in {0}")]
    EmptyInput(String),

    /// Error writing the ZIP container.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Error serializing the plan dump.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
