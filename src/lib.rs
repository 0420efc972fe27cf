//! # chapters_docx
//!
//! Compiles chapter records whose bodies are editor-produced HTML fragments
//! into a word-processor document.
//!
//! ```no_run
//! use chapters_docx::{ingest, Assembler, CompileOptions, HttpFetcher, PackageMetadata};
//!
//! fn main() -> anyhow::Result<()> {
//!     let input = ingest::read_chapters("chapters.csv")?;
//!     let options = CompileOptions::default();
//!     let fetcher = HttpFetcher::new(&options.fetch)?;
//!     let conversion = Assembler::new(options, &fetcher).assemble(&input.records);
//!     chapters_docx::write_docx_file("chapters.docx", &conversion.plan, &PackageMetadata::default())?;
//!     Ok(())
//! }
//! ```

pub mod assemble;
pub mod diagnostics;
pub mod docx;
pub mod entities;
pub mod error;
pub mod image;
pub mod ingest;
pub mod json;
pub mod markup;
pub mod model;
pub mod options;
pub mod runs;
pub mod segment;
pub mod style;

pub use assemble::{Assembler, BuildContext, Conversion};
pub use diagnostics::{Diagnostic, DiagnosticKind, Report};
pub use docx::{write_docx, write_docx_file, PackageMetadata};
pub use error::{Error, Result};
pub use crate::image::{FetchedImage, FigureMarkup, HttpFetcher, ImageError, ImageFetcher, ImageResolver};
pub use ingest::{read_chapters, read_chapters_from, Ingested};
pub use json::plan_to_json;
pub use model::{
    Block, ChapterRecord, DocumentPlan, ImageAlignment, ImageAsset, Justification, Paragraph,
    ParagraphRole, RgbColor, Run, Segment, StyleAttributes,
};
pub use options::{CompileOptions, FetchOptions};
pub use style::{StyleCapabilities, StyleResolver};
