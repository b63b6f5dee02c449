//! Filler - Placeholder substitution for PDF templates
//!
//! A template is an ordinary PDF whose text contains `{identifier}` tokens.
//! This crate provides:
//! - Discovery of tokens, including forms rendered with "fi"/"fl" ligatures
//! - Removal of the token glyphs and insertion of the replacement value in a
//!   matching standard font, shrunk until it fits the token's region
//! - Per-run reports of unmatched placeholders, values that did not fit and
//!   pages that could not be processed
//!
//! # Example
//!
//! ```ignore
//! use filler::{PlaceholderEngine, SubstitutionRequest};
//!
//! let request = SubstitutionRequest::new()
//!     .with("no", "001/2025")
//!     .with("contact_last_name", "Popescu");
//! let report = PlaceholderEngine::new().generate("template.pdf", &request, "out.pdf")?;
//! println!("{} replacements", report.replacements_made);
//! ```

pub mod discovery;
pub mod engine;
pub mod observer;
pub mod options;
pub mod request;
pub mod rewrite;
pub mod token;

pub use discovery::{ReplacementInstance, SourceFont};
pub use engine::{FitFailure, GenerationReport, PageFailure, PlaceholderEngine};
pub use observer::{GenerationObserver, LogObserver, NoopObserver};
pub use options::{DefaultFont, EngineOptions, InsertMode, SaveSettings};
pub use request::SubstitutionRequest;
pub use token::{LigaturePolicy, PlaceholderToken};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while filling a template
#[derive(Debug, Error)]
pub enum FillError {
    #[error("Failed to open template {path}: {source}")]
    TemplateOpen {
        path: PathBuf,
        #[source]
        source: pdf_core::PdfError,
    },

    #[error("Failed to write {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: pdf_core::PdfError,
    },

    #[error("Output path is the template itself: {0}")]
    OutputIsTemplate(PathBuf),

    #[error("Invalid substitution request: {0}")]
    Request(String),

    #[error("Invalid options: {0}")]
    Options(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] pdf_core::PdfError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fill operations
pub type Result<T> = std::result::Result<T, FillError>;

/// Fill `template` with `request` using default options
pub fn generate(
    template: impl AsRef<Path>,
    request: &SubstitutionRequest,
    output: impl AsRef<Path>,
) -> Result<GenerationReport> {
    PlaceholderEngine::new().generate(template, request, output)
}

/// Placeholder identifiers in a PDF, sorted and deduplicated
pub fn list_fields(path: impl AsRef<Path>) -> Result<Vec<String>> {
    PlaceholderEngine::new().list_fields(path)
}
