//! PDF Core - Low-level PDF text manipulation
//!
//! This crate provides functionality for:
//! - Opening and saving PDF documents
//! - Extracting positioned text and searching it
//! - Removing text glyphs from content streams without disturbing their neighbours
//! - Inserting text with the standard Type 1 fonts, wrapped to fit a box
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::{Erasure, PdfDocument, SaveOptions, StandardFont, TextStyle, TextTarget};
//!
//! let mut doc = PdfDocument::open("template.pdf")?;
//! let found = doc.find_text(1, "{name}")?;
//! let erasures: Vec<_> = found.iter().map(|m| Erasure::new(m.rect)).collect();
//! doc.erase(1, &erasures)?;
//! let target = TextTarget::Point { x: found[0].rect.x0, y: found[0].baseline, max_width: None };
//! doc.insert_text(1, &target, "Ion Popescu", &TextStyle::new(StandardFont::Helvetica, 11.0))?;
//! doc.save("output.pdf", &SaveOptions::default())?;
//! ```

mod cmap;
mod document;
mod font;
mod geometry;
mod layout;
mod redact;
mod text;

pub use cmap::ToUnicodeCMap;
pub use document::{PdfDocument, SaveOptions};
pub use font::{strip_subset_prefix, FontWeight, StandardFont, Typeface};
pub use geometry::{Matrix, Rect};
pub use layout::{Glyph, TextLayout, TextMatch, TextRun};
pub use redact::{Erasure, ErasureOutcome};
pub use text::{
    encode_hex, generate_text_operators, layout_text, wrap_text, BoxFit, Color, PlacedLine,
    TextRenderContext, TextStyle, TextTarget,
};

use thiserror::Error;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Invalid page number: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;
