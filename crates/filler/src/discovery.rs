//! Token discovery
//!
//! Finds where placeholder tokens are rendered on a page, and enumerates the
//! placeholders a document defines.

use crate::token::{extract_identifiers, PlaceholderToken};
use pdf_core::{PdfDocument, Rect, TextLayout};
use std::collections::{BTreeSet, HashSet};

/// Font of the text a token was rendered with
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFont {
    pub name: String,
    pub size: f64,
}

/// One token occurrence paired with its replacement value
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementInstance {
    /// 1-based page number
    pub page: usize,
    /// Union of the token's glyph boxes
    pub rect: Rect,
    pub baseline: f64,
    /// The exact string that matched (canonical or a ligature variant)
    pub surface_form: String,
    pub identifier: String,
    pub value: String,
    pub source_font: Option<SourceFont>,
}

/// Locate every surface form of every token on a page
///
/// Instances are returned token by token, each token's occurrences in the
/// order found. A glyph belongs to at most one instance.
pub fn discover<'a, I>(layout: &TextLayout, page: usize, tokens: I) -> Vec<ReplacementInstance>
where
    I: IntoIterator<Item = (&'a PlaceholderToken, &'a str)>,
{
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut instances = Vec::new();

    for (token, value) in tokens {
        for form in token.surface_forms() {
            for found in layout.find(form) {
                if found.glyphs.iter().any(|g| claimed.contains(g)) {
                    continue;
                }
                claimed.extend(found.glyphs.iter().copied());

                let source_font = layout.run_of(&found).map(|run| SourceFont {
                    name: run.font_name.clone(),
                    size: run.font_size,
                });
                log::debug!(
                    "Page {page}: found '{form}' at ({:.1}, {:.1})",
                    found.rect.x0,
                    found.baseline
                );
                instances.push(ReplacementInstance {
                    page,
                    rect: found.rect,
                    baseline: found.baseline,
                    surface_form: form.clone(),
                    identifier: token.identifier().to_string(),
                    value: value.to_string(),
                    source_font,
                });
            }
        }
    }

    instances
}

/// Sorted, deduplicated identifiers of every placeholder in a document
///
/// Pages whose text cannot be extracted are skipped with a warning.
pub fn list_fields(doc: &PdfDocument) -> Vec<String> {
    let mut fields = BTreeSet::new();
    for page in 1..=doc.page_count() {
        match doc.extract_text(page) {
            Ok(text) => fields.extend(extract_identifiers(&text)),
            Err(e) => log::warn!("Page {page}: cannot read text: {e}"),
        }
    }
    fields.into_iter().collect()
}
