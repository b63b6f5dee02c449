//! Generation progress hooks
//!
//! The engine reports what it does through a [`GenerationObserver`]. Every
//! method has an empty default, so an implementation only overrides the events
//! it cares about.

use crate::discovery::ReplacementInstance;
use crate::engine::GenerationReport;
use pdf_core::StandardFont;

/// Receives events while a document is generated
pub trait GenerationObserver: Send + Sync {
    /// A page is about to be searched; `instances` tokens were found on it
    fn page_started(&self, page: usize, instances: usize) {
        let _ = (page, instances);
    }

    /// A token was replaced
    fn replaced(&self, instance: &ReplacementInstance, font: StandardFont, size: f64) {
        let _ = (instance, font, size);
    }

    /// A value did not fit its region at any size; it was drawn at `size`
    fn fit_failed(&self, instance: &ReplacementInstance, size: f64) {
        let _ = (instance, size);
    }

    /// The token's font was unknown; the default font was used
    fn font_fallback(&self, instance: &ReplacementInstance) {
        let _ = instance;
    }

    /// A page could not be processed and was left as it was
    fn page_failed(&self, page: usize, reason: &str) {
        let _ = (page, reason);
    }

    /// A requested identifier was not found anywhere in the document
    fn unmatched(&self, identifier: &str) {
        let _ = identifier;
    }

    /// The output was written
    fn finished(&self, report: &GenerationReport) {
        let _ = report;
    }
}

/// Ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl GenerationObserver for NoopObserver {}

/// Forwards events to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl GenerationObserver for LogObserver {
    fn page_started(&self, page: usize, instances: usize) {
        log::debug!("Page {page}: {instances} placeholder occurrence(s)");
    }

    fn replaced(&self, instance: &ReplacementInstance, font: StandardFont, size: f64) {
        log::info!(
            "Page {}: {} -> {:?} ({}, {size}pt)",
            instance.page,
            instance.surface_form,
            instance.value,
            font.base_font_name()
        );
    }

    fn fit_failed(&self, instance: &ReplacementInstance, size: f64) {
        log::warn!(
            "Page {}: value for '{}' does not fit its region, drawn at {size}pt",
            instance.page,
            instance.identifier
        );
    }

    fn font_fallback(&self, instance: &ReplacementInstance) {
        log::warn!(
            "Page {}: font of '{}' unknown, using default font",
            instance.page,
            instance.identifier
        );
    }

    fn page_failed(&self, page: usize, reason: &str) {
        log::warn!("Page {page} skipped: {reason}");
    }

    fn unmatched(&self, identifier: &str) {
        log::warn!("Placeholder '{identifier}' not found in template");
    }

    fn finished(&self, report: &GenerationReport) {
        log::info!(
            "Wrote {} ({} replacement(s), {} page(s))",
            report.output_path.display(),
            report.replacements_made,
            report.page_count
        );
    }
}
