//! Document generation

use crate::discovery::{self, ReplacementInstance};
use crate::observer::{GenerationObserver, LogObserver};
use crate::options::EngineOptions;
use crate::request::SubstitutionRequest;
use crate::rewrite;
use crate::token::PlaceholderToken;
use crate::{FillError, Result};
use pdf_core::{PdfDocument, SaveOptions};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A value drawn at the smallest size without fitting its region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitFailure {
    pub page: usize,
    pub identifier: String,
    pub font_size: f64,
}

/// A page left untouched because it could not be processed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageFailure {
    pub page: usize,
    pub reason: String,
}

/// Summary of one generation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationReport {
    pub output_path: PathBuf,
    pub page_count: usize,
    /// Token occurrences replaced, empty values included
    pub replacements_made: usize,
    /// Requested identifiers found on no page, sorted
    pub unmatched_identifiers: Vec<String>,
    pub fit_failures: Vec<FitFailure>,
    pub page_failures: Vec<PageFailure>,
    /// Occurrences drawn with the default font
    pub font_fallbacks: usize,
}

impl GenerationReport {
    /// Every value fitted and every page was processed
    pub fn is_clean(&self) -> bool {
        self.fit_failures.is_empty() && self.page_failures.is_empty()
    }
}

/// Fills placeholder templates
#[derive(Clone)]
pub struct PlaceholderEngine {
    options: EngineOptions,
    observer: Arc<dyn GenerationObserver>,
}

impl Default for PlaceholderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlaceholderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceholderEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl PlaceholderEngine {
    /// Engine with default options, logging through the `log` facade
    pub fn new() -> Self {
        Self {
            options: EngineOptions::default(),
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn GenerationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Fill `template` with `request` and write the result to `output`
    ///
    /// The template file is never modified. Pages that fail are left as they
    /// were and reported; only a template that cannot be opened or an output
    /// that cannot be written aborts the run.
    pub fn generate(
        &self,
        template: impl AsRef<Path>,
        request: &SubstitutionRequest,
        output: impl AsRef<Path>,
    ) -> Result<GenerationReport> {
        let template = template.as_ref();
        let output = output.as_ref();
        self.options.validate()?;

        if same_file(template, output) {
            return Err(FillError::OutputIsTemplate(output.to_path_buf()));
        }

        let mut doc = PdfDocument::open(template).map_err(|source| FillError::TemplateOpen {
            path: template.to_path_buf(),
            source,
        })?;

        let mut report = self.fill(&mut doc, request);
        report.output_path = output.to_path_buf();

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let save: SaveOptions = self.options.save.into();
        doc.save(output, &save).map_err(|source| FillError::Save {
            path: output.to_path_buf(),
            source,
        })?;

        self.observer.finished(&report);
        Ok(report)
    }

    /// Replace placeholders in an open document
    ///
    /// The returned report has an empty `output_path`.
    pub fn fill(&self, doc: &mut PdfDocument, request: &SubstitutionRequest) -> GenerationReport {
        let tokens: Vec<(PlaceholderToken, &str)> = request
            .iter()
            .map(|(id, value)| (PlaceholderToken::new(id, self.options.ligatures), value))
            .collect();

        let mut report = GenerationReport {
            page_count: doc.page_count(),
            ..GenerationReport::default()
        };
        let mut matched: HashSet<String> = HashSet::new();

        for page in 1..=doc.page_count() {
            match self.fill_page(doc, page, &tokens, &mut report) {
                Ok(instances) => {
                    matched.extend(instances.into_iter().map(|i| i.identifier));
                }
                Err(e) => {
                    let reason = e.to_string();
                    self.observer.page_failed(page, &reason);
                    report.page_failures.push(PageFailure { page, reason });
                }
            }
        }

        report.unmatched_identifiers = request
            .identifiers()
            .filter(|id| !matched.contains(*id))
            .map(str::to_string)
            .collect();
        for identifier in &report.unmatched_identifiers {
            self.observer.unmatched(identifier);
        }

        report
    }

    fn fill_page(
        &self,
        doc: &mut PdfDocument,
        page: usize,
        tokens: &[(PlaceholderToken, &str)],
        report: &mut GenerationReport,
    ) -> Result<Vec<ReplacementInstance>> {
        let layout = doc.text_layout(page)?;
        let instances = discovery::discover(&layout, page, tokens.iter().map(|(t, v)| (t, *v)));
        self.observer.page_started(page, instances.len());
        if instances.is_empty() {
            return Ok(instances);
        }

        let outcome =
            rewrite::rewrite_page(doc, page, &instances, &self.options, self.observer.as_ref())?;
        report.replacements_made += outcome.replacements;
        report.font_fallbacks += outcome.font_fallbacks;
        report
            .fit_failures
            .extend(outcome.fit_failures.into_iter().map(|(identifier, font_size)| FitFailure {
                page,
                identifier,
                font_size,
            }));
        Ok(instances)
    }

    /// Placeholder identifiers in a PDF, sorted and deduplicated
    pub fn list_fields(&self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        let doc = PdfDocument::open(path).map_err(|source| FillError::TemplateOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(discovery::list_fields(&doc))
    }

    /// Placeholders still present in a PDF
    ///
    /// With a request, only identifiers the request covers are reported, so a
    /// generated document can be checked for values that were not applied.
    pub fn remaining_fields(
        &self,
        path: impl AsRef<Path>,
        request: Option<&SubstitutionRequest>,
    ) -> Result<Vec<String>> {
        let fields = self.list_fields(path)?;
        Ok(match request {
            Some(request) => fields.into_iter().filter(|f| request.contains(f)).collect(),
            None => fields,
        })
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
