//! Region rewrite
//!
//! Replaces found tokens on one page: every insertion is planned first, all
//! erasures are applied as one batch, then every value is drawn. No insertion
//! can therefore be removed by the erasure of another token.

use crate::discovery::{ReplacementInstance, SourceFont};
use crate::observer::GenerationObserver;
use crate::options::{EngineOptions, InsertMode};
use crate::Result;
use pdf_core::{
    layout_text, BoxFit, Erasure, PdfDocument, Rect, StandardFont, TextStyle, TextTarget,
};

/// Font choice for one instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontChoice {
    pub font: StandardFont,
    /// The original font was unknown and the default was used
    pub fallback: bool,
}

/// Pick the standard font standing in for the token's original font
pub fn choose_font(source: Option<&SourceFont>, options: &EngineOptions) -> FontChoice {
    let default = StandardFont::from(options.default_font);
    match source {
        Some(src) if options.use_source_typeface && !src.name.is_empty() => FontChoice {
            font: StandardFont::substitute_for(&src.name),
            fallback: false,
        },
        Some(src) if !src.name.is_empty() => FontChoice {
            font: default,
            fallback: false,
        },
        _ => FontChoice {
            font: default,
            fallback: true,
        },
    }
}

/// Font sizes to try, largest first
///
/// With a known source size the search starts there (never above the
/// largest configured size) and continues with the smaller configured sizes.
pub fn size_ladder(source_size: Option<f64>, options: &EngineOptions) -> Vec<f64> {
    let mut ladder = options.font_sizes.clone();
    ladder.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    ladder.dedup();

    let source = source_size.filter(|s| options.use_source_font_size && s.is_finite() && *s > 0.0);
    if let (Some(size), Some(&max)) = (source, ladder.first()) {
        let start = size.min(max);
        let mut refined = vec![start];
        refined.extend(ladder.into_iter().filter(|s| *s < start));
        return refined;
    }
    ladder
}

/// Region the value is fitted into
pub fn insertion_box(instance: &ReplacementInstance, page_box: &Rect, options: &EngineOptions) -> Rect {
    let right = (instance.rect.x0 + options.region_extension).min(page_box.x1);
    Rect::new(
        instance.rect.x0,
        instance.rect.y0 - options.erase_margin,
        right.max(instance.rect.x1),
        instance.rect.y1 + options.erase_margin,
    )
}

/// Planned drawing of one value
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedInsertion {
    pub target: TextTarget,
    pub style: TextStyle,
    pub fit: BoxFit,
    /// No ladder size fitted; the smallest size is used
    pub fit_failed: bool,
    pub font_fallback: bool,
}

fn target_for(instance: &ReplacementInstance, region: Rect, mode: InsertMode) -> TextTarget {
    match mode {
        InsertMode::Box => TextTarget::Box {
            rect: region,
            baseline: Some(instance.baseline),
        },
        InsertMode::Point => TextTarget::Point {
            x: region.x0,
            y: instance.baseline,
            max_width: Some(region.width()),
        },
    }
}

/// Find the largest ladder size at which the value fits
pub fn plan_insertion(
    instance: &ReplacementInstance,
    page_box: &Rect,
    options: &EngineOptions,
) -> PlannedInsertion {
    let choice = choose_font(instance.source_font.as_ref(), options);
    let region = insertion_box(instance, page_box, options);
    let target = target_for(instance, region, options.insert_mode);
    let ladder = size_ladder(instance.source_font.as_ref().map(|f| f.size), options);

    let mut last = None;
    for size in ladder {
        let style = TextStyle {
            line_height: options.line_height,
            ..TextStyle::new(choice.font, size)
        };
        let (_, fit) = layout_text(&instance.value, &target, &style);
        if fit.fits {
            return PlannedInsertion {
                target,
                style,
                fit,
                fit_failed: false,
                font_fallback: choice.fallback,
            };
        }
        last = Some((style, fit));
    }

    // The ladder is never empty for validated options
    let (style, fit) = last.unwrap_or_else(|| {
        let style = TextStyle::new(choice.font, 6.0);
        (style, layout_text(&instance.value, &target, &style).1)
    });
    PlannedInsertion {
        target,
        style,
        fit,
        fit_failed: true,
        font_fallback: choice.fallback,
    }
}

/// What happened on one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageOutcome {
    pub replacements: usize,
    pub glyphs_removed: usize,
    pub fit_failures: Vec<(String, f64)>,
    pub font_fallbacks: usize,
}

/// Replace every instance found on a page
pub fn rewrite_page(
    doc: &mut PdfDocument,
    page: usize,
    instances: &[ReplacementInstance],
    options: &EngineOptions,
    observer: &dyn GenerationObserver,
) -> Result<PageOutcome> {
    let mut outcome = PageOutcome::default();
    if instances.is_empty() {
        return Ok(outcome);
    }

    let page_box = doc.page_box(page)?;
    let plans: Vec<PlannedInsertion> = instances
        .iter()
        .map(|instance| plan_insertion(instance, &page_box, options))
        .collect();

    let erasures: Vec<Erasure> = instances
        .iter()
        .zip(&plans)
        .map(|(instance, plan)| {
            let erasure = Erasure::new(instance.rect);
            if options.shift_trailing_text {
                erasure.with_replacement_width(plan.fit.first_line_width)
            } else {
                erasure
            }
        })
        .collect();

    // Fonts are registered first so nothing can fail once content is erased
    for (instance, plan) in instances.iter().zip(&plans) {
        if !instance.value.trim().is_empty() {
            doc.get_or_create_font_ref(plan.style.font, page)?;
        }
    }

    let erased = doc.erase(page, &erasures)?;
    outcome.glyphs_removed = erased.glyphs_removed;

    for (i, (instance, plan)) in instances.iter().zip(&plans).enumerate() {
        if erased.removed_per_erasure.get(i) == Some(&0) {
            log::warn!(
                "Page {page}: no glyphs of '{}' could be removed",
                instance.surface_form
            );
        }

        let shift = erased.shifts.get(i).copied().unwrap_or(0.0);
        let target = shifted(plan.target, shift);
        doc.insert_text(page, &target, &instance.value, &plan.style)?;

        outcome.replacements += 1;
        observer.replaced(instance, plan.style.font, plan.style.size);
        if plan.fit_failed {
            outcome
                .fit_failures
                .push((instance.identifier.clone(), plan.style.size));
            observer.fit_failed(instance, plan.style.size);
        }
        if plan.font_fallback {
            outcome.font_fallbacks += 1;
            observer.font_fallback(instance);
        }
    }

    Ok(outcome)
}

fn shifted(target: TextTarget, dx: f64) -> TextTarget {
    match target {
        TextTarget::Point { x, y, max_width } => TextTarget::Point {
            x: x + dx,
            y,
            max_width,
        },
        TextTarget::Box { rect, baseline } => TextTarget::Box {
            rect: rect.shift_x(dx),
            baseline,
        },
    }
}
