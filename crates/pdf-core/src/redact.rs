//! Glyph-level text removal
//!
//! Removes glyphs from text-showing operators while keeping every other glyph
//! where it was. Each affected operator is rewritten as a `TJ` array in which a
//! removed glyph becomes a numeric adjustment equal to its advance, so the text
//! position after the operator is unchanged unless a shift is requested.

use crate::geometry::Rect;
use crate::layout::{ShowPiece, TextLayout};
use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use std::collections::HashMap;

/// One region to clear
#[derive(Debug, Clone, PartialEq)]
pub struct Erasure {
    /// Glyphs whose box centre lies inside this rectangle are removed
    pub rect: Rect,
    /// Width in points the removed text should occupy afterwards.
    ///
    /// When set, text following the removed glyphs in the same operator moves
    /// by the difference between this width and the removed advance. When
    /// `None` the removed advance is kept as is.
    pub replacement_width: Option<f64>,
}

impl Erasure {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            replacement_width: None,
        }
    }

    pub fn with_replacement_width(mut self, width: f64) -> Self {
        self.replacement_width = Some(width);
        self
    }
}

/// Result of applying a batch of erasures to one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErasureOutcome {
    /// Total glyphs removed
    pub glyphs_removed: usize,
    /// Glyphs removed per erasure, in input order
    pub removed_per_erasure: Vec<usize>,
    /// Horizontal displacement of each erasure's region caused by earlier
    /// width changes in the same operator, in input order
    pub shifts: Vec<f64>,
}

#[derive(Default)]
struct TjBuilder {
    items: Vec<Object>,
    bytes: Vec<u8>,
    adjust: f64,
}

impl TjBuilder {
    fn push_bytes(&mut self, bytes: &[u8]) {
        if self.adjust.abs() > 1e-6 {
            self.items.push(Object::Real(self.adjust as f32));
        }
        self.adjust = 0.0;
        self.bytes.extend_from_slice(bytes);
    }

    fn push_adjust(&mut self, n: f64) {
        if !self.bytes.is_empty() {
            self.items.push(Object::String(
                std::mem::take(&mut self.bytes),
                StringFormat::Hexadecimal,
            ));
        }
        self.adjust += n;
    }

    fn finish(mut self) -> Object {
        self.push_adjust(0.0);
        if self.adjust.abs() > 1e-6 {
            self.items.push(Object::Real(self.adjust as f32));
        }
        Object::Array(self.items)
    }
}

/// Glyphs of one erasure met consecutively in an operator
struct Group {
    owner: usize,
    advance: f64,
}

/// Remove the glyphs covered by `erasures` from `operations`.
///
/// `layout` must have been built from exactly these operations. A glyph is
/// claimed by the first erasure whose rectangle contains its centre, so a
/// match box removes its own glyphs and never a narrow neighbour.
pub(crate) fn apply_erasures(
    operations: &mut Vec<Operation>,
    layout: &TextLayout,
    erasures: &[Erasure],
) -> ErasureOutcome {
    let mut outcome = ErasureOutcome {
        glyphs_removed: 0,
        removed_per_erasure: vec![0; erasures.len()],
        shifts: vec![0.0; erasures.len()],
    };
    if erasures.is_empty() {
        return outcome;
    }

    let owners: Vec<Option<usize>> = layout
        .glyphs
        .iter()
        .map(|g| {
            let (x, y) = g.bbox.center();
            erasures.iter().position(|e| e.rect.contains_point(x, y))
        })
        .collect();

    let mut seen = vec![false; erasures.len()];
    let mut resized = vec![false; erasures.len()];
    let mut rewritten: HashMap<usize, Vec<Operation>> = HashMap::new();

    for show in &layout.shows {
        let touched = show.pieces.iter().any(|p| match p {
            ShowPiece::Glyph { glyph, .. } => owners[*glyph].is_some(),
            ShowPiece::Adjust(_) => false,
        });
        if !touched {
            continue;
        }

        let mut tj = TjBuilder::default();
        let mut group: Option<Group> = None;
        let mut shift = 0.0;

        let mut close = |group: &mut Option<Group>, tj: &mut TjBuilder, shift: &mut f64| {
            if let Some(g) = group.take() {
                let mut advance = g.advance;
                if !resized[g.owner] {
                    resized[g.owner] = true;
                    if let Some(width) = erasures[g.owner].replacement_width {
                        if show.unit.abs() > f64::EPSILON {
                            let wanted = width / show.unit;
                            *shift += (wanted - advance) * show.unit;
                            advance = wanted;
                        }
                    }
                }
                tj.push_adjust(-advance);
            }
        };

        for piece in &show.pieces {
            match piece {
                ShowPiece::Adjust(n) => match group.as_mut() {
                    Some(g) => g.advance -= n,
                    None => tj.push_adjust(*n),
                },
                ShowPiece::Glyph {
                    glyph,
                    bytes,
                    advance,
                } => match owners[*glyph] {
                    Some(owner) => {
                        if group.as_ref().map(|g| g.owner) != Some(owner) {
                            close(&mut group, &mut tj, &mut shift);
                            if !seen[owner] {
                                seen[owner] = true;
                                outcome.shifts[owner] = shift;
                            }
                            group = Some(Group {
                                owner,
                                advance: 0.0,
                            });
                        }
                        if let Some(g) = group.as_mut() {
                            g.advance += advance;
                        }
                        outcome.removed_per_erasure[owner] += 1;
                        outcome.glyphs_removed += 1;
                    }
                    None => {
                        close(&mut group, &mut tj, &mut shift);
                        tj.push_bytes(bytes);
                    }
                },
            }
        }
        close(&mut group, &mut tj, &mut shift);

        let Some(original) = operations.get(show.op_index) else {
            continue;
        };
        let array = tj.finish();
        let replacement = match original.operator.as_str() {
            "'" => vec![Operation::new("T*", vec![]), Operation::new("TJ", vec![array])],
            "\"" => {
                let spacing = |i: usize| original.operands.get(i).cloned().unwrap_or(Object::Integer(0));
                vec![
                    Operation::new("Tw", vec![spacing(0)]),
                    Operation::new("Tc", vec![spacing(1)]),
                    Operation::new("T*", vec![]),
                    Operation::new("TJ", vec![array]),
                ]
            }
            _ => vec![Operation::new("TJ", vec![array])],
        };
        rewritten.insert(show.op_index, replacement);
    }

    if !rewritten.is_empty() {
        let original = std::mem::take(operations);
        for (index, op) in original.into_iter().enumerate() {
            match rewritten.remove(&index) {
                Some(replacement) => operations.extend(replacement),
                None => operations.push(op),
            }
        }
    }

    log::debug!(
        "Removed {} glyphs for {} erasures",
        outcome.glyphs_removed,
        erasures.len()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{interpret, load_fonts};
    use lopdf::content::Content;
    use lopdf::{dictionary, Document};

    fn fonts() -> HashMap<Vec<u8>, crate::layout::PageFont> {
        let doc = Document::new();
        let resources = dictionary! {
            "Font" => dictionary! {
                "F1" => dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                },
            },
        };
        load_fonts(&doc, &resources)
    }

    fn erase(stream: &str, needle: &str, width: Option<f64>) -> (String, ErasureOutcome) {
        let fonts = fonts();
        let mut content = Content::decode(stream.as_bytes()).unwrap();
        let layout = interpret(&fonts, &content.operations);
        let erasures: Vec<Erasure> = layout
            .find(needle)
            .into_iter()
            .map(|m| Erasure {
                rect: m.rect,
                replacement_width: width,
            })
            .collect();
        let outcome = apply_erasures(&mut content.operations, &layout, &erasures);
        let after = interpret(&fonts, &content.operations);
        (after.text().to_string(), outcome)
    }

    #[test]
    fn test_erase_keeps_neighbors_in_place() {
        let stream = "BT /F1 10 Tf 72 700 Td (Hello {name}, welcome) Tj ET";
        let fonts = fonts();
        let before = interpret(&fonts, &Content::decode(stream.as_bytes()).unwrap().operations);
        let comma_before = before.glyphs.iter().find(|g| g.text == ",").unwrap().origin;

        let mut content = Content::decode(stream.as_bytes()).unwrap();
        let m = &before.find("{name}")[0];
        let outcome = apply_erasures(
            &mut content.operations,
            &before,
            &[Erasure::new(m.rect)],
        );
        assert_eq!(outcome.glyphs_removed, 6);

        let after = interpret(&fonts, &content.operations);
        assert!(!after.text().contains("{name}"));
        let comma_after = after.glyphs.iter().find(|g| g.text == ",").unwrap().origin;
        assert!((comma_before.0 - comma_after.0).abs() < 1e-3);
    }

    #[test]
    fn test_narrow_neighbours_survive() {
        // Apostrophe is 1.91pt wide at 10pt, period 1.95pt at 7pt
        let (text, outcome) = erase("BT /F1 10 Tf 72 700 Td (l'{name} ok) Tj ET", "{name}", None);
        assert_eq!(outcome.glyphs_removed, 6);
        assert!(text.starts_with("l'"), "{text}");
        assert!(text.ends_with(" ok"), "{text}");

        let (text, outcome) =
            erase("BT /F1 7 Tf 72 700 Td (Ion {last}. Next) Tj ET", "{last}", Some(20.0));
        assert_eq!(outcome.glyphs_removed, 6);
        assert!(text.starts_with("Ion "), "{text}");
        assert!(text.ends_with(". Next"), "{text}");
    }

    #[test]
    fn test_erase_rewrites_as_tj() {
        let mut content = Content::decode(b"BT /F1 10 Tf 0 0 Td (a{x}b) Tj ET").unwrap();
        let fonts = fonts();
        let layout = interpret(&fonts, &content.operations);
        let m = &layout.find("{x}")[0];
        apply_erasures(&mut content.operations, &layout, &[Erasure::new(m.rect)]);

        let tj = content
            .operations
            .iter()
            .find(|op| op.operator == "TJ")
            .unwrap();
        let Object::Array(items) = &tj.operands[0] else {
            panic!("TJ operand is not an array");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], Object::String(b"a".to_vec(), StringFormat::Hexadecimal));
        // "{x}" advance: 334 + 500 + 334
        assert_eq!(items[1], Object::Real(-1168.0));
        assert_eq!(items[2], Object::String(b"b".to_vec(), StringFormat::Hexadecimal));
    }

    #[test]
    fn test_replacement_width_shifts_trailing_text() {
        let stream = "BT /F1 10 Tf 72 700 Td ({a} {b}) Tj ET";
        let fonts = fonts();
        let before = interpret(&fonts, &Content::decode(stream.as_bytes()).unwrap().operations);
        let b_before = before.find("{b}")[0].rect.x0;

        let (text, outcome) = erase(stream, "{a}", Some(50.0));
        assert_eq!(outcome.shifts, vec![0.0]);
        assert_eq!(text.trim(), "{b}");

        let mut content = Content::decode(stream.as_bytes()).unwrap();
        let m = &before.find("{a}")[0];
        apply_erasures(
            &mut content.operations,
            &before,
            &[Erasure::new(m.rect).with_replacement_width(50.0)],
        );
        let after = interpret(&fonts, &content.operations);
        let b_after = after.find("{b}")[0].rect.x0;
        // {a} was 12.24pt wide
        assert!((b_after - b_before - (50.0 - 12.24)).abs() < 1e-3);
    }

    #[test]
    fn test_later_erasure_reports_shift() {
        let stream = "BT /F1 10 Tf 72 700 Td ({a} {a}) Tj ET";
        let (_, outcome) = erase(stream, "{a}", Some(30.0));
        // {a} is 3 glyphs: 334 + 556 + 334 = 1224 thousandths = 12.24pt
        assert_eq!(outcome.shifts[0], 0.0);
        assert!((outcome.shifts[1] - (30.0 - 12.24)).abs() < 1e-6);
    }

    #[test]
    fn test_unrelated_ops_untouched() {
        let stream = "BT /F1 10 Tf 72 700 Td (keep) Tj 0 -20 Td ({drop}) Tj ET";
        let fonts = fonts();
        let mut content = Content::decode(stream.as_bytes()).unwrap();
        let layout = interpret(&fonts, &content.operations);
        let m = &layout.find("{drop}")[0];
        apply_erasures(&mut content.operations, &layout, &[Erasure::new(m.rect)]);
        assert_eq!(content.operations.iter().filter(|op| op.operator == "Tj").count(), 1);
        assert_eq!(interpret(&fonts, &content.operations).text(), "keep");
    }

    #[test]
    fn test_double_quote_operator_keeps_spacing() {
        let stream = "BT /F1 10 Tf 12 TL 72 700 Td (x) Tj 1 0.5 ({y}z) \" ET";
        let fonts = fonts();
        let mut content = Content::decode(stream.as_bytes()).unwrap();
        let layout = interpret(&fonts, &content.operations);
        let m = &layout.find("{y}")[0];
        apply_erasures(&mut content.operations, &layout, &[Erasure::new(m.rect)]);

        let ops: Vec<&str> = content.operations.iter().map(|op| op.operator.as_str()).collect();
        assert!(ops.windows(4).any(|w| w == ["Tw", "Tc", "T*", "TJ"]));
        let after = interpret(&fonts, &content.operations);
        assert_eq!(after.text(), "x\nz");
        assert_eq!(after.glyphs[1].origin.1, 688.0);
    }
}
