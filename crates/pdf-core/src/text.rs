//! Text rendering utilities

use crate::font::StandardFont;
use crate::geometry::Rect;

/// Tolerance when comparing measured text against a box, in points
const FIT_EPSILON: f64 = 0.01;

/// RGB color for PDF operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Create a new color from RGB values (0.0 - 1.0)
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// Context for rendering text
pub struct TextRenderContext {
    /// PDF font resource name (e.g., "PFHelv")
    pub font_name: String,
    /// Font size in points
    pub font_size: f64,
    /// Text color (RGB)
    pub color: Color,
}

/// Where inserted text goes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextTarget {
    /// Single line starting at a baseline point. `max_width`, when given, is
    /// only used to report whether the line fits.
    Point {
        x: f64,
        y: f64,
        max_width: Option<f64>,
    },
    /// Wrapped inside a box. The first baseline is `baseline` when given,
    /// otherwise one ascent below the top of the box.
    Box { rect: Rect, baseline: Option<f64> },
}

/// Font, size and color of inserted text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font: StandardFont,
    pub size: f64,
    /// Baseline distance as a multiple of `size`
    pub line_height: f64,
    pub color: Color,
}

impl TextStyle {
    pub fn new(font: StandardFont, size: f64) -> Self {
        Self {
            font,
            size,
            line_height: 1.15,
            color: Color::black(),
        }
    }
}

/// A laid-out line of inserted text
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f64,
    pub baseline: f64,
    pub width: f64,
}

/// How laid-out text relates to its target
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxFit {
    /// Every line fits horizontally and the block fits vertically
    pub fits: bool,
    pub line_count: usize,
    pub max_line_width: f64,
    pub first_line_width: f64,
}

/// Encode bytes as a PDF hex string, e.g. `<48656C6C6F>`
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2 + 2);
    hex.push('<');
    for b in bytes {
        hex.push_str(&format!("{b:02X}"));
    }
    hex.push('>');
    hex
}

/// Generate PDF operators for text insertion
///
/// Creates the PDF text operators (BT, rg, Tf, Td, Tj, ET) that render one
/// line of text with its baseline starting at `(x, y)`.
///
/// # Arguments
/// * `text_hex` - Hex-encoded text (e.g., "<48656C6C6F>")
/// * `x` - X coordinate in points (PDF coordinates, from left)
/// * `y` - Y coordinate in points (PDF coordinates, from bottom)
/// * `ctx` - Text rendering context
pub fn generate_text_operators(text_hex: &str, x: f64, y: f64, ctx: &TextRenderContext) -> Vec<u8> {
    let mut ops = String::new();

    ops.push_str("BT\n");

    // Set text color (rg operator for non-stroking color)
    ops.push_str(&format!(
        "{} {} {} rg\n",
        ctx.color.r, ctx.color.g, ctx.color.b
    ));

    ops.push_str(&format!("/{} {} Tf\n", ctx.font_name, ctx.font_size));
    ops.push_str(&format!("{x} {y} Td\n"));
    ops.push_str(&format!("{text_hex} Tj\n"));
    ops.push_str("ET\n");

    ops.into_bytes()
}

/// Split text into lines no wider than `max_width`
///
/// Explicit line breaks are kept. Words are separated on whitespace and a word
/// wider than `max_width` gets a line of its own.
pub fn wrap_text<F>(text: &str, max_width: f64, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f64,
{
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current_line = String::new();

        for word in paragraph.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
                continue;
            }
            let candidate = format!("{current_line} {word}");
            if measure(&candidate) <= max_width + FIT_EPSILON {
                current_line = candidate;
            } else {
                lines.push(std::mem::replace(&mut current_line, word.to_string()));
            }
        }

        lines.push(current_line);
    }

    lines
}

/// Lay out `text` for `target` and report whether it fits
pub fn layout_text(text: &str, target: &TextTarget, style: &TextStyle) -> (Vec<PlacedLine>, BoxFit) {
    let measure = |s: &str| style.font.text_width_points(s, style.size);
    let ascent = style.font.ascent() * style.size / 1000.0;
    let descent = style.font.descent() * style.size / 1000.0;

    match *target {
        TextTarget::Point { x, y, max_width } => {
            let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
            let width = measure(&line);
            let fit = BoxFit {
                fits: max_width.map_or(true, |w| width <= w + FIT_EPSILON),
                line_count: 1,
                max_line_width: width,
                first_line_width: width,
            };
            (
                vec![PlacedLine {
                    text: line,
                    x,
                    baseline: y,
                    width,
                }],
                fit,
            )
        }
        TextTarget::Box { rect, baseline } => {
            let first = baseline.unwrap_or(rect.y1 - ascent);
            let leading = style.size * style.line_height;
            let lines: Vec<PlacedLine> = wrap_text(text, rect.width(), measure)
                .into_iter()
                .enumerate()
                .map(|(i, line)| {
                    let width = measure(&line);
                    PlacedLine {
                        text: line,
                        x: rect.x0,
                        baseline: first - i as f64 * leading,
                        width,
                    }
                })
                .collect();

            let max_line_width = lines.iter().map(|l| l.width).fold(0.0, f64::max);
            let last = lines.last().map_or(first, |l| l.baseline);
            let fits = max_line_width <= rect.width() + FIT_EPSILON
                && first + ascent <= rect.y1 + FIT_EPSILON
                && last + descent >= rect.y0 - FIT_EPSILON;

            let fit = BoxFit {
                fits,
                line_count: lines.len(),
                max_line_width,
                first_line_width: lines.first().map_or(0.0, |l| l.width),
            };
            (lines, fit)
        }
    }
}
