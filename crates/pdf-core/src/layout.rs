//! Text layout extraction
//!
//! Interprets a page content stream and records every rendered glyph with its
//! bounding box in page coordinates. Glyphs are then assembled into lines by
//! baseline so that plain-text extraction and substring search see the same
//! text a reader sees, independent of the order the stream paints it in.

use crate::cmap::{code_of, ToUnicodeCMap};
use crate::font::{glyph_name_to_text, strip_subset_prefix, win_ansi_char, StandardFont};
use crate::geometry::{Matrix, Rect};
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

/// Gap between glyphs (as a fraction of font size) read as a word break
const SPACE_GAP: f64 = 0.2;

/// Baseline difference (as a fraction of font size) that starts a new line
const LINE_TOLERANCE: f64 = 0.5;

/// A single rendered glyph
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Unicode text of the glyph (two or more chars for some ligatures)
    pub text: String,
    /// Glyph box from descender to ascender, page coordinates
    pub bbox: Rect,
    /// Baseline start point
    pub origin: (f64, f64),
    /// Baseline end point (origin advanced by the glyph width)
    pub end: (f64, f64),
    /// Effective font size in points
    pub size: f64,
    /// Index of the owning run in [`TextLayout::runs`]
    pub run: usize,
}

/// Text painted by one text-showing operator
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Base font name with any subset prefix removed
    pub font_name: String,
    /// Effective font size in points
    pub font_size: f64,
    pub bbox: Rect,
    pub text: String,
}

/// One occurrence of a searched string
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    /// Union of the matched glyph boxes
    pub rect: Rect,
    /// Baseline y of the first matched glyph
    pub baseline: f64,
    /// Run the match starts in
    pub run: usize,
    /// Indices into [`TextLayout::glyphs`]
    pub glyphs: Vec<usize>,
}

/// Position of an operator's glyphs in the content stream, kept for redaction
#[derive(Debug, Clone)]
pub(crate) struct ShowOp {
    pub op_index: usize,
    pub pieces: Vec<ShowPiece>,
    /// User-space length of one thousandth of text space along the baseline
    pub unit: f64,
}

#[derive(Debug, Clone)]
pub(crate) enum ShowPiece {
    Glyph {
        glyph: usize,
        bytes: Vec<u8>,
        /// Advance (including spacing) in TJ units
        advance: f64,
    },
    Adjust(f64),
}

/// Structured text view of a page
#[derive(Debug, Clone, Default)]
pub struct TextLayout {
    pub glyphs: Vec<Glyph>,
    pub runs: Vec<TextRun>,
    pub(crate) shows: Vec<ShowOp>,
    text: String,
    /// (byte offset into `text`, glyph index) for every char of `text`
    char_glyphs: Vec<(usize, Option<usize>)>,
}

impl TextLayout {
    /// Plain text, lines top to bottom
    pub fn text(&self) -> &str {
        &self.text
    }

    /// All occurrences of `needle` in the assembled text
    pub fn find(&self, needle: &str) -> Vec<TextMatch> {
        if needle.is_empty() {
            return Vec::new();
        }

        self.text
            .match_indices(needle)
            .filter_map(|(start, m)| {
                let end = start + m.len();
                let from = self.char_glyphs.partition_point(|&(off, _)| off < start);
                let mut glyphs: Vec<usize> = Vec::new();
                for &(_, glyph) in self.char_glyphs[from..]
                    .iter()
                    .take_while(|(off, _)| *off < end)
                {
                    if let Some(g) = glyph {
                        if glyphs.last() != Some(&g) {
                            glyphs.push(g);
                        }
                    }
                }

                let first = *glyphs.first()?;
                let rect = glyphs
                    .iter()
                    .skip(1)
                    .fold(self.glyphs[first].bbox, |acc, &g| {
                        acc.union(&self.glyphs[g].bbox)
                    });
                Some(TextMatch {
                    rect,
                    baseline: self.glyphs[first].origin.1,
                    run: self.glyphs[first].run,
                    glyphs,
                })
            })
            .collect()
    }

    /// Run a match starts in
    pub fn run_of(&self, m: &TextMatch) -> Option<&TextRun> {
        self.runs.get(m.run)
    }

    fn assemble(&mut self) {
        let mut order: Vec<usize> = (0..self.glyphs.len()).collect();
        order.sort_by(|&a, &b| {
            let (ga, gb) = (&self.glyphs[a], &self.glyphs[b]);
            gb.origin
                .1
                .partial_cmp(&ga.origin.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let mut lines: Vec<Vec<usize>> = Vec::new();
        let mut line_y = f64::NAN;
        let mut line_size = 0.0f64;
        for idx in order {
            let g = &self.glyphs[idx];
            let tolerance = LINE_TOLERANCE * g.size.min(line_size).max(1.0);
            if lines.is_empty() || (g.origin.1 - line_y).abs() > tolerance {
                lines.push(Vec::new());
                line_y = g.origin.1;
                line_size = g.size;
            }
            if let Some(line) = lines.last_mut() {
                line.push(idx);
            }
        }

        let mut text = String::new();
        let mut char_glyphs = Vec::new();
        for (n, line) in lines.iter_mut().enumerate() {
            line.sort_by(|&a, &b| {
                self.glyphs[a]
                    .origin
                    .0
                    .partial_cmp(&self.glyphs[b].origin.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(&b))
            });

            if n > 0 {
                char_glyphs.push((text.len(), None));
                text.push('\n');
            }

            let mut prev: Option<&Glyph> = None;
            for &idx in line.iter() {
                let g = &self.glyphs[idx];
                if let Some(p) = prev {
                    let gap = g.origin.0 - p.end.0;
                    let ends_blank = p.text.chars().last().map_or(true, char::is_whitespace);
                    let starts_blank = g.text.chars().next().map_or(true, char::is_whitespace);
                    if gap > SPACE_GAP * g.size.max(p.size) && !ends_blank && !starts_blank {
                        char_glyphs.push((text.len(), None));
                        text.push(' ');
                    }
                }
                for c in g.text.chars() {
                    char_glyphs.push((text.len(), Some(idx)));
                    text.push(c);
                }
                prev = Some(g);
            }
        }

        self.text = text;
        self.char_glyphs = char_glyphs;
    }
}

/// Glyph decoded from a string operand
struct DecodedGlyph {
    bytes: Vec<u8>,
    text: String,
    /// Width in 1/1000 em
    width: f64,
    single_byte_space: bool,
}

/// Everything needed to decode and measure text drawn with one font resource
#[derive(Debug, Clone)]
pub(crate) struct PageFont {
    base_font: String,
    composite: bool,
    to_unicode: Option<ToUnicodeCMap>,
    differences: HashMap<u32, String>,
    first_char: u32,
    widths: Vec<f64>,
    cid_widths: HashMap<u32, f64>,
    default_width: f64,
    missing_width: f64,
    standard: Option<StandardFont>,
    ascent: f64,
    descent: f64,
}

impl PageFont {
    /// Stand-in for a `Tf` name missing from the resources
    fn fallback() -> Self {
        let standard = StandardFont::Helvetica;
        Self {
            base_font: String::new(),
            composite: false,
            to_unicode: None,
            differences: HashMap::new(),
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: 1000.0,
            missing_width: 500.0,
            standard: Some(standard),
            ascent: standard.ascent(),
            descent: standard.descent(),
        }
    }

    fn load(doc: &Document, dict: &Dictionary) -> Self {
        let mut font = Self::fallback();

        font.base_font = name_of(dict_get(doc, dict, b"BaseFont")).unwrap_or_default();
        font.composite = name_of(dict_get(doc, dict, b"Subtype")).as_deref() == Some("Type0");
        font.standard = StandardFont::from_base_font(&font.base_font);

        if let Some(Object::Stream(stream)) = dict_get(doc, dict, b"ToUnicode") {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            let cmap = ToUnicodeCMap::parse(&data);
            if !cmap.is_empty() {
                font.to_unicode = Some(cmap);
            }
        }

        let descriptor_owner = if font.composite {
            let descendant = match dict_get(doc, dict, b"DescendantFonts") {
                Some(Object::Array(arr)) => arr.first().map(|o| resolve(doc, o)),
                _ => None,
            };
            match descendant {
                Some(Object::Dictionary(cid_font)) => {
                    if let Some(dw) = dict_get(doc, cid_font, b"DW").and_then(number) {
                        font.default_width = dw;
                    }
                    if let Some(Object::Array(w)) = dict_get(doc, cid_font, b"W") {
                        font.cid_widths = parse_cid_widths(doc, w);
                    }
                    Some(cid_font)
                }
                _ => None,
            }
        } else {
            font.first_char = dict_get(doc, dict, b"FirstChar")
                .and_then(number)
                .unwrap_or(0.0) as u32;
            if let Some(Object::Array(widths)) = dict_get(doc, dict, b"Widths") {
                font.widths = widths
                    .iter()
                    .map(|w| number(resolve(doc, w)).unwrap_or(0.0))
                    .collect();
            }
            if let Some(Object::Dictionary(encoding)) = dict_get(doc, dict, b"Encoding") {
                if let Some(Object::Array(diffs)) = dict_get(doc, encoding, b"Differences") {
                    font.differences = parse_differences(doc, diffs);
                }
            }
            Some(dict)
        };

        let descriptor = descriptor_owner.and_then(|owner| match dict_get(doc, owner, b"FontDescriptor") {
            Some(Object::Dictionary(d)) => Some(d),
            _ => None,
        });
        let (std_ascent, std_descent) = font
            .standard
            .map_or((800.0, -200.0), |s| (s.ascent(), s.descent()));
        font.ascent = descriptor
            .and_then(|d| dict_get(doc, d, b"Ascent").and_then(number))
            .filter(|a| *a > 0.0)
            .unwrap_or(std_ascent);
        font.descent = descriptor
            .and_then(|d| dict_get(doc, d, b"Descent").and_then(number))
            .filter(|d| *d < 0.0)
            .unwrap_or(std_descent);
        if let Some(mw) = descriptor.and_then(|d| dict_get(doc, d, b"MissingWidth").and_then(number)) {
            font.missing_width = mw;
        }

        font
    }

    fn code_length(&self, bytes: &[u8], pos: usize) -> usize {
        let remaining = bytes.len() - pos;
        if !self.composite {
            return 1;
        }
        let len = match &self.to_unicode {
            Some(cmap) if cmap.code_lengths().len() == 1 => cmap.code_lengths()[0],
            Some(cmap) if !cmap.code_lengths().is_empty() => cmap
                .code_lengths()
                .iter()
                .copied()
                .find(|&l| {
                    pos + l <= bytes.len() && cmap.lookup(code_of(&bytes[pos..pos + l])).is_some()
                })
                .unwrap_or(cmap.code_lengths()[0]),
            _ => 2,
        };
        len.clamp(1, remaining)
    }

    fn decode(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        let mut glyphs = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let len = self.code_length(bytes, pos);
            let raw = &bytes[pos..pos + len];
            let code = code_of(raw);
            pos += len;

            let text = self.text_for(code);
            let width = self.width_for(code, &text);
            glyphs.push(DecodedGlyph {
                bytes: raw.to_vec(),
                text,
                width,
                single_byte_space: len == 1 && code == 32,
            });
        }
        glyphs
    }

    fn text_for(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|c| c.lookup(code)) {
            return text.to_string();
        }
        if self.composite {
            return '\u{FFFD}'.to_string();
        }
        if let Some(text) = self.differences.get(&code) {
            return text.clone();
        }
        u8::try_from(code)
            .ok()
            .and_then(win_ansi_char)
            .unwrap_or('\u{FFFD}')
            .to_string()
    }

    fn width_for(&self, code: u32, text: &str) -> f64 {
        if self.composite {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        if code >= self.first_char {
            if let Some(&w) = self.widths.get((code - self.first_char) as usize) {
                return w;
            }
        }
        if let Some(standard) = self.standard {
            return text.chars().map(|c| standard.char_width(c)).sum();
        }
        if self.base_font.contains("Courier") {
            return 600.0;
        }
        self.missing_width
    }
}

fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(first) = number(resolve(doc, &w[i])) else {
            break;
        };
        let first = first as u32;
        match w.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (cid, value) in (first..=u32::MAX).zip(list.iter()) {
                    if let Some(v) = number(resolve(doc, value)) {
                        widths.insert(cid, v);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(v)) = (
                    number(last),
                    w.get(i + 2).and_then(|o| number(resolve(doc, o))),
                ) else {
                    break;
                };
                let last = (last as u32).min(first.saturating_add(0xFFFF));
                for cid in first..=last {
                    widths.insert(cid, v);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

fn parse_differences(doc: &Document, diffs: &[Object]) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    let mut code = 0u32;
    for item in diffs {
        match resolve(doc, item) {
            Object::Integer(n) => code = (*n).max(0) as u32,
            Object::Name(name) => {
                if let Some(text) = glyph_name_to_text(&String::from_utf8_lossy(name)) {
                    map.insert(code, text);
                }
                code += 1;
            }
            _ => {}
        }
    }
    map
}

/// Follow one level of indirection
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

pub(crate) fn dict_get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|o| resolve(doc, o))
}

/// Numeric value of an Integer or Real object
pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

fn name_of(obj: Option<&Object>) -> Option<String> {
    match obj {
        Some(Object::Name(name)) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Load every font named in a resource dictionary
pub(crate) fn load_fonts(doc: &Document, resources: &Dictionary) -> HashMap<Vec<u8>, PageFont> {
    let mut fonts = HashMap::new();
    if let Some(Object::Dictionary(font_dict)) = dict_get(doc, resources, b"Font") {
        for (name, value) in font_dict.iter() {
            if let Object::Dictionary(dict) = resolve(doc, value) {
                fonts.insert(name.clone(), PageFont::load(doc, dict));
            }
        }
    }
    fonts
}

#[derive(Debug, Clone)]
struct TextState {
    font: Option<Vec<u8>>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

enum ShowItem<'a> {
    Text(&'a [u8]),
    Adjust(f64),
}

struct Interpreter<'a> {
    fonts: &'a HashMap<Vec<u8>, PageFont>,
    fallback: PageFont,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    layout: TextLayout,
}

impl<'a> Interpreter<'a> {
    fn operand(op: &Operation, i: usize) -> f64 {
        op.operands.get(i).and_then(number).unwrap_or(0.0)
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translate(tx, ty).concat(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_line(0.0, -leading);
    }

    fn run(&mut self, operations: &[Operation]) {
        for (op_index, op) in operations.iter().enumerate() {
            match op.operator.as_str() {
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    if let Some(state) = self.stack.pop() {
                        self.state = state;
                    }
                }
                "cm" if op.operands.len() >= 6 => {
                    let m = Matrix::new(
                        Self::operand(op, 0),
                        Self::operand(op, 1),
                        Self::operand(op, 2),
                        Self::operand(op, 3),
                        Self::operand(op, 4),
                        Self::operand(op, 5),
                    );
                    self.state.ctm = m.concat(&self.state.ctm);
                }
                "BT" => {
                    self.tm = Matrix::identity();
                    self.tlm = Matrix::identity();
                }
                "Tf" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        self.state.text.font = Some(name.clone());
                    }
                    self.state.text.size = Self::operand(op, 1);
                }
                "Tc" => self.state.text.char_spacing = Self::operand(op, 0),
                "Tw" => self.state.text.word_spacing = Self::operand(op, 0),
                "Tz" => self.state.text.horizontal_scale = Self::operand(op, 0) / 100.0,
                "TL" => self.state.text.leading = Self::operand(op, 0),
                "Ts" => self.state.text.rise = Self::operand(op, 0),
                "Td" => self.move_line(Self::operand(op, 0), Self::operand(op, 1)),
                "TD" => {
                    self.state.text.leading = -Self::operand(op, 1);
                    self.move_line(Self::operand(op, 0), Self::operand(op, 1));
                }
                "Tm" if op.operands.len() >= 6 => {
                    self.tlm = Matrix::new(
                        Self::operand(op, 0),
                        Self::operand(op, 1),
                        Self::operand(op, 2),
                        Self::operand(op, 3),
                        Self::operand(op, 4),
                        Self::operand(op, 5),
                    );
                    self.tm = self.tlm;
                }
                "T*" => self.next_line(),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show(op_index, &[ShowItem::Text(bytes)]);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        let items: Vec<ShowItem> = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(ShowItem::Text(bytes)),
                                other => number(other).map(ShowItem::Adjust),
                            })
                            .collect();
                        self.show(op_index, &items);
                    }
                }
                "'" => {
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show(op_index, &[ShowItem::Text(bytes)]);
                    }
                }
                "\"" => {
                    self.state.text.word_spacing = Self::operand(op, 0);
                    self.state.text.char_spacing = Self::operand(op, 1);
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                        self.show(op_index, &[ShowItem::Text(bytes)]);
                    }
                }
                _ => {}
            }
        }
    }

    fn show(&mut self, op_index: usize, items: &[ShowItem]) {
        let ts = self.state.text.clone();
        let font = ts
            .font
            .as_ref()
            .and_then(|name| self.fonts.get(name))
            .unwrap_or(&self.fallback);

        let th = ts.horizontal_scale;
        let scale_unit = ts.size * th;
        let run_index = self.layout.runs.len();
        let mut run: Option<TextRun> = None;
        let mut pieces = Vec::new();
        let unit = self.tm.concat(&self.state.ctm).x_scale() * scale_unit / 1000.0;

        for item in items {
            match item {
                ShowItem::Adjust(n) => {
                    let tx = -n / 1000.0 * scale_unit;
                    self.tm = Matrix::translate(tx, 0.0).concat(&self.tm);
                    pieces.push(ShowPiece::Adjust(*n));
                }
                ShowItem::Text(bytes) => {
                    for decoded in font.decode(bytes) {
                        let user = self.tm.concat(&self.state.ctm);
                        let trm = Matrix::new(scale_unit, 0.0, 0.0, ts.size, 0.0, ts.rise)
                            .concat(&user);
                        let w = decoded.width / 1000.0;
                        let bbox = trm.transform_rect(&Rect::new(
                            0.0,
                            font.descent / 1000.0,
                            w,
                            font.ascent / 1000.0,
                        ));
                        let size = ts.size.abs() * user.y_scale();

                        let glyph_index = self.layout.glyphs.len();
                        self.layout.glyphs.push(Glyph {
                            text: decoded.text.clone(),
                            bbox,
                            origin: trm.apply(0.0, 0.0),
                            end: trm.apply(w, 0.0),
                            size,
                            run: run_index,
                        });

                        let spacing = ts.char_spacing
                            + if decoded.single_byte_space {
                                ts.word_spacing
                            } else {
                                0.0
                            };
                        let tx = (w * ts.size + spacing) * th;
                        self.tm = Matrix::translate(tx, 0.0).concat(&self.tm);

                        let advance = if scale_unit.abs() > f64::EPSILON {
                            tx * 1000.0 / scale_unit
                        } else {
                            decoded.width
                        };
                        pieces.push(ShowPiece::Glyph {
                            glyph: glyph_index,
                            bytes: decoded.bytes,
                            advance,
                        });

                        match run.as_mut() {
                            Some(r) => {
                                r.bbox = r.bbox.union(&bbox);
                                r.text.push_str(&decoded.text);
                            }
                            None => {
                                run = Some(TextRun {
                                    font_name: strip_subset_prefix(&font.base_font).to_string(),
                                    font_size: size,
                                    bbox,
                                    text: decoded.text,
                                });
                            }
                        }
                    }
                }
            }
        }

        if let Some(run) = run {
            self.layout.runs.push(run);
        }
        self.layout.shows.push(ShowOp {
            op_index,
            pieces,
            unit,
        });
    }
}

/// Build the text layout of a decoded content stream
pub(crate) fn interpret(fonts: &HashMap<Vec<u8>, PageFont>, operations: &[Operation]) -> TextLayout {
    let mut interpreter = Interpreter {
        fonts,
        fallback: PageFont::fallback(),
        state: GraphicsState::default(),
        stack: Vec::new(),
        tm: Matrix::identity(),
        tlm: Matrix::identity(),
        layout: TextLayout::default(),
    };
    interpreter.run(operations);

    let mut layout = interpreter.layout;
    layout.assemble();
    log::debug!(
        "Interpreted {} glyphs in {} runs",
        layout.glyphs.len(),
        layout.runs.len()
    );
    layout
}
