//! Standard substitute fonts
//!
//! Replacement text is drawn with one of four base-14 fonts, so no font
//! program is embedded. Each font carries its AFM advance widths for the
//! printable ASCII range and a WinAnsi encoding extended through
//! `/Differences` with the Romanian letters WinAnsi lacks.

use lopdf::{Dictionary, Object};
use unicode_normalization::UnicodeNormalization;

/// Font weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontWeight {
    #[default]
    Regular,
    Bold,
}

/// Font family class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Typeface {
    #[default]
    Sans,
    Serif,
}

/// One of the fixed set of substitute fonts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StandardFont {
    #[default]
    Helvetica,
    HelveticaBold,
    TimesRoman,
    TimesBold,
}

struct Metrics {
    /// Advance widths for U+0020..=U+007E, in 1/1000 em
    ascii: [u16; 95],
    ascent: f64,
    descent: f64,
    en_dash: u16,
    single_quote: u16,
    double_quote: u16,
}

#[rustfmt::skip]
const HELVETICA: Metrics = Metrics {
    ascii: [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
        1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
        667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
        333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
        556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
    ],
    ascent: 718.0,
    descent: -207.0,
    en_dash: 556,
    single_quote: 222,
    double_quote: 333,
};

#[rustfmt::skip]
const HELVETICA_BOLD: Metrics = Metrics {
    ascii: [
        278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
        975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
        667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
        333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
        611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
    ],
    ascent: 718.0,
    descent: -207.0,
    en_dash: 556,
    single_quote: 278,
    double_quote: 500,
};

#[rustfmt::skip]
const TIMES_ROMAN: Metrics = Metrics {
    ascii: [
        250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
        500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
        921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
        556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
        333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
        500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
    ],
    ascent: 683.0,
    descent: -217.0,
    en_dash: 500,
    single_quote: 333,
    double_quote: 444,
};

#[rustfmt::skip]
const TIMES_BOLD: Metrics = Metrics {
    ascii: [
        250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
        500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
        930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
        611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
        333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
        556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
    ],
    ascent: 683.0,
    descent: -217.0,
    en_dash: 500,
    single_quote: 333,
    double_quote: 500,
};

/// WinAnsi codes 0x80..=0x9F (None where WinAnsi leaves the code undefined)
#[rustfmt::skip]
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('€'), None, Some('‚'), Some('ƒ'), Some('„'), Some('…'), Some('†'), Some('‡'),
    Some('ˆ'), Some('‰'), Some('Š'), Some('‹'), Some('Œ'), None, Some('Ž'), None,
    None, Some('‘'), Some('’'), Some('“'), Some('”'), Some('•'), Some('–'), Some('—'),
    Some('˜'), Some('™'), Some('š'), Some('›'), Some('œ'), None, Some('ž'), Some('Ÿ'),
];

/// Letters placed into codes WinAnsi leaves unused
const ENCODING_EXTENSION: [(u8, char, &str); 6] = [
    (0x7F, 'Ț', "Tcommaaccent"),
    (0x81, 'ă', "abreve"),
    (0x8D, 'Ă', "Abreve"),
    (0x8F, 'ș', "scommaaccent"),
    (0x90, 'Ș', "Scommaaccent"),
    (0x9D, 'ț', "tcommaaccent"),
];

/// Decode a single-byte WinAnsi code
pub fn win_ansi_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E => Some(code as char),
        0x80..=0x9F => WIN_ANSI_HIGH[(code - 0x80) as usize],
        0xA0..=0xFF => Some(code as char),
        _ => None,
    }
}

/// Map a glyph name from an `/Encoding /Differences` array to text
///
/// Ligature glyphs map to their ligature code points so extracted text
/// reports them the way rendering engines do.
pub fn glyph_name_to_text(name: &str) -> Option<String> {
    let text = match name {
        "fi" => "\u{FB01}",
        "fl" => "\u{FB02}",
        "ff" => "\u{FB00}",
        "ffi" => "\u{FB03}",
        "ffl" => "\u{FB04}",
        "space" | "nbspace" => " ",
        "exclam" => "!",
        "quotedbl" => "\"",
        "numbersign" => "#",
        "dollar" => "$",
        "percent" => "%",
        "ampersand" => "&",
        "quotesingle" => "'",
        "parenleft" => "(",
        "parenright" => ")",
        "asterisk" => "*",
        "plus" => "+",
        "comma" => ",",
        "hyphen" | "minus" => "-",
        "period" => ".",
        "slash" => "/",
        "zero" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "colon" => ":",
        "semicolon" => ";",
        "less" => "<",
        "equal" => "=",
        "greater" => ">",
        "question" => "?",
        "at" => "@",
        "bracketleft" => "[",
        "backslash" => "\\",
        "bracketright" => "]",
        "asciicircum" => "^",
        "underscore" => "_",
        "grave" => "`",
        "braceleft" => "{",
        "bar" => "|",
        "braceright" => "}",
        "asciitilde" => "~",
        "quoteleft" => "‘",
        "quoteright" => "’",
        "quotedblleft" => "“",
        "quotedblright" => "”",
        "quotesinglbase" => "‚",
        "quotedblbase" => "„",
        "endash" => "–",
        "emdash" => "—",
        "ellipsis" => "…",
        "bullet" => "•",
        "Euro" => "€",
        "acircumflex" => "â",
        "Acircumflex" => "Â",
        "icircumflex" => "î",
        "Icircumflex" => "Î",
        "scedilla" => "ş",
        "Scedilla" => "Ş",
        "tcedilla" => "ţ",
        "Tcedilla" => "Ţ",
        _ => {
            if let Some(&(_, c, _)) = ENCODING_EXTENSION.iter().find(|(_, _, n)| *n == name) {
                return Some(c.to_string());
            }
            if let Some(hex) = name.strip_prefix("uni") {
                return u32::from_str_radix(hex.get(..4)?, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from);
            }
            let mut chars = name.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_string()),
                _ => None,
            };
        }
    };
    Some(text.to_string())
}

impl StandardFont {
    /// Pick the substitute for a typeface and weight
    pub fn new(typeface: Typeface, weight: FontWeight) -> Self {
        match (typeface, weight) {
            (Typeface::Sans, FontWeight::Regular) => Self::Helvetica,
            (Typeface::Sans, FontWeight::Bold) => Self::HelveticaBold,
            (Typeface::Serif, FontWeight::Regular) => Self::TimesRoman,
            (Typeface::Serif, FontWeight::Bold) => Self::TimesBold,
        }
    }

    /// Map a source font's base name onto the closest substitute
    ///
    /// Subset prefixes (`ABCDEF+`) are ignored. Family is decided by serif
    /// keywords, weight by bold keywords.
    pub fn substitute_for(base_font: &str) -> Self {
        let name = strip_subset_prefix(base_font).to_ascii_lowercase();
        let serif = [
            "times", "serif", "roman", "georgia", "cambria", "garamond", "palatino", "book",
            "minion", "baskerville",
        ]
        .iter()
        .any(|k| name.contains(k))
            && !name.contains("sans");
        let bold = ["bold", "black", "heavy", "semibold", "demi"]
            .iter()
            .any(|k| name.contains(k));

        let typeface = if serif { Typeface::Serif } else { Typeface::Sans };
        let weight = if bold { FontWeight::Bold } else { FontWeight::Regular };
        Self::new(typeface, weight)
    }

    /// Metrics lookup for base-14 names a source document may use without widths
    pub fn from_base_font(base_font: &str) -> Option<Self> {
        match strip_subset_prefix(base_font) {
            "Helvetica" | "Arial" | "ArialMT" | "Helvetica-Oblique" => Some(Self::Helvetica),
            "Helvetica-Bold" | "Arial-Bold" | "Arial-BoldMT" | "Helvetica-BoldOblique" => {
                Some(Self::HelveticaBold)
            }
            "Times-Roman" | "Times-Italic" | "TimesNewRoman" | "TimesNewRomanPSMT" => {
                Some(Self::TimesRoman)
            }
            "Times-Bold" | "Times-BoldItalic" | "TimesNewRoman-Bold" | "TimesNewRomanPS-BoldMT" => {
                Some(Self::TimesBold)
            }
            _ => None,
        }
    }

    /// PostScript name written as `/BaseFont`
    pub fn base_font_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
        }
    }

    /// Short tag used to build page resource names
    pub(crate) fn resource_tag(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helv",
            Self::HelveticaBold => "HeBo",
            Self::TimesRoman => "TiRo",
            Self::TimesBold => "TiBo",
        }
    }

    pub fn typeface(&self) -> Typeface {
        match self {
            Self::Helvetica | Self::HelveticaBold => Typeface::Sans,
            Self::TimesRoman | Self::TimesBold => Typeface::Serif,
        }
    }

    pub fn weight(&self) -> FontWeight {
        match self {
            Self::Helvetica | Self::TimesRoman => FontWeight::Regular,
            Self::HelveticaBold | Self::TimesBold => FontWeight::Bold,
        }
    }

    fn metrics(&self) -> &'static Metrics {
        match self {
            Self::Helvetica => &HELVETICA,
            Self::HelveticaBold => &HELVETICA_BOLD,
            Self::TimesRoman => &TIMES_ROMAN,
            Self::TimesBold => &TIMES_BOLD,
        }
    }

    /// Ascender in 1/1000 em
    pub fn ascent(&self) -> f64 {
        self.metrics().ascent
    }

    /// Descender in 1/1000 em (negative)
    pub fn descent(&self) -> f64 {
        self.metrics().descent
    }

    /// Advance width of a character in 1/1000 em
    pub fn char_width(&self, c: char) -> f64 {
        let m = self.metrics();
        if let Some(w) = ascii_width(m, c) {
            return w;
        }
        let special = match c {
            '\u{A0}' => Some(m.ascii[0]),
            '–' => Some(m.en_dash),
            '—' | '…' | '‰' => Some(1000),
            '‘' | '’' | '‚' => Some(m.single_quote),
            '“' | '”' | '„' => Some(m.double_quote),
            '•' => Some(350),
            '€' => Some(m.ascii[(b'0' - 0x20) as usize]),
            _ => None,
        };
        if let Some(w) = special {
            return w as f64;
        }
        // Accented letters take the width of their base letter
        c.to_string()
            .nfd()
            .next()
            .and_then(|base| ascii_width(m, base))
            .unwrap_or(m.ascii[(b'o' - 0x20) as usize] as f64)
    }

    /// Width of a string in points at the given size
    pub fn text_width_points(&self, text: &str, size: f64) -> f64 {
        text.chars().map(|c| self.char_width(c)).sum::<f64>() * size / 1000.0
    }

    /// Encode text into single-byte codes of this font's encoding
    ///
    /// Characters without a code are replaced by `?`; the second value
    /// counts them.
    pub fn encode_text(&self, text: &str) -> (Vec<u8>, usize) {
        let mut bytes = Vec::with_capacity(text.len());
        let mut missing = 0;
        for c in text.chars() {
            match encode_char(c) {
                Some(b) => bytes.push(b),
                None => {
                    bytes.push(b'?');
                    missing += 1;
                }
            }
        }
        (bytes, missing)
    }

    /// Font dictionary for embedding as a page resource
    pub fn to_pdf_dictionary(&self) -> Dictionary {
        let mut differences = Vec::with_capacity(ENCODING_EXTENSION.len() * 2);
        for (code, _, name) in ENCODING_EXTENSION {
            differences.push(Object::Integer(code as i64));
            differences.push(Object::Name(name.as_bytes().to_vec()));
        }

        let mut encoding = Dictionary::new();
        encoding.set("Type", Object::Name(b"Encoding".to_vec()));
        encoding.set("BaseEncoding", Object::Name(b"WinAnsiEncoding".to_vec()));
        encoding.set("Differences", Object::Array(differences));

        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set(
            "BaseFont",
            Object::Name(self.base_font_name().as_bytes().to_vec()),
        );
        font.set("Encoding", Object::Dictionary(encoding));
        font
    }
}

fn ascii_width(m: &Metrics, c: char) -> Option<f64> {
    match c {
        ' '..='~' => Some(m.ascii[c as usize - 0x20] as f64),
        _ => None,
    }
}

fn encode_char(c: char) -> Option<u8> {
    let c = match c {
        'ş' => 'ș',
        'Ş' => 'Ș',
        'ţ' => 'ț',
        'Ţ' => 'Ț',
        '\t' => ' ',
        other => other,
    };
    match c as u32 {
        0x20..=0x7E => return Some(c as u8),
        0xA0..=0xFF => return Some(c as u32 as u8),
        _ => {}
    }
    if let Some(&(code, _, _)) = ENCODING_EXTENSION.iter().find(|(_, ch, _)| *ch == c) {
        return Some(code);
    }
    WIN_ANSI_HIGH
        .iter()
        .position(|&ch| ch == Some(c))
        .map(|i| 0x80 + i as u8)
}

/// Drop a `ABCDEF+` subset tag from a base font name
pub fn strip_subset_prefix(base_font: &str) -> &str {
    match base_font.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => {
            rest
        }
        _ => base_font,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_for_family_and_weight() {
        assert_eq!(
            StandardFont::substitute_for("ABCDEF+Calibri"),
            StandardFont::Helvetica
        );
        assert_eq!(
            StandardFont::substitute_for("Arial-BoldMT"),
            StandardFont::HelveticaBold
        );
        assert_eq!(
            StandardFont::substitute_for("TimesNewRomanPSMT"),
            StandardFont::TimesRoman
        );
        assert_eq!(
            StandardFont::substitute_for("QWERTY+Georgia-Bold"),
            StandardFont::TimesBold
        );
        assert_eq!(
            StandardFont::substitute_for("DejaVuSans-Bold"),
            StandardFont::HelveticaBold
        );
    }

    #[test]
    fn test_strip_subset_prefix() {
        assert_eq!(strip_subset_prefix("AAAAAA+Arial"), "Arial");
        assert_eq!(strip_subset_prefix("Arial"), "Arial");
        assert_eq!(strip_subset_prefix("abc+Arial"), "abc+Arial");
    }

    #[test]
    fn test_helvetica_widths() {
        let font = StandardFont::Helvetica;
        assert_eq!(font.char_width(' '), 278.0);
        assert_eq!(font.char_width('{'), 334.0);
        assert_eq!(font.char_width('W'), 944.0);
        assert_eq!(font.char_width('~'), 584.0);
        // 4 * 556 + 278 ('/') + 3 * 556
        assert!((font.text_width_points("001/2025", 10.0) - 41.7).abs() < 1e-9);
    }

    #[test]
    fn test_accented_width_uses_base_letter() {
        let font = StandardFont::TimesRoman;
        assert_eq!(font.char_width('ă'), font.char_width('a'));
        assert_eq!(font.char_width('Ș'), font.char_width('S'));
        assert_eq!(font.char_width('é'), font.char_width('e'));
    }

    #[test]
    fn test_encode_romanian_letters() {
        let (bytes, missing) = StandardFont::Helvetica.encode_text("Țară șiş");
        assert_eq!(missing, 0);
        assert_eq!(bytes, vec![0x7F, b'a', b'r', 0x81, b' ', 0x8F, b'i', 0x8F]);
    }

    #[test]
    fn test_encode_unknown_char() {
        let (bytes, missing) = StandardFont::Helvetica.encode_text("a\u{4E2D}b");
        assert_eq!(bytes, b"a?b".to_vec());
        assert_eq!(missing, 1);
    }

    #[test]
    fn test_win_ansi_roundtrip_high_range() {
        for c in ['€', '–', '“', 'Ÿ', 'é'] {
            let code = encode_char(c).unwrap();
            assert_eq!(win_ansi_char(code), Some(c));
        }
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_text("fi").as_deref(), Some("\u{FB01}"));
        assert_eq!(glyph_name_to_text("braceleft").as_deref(), Some("{"));
        assert_eq!(glyph_name_to_text("scommaaccent").as_deref(), Some("ș"));
        assert_eq!(glyph_name_to_text("uni0103").as_deref(), Some("ă"));
        assert_eq!(glyph_name_to_text("g").as_deref(), Some("g"));
        assert_eq!(glyph_name_to_text("g123"), None);
    }

    #[test]
    fn test_pdf_dictionary() {
        let dict = StandardFont::TimesBold.to_pdf_dictionary();
        assert_eq!(
            dict.get(b"BaseFont").unwrap(),
            &Object::Name(b"Times-Bold".to_vec())
        );
        let encoding = dict.get(b"Encoding").unwrap().as_dict().unwrap();
        assert_eq!(
            encoding.get(b"Differences").unwrap().as_array().unwrap().len(),
            12
        );
    }
}
