//! ToUnicode CMap parsing
//!
//! Only the parts needed to turn character codes into text are read:
//! `codespacerange` (code lengths), `bfchar` and both forms of `bfrange`.

use std::collections::HashMap;

/// Largest `bfrange` expanded; bigger ranges are clipped.
const MAX_RANGE: u32 = 0xFFFF;

/// Mapping from character codes to Unicode text
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeCMap {
    map: HashMap<u32, String>,
    code_lengths: Vec<usize>,
}

#[derive(Debug, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

impl ToUnicodeCMap {
    /// Parse a decompressed CMap stream
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut cmap = Self::default();
        let mut i = 0;

        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(w) if w == "begincodespacerange" => {
                    i += 1;
                    while let (Some(Token::Hex(lo)), Some(Token::Hex(_))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        if !cmap.code_lengths.contains(&lo.len()) {
                            cmap.code_lengths.push(lo.len());
                        }
                        i += 2;
                    }
                }
                Token::Word(w) if w == "beginbfchar" => {
                    i += 1;
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        cmap.map.insert(code_of(src), utf16_be(dst));
                        i += 2;
                    }
                }
                Token::Word(w) if w == "beginbfrange" => {
                    i += 1;
                    loop {
                        let (lo, hi) = match (tokens.get(i), tokens.get(i + 1)) {
                            (Some(Token::Hex(lo)), Some(Token::Hex(hi))) => {
                                (code_of(lo), code_of(hi))
                            }
                            _ => break,
                        };
                        i += 2;
                        match tokens.get(i) {
                            Some(Token::Hex(dst)) => {
                                cmap.insert_incrementing(lo, hi, dst);
                                i += 1;
                            }
                            Some(Token::ArrayStart) => {
                                i += 1;
                                let mut code = lo;
                                while let Some(Token::Hex(dst)) = tokens.get(i) {
                                    if code <= hi {
                                        cmap.map.insert(code, utf16_be(dst));
                                    }
                                    code = code.saturating_add(1);
                                    i += 1;
                                }
                                if tokens.get(i) == Some(&Token::ArrayEnd) {
                                    i += 1;
                                }
                            }
                            _ => break,
                        }
                    }
                }
                _ => i += 1,
            }
        }

        cmap.code_lengths.sort_unstable();
        cmap
    }

    fn insert_incrementing(&mut self, lo: u32, hi: u32, dst: &[u8]) {
        let base: Vec<u16> = utf16_units(dst);
        let hi = hi.min(lo.saturating_add(MAX_RANGE));
        for (offset, code) in (lo..=hi).enumerate() {
            let mut units = base.clone();
            if let Some(last) = units.last_mut() {
                *last = last.wrapping_add(offset as u16);
            }
            self.map.insert(code, String::from_utf16_lossy(&units));
        }
    }

    /// Text for a character code
    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    /// Code lengths in bytes declared by the codespace ranges, ascending
    pub fn code_lengths(&self) -> &[usize] {
        &self.code_lengths
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Big-endian integer value of a hex string
pub(crate) fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() % 2 == 1 {
        return bytes.iter().map(|&b| b as u16).collect();
    }
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

fn utf16_be(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'/' | b'%')
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        match b {
            _ if b.is_ascii_whitespace() => i += 1,
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => {
                tokens.push(Token::Word("<<".to_string()));
                i += 2;
            }
            b'>' if data.get(i + 1) == Some(&b'>') => {
                tokens.push(Token::Word(">>".to_string()));
                i += 2;
            }
            b'<' => {
                i += 1;
                let mut digits = Vec::new();
                while i < data.len() && data[i] != b'>' {
                    if data[i].is_ascii_hexdigit() {
                        digits.push(data[i]);
                    }
                    i += 1;
                }
                i += 1;
                if digits.len() % 2 == 1 {
                    digits.push(b'0');
                }
                let bytes = digits
                    .chunks_exact(2)
                    .filter_map(|pair| {
                        std::str::from_utf8(pair)
                            .ok()
                            .and_then(|s| u8::from_str_radix(s, 16).ok())
                    })
                    .collect();
                tokens.push(Token::Hex(bytes));
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'(' => {
                let mut depth = 0;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                i += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                tokens.push(Token::Word(String::new()));
            }
            _ => {
                let start = i;
                i += 1;
                while i < data.len() && !is_delimiter(data[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMAP: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Adobe-Identity-UCS def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
3 beginbfchar
<0003> <0020>
<0011> <FB01>
<0012> <00660069>
endbfchar
2 beginbfrange
<0024> <0026> <0041>
<0030> <0031> [<007B> <007D>]
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end";

    #[test]
    fn test_parse_bfchar() {
        let cmap = ToUnicodeCMap::parse(CMAP);
        assert_eq!(cmap.lookup(0x0003), Some(" "));
        assert_eq!(cmap.lookup(0x0011), Some("\u{FB01}"));
        assert_eq!(cmap.lookup(0x0012), Some("fi"));
    }

    #[test]
    fn test_parse_bfrange_incrementing() {
        let cmap = ToUnicodeCMap::parse(CMAP);
        assert_eq!(cmap.lookup(0x0024), Some("A"));
        assert_eq!(cmap.lookup(0x0025), Some("B"));
        assert_eq!(cmap.lookup(0x0026), Some("C"));
        assert_eq!(cmap.lookup(0x0027), None);
    }

    #[test]
    fn test_parse_bfrange_array() {
        let cmap = ToUnicodeCMap::parse(CMAP);
        assert_eq!(cmap.lookup(0x0030), Some("{"));
        assert_eq!(cmap.lookup(0x0031), Some("}"));
    }

    #[test]
    fn test_code_lengths() {
        let cmap = ToUnicodeCMap::parse(CMAP);
        assert_eq!(cmap.code_lengths(), &[2]);
    }

    #[test]
    fn test_empty_input() {
        let cmap = ToUnicodeCMap::parse(b"");
        assert!(cmap.is_empty());
        assert!(cmap.code_lengths().is_empty());
    }
}
