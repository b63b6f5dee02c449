//! Placeholder tokens and their surface forms

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `{identifier}` as it appears in extracted text
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^}]+)\}").expect("Invalid placeholder regex"));

/// Letter pairs a typesetter may render as one ligature glyph
const LIGATURES: [(&str, char); 2] = [("fi", '\u{FB01}'), ("fl", '\u{FB02}')];

/// Ligature glyphs folded back to letters when reading identifiers
const LIGATURE_EXPANSIONS: [(char, &str); 5] = [
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Ligature sites beyond this count stay as plain letters in every variant
const MAX_VARIANT_SITES: usize = 6;

/// Which ligature variants of a token are searched for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LigaturePolicy {
    /// Every combination of ligated and plain occurrences
    #[default]
    AllCombinations,
    /// Canonical form, every "fi" ligated, every "fl" ligated
    Uniform,
}

/// A placeholder identifier with the strings it may render as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    identifier: String,
    surface_forms: Vec<String>,
}

impl PlaceholderToken {
    pub fn new(identifier: impl Into<String>, policy: LigaturePolicy) -> Self {
        let identifier = identifier.into();
        let mut surface_forms = Vec::new();
        for variant in identifier_variants(&identifier, policy) {
            let form = format!("{{{variant}}}");
            if !surface_forms.contains(&form) {
                surface_forms.push(form);
            }
        }
        Self {
            identifier,
            surface_forms,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// `{identifier}` with plain letters
    pub fn canonical(&self) -> &str {
        &self.surface_forms[0]
    }

    /// All forms, canonical first
    pub fn surface_forms(&self) -> &[String] {
        &self.surface_forms
    }
}

/// Byte offsets and ligature of every non-overlapping "fi"/"fl"
fn ligature_sites(identifier: &str) -> Vec<(usize, char)> {
    let bytes = identifier.as_bytes();
    let mut sites = Vec::new();
    let mut i = 0;
    while i + 1 < bytes.len() {
        let found = LIGATURES
            .iter()
            .find(|(pair, _)| &bytes[i..i + 2] == pair.as_bytes());
        match found {
            Some(&(_, glyph)) => {
                sites.push((i, glyph));
                i += 2;
            }
            None => i += 1,
        }
    }
    sites
}

fn replace_sites(identifier: &str, sites: &[(usize, char)]) -> String {
    let mut out = String::with_capacity(identifier.len());
    let mut last = 0;
    for &(pos, glyph) in sites {
        out.push_str(&identifier[last..pos]);
        out.push(glyph);
        last = pos + 2;
    }
    out.push_str(&identifier[last..]);
    out
}

fn identifier_variants(identifier: &str, policy: LigaturePolicy) -> Vec<String> {
    let sites = ligature_sites(identifier);
    let mut variants = vec![identifier.to_string()];
    if sites.is_empty() {
        return variants;
    }

    match policy {
        LigaturePolicy::AllCombinations => {
            let sites = &sites[..sites.len().min(MAX_VARIANT_SITES)];
            for mask in 1u32..(1 << sites.len()) {
                let chosen: Vec<(usize, char)> = sites
                    .iter()
                    .enumerate()
                    .filter(|(bit, _)| mask & (1 << bit) != 0)
                    .map(|(_, site)| *site)
                    .collect();
                variants.push(replace_sites(identifier, &chosen));
            }
        }
        LigaturePolicy::Uniform => {
            for (_, glyph) in LIGATURES {
                let chosen: Vec<(usize, char)> =
                    sites.iter().copied().filter(|(_, g)| *g == glyph).collect();
                if !chosen.is_empty() {
                    variants.push(replace_sites(identifier, &chosen));
                }
            }
        }
    }

    variants
}

/// Replace ligature glyphs with the letters they stand for
pub fn normalize_ligatures(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match LIGATURE_EXPANSIONS.iter().find(|(glyph, _)| *glyph == c) {
            Some((_, letters)) => out.push_str(letters),
            None => out.push(c),
        }
    }
    out
}

/// Identifiers of every `{...}` in `text`, ligatures normalized, in order
pub fn extract_identifiers(text: &str) -> Vec<String> {
    TOKEN_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| normalize_ligatures(m.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_identifier_has_one_form() {
        let token = PlaceholderToken::new("contact_last_name", LigaturePolicy::AllCombinations);
        assert_eq!(token.surface_forms(), &["{contact_last_name}".to_string()]);
        assert_eq!(token.canonical(), "{contact_last_name}");
    }

    #[test]
    fn test_single_ligature_site() {
        let token = PlaceholderToken::new("first_name", LigaturePolicy::AllCombinations);
        assert_eq!(
            token.surface_forms(),
            &["{first_name}".to_string(), "{\u{FB01}rst_name}".to_string()]
        );
    }

    #[test]
    fn test_all_combinations_of_mixed_sites() {
        // "fi" twice and "fl" once: 2^3 forms
        let token = PlaceholderToken::new("fi_fl_fi", LigaturePolicy::AllCombinations);
        let forms = token.surface_forms();
        assert_eq!(forms.len(), 8);
        assert_eq!(forms[0], "{fi_fl_fi}");
        assert!(forms.contains(&"{\u{FB01}_fl_fi}".to_string()));
        assert!(forms.contains(&"{fi_\u{FB02}_\u{FB01}}".to_string()));
        assert!(forms.contains(&"{\u{FB01}_\u{FB02}_\u{FB01}}".to_string()));
    }

    #[test]
    fn test_uniform_policy() {
        let token = PlaceholderToken::new("fi_fl_fi", LigaturePolicy::Uniform);
        assert_eq!(
            token.surface_forms(),
            &[
                "{fi_fl_fi}".to_string(),
                "{\u{FB01}_fl_\u{FB01}}".to_string(),
                "{fi_\u{FB02}_fi}".to_string(),
            ]
        );
    }

    #[test]
    fn test_variant_sites_are_capped() {
        let token = PlaceholderToken::new("fififififififi", LigaturePolicy::AllCombinations);
        assert_eq!(token.surface_forms().len(), 1 << MAX_VARIANT_SITES);
    }

    #[test]
    fn test_overlapping_pairs_are_not_double_counted() {
        // "ffi": the first "f" pairs with nothing, "fi" is one site
        assert_eq!(ligature_sites("ffi"), vec![(1, '\u{FB01}')]);
    }

    #[test]
    fn test_normalize_ligatures() {
        assert_eq!(normalize_ligatures("\u{FB01}rst \u{FB02}ag o\u{FB03}ce"), "first flag office");
    }

    #[test]
    fn test_extract_identifiers() {
        let text = "Contract nr. {no} din {date},\nbeneficiar {contact_\u{FB01}rst_name} {}";
        assert_eq!(
            extract_identifiers(text),
            vec!["no", "date", "contact_first_name"]
        );
    }
}
