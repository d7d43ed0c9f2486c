//! Lexical normalization of generated titles.
//!
//! [`normalize`] applies three deterministic passes in a fixed order:
//! punctuation stripping, then filler-prefix trimming, then acronym casing.
//! Punctuation goes first so a leading comma cannot hide a filler word, and
//! acronyms are fixed last so they match on final word boundaries.

use once_cell::sync::Lazy;
use regex::Regex;

/// Punctuation that marketplace titles must not contain (ASCII and full-width).
pub const FORBIDDEN_PUNCTUATION: [char; 12] =
    [',', '，', '。', '.', '!', '！', '?', '？', ';', '；', ':', '：'];

/// Leading filler tokens, case-sensitive, checked in this order.
const FILLERS: [&str; 6] = ["The ", "A ", "An ", "the ", "a ", "an "];

/// Canonical acronym spellings.
pub const ACRONYMS: [&str; 22] = [
    "POS", "LCD", "LED", "CPU", "RAM", "OS", "USB", "QR", "RFID", "VPC", "NFC", "GPRS", "4G",
    "5G", "LTE", "SDK", "API", "OEM", "ODM", "IP", "IOS", "ANDROID",
];

static ACRONYM_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    ACRONYMS
        .iter()
        .map(|ac| {
            let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(ac)))
                .expect("acronym pattern is valid");
            (re, *ac)
        })
        .collect()
});

/// Normalize a raw title. Pure and total.
pub fn normalize(raw: &str) -> String {
    let title = remove_punctuation(raw);
    let title = remove_filler_prefix(&title);
    fix_acronyms(title)
}

/// Replace forbidden punctuation with spaces, collapse whitespace, trim.
pub fn remove_punctuation(title: &str) -> String {
    title
        .replace(FORBIDDEN_PUNCTUATION, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop at most one leading filler token.
pub fn remove_filler_prefix(title: &str) -> &str {
    FILLERS
        .iter()
        .find_map(|f| title.strip_prefix(f))
        .unwrap_or(title)
}

/// Uppercase whole-word acronym matches, case-insensitively.
pub fn fix_acronyms(title: &str) -> String {
    let mut out = title.to_string();
    for (re, canonical) in ACRONYM_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *canonical).into_owned();
        }
    }
    out
}

/// Distinct forbidden punctuation characters present, in order of appearance.
pub fn forbidden_punctuation_in(title: &str) -> Vec<char> {
    let mut found = Vec::new();
    for c in title.chars() {
        if FORBIDDEN_PUNCTUATION.contains(&c) && !found.contains(&c) {
            found.push(c);
        }
    }
    found
}
