//! Heuristic SEO health score for a marketplace title.
//!
//! Starts at 100 and subtracts independent deductions:
//!
//! | Check | Deduction |
//! |-------|-----------|
//! | Shorter than 80 chars | `min(20, 80 - len)` |
//! | Longer than 120 chars | `min(50, 3 * (len - 120))` |
//! | Brand missing | 20 |
//! | Main keyword missing | 20 |
//! | Core keyword missing | 15 |
//! | Banned promotional word | 5 per distinct word |
//! | Lowercase first character | 5 |
//! | Repeated non-keyword word (> 3 chars) | 7 per distinct word |
//! | Forbidden punctuation | 10 flat |
//!
//! The result is floored at 0. Keyword presence is tested on text reduced to
//! lowercase ASCII letters and digits, so `"Wi-Fi"` matches `"wifi"`. An empty
//! keyword always counts as present.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::models::ScoreResult;
use crate::normalize::forbidden_punctuation_in;

pub const MIN_TITLE_CHARS: usize = 80;
pub const MAX_TITLE_CHARS: usize = 120;

/// Promotional terms marketplaces penalize.
pub const BANNED_WORDS: [&str; 4] = ["new", "hot sale", "best", "cheap"];

static BANNED_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    BANNED_WORDS
        .iter()
        .map(|w| {
            let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(w)))
                .expect("banned word pattern is valid");
            (re, *w)
        })
        .collect()
});

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("word pattern is valid"));

/// Score a title against its three keyword slots.
pub fn score(title: &str, brand: &str, main_keyword: &str, core_keyword: &str) -> ScoreResult {
    let mut total: i64 = 100;
    let mut reasons = Vec::new();

    let length = title.chars().count();
    let penalty = length_penalty(length);
    if penalty > 0 {
        total -= i64::from(penalty);
        if length < MIN_TITLE_CHARS {
            reasons.push(format!("too short ({}/{}) (-{})", length, MIN_TITLE_CHARS, penalty));
        } else {
            reasons.push(format!("too long ({}/{}) (-{})", length, MAX_TITLE_CHARS, penalty));
        }
    }

    for (keyword, label, cost) in [
        (brand, "brand", 20),
        (main_keyword, "main keyword", 20),
        (core_keyword, "core keyword", 15),
    ] {
        if !contains_keyword(title, keyword) {
            total -= cost;
            reasons.push(format!("missing {} (-{})", label, cost));
        }
    }

    for (re, word) in BANNED_PATTERNS.iter() {
        if re.is_match(title) {
            total -= 5;
            reasons.push(format!("banned word '{}' (-5)", word));
        }
    }

    if title.chars().next().is_some_and(char::is_lowercase) {
        total -= 5;
        reasons.push("lowercase first letter (-5)".to_string());
    }

    let repeated = repeated_words(title, &[brand, main_keyword, core_keyword]);
    if !repeated.is_empty() {
        let cost = 7 * repeated.len() as i64;
        total -= cost;
        reasons.push(format!("repeated words [{}] (-{})", repeated.join(", "), cost));
    }

    let punctuation = forbidden_punctuation_in(title);
    if !punctuation.is_empty() {
        total -= 10;
        let listed: Vec<String> = punctuation.iter().map(char::to_string).collect();
        reasons.push(format!("forbidden punctuation [{}] (-10)", listed.join(" ")));
    }

    ScoreResult {
        score: total.clamp(0, 100) as u32,
        reasons,
    }
}

/// Length deduction alone. Non-decreasing in the distance from `[80, 120]`.
pub fn length_penalty(length: usize) -> u32 {
    if length < MIN_TITLE_CHARS {
        (MIN_TITLE_CHARS - length).min(20) as u32
    } else if length > MAX_TITLE_CHARS {
        (3 * (length - MAX_TITLE_CHARS)).min(50) as u32
    } else {
        0
    }
}

/// Normalized substring test: both sides reduced to lowercase ASCII alphanumerics.
pub fn contains_keyword(title: &str, keyword: &str) -> bool {
    if keyword.trim().is_empty() {
        return true;
    }
    squash(title).contains(&squash(keyword))
}

fn squash(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Words longer than 3 chars that occur more than once and are not part of
/// any keyword, in order of their first repetition.
fn repeated_words(title: &str, keywords: &[&str]) -> Vec<String> {
    let keyword_text = keywords.join(" ").to_lowercase();
    let keyword_words: HashSet<&str> = WORD_RE
        .find_iter(&keyword_text)
        .map(|m| m.as_str())
        .collect();

    let lower = title.to_lowercase();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut repeated: Vec<String> = Vec::new();
    for m in WORD_RE.find_iter(&lower) {
        let w = m.as_str();
        if w.chars().count() > 3
            && seen.contains(w)
            && !keyword_words.contains(w)
            && !repeated.iter().any(|r| r == w)
        {
            repeated.push(w.to_string());
        }
        seen.insert(w);
    }
    repeated
}
