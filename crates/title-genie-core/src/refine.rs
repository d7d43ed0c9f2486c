//! Bounded self-correction of a scored candidate.
//!
//! ```text
//!  Scoring ──(score < 100, budget left)──▶ Requesting ──▶ Evaluating
//!     ▲                                                      │
//!     └──────────────(accepted or discarded)─────────────────┘
//!  Scoring ──(score == 100 or budget spent)──▶ Done
//! ```
//!
//! A revision is kept only when it scores at least as well as the current
//! title, so the final score never drops below the initial one. A failed
//! generation call consumes an attempt like a discarded revision.

use crate::generate::TextGenerator;
use crate::models::ScoreResult;
use crate::prompt::refinement_prompt;
use crate::seo;

/// Extra generation calls allowed per candidate.
pub const MAX_REFINE_ATTEMPTS: usize = 2;

const WRAPPING_QUOTES: [char; 7] = ['"', '\'', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}', '`'];

/// Keyword slots a candidate is scored against.
#[derive(Debug, Clone, Copy)]
pub struct Keywords<'a> {
    pub brand: &'a str,
    pub main_keyword: &'a str,
    pub core_keyword: &'a str,
}

impl Keywords<'_> {
    pub fn score(&self, title: &str) -> ScoreResult {
        seo::score(title, self.brand, self.main_keyword, self.core_keyword)
    }
}

/// Outcome of [`refine`].
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub title: String,
    pub score: ScoreResult,
    /// Generation calls spent.
    pub attempts: usize,
    /// Whether the final title differs from the original.
    pub improved: bool,
}

enum State {
    Scoring,
    Requesting,
    Evaluating(Option<String>),
    Done,
}

/// Try to raise a candidate's score with up to [`MAX_REFINE_ATTEMPTS`] revisions.
pub async fn refine(
    title: String,
    score: ScoreResult,
    keywords: Keywords<'_>,
    generator: &dyn TextGenerator,
) -> Refinement {
    let original = title.clone();
    let mut current = Refinement {
        title,
        score,
        attempts: 0,
        improved: false,
    };
    let mut state = State::Scoring;

    loop {
        state = match state {
            State::Scoring => {
                if current.score.is_perfect() || current.attempts >= MAX_REFINE_ATTEMPTS {
                    State::Done
                } else {
                    State::Requesting
                }
            }
            State::Requesting => {
                current.attempts += 1;
                let prompt = refinement_prompt(
                    &current.title,
                    &current.score,
                    keywords.brand,
                    keywords.main_keyword,
                    keywords.core_keyword,
                );
                match generator.generate(&prompt).await {
                    Ok(response) => State::Evaluating(extract_revision(&response)),
                    Err(e) => {
                        tracing::debug!(attempt = current.attempts, "refinement call failed: {:#}", e);
                        State::Evaluating(None)
                    }
                }
            }
            State::Evaluating(Some(revision)) => {
                let revised = keywords.score(&revision);
                if revised.score >= current.score.score {
                    tracing::debug!(
                        from = current.score.score,
                        to = revised.score,
                        "accepted revision"
                    );
                    current.title = revision;
                    current.score = revised;
                } else {
                    tracing::debug!(
                        kept = current.score.score,
                        rejected = revised.score,
                        "discarded worse revision"
                    );
                }
                State::Scoring
            }
            State::Evaluating(None) => State::Scoring,
            State::Done => {
                current.improved = current.title != original;
                return current;
            }
        };
    }
}

/// First non-empty line of a response with wrapping quotes removed.
fn extract_revision(response: &str) -> Option<String> {
    let line = response.lines().map(str::trim).find(|l| !l.is_empty())?;
    let stripped = line.trim_matches(&WRAPPING_QUOTES[..]).trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}
