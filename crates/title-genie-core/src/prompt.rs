//! Prompt composition.
//!
//! A generation prompt is assembled from fixed sections, in order:
//!
//! ```text
//! Role statement
//! CRITICAL CONSTRAINTS     length, keywords, positions, punctuation,
//!                          formatting, readability, starred fields
//! Strategy                 strict structure | commercial + examples
//!   Context                performance insights, then "- key: value" lines
//! Task                     appended by with_title_request
//! ```
//!
//! Composition is pure: identical inputs give byte-identical prompts. The
//! self-correction loop relies on this when it re-prompts.

use crate::models::{
    GenerationMode, PositionRules, ProductRow, ScoreResult, Slot, MANDATORY_COLUMNS,
    RESERVED_COLUMNS,
};
use crate::seo::{MAX_TITLE_CHARS, MIN_TITLE_CHARS};
use crate::settings::RunSettings;

const ROLE: &str = "Role: You are an Alibaba International Station SEO expert specializing in high-converting product titles for global markets.";

const CONTEXT_OPEN: &str = "--- HISTORICAL PERFORMANCE INSIGHTS ---";
const CONTEXT_CLOSE: &str = "---------------------------------------";

const FEW_SHOT: &str = "Examples of Good Titles (Natural & High CTR):
1. TechNova Wireless Earbuds - Bluetooth Headphones with Noise Cancelling and 24h Battery for Gym
2. EcoLife Bamboo Toothbrush Pack of 4 - Biodegradable Soft Bristles for Sensitive Gums Plastic-Free
3. PRO-X Gaming Mouse - High Precision Optical Sensor RGB Wired Mouse for Esports 16000 DPI

Examples of BAD Titles (Do NOT do this):
1. TechNova Wireless Earbuds Bluetooth Headphones Noise Cancelling 24h Battery Gym (Just keywords piled up)
2. Wireless Earbuds by TechNova with Bluetooth Headphones (Repetitive, boring structure)";

/// Focus areas handed out round-robin when several titles are requested.
pub const DIVERSITY_FOCI: [&str; 5] = [
    "Technical Specs & Performance",
    "Application Scenarios (e.g., Retail, Kitchen, Warehouse)",
    "User Benefits (e.g., Productivity, Error-reduction, Durability)",
    "Design & Material",
    "Market Keywords & Commercial Appeal",
];

/// Run-level inputs to [`compose`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptOptions {
    pub mode: GenerationMode,
    /// Number of titles the prompt will ask for. Drives the diversity list.
    pub titles: usize,
    pub positions: PositionRules,
    pub starred_fields: Vec<String>,
    pub external_context: Option<String>,
}

impl PromptOptions {
    pub fn from_settings(settings: &RunSettings) -> Self {
        Self {
            mode: settings.mode,
            titles: settings.titles_per_row,
            positions: settings.positions,
            starred_fields: settings.starred_fields.clone(),
            external_context: settings.external_context.clone(),
        }
    }
}

/// Build the generation prompt for one row.
pub fn compose(row: &ProductRow, options: &PromptOptions) -> String {
    let brand = row.brand();
    let main = row.main_keyword();

    let mut out = String::new();
    out.push_str(ROLE);
    out.push_str("\n\n");
    out.push_str(&constraints(row, options));
    out.push('\n');

    let context = context_block(row, options.external_context.as_deref());
    match options.mode {
        GenerationMode::Strict => {
            out.push_str("Strategy: STRICT STRUCTURE\n");
            out.push_str("Structure: [Brand] + [Main Keyword] + [Key Specs/Attributes] + [Core Keyword]\n");
            if options.positions.is_empty() {
                out.push_str("Follow this order exactly. Do not deviate from it.\n");
            } else {
                out.push_str("Follow this order exactly. The only permitted deviation is where a keyword position rule above requires a different placement.\n");
            }
            out.push_str("Context:\n");
            out.push_str(&context);
            out.push_str("\n\nTask: Generate title strictly following the structure above.\n");
        }
        GenerationMode::Marketing => {
            out.push_str("Strategy: COMMERCIAL & CONVERSATIONAL\n");
            out.push_str("Target Audience: Global B2B buyers seeking professional product solutions.\n");
            out.push_str("Context (Use these variables to enrich the title):\n");
            out.push_str(&context);
            out.push_str("\n\n");
            out.push_str(FEW_SHOT);
            out.push_str("\n\nInstruction:\n");

            let mut steps = Vec::new();
            if options.positions.is_empty() {
                steps.push(format!("Start exactly with \"{} {}\".", brand, main));
            } else {
                steps.push("Place the keywords where the position rules above require.".to_string());
            }
            steps.push(format!(
                "Integrate \"{}\" and other key attributes (like product model, CPU, OS, etc. from context) naturally.",
                row.core_keyword()
            ));
            if options.titles > 1 {
                let mut diversity = String::from(
                    "**DIVERSITY**: When generating multiple titles, ensure each title focuses on a DIFFERENT aspect:",
                );
                for (i, focus) in diversity_plan(options.titles).iter().enumerate() {
                    diversity.push_str(&format!("\n    - Title {}: Focus on {}.", i + 1, focus));
                }
                steps.push(diversity);
            }
            steps.push("Use commercial synonyms (e.g., \"Advanced\", \"Smart\", \"Efficient\", \"Industrial-grade\") to improve appeal.".to_string());
            steps.push(format!(
                "Ensure the total length is between {}-{} characters.",
                MIN_TITLE_CHARS, MAX_TITLE_CHARS
            ));
            steps.push("Make it sound like a premium product listing, not a keyword list.".to_string());
            out.push_str(&numbered(&steps));
            out.push('\n');
        }
    }
    out
}

/// Append the request for `n` numbered titles.
pub fn with_title_request(prompt: &str, n: usize) -> String {
    format!(
        "{}\n\nTask: Generate {} distinct, professional titles for this product. Output them as a numbered list (1. Title...).",
        prompt, n
    )
}

/// Directive prompt asking for a single improved revision of `title`.
pub fn refinement_prompt(
    title: &str,
    score: &ScoreResult,
    brand: &str,
    main_keyword: &str,
    core_keyword: &str,
) -> String {
    let problems = if score.reasons.is_empty() {
        "none recorded".to_string()
    } else {
        score.reasons.join("; ")
    };
    format!(
        "Improve this product title for marketplace SEO.\n\
         Title: \"{}\"\n\
         Current length: {} characters. Target: {}-{} characters.\n\
         Current SEO score: {}/100. Problems: {}.\n\
         It must include \"{}\", \"{}\" and \"{}\", use Title Case, and contain no commas, periods, colons, semicolons, exclamation or question marks.\n\
         Reply with the revised title only, on a single line.",
        title,
        title.chars().count(),
        MIN_TITLE_CHARS,
        MAX_TITLE_CHARS,
        score.score,
        problems,
        brand,
        main_keyword,
        core_keyword,
    )
}

/// Focus assigned to each of `n` titles, cycling through [`DIVERSITY_FOCI`].
pub fn diversity_plan(n: usize) -> Vec<&'static str> {
    (0..n).map(|i| DIVERSITY_FOCI[i % DIVERSITY_FOCI.len()]).collect()
}

fn constraints(row: &ProductRow, options: &PromptOptions) -> String {
    let brand = row.brand();
    let main = row.main_keyword();
    let core = row.core_keyword();

    let mut items = vec![
        format!(
            "**Length**: {} - {} characters. **THIS IS A HARD LIMIT. IF THE TITLE EXCEEDS {} CHARACTERS, IT WILL FAIL. PRUNE SPECIFICATIONS IF NECESSARY.**",
            MIN_TITLE_CHARS, MAX_TITLE_CHARS, MAX_TITLE_CHARS
        ),
        format!(
            "**Mandatory Keywords**: strictly include \"{}\", \"{}\", and \"{}\".",
            brand, main, core
        ),
    ];

    let clauses = position_clauses(row, &options.positions);
    if options.positions.is_empty() {
        items.push(format!(
            "**SEO Front-Loading**: The title MUST start with \"{} {}\". This is non-negotiable for brand recognition and SEO.",
            brand, main
        ));
    } else if !clauses.is_empty() {
        let mut item = String::from("**Keyword Positions**:");
        for clause in &clauses {
            item.push_str("\n    - ");
            item.push_str(clause);
        }
        items.push(item);
    }

    items.push(
        "**Punctuation**: Do NOT use commas, periods, colons, semicolons, exclamation marks or question marks (ASCII or full-width). Use `-` or `|` only to separate distinct thought blocks."
            .to_string(),
    );
    items.push(
        "**Format**:\n    - Capitalize First Letters (Title Case).\n    - **ACRONYMS**: Always uppercase standard acronyms (e.g., POS, LED, LCD, CPU, RAM, OS)."
            .to_string(),
    );
    items.push(
        "**Readability**:\n    - **NO Redundancy**: Do not repeat the same keyword phrase twice unless used in a different context.\n    - **Fluidity**: Use natural English flow. Incorporate market-specific adjectives and synonyms to extend the title naturally."
            .to_string(),
    );

    let starred: Vec<(&str, &str)> = options
        .starred_fields
        .iter()
        .map(|f| (f.as_str(), row.value(f)))
        .filter(|(_, v)| !v.is_empty())
        .collect();
    if !starred.is_empty() {
        let mut item = String::from(
            "**Starred Fields**: The core information of these fields MUST appear in the title. Paraphrasing is allowed, omission is not:",
        );
        for (field, value) in starred {
            item.push_str(&format!("\n    - {}: \"{}\"", field, value));
        }
        items.push(item);
    }

    format!(
        "CRITICAL CONSTRAINTS (Strict Compliance Required):\n{}\n",
        numbered(&items)
    )
}

/// One clause per configured slot whose keyword is non-empty.
fn position_clauses(row: &ProductRow, positions: &PositionRules) -> Vec<String> {
    Slot::ALL
        .iter()
        .filter_map(|slot| {
            let position = positions.get(*slot)?;
            let keyword = row.value(slot.column());
            if keyword.is_empty() {
                return None;
            }
            Some(format!(
                "\"{}\" must appear at the {} of the title.",
                keyword,
                position.as_str()
            ))
        })
        .collect()
}

fn context_block(row: &ProductRow, external: Option<&str>) -> String {
    let mut lines = Vec::new();
    if let Some(ctx) = external.map(str::trim).filter(|c| !c.is_empty()) {
        lines.push(format!("{}\n{}\n{}", CONTEXT_OPEN, ctx, CONTEXT_CLOSE));
    }
    for (key, value) in row.iter() {
        if MANDATORY_COLUMNS.contains(&key) || RESERVED_COLUMNS.contains(&key) {
            continue;
        }
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        lines.push(format!("- {}: {}", key, value));
    }
    lines.join("\n")
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}
