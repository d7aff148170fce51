//! Figure classification: keyword scoring, no learned model.
//!
//! Both stages are **heuristic, not semantic**: they count keyword hits in
//! captions, descriptions and extracted text. A photo captioned "system
//! overview" will be judged convertible, a diagram captioned "dashboard"
//! will not. Rules are declarative `(keywords, category, weight)` tables so
//! they can be tested and tuned without touching control flow.
//!
//! ```text
//! caption + alt_text ──▶ classify_type ──▶ DiagramType (first table hit wins)
//!
//! type + description + caption + elements
//!                    ──▶ classify_convertibility ──▶ DiagramClassification
//!                         score(diagram) vs score(screenshot), tie → type
//! ```

use crate::document::{DiagramClassification, DiagramType, Element};

/// One row of a keyword table.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule<C: 'static> {
    pub keywords: &'static [&'static str],
    pub category: C,
    pub weight: u32,
}

impl<C> KeywordRule<C> {
    /// Weighted number of this rule's keywords found in `text`.
    pub fn score(&self, text: &str) -> u32 {
        self.keywords
            .iter()
            .filter(|kw| contains_keyword(text, kw))
            .count() as u32
            * self.weight
    }
}

// ── Type rules (priority order) ──────────────────────────────────────────

/// Scanned top to bottom; the first rule with any hit decides the type.
pub const TYPE_RULES: &[KeywordRule<DiagramType>] = &[
    KeywordRule {
        keywords: &["flowchart", "flow chart", "process", "workflow"],
        category: DiagramType::Flowchart,
        weight: 1,
    },
    KeywordRule {
        keywords: &["chart", "graph", "plot"],
        category: DiagramType::Chart,
        weight: 1,
    },
    KeywordRule {
        keywords: &["diagram", "schematic", "architecture"],
        category: DiagramType::Diagram,
        weight: 1,
    },
    KeywordRule {
        keywords: &["table", "matrix"],
        category: DiagramType::Table,
        weight: 1,
    },
    KeywordRule {
        keywords: &["map", "layout", "plan"],
        category: DiagramType::Map,
        weight: 1,
    },
];

// ── Convertibility rules ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convertibility {
    Diagram,
    Screenshot,
}

pub const CONVERTIBILITY_RULES: &[KeywordRule<Convertibility>] = &[
    KeywordRule {
        keywords: &[
            "architecture",
            "overview",
            "flow",
            "diagram",
            "pipeline",
            "infrastructure",
            "flowchart",
            "process",
            "workflow",
            "system",
            "component",
            "service",
            "database",
            "api",
            "network",
            "sequence",
            "relationship",
            "structure",
        ],
        category: Convertibility::Diagram,
        weight: 1,
    },
    KeywordRule {
        keywords: &[
            "screenshot",
            "terminal",
            "console",
            "ui",
            "interface",
            "browser",
            "window",
            "desktop",
            "menu",
            "button",
            "form",
            "dialog",
            "popup",
            "configuration",
            "settings",
            "dashboard",
            "output",
            "result",
        ],
        category: Convertibility::Screenshot,
        weight: 1,
    },
];

/// Confidence when the two scores tie and the type decides.
const TIE_CONFIDENCE: f64 = 0.7;
/// Confidence for a tie with an uninformative type; leans toward converting.
const TIE_DEFAULT_CONFIDENCE: f64 = 0.6;

/// Match `keyword` in lower-cased `text`.
///
/// Keywords of three characters or fewer ("ui", "api", "db", "if") must
/// stand as a whole word; longer keywords match as substrings so that
/// "workflows" still counts as "workflow".
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    if keyword.chars().count() > 3 {
        return text.contains(keyword);
    }
    text.match_indices(keyword).any(|(start, m)| {
        let before = text[..start].chars().next_back();
        let after = text[start + m.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// True if any of `keywords` occurs in `text` (see [`contains_keyword`]).
pub fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| contains_keyword(text, kw))
}

/// Type from caption and alt text; `Unknown` when no rule matches.
pub fn classify_type(caption: &str, alt_text: &str) -> DiagramType {
    let text = format!("{caption} {alt_text}").to_lowercase();
    TYPE_RULES
        .iter()
        .find(|rule| rule.score(&text) > 0)
        .map(|rule| rule.category)
        .unwrap_or(DiagramType::Unknown)
}

/// Decide whether a figure is a reconstructable diagram or a screenshot/photo.
pub fn classify_convertibility(
    diagram_type: DiagramType,
    description: &str,
    caption: &str,
    elements: &[Element],
) -> DiagramClassification {
    let mut text = format!("{} {} {}", diagram_type.as_str(), description, caption);
    for el in elements {
        text.push(' ');
        text.push_str(&el.content);
    }
    let text = text.to_lowercase();

    let score = |wanted: Convertibility| -> u32 {
        CONVERTIBILITY_RULES
            .iter()
            .filter(|r| r.category == wanted)
            .map(|r| r.score(&text))
            .sum()
    };
    let diagram = score(Convertibility::Diagram);
    let screenshot = score(Convertibility::Screenshot);

    let (is_convertible, confidence) = if diagram != screenshot {
        let margin = diagram.abs_diff(screenshot) as f64;
        (diagram > screenshot, round2((0.7 + 0.1 * margin).min(0.9)))
    } else {
        match diagram_type {
            DiagramType::Flowchart
            | DiagramType::Architecture
            | DiagramType::Diagram
            | DiagramType::Chart => (true, TIE_CONFIDENCE),
            DiagramType::Screenshot => (false, TIE_CONFIDENCE),
            _ => (true, TIE_DEFAULT_CONFIDENCE),
        }
    };

    DiagramClassification {
        is_convertible,
        confidence,
        diagram_type,
    }
}

/// 0.7 + 0.1 is 0.7999… in binary; thresholds compare against 0.8.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
