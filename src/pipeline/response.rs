//! Parsing of vision-model responses into an [`AnalysisResult`].
//!
//! A response is either a JSON object (fields optional, named defaults) or
//! free text that should hold one fenced Mermaid block:
//!
//! ```text
//! "{…}"                 → JSON branch
//! "```mermaid … ```"     → fence extracted, duplicate declarations dropped
//! "…no diagram…"        → diagram_type none, confidence 0.9
//! anything else         → description only, confidence 0.3
//! ```

use crate::document::{truncate_chars, AnalysisResult, DiagramType, Element, Strategy};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// ```` ``` mermaid … ``` ```` with any whitespace around the language tag.
static RE_MERMAID_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```\s*mermaid\s*(.*?)\s*```").unwrap());

/// `graph TD`, `flowchart LR`, …
static RE_DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(graph|flowchart)\s+(TD|LR|TB|RL|BT|UD)\b").unwrap());

const JSON_DEFAULT_CONFIDENCE: f64 = 0.8;
const NO_DIAGRAM_CONFIDENCE: f64 = 0.9;
const MERMAID_CONFIDENCE: f64 = 0.8;
const TEXT_ONLY_CONFIDENCE: f64 = 0.3;

const NO_DIAGRAM_PHRASES: &[&str] = &["no clear diagram detected", "no diagram"];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonElement {
    Text(String),
    Number(f64),
    Object {
        #[serde(default, rename = "type")]
        kind: Option<String>,
        #[serde(default)]
        content: Option<serde_json::Value>,
    },
}

impl JsonElement {
    fn into_element(self) -> Option<Element> {
        match self {
            JsonElement::Text(s) => Some(Element::classify(s)),
            JsonElement::Number(n) => Some(Element::number(crate::prompts::format_number(n))),
            JsonElement::Object { kind, content } => {
                let content = match content? {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                match kind.as_deref() {
                    Some("number") => Some(Element::number(content)),
                    _ => Some(Element::text(content)),
                }
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct JsonAnalysis {
    description: Option<String>,
    #[serde(alias = "type")]
    diagram_type: Option<String>,
    #[serde(default)]
    elements: Vec<JsonElement>,
    confidence: Option<f64>,
    #[serde(alias = "mermaid")]
    mermaid_code: Option<String>,
    text_representation: Option<String>,
}

/// Parse a model response produced by `strategy`.
pub fn parse_response(content: &str, strategy: Strategy) -> AnalysisResult {
    let trimmed = content.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        if let Ok(json) = serde_json::from_str::<JsonAnalysis>(trimmed) {
            return from_json(json, trimmed, strategy);
        }
    }
    from_text(trimmed, strategy)
}

fn from_json(json: JsonAnalysis, content: &str, strategy: Strategy) -> AnalysisResult {
    let diagram_type = json
        .diagram_type
        .as_deref()
        .map(DiagramType::from_label)
        .unwrap_or(DiagramType::Diagram);
    let mut result = AnalysisResult::new(
        strategy,
        diagram_type,
        json.description
            .unwrap_or_else(|| truncate_chars(content, 200)),
    )
    .with_confidence(json.confidence.unwrap_or(JSON_DEFAULT_CONFIDENCE));
    result.elements = json
        .elements
        .into_iter()
        .filter_map(JsonElement::into_element)
        .collect();
    result.mermaid_source = json
        .mermaid_code
        .as_deref()
        .and_then(|code| extract_mermaid(code).or_else(|| clean_block(code)));
    result.text_excerpt = json
        .text_representation
        .unwrap_or_else(|| truncate_chars(content, 500));
    result
}

fn from_text(content: &str, strategy: Strategy) -> AnalysisResult {
    if let Some(mermaid) = extract_mermaid(content) {
        let diagram_type = if mermaid.to_lowercase().starts_with("flowchart") {
            DiagramType::Flowchart
        } else {
            DiagramType::Diagram
        };
        let outside = RE_MERMAID_FENCE.replace_all(content, "");
        let outside = outside.trim();
        let description = if outside.is_empty() {
            "Diagram analysis completed".to_string()
        } else {
            truncate_chars(outside, 200)
        };
        let mut result = AnalysisResult::new(strategy, diagram_type, description)
            .with_confidence(MERMAID_CONFIDENCE);
        result.text_excerpt = truncate_chars(content, 500);
        result.mermaid_source = Some(mermaid);
        return result;
    }

    let lower = content.to_lowercase();
    if NO_DIAGRAM_PHRASES.iter().any(|p| lower.contains(p)) {
        let mut result = AnalysisResult::new(
            strategy,
            DiagramType::None,
            "No clear diagram detected in image",
        )
        .with_confidence(NO_DIAGRAM_CONFIDENCE);
        result.text_excerpt = truncate_chars(content, 200);
        return result;
    }

    // Fence present but empty after cleanup, or plain prose.
    let prose = RE_MERMAID_FENCE.replace_all(content, "");
    let prose = prose.trim();
    let description = if prose.is_empty() {
        "Diagram analysis completed".to_string()
    } else {
        truncate_chars(prose, 200)
    };
    let mut result = AnalysisResult::new(strategy, DiagramType::Diagram, description)
        .with_confidence(TEXT_ONLY_CONFIDENCE);
    result.text_excerpt = truncate_chars(content, 500);
    result
}

/// Extract and clean the first fenced Mermaid block in `content`.
///
/// Returns `None` when there is no fence or when only a declaration is left.
pub fn extract_mermaid(content: &str) -> Option<String> {
    let caps = RE_MERMAID_FENCE.captures(content)?;
    clean_block(caps.get(1)?.as_str())
}

/// Trim lines, drop blanks, keep only the first `graph|flowchart <dir>` line.
fn clean_block(block: &str) -> Option<String> {
    let mut seen_declaration = false;
    let mut lines: Vec<&str> = Vec::new();
    for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if RE_DECLARATION.is_match(line) {
            if seen_declaration {
                continue;
            }
            seen_declaration = true;
        }
        lines.push(line);
    }
    if lines.len() > 1 {
        Some(lines.join("\n"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ElementKind;

    #[test]
    fn duplicate_declaration_is_stripped() {
        let r = parse_response("```mermaid\ngraph TD\ngraph TD\nA-->B\n```", Strategy::External);
        assert_eq!(r.mermaid_source.as_deref(), Some("graph TD\nA-->B"));
        assert_eq!(r.diagram_type, DiagramType::Diagram);
        assert_eq!(r.confidence, 0.8);
        assert_eq!(r.strategy, Strategy::External);
    }

    #[test]
    fn tolerant_fence_with_spaces_and_case() {
        let r = parse_response(
            "Here you go:\n``` Mermaid \n  flowchart LR\n    A[In] --> B[Out]\n```",
            Strategy::Local,
        );
        assert_eq!(
            r.mermaid_source.as_deref(),
            Some("flowchart LR\nA[In] --> B[Out]")
        );
        assert_eq!(r.diagram_type, DiagramType::Flowchart);
        assert_eq!(r.description, "Here you go:");
    }

    #[test]
    fn declaration_only_block_is_discarded() {
        let r = parse_response("```mermaid\ngraph TD\n\ngraph TD\n```", Strategy::External);
        assert!(r.mermaid_source.is_none());
        assert_eq!(r.confidence, 0.3);
    }

    #[test]
    fn no_diagram_marker() {
        let r = parse_response("<!-- No clear diagram detected -->", Strategy::External);
        assert_eq!(r.diagram_type, DiagramType::None);
        assert_eq!(r.confidence, 0.9);
        assert!(r.mermaid_source.is_none());
        assert_eq!(r.description, "No clear diagram detected in image");
    }

    #[test]
    fn lowercase_no_diagram_phrase() {
        let r = parse_response("Sorry, there is no diagram in this photo.", Strategy::External);
        assert_eq!(r.diagram_type, DiagramType::None);
    }

    #[test]
    fn prose_without_fence() {
        let r = parse_response("A photo of two people shaking hands.", Strategy::External);
        assert!(r.mermaid_source.is_none());
        assert_eq!(r.diagram_type, DiagramType::Diagram);
        assert_eq!(r.confidence, 0.3);
        assert_eq!(r.description, "A photo of two people shaking hands.");
    }

    #[test]
    fn json_fields_and_defaults() {
        let r = parse_response(
            r#"{"description": "Login flow", "diagram_type": "flowchart",
                "elements": ["Start", 42, {"type": "text", "content": "End"}],
                "mermaid_code": "```mermaid\nflowchart TD\nA-->B\n```"}"#,
            Strategy::External,
        );
        assert_eq!(r.description, "Login flow");
        assert_eq!(r.diagram_type, DiagramType::Flowchart);
        assert_eq!(r.confidence, 0.8);
        assert_eq!(r.elements.len(), 3);
        assert_eq!(r.elements[1].kind, ElementKind::Number);
        assert_eq!(r.elements[1].content, "42");
        assert_eq!(r.mermaid_source.as_deref(), Some("flowchart TD\nA-->B"));
    }

    #[test]
    fn json_without_fields_uses_defaults() {
        let r = parse_response(r#"{"confidence": 0.4}"#, Strategy::Local);
        assert_eq!(r.diagram_type, DiagramType::Diagram);
        assert_eq!(r.confidence, 0.4);
        assert_eq!(r.description, r#"{"confidence": 0.4}"#);
        assert!(r.elements.is_empty());
        assert!(r.mermaid_source.is_none());
    }

    #[test]
    fn json_raw_mermaid_without_fence() {
        let r = parse_response(
            r#"{"mermaid_code": "graph LR\nA --> B"}"#,
            Strategy::External,
        );
        assert_eq!(r.mermaid_source.as_deref(), Some("graph LR\nA --> B"));
    }

    #[test]
    fn broken_json_falls_back_to_text() {
        let r = parse_response("{not json, no diagram}", Strategy::External);
        assert_eq!(r.diagram_type, DiagramType::None);
    }
}
