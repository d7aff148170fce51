//! Mermaid synthesis: diagram type + extracted tokens → Mermaid source.
//!
//! One generator per diagram type, each a pure function over the token list.
//! The output is only a candidate: [`crate::pipeline::validate`] decides
//! whether it is attached to a record.
//!
//! ```text
//! flowchart     flowchart TD, steps as [rect], decisions as {diamond}
//! architecture  graph TD, [component] (service) [(database)], linear chain, classDefs
//! chart         graph LR, ["label: value"] × ≤5, or a single description node
//! other         keyword density picks flowchart/architecture, else ≤6-node chain
//! ```
//!
//! Every label goes through [`sanitize_label`].

use crate::document::DiagramType;
use crate::pipeline::classify::{contains_any, contains_keyword};
use crate::pipeline::structured::{is_decision, split_tokens};
use crate::prompts::format_number;

const MAX_LABEL_CHARS: usize = 50;
const MAX_CHART_NODES: usize = 5;
const MAX_GENERIC_NODES: usize = 6;

const DATABASE_KEYWORDS: &[&str] = &["database", "db", "storage"];
const SERVICE_KEYWORDS: &[&str] = &["service", "api", "server"];
const FLOW_HINTS: &[&str] = &["flow", "process", "step", "sequence"];
const ARCHITECTURE_HINTS: &[&str] = &["system", "architecture", "component", "service"];

const ARCHITECTURE_CLASS_DEFS: &[&str] = &[
    "    classDef compute fill:#FF9900,color:#fff",
    "    classDef storage fill:#569A31,color:#fff",
    "    classDef database fill:#205081,color:#fff",
    "    classDef networking fill:#8C4FFF,color:#fff",
];

/// Generate candidate Mermaid source for a figure.
pub fn synthesize(diagram_type: DiagramType, description: &str, elements: &[String]) -> String {
    match diagram_type {
        DiagramType::Flowchart => flowchart(description, elements),
        DiagramType::Architecture => architecture(description, elements),
        DiagramType::Chart => chart(description, elements),
        _ => generic(description, elements),
    }
}

/// Make `text` safe inside a Mermaid node label.
///
/// Quotes become apostrophes, brackets and braces become parentheses, pipes
/// become hyphens, line breaks become spaces; anything over 50 characters is
/// cut to 47 plus `...`. Empty input yields `Unknown`.
pub fn sanitize_label(text: &str) -> String {
    let cleaned: String = text
        .trim()
        .chars()
        .map(|c| match c {
            '"' => '\'',
            '[' | '{' => '(',
            ']' | '}' => ')',
            '|' => '-',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect();

    let cleaned = if cleaned.chars().count() > MAX_LABEL_CHARS {
        let head: String = cleaned.chars().take(MAX_LABEL_CHARS - 3).collect();
        format!("{head}...")
    } else {
        cleaned
    };

    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "Unknown".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Spreadsheet-style node ids: A..Z, AA..AZ, BA..
pub fn node_id(index: usize) -> String {
    let mut n = index + 1;
    let mut id = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        id.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    id.reverse();
    String::from_utf8(id).unwrap_or_else(|_| format!("N{index}"))
}

fn chain(lines: &mut Vec<String>, ids: &[String]) {
    for pair in ids.windows(2) {
        lines.push(format!("    {} --> {}", pair[0], pair[1]));
    }
}

// ── Flowchart ────────────────────────────────────────────────────────────

fn flowchart(description: &str, elements: &[String]) -> String {
    let (decisions, steps): (Vec<&String>, Vec<&String>) =
        elements.iter().partition(|t| is_decision(t));

    let mut lines = vec!["flowchart TD".to_string()];
    if steps.is_empty() && decisions.is_empty() {
        lines.push(format!("    A[{}]", sanitize_label(description)));
        return lines.join("\n");
    }

    let step_ids: Vec<String> = (0..steps.len()).map(node_id).collect();
    let decision_ids: Vec<String> = (steps.len()..steps.len() + decisions.len())
        .map(node_id)
        .collect();

    for (id, step) in step_ids.iter().zip(&steps) {
        lines.push(format!("    {id}[{}]", sanitize_label(step)));
    }
    for (id, decision) in decision_ids.iter().zip(&decisions) {
        lines.push(format!("    {id}{{{}}}", sanitize_label(decision)));
    }

    chain(&mut lines, &step_ids);
    // Only the first decision is linked, from the last step.
    if let (Some(last), Some(first)) = (step_ids.last(), decision_ids.first()) {
        lines.push(format!("    {last} --> {first}"));
    }
    lines.join("\n")
}

// ── Architecture ─────────────────────────────────────────────────────────

fn architecture(description: &str, elements: &[String]) -> String {
    let mut components = Vec::new();
    let mut services = Vec::new();
    let mut databases = Vec::new();
    for text in elements {
        let lower = text.to_lowercase();
        if contains_any(&lower, DATABASE_KEYWORDS) {
            databases.push(text);
        } else if contains_any(&lower, SERVICE_KEYWORDS) {
            services.push(text);
        } else {
            components.push(text);
        }
    }

    let mut lines = vec!["graph TD".to_string()];
    let mut ids = Vec::with_capacity(elements.len());

    for text in &components {
        let id = node_id(ids.len());
        lines.push(format!("    {id}[{}]", sanitize_label(text)));
        ids.push(id);
    }
    for text in &services {
        let id = node_id(ids.len());
        lines.push(format!("    {id}({})", sanitize_label(text)));
        ids.push(id);
    }
    for text in &databases {
        let id = node_id(ids.len());
        lines.push(format!("    {id}[({})]", sanitize_label(text)));
        ids.push(id);
    }
    if ids.is_empty() {
        lines.push(format!("    A[{}]", sanitize_label(description)));
    }
    chain(&mut lines, &ids);

    lines.push(String::new());
    lines.extend(ARCHITECTURE_CLASS_DEFS.iter().map(|s| s.to_string()));
    lines.join("\n")
}

// ── Chart ────────────────────────────────────────────────────────────────

fn chart(description: &str, elements: &[String]) -> String {
    let (numbers, labels) = split_tokens(elements);
    if numbers.is_empty() || labels.is_empty() {
        return format!("graph TD\n    A[\"{}\"]", sanitize_label(description));
    }

    let mut lines = vec!["graph LR".to_string()];
    let ids: Vec<String> = labels
        .iter()
        .zip(&numbers)
        .take(MAX_CHART_NODES)
        .enumerate()
        .map(|(i, (label, value))| {
            let id = node_id(i);
            lines.push(format!(
                "    {id}[\"{}: {}\"]",
                sanitize_label(label),
                format_number(*value)
            ));
            id
        })
        .collect();
    chain(&mut lines, &ids);
    lines.join("\n")
}

// ── Generic ──────────────────────────────────────────────────────────────

fn generic(description: &str, elements: &[String]) -> String {
    let text = format!("{} {}", description, elements.join(" ")).to_lowercase();
    let density = |hints: &[&str]| hints.iter().filter(|h| contains_keyword(&text, h)).count();
    let flow = density(FLOW_HINTS);
    let arch = density(ARCHITECTURE_HINTS);

    if flow > 0 && flow >= arch {
        return flowchart(description, elements);
    }
    if arch > 0 {
        return architecture(description, elements);
    }

    let mut lines = vec!["graph TD".to_string()];
    if elements.is_empty() {
        lines.push(format!("    A[{}]", sanitize_label(description)));
        return lines.join("\n");
    }
    let ids: Vec<String> = elements
        .iter()
        .take(MAX_GENERIC_NODES)
        .enumerate()
        .map(|(i, text)| {
            let id = node_id(i);
            lines.push(format!("    {id}[{}]", sanitize_label(text)));
            id
        })
        .collect();
    chain(&mut lines, &ids);
    lines.join("\n")
}
