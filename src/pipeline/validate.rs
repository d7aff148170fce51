//! Static Mermaid syntax check.
//!
//! Not a parser: it catches the failure modes seen in synthesized and
//! model-produced sources (missing declaration, unbalanced delimiters,
//! a declaration with no body).

use crate::error::MermaidError;

/// Accepted first-line keywords, compared case-insensitively.
pub const DIAGRAM_KEYWORDS: &[&str] = &[
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram",
    "erDiagram",
];

const DELIMITERS: &[(char, char)] = &[('[', ']'), ('(', ')'), ('{', '}')];
const NODE_MARKERS: &[&str] = &["[", "(", "{", "-->", "---"];

/// Check `source`; `Ok(())` means it may be attached to a record.
pub fn validate(source: &str) -> Result<(), MermaidError> {
    if source.trim().is_empty() {
        return Err(MermaidError::Empty);
    }

    let mut lines = source.lines().map(str::trim).skip_while(|l| l.is_empty());
    let first = lines.next().unwrap_or_default();
    let first_lower = first.to_lowercase();
    if !DIAGRAM_KEYWORDS
        .iter()
        .any(|kw| first_lower.starts_with(&kw.to_lowercase()))
    {
        return Err(MermaidError::UnknownDiagramKeyword(first.to_string()));
    }

    for &(open, close) in DELIMITERS {
        let opened = source.matches(open).count();
        let closed = source.matches(close).count();
        if opened != closed {
            return Err(MermaidError::Unbalanced {
                open,
                close,
                opened,
                closed,
            });
        }
    }

    let has_node = lines
        .filter(|l| !l.is_empty() && !l.starts_with("classDef") && !l.starts_with("class "))
        .any(|l| NODE_MARKERS.iter().any(|m| l.contains(m)));
    if !has_node {
        return Err(MermaidError::NoNodes);
    }
    Ok(())
}

pub fn is_valid(source: &str) -> bool {
    validate(source).is_ok()
}
