//! Post-processing: splice validated Mermaid into the markdown export.
//!
//! Each diagram record with a `mermaid_source` replaces the figure
//! placeholder it was discovered from:
//!
//! ```text
//! <!-- image -->      ──▶   **Mermaid Diagram (converted from diagram_1):**
//!
//!                           ```mermaid
//!                           graph TD
//!                               A[…] --> B[…]
//!                           ```
//! ```
//!
//! Records without a matching placeholder are appended at the end of the
//! document. The result then goes through the same deterministic cleanup
//! rules regardless of input: LF line endings, no trailing whitespace, no
//! runs of more than two blank lines, exactly one final newline.

use crate::output::DiagramRecord;
use crate::pipeline::normalize::is_placeholder;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

/// Replace placeholders with Mermaid blocks and normalise the layout.
pub fn integrate_mermaid(markdown: &str, diagrams: &[DiagramRecord]) -> String {
    let s = normalise_line_endings(markdown);
    let lines: Vec<&str> = s.lines().collect();
    let placeholder_lines: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| is_placeholder(l))
        .map(|(i, _)| i)
        .collect();

    let mut replacements: BTreeMap<usize, String> = BTreeMap::new();
    let mut appended: Vec<String> = Vec::new();
    for d in diagrams {
        let Some(ref source) = d.mermaid_source else {
            continue;
        };
        let block = mermaid_block(&d.id, source);
        match d.placeholder.and_then(|p| placeholder_lines.get(p)) {
            Some(&line) if !replacements.contains_key(&line) => {
                debug!("{}: replacing placeholder on line {}", d.id, line + 1);
                replacements.insert(line, block);
            }
            _ => {
                debug!("{}: no placeholder, appending", d.id);
                appended.push(block);
            }
        }
    }

    // Blocks are separated from neighbouring text by exactly one blank line.
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + appended.len() * 6);
    let mut gap_after_block = false;
    for (i, line) in lines.iter().enumerate() {
        match replacements.remove(&i) {
            Some(block) => {
                push_block(&mut out, block);
                gap_after_block = true;
            }
            None => {
                if gap_after_block && !line.trim().is_empty() {
                    out.push(String::new());
                }
                gap_after_block = false;
                out.push((*line).to_string());
            }
        }
    }
    for block in appended {
        push_block(&mut out, block);
    }

    let s = out.join("\n");
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

fn push_block(out: &mut Vec<String>, block: String) {
    if out.last().is_some_and(|l| !l.trim().is_empty()) {
        out.push(String::new());
    }
    out.push(block);
}

/// Heading plus fenced `mermaid` block for one diagram.
pub fn mermaid_block(diagram_id: &str, source: &str) -> String {
    format!(
        "**Mermaid Diagram (converted from {}):**\n\n```mermaid\n{}\n```",
        diagram_id,
        source.trim()
    )
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip invisible Unicode ──────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Ensure file ends with single newline ─────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DiagramClassification, DiagramType, Strategy, SuggestedFormat};

    fn record(id: &str, placeholder: Option<usize>, mermaid: Option<&str>) -> DiagramRecord {
        DiagramRecord {
            id: id.into(),
            page_number: None,
            caption: String::new(),
            description: String::new(),
            diagram_type: DiagramType::Flowchart,
            elements: vec![],
            confidence: 0.9,
            mermaid_source: mermaid.map(str::to_string),
            text_excerpt: String::new(),
            recreation_prompt: None,
            suggested_output_format: SuggestedFormat::Mermaid,
            extracted_data: None,
            classification: DiagramClassification {
                is_convertible: true,
                confidence: 0.9,
                diagram_type: DiagramType::Flowchart,
            },
            strategy: Strategy::External,
            bounding_box: None,
            placeholder,
        }
    }

    #[test]
    fn replaces_matching_placeholder() {
        let md = "# Doc\n\n<!-- image -->\n\ntext\n\n<!-- image -->\n";
        let out = integrate_mermaid(
            md,
            &[record("diagram_2", Some(1), Some("graph TD\n    A --> B"))],
        );
        let expected = "# Doc\n\n<!-- image -->\n\ntext\n\n\
                        **Mermaid Diagram (converted from diagram_2):**\n\n\
                        ```mermaid\ngraph TD\n    A --> B\n```\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn appends_when_no_placeholder_matches() {
        let out = integrate_mermaid("Intro", &[record("diagram_1", None, Some("graph LR\nA-->B"))]);
        assert_eq!(
            out,
            "Intro\n\n**Mermaid Diagram (converted from diagram_1):**\n\n```mermaid\ngraph LR\nA-->B\n```\n"
        );
    }

    #[test]
    fn records_without_mermaid_leave_markdown_alone() {
        let md = "a\r\n<!-- image -->  \r\nb";
        let out = integrate_mermaid(md, &[record("diagram_1", Some(0), None)]);
        assert_eq!(out, "a\n<!-- image -->\nb\n");
    }

    #[test]
    fn second_claim_on_same_placeholder_is_appended() {
        let md = "<!-- image -->";
        let out = integrate_mermaid(
            md,
            &[
                record("diagram_1", Some(0), Some("graph TD\nA-->B")),
                record("diagram_2", Some(0), Some("graph TD\nC-->D")),
            ],
        );
        let first = out.find("diagram_1").unwrap();
        let second = out.find("diagram_2").unwrap();
        assert!(first < second);
        assert!(!out.contains("<!-- image -->"));
    }

    #[test]
    fn collapse_and_final_newline() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
        assert_eq!(ensure_final_newline("hello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
        assert_eq!(remove_invisible_chars("a\u{200B}b"), "ab");
    }
}
