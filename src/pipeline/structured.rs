//! Structured-data synthesis: free-text tokens → typed payload + recreation prompt.
//!
//! Tokens are split into numeric values (`\d+\.?\d*`) and labels (the token
//! with its numbers removed, kept when longer than one character). The
//! payload shape depends on the diagram type.

use crate::document::{DiagramType, SuggestedFormat};
use crate::pipeline::classify::contains_any;
use crate::prompts;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.?\d*").unwrap());

/// Words that mark a flowchart token as a decision.
pub const DECISION_KEYWORDS: &[&str] = &["if", "then", "else", "decision", "choose", "whether"];

/// Words that mark an architecture token as a service.
const SERVICE_KEYWORDS: &[&str] = &["service", "api", "app", "database"];

/// Per-type payload extracted from a figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExtractedData {
    Chart {
        data_points: Vec<f64>,
        labels: Vec<String>,
        chart_elements: Vec<String>,
    },
    Architecture {
        components: Vec<String>,
        connections: Vec<String>,
        services: Vec<String>,
    },
    Flowchart {
        steps: Vec<String>,
        decision_points: Vec<String>,
        processes: Vec<String>,
    },
    Table {
        cells: Vec<String>,
    },
    Generic {
        text_elements: Vec<String>,
        numerical_data: Vec<f64>,
        labels: Vec<String>,
    },
}

/// Payload, prompt and preferred output format for one figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub extracted_data: ExtractedData,
    pub recreation_prompt: String,
    pub suggested_format: SuggestedFormat,
}

/// True when `text` reads like a branch: a question or a decision word.
pub fn is_decision(text: &str) -> bool {
    text.contains('?') || contains_any(&text.to_lowercase(), DECISION_KEYWORDS)
}

/// Numbers found in every token, and each token's non-numeric remainder.
pub fn split_tokens<S: AsRef<str>>(tokens: &[S]) -> (Vec<f64>, Vec<String>) {
    let mut numbers = Vec::new();
    let mut labels = Vec::new();
    for token in tokens {
        let token = token.as_ref();
        numbers.extend(
            RE_NUMBER
                .find_iter(token)
                .filter_map(|m| m.as_str().parse::<f64>().ok()),
        );
        let label = RE_NUMBER.replace_all(token, "");
        let label = label.trim();
        if label.chars().count() > 1 {
            labels.push(label.to_string());
        }
    }
    (numbers, labels)
}

/// Build the structured payload and recreation prompt for `tokens`.
pub fn synthesize(tokens: &[String], diagram_type: DiagramType, caption: &str) -> Synthesis {
    let (numbers, labels) = split_tokens(tokens);

    match diagram_type {
        DiagramType::Chart => {
            let data_points: Vec<f64> = numbers.into_iter().take(10).collect();
            let labels: Vec<String> = labels.into_iter().take(10).collect();
            Synthesis {
                recreation_prompt: prompts::chart_recreation_prompt(&data_points, &labels, tokens),
                extracted_data: ExtractedData::Chart {
                    data_points,
                    labels,
                    chart_elements: tokens.to_vec(),
                },
                suggested_format: SuggestedFormat::ChartSpec,
            }
        }
        DiagramType::Architecture => {
            let components: Vec<String> = labels
                .into_iter()
                .filter(|l| l.chars().count() > 2)
                .collect();
            let services: Vec<String> = tokens
                .iter()
                .filter(|t| contains_any(&t.to_lowercase(), SERVICE_KEYWORDS))
                .cloned()
                .collect();
            Synthesis {
                recreation_prompt: prompts::architecture_recreation_prompt(&components, &services),
                extracted_data: ExtractedData::Architecture {
                    components,
                    connections: Vec::new(),
                    services,
                },
                suggested_format: SuggestedFormat::Mermaid,
            }
        }
        DiagramType::Flowchart => {
            let (decision_points, processes): (Vec<String>, Vec<String>) =
                tokens.iter().cloned().partition(|t| is_decision(t));
            Synthesis {
                recreation_prompt: prompts::flowchart_recreation_prompt(
                    tokens,
                    &decision_points,
                    &processes,
                ),
                extracted_data: ExtractedData::Flowchart {
                    steps: tokens.to_vec(),
                    decision_points,
                    processes,
                },
                suggested_format: SuggestedFormat::Mermaid,
            }
        }
        DiagramType::Table => Synthesis {
            recreation_prompt: prompts::table_recreation_prompt(caption, tokens),
            extracted_data: ExtractedData::Table {
                cells: tokens.to_vec(),
            },
            suggested_format: SuggestedFormat::Markdown,
        },
        _ => Synthesis {
            recreation_prompt: prompts::generic_recreation_prompt(tokens, &numbers, &labels),
            extracted_data: ExtractedData::Generic {
                text_elements: tokens.to_vec(),
                numerical_data: numbers,
                labels,
            },
            suggested_format: SuggestedFormat::Mermaid,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn split_tokens_separates_numbers_and_labels() {
        let (numbers, labels) = split_tokens(&["Q1 120", "Q2 95.5", "7", "x"]);
        assert_eq!(numbers, vec![1.0, 120.0, 2.0, 95.5, 7.0]);
        // "Q" and "x" are single characters once the digits are gone.
        assert!(labels.is_empty(), "got: {labels:?}");
    }

    #[test]
    fn split_tokens_keeps_multi_char_labels() {
        let (numbers, labels) = split_tokens(&["Revenue 150", "Costs: 90", "Growth"]);
        assert_eq!(numbers, vec![150.0, 90.0]);
        assert_eq!(labels, vec!["Revenue", "Costs:", "Growth"]);
    }

    #[test]
    fn chart_payload_uses_chart_spec() {
        let syn = synthesize(&s(&["Revenue 150", "Costs 90"]), DiagramType::Chart, "");
        assert_eq!(syn.suggested_format, SuggestedFormat::ChartSpec);
        match syn.extracted_data {
            ExtractedData::Chart {
                data_points,
                labels,
                chart_elements,
            } => {
                assert_eq!(data_points, vec![150.0, 90.0]);
                assert_eq!(labels, vec!["Revenue", "Costs"]);
                assert_eq!(chart_elements.len(), 2);
            }
            other => panic!("expected chart payload, got {other:?}"),
        }
        assert!(syn.recreation_prompt.contains("Chart.js"));
    }

    #[test]
    fn architecture_payload_filters_services() {
        let syn = synthesize(
            &s(&["API Service", "User Database", "Cache", "UI"]),
            DiagramType::Architecture,
            "",
        );
        match syn.extracted_data {
            ExtractedData::Architecture {
                components,
                connections,
                services,
            } => {
                assert_eq!(components, vec!["API Service", "User Database", "Cache"]);
                assert!(connections.is_empty());
                assert_eq!(services, vec!["API Service", "User Database"]);
            }
            other => panic!("expected architecture payload, got {other:?}"),
        }
        assert_eq!(syn.suggested_format, SuggestedFormat::Mermaid);
    }

    #[test]
    fn flowchart_payload_splits_decisions() {
        let syn = synthesize(
            &s(&["Start", "Valid input?", "Decision: retry", "Save"]),
            DiagramType::Flowchart,
            "",
        );
        match syn.extracted_data {
            ExtractedData::Flowchart {
                steps,
                decision_points,
                processes,
            } => {
                assert_eq!(steps.len(), 4);
                assert_eq!(decision_points, vec!["Valid input?", "Decision: retry"]);
                assert_eq!(processes, vec!["Start", "Save"]);
            }
            other => panic!("expected flowchart payload, got {other:?}"),
        }
    }

    #[test]
    fn table_type_suggests_markdown() {
        let syn = synthesize(&s(&["a", "b"]), DiagramType::Table, "Results");
        assert_eq!(syn.suggested_format, SuggestedFormat::Markdown);
        assert!(syn.recreation_prompt.contains("Caption: Results"));
    }

    #[test]
    fn unknown_type_is_generic() {
        let syn = synthesize(&s(&["Node 1"]), DiagramType::Unknown, "");
        assert!(matches!(syn.extracted_data, ExtractedData::Generic { .. }));
        let json = serde_json::to_value(&syn.extracted_data).unwrap();
        assert_eq!(json["type"], "generic");
    }

    #[test]
    fn decision_detection_uses_whole_words() {
        assert!(is_decision("Is it valid?"));
        assert!(is_decision("if approved"));
        assert!(!is_decision("Verify config"));
    }
}
