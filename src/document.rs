//! Canonical document artifacts.
//!
//! The normalizer maps every upstream shape onto these types; everything
//! downstream (renderer, classifier, dispatcher, synthesizer) reads only
//! these, never raw JSON.

use crate::pipeline::structured::Synthesis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rectangle in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A table detected by the upstream engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// `table_{n}`, 1-based in discovery order.
    pub id: String,
    pub page_number: Option<u32>,
    pub caption: String,
    pub headers: Vec<String>,
    /// Rows as observed. Rendering pads or truncates them to `headers.len()`.
    pub rows: Vec<Vec<String>>,
    pub bounding_box: Option<BoundingBox>,
}

impl Table {
    /// Build a table, synthesizing `Column 1..N` headers from the first row
    /// when the upstream engine supplied none.
    pub fn new(
        id: impl Into<String>,
        page_number: Option<u32>,
        caption: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        bounding_box: Option<BoundingBox>,
    ) -> Self {
        let headers = if headers.is_empty() {
            synthesize_headers(&rows)
        } else {
            headers
        };
        Self {
            id: id.into(),
            page_number,
            caption: caption.into(),
            headers,
            rows,
            bounding_box,
        }
    }
}

/// `Column 1..N` where N is the width of the first row.
pub fn synthesize_headers(rows: &[Vec<String>]) -> Vec<String> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    (1..=width).map(|i| format!("Column {i}")).collect()
}

/// A visual element considered for diagram recreation.
#[derive(Clone, PartialEq)]
pub struct Figure {
    /// `diagram_{n}`, 1-based in discovery order.
    pub id: String,
    pub page_number: Option<u32>,
    pub caption: String,
    pub alt_text: String,
    /// Pixel data, when the engine could supply it.
    pub raw_bytes: Option<Vec<u8>>,
    /// Text window around the figure's markdown placeholder, or text the
    /// upstream engine attached to it.
    pub surrounding_text: Option<String>,
    /// Text the engine recognised inside the figure.
    pub text_fragments: Vec<String>,
    pub bounding_box: Option<BoundingBox>,
    /// Ordinal of the matching `<!-- image -->` placeholder in the markdown export.
    pub placeholder: Option<usize>,
}

impl Figure {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            page_number: None,
            caption: String::new(),
            alt_text: String::new(),
            raw_bytes: None,
            surrounding_text: None,
            text_fragments: Vec::new(),
            bounding_box: None,
            placeholder: None,
        }
    }

    pub fn has_bytes(&self) -> bool {
        self.raw_bytes.as_ref().is_some_and(|b| !b.is_empty())
    }

    pub fn has_context(&self) -> bool {
        self.surrounding_text
            .as_ref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// A figure with neither pixels nor surrounding text cannot be analysed.
    pub fn is_analyzable(&self) -> bool {
        self.has_bytes() || self.has_context()
    }
}

impl fmt::Debug for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Figure")
            .field("id", &self.id)
            .field("page_number", &self.page_number)
            .field("caption", &self.caption)
            .field("alt_text", &self.alt_text)
            .field("raw_bytes", &self.raw_bytes.as_ref().map(|b| b.len()))
            .field("surrounding_text", &self.surrounding_text)
            .field("text_fragments", &self.text_fragments)
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

// ── Classification ───────────────────────────────────────────────────────

/// Diagram category shared by the classifier and every analysis strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramType {
    Flowchart,
    Architecture,
    Chart,
    /// Generic diagram (schematic, architecture-like wording without a clear sub-type).
    Diagram,
    Table,
    Map,
    Screenshot,
    #[default]
    Unknown,
    /// The vision model stated there is no diagram.
    None,
    /// Analysis failed and fallback was disabled.
    Error,
}

impl DiagramType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramType::Flowchart => "flowchart",
            DiagramType::Architecture => "architecture",
            DiagramType::Chart => "chart",
            DiagramType::Diagram => "diagram",
            DiagramType::Table => "table",
            DiagramType::Map => "map",
            DiagramType::Screenshot => "screenshot",
            DiagramType::Unknown => "unknown",
            DiagramType::None => "none",
            DiagramType::Error => "error",
        }
    }

    /// Lenient parse of a model-supplied type label.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "flowchart" | "flow chart" | "flow" | "process" => DiagramType::Flowchart,
            "architecture" | "system" => DiagramType::Architecture,
            "chart" | "graph" | "plot" | "bar chart" | "line chart" | "pie chart" => {
                DiagramType::Chart
            }
            "diagram" | "schematic" => DiagramType::Diagram,
            "table" | "matrix" => DiagramType::Table,
            "map" | "layout" | "plan" => DiagramType::Map,
            "screenshot" | "interface" | "ui" => DiagramType::Screenshot,
            "none" => DiagramType::None,
            "error" => DiagramType::Error,
            _ => DiagramType::Unknown,
        }
    }
}

impl fmt::Display for DiagramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of the convertibility classifier. Computed once per figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagramClassification {
    pub is_convertible: bool,
    pub confidence: f64,
    pub diagram_type: DiagramType,
}

// ── Analysis ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Text,
    Number,
}

/// One token extracted from a figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub kind: ElementKind,
    pub content: String,
}

impl Element {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Text,
            content: content.into(),
        }
    }

    pub fn number(content: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Number,
            content: content.into(),
        }
    }

    /// Number when the whole token parses as one, text otherwise.
    pub fn classify(content: impl Into<String>) -> Self {
        let content = content.into();
        if content.trim().parse::<f64>().is_ok() {
            Self::number(content)
        } else {
            Self::text(content)
        }
    }
}

/// Analysis stage that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Remote chat-completions vision service.
    External,
    /// Local vision-capable model through `edgequake-llm`.
    Local,
    /// OCR over the raw bytes.
    Basic,
    /// Heuristics over the figure's surrounding text.
    Context,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::External => "EXTERNAL",
            Strategy::Local => "LOCAL",
            Strategy::Basic => "BASIC",
            Strategy::Context => "CONTEXT",
        };
        f.write_str(s)
    }
}

/// Output format a downstream consumer should rebuild the figure in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestedFormat {
    #[default]
    Mermaid,
    Markdown,
    ChartSpec,
}

impl SuggestedFormat {
    /// Format name used inside recreation prompts.
    pub fn prompt_name(&self) -> &'static str {
        match self {
            SuggestedFormat::Mermaid => "mermaid",
            SuggestedFormat::Markdown => "markdown",
            SuggestedFormat::ChartSpec => "chart.js",
        }
    }

    pub fn for_type(diagram_type: DiagramType) -> Self {
        match diagram_type {
            DiagramType::Chart => SuggestedFormat::ChartSpec,
            DiagramType::Table => SuggestedFormat::Markdown,
            _ => SuggestedFormat::Mermaid,
        }
    }
}

/// The common result of every analysis strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub description: String,
    pub diagram_type: DiagramType,
    pub elements: Vec<Element>,
    pub confidence: f64,
    pub mermaid_source: Option<String>,
    pub text_excerpt: String,
    pub strategy: Strategy,
    /// Structured payload and recreation prompt, when the strategy built one.
    pub synthesis: Option<Synthesis>,
}

impl AnalysisResult {
    pub fn new(strategy: Strategy, diagram_type: DiagramType, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            diagram_type,
            elements: Vec::new(),
            confidence: 0.0,
            mermaid_source: None,
            text_excerpt: String::new(),
            strategy,
            synthesis: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// Cut `s` to at most `max` characters, on a char boundary.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
