//! Externally visible records produced by one extraction run.
//!
//! Records are built once per element and never mutated after emission.
//! All types serialize with `serde` so callers can hand them straight to an
//! HTTP response or a JSON file.

use crate::document::{
    AnalysisResult, BoundingBox, DiagramClassification, DiagramType, Element, Figure,
    Strategy, SuggestedFormat, Table,
};
use crate::error::ElementWarning;
use crate::pipeline::tables::TableView;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use crate::pipeline::structured::ExtractedData;

/// One rendered table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: String,
    pub page_number: Option<u32>,
    pub caption: String,
    pub headers: Vec<String>,
    /// Rows fitted to `headers.len()`, exactly as rendered.
    pub rows: Vec<Vec<String>>,
    pub markdown: String,
    pub csv: String,
    pub html: String,
    pub bounding_box: Option<BoundingBox>,
}

impl TableRecord {
    pub fn from_table(table: &Table) -> Self {
        let view = TableView::of(table);
        let rendered = view.render();
        Self {
            id: table.id.clone(),
            page_number: table.page_number,
            caption: table.caption.clone(),
            headers: table.headers.clone(),
            rows: view.fitted(),
            markdown: rendered.markdown,
            csv: rendered.csv,
            html: rendered.html,
            bounding_box: table.bounding_box,
        }
    }
}

/// One analysed figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramRecord {
    pub id: String,
    pub page_number: Option<u32>,
    pub caption: String,
    pub description: String,
    pub diagram_type: DiagramType,
    pub elements: Vec<Element>,
    pub confidence: f64,
    /// Validated Mermaid source; `None` when absent or rejected.
    pub mermaid_source: Option<String>,
    pub text_excerpt: String,
    pub recreation_prompt: Option<String>,
    pub suggested_output_format: SuggestedFormat,
    pub extracted_data: Option<ExtractedData>,
    pub classification: DiagramClassification,
    pub strategy: Strategy,
    pub bounding_box: Option<BoundingBox>,
    /// Ordinal of the markdown placeholder this figure replaces, if known.
    pub placeholder: Option<usize>,
}

impl DiagramRecord {
    /// Merge a figure, its analysis and its classification.
    ///
    /// `mermaid_source` must already have passed the validator.
    pub fn new(
        figure: &Figure,
        analysis: AnalysisResult,
        elements: Vec<Element>,
        classification: DiagramClassification,
        mermaid_source: Option<String>,
    ) -> Self {
        let (recreation_prompt, suggested_output_format, extracted_data) = match analysis.synthesis
        {
            Some(s) => (
                Some(s.recreation_prompt),
                s.suggested_format,
                Some(s.extracted_data),
            ),
            None => (
                None,
                SuggestedFormat::for_type(classification.diagram_type),
                None,
            ),
        };
        Self {
            id: figure.id.clone(),
            page_number: figure.page_number,
            caption: figure.caption.clone(),
            description: analysis.description,
            diagram_type: classification.diagram_type,
            elements,
            confidence: analysis.confidence,
            mermaid_source,
            text_excerpt: analysis.text_excerpt,
            recreation_prompt,
            suggested_output_format,
            extracted_data,
            classification,
            strategy: analysis.strategy,
            bounding_box: figure.bounding_box,
            placeholder: figure.placeholder,
        }
    }
}

/// Counters for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub tables: usize,
    pub figures_found: usize,
    pub figures_analysed: usize,
    /// Figures with neither bytes nor surrounding text.
    pub figures_skipped: usize,
    /// Records whose terminal outcome was a failure payload.
    pub figures_failed: usize,
    /// Keyed by strategy name (`external`, `local`, `basic`, `context`).
    pub by_strategy: BTreeMap<String, usize>,
    pub mermaid_attached: usize,
    pub mermaid_rejected: usize,
    pub warnings: usize,
    pub duration_ms: u64,
}

impl ExtractionStats {
    pub(crate) fn record_strategy(&mut self, strategy: Strategy) {
        *self
            .by_strategy
            .entry(strategy.to_string().to_lowercase())
            .or_insert(0) += 1;
    }
}

/// Everything one document yields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub tables: Vec<TableRecord>,
    pub diagrams: Vec<DiagramRecord>,
    pub warnings: Vec<ElementWarning>,
    pub stats: ExtractionStats,
    /// The markdown export with validated Mermaid blocks spliced in, when
    /// one was supplied.
    pub markdown: Option<String>,
}
