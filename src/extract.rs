//! Extraction entry points.
//!
//! ```text
//! JSON (+ markdown) ──▶ normalize ──┬─▶ tables ──▶ render ──────────────▶ TableRecord
//!                                   └─▶ figures ─▶ classify type
//!                                                  ─▶ dispatch (EXTERNAL/LOCAL/BASIC/CONTEXT)
//!                                                  ─▶ classify convertibility
//!                                                  ─▶ synthesize + validate Mermaid ─▶ DiagramRecord
//! ```
//!
//! Tables and figures are processed sequentially in discovery order. Only
//! input that cannot be read or is not a document at all is returned as
//! `Err`; every per-element problem ends up in the output instead.

use crate::config::ExtractionConfig;
use crate::document::{DiagramClassification, DiagramType, Element, Figure};
use crate::error::ExtractError;
use crate::output::{DiagramRecord, ExtractionOutput, ExtractionStats, TableRecord};
use crate::pipeline::classify::{classify_convertibility, classify_type};
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::normalize::normalize;
use crate::pipeline::postprocess::integrate_mermaid;
use crate::pipeline::{mermaid, validate};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract tables and diagrams from an upstream document.
///
/// # Arguments
/// * `document` — Docling JSON export or a flat `elements[]` list
/// * `markdown` — the document's markdown export, used for figure context
///   and returned with Mermaid blocks spliced in
/// * `config`   — extraction configuration
///
/// # Errors
/// Returns `Err(ExtractError)` only when `document` matches no known shape
/// or the vision client cannot be constructed.
///
/// # Example
/// ```rust,no_run
/// use edgequake_figtab::{extract, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string("report.json")?)?;
/// let output = extract(&doc, None, &ExtractionConfig::default()).await?;
/// for t in &output.tables {
///     println!("{}\n{}", t.id, t.markdown);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract(
    document: &Value,
    markdown: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let start = Instant::now();

    // ── Step 1: Normalize ────────────────────────────────────────────────
    let doc = normalize(document, markdown, config.context_window_lines)?;
    info!(
        "Extracting {:?} document: {} tables, {} figures",
        doc.shape,
        doc.tables.len(),
        doc.figures.len()
    );

    let callback: ProgressCallback = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback));
    callback.on_extraction_start(doc.tables.len(), doc.figures.len());

    let mut stats = ExtractionStats {
        tables: doc.tables.len(),
        figures_found: doc.figures.len(),
        ..Default::default()
    };

    // ── Step 2: Render tables ────────────────────────────────────────────
    let tables: Vec<TableRecord> = doc.tables.iter().map(TableRecord::from_table).collect();

    // ── Step 3: Analyse figures ──────────────────────────────────────────
    let dispatcher = Dispatcher::new(config)?;
    let total = doc.figures.len();
    let mut diagrams = Vec::with_capacity(total);
    for (i, figure) in doc.figures.iter().enumerate() {
        callback.on_figure_start(&figure.id, i + 1, total);
        match analyse_figure(&dispatcher, figure, config, &mut stats).await {
            Some(record) => {
                callback.on_figure_complete(&record.id, record.strategy, record.confidence);
                diagrams.push(record);
            }
            None => {
                debug!("{}: no bytes and no surrounding text, skipped", figure.id);
                stats.figures_skipped += 1;
                callback.on_figure_skipped(&figure.id);
            }
        }
    }

    // ── Step 4: Integrate Mermaid into the markdown export ───────────────
    let markdown = markdown.map(|md| integrate_mermaid(md, &diagrams));

    stats.figures_analysed = diagrams.len();
    stats.warnings = doc.warnings.len();
    stats.duration_ms = start.elapsed().as_millis() as u64;
    callback.on_extraction_complete(tables.len(), diagrams.len());
    info!(
        "Extraction done: {} tables, {} diagrams ({} skipped, {} failed, {} with Mermaid) in {}ms",
        tables.len(),
        diagrams.len(),
        stats.figures_skipped,
        stats.figures_failed,
        stats.mermaid_attached,
        stats.duration_ms
    );

    Ok(ExtractionOutput {
        tables,
        diagrams,
        warnings: doc.warnings,
        stats,
        markdown,
    })
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    document: &Value,
    markdown: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(document, markdown, config))
}

/// Parse `json` and extract from it.
pub async fn extract_str(
    json: &str,
    markdown: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let document: Value =
        serde_json::from_str(json).map_err(|e| ExtractError::InvalidJson(e.to_string()))?;
    extract(&document, markdown, config).await
}

/// Read a JSON export (and optionally its markdown export) from disk and
/// extract from it.
pub async fn extract_file(
    json_path: impl AsRef<Path>,
    markdown_path: Option<&Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let json = read_text(json_path.as_ref()).await?;
    let markdown = match markdown_path {
        Some(p) => Some(read_text(p).await?),
        None => None,
    };
    info!("Read {}", json_path.as_ref().display());
    extract_str(&json, markdown.as_deref(), config).await
}

/// Normalize and render tables only. No figure analysis, no I/O.
pub fn extract_tables(document: &Value) -> Result<Vec<TableRecord>, ExtractError> {
    let doc = normalize(document, None, 0)?;
    Ok(doc.tables.iter().map(TableRecord::from_table).collect())
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn read_text(path: &Path) -> Result<String, ExtractError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(ExtractError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ExtractError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Classify, analyse and synthesize one figure. `None` when it cannot be analysed.
async fn analyse_figure(
    dispatcher: &Dispatcher<'_>,
    figure: &Figure,
    config: &ExtractionConfig,
    stats: &mut ExtractionStats,
) -> Option<DiagramRecord> {
    let type_hint = classify_type(&figure.caption, &figure.alt_text);
    let mut analysis = dispatcher.analyse(figure, type_hint).await?;
    stats.record_strategy(analysis.strategy);

    let mut elements = analysis.elements.clone();
    for fragment in &figure.text_fragments {
        if !elements.iter().any(|e| &e.content == fragment) {
            elements.push(Element::classify(fragment.clone()));
        }
    }

    let diagram_type = match analysis.diagram_type {
        DiagramType::Unknown => type_hint,
        other => other,
    };
    if diagram_type == DiagramType::Error {
        stats.figures_failed += 1;
    }
    let classification =
        classify_convertibility(diagram_type, &analysis.description, &figure.caption, &elements);
    debug!(
        "{}: type {}, convertible {} ({:.2})",
        figure.id, diagram_type, classification.is_convertible, classification.confidence
    );

    let candidate = match analysis.mermaid_source.take() {
        Some(source) => Some(source),
        None if synthesis_permitted(config, analysis.confidence, &classification) => {
            let tokens: Vec<String> = elements.iter().map(|e| e.content.clone()).collect();
            Some(mermaid::synthesize(diagram_type, &analysis.description, &tokens))
        }
        None => None,
    };
    let mermaid_source = candidate.and_then(|source| match validate::validate(&source) {
        Ok(()) => {
            stats.mermaid_attached += 1;
            Some(source)
        }
        Err(e) => {
            warn!("{}: Mermaid rejected: {}", figure.id, e);
            stats.mermaid_rejected += 1;
            None
        }
    });

    Some(DiagramRecord::new(
        figure,
        analysis,
        elements,
        classification,
        mermaid_source,
    ))
}

fn synthesis_permitted(
    config: &ExtractionConfig,
    analysis_confidence: f64,
    classification: &DiagramClassification,
) -> bool {
    config.generate_mermaid
        && analysis_confidence >= config.min_analysis_confidence
        && classification.is_convertible
        && classification.confidence >= config.min_classification_confidence
        && !matches!(
            classification.diagram_type,
            DiagramType::None | DiagramType::Error
        )
}
