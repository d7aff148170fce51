//! Shape normalizer: upstream JSON → canonical [`Table`] / [`Figure`].
//!
//! ```text
//!            ┌─ DocumentShape::probe (once) ─┐
//!  JSON ────▶│  Docling  │  Flat element list │
//!            └─────┬─────┴─────────┬──────────┘
//!                  ▼               ▼
//!           DoclingElement     FlatElement        (impl ElementAdapter)
//!                  └───────┬───────┘
//!                          ▼
//!                 Table / Figure  +  ElementWarning
//!                          │
//!  markdown export ──▶ placeholders ──▶ Figure.surrounding_text
//! ```
//!
//! Every accessor defaults to an empty or neutral value. An element is
//! dropped (with a warning) only when it is not a JSON object at all, since
//! nothing about it can then be trusted, not even its position.

use crate::document::{BoundingBox, Figure, Table};
use crate::error::{ElementWarning, ExtractError};
use crate::pipeline::encode::decode_image_payload;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// Grid dimensions announced by the engine are trusted up to this size.
const MAX_GRID_DIM: usize = 1024;

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<!--\s*image\s*-->|<img\b").unwrap());

// ── Shape probe ──────────────────────────────────────────────────────────

/// Upstream layouts the normalizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// Docling `DoclingDocument` export: `tables[]`, `pictures[]`, `texts[]`.
    Docling,
    /// A flat `elements[]` list (or a bare array) of typed elements.
    Flat,
}

impl DocumentShape {
    pub fn probe(doc: &Value) -> Option<Self> {
        match doc {
            Value::Array(_) => Some(DocumentShape::Flat),
            Value::Object(map) => {
                if map.get("elements").is_some_and(Value::is_array) {
                    Some(DocumentShape::Flat)
                } else if map.get("schema_name").and_then(Value::as_str) == Some("DoclingDocument")
                    || ["tables", "pictures", "texts"]
                        .iter()
                        .any(|k| map.get(*k).is_some_and(Value::is_array))
                {
                    Some(DocumentShape::Docling)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

// ── Adapter interface ────────────────────────────────────────────────────

/// Headers and rows as the engine reported them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Read-only view over one upstream table or figure element.
pub trait ElementAdapter {
    /// Index in the upstream collection.
    fn position(&self) -> usize;
    fn page_number(&self) -> Option<u32>;
    fn caption(&self) -> String;
    fn alt_text(&self) -> String;
    fn bounding_box(&self) -> Option<BoundingBox>;
    fn image_bytes(&self) -> Option<Vec<u8>>;
    fn surrounding_text(&self) -> Option<String> {
        None
    }
    fn text_fragments(&self) -> Vec<String> {
        Vec::new()
    }
    fn table_grid(&self) -> TableGrid;
}

/// An element of a Docling document, with the document for `$ref` lookups.
pub struct DoclingElement<'a> {
    doc: &'a Value,
    item: &'a Value,
    position: usize,
}

impl<'a> DoclingElement<'a> {
    /// `None` when `item` is not an object.
    pub fn new(doc: &'a Value, item: &'a Value, position: usize) -> Option<Self> {
        item.is_object().then_some(Self { doc, item, position })
    }

    fn prov(&self) -> Option<&'a Value> {
        self.item.get("prov")?.as_array()?.first()
    }

    /// Text of the item a `{"$ref": "#/texts/N"}` points at.
    fn resolve_text(&self, reference: &Value) -> Option<String> {
        let r = reference
            .get("$ref")
            .or_else(|| reference.get("cref"))
            .and_then(Value::as_str)
            .or_else(|| reference.as_str())?;
        let target = self.doc.pointer(r.strip_prefix('#')?)?;
        non_empty(target.get("text").and_then(Value::as_str))
    }

    fn resolve_refs(&self, key: &str) -> Vec<String> {
        array(self.item, key)
            .iter()
            .filter_map(|r| self.resolve_text(r))
            .collect()
    }
}

impl ElementAdapter for DoclingElement<'_> {
    fn position(&self) -> usize {
        self.position
    }

    fn page_number(&self) -> Option<u32> {
        self.prov().and_then(|p| as_u32(p.get("page_no")))
    }

    fn caption(&self) -> String {
        let captions = self.resolve_refs("captions");
        if captions.is_empty() {
            text_of(self.item.get("caption"))
        } else {
            captions.join(" ")
        }
    }

    fn alt_text(&self) -> String {
        array(self.item, "annotations")
            .iter()
            .filter(|a| a.get("kind").and_then(Value::as_str) == Some("description"))
            .filter_map(|a| non_empty(a.get("text").and_then(Value::as_str)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn bounding_box(&self) -> Option<BoundingBox> {
        self.prov().and_then(|p| p.get("bbox")).and_then(bbox_of)
    }

    fn image_bytes(&self) -> Option<Vec<u8>> {
        let uri = self.item.get("image")?.get("uri")?.as_str()?;
        decode_image_payload(uri)
    }

    fn text_fragments(&self) -> Vec<String> {
        self.resolve_refs("children")
    }

    fn table_grid(&self) -> TableGrid {
        match self.item.get("data") {
            Some(data) => docling_grid(data),
            None => TableGrid::default(),
        }
    }
}

struct GridCell {
    row: usize,
    col: usize,
    text: String,
    header: bool,
}

fn docling_grid(data: &Value) -> TableGrid {
    let cells: Vec<GridCell> = if let Some(cells) = data.get("table_cells").and_then(Value::as_array) {
        cells
            .iter()
            .filter_map(|c| {
                Some(GridCell {
                    row: as_usize(c.get("start_row_offset_idx"))?,
                    col: as_usize(c.get("start_col_offset_idx"))?,
                    text: text_of(c.get("text")),
                    header: c.get("column_header").and_then(Value::as_bool).unwrap_or(false),
                })
            })
            .filter(|c| c.row < MAX_GRID_DIM && c.col < MAX_GRID_DIM)
            .collect()
    } else {
        array(data, "grid")
            .iter()
            .enumerate()
            .flat_map(|(row, cells)| {
                cells
                    .as_array()
                    .map(Vec::as_slice)
                    .unwrap_or(&[])
                    .iter()
                    .enumerate()
                    .map(move |(col, c)| GridCell {
                        row,
                        col,
                        text: cell_text(c),
                        header: c.get("column_header").and_then(Value::as_bool).unwrap_or(false),
                    })
            })
            .filter(|c| c.row < MAX_GRID_DIM && c.col < MAX_GRID_DIM)
            .collect()
    };

    if cells.is_empty() {
        return TableGrid::default();
    }

    let announced = |key: &str| as_usize(data.get(key)).filter(|n| *n <= MAX_GRID_DIM).unwrap_or(0);
    let n_rows = cells.iter().map(|c| c.row + 1).max().unwrap_or(0).max(announced("num_rows"));
    let n_cols = cells.iter().map(|c| c.col + 1).max().unwrap_or(0).max(announced("num_cols"));

    let mut grid = vec![vec![String::new(); n_cols]; n_rows];
    let mut header_row = vec![false; n_rows];
    for c in cells {
        // Spanned cells repeat in `grid`; the first write wins.
        if grid[c.row][c.col].is_empty() {
            grid[c.row][c.col] = c.text;
        }
        header_row[c.row] |= c.header;
    }

    let headers = if header_row.first().copied().unwrap_or(false) {
        grid.remove(0)
    } else {
        Vec::new()
    };
    TableGrid {
        headers,
        rows: grid,
    }
}

/// What a flat element describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatKind {
    Table,
    Figure,
}

/// An entry of a flat `elements[]` list.
pub struct FlatElement<'a> {
    item: &'a Value,
    position: usize,
}

impl<'a> FlatElement<'a> {
    pub fn new(item: &'a Value, position: usize) -> Option<Self> {
        item.is_object().then_some(Self { item, position })
    }

    /// `None` for element types that are neither tables nor figures.
    pub fn kind(&self) -> Option<FlatKind> {
        let label = ["type", "label", "category"]
            .iter()
            .find_map(|k| self.item.get(*k).and_then(Value::as_str))?
            .to_lowercase();
        match label.as_str() {
            "table" => Some(FlatKind::Table),
            "picture" | "figure" | "image" | "diagram" | "chart" => Some(FlatKind::Figure),
            _ => None,
        }
    }

    fn first_str(&self, keys: &[&str]) -> Option<&'a str> {
        keys.iter().find_map(|k| self.item.get(*k).and_then(Value::as_str))
    }
}

impl ElementAdapter for FlatElement<'_> {
    fn position(&self) -> usize {
        self.position
    }

    fn page_number(&self) -> Option<u32> {
        ["page_number", "page", "page_no"]
            .iter()
            .find_map(|k| as_u32(self.item.get(*k)))
    }

    fn caption(&self) -> String {
        text_of(self.item.get("caption"))
    }

    fn alt_text(&self) -> String {
        self.first_str(&["alt_text", "alt"]).unwrap_or("").trim().to_string()
    }

    fn bounding_box(&self) -> Option<BoundingBox> {
        self.item
            .get("bounding_box")
            .or_else(|| self.item.get("bbox"))
            .and_then(bbox_of)
    }

    fn image_bytes(&self) -> Option<Vec<u8>> {
        decode_image_payload(self.first_str(&["image_base64", "image_data", "image"])?)
    }

    fn surrounding_text(&self) -> Option<String> {
        non_empty(self.first_str(&["surrounding_text", "context"]))
    }

    fn text_fragments(&self) -> Vec<String> {
        let listed: Vec<String> = array(self.item, "text_elements")
            .iter()
            .map(cell_text)
            .filter(|t| !t.is_empty())
            .collect();
        if !listed.is_empty() {
            return listed;
        }
        non_empty(self.item.get("text").and_then(Value::as_str))
            .into_iter()
            .collect()
    }

    fn table_grid(&self) -> TableGrid {
        let headers: Vec<String> = array(self.item, "headers").iter().map(cell_text).collect();
        if let Some(data) = self.item.get("data").and_then(Value::as_array) {
            let rows = data
                .iter()
                .map(|row| match row {
                    Value::Array(cells) => cells.iter().map(cell_text).collect(),
                    other => array(other, "cells").iter().map(cell_text).collect(),
                })
                .collect();
            return TableGrid { headers, rows };
        }
        if let Some(content) = self.first_str(&["content", "markdown"]) {
            let mut grid = parse_markdown_table(content);
            if !headers.is_empty() {
                grid.headers = headers;
            }
            return grid;
        }
        TableGrid {
            headers,
            rows: Vec::new(),
        }
    }
}

/// First line is the header row, the second (separator) is skipped, later
/// lines containing `|` are rows. Empty cells between pipes are dropped.
pub fn parse_markdown_table(content: &str) -> TableGrid {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let Some(first) = lines.first() else {
        return TableGrid::default();
    };
    let rows = lines
        .iter()
        .skip(2)
        .filter(|l| l.contains('|'))
        .map(|l| split_pipe_row(l))
        .filter(|r| !r.is_empty())
        .collect();
    TableGrid {
        headers: split_pipe_row(first),
        rows,
    }
}

fn split_pipe_row(line: &str) -> Vec<String> {
    line.split('|')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Value helpers ────────────────────────────────────────────────────────

fn array<'a>(v: &'a Value, key: &str) -> &'a [Value] {
    v.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn as_usize(v: Option<&Value>) -> Option<usize> {
    v?.as_u64().and_then(|n| usize::try_from(n).ok())
}

fn as_u32(v: Option<&Value>) -> Option<u32> {
    match v? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A string, or the `text` field of an object.
fn text_of(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Object(map)) => map
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string(),
        _ => String::new(),
    }
}

/// Any scalar cell value rendered as text.
fn cell_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) => String::new(),
        Value::Object(_) => text_of(Some(v)),
    }
}

fn num(v: &Value, key: &str) -> Option<f64> {
    v.get(key)?.as_f64()
}

/// `{x,y,width,height}`, `{l,t,r,b}` or `[x0,y0,x1,y1]`.
fn bbox_of(v: &Value) -> Option<BoundingBox> {
    if let Some(a) = v.as_array() {
        let c: Vec<f64> = a.iter().filter_map(Value::as_f64).collect();
        if c.len() != 4 {
            return None;
        }
        return Some(BoundingBox {
            x: c[0].min(c[2]),
            y: c[1].min(c[3]),
            width: (c[2] - c[0]).abs(),
            height: (c[3] - c[1]).abs(),
        });
    }
    if let (Some(x), Some(y), Some(width), Some(height)) =
        (num(v, "x"), num(v, "y"), num(v, "width"), num(v, "height"))
    {
        return Some(BoundingBox {
            x,
            y,
            width,
            height,
        });
    }
    let (l, t, r, b) = (num(v, "l")?, num(v, "t")?, num(v, "r")?, num(v, "b")?);
    // Docling uses a bottom-left origin by default, so t > b is normal.
    Some(BoundingBox {
        x: l.min(r),
        y: t.min(b),
        width: (r - l).abs(),
        height: (t - b).abs(),
    })
}

// ── Placeholders ─────────────────────────────────────────────────────────

/// A figure placeholder in the markdown export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// 0-based among placeholders.
    pub ordinal: usize,
    /// 0-based line index.
    pub line: usize,
    /// Lower-cased text of the surrounding lines.
    pub context: String,
}

/// True for `<!-- image -->` and `<img …>` lines.
pub fn is_placeholder(line: &str) -> bool {
    RE_PLACEHOLDER.is_match(line)
}

/// Every placeholder with the text of `window` lines above and below.
pub fn find_placeholders(markdown: &str, window: usize) -> Vec<Placeholder> {
    let lines: Vec<&str> = markdown.lines().collect();
    lines
        .iter()
        .enumerate()
        .filter(|(_, l)| is_placeholder(l))
        .enumerate()
        .map(|(ordinal, (line, _))| {
            let start = line.saturating_sub(window);
            let end = (line + window + 1).min(lines.len());
            let context = lines[start..end]
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty() && !is_placeholder(l))
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            Placeholder {
                ordinal,
                line,
                context,
            }
        })
        .collect()
}

// ── Normalization ────────────────────────────────────────────────────────

/// Canonical artifacts of one document.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    pub shape: DocumentShape,
    pub tables: Vec<Table>,
    pub figures: Vec<Figure>,
    pub warnings: Vec<ElementWarning>,
}

impl NormalizedDocument {
    fn new(shape: DocumentShape) -> Self {
        Self {
            shape,
            tables: Vec::new(),
            figures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn drop_element(&mut self, collection: &str, position: usize, reason: &str) {
        warn!("{}[{}]: dropped: {}", collection, position, reason);
        self.warnings.push(ElementWarning::Dropped {
            collection: collection.to_string(),
            position,
            reason: reason.to_string(),
        });
    }

    fn push_table(&mut self, el: &dyn ElementAdapter) {
        let id = format!("table_{}", self.tables.len() + 1);
        let grid = el.table_grid();
        let table = Table::new(
            id,
            el.page_number(),
            el.caption(),
            grid.headers,
            grid.rows,
            el.bounding_box(),
        );
        let width = table.headers.len();
        for (i, row) in table.rows.iter().enumerate() {
            if row.len() > width {
                warn!(
                    "{}: row {} has {} cells, {} headers; surplus dropped",
                    table.id,
                    i + 1,
                    row.len(),
                    width
                );
                self.warnings.push(ElementWarning::RowTruncated {
                    table_id: table.id.clone(),
                    row: i + 1,
                    cells: row.len(),
                    width,
                });
            }
        }
        debug!(
            "{} from position {}: {} columns, {} rows",
            table.id,
            el.position(),
            width,
            table.rows.len()
        );
        self.tables.push(table);
    }

    fn push_figure(&mut self, el: &dyn ElementAdapter) {
        let mut figure = Figure::new(format!("diagram_{}", self.figures.len() + 1));
        figure.page_number = el.page_number();
        figure.caption = el.caption();
        figure.alt_text = el.alt_text();
        figure.raw_bytes = el.image_bytes();
        figure.surrounding_text = el.surrounding_text();
        figure.text_fragments = el.text_fragments();
        figure.bounding_box = el.bounding_box();
        debug!(
            "{} from position {}: bytes={} context={}",
            figure.id,
            el.position(),
            figure.has_bytes(),
            figure.has_context()
        );
        self.figures.push(figure);
    }

    /// Link figures to placeholders by ordinal; placeholders become
    /// context-only figures when the document has no figures at all.
    fn attach_placeholders(&mut self, placeholders: Vec<Placeholder>) {
        if self.figures.is_empty() {
            for p in placeholders {
                let mut figure = Figure::new(format!("diagram_{}", p.ordinal + 1));
                figure.placeholder = Some(p.ordinal);
                figure.surrounding_text = Some(p.context).filter(|c| !c.is_empty());
                self.figures.push(figure);
            }
            return;
        }
        for (figure, p) in self.figures.iter_mut().zip(placeholders) {
            figure.placeholder = Some(p.ordinal);
            if !figure.has_bytes() && !figure.has_context() && !p.context.is_empty() {
                figure.surrounding_text = Some(p.context);
            }
        }
    }
}

/// Map an upstream document (and optionally its markdown export) onto
/// canonical tables and figures.
pub fn normalize(
    doc: &Value,
    markdown: Option<&str>,
    context_window_lines: usize,
) -> Result<NormalizedDocument, ExtractError> {
    let shape = DocumentShape::probe(doc).ok_or_else(|| {
        ExtractError::InvalidDocument(
            "expected a Docling document (tables/pictures/texts) or an element list (elements)"
                .into(),
        )
    })?;
    let mut out = NormalizedDocument::new(shape);

    match shape {
        DocumentShape::Docling => {
            for (i, item) in array(doc, "tables").iter().enumerate() {
                match DoclingElement::new(doc, item, i) {
                    Some(el) => out.push_table(&el),
                    None => out.drop_element("tables", i, "not an object"),
                }
            }
            for (i, item) in array(doc, "pictures").iter().enumerate() {
                match DoclingElement::new(doc, item, i) {
                    Some(el) => out.push_figure(&el),
                    None => out.drop_element("pictures", i, "not an object"),
                }
            }
        }
        DocumentShape::Flat => {
            let elements = match doc {
                Value::Array(items) => items.as_slice(),
                other => array(other, "elements"),
            };
            for (i, item) in elements.iter().enumerate() {
                let Some(el) = FlatElement::new(item, i) else {
                    out.drop_element("elements", i, "not an object");
                    continue;
                };
                match el.kind() {
                    Some(FlatKind::Table) => out.push_table(&el),
                    Some(FlatKind::Figure) => out.push_figure(&el),
                    None => debug!("elements[{}]: not a table or figure", i),
                }
            }
        }
    }

    if let Some(md) = markdown {
        out.attach_placeholders(find_placeholders(md, context_window_lines));
    }
    Ok(out)
}
