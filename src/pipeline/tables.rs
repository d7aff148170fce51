//! Table rendering: canonical table → Markdown, CSV and HTML strings.
//!
//! All three renderers are pure and byte-for-byte deterministic. Each row is
//! padded with empty cells or truncated to the header width before it is
//! written, so every rendered row has exactly `headers.len()` cells.
//!
//! When `headers` is empty but rows exist, `Column 1..N` headers are
//! synthesized from the first row. When both are empty every renderer
//! returns an empty string.

use crate::document::{synthesize_headers, Table};
use std::borrow::Cow;

/// Borrowed `(headers, rows, caption)` triple the renderers operate on.
#[derive(Debug, Clone, Copy)]
pub struct TableView<'a> {
    pub headers: &'a [String],
    pub rows: &'a [Vec<String>],
    pub caption: &'a str,
}

/// The three derived string artifacts of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTable {
    pub markdown: String,
    pub csv: String,
    pub html: String,
}

impl<'a> TableView<'a> {
    pub fn new(headers: &'a [String], rows: &'a [Vec<String>], caption: &'a str) -> Self {
        Self {
            headers,
            rows,
            caption,
        }
    }

    pub fn of(table: &'a Table) -> Self {
        Self::new(&table.headers, &table.rows, &table.caption)
    }

    fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    fn effective_headers(&self) -> Cow<'a, [String]> {
        if self.headers.is_empty() {
            Cow::Owned(synthesize_headers(self.rows))
        } else {
            Cow::Borrowed(self.headers)
        }
    }

    /// Rows padded/truncated to `width`.
    fn fitted_rows(&self, width: usize) -> impl Iterator<Item = Vec<&'a str>> + 'a {
        self.rows.iter().map(move |row| {
            (0..width)
                .map(|i| row.get(i).map(String::as_str).unwrap_or(""))
                .collect()
        })
    }

    /// Owned rows exactly as the renderers write them.
    pub fn fitted(&self) -> Vec<Vec<String>> {
        let width = self.effective_headers().len();
        self.fitted_rows(width)
            .map(|row| row.into_iter().map(str::to_string).collect())
            .collect()
    }

    /// GitHub-flavored pipe table with a `---` separator row.
    ///
    /// The caption is carried only by the HTML form.
    pub fn to_markdown(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let headers = self.effective_headers();
        let width = headers.len();

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(markdown_row(headers.iter().map(String::as_str)));
        lines.push(format!("| {} |", vec!["---"; width].join(" | ")));
        for row in self.fitted_rows(width) {
            lines.push(markdown_row(row.into_iter()));
        }
        lines.join("\n")
    }

    /// Comma-delimited, minimal quoting, `\n` line endings, no trailing newline.
    pub fn to_csv(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let headers = self.effective_headers();
        let width = headers.len();

        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        if !headers.is_empty() {
            lines.push(csv_record(headers.iter().map(String::as_str)));
        }
        for row in self.fitted_rows(width) {
            lines.push(csv_record(row.into_iter()));
        }
        lines.join("\n")
    }

    /// Plain `<table>` with optional `<caption>`, `<thead>` and `<tbody>`.
    pub fn to_html(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let headers = self.effective_headers();
        let width = headers.len();

        let mut parts = vec!["<table>".to_string()];
        if !self.caption.is_empty() {
            parts.push(format!("  <caption>{}</caption>", escape_html(self.caption)));
        }
        if !headers.is_empty() {
            parts.push("  <thead>".into());
            parts.push("    <tr>".into());
            for h in headers.iter() {
                parts.push(format!("      <th>{}</th>", escape_html(h)));
            }
            parts.push("    </tr>".into());
            parts.push("  </thead>".into());
        }
        parts.push("  <tbody>".into());
        for row in self.fitted_rows(width) {
            parts.push("    <tr>".into());
            for cell in row {
                parts.push(format!("      <td>{}</td>", escape_html(cell)));
            }
            parts.push("    </tr>".into());
        }
        parts.push("  </tbody>".into());
        parts.push("</table>".into());
        parts.join("\n")
    }

    pub fn render(&self) -> RenderedTable {
        RenderedTable {
            markdown: self.to_markdown(),
            csv: self.to_csv(),
            html: self.to_html(),
        }
    }
}

fn markdown_row<'s>(cells: impl Iterator<Item = &'s str>) -> String {
    let cells: Vec<String> = cells.map(escape_markdown_cell).collect();
    format!("| {} |", cells.join(" | "))
}

/// Pipes would split the cell and newlines would end the row.
fn escape_markdown_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace("\r\n", " ").replace(['\n', '\r'], " ")
}

fn csv_record<'s>(fields: impl Iterator<Item = &'s str>) -> String {
    fields.map(csv_field).collect::<Vec<_>>().join(",")
}

fn csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Escape `& < > " '` for HTML text and attribute contexts.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn markdown_pads_and_truncates_rows() {
        let headers = s(&["A", "B"]);
        let rows = vec![s(&["1"]), s(&["2", "3", "4"])];
        let md = TableView::new(&headers, &rows, "").to_markdown();
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "| A | B |");
        assert_eq!(lines[1], "| --- | --- |");
        assert_eq!(lines[2], "| 1 |  |");
        assert_eq!(lines[3], "| 2 | 3 |");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn markdown_escapes_pipes_and_newlines() {
        let headers = s(&["x"]);
        let rows = vec![s(&["a|b\nc"])];
        let md = TableView::new(&headers, &rows, "").to_markdown();
        assert!(md.ends_with("| a\\|b c |"), "got: {md}");
    }

    #[test]
    fn empty_table_renders_empty_strings() {
        let view = TableView::new(&[], &[], "caption ignored");
        let r = view.render();
        assert_eq!(r.markdown, "");
        assert_eq!(r.csv, "");
        assert_eq!(r.html, "");
    }

    #[test]
    fn missing_headers_are_synthesized() {
        let rows = vec![s(&["1", "2"])];
        let md = TableView::new(&[], &rows, "").to_markdown();
        assert!(md.starts_with("| Column 1 | Column 2 |"), "got: {md}");
    }

    #[test]
    fn csv_quotes_minimally() {
        let headers = s(&["name", "note"]);
        let rows = vec![
            s(&["plain", "a,b"]),
            s(&["say \"hi\"", "line\nbreak"]),
            s(&["short"]),
        ];
        let csv = TableView::new(&headers, &rows, "").to_csv();
        assert_eq!(
            csv,
            "name,note\nplain,\"a,b\"\n\"say \"\"hi\"\"\",\"line\nbreak\"\nshort,"
        );
    }

    #[test]
    fn html_structure_and_escaping() {
        let headers = s(&["<b>", "Q&A"]);
        let rows = vec![s(&["it's", "\"x\""])];
        let html = TableView::new(&headers, &rows, "Sales & <costs>").to_html();
        let expected = [
            "<table>",
            "  <caption>Sales &amp; &lt;costs&gt;</caption>",
            "  <thead>",
            "    <tr>",
            "      <th>&lt;b&gt;</th>",
            "      <th>Q&amp;A</th>",
            "    </tr>",
            "  </thead>",
            "  <tbody>",
            "    <tr>",
            "      <td>it&#x27;s</td>",
            "      <td>&quot;x&quot;</td>",
            "    </tr>",
            "  </tbody>",
            "</table>",
        ]
        .join("\n");
        assert_eq!(html, expected);
    }

    #[test]
    fn html_omits_caption_when_empty() {
        let headers = s(&["A"]);
        let html = TableView::new(&headers, &[], "").to_html();
        assert!(!html.contains("<caption>"));
        assert!(html.contains("<tbody>"));
    }

    #[test]
    fn every_format_has_header_width_cells() {
        let headers = s(&["A", "B", "C"]);
        let rows = vec![s(&[]), s(&["1"]), s(&["1", "2", "3", "4", "5"])];
        let view = TableView::new(&headers, &rows, "");

        for line in view.to_markdown().lines() {
            assert_eq!(line.matches(" | ").count() + 1, 3, "line: {line}");
        }
        for line in view.to_csv().lines() {
            assert_eq!(line.split(',').count(), 3, "line: {line}");
        }
        let html = view.to_html();
        assert_eq!(html.matches("<td>").count(), 9);
    }

    #[test]
    fn rendering_is_idempotent() {
        let headers = s(&["k", "v"]);
        let rows = vec![s(&["a", "1"]), s(&["b"])];
        let view = TableView::new(&headers, &rows, "cap");
        assert_eq!(view.render(), view.render());
    }
}
