//! Markdown tables and SVG bar charts over benchmark results.
//!
//! A [`Report`] borrows the results it presents. Removing columns or rows,
//! reordering rows and editing the title only change the view; the results
//! recorded by a group are never touched.

mod chart;

pub use chart::ChartOptions;

use kvmbench_core::{NamedResult, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Markdown artifact name inside the output directory.
pub const MARKDOWN_FILE: &str = "bench.md";
/// Chart artifact name inside the output directory.
pub const CHART_FILE: &str = "bench.svg";

/// One rendered value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    /// Whole microseconds; `None` when the report lacked the value.
    Micros(Option<i64>),
}

impl Cell {
    /// The numeric value plotted in charts.
    pub fn value(&self) -> Option<i64> {
        match self {
            Cell::Text(_) => None,
            Cell::Micros(v) => *v,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Micros(Some(v)) => write!(f, "{v} µs"),
            Cell::Micros(None) => f.write_str("-"),
        }
    }
}

/// Converts seconds to whole microseconds.
pub fn micros(seconds: Option<f64>) -> Option<i64> {
    seconds
        .filter(|s| s.is_finite())
        .map(|s| (s * 1_000_000.0).round() as i64)
}

/// A named, pure projection of a result.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    derive: fn(&NamedResult) -> Cell,
}

impl Column {
    pub fn new(name: impl Into<String>, derive: fn(&NamedResult) -> Cell) -> Self {
        Self {
            name: name.into(),
            derive,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell(&self, row: &NamedResult) -> Cell {
        (self.derive)(row)
    }

    /// `name`, `average`, `p50`, `p90`, `p99`.
    pub fn defaults() -> Vec<Column> {
        vec![
            Column::new("name", |r| Cell::Text(r.name.clone())),
            Column::new("average", |r| Cell::Micros(micros(r.result.summary.average))),
            Column::new("p50", |r| Cell::Micros(micros(r.result.latency_percentiles.p50))),
            Column::new("p90", |r| Cell::Micros(micros(r.result.latency_percentiles.p90))),
            Column::new("p99", |r| Cell::Micros(micros(r.result.latency_percentiles.p99))),
        ]
    }
}

/// A titled table view over a slice of results.
#[derive(Debug, Clone)]
pub struct Report<'a> {
    title: String,
    columns: Vec<Column>,
    rows: Vec<&'a NamedResult>,
}

impl<'a> Report<'a> {
    /// A report with the default columns and one row per result.
    pub fn new(title: impl Into<String>, results: &'a [NamedResult]) -> Self {
        Self {
            title: title.into(),
            columns: Column::defaults(),
            rows: results.iter().collect(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn append_title(&mut self, suffix: &str) {
        self.title.push_str(suffix);
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Removes the named column. Returns false if there was none.
    pub fn remove_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c.name != name);
        self.columns.len() != before
    }

    pub fn rows(&self) -> &[&'a NamedResult] {
        &self.rows
    }

    /// Mutable access for reordering rows.
    pub fn rows_mut(&mut self) -> &mut Vec<&'a NamedResult> {
        &mut self.rows
    }

    /// Removes rows whose case name equals `name`. Returns false if there
    /// were none.
    pub fn remove_row(&mut self, name: &str) -> bool {
        let before = self.rows.len();
        self.rows.retain(|r| r.name != name);
        self.rows.len() != before
    }

    pub fn retain_rows(&mut self, keep: impl FnMut(&&'a NamedResult) -> bool) {
        self.rows.retain(keep);
    }

    /// Every cell, row by row, in column order.
    pub fn data(&self) -> Vec<Vec<Cell>> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().map(|c| c.cell(row)).collect())
            .collect()
    }

    pub fn to_markdown(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(Column::name).collect();
        let mut lines = vec![
            format!("### {}", self.title),
            format!("| {} |", names.join(" | ")),
            format!("| {} |", vec!["---"; names.len()].join(" | ")),
        ];
        for row in self.data() {
            let cells: Vec<String> = row.iter().map(Cell::to_string).collect();
            lines.push(format!("| {} |", cells.join(" | ")));
        }
        lines.join("\n")
    }

    /// Renders a bar chart: one category per row, one series per numeric
    /// column.
    pub fn to_svg(&self, options: &ChartOptions) -> String {
        chart::render(self, options)
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_markdown())
    }
}

/// Joins reports into one Markdown document, groups separated by blank
/// lines. With `with_chart`, the document starts with a link to the chart.
pub fn render_document(reports: &[Report<'_>], with_chart: bool) -> String {
    let mut parts = Vec::with_capacity(reports.len() + 1);
    if with_chart {
        parts.push(format!("![](./{CHART_FILE})"));
    }
    parts.extend(reports.iter().map(Report::to_markdown));
    parts.join("\n\n")
}

/// Paths written by [`write_artifacts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifacts {
    pub markdown: PathBuf,
    pub chart: Option<PathBuf>,
}

/// Writes `bench.md` and, if given, `bench.svg` into `dir`, creating it.
pub fn write_artifacts(dir: &Path, markdown: &str, svg: Option<&str>) -> Result<WrittenArtifacts> {
    std::fs::create_dir_all(dir)?;

    let md_path = dir.join(MARKDOWN_FILE);
    std::fs::write(&md_path, markdown)?;
    tracing::info!("Wrote {:?}", md_path);

    let chart = match svg {
        Some(svg) => {
            let path = dir.join(CHART_FILE);
            std::fs::write(&path, svg)?;
            tracing::info!("Wrote {:?}", path);
            Some(path)
        }
        None => None,
    };

    Ok(WrittenArtifacts {
        markdown: md_path,
        chart,
    })
}
