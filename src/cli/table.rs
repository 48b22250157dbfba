//! Table formatting for CLI list commands
//!
//! Rows are built from typed cells so each output format can render them
//! appropriately: coloured and padded for the terminal, quoted by the `csv`
//! writer, pipe-safe for Markdown.

use std::io::Write;

use chrono::NaiveDate;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{style_rag, truncate_str};
use crate::cli::OutputFormat;
use crate::core::entity::{Priority, Severity};
use crate::core::rag::Rag;

/// A typed cell value with semantic meaning for formatting
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Record id or case reference (cyan)
    Id(String),
    /// Plain text, truncated to the column width
    Text(String),
    /// Workflow status
    Status(String),
    Severity(Severity),
    Priority(Priority),
    /// Health with colour coding
    Rag(Rag),
    Date(Option<NaiveDate>),
    Number(usize),
    Empty,
}

impl CellValue {
    pub fn format_tsv(&self, width: usize) -> String {
        match self {
            CellValue::Id(id) => format!("{:<width$}", style(id).cyan(), width = width),
            CellValue::Text(s) => {
                format!("{:<width$}", truncate_str(s, width.saturating_sub(2)), width = width)
            }
            CellValue::Status(s) => {
                let styled = match s.as_str() {
                    "closed" | "done" => style(s.clone()).dim(),
                    "blocked" | "reopened" => style(s.clone()).red(),
                    "open" => style(s.clone()).white(),
                    _ => style(s.clone()).yellow(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Severity(severity) => {
                let s = severity.to_string();
                let styled = match severity {
                    Severity::Low => style(s).dim(),
                    Severity::Medium => style(s).white(),
                    Severity::High => style(s).yellow(),
                    Severity::Critical => style(s).red().bold(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Priority(priority) => {
                let s = priority.to_string();
                let styled = match priority {
                    Priority::Low => style(s).dim(),
                    Priority::Medium => style(s).white(),
                    Priority::High => style(s).yellow(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Rag(rag) => format!("{:<width$}", style_rag(*rag), width = width),
            CellValue::Number(n) => format!("{:>width$}", n, width = width),
            CellValue::Date(_) | CellValue::Empty => {
                format!("{:<width$}", self.raw_or_dash(), width = width)
            }
        }
    }

    pub fn format_md(&self) -> String {
        let raw = match self {
            CellValue::Rag(rag) if *rag == Rag::Red => format!("**{}**", rag.to_string().to_uppercase()),
            _ => self.raw_or_dash(),
        };
        raw.replace('|', "\\|")
    }

    pub fn raw(&self) -> String {
        match self {
            CellValue::Id(s) | CellValue::Text(s) | CellValue::Status(s) => s.clone(),
            CellValue::Severity(s) => s.to_string(),
            CellValue::Priority(p) => p.to_string(),
            CellValue::Rag(r) => r.to_string().to_uppercase(),
            CellValue::Date(d) => d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Empty => String::new(),
        }
    }

    fn raw_or_dash(&self) -> String {
        let raw = self.raw();
        if raw.is_empty() {
            "-".to_string()
        } else {
            raw
        }
    }

    pub fn display_width(&self) -> usize {
        match self {
            CellValue::Date(_) => 10,
            _ => self.raw_or_dash().chars().count(),
        }
    }
}

/// Column definition for a table
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub key: &'static str,
    pub header: &'static str,
    /// Maximum width in terminal output
    pub width: usize,
}

impl ColumnDef {
    pub const fn new(key: &'static str, header: &'static str, width: usize) -> Self {
        Self { key, header, width }
    }
}

/// One table row; `id` is what `--format id` prints
pub struct TableRow {
    pub id: String,
    pub cells: Vec<(&'static str, CellValue)>,
}

impl TableRow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cells: Vec::new(),
        }
    }

    pub fn cell(mut self, key: &'static str, value: CellValue) -> Self {
        self.cells.push((key, value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Renders rows in the requested format
pub struct TableFormatter<'a> {
    columns: &'a [ColumnDef],
    entity_name: &'static str,
    show_summary: bool,
}

impl<'a> TableFormatter<'a> {
    pub fn new(columns: &'a [ColumnDef], entity_name: &'static str) -> Self {
        Self {
            columns,
            entity_name,
            show_summary: true,
        }
    }

    pub fn without_summary(mut self) -> Self {
        self.show_summary = false;
        self
    }

    pub fn output<I>(&self, rows: I, format: OutputFormat) -> Result<()>
    where
        I: IntoIterator<Item = TableRow>,
    {
        let rows: Vec<TableRow> = rows.into_iter().collect();
        match format {
            OutputFormat::Csv => return self.write_csv(&rows, std::io::stdout().lock()),
            OutputFormat::Md => self.output_md(&rows),
            OutputFormat::Id => rows.iter().for_each(|r| println!("{}", r.id)),
            _ => self.output_tsv(&rows),
        }
        Ok(())
    }

    fn calculate_widths(&self, rows: &[TableRow]) -> Vec<usize> {
        self.columns
            .iter()
            .map(|col| {
                let max_content = rows
                    .iter()
                    .filter_map(|r| r.get(col.key))
                    .map(|v| v.display_width())
                    .max()
                    .unwrap_or(0);
                col.header
                    .len()
                    .max(max_content.saturating_add(2))
                    .min(col.width)
            })
            .collect()
    }

    fn output_tsv(&self, rows: &[TableRow]) {
        let widths = self.calculate_widths(rows);

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| format!("{:<width$}", style(col.header).bold(), width = *w))
            .collect();
        println!("{}", header.join(" "));

        let total_width: usize = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);
        println!("{}", "-".repeat(total_width));

        for row in rows {
            let parts: Vec<String> = self
                .columns
                .iter()
                .zip(&widths)
                .map(|(col, w)| match row.get(col.key) {
                    Some(value) => value.format_tsv(*w),
                    None => format!("{:<width$}", "-", width = *w),
                })
                .collect();
            println!("{}", parts.join(" "));
        }

        if self.show_summary {
            println!();
            println!("{} {}(s) found.", style(rows.len()).cyan(), self.entity_name);
        }
    }

    /// Header of column keys, then one record per row
    pub fn write_csv<W: Write>(&self, rows: &[TableRow], sink: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(sink);
        writer
            .write_record(self.columns.iter().map(|c| c.key))
            .into_diagnostic()?;
        for row in rows {
            writer
                .write_record(
                    self.columns
                        .iter()
                        .map(|col| row.get(col.key).map(CellValue::raw).unwrap_or_default()),
                )
                .into_diagnostic()?;
        }
        writer.flush().into_diagnostic()
    }

    fn output_md(&self, rows: &[TableRow]) {
        let headers: Vec<&str> = self.columns.iter().map(|c| c.header).collect();
        println!("| {} |", headers.join(" | "));
        let separators: Vec<&str> = headers.iter().map(|_| "---").collect();
        println!("|{}|", separators.join("|"));

        for row in rows {
            let values: Vec<String> = self
                .columns
                .iter()
                .map(|col| {
                    row.get(col.key)
                        .map(CellValue::format_md)
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect();
            println!("| {} |", values.join(" | "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_text_format() {
        let cell = CellValue::Text("Hello World".to_string());
        assert!(cell.format_tsv(20).contains("Hello World"));
        assert_eq!(cell.raw(), "Hello World");
        assert_eq!(cell.format_md(), "Hello World");
    }

    #[test]
    fn test_cell_value_rag_format() {
        assert_eq!(CellValue::Rag(Rag::Amber).raw(), "AMBER");
        assert_eq!(CellValue::Rag(Rag::Red).format_md(), "**RED**");
    }

    #[test]
    fn test_cell_value_dates() {
        let due = NaiveDate::from_ymd_opt(2025, 3, 10);
        assert_eq!(CellValue::Date(due).raw(), "2025-03-10");
        assert_eq!(CellValue::Date(None).raw(), "");
        assert_eq!(CellValue::Date(None).format_md(), "-");
    }

    #[test]
    fn test_cell_value_md_escapes_pipes() {
        let cell = CellValue::Text("a|b|c".to_string());
        assert_eq!(cell.format_md(), "a\\|b\\|c");
    }

    #[test]
    fn test_row_lookup() {
        let row = TableRow::new("CASE-1")
            .cell("title", CellValue::Text("Leak".into()))
            .cell("actions", CellValue::Number(3));
        assert_eq!(row.get("actions").map(CellValue::raw).as_deref(), Some("3"));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_csv_quotes_awkward_text() {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("title", "TITLE", 20),
            ColumnDef::new("due", "DUE", 10),
        ];
        let rows = vec![
            TableRow::new("CASE-1")
                .cell("title", CellValue::Text("Seal, \"lip\" torn\r\nagain".into())),
            TableRow::new("CASE-2")
                .cell("title", CellValue::Text("Plain".into()))
                .cell("due", CellValue::Date(NaiveDate::from_ymd_opt(2025, 3, 10))),
        ];

        let mut buffer = Vec::new();
        TableFormatter::new(COLUMNS, "case")
            .write_csv(&rows, &mut buffer)
            .unwrap();

        let mut reader = csv::Reader::from_reader(buffer.as_slice());
        let headers: Vec<&str> = reader.headers().unwrap().iter().collect();
        assert_eq!(headers, vec!["title", "due"]);
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][0], "Seal, \"lip\" torn\r\nagain");
        assert_eq!(&records[0][1], "");
        assert_eq!(&records[1][1], "2025-03-10");
    }
}
