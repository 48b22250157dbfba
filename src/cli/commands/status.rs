//! `qct status` command - Case health dashboard

use chrono::NaiveDate;
use console::style;
use miette::Result;

use crate::cli::helpers::{open_workspace, print_structured, style_rag};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::rag::{Rag, RagSummary};
use crate::lifecycle::{CaseOverview, DashboardSummary};

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Evaluate health as of this date (default: today)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Include closed cases in the table
    #[arg(long, short = 'a')]
    pub all: bool,

    /// Show only the summary counts
    #[arg(long)]
    pub summary: bool,
}

const OVERVIEW_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("reference", "REFERENCE", 20),
    ColumnDef::new("title", "TITLE", 32),
    ColumnDef::new("severity", "SEVERITY", 10),
    ColumnDef::new("status", "STATUS", 32),
    ColumnDef::new("owner", "OWNER", 16),
    ColumnDef::new("due", "DUE", 12),
    ColumnDef::new("actions", "ACTIONS", 8),
    ColumnDef::new("overdue", "OVERDUE", 8),
    ColumnDef::new("health", "HEALTH", 8),
];

#[derive(serde::Serialize)]
struct StatusReport<'a> {
    summary: &'a DashboardSummary,
    cases: &'a [CaseOverview],
}

pub fn run(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let today = args.as_of.unwrap_or_else(|| ws.engine.today());

    let dashboard = ws.engine.dashboard();
    let summary = dashboard.summary(today)?;
    let cases: Vec<CaseOverview> = dashboard
        .case_overview(today)?
        .into_iter()
        .filter(|c| args.all || c.health != Rag::Navy)
        .collect();

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            return print_structured(
                &StatusReport {
                    summary: &summary,
                    cases: &cases,
                },
                global.format,
            );
        }
        OutputFormat::Id => {
            cases.iter().for_each(|c| println!("{}", c.id));
            return Ok(());
        }
        OutputFormat::Auto => print_summary(&summary, today),
        _ => {}
    }

    if args.summary {
        return Ok(());
    }

    if cases.is_empty() {
        if global.format == OutputFormat::Auto {
            println!("No open cases.");
        }
        return Ok(());
    }

    let rows = cases.iter().map(|c| {
        TableRow::new(c.id.to_string())
            .cell("reference", CellValue::Id(c.reference.clone()))
            .cell("title", CellValue::Text(c.title.clone()))
            .cell("severity", CellValue::Severity(c.severity))
            .cell("status", CellValue::Status(c.status.to_string()))
            .cell("owner", CellValue::Text(c.owner.clone()))
            .cell("due", CellValue::Date(c.due_date))
            .cell(
                "actions",
                CellValue::Text(format!("{}/{}", c.open_actions, c.total_actions)),
            )
            .cell("overdue", CellValue::Number(c.overdue_actions))
            .cell("health", CellValue::Rag(c.health))
    });
    TableFormatter::new(OVERVIEW_COLUMNS, "case")
        .without_summary()
        .output(rows, global.format)
}

fn print_summary(summary: &DashboardSummary, today: NaiveDate) {
    println!(
        "{} as of {}",
        style("Quality Case Status").bold().underlined(),
        today
    );
    println!("{}", style("═".repeat(60)).dim());
    println!(
        "  Open cases: {}   Closed cases: {}   Overdue actions: {}",
        style(summary.open_cases).cyan(),
        style(summary.closed_cases).dim(),
        if summary.overdue_actions > 0 {
            style(summary.overdue_actions).red().bold()
        } else {
            style(summary.overdue_actions).green()
        }
    );
    println!();
    print_rag_line("Cases", &summary.cases);
    print_rag_line("Actions", &summary.actions);
    println!();
}

fn print_rag_line(label: &str, counts: &RagSummary) {
    println!(
        "  {:<8} {} {:<4} {} {:<4} {} {:<4} {} {}",
        label,
        style_rag(Rag::Red),
        counts.red,
        style_rag(Rag::Amber),
        counts.amber,
        style_rag(Rag::Green),
        counts.green,
        style_rag(Rag::Navy),
        counts.navy
    );
}
