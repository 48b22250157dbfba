//! `qct report` command - Markdown case register report

use chrono::NaiveDate;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{open_workspace, truncate_str};
use crate::cli::GlobalOpts;
use crate::core::rag::{Rag, RagSubject, RagSummary};
use crate::entities::Action;
use crate::lifecycle::{CaseOverview, Lifecycle};

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    /// Output to file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Evaluate health as of this date (default: today)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,
}

pub fn run(args: ReportArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let today = args.as_of.unwrap_or_else(|| ws.engine.today());
    let content = build_report(&ws.engine, today)?;
    write_output(&content, args.output)
}

/// Render the register as Markdown
pub(crate) fn build_report(engine: &Lifecycle, today: NaiveDate) -> Result<String> {
    let dashboard = engine.dashboard();
    let summary = dashboard.summary(today)?;
    let overview = dashboard.case_overview(today)?;
    let open: Vec<&CaseOverview> = overview.iter().filter(|c| c.health != Rag::Navy).collect();

    let mut output = String::new();
    output.push_str("# Quality Case Register\n\n");
    output.push_str(&format!("As of {}\n\n", today));

    output.push_str("## Summary\n\n");
    let mut counts = Builder::default();
    counts.push_record(["Metric", "Count"]);
    counts.push_record(["Open cases", &summary.open_cases.to_string()]);
    counts.push_record(["Closed cases", &summary.closed_cases.to_string()]);
    counts.push_record(["Overdue actions", &summary.overdue_actions.to_string()]);
    output.push_str(&counts.build().with(Style::markdown()).to_string());

    output.push_str("\n\n## Health\n\n");
    let mut health = Builder::default();
    health.push_record(["", "Red", "Amber", "Green", "Navy"]);
    health.push_record(rag_record("Cases", &summary.cases));
    health.push_record(rag_record("Actions", &summary.actions));
    output.push_str(&health.build().with(Style::markdown()).to_string());

    if !open.is_empty() {
        output.push_str("\n\n## Open Cases\n\n");
        let mut table = Builder::default();
        table.push_record([
            "Reference", "Title", "Severity", "Status", "Owner", "Due", "Actions", "Health",
        ]);
        for case in &open {
            table.push_record([
                case.reference.clone(),
                truncate_str(&case.title, 40),
                case.severity.to_string(),
                case.status.to_string(),
                case.owner.clone(),
                case.due_date.map(|d| d.to_string()).unwrap_or_default(),
                format!("{}/{}", case.open_actions, case.total_actions),
                case.health.label().to_string(),
            ]);
        }
        output.push_str(&table.build().with(Style::markdown()).to_string());
    }

    let thresholds = engine.settings().thresholds;
    let mut overdue: Vec<(&str, Action)> = Vec::new();
    for case in &open {
        for action in engine.actions().list_by_case(&case.id)? {
            if action.rag(today, &thresholds) == Rag::Red {
                overdue.push((&case.reference, action));
            }
        }
    }

    if !overdue.is_empty() {
        overdue.sort_by_key(|(_, a)| a.due_date);
        output.push_str("\n\n## Overdue Actions\n\n");
        let mut table = Builder::default();
        table.push_record(["Case", "Action", "Title", "Owner", "Due", "Days Late"]);
        for (reference, action) in &overdue {
            let late = action
                .due_date
                .map(|d| (today - d).num_days().to_string())
                .unwrap_or_default();
            table.push_record([
                reference.to_string(),
                action.id.to_string(),
                truncate_str(&action.title, 40),
                action.owner.clone(),
                action.due_date.map(|d| d.to_string()).unwrap_or_default(),
                late,
            ]);
        }
        output.push_str(&table.build().with(Style::markdown()).to_string());
    }

    output.push('\n');
    Ok(output)
}

fn rag_record(label: &str, counts: &RagSummary) -> [String; 5] {
    [
        label.to_string(),
        counts.red.to_string(),
        counts.amber.to_string(),
        counts.green.to_string(),
        counts.navy.to_string(),
    ]
}

pub(crate) fn write_output(content: &str, output_path: Option<PathBuf>) -> Result<()> {
    match output_path {
        Some(path) => {
            let file = File::create(&path).into_diagnostic()?;
            let mut writer = BufWriter::new(file);
            writer.write_all(content.as_bytes()).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing;

    #[test]
    fn test_report_lists_open_cases_and_overdue_actions() {
        let engine = testing::engine();
        let case = testing::open(&engine, "Scratched housing");
        testing::add_action(&engine, &case, "Re-train operators");

        let far_future = testing::today() + chrono::Duration::days(400);
        let report = build_report(&engine, far_future).unwrap();

        assert!(report.starts_with("# Quality Case Register"));
        assert!(report.contains("## Open Cases"));
        assert!(report.contains(&case.reference));
        assert!(report.contains("## Overdue Actions"));
        assert!(report.contains("Re-train operators"));
    }

    #[test]
    fn test_report_on_empty_register() {
        let engine = testing::engine();
        let report = build_report(&engine, testing::today()).unwrap();

        assert!(report.contains("## Summary"));
        assert!(!report.contains("## Open Cases"));
        assert!(!report.contains("## Overdue Actions"));
    }
}
