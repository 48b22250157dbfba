//! `qct export` command - CSV export of cases or actions

use chrono::NaiveDate;
use clap::ValueEnum;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

use crate::cli::helpers::open_workspace;
use crate::cli::GlobalOpts;
use crate::core::rag::{Rag, RagSubject};
use crate::lifecycle::{CaseFilter, Lifecycle};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Cases,
    Actions,
}

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// What to export
    #[arg(value_enum)]
    pub what: ExportKind,

    /// Write to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct CaseRow {
    id: String,
    reference: String,
    #[serde(rename = "type")]
    case_type: String,
    title: String,
    severity: String,
    status: String,
    owner: String,
    raised_by: String,
    raised_on: NaiveDate,
    due_date: Option<NaiveDate>,
    health: String,
    open_actions: usize,
    total_actions: usize,
}

#[derive(Debug, Serialize)]
struct ActionRow {
    id: String,
    case_reference: String,
    #[serde(rename = "type")]
    action_type: String,
    title: String,
    owner: String,
    priority: String,
    status: String,
    mandatory: bool,
    due_date: Option<NaiveDate>,
    completed_on: Option<NaiveDate>,
    health: String,
}

pub fn run(args: ExportArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(std::fs::File::create(path).into_diagnostic()?),
        None => Box::new(std::io::stdout().lock()),
    };
    let count = write_csv(&ws.engine, args.what, sink)?;

    if let Some(path) = &args.output {
        if !global.quiet {
            eprintln!("Exported {} row(s) to {}", count, path.display());
        }
    }
    Ok(())
}

/// Write the chosen register as CSV, returning the number of data rows
pub(crate) fn write_csv<W: Write>(engine: &Lifecycle, what: ExportKind, sink: W) -> Result<usize> {
    let today = engine.today();
    let thresholds = engine.settings().thresholds;
    let cases = engine.cases().list(&CaseFilter::default())?;
    let mut writer = csv::Writer::from_writer(sink);
    let mut count = 0;

    for case in &cases {
        let actions = engine.actions().list_by_case(&case.id)?;
        match what {
            ExportKind::Cases => {
                let health = engine.cases().health_with(case, &actions);
                writer
                    .serialize(CaseRow {
                        id: case.id.to_string(),
                        reference: case.reference.clone(),
                        case_type: case.case_type.code().to_string(),
                        title: case.title.clone(),
                        severity: case.severity.to_string(),
                        status: case.status.to_string(),
                        owner: case.owner.clone(),
                        raised_by: case.raised_by.clone(),
                        raised_on: case.raised_on,
                        due_date: case.due_date,
                        health: health.to_string(),
                        open_actions: actions.iter().filter(|a| !a.is_done()).count(),
                        total_actions: actions.len(),
                    })
                    .into_diagnostic()?;
                count += 1;
            }
            ExportKind::Actions => {
                for action in &actions {
                    let health = if case.is_closed() {
                        Rag::Navy
                    } else {
                        action.rag(today, &thresholds)
                    };
                    writer
                        .serialize(ActionRow {
                            id: action.id.to_string(),
                            case_reference: case.reference.clone(),
                            action_type: action.action_type.to_string(),
                            title: action.title.clone(),
                            owner: action.owner.clone(),
                            priority: action.priority.to_string(),
                            status: action.status.to_string(),
                            mandatory: action.mandatory,
                            due_date: action.due_date,
                            completed_on: action.completed_on,
                            health: health.to_string(),
                        })
                        .into_diagnostic()?;
                    count += 1;
                }
            }
        }
    }

    writer.flush().into_diagnostic()?;
    Ok(count)
}
