//! `qct action` command - Remedial action management

use chrono::NaiveDate;
use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{open_workspace, parse_id, print_structured, style_rag};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::entity::Priority;
use crate::core::identity::EntityPrefix;
use crate::core::rag::{Rag, RagSubject};
use crate::entities::{ActionStatus, ActionType};
use crate::lifecycle::NewAction;

#[derive(Subcommand, Debug)]
pub enum ActionCommands {
    /// Add an action to a case
    New(NewArgs),

    /// List a case's actions
    List(ListArgs),

    /// Show an action's details
    Show(ShowArgs),

    /// Change an action's status
    Status(StatusArgs),

    /// Tick or untick a checklist item
    Check(CheckArgs),

    /// Attach an evidence reference
    Evidence(EvidenceArgs),
}

const ACTION_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 32),
    ColumnDef::new("type", "TYPE", 12),
    ColumnDef::new("title", "TITLE", 36),
    ColumnDef::new("owner", "OWNER", 16),
    ColumnDef::new("priority", "PRIORITY", 10),
    ColumnDef::new("status", "STATUS", 18),
    ColumnDef::new("due", "DUE", 12),
    ColumnDef::new("health", "HEALTH", 8),
];

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Case id or reference
    pub case: String,

    /// Action type (containment, correction, corrective, preventive, improvement)
    #[arg(long, short = 'T', default_value = "corrective")]
    pub r#type: ActionType,

    /// Short title
    #[arg(long, short = 't')]
    pub title: String,

    /// Action owner (default: configured author)
    #[arg(long)]
    pub owner: Option<String>,

    /// Due date, YYYY-MM-DD
    #[arg(long)]
    pub due: Option<NaiveDate>,

    /// Priority (low, medium, high)
    #[arg(long, default_value = "medium")]
    pub priority: Priority,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Optional actions do not block case closure
    #[arg(long)]
    pub optional: bool,

    /// Checklist item (repeatable)
    #[arg(long = "check")]
    pub checklist: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Case id or reference
    pub case: String,

    /// Filter by status
    #[arg(long)]
    pub status: Option<ActionStatus>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Action id (ACT-...)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Action id (ACT-...)
    pub id: String,

    /// New status (open, in_progress, pending_approval, blocked, done)
    pub status: ActionStatus,

    /// Completion date when marking done (default: today)
    #[arg(long)]
    pub completed_on: Option<NaiveDate>,

    /// Fail if the action has changed since this version
    #[arg(long)]
    pub expect_version: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Action id (ACT-...)
    pub id: String,

    /// Checklist item number, starting at 0
    pub index: usize,

    /// Untick instead of tick
    #[arg(long)]
    pub undo: bool,
}

#[derive(clap::Args, Debug)]
pub struct EvidenceArgs {
    /// Action id (ACT-...)
    pub id: String,

    /// Document id, URL or path
    pub reference: String,

    #[arg(long)]
    pub by: Option<String>,
}

pub fn run(cmd: ActionCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ActionCommands::New(args) => run_new(args, global),
        ActionCommands::List(args) => run_list(args, global),
        ActionCommands::Show(args) => run_show(args, global),
        ActionCommands::Status(args) => run_status(args, global),
        ActionCommands::Check(args) => run_check(args, global),
        ActionCommands::Evidence(args) => run_evidence(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let case = ws.engine.cases().find(&args.case)?;
    let owner = ws.actor(args.owner.as_deref());

    let mut new = NewAction::new(case.id.clone(), args.r#type, args.title, owner);
    new.due_date = args.due;
    new.priority = args.priority;
    new.description = args.description;
    new.mandatory = !args.optional;
    new.checklist = args.checklist;

    let action = ws.engine.actions().create_action(new)?;

    match global.format {
        OutputFormat::Id => println!("{}", action.id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&action, global.format)?,
        _ => {
            println!(
                "{} Added {} action {} to {}",
                style("✓").green(),
                action.action_type,
                style(action.id.to_string()).cyan(),
                style(&case.reference).cyan()
            );
        }
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let case = ws.engine.cases().find(&args.case)?;
    let thresholds = ws.engine.settings().thresholds;
    let today = ws.engine.today();

    let actions: Vec<_> = ws
        .engine
        .actions()
        .list_by_case(&case.id)?
        .into_iter()
        .filter(|a| args.status.map_or(true, |s| a.status == s))
        .collect();

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&actions, global.format),
        format => {
            let archived = case.is_closed();
            let rows = actions.iter().map(|a| {
                let health = if archived {
                    Rag::Navy
                } else {
                    a.rag(today, &thresholds)
                };
                TableRow::new(a.id.to_string())
                    .cell("id", CellValue::Id(a.id.to_string()))
                    .cell("type", CellValue::Text(a.action_type.to_string()))
                    .cell("title", CellValue::Text(a.title.clone()))
                    .cell("owner", CellValue::Text(a.owner.clone()))
                    .cell("priority", CellValue::Priority(a.priority))
                    .cell("status", CellValue::Status(a.status.to_string()))
                    .cell("due", CellValue::Date(a.due_date))
                    .cell("health", CellValue::Rag(health))
            });
            TableFormatter::new(ACTION_COLUMNS, "action").output(rows, format)
        }
    }
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let id = parse_id(&args.id, EntityPrefix::Act)?;
    let action = ws.engine.actions().get(&id)?;

    match global.format {
        OutputFormat::Id => {
            println!("{}", action.id);
            return Ok(());
        }
        OutputFormat::Json | OutputFormat::Yaml => return print_structured(&action, global.format),
        _ => {}
    }

    let case = ws.engine.cases().get(&action.case_id)?;
    let health = action.rag(ws.engine.today(), &ws.engine.settings().thresholds);

    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(action.id.to_string()).cyan());
    println!("{}: {}", style("Case").bold(), style(&case.reference).cyan());
    println!("{}: {}", style("Title").bold(), style(&action.title).yellow());
    println!("{}: {}", style("Type").bold(), action.action_type);
    println!("{}: {}", style("Owner").bold(), action.owner);
    println!("{}: {}", style("Priority").bold(), action.priority);
    println!("{}: {}", style("Status").bold(), action.status);
    if let Some(due) = action.due_date {
        println!("{}: {} ({})", style("Due").bold(), due, style_rag(health));
    }
    if let Some(done) = action.completed_on {
        println!("{}: {}", style("Completed").bold(), done);
    }
    println!(
        "{}: {}",
        style("Mandatory").bold(),
        if action.mandatory { "yes" } else { "no" }
    );
    println!("{}: {}", style("Version").bold(), action.version);
    println!("{}", style("─".repeat(60)).dim());

    if let Some(description) = &action.description {
        println!();
        println!("{}", description);
    }

    if !action.checklist.is_empty() {
        println!();
        println!("{}", style("Checklist:").bold());
        for (i, item) in action.checklist.iter().enumerate() {
            let mark = if item.done { style("x").green() } else { style(" ").dim() };
            println!("  {}. [{}] {}", i, mark, item.label);
        }
    }

    if !action.evidence.is_empty() {
        println!();
        println!("{}", style("Evidence:").bold());
        for evidence in &action.evidence {
            println!(
                "  {} ({}, {})",
                evidence.reference,
                evidence.added_by,
                evidence.added_at.format("%Y-%m-%d")
            );
        }
    }
    Ok(())
}

fn run_status(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let id = parse_id(&args.id, EntityPrefix::Act)?;

    let completed_on = match args.status {
        ActionStatus::Done => Some(args.completed_on.unwrap_or_else(|| ws.engine.today())),
        _ => args.completed_on,
    };
    let action =
        ws.engine
            .actions()
            .update_status(&id, args.status, completed_on, args.expect_version)?;

    if !global.quiet {
        println!(
            "{} {} is now {}",
            style("✓").green(),
            style(action.id.to_string()).cyan(),
            action.status
        );
    }
    Ok(())
}

fn run_check(args: CheckArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let id = parse_id(&args.id, EntityPrefix::Act)?;

    let action = ws
        .engine
        .actions()
        .set_checklist_item(&id, args.index, !args.undo)?;

    if !global.quiet {
        let remaining = action.unchecked_items().len();
        println!(
            "{} {} checklist: {} item(s) remaining",
            style("✓").green(),
            style(action.id.to_string()).cyan(),
            remaining
        );
    }
    Ok(())
}

fn run_evidence(args: EvidenceArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let actor = ws.actor(args.by.as_deref());
    let id = parse_id(&args.id, EntityPrefix::Act)?;

    let action = ws
        .engine
        .actions()
        .attach_evidence(&id, &args.reference, &actor)?;

    if !global.quiet {
        println!(
            "{} Evidence attached to {} ({} item(s))",
            style("✓").green(),
            style(action.id.to_string()).cyan(),
            action.evidence.len()
        );
    }
    Ok(())
}
