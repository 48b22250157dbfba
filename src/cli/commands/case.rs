//! `qct case` command - Case management

use chrono::NaiveDate;
use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{open_workspace, print_structured, style_rag, truncate_str};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::entity::Severity;
use crate::entities::{
    CaseDetails, CaseStatus, CaseType, CustomerDetails, ImprovementDetails, SupplierDetails,
};
use crate::lifecycle::{ApprovalState, CaseFilter, Closure, NewCase};

#[derive(Subcommand, Debug)]
pub enum CaseCommands {
    /// Open a new case
    New(NewArgs),

    /// List cases with filtering
    List(ListArgs),

    /// Show a case with its actions, analysis and approval state
    Show(ShowArgs),

    /// Move a case to another status
    Transition(TransitionArgs),

    /// Close a case (all mandatory actions done, approvals signed)
    Close(CloseArgs),

    /// Reopen a closed case
    Reopen(ReopenArgs),

    /// Add an investigation note
    Note(NoteArgs),

    /// Change a case's due date
    Due(DueArgs),

    /// Show a case's audit trail
    History(ShowArgs),
}

const CASE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("reference", "REFERENCE", 20),
    ColumnDef::new("title", "TITLE", 36),
    ColumnDef::new("severity", "SEVERITY", 10),
    ColumnDef::new("status", "STATUS", 32),
    ColumnDef::new("owner", "OWNER", 16),
    ColumnDef::new("due", "DUE", 12),
    ColumnDef::new("health", "HEALTH", 8),
];

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Case type (nc, cc, snc, ofi)
    #[arg(long, short = 'T')]
    pub r#type: CaseType,

    /// Short title
    #[arg(long, short = 't')]
    pub title: String,

    /// Problem statement
    #[arg(long, short = 'p')]
    pub problem: String,

    /// Severity (low, medium, high, critical)
    #[arg(long, short = 's', default_value = "medium")]
    pub severity: Severity,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub area: Option<String>,

    #[arg(long)]
    pub department: Option<String>,

    /// Case owner (default: whoever raised it)
    #[arg(long)]
    pub owner: Option<String>,

    /// Date raised, YYYY-MM-DD (default: today)
    #[arg(long)]
    pub raised_on: Option<NaiveDate>,

    /// Due date, YYYY-MM-DD (default: from severity)
    #[arg(long)]
    pub due: Option<NaiveDate>,

    /// NC only: create an immediate containment action
    #[arg(long)]
    pub containment: bool,

    /// CC: customer name
    #[arg(long)]
    pub customer: Option<String>,

    /// SNC: supplier name
    #[arg(long)]
    pub supplier: Option<String>,

    /// SNC: purchase order reference
    #[arg(long)]
    pub po: Option<String>,

    /// OFI: expected benefit
    #[arg(long)]
    pub benefit: Option<String>,

    /// Who raised the case (default: configured author)
    #[arg(long)]
    pub by: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by case type
    #[arg(long, short = 'T')]
    pub r#type: Option<CaseType>,

    /// Filter by status
    #[arg(long)]
    pub status: Option<CaseStatus>,

    /// Filter by severity
    #[arg(long)]
    pub severity: Option<Severity>,

    /// Filter by owner
    #[arg(long)]
    pub owner: Option<String>,

    /// Search reference, title and problem statement
    #[arg(long)]
    pub search: Option<String>,

    /// Only cases past their due date
    #[arg(long)]
    pub overdue: bool,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Case id or reference (e.g. QMS-NC-2025-001)
    pub case: String,
}

#[derive(clap::Args, Debug)]
pub struct TransitionArgs {
    /// Case id or reference
    pub case: String,

    /// Target status
    pub status: CaseStatus,

    /// Fail if the case has changed since this version
    #[arg(long)]
    pub expect_version: Option<u64>,

    #[arg(long)]
    pub by: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct CloseArgs {
    /// Case id or reference
    pub case: String,

    /// Closure comments
    #[arg(long, short = 'm')]
    pub comments: Option<String>,

    #[arg(long)]
    pub expect_version: Option<u64>,

    #[arg(long)]
    pub by: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ReopenArgs {
    /// Case id or reference
    pub case: String,

    /// Why the case is being reopened
    #[arg(long, short = 'r')]
    pub reason: String,

    #[arg(long)]
    pub expect_version: Option<u64>,

    #[arg(long)]
    pub by: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct NoteArgs {
    /// Case id or reference
    pub case: String,

    /// Note text
    pub text: String,

    #[arg(long)]
    pub by: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct DueArgs {
    /// Case id or reference
    pub case: String,

    /// New due date, YYYY-MM-DD
    pub date: NaiveDate,

    #[arg(long)]
    pub by: Option<String>,
}

pub fn run(cmd: CaseCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CaseCommands::New(args) => run_new(args, global),
        CaseCommands::List(args) => run_list(args, global),
        CaseCommands::Show(args) => run_show(args, global),
        CaseCommands::Transition(args) => run_transition(args, global),
        CaseCommands::Close(args) => run_close(args, global),
        CaseCommands::Reopen(args) => run_reopen(args, global),
        CaseCommands::Note(args) => run_note(args, global),
        CaseCommands::Due(args) => run_due(args, global),
        CaseCommands::History(args) => run_history(args, global),
    }
}

fn details_for(args: &NewArgs) -> Option<CaseDetails> {
    match args.r#type {
        CaseType::Cc => args.customer.clone().map(|customer_name| {
            CaseDetails::Customer(CustomerDetails {
                customer_name,
                ..CustomerDetails::default()
            })
        }),
        CaseType::Snc => args.supplier.clone().map(|supplier_name| {
            CaseDetails::Supplier(SupplierDetails {
                supplier_name,
                po_reference: args.po.clone(),
                ..SupplierDetails::default()
            })
        }),
        CaseType::Ofi => args.benefit.clone().map(|benefit| {
            CaseDetails::Improvement(ImprovementDetails {
                expected_benefit: Some(benefit),
                effort_estimate: None,
            })
        }),
        CaseType::Nc => None,
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let raised_by = ws.actor(args.by.as_deref());

    let case = ws.engine.cases().open_case(NewCase {
        case_type: args.r#type,
        title: args.title.clone(),
        problem_statement: args.problem.clone(),
        severity: args.severity,
        category: args.category.clone(),
        area: args.area.clone(),
        department: args.department.clone(),
        raised_by,
        raised_on: args.raised_on,
        owner: args.owner.clone(),
        due_date: args.due,
        containment_needed: args.containment,
        details: details_for(&args),
    })?;

    match global.format {
        OutputFormat::Id => println!("{}", case.id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&case, global.format)?,
        _ => {
            println!(
                "{} Opened case {} ({})",
                style("✓").green(),
                style(&case.reference).cyan(),
                case.id
            );
            if !global.quiet {
                println!(
                    "   {} | {} | due {}",
                    style(&case.title).yellow(),
                    case.severity,
                    case.due_date.map(|d| d.to_string()).unwrap_or_default()
                );
                if case.containment_needed {
                    println!("   Containment action created for {}", case.owner);
                }
            }
        }
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let cases = ws.engine.cases();

    let filter = CaseFilter {
        case_type: args.r#type,
        status: args.status,
        severity: args.severity,
        owner: args.owner,
        search: args.search,
        overdue: args.overdue,
    };
    let found = cases.list(&filter)?;

    if args.count {
        println!("{}", found.len());
        return Ok(());
    }

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&found, global.format),
        format => {
            if found.is_empty() && format == OutputFormat::Auto {
                println!("No cases found.");
                return Ok(());
            }
            let mut rows = Vec::with_capacity(found.len());
            for case in &found {
                let health = cases.health(case)?;
                rows.push(
                    TableRow::new(case.id.to_string())
                        .cell("reference", CellValue::Id(case.reference.clone()))
                        .cell("title", CellValue::Text(case.title.clone()))
                        .cell("severity", CellValue::Severity(case.severity))
                        .cell("status", CellValue::Status(case.status.to_string()))
                        .cell("owner", CellValue::Text(case.owner.clone()))
                        .cell("due", CellValue::Date(case.due_date))
                        .cell("health", CellValue::Rag(health)),
                );
            }
            TableFormatter::new(CASE_COLUMNS, "case").output(rows, format)
        }
    }
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let engine = &ws.engine;
    let case = engine.cases().find(&args.case)?;

    match global.format {
        OutputFormat::Id => {
            println!("{}", case.id);
            return Ok(());
        }
        OutputFormat::Json | OutputFormat::Yaml => return print_structured(&case, global.format),
        _ => {}
    }

    let readiness = engine.cases().readiness(&case.id)?;
    let actions = engine.actions().list_by_case(&case.id)?;
    let analysis = engine.analyses().current(&case.id)?;

    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("Reference").bold(), style(&case.reference).cyan());
    println!("{}: {}", style("ID").bold(), case.id);
    println!("{}: {}", style("Title").bold(), style(&case.title).yellow());
    println!("{}: {}", style("Type").bold(), case.case_type);
    println!("{}: {}", style("Severity").bold(), case.severity);
    println!("{}: {}", style("Status").bold(), case.status);
    println!("{}: {}", style("Health").bold(), style_rag(readiness.health));
    println!("{}: {}", style("Owner").bold(), case.owner);
    println!(
        "{}: {} on {}",
        style("Raised").bold(),
        case.raised_by,
        case.raised_on
    );
    if let Some(due) = case.due_date {
        println!("{}: {}", style("Due").bold(), due);
    }
    println!("{}: {}", style("Version").bold(), case.version);
    println!("{}", style("─".repeat(60)).dim());

    println!();
    println!("{}", style("Problem Statement:").bold());
    println!("{}", case.problem_statement);

    println!();
    match &analysis {
        Some(rca) => {
            println!(
                "{}: {} (revision {}, by {})",
                style("Root Cause").bold(),
                rca.method,
                rca.revision,
                rca.analyst
            );
            if !rca.conclusion.is_empty() {
                println!("  {}", rca.conclusion);
            }
        }
        None => println!("{}: {}", style("Root Cause").bold(), style("not yet attached").dim()),
    }

    println!();
    println!(
        "{} ({}/{} done)",
        style("Actions").bold(),
        readiness.done_actions,
        readiness.total_actions
    );
    for action in &actions {
        let marker = if action.is_done() {
            style("✓").green()
        } else {
            style("○").dim()
        };
        println!(
            "  {} {} {} [{}] {}",
            marker,
            style(action.id.to_string()).cyan(),
            truncate_str(&action.title, 40),
            action.status,
            action.due_date.map(|d| d.to_string()).unwrap_or_default()
        );
    }

    println!();
    let approval = match &readiness.approval {
        ApprovalState::NotRequired => style("not required".to_string()).dim(),
        ApprovalState::Missing => style("required but no workflow attached".to_string()).red(),
        ApprovalState::Pending(steps) => style(format!("pending: {}", steps.join(", "))).yellow(),
        ApprovalState::Complete => style("complete".to_string()).green(),
    };
    println!("{}: {}", style("Approval").bold(), approval);

    if !case.notes.is_empty() {
        println!();
        println!("{}", style("Notes:").bold());
        for note in &case.notes {
            println!(
                "  {} {}: {}",
                style(note.at.format("%Y-%m-%d")).dim(),
                note.author,
                note.text
            );
        }
    }

    if let Some(closure) = &case.closure {
        println!();
        println!(
            "{}: by {} on {}",
            style("Closed").bold(),
            closure.closed_by,
            closure.closed_at.format("%Y-%m-%d")
        );
        if let Some(comments) = &closure.comments {
            println!("  {}", comments);
        }
    }

    if !global.quiet && case.status != CaseStatus::Closed {
        println!();
        if readiness.can_close() {
            println!("{} Ready to close", style("✓").green());
        } else if !readiness.unmet_actions.is_empty() {
            println!(
                "{} {} action(s) block closure",
                style("!").yellow(),
                readiness.unmet_actions.len()
            );
        }
    }
    Ok(())
}

fn run_transition(args: TransitionArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let actor = ws.actor(args.by.as_deref());
    let case = ws.engine.cases().find(&args.case)?;
    let previous = case.status;

    let case = ws
        .engine
        .cases()
        .transition(&case.id, args.status, &actor, args.expect_version)?;

    if !global.quiet {
        println!(
            "{} {}: {} → {}",
            style("✓").green(),
            style(&case.reference).cyan(),
            previous,
            case.status
        );
    }
    Ok(())
}

fn run_close(args: CloseArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let closed_by = ws.actor(args.by.as_deref());
    let case = ws.engine.cases().find(&args.case)?;

    let case = ws.engine.cases().close(
        &case.id,
        Closure {
            closed_by,
            comments: args.comments,
        },
        args.expect_version,
    )?;

    if !global.quiet {
        println!("{} Closed {}", style("✓").green(), style(&case.reference).cyan());
    }
    Ok(())
}

fn run_reopen(args: ReopenArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let actor = ws.actor(args.by.as_deref());
    let case = ws.engine.cases().find(&args.case)?;

    let case = ws
        .engine
        .cases()
        .reopen(&case.id, &args.reason, &actor, args.expect_version)?;

    if !global.quiet {
        println!("{} Reopened {}", style("✓").green(), style(&case.reference).cyan());
    }
    Ok(())
}

fn run_note(args: NoteArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let actor = ws.actor(args.by.as_deref());
    let case = ws.engine.cases().find(&args.case)?;

    let case = ws.engine.cases().add_note(&case.id, &args.text, &actor)?;

    if !global.quiet {
        println!(
            "{} Note added to {} ({} note(s))",
            style("✓").green(),
            style(&case.reference).cyan(),
            case.notes.len()
        );
    }
    Ok(())
}

fn run_due(args: DueArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let actor = ws.actor(args.by.as_deref());
    let case = ws.engine.cases().find(&args.case)?;

    let case = ws.engine.cases().set_due_date(&case.id, args.date, &actor)?;
    let health = ws.engine.cases().health(&case)?;

    if !global.quiet {
        println!(
            "{} {} now due {} ({})",
            style("✓").green(),
            style(&case.reference).cyan(),
            args.date,
            style_rag(health)
        );
    }
    Ok(())
}

fn run_history(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let case = ws.engine.cases().find(&args.case)?;
    let events = ws.engine.audit_trail(&case.id)?;

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&events, global.format),
        _ => {
            println!("{} {}", style("History of").bold(), style(&case.reference).cyan());
            for event in &events {
                println!(
                    "  {} {:<20} {:<12} {}",
                    style(event.at.format("%Y-%m-%d %H:%M")).dim(),
                    event.event_type.to_string(),
                    truncate_str(&event.actor, 12),
                    event.description
                );
            }
            Ok(())
        }
    }
}
