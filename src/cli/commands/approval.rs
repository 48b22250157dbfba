//! `qct approval` command - Sign-off workflows on cases and actions

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{open_workspace, parse_id, print_structured, Workspace};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::entities::{ApprovalMode, ApprovalWorkflow, RequiredSigner};

#[derive(Subcommand, Debug)]
pub enum ApprovalCommands {
    /// Attach a sign-off workflow to a case or action
    Create(CreateArgs),

    /// Sign one step
    Sign(SignArgs),

    /// Record a rejection against a step
    Reject(RejectArgs),

    /// Show the workflow on a case or action
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// Case reference/id, or action id (ACT-...)
    pub owner: String,

    /// Signing order (sequential, parallel)
    #[arg(long, default_value = "sequential")]
    pub mode: ApprovalMode,

    /// Step signer, in order: role:<role> or user:<name> (repeatable or comma-separated)
    #[arg(long = "signer", required = true, value_delimiter = ',')]
    pub signers: Vec<RequiredSigner>,

    #[arg(long)]
    pub by: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SignArgs {
    /// Workflow id (APV-...)
    pub id: String,

    /// Step number, starting at 0
    pub step: usize,

    /// Signer (default: configured author)
    #[arg(long)]
    pub by: Option<String>,

    #[arg(long, short = 'm')]
    pub comments: Option<String>,

    /// Fail if the workflow has changed since this version
    #[arg(long)]
    pub expect_version: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct RejectArgs {
    /// Workflow id (APV-...)
    pub id: String,

    /// Step number, starting at 0
    pub step: usize,

    /// Why the step is rejected
    #[arg(long, short = 'r')]
    pub reason: String,

    #[arg(long)]
    pub by: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Case reference/id, action id (ACT-...) or workflow id (APV-...)
    pub target: String,
}

pub fn run(cmd: ApprovalCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ApprovalCommands::Create(args) => run_create(args, global),
        ApprovalCommands::Sign(args) => run_sign(args, global),
        ApprovalCommands::Reject(args) => run_reject(args, global),
        ApprovalCommands::Show(args) => run_show(args, global),
    }
}

/// Resolve a case reference or an action id to the owner's id
fn resolve_owner(ws: &Workspace, target: &str) -> Result<EntityId> {
    if target.to_uppercase().starts_with("ACT-") {
        return parse_id(target, EntityPrefix::Act);
    }
    Ok(ws.engine.cases().find(target)?.id)
}

fn run_create(args: CreateArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let actor = ws.actor(args.by.as_deref());
    let owner = resolve_owner(&ws, &args.owner)?;

    let workflow = ws
        .engine
        .approvals()
        .create_workflow(&owner, args.mode, args.signers, &actor)?;

    match global.format {
        OutputFormat::Id => println!("{}", workflow.id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&workflow, global.format)?,
        _ => {
            println!(
                "{} Created {} approval {} with {} step(s) on {}",
                style("✓").green(),
                workflow.mode,
                style(workflow.id.to_string()).cyan(),
                workflow.steps.len(),
                style(&args.owner).cyan()
            );
        }
    }
    Ok(())
}

fn run_sign(args: SignArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let signer = ws.actor(args.by.as_deref());
    let id = parse_id(&args.id, EntityPrefix::Apv)?;

    let workflow = ws.engine.approvals().sign(
        &id,
        args.step,
        &signer,
        args.comments.as_deref(),
        args.expect_version,
    )?;

    if !global.quiet {
        println!(
            "{} Step {} of {} signed by {}",
            style("✓").green(),
            args.step,
            style(workflow.id.to_string()).cyan(),
            signer
        );
        if workflow.is_complete() {
            println!("  {}", style("All steps signed").green());
        } else {
            println!(
                "  Still pending: {}",
                style(workflow.pending_descriptions().join(", ")).yellow()
            );
        }
    }
    Ok(())
}

fn run_reject(args: RejectArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let rejector = ws.actor(args.by.as_deref());
    let id = parse_id(&args.id, EntityPrefix::Apv)?;

    let workflow = ws
        .engine
        .approvals()
        .reject(&id, args.step, &rejector, &args.reason)?;

    if !global.quiet {
        println!(
            "{} Step {} of {} rejected by {}",
            style("✗").red(),
            args.step,
            style(workflow.id.to_string()).cyan(),
            rejector
        );
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;

    let workflow = if args.target.to_uppercase().starts_with("APV-") {
        let id = parse_id(&args.target, EntityPrefix::Apv)?;
        ws.engine.approvals().get(&id)?
    } else {
        let owner = resolve_owner(&ws, &args.target)?;
        match ws.engine.approvals().for_owner(&owner)? {
            Some(workflow) => workflow,
            None => {
                println!("No approval workflow on {}.", args.target);
                return Ok(());
            }
        }
    };

    match global.format {
        OutputFormat::Id => println!("{}", workflow.id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&workflow, global.format)?,
        _ => print_workflow(&workflow),
    }
    Ok(())
}

fn print_workflow(workflow: &ApprovalWorkflow) {
    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{}: {}",
        style("ID").bold(),
        style(workflow.id.to_string()).cyan()
    );
    println!(
        "{}: {} {}",
        style("Owner").bold(),
        workflow.owner_kind,
        workflow.owner_id
    );
    println!("{}: {}", style("Mode").bold(), workflow.mode);
    println!("{}: {}", style("Version").bold(), workflow.version);
    println!("{}", style("─".repeat(60)).dim());

    for step in &workflow.steps {
        let state = if step.signed {
            style(format!(
                "signed by {} on {}",
                step.signed_by.as_deref().unwrap_or("?"),
                step.signed_at
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_default()
            ))
            .green()
        } else {
            style("pending".to_string()).yellow()
        };
        println!("  {:<3} {:<24} {}", step.index, step.required.to_string(), state);
        if let Some(comments) = &step.comments {
            println!("      {}", style(comments).dim());
        }
    }

    if !workflow.rejections.is_empty() {
        println!();
        println!("{}", style("Rejections:").bold());
        for rejection in &workflow.rejections {
            println!(
                "  step {} by {} on {}: {}",
                rejection.step,
                rejection.rejector,
                rejection.at.format("%Y-%m-%d"),
                rejection.reason
            );
        }
    }
}
