//! `qct rca` command - Root-cause analysis

use clap::Subcommand;
use console::style;
use miette::{bail, IntoDiagnostic, Result};
use serde_json::Value;
use std::path::PathBuf;

use crate::cli::helpers::{open_workspace, print_structured, Workspace};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::{FiveWhys, RcaMethod, RootCauseAnalysis};

#[derive(Subcommand, Debug)]
pub enum RcaCommands {
    /// Attach the first root-cause analysis to a case
    Attach(AnalysisArgs),

    /// Supersede the current analysis with a new revision
    Replace(AnalysisArgs),

    /// Show the current analysis
    Show(CaseArg),

    /// List every revision
    History(CaseArg),
}

#[derive(clap::Args, Debug)]
pub struct AnalysisArgs {
    /// Case id or reference
    pub case: String,

    /// Method (five_whys, ishikawa, eight_d, other)
    #[arg(long, short = 'm', default_value = "five_whys")]
    pub method: RcaMethod,

    /// 5-Whys step, in order (repeatable, up to 6)
    #[arg(long = "why")]
    pub whys: Vec<String>,

    /// 5-Whys root cause
    #[arg(long)]
    pub root_cause: Option<String>,

    /// Method output as a JSON object
    #[arg(long, conflicts_with_all = ["whys", "root_cause", "file"])]
    pub json: Option<String>,

    /// Read the method output from a JSON file
    #[arg(long, conflicts_with_all = ["whys", "root_cause"])]
    pub file: Option<PathBuf>,

    /// Conclusion / summary
    #[arg(long, short = 'c', default_value = "")]
    pub conclusion: String,

    /// Analyst (default: configured author)
    #[arg(long)]
    pub by: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct CaseArg {
    /// Case id or reference
    pub case: String,
}

pub fn run(cmd: RcaCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        RcaCommands::Attach(args) => run_record(args, false, global),
        RcaCommands::Replace(args) => run_record(args, true, global),
        RcaCommands::Show(args) => run_show(args, global),
        RcaCommands::History(args) => run_history(args, global),
    }
}

/// Assemble the method output from whichever flags were given
fn method_output(args: &AnalysisArgs) -> Result<Value> {
    if let Some(json) = &args.json {
        return serde_json::from_str(json).into_diagnostic();
    }
    if let Some(path) = &args.file {
        let content = std::fs::read_to_string(path).into_diagnostic()?;
        return serde_json::from_str(&content).into_diagnostic();
    }
    if args.method != RcaMethod::FiveWhys {
        bail!(
            "{} output must be given with --json or --file",
            args.method
        );
    }
    Ok(FiveWhys {
        whys: args.whys.clone(),
        root_cause: args.root_cause.clone().unwrap_or_default(),
    }
    .to_output())
}

fn run_record(args: AnalysisArgs, replace: bool, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let analyst = ws.actor(args.by.as_deref());
    let case = ws.engine.cases().find(&args.case)?;
    let output = method_output(&args)?;

    let analyses = ws.engine.analyses();
    let analysis = if replace {
        analyses.replace(&case.id, args.method, output, &args.conclusion, &analyst)?
    } else {
        analyses.attach(&case.id, args.method, output, &args.conclusion, &analyst)?
    };

    match global.format {
        OutputFormat::Id => println!("{}", analysis.id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&analysis, global.format)?,
        _ => {
            println!(
                "{} {} analysis revision {} recorded on {}",
                style("✓").green(),
                analysis.method,
                analysis.revision,
                style(&case.reference).cyan()
            );
        }
    }
    Ok(())
}

fn current_for(ws: &Workspace, case: &str) -> Result<(String, Option<RootCauseAnalysis>)> {
    let case = ws.engine.cases().find(case)?;
    let current = ws.engine.analyses().current(&case.id)?;
    Ok((case.reference, current))
}

fn run_show(args: CaseArg, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let (reference, current) = current_for(&ws, &args.case)?;
    let Some(rca) = current else {
        bail!("{} has no root-cause analysis yet", reference);
    };

    match global.format {
        OutputFormat::Id => println!("{}", rca.id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&rca, global.format)?,
        _ => print_analysis(&reference, &rca),
    }
    Ok(())
}

fn print_analysis(reference: &str, rca: &RootCauseAnalysis) {
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("Case").bold(), style(reference).cyan());
    println!("{}: {}", style("Method").bold(), rca.method);
    println!("{}: {}", style("Revision").bold(), rca.revision);
    println!(
        "{}: {} on {}",
        style("Analyst").bold(),
        rca.analyst,
        rca.recorded_at.format("%Y-%m-%d")
    );
    println!("{}", style("─".repeat(60)).dim());

    match rca.five_whys() {
        Some(five_whys) => {
            for (i, why) in five_whys.whys.iter().enumerate() {
                println!("  {} {}", style(format!("Why {}:", i + 1)).bold(), why);
            }
            println!(
                "  {} {}",
                style("Root cause:").bold().yellow(),
                five_whys.root_cause
            );
        }
        None => {
            let pretty = serde_json::to_string_pretty(&rca.output).unwrap_or_default();
            println!("{}", pretty);
        }
    }

    if !rca.conclusion.is_empty() {
        println!();
        println!("{}", style("Conclusion:").bold());
        println!("{}", rca.conclusion);
    }
}

fn run_history(args: CaseArg, global: &GlobalOpts) -> Result<()> {
    let ws = open_workspace(global)?;
    let case = ws.engine.cases().find(&args.case)?;
    let history = ws.engine.analyses().history(&case.id)?;

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&history, global.format),
        OutputFormat::Id => {
            history.iter().for_each(|r| println!("{}", r.id));
            Ok(())
        }
        _ => {
            if history.is_empty() {
                println!("No root-cause analysis recorded for {}.", case.reference);
                return Ok(());
            }
            for rca in &history {
                let marker = if rca.is_current() {
                    style("current".to_string()).green()
                } else {
                    style(format!(
                        "superseded by {}",
                        rca.superseded_by
                            .as_ref()
                            .map(|id| id.to_string())
                            .unwrap_or_default()
                    ))
                    .dim()
                };
                println!(
                    "  rev {:<3} {:<10} {:<12} {}  {}",
                    rca.revision,
                    rca.method.to_string(),
                    rca.analyst,
                    rca.recorded_at.format("%Y-%m-%d"),
                    marker
                );
            }
            Ok(())
        }
    }
}
