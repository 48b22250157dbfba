//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    action::ActionCommands, approval::ApprovalCommands, case::CaseCommands,
    completions::CompletionsArgs, export::ExportArgs, init::InitArgs, rca::RcaCommands,
    report::ReportArgs, status::StatusArgs, team::TeamCommands,
};

#[derive(Parser)]
#[command(name = "qct")]
#[command(author, version, about = "Quality Case Toolkit")]
#[command(long_about = "Track non-conformance and CAPA cases through root-cause analysis, remedial actions and approval sign-off, with red/amber/green health.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .qct/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new QCT project
    Init(InitArgs),

    /// Case management (NC, CC, SNC, OFI)
    #[command(subcommand)]
    Case(CaseCommands),

    /// Remedial action management
    #[command(subcommand)]
    Action(ActionCommands),

    /// Root-cause analysis
    #[command(subcommand)]
    Rca(RcaCommands),

    /// Approval workflows and sign-off
    #[command(subcommand)]
    Approval(ApprovalCommands),

    /// Show the RAG health dashboard
    Status(StatusArgs),

    /// Generate a Markdown case register report
    Report(ReportArgs),

    /// Export cases or actions as CSV
    Export(ExportArgs),

    /// Team roster management
    #[command(subcommand)]
    Team(TeamCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}
