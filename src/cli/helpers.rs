//! Shared helper functions for CLI commands

use std::sync::Arc;

use clap::ValueEnum;
use console::{style, StyledObject};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::notify::LogSink;
use crate::core::project::Project;
use crate::core::rag::Rag;
use crate::core::team::TeamRoster;
use crate::core::Config;
use crate::lifecycle::Lifecycle;

/// Everything a command needs: the project, its configuration and an
/// engine over the project's store
pub struct Workspace {
    pub project: Project,
    pub config: Config,
    pub engine: Lifecycle,
}

impl Workspace {
    /// Actor for a change: the explicit `--by`, else the configured author
    pub fn actor(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| self.config.author())
    }
}

/// Locate the project (honouring `--project`) and open its store
pub fn open_workspace(global: &GlobalOpts) -> Result<Workspace> {
    let project = discover_project(global)?;
    let config = Config::load_for(&project)?;
    let roster = TeamRoster::load(&project)?;
    let store = project.open_store()?;

    let engine = Lifecycle::new(Arc::new(store))
        .with_settings(config.settings())
        .with_roster(roster)
        .with_notifier(Arc::new(LogSink));

    Ok(Workspace {
        project,
        config,
        engine,
    })
}

pub fn discover_project(global: &GlobalOpts) -> Result<Project> {
    match &global.project {
        Some(path) => Project::discover_from(path),
        None => Project::discover(),
    }
    .map_err(|e| miette::miette!("{}", e))
}

/// Apply the configured `default_format` when `--format` was left at auto.
/// Load failures are left for the command itself to report.
pub fn apply_default_format(global: &mut GlobalOpts) {
    if global.format != OutputFormat::Auto {
        return;
    }
    let Ok(project) = discover_project(global) else {
        return;
    };
    let Ok(config) = Config::load_for(&project) else {
        return;
    };
    if let Some(name) = config.default_format {
        match <OutputFormat as ValueEnum>::from_str(&name, true) {
            Ok(format) => global.format = format,
            Err(_) => tracing::warn!(format = %name, "unknown default_format in config; using auto"),
        }
    }
}

/// Parse a record id of the given kind
pub fn parse_id(s: &str, prefix: EntityPrefix) -> Result<EntityId> {
    EntityId::parse_with_prefix(s.trim(), prefix).map_err(|e| miette::miette!("{}", e))
}

/// Print a record as YAML, or JSON when asked for
pub fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).into_diagnostic()?;
            println!("{}", json);
        }
        _ => {
            let yaml = serde_yml::to_string(value).into_diagnostic()?;
            print!("{}", yaml);
        }
    }
    Ok(())
}

/// Colour a health indicator for the terminal
pub fn style_rag(rag: Rag) -> StyledObject<String> {
    let label = rag.to_string().to_uppercase();
    match rag {
        Rag::Green => style(label).green(),
        Rag::Amber => style(label).yellow(),
        Rag::Red => style(label).red().bold(),
        Rag::Navy => style(label).blue().dim(),
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
