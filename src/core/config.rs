//! Configuration management with layered hierarchy

use miette::Diagnostic;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::entity::Severity;
use crate::core::rag::RagThresholds;
use crate::core::Project;

/// A configuration or roster file exists but cannot be used
#[derive(Debug, Error, Diagnostic)]
#[error("cannot load {}: {message}", .path.display())]
#[diagnostic(
    code(qct::config),
    help("fix or remove the file; only a missing file falls back to defaults")
)]
pub struct ConfigError {
    pub path: PathBuf,
    pub message: String,
}

/// Read a YAML file; `Ok(None)` when it does not exist
pub(crate) fn read_yaml<T: DeserializeOwned + 'static>(path: &Path) -> Result<Option<T>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ConfigError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };
    let invalid = |e: serde_yml::Error| ConfigError {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    // A file holding only comments parses as null and counts as absent
    let value: serde_yml::Value = serde_yml::from_str(&contents).map_err(invalid)?;
    if value.is_null() {
        return Ok(None);
    }
    serde_yml::from_value(value).map(Some).map_err(invalid)
}

/// QCT configuration with layered hierarchy
///
/// Sources, lowest priority first: built-in defaults, the global user
/// config, `.qct/config.yaml`, then `QCT_*` environment variables.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default actor name for new records
    pub author: Option<String>,

    /// Organisation code used in case reference numbers (e.g. MET)
    pub org_prefix: Option<String>,

    /// Zero-padded width of the reference sequence number
    pub reference_width: Option<usize>,

    /// Days before a due date at which items turn amber
    pub amber_window_days: Option<i64>,

    /// Refuse to close cases that have no approval workflow
    pub require_closure_approval: Option<bool>,

    /// Case due-date offsets by severity, overriding the defaults
    pub default_due_days: BTreeMap<Severity, i64>,

    /// Default output format
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration for a specific project (no discovery).
    /// A missing file is skipped; one that exists but does not parse is an error.
    pub fn load_for(project: &Project) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = read_yaml::<Config>(&global_path)? {
                config.merge(global);
            }
        }
        if let Some(project_config) = read_yaml::<Config>(&project.qct_dir().join("config.yaml"))? {
            config.merge(project_config);
        }
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(author) = std::env::var("QCT_AUTHOR") {
            self.author = Some(author);
        }
        if let Ok(org) = std::env::var("QCT_ORG") {
            self.org_prefix = Some(org);
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "qct")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.author.is_some() {
            self.author = other.author;
        }
        if other.org_prefix.is_some() {
            self.org_prefix = other.org_prefix;
        }
        if other.reference_width.is_some() {
            self.reference_width = other.reference_width;
        }
        if other.amber_window_days.is_some() {
            self.amber_window_days = other.amber_window_days;
        }
        if other.require_closure_approval.is_some() {
            self.require_closure_approval = other.require_closure_approval;
        }
        self.default_due_days.extend(other.default_due_days);
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
    }

    /// Get the author name, falling back to git config or username
    pub fn author(&self) -> String {
        if let Some(ref author) = self.author {
            return author.clone();
        }

        if let Ok(output) = std::process::Command::new("git")
            .args(["config", "user.name"])
            .output()
        {
            if output.status.success() {
                let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !name.is_empty() {
                    return name;
                }
            }
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// Resolve the engine settings this configuration describes
    pub fn settings(&self) -> Settings {
        let defaults = Settings::default();
        let mut due_days = defaults.due_days.clone();
        due_days.extend(self.default_due_days.iter().map(|(k, v)| (*k, *v)));

        Settings {
            org_prefix: self
                .org_prefix
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.org_prefix),
            reference_width: self.reference_width.unwrap_or(defaults.reference_width),
            thresholds: self
                .amber_window_days
                .map(RagThresholds::with_amber_window)
                .unwrap_or(defaults.thresholds),
            require_closure_approval: self
                .require_closure_approval
                .unwrap_or(defaults.require_closure_approval),
            due_days,
        }
    }
}

/// Fully-resolved knobs the lifecycle services read
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub org_prefix: String,
    pub reference_width: usize,
    pub thresholds: RagThresholds,
    pub require_closure_approval: bool,
    pub due_days: BTreeMap<Severity, i64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            org_prefix: "QMS".to_string(),
            reference_width: 3,
            thresholds: RagThresholds::default(),
            require_closure_approval: false,
            due_days: BTreeMap::from([
                (Severity::Critical, 5),
                (Severity::High, 10),
                (Severity::Medium, 15),
                (Severity::Low, 20),
            ]),
        }
    }
}

impl Settings {
    /// Days from raising to the default due date
    pub fn due_days_for(&self, severity: Severity) -> i64 {
        self.due_days.get(&severity).copied().unwrap_or(15)
    }
}
