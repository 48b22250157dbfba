//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::store::SqliteStore;
use crate::core::CapaResult;

/// Name of the per-project state directory
pub const QCT_DIR: &str = ".qct";

/// Database file inside the state directory
const DB_FILE: &str = "qct.db";

/// Represents a QCT project
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of .qct/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current =
            std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(QCT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let qct_dir = root.join(QCT_DIR);
        if qct_dir.exists() {
            return Err(ProjectError::AlreadyExists(root));
        }
        Self::write_layout(root)
    }

    /// Re-initialize, rewriting config.yaml even if .qct/ exists.
    /// Existing records are kept.
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::write_layout(root)
    }

    fn write_layout(root: PathBuf) -> Result<Self, ProjectError> {
        let qct_dir = root.join(QCT_DIR);
        std::fs::create_dir_all(&qct_dir).map_err(|e| ProjectError::IoError(e.to_string()))?;

        std::fs::write(qct_dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        // The database is local state, never committed
        std::fs::write(qct_dir.join(".gitignore"), "qct.db*\n")
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# QCT Project Configuration

# Default actor name for new records (falls back to git user.name, then $USER)
# author: ""

# Organisation code used in case references, e.g. MET-NC-2025-001
# org_prefix: QMS

# Zero-padded width of the reference sequence
# reference_width: 3

# Items due within this many days are amber
# amber_window_days: 7

# Refuse to close cases without a fully signed approval workflow
# require_closure_approval: false

# Default case due date, in days after raising, by severity
# default_due_days:
#   CRITICAL: 5
#   HIGH: 10
#   MEDIUM: 15
#   LOW: 20

# Default output format (auto, yaml, tsv, json, csv, md, id)
# default_format: auto
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .qct state directory
    pub fn qct_dir(&self) -> PathBuf {
        self.root.join(QCT_DIR)
    }

    /// Path of the project database
    pub fn db_path(&self) -> PathBuf {
        self.qct_dir().join(DB_FILE)
    }

    /// Open the project's record store
    pub fn open_store(&self) -> CapaResult<SqliteStore> {
        SqliteStore::open(&self.db_path())
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a QCT project (searched from {searched_from:?}). Run 'qct init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("QCT project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}
