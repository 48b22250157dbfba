//! Error taxonomy for lifecycle operations
//!
//! Every failing operation leaves the targeted record unchanged. Each variant
//! maps to a coarse [`ErrorKind`] so callers can branch without matching on
//! individual variants, and carries a message naming the unmet condition(s).

use miette::Diagnostic;
use thiserror::Error;

use crate::core::identity::IdParseError;

/// Machine-distinguishable error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input; fix the request and retry
    Validation,
    /// The requested change violates a lifecycle rule
    InvalidTransition,
    /// A domain completeness check failed (checklist, analysis)
    Incomplete,
    /// Optimistic-concurrency version mismatch; re-read and retry
    Conflict,
    /// The referenced record does not exist
    NotFound,
    /// The backing store failed
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::InvalidTransition => write!(f, "invalid_transition"),
            ErrorKind::Incomplete => write!(f, "incomplete"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Storage => write!(f, "storage"),
        }
    }
}

/// Errors returned by the lifecycle services
#[derive(Debug, Error, Diagnostic)]
pub enum CapaError {
    #[error("validation failed: {0}")]
    #[diagnostic(code(qct::validation))]
    Validation(String),

    #[error("invalid transition for {entity}: {from} → {to} ({reason})")]
    #[diagnostic(code(qct::invalid_transition))]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
        reason: String,
    },

    #[error("cannot close {case}: {} action(s) still open: {}", .open.len(), .open.join(", "))]
    #[diagnostic(
        code(qct::open_actions_remain),
        help("complete the listed actions, or mark them optional, before closing")
    )]
    OpenActionsRemain { case: String, open: Vec<String> },

    #[error("cannot close {owner}: approval incomplete ({})", .pending.join(", "))]
    #[diagnostic(
        code(qct::approval_incomplete),
        help("every approval step must be signed before closure")
    )]
    ApprovalIncomplete { owner: String, pending: Vec<String> },

    #[error("step {step} of {workflow} cannot be signed yet: earlier step(s) {} unsigned", join_indices(.unsigned))]
    #[diagnostic(
        code(qct::out_of_sequence),
        help("sequential workflows are signed in step order")
    )]
    OutOfSequence {
        workflow: String,
        step: usize,
        unsigned: Vec<usize>,
    },

    #[error("step {step} of {workflow} is already signed by {signer}")]
    #[diagnostic(code(qct::already_signed))]
    AlreadySigned {
        workflow: String,
        step: usize,
        signer: String,
    },

    #[error("{case} already has a root-cause analysis ({existing})")]
    #[diagnostic(
        code(qct::already_attached),
        help("use replace to supersede the current analysis; the old revision is kept")
    )]
    AlreadyAttached { case: String, existing: String },

    #[error("{action} cannot be marked done: {}", .missing.join("; "))]
    #[diagnostic(code(qct::incomplete_checklist))]
    IncompleteChecklist { action: String, missing: Vec<String> },

    #[error("root-cause analysis is incomplete: {}", .problems.join("; "))]
    #[diagnostic(code(qct::incomplete_analysis))]
    IncompleteAnalysis { problems: Vec<String> },

    #[error("{entity} was modified concurrently (expected version {expected}, found {actual}); re-read and retry")]
    #[diagnostic(code(qct::conflict))]
    Conflict {
        entity: String,
        expected: u64,
        actual: u64,
    },

    #[error("{kind} not found: {id}")]
    #[diagnostic(code(qct::not_found))]
    NotFound { kind: String, id: String },

    #[error("storage error: {0}")]
    #[diagnostic(code(qct::storage))]
    Storage(String),
}

impl CapaError {
    /// Coarse category for programmatic handling
    pub fn kind(&self) -> ErrorKind {
        match self {
            CapaError::Validation(_) | CapaError::AlreadyAttached { .. } => ErrorKind::Validation,
            CapaError::InvalidTransition { .. }
            | CapaError::OpenActionsRemain { .. }
            | CapaError::ApprovalIncomplete { .. }
            | CapaError::OutOfSequence { .. }
            | CapaError::AlreadySigned { .. } => ErrorKind::InvalidTransition,
            CapaError::IncompleteChecklist { .. } | CapaError::IncompleteAnalysis { .. } => {
                ErrorKind::Incomplete
            }
            CapaError::Conflict { .. } => ErrorKind::Conflict,
            CapaError::NotFound { .. } => ErrorKind::NotFound,
            CapaError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        CapaError::Validation(message.into())
    }

    pub(crate) fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        CapaError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<IdParseError> for CapaError {
    fn from(err: IdParseError) -> Self {
        CapaError::Validation(err.to_string())
    }
}

impl From<rusqlite::Error> for CapaError {
    fn from(err: rusqlite::Error) -> Self {
        CapaError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CapaError {
    fn from(err: serde_json::Error) -> Self {
        CapaError::Storage(format!("record encoding: {}", err))
    }
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result alias for lifecycle operations
pub type CapaResult<T> = Result<T, CapaError>;
