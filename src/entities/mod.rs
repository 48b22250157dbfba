//! Record type definitions
//!
//! - [`Case`] - non-conformance, complaint, supplier issue or improvement
//! - [`Action`] - remedial work item owned by a case
//! - [`RootCauseAnalysis`] - revisioned root-cause analysis of a case
//! - [`ApprovalWorkflow`] - sign-off chain on a case or action
//! - [`AuditEvent`] - append-only case history

pub mod action;
pub mod analysis;
pub mod approval;
pub mod audit;
pub mod case;

pub use action::{Action, ActionStatus, ActionType, ChecklistItem, EvidenceRef};
pub use analysis::{FiveWhys, RcaMethod, RootCauseAnalysis};
pub use approval::{
    ApprovalMode, ApprovalStep, ApprovalWorkflow, OwnerKind, RejectionRecord, RequiredSigner,
};
pub use audit::{AuditEvent, AuditEventType};
pub use case::{
    Case, CaseDetails, CaseStatus, CaseType, ClosureRecord, CustomerDetails, ImprovementDetails,
    Note, ReopenRecord, SupplierDetails,
};
