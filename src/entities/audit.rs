//! Audit event entity - append-only case history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    Created,
    StatusChange,
    RootCauseAttached,
    RootCauseReplaced,
    ActionCreated,
    ActionStatus,
    EvidenceAdded,
    ApprovalSigned,
    ApprovalRejected,
    Closed,
    Reopened,
    DueDateChanged,
    NoteAdded,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditEventType::Created => "CREATED",
            AuditEventType::StatusChange => "STATUS_CHANGE",
            AuditEventType::RootCauseAttached => "ROOT_CAUSE_ATTACHED",
            AuditEventType::RootCauseReplaced => "ROOT_CAUSE_REPLACED",
            AuditEventType::ActionCreated => "ACTION_CREATED",
            AuditEventType::ActionStatus => "ACTION_STATUS",
            AuditEventType::EvidenceAdded => "EVIDENCE_ADDED",
            AuditEventType::ApprovalSigned => "APPROVAL_SIGNED",
            AuditEventType::ApprovalRejected => "APPROVAL_REJECTED",
            AuditEventType::Closed => "CLOSED",
            AuditEventType::Reopened => "REOPENED",
            AuditEventType::DueDateChanged => "DUE_DATE_CHANGED",
            AuditEventType::NoteAdded => "NOTE_ADDED",
        };
        write!(f, "{}", s)
    }
}

/// One entry in a case's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: EntityId,
    pub case_id: EntityId,
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub description: String,
    pub actor: String,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl AuditEvent {
    pub fn new(
        case_id: &EntityId,
        event_type: AuditEventType,
        description: impl Into<String>,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Evt),
            case_id: case_id.clone(),
            event_type,
            description: description.into(),
            actor: actor.to_string(),
            at,
            version: 1,
        }
    }
}

impl Entity for AuditEvent {
    const PREFIX: EntityPrefix = EntityPrefix::Evt;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created(&self) -> DateTime<Utc> {
        self.at
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn case_id(&self) -> Option<&EntityId> {
        Some(&self.case_id)
    }
}
