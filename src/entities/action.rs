//! Action entity - remedial work owned by a case

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::{Entity, Priority};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::rag::RagSubject;

/// Kind of remedial action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Containment,
    Correction,
    #[default]
    Corrective,
    Preventive,
    Improvement,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Containment => write!(f, "containment"),
            ActionType::Correction => write!(f, "correction"),
            ActionType::Corrective => write!(f, "corrective"),
            ActionType::Preventive => write!(f, "preventive"),
            ActionType::Improvement => write!(f, "improvement"),
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "containment" => Ok(ActionType::Containment),
            "correction" => Ok(ActionType::Correction),
            "corrective" => Ok(ActionType::Corrective),
            "preventive" => Ok(ActionType::Preventive),
            "improvement" => Ok(ActionType::Improvement),
            _ => Err(format!(
                "Invalid action type: {}. Use containment, correction, corrective, preventive, or improvement",
                s
            )),
        }
    }
}

/// Action status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    #[default]
    Open,
    InProgress,
    PendingApproval,
    Blocked,
    Done,
}

impl ActionStatus {
    /// Statuses reachable from `self` by an ordinary step. `Done` is also
    /// reachable from any non-terminal status once the completion check passes.
    pub fn allowed_transitions(&self) -> Vec<ActionStatus> {
        match self {
            ActionStatus::Open => vec![ActionStatus::InProgress, ActionStatus::Done],
            ActionStatus::InProgress => vec![
                ActionStatus::PendingApproval,
                ActionStatus::Blocked,
                ActionStatus::Done,
            ],
            ActionStatus::Blocked => vec![ActionStatus::InProgress, ActionStatus::Done],
            ActionStatus::PendingApproval => vec![ActionStatus::InProgress, ActionStatus::Done],
            ActionStatus::Done => vec![],
        }
    }

    pub fn can_transition_to(&self, to: ActionStatus) -> bool {
        matches!(
            (self, to),
            (ActionStatus::Open, ActionStatus::InProgress)
                | (ActionStatus::InProgress, ActionStatus::PendingApproval)
                | (ActionStatus::InProgress, ActionStatus::Blocked)
                | (ActionStatus::Blocked, ActionStatus::InProgress)
                // Rework after review
                | (ActionStatus::PendingApproval, ActionStatus::InProgress)
        ) || (*self != ActionStatus::Done && to == ActionStatus::Done)
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStatus::Open => write!(f, "open"),
            ActionStatus::InProgress => write!(f, "in_progress"),
            ActionStatus::PendingApproval => write!(f, "pending_approval"),
            ActionStatus::Blocked => write!(f, "blocked"),
            ActionStatus::Done => write!(f, "done"),
        }
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "open" => Ok(ActionStatus::Open),
            "in_progress" | "inprogress" => Ok(ActionStatus::InProgress),
            "pending_approval" | "pending" => Ok(ActionStatus::PendingApproval),
            "blocked" => Ok(ActionStatus::Blocked),
            "done" => Ok(ActionStatus::Done),
            _ => Err(format!(
                "Invalid action status: {}. Use open, in_progress, pending_approval, blocked, or done",
                s
            )),
        }
    }
}

/// One checklist line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub label: String,
    #[serde(default)]
    pub done: bool,
}

impl ChecklistItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            done: false,
        }
    }
}

/// Pointer to supporting evidence held elsewhere (document id, URL, path)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub reference: String,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}

fn default_mandatory() -> bool {
    true
}

/// A remedial action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier
    pub id: EntityId,

    /// Owning case
    pub case_id: EntityId,

    #[serde(rename = "type")]
    pub action_type: ActionType,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub owner: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub status: ActionStatus,

    /// Non-mandatory actions do not block case closure
    #[serde(default = "default_mandatory")]
    pub mandatory: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checklist: Vec<ChecklistItem>,

    /// Append-only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<EvidenceRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_on: Option<NaiveDate>,

    pub created: DateTime<Utc>,

    #[serde(default)]
    pub version: u64,
}

impl Action {
    pub fn is_done(&self) -> bool {
        self.status == ActionStatus::Done
    }

    /// Labels of checklist items not yet ticked
    pub fn unchecked_items(&self) -> Vec<&str> {
        self.checklist
            .iter()
            .filter(|i| !i.done)
            .map(|i| i.label.as_str())
            .collect()
    }

    /// Conditions preventing completion with the given date
    pub fn completion_gaps(&self, completed_on: Option<NaiveDate>) -> Vec<String> {
        let mut gaps: Vec<String> = self
            .unchecked_items()
            .into_iter()
            .map(|label| format!("checklist item '{}' not done", label))
            .collect();
        if completed_on.is_none() {
            gaps.push("completion date missing".to_string());
        }
        gaps
    }
}

impl RagSubject for Action {
    fn rag_due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    fn rag_is_complete(&self) -> bool {
        self.is_done()
    }
}

impl Entity for Action {
    const PREFIX: EntityPrefix = EntityPrefix::Act;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
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

    fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }
}
