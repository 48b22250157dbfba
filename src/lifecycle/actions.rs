//! Action record store

use chrono::NaiveDate;
use tracing::{debug, info};

use super::Lifecycle;
use crate::core::entity::Priority;
use crate::core::error::{CapaError, CapaResult};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::store;
use crate::entities::{
    Action, ActionStatus, ActionType, AuditEventType, Case, ChecklistItem, EvidenceRef,
};

/// Input for [`Actions::create_action`]
#[derive(Debug, Clone)]
pub struct NewAction {
    pub case_id: EntityId,
    pub action_type: ActionType,
    pub title: String,
    pub owner: String,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub description: Option<String>,
    pub mandatory: bool,
    /// Checklist labels, all starting unticked
    pub checklist: Vec<String>,
}

impl NewAction {
    pub fn new(
        case_id: EntityId,
        action_type: ActionType,
        title: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            case_id,
            action_type,
            title: title.into(),
            owner: owner.into(),
            due_date: None,
            priority: Priority::default(),
            description: None,
            mandatory: true,
            checklist: Vec::new(),
        }
    }
}

fn checklist_from(labels: &[String]) -> CapaResult<Vec<ChecklistItem>> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let label = label.trim();
            if label.is_empty() {
                Err(CapaError::validation(format!(
                    "checklist item {} has an empty label",
                    i
                )))
            } else {
                Ok(ChecklistItem::new(label))
            }
        })
        .collect()
}

/// Action service
pub struct Actions<'a> {
    lc: &'a Lifecycle,
}

impl<'a> Actions<'a> {
    pub(crate) fn new(lc: &'a Lifecycle) -> Self {
        Self { lc }
    }

    pub fn create_action(&self, new: NewAction) -> CapaResult<Action> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(CapaError::validation("action title must not be empty"));
        }
        let owner = new.owner.trim().to_string();
        if owner.is_empty() {
            return Err(CapaError::validation("action owner must not be empty"));
        }
        let checklist = checklist_from(&new.checklist)?;

        let case: Case = store::load(self.lc.store(), &new.case_id)?.ok_or_else(|| {
            CapaError::validation(format!("case {} does not exist", new.case_id))
        })?;
        if case.is_closed() {
            return Err(CapaError::validation(format!(
                "case {} is closed; actions cannot be added",
                case.reference
            )));
        }

        let case_id = case.id.clone();
        self.lc.tracking_health(&case_id, || {
            let mut action = Action {
                id: EntityId::new(EntityPrefix::Act),
                case_id: case.id.clone(),
                action_type: new.action_type,
                title,
                description: new
                    .description
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty()),
                owner,
                due_date: new.due_date,
                priority: new.priority,
                status: ActionStatus::Open,
                mandatory: new.mandatory,
                checklist,
                evidence: Vec::new(),
                completed_on: None,
                created: self.lc.now(),
                version: 0,
            };
            // The owning case is rewritten at its read version, so a close
            // that checked the action list before this insert fails its save
            self.lc.store().commit(&[
                store::stage_update(&case)?,
                store::stage_insert(&mut action)?,
            ])?;

            self.lc.audit(
                &case.id,
                AuditEventType::ActionCreated,
                format!("{} action {} created: {}", action.action_type, action.id, action.title),
                &action.owner,
            );
            info!(action = %action.id, case = %case.id, "action created");
            Ok(action)
        })
    }

    pub fn get(&self, id: &EntityId) -> CapaResult<Action> {
        debug!(action = %id, "loading action");
        store::require(self.lc.store(), id)
    }

    /// Actions of a case: due date ascending (undated last), then HIGH
    /// priority first, then oldest first
    pub fn list_by_case(&self, case_id: &EntityId) -> CapaResult<Vec<Action>> {
        let mut actions: Vec<Action> = store::list(self.lc.store(), Some(case_id))?;
        actions.sort_by(|a, b| {
            let due = match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            };
            due.then(b.priority.cmp(&a.priority))
                .then(a.created.cmp(&b.created))
        });
        Ok(actions)
    }

    /// Move an action along its transition table. `Done` needs every
    /// checklist item ticked and a completion date.
    pub fn update_status(
        &self,
        id: &EntityId,
        new_status: ActionStatus,
        completed_on: Option<NaiveDate>,
        expected_version: Option<u64>,
    ) -> CapaResult<Action> {
        let (mut action, case) = self.editable(id)?;
        store::check_expected(&action, expected_version)?;
        let from = action.status;

        if !from.can_transition_to(new_status) {
            let reason = if from == ActionStatus::Done {
                "done is terminal"
            } else {
                "transition not permitted"
            };
            return Err(CapaError::InvalidTransition {
                entity: action.id.to_string(),
                from: from.to_string(),
                to: new_status.to_string(),
                reason: reason.to_string(),
            });
        }

        if new_status == ActionStatus::Done {
            let gaps = action.completion_gaps(completed_on);
            if !gaps.is_empty() {
                return Err(CapaError::IncompleteChecklist {
                    action: action.id.to_string(),
                    missing: gaps,
                });
            }
            action.completed_on = completed_on;
        }

        self.lc.tracking_health(&case.id, || {
            action.status = new_status;
            store::save(self.lc.store(), &mut action)?;
            self.lc.audit(
                &case.id,
                AuditEventType::ActionStatus,
                format!("{}: {} → {}", action.id, from, new_status),
                &action.owner,
            );
            info!(action = %action.id, %from, to = %new_status, "action status changed");
            Ok(action)
        })
    }

    /// Tick or untick one checklist item
    pub fn set_checklist_item(&self, id: &EntityId, index: usize, done: bool) -> CapaResult<Action> {
        let (mut action, _) = self.editable(id)?;
        self.ensure_not_done(&action, "change its checklist")?;

        let count = action.checklist.len();
        let item = action.checklist.get_mut(index).ok_or_else(|| {
            CapaError::validation(format!(
                "checklist index {} out of range ({} item(s))",
                index, count
            ))
        })?;
        item.done = done;

        store::save(self.lc.store(), &mut action)?;
        debug!(action = %action.id, index, done, "checklist item updated");
        Ok(action)
    }

    /// Replace the checklist; items whose label is kept keep their tick
    pub fn set_checklist(&self, id: &EntityId, labels: &[String]) -> CapaResult<Action> {
        let (mut action, _) = self.editable(id)?;
        self.ensure_not_done(&action, "change its checklist")?;

        let mut items = checklist_from(labels)?;
        for item in &mut items {
            item.done = action
                .checklist
                .iter()
                .any(|old| old.done && old.label == item.label);
        }
        action.checklist = items;

        store::save(self.lc.store(), &mut action)?;
        Ok(action)
    }

    /// Append an evidence reference
    pub fn attach_evidence(&self, id: &EntityId, reference: &str, actor: &str) -> CapaResult<Action> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(CapaError::validation("evidence reference must not be empty"));
        }
        let (mut action, case) = self.editable(id)?;

        action.evidence.push(EvidenceRef {
            reference: reference.to_string(),
            added_by: actor.to_string(),
            added_at: self.lc.now(),
        });
        store::save(self.lc.store(), &mut action)?;

        self.lc.audit(
            &case.id,
            AuditEventType::EvidenceAdded,
            format!("{}: evidence {}", action.id, reference),
            actor,
        );
        Ok(action)
    }

    /// Load an action whose case still accepts edits
    fn editable(&self, id: &EntityId) -> CapaResult<(Action, Case)> {
        let action = self.get(id)?;
        let case: Case = store::require(self.lc.store(), &action.case_id)?;
        if case.is_closed() {
            return Err(CapaError::InvalidTransition {
                entity: action.id.to_string(),
                from: action.status.to_string(),
                to: action.status.to_string(),
                reason: format!("case {} is closed", case.reference),
            });
        }
        Ok((action, case))
    }

    fn ensure_not_done(&self, action: &Action, what: &str) -> CapaResult<()> {
        if action.is_done() {
            return Err(CapaError::InvalidTransition {
                entity: action.id.to_string(),
                from: action.status.to_string(),
                to: action.status.to_string(),
                reason: format!("cannot {} once done", what),
            });
        }
        Ok(())
    }
}
