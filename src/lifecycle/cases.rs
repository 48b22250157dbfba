//! Case lifecycle manager
//!
//! Transition table:
//!
//! | from | to | precondition |
//! |---|---|---|
//! | OPEN | UNDER_INVESTIGATION | none |
//! | OPEN, UNDER_INVESTIGATION, REOPENED | CORRECTIVE_ACTIONS_IN_PROGRESS | at least one action |
//! | REOPENED | UNDER_INVESTIGATION | none |
//! | any but CLOSED | CLOSED | mandatory actions done, approval complete |
//! | CLOSED | REOPENED | non-empty reason |

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use super::Lifecycle;
use crate::core::entity::{Priority, Severity};
use crate::core::error::{CapaError, CapaResult};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::rag::{self, Rag};
use crate::core::store::{self, encode};
use crate::entities::{
    Action, ActionStatus, ActionType, AuditEventType, Case, CaseDetails, CaseStatus, CaseType,
    ClosureRecord, Note, ReopenRecord,
};

/// Title of the automatically created containment action
pub const CONTAINMENT_TITLE: &str = "Implement immediate containment measures";

/// Input for [`Cases::open_case`]
#[derive(Debug, Clone, Default)]
pub struct NewCase {
    pub case_type: CaseType,
    pub title: String,
    pub problem_statement: String,
    pub severity: Severity,
    pub category: Option<String>,
    pub area: Option<String>,
    pub department: Option<String>,
    pub raised_by: String,
    /// Defaults to today
    pub raised_on: Option<NaiveDate>,
    /// Defaults to the raiser
    pub owner: Option<String>,
    /// Defaults to raised_on plus the severity offset
    pub due_date: Option<NaiveDate>,
    /// NC only: create a containment action straight away
    pub containment_needed: bool,
    pub details: Option<CaseDetails>,
}

/// Input for [`Cases::close`]
#[derive(Debug, Clone)]
pub struct Closure {
    pub closed_by: String,
    pub comments: Option<String>,
}

/// Filter for [`Cases::list`]; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub case_type: Option<CaseType>,
    pub status: Option<CaseStatus>,
    pub severity: Option<Severity>,
    pub owner: Option<String>,
    /// Case-insensitive match on reference, title or problem statement
    pub search: Option<String>,
    /// Past due and not closed
    pub overdue: bool,
}

/// Approval position of a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "pending", rename_all = "snake_case")]
pub enum ApprovalState {
    /// No workflow attached and none required
    NotRequired,
    /// Configuration requires a workflow but none is attached
    Missing,
    /// Steps still unsigned
    Pending(Vec<String>),
    Complete,
}

/// What stands between a case and closure
#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub case_id: EntityId,
    pub reference: String,
    pub status: CaseStatus,
    pub health: Rag,
    pub total_actions: usize,
    pub done_actions: usize,
    pub unmet_actions: Vec<Action>,
    pub approval: ApprovalState,
}

impl Readiness {
    pub fn can_close(&self) -> bool {
        self.status != CaseStatus::Closed
            && self.unmet_actions.is_empty()
            && matches!(
                self.approval,
                ApprovalState::NotRequired | ApprovalState::Complete
            )
    }
}

/// Case service
pub struct Cases<'a> {
    lc: &'a Lifecycle,
}

fn describe_unmet(actions: &[Action]) -> Vec<String> {
    actions
        .iter()
        .map(|a| format!("{} '{}' ({})", a.id, a.title, a.status))
        .collect()
}

fn non_empty(value: &str, field: &str) -> CapaResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CapaError::validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// `date` moved by `days`, refusing offsets past the calendar's range
fn offset(date: NaiveDate, days: i64, what: &str) -> CapaResult<NaiveDate> {
    Duration::try_days(days)
        .and_then(|d| date.checked_add_signed(d))
        .ok_or_else(|| {
            CapaError::validation(format!("{} is out of range ({} + {} days)", what, date, days))
        })
}

fn tidy(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl<'a> Cases<'a> {
    pub(crate) fn new(lc: &'a Lifecycle) -> Self {
        Self { lc }
    }

    /// Open a new case: assigns the reference number, fills the default due
    /// date and, for NC cases needing containment, creates the containment
    /// action. All records are written atomically.
    pub fn open_case(&self, new: NewCase) -> CapaResult<Case> {
        let title = non_empty(&new.title, "title")?;
        let problem_statement = non_empty(&new.problem_statement, "problem statement")?;
        let raised_by = non_empty(&new.raised_by, "raised by")?;
        let owner = match new.owner {
            Some(owner) => non_empty(&owner, "owner")?,
            None => raised_by.clone(),
        };

        if let Some(details) = &new.details {
            if details.case_type() != new.case_type {
                return Err(CapaError::validation(format!(
                    "{} details cannot be attached to a {} case",
                    details.case_type(),
                    new.case_type
                )));
            }
        }
        if new.containment_needed && new.case_type != CaseType::Nc {
            return Err(CapaError::validation(
                "containment can only be requested for NC cases",
            ));
        }

        let now = self.lc.now();
        let raised_on = new.raised_on.unwrap_or_else(|| self.lc.today());
        let due_date = match new.due_date {
            Some(due) if due < raised_on => {
                return Err(CapaError::validation(format!(
                    "due date {} is before the date raised {}",
                    due, raised_on
                )))
            }
            Some(due) => due,
            None => {
                let days = self.lc.settings().due_days_for(new.severity);
                offset(raised_on, days, "default due date")?
            }
        };

        let reference = self.next_reference(new.case_type, raised_on)?;

        let case = Case {
            id: EntityId::new(EntityPrefix::Case),
            reference,
            case_type: new.case_type,
            title,
            problem_statement,
            severity: new.severity,
            category: tidy(new.category),
            area: tidy(new.area),
            department: tidy(new.department),
            raised_by: raised_by.clone(),
            raised_on,
            owner,
            due_date: Some(due_date),
            containment_needed: new.containment_needed,
            details: new.details,
            status: CaseStatus::Open,
            notes: Vec::new(),
            closure: None,
            reopen_history: Vec::new(),
            created: now,
            version: 1,
        };

        let mut records = vec![encode(&case)?];
        let created = self.lc.event(
            &case.id,
            AuditEventType::Created,
            format!("{} opened: {}", case.reference, case.title),
            &raised_by,
        );
        records.push(encode(&created)?);

        if case.containment_needed {
            let containment = Action {
                id: EntityId::new(EntityPrefix::Act),
                case_id: case.id.clone(),
                action_type: ActionType::Containment,
                title: CONTAINMENT_TITLE.to_string(),
                description: None,
                owner: case.owner.clone(),
                due_date: Some(offset(raised_on, 1, "containment due date")?),
                priority: Priority::High,
                status: ActionStatus::Open,
                mandatory: true,
                checklist: Vec::new(),
                evidence: Vec::new(),
                completed_on: None,
                created: now,
                version: 1,
            };
            let event = self.lc.event(
                &case.id,
                AuditEventType::ActionCreated,
                format!("containment action {} created", containment.id),
                &raised_by,
            );
            records.push(encode(&containment)?);
            records.push(encode(&event)?);
        }

        self.lc.store().insert_batch(&records)?;

        info!(case = %case.id, reference = %case.reference, "case opened");
        Ok(case)
    }

    /// `{org}-{type}-{year}-{seq}`, seq one past the highest in use
    fn next_reference(&self, case_type: CaseType, raised_on: NaiveDate) -> CapaResult<String> {
        use chrono::Datelike;

        let settings = self.lc.settings();
        let prefix = format!(
            "{}-{}-{}-",
            settings.org_prefix,
            case_type.code(),
            raised_on.year()
        );
        let highest = store::list::<Case>(self.lc.store(), None)?
            .iter()
            .filter_map(|c| c.reference.strip_prefix(&prefix))
            .filter_map(|seq| seq.parse::<u32>().ok())
            .max()
            .unwrap_or(0);

        Ok(format!(
            "{}{:0width$}",
            prefix,
            highest + 1,
            width = settings.reference_width
        ))
    }

    pub fn get(&self, id: &EntityId) -> CapaResult<Case> {
        debug!(case = %id, "loading case");
        store::require(self.lc.store(), id)
    }

    /// Look a case up by id or by reference number
    pub fn find(&self, id_or_reference: &str) -> CapaResult<Case> {
        let key = id_or_reference.trim();
        if let Ok(id) = EntityId::parse_with_prefix(key, EntityPrefix::Case) {
            return self.get(&id);
        }
        store::list::<Case>(self.lc.store(), None)?
            .into_iter()
            .find(|c| c.reference.eq_ignore_ascii_case(key))
            .ok_or_else(|| CapaError::not_found("case", key))
    }

    /// Cases matching the filter, ordered by due date
    pub fn list(&self, filter: &CaseFilter) -> CapaResult<Vec<Case>> {
        let today = self.lc.today();
        let search = filter.search.as_ref().map(|s| s.to_lowercase());

        let cases = store::list::<Case>(self.lc.store(), None)?
            .into_iter()
            .filter(|c| filter.case_type.is_none_or_eq(c.case_type))
            .filter(|c| filter.status.is_none_or_eq(c.status))
            .filter(|c| filter.severity.is_none_or_eq(c.severity))
            .filter(|c| {
                filter
                    .owner
                    .as_ref()
                    .map_or(true, |o| c.owner.eq_ignore_ascii_case(o))
            })
            .filter(|c| {
                search.as_ref().map_or(true, |s| {
                    c.reference.to_lowercase().contains(s)
                        || c.title.to_lowercase().contains(s)
                        || c.problem_statement.to_lowercase().contains(s)
                })
            })
            .filter(|c| !filter.overdue || (!c.is_closed() && c.due_date.is_some_and(|d| d < today)))
            .collect();
        Ok(cases)
    }

    /// Move a case along the transition table
    pub fn transition(
        &self,
        id: &EntityId,
        target: CaseStatus,
        actor: &str,
        expected_version: Option<u64>,
    ) -> CapaResult<Case> {
        let actor = non_empty(actor, "actor")?;
        let mut case = self.get(id)?;
        store::check_expected(&case, expected_version)?;
        let from = case.status;

        let refuse = |reason: &str| CapaError::InvalidTransition {
            entity: case.reference.clone(),
            from: from.to_string(),
            to: target.to_string(),
            reason: reason.to_string(),
        };

        match (from, target) {
            (f, t) if f == t => return Err(refuse("already in that status")),
            (CaseStatus::Open, CaseStatus::UnderInvestigation)
            | (CaseStatus::Reopened, CaseStatus::UnderInvestigation) => {}
            (
                CaseStatus::Open | CaseStatus::UnderInvestigation | CaseStatus::Reopened,
                CaseStatus::CorrectiveActionsInProgress,
            ) => {
                let actions: Vec<Action> = store::list(self.lc.store(), Some(&case.id))?;
                if actions.is_empty() {
                    return Err(refuse("no actions have been created"));
                }
            }
            (_, CaseStatus::Closed) => {
                return self.close(
                    id,
                    Closure {
                        closed_by: actor,
                        comments: None,
                    },
                    expected_version,
                );
            }
            (CaseStatus::Closed, CaseStatus::Reopened) => {
                return Err(CapaError::validation(
                    "a reason is required to reopen a case",
                ));
            }
            _ => return Err(refuse("transition not permitted")),
        }

        case.status = target;
        store::save(self.lc.store(), &mut case)?;
        self.lc.audit(
            &case.id,
            AuditEventType::StatusChange,
            format!("{} → {}", from, target),
            &actor,
        );
        info!(case = %case.id, %from, to = %target, "case transitioned");
        Ok(case)
    }

    /// Close a case once every mandatory action is done and any approval
    /// workflow is fully signed
    pub fn close(
        &self,
        id: &EntityId,
        closure: Closure,
        expected_version: Option<u64>,
    ) -> CapaResult<Case> {
        let closed_by = non_empty(&closure.closed_by, "closed by")?;
        let mut case = self.get(id)?;
        store::check_expected(&case, expected_version)?;

        if case.is_closed() {
            return Err(CapaError::InvalidTransition {
                entity: case.reference.clone(),
                from: case.status.to_string(),
                to: CaseStatus::Closed.to_string(),
                reason: "case is already closed".to_string(),
            });
        }

        let unmet = self.unmet_actions(&case.id)?;
        if !unmet.is_empty() {
            return Err(CapaError::OpenActionsRemain {
                case: case.reference.clone(),
                open: describe_unmet(&unmet),
            });
        }

        match self.approval_state(&case)? {
            ApprovalState::Pending(pending) => {
                return Err(CapaError::ApprovalIncomplete {
                    owner: case.reference.clone(),
                    pending,
                })
            }
            ApprovalState::Missing => {
                return Err(CapaError::ApprovalIncomplete {
                    owner: case.reference.clone(),
                    pending: vec!["no approval workflow attached".to_string()],
                })
            }
            ApprovalState::NotRequired | ApprovalState::Complete => {}
        }

        let from = case.status;
        case.status = CaseStatus::Closed;
        case.closure = Some(ClosureRecord {
            closed_by: closed_by.clone(),
            closed_at: self.lc.now(),
            comments: tidy(closure.comments),
        });
        store::save(self.lc.store(), &mut case)?;

        self.lc.audit(
            &case.id,
            AuditEventType::Closed,
            format!("{} closed (was {})", case.reference, from),
            &closed_by,
        );
        info!(case = %case.id, reference = %case.reference, "case closed");
        Ok(case)
    }

    /// Reopen a closed case; the reason is kept in the reopen history
    pub fn reopen(
        &self,
        id: &EntityId,
        reason: &str,
        actor: &str,
        expected_version: Option<u64>,
    ) -> CapaResult<Case> {
        let actor = non_empty(actor, "actor")?;
        let mut case = self.get(id)?;
        store::check_expected(&case, expected_version)?;

        if !case.is_closed() {
            return Err(CapaError::InvalidTransition {
                entity: case.reference.clone(),
                from: case.status.to_string(),
                to: CaseStatus::Reopened.to_string(),
                reason: "only closed cases can be reopened".to_string(),
            });
        }
        let reason = non_empty(reason, "reopen reason")?;

        case.status = CaseStatus::Reopened;
        case.closure = None;
        case.reopen_history.push(ReopenRecord {
            reason: reason.clone(),
            actor: actor.clone(),
            at: self.lc.now(),
        });
        store::save(self.lc.store(), &mut case)?;

        self.lc.audit(
            &case.id,
            AuditEventType::Reopened,
            format!("reopened: {}", reason),
            &actor,
        );
        info!(case = %case.id, "case reopened");
        Ok(case)
    }

    /// Append an investigation note
    pub fn add_note(&self, id: &EntityId, text: &str, actor: &str) -> CapaResult<Case> {
        let text = non_empty(text, "note")?;
        let actor = non_empty(actor, "actor")?;
        let mut case = self.get(id)?;
        self.ensure_open(&case, "add a note")?;

        case.notes.push(Note {
            author: actor.clone(),
            at: self.lc.now(),
            text,
        });
        store::save(self.lc.store(), &mut case)?;
        self.lc
            .audit(&case.id, AuditEventType::NoteAdded, "investigation note added", &actor);
        Ok(case)
    }

    /// Change the case due date
    pub fn set_due_date(&self, id: &EntityId, due: NaiveDate, actor: &str) -> CapaResult<Case> {
        let actor = non_empty(actor, "actor")?;
        self.lc.tracking_health(id, || {
            let mut case = self.get(id)?;
            self.ensure_open(&case, "change the due date")?;

            let previous = case.due_date;
            case.due_date = Some(due);
            store::save(self.lc.store(), &mut case)?;

            let was = previous
                .map(|d| d.to_string())
                .unwrap_or_else(|| "none".to_string());
            self.lc.audit(
                &case.id,
                AuditEventType::DueDateChanged,
                format!("due date {} → {}", was, due),
                &actor,
            );
            info!(case = %case.id, %due, "case due date changed");
            Ok(case)
        })
    }

    /// Mandatory actions not yet done
    pub fn unmet_actions(&self, id: &EntityId) -> CapaResult<Vec<Action>> {
        let actions: Vec<Action> = store::list(self.lc.store(), Some(id))?;
        Ok(actions
            .into_iter()
            .filter(|a| a.mandatory && !a.is_done())
            .collect())
    }

    /// Everything standing between the case and closure
    pub fn readiness(&self, id: &EntityId) -> CapaResult<Readiness> {
        let case = self.get(id)?;
        let actions: Vec<Action> = store::list(self.lc.store(), Some(&case.id))?;
        let health = self.health_with(&case, &actions);
        let done_actions = actions.iter().filter(|a| a.is_done()).count();
        let total_actions = actions.len();
        let unmet_actions = actions
            .into_iter()
            .filter(|a| a.mandatory && !a.is_done())
            .collect();

        Ok(Readiness {
            approval: self.approval_state(&case)?,
            case_id: case.id,
            reference: case.reference,
            status: case.status,
            health,
            total_actions,
            done_actions,
            unmet_actions,
        })
    }

    /// Derived health, recomputed on every call
    pub fn health(&self, case: &Case) -> CapaResult<Rag> {
        let actions: Vec<Action> = store::list(self.lc.store(), Some(&case.id))?;
        Ok(self.health_with(case, &actions))
    }

    /// Health given the case's actions. Work is complete when every
    /// mandatory action is done, which holds vacuously for a case with none.
    pub fn health_with(&self, case: &Case, actions: &[Action]) -> Rag {
        self.health_on(case, actions, self.lc.today())
    }

    pub(crate) fn health_on(&self, case: &Case, actions: &[Action], today: NaiveDate) -> Rag {
        let complete = actions.iter().all(|a| !a.mandatory || a.is_done());
        rag::evaluate(
            case.due_date,
            complete,
            case.is_closed(),
            today,
            &self.lc.settings().thresholds,
        )
    }

    fn approval_state(&self, case: &Case) -> CapaResult<ApprovalState> {
        match self.lc.approvals().for_owner(&case.id)? {
            Some(workflow) if workflow.is_complete() => Ok(ApprovalState::Complete),
            Some(workflow) => Ok(ApprovalState::Pending(workflow.pending_descriptions())),
            None if self.lc.settings().require_closure_approval => Ok(ApprovalState::Missing),
            None => Ok(ApprovalState::NotRequired),
        }
    }

    fn ensure_open(&self, case: &Case, what: &str) -> CapaResult<()> {
        if case.is_closed() {
            return Err(CapaError::InvalidTransition {
                entity: case.reference.clone(),
                from: case.status.to_string(),
                to: case.status.to_string(),
                reason: format!("cannot {} on a closed case", what),
            });
        }
        Ok(())
    }
}

/// `Option` equality where `None` matches anything
trait MatchesFilter<T> {
    fn is_none_or_eq(&self, value: T) -> bool;
}

impl<T: PartialEq + Copy> MatchesFilter<T> for Option<T> {
    fn is_none_or_eq(&self, value: T) -> bool {
        self.map_or(true, |v| v == value)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::lifecycle::NewAction;
    use crate::core::notify::testing::RecordingSink;
    use crate::core::notify::Notification;
    use crate::core::team::Role;
    use crate::entities::{ApprovalMode, RequiredSigner};
    use std::sync::Arc;

    #[test]
    fn test_reference_numbers_increment_per_type_and_year() {
        let engine = engine();
        let first = open(&engine, "Porosity in casting");
        let second = open(&engine, "Burr on edge");
        assert_eq!(first.reference, "MET-NC-2025-001");
        assert_eq!(second.reference, "MET-NC-2025-002");

        let mut cc = new_case("Late delivery complaint");
        cc.case_type = CaseType::Cc;
        let cc = engine.cases().open_case(cc).unwrap();
        assert_eq!(cc.reference, "MET-CC-2025-001");

        let mut older = new_case("Last year's issue");
        older.raised_on = NaiveDate::from_ymd_opt(2024, 12, 30);
        let older = engine.cases().open_case(older).unwrap();
        assert_eq!(older.reference, "MET-NC-2024-001");
    }

    #[test]
    fn test_default_due_date_follows_severity() {
        let engine = engine();
        let mut critical = new_case("Critical");
        critical.severity = Severity::Critical;
        let case = engine.cases().open_case(critical).unwrap();
        assert_eq!(case.due_date, Some(today() + Duration::days(5)));

        let mut low = new_case("Low");
        low.severity = Severity::Low;
        let case = engine.cases().open_case(low).unwrap();
        assert_eq!(case.due_date, Some(today() + Duration::days(20)));
        assert_eq!(case.owner, "sam");
    }

    #[test]
    fn test_oversized_due_offset_is_rejected() {
        let mut settings = engine().settings().clone();
        settings.due_days.insert(Severity::High, i64::MAX / 2);
        let engine = engine().with_settings(settings);

        let err = engine.cases().open_case(new_case("Far future")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(engine.cases().list(&CaseFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_open_case_validation() {
        let engine = engine();
        let mut blank = new_case("  ");
        blank.title = "  ".into();
        assert_eq!(
            engine.cases().open_case(blank).unwrap_err().kind(),
            ErrorKind::Validation
        );

        let mut mismatch = new_case("Wrong details");
        mismatch.details = Some(CaseDetails::Improvement(Default::default()));
        assert_eq!(
            engine.cases().open_case(mismatch).unwrap_err().kind(),
            ErrorKind::Validation
        );

        let mut early = new_case("Due before raised");
        early.due_date = Some(today() - Duration::days(1));
        assert!(engine.cases().open_case(early).is_err());
    }

    #[test]
    fn test_containment_action_created_automatically() {
        let engine = engine();
        let mut new = new_case("Leaking seal");
        new.containment_needed = true;
        new.owner = Some("jo".into());
        let case = engine.cases().open_case(new).unwrap();

        let actions = engine.actions().list_by_case(&case.id).unwrap();
        assert_eq!(actions.len(), 1);
        let containment = &actions[0];
        assert_eq!(containment.action_type, ActionType::Containment);
        assert_eq!(containment.title, CONTAINMENT_TITLE);
        assert_eq!(containment.priority, Priority::High);
        assert_eq!(containment.owner, "jo");
        assert_eq!(containment.due_date, Some(today() + Duration::days(1)));

        let trail = engine.audit_trail(&case.id).unwrap();
        assert!(trail.iter().any(|e| e.event_type == AuditEventType::Created));
        assert!(trail
            .iter()
            .any(|e| e.event_type == AuditEventType::ActionCreated));
    }

    #[test]
    fn test_close_fails_with_open_actions() {
        let engine = engine();
        let case = open(&engine, "Scratched housings");
        let a1 = add_action(&engine, &case, "Sort stock");
        let a2 = add_action(&engine, &case, "Retrain operators");
        let a3 = add_action(&engine, &case, "Update work instruction");
        finish(&engine, &a1);
        finish(&engine, &a2);

        let err = engine
            .cases()
            .close(
                &case.id,
                Closure {
                    closed_by: "sam".into(),
                    comments: None,
                },
                None,
            )
            .unwrap_err();
        match &err {
            CapaError::OpenActionsRemain { open, .. } => {
                assert_eq!(open.len(), 1);
                assert!(open[0].contains(&a3.id.to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }

        let unmet = engine.cases().unmet_actions(&case.id).unwrap();
        assert_eq!(unmet.len(), 1);
        assert_eq!(unmet[0].id, a3.id);
        assert_eq!(engine.cases().get(&case.id).unwrap().status, CaseStatus::Open);
    }

    #[test]
    fn test_optional_actions_do_not_block_closure() {
        let engine = engine();
        let case = open(&engine, "Label misprint");
        let done = add_action(&engine, &case, "Reprint labels");
        finish(&engine, &done);

        let mut optional = NewAction::new(case.id.clone(), ActionType::Improvement, "Nice to have", "alex");
        optional.mandatory = false;
        engine.actions().create_action(optional).unwrap();

        let closed = engine
            .cases()
            .close(
                &case.id,
                Closure {
                    closed_by: "sam".into(),
                    comments: Some("Verified on line 3".into()),
                },
                None,
            )
            .unwrap();
        assert_eq!(closed.status, CaseStatus::Closed);
        let record = closed.closure.unwrap();
        assert_eq!(record.closed_by, "sam");
        assert_eq!(record.comments.as_deref(), Some("Verified on line 3"));
    }

    #[test]
    fn test_close_requires_complete_approval() {
        let engine = engine();
        let case = open(&engine, "Supplier mix-up");
        let action = add_action(&engine, &case, "Quarantine lot");
        finish(&engine, &action);

        let workflow = engine
            .approvals()
            .create_workflow(
                &case.id,
                ApprovalMode::Sequential,
                vec![RequiredSigner::Role(Role::Quality), RequiredSigner::Role(Role::Manager)],
                "sam",
            )
            .unwrap();
        engine
            .approvals()
            .sign(&workflow.id, 0, "quinn", None, None)
            .unwrap();

        let closure = Closure {
            closed_by: "sam".into(),
            comments: None,
        };
        let err = engine.cases().close(&case.id, closure.clone(), None).unwrap_err();
        match err {
            CapaError::ApprovalIncomplete { pending, .. } => {
                assert_eq!(pending, vec!["step 1 (role:manager)".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }

        engine
            .approvals()
            .sign(&workflow.id, 1, "morgan", None, None)
            .unwrap();
        assert!(engine.cases().close(&case.id, closure, None).is_ok());
    }

    #[test]
    fn test_configured_approval_requirement() {
        let settings = crate::core::config::Settings {
            require_closure_approval: true,
            ..engine().settings().clone()
        };
        let engine = engine().with_settings(settings);
        let case = open(&engine, "Needs sign-off");
        let action = add_action(&engine, &case, "Fix");
        finish(&engine, &action);

        let readiness = engine.cases().readiness(&case.id).unwrap();
        assert_eq!(readiness.approval, ApprovalState::Missing);
        assert!(!readiness.can_close());

        let err = engine
            .cases()
            .transition(&case.id, CaseStatus::Closed, "sam", None)
            .unwrap_err();
        assert!(matches!(err, CapaError::ApprovalIncomplete { .. }));
    }

    #[test]
    fn test_reopen_requires_reason_and_reapplies_invariants() {
        let engine = engine();
        let case = open(&engine, "Wrong torque");
        let action = add_action(&engine, &case, "Re-torque batch");
        finish(&engine, &action);
        let closure = Closure {
            closed_by: "sam".into(),
            comments: None,
        };
        engine.cases().close(&case.id, closure.clone(), None).unwrap();

        let err = engine.cases().reopen(&case.id, "   ", "sam", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(engine.cases().get(&case.id).unwrap().status, CaseStatus::Closed);

        let reopened = engine
            .cases()
            .reopen(&case.id, "Customer reported recurrence", "sam", None)
            .unwrap();
        assert_eq!(reopened.status, CaseStatus::Reopened);
        assert_eq!(reopened.reopen_history.len(), 1);
        assert!(reopened.closure.is_none());

        add_action(&engine, &case, "Add poka-yoke fixture");
        let err = engine.cases().close(&case.id, closure, None).unwrap_err();
        assert!(matches!(err, CapaError::OpenActionsRemain { .. }));
    }

    #[test]
    fn test_transition_table() {
        let engine = engine();
        let case = open(&engine, "Transitions");

        let err = engine
            .cases()
            .transition(&case.id, CaseStatus::CorrectiveActionsInProgress, "sam", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let err = engine
            .cases()
            .transition(&case.id, CaseStatus::Reopened, "sam", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let case = engine
            .cases()
            .transition(&case.id, CaseStatus::UnderInvestigation, "sam", None)
            .unwrap();
        assert_eq!(case.status, CaseStatus::UnderInvestigation);

        let err = engine
            .cases()
            .transition(&case.id, CaseStatus::Open, "sam", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        add_action(&engine, &case, "Containment");
        let case = engine
            .cases()
            .transition(&case.id, CaseStatus::CorrectiveActionsInProgress, "sam", None)
            .unwrap();
        assert_eq!(case.status, CaseStatus::CorrectiveActionsInProgress);

        let trail = engine.audit_trail(&case.id).unwrap();
        let changes = trail
            .iter()
            .filter(|e| e.event_type == AuditEventType::StatusChange)
            .count();
        assert_eq!(changes, 2);
    }

    #[test]
    fn test_transition_to_reopened_needs_reason() {
        let engine = engine();
        let case = open(&engine, "Reopen via transition");
        engine
            .cases()
            .close(
                &case.id,
                Closure {
                    closed_by: "sam".into(),
                    comments: None,
                },
                None,
            )
            .unwrap();
        let err = engine
            .cases()
            .transition(&case.id, CaseStatus::Reopened, "sam", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_stale_version_conflicts() {
        let engine = engine();
        let case = open(&engine, "Concurrent edits");
        assert_eq!(case.version, 1);

        engine
            .cases()
            .transition(&case.id, CaseStatus::UnderInvestigation, "a", Some(1))
            .unwrap();

        let err = engine
            .cases()
            .reopen(&case.id, "reason", "b", Some(1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let current = engine.cases().get(&case.id).unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.status, CaseStatus::UnderInvestigation);
    }

    #[test]
    fn test_action_added_during_close_blocks_closure() {
        let (engine, hooked, other) = interleaved();
        let case = open(&engine, "Close race");

        let case_id = case.id.clone();
        hooked.before_next_write(move || {
            let case = other.cases().get(&case_id).unwrap();
            add_action(&other, &case, "Late containment");
        });

        let closure = || Closure {
            closed_by: "sam".into(),
            comments: None,
        };
        let err = engine.cases().close(&case.id, closure(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let current = engine.cases().get(&case.id).unwrap();
        assert_eq!(current.status, CaseStatus::Open);
        assert_eq!(engine.cases().unmet_actions(&case.id).unwrap().len(), 1);

        // A retry sees the new action
        let err = engine.cases().close(&case.id, closure(), None).unwrap_err();
        assert!(matches!(err, CapaError::OpenActionsRemain { .. }));
    }

    #[test]
    fn test_case_without_actions_is_green() {
        let engine = engine();
        let mut new = new_case("Nothing to do yet");
        new.due_date = Some(today() + Duration::days(2));
        let case = engine.cases().open_case(new).unwrap();

        assert_eq!(engine.cases().health(&case).unwrap(), Rag::Green);

        add_action(&engine, &case, "Now there is");
        assert_eq!(engine.cases().health(&case).unwrap(), Rag::Amber);
    }

    #[test]
    fn test_find_by_reference_and_filter() {
        let engine = engine();
        let case = open(&engine, "Findable");
        let mut other = new_case("Other owner");
        other.owner = Some("pat".into());
        engine.cases().open_case(other).unwrap();

        assert_eq!(engine.cases().find("met-nc-2025-001").unwrap().id, case.id);
        assert_eq!(engine.cases().find(&case.id.to_string()).unwrap().id, case.id);
        assert_eq!(
            engine.cases().find("MET-NC-2025-999").unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let by_owner = engine
            .cases()
            .list(&CaseFilter {
                owner: Some("PAT".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_owner.len(), 1);

        let searched = engine
            .cases()
            .list(&CaseFilter {
                search: Some("findable".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(searched.len(), 1);
    }

    #[test]
    fn test_health_and_red_notification() {
        let sink = Arc::new(RecordingSink::default());
        let engine = engine().with_notifier(sink.clone());
        let case = open(&engine, "Due soon");
        add_action(&engine, &case, "Fix it");

        let case = engine
            .cases()
            .set_due_date(&case.id, today() + Duration::days(3), "sam")
            .unwrap();
        assert_eq!(engine.cases().health(&case).unwrap(), Rag::Amber);
        assert!(sink.received.lock().unwrap().is_empty());

        let case = engine
            .cases()
            .set_due_date(&case.id, today() - Duration::days(1), "sam")
            .unwrap();
        assert_eq!(engine.cases().health(&case).unwrap(), Rag::Red);

        let received = sink.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert!(matches!(
            &received[0],
            Notification::CaseHealthChanged {
                previous: Rag::Amber,
                current: Rag::Red,
                ..
            }
        ));
    }

    #[test]
    fn test_closed_case_is_navy_and_frozen() {
        let engine = engine();
        let case = open(&engine, "Frozen");
        let case = engine
            .cases()
            .close(
                &case.id,
                Closure {
                    closed_by: "sam".into(),
                    comments: None,
                },
                None,
            )
            .unwrap();
        assert_eq!(engine.cases().health(&case).unwrap(), Rag::Navy);

        let err = engine.cases().add_note(&case.id, "late note", "sam").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        let err = engine
            .cases()
            .set_due_date(&case.id, today(), "sam")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn test_notes_append() {
        let engine = engine();
        let case = open(&engine, "Notes");
        engine.cases().add_note(&case.id, "Checked gauge R&R", "sam").unwrap();
        let case = engine.cases().add_note(&case.id, "Fixture worn", "jo").unwrap();
        assert_eq!(case.notes.len(), 2);
        assert_eq!(case.notes[1].author, "jo");
        assert!(engine.cases().add_note(&case.id, "", "jo").is_err());
    }
}
