//! Root-cause analysis module
//!
//! A case has at most one current analysis. Replacing it keeps the old one
//! as a superseded revision, so `history` always shows every version.

use serde_json::Value;
use tracing::info;

use super::Lifecycle;
use crate::core::error::{CapaError, CapaResult};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::store;
use crate::entities::{AuditEventType, Case, CaseStatus, FiveWhys, RcaMethod, RootCauseAnalysis};

/// Check method-specific output. 5-Whys must be complete; other methods
/// only need a JSON object.
pub fn validate_output(method: RcaMethod, output: &Value) -> CapaResult<()> {
    let object = output.as_object().ok_or_else(|| {
        CapaError::validation(format!("{} output must be a JSON object", method))
    })?;
    if method == RcaMethod::FiveWhys {
        FiveWhys::from_output(object).map_err(|problems| CapaError::IncompleteAnalysis { problems })?;
    }
    Ok(())
}

/// Root-cause analysis service
pub struct Analyses<'a> {
    lc: &'a Lifecycle,
}

impl<'a> Analyses<'a> {
    pub(crate) fn new(lc: &'a Lifecycle) -> Self {
        Self { lc }
    }

    /// Attach the first analysis to a case. An OPEN case moves to
    /// UNDER_INVESTIGATION.
    pub fn attach(
        &self,
        case_id: &EntityId,
        method: RcaMethod,
        output: Value,
        conclusion: &str,
        analyst: &str,
    ) -> CapaResult<RootCauseAnalysis> {
        let mut case = self.analysable_case(case_id, analyst)?;
        if let Some(existing) = self.current(case_id)? {
            return Err(CapaError::AlreadyAttached {
                case: case.reference.clone(),
                existing: existing.id.to_string(),
            });
        }
        validate_output(method, &output)?;

        let moved = case.status == CaseStatus::Open;
        if moved {
            case.status = CaseStatus::UnderInvestigation;
        }

        // The case is rewritten at its read version even when its status
        // stays put, so of two concurrent attaches only one commits
        let mut analysis = self.revision(&case, 1, method, output, conclusion, analyst);
        self.lc.store().commit(&[
            store::stage_update(&case)?,
            store::stage_insert(&mut analysis)?,
        ])?;

        self.lc.audit(
            &case.id,
            AuditEventType::RootCauseAttached,
            format!("{} analysis {} attached", method, analysis.id),
            analyst,
        );
        if moved {
            self.lc.audit(
                &case.id,
                AuditEventType::StatusChange,
                format!("{} → {}", CaseStatus::Open, CaseStatus::UnderInvestigation),
                analyst,
            );
        }
        info!(case = %case.id, analysis = %analysis.id, "root-cause analysis attached");
        Ok(analysis)
    }

    /// Supersede the current analysis with a new revision
    pub fn replace(
        &self,
        case_id: &EntityId,
        method: RcaMethod,
        output: Value,
        conclusion: &str,
        analyst: &str,
    ) -> CapaResult<RootCauseAnalysis> {
        let case = self.analysable_case(case_id, analyst)?;
        let mut previous = self.current(case_id)?.ok_or_else(|| {
            CapaError::validation(format!(
                "{} has no root-cause analysis to replace; attach one first",
                case.reference
            ))
        })?;
        validate_output(method, &output)?;

        let mut analysis =
            self.revision(&case, previous.revision + 1, method, output, conclusion, analyst);

        previous.superseded_by = Some(analysis.id.clone());
        self.lc.store().commit(&[
            store::stage_update(&previous)?,
            store::stage_insert(&mut analysis)?,
        ])?;

        self.lc.audit(
            &case.id,
            AuditEventType::RootCauseReplaced,
            format!(
                "revision {} replaces {} ({})",
                analysis.revision, previous.id, method
            ),
            analyst,
        );
        info!(case = %case.id, revision = analysis.revision, "root-cause analysis replaced");
        Ok(analysis)
    }

    /// The analysis in force, if any
    pub fn current(&self, case_id: &EntityId) -> CapaResult<Option<RootCauseAnalysis>> {
        Ok(self
            .history(case_id)?
            .into_iter()
            .find(RootCauseAnalysis::is_current))
    }

    /// Every revision, oldest first
    pub fn history(&self, case_id: &EntityId) -> CapaResult<Vec<RootCauseAnalysis>> {
        let mut revisions: Vec<RootCauseAnalysis> = store::list(self.lc.store(), Some(case_id))?;
        revisions.sort_by_key(|r| r.revision);
        Ok(revisions)
    }

    fn analysable_case(&self, case_id: &EntityId, analyst: &str) -> CapaResult<Case> {
        if analyst.trim().is_empty() {
            return Err(CapaError::validation("analyst must not be empty"));
        }
        let case: Case = store::require(self.lc.store(), case_id)?;
        if case.is_closed() {
            return Err(CapaError::InvalidTransition {
                entity: case.reference.clone(),
                from: case.status.to_string(),
                to: case.status.to_string(),
                reason: "root-cause analysis cannot change on a closed case".to_string(),
            });
        }
        Ok(case)
    }

    fn revision(
        &self,
        case: &Case,
        revision: u32,
        method: RcaMethod,
        output: Value,
        conclusion: &str,
        analyst: &str,
    ) -> RootCauseAnalysis {
        RootCauseAnalysis {
            id: EntityId::new(EntityPrefix::Rca),
            case_id: case.id.clone(),
            revision,
            method,
            output,
            conclusion: conclusion.trim().to_string(),
            analyst: analyst.trim().to_string(),
            recorded_at: self.lc.now(),
            superseded_by: None,
            version: 0,
        }
    }
}
