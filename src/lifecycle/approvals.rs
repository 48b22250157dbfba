//! Approval workflow
//!
//! Sequential workflows are signed in step order, parallel ones in any order.
//! Role-based steps are checked against the team roster when one is loaded;
//! without a roster any signer may sign them.

use tracing::{debug, info};

use super::Lifecycle;
use crate::core::error::{CapaError, CapaResult};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::notify::Notification;
use crate::core::store;
use crate::entities::{
    Action, ApprovalMode, ApprovalStep, ApprovalWorkflow, AuditEventType, Case, OwnerKind,
    RejectionRecord, RequiredSigner,
};

/// Approval service
pub struct Approvals<'a> {
    lc: &'a Lifecycle,
}

impl<'a> Approvals<'a> {
    pub(crate) fn new(lc: &'a Lifecycle) -> Self {
        Self { lc }
    }

    /// Attach a workflow to a case or action. The owner kind follows from
    /// the id prefix.
    pub fn create_workflow(
        &self,
        owner_id: &EntityId,
        mode: ApprovalMode,
        signers: Vec<RequiredSigner>,
        actor: &str,
    ) -> CapaResult<ApprovalWorkflow> {
        if signers.is_empty() {
            return Err(CapaError::validation(
                "an approval workflow needs at least one step",
            ));
        }

        let (owner_kind, case) = match owner_id.prefix() {
            EntityPrefix::Case => (OwnerKind::Case, self.load_case(owner_id)?),
            EntityPrefix::Act => {
                let action: Action = store::require(self.lc.store(), owner_id)?;
                (OwnerKind::Action, self.load_case(&action.case_id)?)
            }
            other => {
                return Err(CapaError::validation(format!(
                    "approval workflows attach to cases or actions, not {} records",
                    other
                )))
            }
        };
        if case.is_closed() {
            return Err(CapaError::InvalidTransition {
                entity: owner_id.to_string(),
                from: case.status.to_string(),
                to: case.status.to_string(),
                reason: format!("case {} is closed", case.reference),
            });
        }
        if let Some(existing) = self.for_owner(owner_id)? {
            return Err(CapaError::validation(format!(
                "{} already has approval workflow {}",
                owner_id, existing.id
            )));
        }

        let mut workflow = ApprovalWorkflow {
            id: EntityId::new(EntityPrefix::Apv),
            owner_id: owner_id.clone(),
            owner_kind,
            case_id: case.id.clone(),
            mode,
            steps: signers
                .into_iter()
                .enumerate()
                .map(|(i, s)| ApprovalStep::new(i, s))
                .collect(),
            rejections: Vec::new(),
            created_by: actor.to_string(),
            created: self.lc.now(),
            version: 0,
        };
        // Written with the case at its read version, so a close that found
        // no workflow cannot commit alongside this one
        self.lc.store().commit(&[
            store::stage_update(&case)?,
            store::stage_insert(&mut workflow)?,
        ])?;

        info!(workflow = %workflow.id, owner = %owner_id, steps = workflow.steps.len(), "approval workflow created");
        Ok(workflow)
    }

    pub fn get(&self, id: &EntityId) -> CapaResult<ApprovalWorkflow> {
        debug!(workflow = %id, "loading approval workflow");
        store::require(self.lc.store(), id)
    }

    /// The workflow attached to a case or action, if any
    pub fn for_owner(&self, owner_id: &EntityId) -> CapaResult<Option<ApprovalWorkflow>> {
        let candidates: Vec<ApprovalWorkflow> = if owner_id.prefix() == EntityPrefix::Case {
            store::list(self.lc.store(), Some(owner_id))?
        } else {
            store::list(self.lc.store(), None)?
        };
        Ok(candidates.into_iter().find(|w| &w.owner_id == owner_id))
    }

    pub fn is_complete(&self, id: &EntityId) -> CapaResult<bool> {
        Ok(self.get(id)?.is_complete())
    }

    /// Sign one step
    pub fn sign(
        &self,
        id: &EntityId,
        step_index: usize,
        signer: &str,
        comments: Option<&str>,
        expected_version: Option<u64>,
    ) -> CapaResult<ApprovalWorkflow> {
        let signer = signer.trim();
        if signer.is_empty() {
            return Err(CapaError::validation("signer must not be empty"));
        }

        let mut workflow = self.get(id)?;
        store::check_expected(&workflow, expected_version)?;
        let case = self.load_case(&workflow.case_id)?;
        if case.is_closed() {
            return Err(CapaError::InvalidTransition {
                entity: workflow.id.to_string(),
                from: "unsigned".to_string(),
                to: "signed".to_string(),
                reason: format!("case {} is closed", case.reference),
            });
        }

        let step = workflow
            .steps
            .get(step_index)
            .ok_or_else(|| self.no_such_step(&workflow, step_index))?;
        self.authorize(&step.required, signer)?;

        if step.signed {
            return Err(CapaError::AlreadySigned {
                workflow: workflow.id.to_string(),
                step: step_index,
                signer: step.signed_by.clone().unwrap_or_default(),
            });
        }

        if workflow.mode == ApprovalMode::Sequential {
            let unsigned = workflow.unsigned_before(step_index);
            if !unsigned.is_empty() {
                return Err(CapaError::OutOfSequence {
                    workflow: workflow.id.to_string(),
                    step: step_index,
                    unsigned,
                });
            }
        }

        let now = self.lc.now();
        let step = &mut workflow.steps[step_index];
        step.signed = true;
        step.signed_by = Some(signer.to_string());
        step.signed_at = Some(now);
        step.comments = comments
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        store::save(self.lc.store(), &mut workflow)?;

        let complete = workflow.is_complete();
        self.lc.audit(
            &workflow.case_id,
            AuditEventType::ApprovalSigned,
            format!(
                "{} step {} signed{}",
                workflow.id,
                step_index,
                if complete { "; workflow complete" } else { "" }
            ),
            signer,
        );
        self.lc.notify(Notification::ApprovalSigned {
            workflow_id: workflow.id.to_string(),
            owner_id: workflow.owner_id.to_string(),
            step: step_index,
            signer: signer.to_string(),
            complete,
        });
        info!(workflow = %workflow.id, step = step_index, %signer, complete, "approval step signed");
        Ok(workflow)
    }

    /// Record a rejection against a step; signatures are left as they are
    pub fn reject(
        &self,
        id: &EntityId,
        step_index: usize,
        rejector: &str,
        reason: &str,
    ) -> CapaResult<ApprovalWorkflow> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CapaError::validation("a rejection reason is required"));
        }
        let rejector = rejector.trim();
        if rejector.is_empty() {
            return Err(CapaError::validation("rejector must not be empty"));
        }

        let mut workflow = self.get(id)?;
        if step_index >= workflow.steps.len() {
            return Err(self.no_such_step(&workflow, step_index));
        }

        workflow.rejections.push(RejectionRecord {
            step: step_index,
            rejector: rejector.to_string(),
            reason: reason.to_string(),
            at: self.lc.now(),
        });
        store::save(self.lc.store(), &mut workflow)?;

        self.lc.audit(
            &workflow.case_id,
            AuditEventType::ApprovalRejected,
            format!("{} step {} rejected: {}", workflow.id, step_index, reason),
            rejector,
        );
        info!(workflow = %workflow.id, step = step_index, "approval step rejected");
        Ok(workflow)
    }

    fn authorize(&self, required: &RequiredSigner, signer: &str) -> CapaResult<()> {
        match required {
            RequiredSigner::Person(name) if !name.eq_ignore_ascii_case(signer) => Err(
                CapaError::validation(format!("this step must be signed by {}", name)),
            ),
            RequiredSigner::Role(role) => match self.lc.roster() {
                Some(roster) if !roster.can_sign_as(signer, *role) => {
                    Err(CapaError::validation(format!(
                        "{} does not hold the {} role in the team roster",
                        signer, role
                    )))
                }
                _ => Ok(()),
            },
            RequiredSigner::Person(_) => Ok(()),
        }
    }

    fn no_such_step(&self, workflow: &ApprovalWorkflow, index: usize) -> CapaError {
        CapaError::validation(format!(
            "{} has no step {} ({} step(s))",
            workflow.id,
            index,
            workflow.steps.len()
        ))
    }

    fn load_case(&self, id: &EntityId) -> CapaResult<Case> {
        store::require(self.lc.store(), id)
    }
}
