//! Dashboard aggregation
//!
//! Read-only. Health is derived on every call and never stored.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::Lifecycle;
use crate::core::entity::Severity;
use crate::core::error::CapaResult;
use crate::core::identity::EntityId;
use crate::core::rag::{Rag, RagSubject, RagSummary};
use crate::core::store;
use crate::entities::{Action, Case, CaseStatus, CaseType};

/// One dashboard row
#[derive(Debug, Clone, Serialize)]
pub struct CaseOverview {
    pub id: EntityId,
    pub reference: String,
    #[serde(rename = "type")]
    pub case_type: CaseType,
    pub title: String,
    pub severity: Severity,
    pub status: CaseStatus,
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub health: Rag,
    pub total_actions: usize,
    pub open_actions: usize,
    pub overdue_actions: usize,
}

/// Counts across the whole register
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSummary {
    pub as_of: Option<NaiveDate>,
    pub open_cases: usize,
    pub closed_cases: usize,
    pub overdue_actions: usize,
    pub cases: RagSummary,
    pub actions: RagSummary,
}

/// Dashboard service
pub struct Dashboard<'a> {
    lc: &'a Lifecycle,
}

impl<'a> Dashboard<'a> {
    pub(crate) fn new(lc: &'a Lifecycle) -> Self {
        Self { lc }
    }

    /// Every case with its health, worst first
    pub fn case_overview(&self, today: NaiveDate) -> CapaResult<Vec<CaseOverview>> {
        let (cases, actions) = self.load()?;
        let cases_svc = self.lc.cases();

        let mut rows: Vec<CaseOverview> = cases
            .into_iter()
            .map(|case| {
                let case_actions = actions.get(&case.id).map(Vec::as_slice).unwrap_or(&[]);
                let health = cases_svc.health_on(&case, case_actions, today);
                let open_actions = case_actions.iter().filter(|a| !a.is_done()).count();
                let overdue_actions = if case.is_closed() {
                    0
                } else {
                    case_actions
                        .iter()
                        .filter(|a| a.rag(today, &self.lc.settings().thresholds) == Rag::Red)
                        .count()
                };
                CaseOverview {
                    total_actions: case_actions.len(),
                    open_actions,
                    overdue_actions,
                    health,
                    id: case.id,
                    reference: case.reference,
                    case_type: case.case_type,
                    title: case.title,
                    severity: case.severity,
                    status: case.status,
                    owner: case.owner,
                    due_date: case.due_date,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            health_rank(a.health)
                .cmp(&health_rank(b.health))
                .then_with(|| b.severity.cmp(&a.severity))
                .then_with(|| a.reference.cmp(&b.reference))
        });
        Ok(rows)
    }

    /// Health counts over cases and over actions. Actions of closed cases
    /// count as archived.
    pub fn summary(&self, today: NaiveDate) -> CapaResult<DashboardSummary> {
        let (cases, actions) = self.load()?;
        let thresholds = &self.lc.settings().thresholds;
        let cases_svc = self.lc.cases();

        let mut summary = DashboardSummary {
            as_of: Some(today),
            ..DashboardSummary::default()
        };
        for case in &cases {
            let case_actions = actions.get(&case.id).map(Vec::as_slice).unwrap_or(&[]);
            summary.cases.add(cases_svc.health_on(case, case_actions, today));
            if case.is_closed() {
                summary.closed_cases += 1;
            } else {
                summary.open_cases += 1;
            }

            for action in case_actions {
                let status = if case.is_closed() {
                    Rag::Navy
                } else {
                    action.rag(today, thresholds)
                };
                if status == Rag::Red {
                    summary.overdue_actions += 1;
                }
                summary.actions.add(status);
            }
        }

        debug!(cases = summary.cases.total(), actions = summary.actions.total(), "dashboard summary");
        Ok(summary)
    }

    fn load(&self) -> CapaResult<(Vec<Case>, HashMap<EntityId, Vec<Action>>)> {
        let cases: Vec<Case> = store::list(self.lc.store(), None)?;
        let mut by_case: HashMap<EntityId, Vec<Action>> = HashMap::new();
        for action in store::list::<Action>(self.lc.store(), None)? {
            by_case.entry(action.case_id.clone()).or_default().push(action);
        }
        Ok((cases, by_case))
    }
}

fn health_rank(rag: Rag) -> u8 {
    match rag {
        Rag::Red => 0,
        Rag::Amber => 1,
        Rag::Green => 2,
        Rag::Navy => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::Closure;
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_empty_register() {
        let engine = engine();
        let summary = engine.dashboard().summary(today()).unwrap();
        assert_eq!(summary.cases.total(), 0);
        assert_eq!(summary.actions.percentage(Rag::Red), 0.0);
        assert!(engine.dashboard().case_overview(today()).unwrap().is_empty());
    }

    #[test]
    fn test_overview_orders_worst_first() {
        let engine = engine();
        let fine = open(&engine, "Fine");
        add_action(&engine, &fine, "Plenty of time");

        let late = open(&engine, "Late");
        add_action(&engine, &late, "Rework");

        // Viewed after the cases' default due date, both are overdue unless done
        let later = today() + Duration::days(40);
        let rows = engine.dashboard().case_overview(later).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.health == Rag::Red));
        assert!(rows.iter().all(|r| r.overdue_actions == 1));

        let rows = engine.dashboard().case_overview(today()).unwrap();
        assert_eq!(rows[0].total_actions, 1);
        assert_eq!(rows[0].open_actions, 1);
        assert_eq!(rows[0].overdue_actions, 0);
    }

    #[test]
    fn test_summary_counts() {
        let engine = engine();
        let done = open(&engine, "Done");
        let action = add_action(&engine, &done, "Fix");
        finish(&engine, &action);
        engine
            .cases()
            .close(
                &done.id,
                Closure {
                    closed_by: "sam".into(),
                    comments: None,
                },
                None,
            )
            .unwrap();

        let pending = open(&engine, "Pending");
        add_action(&engine, &pending, "Fix");
        add_action(&engine, &pending, "Train");

        let summary = engine.dashboard().summary(today()).unwrap();
        assert_eq!(summary.open_cases, 1);
        assert_eq!(summary.closed_cases, 1);
        assert_eq!(summary.cases.navy, 1);
        assert_eq!(summary.actions.navy, 1);
        assert_eq!(summary.actions.total(), 3);
        assert_eq!(summary.overdue_actions, 0);

        let summary = engine
            .dashboard()
            .summary(today() + Duration::days(30))
            .unwrap();
        assert_eq!(summary.overdue_actions, 2);
        assert_eq!(summary.cases.red, 1);
    }
}
