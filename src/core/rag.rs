//! Red/amber/green health evaluation
//!
//! One evaluator serves every dated record type. Record types plug in through
//! [`RagSubject`], which supplies the due date and the completion/archive
//! flags; cases, actions and any external calibration or document register
//! share the same thresholds.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Traffic-light health indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rag {
    Green,
    Amber,
    Red,
    /// Archived / terminal, no longer reviewed
    Navy,
}

impl Rag {
    /// Short human label, as shown on dashboards
    pub fn label(&self) -> &'static str {
        match self {
            Rag::Green => "OK",
            Rag::Amber => "Due Soon",
            Rag::Red => "Overdue",
            Rag::Navy => "Archived",
        }
    }
}

impl std::fmt::Display for Rag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rag::Green => write!(f, "green"),
            Rag::Amber => write!(f, "amber"),
            Rag::Red => write!(f, "red"),
            Rag::Navy => write!(f, "navy"),
        }
    }
}

impl std::str::FromStr for Rag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "green" => Ok(Rag::Green),
            "amber" => Ok(Rag::Amber),
            "red" => Ok(Rag::Red),
            "navy" => Ok(Rag::Navy),
            _ => Err(format!(
                "Invalid RAG status: {}. Use green, amber, red, or navy",
                s
            )),
        }
    }
}

/// Thresholds for the evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagThresholds {
    /// Items due within this many days (inclusive) are amber
    pub amber_window_days: i64,
}

impl Default for RagThresholds {
    fn default() -> Self {
        Self {
            amber_window_days: 7,
        }
    }
}

impl RagThresholds {
    pub fn with_amber_window(days: i64) -> Self {
        Self {
            amber_window_days: days,
        }
    }
}

/// Evaluate health for a single item. First matching rule wins:
/// archived, complete, undated, overdue, due within the amber window.
pub fn evaluate(
    due_date: Option<NaiveDate>,
    is_complete: bool,
    is_archived: bool,
    today: NaiveDate,
    thresholds: &RagThresholds,
) -> Rag {
    if is_archived {
        return Rag::Navy;
    }
    if is_complete {
        return Rag::Green;
    }
    let Some(due) = due_date else {
        return Rag::Amber;
    };
    if due < today {
        return Rag::Red;
    }
    if (due - today).num_days() <= thresholds.amber_window_days {
        return Rag::Amber;
    }
    Rag::Green
}

/// Anything that can be scored by the evaluator
pub trait RagSubject {
    fn rag_due_date(&self) -> Option<NaiveDate>;

    fn rag_is_complete(&self) -> bool;

    fn rag_is_archived(&self) -> bool {
        false
    }

    fn rag(&self, today: NaiveDate, thresholds: &RagThresholds) -> Rag {
        evaluate(
            self.rag_due_date(),
            self.rag_is_complete(),
            self.rag_is_archived(),
            today,
            thresholds,
        )
    }
}

/// Generic dated register entry (calibration, equipment, document review)
/// for callers that keep those records outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedItem {
    pub due_date: Option<NaiveDate>,
    /// Date the work was performed, if it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performed_on: Option<NaiveDate>,
    #[serde(default)]
    pub archived: bool,
}

impl RagSubject for DatedItem {
    fn rag_due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    fn rag_is_complete(&self) -> bool {
        self.performed_on.is_some()
    }

    fn rag_is_archived(&self) -> bool {
        self.archived
    }
}

/// Counts per colour over a set of items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagSummary {
    pub green: usize,
    pub amber: usize,
    pub red: usize,
    pub navy: usize,
}

impl RagSummary {
    /// Aggregate over pre-computed statuses
    pub fn from_statuses<I: IntoIterator<Item = Rag>>(statuses: I) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            summary.add(status);
        }
        summary
    }

    /// Evaluate and aggregate in one pass
    pub fn from_subjects<'a, T, I>(items: I, today: NaiveDate, thresholds: &RagThresholds) -> Self
    where
        T: RagSubject + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        Self::from_statuses(items.into_iter().map(|i| i.rag(today, thresholds)))
    }

    pub fn add(&mut self, status: Rag) {
        match status {
            Rag::Green => self.green += 1,
            Rag::Amber => self.amber += 1,
            Rag::Red => self.red += 1,
            Rag::Navy => self.navy += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.green + self.amber + self.red + self.navy
    }

    pub fn count(&self, status: Rag) -> usize {
        match status {
            Rag::Green => self.green,
            Rag::Amber => self.amber,
            Rag::Red => self.red,
            Rag::Navy => self.navy,
        }
    }

    /// Share of items in the given colour, 0.0 when empty
    pub fn percentage(&self, status: Rag) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.count(status) as f64 * 100.0 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()
    }

    #[test]
    fn test_archived_wins_over_everything() {
        let t = RagThresholds::default();
        let overdue = today() - Duration::days(30);
        assert_eq!(evaluate(Some(overdue), false, true, today(), &t), Rag::Navy);
        assert_eq!(evaluate(None, true, true, today(), &t), Rag::Navy);
    }

    #[test]
    fn test_complete_is_green_even_when_overdue() {
        let t = RagThresholds::default();
        let overdue = today() - Duration::days(3);
        assert_eq!(evaluate(Some(overdue), true, false, today(), &t), Rag::Green);
    }

    #[test]
    fn test_missing_due_date_is_amber() {
        let t = RagThresholds::default();
        assert_eq!(evaluate(None, false, false, today(), &t), Rag::Amber);
    }

    #[test]
    fn test_past_due_is_red() {
        let t = RagThresholds::default();
        for days in 1..=400 {
            let due = today() - Duration::days(days);
            assert_eq!(evaluate(Some(due), false, false, today(), &t), Rag::Red);
        }
    }

    #[test]
    fn test_within_window_is_amber_inclusive() {
        let t = RagThresholds::default();
        for days in 0..=7 {
            let due = today() + Duration::days(days);
            assert_eq!(
                evaluate(Some(due), false, false, today(), &t),
                Rag::Amber,
                "due in {} days",
                days
            );
        }
        let later = today() + Duration::days(8);
        assert_eq!(evaluate(Some(later), false, false, today(), &t), Rag::Green);
    }

    #[test]
    fn test_window_is_configurable() {
        let t = RagThresholds::with_amber_window(30);
        let due = today() + Duration::days(20);
        assert_eq!(evaluate(Some(due), false, false, today(), &t), Rag::Amber);
    }

    #[test]
    fn test_yesterday_is_red() {
        let t = RagThresholds::default();
        let yesterday = today() - Duration::days(1);
        assert_eq!(evaluate(Some(yesterday), false, false, today(), &t), Rag::Red);
    }

    #[test]
    fn test_dated_item_adapter() {
        let t = RagThresholds::default();
        let calibration = DatedItem {
            due_date: Some(today() - Duration::days(2)),
            performed_on: None,
            archived: false,
        };
        assert_eq!(calibration.rag(today(), &t), Rag::Red);

        let done = DatedItem {
            performed_on: Some(today()),
            ..calibration
        };
        assert_eq!(done.rag(today(), &t), Rag::Green);
    }

    #[test]
    fn test_summary_counts_and_percentages() {
        let t = RagThresholds::default();
        let items = vec![
            DatedItem {
                due_date: Some(today() - Duration::days(1)),
                performed_on: None,
                archived: false,
            },
            DatedItem {
                due_date: Some(today() + Duration::days(60)),
                performed_on: None,
                archived: false,
            },
            DatedItem {
                due_date: None,
                performed_on: None,
                archived: false,
            },
            DatedItem {
                due_date: None,
                performed_on: None,
                archived: true,
            },
        ];
        let summary = RagSummary::from_subjects(&items, today(), &t);
        assert_eq!(summary.total(), 4);
        assert_eq!(summary.red, 1);
        assert_eq!(summary.green, 1);
        assert_eq!(summary.amber, 1);
        assert_eq!(summary.navy, 1);
        assert!((summary.percentage(Rag::Red) - 25.0).abs() < f64::EPSILON);
        assert_eq!(RagSummary::default().percentage(Rag::Red), 0.0);
    }
}
