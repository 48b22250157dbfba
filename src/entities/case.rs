//! Case entity - a non-conformance, complaint, supplier issue or improvement

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::{Entity, Severity};
use crate::core::identity::{EntityId, EntityPrefix};

/// Case type tag, also the middle segment of the reference number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaseType {
    /// Non-conformance
    #[default]
    Nc,
    /// Customer complaint
    Cc,
    /// Supplier non-conformance
    Snc,
    /// Opportunity for improvement
    Ofi,
}

impl CaseType {
    pub fn code(&self) -> &'static str {
        match self {
            CaseType::Nc => "NC",
            CaseType::Cc => "CC",
            CaseType::Snc => "SNC",
            CaseType::Ofi => "OFI",
        }
    }
}

impl std::fmt::Display for CaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for CaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NC" => Ok(CaseType::Nc),
            "CC" => Ok(CaseType::Cc),
            "SNC" => Ok(CaseType::Snc),
            "OFI" => Ok(CaseType::Ofi),
            _ => Err(format!("Invalid case type: {}. Use nc, cc, snc, or ofi", s)),
        }
    }
}

/// Case lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    #[default]
    Open,
    UnderInvestigation,
    CorrectiveActionsInProgress,
    Closed,
    Reopened,
}

impl CaseStatus {
    pub fn all() -> &'static [CaseStatus] {
        &[
            CaseStatus::Open,
            CaseStatus::UnderInvestigation,
            CaseStatus::CorrectiveActionsInProgress,
            CaseStatus::Closed,
            CaseStatus::Reopened,
        ]
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseStatus::Open => write!(f, "open"),
            CaseStatus::UnderInvestigation => write!(f, "under_investigation"),
            CaseStatus::CorrectiveActionsInProgress => write!(f, "corrective_actions_in_progress"),
            CaseStatus::Closed => write!(f, "closed"),
            CaseStatus::Reopened => write!(f, "reopened"),
        }
    }
}

impl std::str::FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "open" => Ok(CaseStatus::Open),
            "under_investigation" | "investigation" => Ok(CaseStatus::UnderInvestigation),
            "corrective_actions_in_progress" | "actions" | "caip" => {
                Ok(CaseStatus::CorrectiveActionsInProgress)
            }
            "closed" => Ok(CaseStatus::Closed),
            "reopened" => Ok(CaseStatus::Reopened),
            _ => Err(format!(
                "Invalid case status: {}. Use open, under_investigation, corrective_actions_in_progress, closed, or reopened",
                s
            )),
        }
    }
}

/// Customer complaint intake details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub customer_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,

    /// How the complaint arrived (email, phone, portal)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Customer's own reference for the complaint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_due: Option<NaiveDate>,
}

/// Supplier non-conformance details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierDetails {
    pub supplier_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub po_reference: Option<String>,

    /// Whether an 8D report was requested from the supplier
    #[serde(default)]
    pub eight_d_requested: bool,
}

/// Improvement opportunity details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImprovementDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_benefit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort_estimate: Option<String>,
}

/// Case-type specific intake details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaseDetails {
    Customer(CustomerDetails),
    Supplier(SupplierDetails),
    Improvement(ImprovementDetails),
}

impl CaseDetails {
    /// The case type these details belong to
    pub fn case_type(&self) -> CaseType {
        match self {
            CaseDetails::Customer(_) => CaseType::Cc,
            CaseDetails::Supplier(_) => CaseType::Snc,
            CaseDetails::Improvement(_) => CaseType::Ofi,
        }
    }
}

/// Investigation note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub author: String,
    pub at: DateTime<Utc>,
    pub text: String,
}

/// Recorded on closure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureRecord {
    pub closed_by: String,
    pub closed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// One entry per reopen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReopenRecord {
    pub reason: String,
    pub actor: String,
    pub at: DateTime<Utc>,
}

/// A quality case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    /// Unique identifier
    pub id: EntityId,

    /// Human-readable reference, e.g. MET-NC-2025-001
    pub reference: String,

    #[serde(rename = "type")]
    pub case_type: CaseType,

    pub title: String,

    pub problem_statement: String,

    #[serde(default)]
    pub severity: Severity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    pub raised_by: String,

    pub raised_on: NaiveDate,

    pub owner: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub containment_needed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<CaseDetails>,

    #[serde(default)]
    pub status: CaseStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closure: Option<ClosureRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reopen_history: Vec<ReopenRecord>,

    pub created: DateTime<Utc>,

    #[serde(default)]
    pub version: u64,
}

impl Case {
    pub fn is_closed(&self) -> bool {
        self.status == CaseStatus::Closed
    }
}

impl Entity for Case {
    const PREFIX: EntityPrefix = EntityPrefix::Case;

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

    fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_type_parse_and_code() {
        assert_eq!("snc".parse::<CaseType>().unwrap(), CaseType::Snc);
        assert_eq!(CaseType::Ofi.code(), "OFI");
        assert!("xyz".parse::<CaseType>().is_err());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&CaseStatus::CorrectiveActionsInProgress).unwrap();
        assert_eq!(json, "\"CORRECTIVE_ACTIONS_IN_PROGRESS\"");
        assert_eq!(
            "under-investigation".parse::<CaseStatus>().unwrap(),
            CaseStatus::UnderInvestigation
        );
    }

    #[test]
    fn test_details_are_tagged() {
        let details = CaseDetails::Supplier(SupplierDetails {
            supplier_name: "Acme Castings".into(),
            eight_d_requested: true,
            ..Default::default()
        });
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["kind"], "supplier");
        assert_eq!(details.case_type(), CaseType::Snc);
    }
}
