//! Approval workflow entity - sign-off chain attached to a case or an action

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::team::Role;

/// What the workflow is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OwnerKind {
    Case,
    Action,
}

impl std::fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OwnerKind::Case => write!(f, "case"),
            OwnerKind::Action => write!(f, "action"),
        }
    }
}

/// Signing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApprovalMode {
    /// Steps are signed in index order
    #[default]
    Sequential,
    /// Steps may be signed in any order
    Parallel,
}

impl std::fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalMode::Sequential => write!(f, "sequential"),
            ApprovalMode::Parallel => write!(f, "parallel"),
        }
    }
}

impl std::str::FromStr for ApprovalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(ApprovalMode::Sequential),
            "parallel" => Ok(ApprovalMode::Parallel),
            _ => Err(format!(
                "Invalid approval mode: {}. Use sequential or parallel",
                s
            )),
        }
    }
}

/// Who must sign a step: anyone holding a role, or one named person
///
/// Written as `role:<role>` or `user:<name>`; a bare word is read as a role
/// when it names one, otherwise as a person.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequiredSigner {
    Role(Role),
    Person(String),
}

impl std::fmt::Display for RequiredSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequiredSigner::Role(role) => write!(f, "role:{}", role),
            RequiredSigner::Person(name) => write!(f, "user:{}", name),
        }
    }
}

impl std::str::FromStr for RequiredSigner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("signer must not be empty".to_string());
        }
        if let Some(role) = s.strip_prefix("role:") {
            return role.parse::<Role>().map(RequiredSigner::Role);
        }
        if let Some(name) = s.strip_prefix("user:") {
            let name = name.trim();
            if name.is_empty() {
                return Err("signer name must not be empty".to_string());
            }
            return Ok(RequiredSigner::Person(name.to_string()));
        }
        Ok(s.parse::<Role>()
            .map(RequiredSigner::Role)
            .unwrap_or_else(|_| RequiredSigner::Person(s.to_string())))
    }
}

impl Serialize for RequiredSigner {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RequiredSigner {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One sign-off step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub index: usize,

    pub required: RequiredSigner,

    #[serde(default)]
    pub signed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl ApprovalStep {
    pub fn new(index: usize, required: RequiredSigner) -> Self {
        Self {
            index,
            required,
            signed: false,
            signed_by: None,
            signed_at: None,
            comments: None,
        }
    }
}

/// Rejection record; never unsigns or completes a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub step: usize,
    pub rejector: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Sign-off chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    /// Unique identifier
    pub id: EntityId,

    /// The case or action this workflow approves
    pub owner_id: EntityId,

    pub owner_kind: OwnerKind,

    /// Case the owner belongs to (the owner itself for case workflows)
    pub case_id: EntityId,

    #[serde(default)]
    pub mode: ApprovalMode,

    pub steps: Vec<ApprovalStep>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<RejectionRecord>,

    pub created_by: String,

    pub created: DateTime<Utc>,

    #[serde(default)]
    pub version: u64,
}

impl ApprovalWorkflow {
    /// All steps signed
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.signed)
    }

    /// Steps still awaiting a signature
    pub fn pending_steps(&self) -> impl Iterator<Item = &ApprovalStep> {
        self.steps.iter().filter(|s| !s.signed)
    }

    /// Human-readable list of pending steps, e.g. "step 1 (role:manager)"
    pub fn pending_descriptions(&self) -> Vec<String> {
        self.pending_steps()
            .map(|s| format!("step {} ({})", s.index, s.required))
            .collect()
    }

    /// Indices of unsigned steps before `index`
    pub fn unsigned_before(&self, index: usize) -> Vec<usize> {
        self.steps
            .iter()
            .take(index)
            .filter(|s| !s.signed)
            .map(|s| s.index)
            .collect()
    }
}

impl Entity for ApprovalWorkflow {
    const PREFIX: EntityPrefix = EntityPrefix::Apv;

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
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_signer_parsing() {
        assert_eq!(
            "QA".parse::<RequiredSigner>().unwrap(),
            RequiredSigner::Role(Role::Quality)
        );
        assert_eq!(
            "role:director".parse::<RequiredSigner>().unwrap(),
            RequiredSigner::Role(Role::Director)
        );
        assert_eq!(
            "user:Dana Ruiz".parse::<RequiredSigner>().unwrap(),
            RequiredSigner::Person("Dana Ruiz".into())
        );
        assert_eq!(
            "dana".parse::<RequiredSigner>().unwrap(),
            RequiredSigner::Person("dana".into())
        );
        assert!("role:ceo".parse::<RequiredSigner>().is_err());
        assert!("  ".parse::<RequiredSigner>().is_err());
    }

    #[test]
    fn test_required_signer_serializes_as_string() {
        let json = serde_json::to_string(&RequiredSigner::Role(Role::Manager)).unwrap();
        assert_eq!(json, "\"role:manager\"");
        let back: RequiredSigner = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RequiredSigner::Role(Role::Manager));
    }
}
