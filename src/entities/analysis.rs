//! Root-cause analysis entity

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};

/// Most why-steps a 5-Whys analysis may carry
pub const MAX_WHYS: usize = 6;

/// Root-cause analysis method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RcaMethod {
    #[default]
    FiveWhys,
    Ishikawa,
    #[serde(rename = "EIGHT_D")]
    EightD,
    Other,
}

impl std::fmt::Display for RcaMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RcaMethod::FiveWhys => write!(f, "five_whys"),
            RcaMethod::Ishikawa => write!(f, "ishikawa"),
            RcaMethod::EightD => write!(f, "eight_d"),
            RcaMethod::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for RcaMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "five_whys" | "5why" | "5whys" | "five_why" => Ok(RcaMethod::FiveWhys),
            "ishikawa" | "fishbone" => Ok(RcaMethod::Ishikawa),
            "eight_d" | "8d" => Ok(RcaMethod::EightD),
            "other" => Ok(RcaMethod::Other),
            _ => Err(format!(
                "Invalid RCA method: {}. Use five_whys, ishikawa, eight_d, or other",
                s
            )),
        }
    }
}

/// Typed view over a 5-Whys output object
/// (`{"why1": "...", ..., "rootCause": "..."}`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiveWhys {
    pub whys: Vec<String>,
    pub root_cause: String,
}

impl FiveWhys {
    /// Read and check a 5-Whys object. Returns every problem found.
    pub fn from_output(output: &Map<String, Value>) -> Result<Self, Vec<String>> {
        let mut problems = Vec::new();

        let mut numbered: Vec<(usize, &Value)> = output
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix("why")
                    .and_then(|n| n.parse::<usize>().ok())
                    .map(|n| (n, v))
            })
            .collect();
        numbered.sort_by_key(|(n, _)| *n);

        if numbered.is_empty() {
            problems.push("at least one why-step is required".to_string());
        }
        if numbered.len() > MAX_WHYS {
            problems.push(format!(
                "{} why-steps given; at most {} allowed",
                numbered.len(),
                MAX_WHYS
            ));
        }

        let mut whys = Vec::with_capacity(numbered.len());
        for (expected, (n, value)) in (1..).zip(numbered.iter()) {
            if *n != expected {
                problems.push(format!("why{} is missing", expected));
                break;
            }
            match value.as_str().map(str::trim) {
                Some(text) if !text.is_empty() => whys.push(text.to_string()),
                _ => problems.push(format!("why{} is empty", n)),
            }
        }

        let root_cause = match output.get("rootCause").and_then(Value::as_str).map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => {
                problems.push("rootCause is empty".to_string());
                String::new()
            }
        };

        if problems.is_empty() {
            Ok(Self { whys, root_cause })
        } else {
            Err(problems)
        }
    }

    /// Build the stored output object
    pub fn to_output(&self) -> Value {
        let mut map = Map::new();
        for (i, why) in self.whys.iter().enumerate() {
            map.insert(format!("why{}", i + 1), Value::String(why.clone()));
        }
        map.insert("rootCause".to_string(), Value::String(self.root_cause.clone()));
        Value::Object(map)
    }
}

/// One revision of a case's root-cause analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCauseAnalysis {
    /// Unique identifier
    pub id: EntityId,

    /// Owning case
    pub case_id: EntityId,

    /// 1 for the first analysis, incremented on each replacement
    pub revision: u32,

    pub method: RcaMethod,

    /// Method-specific structured output (always a JSON object)
    pub output: Value,

    pub conclusion: String,

    pub analyst: String,

    pub recorded_at: DateTime<Utc>,

    /// Set when a newer revision replaces this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<EntityId>,

    #[serde(default)]
    pub version: u64,
}

impl RootCauseAnalysis {
    pub fn is_current(&self) -> bool {
        self.superseded_by.is_none()
    }

    /// Typed 5-Whys view, if this is a valid 5-Whys analysis
    pub fn five_whys(&self) -> Option<FiveWhys> {
        if self.method != RcaMethod::FiveWhys {
            return None;
        }
        self.output
            .as_object()
            .and_then(|o| FiveWhys::from_output(o).ok())
    }
}

impl Entity for RootCauseAnalysis {
    const PREFIX: EntityPrefix = EntityPrefix::Rca;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created(&self) -> DateTime<Utc> {
        self.recorded_at
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
