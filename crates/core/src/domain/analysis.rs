use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const SCENARIO_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioName {
    Bull,
    Base,
    Bear,
}

impl ScenarioName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioName::Bull => "Bull",
            ScenarioName::Base => "Base",
            ScenarioName::Bear => "Bear",
        }
    }
}

/// One sample of a hypothetical price trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// One of the three named probabilistic outcome narratives. Embedded in
/// `AiAnalysis`; not persisted as its own entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: ScenarioName,
    pub prob: f64,
    pub narrative: String,
    pub price_target: f64,
    pub price_path: Vec<PricePoint>,
}

/// The persisted forecast bundle for one event. Written exactly once and
/// never mutated afterwards; at most one row exists per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub id: String,
    pub event_id: String,
    pub generated_at: DateTime<Utc>,
    pub summary: String,
    pub key_factors: Vec<String>,
    pub scenarios: [Scenario; SCENARIO_COUNT],
    pub confidence: f64,
    pub model_version: String,
    pub sources_used: Vec<String>,
}

/// Validated generator output before persistence. The store assigns the id
/// and generation timestamp.
#[derive(Debug, Clone)]
pub struct AnalysisDraft {
    pub summary: String,
    pub key_factors: Vec<String>,
    pub scenarios: [Scenario; SCENARIO_COUNT],
    pub confidence: f64,
}

/// Insert shape handed to the analysis store.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub event_id: String,
    pub summary: String,
    pub key_factors: Vec<String>,
    pub scenarios: [Scenario; SCENARIO_COUNT],
    pub confidence: f64,
    pub model_version: String,
    pub sources_used: Vec<String>,
}

impl NewAnalysis {
    pub fn from_draft(
        event_id: &str,
        draft: AnalysisDraft,
        model_version: &str,
        sources_used: &[&str],
    ) -> Self {
        Self {
            event_id: event_id.to_string(),
            summary: draft.summary,
            key_factors: draft.key_factors,
            scenarios: draft.scenarios,
            confidence: draft.confidence,
            model_version: model_version.to_string(),
            sources_used: sources_used.iter().map(|s| s.to_string()).collect(),
        }
    }
}
