use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of tracked catalyst kinds. Stored as the kebab-case string in
/// the `events.type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    AdvisoryCommittee,
    RegulatoryDecisionDate,
    DataReadout,
    FilingSubmission,
    PhaseResult,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AdvisoryCommittee => "advisory-committee",
            EventType::RegulatoryDecisionDate => "regulatory-decision-date",
            EventType::DataReadout => "data-readout",
            EventType::FilingSubmission => "filing-submission",
            EventType::PhaseResult => "phase-result",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "advisory-committee" => Some(EventType::AdvisoryCommittee),
            "regulatory-decision-date" => Some(EventType::RegulatoryDecisionDate),
            "data-readout" => Some(EventType::DataReadout),
            "filing-submission" => Some(EventType::FilingSubmission),
            "phase-result" => Some(EventType::PhaseResult),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Live,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "upcoming",
            EventStatus::Live => "live",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upcoming" => Some(EventStatus::Upcoming),
            "live" => Some(EventStatus::Live),
            "completed" => Some(EventStatus::Completed),
            "cancelled" => Some(EventStatus::Cancelled),
            _ => None,
        }
    }
}

/// A calendar-dated regulatory/clinical milestone. Created by seeding or
/// ingestion; read-only from the analysis pipeline's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub date_utc: DateTime<Utc>,
    /// Registry-id link to the associated trial (`trials.nct_id`). This is
    /// the single trial-association convention used throughout; there is no
    /// direct trial foreign key on events.
    #[serde(default)]
    pub nct_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub related_tickers: Vec<String>,
    pub status: EventStatus,
    #[serde(default)]
    pub therapeutic_area: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_links: Vec<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
    pub tickers: Vec<String>,
    #[serde(default)]
    pub market_cap: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trial {
    pub id: String,
    #[serde(default)]
    pub nct_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub design: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub enrollment: Option<i32>,
}
