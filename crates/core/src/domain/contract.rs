use crate::domain::analysis::{AnalysisDraft, PricePoint, Scenario, ScenarioName};
use crate::pricepath;
use anyhow::{bail, ensure};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Raw generator output, exactly as the model is instructed to emit it.
/// Strictly typed so that malformed payloads are rejected at the parse
/// boundary instead of flowing partially-typed through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmAnalysisPayload {
    pub summary: String,
    pub key_factors: Vec<String>,
    pub scenarios: Vec<LlmScenario>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmScenario {
    pub name: String,
    pub prob: f64,
    pub narrative: String,
    pub price_target: f64,
    #[serde(default)]
    pub price_path: Vec<PricePoint>,
}

impl LlmAnalysisPayload {
    /// Validates the payload and assembles the draft the handler persists.
    ///
    /// Missing or empty price paths are synthesized from the event date and
    /// the scenario's price target; this is a known gap in upstream model
    /// output. Every other required field must be present and well-formed.
    pub fn validate_and_into_draft(self, event_date: NaiveDate) -> anyhow::Result<AnalysisDraft> {
        let summary = self.summary.trim().to_string();
        ensure!(!summary.is_empty(), "summary must be non-empty");

        let key_factors: Vec<String> = self
            .key_factors
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        ensure!(!key_factors.is_empty(), "keyFactors must be non-empty");

        ensure!(
            self.scenarios.len() == 3,
            "expected exactly 3 scenarios (got {})",
            self.scenarios.len()
        );

        let mut bull = None;
        let mut base = None;
        let mut bear = None;
        for scenario in self.scenarios {
            let slot = match scenario.name.as_str() {
                "Bull" => &mut bull,
                "Base" => &mut base,
                "Bear" => &mut bear,
                other => bail!("unknown scenario name: {other:?}"),
            };
            ensure!(
                slot.is_none(),
                "duplicate scenario name: {:?}",
                scenario.name
            );
            *slot = Some(scenario.validate_and_into_scenario(event_date)?);
        }

        let (Some(bull), Some(base), Some(bear)) = (bull, base, bear) else {
            bail!("scenarios must contain exactly one each of Bull, Base, Bear");
        };

        let confidence = self
            .confidence
            .unwrap_or(DEFAULT_CONFIDENCE)
            .clamp(0.0, 1.0);

        Ok(AnalysisDraft {
            summary,
            key_factors,
            scenarios: [bull, base, bear],
            confidence,
        })
    }
}

impl LlmScenario {
    fn validate_and_into_scenario(self, event_date: NaiveDate) -> anyhow::Result<Scenario> {
        let name = match self.name.as_str() {
            "Bull" => ScenarioName::Bull,
            "Base" => ScenarioName::Base,
            "Bear" => ScenarioName::Bear,
            other => bail!("unknown scenario name: {other:?}"),
        };

        let narrative = self.narrative.trim().to_string();
        ensure!(
            !narrative.is_empty(),
            "{} scenario narrative must be non-empty",
            name.as_str()
        );

        ensure!(
            self.price_target.is_finite() && self.price_target > 0.0,
            "{} scenario priceTarget must be a positive number (got {})",
            name.as_str(),
            self.price_target
        );

        // Model-supplied paths pass through unchanged; only absent/empty
        // paths are back-filled.
        let price_path = if self.price_path.is_empty() {
            pricepath::synthesize(event_date, self.price_target)
        } else {
            for point in &self.price_path {
                ensure!(
                    point.price.is_finite() && point.price > 0.0,
                    "{} scenario pricePath contains a non-positive price ({} on {})",
                    name.as_str(),
                    point.price,
                    point.date
                );
            }
            self.price_path
        };

        Ok(Scenario {
            name,
            prob: self.prob,
            narrative,
            price_target: self.price_target,
            price_path,
        })
    }
}
