use crate::domain::analysis::{AiAnalysis, NewAnalysis, Scenario, SCENARIO_COUNT};
use crate::service::StoreError;
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

type AnalysisRow = (
    String,            // id
    String,            // event_id
    DateTime<Utc>,     // generated_at
    String,            // summary
    Vec<String>,       // key_factors
    serde_json::Value, // scenarios
    f32,               // confidence
    String,            // model_version
    Vec<String>,       // sources_used
);

fn analysis_from_row(row: AnalysisRow) -> anyhow::Result<AiAnalysis> {
    let (
        id,
        event_id,
        generated_at,
        summary,
        key_factors,
        scenarios,
        confidence,
        model_version,
        sources_used,
    ) = row;

    let scenarios: Vec<Scenario> = serde_json::from_value(scenarios)
        .with_context(|| format!("invalid scenarios JSON for analysis {id}"))?;
    let scenarios: [Scenario; SCENARIO_COUNT] = scenarios.try_into().map_err(
        |s: Vec<Scenario>| anyhow::anyhow!("expected 3 scenarios for analysis {id}, got {}", s.len()),
    )?;

    Ok(AiAnalysis {
        id,
        event_id,
        generated_at,
        summary,
        key_factors,
        scenarios,
        confidence: confidence as f64,
        model_version,
        sources_used,
    })
}

pub async fn get_by_event(
    pool: &sqlx::PgPool,
    event_id: &str,
) -> anyhow::Result<Option<AiAnalysis>> {
    let row = sqlx::query_as::<_, AnalysisRow>(
        "SELECT id, event_id, generated_at, summary, key_factors, scenarios, \
                confidence, model_version, sources_used \
         FROM ai_analyses WHERE event_id = $1",
    )
    .bind(event_id)
    .fetch_optional(pool)
    .await
    .context("select ai_analysis failed")?;

    row.map(analysis_from_row).transpose()
}

/// Inserts exactly one analysis row, assigning its id and timestamp. The
/// unique index on `event_id` turns a concurrent double-generate into
/// `StoreError::Duplicate` for the loser.
pub async fn insert(pool: &sqlx::PgPool, new: NewAnalysis) -> Result<AiAnalysis, StoreError> {
    let id = Uuid::new_v4().to_string();
    let generated_at = Utc::now();

    let scenarios = serde_json::to_value(&new.scenarios)
        .context("failed to serialize scenarios")
        .map_err(StoreError::Other)?;

    let res = sqlx::query(
        "INSERT INTO ai_analyses \
           (id, event_id, generated_at, summary, key_factors, scenarios, \
            confidence, model_version, sources_used) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(&id)
    .bind(&new.event_id)
    .bind(generated_at)
    .bind(&new.summary)
    .bind(&new.key_factors)
    .bind(&scenarios)
    .bind(new.confidence as f32)
    .bind(&new.model_version)
    .bind(&new.sources_used)
    .execute(pool)
    .await;

    match res {
        Ok(_) => Ok(AiAnalysis {
            id,
            event_id: new.event_id,
            generated_at,
            summary: new.summary,
            key_factors: new.key_factors,
            scenarios: new.scenarios,
            confidence: new.confidence,
            model_version: new.model_version,
            sources_used: new.sources_used,
        }),
        Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            Err(StoreError::Duplicate)
        }
        Err(e) => Err(StoreError::Other(
            anyhow::Error::new(e).context("insert ai_analysis failed"),
        )),
    }
}
