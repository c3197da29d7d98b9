use crate::domain::analysis::{AiAnalysis, NewAnalysis};
use crate::domain::event::{Company, Event, Trial};
use crate::service::{AnalysisStore, EventDirectory, StoreError};
use anyhow::Context;

pub mod analyses;
pub mod catalog;
pub mod events;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Postgres-backed implementation of the core's read and write contracts.
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: sqlx::PgPool,
}

impl PgStorage {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl EventDirectory for PgStorage {
    async fn event(&self, id: &str) -> anyhow::Result<Option<Event>> {
        events::get_event(&self.pool, id).await
    }

    async fn company(&self, id: &str) -> anyhow::Result<Option<Company>> {
        events::get_company(&self.pool, id).await
    }

    async fn trial_by_nct_id(&self, nct_id: &str) -> anyhow::Result<Option<Trial>> {
        events::get_trial_by_nct_id(&self.pool, nct_id).await
    }
}

#[async_trait::async_trait]
impl AnalysisStore for PgStorage {
    async fn analysis_for_event(&self, event_id: &str) -> Result<Option<AiAnalysis>, StoreError> {
        analyses::get_by_event(&self.pool, event_id)
            .await
            .map_err(StoreError::Other)
    }

    async fn insert_analysis(&self, new: NewAnalysis) -> Result<AiAnalysis, StoreError> {
        analyses::insert(&self.pool, new).await
    }
}
