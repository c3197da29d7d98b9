use crate::domain::event::{Company, Event, Trial};
use anyhow::Context;

#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogCounts {
    pub companies: usize,
    pub trials: usize,
    pub events: usize,
}

/// Upserts a seed catalog in one transaction, keyed by id. Companies go
/// first so event foreign keys resolve.
pub async fn upsert_catalog(
    pool: &sqlx::PgPool,
    companies: &[Company],
    trials: &[Trial],
    events: &[Event],
) -> anyhow::Result<CatalogCounts> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    for company in companies {
        sqlx::query(
            "INSERT INTO companies (id, name, tickers, market_cap, sector, website) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET \
               name = EXCLUDED.name, tickers = EXCLUDED.tickers, \
               market_cap = EXCLUDED.market_cap, sector = EXCLUDED.sector, \
               website = EXCLUDED.website",
        )
        .bind(&company.id)
        .bind(&company.name)
        .bind(&company.tickers)
        .bind(&company.market_cap)
        .bind(&company.sector)
        .bind(&company.website)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert company {} failed", company.id))?;
    }

    for trial in trials {
        sqlx::query(
            "INSERT INTO trials (id, nct_id, title, phase, design, endpoints, enrollment) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
               nct_id = EXCLUDED.nct_id, title = EXCLUDED.title, \
               phase = EXCLUDED.phase, design = EXCLUDED.design, \
               endpoints = EXCLUDED.endpoints, enrollment = EXCLUDED.enrollment",
        )
        .bind(&trial.id)
        .bind(&trial.nct_id)
        .bind(&trial.title)
        .bind(&trial.phase)
        .bind(&trial.design)
        .bind(&trial.endpoints)
        .bind(trial.enrollment)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert trial {} failed", trial.id))?;
    }

    for event in events {
        sqlx::query(
            "INSERT INTO events \
               (id, title, type, date_utc, nct_id, company_id, related_tickers, \
                status, therapeutic_area, description, source_links, last_updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now()) \
             ON CONFLICT (id) DO UPDATE SET \
               title = EXCLUDED.title, type = EXCLUDED.type, \
               date_utc = EXCLUDED.date_utc, nct_id = EXCLUDED.nct_id, \
               company_id = EXCLUDED.company_id, \
               related_tickers = EXCLUDED.related_tickers, \
               status = EXCLUDED.status, \
               therapeutic_area = EXCLUDED.therapeutic_area, \
               description = EXCLUDED.description, \
               source_links = EXCLUDED.source_links, \
               last_updated = now()",
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(event.event_type.as_str())
        .bind(event.date_utc)
        .bind(&event.nct_id)
        .bind(&event.company_id)
        .bind(&event.related_tickers)
        .bind(event.status.as_str())
        .bind(&event.therapeutic_area)
        .bind(&event.description)
        .bind(&event.source_links)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert event {} failed", event.id))?;
    }

    tx.commit().await.context("commit transaction failed")?;

    Ok(CatalogCounts {
        companies: companies.len(),
        trials: trials.len(),
        events: events.len(),
    })
}
