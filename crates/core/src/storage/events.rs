use crate::domain::event::{Company, Event, EventStatus, EventType, Trial};
use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::QueryBuilder;

type EventRow = (
    String,                // id
    String,                // title
    String,                // type
    DateTime<Utc>,         // date_utc
    Option<String>,        // nct_id
    Option<String>,        // company_id
    Vec<String>,           // related_tickers
    String,                // status
    Option<String>,        // therapeutic_area
    Option<String>,        // description
    Vec<String>,           // source_links
    Option<DateTime<Utc>>, // last_updated
);

const EVENT_COLUMNS: &str = "id, title, type, date_utc, nct_id, company_id, related_tickers, \
     status, therapeutic_area, description, source_links, last_updated";

fn event_from_row(row: EventRow) -> anyhow::Result<Event> {
    let (
        id,
        title,
        event_type,
        date_utc,
        nct_id,
        company_id,
        related_tickers,
        status,
        therapeutic_area,
        description,
        source_links,
        last_updated,
    ) = row;

    let event_type = EventType::parse(&event_type)
        .with_context(|| format!("unknown event type {event_type:?} for event {id}"))?;
    let status = EventStatus::parse(&status)
        .with_context(|| format!("unknown event status {status:?} for event {id}"))?;

    Ok(Event {
        id,
        title,
        event_type,
        date_utc,
        nct_id,
        company_id,
        related_tickers,
        status,
        therapeutic_area,
        description,
        source_links,
        last_updated,
    })
}

pub async fn get_event(pool: &sqlx::PgPool, id: &str) -> anyhow::Result<Option<Event>> {
    let row = sqlx::query_as::<_, EventRow>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("select event failed")?;

    row.map(event_from_row).transpose()
}

/// Optional filters for the event listing. All filters are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct EventFilters {
    pub statuses: Option<Vec<EventStatus>>,
    pub types: Option<Vec<EventType>>,
    pub company_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

pub async fn list_events(
    pool: &sqlx::PgPool,
    filters: &EventFilters,
) -> anyhow::Result<Vec<Event>> {
    let mut qb = QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE true"));

    if let Some(statuses) = &filters.statuses {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        qb.push(" AND status = ANY(").push_bind(statuses).push(")");
    }
    if let Some(types) = &filters.types {
        let types: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
        qb.push(" AND type = ANY(").push_bind(types).push(")");
    }
    if let Some(company_id) = &filters.company_id {
        qb.push(" AND company_id = ").push_bind(company_id.clone());
    }
    if let Some(from) = filters.date_from {
        let from = Utc.from_utc_datetime(&from.and_time(NaiveTime::MIN));
        qb.push(" AND date_utc >= ").push_bind(from);
    }
    if let Some(to) = filters.date_to {
        // Inclusive end date: strictly before the following midnight.
        let to = Utc.from_utc_datetime(&(to + Duration::days(1)).and_time(NaiveTime::MIN));
        qb.push(" AND date_utc < ").push_bind(to);
    }

    qb.push(" ORDER BY date_utc ASC");

    let rows = qb
        .build_query_as::<EventRow>()
        .fetch_all(pool)
        .await
        .context("list events failed")?;

    rows.into_iter().map(event_from_row).collect()
}

pub async fn get_company(pool: &sqlx::PgPool, id: &str) -> anyhow::Result<Option<Company>> {
    let row = sqlx::query_as::<
        _,
        (
            String,
            String,
            Vec<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        ),
    >("SELECT id, name, tickers, market_cap, sector, website FROM companies WHERE id = $1")
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("select company failed")?;

    Ok(row.map(
        |(id, name, tickers, market_cap, sector, website)| Company {
            id,
            name,
            tickers,
            market_cap,
            sector,
            website,
        },
    ))
}

pub async fn list_companies(pool: &sqlx::PgPool) -> anyhow::Result<Vec<Company>> {
    let rows = sqlx::query_as::<
        _,
        (
            String,
            String,
            Vec<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        ),
    >("SELECT id, name, tickers, market_cap, sector, website FROM companies ORDER BY name ASC")
    .fetch_all(pool)
    .await
    .context("list companies failed")?;

    Ok(rows
        .into_iter()
        .map(|(id, name, tickers, market_cap, sector, website)| Company {
            id,
            name,
            tickers,
            market_cap,
            sector,
            website,
        })
        .collect())
}

pub async fn get_trial_by_nct_id(
    pool: &sqlx::PgPool,
    nct_id: &str,
) -> anyhow::Result<Option<Trial>> {
    let row = sqlx::query_as::<
        _,
        (
            String,
            Option<String>,
            String,
            Option<String>,
            Option<String>,
            Vec<String>,
            Option<i32>,
        ),
    >(
        "SELECT id, nct_id, title, phase, design, endpoints, enrollment \
         FROM trials WHERE nct_id = $1",
    )
    .bind(nct_id)
    .fetch_optional(pool)
    .await
    .context("select trial by nct_id failed")?;

    Ok(row.map(
        |(id, nct_id, title, phase, design, endpoints, enrollment)| Trial {
            id,
            nct_id,
            title,
            phase,
            design,
            endpoints,
            enrollment,
        },
    ))
}
