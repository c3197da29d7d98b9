use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalyst_core::domain::analysis::AiAnalysis;
use catalyst_core::domain::event::{Company, Event, EventStatus, EventType};
use catalyst_core::error::AnalysisError;
use catalyst_core::llm::{openai::OpenAiClient, AnalysisGenerator};
use catalyst_core::service::AnalysisService;
use catalyst_core::storage::{events, PgStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = catalyst_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let storage: Option<PgStorage> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match catalyst_core::storage::migrate(&pool).await {
                Ok(()) => Some(PgStorage::new(pool)),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let generator = OpenAiClient::from_settings(&settings)?.map(Arc::new);
    if generator.is_none() {
        tracing::warn!("OPENAI_API_KEY not set; analysis generation disabled");
    }

    let state = AppState { storage, generator };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/events", get(list_events))
        .route("/events/:id", get(get_event))
        .route("/companies", get(list_companies))
        .route("/companies/:id", get(get_company))
        .route("/analyses/:event_id", get(get_analysis).post(post_analysis))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    storage: Option<PgStorage>,
    generator: Option<Arc<OpenAiClient>>,
}

impl AppState {
    fn storage(&self) -> Result<&PgStorage, ErrorResponse> {
        self.storage
            .as_ref()
            .ok_or_else(|| error_response(StatusCode::SERVICE_UNAVAILABLE, "database unavailable"))
    }

    fn analysis_service(&self) -> Result<AnalysisService, ErrorResponse> {
        let storage = self.storage()?.clone();
        let generator = self
            .generator
            .clone()
            .map(|g| g as Arc<dyn AnalysisGenerator>);
        Ok(AnalysisService::new(
            Arc::new(storage.clone()),
            Arc::new(storage),
            generator,
        ))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

type ErrorResponse = (StatusCode, Json<ErrorBody>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ErrorResponse {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}

fn internal_error(e: anyhow::Error) -> ErrorResponse {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
}

fn analysis_error_response(event_id: &str, e: AnalysisError) -> ErrorResponse {
    match e {
        AnalysisError::NotConfigured => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        AnalysisError::EventNotFound(_) | AnalysisError::AnalysisNotFound(_) => {
            error_response(StatusCode::NOT_FOUND, e.to_string())
        }
        AnalysisError::ServiceUnavailable(_) | AnalysisError::GenerationFailure(_) => {
            tracing::error!(event_id, error = %e, "analysis request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        AnalysisError::Storage(inner) => internal_error(inner),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsQuery {
    status: Option<String>,
    types: Option<String>,
    company_id: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
}

fn parse_filters(query: &EventsQuery) -> Result<events::EventFilters, ErrorResponse> {
    let bad_request = |msg: String| error_response(StatusCode::BAD_REQUEST, msg);

    let statuses = query
        .status
        .as_deref()
        .map(|s| {
            s.split(',')
                .map(|part| {
                    EventStatus::parse(part.trim())
                        .ok_or_else(|| bad_request(format!("unknown status: {part:?}")))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let types = query
        .types
        .as_deref()
        .map(|s| {
            s.split(',')
                .map(|part| {
                    EventType::parse(part.trim())
                        .ok_or_else(|| bad_request(format!("unknown event type: {part:?}")))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let parse_date = |s: &str| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| bad_request(format!("invalid date: {s:?}")))
    };
    let date_from = query.date_from.as_deref().map(parse_date).transpose()?;
    let date_to = query.date_to.as_deref().map(parse_date).transpose()?;

    Ok(events::EventFilters {
        statuses,
        types,
        company_id: query.company_id.clone(),
        date_from,
        date_to,
    })
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<Event>>, ErrorResponse> {
    let storage = state.storage()?;
    let filters = parse_filters(&query)?;
    let events = events::list_events(storage.pool(), &filters)
        .await
        .map_err(internal_error)?;
    Ok(Json(events))
}

async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ErrorResponse> {
    let storage = state.storage()?;
    let event = events::get_event(storage.pool(), &id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Event not found"))?;
    Ok(Json(event))
}

async fn list_companies(
    State(state): State<AppState>,
) -> Result<Json<Vec<Company>>, ErrorResponse> {
    let storage = state.storage()?;
    let companies = events::list_companies(storage.pool())
        .await
        .map_err(internal_error)?;
    Ok(Json(companies))
}

async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Company>, ErrorResponse> {
    let storage = state.storage()?;
    let company = events::get_company(storage.pool(), &id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Company not found"))?;
    Ok(Json(company))
}

async fn get_analysis(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<AiAnalysis>, ErrorResponse> {
    let service = state.analysis_service()?;
    service
        .get(&event_id)
        .await
        .map(Json)
        .map_err(|e| analysis_error_response(&event_id, e))
}

async fn post_analysis(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<AiAnalysis>, ErrorResponse> {
    let service = state.analysis_service()?;
    service
        .get_or_generate(&event_id)
        .await
        .map(Json)
        .map_err(|e| analysis_error_response(&event_id, e))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &catalyst_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
