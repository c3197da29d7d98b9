use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalyst_core::domain::event::{Company, Event, Trial};

#[derive(Debug, Parser)]
#[command(name = "catalyst_worker")]
struct Args {
    /// Path to a JSON catalog of companies, trials, and events to upsert.
    #[arg(long)]
    file: std::path::PathBuf,

    /// Do everything except writing to the database.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct SeedCatalog {
    #[serde(default)]
    companies: Vec<Company>,
    #[serde(default)]
    trials: Vec<Trial>,
    #[serde(default)]
    events: Vec<Event>,
}

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

    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let catalog: SeedCatalog = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;

    if args.dry_run {
        tracing::info!(
            dry_run = true,
            companies = catalog.companies.len(),
            trials = catalog.trials.len(),
            events = catalog.events.len(),
            "seed catalog parsed"
        );
        return Ok(());
    }

    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    catalyst_core::storage::migrate(&pool).await?;

    let result = catalyst_core::storage::catalog::upsert_catalog(
        &pool,
        &catalog.companies,
        &catalog.trials,
        &catalog.events,
    )
    .await;

    match result {
        Ok(counts) => {
            tracing::info!(
                companies = counts.companies,
                trials = counts.trials,
                events = counts.events,
                "seed catalog upserted"
            );
            Ok(())
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "seed run failed");
            Err(err)
        }
    }
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
