pub mod domain;
pub mod error;
pub mod llm;
pub mod pricepath;
pub mod service;
pub mod storage;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub openai_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        /// The OpenAI key is deliberately not required: a missing key is the
        /// handled `NotConfigured` state, not a startup failure.
        pub fn openai_api_key(&self) -> Option<&str> {
            self.openai_api_key.as_deref()
        }
    }
}
