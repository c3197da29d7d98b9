use crate::domain::analysis::AnalysisDraft;
use crate::domain::event::{Company, Event, Trial};
use std::fmt;

pub mod error;
pub mod json;
pub mod openai;

pub use error::LlmError;

#[derive(Debug, Clone, Copy)]
pub enum Provider {
    OpenAi,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
        }
    }
}

/// Everything the generator knows about an event. Company and trial are
/// best-effort; their absence only narrows the prompt.
#[derive(Debug, Clone)]
pub struct GenerateInput {
    pub event: Event,
    pub company: Option<Company>,
    pub trial: Option<Trial>,
}

#[async_trait::async_trait]
pub trait AnalysisGenerator: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate_analysis(&self, input: GenerateInput) -> Result<AnalysisDraft, LlmError>;
}
