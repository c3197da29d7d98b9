/// Failure taxonomy of the analysis pipeline. Each variant maps to one
/// user-visible outcome; the duplicate-insert race is absorbed inside the
/// service and has no variant here.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// No generation credential was configured at startup, so no generator
    /// handle was injected. Surfaced as "feature unavailable", never as a
    /// generic server error.
    #[error("analysis generation is not configured")]
    NotConfigured,

    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("no analysis exists for event: {0}")]
    AnalysisNotFound(String),

    /// The external generative call failed (network, auth, rate limit,
    /// non-2xx).
    #[error("generation service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A response was received but did not satisfy the output contract.
    #[error("failed to generate analysis: {0}")]
    GenerationFailure(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
