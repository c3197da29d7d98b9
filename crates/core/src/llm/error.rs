use crate::llm::Provider;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The call never produced a usable response: connect/timeout failures,
    /// auth rejections, rate limits, any non-2xx status.
    #[error("{provider} request failed: {detail}")]
    Transport { provider: Provider, detail: String },

    /// A response arrived but was not parseable into the output contract.
    /// `raw_output` keeps the offending text for server-side diagnostics.
    #[error("{provider} returned an invalid payload: {detail}")]
    InvalidPayload {
        provider: Provider,
        detail: String,
        raw_output: Option<String>,
    },
}
