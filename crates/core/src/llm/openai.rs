use crate::config::Settings;
use crate::domain::analysis::AnalysisDraft;
use crate::llm::error::LlmError;
use crate::llm::{json, AnalysisGenerator, GenerateInput, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-5";
// The response carries three 30-point price-path arrays, so the output
// budget is well above a prose-only completion.
const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 8192;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_completion_tokens: u32,
}

impl OpenAiClient {
    /// Builds a client when a credential is configured. `Ok(None)` is the
    /// valid not-configured state: the caller injects no generator handle
    /// and the service answers `NotConfigured` without touching the network.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        let Some(api_key) = settings.openai_api_key() else {
            return Ok(None);
        };

        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_completion_tokens = std::env::var("OPENAI_MAX_COMPLETION_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_COMPLETION_TOKENS);

        let timeout_secs = std::env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Some(Self {
            http,
            api_key: api_key.to_string(),
            base_url,
            model,
            max_completion_tokens,
        }))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn create_chat_completion(
        &self,
        req: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, LlmError> {
        let transport = |detail: String| LlmError::Transport {
            provider: Provider::OpenAi,
            detail,
        };

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| transport(format!("invalid api key header: {e}")))?;
        headers.insert("authorization", bearer);

        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .map_err(|e| transport(format!("request failed: {e}")))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| transport(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(transport(format!("status={status}: {text}")));
        }

        serde_json::from_str::<CreateChatCompletionResponse>(&text).map_err(|e| {
            LlmError::InvalidPayload {
                provider: Provider::OpenAi,
                detail: format!("failed to decode chat completion response: {e}"),
                raw_output: Some(text),
            }
        })
    }

    fn system_prompt() -> &'static str {
        "You are an expert biotech and pharmaceutical industry analyst \
         specializing in clinical trials, FDA approvals, and market forecasting."
    }

    fn user_prompt(input: &GenerateInput) -> String {
        let event = &input.event;
        let company_name = input
            .company
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or("Unknown");
        let therapeutic_area = event.therapeutic_area.as_deref().unwrap_or("Not specified");

        let trial_block = match &input.trial {
            Some(trial) => {
                let endpoints = if trial.endpoints.is_empty() {
                    "Not specified".to_string()
                } else {
                    trial.endpoints.join(", ")
                };
                format!(
                    "- Trial Phase: {}\n- Trial Design: {}\n- Endpoints: {}\n",
                    trial.phase.as_deref().unwrap_or("Not specified"),
                    trial.design.as_deref().unwrap_or("Not specified"),
                    endpoints,
                )
            }
            None => String::new(),
        };

        format!(
            "Analyze the following clinical trial event and provide detailed insights.\n\
             \n\
             Event Information:\n\
             - Title: {title}\n\
             - Type: {ty}\n\
             - Date: {date}\n\
             - Company: {company_name}\n\
             - Therapeutic Area: {therapeutic_area}\n\
             {trial_block}\
             \n\
             Provide your analysis in JSON format with:\n\
             1) A 2-3 sentence plain-English summary explaining the event's significance\n\
             2) An array of 3-5 key factors or endpoints to watch\n\
             3) Three scenarios (Bull, Base, Bear) with:\n\
                - name: \"Bull\", \"Base\", or \"Bear\"\n\
                - prob: probability between 0 and 1 (the three must sum to 1.0)\n\
                - narrative: 3-sentence rationale for this scenario\n\
                - priceTarget: estimated stock price target for this scenario (use current baseline of $100)\n\
                - pricePath: array of 30 daily price points showing price evolution (each with date and price)\n\
             4) confidence: your confidence score between 0 and 1\n\
             \n\
             Guidelines:\n\
             - Bull scenario: positive outcome, approval likely, strong efficacy\n\
             - Base scenario: moderate outcome, conditional approval or mixed results\n\
             - Bear scenario: negative outcome, trial failure, or significant concerns\n\
             - Price paths should start from $100 on the event date and diverge based on scenario\n\
             - Do not provide legal or medical advice\n\
             - Mark limitations clearly\n\
             \n\
             Respond ONLY with valid JSON matching this structure:\n\
             {{\n\
               \"summary\": \"string\",\n\
               \"keyFactors\": [\"string\", \"string\"],\n\
               \"scenarios\": [\n\
                 {{\n\
                   \"name\": \"Bull\",\n\
                   \"prob\": 0.25,\n\
                   \"narrative\": \"string\",\n\
                   \"priceTarget\": 120,\n\
                   \"pricePath\": [{{\"date\": \"2025-01-20\", \"price\": 100}}]\n\
                 }}\n\
               ],\n\
               \"confidence\": 0.78\n\
             }}",
            title = event.title,
            ty = event.event_type.as_str(),
            date = event.date_utc.date_naive(),
        )
    }

    fn response_text(res: &CreateChatCompletionResponse) -> Option<&str> {
        res.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

#[async_trait::async_trait]
impl AnalysisGenerator for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate_analysis(&self, input: GenerateInput) -> Result<AnalysisDraft, LlmError> {
        let req = CreateChatCompletionRequest {
            model: self.model.clone(),
            max_completion_tokens: self.max_completion_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            messages: vec![
                Message {
                    role: "system",
                    content: Self::system_prompt().to_string(),
                },
                Message {
                    role: "user",
                    content: Self::user_prompt(&input),
                },
            ],
        };

        let res = self.create_chat_completion(req).await?;

        let Some(text) = Self::response_text(&res) else {
            return Err(LlmError::InvalidPayload {
                provider: Provider::OpenAi,
                detail: "response contained no message content".to_string(),
                raw_output: None,
            });
        };

        json::parse_analysis(text, input.event.date_utc.date_naive()).map_err(|e| {
            LlmError::InvalidPayload {
                provider: Provider::OpenAi,
                detail: format!("{e:#}"),
                raw_output: Some(text.to_string()),
            }
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateChatCompletionRequest {
    model: String,
    max_completion_tokens: u32,
    response_format: ResponseFormat,
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
