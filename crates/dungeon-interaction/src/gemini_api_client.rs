//! GeminiApiClient - Direct REST API client for Gemini.
//!
//! Lists the model catalog and issues contract-bound `generateContent`
//! calls. One client is bound to one API key; the [`ClientHandle`] rebuilds
//! it when the credential changes.
//!
//! [`ClientHandle`]: crate::client_handle::ClientHandle

use std::time::Duration;

use async_trait::async_trait;
use dungeon_core::catalog::{CatalogSource, RawModel};
use dungeon_core::config::{DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DungeonConfig};
use dungeon_core::error::{DungeonError, Result};
use dungeon_core::generation::{ContentGenerator, GenerationRequest};
use dungeon_core::state::Turn;
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const USER_AGENT: &str = concat!("dungeon/", env!("CARGO_PKG_VERSION"));

/// Client for the Gemini HTTP API, bound to one API key.
#[derive(Clone)]
pub struct GeminiApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiApiClient {
    /// Creates a client against the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(
            api_key,
            DEFAULT_API_BASE_URL,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Creates a client against `base_url` (a mock server in tests).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(
            api_key,
            base_url,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Creates a client using the endpoint and timeout from `config`.
    pub fn from_config(api_key: impl Into<String>, config: &DungeonConfig) -> Result<Self> {
        Self::with_options(api_key, config.api_base_url.clone(), config.request_timeout())
    }

    pub fn with_options(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DungeonError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether this client was built for `api_key`.
    pub fn is_bound_to(&self, api_key: &str) -> bool {
        self.api_key == api_key
    }

    async fn send_generate(&self, model: &str, body: &GenerateContentRequest<'_>) -> Result<String> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|err| {
            DungeonError::api(None, format!("Failed to parse Gemini response: {err}"), false)
        })?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl CatalogSource for GeminiApiClient {
    async fn list_models(&self) -> Result<Vec<RawModel>> {
        let url = format!("{}/models", self.base_url);
        tracing::debug!("[Gemini] Listing models");

        let response = self
            .client
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let page: ListModelsResponse = response.json().await.map_err(|err| {
            DungeonError::api(None, format!("Failed to parse Gemini model list: {err}"), false)
        })?;

        tracing::debug!("[Gemini] Catalog page has {} models", page.models.len());
        Ok(page.models)
    }
}

#[async_trait]
impl ContentGenerator for GeminiApiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        if request.model.trim().is_empty() {
            return Err(DungeonError::invalid_input("No model selected"));
        }

        let system_instruction = (!request.system_instruction.trim().is_empty()).then(|| {
            SystemInstruction {
                parts: vec![TextPart {
                    text: &request.system_instruction,
                }],
            }
        });

        let body = GenerateContentRequest {
            contents: &request.history,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type: &request.response_mime_type,
                response_json_schema: &request.response_schema,
            },
        };

        tracing::debug!(
            "[Gemini] generateContent model={} turns={}",
            request.model,
            request.history.len()
        );
        self.send_generate(&request.model, &body).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Turn],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f64,
    response_mime_type: &'a str,
    response_json_schema: &'a Value,
}

#[derive(Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<RawModel>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn request_error(err: reqwest::Error) -> DungeonError {
    DungeonError::api(
        None,
        format!("Gemini API request failed: {err}"),
        err.is_connect() || err.is_timeout(),
    )
}

async fn error_from_response(response: reqwest::Response) -> DungeonError {
    let status = response.status();
    let retry_after = parse_retry_after(response.headers().get("retry-after"));
    let body_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
    map_http_error(status, body_text, retry_after)
}

fn extract_text_response(response: GenerateContentResponse) -> Result<String> {
    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .filter(|text| !text.is_empty())
        .ok_or_else(|| {
            DungeonError::api(
                None,
                "Gemini API returned no text in the response candidates",
                false,
            )
        })
}

fn map_http_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> DungeonError {
    let mut message = serde_json::from_str::<ErrorWrapper>(&body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.clone());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.clone());

    if let Some(delay) = retry_after {
        message.push_str(&format!(" (retry after {}s)", delay.as_secs()));
    }

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    tracing::warn!("[Gemini] HTTP {}: {}", status.as_u16(), message);
    DungeonError::api(Some(status.as_u16()), message, is_retryable)
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
