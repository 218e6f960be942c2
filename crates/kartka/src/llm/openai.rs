//! OpenAI-compatible chat completions client (vLLM, llama.cpp server, OpenAI).

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{KartkaError, Result};

use super::provider::{ChatRequest, ModelIdentity, VisionModel};

/// Vision model reached over an OpenAI-compatible `/v1/chat/completions` API.
pub struct OpenAICompatibleModel {
    client: Client,
    config: ModelConfig,
}

impl OpenAICompatibleModel {
    /// Create a client for the configured endpoint.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KartkaError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Build headers for API requests.
    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .map_err(|e| KartkaError::Config(format!("Invalid API key: {}", e)))?,
        );
        Ok(headers)
    }
}

impl VisionModel for OpenAICompatibleModel {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        let _span = tracing::info_span!(
            "model_call",
            model = %self.config.model,
            max_tokens = request.max_tokens,
        )
        .entered();
        let start = Instant::now();

        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": request.max_tokens,
            "messages": request.messages,
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    KartkaError::Http(format!(
                        "Failed to connect to model endpoint '{}': {}",
                        self.config.endpoint, e
                    ))
                } else {
                    KartkaError::Http(format!("Model request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(KartkaError::Http(format!(
                "Model endpoint error ({}): {}",
                status, error_text
            )));
        }

        let api_response: CompletionResponse = response
            .json()
            .map_err(|e| KartkaError::Model(format!("Failed to parse API response: {}", e)))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| KartkaError::Model("No choices in completion response".to_string()))?;

        debug!(
            elapsed_ms = %start.elapsed().as_millis(),
            response_len = content.len(),
            "model call finished"
        );
        Ok(content)
    }

    fn identity(&self) -> ModelIdentity {
        ModelIdentity {
            endpoint: self.config.endpoint.clone(),
            model: self.config.model.clone(),
        }
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

/// Chat completions response structure.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}
