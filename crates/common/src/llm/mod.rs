//! Generation service abstraction
//!
//! Provides:
//! - A single-prompt `Generator` trait used for flagging, rewriting,
//!   re-ranking and answer synthesis
//! - A client for OpenAI-compatible chat completion endpoints
//! - A scriptable mock generator for tests

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Text generation from a single prompt
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for the prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints
pub struct ChatCompletionGenerator {
    config: LlmConfig,
    client: reqwest::Client,
}

impl ChatCompletionGenerator {
    /// Create a new generator
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(250))
            .with_max_interval(Duration::from_secs(4))
            .with_max_elapsed_time(Some(timeout * (self.config.max_retries + 1)))
            .build()
    }

    async fn call_llm(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        };

        let mut builder = self.client.post(&self.config.endpoint).json(&request);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::GenerationTimeout {
                    timeout_ms: self.config.timeout_secs * 1000,
                }
            } else if e.is_connect() {
                AppError::ServiceUnavailable {
                    message: format!("Generation endpoint unreachable: {}", e),
                }
            } else {
                AppError::GenerationError {
                    message: format!("LLM API request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(AppError::ServiceUnavailable {
                    message: format!("LLM API error {}: {}", status, body),
                });
            }
            return Err(AppError::GenerationError {
                message: format!("LLM API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            AppError::GenerationError {
                message: format!("Failed to parse LLM response: {}", e),
            }
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::GenerationError {
                message: "Empty response from LLM".to_string(),
            })
    }
}

#[async_trait]
impl Generator for ChatCompletionGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0u32;
        let start = Instant::now();

        let outcome = retry(self.backoff_policy(), || {
            attempt += 1;
            let current = attempt;
            async move {
                self.call_llm(prompt).await.map_err(|e| {
                    if e.is_retryable() && current <= max_retries {
                        tracing::warn!(
                            attempt = current,
                            max_retries = max_retries,
                            error = %e,
                            "Generation request failed, retrying"
                        );
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await;

        crate::metrics::record_generation(
            start.elapsed().as_secs_f64(),
            &self.config.model,
            outcome.is_ok(),
        );
        outcome
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

type Responder = dyn Fn(&str) -> Result<String> + Send + Sync;

/// Scriptable generator for tests.
///
/// Every prompt is recorded; the responder decides the reply.
pub struct MockGenerator {
    responder: Box<Responder>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// Reply through a closure over the prompt
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with the same text
    pub fn constant(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(move |_| Ok(reply.clone()))
    }

    /// Always fail as an unreachable service would
    pub fn unavailable() -> Self {
        Self::new(|_| {
            Err(AppError::ServiceUnavailable {
                message: "mock generator offline".to_string(),
            })
        })
    }

    /// Sleep before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of prompts received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in arrival order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(prompt)
    }

    fn model_name(&self) -> &str {
        "mock-generator"
    }
}

/// Create a generator based on configuration
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(ChatCompletionGenerator::new(config.clone())?)),
        other => Err(AppError::Configuration {
            message: format!("Unknown generation provider: {}", other),
        }),
    }
}
