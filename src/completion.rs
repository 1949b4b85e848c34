//! Text-completion collaborator
//!
//! `Completion` is the only seam between the matcher and a language model:
//! a prompt goes in, free text comes out. `HttpCompletion` implements it for
//! the Anthropic Messages API and OpenAI-compatible chat completions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{Provider, ResolverConfig};
use crate::error::{CompletionError, IntentError};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// How often an in-flight HTTP completion checks its cancel flag.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// A single-message completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    /// Sent as the only user-role message
    pub prompt: String,
}

/// Anything that turns a prompt into text.
pub trait Completion: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    /// Like `complete`, but gives up with `CompletionError::Cancelled` once
    /// `cancel` is set.
    ///
    /// The default checks the flag before and after the call. Implementations
    /// that can abandon a call in flight should override it.
    fn complete_cancellable(
        &self,
        request: &CompletionRequest,
        cancel: &AtomicBool,
    ) -> Result<String, CompletionError> {
        if cancel.load(Ordering::Acquire) {
            return Err(CompletionError::Cancelled);
        }
        let text = self.complete(request)?;
        if cancel.load(Ordering::Acquire) {
            return Err(CompletionError::Cancelled);
        }
        Ok(text)
    }
}

impl<T: Completion + ?Sized> Completion for &T {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        (**self).complete(request)
    }

    fn complete_cancellable(
        &self,
        request: &CompletionRequest,
        cancel: &AtomicBool,
    ) -> Result<String, CompletionError> {
        (**self).complete_cancellable(request, cancel)
    }
}

impl<T: Completion + ?Sized> Completion for Box<T> {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        (**self).complete(request)
    }

    fn complete_cancellable(
        &self,
        request: &CompletionRequest,
        cancel: &AtomicBool,
    ) -> Result<String, CompletionError> {
        (**self).complete_cancellable(request, cancel)
    }
}

impl<T: Completion + ?Sized> Completion for Arc<T> {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        (**self).complete(request)
    }

    fn complete_cancellable(
        &self,
        request: &CompletionRequest,
        cancel: &AtomicBool,
    ) -> Result<String, CompletionError> {
        (**self).complete_cancellable(request, cancel)
    }
}

/// Blocking HTTP client for a hosted completion API.
#[derive(Clone)]
pub struct HttpCompletion {
    client: Client,
    provider: Provider,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for HttpCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompletion")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpCompletion {
    /// Build a client for `config.provider`. Fails when no API key is set.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, IntentError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IntentError::Completion(CompletionError::ClientBuild(e)))?;

        Ok(Self {
            client,
            provider: config.provider,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.trim().to_string(),
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    fn anthropic(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": [
                { "role": "user", "content": request.prompt }
            ]
        });

        let req = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let data = send_request(req, &url)?;

        anthropic_output_text(&data).ok_or(CompletionError::EmptyResponse)
    }

    fn openai(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": [
                { "role": "user", "content": request.prompt }
            ]
        });

        let req = self.client.post(&url).bearer_auth(&self.api_key).json(&body);
        let data = send_request(req, &url)?;

        let content = data
            .pointer("/choices/0/message/content")
            .ok_or_else(|| {
                CompletionError::InvalidResponse("missing choices[0].message.content".to_string())
            })?
            .as_str()
            .unwrap_or("")
            .trim();
        if content.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(content.to_string())
    }
}

impl Completion for HttpCompletion {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        debug!(
            provider = %self.provider,
            model = %request.model,
            max_tokens = request.max_tokens,
            prompt_len = request.prompt.len(),
            "requesting completion"
        );
        match self.provider {
            Provider::Anthropic => self.anthropic(request),
            Provider::OpenAi => self.openai(request),
        }
    }

    /// Runs the request on a worker thread and stops waiting for it once
    /// `cancel` is set. The abandoned request still ends at the client timeout.
    fn complete_cancellable(
        &self,
        request: &CompletionRequest,
        cancel: &AtomicBool,
    ) -> Result<String, CompletionError> {
        if cancel.load(Ordering::Acquire) {
            return Err(CompletionError::Cancelled);
        }

        let (tx, rx) = mpsc::channel();
        let worker = self.clone();
        let request = request.clone();
        thread::spawn(move || {
            // The receiver is gone when the caller cancelled.
            let _ = tx.send(worker.complete(&request));
        });

        loop {
            match rx.recv_timeout(CANCEL_POLL) {
                Ok(result) => return result,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if cancel.load(Ordering::Acquire) {
                        debug!(provider = %self.provider, "completion cancelled in flight");
                        return Err(CompletionError::Cancelled);
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(CompletionError::Other(
                        "completion worker exited without a reply".to_string(),
                    ))
                }
            }
        }
    }
}

fn send_request(
    req: reqwest::blocking::RequestBuilder,
    url: &str,
) -> Result<Value, CompletionError> {
    let resp = req.send().map_err(|source| CompletionError::Request {
        url: url.to_string(),
        source,
    })?;
    let status = resp.status();
    let body = resp.text().map_err(CompletionError::ResponseRead)?;

    if !status.is_success() {
        return Err(CompletionError::Http { status, body });
    }

    serde_json::from_str(&body)
        .map_err(|e| CompletionError::InvalidResponse(format!("body is not JSON: {e}")))
}

/// Concatenate the `text` blocks of a Messages API response.
fn anthropic_output_text(data: &Value) -> Option<String> {
    let mut out = String::new();
    for block in data.get("content")?.as_array()? {
        if block.get("type").and_then(|t| t.as_str()) != Some("text") {
            continue;
        }
        if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(text);
        }
    }
    let trimmed = out.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
