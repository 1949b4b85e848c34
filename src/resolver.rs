//! Free text → `IntentMatch`
//!
//! `IntentResolver` ties the pipeline together: shortlist candidates from the
//! index, render the prompt, make one completion call, and decode the reply.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::completion::{Completion, CompletionRequest, HttpCompletion};
use crate::config::ResolverConfig;
use crate::error::{CompletionError, DecodeError, IntentError};
use crate::prompt::build_prompt;
use crate::select::{select_candidates, AnalyzedInput, SelectorConfig};
use crate::spec::SchemaIndex;

/// The endpoint the model picked for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentMatch {
    pub endpoint: String,
    pub method: String,
    /// In `[0, 1]`
    pub confidence: f64,
    pub explanation: String,
}

/// Resolves user requests against one API description.
///
/// Holds no per-query state; `infer_intent` may be called from several
/// threads at once when `C` is `Sync`.
pub struct IntentResolver<C> {
    index: SchemaIndex,
    completion: C,
    selector: SelectorConfig,
    model: String,
    max_tokens: u32,
}

impl IntentResolver<HttpCompletion> {
    /// Load the schema at `schema_path` and connect to the configured provider.
    ///
    /// The schema file is checked before the API key so a bad path is reported
    /// first.
    pub fn from_path(
        schema_path: impl AsRef<Path>,
        config: &ResolverConfig,
    ) -> Result<Self, IntentError> {
        let index = SchemaIndex::load(schema_path)?;
        let completion = HttpCompletion::from_config(config)?;
        Ok(Self::new(index, completion, config))
    }
}

impl<C: Completion> IntentResolver<C> {
    pub fn new(index: SchemaIndex, completion: C, config: &ResolverConfig) -> Self {
        Self {
            index,
            completion,
            selector: SelectorConfig::default(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Replace the keyword extraction settings.
    pub fn with_selector(mut self, selector: SelectorConfig) -> Self {
        self.selector = selector;
        self
    }

    pub fn index(&self) -> &SchemaIndex {
        &self.index
    }

    /// Keywords and shortlist for `text`, without calling the model.
    pub fn analyze<'a>(&'a self, text: &str) -> Result<AnalyzedInput<'a>, IntentError> {
        select_candidates(text, &self.index, &self.selector)
    }

    /// The prompt `infer_intent` would send for `text`.
    pub fn render_prompt(&self, text: &str) -> Result<String, IntentError> {
        let analyzed = self.analyze(text)?;
        Ok(build_prompt(text, &analyzed))
    }

    /// Resolve `text` to a single endpoint.
    pub fn infer_intent(&self, text: &str) -> Result<IntentMatch, IntentError> {
        self.infer_intent_with_cancel(text, &AtomicBool::new(false))
    }

    /// Resolve `text`, giving up with `IntentError::Cancelled` once `cancel`
    /// is set.
    ///
    /// The flag is checked before the model is called, handed to the
    /// completion collaborator, and checked again before the reply is
    /// decoded.
    pub fn infer_intent_with_cancel(
        &self,
        text: &str,
        cancel: &AtomicBool,
    ) -> Result<IntentMatch, IntentError> {
        if text.trim().is_empty() {
            return Err(IntentError::InvalidInput);
        }

        let analyzed = self.analyze(text)?;
        let prompt = build_prompt(text, &analyzed);
        debug!(
            candidates = analyzed.candidates.len(),
            prompt_len = prompt.len(),
            "built prompt"
        );

        let request = CompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            prompt,
        };
        if cancel.load(Ordering::Acquire) {
            return Err(IntentError::Cancelled);
        }
        let raw = self
            .completion
            .complete_cancellable(&request, cancel)
            .map_err(|e| match e {
                CompletionError::Cancelled => IntentError::Cancelled,
                other => IntentError::Completion(other),
            })?;
        if cancel.load(Ordering::Acquire) {
            debug!("discarding completion after cancel");
            return Err(IntentError::Cancelled);
        }

        let matched = decode_response(&raw)
            .inspect_err(|e| warn!(error = %e, "could not decode completion"))?;
        info!(
            endpoint = %matched.endpoint,
            method = %matched.method,
            confidence = matched.confidence,
            "resolved intent"
        );
        Ok(matched)
    }
}

/// Decode a completion into an `IntentMatch`.
///
/// The whole text is tried first. Otherwise each balanced `{...}` object in
/// the text is tried in order and the first that decodes is used, which
/// covers replies wrapped in code fences or prose that mentions path
/// templates like `/users/{id}`.
pub fn decode_response(raw: &str) -> Result<IntentMatch, IntentError> {
    let decode_err = |source: DecodeError| IntentError::ResponseDecode {
        raw: raw.to_string(),
        source,
    };

    let parsed = match serde_json::from_str::<IntentMatch>(raw.trim()) {
        Ok(m) => m,
        Err(whole_err) => {
            let mut first_err = None;
            let mut found = None;
            for obj in embedded_objects(raw) {
                match serde_json::from_str::<IntentMatch>(obj) {
                    Ok(m) => {
                        found = Some(m);
                        break;
                    }
                    Err(e) => {
                        first_err.get_or_insert(e);
                    }
                }
            }
            match found {
                Some(m) => m,
                None => {
                    let err = first_err.unwrap_or(whole_err);
                    return Err(decode_err(DecodeError::Json(err)));
                }
            }
        }
    };

    if !(0.0..=1.0).contains(&parsed.confidence) {
        return Err(decode_err(DecodeError::ConfidenceOutOfRange(
            parsed.confidence,
        )));
    }

    Ok(IntentMatch {
        method: parsed.method.trim().to_uppercase(),
        ..parsed
    })
}

/// Every `{...}` span whose braces balance outside of string literals, by
/// start position.
fn embedded_objects(raw: &str) -> impl Iterator<Item = &str> {
    raw.match_indices('{')
        .filter_map(move |(start, _)| balanced_object(raw, start))
}

fn balanced_object(raw: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (idx, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escape => escape = false,
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + idx]);
                }
            }
            _ => {}
        }
    }
    None
}
