pub mod llm;
pub mod prompt;
pub mod schema;

pub use llm::{ChatMessage, ChatModel, HttpChatClient, RawResponse};
pub use prompt::{FewShotExample, PromptTemplate, TwoStageTemplates};
pub use schema::{Entity, OntologyTriplet, SimpleTriplet};

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why an extraction attempt failed. `Inference` means the model call
/// itself failed; `Parse` means the call succeeded but the content could
/// not be turned into valid triplets (schema failures included), so the
/// raw output is kept for audit.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtractionError {
    #[serde(rename = "InferenceError")]
    #[error("model call failed: {message}")]
    Inference { message: String },
    #[serde(rename = "ParseError", rename_all = "camelCase")]
    #[error("could not parse model response: {message}")]
    Parse {
        message: String,
        raw_response: RawResponse,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSuccess<T> {
    pub triplets: Vec<T>,
    pub raw_response: RawResponse,
}

/// Every extraction entry point resolves to exactly one of these; nothing
/// is thrown past this boundary.
pub type ExtractionOutcome<T> = Result<ExtractionSuccess<T>, ExtractionError>;

/// Strip a reasoning preamble and Markdown fencing from a model response,
/// leaving the JSON payload.
pub fn clean_response(raw: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_-]*").unwrap());

    // Models with visible reasoning prefix the payload with a think block.
    let body = match raw.rsplit_once("</think>") {
        Some((_, rest)) => rest,
        None => raw,
    };

    let without_fences = fence.replace_all(body, "");
    without_fences
        .trim_matches(&['`', '\n', '\r', ' '][..])
        .to_string()
}

pub struct Extractor<M> {
    model: M,
    max_attempts: usize,
}

impl<M: ChatModel> Extractor<M> {
    pub fn new(model: M, max_attempts: usize) -> Self {
        Self {
            model,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run a single model call and parse/validate the response. Never
    /// retries; this is the unit the batch driver loops over.
    pub async fn extract_once<T: DeserializeOwned>(
        &self,
        template: &PromptTemplate,
        text: &str,
    ) -> ExtractionOutcome<T> {
        let messages = template.build_messages(text);
        self.attempt(&messages).await
    }

    /// Run up to `max_attempts` identical calls, stopping at the first
    /// success. No backoff between attempts. On exhaustion the last
    /// attempt's error is returned.
    pub async fn extract<T: DeserializeOwned>(
        &self,
        template: &PromptTemplate,
        text: &str,
    ) -> ExtractionOutcome<T> {
        let messages = template.build_messages(text);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(&messages).await {
                Ok(success) => {
                    if attempt > 1 {
                        info!(attempts = attempt, "extraction succeeded after retries");
                    }
                    return Ok(success);
                }
                Err(err) if attempt >= self.max_attempts => return Err(err),
                Err(err) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "extraction attempt failed, retrying"
                    );
                }
            }
        }
    }

    /// Two-stage strategy: stage 1 extracts an entity inventory, stage 2
    /// extracts triplets over the inventory plus the original text. Each
    /// stage runs its own bounded retry; a stage-1 failure aborts before
    /// stage 2 is ever called.
    pub async fn extract_two_stage(
        &self,
        stages: &TwoStageTemplates,
        text: &str,
    ) -> ExtractionOutcome<OntologyTriplet> {
        let entities: ExtractionSuccess<Entity> = self.extract(&stages.stage1, text).await?;
        let stage2_input = prompt::build_stage2_input(&entities.triplets, text);
        self.extract(&stages.stage2, &stage2_input).await
    }

    async fn attempt<T: DeserializeOwned>(&self, messages: &[ChatMessage]) -> ExtractionOutcome<T> {
        let raw = match self.model.complete(messages).await {
            Ok(raw) => raw,
            Err(err) => {
                return Err(ExtractionError::Inference {
                    message: err.to_string(),
                });
            }
        };

        debug!(content = %raw.content, "raw model response");

        let cleaned = clean_response(&raw.content);
        match serde_json::from_str::<Vec<T>>(&cleaned) {
            Ok(triplets) => Ok(ExtractionSuccess {
                triplets,
                raw_response: raw,
            }),
            Err(err) => Err(ExtractionError::Parse {
                message: err.to_string(),
                raw_response: raw,
            }),
        }
    }
}
