//! Tier-2 classifier over an OpenAI-compatible chat completions endpoint.
//!
//! Failure mapping:
//!
//! | Condition                        | Classifier error       |
//! |----------------------------------|------------------------|
//! | client-side timeout, HTTP 408    | transient: timeout     |
//! | HTTP 429                         | transient: rate limit  |
//! | HTTP 5xx, connect/send failures  | transient: transport   |
//! | HTTP 401/403/404, other 4xx      | permanent              |
//! | answer not in the JSON contract  | permanent              |

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use sift_engine::{
    AiClassifier, ClassifierError, ClassifierRequest, ClassifierResponse, Disposition,
};
use thiserror::Error;
use tracing::debug;

use crate::settings::ClassifierEndpoint;

const SYSTEM_PROMPT: &str = "You triage email. Given a sender domain, subject and snippet, \
answer with a single JSON object: {\"disposition\": \"KEEP\" | \"REVIEW\" | \"ARCHIVE\" | \
\"TRASH\", \"confidence\": <number between 0 and 1>, \"rationale\": <one short sentence>}. \
Prefer KEEP when the message could be personal, transactional or time-sensitive.";

/// Why a completion could not be read as a classification.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion response is not valid JSON: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("completion response has no message content")]
    Empty,

    #[error("model answer is not the expected JSON object: {0}")]
    Answer(#[source] serde_json::Error),

    #[error("model answered with unknown disposition {0:?}")]
    UnknownDisposition(String),
}

#[derive(Debug, Deserialize)]
struct CompletionEnvelope {
    #[serde(default)]
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

#[derive(Debug, Deserialize)]
struct ModelAnswer {
    disposition: String,
    confidence: f64,
    #[serde(default)]
    rationale: String,
}

pub struct OpenAiClassifier {
    client: reqwest::Client,
    endpoint: ClassifierEndpoint,
}

impl OpenAiClassifier {
    pub fn new(endpoint: ClassifierEndpoint) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(endpoint.timeout)
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &ClassifierEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl AiClassifier for OpenAiClassifier {
    fn name(&self) -> String {
        format!("openai-compatible:{}", self.endpoint.model)
    }

    async fn classify(
        &self,
        request: &ClassifierRequest,
    ) -> Result<ClassifierResponse, ClassifierError> {
        let mut http = self
            .client
            .post(self.endpoint.completions_url())
            .json(&completion_body(&self.endpoint.model, request));
        if let Some(key) = &self.endpoint.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await.map_err(|e| map_transport_error(&e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| map_transport_error(&e))?;
        debug!(%status, bytes = body.len(), "Classifier responded");

        if !status.is_success() {
            return Err(map_status(status, &body));
        }
        parse_completion(&body).map_err(|e| ClassifierError::permanent(e.to_string()))
    }
}

/// Chat completions request body for one minimized item.
pub fn completion_body(model: &str, request: &ClassifierRequest) -> serde_json::Value {
    let user = format!(
        "Sender domain: {}\nSubject: {}\nSnippet: {}",
        request.sender_domain, request.subject, request.snippet
    );
    json!({
        "model": model,
        "temperature": 0,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": user },
        ],
    })
}

/// Map a non-success HTTP status to a classifier error.
pub fn map_status(status: StatusCode, body: &str) -> ClassifierError {
    let detail = format!("HTTP {}: {}", status.as_u16(), snippet_of(body));
    match status {
        StatusCode::TOO_MANY_REQUESTS => ClassifierError::rate_limited(detail),
        StatusCode::REQUEST_TIMEOUT => ClassifierError::timeout(detail),
        s if s.is_server_error() => ClassifierError::transport(detail),
        _ => ClassifierError::permanent(detail),
    }
}

fn map_transport_error(err: &reqwest::Error) -> ClassifierError {
    if err.is_timeout() {
        ClassifierError::timeout(err.to_string())
    } else if err.is_builder() {
        ClassifierError::permanent(err.to_string())
    } else {
        ClassifierError::transport(err.to_string())
    }
}

/// Read the model's JSON answer out of a chat completions response.
pub fn parse_completion(body: &str) -> Result<ClassifierResponse, CompletionError> {
    let envelope: CompletionEnvelope =
        serde_json::from_str(body).map_err(CompletionError::Envelope)?;
    let content = envelope
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(CompletionError::Empty)?;

    let answer: ModelAnswer =
        serde_json::from_str(strip_code_fence(&content)).map_err(CompletionError::Answer)?;
    let disposition = Disposition::from_hint(&answer.disposition)
        .ok_or_else(|| CompletionError::UnknownDisposition(answer.disposition.clone()))?;

    Ok(ClassifierResponse {
        disposition,
        confidence: answer.confidence,
        rationale: answer.rationale,
        cost: None,
    })
}

/// Models sometimes wrap JSON in a ```json fence.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn snippet_of(body: &str) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(200) {
        Some((idx, _)) => format!("{}…", &flat[..idx]),
        None => flat,
    }
}
