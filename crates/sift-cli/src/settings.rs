use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sift_engine::EngineConfig;

/// OpenAI-compatible Tier-2 classifier endpoint.
#[derive(Debug, Clone)]
pub struct ClassifierEndpoint {
    /// Base URL up to and including `/v1`.
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Client-side request timeout.
    pub timeout: Duration,
}

impl ClassifierEndpoint {
    /// Read the endpoint from `SIFT_CLASSIFIER_*`. `None` when no URL is set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("SIFT_CLASSIFIER_URL")?.trim().trim_end_matches('/').to_string();
        if url.is_empty() {
            return None;
        }
        let model = lookup("SIFT_CLASSIFIER_MODEL").unwrap_or_else(|| "gpt-4o-mini".into());
        let api_key = lookup("SIFT_CLASSIFIER_API_KEY").filter(|k| !k.trim().is_empty());
        let timeout = lookup("SIFT_CLASSIFIER_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(15));
        Some(Self {
            url,
            model,
            api_key,
            timeout,
        })
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.url)
    }
}

/// Engine config from `path` (or defaults), overlaid with `SIFT_*` and
/// validated.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => EngineConfig::from_env().context("Invalid configuration from environment"),
    }
}

/// Check if the classifier endpoint is reachable (GET /models).
pub async fn check_endpoint(endpoint: &ClassifierEndpoint) -> bool {
    let models_url = format!("{}/models", endpoint.url);
    let mut request = reqwest::Client::new()
        .get(&models_url)
        .timeout(Duration::from_secs(5));
    if let Some(key) = &endpoint.api_key {
        request = request.bearer_auth(key);
    }
    match request.send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}
