//! Text generation backends.
//!
//! - **[`DisabledGenerator`]** fails every call; used when `generation.provider = "disabled"`.
//! - **[`ChatCompletionsGenerator`]** calls an OpenAI-compatible
//!   `POST {base}/chat/completions` endpoint. DashScope's compatible mode and
//!   OpenAI both speak this protocol.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use title_genie_core::error::ConfigError;
use title_genie_core::generate::TextGenerator;

use crate::config::GenerationConfig;

pub const DASHSCOPE_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Build the generator named by `config.provider`.
///
/// A missing API key is a configuration error, reported before any row runs.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn TextGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "dashscope" | "openai" => Ok(Box::new(ChatCompletionsGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

// ============ Disabled ============

pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("Generation provider is disabled")
    }
}

// ============ Chat completions ============

pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let key_env = config.key_env();
        let api_key = match std::env::var(key_env) {
            Ok(k) if !k.trim().is_empty() => k,
            _ => {
                return Err(ConfigError::MissingCredentials(format!(
                    "{} environment variable not set",
                    key_env
                ))
                .into())
            }
        };

        let base = match (&config.url, config.provider.as_str()) {
            (Some(url), _) => url.as_str(),
            (None, "openai") => OPENAI_BASE_URL,
            (None, _) => DASHSCOPE_BASE_URL,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, delay_secs = delay.as_secs(), "retrying generation");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!("API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Generation failed after retries")))
    }
}

/// Extract `choices[0].message.content`.
fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "1. Title" } },
                { "message": { "role": "assistant", "content": "ignored" } }
            ]
        });
        assert_eq!(parse_completion(&json).unwrap(), "1. Title");
        assert!(parse_completion(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[tokio::test]
    async fn disabled_generator_always_fails() {
        let g = DisabledGenerator;
        assert!(g.generate("anything").await.is_err());
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let config = GenerationConfig {
            provider: "openai".into(),
            api_key_env: Some("GENIE_TEST_KEY_THAT_IS_NEVER_SET".into()),
            ..GenerationConfig::default()
        };
        let err = match create_generator(&config) {
            Ok(_) => panic!("expected missing credentials"),
            Err(e) => e,
        };
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingCredentials(_))
        ));
    }
}
