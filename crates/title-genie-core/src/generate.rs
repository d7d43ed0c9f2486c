//! The text-generation capability.
//!
//! The pipeline only needs `generate(prompt) -> text`. Transport failures
//! come back as `Err`; the batch orchestrator folds them into the text
//! channel with [`error_text`] so they are filtered like any other
//! malformed output, while the self-correction loop counts them as
//! non-improving attempts.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

/// A text-generation backend (hosted LLM, local model, test double).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier, for logs and summaries.
    fn model_name(&self) -> &str;

    /// Produce a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Encode a generation failure as response text.
pub fn error_text(err: &anyhow::Error) -> String {
    format!("Error: {:#}", err)
}

/// A generator that replays canned responses in order and records prompts.
///
/// Once the script is exhausted every call fails. Intended for tests and
/// offline dry runs.
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn respond(self, text: impl Into<String>) -> Self {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(Ok(text.into()));
        }
        self
    }

    /// Queue a failing call.
    pub fn fail(self, message: impl Into<String>) -> Self {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(Err(message.into()));
        }
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        let next = self
            .responses
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted generator lock poisoned"))?
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => anyhow::bail!("scripted generator has no responses left"),
        }
    }
}
