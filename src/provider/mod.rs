use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::ProviderKind;
use crate::config::{GatewayConfig, Settings};
use crate::errors::{GatewayError, GatewayResult};

pub mod openai;
pub mod anthropic;
pub mod ollama;

/// Sends one prompt, returns the raw text of the first completion.
/// Every failure comes back as `GatewayError::Transport`.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> GatewayResult<String>;

    fn model(&self) -> &str;
}

pub type DynClient = Arc<dyn CompletionClient>;

/// Sampling knobs shared by all backends.
#[derive(Debug, Clone)]
pub struct Tuning {
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Option<Duration>,
}

impl Tuning {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            max_tokens: s.max_tokens,
            temperature: s.temperature,
            timeout: s.timeout_secs.map(Duration::from_secs),
        }
    }
}

fn http_client(timeout: Option<Duration>) -> GatewayResult<reqwest::Client> {
    let mut b = reqwest::Client::builder();
    if let Some(t) = timeout {
        b = b.timeout(t);
    }
    b.build().map_err(|e| GatewayError::transport(e.to_string()))
}

fn credential(configured: &str, env_var: &str) -> Option<String> {
    let k = configured.trim();
    if !k.is_empty() {
        return Some(k.to_string());
    }
    std::env::var(env_var).ok().filter(|v| !v.trim().is_empty())
}

/// Builds the client for a configured model.
pub fn make_client(cfg: &GatewayConfig, model: Option<&str>, settings: &Settings) -> GatewayResult<DynClient> {
    let name = model
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| GatewayError::precondition("Error: No ChatGPT model selected. Please select a model first."))?;
    let entry = cfg.model(name)?;
    let kind = settings.provider.unwrap_or(entry.provider);
    let tuning = Tuning::from_settings(settings);
    let http = http_client(tuning.timeout)?;

    match kind {
        ProviderKind::OpenAI => {
            let key = credential(&entry.key, "OPENAI_API_KEY")
                .ok_or_else(|| GatewayError::precondition("Error: No API key found for the selected model."))?;
            Ok(Arc::new(openai::OpenAIProvider::new(
                name.to_string(),
                key,
                entry.base_url.clone(),
                tuning,
                http,
            )))
        }
        ProviderKind::Anthropic => {
            let key = credential(&entry.key, "ANTHROPIC_API_KEY")
                .ok_or_else(|| GatewayError::precondition("Error: No API key found for the selected model."))?;
            Ok(Arc::new(anthropic::Anthropic {
                model: name.to_string(),
                api_key: key,
                api_base: entry.base_url.clone().unwrap_or_else(|| "https://api.anthropic.com".into()),
                api_version: "2023-06-01".into(),
                tuning,
                http,
            }))
        }
        ProviderKind::Ollama => Ok(Arc::new(ollama::Ollama {
            model: name.to_string(),
            url: entry.base_url.clone().unwrap_or_else(|| "http://localhost:11434".into()),
            tuning,
            http,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelEntry;

    fn cfg_with(name: &str, key: &str, provider: ProviderKind) -> GatewayConfig {
        let mut cfg = GatewayConfig::default();
        cfg.models.insert(
            name.into(),
            ModelEntry { key: key.into(), description: String::new(), provider, base_url: None },
        );
        cfg
    }

    #[test]
    fn no_model_is_a_precondition_error() {
        let err = make_client(&GatewayConfig::default(), None, &Settings::default()).err().unwrap();
        assert!(err.is_precondition());
        assert!(err.to_string().contains("No ChatGPT model selected"));
    }

    #[test]
    fn configured_key_builds_openai_client() {
        let cfg = cfg_with("gpt-4o", "sk-test", ProviderKind::OpenAI);
        let client = make_client(&cfg, Some("gpt-4o"), &Settings::default()).unwrap();
        assert_eq!(client.model(), "gpt-4o");
    }

    #[test]
    fn ollama_needs_no_key() {
        let cfg = cfg_with("llama3", "", ProviderKind::Ollama);
        assert!(make_client(&cfg, Some("llama3"), &Settings::default()).is_ok());
    }

    #[test]
    fn unknown_model_is_rejected() {
        let err = make_client(&GatewayConfig::default(), Some("nope"), &Settings::default()).err().unwrap();
        assert!(err.is_precondition());
    }
}
