use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{CompletionClient, Tuning};
use crate::errors::{GatewayError, GatewayResult};

/// OpenAI chat completions; the prompt goes out as a single user message.
pub struct OpenAIProvider {
    model: String,
    api_key: String,
    api_base: String,
    tuning: Tuning,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(model: String, api_key: String, api_base: Option<String>, tuning: Tuning, client: Client) -> Self {
        Self {
            model,
            api_key,
            api_base: api_base.unwrap_or_else(|| "https://api.openai.com".into()),
            tuning,
            client,
        }
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

/// First choice's text, if the body is a chat completion at all.
fn first_choice(text: &str) -> Option<String> {
    let parsed: ChatResponse = serde_json::from_str(text).ok()?;
    let choice = parsed.choices.into_iter().next()?;
    Some(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl CompletionClient for OpenAIProvider {
    async fn complete(&self, prompt: &str) -> GatewayResult<String> {
        let url = format!("{}/v1/chat/completions", self.api_base.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "max_tokens": self.tuning.max_tokens,
            "temperature": self.tuning.temperature,
        });

        tracing::debug!(%url, model = %self.model, "openai request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::transport(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| GatewayError::transport(e.to_string()))?;
        tracing::debug!(%status, bytes = text.len(), "openai response");

        if !status.is_success() {
            return Err(GatewayError::transport(format!("OpenAI API error ({status}): {text}")));
        }

        first_choice(&text).ok_or_else(|| GatewayError::unparsable_body(text))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"code\":\"x\"}"}},
                                  {"message":{"content":"second"}}]}"#;
        assert_eq!(first_choice(body).as_deref(), Some("{\"code\":\"x\"}"));
    }

    #[test]
    fn empty_choices_is_not_a_completion() {
        assert!(first_choice(r#"{"choices":[]}"#).is_none());
        assert!(first_choice("<html>bad gateway</html>").is_none());
    }

    #[test]
    fn null_content_reads_as_empty() {
        assert_eq!(first_choice(r#"{"choices":[{"message":{"content":null}}]}"#).as_deref(), Some(""));
    }
}
