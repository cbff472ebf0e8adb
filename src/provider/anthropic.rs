use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionClient, Tuning};
use crate::errors::{GatewayError, GatewayResult};

pub struct Anthropic {
    pub model: String,
    pub api_key: String,
    pub api_base: String,
    pub api_version: String,
    pub tuning: Tuning,
    pub http: Client,
}

#[derive(Serialize)]
struct MsgRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Msg<'a>>,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MsgResponse {
    content: Vec<Block>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(default)]
    text: String,
    #[serde(default)]
    r#type: String,
}

fn first_text(body: &str) -> Option<String> {
    let parsed: MsgResponse = serde_json::from_str(body).ok()?;
    parsed
        .content
        .into_iter()
        .find(|b| b.r#type == "text" || !b.text.is_empty())
        .map(|b| b.text)
}

#[async_trait]
impl CompletionClient for Anthropic {
    async fn complete(&self, prompt: &str) -> GatewayResult<String> {
        let url = format!("{}/v1/messages", self.api_base.trim_end_matches('/'));
        let body = MsgRequest {
            model: &self.model,
            max_tokens: self.tuning.max_tokens,
            temperature: self.tuning.temperature,
            messages: vec![Msg { role: "user", content: prompt }],
        };

        tracing::debug!(%url, model = %self.model, "anthropic request");

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::transport(format!("anthropic request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError::transport(format!("anthropic read body failed: {e}")))?;
        tracing::debug!(%status, bytes = text.len(), "anthropic response");

        if !status.is_success() {
            return Err(GatewayError::transport(format!("Anthropic API error ({status}): {text}")));
        }

        first_text(&text).ok_or_else(|| GatewayError::unparsable_body(text))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_text_block() {
        let body = r#"{"content":[{"type":"text","text":"Code: a\nExplanation: b"}]}"#;
        assert_eq!(first_text(body).as_deref(), Some("Code: a\nExplanation: b"));
        assert!(first_text(r#"{"content":[]}"#).is_none());
    }
}
