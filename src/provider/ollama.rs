use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionClient, Tuning};
use crate::errors::{GatewayError, GatewayResult};

pub struct Ollama {
    pub model: String,
    pub url: String,
    pub tuning: Tuning,
    pub http: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: MsgOut,
}

#[derive(Deserialize)]
struct MsgOut {
    content: String,
}

#[async_trait]
impl CompletionClient for Ollama {
    async fn complete(&self, prompt: &str) -> GatewayResult<String> {
        let url = format!("{}/api/chat", self.url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.model,
            messages: vec![Msg { role: "user", content: prompt }],
            stream: false,
            options: OllamaOptions {
                temperature: self.tuning.temperature,
                num_predict: self.tuning.max_tokens,
            },
        };

        tracing::debug!(%url, model = %self.model, "ollama request");

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::transport(format!("ollama request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError::transport(format!("ollama read body failed: {e}")))?;

        if !status.is_success() {
            return Err(GatewayError::transport(format!("Ollama error ({status}): {text}")));
        }

        match serde_json::from_str::<ChatResponse>(&text) {
            Ok(c) => Ok(c.message.content),
            Err(_) => Err(GatewayError::unparsable_body(text)),
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_disables_streaming() {
        let body = ChatRequest {
            model: "llama3",
            messages: vec![Msg { role: "user", content: "hi" }],
            stream: false,
            options: OllamaOptions { temperature: 0.5, num_predict: 64 },
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["stream"], false);
        assert_eq!(v["options"]["num_predict"], 64);
        assert_eq!(v["messages"][0]["content"], "hi");
    }

    #[test]
    fn reply_content_is_read() {
        let r: ChatResponse = serde_json::from_str(r#"{"message":{"role":"assistant","content":"ok"}}"#).unwrap();
        assert_eq!(r.message.content, "ok");
    }
}
