//! HTTP extraction service backed by a hosted LLM.

use anyhow::{bail, Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::document::{CollaboratorReply, ExtractionCollaborator, ExtractionRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl Provider {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Some(Provider::Anthropic),
            "openai" => Some(Provider::OpenAI),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub max_tokens: u32,
}

pub struct HttpCollaborator {
    config: LlmConfig,
    client: reqwest::Client,
}

impl HttpCollaborator {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn anthropic_extract(&self, request: ExtractionRequest<'_>) -> Result<CollaboratorReply> {
        #[derive(Serialize)]
        struct Source<'a> {
            #[serde(rename = "type")]
            t: &'static str,
            media_type: &'a str,
            data: String,
        }

        #[derive(Serialize)]
        #[serde(tag = "type", rename_all = "lowercase")]
        enum Block<'a> {
            Document { source: Source<'a> },
            Text { text: &'a str },
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'static str,
            content: Vec<Block<'a>>,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<Msg<'a>>,
        }

        #[derive(Deserialize)]
        struct Resp {
            content: Vec<ContentBlock>,
        }

        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(rename = "type")]
            t: String,
            text: Option<String>,
        }

        let body = Req {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![Msg {
                role: "user",
                content: vec![
                    Block::Document {
                        source: Source {
                            t: "base64",
                            media_type: request.media_type,
                            data: STANDARD.encode(request.bytes),
                        },
                    },
                    Block::Text { text: request.prompt },
                ],
            }],
        };

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.config.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let resp = self
            .client
            .post(self.endpoint("/v1/messages"))
            .headers(headers)
            .json(&body)
            .send()
            .await
            .context("anthropic request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("anthropic error: {status} {txt}");
        }

        let out: Resp = resp.json().await.context("parse anthropic response")?;
        let mut s = String::new();
        for b in out.content {
            if b.t == "text" {
                if let Some(t) = b.text {
                    s.push_str(&t);
                }
            }
        }
        Ok(CollaboratorReply::Text(s.trim().to_string()))
    }

    async fn openai_extract(&self, request: ExtractionRequest<'_>) -> Result<CollaboratorReply> {
        #[derive(Serialize)]
        struct FilePart<'a> {
            filename: &'a str,
            file_data: String,
        }

        #[derive(Serialize)]
        #[serde(tag = "type", rename_all = "lowercase")]
        enum Part<'a> {
            File { file: FilePart<'a> },
            Text { text: &'a str },
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'static str,
            content: Vec<Part<'a>>,
        }

        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            t: &'static str,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            response_format: ResponseFormat,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }

        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
        }

        let data_url = format!("data:{};base64,{}", request.media_type, STANDARD.encode(request.bytes));
        let body = Req {
            model: &self.config.model,
            messages: vec![Msg {
                role: "user",
                content: vec![
                    Part::File {
                        file: FilePart {
                            filename: request.file_name,
                            file_data: data_url,
                        },
                    },
                    Part::Text { text: request.prompt },
                ],
            }],
            response_format: ResponseFormat { t: "json_object" },
            temperature: 0.0,
        };

        let resp = self
            .client
            .post(self.endpoint("/v1/chat/completions"))
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .context("openai request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("openai error: {status} {txt}");
        }

        let out: Resp = resp.json().await.context("parse openai response")?;
        let content = out
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(CollaboratorReply::Text(content.trim().to_string()))
    }
}

impl ExtractionCollaborator for HttpCollaborator {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<CollaboratorReply> {
        match self.config.provider {
            Provider::Anthropic => self.anthropic_extract(request).await,
            Provider::OpenAI => self.openai_extract(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names() {
        assert_eq!(Provider::parse("Anthropic"), Some(Provider::Anthropic));
        assert_eq!(Provider::parse(" openai "), Some(Provider::OpenAI));
        assert_eq!(Provider::parse("gemini"), None);
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let c = HttpCollaborator::new(LlmConfig {
            provider: Provider::OpenAI,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/".to_string(),
            api_key: "sk-test".to_string(),
            max_tokens: 4096,
        });
        assert_eq!(c.endpoint("/v1/chat/completions"), "https://api.openai.com/v1/chat/completions");
    }
}
