//! LLM 모듈 - OpenAI 호환 Chat Completions
//!
//! 검색된 청크를 바탕으로 답변을 생성하는 채팅 모델입니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;
use crate::embedding::{backoff_for, ApiError, INITIAL_BACKOFF};

/// 429/5xx/전송 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;

/// 채팅 모델 트레이트
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 단일 사용자 프롬프트에 대한 응답
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

/// OpenAI Chat Completions 구현체
///
/// temperature 0으로 고정하여 결정적인 답변을 유도합니다.
#[derive(Debug)]
pub struct OpenAiChat {
    api_key: String,
    endpoint: String,
    model: String,
    initial_backoff: Duration,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        anyhow::ensure!(!config.api_key.trim().is_empty(), "missing OpenAI API key");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.chat_model.clone(),
            initial_backoff: INITIAL_BACKOFF,
            client,
        })
    }

    #[cfg(test)]
    fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }
}

/// source: https://platform.openai.com/docs/api-reference/chat/create
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

fn first_content(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("Empty response from chat model"))
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            let response = match self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send chat request: {}", e));
                    if attempt < MAX_RETRIES {
                        let backoff = backoff_for(self.initial_backoff, attempt);
                        tracing::warn!(
                            "Chat request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let parsed: ChatResponse =
                    serde_json::from_str(&body).context("Failed to parse chat response")?;
                return first_content(parsed);
            }

            if status.as_u16() == 429 || status.is_server_error() {
                last_error = Some(anyhow::anyhow!("Chat model error ({})", status));
                if attempt < MAX_RETRIES {
                    let backoff = backoff_for(self.initial_backoff, attempt);
                    tracing::warn!(
                        "Chat model returned {}, backing off {:?} (attempt {}/{})",
                        status,
                        backoff,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                    anyhow::bail!("OpenAI API error ({}): {}", status, error.error.message);
                }
                anyhow::bail!("OpenAI API error ({}): {}", status, body);
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("Chat completion failed after {} retries", MAX_RETRIES)
        }))
    }

    fn name(&self) -> &str {
        &self.model
    }
}
