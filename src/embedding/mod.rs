//! 임베딩 모듈 - OpenAI 호환 API를 통한 텍스트 벡터화
//!
//! 청크 텍스트와 질문을 벡터로 변환하는 임베딩 프로바이더입니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OpenAiEmbedding::new(&OpenAiConfig::from_env()?)?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding
// ============================================================================

/// 기본 임베딩 모델
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// 요청당 최대 입력 수
const MAX_BATCH_SIZE: usize = 100;
/// 429/5xx 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프
pub(crate) const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// OpenAI 임베딩 구현체
#[derive(Debug)]
pub struct OpenAiEmbedding {
    api_key: String,
    endpoint: String,
    model: String,
    initial_backoff: Duration,
    client: reqwest::Client,
}

impl OpenAiEmbedding {
    /// 설정으로 생성
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        anyhow::ensure!(!config.api_key.trim().is_empty(), "missing OpenAI API key");
        anyhow::ensure!(
            !config.embedding_model.trim().is_empty(),
            "missing embedding model name"
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key: config.api_key.clone(),
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.embedding_model.clone(),
            initial_backoff: INITIAL_BACKOFF,
            client,
        })
    }

    #[cfg(test)]
    fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// 요청 엔드포인트
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 한 번의 API 호출 (재시도 포함)
    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: inputs,
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
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES {
                        let backoff = backoff_for(self.initial_backoff, attempt);
                        tracing::warn!(
                            "Embedding request failed, retrying in {:?} (attempt {}/{})",
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
                let mut parsed: EmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;
                parsed.data.sort_by_key(|entry| entry.index);
                anyhow::ensure!(
                    parsed.data.len() == inputs.len(),
                    "OpenAI returned {} embeddings for {} inputs",
                    parsed.data.len(),
                    inputs.len()
                );
                return Ok(parsed.data.into_iter().map(|e| e.embedding).collect());
            }

            if status.as_u16() == 429 || status.is_server_error() {
                last_error = Some(anyhow::anyhow!("OpenAI embeddings error ({})", status));
                if attempt < MAX_RETRIES {
                    let backoff = backoff_for(self.initial_backoff, attempt);
                    tracing::warn!(
                        "OpenAI returned {}, backing off {:?} (attempt {}/{})",
                        status,
                        backoff,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                // 다른 에러 - 즉시 실패
                if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                    anyhow::bail!("OpenAI API error ({}): {}", status, error.error.message);
                }
                anyhow::bail!("OpenAI API error ({}): {}", status, body);
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }
}

/// 지수 백오프 (initial * 2^attempt)
pub(crate) fn backoff_for(initial: Duration, attempt: u32) -> Duration {
    initial * 2u32.pow(attempt)
}

/// source: https://platform.openai.com/docs/api-reference/embeddings/create
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI 에러 응답
#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    pub(crate) error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub(crate) message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("OpenAI returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(MAX_BATCH_SIZE).enumerate() {
            tracing::debug!(
                "Embedding batch {}/{}",
                i + 1,
                texts.len().div_ceil(MAX_BATCH_SIZE)
            );
            results.extend(self.request(batch).await?);
        }

        Ok(results)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
