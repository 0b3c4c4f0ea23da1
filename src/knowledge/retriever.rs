//! 기사 검색기 - 벡터 검색 + 답변 생성
//!
//! 질문을 임베딩하여 청크 벡터 인덱스에서 유사 청크를 찾고,
//! 검색된 컨텍스트만으로 답하도록 채팅 모델에 요청합니다.

use anyhow::{Context, Result};

use crate::embedding::EmbeddingProvider;
use crate::llm::ChatModel;

use super::graph::{ArticleGraph, RetrievedChunk};

/// 기본 검색 결과 수
pub const DEFAULT_TOP_K: usize = 10;

/// 검색 기반 답변
#[derive(Debug, Clone)]
pub struct Answer {
    pub question: String,
    pub output: String,
    pub context: Vec<RetrievedChunk>,
}

impl Answer {
    /// 출처 기사 (title, url), 순위 순 중복 제거
    pub fn sources(&self) -> Vec<(String, String)> {
        let mut seen = Vec::new();
        for chunk in &self.context {
            let source = (
                chunk.title.clone().unwrap_or_else(|| chunk.article_id.clone()),
                chunk.url.clone().unwrap_or_default(),
            );
            if !seen.contains(&source) {
                seen.push(source);
            }
        }
        seen
    }
}

/// 기사 검색기
pub struct ArticleRetriever<'a> {
    graph: &'a dyn ArticleGraph,
    embedder: &'a dyn EmbeddingProvider,
    chat: &'a dyn ChatModel,
}

impl<'a> ArticleRetriever<'a> {
    pub fn new(
        graph: &'a dyn ArticleGraph,
        embedder: &'a dyn EmbeddingProvider,
        chat: &'a dyn ChatModel,
    ) -> Self {
        Self {
            graph,
            embedder,
            chat,
        }
    }

    /// 유사 청크 검색
    pub async fn retrieve(
        &self,
        question: &str,
        limit: usize,
        min_year: Option<i32>,
    ) -> Result<Vec<RetrievedChunk>> {
        let embedding = self
            .embedder
            .embed(question)
            .await
            .context("Failed to embed question")?;

        let chunks = self
            .graph
            .search_chunks(&embedding, limit, min_year)
            .await
            .context("Vector search failed")?;

        tracing::debug!("Retrieved {} chunks for question", chunks.len());
        Ok(chunks)
    }

    /// 검색 + 답변 생성
    pub async fn ask(&self, question: &str, limit: usize, min_year: Option<i32>) -> Result<Answer> {
        let context = self.retrieve(question, limit, min_year).await?;
        let prompt = build_prompt(question, &context);

        let output = self
            .chat
            .complete(&prompt)
            .await
            .with_context(|| format!("Chat model {} failed", self.chat.name()))?;

        Ok(Answer {
            question: question.to_string(),
            output,
            context,
        })
    }
}

/// 답변 프롬프트 구성
///
/// 각 청크는 제목/URL/연도와 함께 `<context>` 블록에 들어갑니다.
pub fn build_prompt(question: &str, context: &[RetrievedChunk]) -> String {
    let mut blocks = Vec::with_capacity(context.len());
    for chunk in context {
        let mut header = format!(
            "Title: {}",
            chunk.title.as_deref().unwrap_or(&chunk.article_id)
        );
        if let Some(year) = chunk.year {
            header.push_str(&format!("\nYear: {}", year));
        }
        if let Some(url) = &chunk.url {
            header.push_str(&format!("\nURL: {}", url));
        }
        blocks.push(format!("{}\n{}", header, chunk.text));
    }

    format!(
        "Your job is to use the articles to answer questions related to the text in the articles. \
         Use the following context to answer questions. Be as detailed as possible, but don't make up \
         any information that's not from the context. If you don't know an answer, say you don't know. \
         Prefer more recent articles when more than one article gives conflicting information.\n\n\
         <context>\n{}\n</context>\n\n\
         Question: {}\n",
        blocks.join("\n\n---\n\n"),
        question
    )
}

// ============================================================================
// Tests
// ============================================================================
