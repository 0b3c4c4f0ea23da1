//! article-graph-rag - 기사 그래프 RAG 파이프라인
//!
//! 기사 CSV를 Neo4j 그래프로 적재하고, 본문 청크를 임베딩하여
//! 벡터 인덱스를 만든 뒤, 질문에 대해 검색 기반 답변을 생성합니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod knowledge;
pub mod llm;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use config::{has_api_key, Neo4jConfig, OpenAiConfig};
pub use embedding::{EmbeddingProvider, OpenAiEmbedding};
pub use knowledge::{
    chunk_articles, load_articles, split_text, Answer, Article, ArticleChunk, ArticleGraph,
    ArticleRetriever, Chunker, IndexPipeline, Neo4jGraph, RecursiveChunker, RetrievedChunk,
    RunReport, SplitterConfig, StoreError,
};
pub use llm::{ChatModel, OpenAiChat};
pub use retry::RetryPolicy;
