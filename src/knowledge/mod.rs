//! Knowledge 모듈 - 기사 그래프 RAG
//!
//! - Dataset: 기사 CSV 로딩
//! - Chunker: 재귀 구분자 기반 텍스트 분할
//! - Graph: 그래프 저장소 트레이트 (Neo4j 구현)
//! - Pipeline: 증분 ETL / 벡터 인덱싱
//! - Retriever: 벡터 검색 + 답변 생성

mod chunker;
mod dataset;
mod graph;
mod neo4j;
mod pipeline;
mod retriever;

// Re-exports
pub use chunker::{
    chunk_articles, chunk_id, split_text, ArticleChunk, Chunker, RecursiveChunker,
    SplitterConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
};
pub use dataset::{load_articles, parse_date, read_articles, Article, REQUIRED_COLUMNS};
pub use graph::{
    looks_like_missing_schema, ArticleGraph, GraphStats, IndexedChunk,
    RetrievedChunk, StoreError, ARTICLE_CHUNK_INDEX, ARTICLE_CHUNK_NODE, ARTICLE_NODE,
    HAS_CHUNK_RELATIONSHIP, PUBLISHED_ON_RELATIONSHIP, YEAR_NODE,
};
pub use neo4j::Neo4jGraph;
pub use pipeline::{ChunkSelection, IndexPipeline, RunReport};
pub use retriever::{build_prompt, Answer, ArticleRetriever, DEFAULT_TOP_K};
