//! Article Graph - 그래프 저장소 트레이트 및 타입
//!
//! ETL 파이프라인과 검색기가 사용하는 그래프 저장소의 공통 인터페이스입니다.
//! 실제 구현은 Neo4j (`super::neo4j::Neo4jGraph`) 입니다.

use std::collections::HashSet;

use async_trait::async_trait;

use super::chunker::ArticleChunk;
use super::dataset::Article;

/// 기사 노드 라벨
pub const ARTICLE_NODE: &str = "Article";
/// 기사 청크 노드 라벨
pub const ARTICLE_CHUNK_NODE: &str = "ArticleChunk";
/// 연도 노드 라벨
pub const YEAR_NODE: &str = "Year";
/// Article -> ArticleChunk
pub const HAS_CHUNK_RELATIONSHIP: &str = "HAS_CHUNK";
/// Article -> Year
pub const PUBLISHED_ON_RELATIONSHIP: &str = "PUBLISHED_ON";
/// 청크 벡터 인덱스 이름
pub const ARTICLE_CHUNK_INDEX: &str = "article_chunk_index";

// ============================================================================
// Errors
// ============================================================================

/// 그래프 저장소 에러
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Graph store connection failed: {0}")]
    Connection(String),

    #[error("Graph store authentication failed: {0}")]
    Authentication(String),

    /// 라벨, 속성, 인덱스가 아직 존재하지 않음 (빈 저장소)
    #[error("Graph schema element not found: {0}")]
    MissingSchema(String),

    #[error("Graph query failed: {0}")]
    Query(String),

    #[error("Unexpected row shape: {0}")]
    Decode(String),
}

impl StoreError {
    /// 빈 저장소로 간주해도 되는 에러인지
    pub fn is_missing_schema(&self) -> bool {
        matches!(self, StoreError::MissingSchema(_))
    }
}

/// 서버 메시지가 스키마 요소 부재를 뜻하는지 판별
///
/// source: https://neo4j.com/docs/status-codes/current/
pub fn looks_like_missing_schema(message: &str) -> bool {
    const MARKERS: [&str; 6] = [
        "UnknownLabelWarning",
        "UnknownPropertyKeyWarning",
        "Neo.ClientError.Statement.EntityNotFound",
        "Neo.ClientError.Schema.IndexNotFound",
        "There is no such vector schema index",
        "no such index",
    ];
    MARKERS.iter().any(|m| message.contains(m))
}

// ============================================================================
// Types
// ============================================================================

/// 벡터 인덱스에 기록할 청크 (임베딩 포함)
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: ArticleChunk,
    pub embedding: Vec<f32>,
}

/// 벡터 검색 결과
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub id: String,
    pub article_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub year: Option<i64>,
    /// 유사도 스코어 (높을수록 유사)
    pub score: f32,
}

/// 그래프 통계
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStats {
    pub article_count: u64,
    pub chunk_count: u64,
    pub year_count: u64,
}

// ============================================================================
// ArticleGraph Trait
// ============================================================================

/// 기사 그래프 저장소 트레이트 (async)
///
/// 모든 쓰기는 merge/upsert 의미를 가지므로 반복 실행해도 안전해야 합니다.
#[async_trait]
pub trait ArticleGraph: Send + Sync {
    /// Article.id / ArticleChunk.id / Year.year 유니크 제약 생성 (이미 있으면 무시)
    async fn ensure_constraints(&self) -> Result<(), StoreError>;

    /// 기사 노드 upsert (id로 merge, title/date/url 갱신)
    async fn upsert_article(&self, article: &Article) -> Result<(), StoreError>;

    /// 연도 노드 merge
    async fn merge_year(&self, year: i32) -> Result<(), StoreError>;

    /// 날짜가 있는 모든 기사에 PUBLISHED_ON 엣지 연결, 연결된 기사 수 반환
    ///
    /// 다른 연도를 가리키는 엣지와 날짜가 없는 기사의 엣지는 제거됩니다.
    async fn link_publication_years(&self) -> Result<usize, StoreError>;

    /// HAS_CHUNK로 청크가 연결된 기사 ID 집합
    ///
    /// 엣지 없이 남은 청크 노드는 처리된 것으로 보지 않습니다.
    async fn chunked_article_ids(&self) -> Result<HashSet<String>, StoreError>;

    /// 청크 벡터 인덱스 생성 (이미 있으면 무시)
    async fn ensure_vector_index(&self, dimension: usize) -> Result<(), StoreError>;

    /// 한 기사의 청크 노드와 HAS_CHUNK 엣지를 하나의 트랜잭션으로 기록
    ///
    /// 전부 기록되거나 전혀 기록되지 않습니다. 기사 노드가 없으면 아무것도 쓰지 않습니다.
    async fn write_article_chunks(
        &self,
        article_id: &str,
        chunks: &[IndexedChunk],
    ) -> Result<(), StoreError>;

    /// 청크의 year를 소유 기사의 Year 노드와 동기화, 변경된 청크 수 반환
    ///
    /// 날짜가 없는 기사의 청크는 year가 비워집니다.
    async fn sync_chunk_years(&self) -> Result<usize, StoreError>;

    /// 벡터 유사도 검색 (min_year 이상만)
    async fn search_chunks(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_year: Option<i32>,
    ) -> Result<Vec<RetrievedChunk>, StoreError>;

    /// 노드 개수 통계
    async fn stats(&self) -> Result<GraphStats, StoreError>;
}

// ============================================================================
// Tests
// ============================================================================
