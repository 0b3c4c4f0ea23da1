//! 증분 인덱싱 파이프라인 - CSV → Neo4j 그래프 + 벡터 인덱스
//!
//! Loader → Chunker → 제약 생성 → Article/Year upsert
//! → 증분 필터 → 벡터 인덱싱 + HAS_CHUNK → 연도 동기화
//!
//! 이미 청크가 있는 기사는 다시 분할/임베딩/삽입하지 않으므로
//! 같은 입력으로 반복 실행해도 안전합니다.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use anyhow::{Context, Result};

use crate::embedding::EmbeddingProvider;

use super::chunker::{chunk_articles, ArticleChunk, Chunker, RecursiveChunker};
use super::dataset::{load_articles, Article};
use super::graph::{ArticleGraph, IndexedChunk};

// ============================================================================
// Types
// ============================================================================

/// 한 번의 실행 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// 로드된 기사 수 (본문 없는 행 제외)
    pub articles_loaded: usize,
    /// 분할된 전체 청크 수
    pub chunks_total: usize,
    /// 이미 처리되어 건너뛴 청크 수
    pub chunks_skipped: usize,
    /// 이번 실행에서 임베딩 후 HAS_CHUNK와 함께 기록된 청크 수
    pub chunks_indexed: usize,
    /// 머지된 연도 수
    pub years: usize,
    /// PUBLISHED_ON으로 연결된 기사 수
    pub articles_dated: usize,
    /// 연도 동기화로 변경된 청크 수
    pub chunk_years_synced: usize,
}

/// 증분 필터 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkSelection {
    pub to_process: Vec<ArticleChunk>,
    pub skipped: usize,
}

// ============================================================================
// IndexPipeline
// ============================================================================

/// 기사 인덱싱 파이프라인
///
/// 그래프와 임베딩 프로바이더는 호출자가 생성해서 넘깁니다.
pub struct IndexPipeline<'a> {
    graph: &'a dyn ArticleGraph,
    embedder: &'a dyn EmbeddingProvider,
    chunker: Box<dyn Chunker>,
}

impl<'a> IndexPipeline<'a> {
    pub fn new(graph: &'a dyn ArticleGraph, embedder: &'a dyn EmbeddingProvider) -> Self {
        Self {
            graph,
            embedder,
            chunker: Box::new(RecursiveChunker::with_defaults()),
        }
    }

    /// CSV 파일에서 전체 파이프라인 실행
    pub async fn run(&self, dataset: &Path) -> Result<RunReport> {
        let articles = load_articles(dataset)?;
        self.run_articles(&articles).await
    }

    /// 메모리의 기사 목록으로 전체 파이프라인 실행
    pub async fn run_articles(&self, articles: &[Article]) -> Result<RunReport> {
        let mut report = RunReport {
            articles_loaded: articles.len(),
            ..Default::default()
        };

        // 1. 청킹
        let chunked = chunk_articles(articles, self.chunker.as_ref());
        report.chunks_total = chunked.len();

        // 2. 제약
        self.graph
            .ensure_constraints()
            .await
            .context("Failed to create uniqueness constraints")?;
        tracing::info!("Ensured unique constraints for Article, ArticleChunk and Year nodes");

        // 3. Article + Year
        self.write_articles(articles).await?;
        report.years = self.write_years(articles).await?;
        report.articles_dated = self
            .graph
            .link_publication_years()
            .await
            .context("Failed to link articles to years")?;
        tracing::info!(
            "Linked {} articles to {} Year nodes",
            report.articles_dated,
            report.years
        );

        // 4. 증분 필터
        let selection = self.select_unprocessed(chunked).await?;
        report.chunks_skipped = selection.skipped;

        // 5. 벡터 인덱싱 + HAS_CHUNK
        report.chunks_indexed = self.index_chunks(&selection.to_process).await?;

        // 6. 연도 동기화
        report.chunk_years_synced = self.reconcile_years().await?;

        tracing::info!(
            "Run complete: {} articles, {} chunks indexed, {} skipped",
            report.articles_loaded,
            report.chunks_indexed,
            report.chunks_skipped
        );

        Ok(report)
    }

    /// 기사 노드 upsert
    async fn write_articles(&self, articles: &[Article]) -> Result<()> {
        for article in articles {
            self.graph
                .upsert_article(article)
                .await
                .with_context(|| format!("Failed to upsert article {}", article.id))?;
        }
        tracing::info!("Upserted {} Article nodes", articles.len());
        Ok(())
    }

    /// 연도 노드 merge (1차 패스). 머지한 연도 수 반환
    async fn write_years(&self, articles: &[Article]) -> Result<usize> {
        let years: BTreeSet<i32> = articles.iter().filter_map(Article::year).collect();

        for &year in &years {
            self.graph
                .merge_year(year)
                .await
                .with_context(|| format!("Failed to merge Year node {}", year))?;
        }

        Ok(years.len())
    }

    /// 이미 청크가 있는 기사의 청크를 제외
    ///
    /// 저장소가 비어 있어 조회할 스키마가 없으면 빈 집합으로 간주합니다.
    /// 그 외의 에러는 재시도 래퍼로 전파합니다.
    pub async fn select_unprocessed(&self, chunked: Vec<ArticleChunk>) -> Result<ChunkSelection> {
        let already: HashSet<String> = match self.graph.chunked_article_ids().await {
            Ok(ids) => ids,
            Err(e) if e.is_missing_schema() => {
                tracing::warn!("No chunked articles found ({}), treating store as empty", e);
                HashSet::new()
            }
            Err(e) => return Err(e).context("Failed to query already chunked articles"),
        };

        let total = chunked.len();
        let to_process: Vec<ArticleChunk> = chunked
            .into_iter()
            .filter(|c| !already.contains(&c.article_id))
            .collect();
        let skipped = total - to_process.len();

        tracing::info!("There are {} chunks to process", to_process.len());

        Ok(ChunkSelection {
            to_process,
            skipped,
        })
    }

    /// 새 청크 임베딩 + 기사 단위 기록 (청크 노드 + HAS_CHUNK)
    ///
    /// 처리할 청크가 없으면 임베딩 호출을 포함해 아무것도 하지 않습니다.
    /// 기사 하나의 청크는 전부 기록되거나 전혀 기록되지 않으므로,
    /// 중간에 실패해도 재시도에서 그 기사를 다시 처리합니다.
    /// 기록된 청크 수 반환
    async fn index_chunks(&self, chunks: &[ArticleChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .context("Failed to embed chunks")?;
        anyhow::ensure!(
            embeddings.len() == chunks.len(),
            "Embedding provider returned {} vectors for {} chunks",
            embeddings.len(),
            chunks.len()
        );

        let dimension = embeddings.first().map(Vec::len).unwrap_or_default();
        anyhow::ensure!(
            dimension > 0 && embeddings.iter().all(|e| e.len() == dimension),
            "Embedding provider {} returned vectors of inconsistent dimension",
            self.embedder.name()
        );

        self.graph
            .ensure_vector_index(dimension)
            .await
            .context("Failed to create chunk vector index")?;

        let indexed: Vec<IndexedChunk> = chunks
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk { chunk, embedding })
            .collect();

        // chunk_articles는 기사별로 연속된 청크를 만듦
        for group in indexed.chunk_by(|a, b| a.chunk.article_id == b.chunk.article_id) {
            let Some(first) = group.first() else {
                continue;
            };
            let article_id = &first.chunk.article_id;
            self.graph
                .write_article_chunks(article_id, group)
                .await
                .with_context(|| format!("Failed to write chunks of article {}", article_id))?;
        }

        tracing::info!(
            "Vector index updated with {} ArticleChunk nodes and HAS_CHUNK relationships",
            indexed.len()
        );

        Ok(indexed.len())
    }

    /// 청크 year를 Article -PUBLISHED_ON-> Year에 맞춤
    async fn reconcile_years(&self) -> Result<usize> {
        let synced = self
            .graph
            .sync_chunk_years()
            .await
            .context("Failed to synchronize chunk years")?;
        if synced > 0 {
            tracing::info!("Synchronized year on {} ArticleChunk nodes", synced);
        }
        Ok(synced)
    }
}

// ============================================================================
// Tests
// ============================================================================
