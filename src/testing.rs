//! 테스트 더블 - 메모리 그래프, 고정 임베딩, 고정 채팅 모델

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::knowledge::{
    Article, ArticleChunk, ArticleGraph, GraphStats, IndexedChunk, RetrievedChunk, StoreError,
};
use crate::llm::ChatModel;

// ============================================================================
// MemoryGraph
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct StoredArticle {
    pub title: Option<String>,
    pub date: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub article_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub year: Option<i64>,
    pub embedding: Vec<f32>,
}

/// 그래프 전체 상태 (비교용)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphState {
    constraints: BTreeSet<&'static str>,
    articles: BTreeMap<String, StoredArticle>,
    years: BTreeSet<i64>,
    /// article_id -> (year, date)
    published_on: BTreeMap<String, (i64, String)>,
    chunks: BTreeMap<String, StoredChunk>,
    /// (article_id, chunk_id)
    has_chunk: BTreeSet<(String, String)>,
    vector_index: Option<usize>,
}

/// Neo4j의 merge 의미를 흉내 내는 메모리 그래프
#[derive(Default)]
pub struct MemoryGraph {
    state: Mutex<GraphState>,
    chunk_lookup_error: Mutex<Option<StoreError>>,
    /// article_id -> 다음 청크 기록에서 한 번 반환할 에러
    chunk_write_errors: Mutex<HashMap<String, StoreError>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이후 `chunked_article_ids` 호출이 주어진 에러를 반환
    pub fn fail_chunk_lookup(&self, err: StoreError) {
        *self.chunk_lookup_error.lock().unwrap() = Some(err);
    }

    /// 해당 기사의 다음 `write_article_chunks` 호출이 한 번 실패
    pub fn fail_chunk_write_once(&self, article_id: &str, err: StoreError) {
        self.chunk_write_errors
            .lock()
            .unwrap()
            .insert(article_id.to_string(), err);
    }

    /// HAS_CHUNK 엣지 없이 청크 노드만 기록 (중단된 이전 쓰기의 흔적)
    pub fn insert_orphan_chunk(&self, chunk: &ArticleChunk) {
        self.state.lock().unwrap().chunks.insert(
            chunk.id.clone(),
            StoredChunk {
                article_id: chunk.article_id.clone(),
                chunk_index: chunk.chunk_index as i64,
                text: chunk.text.clone(),
                title: chunk.title.clone(),
                url: chunk.url.clone(),
                year: chunk.year.map(i64::from),
                embedding: Vec::new(),
            },
        );
    }

    pub fn snapshot(&self) -> GraphState {
        self.state.lock().unwrap().clone()
    }

    pub fn article(&self, id: &str) -> Option<StoredArticle> {
        self.state.lock().unwrap().articles.get(id).cloned()
    }

    pub fn chunk(&self, id: &str) -> Option<StoredChunk> {
        self.state.lock().unwrap().chunks.get(id).cloned()
    }

    pub fn years(&self) -> Vec<i64> {
        self.state.lock().unwrap().years.iter().copied().collect()
    }

    pub fn published_on(&self, article_id: &str) -> Option<(i64, String)> {
        self.state
            .lock()
            .unwrap()
            .published_on
            .get(article_id)
            .cloned()
    }

    pub fn has_chunk_edge(&self, article_id: &str, chunk_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .has_chunk
            .contains(&(article_id.to_string(), chunk_id.to_string()))
    }

    pub fn constraint_count(&self) -> usize {
        self.state.lock().unwrap().constraints.len()
    }

    /// 생성된 벡터 인덱스의 차원
    pub fn vector_index(&self) -> Option<usize> {
        self.state.lock().unwrap().vector_index
    }
}

#[async_trait]
impl ArticleGraph for MemoryGraph {
    async fn ensure_constraints(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.constraints.insert("article_id");
        state.constraints.insert("article_chunk_id");
        state.constraints.insert("year_value");
        Ok(())
    }

    async fn upsert_article(&self, article: &Article) -> Result<(), StoreError> {
        self.state.lock().unwrap().articles.insert(
            article.id.clone(),
            StoredArticle {
                title: article.title.clone(),
                date: article.date_string(),
                url: article.url.clone(),
            },
        );
        Ok(())
    }

    async fn merge_year(&self, year: i32) -> Result<(), StoreError> {
        self.state.lock().unwrap().years.insert(i64::from(year));
        Ok(())
    }

    async fn link_publication_years(&self) -> Result<usize, StoreError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let undated: Vec<String> = state
            .articles
            .iter()
            .filter(|(_, a)| a.date.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        for id in undated {
            state.published_on.remove(&id);
        }

        let dated: Vec<(String, i64, String)> = state
            .articles
            .iter()
            .filter_map(|(id, a)| {
                let date = a.date.clone()?;
                let year = date.get(0..4)?.parse::<i64>().ok()?;
                Some((id.clone(), year, date))
            })
            .collect();

        let mut linked = 0;
        for (id, year, date) in dated {
            if state.years.contains(&year) {
                state.published_on.insert(id, (year, date));
                linked += 1;
            }
        }
        Ok(linked)
    }

    async fn chunked_article_ids(&self) -> Result<HashSet<String>, StoreError> {
        if let Some(err) = self.chunk_lookup_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .has_chunk
            .iter()
            .map(|(article_id, _)| article_id.clone())
            .collect())
    }

    async fn ensure_vector_index(&self, dimension: usize) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.vector_index.is_none() {
            state.vector_index = Some(dimension);
        }
        Ok(())
    }

    async fn write_article_chunks(
        &self,
        article_id: &str,
        chunks: &[IndexedChunk],
    ) -> Result<(), StoreError> {
        if let Some(err) = self.chunk_write_errors.lock().unwrap().remove(article_id) {
            return Err(err);
        }

        let mut state = self.state.lock().unwrap();
        if !state.articles.contains_key(article_id) {
            return Ok(());
        }

        for indexed in chunks {
            let chunk = &indexed.chunk;
            let stored = state
                .chunks
                .entry(chunk.id.clone())
                .or_insert_with(|| StoredChunk {
                    article_id: chunk.article_id.clone(),
                    chunk_index: chunk.chunk_index as i64,
                    text: chunk.text.clone(),
                    title: chunk.title.clone(),
                    url: chunk.url.clone(),
                    year: chunk.year.map(i64::from),
                    embedding: Vec::new(),
                });
            stored.embedding = indexed.embedding.clone();
            state
                .has_chunk
                .insert((article_id.to_string(), chunk.id.clone()));
        }
        Ok(())
    }

    async fn sync_chunk_years(&self) -> Result<usize, StoreError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let mut synced = 0;

        for (article_id, chunk_id) in &state.has_chunk {
            let year = state.published_on.get(article_id).map(|p| p.0);
            if let Some(chunk) = state.chunks.get_mut(chunk_id) {
                if chunk.year != year {
                    chunk.year = year;
                    synced += 1;
                }
            }
        }
        Ok(synced)
    }

    async fn search_chunks(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_year: Option<i32>,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut results: Vec<RetrievedChunk> = state
            .chunks
            .iter()
            .filter(|(_, c)| match min_year {
                Some(min) => c.year.map(|y| y >= i64::from(min)).unwrap_or(false),
                None => true,
            })
            .map(|(id, c)| RetrievedChunk {
                id: id.clone(),
                article_id: c.article_id.clone(),
                chunk_index: c.chunk_index,
                text: c.text.clone(),
                title: c.title.clone(),
                url: c.url.clone(),
                year: c.year,
                score: cosine_similarity(query_embedding, &c.embedding),
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }

    async fn stats(&self) -> Result<GraphStats, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(GraphStats {
            article_count: state.articles.len() as u64,
            chunk_count: state.chunks.len() as u64,
            year_count: state.years.len() as u64,
        })
    }
}

/// 코사인 유사도 (-1.0 ~ 1.0)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// StubEmbedding
// ============================================================================

/// 문자 빈도 기반 결정적 임베딩
pub struct StubEmbedding {
    dimension: usize,
    calls: AtomicUsize,
}

impl StubEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    /// 임베딩한 텍스트 수
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut vector = vec![0.0; self.dimension];
        for c in text.to_lowercase().chars().filter(|c| c.is_alphanumeric()) {
            vector[(c as usize) % self.dimension] += 1.0;
        }
        Ok(vector)
    }

    fn name(&self) -> &str {
        "stub"
    }
}

// ============================================================================
// StubChat
// ============================================================================

/// 받은 프롬프트를 기록하고 고정 답변을 반환
pub struct StubChat {
    answer: String,
    prompts: Mutex<Vec<String>>,
}

impl StubChat {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for StubChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer.clone())
    }

    fn name(&self) -> &str {
        "stub-chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
        assert!((cosine_similarity(&a, &[0.0, 1.0, 0.0])).abs() < 0.0001);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.0001);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }
}
