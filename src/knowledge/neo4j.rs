//! Neo4j Article Graph - Bolt 기반 그래프 저장소
//!
//! `neo4rs`로 Cypher 쿼리를 실행합니다.
//! 벡터 인덱스는 Neo4j 5의 네이티브 벡터 인덱스를 사용합니다.
//! ref: https://neo4j.com/docs/cypher-manual/current/indexes/semantic-indexes/vector-indexes/

use std::collections::HashSet;

use async_trait::async_trait;
use neo4rs::{query, Graph, Query};

use crate::config::Neo4jConfig;

use super::dataset::Article;
use super::graph::{
    looks_like_missing_schema, ArticleGraph, GraphStats, IndexedChunk, RetrievedChunk, StoreError,
    ARTICLE_CHUNK_INDEX, ARTICLE_CHUNK_NODE, ARTICLE_NODE, HAS_CHUNK_RELATIONSHIP,
    PUBLISHED_ON_RELATIONSHIP, YEAR_NODE,
};

/// 연도 필터가 있을 때 후보를 넉넉히 가져오는 배수
const FILTER_OVERFETCH: usize = 4;

impl From<neo4rs::Error> for StoreError {
    fn from(err: neo4rs::Error) -> Self {
        match err {
            neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError => {
                StoreError::Connection(err.to_string())
            }
            neo4rs::Error::AuthenticationError(msg) => StoreError::Authentication(msg),
            other => {
                let msg = other.to_string();
                if looks_like_missing_schema(&msg) {
                    StoreError::MissingSchema(msg)
                } else {
                    StoreError::Query(msg)
                }
            }
        }
    }
}

impl From<neo4rs::DeError> for StoreError {
    fn from(err: neo4rs::DeError) -> Self {
        StoreError::Decode(err.to_string())
    }
}

// ============================================================================
// Neo4jGraph
// ============================================================================

/// Neo4j 그래프 저장소
///
/// 명시적으로 `connect`로 열고 `close`로 닫습니다.
/// 커넥션 풀은 핸들이 drop될 때 해제됩니다.
pub struct Neo4jGraph {
    graph: Graph,
}

impl Neo4jGraph {
    /// Neo4j 서버 연결
    pub async fn connect(config: &Neo4jConfig) -> Result<Self, StoreError> {
        let graph = Graph::new(
            config.uri.as_str(),
            config.username.as_str(),
            config.password.as_str(),
        )
        .await?;

        tracing::debug!("Connected to Neo4j at {}", config.uri);
        Ok(Self { graph })
    }

    /// 연결 확인
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut result = self.graph.execute(query("RETURN 1 AS ok")).await?;
        match result.next().await? {
            Some(_) => Ok(()),
            None => Err(StoreError::Decode("ping returned no rows".to_string())),
        }
    }

    /// 연결 종료
    pub fn close(self) {
        drop(self.graph);
        tracing::debug!("Closed Neo4j connection");
    }

    /// 단일 정수 컬럼을 반환하는 쿼리 실행
    async fn fetch_count(&self, q: Query, column: &str) -> Result<i64, StoreError> {
        let mut result = self.graph.execute(q).await?;
        match result.next().await? {
            Some(row) => Ok(row.get::<i64>(column)?),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl ArticleGraph for Neo4jGraph {
    async fn ensure_constraints(&self) -> Result<(), StoreError> {
        let constraints = [
            format!(
                "CREATE CONSTRAINT article_id IF NOT EXISTS FOR (a:{}) REQUIRE a.id IS UNIQUE",
                ARTICLE_NODE
            ),
            format!(
                "CREATE CONSTRAINT article_chunk_id IF NOT EXISTS FOR (c:{}) REQUIRE c.id IS UNIQUE",
                ARTICLE_CHUNK_NODE
            ),
            format!(
                "CREATE CONSTRAINT year_value IF NOT EXISTS FOR (y:{}) REQUIRE y.year IS UNIQUE",
                YEAR_NODE
            ),
        ];

        for constraint in constraints {
            self.graph.run(query(&constraint)).await?;
        }

        Ok(())
    }

    async fn upsert_article(&self, article: &Article) -> Result<(), StoreError> {
        let cypher = format!(
            "MERGE (a:{} {{id: $id}})
             SET a.title = $title,
                 a.date = $date,
                 a.url = $url",
            ARTICLE_NODE
        );

        let q = query(&cypher)
            .param("id", article.id.clone())
            .param("title", article.title.clone())
            .param("date", article.date_string())
            .param("url", article.url.clone());

        self.graph.run(q).await?;
        tracing::debug!("Upserted article: {}", article.id);
        Ok(())
    }

    async fn merge_year(&self, year: i32) -> Result<(), StoreError> {
        let cypher = format!("MERGE (:{} {{year: $year}})", YEAR_NODE);
        self.graph
            .run(query(&cypher).param("year", i64::from(year)))
            .await?;
        Ok(())
    }

    async fn link_publication_years(&self) -> Result<usize, StoreError> {
        // 날짜가 지워진 기사는 연도 엣지를 모두 제거
        let detach_undated = format!(
            "MATCH (a:{article})-[r:{rel}]->(:{year})
             WHERE a.date IS NULL
             DELETE r",
            article = ARTICLE_NODE,
            year = YEAR_NODE,
            rel = PUBLISHED_ON_RELATIONSHIP,
        );
        self.graph.run(query(&detach_undated)).await?;

        // 날짜가 바뀐 기사는 이전 연도 엣지를 먼저 제거
        let cypher = format!(
            "MATCH (a:{article})
             WHERE a.date IS NOT NULL
             WITH a, toInteger(substring(a.date, 0, 4)) AS year
             MATCH (y:{year} {{year: year}})
             OPTIONAL MATCH (a)-[stale:{rel}]->(other:{year})
             WHERE other.year <> year
             DELETE stale
             WITH DISTINCT a, y
             MERGE (a)-[r:{rel}]->(y)
             SET r.date = a.date
             RETURN count(DISTINCT a) AS linked",
            article = ARTICLE_NODE,
            year = YEAR_NODE,
            rel = PUBLISHED_ON_RELATIONSHIP,
        );

        let linked = self.fetch_count(query(&cypher), "linked").await?;
        Ok(linked as usize)
    }

    async fn chunked_article_ids(&self) -> Result<HashSet<String>, StoreError> {
        let cypher = format!(
            "MATCH (a:{article})-[:{rel}]->(:{chunk})
             RETURN DISTINCT a.id AS article_id",
            article = ARTICLE_NODE,
            chunk = ARTICLE_CHUNK_NODE,
            rel = HAS_CHUNK_RELATIONSHIP,
        );

        let mut result = self.graph.execute(query(&cypher)).await?;
        let mut ids = HashSet::new();

        while let Some(row) = result.next().await? {
            if let Some(id) = row.get::<Option<String>>("article_id")? {
                ids.insert(id);
            }
        }

        Ok(ids)
    }

    async fn ensure_vector_index(&self, dimension: usize) -> Result<(), StoreError> {
        let cypher = format!(
            "CREATE VECTOR INDEX {index} IF NOT EXISTS
             FOR (c:{label}) ON (c.embedding)
             OPTIONS {{indexConfig: {{
                 `vector.dimensions`: {dimension},
                 `vector.similarity_function`: 'cosine'
             }}}}",
            index = ARTICLE_CHUNK_INDEX,
            label = ARTICLE_CHUNK_NODE,
            dimension = dimension,
        );

        self.graph.run(query(&cypher)).await?;
        Ok(())
    }

    async fn write_article_chunks(
        &self,
        article_id: &str,
        chunks: &[IndexedChunk],
    ) -> Result<(), StoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let queries: Vec<Query> = chunks
            .iter()
            .map(|indexed| chunk_query(article_id, indexed))
            .collect();

        let mut txn = self.graph.start_txn().await?;
        if let Err(e) = txn.run_queries(queries).await {
            if let Err(rollback) = txn.rollback().await {
                tracing::warn!("Rollback for article {} failed: {}", article_id, rollback);
            }
            return Err(e.into());
        }
        txn.commit().await?;

        tracing::debug!("Wrote {} chunks for article {}", chunks.len(), article_id);
        Ok(())
    }

    async fn sync_chunk_years(&self) -> Result<usize, StoreError> {
        let cypher = format!(
            "MATCH (a:{article})-[:{has_chunk}]->(c:{chunk})
             OPTIONAL MATCH (a)-[:{published_on}]->(y:{year})
             WITH c, y.year AS year
             WHERE coalesce(c.year, -1) <> coalesce(year, -1)
             SET c.year = year
             RETURN count(c) AS synced",
            article = ARTICLE_NODE,
            has_chunk = HAS_CHUNK_RELATIONSHIP,
            chunk = ARTICLE_CHUNK_NODE,
            published_on = PUBLISHED_ON_RELATIONSHIP,
            year = YEAR_NODE,
        );

        let synced = self.fetch_count(query(&cypher), "synced").await?;
        Ok(synced as usize)
    }

    async fn search_chunks(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_year: Option<i32>,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        if limit == 0 {
            return Ok(vec![]);
        }

        // 필터는 ANN 이후에 적용되므로 후보를 더 가져옴
        let candidates = if min_year.is_some() {
            limit * FILTER_OVERFETCH
        } else {
            limit
        };
        let embedding: Vec<f64> = query_embedding.iter().map(|&v| f64::from(v)).collect();

        let q = query(
            "CALL db.index.vector.queryNodes($index, $candidates, $embedding)
             YIELD node, score
             WHERE $min_year IS NULL OR node.year >= $min_year
             RETURN node.id AS id,
                    node.article_id AS article_id,
                    node.chunk_index AS chunk_index,
                    node.text AS text,
                    node.title AS title,
                    node.url AS url,
                    node.year AS year,
                    score
             ORDER BY score DESC
             LIMIT $limit",
        )
        .param("index", ARTICLE_CHUNK_INDEX)
        .param("candidates", candidates as i64)
        .param("embedding", embedding)
        .param("min_year", min_year.map(i64::from))
        .param("limit", limit as i64);

        let mut result = self.graph.execute(q).await?;
        let mut chunks = Vec::new();

        while let Some(row) = result.next().await? {
            chunks.push(RetrievedChunk {
                id: row.get("id")?,
                article_id: row.get("article_id")?,
                chunk_index: row.get("chunk_index")?,
                text: row.get("text")?,
                title: row.get("title")?,
                url: row.get("url")?,
                year: row.get("year")?,
                score: row.get::<f64>("score")? as f32,
            });
        }

        Ok(chunks)
    }

    async fn stats(&self) -> Result<GraphStats, StoreError> {
        let q = query(&format!(
            "OPTIONAL MATCH (a:{article}) WITH count(a) AS articles
             OPTIONAL MATCH (c:{chunk}) WITH articles, count(c) AS chunks
             OPTIONAL MATCH (y:{year})
             RETURN articles, chunks, count(y) AS years",
            article = ARTICLE_NODE,
            chunk = ARTICLE_CHUNK_NODE,
            year = YEAR_NODE,
        ));

        let mut result = self.graph.execute(q).await?;

        if let Some(row) = result.next().await? {
            return Ok(GraphStats {
                article_count: row.get::<i64>("articles")? as u64,
                chunk_count: row.get::<i64>("chunks")? as u64,
                year_count: row.get::<i64>("years")? as u64,
            });
        }

        Ok(GraphStats::default())
    }
}

/// 청크 노드 + HAS_CHUNK 엣지 + 임베딩을 한 문장으로 기록
///
/// 기사 노드가 없으면 MATCH가 비어 아무것도 만들지 않습니다.
fn chunk_query(article_id: &str, indexed: &IndexedChunk) -> Query {
    let chunk = &indexed.chunk;
    let embedding: Vec<f64> = indexed.embedding.iter().map(|&v| f64::from(v)).collect();

    let cypher = format!(
        "MATCH (a:{article} {{id: $article_id}})
         MERGE (c:{chunk} {{id: $id}})
         ON CREATE SET c.article_id = $article_id,
                       c.chunk_index = $chunk_index,
                       c.text = $text,
                       c.title = $title,
                       c.url = $url,
                       c.year = $year
         MERGE (a)-[:{rel}]->(c)
         WITH c
         CALL db.create.setNodeVectorProperty(c, 'embedding', $embedding)",
        article = ARTICLE_NODE,
        chunk = ARTICLE_CHUNK_NODE,
        rel = HAS_CHUNK_RELATIONSHIP,
    );

    query(&cypher)
        .param("article_id", article_id)
        .param("id", chunk.id.clone())
        .param("chunk_index", chunk.chunk_index as i64)
        .param("text", chunk.text.clone())
        .param("title", chunk.title.clone())
        .param("url", chunk.url.clone())
        .param("year", chunk.year.map(i64::from))
        .param("embedding", embedding)
}

// ============================================================================
// Tests
// ============================================================================
