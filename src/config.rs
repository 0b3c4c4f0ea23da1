//! 설정 모듈 - 환경변수 기반 설정 로드
//!
//! `.env` 파일이 있으면 먼저 읽은 뒤 환경변수에서 값을 가져옵니다.
//!
//! | 변수 | 설명 | 기본값 |
//! |------|------|--------|
//! | `ARTICLES_CSV_PATH` | 기사 데이터셋 경로 | (필수) |
//! | `NEO4J_URI` | Bolt 주소 | `bolt://localhost:7687` |
//! | `NEO4J_USERNAME` | 사용자 | `neo4j` |
//! | `NEO4J_PASSWORD` | 비밀번호 | (필수) |
//! | `OPENAI_API_KEY` | API 키 | (필수) |
//! | `OPENAI_BASE_URL` | API 베이스 URL | `https://api.openai.com/v1` |
//! | `EMBEDDING_MODEL` | 임베딩 모델 | `text-embedding-3-small` |
//! | `QA_MODEL` | 답변 생성 모델 | `gpt-4o-mini` |

use anyhow::Result;

use crate::embedding::DEFAULT_EMBEDDING_MODEL;

const DEFAULT_NEO4J_URI: &str = "bolt://localhost:7687";
const DEFAULT_NEO4J_USERNAME: &str = "neo4j";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_QA_MODEL: &str = "gpt-4o-mini";

/// `.env` 파일 로드 (없으면 무시)
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Failed to load .env: {}", e),
    }
}

/// 비어 있지 않은 환경변수 값
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn require_env(name: &str) -> Result<String> {
    env_var(name).ok_or_else(|| anyhow::anyhow!("{} not set", name))
}

// ============================================================================
// Neo4j
// ============================================================================

/// Neo4j 연결 설정
#[derive(Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
}

impl Neo4jConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            uri: env_var("NEO4J_URI").unwrap_or_else(|| DEFAULT_NEO4J_URI.to_string()),
            username: env_var("NEO4J_USERNAME")
                .unwrap_or_else(|| DEFAULT_NEO4J_USERNAME.to_string()),
            password: require_env("NEO4J_PASSWORD")?,
        })
    }
}

impl std::fmt::Debug for Neo4jConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// ============================================================================
// OpenAI
// ============================================================================

/// OpenAI 호환 API 설정
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
}

impl OpenAiConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = require_env("OPENAI_API_KEY").map_err(|_| {
            anyhow::anyhow!(
                "OPENAI_API_KEY not set.\n\
                 Set: export OPENAI_API_KEY=your-api-key"
            )
        })?;

        Ok(Self {
            api_key,
            base_url: env_var("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            embedding_model: env_var("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            chat_model: env_var("QA_MODEL").unwrap_or_else(|| DEFAULT_QA_MODEL.to_string()),
        })
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("chat_model", &self.chat_model)
            .finish()
    }
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    env_var("OPENAI_API_KEY").is_some()
}

// ============================================================================
// Tests
// ============================================================================
