//! Text Chunking Module
//!
//! 재귀 구분자 기반 텍스트 분할을 제공합니다.
//! 우선순위가 높은 구분자(문단 → 줄 → 마침표 → 공백 → 문자)부터 시도하고,
//! 조각이 최대 크기를 넘을 때만 다음 구분자로 내려갑니다.
//!
//! 길이는 모두 문자(char) 단위입니다.

use super::dataset::Article;

/// 기본 최대 청크 크기 (문자 수)
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// 기본 오버랩 크기 (문자 수)
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

// ============================================================================
// Splitter Configuration
// ============================================================================

/// 분할 설정
#[derive(Debug, Clone, PartialEq)]
pub struct SplitterConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 연속 청크 간 오버랩 (문자 수)
    pub chunk_overlap: usize,
    /// 우선순위 순 구분자 목록. 빈 문자열은 문자 단위 분할
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: ["\n\n", "\n", ".", " ", ""]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ============================================================================
// Pure splitter
// ============================================================================

/// 텍스트를 청크로 분할
///
/// 각 청크는 `chunk_size` 이하이며, 문자 단위 폴백에서는
/// 연속 청크가 `chunk_overlap` 문자를 공유합니다.
pub fn split_text(text: &str, config: &SplitterConfig) -> Vec<String> {
    split_recursive(text, &config.separators, config)
}

fn split_recursive(text: &str, separators: &[String], config: &SplitterConfig) -> Vec<String> {
    // 텍스트에 존재하는 첫 번째 구분자 선택
    let mut separator = separators.last().map(String::as_str).unwrap_or("");
    let mut remaining: &[String] = &[];
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            separator = "";
            break;
        }
        if text.contains(sep.as_str()) {
            separator = sep;
            remaining = &separators[i + 1..];
            break;
        }
    }

    let mut chunks = Vec::new();
    let mut good: Vec<&str> = Vec::new();

    for piece in split_keep_separator(text, separator) {
        if char_len(piece) < config.chunk_size {
            good.push(piece);
            continue;
        }

        if !good.is_empty() {
            chunks.extend(merge_pieces(&good, config));
            good.clear();
        }

        if remaining.is_empty() {
            chunks.push(piece.to_string());
        } else {
            chunks.extend(split_recursive(piece, remaining, config));
        }
    }

    if !good.is_empty() {
        chunks.extend(merge_pieces(&good, config));
    }

    chunks
}

/// 구분자를 다음 조각의 앞에 붙여서 분할 (빈 조각 제거)
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
        }
        start = pos;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

/// 작은 조각들을 최대 크기까지 병합하고 오버랩만큼 이월
fn merge_pieces(pieces: &[&str], config: &SplitterConfig) -> Vec<String> {
    let mut docs = Vec::new();
    let mut window: std::collections::VecDeque<(&str, usize)> = std::collections::VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);

        if total + len > config.chunk_size && !window.is_empty() {
            if let Some(doc) = join_window(&window) {
                docs.push(doc);
            }

            // 오버랩 이하가 되고 새 조각이 들어갈 때까지 앞에서 제거
            while total > config.chunk_overlap
                || (total + len > config.chunk_size && total > 0)
            {
                match window.pop_front() {
                    Some((_, front_len)) => total -= front_len,
                    None => break,
                }
            }
        }

        window.push_back((piece, len));
        total += len;
    }

    if let Some(doc) = join_window(&window) {
        docs.push(doc);
    }

    docs
}

fn join_window(window: &std::collections::VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

/// 재귀 구분자 청커
pub struct RecursiveChunker {
    config: SplitterConfig,
}

impl RecursiveChunker {
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    /// 기본 설정 (500자 / 50자 오버랩)
    pub fn with_defaults() -> Self {
        Self::new(SplitterConfig::default())
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }
        split_text(text, &self.config)
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Article chunks
// ============================================================================

/// 기사 청크 레코드
///
/// 표시용 필드(title, url, year)는 부모 기사에서 복사됩니다.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleChunk {
    /// `{article_id}_{chunk_index}`
    pub id: String,
    pub article_id: String,
    /// 0부터 시작, 기사 내 연속
    pub chunk_index: usize,
    pub text: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub year: Option<i32>,
}

/// 청크 ID 생성
pub fn chunk_id(article_id: &str, chunk_index: usize) -> String {
    format!("{}_{}", article_id, chunk_index)
}

/// 기사 목록을 청크 레코드로 변환
pub fn chunk_articles(articles: &[Article], chunker: &dyn Chunker) -> Vec<ArticleChunk> {
    let mut chunked = Vec::new();

    for article in articles {
        let year = article.year();
        for (i, text) in chunker.chunk(&article.text).into_iter().enumerate() {
            chunked.push(ArticleChunk {
                id: chunk_id(&article.id, i),
                article_id: article.id.clone(),
                chunk_index: i,
                text,
                title: article.title.clone(),
                url: article.url.clone(),
                year,
            });
        }
    }

    tracing::info!(
        "Chunked {} articles into {} chunks ({})",
        articles.len(),
        chunked.len(),
        chunker.name()
    );

    chunked
}

// ============================================================================
// Tests
// ============================================================================
