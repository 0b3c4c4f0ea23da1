//! Dataset Loader - 기사 CSV 로딩
//!
//! 기사 데이터셋(CSV)을 읽어 본문이 비어 있는 행을 제거하고
//! 발행일을 `NaiveDate`로 파싱합니다.
//!
//! 필수 컬럼: `article_id`, `title`, `article_date`, `article_url`, `article_text`

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

/// 필수 컬럼 목록
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "article_id",
    "title",
    "article_date",
    "article_url",
    "article_text",
];

/// 발행일 포맷 (YYYY-MM-DD)
const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Types
// ============================================================================

/// 유효한 기사 한 건
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: String,
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub url: Option<String>,
    pub text: String,
}

impl Article {
    /// 발행 연도
    pub fn year(&self) -> Option<i32> {
        self.date.map(|d| d.year())
    }

    /// 그래프에 저장되는 날짜 문자열 (YYYY-MM-DD)
    pub fn date_string(&self) -> Option<String> {
        self.date.map(|d| d.format(DATE_FORMAT).to_string())
    }
}

/// CSV 원본 행
#[derive(Debug, Deserialize)]
struct ArticleRow {
    article_id: String,
    title: Option<String>,
    article_date: Option<String>,
    article_url: Option<String>,
    article_text: Option<String>,
}

// ============================================================================
// Loader
// ============================================================================

/// CSV 파일에서 기사 로드
pub fn load_articles(path: &Path) -> Result<Vec<Article>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open articles dataset: {}", path.display()))?;

    let articles = read_articles(file)
        .with_context(|| format!("Failed to read articles dataset: {}", path.display()))?;

    tracing::info!("Loaded articles dataset ({} rows)", articles.len());
    Ok(articles)
}

/// 임의의 reader에서 기사 로드
///
/// 본문이 비어 있는 행은 버리고, 날짜 형식이 잘못되었거나
/// 필수 컬럼이 없으면 에러를 반환합니다.
pub fn read_articles<R: Read>(reader: R) -> Result<Vec<Article>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            bail!("Missing required column: {}", column);
        }
    }

    let mut articles = Vec::new();
    let mut dropped = 0usize;

    for (i, row) in reader.deserialize::<ArticleRow>().enumerate() {
        // 헤더가 1행이므로 데이터는 2행부터
        let line = i + 2;
        let row = row.with_context(|| format!("Malformed CSV row at line {}", line))?;

        let text = match non_empty(row.article_text) {
            Some(text) => text,
            None => {
                dropped += 1;
                continue;
            }
        };

        let date = match non_empty(row.article_date) {
            Some(raw) => Some(parse_date(&raw).with_context(|| {
                format!("Invalid article_date at line {} (article {})", line, row.article_id)
            })?),
            None => None,
        };

        articles.push(Article {
            id: row.article_id.trim().to_string(),
            title: non_empty(row.title),
            date,
            url: non_empty(row.article_url),
            text,
        });
    }

    if dropped > 0 {
        tracing::debug!("Dropped {} rows with empty article_text", dropped);
    }

    Ok(articles)
}

/// 발행일 파싱 (YYYY-MM-DD)
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .with_context(|| format!("expected YYYY-MM-DD, got {:?}", raw))
}

/// 공백뿐인 값은 None
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Tests
// ============================================================================
