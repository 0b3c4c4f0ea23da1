//! CLI 모듈
//!
//! article-graph-rag CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{has_api_key, Neo4jConfig, OpenAiConfig};
use crate::embedding::OpenAiEmbedding;
use crate::knowledge::{
    chunk_articles, load_articles, ArticleGraph, ArticleRetriever, IndexPipeline, Neo4jGraph,
    RecursiveChunker, RunReport, DEFAULT_TOP_K,
};
use crate::llm::OpenAiChat;
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "article-graph-rag")]
#[command(version, about = "기사 그래프 RAG 파이프라인", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 기사 CSV를 그래프에 적재하고 새 청크를 벡터 인덱싱
    Load {
        /// 기사 CSV 경로
        #[arg(long, env = "ARTICLES_CSV_PATH")]
        csv: PathBuf,

        /// 최대 시도 횟수
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,

        /// 재시도 간 딜레이 (초)
        #[arg(long, default_value = "10")]
        retry_delay_secs: u64,
    },

    /// 청킹 결과 미리보기 (네트워크 호출 없음)
    Preview {
        /// 기사 CSV 경로
        #[arg(long, env = "ARTICLES_CSV_PATH")]
        csv: PathBuf,

        /// 출력할 청크 수
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// 기사에 대해 질문
    Ask {
        /// 질문
        question: String,

        /// 검색할 청크 수
        #[arg(short, long, default_value_t = DEFAULT_TOP_K)]
        limit: usize,

        /// 이 연도 이후 기사만 검색
        #[arg(long)]
        min_year: Option<i32>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Load {
            csv,
            max_attempts,
            retry_delay_secs,
        } => {
            let policy = RetryPolicy::new(max_attempts, Duration::from_secs(retry_delay_secs));
            cmd_load(&csv, policy).await
        }
        Commands::Preview { csv, limit } => cmd_preview(&csv, limit),
        Commands::Ask {
            question,
            limit,
            min_year,
        } => cmd_ask(&question, limit, min_year).await,
        Commands::Status => cmd_status().await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 적재 명령어 (load)
///
/// 매 시도마다 새로 연결하고 파이프라인 전체를 다시 실행합니다.
async fn cmd_load(csv: &Path, policy: RetryPolicy) -> Result<()> {
    let neo4j = Neo4jConfig::from_env()?;
    let openai = OpenAiConfig::from_env()?;
    let embedder = OpenAiEmbedding::new(&openai).context("Failed to create embedder")?;

    println!("[*] 기사 적재 시작: {}", csv.display());

    let neo4j = &neo4j;
    let embedder = &embedder;
    let report = policy
        .run(move || async move {
            let graph = Neo4jGraph::connect(neo4j)
                .await
                .context("Failed to connect to Neo4j")?;
            let result = IndexPipeline::new(&graph, embedder).run(csv).await;
            graph.close();
            result
        })
        .await?;

    print_report(&report);
    Ok(())
}

/// 미리보기 명령어 (preview)
fn cmd_preview(csv: &Path, limit: usize) -> Result<()> {
    let articles = load_articles(csv)?;
    let chunker = RecursiveChunker::with_defaults();
    let chunks = chunk_articles(&articles, &chunker);

    println!(
        "[OK] 기사 {} 건 → 청크 {} 개 (최대 {}자, 오버랩 {}자)\n",
        articles.len(),
        chunks.len(),
        chunker.config().chunk_size,
        chunker.config().chunk_overlap
    );

    for chunk in chunks.iter().take(limit) {
        println!(
            "  {} [{}] {} chars",
            chunk.id,
            chunk.year.map(|y| y.to_string()).unwrap_or_else(|| "-".to_string()),
            chunk.text.chars().count()
        );
        println!("        {}", truncate_text(&chunk.text, 80));
    }

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(question: &str, limit: usize, min_year: Option<i32>) -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\
             설정: export OPENAI_API_KEY=your-key"
        );
    }

    let openai = OpenAiConfig::from_env()?;
    let embedder = OpenAiEmbedding::new(&openai)?;
    let chat = OpenAiChat::new(&openai)?;
    let graph = Neo4jGraph::connect(&Neo4jConfig::from_env()?)
        .await
        .context("Failed to connect to Neo4j")?;

    println!("[*] 검색 중: \"{}\"", question);

    let result = ArticleRetriever::new(&graph, &embedder, &chat)
        .ask(question, limit, min_year)
        .await;
    graph.close();
    let answer = result?;

    println!("\n{}\n", answer.output);

    let sources = answer.sources();
    if sources.is_empty() {
        println!("[!] 참고한 기사가 없습니다.");
    } else {
        println!("[OK] 참고 기사 ({} 건):", sources.len());
        for (title, url) in sources {
            println!("  - {} ({})", title, url);
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status() -> Result<()> {
    println!("article-graph-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export OPENAI_API_KEY=your-key");
    }

    let config = match Neo4jConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("[!] Neo4j 설정 없음: {}", e);
            return Ok(());
        }
    };

    match Neo4jGraph::connect(&config).await {
        Ok(graph) => {
            match graph.ping().await {
                Ok(()) => println!("[OK] Neo4j: {}", config.uri),
                Err(e) => println!("[!] Neo4j 응답 없음: {}", e),
            }
            match graph.stats().await {
                Ok(stats) => {
                    println!("[OK] Article: {} 건", stats.article_count);
                    println!("     ArticleChunk: {} 개", stats.chunk_count);
                    println!("     Year: {} 개", stats.year_count);
                }
                Err(e) => tracing::debug!("그래프 통계 조회 실패: {}", e),
            }
            graph.close();
        }
        Err(e) => println!("[!] Neo4j 연결 실패 ({}): {}", config.uri, e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn print_report(report: &RunReport) {
    println!("[OK] 적재 완료");
    println!("     기사: {} 건", report.articles_loaded);
    println!(
        "     청크: 전체 {}, 신규 {}, 건너뜀 {}",
        report.chunks_total, report.chunks_indexed, report.chunks_skipped
    );
    println!(
        "     연도: {} 개 (연결된 기사 {} 건)",
        report.years, report.articles_dated
    );
    if report.chunk_years_synced > 0 {
        println!("     연도 동기화: {} 청크", report.chunk_years_synced);
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_parse_load_defaults() {
        let cli = Cli::try_parse_from(["article-graph-rag", "load", "--csv", "articles.csv"]).unwrap();
        match cli.command {
            Commands::Load {
                csv,
                max_attempts,
                retry_delay_secs,
            } => {
                assert_eq!(csv, PathBuf::from("articles.csv"));
                assert_eq!(max_attempts, 100);
                assert_eq!(retry_delay_secs, 10);
            }
            _ => panic!("expected load command"),
        }
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from([
            "article-graph-rag",
            "ask",
            "What changed in 2020?",
            "--min-year",
            "2015",
        ])
        .unwrap();
        match cli.command {
            Commands::Ask {
                question,
                limit,
                min_year,
            } => {
                assert_eq!(question, "What changed in 2020?");
                assert_eq!(limit, DEFAULT_TOP_K);
                assert_eq!(min_year, Some(2015));
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn test_preview_runs_offline() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "article_id,title,article_date,article_url,article_text").unwrap();
        writeln!(file, "A1,T,2020-03-01,http://x,Short text.").unwrap();

        assert!(cmd_preview(file.path(), 5).is_ok());
    }
}
