//! 재시도 래퍼 - 전체 파이프라인 재실행
//!
//! 실패 시 고정 딜레이 후 처음부터 다시 실행합니다.
//!
//! Running → Success
//! Running → Retry → Running … → Failure (마지막 에러 반환)

use std::future::Future;
use std::time::Duration;

use anyhow::Result;

/// 기본 최대 시도 횟수
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;
/// 기본 재시도 딜레이
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (최소 1)
    pub max_attempts: u32,
    /// 시도 간 고정 딜레이
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// 한 번의 시도가 끝난 뒤의 상태
#[derive(Debug)]
enum RunState<T> {
    Success(T),
    Retry(anyhow::Error),
    Failure(anyhow::Error),
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// `op`을 성공할 때까지 최대 `max_attempts`번 실행
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let state = match op().await {
                Ok(value) => RunState::Success(value),
                Err(e) if attempt < max_attempts => RunState::Retry(e),
                Err(e) => RunState::Failure(e),
            };

            match state {
                RunState::Success(value) => {
                    if attempt > 1 {
                        tracing::info!("Succeeded on attempt {}/{}", attempt, max_attempts);
                    }
                    return Ok(value);
                }
                RunState::Retry(e) => {
                    tracing::warn!(
                        "Attempt {}/{} failed: {:#}. Retrying in {:?}",
                        attempt,
                        max_attempts,
                        e,
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                RunState::Failure(e) => {
                    tracing::error!("Giving up after {} attempts: {:#}", attempt, e);
                    return Err(e);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
