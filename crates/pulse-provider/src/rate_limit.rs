//! Provider별 요청 간격 관리.
//!
//! 무료 API 한도를 넘지 않도록 같은 Provider에 대한 호출 사이에 최소 간격을 둡니다.
//! 동시에 같은 Provider를 호출하는 작업들은 하나의 async mutex를 통해 직렬화되며,
//! 서로 다른 Provider는 각자의 `RateLimiter`를 가지므로 독립적으로 진행됩니다.
//!
//! 클라이언트 생성 시 주입되며 전역 상태를 사용하지 않습니다.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct RateState {
    /// 마지막 호출 시각
    last_call: Option<Instant>,
    /// Provider가 알려준 남은 호출 수
    remaining_quota: Option<u32>,
}

/// 요청 간격 관리자.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    min_interval: Duration,
    state: Mutex<RateState>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            name: name.into(),
            min_interval,
            state: Mutex::new(RateState::default()),
        }
    }

    /// 간격 제한 없음 (테스트용).
    pub fn unlimited(name: impl Into<String>) -> Self {
        Self::new(name, Duration::ZERO)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// 호출 슬롯 획득.
    ///
    /// 직전 호출로부터 `min_interval`이 지날 때까지 대기한 뒤 호출 시각을 기록합니다.
    /// 대기하는 동안 락을 잡고 있으므로 같은 Provider의 다음 호출자는 그 뒤에 줄을 섭니다.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        if let Some(last) = state.last_call {
            let ready_at = last + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                tracing::debug!(
                    provider = %self.name,
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "요청 간격 대기"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        state.last_call = Some(Instant::now());
    }

    /// Provider가 알려준 남은 호출 수 기록.
    pub async fn record_quota(&self, remaining: u32) {
        let mut state = self.state.lock().await;
        state.remaining_quota = Some(remaining);
        if remaining == 0 {
            tracing::warn!(provider = %self.name, "Provider 호출 한도 소진");
        }
    }

    pub async fn remaining_quota(&self) -> Option<u32> {
        self.state.lock().await.remaining_quota
    }

    pub async fn last_call(&self) -> Option<Instant> {
        self.state.lock().await.last_call
    }
}
