//! 티커별 수집 결과.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::bar::DailyBar;
use super::payload::Payload;

/// 분류된 실패 사유.
///
/// `RateLimited`와 `Timeout`은 일시적인 실패로 같은 Provider에서 재시도합니다.
/// 나머지는 해당 Provider에 대해 영구적인 실패로 보고 바로 다음 Provider로 넘어갑니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// 요청 한도 초과
    RateLimited,
    /// 심볼을 찾을 수 없음
    NotFound,
    /// 타임아웃 또는 연결 실패
    Timeout,
    /// 응답 형식이 예상과 다름
    MalformedResponse,
    /// 인증 실패 또는 자격증명 없음
    AuthError,
}

impl FailureReason {
    /// 같은 Provider로 재시도할 가치가 있는 실패인지 확인.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::MalformedResponse => "malformed_response",
            Self::AuthError => "auth_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 수집 결과 상태.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Success,
    Failure {
        reason: FailureReason,
        message: String,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// 한 티커에 대한 한 번의 실행 결과.
///
/// 생성 이후 변경되지 않습니다. 오케스트레이터는 최종 결과를 만들 때
/// [`FetchResult::with_stats`]로 새 값을 만듭니다.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    /// 심볼
    pub symbol: String,
    /// 실제로 응답한 Provider (시도할 Provider가 없었다면 `None`)
    pub provider: Option<String>,
    /// 수집 시각 (UTC)
    pub fetched_at: DateTime<Utc>,
    /// 필드 맵 (실패 시 비어 있음)
    pub payload: Payload,
    /// 응답에 포함된 일봉 (날짜 오름차순, 없으면 비어 있음)
    pub history: Vec<DailyBar>,
    /// 성공/실패
    pub outcome: FetchOutcome,
    /// 이 티커에 대해 수행한 총 Provider 호출 수
    pub attempts: u32,
    /// 이 티커 처리에 걸린 시간
    pub latency: Duration,
}

impl FetchResult {
    /// 성공 결과 생성.
    pub fn success(symbol: impl Into<String>, provider: impl Into<String>, payload: Payload) -> Self {
        Self {
            symbol: symbol.into(),
            provider: Some(provider.into()),
            fetched_at: Utc::now(),
            payload,
            history: Vec::new(),
            outcome: FetchOutcome::Success,
            attempts: 1,
            latency: Duration::ZERO,
        }
    }

    /// 실패 결과 생성.
    pub fn failure(
        symbol: impl Into<String>,
        provider: Option<String>,
        reason: FailureReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            provider,
            fetched_at: Utc::now(),
            payload: Payload::new(),
            history: Vec::new(),
            outcome: FetchOutcome::Failure {
                reason,
                message: message.into(),
            },
            attempts: 1,
            latency: Duration::ZERO,
        }
    }

    /// 수집 시각 지정 (테스트 및 재처리용).
    pub fn at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    /// 일봉 시계열 첨부. 날짜 오름차순으로 정렬하고 같은 날짜는 마지막 값만 남깁니다.
    pub fn with_history(mut self, mut history: Vec<DailyBar>) -> Self {
        history.sort_by_key(|bar| bar.date);
        history.reverse();
        history.dedup_by_key(|bar| bar.date);
        history.reverse();
        self.history = history;
        self
    }

    /// 시도 횟수와 소요 시간을 채운 최종 결과.
    pub fn with_stats(mut self, attempts: u32, latency: Duration) -> Self {
        self.attempts = attempts;
        self.latency = latency;
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match &self.outcome {
            FetchOutcome::Success => None,
            FetchOutcome::Failure { reason, .. } => Some(*reason),
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Success => None,
            FetchOutcome::Failure { message, .. } => Some(message),
        }
    }
}
