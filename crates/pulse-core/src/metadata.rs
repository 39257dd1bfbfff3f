//! 실행 메타데이터.
//!
//! 실행 시작 시 생성되고, 티커 처리가 끝날 때마다 요약이 추가되며,
//! 실행 종료 시 한 번 확정(finalize)되어 저장됩니다.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::types::{FailureReason, FetchResult, TickerDescriptor};

/// 실행 전체 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// 실행 중 (확정 전)
    Running,
    /// 모든 티커 성공
    Succeeded,
    /// 일부 티커 실패
    PartialFailure,
    /// 모든 티커 실패
    Failed,
    /// 외부 신호로 취소됨
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::PartialFailure => "partial_failure",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 집계 카운트.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// 처리 완료된 티커 수
    pub total: usize,
    /// 성공
    pub succeeded: usize,
    /// 실패
    pub failed: usize,
    /// 같은 Provider 재시도 횟수 합계
    pub retried: usize,
    /// 취소로 처리되지 못한 티커 수
    pub abandoned: usize,
}

impl RunCounts {
    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }
}

/// 티커별 요약.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerSummary {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    /// "success" 또는 "failure"
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub latency_ms: u64,
    pub attempts: u32,
    pub retries: u32,
}

/// 한 번의 실행에 대한 메타데이터 문서.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub counts: RunCounts,
    /// 심볼 → 요약
    pub tickers: BTreeMap<String, TickerSummary>,
    /// 취소로 처리되지 못한 심볼 (레지스트리 순서)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub abandoned: Vec<String>,
}

impl RunMetadata {
    /// 현재 시각으로 실행 시작.
    pub fn start() -> Self {
        Self::started_at(Utc::now())
    }

    pub fn started_at(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: None,
            status: RunStatus::Running,
            counts: RunCounts::default(),
            tickers: BTreeMap::new(),
            abandoned: Vec::new(),
        }
    }

    /// 원시 데이터 레코드의 키가 되는 실행 날짜 (UTC).
    pub fn run_date(&self) -> NaiveDate {
        self.started_at.date_naive()
    }

    /// 티커 처리 결과 추가.
    pub fn record(&mut self, ticker: &TickerDescriptor, result: &FetchResult, retries: u32) {
        self.counts.total += 1;
        self.counts.retried += retries as usize;
        if result.is_success() {
            self.counts.succeeded += 1;
        } else {
            self.counts.failed += 1;
        }

        let summary = TickerSummary {
            category: ticker.category.clone(),
            asset_type: ticker.asset_type.clone(),
            outcome: if result.is_success() {
                "success".to_string()
            } else {
                "failure".to_string()
            },
            reason: result.failure_reason(),
            message: result.failure_message().map(str::to_string),
            provider: result.provider.clone(),
            latency_ms: result.latency.as_millis() as u64,
            attempts: result.attempts,
            retries,
        };
        self.tickers.insert(result.symbol.clone(), summary);
    }

    /// 취소로 처리되지 못한 티커 기록.
    pub fn record_abandoned(&mut self, symbol: &str) {
        self.counts.abandoned += 1;
        self.abandoned.push(symbol.to_string());
    }

    /// 실행 확정. 종료 시각과 전체 상태를 채웁니다.
    pub fn finalize(&mut self, cancelled: bool) {
        self.finalize_at(Utc::now(), cancelled);
    }

    pub fn finalize_at(&mut self, finished_at: DateTime<Utc>, cancelled: bool) {
        self.finished_at = Some(finished_at);
        self.status = if cancelled {
            RunStatus::Cancelled
        } else if self.counts.failed == 0 {
            RunStatus::Succeeded
        } else if self.counts.succeeded == 0 {
            RunStatus::Failed
        } else {
            RunStatus::PartialFailure
        };
    }

    pub fn is_finalized(&self) -> bool {
        self.finished_at.is_some()
    }

    /// 실패한 티커 심볼 목록.
    pub fn failed_symbols(&self) -> Vec<&str> {
        self.tickers
            .iter()
            .filter(|(_, s)| s.outcome != "success")
            .map(|(symbol, _)| symbol.as_str())
            .collect()
    }
}
