//! 수집 통계 구조체.

use pulse_core::{RunMetadata, RunStatus};
use std::time::Duration;

/// 실행 통계
#[derive(Debug, Clone, Default)]
pub struct CollectionStats {
    /// 처리 완료된 티커 수
    pub total: usize,
    /// 성공 횟수
    pub success: usize,
    /// 실패 횟수
    pub errors: usize,
    /// 같은 Provider 재시도 합계
    pub retried: usize,
    /// 취소로 처리되지 못한 티커 수
    pub abandoned: usize,
    /// 저장된 원시 레코드 수
    pub records_written: usize,
    /// 소요 시간
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 메타데이터 집계에서 생성
    pub fn from_metadata(metadata: &RunMetadata, records_written: usize, elapsed: Duration) -> Self {
        Self {
            total: metadata.counts.total,
            success: metadata.counts.succeeded,
            errors: metadata.counts.failed,
            retried: metadata.counts.retried,
            abandoned: metadata.counts.abandoned,
            records_written,
            elapsed,
        }
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, status: RunStatus) {
        tracing::info!(
            status = %status,
            total = self.total,
            success = self.success,
            errors = self.errors,
            retried = self.retried,
            abandoned = self.abandoned,
            records_written = self.records_written,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}
