//! 같은 Provider 재시도 정책.
//!
//! 지연 = min(initial_delay * 2^(attempt-1), max_delay)에 [1-jitter, 1+jitter] 범위의
//! 임의 배율을 곱한 뒤 다시 max_delay로 제한합니다.

use rand::Rng;
use std::time::Duration;

/// 재시도 설정.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// 같은 Provider에 대한 최대 재시도 횟수 (최초 시도 제외)
    pub max_retries: u32,
    /// 첫 재시도 전 대기
    pub initial_delay: Duration,
    /// 대기 상한
    pub max_delay: Duration,
    /// 지터 비율 (0.0 ~ 1.0). 유한하지 않은 값은 지터 없음으로 취급합니다.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration, jitter_factor: f64) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            jitter_factor: if jitter_factor.is_finite() {
                jitter_factor.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    /// 대기 없는 설정 (테스트용).
    pub fn no_delay(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_factor: 0.0,
        }
    }

    /// `attempt`번째 재시도 전 대기 시간 (1부터 시작).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let base = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay);

        // NaN도 여기서 걸러짐
        if !(self.jitter_factor > 0.0) || base.is_zero() {
            return base;
        }

        let jitter = self.jitter_factor.min(1.0);
        let factor = rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter));
        base.mul_f64(factor).min(self.max_delay)
    }
}
