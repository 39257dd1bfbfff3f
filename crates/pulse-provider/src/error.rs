//! Provider 에러 타입.
//!
//! 이 에러는 클라이언트 내부에서만 쓰이며, `ProviderClient::fetch` 경계에서
//! `FetchOutcome::Failure`로 변환됩니다.

use pulse_core::FailureReason;
use reqwest::StatusCode;
use thiserror::Error;

/// Provider 호출 에러.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 요청 한도 초과
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// 심볼을 찾을 수 없음
    #[error("Symbol not found: {0}")]
    NotFound(String),

    /// 타임아웃/연결 실패/일시적 서버 오류
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 응답 파싱 실패
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// Provider 작업을 위한 Result 타입.
pub type ProviderResult<T> = Result<T, ProviderError>;

impl ProviderError {
    /// 분류된 실패 사유.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::RateLimited(_) => FailureReason::RateLimited,
            Self::NotFound(_) => FailureReason::NotFound,
            Self::Timeout(_) => FailureReason::Timeout,
            Self::MalformedResponse(_) => FailureReason::MalformedResponse,
            Self::Unauthorized(_) => FailureReason::AuthError,
        }
    }

    /// 성공이 아닌 HTTP 상태 코드를 분류.
    ///
    /// - 401, 403 → 인증 에러
    /// - 404 → 심볼 없음
    /// - 429 → 요청 한도 초과
    /// - 408, 5xx → 일시적 실패 (타임아웃으로 취급)
    /// - 그 외 → 응답 형식 에러
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(detail),
            StatusCode::NOT_FOUND => Self::NotFound(detail),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited(detail),
            StatusCode::REQUEST_TIMEOUT => Self::Timeout(detail),
            s if s.is_server_error() => Self::Timeout(detail),
            _ => Self::MalformedResponse(detail),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            ProviderError::Timeout(err.to_string())
        } else {
            ProviderError::MalformedResponse(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::MalformedResponse(err.to_string())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let reason = |code: u16| {
            ProviderError::from_status(StatusCode::from_u16(code).unwrap(), "").reason()
        };

        assert_eq!(reason(401), FailureReason::AuthError);
        assert_eq!(reason(403), FailureReason::AuthError);
        assert_eq!(reason(404), FailureReason::NotFound);
        assert_eq!(reason(429), FailureReason::RateLimited);
        assert_eq!(reason(408), FailureReason::Timeout);
        assert_eq!(reason(503), FailureReason::Timeout);
        assert_eq!(reason(400), FailureReason::MalformedResponse);
    }

    #[test]
    fn test_json_error_is_malformed() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(
            ProviderError::from(err).reason(),
            FailureReason::MalformedResponse
        );
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        assert_eq!(truncate("가나다라", 2), "가나");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
