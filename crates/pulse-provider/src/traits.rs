//! Provider trait 정의.

use async_trait::async_trait;
use pulse_core::{DailyBar, FetchResult, Payload};
use secrecy::SecretString;

use crate::error::ProviderResult;

/// 통합 Provider 인터페이스.
///
/// 구현체는 어떤 에러도 밖으로 내보내지 않습니다. 네트워크/파싱/한도 에러는 모두
/// 분류된 사유를 가진 `FetchOutcome::Failure`로 변환됩니다.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider 이름 (레지스트리의 `api_source`, 자격증명 키와 같은 값).
    fn name(&self) -> &str;

    /// API 키가 반드시 필요한지 여부.
    fn requires_credentials(&self) -> bool;

    /// 자기 심볼 체계를 가진 Provider인지 여부.
    ///
    /// 전용 Provider(예: FRED 시리즈 ID)는 레지스트리에서 직접 지정한 티커에만 쓰이며
    /// 다른 Provider와 서로 대체되지 않습니다.
    fn is_dedicated(&self) -> bool {
        false
    }

    /// 한 심볼의 시세 수집.
    async fn fetch(&self, symbol: &str, credentials: Option<&SecretString>) -> FetchResult;
}

/// 클라이언트 내부 결과: 정규화된 필드와 선택적인 일봉 시계열.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quote {
    pub fields: Payload,
    pub history: Vec<DailyBar>,
}

impl Quote {
    pub fn with_history(mut self, history: Vec<DailyBar>) -> Self {
        self.history = history;
        self
    }
}

impl From<Payload> for Quote {
    fn from(fields: Payload) -> Self {
        Self {
            fields,
            history: Vec::new(),
        }
    }
}

/// 내부 결과를 `FetchResult`로 변환하면서 로그를 남깁니다.
pub fn into_fetch_result(
    provider: &str,
    symbol: &str,
    result: ProviderResult<Quote>,
) -> FetchResult {
    match result {
        Ok(quote) => {
            tracing::debug!(
                provider = provider,
                symbol = symbol,
                fields = quote.fields.len(),
                bars = quote.history.len(),
                "시세 조회 완료"
            );
            FetchResult::success(symbol, provider, quote.fields).with_history(quote.history)
        }
        Err(e) => {
            let reason = e.reason();
            tracing::debug!(
                provider = provider,
                symbol = symbol,
                reason = %reason,
                error = %e,
                "시세 조회 실패"
            );
            FetchResult::failure(symbol, Some(provider.to_string()), reason, e.to_string())
        }
    }
}
