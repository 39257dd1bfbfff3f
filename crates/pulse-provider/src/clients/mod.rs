//! Provider 구현체.
//!
//! - `AlphaVantageClient`: API 키 필요, 무료 등급 분당 5회 (12초 간격)
//! - `FinnhubClient`: API 키 필요, 무료 등급 분당 60회
//! - `YahooFinanceClient`: 키 불필요, 비공식 API
//! - `FredClient`: API 키 필요, 경제 지표 전용 (FRED 시리즈 ID)

pub mod alpha_vantage;
pub mod finnhub;
pub mod fred;
pub mod yahoo;

pub use alpha_vantage::AlphaVantageClient;
pub use finnhub::FinnhubClient;
pub use fred::FredClient;
pub use yahoo::YahooFinanceClient;

use std::time::Duration;

/// Provider 이름 상수.
pub const ALPHA_VANTAGE: &str = "alpha_vantage";
pub const FINNHUB: &str = "finnhub";
pub const YAHOO_FINANCE: &str = "yahoo_finance";
pub const FRED: &str = "fred";

/// 지원하는 모든 Provider 이름 (기본 우선순위 순서).
pub const ALL_PROVIDERS: [&str; 4] = [YAHOO_FINANCE, ALPHA_VANTAGE, FINNHUB, FRED];

/// 클라이언트 생성 설정.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// API 기본 URL (테스트 시 mock 서버 주소)
    pub base_url: String,
    /// 호출 간 최소 간격
    pub min_interval: Duration,
    /// 요청 타임아웃
    pub timeout: Duration,
    /// 일봉 시계열을 별도 호출로 받을지 여부 (Alpha Vantage).
    ///
    /// 무료 등급은 하루 호출 수가 적어 기본으로 꺼 둡니다. Yahoo Finance와 FRED는
    /// 시세 응답에 시계열이 함께 오므로 이 값과 무관합니다.
    pub daily_history: bool,
}

impl ProviderSettings {
    /// Provider별 기본값.
    pub fn defaults_for(provider: &str) -> Option<Self> {
        let (base_url, interval_ms) = match provider {
            ALPHA_VANTAGE => (alpha_vantage::DEFAULT_BASE_URL, 12_000),
            FINNHUB => (finnhub::DEFAULT_BASE_URL, 1_000),
            YAHOO_FINANCE => (yahoo::DEFAULT_BASE_URL, 1_000),
            FRED => (fred::DEFAULT_BASE_URL, 500),
            _ => return None,
        };
        Some(Self {
            base_url: base_url.to_string(),
            min_interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_secs(30),
            daily_history: false,
        })
    }

    /// 지정한 주소로 간격 제한 없이 (테스트용).
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            min_interval: Duration::ZERO,
            timeout: Duration::from_secs(5),
            daily_history: false,
        }
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_daily_history(mut self, daily_history: bool) -> Self {
        self.daily_history = daily_history;
        self
    }

    /// 끝의 '/'를 제거한 기본 URL.
    pub(crate) fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
