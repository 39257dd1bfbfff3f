//! 외부 시장 데이터 Provider 클라이언트.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `ProviderClient` trait: Provider 중립적 수집 인터페이스
//! - Alpha Vantage / Finnhub / Yahoo Finance / FRED 클라이언트
//! - Provider별 요청 간격 관리 (`RateLimiter`)
//! - HTTP 응답 → 실패 사유 분류

pub mod clients;
pub mod error;
pub mod http;
pub mod rate_limit;
pub mod traits;

pub use clients::{
    AlphaVantageClient, FinnhubClient, FredClient, ProviderSettings, YahooFinanceClient,
    ALPHA_VANTAGE, FINNHUB, FRED, YAHOO_FINANCE,
};
pub use error::{ProviderError, ProviderResult};
pub use rate_limit::RateLimiter;
pub use traits::{into_fetch_result, ProviderClient, Quote};
