//! 티커 디스크립터.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 한 번의 실행에서 수집할 티커.
///
/// 실행 시작 시 레지스트리에서 만들어지며 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerDescriptor {
    /// 심볼 (예: "NVDA", "BTC-USD", "^VIX")
    pub symbol: String,
    /// 분류 라벨 (예: "AI indicator", "volatility", "crypto")
    pub category: String,
    /// 자산 유형 (stock, etf, crypto, index, indicator ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    /// 먼저 시도할 Provider 이름
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_provider: Option<String>,
}

impl TickerDescriptor {
    pub fn new(symbol: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            category: category.into(),
            asset_type: None,
            preferred_provider: None,
        }
    }

    pub fn with_asset_type(mut self, asset_type: impl Into<String>) -> Self {
        self.asset_type = Some(asset_type.into());
        self
    }

    pub fn with_preferred_provider(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    /// "BASE-QUOTE" 형식의 암호화폐 페어인지 확인.
    pub fn is_crypto_pair(&self) -> bool {
        self.asset_type.as_deref() == Some("crypto") || split_pair(&self.symbol).is_some()
    }
}

impl fmt::Display for TickerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.category)
    }
}

/// "BTC-USD" → ("BTC", "USD").
///
/// 양쪽 모두 2~10자의 영문/숫자일 때만 페어로 인정합니다. "BRK-B" 같은 주식 클래스 표기는
/// 오른쪽이 한 글자이므로 제외됩니다.
pub fn split_pair(symbol: &str) -> Option<(&str, &str)> {
    let (base, quote) = symbol.split_once('-')?;
    let valid = |s: &str| (2..=10).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric());
    if valid(base) && valid(quote) {
        Some((base, quote))
    } else {
        None
    }
}
