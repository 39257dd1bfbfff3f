//! Finnhub 클라이언트.
//!
//! `GET /api/v1/quote?symbol=AAPL&token=...`
//!
//! 응답 필드: `c` 현재가, `d` 변동, `dp` 변동률, `h` 고가, `l` 저가, `o` 시가,
//! `pc` 전일 종가, `t` 시각 (Unix 초). 존재하지 않는 심볼은 모든 값이 0으로 옵니다.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pulse_core::{FetchResult, Payload};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;

use super::{ProviderSettings, FINNHUB};
use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, get_json};
use crate::rate_limit::RateLimiter;
use crate::traits::{into_fetch_result, ProviderClient, Quote};

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io";

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    c: Option<f64>,
    d: Option<f64>,
    dp: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    o: Option<f64>,
    pc: Option<f64>,
    t: Option<i64>,
}

/// Finnhub 클라이언트.
pub struct FinnhubClient {
    client: Client,
    settings: ProviderSettings,
    limiter: Arc<RateLimiter>,
}

impl FinnhubClient {
    pub fn new(settings: ProviderSettings) -> ProviderResult<Self> {
        let limiter = Arc::new(RateLimiter::new(FINNHUB, settings.min_interval));
        Self::with_limiter(settings, limiter)
    }

    /// 외부에서 만든 `RateLimiter`를 주입하여 생성.
    pub fn with_limiter(settings: ProviderSettings, limiter: Arc<RateLimiter>) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(settings.timeout)?,
            settings,
            limiter,
        })
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    async fn fetch_quote(&self, symbol: &str, token: &str) -> ProviderResult<Quote> {
        let url = format!("{}/api/v1/quote", self.settings.base());
        let request = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("token", token)]);

        self.limiter.acquire().await;
        let response = get_json::<QuoteResponse>(request).await?;
        if let Some(remaining) = response.remaining_quota {
            self.limiter.record_quota(remaining).await;
        }

        parse_quote(symbol, response.body).map(Quote::from)
    }
}

#[async_trait]
impl ProviderClient for FinnhubClient {
    fn name(&self) -> &str {
        FINNHUB
    }

    fn requires_credentials(&self) -> bool {
        true
    }

    async fn fetch(&self, symbol: &str, credentials: Option<&SecretString>) -> FetchResult {
        let result = match (symbol.trim(), credentials) {
            ("", _) => Err(ProviderError::NotFound("empty symbol".to_string())),
            (_, None) => Err(ProviderError::Unauthorized(
                "FINNHUB_API_KEY is not configured".to_string(),
            )),
            (symbol, Some(key)) => self.fetch_quote(symbol, key.expose_secret()).await,
        };
        into_fetch_result(FINNHUB, symbol, result)
    }
}

fn parse_quote(symbol: &str, quote: QuoteResponse) -> ProviderResult<Payload> {
    let price = quote.c.ok_or_else(|| {
        ProviderError::MalformedResponse(format!("quote for {} has no price", symbol))
    })?;

    // 알 수 없는 심볼: {"c":0,"d":null,...,"t":0}
    if price == 0.0 && quote.t.unwrap_or(0) == 0 {
        return Err(ProviderError::NotFound(symbol.to_string()));
    }

    let mut payload = Payload::new();
    payload.insert_f64("price", price);
    let optional = [
        ("change", quote.d),
        ("change_percent", quote.dp),
        ("high", quote.h),
        ("low", quote.l),
        ("open", quote.o),
        ("previous_close", quote.pc),
    ];
    for (field, value) in optional {
        if let Some(value) = value {
            payload.insert_f64(field, value);
        }
    }

    if let Some(time) = quote
        .t
        .filter(|t| *t > 0)
        .and_then(|t| Utc.timestamp_opt(t, 0).single())
    {
        payload.insert("market_time", time.to_rfc3339());
    }

    Ok(payload)
}
