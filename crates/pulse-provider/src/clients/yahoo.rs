//! Yahoo Finance 클라이언트 (v8 chart API).
//!
//! `GET /v8/finance/chart/{symbol}?range=5d&interval=1d`
//!
//! API 키가 필요 없으며 `^GSPC`, `BTC-USD`, `EURUSD=X` 같은 심볼을 그대로 받습니다.
//! 현재가는 `meta`에서, 시가/고가/저가/거래량은 마지막 유효 일봉에서 가져옵니다.
//! 종가가 있는 일봉은 모두 시계열로 함께 돌려주며, 날짜는 거래소 현지 시간 기준입니다.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pulse_core::{decimal_from_f64, DailyBar, FetchResult, Payload};
use reqwest::{Client, Url};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;

use super::{ProviderSettings, YAHOO_FINANCE};
use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, get_json};
use crate::rate_limit::RateLimiter;
use crate::traits::{into_fetch_result, ProviderClient, Quote};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    currency: Option<String>,
    exchange_name: Option<String>,
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_volume: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_time: Option<i64>,
    /// 거래소 UTC 오프셋 (초)
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBars>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteBars {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl QuoteBars {
    /// 종가가 있는 마지막 봉의 인덱스.
    fn last_complete(&self) -> Option<usize> {
        self.close.iter().rposition(Option::is_some)
    }

    fn value(series: &[Option<f64>], index: usize) -> Option<f64> {
        series.get(index).copied().flatten()
    }

    /// 종가가 있는 봉만 골라 일봉으로 변환.
    fn daily_bars(&self, timestamps: &[i64], gmtoffset: i64) -> Vec<DailyBar> {
        timestamps
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let date = Utc.timestamp_opt(ts + gmtoffset, 0).single()?.date_naive();
                let close = decimal_from_f64(Self::value(&self.close, i)?)?;
                let field = |series: &[Option<f64>]| Self::value(series, i).and_then(decimal_from_f64);
                Some(DailyBar {
                    date,
                    open: field(&self.open),
                    high: field(&self.high),
                    low: field(&self.low),
                    close,
                    volume: field(&self.volume),
                })
            })
            .collect()
    }
}

/// Yahoo Finance 클라이언트.
pub struct YahooFinanceClient {
    client: Client,
    settings: ProviderSettings,
    limiter: Arc<RateLimiter>,
}

impl YahooFinanceClient {
    pub fn new(settings: ProviderSettings) -> ProviderResult<Self> {
        let limiter = Arc::new(RateLimiter::new(YAHOO_FINANCE, settings.min_interval));
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

    /// 심볼을 경로 세그먼트로 인코딩한 chart URL.
    fn chart_url(&self, symbol: &str) -> ProviderResult<Url> {
        let mut url = Url::parse(self.settings.base())
            .map_err(|e| ProviderError::MalformedResponse(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::MalformedResponse("base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }

    async fn fetch_chart(&self, symbol: &str) -> ProviderResult<Quote> {
        let url = self.chart_url(symbol)?;
        let request = self
            .client
            .get(url)
            .query(&[("range", "5d"), ("interval", "1d")]);

        self.limiter.acquire().await;
        let response = get_json::<ChartEnvelope>(request).await?;
        parse_chart(symbol, response.body.chart)
    }
}

#[async_trait]
impl ProviderClient for YahooFinanceClient {
    fn name(&self) -> &str {
        YAHOO_FINANCE
    }

    fn requires_credentials(&self) -> bool {
        false
    }

    async fn fetch(&self, symbol: &str, _credentials: Option<&SecretString>) -> FetchResult {
        let result = match symbol.trim() {
            "" => Err(ProviderError::NotFound("empty symbol".to_string())),
            trimmed => self.fetch_chart(trimmed).await,
        };
        into_fetch_result(YAHOO_FINANCE, symbol, result)
    }
}

fn parse_chart(symbol: &str, chart: Chart) -> ProviderResult<Quote> {
    if let Some(error) = chart.error {
        let detail = format!("{}: {}", error.code, error.description);
        return Err(if error.code.eq_ignore_ascii_case("not found") {
            ProviderError::NotFound(detail)
        } else {
            ProviderError::MalformedResponse(detail)
        });
    }

    let result = chart
        .result
        .and_then(|mut results| (!results.is_empty()).then(|| results.swap_remove(0)))
        .ok_or_else(|| ProviderError::NotFound(format!("no chart data for {}", symbol)))?;

    let meta = result.meta;
    let timestamps = result.timestamp;
    let bars = result
        .indicators
        .and_then(|mut i| (!i.quote.is_empty()).then(|| i.quote.swap_remove(0)))
        .unwrap_or_default();
    let last = bars.last_complete();
    let bar = |series: &[Option<f64>]| last.and_then(|i| QuoteBars::value(series, i));

    let price = meta
        .regular_market_price
        .or_else(|| bar(&bars.close))
        .ok_or_else(|| {
            ProviderError::MalformedResponse(format!("chart for {} has no price", symbol))
        })?;

    let mut payload = Payload::new();
    payload.insert_f64("price", price);

    let previous_close = meta.previous_close.or(meta.chart_previous_close);
    let numbers = [
        ("previous_close", previous_close),
        ("open", bar(&bars.open)),
        ("high", meta.regular_market_day_high.or_else(|| bar(&bars.high))),
        ("low", meta.regular_market_day_low.or_else(|| bar(&bars.low))),
        ("volume", meta.regular_market_volume.or_else(|| bar(&bars.volume))),
    ];
    for (field, value) in numbers {
        if let Some(value) = value {
            payload.insert_f64(field, value);
        }
    }

    if let Some(prev) = previous_close.filter(|p| *p != 0.0) {
        payload.insert_f64("change", price - prev);
        payload.insert_f64("change_percent", (price - prev) / prev * 100.0);
    }

    if let Some(currency) = meta.currency {
        payload.insert("currency", currency);
    }
    if let Some(exchange) = meta.exchange_name {
        payload.insert("exchange", exchange);
    }
    if let Some(time) = meta
        .regular_market_time
        .and_then(|t| Utc.timestamp_opt(t, 0).single())
    {
        payload.insert("market_time", time.to_rfc3339());
    }

    let history = bars.daily_bars(&timestamps, meta.gmtoffset.unwrap_or(0));
    Ok(Quote::from(payload).with_history(history))
}
