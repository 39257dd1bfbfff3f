//! Alpha Vantage 클라이언트.
//!
//! # 엔드포인트
//!
//! - 주식/ETF: `GET /query?function=GLOBAL_QUOTE&symbol=NVDA&apikey=...`
//! - 암호화폐 페어 (`BTC-USD`): `GET /query?function=CURRENCY_EXCHANGE_RATE&from_currency=BTC&to_currency=USD&apikey=...`
//!
//! `daily_history`가 켜져 있으면 일봉을 한 번 더 요청합니다 (호출 수 2배):
//! - 주식/ETF: `function=TIME_SERIES_DAILY&outputsize=compact`
//! - 암호화폐 페어: `function=DIGITAL_CURRENCY_DAILY&symbol=BTC&market=USD`
//!
//! 일봉 요청이 실패해도 시세는 그대로 성공으로 돌려줍니다.
//!
//! # 에러 응답
//!
//! Alpha Vantage는 한도 초과나 잘못된 요청에도 HTTP 200을 돌려줍니다. 본문의 키로 구분합니다:
//! - `Note` / `Information`: 요청 한도 초과
//! - `Error Message`: API 키 문제면 인증 에러, 그 외에는 잘못된 심볼
//! - 빈 `Global Quote`: 심볼 없음

use async_trait::async_trait;
use chrono::NaiveDate;
use pulse_core::types::ticker::split_pair;
use pulse_core::{parse_decimal, DailyBar, FetchResult, Payload};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::Arc;

use super::{ProviderSettings, ALPHA_VANTAGE};
use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, get_json};
use crate::rate_limit::RateLimiter;
use crate::traits::{into_fetch_result, ProviderClient, Quote};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// Global Quote 필드 → 정규화된 필드 이름.
const QUOTE_FIELDS: [(&str, &str); 8] = [
    ("02. open", "open"),
    ("03. high", "high"),
    ("04. low", "low"),
    ("05. price", "price"),
    ("06. volume", "volume"),
    ("08. previous close", "previous_close"),
    ("09. change", "change"),
    ("10. change percent", "change_percent"),
];

/// Alpha Vantage 클라이언트.
pub struct AlphaVantageClient {
    client: Client,
    settings: ProviderSettings,
    limiter: Arc<RateLimiter>,
}

impl AlphaVantageClient {
    pub fn new(settings: ProviderSettings) -> ProviderResult<Self> {
        let limiter = Arc::new(RateLimiter::new(ALPHA_VANTAGE, settings.min_interval));
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

    async fn fetch_quote(&self, symbol: &str, api_key: &str) -> ProviderResult<Quote> {
        let fields = self.fetch_fields(symbol, api_key).await?;
        if !self.settings.daily_history {
            return Ok(Quote::from(fields));
        }

        match self.fetch_daily(symbol, api_key).await {
            Ok(history) => Ok(Quote::from(fields).with_history(history)),
            Err(e) => {
                tracing::warn!(symbol = symbol, error = %e, "일봉 조회 실패, 시세만 저장");
                Ok(Quote::from(fields))
            }
        }
    }

    async fn fetch_fields(&self, symbol: &str, api_key: &str) -> ProviderResult<Payload> {
        let url = format!("{}/query", self.settings.base());
        let request = match split_pair(symbol) {
            Some((from, to)) => self.client.get(&url).query(&[
                ("function", "CURRENCY_EXCHANGE_RATE"),
                ("from_currency", from),
                ("to_currency", to),
                ("apikey", api_key),
            ]),
            None => self.client.get(&url).query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", api_key),
            ]),
        };

        self.limiter.acquire().await;
        let response = get_json::<Value>(request).await?;
        check_api_messages(&response.body)?;

        if split_pair(symbol).is_some() {
            parse_exchange_rate(symbol, &response.body)
        } else {
            parse_global_quote(symbol, &response.body)
        }
    }

    async fn fetch_daily(&self, symbol: &str, api_key: &str) -> ProviderResult<Vec<DailyBar>> {
        let url = format!("{}/query", self.settings.base());
        let (request, series_key) = match split_pair(symbol) {
            Some((base, market)) => (
                self.client.get(&url).query(&[
                    ("function", "DIGITAL_CURRENCY_DAILY"),
                    ("symbol", base),
                    ("market", market),
                    ("apikey", api_key),
                ]),
                "Time Series (Digital Currency Daily)",
            ),
            None => (
                self.client.get(&url).query(&[
                    ("function", "TIME_SERIES_DAILY"),
                    ("symbol", symbol),
                    ("outputsize", "compact"),
                    ("apikey", api_key),
                ]),
                "Time Series (Daily)",
            ),
        };

        self.limiter.acquire().await;
        let response = get_json::<Value>(request).await?;
        check_api_messages(&response.body)?;
        parse_daily_series(&response.body, series_key)
    }
}

#[async_trait]
impl ProviderClient for AlphaVantageClient {
    fn name(&self) -> &str {
        ALPHA_VANTAGE
    }

    fn requires_credentials(&self) -> bool {
        true
    }

    async fn fetch(&self, symbol: &str, credentials: Option<&SecretString>) -> FetchResult {
        let result = match (symbol.trim(), credentials) {
            ("", _) => Err(ProviderError::NotFound("empty symbol".to_string())),
            (_, None) => Err(ProviderError::Unauthorized(
                "ALPHA_VANTAGE_API_KEY is not configured".to_string(),
            )),
            (symbol, Some(key)) => self.fetch_quote(symbol, key.expose_secret()).await,
        };
        into_fetch_result(ALPHA_VANTAGE, symbol, result)
    }
}

/// 본문에 담긴 한도/에러 메시지 확인.
fn check_api_messages(body: &Value) -> ProviderResult<()> {
    if let Some(note) = body
        .get("Note")
        .or_else(|| body.get("Information"))
        .and_then(Value::as_str)
    {
        return Err(ProviderError::RateLimited(note.to_string()));
    }

    if let Some(message) = body.get("Error Message").and_then(Value::as_str) {
        let lower = message.to_lowercase();
        if lower.contains("apikey") || lower.contains("api key") {
            return Err(ProviderError::Unauthorized(message.to_string()));
        }
        return Err(ProviderError::NotFound(message.to_string()));
    }

    Ok(())
}

fn parse_global_quote(symbol: &str, body: &Value) -> ProviderResult<Payload> {
    let quote = body
        .get("Global Quote")
        .and_then(Value::as_object)
        .ok_or_else(|| ProviderError::MalformedResponse("missing 'Global Quote'".to_string()))?;

    if quote.is_empty() {
        return Err(ProviderError::NotFound(symbol.to_string()));
    }

    let mut payload = Payload::new();
    for (source, target) in QUOTE_FIELDS {
        if let Some(raw) = quote.get(source).and_then(Value::as_str) {
            payload.insert_parsed(target, raw);
        }
    }
    if let Some(day) = quote.get("07. latest trading day").and_then(Value::as_str) {
        payload.insert("latest_trading_day", day);
    }

    if !payload.contains("price") {
        return Err(ProviderError::MalformedResponse(format!(
            "quote for {} has no price",
            symbol
        )));
    }
    Ok(payload)
}

fn parse_exchange_rate(symbol: &str, body: &Value) -> ProviderResult<Payload> {
    let rate = body
        .get("Realtime Currency Exchange Rate")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            ProviderError::MalformedResponse("missing 'Realtime Currency Exchange Rate'".to_string())
        })?;

    if rate.is_empty() {
        return Err(ProviderError::NotFound(symbol.to_string()));
    }

    let mut payload = Payload::new();
    let text = |key: &str| rate.get(key).and_then(Value::as_str);

    if let Some(raw) = text("5. Exchange Rate") {
        payload.insert_parsed("price", raw);
    }
    if let Some(raw) = text("8. Bid Price") {
        payload.insert_parsed("bid", raw);
    }
    if let Some(raw) = text("9. Ask Price") {
        payload.insert_parsed("ask", raw);
    }
    if let Some(currency) = text("3. To_Currency Code") {
        payload.insert("currency", currency);
    }
    if let Some(refreshed) = text("6. Last Refreshed") {
        payload.insert("market_time", refreshed);
    }

    if !payload.contains("price") {
        return Err(ProviderError::MalformedResponse(format!(
            "exchange rate for {} has no price",
            symbol
        )));
    }
    Ok(payload)
}

/// 일봉 시계열 파싱.
///
/// 디지털 통화 응답은 `"1a. open (USD)"` 형식(구버전)과 `"1. open"` 형식을 모두 받습니다.
fn parse_daily_series(body: &Value, series_key: &str) -> ProviderResult<Vec<DailyBar>> {
    let series = body
        .get(series_key)
        .and_then(Value::as_object)
        .ok_or_else(|| ProviderError::MalformedResponse(format!("missing '{}'", series_key)))?;

    let mut bars: Vec<DailyBar> = series
        .iter()
        .filter_map(|(day, values)| {
            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
            let values = values.as_object()?;
            let field = |name: &str| {
                values
                    .iter()
                    .find(|(key, _)| daily_key_matches(key, name))
                    .and_then(|(_, v)| v.as_str())
                    .and_then(parse_decimal)
            };
            Some(DailyBar {
                date,
                open: field("open"),
                high: field("high"),
                low: field("low"),
                close: field("close")?,
                volume: field("volume"),
            })
        })
        .collect();

    bars.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(bars)
}

/// `"1. open"`, `"1a. open (USD)"` 둘 다 "open"으로 인식.
fn daily_key_matches(key: &str, name: &str) -> bool {
    let label = key.split_once(". ").map_or(key, |(_, rest)| rest);
    let label = label.split_once(" (").map_or(label, |(head, _)| head);
    label == name
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use pulse_core::FailureReason;
    use rust_decimal_macros::dec;

    const GLOBAL_QUOTE: &str = r#"{
        "Global Quote": {
            "01. symbol": "NVDA",
            "02. open": "135.0000",
            "03. high": "137.2500",
            "04. low": "134.1000",
            "05. price": "136.5000",
            "06. volume": "210000000",
            "07. latest trading day": "2024-01-02",
            "08. previous close": "134.9000",
            "09. change": "1.6000",
            "10. change percent": "1.1861%"
        }
    }"#;

    fn key() -> SecretString {
        SecretString::from("demo".to_string())
    }

    async fn client_for(server: &mockito::Server) -> AlphaVantageClient {
        AlphaVantageClient::new(ProviderSettings::for_base_url(server.url())).unwrap()
    }

    #[tokio::test]
    async fn test_global_quote_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("function".into(), "GLOBAL_QUOTE".into()),
                Matcher::UrlEncoded("symbol".into(), "NVDA".into()),
                Matcher::UrlEncoded("apikey".into(), "demo".into()),
            ]))
            .with_status(200)
            .with_body(GLOBAL_QUOTE)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let result = client.fetch("NVDA", Some(&key())).await;

        mock.assert_async().await;
        assert!(result.is_success());
        assert_eq!(result.provider.as_deref(), Some(ALPHA_VANTAGE));
        assert_eq!(result.payload.number("price"), Some(dec!(136.5)));
        assert_eq!(result.payload.number("volume"), Some(dec!(210000000)));
        assert_eq!(result.payload.number("change_percent"), Some(dec!(1.1861)));
        assert_eq!(result.payload.text("latest_trading_day"), Some("2024-01-02"));
    }

    #[tokio::test]
    async fn test_crypto_pair_uses_exchange_rate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("function".into(), "CURRENCY_EXCHANGE_RATE".into()),
                Matcher::UrlEncoded("from_currency".into(), "BTC".into()),
                Matcher::UrlEncoded("to_currency".into(), "USD".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"Realtime Currency Exchange Rate": {
                    "1. From_Currency Code": "BTC",
                    "3. To_Currency Code": "USD",
                    "5. Exchange Rate": "42000.50000000",
                    "6. Last Refreshed": "2024-01-02 12:00:01",
                    "8. Bid Price": "42000.10000000",
                    "9. Ask Price": "42000.90000000"
                }}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server).await;
        let result = client.fetch("BTC-USD", Some(&key())).await;

        mock.assert_async().await;
        assert!(result.is_success());
        assert_eq!(result.payload.number("price"), Some(dec!(42000.5)));
        assert_eq!(result.payload.text("currency"), Some("USD"));
    }

    fn history_client(server: &mockito::Server) -> AlphaVantageClient {
        AlphaVantageClient::new(ProviderSettings::for_base_url(server.url()).with_daily_history(true))
            .unwrap()
    }

    #[tokio::test]
    async fn test_daily_history_for_stock() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("function".into(), "GLOBAL_QUOTE".into()))
            .with_status(200)
            .with_body(GLOBAL_QUOTE)
            .create_async()
            .await;
        let daily = server
            .mock("GET", "/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("function".into(), "TIME_SERIES_DAILY".into()),
                Matcher::UrlEncoded("outputsize".into(), "compact".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"Meta Data": {"2. Symbol": "NVDA"},
                    "Time Series (Daily)": {
                        "2023-12-29": {"1. open": "498.1300", "2. high": "499.9700", "3. low": "487.5100", "4. close": "495.2200", "5. volume": "38869000"},
                        "2024-01-02": {"1. open": "492.4400", "2. high": "494.0000", "3. low": "475.0900", "4. close": "481.6800", "5. volume": "41125400"}
                    }}"#,
            )
            .create_async()
            .await;

        let client = history_client(&server);
        let result = client.fetch("NVDA", Some(&key())).await;

        daily.assert_async().await;
        assert!(result.is_success());
        assert_eq!(result.history.len(), 2);
        // 최신 날짜가 먼저
        assert_eq!(result.history[0].date.to_string(), "2024-01-02");
        assert_eq!(result.history[0].close, dec!(481.68));
        assert_eq!(result.history[1].open, Some(dec!(498.13)));
        assert_eq!(result.history[1].volume, Some(dec!(38869000)));
    }

    #[tokio::test]
    async fn test_daily_history_for_crypto_pair() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("function".into(), "CURRENCY_EXCHANGE_RATE".into()))
            .with_status(200)
            .with_body(r#"{"Realtime Currency Exchange Rate": {"5. Exchange Rate": "42000.5"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("function".into(), "DIGITAL_CURRENCY_DAILY".into()),
                Matcher::UrlEncoded("symbol".into(), "BTC".into()),
                Matcher::UrlEncoded("market".into(), "USD".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"Time Series (Digital Currency Daily)": {
                    "2024-01-02": {"1a. open (USD)": "42280.2", "2a. high (USD)": "45899.7", "3a. low (USD)": "42180.8", "4a. close (USD)": "44943.6", "5. volume": "75316.4"},
                    "2024-01-01": {"1. open": "42283.6", "2. high": "44184.1", "3. low": "42180.8", "4. close": "44179.5", "5. volume": "27174.3"}
                }}"#,
            )
            .create_async()
            .await;

        let client = history_client(&server);
        let result = client.fetch("BTC-USD", Some(&key())).await;

        assert!(result.is_success());
        assert_eq!(result.history.len(), 2);
        assert_eq!(result.history[0].close, dec!(44943.6));
        assert_eq!(result.history[0].high, Some(dec!(45899.7)));
        assert_eq!(result.history[1].close, dec!(44179.5));
    }

    #[tokio::test]
    async fn test_daily_history_failure_keeps_quote() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("function".into(), "GLOBAL_QUOTE".into()))
            .with_status(200)
            .with_body(GLOBAL_QUOTE)
            .create_async()
            .await;
        server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("function".into(), "TIME_SERIES_DAILY".into()))
            .with_status(200)
            .with_body(r#"{"Information": "Thank you for using Alpha Vantage! Please consider spreading out your free API requests more sparingly (1 request per second)."}"#)
            .create_async()
            .await;

        let client = history_client(&server);
        let result = client.fetch("NVDA", Some(&key())).await;

        assert!(result.is_success());
        assert_eq!(result.payload.number("price"), Some(dec!(136.5)));
        assert!(result.history.is_empty());
    }

    #[tokio::test]
    async fn test_daily_history_off_by_default() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("function".into(), "GLOBAL_QUOTE".into()))
            .with_status(200)
            .with_body(GLOBAL_QUOTE)
            .create_async()
            .await;
        let daily = server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("function".into(), "TIME_SERIES_DAILY".into()))
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert!(client.fetch("NVDA", Some(&key())).await.is_success());
        daily.assert_async().await;
    }

    #[test]
    fn test_daily_key_matches() {
        assert!(daily_key_matches("1. open", "open"));
        assert!(daily_key_matches("1a. open (USD)", "open"));
        assert!(daily_key_matches("5. volume", "volume"));
        assert!(!daily_key_matches("1b. open (USD)", "close"));
    }

    #[tokio::test]
    async fn test_note_means_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let result = client.fetch("NVDA", Some(&key())).await;
        assert_eq!(result.failure_reason(), Some(FailureReason::RateLimited));
    }

    #[tokio::test]
    async fn test_error_message_classification() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("symbol".into(), "NOPE".into()))
            .with_status(200)
            .with_body(r#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("symbol".into(), "NVDA".into()))
            .with_status(200)
            .with_body(r#"{"Error Message": "the parameter apikey is invalid or missing."}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert_eq!(
            client.fetch("NOPE", Some(&key())).await.failure_reason(),
            Some(FailureReason::NotFound)
        );
        assert_eq!(
            client.fetch("NVDA", Some(&key())).await.failure_reason(),
            Some(FailureReason::AuthError)
        );
    }

    #[tokio::test]
    async fn test_empty_quote_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"Global Quote": {}}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let result = client.fetch("ZZZZ", Some(&key())).await;
        assert_eq!(result.failure_reason(), Some(FailureReason::NotFound));
    }

    #[tokio::test]
    async fn test_garbage_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let client = client_for(&server).await;
        let result = client.fetch("NVDA", Some(&key())).await;
        assert_eq!(result.failure_reason(), Some(FailureReason::MalformedResponse));
    }

    #[tokio::test]
    async fn test_missing_key_skips_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/query")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let result = client.fetch("NVDA", None).await;

        mock.assert_async().await;
        assert_eq!(result.failure_reason(), Some(FailureReason::AuthError));
        assert!(client.requires_credentials());
    }
}
