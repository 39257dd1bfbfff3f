//! FRED (Federal Reserve Economic Data) 클라이언트.
//!
//! `GET /fred/series/observations?series_id=DGS10&api_key=...&file_type=json&observation_start=...`
//!
//! 심볼은 FRED 시리즈 ID이며, 최근 1년치 관측값을 받아 최신 값과 변동을 계산합니다.
//! 값이 `"."`인 관측치는 결측으로 건너뜁니다.
//!
//! FRED는 잘못된 시리즈나 API 키에도 HTTP 400을 돌려주므로 본문의 `error_message`로 구분합니다.

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use pulse_core::{parse_decimal, DailyBar, FetchResult, Payload};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;

use super::{ProviderSettings, FRED};
use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, get_json};
use crate::rate_limit::RateLimiter;
use crate::traits::{into_fetch_result, ProviderClient, Quote};

pub const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org";

/// 조회 기간 (일)
const LOOKBACK_DAYS: u64 = 365;

/// 변동 계산 필드와 관측치 간격.
const CHANGE_STEPS: [(&str, usize); 4] = [
    ("change", 1),
    ("change_1w", 7),
    ("change_1m", 30),
    ("change_3m", 90),
];

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

/// FRED 클라이언트.
pub struct FredClient {
    client: Client,
    settings: ProviderSettings,
    limiter: Arc<RateLimiter>,
}

impl FredClient {
    pub fn new(settings: ProviderSettings) -> ProviderResult<Self> {
        let limiter = Arc::new(RateLimiter::new(FRED, settings.min_interval));
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

    async fn fetch_series(&self, series_id: &str, api_key: &str) -> ProviderResult<Quote> {
        let today = Utc::now().date_naive();
        let start = today
            .checked_sub_days(Days::new(LOOKBACK_DAYS))
            .unwrap_or(today)
            .format("%Y-%m-%d")
            .to_string();

        let url = format!("{}/fred/series/observations", self.settings.base());
        let request = self.client.get(&url).query(&[
            ("series_id", series_id),
            ("api_key", api_key),
            ("file_type", "json"),
            ("observation_start", start.as_str()),
        ]);

        self.limiter.acquire().await;
        let response = get_json::<ObservationsResponse>(request)
            .await
            .map_err(classify_bad_request)?;
        parse_observations(series_id, response.body)
    }
}

#[async_trait]
impl ProviderClient for FredClient {
    fn name(&self) -> &str {
        FRED
    }

    fn requires_credentials(&self) -> bool {
        true
    }

    fn is_dedicated(&self) -> bool {
        true
    }

    async fn fetch(&self, symbol: &str, credentials: Option<&SecretString>) -> FetchResult {
        let result = match (symbol.trim(), credentials) {
            ("", _) => Err(ProviderError::NotFound("empty symbol".to_string())),
            (_, None) => Err(ProviderError::Unauthorized(
                "FRED_API_KEY is not configured".to_string(),
            )),
            (series_id, Some(key)) => self.fetch_series(series_id, key.expose_secret()).await,
        };
        into_fetch_result(FRED, symbol, result)
    }
}

/// HTTP 400 본문으로 시리즈 없음/키 오류를 구분.
fn classify_bad_request(err: ProviderError) -> ProviderError {
    match err {
        ProviderError::MalformedResponse(detail) if detail.starts_with("HTTP 400") => {
            let lower = detail.to_lowercase();
            if lower.contains("does not exist") {
                ProviderError::NotFound(detail)
            } else if lower.contains("api_key") {
                ProviderError::Unauthorized(detail)
            } else {
                ProviderError::MalformedResponse(detail)
            }
        }
        other => other,
    }
}

fn parse_observations(series_id: &str, response: ObservationsResponse) -> ProviderResult<Quote> {
    let mut points: Vec<DailyBar> = response
        .observations
        .iter()
        .filter_map(|o| {
            let date = NaiveDate::parse_from_str(&o.date, "%Y-%m-%d").ok()?;
            let value = parse_decimal(&o.value)?;
            Some(DailyBar::observation(date, value))
        })
        .collect();
    points.sort_by_key(|p| p.date);

    let latest = points
        .last()
        .ok_or_else(|| ProviderError::NotFound(format!("no observations for {}", series_id)))?;

    let mut payload = Payload::new();
    payload.insert("value", latest.close);
    payload.insert("observation_date", latest.date.format("%Y-%m-%d").to_string());
    payload.insert("series_id", series_id);

    let last = points.len() - 1;
    if last >= 1 {
        payload.insert("previous_value", points[last - 1].close);
    }
    for (field, step) in CHANGE_STEPS {
        if let Some(base) = last.checked_sub(step).map(|i| &points[i]) {
            payload.insert(field, latest.close - base.close);
        }
    }

    points.reverse();
    Ok(Quote::from(payload).with_history(points))
}
