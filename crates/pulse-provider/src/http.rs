//! 공용 HTTP 헬퍼.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{ProviderError, ProviderResult};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; market-pulse/0.1)";

/// 헤더 이름: 남은 호출 수 (Finnhub 등)
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// 타임아웃이 설정된 HTTP 클라이언트 생성.
pub fn build_client(timeout: Duration) -> ProviderResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ProviderError::MalformedResponse(format!("HTTP client build failed: {}", e)))
}

/// JSON 응답.
#[derive(Debug)]
pub struct JsonResponse<T> {
    pub body: T,
    /// `X-Ratelimit-Remaining` 헤더 값
    pub remaining_quota: Option<u32>,
}

/// 요청을 보내고 성공 응답을 JSON으로 파싱합니다.
///
/// 성공이 아닌 상태 코드는 [`ProviderError::from_status`]로 분류됩니다.
pub async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> ProviderResult<JsonResponse<T>> {
    let response = request.send().await?;
    let status = response.status();
    let remaining_quota = response
        .headers()
        .get(RATE_LIMIT_REMAINING)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u32>().ok());

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(status, &body));
    }

    let bytes = response.bytes().await?;
    let body = serde_json::from_slice(&bytes)?;
    Ok(JsonResponse {
        body,
        remaining_quota,
    })
}
