//! 티커 수집 오케스트레이터.
//!
//! 티커마다 라우터가 정한 순서대로 Provider를 시도하고, 일시적 실패
//! (`RateLimited`, `Timeout`)는 같은 Provider로 백오프 후 재시도합니다.
//! 영구 실패는 즉시 다음 Provider로 넘어갑니다.
//!
//! 요청은 [`FetchPlan`]의 순서로 시작되고, 동시에 처리하는 티커 수는 `concurrency`로
//! 제한됩니다. 결과는 레지스트리 순서로 재조립됩니다. 한 티커의 실패가 실행 전체를
//! 중단시키지 않습니다.
//!
//! 실행 메타데이터는 호출자가 소유합니다. 오케스트레이터는 결과와 중단된 티커를
//! 기록할 뿐 실행을 확정하지 않습니다.

use futures::stream::{self, StreamExt};
use pulse_core::{Credentials, FailureReason, FetchResult, RunMetadata, TickerDescriptor};
use pulse_provider::ProviderClient;
use std::pin::pin;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::retry::RetryConfig;
use crate::router::ProviderRouter;
use crate::schedule::FetchPlan;

/// 한 번의 수집 결과.
#[derive(Debug, Default)]
pub struct FetchBatch {
    /// 완료된 결과 (레지스트리 순서)
    pub results: Vec<FetchResult>,
    /// 취소로 중단되었는지 여부
    pub cancelled: bool,
}

/// 수집 오케스트레이터.
pub struct FetchOrchestrator {
    router: Arc<ProviderRouter>,
    retry: RetryConfig,
    concurrency: usize,
}

impl FetchOrchestrator {
    pub fn new(router: Arc<ProviderRouter>, retry: RetryConfig, concurrency: usize) -> Self {
        Self {
            router,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// 모든 티커 수집 (취소 없음).
    pub async fn run(
        &self,
        plan: &FetchPlan,
        credentials: &Credentials,
        metadata: &mut RunMetadata,
    ) -> FetchBatch {
        self.run_until_cancelled(plan, credentials, metadata, &CancellationToken::new())
            .await
    }

    /// 취소 가능한 수집.
    ///
    /// 취소되면 진행 중인 요청을 버리고, 완료된 결과만 반환합니다. 처리되지 못한
    /// 티커는 메타데이터의 `abandoned`에 기록됩니다.
    pub async fn run_until_cancelled(
        &self,
        plan: &FetchPlan,
        credentials: &Credentials,
        metadata: &mut RunMetadata,
        cancel: &CancellationToken,
    ) -> FetchBatch {
        let tickers = plan.tickers();
        let mut slots: Vec<Option<FetchResult>> = vec![None; tickers.len()];

        tracing::info!(
            run_id = %metadata.run_id,
            tickers = tickers.len(),
            concurrency = self.concurrency,
            "수집 시작"
        );

        let mut completions = pin!(stream::iter(plan.in_fetch_order())
            .map(|(index, ticker)| {
                let span = pulse_core::ticker_span!(ticker.symbol, ticker.category);
                async move {
                    let (result, retries) = self.fetch_ticker(ticker, credentials).await;
                    (index, result, retries)
                }
                .instrument(span)
            })
            .buffer_unordered(self.concurrency));

        let mut cancelled = false;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = completions.next() => match next {
                    Some((index, result, retries)) => {
                        metadata.record(&tickers[index], &result, retries);
                        slots[index] = Some(result);
                    }
                    None => break,
                },
            }
        }

        if cancelled {
            for (ticker, slot) in tickers.iter().zip(&slots) {
                if slot.is_none() {
                    metadata.record_abandoned(&ticker.symbol);
                }
            }
            tracing::warn!(
                completed = metadata.counts.total,
                abandoned = metadata.counts.abandoned,
                "수집 취소됨"
            );
        }

        FetchBatch {
            results: slots.into_iter().flatten().collect(),
            cancelled,
        }
    }

    /// 한 티커 수집. 반환값은 (결과, 같은 Provider 재시도 횟수).
    async fn fetch_ticker(
        &self,
        ticker: &TickerDescriptor,
        credentials: &Credentials,
    ) -> (FetchResult, u32) {
        let started = Instant::now();
        let route = self.router.route(ticker, credentials);

        if route.is_empty() {
            tracing::warn!(symbol = %ticker.symbol, "사용 가능한 Provider 없음 (API 키 누락)");
            let result = FetchResult::failure(
                &ticker.symbol,
                None,
                FailureReason::AuthError,
                "no provider with credentials available",
            )
            .with_stats(0, started.elapsed());
            return (result, 0);
        }

        let mut attempts = 0u32;
        let mut retries = 0u32;
        let mut last_failure: Option<FetchResult> = None;

        for provider in route {
            let key = credentials.get(provider.name());
            let mut attempt = 0u32;

            loop {
                attempt += 1;
                attempts += 1;
                let result = provider.fetch(&ticker.symbol, key).await;

                let Some(reason) = result.failure_reason() else {
                    tracing::info!(
                        symbol = %ticker.symbol,
                        provider = provider.name(),
                        attempts = attempts,
                        "티커 수집 성공"
                    );
                    return (result.with_stats(attempts, started.elapsed()), retries);
                };

                if reason == FailureReason::RateLimited {
                    self.router.record_rate_limited(provider.name());
                }

                if reason.is_transient() && attempt <= self.retry.max_retries {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        symbol = %ticker.symbol,
                        provider = provider.name(),
                        attempt = attempt,
                        reason = %reason,
                        delay_ms = delay.as_millis() as u64,
                        "일시적 실패, 재시도"
                    );
                    retries += 1;
                    tokio::time::sleep(delay).await;
                    continue;
                }

                tracing::debug!(
                    symbol = %ticker.symbol,
                    provider = provider.name(),
                    reason = %reason,
                    "다음 Provider로 전환"
                );
                last_failure = Some(result);
                break;
            }
        }

        let result = match last_failure {
            Some(result) => result,
            None => FetchResult::failure(
                &ticker.symbol,
                None,
                FailureReason::AuthError,
                "no provider attempted",
            ),
        };
        tracing::warn!(
            symbol = %ticker.symbol,
            reason = ?result.failure_reason(),
            attempts = attempts,
            "모든 Provider 실패"
        );
        (result.with_stats(attempts, started.elapsed()), retries)
    }
}
