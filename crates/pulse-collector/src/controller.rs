//! 실행 컨트롤러.
//!
//! 한 번의 실행: 메타데이터 시작 → 레지스트리 로드 및 검증 → 수집 순서 결정 → 수집 →
//! 메타데이터 확정 → 저장 → 종료 코드.

use pulse_core::{Credentials, RunMetadata, RunStatus, TickerRegistry};
use pulse_data::StorageWriter;
use pulse_provider::{
    AlphaVantageClient, FinnhubClient, FredClient, ProviderClient, ProviderSettings,
    YahooFinanceClient, ALPHA_VANTAGE, FINNHUB, FRED, YAHOO_FINANCE,
};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::CollectorConfig;
use crate::error::CollectorError;
use crate::orchestrator::FetchOrchestrator;
use crate::router::ProviderRouter;
use crate::schedule::FetchPlan;
use crate::stats::CollectionStats;
use crate::Result;

/// 프로세스 종료 코드.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// 모든 티커 성공
    Success,
    /// 하나 이상 실패, 저장은 성공
    PartialFailure,
    /// 레지스트리/저장/설정 에러
    Fatal,
    /// 외부 신호 또는 실행 타임아웃으로 취소
    Cancelled,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::PartialFailure => 1,
            Self::Fatal => 2,
            Self::Cancelled => 3,
        }
    }

    /// 확정된 실행 상태에서 종료 코드 결정.
    pub fn from_run_status(status: RunStatus) -> Self {
        match status {
            RunStatus::Succeeded => Self::Success,
            RunStatus::PartialFailure | RunStatus::Failed => Self::PartialFailure,
            RunStatus::Cancelled => Self::Cancelled,
            RunStatus::Running => Self::Fatal,
        }
    }
}

/// 한 번의 실행 결과.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub stats: CollectionStats,
}

impl RunReport {
    pub fn exit_status(&self) -> ExitStatus {
        ExitStatus::from_run_status(self.metadata.status)
    }
}

/// 설정된 순서대로 Provider 클라이언트 생성.
pub fn build_providers(config: &CollectorConfig) -> Result<Vec<Arc<dyn ProviderClient>>> {
    config
        .provider_order
        .iter()
        .map(|name| -> Result<Arc<dyn ProviderClient>> {
            let settings = config
                .providers
                .get(name)
                .cloned()
                .or_else(|| ProviderSettings::defaults_for(name))
                .ok_or_else(|| CollectorError::Config(format!("unknown provider '{}'", name)))?;

            let client: Arc<dyn ProviderClient> = match name.as_str() {
                ALPHA_VANTAGE => Arc::new(AlphaVantageClient::new(settings)?),
                FINNHUB => Arc::new(FinnhubClient::new(settings)?),
                YAHOO_FINANCE => Arc::new(YahooFinanceClient::new(settings)?),
                FRED => Arc::new(FredClient::new(settings)?),
                other => {
                    return Err(CollectorError::Config(format!("unknown provider '{}'", other)))
                }
            };
            Ok(client)
        })
        .collect()
}

/// 실행 컨트롤러.
pub struct RunController {
    config: CollectorConfig,
    credentials: Credentials,
    providers: Vec<Arc<dyn ProviderClient>>,
}

impl RunController {
    pub fn new(
        config: CollectorConfig,
        credentials: Credentials,
        providers: Vec<Arc<dyn ProviderClient>>,
    ) -> Self {
        Self {
            config,
            credentials,
            providers,
        }
    }

    /// 설정으로부터 실제 Provider와 환경변수 자격증명을 준비.
    pub fn from_config(config: CollectorConfig) -> Result<Self> {
        let providers = build_providers(&config)?;
        let credentials = Credentials::from_env(config.provider_order.iter().map(String::as_str));
        tracing::info!(
            providers = ?config.provider_order,
            with_credentials = ?credentials.providers(),
            "Provider 구성 완료"
        );
        Ok(Self::new(config, credentials, providers))
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// 한 번 실행.
    ///
    /// 실행 메타데이터는 여기서 시작하고 확정합니다. 레지스트리/저장 에러는 `Err`로
    /// 반환됩니다. 단, 취소된 실행의 저장 실패는 로그만 남기고 `Cancelled` 보고서를
    /// 반환합니다.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport> {
        let started = Instant::now();
        let mut metadata = RunMetadata::start();

        let registry = TickerRegistry::load(&self.config.registry_path)?;
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        registry.validate_providers(&names)?;
        tracing::info!(
            run_id = %metadata.run_id,
            tickers = registry.len(),
            registry = %self.config.registry_path.display(),
            "티커 레지스트리 로드"
        );

        let writer = StorageWriter::new(&self.config.output_dir);
        let plan = match writer.load_symbol_status() {
            Ok(statuses) => FetchPlan::prioritized(registry.tickers().to_vec(), &statuses),
            Err(e) => {
                tracing::warn!(error = %e, "이전 수집 상태를 읽지 못해 레지스트리 순서로 수집");
                FetchPlan::in_registry_order(registry.tickers().to_vec())
            }
        };

        let router = Arc::new(ProviderRouter::new(
            self.providers.clone(),
            self.config.rate_limit_cooldown,
        ));
        let orchestrator =
            FetchOrchestrator::new(router, self.config.retry.clone(), self.config.concurrency);

        let run_cancel = cancel.child_token();
        let timer = self.config.run_timeout.map(|timeout| {
            let token = run_cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::warn!(timeout_secs = timeout.as_secs(), "실행 타임아웃, 취소");
                token.cancel();
            })
        });

        let batch = orchestrator
            .run_until_cancelled(&plan, &self.credentials, &mut metadata, &run_cancel)
            .await;
        if let Some(timer) = timer {
            timer.abort();
        }
        metadata.finalize(batch.cancelled);

        let records_written = match writer.write(&batch.results, &metadata) {
            Ok(written) => written,
            Err(e) if metadata.status == RunStatus::Cancelled => {
                tracing::error!(error = %e, "취소된 실행의 결과 저장 실패");
                0
            }
            Err(e) => return Err(e.into()),
        };

        let stats = CollectionStats::from_metadata(&metadata, records_written, started.elapsed());
        stats.log_summary(metadata.status);
        for symbol in metadata.failed_symbols() {
            let summary = &metadata.tickers[symbol];
            tracing::warn!(
                symbol = symbol,
                reason = ?summary.reason,
                message = summary.message.as_deref().unwrap_or(""),
                "티커 수집 실패"
            );
        }

        Ok(RunReport { metadata, stats })
    }

    /// 실행 후 종료 코드로 변환. 치명적 에러는 로그로 남깁니다.
    pub async fn run_to_exit(&self, cancel: &CancellationToken) -> ExitStatus {
        match self.run(cancel).await {
            Ok(report) => report.exit_status(),
            Err(e) => {
                tracing::error!(error = %e, "실행 중단");
                ExitStatus::Fatal
            }
        }
    }
}
