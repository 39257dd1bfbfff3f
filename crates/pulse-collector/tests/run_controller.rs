//! 실행 컨트롤러 통합 테스트.
//!
//! 스크립트된 Provider와 임시 디렉토리로 레지스트리 로드부터 저장, 종료 코드까지
//! 한 번의 실행 전체를 검증합니다.

use async_trait::async_trait;
use chrono::Utc;
use pulse_collector::{
    CollectorConfig, CollectorError, ConfigOverrides, ExitStatus, RetryConfig, RunController,
};
use pulse_core::{Credentials, FailureReason, FetchResult, Payload, RunStatus};
use pulse_data::StorageWriter;
use pulse_provider::ProviderClient;
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// 심볼별로 정해진 실패 사유를 돌려주는 Provider. 목록에 없으면 성공.
struct ScriptedProvider {
    name: &'static str,
    failures: HashMap<&'static str, FailureReason>,
    slow: HashMap<&'static str, Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn healthy(name: &'static str) -> Self {
        Self {
            name,
            failures: HashMap::new(),
            slow: HashMap::new(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn failing(mut self, symbol: &'static str, reason: FailureReason) -> Self {
        self.failures.insert(symbol, reason);
        self
    }

    fn slow(mut self, symbol: &'static str, delay: Duration) -> Self {
        self.slow.insert(symbol, delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn requires_credentials(&self) -> bool {
        false
    }

    async fn fetch(&self, symbol: &str, _credentials: Option<&SecretString>) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(symbol.to_string());
        if let Some(delay) = self.slow.get(symbol) {
            tokio::time::sleep(*delay).await;
        }
        match self.failures.get(symbol) {
            Some(reason) => FetchResult::failure(
                symbol,
                Some(self.name.to_string()),
                *reason,
                format!("scripted {}", reason),
            ),
            None => {
                let mut payload = Payload::new();
                payload.insert_parsed("price", "101.25");
                payload.insert("currency", "USD");
                FetchResult::success(symbol, self.name, payload)
            }
        }
    }
}

fn write_registry(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("tickers.csv");
    std::fs::write(&path, content).unwrap();
    path
}

fn test_config(dir: &Path, registry: &str) -> CollectorConfig {
    let registry_path = write_registry(dir, registry);
    let mut config = CollectorConfig::from_lookup(|_| None)
        .unwrap()
        .with_overrides(ConfigOverrides {
            registry_path: Some(registry_path),
            output_dir: Some(dir.join("data")),
            concurrency: Some(2),
        });
    config.retry = RetryConfig::no_delay(2);
    config
}

const THREE_TICKERS: &str = "\
symbol,type,category,api_source,enabled
NVDA,stock,AI indicator,,true
BTC-USD,crypto,crypto,,true
ZZZZ,stock,test,,true
";

#[tokio::test]
async fn test_partial_failure_persists_successes() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), THREE_TICKERS);
    let provider = Arc::new(
        ScriptedProvider::healthy("yahoo_finance").failing("ZZZZ", FailureReason::NotFound),
    );
    let controller = RunController::new(config, Credentials::new(), vec![provider.clone()]);

    let report = controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.exit_status(), ExitStatus::PartialFailure);
    assert_eq!(report.exit_status().code(), 1);
    assert_eq!(report.stats.records_written, 2);

    let writer = StorageWriter::new(dir.path().join("data"));
    let metadata = writer.load_metadata().unwrap().unwrap();
    assert_eq!(metadata.status, RunStatus::PartialFailure);
    assert_eq!(metadata.counts.succeeded, 2);
    assert_eq!(metadata.counts.failed, 1);
    assert_eq!(metadata.tickers["ZZZZ"].reason, Some(FailureReason::NotFound));

    let date = metadata.run_date();
    assert!(writer.load_record("NVDA", date).unwrap().is_some());
    assert!(writer.load_record("BTC-USD", date).unwrap().is_some());
    assert!(writer.load_record("ZZZZ", date).unwrap().is_none());
    assert!(dir
        .path()
        .join(format!("data/raw/BTC-USD/{}.json", date.format("%Y-%m-%d")))
        .exists());

    let status = writer.load_symbol_status().unwrap();
    assert_eq!(status["ZZZZ"].last_fetch_status, "failed: not_found");
    assert!(status["NVDA"].is_success());
}

#[tokio::test]
async fn test_second_run_fetches_new_and_failed_first() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), THREE_TICKERS);
    config.concurrency = 1;
    let first = Arc::new(
        ScriptedProvider::healthy("yahoo_finance").failing("ZZZZ", FailureReason::NotFound),
    );
    RunController::new(config.clone(), Credentials::new(), vec![first.clone()])
        .run(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.seen(), vec!["NVDA", "BTC-USD", "ZZZZ"]);

    // NEW는 처음, ZZZZ는 직전 실패, 나머지는 오래된 순서
    let mut config = test_config(
        dir.path(),
        &format!("{}NEW,stock,test,,true\n", THREE_TICKERS),
    );
    config.concurrency = 1;
    let second = Arc::new(ScriptedProvider::healthy("yahoo_finance"));
    let report = RunController::new(config, Credentials::new(), vec![second.clone()])
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.seen(), vec!["NEW", "ZZZZ", "NVDA", "BTC-USD"]);
    assert_eq!(report.exit_status(), ExitStatus::Success);
    let status = StorageWriter::new(dir.path().join("data"))
        .load_symbol_status()
        .unwrap();
    assert!(status["ZZZZ"].is_success());
    assert!(status["NEW"].is_success());
}

#[tokio::test]
async fn test_unreadable_status_falls_back_to_registry_order() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), THREE_TICKERS);
    config.concurrency = 1;
    std::fs::create_dir_all(dir.path().join("data/metadata")).unwrap();
    std::fs::write(dir.path().join("data/metadata/update_status.json"), b"{broken").unwrap();
    let provider = Arc::new(ScriptedProvider::healthy("yahoo_finance"));
    let controller = RunController::new(config, Credentials::new(), vec![provider.clone()]);

    // 상태 파일이 깨져 있으면 순서 결정은 건너뛰지만, 저장 단계에서 다시 읽다가 실패
    let err = controller.run(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, CollectorError::Storage(_)));
    assert_eq!(provider.seen(), vec!["NVDA", "BTC-USD", "ZZZZ"]);
}

#[tokio::test]
async fn test_metadata_starts_before_fetching() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), THREE_TICKERS);
    let provider = Arc::new(ScriptedProvider::healthy("yahoo_finance"));
    let controller = RunController::new(config, Credentials::new(), vec![provider]);

    let before = Utc::now();
    let report = controller.run(&CancellationToken::new()).await.unwrap();
    let after = Utc::now();

    let metadata = &report.metadata;
    assert!(metadata.started_at >= before);
    assert!(metadata.finished_at.unwrap() <= after);
    assert_eq!(metadata.status, RunStatus::Succeeded);

    // 모든 결과는 실행 시작 이후에 수집됨
    let writer = StorageWriter::new(dir.path().join("data"));
    for symbol in ["NVDA", "BTC-USD", "ZZZZ"] {
        let record = writer
            .load_record(symbol, metadata.run_date())
            .unwrap()
            .unwrap();
        assert!(record.fetched_at >= metadata.started_at);
    }
}

#[tokio::test]
async fn test_all_healthy_exits_zero() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), THREE_TICKERS);
    let provider = Arc::new(ScriptedProvider::healthy("yahoo_finance"));
    let controller = RunController::new(config, Credentials::new(), vec![provider]);

    let status = controller.run_to_exit(&CancellationToken::new()).await;
    assert_eq!(status, ExitStatus::Success);
    assert_eq!(status.code(), 0);
}

#[tokio::test]
async fn test_duplicate_symbol_fails_before_any_fetch() {
    let dir = TempDir::new().unwrap();
    let config = test_config(
        dir.path(),
        "symbol,type,category,api_source,enabled\nNVDA,stock,a,,true\nMSFT,stock,a,,true\nNVDA,stock,b,,true\n",
    );
    let provider = Arc::new(ScriptedProvider::healthy("yahoo_finance"));
    let controller = RunController::new(config, Credentials::new(), vec![provider.clone()]);

    let err = controller.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, CollectorError::Registry(_)));
    assert_eq!(provider.calls(), 0);
    assert!(!dir.path().join("data").exists());
    assert_eq!(
        controller.run_to_exit(&CancellationToken::new()).await.code(),
        2
    );
}

#[tokio::test]
async fn test_unknown_preferred_provider_is_registry_error() {
    let dir = TempDir::new().unwrap();
    let config = test_config(
        dir.path(),
        "symbol,type,category,api_source,enabled\nNVDA,stock,a,polygon,true\n",
    );
    let provider = Arc::new(ScriptedProvider::healthy("yahoo_finance"));
    let controller = RunController::new(config, Credentials::new(), vec![provider.clone()]);

    let err = controller.run(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, CollectorError::Registry(_)));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_rate_limited_provider_falls_back() {
    let dir = TempDir::new().unwrap();
    let config = test_config(
        dir.path(),
        "symbol,type,category,api_source,enabled\nNVDA,stock,a,alpha_vantage,true\n",
    );
    let alpha = Arc::new(
        ScriptedProvider::healthy("alpha_vantage").failing("NVDA", FailureReason::RateLimited),
    );
    let yahoo = Arc::new(ScriptedProvider::healthy("yahoo_finance"));
    let controller = RunController::new(
        config,
        Credentials::new(),
        vec![yahoo.clone(), alpha.clone()],
    );

    let report = controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.exit_status(), ExitStatus::Success);
    // 최초 시도 + 재시도 2회
    assert_eq!(alpha.calls(), 3);
    assert_eq!(yahoo.calls(), 1);
    let summary = &report.metadata.tickers["NVDA"];
    assert_eq!(summary.provider.as_deref(), Some("yahoo_finance"));
    assert_eq!(summary.retries, 2);
}

#[tokio::test]
async fn test_storage_error_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), THREE_TICKERS);
    std::fs::write(dir.path().join("data"), b"not a directory").unwrap();
    let provider = Arc::new(ScriptedProvider::healthy("yahoo_finance"));
    let controller = RunController::new(config, Credentials::new(), vec![provider]);

    let err = controller.run(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, CollectorError::Storage(_)));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_persists_completed_and_exits_three() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), THREE_TICKERS);
    config.concurrency = 1;
    let provider = Arc::new(
        ScriptedProvider::healthy("yahoo_finance")
            .slow("BTC-USD", Duration::from_secs(600))
            .slow("ZZZZ", Duration::from_secs(600)),
    );
    let controller = RunController::new(config, Credentials::new(), vec![provider]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let report = controller.run(&cancel).await.unwrap();

    assert_eq!(report.exit_status(), ExitStatus::Cancelled);
    assert_eq!(report.exit_status().code(), 3);
    assert_eq!(report.metadata.abandoned, vec!["BTC-USD".to_string(), "ZZZZ".to_string()]);

    let writer = StorageWriter::new(dir.path().join("data"));
    let metadata = writer.load_metadata().unwrap().unwrap();
    assert_eq!(metadata.status, RunStatus::Cancelled);
    assert!(writer
        .load_record("NVDA", metadata.run_date())
        .unwrap()
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn test_run_timeout_cancels() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), THREE_TICKERS);
    config.run_timeout = Some(Duration::from_secs(30));
    let provider = Arc::new(
        ScriptedProvider::healthy("yahoo_finance").slow("ZZZZ", Duration::from_secs(3600)),
    );
    let controller = RunController::new(config, Credentials::new(), vec![provider]);

    let status = controller.run_to_exit(&CancellationToken::new()).await;
    assert_eq!(status, ExitStatus::Cancelled);
}

#[tokio::test]
async fn test_end_to_end_with_yahoo_mock() {
    let mut server = mockito::Server::new_async().await;
    let now = Utc::now().timestamp();
    let yesterday = now - 86_400;
    let body = format!(
        r#"{{"chart":{{"result":[{{"meta":{{"currency":"USD","regularMarketPrice":481.68,"chartPreviousClose":495.22,"regularMarketTime":{now},"gmtoffset":0}},"timestamp":[{yesterday},{now}],"indicators":{{"quote":[{{"open":[498.13,492.44],"high":[499.97,494.0],"low":[487.51,475.09],"close":[495.22,481.68],"volume":[38869000,41125400]}}]}}}}],"error":null}}}}"#
    );
    server
        .mock("GET", "/v8/finance/chart/NVDA")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(&body)
        .create_async()
        .await;
    server
        .mock("GET", "/v8/finance/chart/ZZZZ")
        .match_query(mockito::Matcher::Any)
        .with_status(404)
        .with_body(r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let registry_path = write_registry(
        dir.path(),
        "symbol,type,category,api_source,enabled\nNVDA,stock,AI indicator,,\nZZZZ,stock,test,auto,yes\nOFF,stock,test,,false\n",
    );
    let url = server.url();
    let config = CollectorConfig::from_lookup(|key| match key {
        "PROVIDER_ORDER" => Some("yahoo_finance".to_string()),
        "YAHOO_FINANCE_BASE_URL" => Some(url.clone()),
        "YAHOO_FINANCE_MIN_INTERVAL_MS" => Some("0".to_string()),
        "RETRY_MAX_RETRIES" => Some("0".to_string()),
        _ => None,
    })
    .unwrap()
    .with_overrides(ConfigOverrides {
        registry_path: Some(registry_path),
        output_dir: Some(dir.path().join("data")),
        concurrency: None,
    });

    let controller = RunController::from_config(config).unwrap();
    let report = controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.exit_status(), ExitStatus::PartialFailure);
    assert_eq!(report.metadata.counts.total, 2);
    assert!(!report.metadata.tickers.contains_key("OFF"));

    let writer = StorageWriter::new(dir.path().join("data"));
    let record = writer
        .load_record("NVDA", report.metadata.run_date())
        .unwrap()
        .unwrap();
    assert_eq!(record.provider, "yahoo_finance");
    assert_eq!(record.category, "AI indicator");
    assert_eq!(record.asset_type.as_deref(), Some("stock"));
    assert!(record.fields.contains("price"));

    let history = writer.load_history("NVDA").unwrap().unwrap();
    assert_eq!(history.bars.len(), 2);
    assert!(history.bars[0].date > history.bars[1].date);
    assert_eq!(writer.load_symbol_status().unwrap()["NVDA"].data_points, 2);
}
