//! 환경변수 기반 설정 모듈.

use pulse_provider::clients::ALL_PROVIDERS;
use pulse_provider::ProviderSettings;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CollectorError;
use crate::retry::RetryConfig;
use crate::Result;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 티커 레지스트리 CSV 경로
    pub registry_path: PathBuf,
    /// 저장 루트 디렉토리
    pub output_dir: PathBuf,
    /// 동시에 처리할 최대 티커 수
    pub concurrency: usize,
    /// Provider 우선순위
    pub provider_order: Vec<String>,
    /// 한도 초과 Provider를 뒤로 미루는 기간
    pub rate_limit_cooldown: Duration,
    /// 재시도 설정
    pub retry: RetryConfig,
    /// 전체 실행 타임아웃 (없으면 무제한)
    pub run_timeout: Option<Duration>,
    /// Provider별 클라이언트 설정
    pub providers: BTreeMap<String, ProviderSettings>,
}

/// CLI에서 덮어쓰는 값.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub registry_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드 (`.env` 포함)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 조회 함수로 설정 로드.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let provider_order = parse_provider_order(
            &env.string("PROVIDER_ORDER")
                .unwrap_or_else(|| ALL_PROVIDERS.join(",")),
        )?;

        let http_timeout = Duration::from_secs(env.parse("HTTP_TIMEOUT_SECS", 30u64));
        let mut providers = BTreeMap::new();
        for name in &provider_order {
            let prefix = name.to_uppercase();
            let Some(defaults) = ProviderSettings::defaults_for(name) else {
                continue;
            };
            let base_url = env
                .string(&format!("{}_BASE_URL", prefix))
                .unwrap_or(defaults.base_url);
            let min_interval_ms = env.parse(
                &format!("{}_MIN_INTERVAL_MS", prefix),
                defaults.min_interval.as_millis() as u64,
            );
            let daily_history = env.parse(
                &format!("{}_DAILY_HISTORY", prefix),
                defaults.daily_history,
            );
            providers.insert(
                name.clone(),
                ProviderSettings::for_base_url(base_url)
                    .with_min_interval(Duration::from_millis(min_interval_ms))
                    .with_timeout(http_timeout)
                    .with_daily_history(daily_history),
            );
        }

        let defaults = RetryConfig::default();
        let jitter = env.parse("RETRY_JITTER", defaults.jitter_factor);
        if !jitter.is_finite() {
            return Err(CollectorError::Config(format!(
                "RETRY_JITTER must be a finite number, got {}",
                jitter
            )));
        }
        let retry = RetryConfig::new(
            env.parse("RETRY_MAX_RETRIES", defaults.max_retries),
            Duration::from_millis(env.parse(
                "RETRY_INITIAL_DELAY_MS",
                defaults.initial_delay.as_millis() as u64,
            )),
            Duration::from_millis(env.parse(
                "RETRY_MAX_DELAY_MS",
                defaults.max_delay.as_millis() as u64,
            )),
            jitter,
        );

        Ok(Self {
            registry_path: env
                .string("REGISTRY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/tickers.csv")),
            output_dir: env
                .string("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            concurrency: env.parse("FETCH_CONCURRENCY", 4usize).max(1),
            provider_order,
            rate_limit_cooldown: Duration::from_secs(env.parse("RATE_LIMIT_COOLDOWN_SECS", 60u64)),
            retry,
            run_timeout: env
                .string("RUN_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            providers,
        })
    }

    /// CLI 값 적용.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(path) = overrides.registry_path {
            self.registry_path = path;
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = dir;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency.max(1);
        }
        self
    }
}

/// 쉼표로 구분된 Provider 순서 파싱. 알 수 없는 이름은 에러, 중복은 제거.
fn parse_provider_order(raw: &str) -> Result<Vec<String>> {
    let mut order: Vec<String> = Vec::new();
    for name in raw.split(',').map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
        if !ALL_PROVIDERS.contains(&name.as_str()) {
            return Err(CollectorError::Config(format!(
                "unknown provider '{}' in PROVIDER_ORDER (expected one of: {})",
                name,
                ALL_PROVIDERS.join(", ")
            )));
        }
        if !order.contains(&name) {
            order.push(name);
        }
    }
    if order.is_empty() {
        return Err(CollectorError::Config("PROVIDER_ORDER is empty".to_string()));
    }
    Ok(order)
}

struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    /// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.string(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}
