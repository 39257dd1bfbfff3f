//! Provider 라우팅.
//!
//! 티커마다 시도할 Provider 순서를 정합니다:
//! 1. 티커의 선호 Provider
//! 2. 나머지는 설정된 우선순위 순서
//! 3. 최근 `RateLimited`를 보고한 Provider는 쿨다운 동안 맨 뒤로 (상대 순서 유지)
//! 4. API 키가 필요한데 없는 Provider는 제외
//!
//! 전용 Provider(`is_dedicated`, 예: FRED)는 티커가 직접 지정했을 때만 쓰이며,
//! 이 경우 다른 Provider로 대체하지 않습니다.

use pulse_core::{Credentials, TickerDescriptor};
use pulse_provider::ProviderClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Provider 라우터.
pub struct ProviderRouter {
    /// 우선순위 순서의 Provider 목록
    providers: Vec<Arc<dyn ProviderClient>>,
    /// 한도 초과 후 뒤로 미루는 기간
    cooldown: Duration,
    /// Provider → 마지막 한도 초과 시각
    rate_limited: Mutex<HashMap<String, Instant>>,
}

impl ProviderRouter {
    pub fn new(providers: Vec<Arc<dyn ProviderClient>>, cooldown: Duration) -> Self {
        Self {
            providers,
            cooldown,
            rate_limited: Mutex::new(HashMap::new()),
        }
    }

    /// 설정된 Provider 이름 (우선순위 순서).
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// 티커에 대한 시도 순서.
    pub fn route(
        &self,
        ticker: &TickerDescriptor,
        credentials: &Credentials,
    ) -> Vec<Arc<dyn ProviderClient>> {
        let preferred = ticker.preferred_provider.as_deref();
        let first = preferred.and_then(|name| self.providers.iter().find(|p| p.name() == name));

        let mut ordered: Vec<Arc<dyn ProviderClient>> = Vec::with_capacity(self.providers.len());
        match first {
            Some(dedicated) if dedicated.is_dedicated() => ordered.push(dedicated.clone()),
            _ => {
                ordered.extend(first.cloned());
                ordered.extend(
                    self.providers
                        .iter()
                        .filter(|p| Some(p.name()) != preferred && !p.is_dedicated())
                        .cloned(),
                );
            }
        }

        ordered.retain(|p| {
            let usable = !p.requires_credentials() || credentials.contains(p.name());
            if !usable {
                tracing::trace!(
                    symbol = %ticker.symbol,
                    provider = p.name(),
                    "API 키 없는 Provider 건너뜀"
                );
            }
            usable
        });

        // 안정 분할: 쿨다운 중이 아닌 것 먼저
        let (ready, cooling): (Vec<_>, Vec<_>) = ordered
            .into_iter()
            .partition(|p| !self.is_cooling_down(p.name()));
        ready.into_iter().chain(cooling).collect()
    }

    /// Provider의 한도 초과 기록.
    pub fn record_rate_limited(&self, provider: &str) {
        let mut map = self.lock();
        map.insert(provider.to_string(), Instant::now());
    }

    /// 쿨다운 중인지 확인.
    pub fn is_cooling_down(&self, provider: &str) -> bool {
        self.lock()
            .get(provider)
            .is_some_and(|at| at.elapsed() < self.cooldown)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        // 잠금 중 패닉이 나도 맵 자체는 유효함
        self.rate_limited
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
