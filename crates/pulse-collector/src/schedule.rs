//! 수집 순서 결정.
//!
//! 이전 실행의 `update_status.json`을 보고 급한 티커부터 요청합니다:
//! 1. 한 번도 수집되지 않은 티커
//! 2. 마지막 수집이 실패한 티커
//! 3. 나머지는 `last_updated`가 오래된 순서
//!
//! 같은 등급 안에서는 레지스트리 순서를 유지합니다. 결과는 순서와 무관하게
//! 레지스트리 순서로 조립됩니다.

use pulse_core::TickerDescriptor;
use pulse_data::SymbolStatus;
use std::collections::BTreeMap;

/// 티커 우선순위 등급 (작을수록 먼저).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    NeverFetched,
    Failed,
    Stale,
}

impl Priority {
    pub fn of(status: Option<&SymbolStatus>) -> Self {
        match status {
            None => Self::NeverFetched,
            Some(s) if !s.is_success() => Self::Failed,
            Some(_) => Self::Stale,
        }
    }
}

/// 레지스트리 순서의 티커와 요청 순서.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    tickers: Vec<TickerDescriptor>,
    /// `tickers` 인덱스를 요청 순서로 나열
    order: Vec<usize>,
}

impl FetchPlan {
    /// 레지스트리 순서 그대로.
    pub fn in_registry_order(tickers: Vec<TickerDescriptor>) -> Self {
        let order = (0..tickers.len()).collect();
        Self { tickers, order }
    }

    /// 이전 상태 기반 우선순위 순서.
    pub fn prioritized(
        tickers: Vec<TickerDescriptor>,
        statuses: &BTreeMap<String, SymbolStatus>,
    ) -> Self {
        let mut order: Vec<usize> = (0..tickers.len()).collect();
        order.sort_by_key(|&i| {
            let status = statuses.get(&tickers[i].symbol);
            (Priority::of(status), status.map(|s| s.last_updated))
        });

        let count = |p: Priority| {
            tickers
                .iter()
                .filter(|t| Priority::of(statuses.get(&t.symbol)) == p)
                .count()
        };
        tracing::info!(
            never_fetched = count(Priority::NeverFetched),
            failed = count(Priority::Failed),
            "수집 순서 결정"
        );

        Self { tickers, order }
    }

    /// 레지스트리 순서의 티커.
    pub fn tickers(&self) -> &[TickerDescriptor] {
        &self.tickers
    }

    /// 요청 순서대로 (레지스트리 인덱스, 티커).
    pub fn in_fetch_order(&self) -> impl Iterator<Item = (usize, &TickerDescriptor)> + '_ {
        self.order.iter().map(|&i| (i, &self.tickers[i]))
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}
