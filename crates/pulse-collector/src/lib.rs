//! 시장 데이터 일일 수집기.
//!
//! 이 crate는 한 번의 수집 실행을 구성하는 요소를 제공합니다:
//! - 환경변수 기반 설정 (`CollectorConfig`)
//! - Provider 라우팅과 쿨다운 (`ProviderRouter`)
//! - 재시도 정책 (`RetryConfig`)
//! - 이전 상태 기반 수집 순서 (`FetchPlan`)
//! - 동시성 제한 수집 (`FetchOrchestrator`)
//! - 실행 컨트롤러와 종료 코드 (`RunController`, `ExitStatus`)

pub mod config;
pub mod controller;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod router;
pub mod schedule;
pub mod stats;

pub use config::{CollectorConfig, ConfigOverrides};
pub use controller::{build_providers, ExitStatus, RunController, RunReport};
pub use error::{CollectorError, Result};
pub use orchestrator::{FetchBatch, FetchOrchestrator};
pub use retry::RetryConfig;
pub use router::ProviderRouter;
pub use schedule::{FetchPlan, Priority};
pub use stats::CollectionStats;
