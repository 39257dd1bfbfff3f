//! # Pulse Core
//!
//! 시장 데이터 수집기의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 수집 파이프라인 전반에서 사용되는 기본 타입을 제공합니다:
//! - 티커 디스크립터 및 티커 레지스트리 로더
//! - 수집 결과(`FetchResult`)와 실패 사유 분류
//! - 실행 메타데이터(`RunMetadata`)
//! - Provider 자격증명
//! - 로깅 인프라

pub mod credentials;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod registry;
pub mod types;

pub use credentials::Credentials;
pub use error::*;
pub use logging::*;
pub use metadata::{RunCounts, RunMetadata, RunStatus, TickerSummary};
pub use registry::TickerRegistry;
pub use types::*;
