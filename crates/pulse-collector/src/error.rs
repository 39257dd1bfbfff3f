//! 에러 타입 정의.

use pulse_core::RegistryError;
use pulse_data::StorageError;
use pulse_provider::ProviderError;
use thiserror::Error;

/// Collector 에러 타입. 모두 실행 전체에 치명적입니다.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 티커 레지스트리 에러
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// 저장소 에러
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Provider 클라이언트 생성 실패
    #[error("Provider setup error: {0}")]
    ProviderSetup(#[from] ProviderError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
