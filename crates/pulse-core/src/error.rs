//! 레지스트리 에러 타입.
//!
//! 레지스트리 로드 에러는 치명적이며, 어떤 네트워크 호출보다 먼저 실행을 중단시킵니다.

use std::path::PathBuf;

use thiserror::Error;

/// 티커 레지스트리 로드/검증 에러.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// 레지스트리 파일을 읽을 수 없음
    #[error("failed to read registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV 구문 에러
    #[error("registry is not valid CSV: {0}")]
    Csv(#[from] csv::Error),

    /// 필수 필드 누락 등 잘못된 행
    #[error("malformed registry entry at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    /// 동일 심볼이 두 번 이상 등장
    #[error("duplicate symbol '{symbol}' at line {line}")]
    DuplicateSymbol { symbol: String, line: u64 },

    /// 설정되지 않은 Provider를 선호 Provider로 지정
    #[error("ticker '{symbol}' prefers unknown provider '{provider}'")]
    UnknownProvider { symbol: String, provider: String },

    /// 활성화된 티커가 하나도 없음
    #[error("registry contains no enabled tickers")]
    Empty,
}

impl RegistryError {
    /// 행 단위 에러 생성 헬퍼.
    pub fn malformed(line: u64, reason: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            reason: reason.into(),
        }
    }
}
