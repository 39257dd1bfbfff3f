//! 저장소 오류 타입.

use std::path::PathBuf;
use thiserror::Error;

/// 저장 관련 오류. 실행 전체에 치명적입니다.
#[derive(Debug, Error)]
pub enum StorageError {
    /// 파일 시스템 오류
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 직렬화/역직렬화 오류
    #[error("Serialization error at {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// 같은 경로에 다른 심볼의 파일이 이미 있음
    #[error("Symbol collision at {path}: existing '{existing}', incoming '{incoming}'")]
    SymbolCollision {
        path: PathBuf,
        existing: String,
        incoming: String,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.into(),
            source,
        }
    }
}

/// 저장소 작업을 위한 Result 타입.
pub type StorageResult<T> = Result<T, StorageError>;
