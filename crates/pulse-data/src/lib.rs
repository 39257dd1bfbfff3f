//! 수집 결과 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 심볼/날짜별 원시 데이터 레코드 (`raw/{SYMBOL}/{YYYY-MM-DD}.json`)
//! - 날짜별로 병합되는 심볼별 일봉 시계열 (`history/{SYMBOL}.json`)
//! - 최근 실행 메타데이터 (`metadata/last_run.json`)
//! - 심볼별 누적 갱신 상태 (`metadata/update_status.json`)
//!
//! 모든 파일은 임시 파일에 쓴 뒤 rename으로 교체됩니다.

pub mod error;
pub mod storage;

pub use error::{StorageError, StorageResult};
pub use storage::{safe_symbol, RawDataRecord, StorageWriter, SymbolHistory, SymbolStatus};
