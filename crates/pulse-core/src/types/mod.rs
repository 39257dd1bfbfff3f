//! 수집 파이프라인 공통 타입.
//!
//! - `TickerDescriptor` - 레지스트리에서 읽은 수집 대상
//! - `DailyBar` - 일봉 또는 관측값 시계열의 한 점
//! - `Payload` / `FieldValue` - Provider가 돌려준 필드 맵
//! - `FetchResult` / `FetchOutcome` / `FailureReason` - 티커별 수집 결과

pub mod bar;
pub mod fetch;
pub mod payload;
pub mod ticker;

pub use bar::DailyBar;
pub use fetch::{FailureReason, FetchOutcome, FetchResult};
pub use payload::{decimal_from_f64, parse_decimal, FieldValue, Payload};
pub use ticker::TickerDescriptor;
