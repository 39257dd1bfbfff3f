//! 일봉/관측값 시계열.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 하루치 시세.
///
/// 관측값만 있는 경제 지표 시계열은 `close`만 채웁니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub open: Option<Decimal>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub high: Option<Decimal>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub low: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub close: Decimal,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub volume: Option<Decimal>,
}

impl DailyBar {
    /// 시가/고가/저가/종가/거래량이 있는 일봉.
    pub fn ohlcv(
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Option<Decimal>,
    ) -> Self {
        Self {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close,
            volume,
        }
    }

    /// 값 하나뿐인 관측치.
    pub fn observation(date: NaiveDate, value: Decimal) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close: value,
            volume: None,
        }
    }
}
