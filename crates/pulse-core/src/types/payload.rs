//! Provider 응답 필드 맵.
//!
//! 필드 이름은 Provider와 무관하게 정규화됩니다 (`price`, `open`, `high`, `low`,
//! `previous_close`, `change`, `change_percent`, `volume`, `latest_trading_day` 등).
//! `BTreeMap`을 사용하므로 직렬화 결과가 항상 같은 순서를 가집니다.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 필드 값 (숫자 또는 문자열).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// 숫자 값 (JSON number로 저장)
    Number(#[serde(with = "rust_decimal::serde::float")] Decimal),
    /// 문자열 값
    Text(String),
}

impl FieldValue {
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(d) => Some(*d),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(d) => write!(f, "{}", d),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// 정렬된 필드 맵.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, FieldValue>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(field.into(), value.into());
    }

    /// 숫자 문자열을 파싱하여 삽입. 파싱 실패 시 `false`를 반환하고 아무것도 넣지 않습니다.
    ///
    /// "1.25%" 같은 퍼센트 표기도 허용합니다.
    pub fn insert_parsed(&mut self, field: &str, raw: &str) -> bool {
        match parse_decimal(raw) {
            Some(value) => {
                self.0.insert(field.to_string(), FieldValue::Number(value));
                true
            }
            None => false,
        }
    }

    /// `f64` 값을 삽입. NaN/무한대는 무시됩니다.
    pub fn insert_f64(&mut self, field: &str, value: f64) -> bool {
        match decimal_from_f64(value) {
            Some(d) => {
                self.0.insert(field.to_string(), FieldValue::Number(d));
                true
            }
            None => false,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn number(&self, field: &str) -> Option<Decimal> {
        self.0.get(field).and_then(FieldValue::as_decimal)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(FieldValue::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, FieldValue)> for Payload {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// `f64` → `Decimal`. NaN/무한대는 `None`.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| d.normalize())
}

/// 숫자 문자열 파싱. 끝의 `%`와 지수 표기를 허용합니다.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim().trim_end_matches('%');
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}
