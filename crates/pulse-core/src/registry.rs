//! 티커 레지스트리 로더.
//!
//! 레지스트리는 헤더가 있는 CSV 파일입니다:
//!
//! ```text
//! symbol,type,category,api_source,enabled
//! NVDA,stock,AI indicator,alpha_vantage,TRUE
//! ^VIX,index,volatility,yahoo_finance,TRUE
//! BTC-USD,crypto,crypto,,TRUE
//! ```
//!
//! - `type`, `api_source`는 비워 둘 수 있습니다 (`api_source`가 비었거나 `auto`면 선호 없음).
//! - `enabled`가 비었거나 없으면 활성, `true`/`1`/`yes`는 활성, `false`/`0`/`no`는 비활성입니다.
//! - 잘못된 행과 중복 심볼은 로드 시점에 거부됩니다. 중복 검사는 비활성 행까지 포함합니다.

use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::error::RegistryError;
use crate::types::TickerDescriptor;

#[derive(Debug, Deserialize)]
struct RegistryRow {
    #[serde(default)]
    symbol: String,
    #[serde(rename = "type", default)]
    asset_type: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    api_source: String,
    #[serde(default)]
    enabled: String,
}

/// 검증된 티커 목록 (레지스트리 순서 유지).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerRegistry {
    tickers: Vec<TickerDescriptor>,
}

impl TickerRegistry {
    /// 파일에서 레지스트리 로드.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let file = std::fs::File::open(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_reader(file)?;
        tracing::debug!(
            path = %path.display(),
            tickers = registry.len(),
            "티커 레지스트리 로드 완료"
        );
        Ok(registry)
    }

    /// CSV 문자열에서 레지스트리 파싱.
    pub fn from_csv_str(content: &str) -> Result<Self, RegistryError> {
        Self::from_reader(content.as_bytes())
    }

    /// 임의의 reader에서 레지스트리 파싱.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RegistryError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .flexible(false)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if !headers.iter().any(|h| h == "symbol") {
            return Err(RegistryError::malformed(1, "missing 'symbol' column"));
        }
        if !headers.iter().any(|h| h == "category") {
            return Err(RegistryError::malformed(1, "missing 'category' column"));
        }

        let mut seen: HashMap<String, u64> = HashMap::new();
        let mut tickers = Vec::new();

        for record in csv_reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let row: RegistryRow = record.deserialize(Some(&headers))?;

            if row.symbol.is_empty() {
                return Err(RegistryError::malformed(line, "empty symbol"));
            }
            if row.category.is_empty() {
                return Err(RegistryError::malformed(
                    line,
                    format!("empty category for '{}'", row.symbol),
                ));
            }
            if seen.insert(row.symbol.clone(), line).is_some() {
                return Err(RegistryError::DuplicateSymbol {
                    symbol: row.symbol,
                    line,
                });
            }

            if !parse_enabled(&row.enabled).ok_or_else(|| {
                RegistryError::malformed(line, format!("invalid enabled flag '{}'", row.enabled))
            })? {
                continue;
            }

            let mut ticker = TickerDescriptor::new(row.symbol, row.category);
            if !row.asset_type.is_empty() {
                ticker = ticker.with_asset_type(row.asset_type.to_lowercase());
            }
            let source = row.api_source.to_lowercase();
            if !source.is_empty() && source != "auto" {
                ticker = ticker.with_preferred_provider(source);
            }
            tickers.push(ticker);
        }

        if tickers.is_empty() {
            return Err(RegistryError::Empty);
        }

        Ok(Self { tickers })
    }

    /// 티커 목록으로 직접 생성 (중복/빈 심볼 검증 포함).
    pub fn from_tickers(tickers: Vec<TickerDescriptor>) -> Result<Self, RegistryError> {
        let mut seen = HashMap::new();
        for (idx, ticker) in tickers.iter().enumerate() {
            let line = idx as u64 + 1;
            if ticker.symbol.is_empty() {
                return Err(RegistryError::malformed(line, "empty symbol"));
            }
            if seen.insert(ticker.symbol.as_str(), line).is_some() {
                return Err(RegistryError::DuplicateSymbol {
                    symbol: ticker.symbol.clone(),
                    line,
                });
            }
        }
        if tickers.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(Self { tickers })
    }

    /// 선호 Provider가 설정된 Provider 중 하나인지 검증.
    pub fn validate_providers(&self, known: &[&str]) -> Result<(), RegistryError> {
        for ticker in &self.tickers {
            if let Some(provider) = &ticker.preferred_provider {
                if !known.contains(&provider.as_str()) {
                    return Err(RegistryError::UnknownProvider {
                        symbol: ticker.symbol.clone(),
                        provider: provider.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn tickers(&self) -> &[TickerDescriptor] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn into_inner(self) -> Vec<TickerDescriptor> {
        self.tickers
    }
}

fn parse_enabled(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "" | "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
