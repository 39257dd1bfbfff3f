//! 파일 기반 저장소.
//!
//! # 디렉토리 구조
//!
//! ```text
//! {output_dir}/
//! ├── raw/
//! │   ├── NVDA/2024-01-02.json
//! │   ├── %5EVIX/2024-01-02.json
//! │   └── BTC-USD/2024-01-02.json
//! ├── history/
//! │   └── NVDA.json
//! └── metadata/
//!     ├── last_run.json
//!     └── update_status.json
//! ```
//!
//! 디렉토리/파일 이름은 [`safe_symbol`]로 인코딩되어 서로 다른 심볼이 같은 경로를
//! 갖지 않습니다. 기존 파일의 `symbol`이 다르면 덮어쓰지 않고 에러를 냅니다.
//!
//! # 쓰기 순서
//!
//! 원시 레코드, 일봉 시계열, `update_status.json`, 마지막으로 `last_run.json` 순서로
//! 기록합니다. 중간에 실패하면 이미 자리 잡은 파일은 그대로 남습니다.

use chrono::{DateTime, NaiveDate, Utc};
use pulse_core::{DailyBar, FetchResult, Payload, RunMetadata};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{StorageError, StorageResult};

const RAW_DIR: &str = "raw";
const HISTORY_DIR: &str = "history";
const METADATA_DIR: &str = "metadata";
const LAST_RUN_FILE: &str = "last_run.json";
const UPDATE_STATUS_FILE: &str = "update_status.json";

/// 심볼/날짜별 원시 데이터 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDataRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    pub provider: String,
    pub fetched_at: DateTime<Utc>,
    pub fields: Payload,
}

/// 심볼별 일봉 시계열 (최신 날짜가 먼저).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolHistory {
    pub symbol: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    pub provider: String,
    pub last_updated: DateTime<Utc>,
    pub bars: Vec<DailyBar>,
}

impl SymbolHistory {
    /// 새 일봉을 병합. 이미 있는 날짜는 기존 값을 유지합니다.
    ///
    /// 반환값은 새로 추가된 일봉 수입니다.
    pub fn merge(&mut self, incoming: &[DailyBar]) -> usize {
        let mut by_date: BTreeMap<NaiveDate, DailyBar> =
            self.bars.drain(..).map(|bar| (bar.date, bar)).collect();
        let before = by_date.len();
        for bar in incoming {
            by_date.entry(bar.date).or_insert_with(|| bar.clone());
        }
        let added = by_date.len() - before;
        self.bars = by_date.into_values().rev().collect();
        added
    }
}

/// 기존 파일의 심볼만 읽기 위한 헤더.
#[derive(Deserialize)]
struct RecordHeader {
    symbol: String,
}

/// 심볼별 누적 갱신 상태.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolStatus {
    pub last_updated: DateTime<Utc>,
    /// "success" 또는 "failed: <사유>"
    pub last_fetch_status: String,
    #[serde(default)]
    pub provider: Option<String>,
    /// 마지막으로 성공한 실행 날짜
    #[serde(default)]
    pub last_success_date: Option<NaiveDate>,
    /// 누적 일봉 수
    #[serde(default)]
    pub data_points: usize,
}

impl SymbolStatus {
    pub fn is_success(&self) -> bool {
        self.last_fetch_status == "success"
    }
}

/// 파일 시스템에 안전한 심볼 이름 (퍼센트 인코딩).
///
/// ASCII 영문/숫자와 `-`, `_`, `.`는 그대로 두고 나머지 바이트는 `%XX`로 바꿉니다
/// (`^VIX` → `%5EVIX`, `EURUSD=X` → `EURUSD%3DX`). 점으로만 된 이름은 점도 인코딩합니다.
/// 서로 다른 심볼은 항상 다른 이름이 됩니다.
pub fn safe_symbol(symbol: &str) -> String {
    let dots_only = symbol.bytes().all(|b| b == b'.');
    let mut out = String::with_capacity(symbol.len());
    for byte in symbol.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || byte == b'-'
            || byte == b'_'
            || (byte == b'.' && !dots_only);
        if keep {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// 실행 결과 저장기.
#[derive(Debug, Clone)]
pub struct StorageWriter {
    root: PathBuf,
}

impl StorageWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 원시 레코드 경로.
    pub fn record_path(&self, symbol: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join(RAW_DIR)
            .join(safe_symbol(symbol))
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// 일봉 시계열 경로.
    pub fn history_path(&self, symbol: &str) -> PathBuf {
        self.root
            .join(HISTORY_DIR)
            .join(format!("{}.json", safe_symbol(symbol)))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_DIR).join(LAST_RUN_FILE)
    }

    pub fn status_path(&self) -> PathBuf {
        self.root.join(METADATA_DIR).join(UPDATE_STATUS_FILE)
    }

    /// 실행 결과 저장.
    ///
    /// 성공한 결과마다 원시 레코드를 쓰고 일봉 시계열을 병합한 뒤, 누적 상태와
    /// 실행 메타데이터를 갱신합니다. 반환값은 기록한 원시 레코드 수입니다.
    pub fn write(&self, results: &[FetchResult], metadata: &RunMetadata) -> StorageResult<usize> {
        let date = metadata.run_date();
        let mut written = 0;

        for result in results.iter().filter(|r| r.is_success()) {
            let record = self.to_record(result, metadata, date);
            let path = self.record_path(&record.symbol, date);
            ensure_same_symbol(&path, &record.symbol)?;
            write_json_atomic(&path, &record)?;
            written += 1;
            tracing::debug!(symbol = %record.symbol, path = %path.display(), "원시 레코드 기록");
        }

        let mut data_points = BTreeMap::new();
        for result in results.iter().filter(|r| r.is_success() && !r.history.is_empty()) {
            let count = self.merge_history(result, metadata)?;
            data_points.insert(result.symbol.as_str(), count);
        }

        let mut statuses = self.load_symbol_status()?;
        for result in results {
            let previous = statuses.get(&result.symbol);
            let previous_success = previous.and_then(|s| s.last_success_date);
            let previous_points = previous.map_or(0, |s| s.data_points);
            let status = if result.is_success() {
                SymbolStatus {
                    last_updated: result.fetched_at,
                    last_fetch_status: "success".to_string(),
                    provider: result.provider.clone(),
                    last_success_date: Some(date),
                    data_points: data_points
                        .get(result.symbol.as_str())
                        .copied()
                        .unwrap_or(previous_points),
                }
            } else {
                let reason = result
                    .failure_reason()
                    .map(|r| r.as_str())
                    .unwrap_or("unknown");
                SymbolStatus {
                    last_updated: result.fetched_at,
                    last_fetch_status: format!("failed: {}", reason),
                    provider: result.provider.clone(),
                    last_success_date: previous_success,
                    data_points: previous_points,
                }
            };
            statuses.insert(result.symbol.clone(), status);
        }
        write_json_atomic(&self.status_path(), &statuses)?;
        write_json_atomic(&self.metadata_path(), metadata)?;

        tracing::info!(
            records = written,
            root = %self.root.display(),
            run_date = %date,
            "실행 결과 저장 완료"
        );
        Ok(written)
    }

    /// 기존 시계열에 병합하여 저장. 반환값은 병합 후 일봉 수입니다.
    fn merge_history(&self, result: &FetchResult, metadata: &RunMetadata) -> StorageResult<usize> {
        let path = self.history_path(&result.symbol);
        let summary = metadata.tickers.get(&result.symbol);
        let mut history = match read_json::<SymbolHistory>(&path)? {
            Some(existing) if existing.symbol != result.symbol => {
                return Err(StorageError::SymbolCollision {
                    path,
                    existing: existing.symbol,
                    incoming: result.symbol.clone(),
                });
            }
            Some(existing) => existing,
            None => SymbolHistory {
                symbol: result.symbol.clone(),
                category: String::new(),
                asset_type: None,
                provider: String::new(),
                last_updated: result.fetched_at,
                bars: Vec::new(),
            },
        };

        if let Some(summary) = summary {
            history.category = summary.category.clone();
            history.asset_type = summary.asset_type.clone();
        }
        history.provider = result.provider.clone().unwrap_or_default();
        history.last_updated = result.fetched_at;
        let added = history.merge(&result.history);

        write_json_atomic(&path, &history)?;
        tracing::debug!(
            symbol = %result.symbol,
            added = added,
            total = history.bars.len(),
            "일봉 시계열 병합"
        );
        Ok(history.bars.len())
    }

    fn to_record(&self, result: &FetchResult, metadata: &RunMetadata, date: NaiveDate) -> RawDataRecord {
        let summary = metadata.tickers.get(&result.symbol);
        RawDataRecord {
            symbol: result.symbol.clone(),
            date,
            category: summary.map(|s| s.category.clone()).unwrap_or_default(),
            asset_type: summary.and_then(|s| s.asset_type.clone()),
            provider: result.provider.clone().unwrap_or_default(),
            fetched_at: result.fetched_at,
            fields: result.payload.clone(),
        }
    }

    /// 최근 실행 메타데이터. 아직 없으면 `None`.
    pub fn load_metadata(&self) -> StorageResult<Option<RunMetadata>> {
        read_json(&self.metadata_path())
    }

    /// 원시 레코드 조회. 없으면 `None`.
    pub fn load_record(&self, symbol: &str, date: NaiveDate) -> StorageResult<Option<RawDataRecord>> {
        read_json(&self.record_path(symbol, date))
    }

    /// 일봉 시계열 조회. 없으면 `None`.
    pub fn load_history(&self, symbol: &str) -> StorageResult<Option<SymbolHistory>> {
        read_json(&self.history_path(symbol))
    }

    /// 누적 심볼 상태. 아직 없으면 빈 맵.
    pub fn load_symbol_status(&self) -> StorageResult<BTreeMap<String, SymbolStatus>> {
        Ok(read_json(&self.status_path())?.unwrap_or_default())
    }
}

/// 같은 경로에 다른 심볼의 레코드가 있으면 에러.
///
/// 읽을 수 없거나 형식이 다른 파일은 덮어쓰기 대상으로 봅니다.
fn ensure_same_symbol(path: &Path, symbol: &str) -> StorageResult<()> {
    let existing = fs::read(path)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<RecordHeader>(&bytes).ok());
    match existing {
        Some(header) if header.symbol != symbol => Err(StorageError::SymbolCollision {
            path: path.to_path_buf(),
            existing: header.symbol,
            incoming: symbol.to_string(),
        }),
        _ => Ok(()),
    }
}

/// 임시 파일에 쓰고 fsync한 뒤 rename으로 교체합니다.
///
/// 이전 실행이 남긴 `.tmp` 파일은 덮어씁니다.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let mut bytes =
        serde_json::to_vec_pretty(value).map_err(|e| StorageError::serialization(path, e))?;
    bytes.push(b'\n');

    let tmp_path = path.with_extension("json.tmp");
    let write_tmp = || -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()
    };
    if let Err(e) = write_tmp() {
        let _ = fs::remove_file(&tmp_path);
        return Err(StorageError::io(&tmp_path, e));
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StorageError::io(path, e)
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StorageError::serialization(path, e))
}
