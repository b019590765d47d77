//! CSV bar source: one `<instrument>.csv` per instrument in a directory.
//!
//! Header: `timestamp,open,high,low,close[,volume]`. Timestamps may be
//! `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, RFC 3339 or a bare date.

use crate::domain::bar::Bar;
use crate::domain::error::ImatradeError;
use crate::ports::data_port::BarSource;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Suffixes of files the report adapter writes; never treated as input.
const REPORT_SUFFIXES: &[&str] = &["_processed.csv", "_ledger.csv"];

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &str) -> PathBuf {
        self.base_path.join(format!("{instrument}.csv"))
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl BarSource for CsvAdapter {
    fn fetch_bars(&self, instrument: &str) -> Result<Vec<Bar>, ImatradeError> {
        let path = self.csv_path(instrument);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ImatradeError::NoData {
                    instrument: instrument.to_string(),
                });
            }
            Err(e) => {
                return Err(ImatradeError::Data {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars: Vec<Bar> = Vec::new();

        for (row, result) in rdr.deserialize::<BarRow>().enumerate() {
            // Header is line 1.
            let line = row + 2;
            let record = result.map_err(|e| ImatradeError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;

            let timestamp =
                parse_timestamp(&record.timestamp).ok_or_else(|| ImatradeError::Data {
                    reason: format!(
                        "{} line {}: invalid timestamp '{}'",
                        path.display(),
                        line,
                        record.timestamp
                    ),
                })?;

            let bar = Bar {
                timestamp,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
            };
            if !bar.is_consistent() {
                return Err(ImatradeError::Data {
                    reason: format!(
                        "{} line {}: inconsistent OHLC values",
                        path.display(),
                        line
                    ),
                });
            }
            if let Some(prev) = bars.last() {
                if bar.timestamp <= prev.timestamp {
                    return Err(ImatradeError::Data {
                        reason: format!(
                            "{} line {}: timestamp {} is not after {}",
                            path.display(),
                            line,
                            bar.timestamp,
                            prev.timestamp
                        ),
                    });
                }
            }
            bars.push(bar);
        }

        if bars.is_empty() {
            return Err(ImatradeError::NoData {
                instrument: instrument.to_string(),
            });
        }
        Ok(bars)
    }

    fn list_instruments(&self) -> Result<Vec<String>, ImatradeError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| ImatradeError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut instruments = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ImatradeError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if REPORT_SUFFIXES.iter().any(|s| name_str.ends_with(s)) {
                continue;
            }
            if let Some(instrument) = name_str.strip_suffix(".csv") {
                instruments.push(instrument.to_string());
            }
        }

        instruments.sort();
        Ok(instruments)
    }
}
