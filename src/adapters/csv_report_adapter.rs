//! CSV report sink.
//!
//! Writes `<instrument>_processed.csv`, one row per bar with price,
//! indicator, condition and signal columns plus the action taken, and
//! `<instrument>_ledger.csv` with one row per closed trade.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::domain::bar::BarRecord;
use crate::domain::error::ImatradeError;
use crate::domain::metrics::Metrics;
use crate::domain::processor::SimulationResult;
use crate::ports::report_port::ReportSink;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvReportAdapter;

fn csv_error(path: &Path, e: csv::Error) -> ImatradeError {
    ImatradeError::Data {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

/// Union of field and flag names over all records, each sorted.
fn columns(records: &[BarRecord]) -> (Vec<String>, Vec<String>) {
    let mut fields = BTreeSet::new();
    let mut flags = BTreeSet::new();
    for record in records {
        fields.extend(record.fields.keys().cloned());
        flags.extend(record.flags.keys().cloned());
    }
    (fields.into_iter().collect(), flags.into_iter().collect())
}

impl CsvReportAdapter {
    fn write_processed(records: &[BarRecord], path: &Path) -> Result<(), ImatradeError> {
        let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
        let (fields, flags) = columns(records);

        let mut header: Vec<String> = ["index", "timestamp", "open", "high", "low", "close", "volume"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        header.extend(fields.iter().cloned());
        header.extend(flags.iter().cloned());
        header.push("complete".to_string());
        header.push("action".to_string());
        wtr.write_record(&header).map_err(|e| csv_error(path, e))?;

        for record in records {
            let bar = &record.bar;
            let mut row = vec![
                record.index.to_string(),
                bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume.to_string(),
            ];
            row.extend(
                fields
                    .iter()
                    .map(|f| record.fields.get(f).map(f64::to_string).unwrap_or_default()),
            );
            row.extend(
                flags
                    .iter()
                    .map(|f| record.flags.get(f).map(bool::to_string).unwrap_or_default()),
            );
            row.push(record.complete.to_string());
            row.push(record.action.as_ref().map(|a| a.label()).unwrap_or_default());
            wtr.write_record(&row).map_err(|e| csv_error(path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_ledger(result: &SimulationResult, path: &Path) -> Result<(), ImatradeError> {
        let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
        for entry in &result.ledger {
            wtr.serialize(entry).map_err(|e| csv_error(path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl ReportSink for CsvReportAdapter {
    fn write(
        &self,
        result: &SimulationResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), ImatradeError> {
        fs::create_dir_all(output_dir)?;
        let processed = output_dir.join(format!("{}_processed.csv", result.instrument));
        let ledger = output_dir.join(format!("{}_ledger.csv", result.instrument));

        Self::write_processed(&result.processed, &processed)?;
        Self::write_ledger(result, &ledger)?;

        tracing::info!(
            instrument = %result.instrument,
            processed = %processed.display(),
            ledger = %ledger.display(),
            trades = result.ledger.len(),
            win_rate = metrics.win_rate,
            "reports written"
        );
        Ok(())
    }
}
