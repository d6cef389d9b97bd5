//! CSV export — price tables and the intraday placeholder.
//!
//! Headers are lower-case. Every save replaces the target file outright: any
//! previous file is removed before the new content is written, so nothing from
//! an earlier run can survive into the next one.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::data::{Granularity, PricePanel, PriceRow, PriceSeries};

pub const DAILY_HEADER: [&str; 7] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "adjusted close",
    "volume",
];

pub const MINUTE_HEADER: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

pub const PANEL_HEADER: [&str; 8] = [
    "date",
    "ticker",
    "open",
    "high",
    "low",
    "close",
    "adjusted close",
    "volume",
];

/// Header of the empty intraday file written when no minute data is available.
pub const PLACEHOLDER_HEADER: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

// ─── CSV rendering ──────────────────────────────────────────────────

/// Render one symbol's rows. Daily tables carry the adjusted close column,
/// minute tables do not.
pub fn series_to_csv(series: &PriceSeries) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    match series.granularity {
        Granularity::Daily => wtr.write_record(DAILY_HEADER)?,
        Granularity::Minute => wtr.write_record(MINUTE_HEADER)?,
    }

    for r in &series.rows {
        let mut record = vec![
            r.timestamp.to_string(),
            price(r.open),
            price(r.high),
            price(r.low),
            price(r.close),
        ];
        if series.granularity == Granularity::Daily {
            record.push(adj_close(r));
        }
        record.push(r.volume.to_string());
        wtr.write_record(&record)?;
    }

    finish(wtr)
}

/// Render a stacked multi-symbol table.
pub fn panel_to_csv(panel: &PricePanel) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(PANEL_HEADER)?;

    for p in &panel.rows {
        let r = &p.row;
        wtr.write_record([
            &r.timestamp.to_string(),
            &p.ticker,
            &price(r.open),
            &price(r.high),
            &price(r.low),
            &price(r.close),
            &adj_close(r),
            &r.volume.to_string(),
        ])?;
    }

    finish(wtr)
}

/// Header-only table for the intraday placeholder.
pub fn placeholder_csv() -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(PLACEHOLDER_HEADER)?;
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(data)?)
}

/// Missing prices become empty cells.
fn price(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

fn adj_close(r: &PriceRow) -> String {
    r.adj_close.map(price).unwrap_or_default()
}

// ─── File output ────────────────────────────────────────────────────

/// Write `contents` to `path`, removing any existing file first.
pub fn replace_file(path: &Path, contents: &str) -> Result<(), ExportError> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    std::fs::write(path, contents)?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

pub fn save_series(path: &Path, series: &PriceSeries) -> Result<(), ExportError> {
    replace_file(path, &series_to_csv(series)?)
}

pub fn save_panel(path: &Path, panel: &PricePanel) -> Result<(), ExportError> {
    replace_file(path, &panel_to_csv(panel)?)
}

pub fn save_placeholder(path: &Path) -> Result<(), ExportError> {
    replace_file(path, &placeholder_csv()?)
}
