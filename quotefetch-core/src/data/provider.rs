//! Price record types, fetch requests, and the provider trait.
//!
//! The PriceProvider trait abstracts over the market-data source (Yahoo Finance
//! in production, stubs in tests) so the fetch procedure never depends on HTTP.

use chrono::{DateTime, FixedOffset, NaiveDate};
use std::fmt;
use thiserror::Error;

/// Row key: a trading date for daily data, an exchange-local instant for intraday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stamp {
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl Stamp {
    /// Calendar date of this stamp in the exchange's own offset.
    pub fn date(&self) -> NaiveDate {
        match self {
            Stamp::Date(d) => *d,
            Stamp::DateTime(dt) => dt.date_naive(),
        }
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stamp::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Stamp::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%:z")),
        }
    }
}

/// One OHLCV row as returned by a provider.
///
/// Missing prices are carried as NaN and written as empty CSV cells.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub timestamp: Stamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Only present for daily data.
    pub adj_close: Option<f64>,
    pub volume: u64,
}

/// Bar size requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    Minute,
}

impl Granularity {
    /// Provider interval code.
    pub fn interval(&self) -> &'static str {
        match self {
            Granularity::Daily => "1d",
            Granularity::Minute => "1m",
        }
    }
}

/// Time window for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchWindow {
    /// Provider-side ten-year lookback ending now.
    Range10y,
    /// Half-open date range `[start, end)`.
    Between { start: NaiveDate, end: NaiveDate },
    /// The current trading day.
    Today,
}

impl FetchWindow {
    /// Whether a row dated `date` belongs to this window.
    ///
    /// Provider-side windows (`Range10y`, `Today`) accept everything.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match self {
            FetchWindow::Between { start, end } => *start <= date && date < *end,
            FetchWindow::Range10y | FetchWindow::Today => true,
        }
    }
}

/// A single provider request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: String,
    pub window: FetchWindow,
    pub granularity: Granularity,
}

impl FetchRequest {
    pub fn daily(symbol: impl Into<String>, window: FetchWindow) -> Self {
        Self {
            symbol: symbol.into(),
            window,
            granularity: Granularity::Daily,
        }
    }

    /// One-minute bars for the current trading day.
    pub fn intraday(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            window: FetchWindow::Today,
            granularity: Granularity::Minute,
        }
    }
}

/// Price table for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    pub granularity: Granularity,
    pub rows: Vec<PriceRow>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Mean of the last `window` closes, or `None` if the series is shorter.
    pub fn trailing_mean_close(&self, window: usize) -> Option<f64> {
        if window == 0 || self.rows.len() < window {
            return None;
        }
        let tail = &self.rows[self.rows.len() - window..];
        Some(tail.iter().map(|r| r.close).sum::<f64>() / window as f64)
    }
}

/// One row of a multi-symbol table, keyed by `(date, ticker)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub ticker: String,
    pub row: PriceRow,
}

/// Daily rows for many symbols stacked into one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricePanel {
    pub rows: Vec<PanelRow>,
}

impl PricePanel {
    /// Append every row of `series` under its symbol.
    pub fn extend_from(&mut self, series: PriceSeries) {
        let ticker = series.symbol;
        self.rows.extend(series.rows.into_iter().map(|row| PanelRow {
            ticker: ticker.clone(),
            row,
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Failure of a single fetch.
///
/// Callers treat both kinds the same way (report and move on), but keep them
/// apart so messages can say which one happened.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider answered but had no rows for the symbol/window.
    #[error("no data returned for {symbol}")]
    EmptyResult { symbol: String },

    /// The request itself failed: transport, provider-side error, or an
    /// unreadable response.
    #[error("{message}")]
    Provider { symbol: String, message: String },
}

impl FetchError {
    pub fn empty(symbol: &str) -> Self {
        FetchError::EmptyResult {
            symbol: symbol.to_string(),
        }
    }

    pub fn provider(symbol: &str, message: impl fmt::Display) -> Self {
        FetchError::Provider {
            symbol: symbol.to_string(),
            message: message.to_string(),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            FetchError::EmptyResult { symbol } | FetchError::Provider { symbol, .. } => symbol,
        }
    }
}

/// Source of price tables.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch one symbol's rows for the requested window and granularity.
    fn fetch(&self, request: &FetchRequest) -> Result<PriceSeries, FetchError>;
}
