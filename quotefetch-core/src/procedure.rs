//! Fetch → canonicalize → persist, one run per invocation.
//!
//! Every failure is reported on stdout and swallowed: a run never returns an
//! error, it returns an [`Outcome`] describing what ended up on disk.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use thiserror::Error;
use tracing::{info, warn};

use crate::data::{
    download_panel, Canonicalizer, FetchError, FetchRequest, FetchWindow, PriceProvider,
    PriceSeries, StdoutProgress, SymbolSource,
};
use crate::export;

pub const STOCK_DATA_FILE: &str = "stock_data.csv";
pub const HISTORICAL_DATA_FILE: &str = "historical_data.csv";
pub const MINUTE_DATA_FILE: &str = "minute_data.csv";
pub const INDEX_DATA_FILE: &str = "intraday_data.csv";

/// Length of the recent-window lookback, in calendar days.
pub const RECENT_WINDOW_DAYS: i64 = 100;

/// Window used for the trailing close average in the success log line.
const MOVING_AVERAGE_WINDOW: usize = 5;

pub const USAGE: &str = "\
Incorrect usage of the script.
Usage: quotefetch <ticker> [start_date end_date] [--realtime | --recent]
       quotefetch --sp500 [start_date end_date]
Example without dates: quotefetch AAPL
Example with dates: quotefetch AAPL 2020-01-01 2024-01-01
Example for real-time: quotefetch AAPL --realtime
Example for the last 100 days: quotefetch AAPL --recent
Example for S&P 500 constituents: quotefetch --sp500 2016-02-24 2024-02-24";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("unrecognized argument shape")]
    Shape,

    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    BadDate(String),
}

/// Mode switches given alongside the positional arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub realtime: bool,
    pub recent: bool,
    pub sp500: bool,
}

/// What a single run downloads and where it writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Ten years of daily rows.
    LongRange { ticker: String },
    /// Daily rows in `[start, end)`.
    Bounded {
        ticker: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    /// The last 100 days of daily rows.
    Recent { ticker: String },
    /// Today's one-minute rows.
    Intraday { ticker: String },
    /// Daily rows for every S&P 500 constituent, stacked by `(date, ticker)`.
    Index { range: Option<(NaiveDate, NaiveDate)> },
}

impl Mode {
    /// Map the command-line shape to a mode.
    pub fn classify(positionals: &[String], flags: ModeFlags) -> Result<Self, UsageError> {
        let switches = [flags.realtime, flags.recent, flags.sp500]
            .iter()
            .filter(|on| **on)
            .count();
        if switches > 1 {
            return Err(UsageError::Shape);
        }

        match positionals {
            [] if flags.sp500 => Ok(Mode::Index { range: None }),
            [start, end] if flags.sp500 => Ok(Mode::Index {
                range: Some((parse_date(start)?, parse_date(end)?)),
            }),
            _ if flags.sp500 => Err(UsageError::Shape),
            [ticker] if flags.realtime => Ok(Mode::Intraday {
                ticker: ticker.clone(),
            }),
            [ticker] if flags.recent => Ok(Mode::Recent {
                ticker: ticker.clone(),
            }),
            _ if flags.realtime || flags.recent => Err(UsageError::Shape),
            [ticker] => Ok(Mode::LongRange {
                ticker: ticker.clone(),
            }),
            [ticker, start, end] => Ok(Mode::Bounded {
                ticker: ticker.clone(),
                start: parse_date(start)?,
                end: parse_date(end)?,
            }),
            _ => Err(UsageError::Shape),
        }
    }

    /// Fixed output file name for this mode.
    pub fn output_file(&self) -> &'static str {
        match self {
            Mode::LongRange { .. } | Mode::Bounded { .. } => STOCK_DATA_FILE,
            Mode::Recent { .. } => HISTORICAL_DATA_FILE,
            Mode::Intraday { .. } => MINUTE_DATA_FILE,
            Mode::Index { .. } => INDEX_DATA_FILE,
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, UsageError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| UsageError::BadDate(s.to_string()))
}

/// What a run left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A table was written.
    Saved { path: PathBuf, rows: usize },
    /// The provider had no rows; nothing was written.
    NoData,
    /// The fetch or the write failed; nothing new was written.
    Failed,
    /// Intraday only: the header-only file was written in place of data.
    Placeholder { path: PathBuf },
}

/// One fetch-normalize-persist run against a provider.
pub struct Procedure<'a> {
    provider: &'a dyn PriceProvider,
    symbols: Option<&'a dyn SymbolSource>,
    out_dir: PathBuf,
    today: NaiveDate,
}

impl<'a> Procedure<'a> {
    /// `today` anchors the recent window and the intraday messages.
    pub fn new(
        provider: &'a dyn PriceProvider,
        out_dir: impl AsRef<Path>,
        today: NaiveDate,
    ) -> Self {
        Self {
            provider,
            symbols: None,
            out_dir: out_dir.as_ref().to_path_buf(),
            today,
        }
    }

    /// Constituent source for [`Mode::Index`].
    pub fn with_symbol_source(mut self, symbols: &'a dyn SymbolSource) -> Self {
        self.symbols = Some(symbols);
        self
    }

    pub fn run(&self, mode: &Mode) -> Outcome {
        let file = mode.output_file();
        match mode {
            Mode::LongRange { ticker } => self.download_daily(ticker, FetchWindow::Range10y, file),
            Mode::Bounded { ticker, start, end } => self.download_daily(
                ticker,
                FetchWindow::Between {
                    start: *start,
                    end: *end,
                },
                file,
            ),
            Mode::Recent { ticker } => self.download_recent(ticker, file),
            Mode::Intraday { ticker } => self.download_minute(ticker, file),
            Mode::Index { range } => self.download_index(*range, file),
        }
    }

    fn download_daily(&self, ticker: &str, window: FetchWindow, file: &str) -> Outcome {
        match self.fetch(&FetchRequest::daily(ticker, window)) {
            Ok(series) => self.save(&series, file),
            Err(FetchError::EmptyResult { .. }) => {
                println!("No data found for {ticker}");
                Outcome::NoData
            }
            Err(e) => {
                println!("Failed to download data for {ticker} with error: {e}");
                Outcome::Failed
            }
        }
    }

    fn download_recent(&self, ticker: &str, file: &str) -> Outcome {
        let window = FetchWindow::Between {
            start: self.today - Duration::days(RECENT_WINDOW_DAYS),
            end: self.today,
        };
        match self.fetch(&FetchRequest::daily(ticker, window)) {
            Ok(series) => self.save(&series, file),
            Err(FetchError::EmptyResult { .. }) => {
                println!("No historical data found for {ticker}");
                Outcome::NoData
            }
            Err(e) => {
                println!("Failed to download past data for {ticker} with error: {e}");
                Outcome::Failed
            }
        }
    }

    fn download_minute(&self, ticker: &str, file: &str) -> Outcome {
        let today = self.today;
        match self.fetch(&FetchRequest::intraday(ticker)) {
            Ok(series) => {
                let outcome = self.save(&series, file);
                if matches!(outcome, Outcome::Saved { .. }) {
                    println!("Minute data for {ticker} on {today} downloaded successfully.");
                }
                outcome
            }
            Err(FetchError::EmptyResult { .. }) => {
                println!("No minute-level data found for {ticker} on {today}.");
                self.placeholder(file, "as no trading data was available")
            }
            Err(e) => {
                println!("Error fetching minute-level data for {ticker} on {today}: {e}");
                self.placeholder(file, "due to an error")
            }
        }
    }

    fn download_index(&self, range: Option<(NaiveDate, NaiveDate)>, file: &str) -> Outcome {
        let Some(source) = self.symbols else {
            println!("No constituent source configured");
            return Outcome::Failed;
        };

        let symbols = match source.symbols() {
            Ok(symbols) => symbols,
            Err(e) => {
                println!("Failed to fetch index constituents: {e}");
                return Outcome::Failed;
            }
        };
        info!(count = symbols.len(), "downloading index constituents");

        let window = match range {
            Some((start, end)) => FetchWindow::Between { start, end },
            None => FetchWindow::Range10y,
        };
        let summary = download_panel(self.provider, &symbols, window, &StdoutProgress);
        if !summary.all_succeeded() {
            warn!(
                failed = summary.failed(),
                total = summary.total,
                "some constituents were skipped"
            );
        }

        if summary.panel.is_empty() {
            println!("No data found for index constituents");
            return Outcome::NoData;
        }

        let path = self.out_dir.join(file);
        match export::save_panel(&path, &summary.panel) {
            Ok(()) => {
                println!("Data saved successfully to {}", path.display());
                Outcome::Saved {
                    rows: summary.panel.rows.len(),
                    path,
                }
            }
            Err(e) => {
                println!("Failed to save data to {}: {e}", path.display());
                Outcome::Failed
            }
        }
    }

    /// Fetch and canonicalize; a table emptied by the window counts as empty.
    fn fetch(&self, request: &FetchRequest) -> Result<PriceSeries, FetchError> {
        let mut series = match self.provider.fetch(request) {
            Ok(series) => series,
            Err(e) => {
                warn!(
                    provider = self.provider.name(),
                    symbol = e.symbol(),
                    error = %e,
                    "fetch failed"
                );
                return Err(e);
            }
        };
        Canonicalizer::canonicalize(&mut series, &request.window);
        if series.is_empty() {
            return Err(FetchError::empty(&request.symbol));
        }
        Ok(series)
    }

    fn save(&self, series: &PriceSeries, file: &str) -> Outcome {
        let path = self.out_dir.join(file);
        match export::save_series(&path, series) {
            Ok(()) => {
                println!("Data saved successfully to {}", path.display());
                info!(
                    symbol = series.symbol.as_str(),
                    rows = series.len(),
                    mean_close = ?series.trailing_mean_close(MOVING_AVERAGE_WINDOW),
                    "saved"
                );
                Outcome::Saved {
                    path,
                    rows: series.len(),
                }
            }
            Err(e) => {
                println!("Failed to save data to {}: {e}", path.display());
                Outcome::Failed
            }
        }
    }

    fn placeholder(&self, file: &str, reason: &str) -> Outcome {
        let path = self.out_dir.join(file);
        match export::save_placeholder(&path) {
            Ok(()) => {
                println!("Empty {file} created {reason}.");
                Outcome::Placeholder { path }
            }
            Err(e) => {
                println!("Failed to save data to {}: {e}", path.display());
                Outcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn ticker_alone_is_long_range() {
        let mode = Mode::classify(&args(&["AAPL"]), ModeFlags::default()).unwrap();
        assert_eq!(mode, Mode::LongRange { ticker: "AAPL".into() });
        assert_eq!(mode.output_file(), STOCK_DATA_FILE);
    }

    #[test]
    fn ticker_with_dates_is_bounded() {
        let argv = args(&["AAPL", "2020-01-01", "2024-01-01"]);
        let mode = Mode::classify(&argv, ModeFlags::default()).unwrap();
        assert_eq!(
            mode,
            Mode::Bounded {
                ticker: "AAPL".into(),
                start: d(2020, 1, 1),
                end: d(2024, 1, 1),
            }
        );
        assert_eq!(mode.output_file(), STOCK_DATA_FILE);
    }

    #[test]
    fn realtime_flag_is_intraday() {
        let flags = ModeFlags {
            realtime: true,
            ..Default::default()
        };
        let mode = Mode::classify(&args(&["AAPL"]), flags).unwrap();
        assert_eq!(mode, Mode::Intraday { ticker: "AAPL".into() });
        assert_eq!(mode.output_file(), MINUTE_DATA_FILE);
    }

    #[test]
    fn recent_flag_writes_historical_file() {
        let flags = ModeFlags {
            recent: true,
            ..Default::default()
        };
        let mode = Mode::classify(&args(&["AAPL"]), flags).unwrap();
        assert_eq!(mode.output_file(), HISTORICAL_DATA_FILE);
    }

    #[test]
    fn sp500_takes_no_ticker() {
        let flags = ModeFlags {
            sp500: true,
            ..Default::default()
        };
        assert_eq!(
            Mode::classify(&[], flags).unwrap(),
            Mode::Index { range: None }
        );
        assert_eq!(
            Mode::classify(&args(&["2016-02-24", "2024-02-24"]), flags).unwrap(),
            Mode::Index {
                range: Some((d(2016, 2, 24), d(2024, 2, 24)))
            }
        );
        assert_eq!(
            Mode::classify(&args(&["AAPL"]), flags),
            Err(UsageError::Shape)
        );
    }

    #[test]
    fn other_shapes_are_usage_errors() {
        let none = ModeFlags::default();
        assert_eq!(Mode::classify(&[], none), Err(UsageError::Shape));
        assert_eq!(Mode::classify(&args(&["AAPL", "2020-01-01"]), none), Err(UsageError::Shape));
        assert_eq!(
            Mode::classify(&args(&["A", "B", "C", "D"]), none),
            Err(UsageError::Shape)
        );

        let realtime = ModeFlags {
            realtime: true,
            ..Default::default()
        };
        assert_eq!(
            Mode::classify(&args(&["AAPL", "2020-01-01", "2024-01-01"]), realtime),
            Err(UsageError::Shape)
        );

        let both = ModeFlags {
            realtime: true,
            recent: true,
            sp500: false,
        };
        assert_eq!(Mode::classify(&args(&["AAPL"]), both), Err(UsageError::Shape));
    }

    #[test]
    fn malformed_date_is_reported() {
        // Month 28 does not exist
        assert_eq!(
            Mode::classify(&args(&["AAPL", "2016-28-24", "2024-01-01"]), ModeFlags::default()),
            Err(UsageError::BadDate("2016-28-24".into()))
        );
    }
}
