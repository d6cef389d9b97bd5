//! Download orchestrator — fetches many symbols one after another and stacks
//! the results into a `(date, ticker)` panel.

use super::canonicalize::Canonicalizer;
use super::provider::{FetchError, FetchRequest, FetchWindow, PricePanel, PriceProvider};
use tracing::warn;

/// Progress callback for multi-symbol downloads.
pub trait DownloadProgress {
    /// Called when starting to fetch a symbol.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol fetch completes.
    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: Result<usize, &FetchError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: Result<usize, &FetchError>,
    ) {
        match result {
            Ok(rows) => println!("  OK: {symbol} ({rows} rows)"),
            Err(FetchError::EmptyResult { .. }) => println!("  EMPTY: {symbol}"),
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nDownload complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Fetch daily rows for every symbol over the same window.
///
/// A failing or empty symbol is recorded and skipped; the batch always runs to
/// the end.
pub fn download_panel(
    provider: &dyn PriceProvider,
    symbols: &[String],
    window: FetchWindow,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = symbols.len();
    let mut panel = PricePanel::default();
    let mut succeeded = 0;
    let mut errors: Vec<FetchError> = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        let request = FetchRequest::daily(symbol.as_str(), window);
        let result = provider.fetch(&request).and_then(|mut series| {
            Canonicalizer::canonicalize(&mut series, &window);
            if series.is_empty() {
                Err(FetchError::empty(symbol))
            } else {
                Ok(series)
            }
        });

        progress.on_complete(symbol, i, total, result.as_ref().map(|s| s.len()));

        match result {
            Ok(series) => {
                panel.extend_from(series);
                succeeded += 1;
            }
            Err(e) => {
                warn!(symbol = symbol.as_str(), error = %e, "skipping symbol");
                errors.push(e);
            }
        }
    }

    Canonicalizer::canonicalize_panel(&mut panel);
    progress.on_batch_complete(succeeded, errors.len(), total);

    DownloadSummary {
        total,
        succeeded,
        errors,
        panel,
    }
}

/// Summary of a batch download.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub errors: Vec<FetchError>,
    pub panel: PricePanel,
}

impl DownloadSummary {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{Granularity, PriceRow, PriceSeries, Stamp};
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct MapProvider;

    impl PriceProvider for MapProvider {
        fn name(&self) -> &str {
            "map"
        }

        fn fetch(&self, request: &FetchRequest) -> Result<PriceSeries, FetchError> {
            let day = |d| NaiveDate::from_ymd_opt(2020, 1, d).unwrap();
            let row = |d, close| PriceRow {
                timestamp: Stamp::Date(day(d)),
                open: close,
                high: close,
                low: close,
                close,
                adj_close: Some(close),
                volume: 10,
            };
            match request.symbol.as_str() {
                "AAA" => Ok(PriceSeries {
                    symbol: "AAA".into(),
                    granularity: Granularity::Daily,
                    rows: vec![row(3, 2.0), row(2, 1.0)],
                }),
                "BBB" => Ok(PriceSeries {
                    symbol: "BBB".into(),
                    granularity: Granularity::Daily,
                    rows: vec![row(2, 5.0)],
                }),
                "DEAD" => Err(FetchError::empty("DEAD")),
                other => Err(FetchError::provider(other, "HTTP 500")),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl DownloadProgress for Recorder {
        fn on_start(&self, symbol: &str, _: usize, _: usize) {
            self.events.lock().unwrap().push(format!("start {symbol}"));
        }

        fn on_complete(
            &self,
            symbol: &str,
            _: usize,
            _: usize,
            result: Result<usize, &FetchError>,
        ) {
            let tag = if result.is_ok() { "ok" } else { "err" };
            self.events.lock().unwrap().push(format!("{tag} {symbol}"));
        }

        fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {succeeded}/{failed}/{total}"));
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn failures_are_skipped_not_fatal() {
        let progress = Recorder::default();
        let summary = download_panel(
            &MapProvider,
            &symbols(&["BBB", "BROKEN", "AAA", "DEAD"]),
            FetchWindow::Range10y,
            &progress,
        );

        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed(), 2);
        assert!(!summary.all_succeeded());
        assert_eq!(summary.panel.rows.len(), 3);

        let events = progress.events.lock().unwrap();
        assert_eq!(events.first().unwrap(), "start BBB");
        assert!(events.contains(&"err BROKEN".to_string()));
        assert_eq!(events.last().unwrap(), "done 2/2/4");
    }

    #[test]
    fn panel_is_date_major_then_ticker() {
        let summary = download_panel(
            &MapProvider,
            &symbols(&["BBB", "AAA"]),
            FetchWindow::Range10y,
            &Recorder::default(),
        );
        let keys: Vec<_> = summary
            .panel
            .rows
            .iter()
            .map(|r| (r.row.timestamp.to_string(), r.ticker.clone()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2020-01-02".to_string(), "AAA".to_string()),
                ("2020-01-02".to_string(), "BBB".to_string()),
                ("2020-01-03".to_string(), "AAA".to_string()),
            ]
        );
    }

    #[test]
    fn rows_outside_window_count_as_empty() {
        let window = FetchWindow::Between {
            start: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
        };
        let summary =
            download_panel(&MapProvider, &symbols(&["AAA"]), window, &Recorder::default());
        assert_eq!(summary.succeeded, 0);
        assert!(matches!(summary.errors[0], FetchError::EmptyResult { .. }));
        assert!(summary.panel.is_empty());
    }
}
