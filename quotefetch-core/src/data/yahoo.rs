//! Yahoo Finance data provider.
//!
//! Fetches OHLCV rows from Yahoo's v8 chart API: daily bars over a ten-year
//! range or an explicit date window, and one-minute bars for the current day.
//!
//! One request per fetch. There is no retry and, unless configured, no timeout.

use super::provider::{
    FetchError, FetchRequest, FetchWindow, Granularity, PriceProvider, PriceRow, PriceSeries,
    Stamp,
};
use crate::config::ProviderConfig;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: config.http_client()?,
            base_url: config.chart_base_url.clone(),
        })
    }

    /// Build the chart API URL for a request.
    fn chart_url(&self, request: &FetchRequest) -> Result<Url, FetchError> {
        let symbol = request.symbol.as_str();
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::provider(symbol, format!("invalid chart URL: {e}")))?;

        url.path_segments_mut()
            .map_err(|_| FetchError::provider(symbol, "chart URL cannot take a path"))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);

        {
            let mut query = url.query_pairs_mut();
            match request.window {
                FetchWindow::Range10y => {
                    query.append_pair("range", "10y");
                }
                FetchWindow::Today => {
                    query.append_pair("range", "1d");
                }
                FetchWindow::Between { start, end } => {
                    // Sessions east of UTC open on the previous UTC day. Ask
                    // from one day early; canonicalize trims by local date.
                    let from = start.pred_opt().unwrap_or(start);
                    query.append_pair("period1", &midnight_utc(from).to_string());
                    query.append_pair("period2", &midnight_utc(end).to_string());
                }
            }
            query.append_pair("interval", request.granularity.interval());
            query.append_pair("includeAdjustedClose", "true");
        }

        Ok(url)
    }

    /// Parse the chart API response into a price series.
    fn parse_response(
        request: &FetchRequest,
        resp: ChartResponse,
    ) -> Result<PriceSeries, FetchError> {
        let symbol = request.symbol.as_str();

        let result = match resp.chart.result {
            Some(result) => result,
            None => {
                return Err(match resp.chart.error {
                    Some(err) if err.code == "Not Found" => FetchError::empty(symbol),
                    Some(err) => {
                        FetchError::provider(symbol, format!("{}: {}", err.code, err.description))
                    }
                    None => FetchError::provider(symbol, "empty result with no error"),
                });
            }
        };

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::empty(symbol))?;

        // No trading in the window: Yahoo omits the timestamp array entirely.
        let timestamps = match data.timestamp {
            Some(ts) if !ts.is_empty() => ts,
            _ => return Err(FetchError::empty(symbol)),
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| {
                FetchError::provider(symbol, "response has timestamps but no quote data")
            })?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let gmtoffset = data.meta.map(|m| m.gmtoffset).unwrap_or(0);
        let offset = FixedOffset::east_opt(gmtoffset)
            .ok_or_else(|| {
                FetchError::provider(symbol, format!("invalid gmtoffset: {gmtoffset}"))
            })?;

        let mut rows = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let local = DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.with_timezone(&offset))
                .ok_or_else(|| FetchError::provider(symbol, format!("invalid timestamp: {ts}")))?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Holidays and halted minutes come back as all-null rows
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            let (timestamp, adj_close) = match request.granularity {
                Granularity::Daily => (
                    Stamp::Date(local.date_naive()),
                    Some(
                        adj_closes
                            .as_ref()
                            .and_then(|v| v.get(i).copied().flatten())
                            .unwrap_or(f64::NAN),
                    ),
                ),
                Granularity::Minute => (Stamp::DateTime(local), None),
            };

            rows.push(PriceRow {
                timestamp,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                adj_close,
                volume: volume.unwrap_or(0),
            });
        }

        if rows.is_empty() {
            return Err(FetchError::empty(symbol));
        }

        Ok(PriceSeries {
            symbol: symbol.to_string(),
            granularity: request.granularity,
            rows,
        })
    }
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<PriceSeries, FetchError> {
        let symbol = request.symbol.as_str();
        let url = self.chart_url(request)?;
        debug!(%url, "requesting chart");

        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::provider(symbol, e))?;
        let status = resp.status();
        let body = resp.text().map_err(|e| FetchError::provider(symbol, e))?;

        if !status.is_success() {
            // Unknown symbols come back as 404 with a chart.error payload
            if let Ok(chart) = serde_json::from_str::<ChartResponse>(&body) {
                if chart.chart.error.is_some() {
                    return Self::parse_response(request, chart);
                }
            }
            return Err(FetchError::provider(symbol, format!("HTTP {status} for {symbol}")));
        }

        let chart: ChartResponse = serde_json::from_str(&body).map_err(|e| {
            FetchError::provider(symbol, format!("failed to parse response for {symbol}: {e}"))
        })?;

        let series = Self::parse_response(request, chart)?;
        debug!(symbol, rows = series.len(), "chart parsed");
        Ok(series)
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> YahooProvider {
        YahooProvider::new(&ProviderConfig::default()).unwrap()
    }

    fn parse(request: &FetchRequest, json: &str) -> Result<PriceSeries, FetchError> {
        YahooProvider::parse_response(request, serde_json::from_str(json).unwrap())
    }

    #[test]
    fn range_url_uses_ten_year_daily() {
        let url = provider()
            .chart_url(&FetchRequest::daily("AAPL", FetchWindow::Range10y))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://query2.finance.yahoo.com/v8/finance/chart/AAPL\
             ?range=10y&interval=1d&includeAdjustedClose=true"
        );
    }

    #[test]
    fn bounded_url_uses_midnight_periods() {
        let window = FetchWindow::Between {
            start: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        let url = provider().chart_url(&FetchRequest::daily("AAPL", window)).unwrap();
        let query = url.query().unwrap();
        // One day before the start, at 00:00 UTC
        assert!(query.contains("period1=1577836800"));
        assert!(query.contains("period2=1704067200"));
        assert!(query.contains("interval=1d"));
    }

    #[test]
    fn bounded_url_covers_start_session_east_of_utc() {
        // BHP.AX trades 2024-01-02 from 2024-01-01T23:00Z
        let first_bar = 1_704_150_000;
        let window = FetchWindow::Between {
            start: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        };
        let url = provider().chart_url(&FetchRequest::daily("BHP.AX", window)).unwrap();
        let period1: i64 = url
            .query_pairs()
            .find(|(k, _)| k == "period1")
            .map(|(_, v)| v.parse().unwrap())
            .unwrap();
        assert!(period1 <= first_bar, "period1 {period1} is after the first bar");
    }

    #[test]
    fn start_day_bar_survives_canonicalize() {
        use crate::data::canonicalize::Canonicalizer;

        let window = FetchWindow::Between {
            start: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
        };
        let request = FetchRequest::daily("BHP.AX", window);
        // Previous day's bar, then 2024-01-02 and 2024-01-03 sessions at +11:00
        let json = r#"{"chart":{"result":[{
            "meta":{"gmtoffset":39600},
            "timestamp":[1704063600,1704150000,1704236400],
            "indicators":{
                "quote":[{"open":[45.0,45.5,46.0],"high":[45.9,46.1,46.5],
                          "low":[44.8,45.2,45.7],"close":[45.4,45.9,46.2],
                          "volume":[100,200,300]}],
                "adjclose":[{"adjclose":[45.4,45.9,46.2]}]
            }}],"error":null}}"#;

        let mut series = parse(&request, json).unwrap();
        Canonicalizer::canonicalize(&mut series, &window);

        let dates: Vec<String> = series.rows.iter().map(|r| r.timestamp.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-02", "2024-01-03"]);
    }

    #[test]
    fn intraday_url_uses_one_minute_today() {
        let url = provider().chart_url(&FetchRequest::intraday("MSFT")).unwrap();
        let query = url.query().unwrap();
        assert!(query.starts_with("range=1d&interval=1m"));
    }

    #[test]
    fn parses_daily_rows_and_skips_null_rows() {
        let json = r#"{"chart":{"result":[{
            "meta":{"gmtoffset":-18000},
            "timestamp":[1577975400,1578061800,1578321000],
            "indicators":{
                "quote":[{"open":[74.06,null,74.29],"high":[75.15,null,74.99],
                          "low":[73.79,null,73.18],"close":[75.08,null,74.94],
                          "volume":[135480400,null,118387200]}],
                "adjclose":[{"adjclose":[72.88,null,72.75]}]
            }}],"error":null}}"#;
        let series = parse(&FetchRequest::daily("AAPL", FetchWindow::Range10y), json).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.rows[0].timestamp.to_string(), "2020-01-02");
        assert_eq!(series.rows[1].timestamp.to_string(), "2020-01-06");
        assert_eq!(series.rows[0].adj_close, Some(72.88));
        assert_eq!(series.rows[1].volume, 118_387_200);
    }

    #[test]
    fn intraday_rows_are_exchange_local_without_adj_close() {
        let json = r#"{"chart":{"result":[{
            "meta":{"gmtoffset":-18000},
            "timestamp":[1709130600],
            "indicators":{"quote":[{"open":[182.5],"high":[182.9],"low":[182.1],
                                    "close":[182.7],"volume":[1200]}]}
            }],"error":null}}"#;
        let series = parse(&FetchRequest::intraday("AAPL"), json).unwrap();
        assert_eq!(series.granularity, Granularity::Minute);
        assert_eq!(series.rows[0].timestamp.to_string(), "2024-02-28 09:30:00-05:00");
        assert_eq!(series.rows[0].adj_close, None);
    }

    #[test]
    fn not_found_error_is_empty_result() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse(&FetchRequest::daily("ZZZZ", FetchWindow::Range10y), json).unwrap_err();
        assert!(matches!(err, FetchError::EmptyResult { .. }));
    }

    #[test]
    fn other_chart_error_is_provider_error() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        let err = parse(&FetchRequest::daily("AAPL", FetchWindow::Range10y), json).unwrap_err();
        match err {
            FetchError::Provider { message, .. } => {
                assert_eq!(message, "Bad Request: Invalid input")
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn missing_timestamps_is_empty_result() {
        let json = r#"{"chart":{"result":[{"meta":{"gmtoffset":0},"indicators":{"quote":[{}]}}],"error":null}}"#;
        let err = parse(&FetchRequest::intraday("AAPL"), json).unwrap_err();
        assert!(matches!(err, FetchError::EmptyResult { .. }));
    }
}
