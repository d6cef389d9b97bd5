//! Canonical ordering for provider output before it is written to disk.

use super::provider::{FetchWindow, PricePanel, PriceSeries};

/// Canonicalizer for price tables.
pub struct Canonicalizer;

impl Canonicalizer {
    /// Sort ascending by timestamp, keep the first row per timestamp, and drop
    /// rows outside a bounded window.
    pub fn canonicalize(series: &mut PriceSeries, window: &FetchWindow) {
        series.rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        series.rows.dedup_by(|a, b| a.timestamp == b.timestamp);
        series.rows.retain(|r| window.contains(r.timestamp.date()));
    }

    /// Sort a stacked table by `(date, ticker)` and keep the first row per key.
    pub fn canonicalize_panel(panel: &mut PricePanel) {
        panel.rows.sort_by(|a, b| {
            a.row
                .timestamp
                .cmp(&b.row.timestamp)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        panel
            .rows
            .dedup_by(|a, b| a.row.timestamp == b.row.timestamp && a.ticker == b.ticker);
    }
}
