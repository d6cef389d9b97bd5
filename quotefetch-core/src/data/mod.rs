//! Market data: record types, providers, canonical ordering, and batch downloads.

pub mod canonicalize;
pub mod download;
pub mod provider;
pub mod universe;
pub mod yahoo;

pub use canonicalize::Canonicalizer;
pub use download::{download_panel, DownloadProgress, DownloadSummary, StdoutProgress};
pub use provider::{
    FetchError, FetchRequest, FetchWindow, Granularity, PanelRow, PricePanel, PriceProvider,
    PriceRow, PriceSeries, Stamp,
};
pub use universe::{ConstituentPage, SymbolSource, UniverseError};
pub use yahoo::YahooProvider;
