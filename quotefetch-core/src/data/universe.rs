//! Index constituents — the ticker list behind a multi-symbol download.
//!
//! The S&P 500 membership is read from a public HTML page whose first table
//! has a `Symbol` column. Symbols are rewritten to the provider's convention
//! (`BRK.B` becomes `BRK-B`) and de-duplicated in page order.

use crate::config::ProviderConfig;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("failed to fetch constituent page: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse constituent page: {0}")]
    Parse(String),
}

/// Anything that can produce a list of ticker symbols.
pub trait SymbolSource {
    fn symbols(&self) -> Result<Vec<String>, UniverseError>;
}

/// Constituent list scraped from a web page.
pub struct ConstituentPage {
    client: reqwest::blocking::Client,
    url: String,
}

impl ConstituentPage {
    pub fn new(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: config.http_client()?,
            url: config.constituents_url.clone(),
        })
    }
}

impl SymbolSource for ConstituentPage {
    fn symbols(&self) -> Result<Vec<String>, UniverseError> {
        debug!(url = %self.url, "requesting constituent page");
        let body = self
            .client
            .get(&self.url)
            .send()?
            .error_for_status()?
            .text()?;
        parse_symbols(&body)
    }
}

/// Rewrite a listed symbol to the provider's form. Blank cells yield `None`.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.replace('.', "-"))
}

/// Extract the `Symbol` column of the first table in `html`.
pub fn parse_symbols(html: &str) -> Result<Vec<String>, UniverseError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let th_sel = selector("th")?;
    let td_sel = selector("td")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| UniverseError::Parse("no table found".into()))?;

    let column = table
        .select(&row_sel)
        .find_map(|tr| {
            tr.select(&th_sel)
                .position(|th| cell_text(th).eq_ignore_ascii_case("symbol"))
        })
        .ok_or_else(|| UniverseError::Parse("no Symbol column in first table".into()))?;

    let mut seen = HashSet::new();
    let mut symbols = Vec::new();
    for tr in table.select(&row_sel) {
        let Some(cell) = tr.select(&td_sel).nth(column) else {
            continue;
        };
        if let Some(symbol) = normalize_symbol(&cell_text(cell)) {
            if seen.insert(symbol.clone()) {
                symbols.push(symbol);
            }
        }
    }

    if symbols.is_empty() {
        return Err(UniverseError::Parse("Symbol column is empty".into()));
    }

    debug!(count = symbols.len(), "parsed constituents");
    Ok(symbols)
}

fn selector(css: &str) -> Result<Selector, UniverseError> {
    Selector::parse(css).map_err(|e| UniverseError::Parse(format!("bad selector {css}: {e}")))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}
