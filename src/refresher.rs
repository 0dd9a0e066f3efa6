use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::SheetConfig;
use crate::price::{PriceExtractor, UnitPrice};
use crate::scraper::PageRenderer;
use crate::sheets::SheetStore;
use crate::utils::error::{AppError, Result};

/// Format of the "last updated" cell.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of one scrape attempt. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeRecord {
    pub url: String,
    pub price: UnitPrice,
    pub attempted_at: DateTime<Local>,
}

impl ScrapeRecord {
    pub fn timestamp(&self) -> String {
        self.attempted_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub run_id: Uuid,
    pub rows: usize,
    pub attempted: usize,
    pub found: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_time_ms: u64,
}

/// Names of the sheet columns a refresh reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetColumns {
    pub url: String,
    pub price: String,
    pub updated: String,
}

impl Default for SheetColumns {
    fn default() -> Self {
        Self::from(&SheetConfig::default())
    }
}

impl From<&SheetConfig> for SheetColumns {
    fn from(config: &SheetConfig) -> Self {
        Self {
            url: config.url_column.clone(),
            price: config.price_column.clone(),
            updated: config.updated_column.clone(),
        }
    }
}

/// Walks the product URLs one at a time: render, extract, record, pause.
pub struct PriceRefresher {
    renderer: Arc<dyn PageRenderer>,
    extractor: PriceExtractor,
    delay: Duration,
    columns: SheetColumns,
}

impl PriceRefresher {
    pub fn new(renderer: Arc<dyn PageRenderer>, extractor: PriceExtractor, delay: Duration) -> Self {
        Self {
            renderer,
            extractor,
            delay,
            columns: SheetColumns::default(),
        }
    }

    pub fn with_columns(mut self, columns: SheetColumns) -> Self {
        self.columns = columns;
        self
    }

    /// Price for a single page. Render failures and extraction misses both
    /// come back as [`UnitPrice::NotFound`].
    pub async fn scrape_one(&self, url: &str) -> UnitPrice {
        let text = match self.renderer.render(url).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(url, kind = e.kind(), "Render failed: {}", e);
                return UnitPrice::NotFound;
            }
        };

        let price = self.extractor.extract(&text);
        match price {
            UnitPrice::Found(value) => tracing::info!(url, value, "Price found"),
            UnitPrice::NotFound => {
                tracing::warn!(url, text = %text, "No unit price in element text")
            }
        }
        price
    }

    /// One record per input URL, in input order. The configured delay is
    /// observed between consecutive URLs.
    pub async fn scrape_all(&self, urls: &[String]) -> Vec<ScrapeRecord> {
        let mut records = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            tracing::info!("[{}/{}] Scraping {}", index + 1, urls.len(), url);
            let attempted_at = Local::now();
            let price = self.scrape_one(url).await;

            records.push(ScrapeRecord {
                url: url.clone(),
                price,
                attempted_at,
            });
        }

        records
    }

    /// Reads the sheet, refreshes every row with a URL and writes the whole
    /// sheet back. Rows without a URL are carried over untouched.
    pub async fn refresh_sheet(&self, store: &dyn SheetStore) -> Result<RefreshSummary> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("refresh", %run_id, renderer = self.renderer.name());
        self.refresh_sheet_inner(store, run_id).instrument(span).await
    }

    async fn refresh_sheet_inner(&self, store: &dyn SheetStore, run_id: Uuid) -> Result<RefreshSummary> {
        let start_time = Instant::now();
        let mut table = store.read_table().await?;
        let url_column = table
            .column_index(&self.columns.url)
            .ok_or_else(|| AppError::MissingColumn {
                column: self.columns.url.clone(),
            })?;
        let price_column = table.ensure_column(&self.columns.price);
        let updated_column = table.ensure_column(&self.columns.updated);

        let targets: Vec<(usize, String)> = table
            .rows
            .iter()
            .enumerate()
            .filter_map(|(row, cells)| {
                let url = cells.get(url_column)?.trim();
                (!url.is_empty()).then(|| (row, url.to_string()))
            })
            .collect();
        let urls: Vec<String> = targets.iter().map(|(_, url)| url.clone()).collect();

        tracing::info!(
            "Refreshing {} of {} rows ({} without URL)",
            urls.len(),
            table.rows.len(),
            table.rows.len() - urls.len()
        );

        let records = self.scrape_all(&urls).await;

        let mut found = 0;
        for ((row, _), record) in targets.iter().zip(&records) {
            if record.price.is_found() {
                found += 1;
            }
            table.set_cell(*row, price_column, record.price.to_string());
            table.set_cell(*row, updated_column, record.timestamp());
        }

        tracing::info!("Scraping finished, rewriting sheet");
        store.overwrite(&table).await?;

        let summary = RefreshSummary {
            run_id,
            rows: table.rows.len(),
            attempted: records.len(),
            found,
            failed: records.len() - found,
            skipped: table.rows.len() - records.len(),
            total_time_ms: start_time.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Sheet updated: {} prices found, {} errors, {} rows skipped",
            summary.found,
            summary.failed,
            summary.skipped
        );

        Ok(summary)
    }
}
