use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::auth::{ServiceAccountKey, ServiceAccountTokenSource, StaticToken, TokenSource, CREDENTIALS_ENV};
use crate::config::{AppConfig, LoggingConfig, RendererBackend};
use crate::element_finder::{TextContains, TextLocator};
use crate::price::PriceExtractor;
use crate::refresher::{PriceRefresher, SheetColumns};
use crate::remote_renderer::RemoteRenderer;
use crate::scraper::{BrowserRenderer, ChromeDriver, PageRenderer};
use crate::sheets::{GoogleSheetsStore, SheetStore};
use crate::utils::error::Result;

/// Console logging plus an optional daily log file. Keep the returned guard
/// alive for as long as file output should be flushed.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))?;

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "kgprice-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

pub fn build_renderer(config: &AppConfig) -> Result<Arc<dyn PageRenderer>> {
    let locator: Arc<dyn TextLocator> = Arc::new(TextContains::new(config.browser.locator_text.clone()));

    let renderer: Arc<dyn PageRenderer> = match config.refresh.backend {
        RendererBackend::Chrome => Arc::new(BrowserRenderer::new(
            ChromeDriver,
            config.browser.clone(),
            locator,
        )),
        RendererBackend::ScrapingAnt => Arc::new(
            RemoteRenderer::new(config.remote.clone(), locator)?
                .with_extractor(PriceExtractor::with_strategy(config.refresh.digit_strategy)),
        ),
    };

    tracing::info!("Using {} renderer", renderer.name());
    Ok(renderer)
}

pub fn build_refresher(config: &AppConfig) -> Result<PriceRefresher> {
    let refresher = PriceRefresher::new(
        build_renderer(config)?,
        PriceExtractor::with_strategy(config.refresh.digit_strategy),
        config.refresh.delay(),
    )
    .with_columns(SheetColumns::from(&config.sheet));
    Ok(refresher)
}

pub fn build_sheet_store(config: &AppConfig) -> Result<Arc<dyn SheetStore>> {
    let client = Client::builder().build()?;

    let tokens: Arc<dyn TokenSource> = match &config.sheet.access_token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => {
            let env_json = std::env::var(CREDENTIALS_ENV).ok();
            let key = ServiceAccountKey::resolve(
                env_json.as_deref(),
                Path::new(&config.sheet.credentials_path),
            )?;
            Arc::new(ServiceAccountTokenSource::new(key, client.clone()))
        }
    };

    let store = GoogleSheetsStore::new(
        client,
        &config.sheet.api_base,
        &config.sheet.spreadsheet_id,
        &config.sheet.worksheet,
        tokens,
    )?;
    Ok(Arc::new(store))
}
