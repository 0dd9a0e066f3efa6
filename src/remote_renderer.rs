use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

use crate::config::RemoteConfig;
use crate::element_finder::TextLocator;
use crate::price::PriceExtractor;
use crate::scraper::PageRenderer;
use crate::utils::error::{AppError, RenderError, Result};

/// Renders pages through the ScrapingAnt API, which runs the browser (and
/// rotates proxies) on its side and hands back the final HTML.
pub struct RemoteRenderer {
    client: Client,
    config: RemoteConfig,
    api_key: String,
    locator: Arc<dyn TextLocator>,
    extractor: PriceExtractor,
}

/// Why one API call did not produce usable text.
enum AttemptError {
    Render(RenderError),
    /// The label was there but held no price; kept in case every attempt ends this way.
    NoPrice(String),
}

impl RemoteRenderer {
    pub fn new(config: RemoteConfig, locator: Arc<dyn TextLocator>) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AppError::Validation(
                    "remote.api_key (or SCRAPINGANT_API_KEY) is required for the scraping-ant backend"
                        .into(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
            locator,
            extractor: PriceExtractor::new(),
        })
    }

    /// Extractor used to decide whether a located label is worth keeping.
    pub fn with_extractor(mut self, extractor: PriceExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    async fn attempt(&self, url: &str, attempt: u32) -> std::result::Result<String, AttemptError> {
        let text = self.fetch_label(url, attempt).await.map_err(AttemptError::Render)?;

        if self.extractor.extract(&text).is_found() {
            Ok(text)
        } else {
            tracing::warn!("Label on {} has no price yet (attempt #{}): {}", url, attempt, text);
            Err(AttemptError::NoPrice(text))
        }
    }

    async fn fetch_label(&self, url: &str, attempt: u32) -> std::result::Result<String, RenderError> {
        tracing::debug!("Attempt #{} for {}", attempt, url);

        let wait_for = self.config.wait_for_ms.to_string();
        let response = self
            .client
            .get(&self.config.api_url)
            .query(&[
                ("x-api-key", self.api_key.as_str()),
                ("url", url),
                ("browser", "true"),
                ("wait_for", wait_for.as_str()),
            ])
            .send()
            .await
            .map_err(|e| RenderError::NavigationFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!("Rendering API answered {} for {} (attempt #{})", status, url, attempt);
            return Err(RenderError::NavigationFailed {
                url: url.to_string(),
                message: format!("rendering API answered {}", status),
            });
        }

        let html = response.text().await.map_err(|e| {
            RenderError::UnexpectedFault(format!("failed to read rendered page: {}", e))
        })?;

        self.locator
            .locate_in_html(&html, &self.config.element_selector)
            .ok_or_else(|| {
                tracing::warn!(
                    "No element with {} on {} (attempt #{})",
                    self.locator.describe(),
                    url,
                    attempt
                );
                // The API's `wait_for` is the window the element had to appear in.
                RenderError::ElementTimeout {
                    locator: self.locator.describe(),
                    timeout_secs: self.config.wait_for_ms.div_ceil(1000),
                }
            })
    }
}

#[async_trait]
impl PageRenderer for RemoteRenderer {
    fn name(&self) -> &'static str {
        "scraping-ant"
    }

    async fn render(&self, url: &str) -> std::result::Result<String, RenderError> {
        let retries = self.config.retry_attempts.saturating_sub(1) as usize;
        let strategy = FixedInterval::from_millis(self.config.retry_delay_ms).take(retries);

        let mut attempt = 0;
        let result = Retry::spawn(strategy, || {
            attempt += 1;
            self.attempt(url, attempt)
        })
        .await;

        match result {
            Ok(text) => Ok(text),
            // Hand the label over anyway; the caller records the miss.
            Err(AttemptError::NoPrice(text)) => Ok(text),
            Err(AttemptError::Render(e)) => {
                tracing::warn!(
                    "Giving up on {} after {} attempts",
                    url,
                    self.config.retry_attempts
                );
                Err(e)
            }
        }
    }
}
