// Shared fixtures for the integration tests.

pub mod refresh_tests;
pub mod sheets_sync_tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kgprice_watcher::config::BrowserConfig;
use kgprice_watcher::scraper::{BrowserDriver, BrowserRenderer, BrowserSession};
use kgprice_watcher::{PriceExtractor, PriceRefresher, RenderError, TextContains};

/// What the fake browser shows for a given URL.
#[derive(Debug, Clone)]
pub enum FakePage {
    Label(&'static str),
    Unreachable,
    NeverShowsPrice,
}

/// Browser lifecycle bookkeeping shared by every session of one driver.
#[derive(Debug, Default)]
pub struct BrowserLog {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub visited: Mutex<Vec<String>>,
}

impl BrowserLog {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }
}

pub struct FakeDriver {
    pages: Arc<HashMap<String, FakePage>>,
    log: Arc<BrowserLog>,
}

pub struct FakeSession {
    pages: Arc<HashMap<String, FakePage>>,
    log: Arc<BrowserLog>,
    current: Option<FakePage>,
}

impl BrowserDriver for FakeDriver {
    type Session = FakeSession;

    fn launch(&self, _config: &BrowserConfig) -> Result<FakeSession, RenderError> {
        self.log.launches.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            pages: Arc::clone(&self.pages),
            log: Arc::clone(&self.log),
            current: None,
        })
    }
}

impl BrowserSession for FakeSession {
    fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.log.visited.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(FakePage::Unreachable) | None => Err(RenderError::NavigationFailed {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_REFUSED".to_string(),
            }),
            Some(page) => {
                self.current = Some(page.clone());
                Ok(())
            }
        }
    }

    fn wait_for_text(&mut self, xpath: &str, timeout: Duration) -> Result<String, RenderError> {
        match &self.current {
            Some(FakePage::Label(text)) => Ok(text.to_string()),
            _ => Err(RenderError::ElementTimeout {
                locator: xpath.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    fn close(&mut self) {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// A refresher backed by a scripted browser, with no pause between URLs.
pub fn fake_refresher(pages: &[(&str, FakePage)]) -> (PriceRefresher, Arc<BrowserLog>) {
    let log = Arc::new(BrowserLog::default());
    let driver = FakeDriver {
        pages: Arc::new(
            pages
                .iter()
                .map(|(url, page)| (url.to_string(), page.clone()))
                .collect(),
        ),
        log: Arc::clone(&log),
    };

    let renderer = BrowserRenderer::new(
        driver,
        BrowserConfig::default(),
        Arc::new(TextContains::default()),
    );
    let refresher = PriceRefresher::new(Arc::new(renderer), PriceExtractor::new(), Duration::ZERO);
    (refresher, log)
}

pub fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}
