use async_trait::async_trait;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::BrowserConfig;
use crate::element_finder::TextLocator;
use crate::utils::error::RenderError;

/// Produces the visible text of the price element for one product page.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn render(&self, url: &str) -> Result<String, RenderError>;
}

/// Starts one browser instance per render call.
pub trait BrowserDriver: Send + Sync + 'static {
    type Session: BrowserSession;

    fn launch(&self, config: &BrowserConfig) -> Result<Self::Session, RenderError>;
}

/// A live browser owned by a single render call.
pub trait BrowserSession {
    fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// Blocks until a node matching `xpath` is visible and returns its text.
    fn wait_for_text(&mut self, xpath: &str, timeout: Duration) -> Result<String, RenderError>;

    /// Tears the browser down. Called exactly once per session.
    fn close(&mut self);
}

/// Closes the wrapped session when dropped, on every exit path.
struct SessionGuard<S: BrowserSession> {
    session: Option<S>,
}

impl<S: BrowserSession> SessionGuard<S> {
    fn new(session: S) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn session(&mut self) -> Result<&mut S, RenderError> {
        self.session
            .as_mut()
            .ok_or_else(|| RenderError::UnexpectedFault("browser session already closed".into()))
    }
}

impl<S: BrowserSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }
}

pub struct BrowserRenderer<D: BrowserDriver> {
    driver: Arc<D>,
    config: BrowserConfig,
    locator: Arc<dyn TextLocator>,
}

impl<D: BrowserDriver> BrowserRenderer<D> {
    pub fn new(driver: D, config: BrowserConfig, locator: Arc<dyn TextLocator>) -> Self {
        Self {
            driver: Arc::new(driver),
            config,
            locator,
        }
    }

    fn render_blocking(
        driver: &D,
        config: &BrowserConfig,
        locator: &dyn TextLocator,
        url: &str,
    ) -> Result<String, RenderError> {
        let mut guard = SessionGuard::new(driver.launch(config)?);

        guard.session()?.navigate(url)?;
        let text = guard
            .session()?
            .wait_for_text(&locator.xpath(), config.element_timeout())?;

        Ok(text)
    }
}

#[async_trait]
impl<D: BrowserDriver> PageRenderer for BrowserRenderer<D> {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn render(&self, url: &str) -> Result<String, RenderError> {
        let driver = Arc::clone(&self.driver);
        let config = self.config.clone();
        let locator = Arc::clone(&self.locator);
        let url = url.to_string();

        // The driver blocks for up to the element timeout.
        tokio::task::spawn_blocking(move || {
            Self::render_blocking(driver.as_ref(), &config, locator.as_ref(), &url)
        })
        .await
        .map_err(|e| RenderError::UnexpectedFault(format!("render task aborted: {}", e)))?
    }
}

const VISIBILITY_POLL: Duration = Duration::from_millis(250);

/// Runs on the matched node; `checkVisibility` is missing in older Chromes.
const IS_VISIBLE_JS: &str = "function() { \
    return this.checkVisibility ? this.checkVisibility() : this.offsetParent !== null; }";

/// Calls `check` until it yields a value, sleeping `interval` between tries.
/// Gives up once `timeout` has passed; `check` always runs at least once.
fn poll_until<T>(
    timeout: Duration,
    interval: Duration,
    mut check: impl FnMut() -> Option<T>,
) -> Option<T> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check() {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        std::thread::sleep(interval.min(deadline - now));
    }
}

fn is_visible(element: &Element<'_>) -> bool {
    element
        .call_js_fn(IS_VISIBLE_JS, vec![], false)
        .ok()
        .and_then(|object| object.value)
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

/// Local Chrome/Chromium through the DevTools protocol.
#[derive(Debug, Default, Clone)]
pub struct ChromeDriver;

pub struct ChromeSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserDriver for ChromeDriver {
    type Session = ChromeSession;

    fn launch(&self, config: &BrowserConfig) -> Result<ChromeSession, RenderError> {
        let mut args = vec![
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-extensions"),
            OsStr::new("--disable-background-timer-throttling"),
            OsStr::new("--disable-renderer-backgrounding"),
        ];
        if !config.sandbox {
            args.push(OsStr::new("--no-sandbox"));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(config.sandbox)
            .path(config.chrome_path.as_ref().map(PathBuf::from))
            .args(args)
            .build()
            .map_err(|e| RenderError::UnexpectedFault(format!("invalid launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| RenderError::UnexpectedFault(format!("failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| RenderError::UnexpectedFault(format!("failed to create tab: {}", e)))?;

        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| RenderError::UnexpectedFault(format!("failed to set user agent: {}", e)))?;

        Ok(ChromeSession {
            _browser: browser,
            tab,
        })
    }
}

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let navigation_failed = |e: anyhow::Error| RenderError::NavigationFailed {
            url: url.to_string(),
            message: e.to_string(),
        };

        self.tab.navigate_to(url).map_err(navigation_failed)?;
        self.tab.wait_until_navigated().map_err(navigation_failed)?;
        Ok(())
    }

    // Hidden matches (templates, unselected variants) are passed over until
    // one of them is rendered.
    fn wait_for_text(&mut self, xpath: &str, timeout: Duration) -> Result<String, RenderError> {
        let tab = &self.tab;
        let text = poll_until(timeout, VISIBILITY_POLL, || {
            let elements = tab.find_elements_by_xpath(xpath).ok()?;
            elements
                .iter()
                .find(|element| is_visible(element))
                .and_then(|element| element.get_inner_text().ok())
        });

        text.ok_or_else(|| {
            tracing::debug!("No visible node for {} within {:?}", xpath, timeout);
            RenderError::ElementTimeout {
                locator: xpath.to_string(),
                timeout_secs: timeout.as_secs(),
            }
        })
    }

    fn close(&mut self) {
        if let Err(e) = self.tab.close(false) {
            tracing::debug!("Tab close reported: {}", e);
        }
        // The browser process is killed when `_browser` drops with the session.
    }
}
