use config::{Config, Environment, File, Map};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use validator::Validate;

use crate::element_finder::DEFAULT_LOCATOR_TEXT;
use crate::price::DigitStrategy;
use crate::utils::error::{AppError, Result};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    #[validate(nested)]
    pub browser: BrowserConfig,
    #[validate(nested)]
    pub remote: RemoteConfig,
    #[validate(nested)]
    pub sheet: SheetConfig,
    #[validate(nested)]
    pub refresh: RefreshConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

/// Launch settings for the local headless browser.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub sandbox: bool,
    #[validate(length(min = 1))]
    pub user_agent: String,
    /// Upper bound on the wait for the price element to appear.
    #[validate(range(min = 1, max = 600))]
    pub element_timeout_secs: u64,
    pub chrome_path: Option<String>,
    #[validate(length(min = 1))]
    pub locator_text: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            element_timeout_secs: 20,
            chrome_path: None,
            locator_text: DEFAULT_LOCATOR_TEXT.to_string(),
        }
    }
}

impl BrowserConfig {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }
}

/// ScrapingAnt rendering API.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RemoteConfig {
    #[validate(url)]
    pub api_url: String,
    pub api_key: Option<String>,
    pub wait_for_ms: u64,
    #[validate(range(min = 1, max = 10))]
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,
    #[validate(length(min = 1))]
    pub element_selector: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.scrapingant.com/v2/general".to_string(),
            api_key: None,
            wait_for_ms: 5000,
            retry_attempts: 3,
            retry_delay_ms: 5000,
            request_timeout_secs: 60,
            element_selector: "span".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SheetConfig {
    #[validate(url)]
    pub api_base: String,
    pub spreadsheet_id: String,
    #[validate(length(min = 1))]
    pub worksheet: String,
    #[validate(length(min = 1))]
    pub url_column: String,
    #[validate(length(min = 1))]
    pub price_column: String,
    #[validate(length(min = 1))]
    pub updated_column: String,
    pub credentials_path: String,
    /// Pre-issued OAuth token; skips the service-account exchange when set.
    pub access_token: Option<String>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            api_base: "https://sheets.googleapis.com/v4".to_string(),
            spreadsheet_id: String::new(),
            worksheet: "Jumbo-info".to_string(),
            url_column: "URL".to_string(),
            price_column: "Precio x KG".to_string(),
            updated_column: "Ultima Actualizacion".to_string(),
            credentials_path: "credentials.json".to_string(),
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RendererBackend {
    #[default]
    Chrome,
    ScrapingAnt,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RefreshConfig {
    /// Pause between two URLs, as courtesy to the retailer.
    #[validate(range(max = 600_000))]
    pub delay_ms: u64,
    pub backend: RendererBackend,
    pub digit_strategy: DigitStrategy,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            delay_ms: 2000,
            backend: RendererBackend::default(),
            digit_strategy: DigitStrategy::default(),
        }
    }
}

impl RefreshConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Six-field cron expression, seconds first.
    pub cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 9 * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: Option<String>,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            filter: "kgprice_watcher=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `config/default`, `config/{RUN_MODE}` and `config/local` (or the
    /// explicit file when given), then `KGPRICE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, env::vars().collect())
    }

    /// [`AppConfig::load`] against an explicit set of environment variables.
    pub fn load_with_env(path: Option<&Path>, vars: Map<String, String>) -> Result<Self> {
        let mut builder = Config::builder();

        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => {
                let run_mode = vars
                    .get("RUN_MODE")
                    .cloned()
                    .unwrap_or_else(|| "development".into());
                builder
                    .add_source(File::with_name("config/default").required(false))
                    .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
                    .add_source(File::with_name("config/local").required(false))
            }
        };

        let settings = builder
            .add_source(
                Environment::with_prefix("KGPRICE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars.clone())),
            )
            .build()?;

        let mut config: AppConfig = settings.try_deserialize()?;

        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = vars.get("CHROME_PATH").cloned();
        }
        if config.remote.api_key.is_none() {
            config.remote.api_key = vars.get("SCRAPINGANT_API_KEY").cloned();
        }

        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<()> {
        self.validate()?;

        if !Self::is_valid_cron(&self.scheduler.cron) {
            return Err(AppError::Validation(format!(
                "Invalid cron expression in scheduler.cron: {}",
                self.scheduler.cron
            )));
        }

        let columns = [
            &self.sheet.url_column,
            &self.sheet.price_column,
            &self.sheet.updated_column,
        ];
        if columns[0] == columns[1] || columns[0] == columns[2] || columns[1] == columns[2] {
            return Err(AppError::Validation(
                "Sheet url, price and updated columns must be distinct".into(),
            ));
        }

        Ok(())
    }

    pub(crate) fn is_valid_cron(cron_expr: &str) -> bool {
        // sec min hour day-of-month month day-of-week [year]
        let parts: Vec<&str> = cron_expr.split_whitespace().collect();
        if parts.len() != 6 && parts.len() != 7 {
            return false;
        }

        parts.iter().all(|part| {
            part.chars().all(|c| {
                c.is_ascii_alphanumeric() || matches!(c, '*' | '-' | ',' | '/' | '?')
            })
        })
    }
}
