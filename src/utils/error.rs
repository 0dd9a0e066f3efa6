use thiserror::Error;

/// Why a page could not be turned into price text.
///
/// Every kind is absorbed at the per-URL boundary and recorded as `ERROR`;
/// the distinction only matters for the logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Navigation failed for {url}: {message}")]
    NavigationFailed { url: String, message: String },

    #[error("Timed out after {timeout_secs}s waiting for element matching {locator}")]
    ElementTimeout { locator: String, timeout_secs: u64 },

    #[error("Unexpected fault: {0}")]
    UnexpectedFault(String),
}

impl RenderError {
    /// Short label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::NavigationFailed { .. } => "navigation_failed",
            RenderError::ElementTimeout { .. } => "element_timeout",
            RenderError::UnexpectedFault(_) => "unexpected_fault",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Sheet API error ({status}): {message}")]
    SheetApi { status: u16, message: String },

    #[error("Missing column: {column}")]
    MissingColumn { column: String },

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Auth(format!("failed to sign assertion: {}", err))
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for AppError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        AppError::Scheduler(format!("{:?}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
