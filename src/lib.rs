pub mod auth;
pub mod config;
pub mod element_finder;
pub mod price;
pub mod refresher;
pub mod remote_renderer;
pub mod scheduler;
pub mod scraper;
pub mod sheets;
pub mod startup;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use element_finder::{TextContains, TextLocator};
pub use price::{DigitStrategy, PriceExtractor, UnitPrice};
pub use refresher::{PriceRefresher, RefreshSummary, ScrapeRecord};
pub use scraper::PageRenderer;
pub use sheets::{SheetStore, SheetTable};
pub use utils::error::{AppError, RenderError};

pub type Result<T> = std::result::Result<T, AppError>;
