//! Infrastructure layer: content sources, tree search and the ambient services
//! (configuration, logging, HTTP) the scraper runs on.

pub mod config;
pub mod http_client;
pub mod logging;
pub mod scrape_error;
pub mod search_engine;
pub mod targets;

pub use self::config::{ConfigManager, LoggingConfig, ScraperConfig, SearchConfig, TraversalPolicy};
pub use self::http_client::{HttpClient, HttpClientConfig};
pub use self::logging::{init_logging, init_logging_with_config};
pub use self::scrape_error::{ScrapeError, ScrapeResult};
pub use self::search_engine::{NodeStream, SearchEngine};
pub use self::targets::{BufferTarget, EmptyTarget, NodeTarget, ResponseTarget, Target, TargetKind};
