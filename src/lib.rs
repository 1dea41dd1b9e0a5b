//! markup-scraper - structural queries over HTML from any source
//!
//! Markup from readers, strings, already parsed nodes or HTTP responses is
//! wrapped in a [`Scraper`], which streams the nodes matching a [`Filter`].
//!
//! ```no_run
//! use futures::StreamExt;
//! use markup_scraper::{Filter, Scraper};
//!
//! # async fn run() -> markup_scraper::ScrapeResult<()> {
//! let page = Scraper::from_uri("https://en.wikipedia.org/wiki/Rust").await?;
//! let mut entries = page.find_all(&Filter::with_tag("li").attribute("class", "toclevel-1"));
//! while let Some(entry) = entries.next().await {
//!     println!("{}", entry.render()?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{Matches, Scraper};
pub use domain::{Attributes, Document, Filter, Node, NodeKind};
pub use infrastructure::{
    HttpClient, HttpClientConfig, ScrapeError, ScrapeResult, ScraperConfig, SearchConfig,
    Target, TargetKind, TraversalPolicy,
};
