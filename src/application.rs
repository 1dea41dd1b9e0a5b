//! Application layer module
//!
//! The scraper facade that ties content sources to tree search.

pub mod scraper;

pub use self::scraper::{Matches, Scraper};
