//! Small sanity run: open a target and print the nodes matching a tag
//!
//! Usage: scrape_sanity <buffer|file|uri> <location> [tag] [class]

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use markup_scraper::infrastructure::config::ConfigManager;
use markup_scraper::infrastructure::logging::init_logging_with_config;
use markup_scraper::{Filter, Scraper, TargetKind};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigManager::new()
        .and_then(|manager| manager.load_config())
        .unwrap_or_default();
    init_logging_with_config(config.logging.clone())?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (kind, location) = match args.as_slice() {
        [kind, location, ..] => (kind, location),
        _ => bail!("usage: scrape_sanity <buffer|file|uri> <location> [tag] [class]"),
    };

    let kind: TargetKind = kind.parse()?;
    let mut filter = Filter::new();
    if let Some(tag) = args.get(2) {
        filter = filter.tag(tag);
    }
    if let Some(class) = args.get(3) {
        filter = filter.attribute("class", class);
    }

    let scraper = Scraper::open(kind, location)
        .await
        .with_context(|| format!("Failed to open {location}"))?
        .with_search_config(config.search);
    if scraper.is_empty() {
        tracing::warn!("{} has no usable content", location);
        return Ok(());
    }

    let started = std::time::Instant::now();
    let mut matches = scraper.find_all(&filter);
    let mut count = 0usize;
    while let Some(found) = matches.next().await {
        count += 1;
        println!("{}", found.render()?);
    }

    tracing::info!(
        "{} matches in {} ({} ms)",
        count,
        scraper.name(),
        started.elapsed().as_millis()
    );
    Ok(())
}
