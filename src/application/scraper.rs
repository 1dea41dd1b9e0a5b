//! Scraper facade
//!
//! A [`Scraper`] pairs a content source with its parsed tree and answers
//! queries against it. Construction is the only place where a source can turn
//! out to be unusable: recoverable failures are replaced by the empty target
//! (and logged), so every scraper handed out is either backed by real content
//! or is explicitly empty.

use std::io::Read;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::dom::{Node, NodeKind};
use crate::domain::filter::{Attributes, Filter};
use crate::infrastructure::config::SearchConfig;
use crate::infrastructure::http_client::{HttpClient, HttpClientConfig};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};
use crate::infrastructure::search_engine::{NodeStream, SearchEngine};
use crate::infrastructure::targets::{
    BufferTarget, EmptyTarget, NodeTarget, ResponseTarget, Target, TargetKind,
};

#[derive(Debug, Clone)]
pub struct Scraper {
    target: Arc<dyn Target>,
    search: SearchConfig,
}

impl Scraper {
    /// Wrap an already constructed target.
    ///
    /// Targets that fail validation with a recoverable error are replaced by
    /// the empty target; other errors are returned.
    pub fn from_target(target: Arc<dyn Target>) -> ScrapeResult<Self> {
        match target.validate() {
            Ok(()) => Ok(Self::with_target(target)),
            Err(e) if e.is_recoverable() => {
                warn!(target = %target.name(), error = %e, "Substituting empty target");
                Ok(Self::empty())
            }
            Err(e) => Err(e),
        }
    }

    /// Scraper over nothing; never valid, never renders
    pub fn empty() -> Self {
        Self::with_target(Arc::new(EmptyTarget))
    }

    pub fn from_reader<R: Read>(reader: R) -> ScrapeResult<Self> {
        Self::from_target(Arc::new(BufferTarget::from_reader(reader)?))
    }

    /// Like [`Scraper::from_reader`], but any failure yields the empty scraper
    pub fn from_reader_or_empty<R: Read>(reader: R) -> Self {
        Self::from_reader(reader).unwrap_or_else(|e| {
            warn!(error = %e, "Failed loading buffer, substituting empty target");
            Self::empty()
        })
    }

    pub async fn from_async_reader<R: AsyncRead + Unpin>(reader: R) -> ScrapeResult<Self> {
        Self::from_target(Arc::new(BufferTarget::from_async_reader(reader).await?))
    }

    pub fn from_html(html: &str) -> ScrapeResult<Self> {
        Self::from_target(Arc::new(BufferTarget::from_html(html)?))
    }

    /// Scraper over an existing node; the node handle is copied, its subtree shared
    pub fn from_node(node: &Node) -> Self {
        let target = NodeTarget::from_node(node);
        if target.is_valid() {
            Self::with_target(Arc::new(target))
        } else {
            warn!(target = %target.name(), "Node has no content, substituting empty target");
            Self::empty()
        }
    }

    /// Read and parse a response body. Status codes are not checked here.
    pub async fn from_response(response: reqwest::Response) -> ScrapeResult<Self> {
        let target = ResponseTarget::new(response);
        target.load().await?;
        Self::from_target(Arc::new(target))
    }

    /// Fetch `uri` with a default client
    pub async fn from_uri(uri: &str) -> ScrapeResult<Self> {
        let client = HttpClient::new(HttpClientConfig::default())?;
        Self::from_uri_with(&client, uri).await
    }

    pub async fn from_uri_with(client: &HttpClient, uri: &str) -> ScrapeResult<Self> {
        let response = client.get(uri).await?;
        Self::from_response(response).await
    }

    /// Like [`Scraper::from_uri_with`], but yields `Ok(None)` as soon as
    /// `cancellation_token` fires, whether the request or the body read is in flight.
    pub async fn from_uri_with_cancellation(
        client: &HttpClient,
        uri: &str,
        cancellation_token: CancellationToken,
    ) -> ScrapeResult<Option<Self>> {
        let Some(response) = client
            .get_with_cancellation(uri, cancellation_token.clone())
            .await?
        else {
            return Ok(None);
        };

        tokio::select! {
            biased;
            () = cancellation_token.cancelled() => {
                tracing::debug!("Body read cancelled for URI: {}", uri);
                Ok(None)
            }
            scraper = Self::from_response(response) => scraper.map(Some),
        }
    }

    /// Open `location` as a target of the given kind: a file path for
    /// [`TargetKind::Buffer`], a URI for [`TargetKind::Response`].
    pub async fn open(kind: TargetKind, location: &str) -> ScrapeResult<Self> {
        match kind {
            TargetKind::Buffer => {
                let file = tokio::fs::File::open(location)
                    .await
                    .map_err(|source| ScrapeError::Io {
                        target: location.to_string(),
                        source,
                    })?;
                let target = BufferTarget::from_async_reader_named(file, location).await?;
                Self::from_target(Arc::new(target))
            }
            TargetKind::Response => Self::from_uri(location).await,
            TargetKind::Node | TargetKind::Empty => Err(ScrapeError::unknown_target_type(format!(
                "{kind} cannot be opened from a location"
            ))),
        }
    }

    fn with_target(target: Arc<dyn Target>) -> Self {
        Self {
            target,
            search: SearchConfig::default(),
        }
    }

    /// Search tuning for this scraper and every scraper produced from its matches
    pub fn with_search_config(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    /// True when this scraper wraps the empty target
    pub fn is_empty(&self) -> bool {
        self.target.kind() == TargetKind::Empty
    }

    pub fn name(&self) -> String {
        self.target.name()
    }

    pub fn render(&self) -> ScrapeResult<String> {
        self.target.render()
    }

    pub fn content(&self) -> Node {
        self.target.content()
    }

    /// Tag name for elements, text for text nodes
    pub fn node_type(&self) -> String {
        self.content().value().to_string()
    }

    /// Attribute map; on duplicate keys the first occurrence wins
    pub fn attributes(&self) -> Attributes {
        let node = self.content();
        let mut attributes = Attributes::new();
        for attribute in node.attributes() {
            attributes
                .entry(attribute.key.clone())
                .or_insert_with(|| attribute.value.clone());
        }
        attributes
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        self.content().attr(key).map(str::to_string)
    }

    /// Concatenated direct text children, or `None` if any direct child is
    /// not a text node
    pub fn text(&self) -> Option<String> {
        let mut text = String::new();
        for child in self.content().children() {
            if child.kind() != NodeKind::Text {
                return None;
            }
            text.push_str(child.value());
        }
        Some(text)
    }

    /// [`Scraper::text`] with an empty string instead of `None`
    pub fn text_optimistic(&self) -> String {
        self.text().unwrap_or_default()
    }

    /// Stream every node under this scraper's root accepted by `filter`
    ///
    /// # Panics
    ///
    /// The search runs on Tokio workers, so this panics outside a Tokio runtime.
    pub fn find_all(&self, filter: &Filter) -> Matches {
        let engine = SearchEngine::new(self.search.clone());
        Matches {
            nodes: engine.search(self.content(), filter.compile()),
            search: self.search.clone(),
        }
    }

    /// First match, if any; the rest of the search is cancelled
    ///
    /// # Panics
    ///
    /// Panics when polled outside a Tokio runtime, like [`Scraper::find_all`].
    pub async fn find(&self, filter: &Filter) -> Option<Scraper> {
        let mut matches = self.find_all(filter);
        matches.next().await
    }

    /// Copy this scraper's node into a document of its own
    pub fn detach(&self) -> ScrapeResult<Scraper> {
        let detached = NodeTarget::from_node(&self.content()).reparse()?;
        Ok(Self::with_target(Arc::new(detached)).with_search_config(self.search.clone()))
    }
}

/// Matches of one search, each wrapped in its own scraper
///
/// Dropping the stream cancels the search.
#[derive(Debug)]
pub struct Matches {
    nodes: NodeStream,
    search: SearchConfig,
}

impl Matches {
    pub fn cancel(&self) {
        self.nodes.cancel();
    }
}

impl Stream for Matches {
    type Item = Scraper;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let search = self.search.clone();
        Pin::new(&mut self.nodes)
            .poll_next(cx)
            .map(|node| node.map(|node| Scraper::from_node(&node).with_search_config(search)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::TraversalPolicy;

    const PAGE: &str = r#"<html><body>
        <div id="main"><p class="lead">Hello <b>world</b></p><p class="plain">Bye</p></div>
        <a href="/one" class="x" class="y">One</a>
    </body></html>"#;

    #[test]
    fn test_empty_scraper() {
        let scraper = Scraper::empty();
        assert!(scraper.is_empty());
        assert_eq!(scraper.name(), "empty target");
        assert!(matches!(scraper.render(), Err(ScrapeError::EmptyTarget)));
        assert_eq!(scraper.content().kind(), NodeKind::Document);
    }

    #[test]
    fn test_invalid_target_is_substituted() {
        #[derive(Debug)]
        struct Hollow;
        impl Target for Hollow {
            fn name(&self) -> String {
                "hollow".into()
            }
            fn kind(&self) -> TargetKind {
                TargetKind::Buffer
            }
            fn is_valid(&self) -> bool {
                false
            }
            fn content(&self) -> Node {
                EmptyTarget.content()
            }
        }

        let scraper = Scraper::from_target(Arc::new(Hollow)).unwrap();
        assert!(scraper.is_empty());
    }

    #[test]
    fn test_non_recoverable_validation_error_is_returned() {
        #[derive(Debug)]
        struct Broken;
        impl Target for Broken {
            fn name(&self) -> String {
                "broken".into()
            }
            fn kind(&self) -> TargetKind {
                TargetKind::Buffer
            }
            fn is_valid(&self) -> bool {
                false
            }
            fn validate(&self) -> ScrapeResult<()> {
                Err(ScrapeError::Configuration {
                    message: "broken".into(),
                })
            }
            fn content(&self) -> Node {
                EmptyTarget.content()
            }
        }

        assert!(matches!(
            Scraper::from_target(Arc::new(Broken)),
            Err(ScrapeError::Configuration { .. })
        ));
    }

    #[test]
    fn test_reader_or_empty_substitutes() {
        let scraper = Scraper::from_reader_or_empty(std::io::empty());
        assert!(scraper.is_empty());

        let scraper = Scraper::from_reader_or_empty("<p>x</p>".as_bytes());
        assert!(!scraper.is_empty());
    }

    #[test]
    #[should_panic(expected = "Tokio 1.x runtime")]
    fn test_find_all_outside_runtime_panics() {
        let scraper = Scraper::from_html(PAGE).unwrap();
        let _ = scraper.find_all(&Filter::new());
    }

    #[tokio::test]
    async fn test_text_accessors() {
        let scraper = Scraper::from_html(PAGE).unwrap();
        let lead = scraper
            .find(&Filter::with_tag("p").attribute("class", "lead"))
            .await
            .unwrap();
        assert_eq!(lead.text(), None);
        assert_eq!(lead.text_optimistic(), "");

        let plain = scraper
            .find(&Filter::new().exact_attribute("class", "plain"))
            .await
            .unwrap();
        assert_eq!(plain.text().as_deref(), Some("Bye"));
        assert_eq!(plain.node_type(), "p");
        assert_eq!(plain.name(), "node <p>");
    }

    #[tokio::test]
    async fn test_duplicate_attributes_first_wins() {
        let scraper = Scraper::from_html(PAGE).unwrap();
        let link = scraper.find(&Filter::with_tag("a")).await.unwrap();
        assert_eq!(link.attribute("href").as_deref(), Some("/one"));
        assert_eq!(link.attributes().get("href").map(String::as_str), Some("/one"));
        assert_eq!(link.attribute("class").as_deref(), link.attributes().get("class").map(String::as_str));
    }

    #[tokio::test]
    async fn test_matches_inherit_search_config() {
        let config = SearchConfig {
            max_workers: 2,
            result_buffer: 3,
            traversal: TraversalPolicy::ElementsAndText,
        };
        let scraper = Scraper::from_html(PAGE).unwrap().with_search_config(config.clone());
        let div = scraper.find(&Filter::with_tag("div")).await.unwrap();
        assert_eq!(div.search_config(), &config);

        let texts: Vec<String> = div
            .find_all(&Filter::new())
            .filter(|s| futures::future::ready(s.content().is_text()))
            .map(|s| s.node_type())
            .collect()
            .await;
        assert_eq!(texts.len(), 3);
    }

    #[tokio::test]
    async fn test_detach_copies_subtree() {
        let scraper = Scraper::from_html(PAGE).unwrap();
        let div = scraper.find(&Filter::with_tag("div")).await.unwrap();
        let detached = div.detach().unwrap();

        assert_eq!(detached.render().unwrap(), div.render().unwrap());
        assert!(!Arc::ptr_eq(
            detached.content().document(),
            div.content().document()
        ));
        assert_eq!(detached.find_all(&Filter::with_tag("p")).count().await, 2);
    }

    #[tokio::test]
    async fn test_open_rejects_node_kind() {
        let err = Scraper::open(TargetKind::Node, "x").await.unwrap_err();
        assert!(matches!(err, ScrapeError::UnknownTargetType { .. }));
    }

    #[tokio::test]
    async fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, PAGE).unwrap();
        let location = path.to_string_lossy().to_string();

        let scraper = Scraper::open(TargetKind::Buffer, &location).await.unwrap();
        assert_eq!(scraper.name(), location);
        assert_eq!(scraper.find_all(&Filter::with_tag("p")).count().await, 2);

        let missing = Scraper::open(TargetKind::Buffer, "/definitely/not/here.html").await;
        assert!(matches!(missing, Err(ScrapeError::Io { .. })));
    }
}
