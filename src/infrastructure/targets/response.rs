use std::sync::{Arc, OnceLock};

use reqwest::Response;
use tokio::sync::{Mutex, OnceCell};

use crate::domain::dom::{Document, Node};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};
use crate::infrastructure::targets::empty::placeholder_root;
use crate::infrastructure::targets::{Target, TargetKind};

/// Markup from a remote HTTP response
///
/// The body is drained on first use and cached; the response itself is
/// released as soon as the body has been read. A failed read is remembered,
/// so asking again reports the same failure.
///
/// [`ResponseTarget::load`] must succeed before the target is handed to
/// [`crate::Scraper::from_target`]; an unloaded target is rejected with
/// [`ScrapeError::NotLoaded`].
#[derive(Debug)]
pub struct ResponseTarget {
    url: String,
    status: u16,
    source: Mutex<BodySource>,
    body: OnceCell<String>,
    document: OnceLock<Arc<Document>>,
}

#[derive(Debug)]
enum BodySource {
    Unread(Response),
    Failed(ReadFailure),
    Released,
}

/// Outcome of a failed body read, replayed on every later attempt
#[derive(Debug, Clone)]
enum ReadFailure {
    Empty,
    Undecodable(String),
}

impl ReadFailure {
    fn to_error(&self, target: String) -> ScrapeError {
        match self {
            Self::Empty => ScrapeError::content_missing(target),
            Self::Undecodable(reason) => ScrapeError::marshalling(target, reason),
        }
    }
}

impl ResponseTarget {
    pub fn new(response: Response) -> Self {
        Self {
            url: response.url().to_string(),
            status: response.status().as_u16(),
            source: Mutex::new(BodySource::Unread(response)),
            body: OnceCell::new(),
            document: OnceLock::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response body as text; read once, then served from cache
    pub async fn body(&self) -> ScrapeResult<&str> {
        self.body
            .get_or_try_init(|| async {
                let mut source = self.source.lock().await;
                let response = match std::mem::replace(&mut *source, BodySource::Released) {
                    BodySource::Unread(response) => response,
                    BodySource::Failed(failure) => {
                        let error = failure.to_error(self.name());
                        *source = BodySource::Failed(failure);
                        return Err(error);
                    }
                    BodySource::Released => return Err(ScrapeError::content_missing(self.name())),
                };

                match read_body(response).await {
                    Ok(body) => {
                        tracing::debug!("Read {} body bytes from {}", body.len(), self.name());
                        Ok(body)
                    }
                    Err(failure) => {
                        let error = failure.to_error(self.name());
                        *source = BodySource::Failed(failure);
                        Err(error)
                    }
                }
            })
            .await
            .map(String::as_str)
    }

    /// Read the body and parse it; later calls are no-ops
    pub async fn load(&self) -> ScrapeResult<()> {
        if self.document.get().is_some() {
            return Ok(());
        }
        let body = self.body().await?;
        self.document
            .get_or_init(|| Arc::new(Document::parse(body)));
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.document.get().is_some()
    }
}

async fn read_body(response: Response) -> Result<String, ReadFailure> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ReadFailure::Undecodable(e.to_string()))?;
    if bytes.is_empty() {
        return Err(ReadFailure::Empty);
    }
    String::from_utf8(bytes.to_vec()).map_err(|e| ReadFailure::Undecodable(e.to_string()))
}

impl Target for ResponseTarget {
    fn name(&self) -> String {
        format!("{}[{}]", self.url, self.status)
    }

    fn kind(&self) -> TargetKind {
        TargetKind::Response
    }

    fn is_valid(&self) -> bool {
        self.document.get().is_some_and(|document| !document.is_empty())
    }

    fn validate(&self) -> ScrapeResult<()> {
        match self.document.get() {
            None => Err(ScrapeError::NotLoaded { target: self.name() }),
            Some(document) if document.is_empty() => Err(ScrapeError::content_missing(self.name())),
            Some(_) => Ok(()),
        }
    }

    /// Placeholder root until [`ResponseTarget::load`] succeeded
    fn content(&self) -> Node {
        match self.document.get() {
            Some(document) => document.root(),
            None => placeholder_root(),
        }
    }
}
