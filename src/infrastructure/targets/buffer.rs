use std::io::{self, Read};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::domain::dom::{Document, Node};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};
use crate::infrastructure::targets::{Target, TargetKind};

const DEFAULT_NAME: &str = "buffer";

/// Markup read from a byte stream or string
#[derive(Debug, Clone)]
pub struct BufferTarget {
    name: String,
    document: Arc<Document>,
}

impl BufferTarget {
    /// Read and parse the whole stream. The reader is consumed and released
    /// before this returns, whether loading succeeds or not.
    pub fn from_reader<R: Read>(reader: R) -> ScrapeResult<Self> {
        Self::from_reader_named(reader, DEFAULT_NAME)
    }

    pub fn from_reader_named<R: Read>(mut reader: R, name: impl Into<String>) -> ScrapeResult<Self> {
        let name = name.into();
        let mut bytes = Vec::new();

        let mut first = [0u8; 1];
        let read = loop {
            match reader.read(&mut first) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(ScrapeError::Io { target: name, source }),
            }
        };
        if read == 0 {
            return Err(ScrapeError::content_missing(name));
        }
        bytes.push(first[0]);

        if let Err(source) = reader.read_to_end(&mut bytes) {
            return Err(ScrapeError::Io { target: name, source });
        }
        drop(reader);

        Self::from_bytes(name, bytes)
    }

    pub async fn from_async_reader<R: AsyncRead + Unpin>(reader: R) -> ScrapeResult<Self> {
        Self::from_async_reader_named(reader, DEFAULT_NAME).await
    }

    pub async fn from_async_reader_named<R: AsyncRead + Unpin>(
        mut reader: R,
        name: impl Into<String>,
    ) -> ScrapeResult<Self> {
        let name = name.into();
        let mut bytes = Vec::new();

        let first = match reader.read_u8().await {
            Ok(byte) => byte,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(ScrapeError::content_missing(name));
            }
            Err(source) => return Err(ScrapeError::Io { target: name, source }),
        };
        bytes.push(first);

        if let Err(source) = reader.read_to_end(&mut bytes).await {
            return Err(ScrapeError::Io { target: name, source });
        }
        drop(reader);

        Self::from_bytes(name, bytes)
    }

    pub fn from_html(html: &str) -> ScrapeResult<Self> {
        if html.is_empty() {
            return Err(ScrapeError::content_missing(DEFAULT_NAME));
        }
        Ok(Self::parsed(DEFAULT_NAME.to_string(), html))
    }

    fn from_bytes(name: String, bytes: Vec<u8>) -> ScrapeResult<Self> {
        match String::from_utf8(bytes) {
            Ok(html) => Ok(Self::parsed(name, &html)),
            Err(e) => Err(ScrapeError::marshalling(name, e)),
        }
    }

    fn parsed(name: String, html: &str) -> Self {
        tracing::debug!("Parsing {} bytes from {}", html.len(), name);
        Self {
            name,
            document: Arc::new(Document::parse(html)),
        }
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }
}

impl Target for BufferTarget {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn kind(&self) -> TargetKind {
        TargetKind::Buffer
    }

    fn is_valid(&self) -> bool {
        !self.document.is_empty()
    }

    fn content(&self) -> Node {
        self.document.root()
    }
}
