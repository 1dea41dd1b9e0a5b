//! Content sources
//!
//! A [`Target`] turns one source of markup into a parsed node tree. Every
//! target can say whether it holds usable content, name itself for error
//! messages and render its tree back to markup.

use std::fmt;
use std::str::FromStr;

use crate::domain::dom::Node;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

pub mod buffer;
pub mod empty;
pub mod node;
pub mod response;

pub use buffer::BufferTarget;
pub use empty::EmptyTarget;
pub use node::NodeTarget;
pub use response::ResponseTarget;

/// Recognized target kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Raw bytes (readers, strings, files)
    Buffer,
    /// Remote HTTP response
    Response,
    /// Node of an already parsed tree
    Node,
    /// Placeholder for missing content
    Empty,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buffer => "buffer",
            Self::Response => "response",
            Self::Node => "node",
            Self::Empty => "empty",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buffer" | "file" => Ok(Self::Buffer),
            "response" | "uri" => Ok(Self::Response),
            "node" => Ok(Self::Node),
            "empty" => Ok(Self::Empty),
            _ => Err(ScrapeError::unknown_target_type(s)),
        }
    }
}

/// A source of markup with a parsed tree
pub trait Target: Send + Sync + fmt::Debug {
    /// Identity used in logs and errors
    fn name(&self) -> String;

    fn kind(&self) -> TargetKind;

    /// Whether content was obtained and is non-empty
    fn is_valid(&self) -> bool;

    fn validate(&self) -> ScrapeResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ScrapeError::content_missing(self.name()))
        }
    }

    /// Root of the tree; never absent
    fn content(&self) -> Node;

    /// Serialize the tree back to markup
    fn render(&self) -> ScrapeResult<String> {
        self.content()
            .render()
            .map_err(|source| ScrapeError::Rendering {
                target: self.name(),
                source,
            })
    }
}
