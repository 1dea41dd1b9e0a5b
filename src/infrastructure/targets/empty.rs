use std::sync::Arc;

use lazy_static::lazy_static;

use crate::domain::dom::{Document, Node};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};
use crate::infrastructure::targets::{Target, TargetKind};

lazy_static! {
    static ref PLACEHOLDER: Arc<Document> = Arc::new(Document::placeholder());
}

/// Root of the shared placeholder document
pub(crate) fn placeholder_root() -> Node {
    PLACEHOLDER.root()
}

/// Stands in for a source that produced no usable content
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyTarget;

impl Target for EmptyTarget {
    fn name(&self) -> String {
        "empty target".to_string()
    }

    fn kind(&self) -> TargetKind {
        TargetKind::Empty
    }

    fn is_valid(&self) -> bool {
        false
    }

    fn content(&self) -> Node {
        placeholder_root()
    }

    fn render(&self) -> ScrapeResult<String> {
        Err(ScrapeError::EmptyTarget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dom::NodeKind;

    #[test]
    fn test_empty_target_contract() {
        let target = EmptyTarget;
        assert!(!target.is_valid());
        assert!(matches!(target.validate(), Err(ScrapeError::ContentMissing { .. })));
        assert!(matches!(target.render(), Err(ScrapeError::EmptyTarget)));
        assert_eq!(target.content().kind(), NodeKind::Document);
    }

    #[test]
    fn test_placeholder_is_stable() {
        assert_eq!(EmptyTarget.content(), EmptyTarget.content());
    }
}
