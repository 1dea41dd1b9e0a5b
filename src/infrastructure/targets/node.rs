use std::sync::Arc;

use crate::domain::dom::{Document, Node, NodeKind};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};
use crate::infrastructure::targets::{Target, TargetKind};

/// A node of an already parsed tree
///
/// Holds its own handle to the node; the subtree stays shared with the
/// document the node came from.
#[derive(Debug, Clone)]
pub struct NodeTarget {
    node: Node,
}

impl NodeTarget {
    pub fn from_node(node: &Node) -> Self {
        Self { node: node.clone() }
    }

    /// Render the node and parse it again into a document of its own.
    ///
    /// The markup has to parse back into exactly one root element; elements
    /// that only exist inside a specific parent (such as a lone `<tr>`) do not.
    pub fn reparse(&self) -> ScrapeResult<Self> {
        let markup = self.render()?;
        let document = Arc::new(Document::parse_fragment(&markup));

        let roots: Vec<Node> = document
            .root()
            .children()
            .filter(|node| node.is_element() && node.value() == "html")
            .flat_map(|wrapper| wrapper.children())
            .filter(Node::is_element)
            .collect();

        match roots.as_slice() {
            [root] => Ok(Self::from_node(root)),
            _ => Err(ScrapeError::AmbiguousTarget {
                target: self.name(),
                roots: roots.len(),
            }),
        }
    }
}

impl Target for NodeTarget {
    fn name(&self) -> String {
        match self.node.kind() {
            NodeKind::Element => format!("node <{}>", self.node.value()),
            NodeKind::Text => "node #text".to_string(),
            NodeKind::Comment => "node #comment".to_string(),
            NodeKind::Doctype => "node #doctype".to_string(),
            NodeKind::Document => "node #document".to_string(),
        }
    }

    fn kind(&self) -> TargetKind {
        TargetKind::Node
    }

    fn is_valid(&self) -> bool {
        self.node.kind() != NodeKind::Document || self.node.first_child().is_some()
    }

    fn content(&self) -> Node {
        self.node.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(document: &Arc<Document>, tag: &str) -> Node {
        let mut stack = vec![document.root()];
        while let Some(node) = stack.pop() {
            if node.is_element() && node.value() == tag {
                return node;
            }
            stack.extend(node.children());
        }
        panic!("no <{tag}> in document");
    }

    #[test]
    fn test_node_target_shares_document() {
        let document = Arc::new(Document::parse("<ul><li id=\"x\">a</li></ul>"));
        let li = first_element(&document, "li");
        let target = NodeTarget::from_node(&li);

        assert_eq!(target.name(), "node <li>");
        assert!(target.is_valid());
        assert_eq!(target.content(), li);
        assert!(Arc::ptr_eq(target.content().document(), &document));
        assert_eq!(target.render().unwrap(), "<li id=\"x\">a</li>");
    }

    #[test]
    fn test_reparse_detaches_single_root() {
        let document = Arc::new(Document::parse("<div><p class=\"c\">one <b>two</b></p></div>"));
        let p = first_element(&document, "p");

        let detached = NodeTarget::from_node(&p).reparse().unwrap();
        let root = detached.content();
        assert_eq!(root.value(), "p");
        assert_eq!(root.attr("class"), Some("c"));
        assert!(!Arc::ptr_eq(root.document(), &document));
        assert_eq!(detached.render().unwrap(), p.render().unwrap());
    }

    #[test]
    fn test_reparse_rejects_context_bound_element() {
        let document = Arc::new(Document::parse("<table><tbody><tr><td>1</td></tr></tbody></table>"));
        let tr = first_element(&document, "tr");

        let err = NodeTarget::from_node(&tr).reparse().unwrap_err();
        assert!(matches!(err, ScrapeError::AmbiguousTarget { roots, .. } if roots != 1));
    }

    #[test]
    fn test_reparse_rejects_text_node() {
        let document = Arc::new(Document::parse("<p>only text</p>"));
        let text = first_element(&document, "p").first_child().unwrap();

        let err = NodeTarget::from_node(&text).reparse().unwrap_err();
        assert!(matches!(err, ScrapeError::AmbiguousTarget { roots: 0, .. }));
    }
}
