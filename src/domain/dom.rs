//! Immutable node tree built from `scraper`'s parse output
//!
//! `scraper::Html` can move between threads but cannot be shared by them, so
//! every parsed document is copied once into a flat arena. The arena is never
//! mutated afterwards, which lets search workers walk it concurrently behind an
//! `Arc` without any locking. The parsed `Html` stays next to it, behind a
//! mutex, and serializes nodes back to markup.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use scraper::{ElementRef, Html};

/// Index of a node inside its [`Document`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: Self = Self(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Kind of a parsed node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Doctype,
    Element,
    Text,
    Comment,
}

/// A single `key="value"` pair on an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// Raw node storage; links are arena indices
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    /// Tag name for elements, literal text for text nodes, body for comments
    pub data: String,
    pub attributes: Vec<Attribute>,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind, data: String) -> Self {
        Self {
            kind,
            data,
            attributes: Vec::new(),
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
        }
    }

    /// First attribute named `key` (duplicates resolve first-match-wins)
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.key == key)
            .map(|attribute| attribute.value.as_str())
    }

    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }
}

/// Parsed document stored as an arena; node 0 is always the root
pub struct Document {
    nodes: Vec<NodeData>,
    /// Arena index `i` is the `i`-th node of `source.tree.nodes()`
    source: Mutex<Html>,
}

impl Document {
    /// Parse a full HTML document. html5ever never rejects input, so malformed
    /// markup yields a best-effort tree instead of an error.
    pub fn parse(html: &str) -> Self {
        Self::from_html(Html::parse_document(html))
    }

    /// Parse an HTML fragment; the root holds an implicit `<html>` wrapper
    /// around the fragment's top-level nodes.
    pub fn parse_fragment(html: &str) -> Self {
        Self::from_html(Html::parse_fragment(html))
    }

    /// Document holding only an empty root node
    pub fn placeholder() -> Self {
        Self {
            nodes: vec![NodeData::new(NodeKind::Document, String::new())],
            source: Mutex::new(Html::new_document()),
        }
    }

    fn from_html(html: Html) -> Self {
        let ids: HashMap<_, NodeId> = html
            .tree
            .nodes()
            .enumerate()
            .map(|(index, node)| (node.id(), NodeId(index)))
            .collect();

        let nodes = html
            .tree
            .nodes()
            .map(|node| {
                let mut data = match node.value() {
                    scraper::Node::Document | scraper::Node::Fragment => {
                        NodeData::new(NodeKind::Document, String::new())
                    }
                    scraper::Node::Doctype(doctype) => {
                        NodeData::new(NodeKind::Doctype, doctype.name().to_owned())
                    }
                    scraper::Node::Comment(comment) => {
                        NodeData::new(NodeKind::Comment, (**comment).to_owned())
                    }
                    scraper::Node::Text(text) => NodeData::new(NodeKind::Text, (**text).to_owned()),
                    scraper::Node::Element(element) => {
                        let mut data = NodeData::new(NodeKind::Element, element.name().to_owned());
                        // Foreign attributes keep their prefix: `xlink:href`, not `href`
                        data.attributes = element
                            .attrs
                            .iter()
                            .map(|(name, value)| Attribute {
                                key: match &name.prefix {
                                    Some(prefix) => format!("{prefix}:{}", name.local),
                                    None => name.local.to_string(),
                                },
                                value: (**value).to_owned(),
                            })
                            .collect();
                        data
                    }
                    // Processing instructions only appear in XML-ish input
                    _ => NodeData::new(NodeKind::Comment, String::new()),
                };
                data.parent = node.parent().and_then(|parent| ids.get(&parent.id()).copied());
                data.first_child = node.first_child().and_then(|child| ids.get(&child.id()).copied());
                data.last_child = node.last_child().and_then(|child| ids.get(&child.id()).copied());
                data.next_sibling = node
                    .next_sibling()
                    .and_then(|sibling| ids.get(&sibling.id()).copied());
                data
            })
            .collect();

        Self {
            nodes,
            source: Mutex::new(html),
        }
    }

    pub fn get(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.get(NodeId::ROOT).first_child.is_none()
    }

    /// Handle to the root node
    pub fn root(self: &Arc<Self>) -> Node {
        Node::new(Arc::clone(self), NodeId::ROOT)
    }

    /// Serialize node `id` and its subtree with html5ever's serializer
    pub fn render(&self, id: NodeId) -> Result<String, fmt::Error> {
        let source = self.source.lock().map_err(|_| fmt::Error)?;
        if id == NodeId::ROOT {
            return Ok(source.html());
        }

        let node = source.tree.nodes().nth(id.0).ok_or(fmt::Error)?;
        if let Some(element) = ElementRef::wrap(node) {
            return Ok(element.html());
        }

        // Text, comments and doctypes only serialize as children, so give them a scratch parent
        let mut scratch = Html::new_fragment();
        scratch.tree.root_mut().append(node.value().clone());
        Ok(scratch.html())
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("empty", &self.is_empty())
            .finish_non_exhaustive()
    }
}

/// Cheap, thread-safe handle to one node of a shared [`Document`]
///
/// Cloning a handle copies the node reference only; children and siblings stay
/// shared with the source document.
#[derive(Clone)]
pub struct Node {
    document: Arc<Document>,
    id: NodeId,
}

impl Node {
    pub fn new(document: Arc<Document>, id: NodeId) -> Self {
        Self { document, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn data(&self) -> &NodeData {
        self.document.get(self.id)
    }

    pub fn kind(&self) -> NodeKind {
        self.data().kind
    }

    /// Tag name for elements, content for text and comments
    pub fn value(&self) -> &str {
        &self.data().data
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.data().attributes
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.data().attr(key)
    }

    pub fn is_element(&self) -> bool {
        self.data().is_element()
    }

    pub fn is_text(&self) -> bool {
        self.data().is_text()
    }

    pub fn parent(&self) -> Option<Self> {
        self.data().parent.map(|id| self.at(id))
    }

    pub fn first_child(&self) -> Option<Self> {
        self.data().first_child.map(|id| self.at(id))
    }

    pub fn next_sibling(&self) -> Option<Self> {
        self.data().next_sibling.map(|id| self.at(id))
    }

    /// Direct children in document order
    pub fn children(&self) -> Children {
        Children {
            document: Arc::clone(&self.document),
            next: self.data().first_child,
        }
    }

    /// Serialize this node and its subtree back to markup
    pub fn render(&self) -> Result<String, fmt::Error> {
        self.document.render(self.id)
    }

    fn at(&self, id: NodeId) -> Self {
        Self::new(Arc::clone(&self.document), id)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("value", &self.value())
            .finish()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.document, &other.document) && self.id == other.id
    }
}

impl Eq for Node {}

/// Iterator over a node's direct children
pub struct Children {
    document: Arc<Document>,
    next: Option<NodeId>,
}

impl Iterator for Children {
    type Item = Node;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.document.get(id).next_sibling;
        Some(Node::new(Arc::clone(&self.document), id))
    }
}
