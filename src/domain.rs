//! Domain module - node tree and match criteria
//!
//! - `dom`: immutable arena tree adapted from the HTML parser, serialized through it
//! - `filter`: declarative filters compiled into predicates

pub mod dom;
pub mod filter;

pub use dom::{Attribute, Document, Node, NodeData, NodeId, NodeKind};
pub use filter::{Attributes, CompiledFilter, Criterion, Filter};
