//! Declarative node filters
//!
//! A [`Filter`] collects match criteria and compiles them once into a
//! [`CompiledFilter`]: a flat list of [`Criterion`] values that all have to hold
//! (logical AND). An empty list matches every node.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;

use crate::domain::dom::NodeData;

/// Attribute key/value map used by filters and scraper accessors
pub type Attributes = BTreeMap<String, String>;

/// One compiled match rule with its bound value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    /// Node value equals the tag exactly
    Tag(String),
    /// Attribute `key` equals `value` exactly
    AttributeEquals { key: String, value: String },
    /// Attribute `key` contains `value` on whitespace token boundaries;
    /// `needle` is the value padded with one space on each side
    AttributeContains { key: String, needle: String },
    /// Attribute `key` exists, any value
    AttributePresent(String),
}

impl Criterion {
    pub fn matches(&self, node: &NodeData) -> bool {
        match self {
            Self::Tag(tag) => node.data == *tag,
            Self::AttributeEquals { key, value } => node.attr(key) == Some(value.as_str()),
            Self::AttributeContains { key, needle } => node
                .attr(key)
                .is_some_and(|value| format!(" {value} ").contains(needle.as_str())),
            Self::AttributePresent(key) => node.attr(key).is_some(),
        }
    }
}

/// Conjunction of criteria produced by [`Filter::compile`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledFilter {
    criteria: Vec<Criterion>,
}

impl CompiledFilter {
    pub fn new(criteria: Vec<Criterion>) -> Self {
        Self { criteria }
    }

    pub fn matches(&self, node: &NodeData) -> bool {
        self.criteria.iter().all(|criterion| criterion.matches(node))
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn is_pass_through(&self) -> bool {
        self.criteria.is_empty()
    }
}

/// Search input for [`crate::Scraper::find`] and [`crate::Scraper::find_all`]
///
/// ```
/// use markup_scraper::Filter;
///
/// let filter = Filter::with_tag("li").attribute("class", "toclevel-1");
/// assert_eq!(filter.compile().criteria().len(), 2);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Filter {
    tag: Option<String>,
    /// Token-boundary partial matches (`"cat"` matches `"black cat"`)
    attributes: Attributes,
    exact_attributes: Attributes,
    attribute_keys: Vec<String>,
    #[serde(skip)]
    compiled: OnceLock<Arc<CompiledFilter>>,
}

impl Filter {
    /// Pass-through filter
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self::new().tag(tag)
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self.invalidate()
    }

    /// Partial, token-boundary match on `key`
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self.invalidate()
    }

    pub fn exact_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.exact_attributes.insert(key.into(), value.into());
        self.invalidate()
    }

    pub fn has_attribute(mut self, key: impl Into<String>) -> Self {
        self.attribute_keys.push(key.into());
        self.invalidate()
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// Compile the criteria; subsequent calls return the same predicate
    pub fn compile(&self) -> Arc<CompiledFilter> {
        Arc::clone(self.compiled.get_or_init(|| Arc::new(self.build())))
    }

    fn build(&self) -> CompiledFilter {
        let mut criteria = Vec::new();

        if let Some(tag) = self.tag.as_ref().filter(|tag| !tag.is_empty()) {
            criteria.push(Criterion::Tag(tag.clone()));
        }
        criteria.extend(self.attributes.iter().map(|(key, value)| {
            Criterion::AttributeContains {
                key: key.clone(),
                needle: format!(" {value} "),
            }
        }));
        criteria.extend(self.exact_attributes.iter().map(|(key, value)| {
            Criterion::AttributeEquals {
                key: key.clone(),
                value: value.clone(),
            }
        }));
        criteria.extend(
            self.attribute_keys
                .iter()
                .map(|key| Criterion::AttributePresent(key.clone())),
        );

        CompiledFilter::new(criteria)
    }

    fn invalidate(mut self) -> Self {
        self.compiled = OnceLock::new();
        self
    }
}
