//! Filter pipeline.
//!
//! A filter is a pure function from one value to its replacement. Filters are
//! grouped in a [`FilterChain`] and applied left to right, each receiving the
//! previous one's output.
//!
//! ```rust,ignore
//! use csv_harvester::filters::{self, Filter, FilterChain};
//! use serde_json::json;
//!
//! let chain = FilterChain::from(vec![filters::strip(), Filter::new(|v| v)]);
//! assert_eq!(chain.apply(json!("  hi ")), json!("hi"));
//! ```

pub mod library;

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub use library::{FilterSpec, operations_description};

/// A single value transform.
#[derive(Clone)]
pub struct Filter(Arc<dyn Fn(Value) -> Value + Send + Sync>);

impl Filter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: Value) -> Value {
        (self.0)(value)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}

/// An ordered sequence of filters.
#[derive(Clone, Debug, Default)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Run every filter in order.
    pub fn apply(&self, value: Value) -> Value {
        self.filters.iter().fold(value, |acc, filter| filter.apply(acc))
    }

    /// Build a chain from declarative filter specs.
    pub fn from_specs(specs: &[FilterSpec]) -> crate::error::ConfigResult<Self> {
        specs
            .iter()
            .map(FilterSpec::to_filter)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::from)
    }
}

impl From<Filter> for FilterChain {
    fn from(filter: Filter) -> Self {
        Self {
            filters: vec![filter],
        }
    }
}

impl From<Vec<Filter>> for FilterChain {
    fn from(filters: Vec<Filter>) -> Self {
        Self { filters }
    }
}

impl FromIterator<Filter> for FilterChain {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}

/// Strip leading and trailing whitespace.
pub fn strip() -> Filter {
    Filter::new(|value| map_text(value, |s| s.trim().to_string()))
}

/// Strip the given characters from both ends.
pub fn strip_chars(chars: impl Into<String>) -> Filter {
    let chars: Vec<char> = chars.into().chars().collect();
    Filter::new(move |value| map_text(value, |s| s.trim_matches(chars.as_slice()).to_string()))
}

/// Apply `f` to string content, element-wise for lists. Other values pass
/// through untouched.
pub(crate) fn map_text<F>(value: Value, f: F) -> Value
where
    F: Fn(&str) -> String,
{
    fn walk<F: Fn(&str) -> String>(value: Value, f: &F) -> Value {
        match value {
            Value::String(s) => Value::String(f(&s)),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| walk(v, f)).collect()),
            other => other,
        }
    }
    walk(value, &f)
}
