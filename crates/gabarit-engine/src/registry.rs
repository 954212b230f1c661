//! Per-engine filter table
//!
//! Every engine owns its own registry, so filters registered on one engine
//! are never visible to another. Registration is additive: the last
//! registration for a name wins and nothing can be removed.

use gabarit_core::Value;
use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{EngineError, FilterError, Result};
use crate::filters;
use crate::suggestions;

/// Signature shared by built-in and custom filters
///
/// Filters receive the current value and the evaluated arguments, and must
/// return a new value without mutating their input.
pub type FilterFn = dyn Fn(&Value, &[Value]) -> std::result::Result<Value, FilterError> + Send + Sync;

/// Outcome of applying a filter by name
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    Applied(Value),
    Unknown,
    Failed(FilterError),
}

#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: IndexMap<String, Arc<FilterFn>>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FilterRegistry {
    /// An empty registry, without the built-ins
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry pre-seeded with the built-in filter library
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.insert("score", filters::score);
        registry.insert("metric", filters::metric);
        registry.insert("size", filters::size);
        registry.insert("list", filters::list);
        registry.insert("prioritize", filters::prioritize);
        registry.insert("json", filters::json);
        registry.insert("upper", filters::upper);
        registry.insert("lower", filters::lower);
        registry.insert("default", filters::default);
        registry.insert("length", filters::length);
        registry.insert("first", filters::first);
        registry.insert("last", filters::last);
        registry.insert("join", filters::join);
        registry.insert("truncate", filters::truncate);
        registry.insert("round", filters::round);
        registry.insert("trim", filters::trim);
        registry.insert("capitalize", filters::capitalize);
        registry.insert("replace", filters::replace);
        registry.insert("indent", filters::indent);
        registry.insert("keys", filters::keys);
        registry.insert("reverse", filters::reverse);

        registry
    }

    fn insert<F>(&mut self, name: &str, filter: F)
    where
        F: Fn(&Value, &[Value]) -> std::result::Result<Value, FilterError> + Send + Sync + 'static,
    {
        self.filters.insert(name.to_string(), Arc::new(filter));
    }

    /// Register a filter, replacing any previous filter with the same name
    ///
    /// Fails with `InvalidFilter` when the name could never be referenced from
    /// a template (it must look like `[A-Za-z_][A-Za-z0-9_]*`).
    pub fn register<F>(&mut self, name: &str, filter: F) -> Result<()>
    where
        F: Fn(&Value, &[Value]) -> std::result::Result<Value, FilterError> + Send + Sync + 'static,
    {
        validate_name(name, &self.names())?;
        self.insert(name, filter);
        Ok(())
    }

    /// Apply a filter by name
    ///
    /// The input value is never modified; on failure the caller keeps it.
    /// A filter that panics is reported as `Failed` like any other failure.
    pub fn apply(&self, name: &str, value: &Value, args: &[Value]) -> FilterOutcome {
        let Some(filter) = self.filters.get(name) else {
            return FilterOutcome::Unknown;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| filter(value, args))) {
            Ok(Ok(result)) => FilterOutcome::Applied(result),
            Ok(Err(err)) => FilterOutcome::Failed(err),
            Err(payload) => FilterOutcome::Failed(FilterError::failed(format!(
                "filter panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Registered filter names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.filters.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Check that a filter name is addressable by the `{{ value | name }}` syntax
pub(crate) fn validate_name(name: &str, registered: &[&str]) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        return Ok(());
    }

    let reason = if name.is_empty() {
        "filter names cannot be empty".to_string()
    } else {
        "filter names must start with a letter or `_` and contain only letters, digits and `_`"
            .to_string()
    };
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let suggestion = suggestions::suggest_unknown_filter(&sanitized, registered)
        .or_else(|| (!sanitized.is_empty()).then(|| format!("Try `{}`", sanitized)));

    Err(EngineError::InvalidFilter {
        name: name.to_string(),
        reason,
        suggestion,
    })
}
