//! Variable scopes and dotted path resolution
//!
//! A render call starts with a root scope over the caller's context. Each loop
//! iteration pushes a child scope holding the item binding and the `loop`
//! metadata; lookups walk from the innermost frame outwards. Scopes only
//! borrow the context, so resolution can never mutate it.

use crate::value::{Map, Value};

/// A lookup scope: the render context, or a loop frame layered over a parent
#[derive(Debug)]
pub enum Scope<'a> {
    Root(&'a Value),
    Frame { vars: Map, parent: &'a Scope<'a> },
}

impl<'a> Scope<'a> {
    /// Root scope over a render context
    pub fn root(context: &'a Value) -> Self {
        Scope::Root(context)
    }

    /// Child scope with extra bindings shadowing the parent
    pub fn child(&'a self, vars: Map) -> Scope<'a> {
        Scope::Frame { vars, parent: self }
    }

    /// Look up a top-level name
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        match self {
            Scope::Root(context) => context.get(name),
            Scope::Frame { vars, parent } => vars.get(name).or_else(|| parent.lookup(name)),
        }
    }

    /// Resolve a dotted path in this scope
    pub fn resolve(&self, path: &str) -> Value {
        self.resolve_ref(path).cloned().unwrap_or(Value::Null)
    }

    /// Resolve a dotted path without cloning the result
    ///
    /// Returns `None` as soon as a segment is missing or the walk reaches a
    /// value that is not a map.
    pub fn resolve_ref(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }

        let mut segments = path.split('.');
        let mut current = self.lookup(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Map(map) => map.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Resolve a dotted path against a context value
///
/// Missing keys, `null` intermediates and non-map intermediates all resolve to
/// `Value::Null`; this never fails.
pub fn resolve(path: &str, context: &Value) -> Value {
    Scope::root(context).resolve(path)
}
