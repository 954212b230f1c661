//! Render context loading with deep merge support

use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::value::{Map, Value};

/// Render data for one template compilation
///
/// Always a mapping at the top level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context(Map);

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Load a context from a JSON or YAML file
    ///
    /// Files ending in `.json` are parsed as JSON; anything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Parse a context from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Self::try_from(Value::from(value))
    }

    /// Parse a context from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::try_from(Value::from(value))
    }

    /// Deep merge another context into this one
    ///
    /// Rules:
    /// - Maps: recursive merge
    /// - Everything else (lists included): overlay replaces base
    pub fn merge(&mut self, overlay: &Context) {
        merge_maps(&mut self.0, &overlay.0);
    }

    /// Merge several contexts in order, later ones winning
    pub fn merge_all(contexts: Vec<Context>) -> Self {
        let mut result = Context::new();
        for ctx in contexts {
            result.merge(&ctx);
        }
        result
    }

    /// Set a value by dotted path (e.g., "site.audit.score")
    ///
    /// Intermediate segments that are missing or not maps are replaced by maps.
    pub fn set(&mut self, path: &str, value: Value) {
        let parts: Vec<&str> = path.split('.').collect();
        set_nested(&mut self.0, &parts, value);
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the top-level mapping
    pub fn as_map(&self) -> &Map {
        &self.0
    }

    /// Convert into a `Value::Map` ready for rendering
    pub fn into_value(self) -> Value {
        Value::Map(self.0)
    }
}

impl TryFrom<Value> for Context {
    type Error = CoreError;

    /// An empty document (`null`) is accepted as an empty context
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Map(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(CoreError::InvalidContext {
                found: other.kind(),
            }),
        }
    }
}

impl From<Context> for Value {
    fn from(ctx: Context) -> Self {
        ctx.into_value()
    }
}

fn merge_maps(base: &mut Map, overlay: &Map) {
    for (key, overlay_value) in overlay {
        match base.get_mut(key) {
            Some(base_value) => deep_merge(base_value, overlay_value),
            None => {
                base.insert(key.clone(), overlay_value.clone());
            }
        }
    }
}

fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Map(base_map), Value::Map(overlay_map)) => merge_maps(base_map, overlay_map),
        (base, overlay) => *base = overlay.clone(),
    }
}

fn set_nested(map: &mut Map, path: &[&str], new_value: Value) {
    let Some((key, remaining)) = path.split_first() else {
        return;
    };

    if remaining.is_empty() {
        map.insert(key.to_string(), new_value);
        return;
    }

    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Map(Map::new()));
    if !matches!(entry, Value::Map(_)) {
        *entry = Value::Map(Map::new());
    }
    if let Value::Map(child) = entry {
        set_nested(child, remaining, new_value);
    }
}

/// Parse a single `--set` value: booleans, null, numbers, inline JSON, else string
fn parse_set_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(num) = raw.parse::<i64>() {
                Value::from(num)
            } else if let Ok(num) = raw.parse::<f64>() {
                Value::Number(num)
            } else if raw.starts_with('[') || raw.starts_with('{') {
                serde_json::from_str::<JsonValue>(raw)
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::from(raw))
            } else {
                Value::from(raw)
            }
        }
    }
}

/// Parse --set arguments (key=value format)
pub fn parse_set_values(set_args: &[String]) -> Result<Context> {
    let mut context = Context::new();

    for arg in set_args {
        let (key, val) = arg
            .split_once('=')
            .ok_or_else(|| CoreError::InvalidSet { arg: arg.clone() })?;
        if key.trim().is_empty() {
            return Err(CoreError::InvalidSet { arg: arg.clone() });
        }

        context.set(key.trim(), parse_set_value(val));
    }

    Ok(context)
}
