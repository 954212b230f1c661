//! Template engine facade

use gabarit_core::Value;

use crate::directives::DirectiveProcessor;
use crate::error::{EngineError, FilterError, Result};
use crate::normalize::normalize;
use crate::registry::FilterRegistry;

/// Template engine builder
pub struct EngineBuilder {
    normalize: bool,
    filters: FilterRegistry,
    error: Option<EngineError>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            normalize: true,
            filters: FilterRegistry::with_builtins(),
            error: None,
        }
    }

    /// Set output normalization (strip trailing spaces, collapse blank lines)
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Register a custom filter; an invalid name is reported by `build`
    pub fn filter<F>(mut self, name: &str, filter: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> std::result::Result<Value, FilterError> + Send + Sync + 'static,
    {
        if let Err(e) = self.filters.register(name, filter) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<Engine> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(Engine {
                filters: self.filters,
                normalize: self.normalize,
            }),
        }
    }
}

/// The template engine
///
/// Owns its filter registry; rendering borrows the engine immutably, so one
/// engine can serve any number of render calls.
#[derive(Debug, Clone)]
pub struct Engine {
    filters: FilterRegistry,
    normalize: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with the built-in filters and normalization enabled
    pub fn new() -> Self {
        Self {
            filters: FilterRegistry::with_builtins(),
            normalize: true,
        }
    }

    /// Create a builder
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Register a filter on this engine, replacing any filter with that name
    pub fn register_filter<F>(&mut self, name: &str, filter: F) -> Result<()>
    where
        F: Fn(&Value, &[Value]) -> std::result::Result<Value, FilterError> + Send + Sync + 'static,
    {
        self.filters.register(name, filter)?;
        tracing::debug!("registered filter `{}`", name);
        Ok(())
    }

    /// Render a template against a context
    ///
    /// Never fails: unknown filters, failing filters and malformed directives
    /// are logged and rendered leniently. A context that is not a map behaves
    /// like an empty one.
    pub fn compile(&self, template: &str, context: &Value) -> String {
        let rendered = DirectiveProcessor::new(&self.filters).process(template, context);

        if self.normalize {
            normalize(&rendered)
        } else {
            rendered
        }
    }

    /// Render a template held in a dynamic value
    ///
    /// Fails with `InvalidTemplate` when `template` is not a string.
    pub fn compile_value(&self, template: &Value, context: &Value) -> Result<String> {
        match template {
            Value::String(text) => Ok(self.compile(text, context)),
            other => Err(EngineError::InvalidTemplate { found: other.kind() }),
        }
    }

    /// Names of the registered filters, built-ins first
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_context() -> Value {
        Value::from(json!({
            "site": {"name": "example.org", "owner": null},
            "audit": {"performance": 0.93, "lcp": 2340},
            "issues": [{"title": "Images"}, {"title": "Cache"}],
        }))
    }

    #[test]
    fn test_compile_simple() {
        let engine = Engine::new();
        let result = engine.compile("Site: {{ site.name }}", &create_test_context());
        assert_eq!(result, "Site: example.org");
    }

    #[test]
    fn test_compile_with_filters() {
        let engine = Engine::new();
        let result = engine.compile(
            "{{ audit.performance | score }} / {{ audit.lcp | metric }} / {{ site.owner | default }}",
            &create_test_context(),
        );
        assert_eq!(result, "93% ✅ Bon / 2.34s / N/A");
    }

    #[test]
    fn test_compile_normalizes_output() {
        let engine = Engine::new();
        let result = engine.compile("\n  Title  \n\n\n\n{{ site.name }}\n", &create_test_context());
        assert_eq!(result, "Title\n\nexample.org");
    }

    #[test]
    fn test_normalization_can_be_disabled() {
        let engine = Engine::builder().normalize(false).build().unwrap();
        let result = engine.compile("  {{ site.name }}  \n\n\n", &create_test_context());
        assert_eq!(result, "  example.org  \n\n\n");
    }

    #[test]
    fn test_compile_value_rejects_non_strings() {
        let engine = Engine::new();
        let ctx = create_test_context();

        for template in [Value::Null, Value::Number(1.0), Value::from(json!(["a"]))] {
            let err = engine.compile_value(&template, &ctx).unwrap_err();
            assert!(matches!(err, EngineError::InvalidTemplate { .. }));
        }
        assert_eq!(
            engine.compile_value(&Value::from("{{ site.name }}"), &ctx).unwrap(),
            "example.org"
        );
    }

    #[test]
    fn test_non_map_context_is_empty() {
        let engine = Engine::new();
        assert_eq!(engine.compile("[{{ a }}]", &Value::from("text")), "[]");
        assert_eq!(engine.compile("[{{ a }}]", &Value::Null), "[]");
    }

    #[test]
    fn test_register_filter() {
        let mut engine = Engine::new();
        engine
            .register_filter("exclaim", |v: &Value, _: &[Value]| {
                Ok(Value::from(format!("{}!", v.to_output_string())))
            })
            .unwrap();

        assert_eq!(engine.compile("{{ site.name | exclaim }}", &create_test_context()), "example.org!");
        assert!(engine.filter_names().contains(&"exclaim"));
    }

    #[test]
    fn test_invalid_registration_keeps_existing_filters() {
        let mut engine = Engine::new();
        let before = engine.filter_names().len();

        let err = engine
            .register_filter("bad name", |v: &Value, _: &[Value]| Ok(v.clone()))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidFilter { .. }));
        assert_eq!(engine.filter_names().len(), before);
        assert_eq!(engine.compile("{{ 'a' | upper }}", &Value::Null), "A");
    }

    #[test]
    fn test_builder_reports_invalid_filter() {
        let result = Engine::builder()
            .filter("ok_name", |v: &Value, _: &[Value]| Ok(v.clone()))
            .filter("not-ok", |v: &Value, _: &[Value]| Ok(v.clone()))
            .build();

        match result {
            Err(EngineError::InvalidFilter { name, .. }) => assert_eq!(name, "not-ok"),
            other => panic!("expected InvalidFilter, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_engines_do_not_share_filters() {
        let mut a = Engine::new();
        let b = Engine::new();
        a.register_filter("only_a", |v: &Value, _: &[Value]| Ok(v.clone())).unwrap();

        assert!(a.filter_names().contains(&"only_a"));
        assert!(!b.filter_names().contains(&"only_a"));
        assert_eq!(b.compile("{{ 'x' | only_a }}", &Value::Null), "x");
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
