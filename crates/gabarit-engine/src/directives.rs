//! Directive processing
//!
//! A render runs three passes over the template text, always in this order:
//!
//! 1. `{% for x in path %}...{% endfor %}` blocks are expanded. Each iteration
//!    renders its body in a loop frame: nested loops first, then the body's
//!    `{{ }}` interpolations.
//! 2. `{% if %}...{% elif %}...{% else %}...{% endif %}` blocks are resolved
//!    against the render context.
//! 3. The remaining `{{ expr | filter(args) }}` interpolations are substituted.
//!
//! Conditions inside a loop body are not evaluated per iteration: the body's
//! `{% if %}` blocks survive the first pass and are resolved in the second
//! against the render context. Neither `loop.*` nor the loop variable is in
//! scope there, so `{% if item.done %}` inside `{% for item in items %}`
//! sees `item` as null.
//!
//! Blocks are matched by nesting depth over the tags located by regex.
//! Anything that does not form a valid directive is kept as literal text.

use gabarit_core::{Map, Scope, Value};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::expr::{self, Operand};
use crate::registry::{FilterOutcome, FilterRegistry};
use crate::suggestions;

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{%\s*(for|endfor|if|elif|else|endif)\b\s*(.*?)\s*%\}").expect("valid tag regex")
});

static INTERPOLATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("valid interpolation regex"));

static FOR_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s+in\s+([A-Za-z_][A-Za-z0-9_.]*)$")
        .expect("valid for header regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    For,
    EndFor,
    If,
    Elif,
    Else,
    EndIf,
}

/// A `{% ... %}` tag located in the source
#[derive(Debug, Clone, Copy)]
struct Tag<'t> {
    kind: TagKind,
    arg: &'t str,
    start: usize,
    end: usize,
}

impl Tag<'_> {
    /// A `for` tag whose header has the `item in path` form
    fn opens_loop(&self) -> bool {
        self.kind == TagKind::For && for_header(self.arg).is_some()
    }
}

fn scan(source: &str) -> Vec<Tag<'_>> {
    TAG.captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let kind = match caps.get(1)?.as_str() {
                "for" => TagKind::For,
                "endfor" => TagKind::EndFor,
                "if" => TagKind::If,
                "elif" => TagKind::Elif,
                "else" => TagKind::Else,
                _ => TagKind::EndIf,
            };
            Some(Tag {
                kind,
                arg: caps.get(2).map_or("", |m| m.as_str()),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Split a for header into the item binding and the list path
fn for_header(arg: &str) -> Option<(&str, &str)> {
    let caps = FOR_HEADER.captures(arg)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Index of the `endfor` closing the loop opened at `open`
fn matching_endfor(tags: &[Tag<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (index, tag) in tags.iter().enumerate().skip(open + 1) {
        if tag.opens_loop() {
            depth += 1;
        } else if tag.kind == TagKind::EndFor {
            if depth == 0 {
                return Some(index);
            }
            depth -= 1;
        }
    }
    None
}

/// Markers of one if-block at its own nesting level: the branch tags
/// (`if`, `elif`, `else`) followed by the closing `endif`
fn conditional_block(tags: &[Tag<'_>], open: usize) -> Option<Vec<usize>> {
    let mut markers = vec![open];
    let mut depth = 0usize;
    for (index, tag) in tags.iter().enumerate().skip(open + 1) {
        match tag.kind {
            TagKind::If => depth += 1,
            TagKind::EndIf if depth == 0 => {
                markers.push(index);
                return Some(markers);
            }
            TagKind::EndIf => depth -= 1,
            TagKind::Elif | TagKind::Else if depth == 0 => markers.push(index),
            _ => {}
        }
    }
    None
}

/// `{% for %}` frame bindings: the item and the `loop` metadata
fn loop_frame(binding: &str, item: &Value, index: usize, length: usize) -> Map {
    let mut meta = Map::new();
    meta.insert("index".to_string(), Value::from(index + 1));
    meta.insert("index0".to_string(), Value::from(index));
    meta.insert("first".to_string(), Value::Bool(index == 0));
    meta.insert("last".to_string(), Value::Bool(index + 1 == length));
    meta.insert("length".to_string(), Value::from(length));

    let mut vars = Map::new();
    vars.insert(binding.to_string(), item.clone());
    vars.insert("loop".to_string(), Value::Map(meta));
    vars
}

/// Split on `separator`, ignoring separators inside quoted strings
///
/// Returns `None` when a quote is left open.
fn split_unquoted(input: &str, separator: char) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut last = 0;

    for (i, c) in input.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == separator => {
                parts.push(&input[last..i]);
                last = i + c.len_utf8();
            }
            None => {}
        }
    }

    if quote.is_some() {
        return None;
    }
    parts.push(&input[last..]);
    Some(parts)
}

/// One `name(args)` step of a filter chain
#[derive(Debug, Clone, PartialEq)]
struct FilterCall<'t> {
    name: &'t str,
    args: Vec<Operand>,
}

impl<'t> FilterCall<'t> {
    fn parse(segment: &'t str) -> Option<Self> {
        let segment = segment.trim();
        let name_len = segment
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(segment.len());
        let (name, rest) = segment.split_at(name_len);
        if name.is_empty() {
            return None;
        }

        let rest = rest.trim();
        if rest.is_empty() {
            return Some(Self { name, args: Vec::new() });
        }

        let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
        if inner.trim().is_empty() {
            return Some(Self { name, args: Vec::new() });
        }

        let args = split_unquoted(inner, ',')?
            .into_iter()
            .map(Operand::parse)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { name, args })
    }
}

/// Renders directives with one engine's filters
pub struct DirectiveProcessor<'e> {
    filters: &'e FilterRegistry,
}

impl<'e> DirectiveProcessor<'e> {
    pub fn new(filters: &'e FilterRegistry) -> Self {
        Self { filters }
    }

    /// Run the three passes over `template` with `context` as root scope
    pub fn process(&self, template: &str, context: &Value) -> String {
        let scope = Scope::root(context);

        let expanded = self.expand_loops(template, &scope);
        tracing::debug!("loops expanded: {} -> {} bytes", template.len(), expanded.len());

        let resolved = self.resolve_conditionals(&expanded, &scope);
        tracing::debug!("conditionals resolved: {} bytes", resolved.len());

        let output = self.interpolate(&resolved, &scope);
        tracing::debug!("interpolations substituted: {} bytes", output.len());

        output
    }

    /// Expand every well-formed loop block in `source`
    pub fn expand_loops(&self, source: &str, scope: &Scope<'_>) -> String {
        let tags = scan(source);
        let mut out = String::with_capacity(source.len());
        let mut cursor = 0;
        let mut i = 0;

        while i < tags.len() {
            let tag = tags[i];
            let header = if tag.kind == TagKind::For { for_header(tag.arg) } else { None };

            let Some((binding, path)) = header else {
                i += 1;
                continue;
            };
            let Some(close) = matching_endfor(&tags, i) else {
                tracing::warn!("Unterminated `{{% for {} %}}` block left as text", tag.arg);
                i += 1;
                continue;
            };

            out.push_str(&source[cursor..tag.start]);
            let body = &source[tag.end..tags[close].start];
            out.push_str(&self.render_loop(binding, path, body, scope));

            cursor = tags[close].end;
            i = close + 1;
        }

        out.push_str(&source[cursor..]);
        out
    }

    fn render_loop(&self, binding: &str, path: &str, body: &str, scope: &Scope<'_>) -> String {
        let items = match scope.resolve_ref(path) {
            Some(Value::List(items)) if !items.is_empty() => items,
            _ => return String::new(),
        };

        let mut out = String::new();
        for (index, item) in items.iter().enumerate() {
            let frame = scope.child(loop_frame(binding, item, index, items.len()));
            let nested = self.expand_loops(body, &frame);
            out.push_str(&self.interpolate(&nested, &frame));
        }
        out
    }

    /// Resolve every well-formed if-block in `source`
    pub fn resolve_conditionals(&self, source: &str, scope: &Scope<'_>) -> String {
        let tags = scan(source);
        let mut out = String::with_capacity(source.len());
        let mut cursor = 0;
        let mut i = 0;

        while i < tags.len() {
            let tag = tags[i];
            if tag.kind != TagKind::If {
                i += 1;
                continue;
            }
            let Some(markers) = conditional_block(&tags, i) else {
                tracing::warn!("Unterminated `{{% if {} %}}` block left as text", tag.arg);
                i += 1;
                continue;
            };

            out.push_str(&source[cursor..tag.start]);

            let chosen = markers.windows(2).find_map(|pair| {
                let (head, next) = (tags[pair[0]], tags[pair[1]]);
                let taken = match head.kind {
                    TagKind::Else => true,
                    _ => self.condition(head.arg, scope),
                };
                taken.then(|| &source[head.end..next.start])
            });
            if let Some(body) = chosen {
                out.push_str(&self.resolve_conditionals(body, scope));
            }

            let close = markers[markers.len() - 1];
            cursor = tags[close].end;
            i = close + 1;
        }

        out.push_str(&source[cursor..]);
        out
    }

    fn condition(&self, condition: &str, scope: &Scope<'_>) -> bool {
        match expr::evaluate(condition, scope) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Invalid condition `{}` treated as false: {}", condition, e);
                false
            }
        }
    }

    /// Substitute every `{{ }}` interpolation in `source`
    pub fn interpolate(&self, source: &str, scope: &Scope<'_>) -> String {
        INTERPOLATION
            .replace_all(source, |caps: &Captures<'_>| {
                self.render_expression(&caps[1], scope)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Evaluate `base | filter | filter(args)` to text
    ///
    /// Returns `None` when the expression cannot be parsed.
    fn render_expression(&self, expression: &str, scope: &Scope<'_>) -> Option<String> {
        let segments = split_unquoted(expression, '|')?;
        let (base, chain) = segments.split_first()?;

        let mut value = Operand::parse(base)?.eval(scope);
        let calls = chain
            .iter()
            .map(|segment| FilterCall::parse(segment))
            .collect::<Option<Vec<_>>>()?;

        for call in &calls {
            value = self.apply_filter(call, value, scope);
        }
        Some(value.to_output_string())
    }

    fn apply_filter(&self, call: &FilterCall<'_>, value: Value, scope: &Scope<'_>) -> Value {
        let args: Vec<Value> = call.args.iter().map(|arg| arg.eval(scope)).collect();

        match self.filters.apply(call.name, &value, &args) {
            FilterOutcome::Applied(result) => result,
            FilterOutcome::Unknown => {
                match suggestions::suggest_unknown_filter(call.name, &self.filters.names()) {
                    Some(hint) => tracing::warn!("Unknown filter `{}` ignored. {}", call.name, hint),
                    None => tracing::warn!("Unknown filter `{}` ignored", call.name),
                }
                value
            }
            FilterOutcome::Failed(e) => {
                tracing::error!("Filter `{}` failed, value left unchanged: {}", call.name, e);
                value
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, context: serde_json::Value) -> String {
        let filters = FilterRegistry::with_builtins();
        DirectiveProcessor::new(&filters).process(template, &Value::from(context))
    }

    #[test]
    fn test_scan_finds_tags() {
        let tags = scan("a {% if x %}b{%else%}c{% endif %}");
        let kinds: Vec<_> = tags.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TagKind::If, TagKind::Else, TagKind::EndIf]);
        assert_eq!(tags[0].arg, "x");
    }

    #[test]
    fn test_for_header() {
        assert_eq!(for_header("item in items"), Some(("item", "items")));
        assert_eq!(for_header("x in report.issues"), Some(("x", "report.issues")));
        assert_eq!(for_header("items"), None);
        assert_eq!(for_header("a, b in items"), None);
    }

    #[test]
    fn test_split_unquoted() {
        assert_eq!(split_unquoted("a | b", '|'), Some(vec!["a ", " b"]));
        assert_eq!(
            split_unquoted(r#"x | join(" | ")"#, '|'),
            Some(vec!["x ", r#" join(" | ")"#])
        );
        assert_eq!(split_unquoted("'open", '|'), None);
    }

    #[test]
    fn test_filter_call_parse() {
        let call = FilterCall::parse(r#" truncate(5) "#).unwrap();
        assert_eq!(call.name, "truncate");
        assert_eq!(call.args, vec![Operand::Literal(Value::Number(5.0))]);

        let call = FilterCall::parse(r#"replace("a, b", other.path)"#).unwrap();
        assert_eq!(
            call.args,
            vec![
                Operand::Literal(Value::from("a, b")),
                Operand::Path("other.path".to_string()),
            ]
        );

        assert!(FilterCall::parse("").is_none());
        assert!(FilterCall::parse("round(").is_none());
        assert!(FilterCall::parse("upper extra").is_none());
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(render("Hi {{ name }}!", json!({"name": "Ada"})), "Hi Ada!");
        assert_eq!(render("{{ missing.path }}", json!({})), "");
        assert_eq!(render("{{ 'lit' | upper }}", json!({})), "LIT");
        assert_eq!(render("{{n}}", json!({"n": 3})), "3");
    }

    #[test]
    fn test_filter_chain_left_to_right() {
        assert_eq!(
            render("{{ text | upper | truncate(5) }}", json!({"text": "hello world"})),
            "HELLO..."
        );
    }

    #[test]
    fn test_filter_args_resolve_paths() {
        assert_eq!(
            render("{{ tags | join(sep) }}", json!({"tags": ["a", "b"], "sep": " + "})),
            "a + b"
        );
    }

    #[test]
    fn test_malformed_interpolations_stay_literal() {
        assert_eq!(render("{{ }}", json!({})), "{{ }}");
        assert_eq!(render("{{ a b }}", json!({"a": 1})), "{{ a b }}");
        assert_eq!(render("{{ a | }}", json!({"a": 1})), "{{ a | }}");
    }

    #[test]
    fn test_unknown_filter_keeps_value() {
        assert_eq!(render("{{ name | shout }}", json!({"name": "ada"})), "ada");
    }

    #[test]
    fn test_failing_filter_reverts_value() {
        assert_eq!(render("{{ name | truncate }}", json!({"name": "ada"})), "ada");
        assert_eq!(render("{{ name | upper | keys }}", json!({"name": "ada"})), "ADA");
    }

    #[test]
    fn test_loop_binding_and_metadata() {
        let out = render(
            "{% for x in xs %}{{ loop.index }}/{{ loop.length }}:{{ x }};{% endfor %}",
            json!({"xs": ["a", "b", "c"]}),
        );
        assert_eq!(out, "1/3:a;2/3:b;3/3:c;");

        let out = render(
            "{% for x in xs %}{{ loop.index0 }}{{ loop.first }}{{ loop.last }} {% endfor %}",
            json!({"xs": [1, 2]}),
        );
        assert_eq!(out, "0truefalse 1falsetrue ");
    }

    #[test]
    fn test_loop_over_empty_or_missing_renders_nothing() {
        assert_eq!(render("[{% for x in xs %}{{ x }}{% endfor %}]", json!({"xs": []})), "[]");
        assert_eq!(render("[{% for x in xs %}{{ x }}{% endfor %}]", json!({})), "[]");
        assert_eq!(render("[{% for x in xs %}{{ x }}{% endfor %}]", json!({"xs": "abc"})), "[]");
    }

    #[test]
    fn test_nested_loops() {
        let out = render(
            "{% for row in rows %}{% for c in row.cells %}{{ row.name }}{{ c }} {% endfor %}{% endfor %}",
            json!({"rows": [{"name": "a", "cells": [1, 2]}, {"name": "b", "cells": [3]}]}),
        );
        assert_eq!(out, "a1 a2 b3 ");
    }

    #[test]
    fn test_loop_frame_shadows_context() {
        let out = render(
            "{% for name in names %}{{ name }}{% endfor %}-{{ name }}",
            json!({"names": ["x", "y"], "name": "outer"}),
        );
        assert_eq!(out, "xy-outer");
    }

    #[test]
    fn test_conditionals() {
        let tpl = "{% if n > 10 %}big{% elif n > 5 %}medium{% else %}small{% endif %}";
        assert_eq!(render(tpl, json!({"n": 20})), "big");
        assert_eq!(render(tpl, json!({"n": 7})), "medium");
        assert_eq!(render(tpl, json!({"n": 1})), "small");
        assert_eq!(render("{% if flag %}yes{% endif %}", json!({})), "");
    }

    #[test]
    fn test_nested_conditionals() {
        let tpl = "{% if a %}A{% if b %}B{% else %}!B{% endif %}{% else %}!A{% endif %}";
        assert_eq!(render(tpl, json!({"a": true, "b": false})), "A!B");
        assert_eq!(render(tpl, json!({"a": false, "b": true})), "!A");
    }

    #[test]
    fn test_invalid_condition_is_false() {
        assert_eq!(render("{% if a == %}x{% else %}y{% endif %}", json!({"a": 1})), "y");
    }

    #[test]
    fn test_loop_flags_in_conditions_are_not_visible() {
        let out = render(
            "{% for x in xs %}{% if loop.first %}first{% endif %}{{ x }}{% endfor %}",
            json!({"xs": [1, 2]}),
        );
        assert_eq!(out, "12");
    }

    #[test]
    fn test_loop_variable_in_conditions_is_not_visible() {
        let context = json!({"audits": [{"title": "a", "score": 0.2}, {"title": "b", "score": 0.9}]});
        assert_eq!(
            render(
                "{% for a in audits %}{% if a.score < 0.5 %}{{ a.title }}{% endif %}{% endfor %}",
                context.clone()
            ),
            ""
        );
        // A context path with the same name as the loop variable is what gets read
        assert_eq!(
            render(
                "{% for a in audits %}{% if a %}[{{ a.title }}]{% endif %}{% endfor %}",
                json!({"a": true, "audits": context["audits"].clone()})
            ),
            "[a][b]"
        );
    }

    #[test]
    fn test_failing_filters_inside_loop_keep_rendering() {
        let mut filters = FilterRegistry::with_builtins();
        filters
            .register("explode", |_: &Value, _: &[Value]| panic!("explode"))
            .unwrap();
        let processor = DirectiveProcessor::new(&filters);
        let context = Value::from(json!({"xs": ["a", "b"]}));

        assert_eq!(
            processor.process("{% for x in xs %}{{ x | explode | upper }};{% endfor %}", &context),
            "A;B;"
        );
    }

    #[test]
    fn test_malformed_directives_stay_literal() {
        assert_eq!(render("{% for x %}a{% endfor %}", json!({})), "{% for x %}a{% endfor %}");
        assert_eq!(render("{% if x %}never closed", json!({"x": true})), "{% if x %}never closed");
        assert_eq!(render("{% endif %} stray", json!({})), "{% endif %} stray");
        assert_eq!(render("{% unknown %}", json!({})), "{% unknown %}");
    }

    #[test]
    fn test_rendering_does_not_mutate_context() {
        let context = Value::from(json!({"xs": [3, 1, 2], "name": "ada"}));
        let before = context.clone();
        let filters = FilterRegistry::with_builtins();
        DirectiveProcessor::new(&filters).process(
            "{% for x in xs %}{{ x }}{% endfor %}{{ xs | reverse }}{{ name | upper }}",
            &context,
        );
        assert_eq!(context, before);
    }
}
