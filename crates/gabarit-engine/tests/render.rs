//! End-to-end rendering tests through the public engine API

use gabarit_core::Value;
use gabarit_engine::{Engine, EngineError, FilterError};
use serde_json::json;

fn compile(template: &str, context: serde_json::Value) -> String {
    Engine::new().compile(template, &Value::from(context))
}

#[test]
fn hello_world() {
    assert_eq!(compile("Hello {{ name }}!", json!({"name": "World"})), "Hello World!");
}

#[test]
fn score_of_null_is_missing() {
    assert_eq!(compile("{{ value | score }}", json!({"value": null})), "N/A");
}

#[test]
fn loop_with_index() {
    assert_eq!(
        compile(
            "{% for item in items %}{{ loop.index }}.{{ item }} {% endfor %}",
            json!({"items": ["a", "b", "c"]})
        ),
        "1.a 2.b 3.c"
    );
}

#[test]
fn elif_branch() {
    let template = "{% if score > 90 %}Excellent{% elif score > 50 %}Good{% else %}Poor{% endif %}";
    assert_eq!(compile(template, json!({"score": 75})), "Good");
    assert_eq!(compile(template, json!({"score": 95})), "Excellent");
    assert_eq!(compile(template, json!({"score": 10})), "Poor");
    assert_eq!(compile(template, json!({})), "Poor");
}

#[test]
fn blank_lines_collapse() {
    assert_eq!(compile("Line1\n\n\n\n\nLine2", json!({})), "Line1\n\nLine2");
}

#[test]
fn upper_then_truncate() {
    assert_eq!(
        compile("{{ text | upper | truncate(5) }}", json!({"text": "hello world"})),
        "HELLO..."
    );
}

#[test]
fn score_boundaries() {
    assert_eq!(compile("{{ s | score }}", json!({"s": 0.90})), "90% ✅ Bon");
    assert_eq!(compile("{{ s | score }}", json!({"s": 0.89999})), "89% ⚠️ Moyen");
}

#[test]
fn loop_index_invariants() {
    let items: Vec<i64> = (0..7).collect();
    let out = compile(
        "{% for x in xs %}{{ loop.index }},{{ loop.index0 }},{{ loop.first }},{{ loop.last }},{{ loop.length }},{{ x }}\n{% endfor %}",
        json!({"xs": items.clone()}),
    );

    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 7);
    for (i, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields[0], (i + 1).to_string());
        assert_eq!(fields[1], i.to_string());
        assert_eq!(fields[2], (i == 0).to_string());
        assert_eq!(fields[3], (i == 6).to_string());
        assert_eq!(fields[4], "7");
        assert_eq!(fields[5], items[i].to_string());
    }
}

#[test]
fn conditions_see_context_not_loop_frame() {
    let out = compile(
        "{% for x in xs %}{% if loop.first %}[first]{% endif %}{{ loop.first }} {% endfor %}",
        json!({"xs": ["a", "b"]}),
    );
    assert_eq!(out, "true false");
}

#[test]
fn conditions_on_loop_items_read_the_context() {
    let out = compile(
        "{% for a in audits %}{% if a.score < 0.5 %}{{ a.title }}{% endif %}{% endfor %}",
        json!({"audits": [{"title": "Images", "score": 0.1}, {"title": "Cache", "score": 0.3}]}),
    );
    assert_eq!(out, "");
}

#[test]
fn loops_run_before_conditionals() {
    let out = compile(
        "{% if show %}{% for x in xs %}{{ x }}{% endfor %}{% else %}hidden{% endif %}",
        json!({"show": true, "xs": [1, 2, 3]}),
    );
    assert_eq!(out, "123");
}

#[test]
fn unknown_filter_does_not_abort_render() {
    assert_eq!(
        compile("{{ name | scroe }} and {{ name | upper }}", json!({"name": "ada"})),
        "ada and ADA"
    );
}

#[test]
fn audit_report() {
    let context = json!({
        "site": {"url": "https://example.org"},
        "scores": {"performance": 0.42, "accessibility": 0.97},
        "timings": {"lcp": 3120, "ttfb": 180},
        "weight": 1843200,
        "audits": [
            {"title": "Compress images", "score": 0.3},
            {"title": "Enable caching", "score": 0.65},
            {"title": "Use HTTPS", "score": 1}
        ],
        "notes": []
    });

    let template = r#"
# Audit {{ site.url | replace("https://", "") }}

Performance: {{ scores.performance | score }}
Accessibility: {{ scores.accessibility | score }}
SEO: {{ scores.seo | score }}


LCP: {{ timings.lcp | metric }} / TTFB: {{ timings.ttfb | metric }}
Weight: {{ weight | size }}

## Priorities
{{ audits | prioritize }}

## Notes
{{ notes | list }}
{% if scores.performance < 0.5 %}
Performance needs work.
{% endif %}
"#;

    insta::assert_snapshot!(compile(template, context), @r"
    # Audit example.org

    Performance: 42% ❌ Faible
    Accessibility: 97% ✅ Bon
    SEO: N/A

    LCP: 3.12s / TTFB: 180ms
    Weight: 1.76MB

    ## Priorities
    1. ❌ **Compress images**
    2. ⚠️ **Enable caching**
    3. ✅ **Use HTTPS**

    ## Notes
    Aucun élément

    Performance needs work.
    ");
}

#[test]
fn compile_value_requires_string_template() {
    let engine = Engine::new();
    let err = engine
        .compile_value(&Value::Number(3.0), &Value::Null)
        .unwrap_err();
    assert_eq!(err, EngineError::InvalidTemplate { found: "number" });
}

#[test]
fn custom_filters_via_builder() {
    let engine = Engine::builder()
        .filter("slug", |value: &Value, _: &[Value]| {
            let text = value
                .as_str()
                .ok_or_else(|| FilterError::failed("slug expects a string"))?;
            Ok(Value::from(text.to_lowercase().replace(' ', "-")))
        })
        .build()
        .unwrap();

    let ctx = Value::from(json!({"title": "Hello Big World", "n": 3}));
    assert_eq!(engine.compile("{{ title | slug }}", &ctx), "hello-big-world");
    // Failure keeps the previous value
    assert_eq!(engine.compile("{{ n | slug }}", &ctx), "3");
}

#[test]
fn panicking_filter_keeps_previous_value() {
    let engine = Engine::builder()
        .filter("boom", |_: &Value, _: &[Value]| panic!("filter exploded"))
        .build()
        .unwrap();

    let ctx = Value::from(json!({"name": "ada", "xs": ["x", "y"]}));
    assert_eq!(engine.compile("A {{ name | boom }} B", &ctx), "A ada B");
    assert_eq!(
        engine.compile("{% for x in xs %}{{ x | boom | upper }}{% endfor %}", &ctx),
        "XY"
    );
}

#[test]
fn failing_builtin_in_loop_chain_is_contained() {
    let out = compile(
        "{% for a in audits %}{{ a.title | truncate | upper }};{% endfor %}",
        json!({"audits": [{"title": "cache"}, {"title": "images"}]}),
    );
    assert_eq!(out, "CACHE;IMAGES;");
}

#[test]
fn oversized_indent_is_rejected() {
    assert_eq!(
        compile("x:{{ x | indent(10000000000000000000) }}", json!({"x": "a"})),
        "x:a"
    );
    assert_eq!(compile("x:{{ x | indent(3) }}", json!({"x": "a"})), "x:   a");
}

#[test]
fn exponent_literals() {
    assert_eq!(compile("{{ x | round(2e0) }}", json!({"x": 3.14159})), "3.14");
    assert_eq!(
        compile("{% if big > 1e3 %}big{% else %}small{% endif %}", json!({"big": 2500})),
        "big"
    );
}

#[test]
fn normalization_is_idempotent_on_rendered_output() {
    let engine = Engine::builder().normalize(false).build().unwrap();
    let raw = engine.compile(
        "{% for x in xs %}  {{ x }}  \n\n\n{% endfor %}",
        &Value::from(json!({"xs": ["a", "b"]})),
    );
    let once = gabarit_engine::normalize(&raw);
    assert_eq!(gabarit_engine::normalize(&once), once);
    assert_eq!(once, "a\n\n  b");
}
