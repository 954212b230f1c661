//! Built-in filter library
//!
//! Report formatting filters (`score`, `metric`, `size`, `list`,
//! `prioritize`) plus general purpose value and string helpers. Every filter
//! takes the current value by reference and returns a new one.

use gabarit_core::Value;
use std::cmp::Ordering;

use crate::error::FilterError;

type FilterResult = Result<Value, FilterError>;

/// Placeholder rendered for missing measurements
pub const MISSING: &str = "N/A";

/// Message rendered by `list` and `prioritize` when there is nothing to show
pub const NO_ITEMS: &str = "Aucun élément";

/// Percentage thresholds shared by `score` and `prioritize`
const GOOD_THRESHOLD: i64 = 90;
const AVERAGE_THRESHOLD: i64 = 50;

// =========================================================================
// Argument helpers
// =========================================================================

fn number_arg(args: &[Value], index: usize, arg: &'static str) -> Result<Option<f64>, FilterError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(*n)),
        Some(other) => Err(FilterError::InvalidArgument {
            arg,
            expected: "number",
            found: other.kind(),
        }),
    }
}

fn string_arg(args: &[Value], index: usize) -> Option<String> {
    args.get(index)
        .filter(|value| !value.is_null())
        .map(Value::to_output_string)
}

/// Numbers and numeric strings, as used by measurements read from reports
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        other => other.as_f64().filter(|n| n.is_finite()),
    }
}

// =========================================================================
// Report formatting
// =========================================================================

/// Scale a score to 0-100: values up to 1 are fractions
fn scaled_percentage(n: f64) -> f64 {
    if n <= 1.0 { n * 100.0 } else { n }
}

/// Whole percentage used for display and grading
///
/// Floored, with a small tolerance for binary fractions such as
/// `0.29 * 100 = 28.999999999999996`.
fn whole_percentage(n: f64) -> i64 {
    (scaled_percentage(n) + 1e-9).floor() as i64
}

fn grade(pct: i64) -> (&'static str, &'static str) {
    if pct >= GOOD_THRESHOLD {
        ("✅", "Bon")
    } else if pct >= AVERAGE_THRESHOLD {
        ("⚠️", "Moyen")
    } else {
        ("❌", "Faible")
    }
}

/// Format a score as a graded percentage
///
/// Usage: {{ audit.performance | score }}
/// Result: "92% ✅ Bon"
pub fn score(value: &Value, _args: &[Value]) -> FilterResult {
    let Some(n) = as_number(value) else {
        return Ok(Value::from(MISSING));
    };

    let pct = whole_percentage(n);
    let (icon, label) = grade(pct);
    Ok(Value::from(format!("{}% {} {}", pct, icon, label)))
}

/// Format a duration in milliseconds
///
/// Usage: {{ timings.lcp | metric }}
/// Result: "850ms" or "2.35s"
pub fn metric(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::String(_) => value.clone(),
        Value::Number(n) if n.is_finite() => {
            if *n < 1000.0 {
                Value::from(format!("{}ms", Value::Number(n.round())))
            } else {
                Value::from(format!("{:.2}s", n / 1000.0))
            }
        }
        _ => Value::from(MISSING),
    })
}

/// Format a byte count
///
/// Usage: {{ resources.total_bytes | size }}
/// Result: "512B", "1.5KB" or "2.00MB"
pub fn size(value: &Value, _args: &[Value]) -> FilterResult {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let Some(bytes) = as_number(value) else {
        return Ok(Value::from(MISSING));
    };

    let text = if bytes < KB {
        format!("{}B", Value::Number(bytes))
    } else if bytes < MB {
        format!("{:.1}KB", bytes / KB)
    } else {
        format!("{:.2}MB", bytes / MB)
    };
    Ok(Value::from(text))
}

/// Display label of a list element: `title`, then `name`, else the value itself
fn item_label(item: &Value) -> String {
    match item {
        Value::Map(map) => ["title", "name"]
            .iter()
            .find_map(|key| map.get(*key).filter(|v| !v.is_null()))
            .unwrap_or(item)
            .to_output_string(),
        other => other.to_output_string(),
    }
}

/// Render a list as markdown bullet lines
///
/// Usage: {{ issues | list }}
pub fn list(value: &Value, _args: &[Value]) -> FilterResult {
    match value {
        Value::List(items) if !items.is_empty() => Ok(Value::from(
            items
                .iter()
                .map(|item| format!("- {}", item_label(item)))
                .collect::<Vec<_>>()
                .join("\n"),
        )),
        _ => Ok(Value::from(NO_ITEMS)),
    }
}

/// Rank `{title, score}` items from worst to best
///
/// Usage: {{ audits | prioritize }}
/// Result: "1. ❌ **Images**\n2. ⚠️ **Cache**"
pub fn prioritize(value: &Value, _args: &[Value]) -> FilterResult {
    let items = match value {
        Value::List(items) if !items.is_empty() => items,
        _ => return Ok(Value::from(NO_ITEMS)),
    };

    let mut ranked: Vec<(f64, String)> = items
        .iter()
        .map(|item| {
            let raw = item.get("score").and_then(as_number).unwrap_or(0.0);
            (scaled_percentage(raw), item_label(item))
        })
        .collect();

    // Stable: items with equal scores keep their source order
    ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let lines: Vec<String> = ranked
        .iter()
        .enumerate()
        .map(|(i, (pct, title))| {
            let (icon, _) = grade((pct + 1e-9).floor() as i64);
            format!("{}. {} **{}**", i + 1, icon, title)
        })
        .collect();

    Ok(Value::from(lines.join("\n")))
}

// =========================================================================
// General purpose
// =========================================================================

/// Serialize a value as pretty-printed JSON
///
/// Usage: {{ raw | json }}
pub fn json(value: &Value, _args: &[Value]) -> FilterResult {
    serde_json::to_string_pretty(value)
        .map(Value::from)
        .map_err(|e| FilterError::failed(format!("json serialization failed: {}", e)))
}

/// Uppercase the value's text
///
/// Usage: {{ name | upper }}
pub fn upper(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::Null => Value::Null,
        other => Value::from(other.to_output_string().to_uppercase()),
    })
}

/// Lowercase the value's text
///
/// Usage: {{ name | lower }}
pub fn lower(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::Null => Value::Null,
        other => Value::from(other.to_output_string().to_lowercase()),
    })
}

/// Replace a missing value with a fallback
///
/// Usage: {{ site.owner | default("inconnu") }}
pub fn default(value: &Value, args: &[Value]) -> FilterResult {
    if !value.is_null() {
        return Ok(value.clone());
    }
    Ok(args
        .first()
        .filter(|fallback| !fallback.is_null())
        .cloned()
        .unwrap_or_else(|| Value::from(MISSING)))
}

/// Number of list elements or string characters; 0 for anything else
///
/// Usage: {{ issues | length }}
pub fn length(value: &Value, _args: &[Value]) -> FilterResult {
    let len = match value {
        Value::List(items) => items.len(),
        Value::String(s) => s.chars().count(),
        _ => 0,
    };
    Ok(Value::from(len))
}

/// First element of a list or first character of a string
///
/// Usage: {{ issues | first }}
pub fn first(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::List(items) => items.first().cloned().unwrap_or(Value::Null),
        Value::String(s) => s.chars().next().map(String::from).into(),
        other => other.clone(),
    })
}

/// Last element of a list or last character of a string
///
/// Usage: {{ issues | last }}
pub fn last(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::List(items) => items.last().cloned().unwrap_or(Value::Null),
        Value::String(s) => s.chars().next_back().map(String::from).into(),
        other => other.clone(),
    })
}

/// Join list elements with a separator (default ", ")
///
/// Usage: {{ tags | join(" / ") }}
pub fn join(value: &Value, args: &[Value]) -> FilterResult {
    let Value::List(items) = value else {
        return Ok(value.clone());
    };
    let separator = string_arg(args, 0).unwrap_or_else(|| ", ".to_string());

    Ok(Value::from(
        items
            .iter()
            .map(Value::to_output_string)
            .collect::<Vec<_>>()
            .join(&separator),
    ))
}

/// Cut text to `n` characters, appending "..." when something was removed
///
/// Usage: {{ description | truncate(80) }}
pub fn truncate(value: &Value, args: &[Value]) -> FilterResult {
    let length = number_arg(args, 0, "length")?.ok_or(FilterError::MissingArgument { arg: "length" })?;
    if length < 0.0 {
        return Err(FilterError::failed("truncate length cannot be negative"));
    }
    if value.is_null() {
        return Ok(Value::Null);
    }

    let text = value.to_output_string();
    let length = length as usize;
    if text.chars().count() <= length {
        return Ok(Value::from(text));
    }

    let mut cut: String = text.chars().take(length).collect();
    cut.push_str("...");
    Ok(Value::from(cut))
}

/// Round a number to `n` decimals (default 0)
///
/// Usage: {{ ratio | round(2) }}
pub fn round(value: &Value, args: &[Value]) -> FilterResult {
    let Value::Number(n) = value else {
        return Ok(value.clone());
    };
    let decimals = number_arg(args, 0, "decimals")?.unwrap_or(0.0);

    let factor = 10f64.powi(decimals as i32);
    Ok(Value::Number((n * factor).round() / factor))
}

// =========================================================================
// String helpers
// =========================================================================

/// Strip surrounding whitespace
///
/// Usage: {{ title | trim }}
pub fn trim(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::String(s) => Value::from(s.trim()),
        other => other.clone(),
    })
}

/// Uppercase the first character, lowercase the rest
///
/// Usage: {{ status | capitalize }}
pub fn capitalize(value: &Value, _args: &[Value]) -> FilterResult {
    let Value::String(s) = value else {
        return Ok(value.clone());
    };

    let mut chars = s.chars();
    let result = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    Ok(Value::from(result))
}

/// Replace every occurrence of a substring
///
/// Usage: {{ url | replace("https://", "") }}
pub fn replace(value: &Value, args: &[Value]) -> FilterResult {
    let from = string_arg(args, 0).ok_or(FilterError::MissingArgument { arg: "from" })?;
    let to = string_arg(args, 1).unwrap_or_default();

    Ok(match value {
        Value::String(s) if !from.is_empty() => Value::from(s.replace(&from, &to)),
        other => other.clone(),
    })
}

/// Widest indentation `indent` accepts
const MAX_INDENT: f64 = 1024.0;

/// Indent every non-empty line (default 2 spaces, at most 1024)
///
/// Usage: {{ details | indent(4) }}
pub fn indent(value: &Value, args: &[Value]) -> FilterResult {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let width = number_arg(args, 0, "width")?.unwrap_or(2.0);
    if width > MAX_INDENT {
        return Err(FilterError::failed(format!(
            "indent width {} exceeds the maximum of {}",
            width, MAX_INDENT
        )));
    }
    let prefix = " ".repeat(width.max(0.0) as usize);

    let text = value.to_output_string();
    let indented: Vec<String> = text
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect();
    Ok(Value::from(indented.join("\n")))
}

/// Keys of a map, in insertion order
///
/// Usage: {{ categories | keys | join }}
pub fn keys(value: &Value, _args: &[Value]) -> FilterResult {
    match value {
        Value::Map(map) => Ok(Value::List(map.keys().map(|k| Value::from(k.as_str())).collect())),
        other => Err(FilterError::failed(format!(
            "cannot get keys from {} value",
            other.kind()
        ))),
    }
}

/// Reverse a list or a string
///
/// Usage: {{ history | reverse | first }}
pub fn reverse(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::List(items) => Value::List(items.iter().rev().cloned().collect()),
        Value::String(s) => Value::from(s.chars().rev().collect::<String>()),
        other => other.clone(),
    })
}
