//! Gabarit Engine - report templates with filters
//!
//! This crate provides a small template engine with:
//! - `{{ value | filter(args) }}` interpolation with chained filters
//! - `{% if %}` / `{% elif %}` / `{% else %}` conditionals
//! - `{% for item in list %}` loops with `loop.index` style metadata
//! - Report formatting filters (score, metric, size, list, prioritize)
//! - Lenient rendering: problems are logged, never raised mid-render

pub mod directives;
pub mod engine;
pub mod error;
pub mod expr;
pub mod filters;
pub mod normalize;
pub mod registry;
pub mod suggestions;

pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, FilterError, Result};
pub use normalize::normalize;
pub use registry::{FilterFn, FilterOutcome, FilterRegistry};
pub use suggestions::BUILTIN_FILTERS;
