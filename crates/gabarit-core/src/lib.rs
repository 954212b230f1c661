//! Gabarit Core - value model and context handling for report templates
//!
//! This crate provides the foundational types used by the template engine:
//! - `Value`: the dynamic value model with its truthiness rule
//! - `Scope`: layered path lookup over a context and loop frames
//! - `Context`: loading, deep merging and `--set` overrides for render data

pub mod context;
pub mod error;
pub mod scope;
pub mod value;

pub use context::{Context, parse_set_values};
pub use error::{CoreError, Result};
pub use scope::{Scope, resolve};
pub use value::{Map, Value};
