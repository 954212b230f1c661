//! CLI commands

pub mod filters;
pub mod render;
