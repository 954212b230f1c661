//! Render command - compile a template file against context files

use console::style;
use gabarit_core::{Context, parse_set_values};
use gabarit_engine::Engine;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};

pub fn run(
    template_path: &Path,
    context_files: &[PathBuf],
    set_values: &[String],
    raw: bool,
    output: Option<&Path>,
    show_context: bool,
) -> Result<()> {
    let template =
        fs::read_to_string(template_path).map_err(|e| CliError::io_at(template_path, e))?;
    tracing::debug!("loaded template {} ({} bytes)", template_path.display(), template.len());

    let context = load_context(context_files, set_values)?;

    // Show merged context if requested
    if show_context {
        println!("{}", style("# Context").cyan().bold());
        println!("---");
        let yaml = serde_yaml::to_string(context.as_map()).map_err(|e| CliError::Context {
            message: format!("failed to serialize context: {}", e),
            help: None,
        })?;
        println!("{}", yaml.trim_end());
        println!("---");
        println!();
    }

    let engine = Engine::builder().normalize(!raw).build()?;
    let rendered = engine.compile(&template, &context.into_value());

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| CliError::io_at(parent, e))?;
            }
            fs::write(path, &rendered).map_err(|e| CliError::io_at(path, e))?;
            println!("{} {}", style("wrote").green(), path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

/// Merge context files in order, then apply `--set` overrides
fn load_context(context_files: &[PathBuf], set_values: &[String]) -> Result<Context> {
    let mut context = Context::new();

    for path in context_files {
        let file_context = Context::from_file(path).map_err(|e| CliError::loading(path, e))?;
        context.merge(&file_context);
        tracing::debug!("merged context from {}", path.display());
    }

    if !set_values.is_empty() {
        let overrides = parse_set_values(set_values)?;
        context.merge(&overrides);
        tracing::debug!("applied {} --set values", set_values.len());
    }

    Ok(context)
}
