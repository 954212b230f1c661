//! Filters command - list the filters available to templates

use console::style;
use gabarit_engine::Engine;

use crate::error::Result;

pub fn run() -> Result<()> {
    let engine = Engine::new();
    let names = engine.filter_names();

    println!("{} ({})", style("Available filters").bold(), names.len());
    for name in names {
        println!("  {}", name);
    }

    Ok(())
}
