//! Gabarit CLI - render report templates from JSON or YAML data

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod error;
mod exit_codes;

#[derive(Parser)]
#[command(name = "gabarit")]
#[command(author = "Gabarit Contributors")]
#[command(version)]
#[command(about = "Render report templates from JSON or YAML data", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template file
    Render {
        /// Template file
        template: PathBuf,

        /// Context file(s) to merge (JSON or YAML)
        #[arg(short = 'c', long = "context")]
        context: Vec<PathBuf>,

        /// Set context values on command line (key=value)
        #[arg(long = "set")]
        set: Vec<String>,

        /// Skip output normalization
        #[arg(long)]
        raw: bool,

        /// Write the result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show the merged context before rendering
        #[arg(long)]
        show_context: bool,
    },

    /// List available filters
    Filters,
}

fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Render {
            template,
            context,
            set,
            raw,
            output,
            show_context,
        } => commands::render::run(&template, &context, &set, raw, output.as_deref(), show_context),

        Commands::Filters => commands::filters::run(),
    };

    let code = match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}
