//! Vessel command-line entry point.

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use vessel::cli::{self, Cli, Commands};
use vessel::config::VesselConfig;
use vessel::log;

fn main() {
    if let Err(e) = run() {
        log!("error"; "{}", e);
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Before anything blocks, so Ctrl+C always exits.
    vessel::core::setup_shutdown_handler()?;

    let cli = Cli::parse();
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {}
    }

    let config = VesselConfig::load(&cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match &cli.command {
        Commands::Build { .. } => runtime.block_on(cli::build::build(&config)).map(|_| ()),
        Commands::Dev { .. } => cli::serve::serve(config, runtime.handle().clone()),
        Commands::Routes { style } => cli::routes::print_routes(&config, *style),
    }
}
