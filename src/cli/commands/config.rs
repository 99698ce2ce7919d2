//! `onto config` command - Configuration inspection
//!
//! Values are layered: defaults, the global user config, an explicit
//! `--config` file, then `ONTO_*` environment variables.

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::load_config;
use crate::cli::output::print_json;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Show paths to configuration and cache files
    Path,
}

pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Show => run_show(global),
        ConfigCommands::Path => run_path(global),
    }
}

fn run_show(global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    match global.format {
        OutputFormat::Json => print_json(&config)?,
        _ => print!("{}", config.to_yaml()),
    }
    Ok(())
}

fn run_path(global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;

    match Config::global_config_path() {
        Some(path) => {
            let marker = if path.exists() {
                style("✓").green()
            } else {
                style("-").dim()
            };
            println!("{} Global:   {}", marker, path.display());
        }
        None => println!("{} Global:   (no config directory)", style("-").dim()),
    }
    if let Some(path) = &global.config {
        println!("{} Explicit: {}", style("✓").green(), path.display());
    }
    println!("{} Cache:    {}", style("→").blue(), config.cache_file().display());

    Ok(())
}
