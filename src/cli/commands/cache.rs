//! `onto cache` command - Manage the persistent term cache
//!
//! The cache is a local SQLite database that stores:
//! - Terms fetched from the remote lookup service
//! - Search results keyed by query and namespace
//! - Relationship lists (is-a, part-of) per term
//!
//! Rows older than the TTL are ignored on read and removed by `clear`.

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::open_context;
use crate::cli::GlobalOpts;

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Status,

    /// Remove expired entries (or everything fetched remotely with --all)
    Clear {
        /// Also remove unexpired remote terms, searches and relationships
        #[arg(long)]
        all: bool,
    },

    /// Reclaim unused space in the database file
    Compact,
}

pub fn run(cmd: CacheCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CacheCommands::Status => run_status(global),
        CacheCommands::Clear { all } => run_clear(all, global),
        CacheCommands::Compact => run_compact(global),
    }
}

fn run_status(global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let stats = ctx.cache().statistics()?;

    println!("{}", style("Cache Status").bold());
    println!("{}", style("─".repeat(40)).dim());
    if let Some(path) = ctx.cache().path() {
        println!("  Location:        {}", path.display());
    }
    println!("  Total terms:     {}", style(stats.total_terms).cyan());
    println!("  Expired terms:   {}", style(stats.expired_terms).yellow());
    println!("  Searches:        {}", style(stats.total_searches).cyan());
    println!("  Relations:       {}", style(stats.total_relations).cyan());
    println!("  TTL:             {} days", stats.ttl_days);
    println!(
        "  Database size:   {} KB",
        style(stats.db_size_bytes / 1024).cyan()
    );

    if !stats.by_namespace.is_empty() {
        println!();
        println!("  {}", style("By Namespace:").bold());
        let mut namespaces: Vec<_> = stats.by_namespace.iter().collect();
        namespaces.sort_by_key(|(k, _)| *k);
        for (namespace, count) in namespaces {
            println!("    {:<8} {}", namespace, count);
        }
    }

    Ok(())
}

fn run_clear(all: bool, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;

    if !global.quiet {
        let what = if all { "all remote entries" } else { "expired entries" };
        println!("{} Clearing {}...", style("→").blue(), what);
    }
    let cleared = ctx.cache().clear(all)?;

    println!(
        "{} Removed {} entr{}",
        style("✓").green(),
        style(cleared.total()).cyan(),
        if cleared.total() == 1 { "y" } else { "ies" }
    );
    if !global.quiet && cleared.total() > 0 {
        println!("  Terms:     {}", cleared.terms_removed);
        println!("  Searches:  {}", cleared.searches_removed);
        println!("  Relations: {}", cleared.relations_removed);
    }

    Ok(())
}

fn run_compact(global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    ctx.cache().compact()?;
    if !global.quiet {
        println!("{} Cache compacted", style("✓").green());
    }
    Ok(())
}
