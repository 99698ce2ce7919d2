//! `onto stats` command - Term store, cache and tier overview

use console::style;
use miette::Result;
use serde_json::json;
use std::collections::BTreeMap;

use crate::cli::helpers::open_context;
use crate::cli::output::{print_json, print_yaml};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Ontology;

pub fn run(global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let resolver = ctx.resolver();

    let mut store_by_namespace: BTreeMap<String, usize> = BTreeMap::new();
    for term in resolver.store().terms() {
        *store_by_namespace
            .entry(term.id().namespace().to_string())
            .or_default() += 1;
    }
    let cache = ctx.cache().statistics()?;
    let cache_by_namespace: BTreeMap<_, _> = cache.by_namespace.iter().collect();

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let value = json!({
                "store": {
                    "terms": resolver.store().len(),
                    "by_namespace": store_by_namespace,
                },
                "cache": {
                    "path": ctx.cache().path().map(|p| p.display().to_string()),
                    "terms": cache.total_terms,
                    "remote_terms": cache.remote_terms,
                    "expired_terms": cache.expired_terms,
                    "searches": cache.total_searches,
                    "relations": cache.total_relations,
                    "by_namespace": cache_by_namespace,
                    "size_bytes": cache.db_size_bytes,
                    "ttl_days": cache.ttl_days,
                },
                "remote": {
                    "enabled": resolver.remote_enabled(),
                    "url": ctx.config().remote_url,
                },
            });
            if global.format == OutputFormat::Json {
                print_json(&value)?;
            } else {
                print_yaml(&value)?;
            }
        }
        _ => {
            println!("{}", style("Term Store").bold());
            println!("{}", style("─".repeat(40)).dim());
            println!("  Terms:           {}", style(resolver.store().len()).cyan());
            for (namespace, count) in &store_by_namespace {
                println!(
                    "    {:<8} {:>5}  {}",
                    namespace,
                    count,
                    style(Ontology::from_namespace(namespace).title()).dim()
                );
            }

            println!();
            println!("{}", style("Cache").bold());
            println!("{}", style("─".repeat(40)).dim());
            if let Some(path) = ctx.cache().path() {
                println!("  Location:        {}", path.display());
            }
            println!("  Terms:           {}", style(cache.total_terms).cyan());
            println!("  From remote:     {}", cache.remote_terms);
            println!("  Expired:         {}", style(cache.expired_terms).yellow());
            println!("  Searches:        {}", cache.total_searches);
            println!("  Relations:       {}", cache.total_relations);
            println!("  TTL:             {} days", cache.ttl_days);
            println!(
                "  Database size:   {} KB",
                style(cache.db_size_bytes / 1024).cyan()
            );
            for (namespace, count) in &cache_by_namespace {
                println!("    {:<8} {}", namespace, count);
            }

            println!();
            println!("{}", style("Remote").bold());
            println!("{}", style("─".repeat(40)).dim());
            if resolver.remote_enabled() {
                println!("  {} {}", style("✓").green(), ctx.config().remote_url);
            } else {
                println!("  {} offline", style("✗").red());
            }
        }
    }

    Ok(())
}
