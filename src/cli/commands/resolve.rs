//! `onto resolve` command - Resolve term IDs through all tiers

use console::style;
use miette::Result;
use serde_json::{Map, Value};

use crate::cli::output::{print_json, print_not_found, print_term, print_terms, print_yaml};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{Context, Term};

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    /// Term IDs (e.g. UBERON:0002481 CL:0000062)
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Print resolver counters to stderr when done
    #[arg(long)]
    pub stats: bool,
}

pub fn run(args: ResolveArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = crate::cli::helpers::open_context(global)?;

    if let [id] = args.ids.as_slice() {
        match ctx.resolver().resolve(id) {
            Some(term) => print_term(&term, global.format)?,
            None => print_not_found(id),
        }
    } else {
        let mut resolved = ctx.resolver().batch_resolve(args.ids.as_slice());
        // Report in input order; the resolver answers each distinct ID once
        let mut ordered: Vec<(String, Option<Term>)> = Vec::new();
        for id in &args.ids {
            if let Some(result) = resolved.remove(id) {
                ordered.push((id.clone(), result));
            }
        }
        print_batch(&ordered, global.format)?;
    }

    if args.stats {
        print_stats(&ctx, global.quiet);
    }
    ctx.shutdown()?;
    Ok(())
}

fn print_batch(results: &[(String, Option<Term>)], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let mut map = Map::new();
            for (id, term) in results {
                let value = match term {
                    Some(term) => serde_json::to_value(term).unwrap_or(Value::Null),
                    None => Value::Null,
                };
                map.insert(id.clone(), value);
            }
            if format == OutputFormat::Json {
                print_json(&map)?;
            } else {
                print_yaml(&map)?;
            }
        }
        OutputFormat::Id => {
            for term in results.iter().filter_map(|(_, t)| t.as_ref()) {
                println!("{}", term.id());
            }
        }
        OutputFormat::Auto | OutputFormat::Tsv => {
            let found: Vec<Term> = results.iter().filter_map(|(_, t)| t.clone()).collect();
            print_terms(&found, format, "term(s) resolved")?;
            for (id, term) in results {
                if term.is_none() {
                    print_not_found(id);
                }
            }
        }
    }
    Ok(())
}

fn print_stats(ctx: &Context, quiet: bool) {
    if quiet {
        return;
    }
    let stats = ctx.stats();
    eprintln!("{}", style("Resolver").bold());
    eprintln!("  Store hits:    {}", stats.store_hits);
    eprintln!("  Cache hits:    {}", stats.cache_hits);
    eprintln!("  Remote hits:   {}", stats.remote_hits);
    eprintln!("  Misses:        {}", stats.misses);
    eprintln!("  Local rate:    {:.1}%", stats.local_hit_rate() * 100.0);
    eprintln!("  Remote calls:  {}", stats.remote_calls);
    for (class, count) in &stats.remote_errors {
        if *count > 0 {
            eprintln!("  {:<14} {}", format!("{}:", class), style(count).red());
        }
    }
}
