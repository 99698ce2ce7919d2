//! `onto lca`, `onto similarity` and `onto similar` commands

use console::style;
use miette::{IntoDiagnostic, Result};
use serde_json::json;

use crate::cli::helpers::{escape_tsv, open_context, parse_term_id, truncate_str};
use crate::cli::output::{print_json, print_not_found, print_yaml};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{Context, SimilarityMethod, TermId};

#[derive(clap::Args, Debug)]
pub struct LcaArgs {
    /// First term ID
    pub a: String,

    /// Second term ID
    pub b: String,
}

#[derive(clap::Args, Debug)]
pub struct SimilarityArgs {
    /// First term ID
    pub a: String,

    /// Second term ID
    pub b: String,

    /// Method: wu_palmer, resnik or lin
    #[arg(long, short = 'm', default_value = "wu_palmer")]
    pub method: String,

    /// Report all three methods
    #[arg(long, conflicts_with = "method")]
    pub all: bool,
}

#[derive(clap::Args, Debug)]
pub struct SimilarArgs {
    /// Reference term ID
    pub id: String,

    /// Candidate term IDs
    #[arg(required = true)]
    pub candidates: Vec<String>,

    /// Method: wu_palmer, resnik or lin
    #[arg(long, short = 'm', default_value = "wu_palmer")]
    pub method: String,

    /// Number of results to keep
    #[arg(long, short = 't', default_value = "10")]
    pub top: usize,
}

pub fn run_lca(args: LcaArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;

    let Some((a, b)) = ids_or_report(&ctx, &args.a, &args.b) else {
        return ctx.shutdown().map(|_| ());
    };

    let engine = ctx.similarity();
    let lca = engine.lowest_common_ancestor(&a, &b);
    let term = lca.as_ref().and_then(|id| ctx.resolver().resolve_id(id));

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let value = json!({
                "a": a.to_string(),
                "b": b.to_string(),
                "lca": lca.as_ref().map(ToString::to_string),
                "name": term.as_ref().map(|t| t.name().to_string()),
                "depth": lca.as_ref().map(|id| engine.depth(id)),
            });
            if global.format == OutputFormat::Json {
                print_json(&value)?;
            } else {
                print_yaml(&value)?;
            }
        }
        OutputFormat::Id => {
            if let Some(id) = &lca {
                println!("{}", id);
            }
        }
        OutputFormat::Tsv => {
            if let Some(id) = &lca {
                let name = term.as_ref().map(|t| t.name()).unwrap_or_default();
                println!("{}\t{}\t{}", id, escape_tsv(name), engine.depth(id));
            }
        }
        OutputFormat::Auto => match (&lca, &term) {
            (Some(id), Some(term)) => println!(
                "{} {} ({}), depth {}",
                style("LCA:").bold(),
                style(id).cyan(),
                term.name(),
                engine.depth(id)
            ),
            (Some(id), None) => println!("{} {}", style("LCA:").bold(), style(id).cyan()),
            (None, _) => println!("No common ancestor for {} and {}", a, b),
        },
    }

    ctx.shutdown()?;
    Ok(())
}

pub fn run_similarity(args: SimilarityArgs, global: &GlobalOpts) -> Result<()> {
    // An unknown method is a usage error, reported before any lookup
    let methods: Vec<SimilarityMethod> = if args.all {
        SimilarityMethod::ALL.to_vec()
    } else {
        vec![args.method.parse().into_diagnostic()?]
    };
    let ctx = open_context(global)?;

    let scores: Vec<(SimilarityMethod, f64)> = match ids_or_report(&ctx, &args.a, &args.b) {
        Some((a, b)) => {
            let engine = ctx.similarity();
            methods
                .iter()
                .map(|m| (*m, engine.similarity(&a, &b, *m)))
                .collect()
        }
        None => Vec::new(),
    };

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let value = json!({
                "a": args.a,
                "b": args.b,
                "scores": scores
                    .iter()
                    .map(|(m, s)| (m.as_str().to_string(), json!(s)))
                    .collect::<serde_json::Map<_, _>>(),
            });
            if global.format == OutputFormat::Json {
                print_json(&value)?;
            } else {
                print_yaml(&value)?;
            }
        }
        OutputFormat::Tsv | OutputFormat::Id => {
            for (method, score) in &scores {
                println!("{}\t{}\t{}\t{:.6}", args.a, args.b, method, score);
            }
        }
        OutputFormat::Auto => {
            for (method, score) in &scores {
                println!("{:<10} {}", method.as_str(), style(format!("{:.4}", score)).cyan());
            }
        }
    }

    ctx.shutdown()?;
    Ok(())
}

pub fn run_similar(args: SimilarArgs, global: &GlobalOpts) -> Result<()> {
    let method: SimilarityMethod = args.method.parse().into_diagnostic()?;
    let ctx = open_context(global)?;

    let Some(id) = parse_term_id(&args.id) else {
        print_not_found(&args.id);
        return ctx.shutdown().map(|_| ());
    };
    let candidates: Vec<TermId> = args
        .candidates
        .iter()
        .filter_map(|raw| {
            let parsed = parse_term_id(raw);
            if parsed.is_none() {
                print_not_found(raw);
            }
            parsed
        })
        .collect();

    let ranked = ctx
        .similarity()
        .find_similar(&id, &candidates, method, args.top);

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let value: Vec<_> = ranked
                .iter()
                .map(|(c, score)| json!({ "id": c.to_string(), "score": score }))
                .collect();
            if global.format == OutputFormat::Json {
                print_json(&value)?;
            } else {
                print_yaml(&value)?;
            }
        }
        OutputFormat::Id => {
            for (candidate, _) in &ranked {
                println!("{}", candidate);
            }
        }
        OutputFormat::Tsv => {
            for (candidate, score) in &ranked {
                println!("{}\t{:.6}", candidate, score);
            }
        }
        OutputFormat::Auto => {
            println!(
                "{:<18} {:<36} {}",
                style("ID").bold(),
                style("NAME").bold(),
                style(method.as_str().to_uppercase()).bold()
            );
            println!("{}", "-".repeat(64));
            for (candidate, score) in &ranked {
                let name = ctx
                    .resolver()
                    .resolve_id(candidate)
                    .map(|t| t.name().to_string())
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "{:<18} {:<36} {:.4}",
                    style(candidate).cyan(),
                    truncate_str(&name, 34),
                    score
                );
            }
        }
    }

    ctx.shutdown()?;
    Ok(())
}

/// Parse both IDs; malformed ones are reported as not found
fn ids_or_report(ctx: &Context, a: &str, b: &str) -> Option<(TermId, TermId)> {
    let parsed = (parse_term_id(a), parse_term_id(b));
    if parsed.0.is_none() {
        print_not_found(a);
    }
    if parsed.1.is_none() {
        print_not_found(b);
    }
    let (Some(a), Some(b)) = parsed else {
        return None;
    };

    // Same-ID pairs score without any lookup
    if a != b {
        for id in [&a, &b] {
            if ctx.resolver().resolve_id(id).is_none() {
                print_not_found(&id.to_string());
            }
        }
    }
    Some((a, b))
}
