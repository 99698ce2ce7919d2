//! `onto search` command - Search terms by name or synonym
//!
//! The local store answers first; the cache or remote service only fills
//! the remainder up to `--limit`.

use miette::Result;

use crate::cli::helpers::open_context;
use crate::cli::output::print_terms;
use crate::cli::GlobalOpts;

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Search text (or an exact term ID)
    pub query: String,

    /// Restrict to one ontology namespace (e.g. UBERON, CL)
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

pub fn run(args: SearchArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;

    let results = ctx
        .resolver()
        .search(&args.query, args.namespace.as_deref(), args.limit);
    print_terms(&results, global.format, "matching term(s)")?;

    ctx.shutdown()?;
    Ok(())
}
