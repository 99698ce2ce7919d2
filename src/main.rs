use clap::Parser;
use miette::Result;
use ontoresolve::cli::{Cli, Commands, GlobalOpts};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    // Install miette's fancy error handler for beautiful diagnostics
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(&global);

    use ontoresolve::cli::commands;
    match cli.command {
        Commands::Resolve(args) => commands::resolve::run(args, &global),
        Commands::Search(args) => commands::search::run(args, &global),
        Commands::Ancestors(args) => commands::traverse::run_ancestors(args, &global),
        Commands::Descendants(args) => commands::traverse::run_descendants(args, &global),
        Commands::Lca(args) => commands::similarity::run_lca(args, &global),
        Commands::Similarity(args) => commands::similarity::run_similarity(args, &global),
        Commands::Similar(args) => commands::similarity::run_similar(args, &global),
        Commands::Stats => commands::stats::run(&global),
        Commands::Cache(cmd) => commands::cache::run(cmd, &global),
        Commands::Config(cmd) => commands::config::run(cmd, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}

/// Logs go to stderr; `ONTO_LOG` overrides the level unless `--verbose` is set
fn init_logging(global: &GlobalOpts) {
    let filter = if global.verbose {
        EnvFilter::new("debug")
    } else {
        let fallback = if global.quiet { "error" } else { "warn" };
        EnvFilter::try_from_env("ONTO_LOG").unwrap_or_else(|_| EnvFilter::new(fallback))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
