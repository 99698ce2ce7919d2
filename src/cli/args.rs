//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    cache::CacheCommands,
    completions::CompletionsArgs,
    config::ConfigCommands,
    resolve::ResolveArgs,
    search::SearchArgs,
    similarity::{LcaArgs, SimilarArgs, SimilarityArgs},
    traverse::{AncestorsArgs, DescendantsArgs},
};

#[derive(Parser)]
#[command(name = "onto")]
#[command(author, version, about = "Biomedical ontology term resolver")]
#[command(
    long_about = "Resolve ontology term IDs through a curated local store, a persistent cache and a remote lookup service, and compute semantic similarity between terms."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging on stderr)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Never contact the remote lookup service
    #[arg(long, global = true)]
    pub offline: bool,

    /// Extra config file layered over the global config
    #[arg(long, global = true, env = "ONTO_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve one or more term IDs
    Resolve(ResolveArgs),

    /// Search terms by name or synonym
    Search(SearchArgs),

    /// List ancestors of a term (breadth-first, nearest first)
    Ancestors(AncestorsArgs),

    /// List descendants of a term known to the local store
    Descendants(DescendantsArgs),

    /// Lowest common ancestor of two terms
    Lca(LcaArgs),

    /// Semantic similarity between two terms
    Similarity(SimilarityArgs),

    /// Rank candidate terms by similarity to a term
    Similar(SimilarArgs),

    /// Show term store and cache statistics
    Stats,

    /// Manage the persistent term cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Show configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for one term, tsv for lists)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// Just IDs, one per line
    Id,
}
