//! `onto ancestors` / `onto descendants` commands - Bounded hierarchy walks

use clap::ValueEnum;
use miette::Result;

use crate::cli::helpers::{open_context, parse_term_id};
use crate::cli::output::{print_not_found, print_terms};
use crate::cli::GlobalOpts;
use crate::core::RelationKind;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Relation {
    /// Is-a parents
    #[default]
    IsA,
    /// Part-of wholes
    PartOf,
}

impl From<Relation> for RelationKind {
    fn from(relation: Relation) -> Self {
        match relation {
            Relation::IsA => RelationKind::IsA,
            Relation::PartOf => RelationKind::PartOf,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct AncestorsArgs {
    /// Term ID
    pub id: String,

    /// Maximum hops to follow (default: max_depth from config)
    #[arg(long, short = 'd')]
    pub depth: Option<usize>,

    /// Relation to follow
    #[arg(long, short = 'r', value_enum, default_value = "is-a")]
    pub relation: Relation,
}

#[derive(clap::Args, Debug)]
pub struct DescendantsArgs {
    /// Term ID
    pub id: String,

    /// Maximum hops to follow (default: max_depth from config)
    #[arg(long, short = 'd')]
    pub depth: Option<usize>,
}

pub fn run_ancestors(args: AncestorsArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let depth = args.depth.unwrap_or(ctx.config().max_depth);

    match parse_term_id(&args.id).filter(|id| ctx.resolver().resolve_id(id).is_some()) {
        Some(id) => {
            let ancestors = ctx
                .traversal()
                .ancestors_via(&id, depth, args.relation.into());
            print_terms(&ancestors, global.format, "ancestor(s)")?;
        }
        None => print_not_found(&args.id),
    }

    ctx.shutdown()?;
    Ok(())
}

pub fn run_descendants(args: DescendantsArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let depth = args.depth.unwrap_or(ctx.config().max_depth);

    match parse_term_id(&args.id).filter(|id| ctx.resolver().resolve_id(id).is_some()) {
        Some(id) => {
            let descendants = ctx.traversal().descendants(&id, depth);
            print_terms(&descendants, global.format, "descendant(s)")?;
        }
        None => print_not_found(&args.id),
    }

    ctx.shutdown()?;
    Ok(())
}
