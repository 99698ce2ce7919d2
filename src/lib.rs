//! ontoresolve: tiered biomedical ontology term resolution
//!
//! Resolves ontology term IDs through a curated in-memory store, a
//! persistent SQLite cache and a remote lookup service, and scores
//! semantic similarity between terms.

pub mod cli;
pub mod core;
