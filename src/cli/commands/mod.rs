//! CLI command implementations

pub mod cache;
pub mod completions;
pub mod config;
pub mod resolve;
pub mod search;
pub mod similarity;
pub mod stats;
pub mod traverse;
