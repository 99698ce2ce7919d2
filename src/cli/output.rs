//! Output formatting for terms and term lists

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::{escape_tsv, truncate_str};
use crate::cli::OutputFormat;
use crate::core::Term;

/// Print one term; `auto` shows the full YAML record
pub fn print_term(term: &Term, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Auto | OutputFormat::Yaml => print_yaml(term)?,
        OutputFormat::Json => print_json(term)?,
        OutputFormat::Tsv => {
            println!("id\tname\tontology\tparents");
            println!("{}", tsv_row(term));
        }
        OutputFormat::Id => println!("{}", term.id()),
    }
    Ok(())
}

/// Print a list of terms; `auto` shows an aligned table with a summary
pub fn print_terms(terms: &[Term], format: OutputFormat, what: &str) -> Result<()> {
    match format {
        OutputFormat::Auto => {
            if terms.is_empty() {
                println!("No {} found.", what);
                return Ok(());
            }
            println!(
                "{:<18} {:<40} {:<8}",
                style("ID").bold(),
                style("NAME").bold(),
                style("ONTOLOGY").bold()
            );
            println!("{}", "-".repeat(68));
            for term in terms {
                println!(
                    "{:<18} {:<40} {:<8}",
                    style(term.id()).cyan(),
                    truncate_str(term.name(), 38),
                    term.ontology().as_str()
                );
            }
            println!();
            println!("{} {}", style(terms.len()).cyan(), what);
        }
        OutputFormat::Tsv => {
            println!("id\tname\tontology\tparents");
            for term in terms {
                println!("{}", tsv_row(term));
            }
        }
        OutputFormat::Json => print_json(&terms)?,
        OutputFormat::Yaml => print_yaml(&terms)?,
        OutputFormat::Id => {
            for term in terms {
                println!("{}", term.id());
            }
        }
    }
    Ok(())
}

/// Absence is reported, never treated as a failure
pub fn print_not_found(raw: &str) {
    println!("{} {}", style("Not found:").yellow(), raw);
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

pub fn print_yaml<T: Serialize>(value: &T) -> Result<()> {
    print!("{}", serde_yml::to_string(value).into_diagnostic()?);
    Ok(())
}

fn tsv_row(term: &Term) -> String {
    let parents: Vec<String> = term.parents().iter().map(ToString::to_string).collect();
    format!(
        "{}\t{}\t{}\t{}",
        term.id(),
        escape_tsv(term.name()),
        term.ontology().as_str(),
        parents.join(",")
    )
}
