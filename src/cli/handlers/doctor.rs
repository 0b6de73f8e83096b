use crate::{
    CancellationToken,
    cli::{args::DoctorArgs, handlers::commons},
    core::diagnostics,
};
use anyhow::Result;
use clap::Parser;
use colored::*;

/// Diagnoses one environment, or every environment under the current
/// directory, and prints the findings bucketed by severity.
pub fn handle(args: Vec<String>, _token: &CancellationToken) -> Result<()> {
    let doctor_args = DoctorArgs::try_parse_from(&args)?;

    let diagnosis = match &doctor_args.env {
        Some(raw) => diagnostics::diagnose(&commons::expand_path(raw)?),
        None => diagnostics::diagnose_all(&std::env::current_dir()?),
    };

    println!("{}", t!("doctor.info.header").bold());
    println!("{}", "=".repeat(50).dimmed());

    if !diagnosis.critical.is_empty() {
        println!("{}", t!("doctor.info.critical").red().bold());
        for issue in &diagnosis.critical {
            println!("   • {}", issue);
        }
    }
    if !diagnosis.warnings.is_empty() {
        println!("\n{}", t!("doctor.info.warnings").yellow().bold());
        for warning in &diagnosis.warnings {
            println!("   • {}", warning);
        }
    }
    if !diagnosis.suggestions.is_empty() {
        println!("\n{}", t!("doctor.info.suggestions").cyan().bold());
        for suggestion in &diagnosis.suggestions {
            println!("   • {}", suggestion);
        }
    }

    if diagnosis.is_healthy() {
        println!("{}", t!("doctor.info.healthy").green());
    }
    Ok(())
}
