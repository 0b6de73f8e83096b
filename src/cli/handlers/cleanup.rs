use crate::{
    CancellationToken,
    cli::{args::CleanupArgs, handlers::commons},
    constants::DEFAULT_CLEANUP_DAYS,
    core::environment,
};
use anyhow::Result;
use clap::Parser;
use colored::*;

/// Removes environments that have not been used for longer than the given
/// threshold.
pub fn handle(args: Vec<String>, _token: &CancellationToken) -> Result<()> {
    let cleanup_args = CleanupArgs::try_parse_from(&args)?;
    let days = cleanup_args.days.unwrap_or(DEFAULT_CLEANUP_DAYS);
    let root = match &cleanup_args.root {
        Some(raw) => commons::expand_path(raw)?,
        None => std::env::current_dir()?,
    };

    if !cleanup_args.yes {
        let prompt = format!(t!("cleanup.prompt.confirm"), days = days);
        if !commons::confirm(&prompt, false)? {
            println!("{}", t!("common.info.operation_cancelled"));
            return Ok(());
        }
    }

    let cleaned = environment::cleanup(&root, days);
    if cleaned.is_empty() {
        println!("{}", format!(t!("cleanup.info.nothing"), days = days));
    } else {
        println!(
            "{}",
            format!(
                t!("cleanup.info.done"),
                count = cleaned.len(),
                names = cleaned.join(", ")
            )
            .green()
        );
    }
    Ok(())
}
