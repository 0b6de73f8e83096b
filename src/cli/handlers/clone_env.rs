use crate::{
    CancellationToken,
    cli::{args::CloneArgs, handlers::commons},
    core::environment,
};
use anyhow::Result;
use clap::Parser;
use colored::*;

/// Copies an environment, stamping clone provenance into the copy.
pub fn handle(args: Vec<String>, _token: &CancellationToken) -> Result<()> {
    let clone_args = CloneArgs::try_parse_from(&args)?;
    let source = commons::expand_path(&clone_args.source)?;
    let target = commons::expand_path(&clone_args.target)?;

    environment::clone(&source, &target)?;
    println!(
        "{}",
        format!(
            t!("clone.info.done"),
            source = source.display(),
            target = target.display()
        )
        .green()
    );
    Ok(())
}
