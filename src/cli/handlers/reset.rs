use crate::{
    CancellationToken,
    cli::{args::ResetArgs, handlers::commons},
    core::environment,
};
use anyhow::Result;
use clap::Parser;
use colored::*;

/// Deletes an environment after confirmation.
pub fn handle(args: Vec<String>, _token: &CancellationToken) -> Result<()> {
    let reset_args = ResetArgs::try_parse_from(&args)?;
    let env_path = commons::expand_path(&reset_args.env)?;

    if !reset_args.yes {
        let prompt = format!(t!("reset.prompt.confirm"), path = env_path.display());
        if !commons::confirm(&prompt, false)? {
            println!("{}", t!("common.info.operation_cancelled"));
            return Ok(());
        }
    }

    environment::reset(&env_path)?;
    println!(
        "{}",
        format!(t!("reset.info.done"), path = env_path.display()).green()
    );
    Ok(())
}
