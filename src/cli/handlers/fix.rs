use crate::{
    CancellationToken,
    cli::{args::EnvArg, handlers::commons},
    core::diagnostics,
};
use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

/// Attempts an in-place repair of a corrupted environment.
pub fn handle(args: Vec<String>, _token: &CancellationToken) -> Result<()> {
    let env_arg = EnvArg::try_parse_from(&args)?;
    let env_path = commons::expand_path(&env_arg.env)?;

    println!(
        "{}",
        format!(t!("fix.info.fixing"), path = env_path.display()).cyan()
    );
    if diagnostics::auto_fix(&env_path) {
        println!("{}", t!("fix.info.done").green());
        Ok(())
    } else {
        Err(anyhow!(t!("fix.error.failed"), path = env_path.display()))
    }
}
