use crate::{
    CancellationToken,
    cli::{args::EnvArg, handlers::commons},
    system::shell,
};
use anyhow::Result;
use clap::Parser;
use colored::*;

/// Opens an interactive shell with the environment activated.
pub fn handle(args: Vec<String>, _token: &CancellationToken) -> Result<()> {
    let env_arg = EnvArg::try_parse_from(&args)?;
    let env_path = commons::expand_path(&env_arg.env)?;

    println!(
        "{}",
        format!(t!("shell.info.launching"), path = env_path.display()).cyan()
    );
    println!("{}", t!("shell.info.exit_hint").dimmed());

    let code = shell::launch_activated_shell(&env_path)?;
    log::debug!("Shell session ended with code {}", code);
    Ok(())
}
