use crate::{
    CancellationToken,
    cli::{args::PackageArgs, handlers::commons},
    core::installer,
};
use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

/// Adds one package to an existing environment.
pub fn handle(args: Vec<String>, _token: &CancellationToken) -> Result<()> {
    let pkg_args = PackageArgs::try_parse_from(&args)?;
    let env_path = commons::expand_path(&pkg_args.env)?;

    if !env_path.exists() {
        println!("{}", t!("install.hint.create_first").yellow());
        return Err(anyhow!(
            t!("error.env_not_found"),
            path = env_path.display()
        ));
    }

    println!(
        "{}",
        format!(t!("install.info.installing"), package = pkg_args.package).cyan()
    );
    installer::install_package(&env_path, &pkg_args.package)?;
    println!(
        "{}",
        format!(t!("install.info.installed"), package = pkg_args.package).green()
    );
    Ok(())
}
