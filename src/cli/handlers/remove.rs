use crate::{
    CancellationToken,
    cli::{args::PackageArgs, handlers::commons},
    core::installer,
};
use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

/// Removes one package from an environment.
pub fn handle(args: Vec<String>, _token: &CancellationToken) -> Result<()> {
    let pkg_args = PackageArgs::try_parse_from(&args)?;
    let env_path = commons::expand_path(&pkg_args.env)?;

    if !env_path.exists() {
        return Err(anyhow!(
            t!("error.env_not_found"),
            path = env_path.display()
        ));
    }

    println!(
        "{}",
        format!(t!("remove.info.removing"), package = pkg_args.package).cyan()
    );
    installer::uninstall_package(&env_path, &pkg_args.package)?;
    println!(
        "{}",
        format!(t!("remove.info.removed"), package = pkg_args.package).green()
    );
    Ok(())
}
