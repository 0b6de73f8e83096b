use crate::{
    CancellationToken,
    cli::{args::EnvArg, handlers::commons},
    core::environment,
};
use anyhow::Result;
use clap::Parser;
use colored::*;

/// Checks an environment's integrity and prints its summary.
pub fn handle(args: Vec<String>, _token: &CancellationToken) -> Result<()> {
    let env_arg = EnvArg::try_parse_from(&args)?;
    let env_path = commons::expand_path(&env_arg.env)?;

    let (valid, issues) = environment::validate(&env_path);
    if !valid {
        println!(
            "{}",
            format!(t!("validate.error.header"), path = env_path.display()).red()
        );
        for issue in &issues {
            println!("   • {}", issue);
        }
        return Err(environment::EnvError::Corrupted {
            path: env_path.display().to_string(),
            issues: issues.join(", "),
        }
        .into());
    }

    println!(
        "{}",
        format!(t!("validate.info.valid"), path = env_path.display()).green()
    );
    if let Some(info) = environment::info(&env_path) {
        println!("   {}", format!(t!("validate.info.size"), mb = info.size_mb));
        println!(
            "   {}",
            format!(t!("validate.info.deps"), count = info.dependency_count)
        );
        let scripts = if info.scripts.is_empty() {
            t!("validate.info.no_scripts").to_string()
        } else {
            info.scripts.join(", ")
        };
        println!(
            "   {}",
            format!(
                t!("validate.info.scripts"),
                count = info.scripts.len(),
                names = scripts
            )
        );
    }
    Ok(())
}
