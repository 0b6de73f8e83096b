use crate::{
    CancellationToken,
    cli::{args::EnvsArgs, handlers::commons},
    core::environment,
    models::now_unix,
};
use anyhow::Result;
use clap::Parser;
use colored::*;

/// Lists every managed environment under the scan root, most recently used
/// first.
pub fn handle(args: Vec<String>, _token: &CancellationToken) -> Result<()> {
    let envs_args = EnvsArgs::try_parse_from(&args)?;
    let root = match &envs_args.root {
        Some(raw) => commons::expand_path(raw)?,
        None => std::env::current_dir()?,
    };

    let environments = environment::list_all(&root);
    if environments.is_empty() {
        println!("{}", t!("envs.info.none_found"));
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{:<24} {:>10} {:>6} {:>9}  {}",
            "Name", "Size (MB)", "Deps", "Scripts", "Last Used"
        )
        .bold()
    );
    println!("{}", "-".repeat(64).dimmed());
    for env in &environments {
        println!(
            "{:<24} {:>10.1} {:>6} {:>9}  {}",
            env.name,
            env.size_mb,
            env.dependency_count,
            env.scripts.len(),
            format_age(env.last_used)
        );
    }
    Ok(())
}

/// Renders a last-used timestamp as a coarse age.
fn format_age(last_used: u64) -> String {
    let days = now_unix().saturating_sub(last_used) / (24 * 60 * 60);
    match days {
        0 => t!("envs.age.today").to_string(),
        1 => t!("envs.age.yesterday").to_string(),
        n => format!(t!("envs.age.days_ago"), days = n),
    }
}
