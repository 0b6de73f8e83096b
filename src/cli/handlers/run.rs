use crate::{
    CancellationToken,
    cli::{args::RunArgs, handlers::commons},
    core::{environment, installer, manifest},
    system::{
        process::{self, RunOutcome},
        watcher,
    },
};
use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

///
/// Main entry point for the 'run' command: resolve the manifest, bring the
/// environment in line with it, then hand the script to the supervisor.
///
pub fn handle(args: Vec<String>, token: &CancellationToken) -> Result<()> {
    let run_args = RunArgs::try_parse_from(&args)?;
    let script_path = commons::expand_path(&run_args.script)?;

    // 1. Locate the manifest: explicit flag, auto-detection, or a quick
    //    requirements.txt generated from packages listed on the command line.
    let manifest_path = match &run_args.config {
        Some(raw) => commons::expand_path(raw)?,
        None => match manifest::auto_detect(&script_path) {
            Some(path) => path,
            None if !run_args.packages.is_empty() => {
                let path = manifest::create_quick_manifest(&script_path, &run_args.packages)?;
                println!(
                    "{}",
                    format!(
                        t!("run.info.quick_manifest"),
                        path = path.display(),
                        count = run_args.packages.len()
                    )
                    .green()
                );
                path
            }
            None => {
                println!("{}", t!("run.error.no_manifest").red());
                println!("{}", t!("run.hint.no_manifest").yellow());
                return Err(anyhow!(t!("run.error.no_manifest")));
            }
        },
    };

    // 2. Resolve the configuration. A profile given on the command line wins
    //    over the manifest's `active_profile`.
    let config = manifest::resolve_with_profile(&manifest_path, run_args.profile.as_deref())?;

    let env_path = match &run_args.env {
        Some(raw) => commons::expand_path(raw)?,
        None => commons::default_env_path(&script_path),
    };

    // 3. Seed from a template environment, but only on first creation; an
    //    existing environment is never overwritten by its template.
    if let Some(template) = &config.template {
        if !env_path.exists() && template.exists() {
            println!(
                "{}",
                format!(t!("run.info.using_template"), template = template.display()).cyan()
            );
            environment::clone(template, &env_path)?;
        }
    }

    // 4. Create if needed, then reconcile dependencies.
    environment::create(&env_path, config.python_version.as_deref())?;
    installer::sync_dependencies(&env_path, &config, run_args.force_update)?;

    environment::touch_script_usage(&env_path, &script_path)?;

    let extra_args = match &run_args.extra {
        Some(raw) => commons::parse_extra_args(raw)?,
        None => Vec::new(),
    };

    // 5. Hand over to the supervisor, in watch mode when asked for by the
    //    flag or the manifest's hot_reload key.
    if run_args.watch || config.hot_reload {
        watcher::watch_and_run(
            &script_path,
            &env_path,
            &manifest_path,
            &extra_args,
            &config.env_vars,
            token,
        )?;
        return Ok(());
    }

    match process::run_script(
        &script_path,
        &env_path,
        &extra_args,
        run_args.background,
        &config.env_vars,
        token,
    )? {
        RunOutcome::Exited(0) => Ok(()),
        // Propagated so the binary can exit with the child's own code.
        RunOutcome::Exited(code) => Err(process::ProcessError::NonZeroExit { code }.into()),
        RunOutcome::Detached(pid) => {
            println!(
                "{}",
                format!(t!("run.info.background_pid"), pid = pid).green()
            );
            println!(
                "{}",
                format!(
                    t!("run.info.pid_file"),
                    path = process::pid_file_path(&env_path).display()
                )
                .dimmed()
            );
            Ok(())
        }
    }
}
