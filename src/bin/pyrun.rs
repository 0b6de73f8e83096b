// src/bin/pyrun.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use pyrun::{
    CancellationToken,
    cli::{Cli, handlers},
    core::diagnostics,
    system::process, t,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// --- Command Definition and Registry ---

/// Defines a system command, its aliases, and its synchronous handler function.
/// The handler signature is kept consistent across all commands for simplicity in the registry.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &CancellationToken) -> Result<()>,
}

/// The single source of truth for all system commands.
/// To add a new command, simply add a new entry to this static array.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "cleanup",
        aliases: &[],
        handler: handlers::cleanup::handle,
    },
    CommandDefinition {
        name: "clone",
        aliases: &[],
        handler: handlers::clone_env::handle,
    },
    CommandDefinition {
        name: "doctor",
        aliases: &["health"],
        handler: handlers::doctor::handle,
    },
    CommandDefinition {
        name: "envs",
        aliases: &["ls"],
        handler: handlers::envs::handle,
    },
    CommandDefinition {
        name: "fix",
        aliases: &["repair"],
        handler: handlers::fix::handle,
    },
    CommandDefinition {
        name: "install",
        aliases: &["add"],
        handler: handlers::install::handle,
    },
    CommandDefinition {
        name: "remove",
        aliases: &["rm"],
        handler: handlers::remove::handle,
    },
    CommandDefinition {
        name: "reset",
        aliases: &[],
        handler: handlers::reset::handle,
    },
    CommandDefinition {
        name: "run",
        aliases: &[],
        handler: handlers::run::handle,
    },
    CommandDefinition {
        name: "shell",
        aliases: &[],
        handler: handlers::shell::handle,
    },
    CommandDefinition {
        name: "validate",
        aliases: &[],
        handler: handlers::validate::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// The main entry point of the `pyrun` application.
/// It sets up logging, parses arguments, dispatches to the correct handler,
/// and performs centralized error handling.
fn main() {
    let cancellation_token: CancellationToken = Arc::new(AtomicBool::new(false));
    let token_for_handler = cancellation_token.clone();
    ctrlc::set_handler(move || {
        token_for_handler.store(true, Ordering::SeqCst);
    })
    .expect("Failed to set Ctrl-C handler");

    env_logger::init();

    if let Err(e) = run_cli(Cli::parse(), cancellation_token) {
        // --- Centralized Error Handling ---
        if let Some(process_err) = e.downcast_ref::<process::ProcessError>() {
            match process_err {
                // A user interruption exits with the shell-conventional code,
                // silently.
                process::ProcessError::Interrupted => std::process::exit(130),
                // A foreground script's own exit code becomes ours.
                process::ProcessError::NonZeroExit { code } => std::process::exit(*code),
                _ => {}
            }
        }

        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        let suggestions = diagnostics::suggestions_for(&format!("{:#}", e));
        if !suggestions.is_empty() {
            eprintln!("{}", t!("error.suggestions_header").yellow());
            for suggestion in suggestions {
                eprintln!("   • {}", suggestion);
            }
        }
        std::process::exit(1);
    }
}

/// The main application dispatcher.
///
/// The first argument is either a registered command or a script path; the
/// latter is a shortcut for `run` (`pyrun app.py` ≡ `pyrun run app.py`).
fn run_cli(cli: Cli, cancellation_token: CancellationToken) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let mut args = cli.args.into_iter();
    let Some(first) = args.next() else {
        println!("{}", t!("cli.info.no_args"));
        return Ok(());
    };
    let remaining: Vec<String> = args.collect();

    if let Some(command) = find_command(&first) {
        return (command.handler)(remaining, &cancellation_token);
    }

    // Not a known command: treat it as a script name when it plausibly is
    // one, so the common case stays short.
    if first.ends_with(".py") || Path::new(&first).is_file() {
        let mut run_args = vec![first];
        run_args.extend(remaining);
        return handlers::run::handle(run_args, &cancellation_token);
    }

    Err(anyhow::anyhow!(t!("error.unknown_command"), command = first))
}
