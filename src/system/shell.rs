// src/system/shell.rs

use crate::system::platform;
use std::env;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Environment not found: {path}")]
    EnvNotFound { path: String },
    #[error("Python interpreter not found: {path}")]
    InterpreterMissing { path: String },
    #[error("Failed to launch shell '{shell}': {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },
}

/// Launches an interactive shell with the environment activated: the
/// environment's bin directory is prepended to `PATH` and `VIRTUAL_ENV` is
/// set, which is all activation actually does. Blocks until the user exits
/// and returns the shell's exit code.
pub fn launch_activated_shell(env_root: &Path) -> Result<i32, ShellError> {
    if !env_root.exists() {
        return Err(ShellError::EnvNotFound {
            path: env_root.display().to_string(),
        });
    }
    let paths = platform::current();
    let python = paths.python_path(env_root);
    if !python.exists() {
        return Err(ShellError::InterpreterMissing {
            path: python.display().to_string(),
        });
    }

    let shell = default_shell();
    let bin_dir = paths.bin_dir(env_root);
    let path_var = match env::var_os("PATH") {
        Some(existing) => {
            let mut joined = std::ffi::OsString::from(bin_dir.as_os_str());
            joined.push(if cfg!(target_os = "windows") { ";" } else { ":" });
            joined.push(existing);
            joined
        }
        None => bin_dir.clone().into_os_string(),
    };

    log::info!("Launching shell '{}' in {}", shell, env_root.display());
    let status = Command::new(&shell)
        .env("VIRTUAL_ENV", env_root)
        .env("PATH", path_var)
        // A stray PYTHONHOME would override the activated interpreter.
        .env_remove("PYTHONHOME")
        .status()
        .map_err(|e| ShellError::Spawn {
            shell: shell.clone(),
            source: e,
        })?;

    Ok(status.code().unwrap_or(0))
}

fn default_shell() -> String {
    if cfg!(target_os = "windows") {
        env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_requires_existing_environment() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = launch_activated_shell(&dir.path().join("ghost"));
        assert!(matches!(result, Err(ShellError::EnvNotFound { .. })));
    }

    #[test]
    fn test_shell_requires_interpreter() {
        let dir = tempfile::TempDir::new().unwrap();
        let env_root = dir.path().join("env");
        std::fs::create_dir_all(&env_root).unwrap();
        let result = launch_activated_shell(&env_root);
        assert!(matches!(result, Err(ShellError::InterpreterMissing { .. })));
    }
}
