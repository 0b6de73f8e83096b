// src/cli/handlers/commons.rs

// This module contains shared functions used by multiple handlers.

use anyhow::{Result, anyhow};
use dialoguer::{Confirm, theme::ColorfulTheme};
use std::path::{Path, PathBuf};

/// Expands `~` and environment variables in a user-supplied path, and
/// normalizes away UNC noise on Windows.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| anyhow!(t!("error.path_expansion"), path = raw, error = e))?;
    let path = PathBuf::from(expanded.into_owned());
    Ok(dunce::simplified(&path).to_path_buf())
}

/// The conventional environment directory for a script: `<stem>_env` next to
/// the current working directory.
pub fn default_env_path(script: &Path) -> PathBuf {
    let stem = script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "script".to_string());
    PathBuf::from(format!("{}_env", stem))
}

/// Splits a bracketed, shell-quoted extra-arguments string into argv parts.
/// `"[-p 8000 --debug]"` becomes `["-p", "8000", "--debug"]`.
pub fn parse_extra_args(raw: &str) -> Result<Vec<String>> {
    let trimmed = raw.trim();
    let inner = if trimmed.starts_with('[') && trimmed.ends_with(']') {
        trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(trimmed)
    } else {
        trimmed
    };
    shlex::split(inner).ok_or_else(|| anyhow!(t!("error.invalid_extra_args"), args = raw))
}

/// Asks the user to confirm a destructive operation.
pub fn confirm(prompt: &str, default: bool) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extra_args_strips_brackets() {
        let args = parse_extra_args("[-p 8000 --debug]").unwrap();
        assert_eq!(args, vec!["-p", "8000", "--debug"]);
    }

    #[test]
    fn test_parse_extra_args_without_brackets() {
        let args = parse_extra_args("--verbose").unwrap();
        assert_eq!(args, vec!["--verbose"]);
    }

    #[test]
    fn test_parse_extra_args_respects_quoting() {
        let args = parse_extra_args("[--name \"two words\"]").unwrap();
        assert_eq!(args, vec!["--name", "two words"]);
    }

    #[test]
    fn test_parse_extra_args_rejects_unbalanced_quotes() {
        assert!(parse_extra_args("[--name \"broken]").is_err());
    }

    #[test]
    fn test_default_env_path_uses_script_stem() {
        assert_eq!(
            default_env_path(Path::new("jobs/app.py")),
            PathBuf::from("app_env")
        );
    }
}
