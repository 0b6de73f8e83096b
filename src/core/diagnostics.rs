// src/core/diagnostics.rs

use crate::core::{environment, installer};
use crate::models::now_unix;
use std::fs;
use std::path::Path;

/// Issues found by `doctor`, bucketed by severity.
#[derive(Debug, Default)]
pub struct Diagnosis {
    pub critical: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Diagnosis {
    pub fn is_healthy(&self) -> bool {
        self.critical.is_empty() && self.warnings.is_empty() && self.suggestions.is_empty()
    }

    fn merge(&mut self, other: Self) {
        self.critical.extend(other.critical);
        self.warnings.extend(other.warnings);
        self.suggestions.extend(other.suggestions);
    }
}

/// Thresholds above which an environment earns a housekeeping suggestion.
const LARGE_ENV_MB: f64 = 500.0;
const STALE_DAYS: u64 = 30;

/// Examines one environment. Structural problems are critical, installer
/// conflicts are warnings, size and staleness are suggestions.
pub fn diagnose(env_root: &Path) -> Diagnosis {
    let mut diagnosis = Diagnosis::default();
    let name = env_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| env_root.display().to_string());

    if !env_root.exists() {
        diagnosis
            .critical
            .push(format!("{}: Environment directory missing", name));
        return diagnosis;
    }

    let paths = crate::system::platform::current();
    if !paths.python_path(env_root).exists() {
        diagnosis
            .critical
            .push(format!("{}: Python interpreter missing", name));
    }
    if !paths.pip_path(env_root).exists() {
        diagnosis
            .critical
            .push(format!("{}: Pip executable missing", name));
    }

    if let Some(diagnostic) = installer::check_conflicts(env_root) {
        log::debug!("pip check output for {}: {}", name, diagnostic);
        diagnosis
            .warnings
            .push(format!("{}: Dependency conflicts detected", name));
    }

    if let Some(env_info) = environment::info(env_root) {
        if env_info.size_mb > LARGE_ENV_MB {
            diagnosis.suggestions.push(format!(
                "{}: Large environment ({:.1}MB) - consider cleanup",
                name, env_info.size_mb
            ));
        }
        let days_unused = now_unix().saturating_sub(env_info.last_used) / (24 * 60 * 60);
        if days_unused > STALE_DAYS {
            diagnosis.suggestions.push(format!(
                "{}: Unused for {} days - consider removal",
                name, days_unused
            ));
        }
    }

    diagnosis
}

/// Examines every environment under `root_dir`.
pub fn diagnose_all(root_dir: &Path) -> Diagnosis {
    let mut diagnosis = Diagnosis::default();
    for env_info in environment::list_all(root_dir) {
        diagnosis.merge(diagnose(&env_info.path));
    }
    diagnosis
}

/// Attempts to repair an environment in place. Returns whether the fixes
/// were applied; every step degrades to a warning rather than failing.
pub fn auto_fix(env_root: &Path) -> bool {
    log::info!("Auto-fixing environment: {}", env_root.display());

    let (_, issues) = environment::validate(env_root);
    let interpreter_broken = issues
        .iter()
        .any(|issue| issue.contains("interpreter missing") || issue.contains("non-functional"));

    if interpreter_broken {
        log::info!("Recreating corrupted environment...");
        if env_root.exists() {
            if let Err(e) = fs::remove_dir_all(env_root) {
                log::error!("Could not remove corrupted environment: {}", e);
                return false;
            }
        }
        match environment::create(env_root, None) {
            Ok(()) => {
                log::info!("Environment recreated");
                return true;
            }
            Err(e) => {
                log::error!("Auto-fix failed: {}", e);
                return false;
            }
        }
    }

    if let Some(diagnostic) = installer::check_conflicts(env_root) {
        log::info!("Fixing dependency conflicts...");
        log::debug!("Conflict diagnostic: {}", diagnostic);
        let pip = crate::system::platform::current().pip_path(env_root);
        let mut command = std::process::Command::new(&pip);
        command.args(["install", "--upgrade", "--force-reinstall", "pip"]);
        match crate::system::process::run_captured(
            command,
            "pip force-reinstall",
            std::time::Duration::from_secs(crate::constants::INSTALL_TIMEOUT_SECS),
        ) {
            Ok(output) if output.success => log::info!("Dependencies fixed"),
            Ok(_) | Err(_) => log::warn!("Could not auto-fix dependency conflicts"),
        }
    }

    installer::purge_cache(env_root);
    true
}

/// Maps an error's text to short remediation hints by substring matching.
/// Best-effort by design: the mapping is a rendering aid, never load-bearing.
pub fn suggestions_for(error_text: &str) -> Vec<String> {
    let lower = error_text.to_lowercase();
    let mut hints: Vec<String> = Vec::new();

    if lower.contains("permission denied") {
        hints.push(t!("suggest.no_sudo").to_string());
        hints.push(t!("suggest.check_permissions").to_string());
    } else if lower.contains("no matching distribution") || lower.contains("could not find") {
        hints.push(t!("suggest.check_spelling").to_string());
        hints.push(t!("suggest.search_package").to_string());
    } else if lower.contains("version") && (lower.contains("conflict") || lower.contains("requires"))
    {
        hints.push(t!("suggest.version_conflict").to_string());
        hints.push(t!("suggest.try_fix").to_string());
        hints.push(t!("suggest.try_force_update").to_string());
    } else if lower.contains("script file not found") {
        hints.push(t!("suggest.check_script_exists").to_string());
        hints.push(t!("suggest.check_directory").to_string());
    } else if lower.contains("interpreter not found") || lower.contains("interpreter missing") {
        hints.push(t!("suggest.env_corrupted").to_string());
        hints.push(t!("suggest.try_fix").to_string());
        hints.push(t!("suggest.try_reset").to_string());
    }

    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnose_flags_missing_directory_as_critical() {
        let dir = tempfile::TempDir::new().unwrap();
        let diagnosis = diagnose(&dir.path().join("ghost"));
        assert_eq!(diagnosis.critical.len(), 1);
        assert!(diagnosis.critical[0].contains("Environment directory missing"));
    }

    #[test]
    fn test_diagnose_flags_missing_entry_points() {
        let dir = tempfile::TempDir::new().unwrap();
        let env_root = dir.path().join("env");
        std::fs::create_dir_all(&env_root).unwrap();

        let diagnosis = diagnose(&env_root);

        assert!(
            diagnosis
                .critical
                .iter()
                .any(|c| c.contains("interpreter missing"))
        );
        assert!(
            diagnosis
                .critical
                .iter()
                .any(|c| c.contains("Pip executable missing"))
        );
    }

    #[test]
    fn test_suggestions_match_unknown_package_errors() {
        let hints = suggestions_for("ERROR: No matching distribution found for flaskk");
        assert!(!hints.is_empty());
        assert!(hints[0].contains("spelled"));
    }

    #[test]
    fn test_suggestions_match_missing_interpreter() {
        let hints = suggestions_for("Python interpreter not found in virtual environment: x");
        assert!(hints.iter().any(|h| h.contains("corrupted")));
    }

    #[test]
    fn test_no_suggestions_for_unrecognized_errors() {
        assert!(suggestions_for("something completely unrelated").is_empty());
    }
}
