// src/core/installer.rs

//! # Installer Orchestration
//!
//! Issues install/upgrade/uninstall operations against an environment's own
//! installer. Package-level failures are collected, never thrown one by one;
//! small batches run sequentially in request order, larger ones fan out over
//! a fixed-size worker pool. After every batch the lock record is rebuilt
//! from `pip freeze` (what actually got installed, not what was requested)
//! so future reconciliation diffs against ground truth.

use crate::constants::{
    INSTALL_TIMEOUT_SECS, INSTALL_WORKERS, LOCK_REPLAY_TIMEOUT_SECS, PIP_CHECK_TIMEOUT_SECS,
    SEQUENTIAL_INSTALL_MAX,
};
use crate::core::{environment, fingerprint, reconcile};
use crate::models::{Configuration, LockEntry, LockRecord, ManifestKind, now_unix};
use crate::system::{platform, process};
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

lazy_static! {
    // One `name==version` pair per `pip freeze` line. Editable and URL
    // entries (`pkg @ file://...`) carry no pin and are skipped.
    static ref FREEZE_LINE_RE: Regex =
        Regex::new(r"^\s*([A-Za-z0-9._-]+)==(\S+)\s*$").unwrap();
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Pip not found in virtual environment: {path}")]
    PipMissing { path: String },
    #[error("Failed to install dependencies: {}", failed.join(", "))]
    PackagesFailed { failed: Vec<String> },
    #[error("Failed to install package '{specifier}': {detail}")]
    PackageFailed { specifier: String, detail: String },
    #[error("Failed to install from requirements file '{path}': {detail}")]
    RequirementsFileFailed { path: String, detail: String },
    #[error(transparent)]
    Env(#[from] environment::EnvError),
    #[error(transparent)]
    Process(#[from] process::ProcessError),
}

type InstallResult<T> = Result<T, InstallError>;

/// Brings an environment's installed packages in line with `config`.
///
/// When the reconciliation heuristic reports nothing to do and no force flag
/// is set, this performs zero install operations. Otherwise it upgrades the
/// installer, replays the lock record where possible, installs the changed
/// (or all) specifiers, then regenerates the lock record and stores the new
/// fingerprint. Runtime-dependency failures abort the pass with every failed
/// specifier named; dev-dependency failures only warn.
pub fn sync_dependencies(
    env_root: &Path,
    config: &Configuration,
    force_update: bool,
) -> InstallResult<()> {
    let (needs_update, changed) = reconcile::needs_dependency_update(env_root, config);

    if !force_update && !needs_update {
        log::info!("Dependencies are up to date, skipping installation");
        return Ok(());
    }

    let pip = platform::current().pip_path(env_root);
    if !pip.exists() {
        return Err(InstallError::PipMissing {
            path: pip.display().to_string(),
        });
    }

    if force_update {
        log::info!("Force updating all dependencies...");
    } else {
        log::info!("Updating {} changed dependencies...", changed.len());
    }

    upgrade_installer(env_root);

    // A usable lock record narrows the work to the changed specifiers;
    // without one we install the full declared list.
    let deps_to_install: Vec<String> = if !force_update && install_from_lock(env_root) {
        changed.into_iter().collect()
    } else {
        config.dependencies.clone()
    };

    if config.kind == ManifestKind::Structured {
        if let Some(req_file) = &config.requirements_file {
            if req_file.exists() {
                log::info!("Installing from requirements file: {}", req_file.display());
                let mut command = Command::new(&pip);
                command.arg("install").arg("-r").arg(req_file);
                let output = process::run_captured(
                    command,
                    "pip install -r",
                    Duration::from_secs(LOCK_REPLAY_TIMEOUT_SECS),
                )?;
                if !output.success {
                    return Err(InstallError::RequirementsFileFailed {
                        path: req_file.display().to_string(),
                        detail: output.combined(),
                    });
                }
            }
        }
    }

    if !deps_to_install.is_empty() {
        log::info!("Installing {} dependencies...", deps_to_install.len());
        let failed = install_all(env_root, &deps_to_install);
        if !failed.is_empty() {
            return Err(InstallError::PackagesFailed { failed });
        }
    }

    if !config.dev_dependencies.is_empty() {
        log::info!(
            "Installing {} dev dependencies...",
            config.dev_dependencies.len()
        );
        let failed_dev = install_all(env_root, &config.dev_dependencies);
        if !failed_dev.is_empty() {
            log::warn!(
                "Failed to install dev dependencies: {}",
                failed_dev.join(", ")
            );
        }
    }

    if let Err(e) = generate_lock(env_root, config) {
        log::warn!("Failed to generate lock file: {}", e);
    }
    environment::update_config_hash(
        env_root,
        &fingerprint::fingerprint(config),
        config.python_version.as_deref(),
    )?;

    log::info!("Dependencies installation/update completed");
    Ok(())
}

/// Installs every specifier, collecting the ones that failed.
///
/// Never raises for an individual package: partial failure is the normal
/// case, and the caller decides how to escalate. Batches of up to
/// [`SEQUENTIAL_INSTALL_MAX`] run in request order; larger ones fan out over
/// [`INSTALL_WORKERS`] workers with no cross-package ordering, but the call
/// does not return until every dispatched install has completed.
pub fn install_all(env_root: &Path, specifiers: &[String]) -> Vec<String> {
    let pip = platform::current().pip_path(env_root);

    if specifiers.len() <= SEQUENTIAL_INSTALL_MAX {
        return specifiers
            .iter()
            .filter(|specifier| !install_one(&pip, specifier.as_str()))
            .cloned()
            .collect();
    }

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(INSTALL_WORKERS)
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            log::warn!("Worker pool unavailable ({}); installing sequentially", e);
            return specifiers
                .iter()
                .filter(|specifier| !install_one(&pip, specifier.as_str()))
                .cloned()
                .collect();
        }
    };

    pool.install(|| {
        specifiers
            .par_iter()
            .filter(|specifier| !install_one(&pip, specifier.as_str()))
            .cloned()
            .collect()
    })
}

/// Adds a single package to an existing environment, then refreshes the lock
/// record and metadata timestamps.
pub fn install_package(env_root: &Path, package: &str) -> InstallResult<()> {
    let pip = require_pip(env_root)?;
    let mut command = Command::new(&pip);
    command.arg("install").arg(package);
    let output = process::run_captured(
        command,
        "pip install",
        Duration::from_secs(INSTALL_TIMEOUT_SECS),
    )?;
    if !output.success {
        return Err(InstallError::PackageFailed {
            specifier: package.to_string(),
            detail: output.combined(),
        });
    }
    refresh_records(env_root);
    Ok(())
}

/// Removes a single package from an environment.
pub fn uninstall_package(env_root: &Path, package: &str) -> InstallResult<()> {
    let pip = require_pip(env_root)?;
    let mut command = Command::new(&pip);
    command.arg("uninstall").arg(package).arg("-y");
    let output = process::run_captured(
        command,
        "pip uninstall",
        Duration::from_secs(INSTALL_TIMEOUT_SECS),
    )?;
    if !output.success {
        return Err(InstallError::PackageFailed {
            specifier: package.to_string(),
            detail: output.combined(),
        });
    }
    refresh_records(env_root);
    Ok(())
}

/// Regenerates the lock record from the installer's authoritative view of
/// what is installed (`pip freeze`), not from what was requested.
pub fn generate_lock(env_root: &Path, config: &Configuration) -> InstallResult<()> {
    let pip = require_pip(env_root)?;
    let mut command = Command::new(&pip);
    command.arg("freeze");
    let output = process::run_captured(
        command,
        "pip freeze",
        Duration::from_secs(PIP_CHECK_TIMEOUT_SECS),
    )?;
    if !output.success {
        return Err(InstallError::PackageFailed {
            specifier: "freeze".to_string(),
            detail: output.combined(),
        });
    }

    let entries = parse_freeze_output(&output.stdout);
    log::info!("Lock file generated with {} packages", entries.len());
    let lock = LockRecord {
        generated_at: now_unix(),
        python_version: config.python_version.clone(),
        entries,
    };
    environment::write_lock(env_root, &lock)?;
    Ok(())
}

/// Replays the stored lock record as one batch install. Returns whether the
/// replay succeeded; any failure just disables the fast path.
pub fn install_from_lock(env_root: &Path) -> bool {
    let Ok(lock) = environment::read_lock(env_root) else {
        return false;
    };
    if lock.entries.is_empty() {
        return true;
    }
    let pip = platform::current().pip_path(env_root);
    if !pip.exists() {
        return false;
    }

    log::info!("Installing from lock file...");
    let mut command = Command::new(&pip);
    command.arg("install");
    for entry in &lock.entries {
        command.arg(format!("{}=={}", entry.name, entry.version));
    }
    match process::run_captured(
        command,
        "pip install (lock)",
        Duration::from_secs(LOCK_REPLAY_TIMEOUT_SECS),
    ) {
        Ok(output) if output.success => {
            log::info!("Installed {} packages from lock file", lock.entries.len());
            true
        }
        Ok(output) => {
            log::warn!("Lock file installation failed: {}", output.stderr);
            false
        }
        Err(e) => {
            log::warn!("Failed to install from lock file: {}", e);
            false
        }
    }
}

/// Runs the installer's dependency-conflict check. Returns the diagnostic
/// text on conflict, `None` when everything is consistent or the check
/// itself could not run (degraded to a warning, never an error).
pub fn check_conflicts(env_root: &Path) -> Option<String> {
    let pip = platform::current().pip_path(env_root);
    if !pip.exists() {
        return None;
    }
    let mut command = Command::new(&pip);
    command.arg("check");
    match process::run_captured(
        command,
        "pip check",
        Duration::from_secs(PIP_CHECK_TIMEOUT_SECS),
    ) {
        Ok(output) if output.success => None,
        Ok(output) => Some(output.combined()),
        Err(e) => {
            log::warn!("Could not check dependencies: {}", e);
            None
        }
    }
}

/// Purges the installer's download cache. Best-effort.
pub fn purge_cache(env_root: &Path) {
    let pip = platform::current().pip_path(env_root);
    if !pip.exists() {
        return;
    }
    let mut command = Command::new(&pip);
    command.arg("cache").arg("purge");
    match process::run_captured(
        command,
        "pip cache purge",
        Duration::from_secs(PIP_CHECK_TIMEOUT_SECS),
    ) {
        Ok(output) if output.success => log::info!("Installer cache purged"),
        Ok(_) | Err(_) => log::debug!("Installer cache purge did not complete"),
    }
}

// --- Helpers ---

fn install_one(pip: &Path, specifier: &str) -> bool {
    let mut command = Command::new(pip);
    command.arg("install").arg("--upgrade").arg(specifier);
    match process::run_captured(
        command,
        &format!("pip install {}", specifier),
        Duration::from_secs(INSTALL_TIMEOUT_SECS),
    ) {
        Ok(output) if output.success => true,
        Ok(output) => {
            log::debug!("Install of '{}' failed: {}", specifier, output.stderr);
            false
        }
        Err(e) => {
            log::debug!("Install of '{}' errored: {}", specifier, e);
            false
        }
    }
}

/// Upgrades the installer itself before a batch. Failure here degrades to a
/// warning: an out-of-date pip can still install packages.
fn upgrade_installer(env_root: &Path) {
    let pip = platform::current().pip_path(env_root);
    let mut command = Command::new(&pip);
    command.args(["install", "--upgrade", "pip"]);
    match process::run_captured(
        command,
        "pip self-upgrade",
        Duration::from_secs(INSTALL_TIMEOUT_SECS),
    ) {
        Ok(output) if output.success => {}
        Ok(output) => log::warn!("Installer self-upgrade failed: {}", output.stderr),
        Err(e) => log::warn!("Installer self-upgrade errored: {}", e),
    }
}

fn require_pip(env_root: &Path) -> InstallResult<std::path::PathBuf> {
    let pip = platform::current().pip_path(env_root);
    if !pip.exists() {
        return Err(InstallError::PipMissing {
            path: pip.display().to_string(),
        });
    }
    Ok(pip)
}

fn parse_freeze_output(output: &str) -> Vec<LockEntry> {
    output
        .lines()
        .filter_map(|line| FREEZE_LINE_RE.captures(line))
        .filter_map(|captures| {
            Some(LockEntry {
                name: captures.get(1)?.as_str().to_string(),
                version: captures.get(2)?.as_str().to_string(),
            })
        })
        .collect()
}

/// After a successful single-package change: lock from freeze, timestamps.
fn refresh_records(env_root: &Path) {
    let placeholder = Configuration {
        kind: ManifestKind::FlatList,
        manifest_path: Default::default(),
        python_version: environment::read_metadata(env_root)
            .ok()
            .and_then(|m| m.python_version),
        dependencies: Vec::new(),
        dev_dependencies: Vec::new(),
        env_vars: Default::default(),
        requirements_file: None,
        profiles: Default::default(),
        active_profile: "default".to_string(),
        hot_reload: false,
        template: None,
    };
    if let Err(e) = generate_lock(env_root, &placeholder) {
        log::warn!("Failed to regenerate lock file: {}", e);
    }
    if let Ok(mut metadata) = environment::read_metadata(env_root) {
        let now = now_unix();
        metadata.last_updated = Some(now);
        metadata.last_used = now;
        if let Err(e) = environment::write_metadata(env_root, &metadata) {
            log::warn!("Failed to update environment metadata: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_freeze_output_keeps_pinned_lines_only() {
        let output = "flask==3.0.0\nrequests==2.31.0\n-e git+https://example.com/pkg\npkg @ file:///tmp/pkg\n";
        let entries = parse_freeze_output(output);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "flask");
        assert_eq!(entries[0].version, "3.0.0");
        assert_eq!(entries[1].name, "requests");
    }

    #[test]
    fn test_parse_freeze_output_on_empty_input() {
        assert!(parse_freeze_output("").is_empty());
    }

    #[cfg(unix)]
    mod with_fake_pip {
        use super::*;
        use crate::models::EnvMetadata;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use tempfile::TempDir;

        /// An environment whose `pip` is a shell script: installs of any
        /// specifier containing `bad` fail, `freeze` prints a fixed pin list.
        fn env_with_fake_pip(dir: &TempDir) -> PathBuf {
            let env_root = dir.path().join("env");
            let paths = platform::current();
            fs::create_dir_all(paths.bin_dir(&env_root)).unwrap();
            fs::write(paths.python_path(&env_root), "").unwrap();
            let pip = paths.pip_path(&env_root);
            fs::write(
                &pip,
                concat!(
                    "#!/bin/sh\n",
                    "if [ \"$1\" = freeze ]; then\n",
                    "  echo 'flask==3.0.0'\n",
                    "  echo 'requests==2.31.0'\n",
                    "  exit 0\n",
                    "fi\n",
                    "for arg in \"$@\"; do\n",
                    "  case \"$arg\" in\n",
                    "    *bad*) echo \"ERROR: No matching distribution found for $arg\" >&2; exit 1;;\n",
                    "  esac\n",
                    "done\n",
                    "exit 0\n",
                ),
            )
            .unwrap();
            fs::set_permissions(&pip, fs::Permissions::from_mode(0o755)).unwrap();
            environment::write_metadata(&env_root, &EnvMetadata::new(None)).unwrap();
            env_root
        }

        #[test]
        fn test_install_all_returns_exactly_the_failed_set() {
            let dir = TempDir::new().unwrap();
            let env_root = env_with_fake_pip(&dir);
            let specifiers = vec!["good_pkg".to_string(), "bad_pkg".to_string()];

            let failed = install_all(&env_root, &specifiers);

            assert_eq!(failed, vec!["bad_pkg"]);
        }

        #[test]
        fn test_install_all_concurrent_path_collects_all_failures() {
            let dir = TempDir::new().unwrap();
            let env_root = env_with_fake_pip(&dir);
            let specifiers: Vec<String> = ["one", "two", "bad_a", "three", "bad_b"]
                .iter()
                .map(|s| s.to_string())
                .collect();

            let mut failed = install_all(&env_root, &specifiers);
            failed.sort();

            assert_eq!(failed, vec!["bad_a", "bad_b"]);
        }

        #[test]
        fn test_generate_lock_records_freeze_ground_truth() {
            let dir = TempDir::new().unwrap();
            let env_root = env_with_fake_pip(&dir);
            let config = Configuration {
                kind: ManifestKind::FlatList,
                manifest_path: Default::default(),
                python_version: Some("3.11".to_string()),
                dependencies: vec!["flask".to_string()],
                dev_dependencies: Vec::new(),
                env_vars: Default::default(),
                requirements_file: None,
                profiles: Default::default(),
                active_profile: "default".to_string(),
                hot_reload: false,
                template: None,
            };

            generate_lock(&env_root, &config).unwrap();
            let lock = environment::read_lock(&env_root).unwrap();

            // Two entries from freeze, even though one dependency was declared.
            assert_eq!(lock.entries.len(), 2);
            assert_eq!(lock.python_version, Some("3.11".to_string()));
        }

        #[test]
        fn test_sync_dependencies_noop_when_fingerprint_matches() {
            let dir = TempDir::new().unwrap();
            let env_root = env_with_fake_pip(&dir);
            let config = Configuration {
                kind: ManifestKind::FlatList,
                manifest_path: Default::default(),
                python_version: None,
                dependencies: vec!["flask".to_string()],
                dev_dependencies: Vec::new(),
                env_vars: Default::default(),
                requirements_file: None,
                profiles: Default::default(),
                active_profile: "default".to_string(),
                hot_reload: false,
                template: None,
            };

            // First pass installs and stores the fingerprint.
            sync_dependencies(&env_root, &config, false).unwrap();
            let lock_before = environment::read_lock(&env_root).unwrap();

            // Second pass with the same config must perform zero installs;
            // replace pip with one that fails everything to prove it.
            let pip = platform::current().pip_path(&env_root);
            fs::write(&pip, "#!/bin/sh\nexit 1\n").unwrap();
            fs::set_permissions(&pip, fs::Permissions::from_mode(0o755)).unwrap();
            sync_dependencies(&env_root, &config, false).unwrap();

            let lock_after = environment::read_lock(&env_root).unwrap();
            assert_eq!(lock_before.entries, lock_after.entries);
        }

        #[test]
        fn test_sync_dependencies_escalates_runtime_failures() {
            let dir = TempDir::new().unwrap();
            let env_root = env_with_fake_pip(&dir);
            let config = Configuration {
                kind: ManifestKind::FlatList,
                manifest_path: Default::default(),
                python_version: None,
                dependencies: vec!["good_pkg".to_string(), "bad_pkg".to_string()],
                dev_dependencies: Vec::new(),
                env_vars: Default::default(),
                requirements_file: None,
                profiles: Default::default(),
                active_profile: "default".to_string(),
                hot_reload: false,
                template: None,
            };

            let result = sync_dependencies(&env_root, &config, true);

            match result {
                Err(InstallError::PackagesFailed { failed }) => {
                    assert_eq!(failed, vec!["bad_pkg"]);
                }
                other => panic!("expected PackagesFailed, got {:?}", other),
            }
        }

        #[test]
        fn test_sync_dependencies_downgrades_dev_failures() {
            let dir = TempDir::new().unwrap();
            let env_root = env_with_fake_pip(&dir);
            let config = Configuration {
                kind: ManifestKind::Structured,
                manifest_path: Default::default(),
                python_version: None,
                dependencies: vec!["good_pkg".to_string()],
                dev_dependencies: vec!["bad_dev_pkg".to_string()],
                env_vars: Default::default(),
                requirements_file: None,
                profiles: Default::default(),
                active_profile: "default".to_string(),
                hot_reload: false,
                template: None,
            };

            // Dev-dependency failure must not fail the pass.
            sync_dependencies(&env_root, &config, true).unwrap();
            assert!(environment::stored_config_hash(&env_root).is_some());
        }

        #[test]
        fn test_check_conflicts_reports_diagnostic_text() {
            let dir = TempDir::new().unwrap();
            let env_root = env_with_fake_pip(&dir);
            let pip = platform::current().pip_path(&env_root);
            fs::write(&pip, "#!/bin/sh\necho 'pkg 1.0 requires other'; exit 1\n").unwrap();
            fs::set_permissions(&pip, fs::Permissions::from_mode(0o755)).unwrap();

            let diagnostic = check_conflicts(&env_root).unwrap();

            assert!(diagnostic.contains("requires other"));
        }
    }
}
