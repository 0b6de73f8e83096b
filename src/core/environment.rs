// src/core/environment.rs

//! # Environment Store
//!
//! Filesystem-backed record of one isolated runtime per directory. An
//! environment directory is valid iff it carries a working interpreter entry
//! point, a working installer entry point and a `.pyrun/` metadata record;
//! anything less is corruption, repaired by deletion and recreation.
//!
//! Metadata is read-then-written without locking: one writer per environment
//! at a time is a convention of the tool, not something enforced here.

use crate::constants::{
    INTERPRETER_PROBE_TIMEOUT_SECS, LOCK_FILENAME, METADATA_FILENAME, PYRUN_DIR,
    VENV_CREATE_TIMEOUT_SECS,
};
use crate::models::{EnvMetadata, EnvironmentInfo, LockRecord, now_unix};
use crate::system::{platform, process};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Environment not found: {path}")]
    NotFound { path: String },
    #[error("Target environment already exists: {path}")]
    AlreadyExists { path: String },
    #[error("Environment at '{path}' is corrupted: {issues}")]
    Corrupted { path: String, issues: String },
    #[error("Failed to create virtual environment at '{path}': {detail}")]
    CreationFailed { path: String, detail: String },
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode environment record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Error with temporary file: {0}")]
    TempFile(#[from] tempfile::PersistError),
    #[error(transparent)]
    Process(#[from] process::ProcessError),
}

type EnvResult<T> = Result<T, EnvError>;

// --- Well-known paths ---

pub fn metadata_dir(env_root: &Path) -> PathBuf {
    env_root.join(PYRUN_DIR)
}

pub fn metadata_path(env_root: &Path) -> PathBuf {
    metadata_dir(env_root).join(METADATA_FILENAME)
}

pub fn lock_path(env_root: &Path) -> PathBuf {
    metadata_dir(env_root).join(LOCK_FILENAME)
}

/// True when a directory carries the metadata marker of a managed environment.
pub fn is_environment(path: &Path) -> bool {
    metadata_dir(path).is_dir()
}

// --- Record persistence ---

pub fn read_metadata(env_root: &Path) -> EnvResult<EnvMetadata> {
    let content = fs::read_to_string(metadata_path(env_root))?;
    Ok(serde_json::from_str(&content)?)
}

pub fn write_metadata(env_root: &Path, metadata: &EnvMetadata) -> EnvResult<()> {
    fs::create_dir_all(metadata_dir(env_root))?;
    let content = serde_json::to_string_pretty(metadata)?;
    fs::write(metadata_path(env_root), content)?;
    Ok(())
}

pub fn read_lock(env_root: &Path) -> EnvResult<LockRecord> {
    let content = fs::read_to_string(lock_path(env_root))?;
    Ok(serde_json::from_str(&content)?)
}

/// Writes the lock record atomically (temp file + rename) so a crashed batch
/// can never leave a half-written lock behind.
pub fn write_lock(env_root: &Path, lock: &LockRecord) -> EnvResult<()> {
    let dir = metadata_dir(env_root);
    fs::create_dir_all(&dir)?;
    let temp = tempfile::NamedTempFile::new_in(&dir)?;
    serde_json::to_writer_pretty(temp.as_file(), lock)?;
    temp.persist(lock_path(env_root))?;
    Ok(())
}

// --- Lifecycle ---

/// Creates the environment at `env_root` if needed.
///
/// An existing, valid environment is left untouched. An existing but corrupt
/// one is deleted and recreated. Creation failure is fatal to the caller.
pub fn create(env_root: &Path, python_version: Option<&str>) -> EnvResult<()> {
    if env_root.exists() {
        let (valid, issues) = validate(env_root);
        if valid {
            log::info!(
                "Virtual environment already exists and is valid: {}",
                env_root.display()
            );
            return Ok(());
        }
        log::warn!(
            "Existing environment is corrupted, recreating: {}",
            issues.join(", ")
        );
        fs::remove_dir_all(env_root)?;
    }

    log::info!("Creating virtual environment: {}", env_root.display());
    let mut command = Command::new(platform::current().system_python());
    command.arg("-m").arg("venv").arg(env_root);
    let output = process::run_captured(
        command,
        "python -m venv",
        Duration::from_secs(VENV_CREATE_TIMEOUT_SECS),
    )?;
    if !output.success {
        return Err(EnvError::CreationFailed {
            path: env_root.display().to_string(),
            detail: output.combined(),
        });
    }

    write_metadata(env_root, &EnvMetadata::new(python_version.map(String::from)))?;
    log::info!(
        "Virtual environment created successfully: {}",
        env_root.display()
    );
    Ok(())
}

/// Checks an environment's integrity and returns the accumulated issues.
/// An empty issue list means the environment is valid.
pub fn validate(env_root: &Path) -> (bool, Vec<String>) {
    let mut issues = Vec::new();

    if !env_root.exists() {
        issues.push("Environment directory does not exist".to_string());
        return (false, issues);
    }

    let paths = platform::current();
    let python = paths.python_path(env_root);
    if !python.exists() {
        issues.push("Python interpreter missing".to_string());
    }
    if !paths.pip_path(env_root).exists() {
        issues.push("Pip executable missing".to_string());
    }
    if !metadata_dir(env_root).exists() {
        issues.push("Metadata directory missing".to_string());
    }

    // Only probe an interpreter that is actually there; the missing-file case
    // is already reported above.
    if python.exists() {
        let mut command = Command::new(&python);
        command.args(["-c", "import sys; print(sys.version)"]);
        match process::run_captured(
            command,
            "python version probe",
            Duration::from_secs(INTERPRETER_PROBE_TIMEOUT_SECS),
        ) {
            Ok(output) if output.success => {}
            Ok(_) => issues.push("Python interpreter is corrupted or non-functional".to_string()),
            Err(e) => {
                log::debug!("Interpreter probe failed: {}", e);
                issues.push("Failed to test Python interpreter".to_string());
            }
        }
    }

    if issues.is_empty() {
        log::debug!("Environment validation passed: {}", env_root.display());
        (true, issues)
    } else {
        log::warn!("Environment validation failed: {}", issues.join(", "));
        (false, issues)
    }
}

/// Deletes an environment unconditionally. Missing environments are an error.
pub fn reset(env_root: &Path) -> EnvResult<()> {
    if !env_root.exists() {
        return Err(EnvError::NotFound {
            path: env_root.display().to_string(),
        });
    }
    log::info!("Resetting environment: {}", env_root.display());
    fs::remove_dir_all(env_root)?;
    Ok(())
}

/// Recursively copies `source` to `target` and stamps clone provenance into
/// the copy's metadata. The source must exist; the target must not.
pub fn clone(source: &Path, target: &Path) -> EnvResult<()> {
    if !source.exists() {
        return Err(EnvError::NotFound {
            path: source.display().to_string(),
        });
    }
    if target.exists() {
        return Err(EnvError::AlreadyExists {
            path: target.display().to_string(),
        });
    }

    log::info!(
        "Cloning environment from {} to {}",
        source.display(),
        target.display()
    );
    copy_dir_recursive(source, target)?;

    match read_metadata(target) {
        Ok(mut metadata) => {
            metadata.cloned_from = Some(source.display().to_string());
            metadata.cloned_at = Some(now_unix());
            write_metadata(target, &metadata)?;
        }
        Err(e) => log::debug!("Clone target has no readable metadata to stamp: {}", e),
    }
    Ok(())
}

// --- Inspection ---

/// Reads one environment's summary. Returns `None` (not an error) when the
/// metadata record is absent or unreadable.
pub fn info(env_root: &Path) -> Option<EnvironmentInfo> {
    if !env_root.exists() {
        return None;
    }
    let metadata = read_metadata(env_root).ok()?;

    let dependency_count = read_lock(env_root)
        .map(|lock| lock.entries.len())
        .unwrap_or(0);

    Some(EnvironmentInfo {
        name: env_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| env_root.display().to_string()),
        path: env_root.to_path_buf(),
        created_at: metadata.created_at,
        last_used: metadata.last_used,
        scripts: metadata.scripts,
        size_mb: dir_size_mb(env_root),
        python_version: metadata
            .python_version
            .unwrap_or_else(|| "unknown".to_string()),
        dependency_count,
    })
}

/// Lists every managed environment directly under `root_dir`, most recently
/// used first. Only immediate subdirectories with the metadata marker count.
pub fn list_all(root_dir: &Path) -> Vec<EnvironmentInfo> {
    let mut environments = Vec::new();
    let Ok(entries) = fs::read_dir(root_dir) else {
        return environments;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() && is_environment(&path) {
            if let Some(env_info) = info(&path) {
                environments.push(env_info);
            }
        }
    }
    environments.sort_by(|a, b| b.last_used.cmp(&a.last_used));
    environments
}

/// Removes every environment under `root_dir` whose last-used timestamp is
/// older than `days_threshold` days. Individual removal failures are logged
/// and skipped; the batch never fails as a whole.
pub fn cleanup(root_dir: &Path, days_threshold: u64) -> Vec<String> {
    let threshold = now_unix().saturating_sub(days_threshold * 24 * 60 * 60);
    let mut cleaned = Vec::new();

    for env_info in list_all(root_dir) {
        if env_info.last_used < threshold {
            match fs::remove_dir_all(&env_info.path) {
                Ok(()) => {
                    log::info!("Cleaned up unused environment: {}", env_info.name);
                    cleaned.push(env_info.name);
                }
                Err(e) => log::error!("Failed to cleanup {}: {}", env_info.name, e),
            }
        }
    }
    cleaned
}

// --- Metadata mutation ---

/// Records that a script ran in this environment and refreshes `last_used`.
/// A missing metadata record is tolerated: usage tracking is best-effort.
pub fn touch_script_usage(env_root: &Path, script_path: &Path) -> EnvResult<()> {
    let Ok(mut metadata) = read_metadata(env_root) else {
        return Ok(());
    };

    let script_name = script_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| script_path.display().to_string());
    if !metadata.scripts.contains(&script_name) {
        metadata.scripts.push(script_name);
    }
    metadata.last_used = now_unix();
    write_metadata(env_root, &metadata)
}

/// Stores the fingerprint of the configuration that was just applied.
/// Creates a fresh record if the environment predates this tool's metadata.
pub fn update_config_hash(
    env_root: &Path,
    hash: &str,
    python_version: Option<&str>,
) -> EnvResult<()> {
    let mut metadata = read_metadata(env_root)
        .unwrap_or_else(|_| EnvMetadata::new(python_version.map(String::from)));
    metadata.config_hash = Some(hash.to_string());
    let now = now_unix();
    metadata.last_updated = Some(now);
    metadata.last_used = now;
    write_metadata(env_root, &metadata)
}

/// The stored fingerprint, or `None` when metadata is absent or unreadable.
pub fn stored_config_hash(env_root: &Path) -> Option<String> {
    read_metadata(env_root).ok().and_then(|m| m.config_hash)
}

// --- Helpers ---

fn dir_size_mb(path: &Path) -> f64 {
    let total: u64 = WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum();
    total as f64 / (1024.0 * 1024.0)
}

fn copy_dir_recursive(source: &Path, target: &Path) -> std::io::Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let destination = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LockEntry;
    use tempfile::TempDir;

    /// Lays down a directory that looks like an environment on disk without
    /// invoking any interpreter: metadata record plus empty entry points.
    fn fake_env(root: &Path, name: &str, last_used: u64) -> PathBuf {
        let env_root = root.join(name);
        let paths = platform::current();
        fs::create_dir_all(paths.bin_dir(&env_root)).unwrap();
        fs::write(paths.python_path(&env_root), "").unwrap();
        fs::write(paths.pip_path(&env_root), "").unwrap();
        let mut metadata = EnvMetadata::new(Some("3.11".to_string()));
        metadata.last_used = last_used;
        write_metadata(&env_root, &metadata).unwrap();
        env_root
    }

    #[test]
    fn test_validate_reports_missing_directory() {
        let dir = TempDir::new().unwrap();
        let (valid, issues) = validate(&dir.path().join("ghost"));
        assert!(!valid);
        assert_eq!(issues, vec!["Environment directory does not exist"]);
    }

    #[test]
    fn test_validate_reports_missing_interpreter() {
        let dir = TempDir::new().unwrap();
        let env_root = dir.path().join("env");
        fs::create_dir_all(metadata_dir(&env_root)).unwrap();

        let (valid, issues) = validate(&env_root);

        assert!(!valid);
        assert!(issues.iter().any(|i| i.contains("interpreter missing")));
        assert!(issues.iter().any(|i| i.contains("Pip executable missing")));
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_passes_on_working_environment() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let env_root = fake_env(dir.path(), "env", now_unix());
        // Replace the inert interpreter with one that answers the probe.
        let python = platform::current().python_path(&env_root);
        fs::write(&python, "#!/bin/sh\necho 3.11.0\n").unwrap();
        fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).unwrap();

        let (valid, issues) = validate(&env_root);

        assert!(valid, "unexpected issues: {:?}", issues);
    }

    #[test]
    fn test_info_is_absent_without_metadata() {
        let dir = TempDir::new().unwrap();
        let env_root = dir.path().join("env");
        fs::create_dir_all(&env_root).unwrap();
        assert!(info(&env_root).is_none());
    }

    #[test]
    fn test_info_reads_dependency_count_from_lock() {
        let dir = TempDir::new().unwrap();
        let env_root = fake_env(dir.path(), "env", now_unix());
        let lock = LockRecord {
            generated_at: now_unix(),
            python_version: None,
            entries: vec![
                LockEntry {
                    name: "flask".to_string(),
                    version: "3.0.0".to_string(),
                },
                LockEntry {
                    name: "requests".to_string(),
                    version: "2.31.0".to_string(),
                },
            ],
        };
        write_lock(&env_root, &lock).unwrap();

        let env_info = info(&env_root).unwrap();

        assert_eq!(env_info.dependency_count, 2);
        assert_eq!(env_info.python_version, "3.11");
    }

    #[test]
    fn test_list_all_sorts_by_last_used_descending() {
        let dir = TempDir::new().unwrap();
        fake_env(dir.path(), "old", 1_000);
        fake_env(dir.path(), "fresh", 2_000);
        fs::create_dir_all(dir.path().join("not_an_env")).unwrap();

        let listed = list_all(dir.path());

        let names: Vec<&str> = listed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["fresh", "old"]);
    }

    #[test]
    fn test_cleanup_honors_age_threshold() {
        let dir = TempDir::new().unwrap();
        let stale = fake_env(dir.path(), "stale", now_unix() - 40 * 24 * 60 * 60);
        let active = fake_env(dir.path(), "active", now_unix());

        let cleaned = cleanup(dir.path(), 30);

        assert_eq!(cleaned, vec!["stale"]);
        assert!(!stale.exists());
        assert!(active.exists());
    }

    #[test]
    fn test_clone_requires_existing_source() {
        let dir = TempDir::new().unwrap();
        let result = clone(&dir.path().join("missing"), &dir.path().join("copy"));
        assert!(matches!(result, Err(EnvError::NotFound { .. })));
    }

    #[test]
    fn test_clone_rejects_existing_target() {
        let dir = TempDir::new().unwrap();
        let source = fake_env(dir.path(), "source", now_unix());
        let target = fake_env(dir.path(), "target", now_unix());
        let result = clone(&source, &target);
        assert!(matches!(result, Err(EnvError::AlreadyExists { .. })));
    }

    #[test]
    fn test_clone_copies_and_stamps_provenance() {
        let dir = TempDir::new().unwrap();
        let source = fake_env(dir.path(), "source", now_unix());
        let target = dir.path().join("copy");

        clone(&source, &target).unwrap();

        assert!(platform::current().python_path(&target).exists());
        let metadata = read_metadata(&target).unwrap();
        assert_eq!(metadata.cloned_from, Some(source.display().to_string()));
        assert!(metadata.cloned_at.is_some());
    }

    #[test]
    fn test_reset_requires_existing_environment() {
        let dir = TempDir::new().unwrap();
        let result = reset(&dir.path().join("missing"));
        assert!(matches!(result, Err(EnvError::NotFound { .. })));
    }

    #[test]
    fn test_reset_removes_environment() {
        let dir = TempDir::new().unwrap();
        let env_root = fake_env(dir.path(), "env", now_unix());
        reset(&env_root).unwrap();
        assert!(!env_root.exists());
    }

    #[test]
    fn test_touch_script_usage_records_each_script_once() {
        let dir = TempDir::new().unwrap();
        let env_root = fake_env(dir.path(), "env", 0);
        let script = Path::new("jobs/app.py");

        touch_script_usage(&env_root, script).unwrap();
        touch_script_usage(&env_root, script).unwrap();

        let metadata = read_metadata(&env_root).unwrap();
        assert_eq!(metadata.scripts, vec!["app.py"]);
        assert!(metadata.last_used > 0);
    }

    #[test]
    fn test_update_config_hash_creates_record_when_missing() {
        let dir = TempDir::new().unwrap();
        let env_root = dir.path().join("env");
        fs::create_dir_all(&env_root).unwrap();

        update_config_hash(&env_root, "abc123", Some("3.12")).unwrap();

        assert_eq!(stored_config_hash(&env_root), Some("abc123".to_string()));
        let metadata = read_metadata(&env_root).unwrap();
        assert!(metadata.last_updated.is_some());
    }

    #[test]
    fn test_lock_round_trip() {
        let dir = TempDir::new().unwrap();
        let env_root = dir.path().join("env");
        let lock = LockRecord {
            generated_at: 42,
            python_version: Some("3.11".to_string()),
            entries: vec![LockEntry {
                name: "flask".to_string(),
                version: "3.0.0".to_string(),
            }],
        };

        write_lock(&env_root, &lock).unwrap();
        let loaded = read_lock(&env_root).unwrap();

        assert_eq!(loaded.generated_at, 42);
        assert_eq!(loaded.entries, lock.entries);
    }
}
