// src/core/reconcile.rs

//! # Dependency Reconciliation
//!
//! Decides, for a declared configuration and an existing environment, whether
//! install work is needed and which specifiers it covers. This is an
//! incremental heuristic, not a solver: it detects previously-absent packages
//! against the lock record, never version bumps of packages already present.
//! A forced full update bypasses it entirely.

use crate::core::{environment, fingerprint};
use crate::models::Configuration;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;

lazy_static! {
    // Leading package name of a specifier: everything up to the first
    // version operator (`==`, `>=`, `<`, ...), extras bracket or space.
    static ref SPEC_NAME_RE: Regex = Regex::new(r"^\s*([A-Za-z0-9._-]+)").unwrap();
}

/// Extracts the bare, lowercased package name from a dependency specifier.
/// `Flask>=2.0` and `flask==3.0.1` both map to `flask`.
pub fn bare_package_name(specifier: &str) -> String {
    SPEC_NAME_RE
        .captures(specifier)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| specifier.trim().to_ascii_lowercase())
}

/// Determines whether `env_root` needs install work for `config`.
///
/// Returns the decision together with the set of changed specifiers. The
/// degradation ladder, in order:
///
/// 1. no environment → full update;
/// 2. fingerprints equal → nothing to do;
/// 3. fingerprints differ, lock record missing or unreadable → full update
///    (no baseline to diff against);
/// 4. otherwise → every declared dependency whose bare name is absent from
///    the lock record, compared case-insensitively.
pub fn needs_dependency_update(
    env_root: &Path,
    config: &Configuration,
) -> (bool, BTreeSet<String>) {
    let all_deps: BTreeSet<String> = config.dependencies.iter().cloned().collect();

    if !env_root.exists() {
        return (true, all_deps);
    }

    let current_hash = fingerprint::fingerprint(config);
    let stored_hash = environment::stored_config_hash(env_root);
    if stored_hash.as_deref() == Some(current_hash.as_str()) {
        return (false, BTreeSet::new());
    }

    let lock = match environment::read_lock(env_root) {
        Ok(lock) => lock,
        Err(e) => {
            log::debug!(
                "Lock record unusable ({}); assuming full update is needed",
                e
            );
            return (true, all_deps);
        }
    };

    let installed: BTreeSet<String> = lock
        .entries
        .iter()
        .map(|entry| entry.name.to_ascii_lowercase())
        .collect();

    let changed: BTreeSet<String> = config
        .dependencies
        .iter()
        .filter(|dep| !installed.contains(&bare_package_name(dep)))
        .cloned()
        .collect();

    (!changed.is_empty(), changed)
}
