// src/core/fingerprint.rs

use crate::models::{Configuration, ManifestKind};
use serde::Serialize;
use std::fs;

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters

/// The normalized view of a configuration that takes part in the hash.
/// Field order is fixed by this struct; list order is fixed by sorting.
#[derive(Serialize)]
struct CanonicalConfig<'a> {
    dependencies: Vec<&'a str>,
    dev_dependencies: Vec<&'a str>,
    python_version: Option<&'a str>,
    active_profile: &'a str,
    requirements_content: Option<String>,
}

/// Computes the deterministic fingerprint of a configuration.
///
/// Dependency lists are sorted before hashing so the result does not depend
/// on declaration order. For structured manifests that reference an external
/// requirements file, that file's raw content is hashed too: a change there
/// must invalidate the environment even though the manifest itself is
/// untouched. The fingerprint is compared verbatim; there is no semantic diff.
pub fn fingerprint(config: &Configuration) -> String {
    let mut dependencies: Vec<&str> = config.dependencies.iter().map(String::as_str).collect();
    dependencies.sort_unstable();
    let mut dev_dependencies: Vec<&str> =
        config.dev_dependencies.iter().map(String::as_str).collect();
    dev_dependencies.sort_unstable();

    // The external requirements file only participates for structured
    // manifests; for a flat manifest it *is* the manifest.
    let requirements_content = match (&config.requirements_file, config.kind) {
        (Some(path), ManifestKind::Structured) => fs::read_to_string(path).ok(),
        _ => None,
    };

    let canonical = CanonicalConfig {
        dependencies,
        dev_dependencies,
        python_version: config.python_version.as_deref(),
        active_profile: &config.active_profile,
        requirements_content,
    };

    // Serializing a struct has a stable key order, so this string is a
    // canonical rendering of the configuration.
    let serialized =
        serde_json::to_string(&canonical).unwrap_or_else(|_| String::from("<unserializable>"));
    let hash = blake3::hash(serialized.as_bytes());
    hex::encode(&hash.as_bytes()[..HASH_TRUNCATE_LENGTH])
}
