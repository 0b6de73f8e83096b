// src/models.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time as whole Unix seconds.
///
/// All persisted timestamps (metadata, lock records) use this representation
/// so the on-disk documents stay human-readable and comparable.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// --- MANIFEST MODELS (What is read from the configuration file) ---

/// A named overlay of extra dependencies and variable overrides.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Profile {
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

/// Represents the deserialized structure of a structured manifest (`pyrun.toml`).
/// Only needs `Deserialize`; it is never written back.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ManifestFile {
    pub python_version: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub dev_dependencies: Vec<String>,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
    /// Path to an external flat requirements file installed alongside the
    /// declared dependencies. Its raw content takes part in the fingerprint.
    pub requirements_file: Option<String>,
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
    pub active_profile: Option<String>,
    #[serde(default)]
    pub hot_reload: bool,
    /// An existing environment directory to clone before first creation.
    pub template: Option<String>,
}

/// Which of the two accepted manifest shapes a configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// One dependency specifier per line, `#` comments.
    FlatList,
    /// TOML document with profiles, variables and an interpreter constraint.
    Structured,
}

// --- IN-MEMORY MODELS (Our internal working representation) ---

/// The final, merged view of a manifest: base lists with the active profile
/// already applied. Never persisted; only its fingerprint and effects are.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub kind: ManifestKind,
    pub manifest_path: PathBuf,
    pub python_version: Option<String>,
    /// Base dependencies followed by the active profile's, concatenated.
    /// Duplicates are preserved; the installer surfaces them, not us.
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
    /// Base variables overlaid with the active profile's (profile wins).
    pub env_vars: HashMap<String, String>,
    pub requirements_file: Option<PathBuf>,
    pub profiles: HashMap<String, Profile>,
    pub active_profile: String,
    pub hot_reload: bool,
    pub template: Option<PathBuf>,
}

// --- PERSISTED ENVIRONMENT MODELS (JSON inside `.pyrun/`) ---

/// The metadata record stored at `<env>/.pyrun/env.json`.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EnvMetadata {
    pub created_at: u64,
    pub python_version: Option<String>,
    pub pyrun_version: String,
    /// Fingerprint of the last configuration applied to this environment.
    pub config_hash: Option<String>,
    /// Names of every script ever run inside this environment.
    #[serde(default)]
    pub scripts: Vec<String>,
    pub last_used: u64,
    pub last_updated: Option<u64>,
    pub cloned_from: Option<String>,
    pub cloned_at: Option<u64>,
}

impl EnvMetadata {
    /// A fresh record for a newly created environment.
    pub fn new(python_version: Option<String>) -> Self {
        let now = now_unix();
        Self {
            created_at: now,
            python_version,
            pyrun_version: crate::constants::TOOL_VERSION.to_string(),
            config_hash: None,
            scripts: Vec::new(),
            last_used: now,
            last_updated: None,
            cloned_from: None,
            cloned_at: None,
        }
    }
}

/// One resolved package in a lock record.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LockEntry {
    pub name: String,
    pub version: String,
}

/// The lock record stored at `<env>/.pyrun/requirements.lock`: ground truth
/// of what the installer reported as installed after the last batch.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct LockRecord {
    pub generated_at: u64,
    pub python_version: Option<String>,
    #[serde(default)]
    pub entries: Vec<LockEntry>,
}

// --- REPORTING MODELS ---

/// A summarized, read-only view of one environment, as shown by `envs`,
/// `validate` and `doctor`.
#[derive(Debug, Clone)]
pub struct EnvironmentInfo {
    pub name: String,
    pub path: PathBuf,
    pub created_at: u64,
    pub last_used: u64,
    pub scripts: Vec<String>,
    pub size_mb: f64,
    pub python_version: String,
    pub dependency_count: usize,
}
