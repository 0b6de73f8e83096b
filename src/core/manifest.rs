// src/core/manifest.rs

//! # Manifest Resolution
//!
//! Turns a user-authored manifest file into a normalized [`Configuration`].
//! Two shapes are accepted: a flat requirements list (one specifier per line)
//! and a structured TOML document with named profiles. The active profile's
//! dependencies are appended to the base list, never deduplicated, and its
//! variables overlay the base variables on key collision.

use crate::constants::AUTO_DETECT_MANIFESTS;
use crate::models::{Configuration, ManifestFile, ManifestKind};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: String },
    #[error(
        "Unsupported configuration file format: '{path}'. Expected a .toml manifest or a .txt requirements list."
    )]
    UnsupportedFormat { path: String },
    #[error("Error parsing TOML in '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: Box<toml::de::Error>,
    },
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
}

type ManifestResult<T> = Result<T, ManifestError>;

/// Resolves a manifest file into a normalized configuration, applying the
/// active profile declared in the file itself.
pub fn resolve(manifest_path: &Path) -> ManifestResult<Configuration> {
    resolve_with_profile(manifest_path, None)
}

/// Like [`resolve`], but `profile_override` takes precedence over the
/// `active_profile` key in the manifest. A profile name absent from the
/// profile map silently falls back to the base lists; it is not an error.
pub fn resolve_with_profile(
    manifest_path: &Path,
    profile_override: Option<&str>,
) -> ManifestResult<Configuration> {
    if !manifest_path.exists() {
        return Err(ManifestError::NotFound {
            path: manifest_path.display().to_string(),
        });
    }

    let extension = manifest_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let file_name = manifest_path.file_name().and_then(|n| n.to_str());

    match extension.as_deref() {
        Some("toml") => parse_structured(manifest_path, profile_override),
        Some("txt") => parse_flat_list(manifest_path),
        _ if file_name == Some("requirements.txt") => parse_flat_list(manifest_path),
        _ => Err(ManifestError::UnsupportedFormat {
            path: manifest_path.display().to_string(),
        }),
    }
}

/// Probes the script's directory for a manifest, in conventional order.
/// Returns `None` when nothing usable is found.
pub fn auto_detect(script_path: &Path) -> Option<PathBuf> {
    let script_dir = script_path.parent()?;
    for candidate in AUTO_DETECT_MANIFESTS {
        let path = script_dir.join(candidate);
        if path.exists() {
            log::debug!("Auto-detected manifest: {}", path.display());
            return Some(path);
        }
    }
    None
}

/// Writes a flat `requirements.txt` next to the script from an explicit
/// package list, and returns its path. Used by the quick-run flow when no
/// manifest exists yet.
pub fn create_quick_manifest(script_path: &Path, packages: &[String]) -> ManifestResult<PathBuf> {
    let script_dir = script_path.parent().unwrap_or_else(|| Path::new("."));
    let manifest_path = script_dir.join("requirements.txt");
    let mut content = String::new();
    for package in packages {
        content.push_str(package);
        content.push('\n');
    }
    fs::write(&manifest_path, content)?;
    log::info!(
        "Created {} with {} packages",
        manifest_path.display(),
        packages.len()
    );
    Ok(manifest_path)
}

// --- Format-specific parsers ---

fn parse_structured(
    manifest_path: &Path,
    profile_override: Option<&str>,
) -> ManifestResult<Configuration> {
    let content = fs::read_to_string(manifest_path)?;
    let file: ManifestFile = toml::from_str(&content).map_err(|e| ManifestError::Parse {
        path: manifest_path.display().to_string(),
        source: Box::new(e),
    })?;

    let active_profile = profile_override
        .map(str::to_string)
        .or_else(|| file.active_profile.clone())
        .unwrap_or_else(|| "default".to_string());

    let mut dependencies = file.dependencies.clone();
    let mut env_vars = file.env_vars.clone();

    if let Some(profile) = file.profiles.get(&active_profile) {
        // Concatenation, not dedup: duplicate specifiers are the installer's
        // problem to surface.
        dependencies.extend(profile.dependencies.iter().cloned());
        for (key, value) in &profile.env_vars {
            env_vars.insert(key.clone(), value.clone());
        }
        log::debug!(
            "Applied profile '{}' ({} extra dependencies)",
            active_profile,
            profile.dependencies.len()
        );
    }

    // A requirements_file is resolved relative to the manifest's directory.
    let requirements_file = file.requirements_file.as_ref().map(|raw| {
        let path = PathBuf::from(raw);
        if path.is_relative() {
            manifest_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(path)
        } else {
            path
        }
    });

    Ok(Configuration {
        kind: ManifestKind::Structured,
        manifest_path: manifest_path.to_path_buf(),
        python_version: file.python_version,
        dependencies,
        dev_dependencies: file.dev_dependencies,
        env_vars,
        requirements_file,
        profiles: file.profiles,
        active_profile,
        hot_reload: file.hot_reload,
        template: file.template.map(PathBuf::from),
    })
}

fn parse_flat_list(manifest_path: &Path) -> ManifestResult<Configuration> {
    let content = fs::read_to_string(manifest_path)?;
    let dependencies: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    log::debug!(
        "Parsed flat manifest {} ({} packages)",
        manifest_path.display(),
        dependencies.len()
    );

    Ok(Configuration {
        kind: ManifestKind::FlatList,
        manifest_path: manifest_path.to_path_buf(),
        python_version: None,
        dependencies,
        dev_dependencies: Vec::new(),
        env_vars: Default::default(),
        requirements_file: None,
        profiles: Default::default(),
        active_profile: "default".to_string(),
        hot_reload: false,
        template: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_manifest(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_flat_list_skips_comments_and_blanks() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            "requirements.txt",
            "flask>=2.0\n\n# a comment\nrequests==2.31.0\n",
        );

        let config = resolve(&path).unwrap();

        assert_eq!(config.kind, ManifestKind::FlatList);
        assert_eq!(config.dependencies, vec!["flask>=2.0", "requests==2.31.0"]);
        assert!(config.env_vars.is_empty());
        assert!(config.python_version.is_none());
    }

    #[test]
    fn test_profile_dependencies_are_appended_not_deduplicated() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            "pyrun.toml",
            r#"
dependencies = ["a", "b"]
active_profile = "dev"

[profiles.dev]
dependencies = ["c"]
"#,
        );

        let config = resolve(&path).unwrap();

        assert_eq!(config.dependencies, vec!["a", "b", "c"]);
        assert_eq!(config.active_profile, "dev");
    }

    #[test]
    fn test_profile_env_vars_overlay_base() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            "pyrun.toml",
            r#"
[env_vars]
X = "1"
Y = "2"

[profiles.staging]
[profiles.staging.env_vars]
Y = "3"
Z = "4"
"#,
        );

        let config = resolve_with_profile(&path, Some("staging")).unwrap();

        assert_eq!(config.env_vars.get("X").map(String::as_str), Some("1"));
        assert_eq!(config.env_vars.get("Y").map(String::as_str), Some("3"));
        assert_eq!(config.env_vars.get("Z").map(String::as_str), Some("4"));
    }

    #[test]
    fn test_missing_profile_falls_back_to_base_silently() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            "pyrun.toml",
            r#"
dependencies = ["a"]
active_profile = "nonexistent"
"#,
        );

        let config = resolve(&path).unwrap();

        assert_eq!(config.dependencies, vec!["a"]);
        assert_eq!(config.active_profile, "nonexistent");
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "setup.cfg", "[metadata]\n");

        let result = resolve(&path);

        assert!(matches!(
            result,
            Err(ManifestError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let result = resolve(Path::new("does/not/exist.toml"));
        assert!(matches!(result, Err(ManifestError::NotFound { .. })));
    }

    #[test]
    fn test_auto_detect_prefers_toml_over_requirements() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir, "requirements.txt", "flask\n");
        write_manifest(&dir, "pyrun.toml", "dependencies = []\n");
        let script = write_manifest(&dir, "app.py", "print('hi')\n");

        let detected = auto_detect(&script).unwrap();

        assert_eq!(detected.file_name().unwrap(), "pyrun.toml");
    }

    #[test]
    fn test_quick_manifest_round_trips() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("app.py");
        fs::write(&script, "print('hi')").unwrap();

        let manifest =
            create_quick_manifest(&script, &["flask".to_string(), "requests".to_string()]).unwrap();
        let config = resolve(&manifest).unwrap();

        assert_eq!(config.dependencies, vec!["flask", "requests"]);
    }
}
