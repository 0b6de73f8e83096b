// src/system/platform.rs

use std::path::{Path, PathBuf};

/// Platform-conventional locations of the entry points inside an environment.
///
/// Exactly two implementations exist, and one is selected once through
/// [`current`]; callers never branch on the OS themselves.
pub trait PlatformPaths: Send + Sync {
    /// The interpreter entry point inside an environment.
    fn python_path(&self, env_root: &Path) -> PathBuf;
    /// The package-installer entry point inside an environment.
    fn pip_path(&self, env_root: &Path) -> PathBuf;
    /// The directory holding the environment's executables (for `PATH`).
    fn bin_dir(&self, env_root: &Path) -> PathBuf;
    /// The system-wide interpreter used to create new environments.
    fn system_python(&self) -> &'static str;
}

struct UnixPaths;

impl PlatformPaths for UnixPaths {
    fn python_path(&self, env_root: &Path) -> PathBuf {
        env_root.join("bin").join("python")
    }

    fn pip_path(&self, env_root: &Path) -> PathBuf {
        env_root.join("bin").join("pip")
    }

    fn bin_dir(&self, env_root: &Path) -> PathBuf {
        env_root.join("bin")
    }

    fn system_python(&self) -> &'static str {
        "python3"
    }
}

struct WindowsPaths;

impl PlatformPaths for WindowsPaths {
    fn python_path(&self, env_root: &Path) -> PathBuf {
        env_root.join("Scripts").join("python.exe")
    }

    fn pip_path(&self, env_root: &Path) -> PathBuf {
        env_root.join("Scripts").join("pip.exe")
    }

    fn bin_dir(&self, env_root: &Path) -> PathBuf {
        env_root.join("Scripts")
    }

    fn system_python(&self) -> &'static str {
        "python"
    }
}

static UNIX: UnixPaths = UnixPaths;
static WINDOWS: WindowsPaths = WindowsPaths;

/// Returns the path convention for the platform this binary was built for.
pub fn current() -> &'static dyn PlatformPaths {
    if cfg!(target_os = "windows") {
        &WINDOWS
    } else {
        &UNIX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_entry_points() {
        let root = Path::new("/tmp/demo_env");
        assert_eq!(UNIX.python_path(root), root.join("bin/python"));
        assert_eq!(UNIX.pip_path(root), root.join("bin/pip"));
    }

    #[test]
    fn test_windows_entry_points() {
        let root = Path::new(r"C:\envs\demo");
        assert_eq!(
            WINDOWS.python_path(root),
            root.join("Scripts").join("python.exe")
        );
        assert_eq!(WINDOWS.pip_path(root), root.join("Scripts").join("pip.exe"));
    }

    #[test]
    fn test_current_matches_build_target() {
        let root = Path::new("env");
        let expected = if cfg!(target_os = "windows") {
            root.join("Scripts").join("python.exe")
        } else {
            root.join("bin").join("python")
        };
        assert_eq!(current().python_path(root), expected);
    }
}
