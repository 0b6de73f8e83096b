// src/constants.rs

/// The name of the metadata directory inside every managed environment.
pub const PYRUN_DIR: &str = ".pyrun";

/// The name of the metadata record inside the metadata directory.
pub const METADATA_FILENAME: &str = "env.json";

/// The name of the lock record inside the metadata directory.
pub const LOCK_FILENAME: &str = "requirements.lock";

/// The name of the PID file written for detached background runs.
pub const PID_FILENAME: &str = "process.pid";

/// Version tag stamped into every environment's metadata record.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Manifest file names probed, in order, when none is given explicitly.
pub const AUTO_DETECT_MANIFESTS: &[&str] = &["pyrun.toml", "config.toml", "requirements.txt"];

/// Default age threshold (days) for `cleanup`.
pub const DEFAULT_CLEANUP_DAYS: u64 = 30;

/// Per-package timeout for a single installer invocation, in seconds.
pub const INSTALL_TIMEOUT_SECS: u64 = 300;

/// Timeout for the interpreter self-probe during validation, in seconds.
pub const INTERPRETER_PROBE_TIMEOUT_SECS: u64 = 10;

/// Timeout for the installer's dependency-conflict check, in seconds.
pub const PIP_CHECK_TIMEOUT_SECS: u64 = 30;

/// Timeout for replaying a lock record as one batch install, in seconds.
pub const LOCK_REPLAY_TIMEOUT_SECS: u64 = 600;

/// Timeout for creating a fresh virtual environment, in seconds.
pub const VENV_CREATE_TIMEOUT_SECS: u64 = 180;

/// Size of the worker pool for concurrent package installs.
pub const INSTALL_WORKERS: usize = 3;

/// Batches at or below this size install sequentially, in request order.
pub const SEQUENTIAL_INSTALL_MAX: usize = 3;
