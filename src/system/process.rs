// src/system/process.rs

use crate::CancellationToken;
use crate::constants::{PID_FILENAME, PYRUN_DIR};
use crate::system::platform;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Script file not found: {path}")]
    ScriptNotFound { path: String },
    #[error("Python interpreter not found in virtual environment: {path}")]
    InterpreterMissing { path: String },
    #[error("Command '{command}' could not be executed: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Command '{command}' timed out after {secs} seconds.")]
    Timeout { command: String, secs: u64 },
    #[error("Script exited with code {code}.")]
    NonZeroExit { code: i32 },
    #[error("Operation was interrupted by the user.")]
    Interrupted,
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
}

type ProcessResult<T> = Result<T, ProcessError>;

/// What a supervised run produced: a completed exit code, or the process id
/// of a child left running detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Exited(i32),
    Detached(u32),
}

/// The captured result of a bounded subprocess invocation.
#[derive(Debug)]
pub struct CapturedOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// Stdout and stderr joined, for error rendering and text matching.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        text
    }
}

/// Runs a command to completion with captured output and a hard deadline.
///
/// Output is drained on dedicated threads so the child can never block on a
/// full pipe while we poll `try_wait`. On timeout the child is killed and
/// awaited; the partial output is discarded.
pub fn run_captured(
    mut command: Command,
    label: &str,
    timeout: Duration,
) -> ProcessResult<CapturedOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|e| ProcessError::Spawn {
        command: label.to_string(),
        source: e,
    })?;

    let stdout_handle = drain_to_string(child.stdout.take());
    let stderr_handle = drain_to_string(child.stderr.take());

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait()? {
            Some(status) => {
                let stdout = stdout_handle.join().unwrap_or_default();
                let stderr = stderr_handle.join().unwrap_or_default();
                return Ok(CapturedOutput {
                    success: status.success(),
                    code: status.code(),
                    stdout,
                    stderr,
                });
            }
            None => {
                if Instant::now() >= deadline {
                    log::warn!("'{}' exceeded its deadline, killing it", label);
                    terminate(&mut child);
                    return Err(ProcessError::Timeout {
                        command: label.to_string(),
                        secs: timeout.as_secs(),
                    });
                }
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

/// Launches a script inside an environment.
///
/// Foreground mode streams the child's output line-by-line and blocks until
/// exit. Background mode detaches the child from the session, persists its
/// PID to `<env>/.pyrun/process.pid` and returns immediately; its output is
/// drained on a fire-and-forget thread whose failure can never affect the
/// returned PID.
pub fn run_script(
    script_path: &Path,
    env_root: &Path,
    extra_args: &[String],
    background: bool,
    env_vars: &HashMap<String, String>,
    token: &CancellationToken,
) -> ProcessResult<RunOutcome> {
    if !script_path.exists() {
        return Err(ProcessError::ScriptNotFound {
            path: script_path.display().to_string(),
        });
    }
    let python = platform::current().python_path(env_root);
    if !python.exists() {
        return Err(ProcessError::InterpreterMissing {
            path: python.display().to_string(),
        });
    }

    log::info!(
        "Running script: {} {} {}",
        python.display(),
        script_path.display(),
        extra_args.join(" ")
    );

    if background {
        run_background(&python, script_path, extra_args, env_vars, env_root)
    } else {
        run_foreground(&python, script_path, extra_args, env_vars, token)
    }
}

/// Spawns the script with inherited stdio, for watch mode where the child's
/// lifetime is managed by the caller. Returns the running child.
pub fn spawn_inherited(
    script_path: &Path,
    env_root: &Path,
    extra_args: &[String],
    env_vars: &HashMap<String, String>,
) -> ProcessResult<Child> {
    if !script_path.exists() {
        return Err(ProcessError::ScriptNotFound {
            path: script_path.display().to_string(),
        });
    }
    let python = platform::current().python_path(env_root);
    if !python.exists() {
        return Err(ProcessError::InterpreterMissing {
            path: python.display().to_string(),
        });
    }

    let mut command = Command::new(&python);
    command.arg(script_path).args(extra_args).envs(env_vars);
    command.spawn().map_err(|e| ProcessError::Spawn {
        command: script_path.display().to_string(),
        source: e,
    })
}

/// Kills a child and waits for it to be reaped. Best-effort: failures are
/// logged, never propagated.
pub fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::warn!("Failed to kill child process {}: {}", child.id(), e);
    }
    child.wait().ok();
}

/// The PID file location for an environment's detached child.
pub fn pid_file_path(env_root: &Path) -> PathBuf {
    env_root.join(PYRUN_DIR).join(PID_FILENAME)
}

// --- Mode implementations ---

fn run_foreground(
    python: &Path,
    script_path: &Path,
    extra_args: &[String],
    env_vars: &HashMap<String, String>,
    token: &CancellationToken,
) -> ProcessResult<RunOutcome> {
    let mut command = Command::new(python);
    command
        .arg(script_path)
        .args(extra_args)
        .envs(env_vars)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|e| ProcessError::Spawn {
        command: script_path.display().to_string(),
        source: e,
    })?;

    // Mirror stderr on its own thread while the main thread streams stdout,
    // so neither pipe can fill up and stall the child.
    let stderr_handle = child.stderr.take().map(|stderr| {
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                eprintln!("{}", line);
            }
        })
    });

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            println!("{}", line);
        }
    }
    if let Some(handle) = stderr_handle {
        handle.join().ok();
    }

    // Streams are closed; the child is exiting. Poll for its status so a
    // cancellation request can still cut the wait short.
    loop {
        match child.try_wait()? {
            Some(status) => {
                let code = status.code().unwrap_or(1);
                log::info!("Script finished with return code: {}", code);
                if token.load(Ordering::SeqCst) {
                    return Err(ProcessError::Interrupted);
                }
                return Ok(RunOutcome::Exited(code));
            }
            None => {
                if token.load(Ordering::SeqCst) {
                    log::debug!("Cancellation requested, killing child {}", child.id());
                    terminate(&mut child);
                    return Err(ProcessError::Interrupted);
                }
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

fn run_background(
    python: &Path,
    script_path: &Path,
    extra_args: &[String],
    env_vars: &HashMap<String, String>,
    env_root: &Path,
) -> ProcessResult<RunOutcome> {
    let mut command = Command::new(python);
    command
        .arg(script_path)
        .args(extra_args)
        .envs(env_vars)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    detach_from_session(&mut command);

    let mut child = command.spawn().map_err(|e| ProcessError::Spawn {
        command: script_path.display().to_string(),
        source: e,
    })?;
    let pid = child.id();

    let pid_file = pid_file_path(env_root);
    std::fs::write(&pid_file, pid.to_string())?;
    log::info!("Background process started with PID: {}", pid);
    log::info!("PID saved to: {}", pid_file.display());

    // Best-effort drain: keeps the detached child from blocking on a full
    // pipe. Not part of the supervised lifecycle; never joined.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    thread::spawn(move || {
        if let Some(out) = stdout {
            for line in BufReader::new(out).lines().map_while(Result::ok) {
                log::info!("SCRIPT OUTPUT: {}", line);
            }
        }
        if let Some(err) = stderr {
            for line in BufReader::new(err).lines().map_while(Result::ok) {
                log::info!("SCRIPT OUTPUT: {}", line);
            }
        }
        child.wait().ok();
    });

    Ok(RunOutcome::Detached(pid))
}

#[cfg(unix)]
fn detach_from_session(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    // A new process group survives the controlling terminal going away.
    command.process_group(0);
}

#[cfg(windows)]
fn detach_from_session(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

fn drain_to_string(stream: Option<impl Read + Send + 'static>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut stream) = stream {
            stream.read_to_string(&mut buffer).ok();
        }
        buffer
    })
}
