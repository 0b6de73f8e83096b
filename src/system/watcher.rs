// src/system/watcher.rs

//! # Hot Reload
//!
//! Watches the script and its manifest while the script runs. Filesystem
//! callbacks arrive on the notifier's own thread and are bridged over an
//! mpsc channel into this module's single coordinating loop, so restart and
//! reinstall actions are always serialized: two rapid-fire events can never
//! race to spawn two overlapping children. Bursts for the same file are
//! coalesced within a short settle window before acting.

use crate::CancellationToken;
use crate::core::{installer, manifest};
use crate::system::process;
use colored::Colorize;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::process::Child;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// How long the coordinating loop sleeps between cancellation checks.
const POLL_INTERVAL: Duration = Duration::from_millis(300);
/// Settle window for coalescing an event burst into one action.
const SETTLE_WINDOW: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to watch '{path}': {source}")]
    Watch {
        path: String,
        #[source]
        source: notify::Error,
    },
    #[error(transparent)]
    Notify(#[from] notify::Error),
    #[error(transparent)]
    Process(#[from] process::ProcessError),
}

/// What a coalesced batch of change events amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    /// The script itself changed: restart.
    Script,
    /// The manifest changed: reinstall dependencies, then restart.
    Manifest,
}

/// Runs `script_path` under watch until cancelled.
///
/// A script modification terminates the current child, waits for it, and
/// relaunches. A manifest modification additionally re-resolves the
/// configuration and forces a full dependency reconciliation first. Events
/// on unrelated files are ignored. On exit the running child, if any, is
/// terminated and awaited, so no orphans are left behind.
pub fn watch_and_run(
    script_path: &Path,
    env_root: &Path,
    manifest_path: &Path,
    extra_args: &[String],
    env_vars: &HashMap<String, String>,
    token: &CancellationToken,
) -> Result<(), WatchError> {
    let script_name: OsString = script_path.file_name().unwrap_or_default().to_os_string();
    let manifest_name: OsString = manifest_path.file_name().unwrap_or_default().to_os_string();

    let (event_tx, event_rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = event_tx.send(res);
        },
        notify::Config::default(),
    )?;

    let script_dir = script_path.parent().unwrap_or_else(|| Path::new("."));
    watcher
        .watch(script_dir, RecursiveMode::NonRecursive)
        .map_err(|e| WatchError::Watch {
            path: script_dir.display().to_string(),
            source: e,
        })?;
    // The manifest may live outside the script's directory.
    if let Some(manifest_dir) = manifest_path.parent() {
        if manifest_dir != script_dir {
            watcher
                .watch(manifest_dir, RecursiveMode::NonRecursive)
                .map_err(|e| WatchError::Watch {
                    path: manifest_dir.display().to_string(),
                    source: e,
                })?;
        }
    }

    println!(
        "{}",
        format!(t!("watch.info.started"), script = script_path.display()).cyan()
    );
    println!("{}", t!("watch.info.stop_hint").dimmed());

    let mut env_vars = env_vars.clone();
    let mut child = launch(script_path, env_root, extra_args, &env_vars);

    while !token.load(Ordering::SeqCst) {
        let event = match event_rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                log::warn!("Watcher error: {}", e);
                continue;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        let Some(first) = classify(&event, &script_name, &manifest_name) else {
            continue;
        };

        // Editors fire bursts (write + metadata + rename). Let the burst
        // settle, then fold everything pending into one decision; a manifest
        // change subsumes a script change.
        thread::sleep(SETTLE_WINDOW);
        let mut action = first;
        while let Ok(pending) = event_rx.try_recv() {
            if let Ok(event) = pending {
                if classify(&event, &script_name, &manifest_name) == Some(ChangeKind::Manifest) {
                    action = ChangeKind::Manifest;
                }
            }
        }

        match action {
            ChangeKind::Script => {
                println!(
                    "\n{}",
                    format!(t!("watch.info.script_changed"), script = script_path.display())
                        .cyan()
                );
                stop(&mut child);
                child = launch(script_path, env_root, extra_args, &env_vars);
            }
            ChangeKind::Manifest => {
                println!(
                    "\n{}",
                    format!(
                        t!("watch.info.manifest_changed"),
                        manifest = manifest_path.display()
                    )
                    .cyan()
                );
                stop(&mut child);
                match reinstall(env_root, manifest_path) {
                    Ok(new_vars) => {
                        env_vars = new_vars;
                        println!("{}", t!("watch.info.deps_updated").green());
                        child = launch(script_path, env_root, extra_args, &env_vars);
                    }
                    Err(e) => {
                        // Keep watching: the next manifest edit may fix it.
                        eprintln!("{}", format!(t!("watch.error.update_failed"), error = e).red());
                    }
                }
            }
        }
    }

    stop(&mut child);
    println!("{}", t!("watch.info.stopped"));
    Ok(())
}

/// Decides whether an event concerns the script, the manifest, or neither.
/// Only content-affecting events count; reads and metadata churn are noise.
fn classify(event: &Event, script_name: &OsString, manifest_name: &OsString) -> Option<ChangeKind> {
    let relevant_kind = matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Any
    );
    if !relevant_kind {
        return None;
    }

    let mut kind = None;
    for path in &event.paths {
        match path.file_name() {
            Some(name) if name == manifest_name.as_os_str() => {
                return Some(ChangeKind::Manifest);
            }
            Some(name) if name == script_name.as_os_str() => {
                kind = Some(ChangeKind::Script);
            }
            _ => {}
        }
    }
    kind
}

/// Re-resolves the manifest and forces a full reconciliation. Returns the
/// freshly resolved environment variables for the relaunch.
fn reinstall(
    env_root: &Path,
    manifest_path: &Path,
) -> anyhow::Result<HashMap<String, String>> {
    let config = manifest::resolve(manifest_path)?;
    installer::sync_dependencies(env_root, &config, true)?;
    Ok(config.env_vars)
}

fn launch(
    script_path: &Path,
    env_root: &Path,
    extra_args: &[String],
    env_vars: &HashMap<String, String>,
) -> Option<Child> {
    match process::spawn_inherited(script_path, env_root, extra_args, env_vars) {
        Ok(child) => {
            println!(
                "{}",
                format!(t!("watch.info.restarted"), pid = child.id()).green()
            );
            Some(child)
        }
        Err(e) => {
            eprintln!("{}", format!(t!("watch.error.restart_failed"), error = e).red());
            None
        }
    }
}

/// Terminates the current child, if any, and waits for its exit.
fn stop(child: &mut Option<Child>) {
    if let Some(mut running) = child.take() {
        match running.try_wait() {
            Ok(Some(_)) => {} // Already exited on its own.
            _ => {
                println!("{}", t!("watch.info.stopping_process").dimmed());
                process::terminate(&mut running);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut e = Event::new(kind);
        e.paths = paths.iter().map(PathBuf::from).collect();
        e
    }

    #[test]
    fn test_classify_detects_script_modification() {
        let script = OsString::from("app.py");
        let manifest = OsString::from("pyrun.toml");
        let e = event(
            EventKind::Modify(notify::event::ModifyKind::Any),
            &["/work/app.py"],
        );
        assert_eq!(classify(&e, &script, &manifest), Some(ChangeKind::Script));
    }

    #[test]
    fn test_classify_prefers_manifest_over_script() {
        let script = OsString::from("app.py");
        let manifest = OsString::from("pyrun.toml");
        let e = event(
            EventKind::Modify(notify::event::ModifyKind::Any),
            &["/work/app.py", "/work/pyrun.toml"],
        );
        assert_eq!(classify(&e, &script, &manifest), Some(ChangeKind::Manifest));
    }

    #[test]
    fn test_classify_ignores_unrelated_files() {
        let script = OsString::from("app.py");
        let manifest = OsString::from("pyrun.toml");
        let e = event(
            EventKind::Modify(notify::event::ModifyKind::Any),
            &["/work/notes.txt"],
        );
        assert_eq!(classify(&e, &script, &manifest), None);
    }

    #[test]
    fn test_classify_ignores_access_events() {
        let script = OsString::from("app.py");
        let manifest = OsString::from("pyrun.toml");
        let e = event(
            EventKind::Access(notify::event::AccessKind::Read),
            &["/work/app.py"],
        );
        assert_eq!(classify(&e, &script, &manifest), None);
    }
}
