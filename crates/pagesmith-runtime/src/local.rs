//! Process-backed sandbox for tests and local development.
//!
//! The production environment behind the workbench is a remote container;
//! `LocalSandbox` stands in for it by running commands through `sh -c` in a
//! dedicated working directory. Stdout and stderr are merged line-by-line
//! into the output channel by background drain tasks, and a supervisor task
//! owns the child so the kill handle stays synchronous.
//!
//! File writes are confined to the working directory: absolute paths and
//! `..` traversal are rejected here, not in the runner.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Result, RuntimeError};
use crate::sandbox::{Sandbox, SandboxProcess};

/// Exit code reported when the child was killed by a signal.
const SIGNALED_EXIT_CODE: i32 = -1;

pub struct LocalSandbox {
    root: PathBuf,
}

impl LocalSandbox {
    /// Create a sandbox rooted at `root`. Commands run with `root` as their
    /// working directory; file writes resolve relative to it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalSandbox { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn spawn(&self, command: &str) -> Result<SandboxProcess> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| RuntimeError::Spawn(e.to_string()))?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();

        if let Some(stdout) = child.stdout.take() {
            drain_lines(stdout, out_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            drain_lines(stderr, out_tx);
        }

        // The supervisor owns the child: a sync kill handle only needs to
        // fire the oneshot, and the exit future stays 'static.
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = oneshot::channel::<i32>();

        tokio::spawn(async move {
            let code = tokio::select! {
                status = child.wait() => {
                    status.ok().and_then(|s| s.code()).unwrap_or(SIGNALED_EXIT_CODE)
                }
                _ = &mut kill_rx => {
                    let _ = child.start_kill();
                    child
                        .wait()
                        .await
                        .ok()
                        .and_then(|s| s.code())
                        .unwrap_or(SIGNALED_EXIT_CODE)
                }
            };
            let _ = exit_tx.send(code);
        });

        let mut kill_tx = Some(kill_tx);
        Ok(SandboxProcess {
            kill: Box::new(move || {
                if let Some(tx) = kill_tx.take() {
                    let _ = tx.send(());
                }
            }),
            exit: async move { exit_rx.await.unwrap_or(SIGNALED_EXIT_CODE) }.boxed(),
            output: out_rx,
        })
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let relative = confine(path)?;
        let full = self.root.join(relative);

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RuntimeError::FileWrite {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
        }

        tokio::fs::write(&full, content)
            .await
            .map_err(|e| RuntimeError::FileWrite {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

/// Reject paths that could land outside the sandbox root.
fn confine(path: &Path) -> Result<&Path> {
    let ok = path.components().all(|component| {
        matches!(component, Component::Normal(_) | Component::CurDir)
    });

    if ok && path.components().next().is_some() {
        Ok(path)
    } else {
        Err(RuntimeError::PathEscape(path.display().to_string()))
    }
}

/// Forward each line of `reader` into `tx`, newline-terminated. The channel
/// closes when the process side of the pipe does.
fn drain_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(format!("{line}\n")).is_err() {
                break;
            }
        }
    });
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (LocalSandbox, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        (LocalSandbox::new(dir.path()), dir)
    }

    #[tokio::test]
    async fn spawn_captures_output_and_exit_code() {
        let (sandbox, _dir) = sandbox();
        let mut process = sandbox.spawn("echo hello").await.expect("spawn");

        assert_eq!(process.exit.await, 0);

        let mut output = String::new();
        while let Some(chunk) = process.output.recv().await {
            output.push_str(&chunk);
        }
        assert_eq!(output, "hello\n");
    }

    #[tokio::test]
    async fn spawn_reports_nonzero_exit() {
        let (sandbox, _dir) = sandbox();
        let process = sandbox.spawn("exit 3").await.expect("spawn");
        assert_eq!(process.exit.await, 3);
    }

    #[tokio::test]
    async fn stderr_is_merged_into_output() {
        let (sandbox, _dir) = sandbox();
        let mut process = sandbox.spawn("echo oops >&2").await.expect("spawn");
        assert_eq!(process.exit.await, 0);

        let mut output = String::new();
        while let Some(chunk) = process.output.recv().await {
            output.push_str(&chunk);
        }
        assert_eq!(output, "oops\n");
    }

    #[tokio::test]
    async fn kill_terminates_a_long_running_command() {
        let (sandbox, _dir) = sandbox();
        let mut process = sandbox.spawn("sleep 30").await.expect("spawn");

        process.kill.kill();

        let code = tokio::time::timeout(std::time::Duration::from_secs(5), process.exit)
            .await
            .expect("exit after kill");
        assert_ne!(code, 0);
    }

    #[tokio::test]
    async fn commands_run_in_the_sandbox_root() {
        let (sandbox, dir) = sandbox();
        let process = sandbox.spawn("touch marker.txt").await.expect("spawn");
        assert_eq!(process.exit.await, 0);
        assert!(dir.path().join("marker.txt").exists());
    }

    #[tokio::test]
    async fn write_file_creates_parent_directories() {
        let (sandbox, dir) = sandbox();
        sandbox
            .write_file(Path::new("src/pages/index.html"), "<html/>")
            .await
            .expect("write");

        let written = std::fs::read_to_string(dir.path().join("src/pages/index.html"))
            .expect("file exists");
        assert_eq!(written, "<html/>");
    }

    #[tokio::test]
    async fn write_file_rejects_escaping_paths() {
        let (sandbox, _dir) = sandbox();

        for path in ["../outside.txt", "/etc/passwd", "a/../../b"] {
            let err = sandbox
                .write_file(Path::new(path), "nope")
                .await
                .expect_err("escape rejected");
            assert!(matches!(err, RuntimeError::PathEscape(_)));
        }
    }
}
