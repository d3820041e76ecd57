//! The execution-environment seam.
//!
//! The runtime never talks to a concrete container directly: it is handed a
//! [`SandboxFuture`] — a shared future resolving to a [`Sandbox`] — because
//! the real environment takes time to boot. The future is resolved once and
//! cached; every runner holds a clone and awaits it before its first spawn
//! or write, without blocking `add_action`/`abort_all`.
//!
//! This trait is the seam to mock in tests: see the channel-backed sandbox in
//! `runner.rs` tests and the process-backed [`LocalSandbox`](crate::local::LocalSandbox).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::mpsc;

use crate::error::{Result, SandboxUnavailable};

/// A process spawned inside the sandbox.
///
/// Mirrors the handle shape the workbench protocol exposes: a kill signal,
/// an exit future, and an output stream. The three parts are independently
/// consumable — the runner keeps the kill handle reachable for `abort_all`
/// while awaiting `exit` and draining `output` elsewhere.
pub struct SandboxProcess {
    /// Best-effort termination signal. Consumed by the first kill.
    pub kill: Box<dyn ProcessKill>,
    /// Resolves with the process exit code.
    pub exit: BoxFuture<'static, i32>,
    /// Combined stdout/stderr chunks. Closed when the process exits.
    pub output: mpsc::UnboundedReceiver<String>,
}

/// Synchronous kill capability for a spawned process.
pub trait ProcessKill: Send {
    fn kill(&mut self);
}

impl<F: FnMut() + Send> ProcessKill for F {
    fn kill(&mut self) {
        self();
    }
}

/// Capability object over one isolated execution environment: spawn a shell
/// command, write a file under the environment's working directory.
///
/// Confinement (no writes outside the working directory) is enforced here,
/// not by the runner.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Spawn `command` as a shell process.
    async fn spawn(&self, command: &str) -> Result<SandboxProcess>;

    /// Write `content` at `path`, creating parent directories as needed.
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;
}

/// Shared handle to a booted sandbox.
pub type SharedSandbox = Arc<dyn Sandbox>;

/// The asynchronously-resolved sandbox dependency injected into runners.
///
/// `Shared` makes the boot awaitable any number of times; the error type is
/// cloneable for the same reason.
pub type SandboxFuture =
    Shared<BoxFuture<'static, std::result::Result<SharedSandbox, SandboxUnavailable>>>;

/// Wrap a boot future into the [`SandboxFuture`] shape runners expect.
///
/// # Example
///
/// ```rust,ignore
/// let sandbox = sandbox_future(async move {
///     Ok(Arc::new(LocalSandbox::new(workdir)) as SharedSandbox)
/// });
/// let runner = ActionRunner::new(sandbox);
/// ```
pub fn sandbox_future<F>(boot: F) -> SandboxFuture
where
    F: std::future::Future<Output = std::result::Result<SharedSandbox, SandboxUnavailable>>
        + Send
        + 'static,
{
    boot.boxed().shared()
}

/// A sandbox that is already booted.
pub fn ready_sandbox(sandbox: SharedSandbox) -> SandboxFuture {
    sandbox_future(async move { Ok(sandbox) })
}
