//! `pagesmith-runtime` — action execution runtime for the pagesmith
//! workbench.
//!
//! The chat layer streams LLM output through a message parser that emits
//! artifacts (one per chat message) and actions (shell commands and file
//! writes). This crate is the component that actually runs those actions
//! against the project sandbox and tracks their lifecycle.
//!
//! # Architecture
//!
//! ```text
//! parser events
//!     │  ArtifactCallbackData / ActionCallbackData
//!     ▼
//! Workbench       ← one ActionRunner per artifact (message id)
//!     │
//!     ▼
//! ActionRunner    ← FIFO single-flight shell queue, independent file writes,
//!     │              total abort
//!     ▼
//! Sandbox trait   ← injected as a shared boot future; spawn + write_file
//!     │
//!     ▼
//! ActionStore     ← observable status map the UI renders from
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pagesmith_runtime::{
//!     ready_sandbox, ActionRunner, LocalSandbox, SharedSandbox,
//! };
//!
//! let sandbox = ready_sandbox(Arc::new(LocalSandbox::new("/tmp/project")) as SharedSandbox);
//! let runner = ActionRunner::new(sandbox);
//!
//! runner.add_action(&data);
//! runner.run_action(&data);
//!
//! let mut updates = runner.actions().subscribe();
//! while updates.changed().await.is_ok() {
//!     render(updates.borrow().clone());
//! }
//! ```
//!
//! Shell actions within one runner are strictly serialized in `run_action`
//! order; file writes bypass the queue. `abort_all` marks every non-terminal
//! action aborted before it returns and kills the running process; an abort
//! is never overturned by a late exit event.

pub mod action;
pub mod error;
pub mod local;
pub mod runner;
pub mod sandbox;
pub mod store;
pub mod workbench;

pub use action::{
    ActionCallbackData, ActionPayload, ActionState, ActionStatus, ArtifactCallbackData,
};
pub use error::{Result, RuntimeError, SandboxUnavailable};
pub use local::LocalSandbox;
pub use runner::ActionRunner;
pub use sandbox::{
    ready_sandbox, sandbox_future, ProcessKill, Sandbox, SandboxFuture, SandboxProcess,
    SharedSandbox,
};
pub use store::{ActionSnapshot, ActionStore};
pub use workbench::{ArtifactInfo, ArtifactUpdate, Workbench};
