//! Per-artifact action execution engine.
//!
//! One `ActionRunner` exists per artifact. It owns the artifact's
//! [`ActionStore`] and a clone of the shared sandbox boot future, and drives
//! every action through its lifecycle:
//!
//! ```text
//! run_action ──┬── shell ──▶ FIFO queue ──▶ executor task ──▶ sandbox.spawn
//!              │                             (single-flight)    │ exit code
//!              └── file ───▶ spawned task ──▶ sandbox.write_file
//!                                                              ▼
//!                                    ActionStore ◀── status transitions
//! ```
//!
//! Shell actions are strictly serialized per runner — they model one shell
//! session whose working-directory state and side-effect ordering (install
//! before build) would be corrupted by parallel execution. The queue order is
//! the order of `run_action` calls, not `add_action` calls. File writes are
//! independent of the queue and of each other.
//!
//! A failed action never cancels or skips later queued actions; whether to
//! continue after a failure is the caller's decision.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::action::{ActionCallbackData, ActionPayload, ActionState, ActionStatus};
use crate::error::RuntimeError;
use crate::sandbox::{ProcessKill, SandboxFuture, SandboxProcess};
use crate::store::ActionStore;

/// Executes one artifact's actions against the sandbox.
///
/// Cloning is cheap; clones share the store, the queue and the executor task.
/// The executor task exits once every clone has been dropped.
#[derive(Clone)]
pub struct ActionRunner {
    inner: Arc<RunnerInner>,
    queue_tx: mpsc::UnboundedSender<String>,
}

struct RunnerInner {
    store: ActionStore,
    sandbox: SandboxFuture,
    /// Ids ever submitted through `run_action`; guards duplicate submissions.
    submitted: Mutex<HashSet<String>>,
    /// Kill handle of the one currently running shell process, if any.
    /// Taken exactly once, by whoever kills or observes the exit first.
    current_kill: Mutex<Option<Box<dyn ProcessKill>>>,
    /// Concatenated output per shell action. Arc'd so the per-process drain
    /// task can keep buffering independently of the executor's call frame.
    outputs: Arc<Mutex<HashMap<String, String>>>,
}

impl ActionRunner {
    /// Create a runner over the given sandbox boot future.
    ///
    /// Spawns the background executor task that drains the shell queue.
    pub fn new(sandbox: SandboxFuture) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(RunnerInner {
            store: ActionStore::new(),
            sandbox,
            submitted: Mutex::new(HashSet::new()),
            current_kill: Mutex::new(None),
            outputs: Arc::new(Mutex::new(HashMap::new())),
        });

        tokio::spawn(drain_queue(Arc::clone(&inner), queue_rx));

        ActionRunner { inner, queue_tx }
    }

    /// The observable status map for this runner's actions.
    pub fn actions(&self) -> ActionStore {
        self.inner.store.clone()
    }

    /// Register an action at `Pending` without starting it.
    ///
    /// Re-adding an existing id is a no-op: the first registration wins and
    /// entries are never duplicated.
    pub fn add_action(&self, data: &ActionCallbackData) {
        if self.inner.store.get_key(&data.action_id).is_some() {
            tracing::debug!(action_id = %data.action_id, "action already registered");
            return;
        }

        self.inner
            .store
            .set_key(ActionState::new(data.action_id.clone(), data.action.clone()));
    }

    /// Request execution of a previously-added action.
    ///
    /// Unknown ids, terminal actions and repeat calls are no-ops (duplicate
    /// parser events are expected). Shell actions join the FIFO queue; file
    /// actions run immediately on their own task. Never blocks on sandbox
    /// boot and never returns an action-level failure — outcomes land in the
    /// store.
    pub fn run_action(&self, data: &ActionCallbackData) {
        let id = &data.action_id;

        let Some(state) = self.inner.store.get_key(id) else {
            tracing::debug!(action_id = %id, "run requested for unknown action");
            return;
        };

        if state.status.is_terminal() {
            return;
        }

        {
            let mut submitted = lock(&self.inner.submitted);
            if !submitted.insert(id.clone()) {
                tracing::debug!(action_id = %id, "action already submitted");
                return;
            }
        }

        match state.payload {
            ActionPayload::Shell { .. } => {
                tracing::debug!(action_id = %id, "shell action queued");
                let _ = self.queue_tx.send(id.clone());
            }
            ActionPayload::File { file_path, content } => {
                tracing::debug!(action_id = %id, path = %file_path, "file action started");
                let inner = Arc::clone(&self.inner);
                let id = id.clone();
                tokio::spawn(async move {
                    inner.run_file(&id, &file_path, &content).await;
                });
            }
        }
    }

    /// Abort every non-terminal action and kill the running process, if any.
    ///
    /// Synchronous with respect to the store: by the time this returns, every
    /// previously `Pending`/`Running` action reads `Aborted`. The process
    /// kill itself is signalled here but completes asynchronously; a late
    /// exit event never overwrites `Aborted`.
    pub fn abort_all(&self) {
        let snapshot = self.inner.store.get();
        let mut aborted = 0usize;

        for entry in snapshot.iter() {
            if entry.status.is_terminal() {
                continue;
            }
            let mut state = entry.clone();
            state.status = ActionStatus::Aborted;
            self.inner.store.set_key(state);
            aborted += 1;
        }

        if let Some(mut kill) = lock(&self.inner.current_kill).take() {
            kill.kill();
        }

        tracing::debug!(aborted, "aborted all actions");
    }

    /// Concatenated output of a shell action, as buffered so far.
    pub fn output(&self, action_id: &str) -> Option<String> {
        lock(&self.inner.outputs).get(action_id).cloned()
    }
}

// ─── Executor ─────────────────────────────────────────────────────────────

/// Drain the shell queue, one action at a time, until every runner clone is
/// dropped.
async fn drain_queue(inner: Arc<RunnerInner>, mut queue_rx: mpsc::UnboundedReceiver<String>) {
    while let Some(id) = queue_rx.recv().await {
        inner.run_shell(&id).await;
    }
}

impl RunnerInner {
    /// Run one queued shell action to a terminal state.
    async fn run_shell(&self, id: &str) {
        let Some(state) = self.store.get_key(id) else {
            return;
        };

        // Aborted while waiting in the queue.
        if state.status != ActionStatus::Pending {
            return;
        }

        let ActionPayload::Shell { content } = &state.payload else {
            return;
        };

        self.transition(id, ActionStatus::Running, None);

        let sandbox = match self.sandbox.clone().await {
            Ok(sandbox) => sandbox,
            Err(e) => {
                let e = RuntimeError::Sandbox(e);
                tracing::warn!(action_id = %id, error = %e, "sandbox unavailable");
                self.transition(id, ActionStatus::Failed, Some(e.to_string()));
                return;
            }
        };

        // Aborted while the sandbox was booting: never spawn.
        if self.store.status(id) != Some(ActionStatus::Running) {
            return;
        }

        let process = match sandbox.spawn(content).await {
            Ok(process) => process,
            Err(e) => {
                tracing::warn!(action_id = %id, error = %e, "spawn failed");
                self.transition(id, ActionStatus::Failed, Some(e.to_string()));
                return;
            }
        };

        let SandboxProcess {
            kill,
            exit,
            mut output,
        } = process;

        *lock(&self.current_kill) = Some(kill);

        // An abort that raced the spawn has already marked the action
        // aborted but found no kill handle to take — kill here instead.
        if self.store.status(id) == Some(ActionStatus::Aborted) {
            if let Some(mut kill) = lock(&self.current_kill).take() {
                kill.kill();
            }
        }

        // Buffer output on the side; lifecycle transitions never wait on it.
        {
            let id = id.to_string();
            let outputs = Arc::clone(&self.outputs);
            tokio::spawn(async move {
                while let Some(chunk) = output.recv().await {
                    lock(&outputs).entry(id.clone()).or_default().push_str(&chunk);
                }
            });
        }

        let code = exit.await;
        lock(&self.current_kill).take();

        if code == 0 {
            self.transition(id, ActionStatus::Complete, None);
        } else {
            tracing::debug!(action_id = %id, code, "command failed");
            self.transition(
                id,
                ActionStatus::Failed,
                Some(format!("command exited with code {code}")),
            );
        }
    }

    /// Apply a file write, independent of the shell queue.
    async fn run_file(&self, id: &str, file_path: &str, content: &str) {
        let sandbox = match self.sandbox.clone().await {
            Ok(sandbox) => sandbox,
            Err(e) => {
                let e = RuntimeError::Sandbox(e);
                self.transition(id, ActionStatus::Failed, Some(e.to_string()));
                return;
            }
        };

        // Aborted while the sandbox was booting: never write.
        if self.store.status(id) != Some(ActionStatus::Pending) {
            return;
        }

        match sandbox.write_file(Path::new(file_path), content).await {
            Ok(()) => self.transition(id, ActionStatus::Complete, None),
            Err(e) => {
                tracing::warn!(action_id = %id, path = %file_path, error = %e, "file write failed");
                self.transition(id, ActionStatus::Failed, Some(e.to_string()));
            }
        }
    }

    /// Publish a status change, unless the action already reached a terminal
    /// state — `Aborted` (and any other terminal status) always wins over a
    /// late-arriving signal.
    fn transition(&self, id: &str, status: ActionStatus, error: Option<String>) {
        let Some(mut state) = self.store.get_key(id) else {
            return;
        };
        if state.status.is_terminal() {
            return;
        }
        state.status = status;
        state.error = error;
        self.store.set_key(state);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ─── Tests ────────────────────────────────────────────────────────────────
