//! Artifact registry: routes parser events to per-artifact runners.
//!
//! The message parser emits one artifact per chat message, then a stream of
//! action events for it. The registry creates exactly one [`ActionRunner`]
//! per message id when the artifact first appears and forwards every
//! subsequent action event to it. Forwarding an action for a message id with
//! no registered artifact is a contract violation of the parsing layer and
//! surfaces as [`RuntimeError::UnknownArtifact`].

use std::sync::Mutex;

use crate::action::{ActionCallbackData, ArtifactCallbackData};
use crate::error::{Result, RuntimeError};
use crate::runner::ActionRunner;
use crate::sandbox::SandboxFuture;

/// Snapshot of one artifact's registry entry.
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub message_id: String,
    pub artifact_id: String,
    pub title: Option<String>,
    pub closed: bool,
}

/// Patch applied by [`Workbench::update_artifact`].
#[derive(Debug, Default, Clone)]
pub struct ArtifactUpdate {
    pub title: Option<String>,
    pub closed: Option<bool>,
}

struct ArtifactEntry {
    message_id: String,
    artifact_id: String,
    title: Option<String>,
    closed: bool,
    runner: ActionRunner,
}

/// Owns every live artifact and its runner for one chat session.
pub struct Workbench {
    sandbox: SandboxFuture,
    /// Insertion-ordered; one entry per message id.
    artifacts: Mutex<Vec<ArtifactEntry>>,
}

impl Workbench {
    pub fn new(sandbox: SandboxFuture) -> Self {
        Workbench {
            sandbox,
            artifacts: Mutex::new(Vec::new()),
        }
    }

    /// Register an artifact and create its runner.
    ///
    /// An artifact's runner is created exactly once: repeat events for the
    /// same message id are no-ops and never replace the runner.
    pub fn add_artifact(&self, data: &ArtifactCallbackData) {
        let mut artifacts = lock(&self.artifacts);

        if artifacts.iter().any(|a| a.message_id == data.message_id) {
            return;
        }

        tracing::debug!(
            message_id = %data.message_id,
            artifact_id = %data.artifact_id,
            "artifact registered"
        );

        artifacts.push(ArtifactEntry {
            message_id: data.message_id.clone(),
            artifact_id: data.artifact_id.clone(),
            title: data.title.clone(),
            closed: false,
            runner: ActionRunner::new(self.sandbox.clone()),
        });
    }

    /// Patch an artifact's title or closed flag. Unknown ids are ignored.
    pub fn update_artifact(&self, message_id: &str, update: ArtifactUpdate) {
        let mut artifacts = lock(&self.artifacts);
        let Some(entry) = artifacts.iter_mut().find(|a| a.message_id == message_id) else {
            return;
        };

        if let Some(title) = update.title {
            entry.title = Some(title);
        }
        if let Some(closed) = update.closed {
            entry.closed = closed;
        }
    }

    /// Forward an action registration to the owning runner.
    pub fn add_action(&self, data: &ActionCallbackData) -> Result<()> {
        self.runner(&data.message_id)
            .ok_or_else(|| RuntimeError::UnknownArtifact(data.message_id.clone()))?
            .add_action(data);
        Ok(())
    }

    /// Forward an execution request to the owning runner.
    pub fn run_action(&self, data: &ActionCallbackData) -> Result<()> {
        self.runner(&data.message_id)
            .ok_or_else(|| RuntimeError::UnknownArtifact(data.message_id.clone()))?
            .run_action(data);
        Ok(())
    }

    /// Abort every live runner (user stop, or a new chat turn starting).
    pub fn abort_all_actions(&self) {
        let runners: Vec<ActionRunner> = {
            let artifacts = lock(&self.artifacts);
            artifacts.iter().map(|a| a.runner.clone()).collect()
        };

        for runner in runners {
            runner.abort_all();
        }
    }

    /// The runner owning `message_id`, if the artifact is registered.
    pub fn runner(&self, message_id: &str) -> Option<ActionRunner> {
        lock(&self.artifacts)
            .iter()
            .find(|a| a.message_id == message_id)
            .map(|a| a.runner.clone())
    }

    /// The first artifact registered in this session.
    pub fn first_artifact(&self) -> Option<ArtifactInfo> {
        lock(&self.artifacts).first().map(info)
    }

    /// Registry snapshot for one artifact.
    pub fn artifact(&self, message_id: &str) -> Option<ArtifactInfo> {
        lock(&self.artifacts)
            .iter()
            .find(|a| a.message_id == message_id)
            .map(info)
    }
}

fn info(entry: &ArtifactEntry) -> ArtifactInfo {
    ArtifactInfo {
        message_id: entry.message_id.clone(),
        artifact_id: entry.artifact_id.clone(),
        title: entry.title.clone(),
        closed: entry.closed,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ─── Tests ────────────────────────────────────────────────────────────────
