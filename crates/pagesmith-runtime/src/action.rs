use serde::{Deserialize, Serialize};

// ─── Status ───────────────────────────────────────────────────────────────

/// Lifecycle state of a single action.
///
/// ```text
/// pending --(run, turn arrives)--> running --(exit 0)--> complete
/// pending --(run, file write ok)--> complete
/// pending --(run, file write err)--> failed
/// running --(exit != 0)--> failed
/// pending|running --(abort_all)--> aborted
/// ```
///
/// `Complete`, `Failed` and `Aborted` are terminal: no action ever leaves
/// them, and in particular a late exit signal never overturns `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Running,
    Complete,
    Aborted,
    Failed,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionStatus::Complete | ActionStatus::Aborted | ActionStatus::Failed
        )
    }
}

// ─── Payload ──────────────────────────────────────────────────────────────

/// The executable content of an action, discriminated by the JSON `"type"`
/// field emitted by the message parser.
///
/// Field names accept both snake_case and the parser's camelCase.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionPayload {
    /// A shell command to run inside the sandbox.
    Shell { content: String },
    /// A full-content file write inside the sandbox working directory.
    File {
        #[serde(rename(serialize = "filePath"), alias = "filePath")]
        file_path: String,
        content: String,
    },
}

impl ActionPayload {
    pub fn is_shell(&self) -> bool {
        matches!(self, ActionPayload::Shell { .. })
    }
}

// ─── ActionState ──────────────────────────────────────────────────────────

/// One entry in the [`ActionStore`](crate::store::ActionStore): the payload
/// plus where it currently sits in its lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct ActionState {
    pub id: String,
    pub payload: ActionPayload,
    pub status: ActionStatus,
    /// Populated when `status` is `Failed`.
    pub error: Option<String>,
}

impl ActionState {
    pub(crate) fn new(id: String, payload: ActionPayload) -> Self {
        ActionState {
            id,
            payload,
            status: ActionStatus::Pending,
            error: None,
        }
    }
}

// ─── Parser callback shapes ───────────────────────────────────────────────

/// Emitted by the message parser when an artifact opens in the LLM output.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactCallbackData {
    #[serde(alias = "artifactId")]
    pub artifact_id: String,
    #[serde(alias = "messageId")]
    pub message_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Emitted by the message parser for each action inside an artifact.
/// The sole input shape to `add_action` / `run_action`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionCallbackData {
    #[serde(alias = "artifactId")]
    pub artifact_id: String,
    #[serde(alias = "messageId")]
    pub message_id: String,
    #[serde(alias = "actionId")]
    pub action_id: String,
    pub action: ActionPayload,
}

// ─── Tests ────────────────────────────────────────────────────────────────
