use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no artifact registered for message {0}")]
    UnknownArtifact(String),

    #[error("failed to spawn command: {0}")]
    Spawn(String),

    #[error("failed to write {path}: {reason}")]
    FileWrite { path: String, reason: String },

    #[error("path escapes the sandbox working directory: {0}")]
    PathEscape(String),

    #[error("sandbox unavailable: {0}")]
    Sandbox(#[from] SandboxUnavailable),
}

/// Boot failure of the injected sandbox.
///
/// Lives in its own cloneable type because the sandbox handle is shared as a
/// [`futures::future::Shared`], whose output must be `Clone`.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SandboxUnavailable(pub String);

pub type Result<T> = std::result::Result<T, RuntimeError>;
