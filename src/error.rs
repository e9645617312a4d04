//! Error types for the sandbox layer.

use std::sync::Arc;

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the sandbox layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Path Guard Errors
    // =========================================================================
    /// A path escaped the workspace lexically.
    #[error("access denied: path is outside the workspace")]
    PathOutsideWorkspace,

    /// A path escaped the workspace through a symbolic link.
    #[error("access denied: symlink resolves outside workspace")]
    SymlinkOutsideWorkspace,

    /// A container-space path escaped the workspace mount.
    #[error("access denied: path {0:?} is outside container workspace")]
    OutsideContainerWorkspace(String),

    /// The filesystem could not resolve a path for a reason other
    /// than absence.
    #[error("failed to resolve path: {0}")]
    PathResolution(String),

    /// A container path has no host-side equivalent under the current
    /// workspace access mode.
    #[error("container path {path:?} has no host mapping under workspace access {access:?}")]
    NoHostMapping { path: String, access: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// A numeric or unit-suffixed limit could not be parsed.
    #[error("invalid {field}: {value:?}")]
    InvalidLimit { field: String, value: String },

    /// Failed to create the workspace directories on the host.
    #[error("failed to prepare workspace {path}: {reason}")]
    WorkspaceSetup { path: String, reason: String },

    // =========================================================================
    // Policy Errors
    // =========================================================================
    /// The security validator rejected the container configuration.
    #[error("sandbox security: {0}")]
    Policy(String),

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// The container engine could not be reached.
    #[error("docker daemon unavailable: {0}")]
    EngineUnavailable(String),

    /// An engine RPC failed after connection.
    #[error("docker {op} failed: {reason}")]
    EngineCall { op: &'static str, reason: String },

    // =========================================================================
    // Exec Errors
    // =========================================================================
    /// The request carried no command to run.
    #[error("empty command")]
    EmptyCommand,

    /// A runtime operation was attempted before `start` succeeded.
    #[error("sandbox container not started")]
    NotStarted,

    /// The container setup command exited nonzero.
    #[error("setup command failed with exit code {0}")]
    SetupFailed(i64),

    // =========================================================================
    // Registry Errors
    // =========================================================================
    /// The on-disk container registry could not be read or written.
    #[error("sandbox registry: {0}")]
    Registry(String),

    // =========================================================================
    // Cancellation
    // =========================================================================
    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The request deadline expired before the operation finished.
    #[error("operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    // =========================================================================
    // Propagation
    // =========================================================================
    /// An error captured at `start` and replayed to a later caller.
    #[error("{0}")]
    StartFailed(Arc<Error>),

    /// A downstream operation refused because the sandbox never came up.
    #[error("sandbox unavailable: {0}")]
    Unavailable(Arc<Error>),

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps a shared start error the way every post-start operation
    /// reports it.
    pub fn unavailable(cause: &Arc<Error>) -> Error {
        Error::Unavailable(Arc::clone(cause))
    }
}
