//! Sandbox runtime trait and execution types.
//!
//! A [`Sandbox`] runs agent-issued commands and file operations under
//! some isolation strategy. Implementations differ in where the work
//! happens (host process, Docker container, nowhere at all for the
//! fail-closed stub) but share one contract:
//!
//! - `start` is side-effectful and may fail closed; `exec` and the
//!   filesystem bridge on a runtime that failed to start must surface
//!   the start error rather than run under weaker isolation.
//! - Streamed execution delivers whole chunks, serializes events to the
//!   caller's handler, and always ends with [`ExecEvent::Exit`].
//! - Cancellation is cooperative: every suspending operation observes
//!   the caller's [`CancellationToken`].

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Execution Types
// =============================================================================

/// A single command to run inside a sandbox.
///
/// With empty `args` the command line is interpreted by a shell;
/// otherwise `command` is spawned directly with `args` as its argument
/// vector.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub command: String,
    pub args: Vec<String>,
    /// Working directory, resolved against the workspace.
    pub working_dir: Option<String>,
    /// Hard deadline in milliseconds; zero means no deadline.
    pub timeout_ms: u64,
    /// Extra environment for the spawned process.
    pub env: HashMap<String, String>,
}

/// Captured output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

/// One event in a streamed execution. Chunks are delivered whole and in
/// arrival order; `Exit` is always the final event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Exit(i64),
}

/// Callback receiving streamed execution events. Events are serialized:
/// the handler is never invoked concurrently with itself.
pub type ExecEventHandler<'a> = &'a mut (dyn FnMut(ExecEvent) + Send);

/// Quotes `s` for safe inclusion in a POSIX shell command line: the
/// whole string is single-quoted and embedded single quotes become
/// `'"'"'`.
pub fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

// =============================================================================
// Traits
// =============================================================================

/// Filesystem access through a sandbox, containment included.
#[async_trait]
pub trait FsBridge: Send + Sync {
    async fn read_file(&self, ctx: &CancellationToken, path: &str) -> Result<Vec<u8>>;

    /// Writes `data` to `path`; with `mkdir` set, missing parent
    /// directories are created first.
    async fn write_file(
        &self,
        ctx: &CancellationToken,
        path: &str,
        data: &[u8],
        mkdir: bool,
    ) -> Result<()>;
}

/// An execution sandbox. Implementations must be `Send + Sync`; a
/// single instance may serve concurrent `exec` calls.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Brings the sandbox up. Idempotent on success; on failure the
    /// error is sticky and replayed by every later operation.
    async fn start(&self, ctx: &CancellationToken) -> Result<()>;

    /// Best-effort shutdown of the execution environment.
    async fn stop(&self, ctx: &CancellationToken) -> Result<()>;

    /// Evicts idle or aged execution environments.
    async fn prune(&self, ctx: &CancellationToken) -> Result<()>;

    /// The sandbox's filesystem bridge.
    fn fs(&self) -> Arc<dyn FsBridge>;

    /// Runs a command to completion, buffering its output.
    async fn exec(&self, ctx: &CancellationToken, req: ExecRequest) -> Result<ExecResult> {
        self.exec_stream(ctx, req, &mut |_event| {}).await
    }

    /// Runs a command, forwarding output to `on_event` as it arrives.
    /// The buffered [`ExecResult`] is returned as well.
    async fn exec_stream(
        &self,
        ctx: &CancellationToken,
        req: ExecRequest,
        on_event: ExecEventHandler<'_>,
    ) -> Result<ExecResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_escape_quotes_embedded_single_quotes() {
        assert_eq!(shell_escape("a'b"), r#"'a'"'"'b'"#);
        assert_eq!(shell_escape("plain"), "'plain'");
        assert_eq!(shell_escape(""), "''");
        assert_eq!(shell_escape("$HOME `ls` \"x\""), "'$HOME `ls` \"x\"'");
    }
}
