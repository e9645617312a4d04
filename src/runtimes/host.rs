//! Host-backed sandbox.
//!
//! Commands run as ordinary host processes and file operations hit the
//! real filesystem; the only barrier is the path guard, which confines
//! every path (working directories included) to the workspace when
//! restriction is enabled. `start` and `prune` are no-ops because there
//! is no environment to bring up or evict.
//!
//! Streamed execution spawns the child with piped stdio, pumps stdout
//! and stderr concurrently into one bounded channel, and drains that
//! channel from a single consumer, so the caller's event handler sees a
//! serialized stream even though production is concurrent.

use crate::constants::{STREAM_BUF_SIZE, STREAM_CHANNEL_CAPACITY};
use crate::error::{Error, Result};
use crate::pathguard::resolve_path;
use crate::runtime::{ExecEvent, ExecEventHandler, ExecRequest, ExecResult, FsBridge, Sandbox};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Sandbox that executes directly on the host.
pub struct HostSandbox {
    workspace: String,
    restrict: bool,
    fs: Arc<HostFs>,
}

impl HostSandbox {
    pub fn new(workspace: impl Into<String>, restrict: bool) -> Self {
        let workspace = workspace.into();
        let fs = Arc::new(HostFs {
            workspace: workspace.clone(),
            restrict,
        });
        Self {
            workspace,
            restrict,
            fs,
        }
    }
}

#[async_trait]
impl Sandbox for HostSandbox {
    async fn start(&self, _ctx: &CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn stop(&self, _ctx: &CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn prune(&self, _ctx: &CancellationToken) -> Result<()> {
        Ok(())
    }

    fn fs(&self) -> Arc<dyn FsBridge> {
        self.fs.clone()
    }

    async fn exec_stream(
        &self,
        ctx: &CancellationToken,
        req: ExecRequest,
        on_event: ExecEventHandler<'_>,
    ) -> Result<ExecResult> {
        if req.command.trim().is_empty() {
            return Err(Error::EmptyCommand);
        }

        let mut cmd = if !req.args.is_empty() {
            let mut cmd = Command::new(&req.command);
            cmd.args(&req.args);
            cmd
        } else if cfg!(windows) {
            let mut cmd = Command::new("powershell");
            cmd.args(["-NoProfile", "-NonInteractive", "-Command", &req.command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", &req.command]);
            cmd
        };

        if let Some(dir) = req.working_dir.as_deref().filter(|d| !d.is_empty()) {
            let resolved = resolve_path(dir, &self.workspace, self.restrict)?;
            cmd.current_dir(resolved);
        }

        cmd.envs(&req.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        debug!(command = %req.command, "spawned host process");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| pipe_error("stdout pipe setup failed"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| pipe_error("stderr pipe setup failed"))?;

        let deadline = (req.timeout_ms > 0)
            .then(|| Instant::now() + std::time::Duration::from_millis(req.timeout_ms));

        let (tx, mut rx) = mpsc::channel::<ExecEvent>(STREAM_CHANNEL_CAPACITY);
        let out_pump = tokio::spawn(pump(stdout, ExecEvent::Stdout as fn(Vec<u8>) -> ExecEvent, tx.clone()));
        let err_pump = tokio::spawn(pump(stderr, ExecEvent::Stderr as fn(Vec<u8>) -> ExecEvent, tx));

        let mut stdout_buf: Vec<u8> = Vec::new();
        let mut stderr_buf: Vec<u8> = Vec::new();

        // Single consumer: both pumps feed one channel, so events reach
        // the handler serialized and whole.
        loop {
            let event = tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = ctx.cancelled() => {
                    let _ = child.kill().await;
                    return Err(Error::Cancelled);
                }
                _ = sleep_until_opt(deadline) => {
                    let _ = child.kill().await;
                    return Err(Error::Timeout { ms: req.timeout_ms });
                }
            };
            match &event {
                ExecEvent::Stdout(chunk) => stdout_buf.extend_from_slice(chunk),
                ExecEvent::Stderr(chunk) => stderr_buf.extend_from_slice(chunk),
                ExecEvent::Exit(_) => {}
            }
            on_event(event);
        }

        // Surface pump read failures before looking at the exit status.
        for pump_result in [out_pump.await, err_pump.await] {
            match pump_result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                    return Err(err.into());
                }
                Err(join_err) => {
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                    return Err(pipe_error(&format!("stream task failed: {join_err}")));
                }
            }
        }

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = ctx.cancelled() => {
                let _ = child.kill().await;
                return Err(Error::Cancelled);
            }
            _ = sleep_until_opt(deadline) => {
                let _ = child.kill().await;
                return Err(Error::Timeout { ms: req.timeout_ms });
            }
        };

        let exit_code = status.code().map(i64::from).unwrap_or(-1);
        on_event(ExecEvent::Exit(exit_code));

        Ok(ExecResult {
            stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
            exit_code,
        })
    }
}

/// Reads a child stream in fixed-size chunks and forwards each whole
/// chunk as an event. Ends on EOF or when the consumer goes away.
async fn pump<R: AsyncRead + Unpin>(
    mut reader: R,
    make_event: fn(Vec<u8>) -> ExecEvent,
    tx: mpsc::Sender<ExecEvent>,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; STREAM_BUF_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        if tx.send(make_event(buf[..n].to_vec())).await.is_err() {
            return Ok(());
        }
    }
}

fn pipe_error(message: &str) -> Error {
    Error::Io(std::io::Error::other(message.to_string()))
}

/// Sleeps until `deadline`, or forever when no deadline is set.
pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Path-guarded filesystem access on the host.
struct HostFs {
    workspace: String,
    restrict: bool,
}

#[async_trait]
impl FsBridge for HostFs {
    async fn read_file(&self, _ctx: &CancellationToken, path: &str) -> Result<Vec<u8>> {
        let resolved = resolve_path(path, &self.workspace, self.restrict)?;
        Ok(tokio::fs::read(resolved).await?)
    }

    async fn write_file(
        &self,
        _ctx: &CancellationToken,
        path: &str,
        data: &[u8],
        mkdir: bool,
    ) -> Result<()> {
        let resolved = resolve_path(path, &self.workspace, self.restrict)?;
        if mkdir {
            if let Some(parent) = resolved.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(tokio::fs::write(resolved, data).await?)
    }
}
