//! Fail-closed stub sandbox.
//!
//! Stands in when isolation was requested but cannot be provided (for
//! example, the security validator rejected the configuration at
//! construction time). The error that prevented isolation is replayed
//! by `start` and wrapped by every execution and filesystem call, so
//! nothing ever runs under weaker isolation than the caller asked for.

use crate::error::{Error, Result};
use crate::runtime::{ExecEventHandler, ExecRequest, ExecResult, FsBridge, Sandbox};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Sandbox that refuses every operation with a fixed cause.
pub struct UnavailableSandbox {
    cause: Arc<Error>,
    fs: Arc<ErrorFs>,
}

impl UnavailableSandbox {
    pub fn new(cause: Error) -> Self {
        let cause = Arc::new(cause);
        let fs = Arc::new(ErrorFs {
            cause: cause.clone(),
        });
        Self { cause, fs }
    }
}

#[async_trait]
impl Sandbox for UnavailableSandbox {
    async fn start(&self, _ctx: &CancellationToken) -> Result<()> {
        Err(Error::StartFailed(self.cause.clone()))
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
        _ctx: &CancellationToken,
        _req: ExecRequest,
        _on_event: ExecEventHandler<'_>,
    ) -> Result<ExecResult> {
        Err(Error::unavailable(&self.cause))
    }
}

struct ErrorFs {
    cause: Arc<Error>,
}

#[async_trait]
impl FsBridge for ErrorFs {
    async fn read_file(&self, _ctx: &CancellationToken, _path: &str) -> Result<Vec<u8>> {
        Err(Error::unavailable(&self.cause))
    }

    async fn write_file(
        &self,
        _ctx: &CancellationToken,
        _path: &str,
        _data: &[u8],
        _mkdir: bool,
    ) -> Result<()> {
        Err(Error::unavailable(&self.cause))
    }
}
