//! # picoclaw-sandbox
//!
//! **Agent-Side Execution Sandbox**
//!
//! This crate runs agent-issued shell commands and filesystem operations
//! under configurable isolation. It chooses between a container-backed
//! isolated runtime and a host-backed workspace-restricted runtime, and
//! enforces a security policy so a misconfigured or adversarial agent
//! cannot escape the declared workspace.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        picoclaw-sandbox                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                      Sandbox Trait                        │  │
//! │  │   start → exec / exec_stream / fs → stop / prune          │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                │                 │                 │            │
//! │      ┌─────────┴────┐  ┌─────────┴─────────┐  ┌────┴─────────┐  │
//! │      │ HostSandbox  │  │ ContainerSandbox  │  │ Unavailable  │  │
//! │      │  path guard  │  │  Docker + policy  │  │  fail-closed │  │
//! │      │  host procs  │  │  gate + registry  │  │     stub     │  │
//! │      └──────────────┘  └───────────────────┘  └──────────────┘  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Path Guard │ Security Validator │ Fingerprint Registry (file  │
//! │  (symlink-safe containment)      │ lock, shared across procs)  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Security Model
//!
//! - **Workspace containment**: every agent-visible path resolves to a
//!   descendant of the declared workspace, symlinks included, unless
//!   containment is explicitly disabled (see [`pathguard`]).
//! - **Fail-closed startup**: the [`security`] validator gates every
//!   container configuration before the engine is contacted. A
//!   violation is a startup failure, never a runtime degradation, and
//!   the failure is replayed by every later call.
//! - **Env hygiene**: secret-bearing and NUL-tainted environment
//!   variables are stripped before they reach a container.
//! - **Bounded containers**: memory, CPU, PID, and ulimit settings
//!   translate into engine limits; host networking and `unconfined`
//!   profiles are rejected outright.
//!
//! # Container Reuse
//!
//! Container creation is expensive, so containers are keyed by a stable
//! fingerprint of their security-relevant configuration and tracked in
//! an on-disk [`registry`] shared by every process on the host. A
//! `start` adopts the registered container when the engine still knows
//! it, and `prune` evicts containers that sat idle or grew too old.
//!
//! # Example
//!
//! ```rust,ignore
//! use picoclaw_sandbox::{new_from_config, ExecRequest, SandboxConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> picoclaw_sandbox::Result<()> {
//!     let mut cfg = SandboxConfig::default();
//!     cfg.mode = "all".into();
//!     cfg.docker.image = "alpine:3.20".into();
//!     cfg.docker.network = "none".into();
//!     cfg.docker.workspace_access = "rw".into();
//!
//!     let sandbox = new_from_config("/tmp/session-ws", true, &cfg);
//!     let ctx = CancellationToken::new();
//!     sandbox.start(&ctx).await?;
//!
//!     let result = sandbox
//!         .exec(&ctx, ExecRequest {
//!             command: "echo hello".into(),
//!             ..ExecRequest::default()
//!         })
//!         .await?;
//!     println!("{}", result.stdout);
//!
//!     sandbox.stop(&ctx).await
//! }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod factory;
pub mod pathguard;
pub mod registry;
pub mod runtime;
pub mod runtimes;
pub mod security;

pub use config::{
    normalize_workspace_access, ContainerConfig, DockerConfig, PruneConfig, SandboxConfig,
    ToolPolicyConfig, UlimitValue,
};
pub use error::{Error, Result};
pub use factory::{expand_home_path, is_tool_sandbox_enabled, new_from_config};
pub use pathguard::{resolve_container_path, resolve_path};
pub use registry::{config_fingerprint, registry_path, RegistryEntry, RegistryFile, RegistryLock};
pub use runtime::{
    shell_escape, ExecEvent, ExecEventHandler, ExecRequest, ExecResult, FsBridge, Sandbox,
};
pub use runtimes::container::parse_byte_limit;
pub use runtimes::{ContainerSandbox, HostSandbox, UnavailableSandbox};
pub use security::{sanitize_env_vars, validate_sandbox_security};
