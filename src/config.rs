//! Declarative sandbox configuration.
//!
//! These types describe the slice of agent configuration the sandbox
//! factory consumes. Parsing configuration files is the caller's
//! concern; everything here is plain data with serde derives and
//! defaults, so a partially specified document deserializes into a
//! usable value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sandbox section of the agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Isolation mode: `off` runs on the host, `all` and `exec` run
    /// inside a container. Unrecognized values fall back to `off`.
    pub mode: String,
    /// Container engine knobs.
    pub docker: DockerConfig,
    /// Idle/age thresholds for pruning reusable containers.
    pub prune: PruneConfig,
    /// Per-tool sandbox routing policy.
    pub tools: ToolPolicyConfig,
}

/// Container configuration as written by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Container image reference.
    pub image: String,
    /// Docker network mode (`none`, `bridge`, ...).
    pub network: String,
    /// Workspace mount mode: `ro`, `rw`, or `none`.
    pub workspace_access: String,
    /// Host directory under which per-session workspaces are created.
    pub workspace_root: String,
    /// Working directory inside the container.
    pub workdir: String,
    /// Additional bind mounts, `src:dst[:mode]`.
    pub binds: Vec<String>,
    /// DNS servers handed to the container.
    pub dns: Vec<String>,
    /// Environment variables for the container.
    pub env: HashMap<String, String>,
    /// Tmpfs mounts, `path[:opts]`.
    pub tmpfs: Vec<String>,
    /// Mount the root filesystem read-only.
    pub read_only_root: bool,
    /// PID limit; zero leaves the engine default.
    pub pids_limit: i64,
    /// Memory limit with optional `k`/`m`/`g` suffix.
    pub memory: String,
    /// Memory+swap limit with optional `k`/`m`/`g` suffix.
    pub memory_swap: String,
    /// CPU quota in whole or fractional CPUs.
    pub cpus: f64,
    /// Seccomp profile name or file.
    pub seccomp_profile: String,
    /// AppArmor profile name.
    pub apparmor_profile: String,
    /// Capabilities to drop.
    pub cap_drop: Vec<String>,
    /// Resource limits by ulimit name.
    pub ulimits: HashMap<String, UlimitValue>,
    /// Shell command run inside the container right after start.
    pub setup_command: String,
}

/// One ulimit entry. `value` sets both bounds; a lone `soft` or `hard`
/// mirrors into the other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UlimitValue {
    pub soft: Option<i64>,
    pub hard: Option<i64>,
    pub value: Option<i64>,
}

/// Prune thresholds. Zero disables the corresponding rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PruneConfig {
    /// Evict containers idle for at least this many hours.
    pub idle_hours: u64,
    /// Evict containers older than this many days.
    pub max_age_days: u64,
}

/// Which tools route through the sandbox. Deny wins over allow; an
/// empty allow list means "all tools".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPolicyConfig {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// The full set of knobs driving one container's creation. Built by the
/// factory from [`SandboxConfig`] plus the session workspace; immutable
/// once the sandbox computes its fingerprint.
#[derive(Debug, Clone, Default)]
pub struct ContainerConfig {
    pub image: String,
    pub workspace: String,
    pub workspace_access: String,
    pub workspace_root: String,
    pub workdir: String,
    pub network: String,
    pub binds: Vec<String>,
    pub dns: Vec<String>,
    pub env: HashMap<String, String>,
    pub tmpfs: Vec<String>,
    pub read_only_root: bool,
    pub pids_limit: i64,
    pub memory: String,
    pub memory_swap: String,
    pub cpus: f64,
    pub seccomp_profile: String,
    pub apparmor_profile: String,
    pub cap_drop: Vec<String>,
    pub ulimits: HashMap<String, UlimitValue>,
    pub setup_command: String,
    pub prune_idle_hours: u64,
    pub prune_max_age_days: u64,
}

/// Canonicalizes a workspace access mode. Anything that is not `ro` or
/// `rw` (case-insensitive) collapses to `none`.
pub fn normalize_workspace_access(mode: &str) -> &'static str {
    match mode.trim().to_ascii_lowercase().as_str() {
        "ro" => "ro",
        "rw" => "rw",
        _ => "none",
    }
}
