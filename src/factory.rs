//! Runtime selection and tool routing policy.
//!
//! The factory turns declarative configuration into a concrete sandbox:
//! mode `off` yields the host runtime, `all` and `exec` yield the
//! container runtime. Configurations the security validator rejects
//! never produce a container runtime; the caller gets a fail-closed
//! stub whose every operation replays the validator's error.

use crate::config::{ContainerConfig, SandboxConfig};
use crate::constants::WORKSPACE_MOUNT;
use crate::runtime::Sandbox;
use crate::runtimes::{ContainerSandbox, HostSandbox, UnavailableSandbox};
use crate::security::validate_sandbox_security;
use std::sync::Arc;
use tracing::warn;

/// Builds the sandbox for a session from its workspace and the sandbox
/// section of the configuration.
pub fn new_from_config(workspace: &str, restrict: bool, cfg: &SandboxConfig) -> Arc<dyn Sandbox> {
    match cfg.mode.trim().to_ascii_lowercase().as_str() {
        "all" | "exec" => {
            let container_cfg = container_config_from(workspace, cfg);
            if let Err(err) = validate_sandbox_security(&container_cfg) {
                warn!(error = %err, "sandbox configuration rejected, isolation unavailable");
                return Arc::new(UnavailableSandbox::new(err));
            }
            Arc::new(ContainerSandbox::new(container_cfg))
        }
        _ => Arc::new(HostSandbox::new(workspace, restrict)),
    }
}

fn container_config_from(workspace: &str, cfg: &SandboxConfig) -> ContainerConfig {
    let docker = &cfg.docker;
    ContainerConfig {
        image: docker.image.clone(),
        workspace: expand_home_path(workspace),
        workspace_access: docker.workspace_access.clone(),
        workspace_root: expand_home_path(&docker.workspace_root),
        workdir: if docker.workdir.is_empty() {
            WORKSPACE_MOUNT.to_string()
        } else {
            docker.workdir.clone()
        },
        network: docker.network.clone(),
        binds: docker.binds.clone(),
        dns: docker.dns.clone(),
        env: docker.env.clone(),
        tmpfs: docker.tmpfs.clone(),
        read_only_root: docker.read_only_root,
        pids_limit: docker.pids_limit,
        memory: docker.memory.clone(),
        memory_swap: docker.memory_swap.clone(),
        cpus: docker.cpus,
        seccomp_profile: docker.seccomp_profile.clone(),
        apparmor_profile: docker.apparmor_profile.clone(),
        cap_drop: docker.cap_drop.clone(),
        ulimits: docker.ulimits.clone(),
        setup_command: docker.setup_command.clone(),
        prune_idle_hours: cfg.prune.idle_hours,
        prune_max_age_days: cfg.prune.max_age_days,
    }
}

/// Whether `tool` routes through the sandbox. The deny list wins over
/// the allow list; a non-empty allow list is exhaustive; without
/// configuration, per-tool defaults apply (`list_dir` stays on the
/// host, everything else is sandboxed).
pub fn is_tool_sandbox_enabled(cfg: Option<&SandboxConfig>, tool: &str) -> bool {
    if let Some(cfg) = cfg {
        if cfg.tools.deny.iter().any(|denied| denied == tool) {
            return false;
        }
        if !cfg.tools.allow.is_empty() {
            return cfg.tools.allow.iter().any(|allowed| allowed == tool);
        }
    }
    default_tool_sandboxed(tool)
}

fn default_tool_sandboxed(tool: &str) -> bool {
    !matches!(tool, "list_dir")
}

/// Expands a leading `~` or `~/` to the user's home directory. Empty
/// input and paths without a tilde prefix pass through unchanged, as
/// does everything when no home directory can be determined.
pub fn expand_home_path(path: &str) -> String {
    if path.is_empty() || (path != "~" && !path.starts_with("~/")) {
        return path.to_string();
    }
    let Some(home) = dirs::home_dir() else {
        return path.to_string();
    };
    if path == "~" {
        return home.to_string_lossy().into_owned();
    }
    home.join(path.trim_start_matches("~/"))
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_policy_defaults() {
        assert!(is_tool_sandbox_enabled(None, "exec"));
        assert!(!is_tool_sandbox_enabled(None, "list_dir"));
        assert!(is_tool_sandbox_enabled(None, "read_file"));
    }

    #[test]
    fn tool_policy_deny_wins_over_allow() {
        let mut cfg = SandboxConfig::default();
        cfg.tools.allow = vec!["exec".into(), "write_file".into()];
        cfg.tools.deny = vec!["write_file".into()];

        assert!(is_tool_sandbox_enabled(Some(&cfg), "exec"));
        assert!(!is_tool_sandbox_enabled(Some(&cfg), "read_file"));
        assert!(!is_tool_sandbox_enabled(Some(&cfg), "write_file"));
    }

    #[test]
    fn tool_policy_empty_allow_means_all() {
        let mut cfg = SandboxConfig::default();
        cfg.tools.deny = vec!["cron".into()];

        assert!(is_tool_sandbox_enabled(Some(&cfg), "read_file"));
        assert!(!is_tool_sandbox_enabled(Some(&cfg), "cron"));
    }

    #[test]
    fn home_expansion() {
        assert_eq!(expand_home_path(""), "");
        assert_eq!(expand_home_path("abc"), "abc");
        assert_eq!(expand_home_path("/abs/path"), "/abs/path");

        let home = expand_home_path("~");
        assert!(!home.is_empty() && home != "~");

        let nested = expand_home_path("~/x");
        assert!(nested.ends_with("/x") && !nested.starts_with('~'));
    }

    #[tokio::test]
    async fn factory_honors_mode() {
        let root = tempfile::TempDir::new().unwrap();
        let workspace = root.path().to_str().unwrap();

        let mut cfg = SandboxConfig::default();
        cfg.mode = "off".into();
        // Host sandbox starts cleanly.
        let sb = new_from_config(workspace, true, &cfg);
        let ctx = tokio_util::sync::CancellationToken::new();
        sb.start(&ctx).await.unwrap();
        sb.stop(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn factory_downgrades_blocked_config_to_unavailable() {
        let root = tempfile::TempDir::new().unwrap();
        let workspace = root.path().to_str().unwrap();

        let mut cfg = SandboxConfig::default();
        cfg.mode = "all".into();
        cfg.docker.network = "host".into();

        let sb = new_from_config(workspace, true, &cfg);
        let ctx = tokio_util::sync::CancellationToken::new();
        let err = sb.start(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("network mode"), "{err}");
    }
}
