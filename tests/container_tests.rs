//! Tests for the container-backed sandbox.
//!
//! The container engine is not assumed to be present: tests that would
//! need a live daemon assert the fail-closed path and skip their
//! engine-side assertions when one happens to be running.

use picoclaw_sandbox::{
    parse_byte_limit, resolve_container_path, shell_escape, ContainerConfig, ContainerSandbox,
    ExecRequest, Sandbox,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Container-Space Path Resolution
// =============================================================================

#[test]
fn container_paths_resolve_under_workspace_mount() {
    assert_eq!(
        resolve_container_path("foo/bar.txt").unwrap(),
        "/workspace/foo/bar.txt"
    );
    assert_eq!(
        resolve_container_path("/workspace/a/b.txt").unwrap(),
        "/workspace/a/b.txt"
    );
}

#[test]
fn container_path_escapes_are_rejected() {
    let err = resolve_container_path("../../etc/passwd").unwrap_err();
    assert!(err.to_string().contains("outside container workspace"), "{err}");

    let err = resolve_container_path("/etc/passwd").unwrap_err();
    assert!(err.to_string().contains("outside container workspace"), "{err}");
}

// =============================================================================
// Helpers
// =============================================================================

#[test]
fn byte_limit_scenarios() {
    assert_eq!(parse_byte_limit("1024").unwrap(), 1024);
    assert_eq!(parse_byte_limit("1g").unwrap(), 1_073_741_824);
    assert!(parse_byte_limit("not-a-size").is_err());
}

#[test]
fn shell_escape_roundtrip() {
    assert_eq!(shell_escape("a'b"), r#"'a'"'"'b'"#);

    // A single-quoted interpretation of the escaped form yields the
    // original byte-for-byte.
    for input in ["plain", "a'b", "''", "$HOME", "a b\tc", "-n"] {
        let escaped = shell_escape(input);
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(format!("printf %s {escaped}"))
            .output()
            .unwrap();
        assert_eq!(output.stdout, input.as_bytes(), "escaping {input:?}");
    }
}

// =============================================================================
// Start (Fail-Closed)
// =============================================================================

#[tokio::test]
async fn blocked_security_config_fails_start() {
    let sb = ContainerSandbox::new(ContainerConfig {
        network: "host".into(),
        ..ContainerConfig::default()
    });
    let err = sb.start(&CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("network mode"), "{err}");
}

#[tokio::test]
async fn failed_start_is_sticky_for_exec_and_fs() {
    let sb = ContainerSandbox::new(ContainerConfig {
        seccomp_profile: "unconfined".into(),
        ..ContainerConfig::default()
    });
    let ctx = CancellationToken::new();
    let start_err = sb.start(&ctx).await.unwrap_err().to_string();

    // Repeated start replays the same failure instead of retrying.
    let again = sb.start(&ctx).await.unwrap_err().to_string();
    assert_eq!(start_err, again);

    let exec_err = sb
        .exec(
            &ctx,
            ExecRequest {
                command: "echo hi".into(),
                ..ExecRequest::default()
            },
        )
        .await
        .unwrap_err()
        .to_string();
    assert!(exec_err.contains("sandbox unavailable"), "{exec_err}");
    assert!(exec_err.contains(&start_err), "{exec_err} vs {start_err}");

    let fs_err = sb
        .fs()
        .read_file(&ctx, "a.txt")
        .await
        .unwrap_err()
        .to_string();
    assert!(fs_err.contains(&start_err), "{fs_err}");
}

#[tokio::test]
async fn start_creates_workspace_before_engine_contact() {
    let holder = TempDir::new().unwrap();
    let workspace = holder.path().join("workspace");
    let workspace_root = holder.path().join("sandbox-root");

    let sb = ContainerSandbox::new(ContainerConfig {
        workspace: workspace.to_string_lossy().into_owned(),
        workspace_root: workspace_root.to_string_lossy().into_owned(),
        workspace_access: "none".into(),
        ..ContainerConfig::default()
    });

    let ctx = CancellationToken::new();
    match sb.start(&ctx).await {
        // A live daemon in this environment: exercise teardown instead.
        Ok(()) => {
            let _ = sb.prune(&ctx).await;
            let _ = sb.stop(&ctx).await;
        }
        Err(err) => {
            assert!(
                err.to_string().contains("docker daemon unavailable"),
                "{err}"
            );
        }
    }

    assert!(workspace.is_dir(), "workspace must exist before engine ping");
    assert!(workspace_root.is_dir(), "workspace root must exist before engine ping");
}

// =============================================================================
// Prune / Stop
// =============================================================================

#[tokio::test]
async fn prune_and_stop_without_engine_are_noops() {
    let sb = ContainerSandbox::new(ContainerConfig {
        prune_idle_hours: 1,
        prune_max_age_days: 1,
        ..ContainerConfig::default()
    });
    let ctx = CancellationToken::new();
    sb.prune(&ctx).await.unwrap();
    sb.stop(&ctx).await.unwrap();
}
