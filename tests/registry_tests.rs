//! Tests for the fingerprint registry and its cross-process file lock.

use picoclaw_sandbox::registry::{load_registry, save_registry};
use picoclaw_sandbox::{config_fingerprint, registry_path, ContainerConfig, RegistryEntry, RegistryFile, RegistryLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Serializes tests that mutate process environment variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

// =============================================================================
// Registry Path
// =============================================================================

#[test]
fn registry_path_uses_home_state_dir() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let home = TempDir::new().unwrap();
    let old_home = std::env::var_os("HOME");
    let old_pico = std::env::var_os("PICOCLAW_HOME");
    std::env::set_var("HOME", home.path());
    std::env::remove_var("PICOCLAW_HOME");

    let want: PathBuf = home
        .path()
        .join(".picoclaw")
        .join("state")
        .join("sandbox")
        .join("containers.json");
    let got = registry_path();

    match old_home {
        Some(v) => std::env::set_var("HOME", v),
        None => std::env::remove_var("HOME"),
    }
    if let Some(v) = old_pico {
        std::env::set_var("PICOCLAW_HOME", v);
    }

    assert_eq!(got, want);
}

#[test]
fn registry_path_honors_state_home_override() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let pico_home = TempDir::new().unwrap();
    let old_pico = std::env::var_os("PICOCLAW_HOME");
    std::env::set_var("PICOCLAW_HOME", pico_home.path());

    let want: PathBuf = pico_home
        .path()
        .join("state")
        .join("sandbox")
        .join("containers.json");
    let got = registry_path();

    match old_pico {
        Some(v) => std::env::set_var("PICOCLAW_HOME", v),
        None => std::env::remove_var("PICOCLAW_HOME"),
    }

    assert_eq!(got, want);
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn registry_survives_a_disk_roundtrip() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("state").join("sandbox").join("containers.json");

    let mut registry = RegistryFile::default();
    registry.containers.insert(
        "abc123".into(),
        RegistryEntry {
            container_id: "deadbeef".into(),
            created_at: chrono::Utc::now(),
            last_used_at: chrono::Utc::now(),
        },
    );
    save_registry(&path, &registry).unwrap();

    let loaded = load_registry(&path).unwrap();
    assert_eq!(loaded.containers.len(), 1);
    assert_eq!(loaded.containers["abc123"].container_id, "deadbeef");
}

#[test]
fn missing_registry_loads_empty() {
    let root = TempDir::new().unwrap();
    let loaded = load_registry(&root.path().join("nope.json")).unwrap();
    assert!(loaded.containers.is_empty());
}

// =============================================================================
// Fingerprint
// =============================================================================

#[test]
fn fingerprint_is_env_order_insensitive_and_sequence_order_sensitive() {
    let mut cfg = ContainerConfig {
        image: "img".into(),
        workspace: "/tmp/ws".into(),
        workdir: "/workspace".into(),
        ..ContainerConfig::default()
    };

    cfg.env = HashMap::from([
        ("A".to_string(), "1".to_string()),
        ("B".to_string(), "2".to_string()),
    ]);
    let left = config_fingerprint(&cfg);
    cfg.env = HashMap::from([
        ("B".to_string(), "2".to_string()),
        ("A".to_string(), "1".to_string()),
    ]);
    assert_eq!(left, config_fingerprint(&cfg));

    cfg.dns = vec!["1.1.1.1".into(), "8.8.8.8".into()];
    let left = config_fingerprint(&cfg);
    cfg.dns = vec!["8.8.8.8".into(), "1.1.1.1".into()];
    assert_ne!(left, config_fingerprint(&cfg));
}

#[test]
fn equal_configs_share_a_fingerprint() {
    let make = || ContainerConfig {
        image: "img".into(),
        workspace: "/tmp/ws".into(),
        workspace_access: "rw".into(),
        network: "none".into(),
        ..ContainerConfig::default()
    };
    assert_eq!(config_fingerprint(&make()), config_fingerprint(&make()));
}

// =============================================================================
// File Lock
// =============================================================================

#[tokio::test]
async fn second_holder_blocks_until_first_releases() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("sandbox").join("registry.json");

    let first = RegistryLock::acquire(&path).await.unwrap();

    let contender_path = path.clone();
    let contender = tokio::spawn(async move {
        let lock = RegistryLock::acquire(&contender_path).await.unwrap();
        lock.release();
    });

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(
        !contender.is_finished(),
        "second holder must block while the first holds the lock"
    );
    first.release();

    tokio::time::timeout(Duration::from_secs(2), contender)
        .await
        .expect("second holder should acquire within 2s of release")
        .unwrap();
}
