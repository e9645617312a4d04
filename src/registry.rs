//! On-disk container registry shared across processes.
//!
//! Reusable sandbox containers are tracked in a single JSON file mapping
//! configuration fingerprints to container identities. Every process on
//! the host reads and writes the same file, so mutation happens under an
//! advisory file lock on a sibling `.lock` file. Writes are atomic
//! (temp file + rename) so a crash never leaves a torn registry behind.
//!
//! The fingerprint is a SHA-256 over a canonical rendering of the
//! security-relevant configuration: map-shaped fields (env, ulimits) are
//! key-sorted before hashing, ordered fields (binds, DNS, cap drops,
//! tmpfs) hash in declared order. Two configurations with equal
//! fingerprints are interchangeable and may share a container.

use crate::config::{normalize_workspace_access, ContainerConfig};
use crate::constants::{
    HOME_STATE_DIR, LOCK_POLL_INTERVAL, REGISTRY_LOCK_SUFFIX, REGISTRY_RELATIVE_PATH,
    STATE_HOME_ENV,
};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

// =============================================================================
// Fingerprint
// =============================================================================

/// Computes the stable fingerprint of a container configuration.
pub fn config_fingerprint(cfg: &ContainerConfig) -> String {
    let env: BTreeMap<&String, &String> = cfg.env.iter().collect();
    let ulimits: BTreeMap<&String, serde_json::Value> = cfg
        .ulimits
        .iter()
        .map(|(name, ul)| {
            (
                name,
                json!({"soft": ul.soft, "hard": ul.hard, "value": ul.value}),
            )
        })
        .collect();

    let canonical = json!({
        "image": cfg.image,
        "workspace": cfg.workspace,
        "workspace_access": normalize_workspace_access(&cfg.workspace_access),
        "workspace_root": cfg.workspace_root,
        "workdir": cfg.workdir,
        "network": cfg.network,
        "binds": cfg.binds,
        "dns": cfg.dns,
        "env": env,
        "tmpfs": cfg.tmpfs,
        "read_only_root": cfg.read_only_root,
        "pids_limit": cfg.pids_limit,
        "memory": cfg.memory,
        "memory_swap": cfg.memory_swap,
        "cpus": cfg.cpus,
        "seccomp_profile": cfg.seccomp_profile,
        "apparmor_profile": cfg.apparmor_profile,
        "cap_drop": cfg.cap_drop,
        "ulimits": ulimits,
        "setup_command": cfg.setup_command,
    });

    format!("{:x}", Sha256::digest(canonical.to_string().as_bytes()))
}

// =============================================================================
// Registry File
// =============================================================================

/// One tracked container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub container_id: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// The persisted registry document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub containers: BTreeMap<String, RegistryEntry>,
}

/// Location of the registry file: `$PICOCLAW_HOME/state/...` when the
/// override is set, else `$HOME/.picoclaw/state/...`.
pub fn registry_path() -> PathBuf {
    let state_root = match std::env::var_os(STATE_HOME_ENV) {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(HOME_STATE_DIR),
    };
    REGISTRY_RELATIVE_PATH
        .iter()
        .fold(state_root, |path, part| path.join(part))
}

/// Loads the registry, treating a missing file as empty.
pub fn load_registry(path: &Path) -> Result<RegistryFile> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(RegistryFile::default())
        }
        Err(err) => return Err(Error::Registry(format!("read {}: {err}", path.display()))),
    };
    serde_json::from_slice(&raw)
        .map_err(|err| Error::Registry(format!("parse {}: {err}", path.display())))
}

/// Persists the registry atomically via a temp file + rename.
pub fn save_registry(path: &Path, registry: &RegistryFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|err| Error::Registry(format!("create {}: {err}", parent.display())))?;
    }
    let raw = serde_json::to_vec_pretty(registry)
        .map_err(|err| Error::Registry(format!("encode registry: {err}")))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, raw)
        .map_err(|err| Error::Registry(format!("write {}: {err}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|err| Error::Registry(format!("rename into {}: {err}", path.display())))
}

// =============================================================================
// File Lock
// =============================================================================

/// Exclusive advisory lock guarding registry mutation across processes.
///
/// Acquisition polls until the current holder releases; releasing (or
/// dropping) makes the lock acquirable again within one poll interval.
#[derive(Debug)]
pub struct RegistryLock {
    file: File,
}

impl RegistryLock {
    /// Acquires the lock for the registry at `registry_path`, creating
    /// parent directories and the sibling lock file as needed.
    pub async fn acquire(registry_path: &Path) -> Result<Self> {
        let lock_path = lock_path_for(registry_path);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| Error::Registry(format!("create {}: {err}", parent.display())))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|err| Error::Registry(format!("open {}: {err}", lock_path.display())))?;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %lock_path.display(), "acquired registry lock");
                    return Ok(Self { file });
                }
                Err(err) if is_lock_contention(&err) => {
                    tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                }
                Err(err) => {
                    return Err(Error::Registry(format!(
                        "lock {}: {err}",
                        lock_path.display()
                    )))
                }
            }
        }
    }

    /// Releases the lock. Equivalent to dropping, spelled out for
    /// call sites where the release point matters.
    pub fn release(self) {}
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_path_for(registry_path: &Path) -> PathBuf {
    let mut name = registry_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(REGISTRY_LOCK_SUFFIX);
    registry_path.with_file_name(name)
}

fn is_lock_contention(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
