//! Pre-start security policy for container configurations.
//!
//! The validator runs before any engine contact. A configuration that
//! violates policy never brings a container up: misconfiguration is a
//! startup failure, not a runtime degradation. The checks are
//! declarative invariants on [`ContainerConfig`]:
//!
//! - no host networking,
//! - no `unconfined` seccomp or AppArmor profiles,
//! - bind-mount sources must be absolute and outside the sensitive
//!   system prefixes (compared after normalization and, where the path
//!   exists, after real-path resolution),
//! - secret-bearing and NUL-tainted environment variables are dropped
//!   before they reach the engine.
//!
//! The first violation aborts validation; an accepted configuration is
//! left untouched.

use crate::config::ContainerConfig;
use crate::constants::{BLOCKED_BIND_SOURCES, SECRET_ENV_KEYS, SECRET_ENV_MARKERS};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::ErrorKind;
use tracing::debug;

/// Runs every policy check against `cfg`, stopping at the first
/// violation.
pub fn validate_sandbox_security(cfg: &ContainerConfig) -> Result<()> {
    validate_network_mode(&cfg.network)?;
    validate_seccomp_profile(&cfg.seccomp_profile)?;
    validate_apparmor_profile(&cfg.apparmor_profile)?;
    validate_bind_mounts(&cfg.binds)?;
    Ok(())
}

/// Host networking shares the host network namespace and is never
/// allowed. Other modes pass through to the engine.
pub fn validate_network_mode(mode: &str) -> Result<()> {
    if mode.trim().eq_ignore_ascii_case("host") {
        return Err(Error::Policy(format!(
            "network mode {mode:?} is not allowed"
        )));
    }
    Ok(())
}

/// Rejects the `unconfined` seccomp profile. Empty values and named
/// profile files are accepted.
pub fn validate_seccomp_profile(profile: &str) -> Result<()> {
    if profile.trim().eq_ignore_ascii_case("unconfined") {
        return Err(Error::Policy(
            "seccomp profile \"unconfined\" is not allowed".to_string(),
        ));
    }
    Ok(())
}

/// Rejects the `unconfined` AppArmor profile.
pub fn validate_apparmor_profile(profile: &str) -> Result<()> {
    if profile.trim().eq_ignore_ascii_case("unconfined") {
        return Err(Error::Policy(
            "apparmor profile \"unconfined\" is not allowed".to_string(),
        ));
    }
    Ok(())
}

/// Validates bind-mount sources: absolute, and neither equal to nor
/// below any blocked system prefix. Sources that exist on disk are
/// compared by their real path so a symlink cannot smuggle one in.
pub fn validate_bind_mounts(binds: &[String]) -> Result<()> {
    for bind in binds {
        let source = parse_bind_source_path(bind);
        if source.trim().is_empty() {
            continue;
        }
        if !source.starts_with('/') {
            return Err(Error::Policy(format!(
                "bind mount has non-absolute source {source:?}"
            )));
        }
        let checked = try_realpath_absolute(source);
        if is_blocked_host_path(&checked) {
            return Err(Error::Policy(format!(
                "bind mount source {source:?} resolves to blocked path {checked:?}"
            )));
        }
    }
    Ok(())
}

/// Extracts the host source from a `src:dst[:mode]` bind specification.
pub fn parse_bind_source_path(bind: &str) -> &str {
    bind.split(':').next().unwrap_or(bind)
}

/// Collapses duplicate separators and trailing slashes. Whitespace-only
/// input normalizes to `/`; relative paths keep their shape.
pub fn normalize_host_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return "/".to_string();
    }
    let parts: Vec<&str> = trimmed.split('/').filter(|p| !p.is_empty()).collect();
    if trimmed.starts_with('/') {
        if parts.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", parts.join("/"))
        }
    } else {
        parts.join("/")
    }
}

/// Best-effort real-path resolution for absolute paths. Nonexistent
/// paths and paths the process may not traverse fall back to the
/// normalized form; relative input is returned unchanged.
pub fn try_realpath_absolute(path: &str) -> String {
    if !path.starts_with('/') {
        return path.to_string();
    }
    let normalized = normalize_host_path(path);
    match std::fs::canonicalize(&normalized) {
        Ok(resolved) => resolved.to_string_lossy().into_owned(),
        Err(err) if err.kind() == ErrorKind::NotFound => normalized,
        Err(_) => normalized,
    }
}

/// True when `path` is, or lives under, a blocked host prefix.
fn is_blocked_host_path(path: &str) -> bool {
    let normalized = normalize_host_path(path);
    BLOCKED_BIND_SOURCES.iter().any(|blocked| {
        if *blocked == "/" {
            normalized == "/"
        } else {
            normalized == *blocked || normalized.starts_with(&format!("{blocked}/"))
        }
    })
}

/// Filters the environment handed to a container: values carrying NUL
/// bytes and keys that look like credentials are dropped, everything
/// else passes through intact.
pub fn sanitize_env_vars(env: &HashMap<String, String>) -> HashMap<String, String> {
    let mut sanitized = HashMap::with_capacity(env.len());
    for (key, value) in env {
        if value.contains('\0') {
            debug!(key = %key, "dropping env var with NUL byte in value");
            continue;
        }
        if is_secret_env_key(key) {
            debug!(key = %key, "dropping secret-bearing env var");
            continue;
        }
        sanitized.insert(key.clone(), value.clone());
    }
    sanitized
}

fn is_secret_env_key(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    SECRET_ENV_MARKERS.iter().any(|marker| upper.contains(marker))
        || SECRET_ENV_KEYS.iter().any(|known| upper == *known)
}
