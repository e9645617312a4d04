//! Constants for the sandbox layer.
//!
//! All paths, intervals, and denylists are defined here to ensure
//! consistency and prevent magic values throughout the codebase.

use std::time::Duration;

// =============================================================================
// Container Paths
// =============================================================================

/// Mount point of the agent workspace inside every sandbox container.
pub const WORKSPACE_MOUNT: &str = "/workspace";

/// Image used when the configuration does not name one.
pub const DEFAULT_CONTAINER_IMAGE: &str = "alpine:3.20";

/// Name prefix for containers managed by this crate, followed by a
/// fingerprint prefix so `docker ps` output is attributable.
pub const CONTAINER_NAME_PREFIX: &str = "picoclaw-sbx-";

/// Number of fingerprint hex characters carried into the container name.
pub const FINGERPRINT_SHORT_LEN: usize = 12;

/// Label marking a container as managed by this crate.
pub const MANAGED_LABEL: &str = "picoclaw.sandbox";

/// Label carrying the full configuration fingerprint.
pub const FINGERPRINT_LABEL: &str = "picoclaw.fingerprint";

/// Command a sandbox container runs so exec sessions have a live target.
pub const KEEPALIVE_COMMAND: &[&str] = &["sleep", "infinity"];

// =============================================================================
// Registry Paths
// =============================================================================

/// Environment variable overriding the state root directory.
pub const STATE_HOME_ENV: &str = "PICOCLAW_HOME";

/// Directory under `$HOME` holding state when the override is unset.
pub const HOME_STATE_DIR: &str = ".picoclaw";

/// Path components of the registry file below the state root.
pub const REGISTRY_RELATIVE_PATH: &[&str] = &["state", "sandbox", "containers.json"];

/// Suffix appended to the registry path to form the lock-file path.
pub const REGISTRY_LOCK_SUFFIX: &str = ".lock";

// =============================================================================
// Timeouts & Intervals
// =============================================================================

/// Polling interval while waiting for the registry file lock.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Polling interval while waiting for a container exec session to finish.
pub const EXEC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on the initial engine ping.
pub const ENGINE_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace period handed to the engine when stopping a container.
pub const STOP_TIMEOUT_SECS: i64 = 10;

// =============================================================================
// Streaming
// =============================================================================

/// Read-buffer size for child process stdout/stderr pumps.
pub const STREAM_BUF_SIZE: usize = 4096;

/// Bound of the channel multiplexing stream chunks into exec events.
pub const STREAM_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Security Denylists
// =============================================================================

/// Host paths that may never be (or contain) a bind-mount source.
pub const BLOCKED_BIND_SOURCES: &[&str] = &[
    "/", "/etc", "/var", "/usr", "/bin", "/sbin", "/boot", "/proc", "/sys", "/dev",
];

/// Substrings identifying secret-bearing environment keys (matched
/// against the upper-cased key).
pub const SECRET_ENV_MARKERS: &[&str] = &[
    "API_KEY",
    "TOKEN",
    "SECRET",
    "PASSWORD",
    "PASSWD",
    "CREDENTIAL",
    "PRIVATE_KEY",
];

/// Well-known provider keys blocked by exact match regardless of markers.
pub const SECRET_ENV_KEYS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GITHUB_TOKEN",
    "GOOGLE_API_KEY",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
];
