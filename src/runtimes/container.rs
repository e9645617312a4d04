//! Docker-backed sandbox.
//!
//! Commands run inside a long-lived container whose configuration is
//! fingerprinted; containers are shared across processes through the
//! on-disk registry and reused whenever a matching fingerprint is
//! found. The start sequence fails closed at every step:
//!
//! 1. Workspace directories are created on the host before any engine
//!    contact, so an unreachable engine still leaves a usable (empty)
//!    workspace behind.
//! 2. The security validator gates the configuration; a violation never
//!    reaches the engine.
//! 3. The engine is pinged; then an existing container is adopted under
//!    the registry lock or a new one is created from the materialized
//!    host configuration.
//! 4. The container is started and the optional setup command runs
//!    inside it.
//!
//! Any failure along the way is recorded and replayed verbatim by every
//! later `exec` and filesystem call: a sandbox that did not come up
//! never silently degrades to weaker isolation.
//!
//! The workspace is always mounted at `/workspace`; paths the agent
//! supplies are resolved in container space and, for the filesystem
//! bridge, translated back to host paths through the shared bind mount.

use crate::config::{normalize_workspace_access, ContainerConfig, UlimitValue};
use crate::constants::{
    CONTAINER_NAME_PREFIX, DEFAULT_CONTAINER_IMAGE, ENGINE_PING_TIMEOUT, EXEC_POLL_INTERVAL,
    FINGERPRINT_LABEL, FINGERPRINT_SHORT_LEN, KEEPALIVE_COMMAND, MANAGED_LABEL, STOP_TIMEOUT_SECS,
    WORKSPACE_MOUNT,
};
use crate::error::{Error, Result};
use crate::pathguard::resolve_container_path;
use crate::registry::{
    config_fingerprint, load_registry, registry_path, save_registry, RegistryEntry, RegistryLock,
};
use crate::runtime::{ExecEvent, ExecEventHandler, ExecRequest, ExecResult, FsBridge, Sandbox};
use crate::runtimes::host::sleep_until_opt;
use crate::security::{sanitize_env_vars, validate_sandbox_security};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{HostConfig, ResourcesUlimits};
use bollard::Docker;
use chrono::Utc;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sandbox that executes inside a reusable Docker container.
pub struct ContainerSandbox {
    inner: Arc<Inner>,
    fs: Arc<ContainerFs>,
}

struct Inner {
    cfg: ContainerConfig,
    state: Mutex<RuntimeState>,
}

#[derive(Default)]
struct RuntimeState {
    client: Option<Docker>,
    container_id: Option<String>,
    start_err: Option<Arc<Error>>,
}

impl ContainerSandbox {
    pub fn new(cfg: ContainerConfig) -> Self {
        let inner = Arc::new(Inner {
            cfg,
            state: Mutex::new(RuntimeState::default()),
        });
        let fs = Arc::new(ContainerFs {
            inner: inner.clone(),
        });
        Self { inner, fs }
    }

    async fn start_inner(&self, ctx: &CancellationToken) -> Result<()> {
        let cfg = &self.inner.cfg;

        // Workspace directories must exist before any engine contact: a
        // missing engine still leaves a usable workspace on disk.
        for dir in [&cfg.workspace, &cfg.workspace_root] {
            if !dir.is_empty() {
                std::fs::create_dir_all(dir).map_err(|err| Error::WorkspaceSetup {
                    path: dir.clone(),
                    reason: err.to_string(),
                })?;
            }
        }

        validate_sandbox_security(cfg)?;

        let client = Docker::connect_with_local_defaults()
            .map_err(|err| Error::EngineUnavailable(err.to_string()))?;
        tokio::time::timeout(ENGINE_PING_TIMEOUT, client.ping())
            .await
            .map_err(|_| Error::EngineUnavailable("ping timed out".to_string()))?
            .map_err(|err| Error::EngineUnavailable(err.to_string()))?;

        let fingerprint = config_fingerprint(cfg);
        let reg_path = registry_path();

        let container_id = {
            let lock = RegistryLock::acquire(&reg_path).await?;
            let mut registry = load_registry(&reg_path)?;

            let mut adopted = None;
            if let Some(entry) = registry.containers.get(&fingerprint) {
                if container_exists(&client, &entry.container_id).await? {
                    debug!(container = %entry.container_id, "reusing registered sandbox container");
                    adopted = Some(entry.container_id.clone());
                } else {
                    info!(container = %entry.container_id, "registered container is gone, dropping entry");
                    registry.containers.remove(&fingerprint);
                }
            }

            let id = match adopted {
                Some(id) => id,
                None => self.create_container(&client, &fingerprint).await?,
            };

            let now = Utc::now();
            registry
                .containers
                .entry(fingerprint.clone())
                .and_modify(|entry| {
                    entry.container_id = id.clone();
                    entry.last_used_at = now;
                })
                .or_insert_with(|| RegistryEntry {
                    container_id: id.clone(),
                    created_at: now,
                    last_used_at: now,
                });
            save_registry(&reg_path, &registry)?;
            lock.release();
            id
        };

        start_engine_container(&client, &container_id).await?;

        {
            let mut state = self.inner.lock();
            state.client = Some(client);
            state.container_id = Some(container_id.clone());
        }

        self.run_setup_command(ctx).await?;

        let lock = RegistryLock::acquire(&reg_path).await?;
        let mut registry = load_registry(&reg_path)?;
        if let Some(entry) = registry.containers.get_mut(&fingerprint) {
            entry.last_used_at = Utc::now();
        }
        save_registry(&reg_path, &registry)?;
        lock.release();

        info!(container = %container_id, "sandbox container ready");
        Ok(())
    }

    async fn create_container(&self, client: &Docker, fingerprint: &str) -> Result<String> {
        let cfg = &self.inner.cfg;
        let host_config = self.inner.host_config()?;

        let image = if cfg.image.is_empty() {
            DEFAULT_CONTAINER_IMAGE
        } else {
            cfg.image.as_str()
        };
        let workdir = if cfg.workdir.is_empty() {
            WORKSPACE_MOUNT
        } else {
            cfg.workdir.as_str()
        };

        let mut env: Vec<String> = sanitize_env_vars(&cfg.env)
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        env.sort();

        let name = format!(
            "{CONTAINER_NAME_PREFIX}{}",
            &fingerprint[..FINGERPRINT_SHORT_LEN]
        );
        let labels = HashMap::from([
            (MANAGED_LABEL.to_string(), "true".to_string()),
            (FINGERPRINT_LABEL.to_string(), fingerprint.to_string()),
        ]);

        let config = Config::<String> {
            image: Some(image.to_string()),
            cmd: Some(KEEPALIVE_COMMAND.iter().map(|s| s.to_string()).collect()),
            env: Some(env),
            working_dir: Some(workdir.to_string()),
            labels: Some(labels),
            host_config: Some(host_config),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: name.clone(),
            ..Default::default()
        };

        let created = client
            .create_container(Some(options), config)
            .await
            .map_err(|err| engine_err("create container", err))?;
        info!(container = %created.id, image = %image, "created sandbox container");
        Ok(created.id)
    }

    /// Runs the configured setup command inside the container. A
    /// whitespace-only command is a no-op.
    pub(crate) async fn run_setup_command(&self, ctx: &CancellationToken) -> Result<()> {
        let setup = self.inner.cfg.setup_command.trim().to_string();
        if setup.is_empty() {
            return Ok(());
        }
        info!(command = %setup, "running sandbox setup command");
        let result = self
            .exec_stream(
                ctx,
                ExecRequest {
                    command: setup,
                    ..ExecRequest::default()
                },
                &mut |_event| {},
            )
            .await?;
        if result.exit_code != 0 {
            return Err(Error::SetupFailed(result.exit_code));
        }
        Ok(())
    }

    /// Polls the exec session until the engine reports it finished. A
    /// cancelled context yields exit code 1 alongside the cancellation
    /// error.
    pub(crate) async fn wait_exec_done(
        &self,
        ctx: &CancellationToken,
        exec_id: &str,
    ) -> (i64, Result<()>) {
        loop {
            if ctx.is_cancelled() {
                return (1, Err(Error::Cancelled));
            }
            let client = match self.inner.lock().client.clone() {
                Some(client) => client,
                None => return (1, Err(Error::NotStarted)),
            };
            match client.inspect_exec(exec_id).await {
                Ok(inspect) => {
                    if inspect.running != Some(true) {
                        return (inspect.exit_code.unwrap_or(0), Ok(()));
                    }
                }
                Err(err) => return (1, Err(engine_err("inspect exec", err))),
            }
            tokio::select! {
                _ = tokio::time::sleep(EXEC_POLL_INTERVAL) => {}
                _ = ctx.cancelled() => return (1, Err(Error::Cancelled)),
            }
        }
    }
}

#[async_trait]
impl Sandbox for ContainerSandbox {
    async fn start(&self, ctx: &CancellationToken) -> Result<()> {
        if let Some(err) = self.inner.sticky() {
            return Err(Error::StartFailed(err));
        }
        if self.inner.lock().container_id.is_some() {
            return Ok(());
        }
        match self.start_inner(ctx).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let shared = Arc::new(err);
                self.inner.lock().start_err = Some(shared.clone());
                Err(Error::StartFailed(shared))
            }
        }
    }

    async fn stop(&self, _ctx: &CancellationToken) -> Result<()> {
        let (client, container_id) = {
            let state = self.inner.lock();
            match (state.client.clone(), state.container_id.clone()) {
                (Some(client), Some(id)) => (client, id),
                _ => return Ok(()),
            }
        };
        match client
            .stop_container(
                &container_id,
                Some(StopContainerOptions {
                    t: STOP_TIMEOUT_SECS,
                }),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(BollardError::DockerResponseServerError {
                status_code: 304 | 404,
                ..
            }) => Ok(()),
            Err(err) => Err(engine_err("stop container", err)),
        }
    }

    async fn prune(&self, ctx: &CancellationToken) -> Result<()> {
        let client = match self.inner.lock().client.clone() {
            Some(client) => client,
            None => return Ok(()),
        };
        let cfg = &self.inner.cfg;
        let reg_path = registry_path();
        let lock = RegistryLock::acquire(&reg_path).await?;
        let mut registry = load_registry(&reg_path)?;

        let now = Utc::now();
        let mut evicted: Vec<String> = Vec::new();
        for (fingerprint, entry) in &registry.containers {
            if ctx.is_cancelled() {
                break;
            }
            let exists = match container_exists(&client, &entry.container_id).await {
                Ok(exists) => exists,
                Err(err) => {
                    warn!(container = %entry.container_id, error = %err, "prune: inspect failed, skipping entry");
                    continue;
                }
            };
            if !exists {
                info!(container = %entry.container_id, "prune: dropping entry for missing container");
                evicted.push(fingerprint.clone());
                continue;
            }

            let idle = cfg.prune_idle_hours > 0
                && now.signed_duration_since(entry.last_used_at)
                    >= chrono::Duration::hours(cfg.prune_idle_hours as i64);
            let aged = cfg.prune_max_age_days > 0
                && now.signed_duration_since(entry.created_at)
                    >= chrono::Duration::days(cfg.prune_max_age_days as i64);
            if idle || aged {
                info!(container = %entry.container_id, idle, aged, "prune: evicting container");
                destroy_container(&client, &entry.container_id).await;
                evicted.push(fingerprint.clone());
            }
        }
        for fingerprint in evicted {
            registry.containers.remove(&fingerprint);
        }
        save_registry(&reg_path, &registry)?;
        lock.release();
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
        let (client, container_id) = self.inner.started()?;
        let (argv, working_dir) = self.inner.build_exec_command(&req)?;

        let mut env: Vec<String> = req
            .env
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        env.sort();

        let deadline = (req.timeout_ms > 0)
            .then(|| Instant::now() + std::time::Duration::from_millis(req.timeout_ms));

        let options = CreateExecOptions::<String> {
            cmd: Some(argv),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            working_dir: Some(working_dir),
            env: (!env.is_empty()).then_some(env),
            ..Default::default()
        };
        let exec = tokio::select! {
            created = client.create_exec(&container_id, options) => {
                created.map_err(|err| engine_err("create exec", err))?
            }
            _ = ctx.cancelled() => return Err(Error::Cancelled),
        };

        let mut stdout_buf: Vec<u8> = Vec::new();
        let mut stderr_buf: Vec<u8> = Vec::new();

        match client
            .start_exec(&exec.id, None)
            .await
            .map_err(|err| engine_err("start exec", err))?
        {
            StartExecResults::Attached { mut output, .. } => loop {
                let item = tokio::select! {
                    item = output.next() => match item {
                        Some(item) => item,
                        None => break,
                    },
                    _ = ctx.cancelled() => return Err(Error::Cancelled),
                    _ = sleep_until_opt(deadline) => {
                        return Err(Error::Timeout { ms: req.timeout_ms })
                    }
                };
                match item.map_err(|err| engine_err("exec stream", err))? {
                    LogOutput::StdOut { message } | LogOutput::Console { message } => {
                        stdout_buf.extend_from_slice(&message);
                        on_event(ExecEvent::Stdout(message.to_vec()));
                    }
                    LogOutput::StdErr { message } => {
                        stderr_buf.extend_from_slice(&message);
                        on_event(ExecEvent::Stderr(message.to_vec()));
                    }
                    LogOutput::StdIn { .. } => {}
                }
            },
            StartExecResults::Detached => {}
        }

        let (exit_code, wait_result) = self.wait_exec_done(ctx, &exec.id).await;
        wait_result?;
        on_event(ExecEvent::Exit(exit_code));

        Ok(ExecResult {
            stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
            exit_code,
        })
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sticky(&self) -> Option<Arc<Error>> {
        self.lock().start_err.clone()
    }

    /// Sticky start errors replay wrapped; a sandbox that was never
    /// started refuses outright.
    fn ensure_ready(&self) -> Result<()> {
        let state = self.lock();
        if let Some(err) = &state.start_err {
            return Err(Error::unavailable(err));
        }
        if state.container_id.is_none() {
            return Err(Error::NotStarted);
        }
        Ok(())
    }

    fn started(&self) -> Result<(Docker, String)> {
        let state = self.lock();
        if let Some(err) = &state.start_err {
            return Err(Error::unavailable(err));
        }
        match (state.client.clone(), state.container_id.clone()) {
            (Some(client), Some(id)) => Ok((client, id)),
            _ => Err(Error::NotStarted),
        }
    }

    /// Translates the declarative configuration into engine host
    /// parameters. Ulimits are emitted sorted by name so the output is
    /// deterministic regardless of map ordering.
    fn host_config(&self) -> Result<HostConfig> {
        let cfg = &self.cfg;
        let mut host_config = HostConfig {
            binds: Some(self.binds()),
            ..Default::default()
        };

        if !cfg.network.is_empty() {
            host_config.network_mode = Some(cfg.network.clone());
        }
        if cfg.read_only_root {
            host_config.readonly_rootfs = Some(true);
        }
        if !cfg.memory.is_empty() {
            host_config.memory = Some(parse_byte_limit(&cfg.memory).map_err(|_| {
                Error::InvalidLimit {
                    field: "docker.memory".to_string(),
                    value: cfg.memory.clone(),
                }
            })?);
        }
        if !cfg.memory_swap.is_empty() {
            host_config.memory_swap = Some(parse_byte_limit(&cfg.memory_swap).map_err(|_| {
                Error::InvalidLimit {
                    field: "docker.memory_swap".to_string(),
                    value: cfg.memory_swap.clone(),
                }
            })?);
        }
        if cfg.cpus > 0.0 {
            host_config.nano_cpus = Some((cfg.cpus * 1_000_000_000.0) as i64);
        }
        if cfg.pids_limit > 0 {
            host_config.pids_limit = Some(cfg.pids_limit);
        }

        let tmpfs: HashMap<String, String> = cfg
            .tmpfs
            .iter()
            .filter_map(|raw| {
                let entry = raw.trim();
                if entry.is_empty() {
                    return None;
                }
                match entry.split_once(':') {
                    Some((path, opts)) => Some((path.to_string(), opts.to_string())),
                    None => Some((entry.to_string(), String::new())),
                }
            })
            .collect();
        if !tmpfs.is_empty() {
            host_config.tmpfs = Some(tmpfs);
        }

        let mut security_opt = Vec::new();
        if !cfg.seccomp_profile.is_empty() {
            security_opt.push(format!("seccomp={}", cfg.seccomp_profile));
        }
        if !cfg.apparmor_profile.is_empty() {
            security_opt.push(format!("apparmor={}", cfg.apparmor_profile));
        }
        if !security_opt.is_empty() {
            host_config.security_opt = Some(security_opt);
        }

        if !cfg.cap_drop.is_empty() {
            host_config.cap_drop = Some(cfg.cap_drop.clone());
        }
        if !cfg.dns.is_empty() {
            host_config.dns = Some(cfg.dns.clone());
        }

        let mut names: Vec<&String> = cfg.ulimits.keys().collect();
        names.sort();
        let ulimits: Vec<ResourcesUlimits> = names
            .into_iter()
            .filter_map(|name| build_ulimit(name, &cfg.ulimits[name]))
            .collect();
        if !ulimits.is_empty() {
            host_config.ulimits = Some(ulimits);
        }

        Ok(host_config)
    }

    /// Bind mounts in engine order: the workspace first (suffix per
    /// access mode, none for `none`), user binds after, order preserved.
    fn binds(&self) -> Vec<String> {
        let cfg = &self.cfg;
        let workspace_bind = match normalize_workspace_access(&cfg.workspace_access) {
            "ro" => format!("{}:{WORKSPACE_MOUNT}:ro", cfg.workspace),
            "rw" => format!("{}:{WORKSPACE_MOUNT}:rw", cfg.workspace),
            _ => format!("{}:{WORKSPACE_MOUNT}", cfg.workspace),
        };
        let mut binds = vec![workspace_bind];
        binds.extend(cfg.binds.iter().cloned());
        binds
    }

    /// Maps a container path under the workspace mount to its host
    /// location for mutation. Refused unless the workspace is mounted
    /// read-write.
    fn host_dir_for_container_path(&self, container_path: &str) -> Option<String> {
        if normalize_workspace_access(&self.cfg.workspace_access) != "rw" {
            return None;
        }
        self.map_workspace_path(container_path)
    }

    /// Host location for reads; the bind mount makes container and host
    /// views the same bytes under `ro` and `rw`.
    fn host_path_for_read(&self, container_path: &str) -> Option<String> {
        match normalize_workspace_access(&self.cfg.workspace_access) {
            "ro" | "rw" => self.map_workspace_path(container_path),
            _ => None,
        }
    }

    fn map_workspace_path(&self, container_path: &str) -> Option<String> {
        if container_path == WORKSPACE_MOUNT {
            return Some(self.cfg.workspace.clone());
        }
        let suffix = container_path.strip_prefix(&format!("{WORKSPACE_MOUNT}/"))?;
        Some(format!(
            "{}/{}",
            self.cfg.workspace.trim_end_matches('/'),
            suffix
        ))
    }

    /// Turns a request into an engine exec argv plus working directory.
    /// An empty argument vector routes through a login shell; the
    /// working directory defaults to the workspace mount.
    fn build_exec_command(&self, req: &ExecRequest) -> Result<(Vec<String>, String)> {
        if req.command.trim().is_empty() {
            return Err(Error::EmptyCommand);
        }
        let argv = if !req.args.is_empty() {
            let mut argv = Vec::with_capacity(req.args.len() + 1);
            argv.push(req.command.clone());
            argv.extend(req.args.iter().cloned());
            argv
        } else {
            vec!["sh".to_string(), "-lc".to_string(), req.command.clone()]
        };
        let working_dir = match req.working_dir.as_deref().filter(|dir| !dir.is_empty()) {
            Some(dir) => resolve_container_path(dir)?,
            None => WORKSPACE_MOUNT.to_string(),
        };
        Ok((argv, working_dir))
    }
}

/// Parses a byte limit with an optional `k`/`m`/`g` suffix
/// (case-insensitive); bare values are bytes.
pub fn parse_byte_limit(raw: &str) -> Result<i64> {
    let value = raw.trim().to_ascii_lowercase();
    let invalid = || Error::InvalidLimit {
        field: "byte limit".to_string(),
        value: raw.to_string(),
    };
    if value.is_empty() {
        return Err(invalid());
    }
    let (digits, multiplier) = match value.as_bytes()[value.len() - 1] {
        b'k' => (&value[..value.len() - 1], 1024i64),
        b'm' => (&value[..value.len() - 1], 1024 * 1024),
        b'g' => (&value[..value.len() - 1], 1024 * 1024 * 1024),
        _ => (value.as_str(), 1),
    };
    let amount: i64 = digits.trim().parse().map_err(|_| invalid())?;
    amount.checked_mul(multiplier).ok_or_else(invalid)
}

/// Normalizes one ulimit entry: `value` wins and sets both bounds, a
/// lone `soft` or `hard` mirrors into the other. Empty names and empty
/// entries are rejected.
pub(crate) fn build_ulimit(name: &str, value: &UlimitValue) -> Option<ResourcesUlimits> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let (soft, hard) = if let Some(both) = value.value {
        (both, both)
    } else {
        match (value.soft, value.hard) {
            (Some(soft), Some(hard)) => (soft, hard),
            (Some(soft), None) => (soft, soft),
            (None, Some(hard)) => (hard, hard),
            (None, None) => return None,
        }
    };
    Some(ResourcesUlimits {
        name: Some(name.to_string()),
        soft: Some(soft),
        hard: Some(hard),
    })
}

fn engine_err(op: &'static str, err: BollardError) -> Error {
    Error::EngineCall {
        op,
        reason: err.to_string(),
    }
}

async fn container_exists(client: &Docker, container_id: &str) -> Result<bool> {
    match client
        .inspect_container(container_id, None::<InspectContainerOptions>)
        .await
    {
        Ok(_) => Ok(true),
        Err(BollardError::DockerResponseServerError {
            status_code: 404, ..
        }) => Ok(false),
        Err(err) => Err(engine_err("inspect container", err)),
    }
}

async fn start_engine_container(client: &Docker, container_id: &str) -> Result<()> {
    match client
        .start_container(container_id, None::<StartContainerOptions<String>>)
        .await
    {
        Ok(()) => Ok(()),
        Err(BollardError::DockerResponseServerError {
            status_code: 304, ..
        }) => Ok(()),
        Err(err) => Err(engine_err("start container", err)),
    }
}

/// Best-effort stop-then-remove; failures are logged and swallowed so a
/// prune pass never aborts halfway.
async fn destroy_container(client: &Docker, container_id: &str) {
    if let Err(err) = client
        .stop_container(
            container_id,
            Some(StopContainerOptions {
                t: STOP_TIMEOUT_SECS,
            }),
        )
        .await
    {
        if !matches!(
            err,
            BollardError::DockerResponseServerError {
                status_code: 304 | 404,
                ..
            }
        ) {
            warn!(container = %container_id, error = %err, "prune: stop failed");
        }
    }
    if let Err(err) = client
        .remove_container(
            container_id,
            Some(RemoveContainerOptions {
                force: true,
                ..Default::default()
            }),
        )
        .await
    {
        if !matches!(
            err,
            BollardError::DockerResponseServerError {
                status_code: 404,
                ..
            }
        ) {
            warn!(container = %container_id, error = %err, "prune: remove failed");
        }
    }
}

/// Filesystem bridge over the shared workspace bind mount.
struct ContainerFs {
    inner: Arc<Inner>,
}

#[async_trait]
impl FsBridge for ContainerFs {
    async fn read_file(&self, _ctx: &CancellationToken, path: &str) -> Result<Vec<u8>> {
        self.inner.ensure_ready()?;
        let container_path = resolve_container_path(path)?;
        let host_path = self
            .inner
            .host_path_for_read(&container_path)
            .ok_or_else(|| no_mapping(&self.inner.cfg, &container_path))?;
        Ok(tokio::fs::read(host_path).await?)
    }

    async fn write_file(
        &self,
        _ctx: &CancellationToken,
        path: &str,
        data: &[u8],
        mkdir: bool,
    ) -> Result<()> {
        self.inner.ensure_ready()?;
        let container_path = resolve_container_path(path)?;
        let host_path = self
            .inner
            .host_dir_for_container_path(&container_path)
            .ok_or_else(|| no_mapping(&self.inner.cfg, &container_path))?;
        if mkdir {
            if let Some(parent) = std::path::Path::new(&host_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(tokio::fs::write(host_path, data).await?)
    }
}

fn no_mapping(cfg: &ContainerConfig, container_path: &str) -> Error {
    Error::NoHostMapping {
        path: container_path.to_string(),
        access: normalize_workspace_access(&cfg.workspace_access).to_string(),
    }
}
