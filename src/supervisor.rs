use std::{
    env,
    path::PathBuf,
    process::{ExitStatus, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, TryLockError,
    },
    time::{Duration, Instant},
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
};
use tokio_util::sync::CancellationToken;

use crate::{
    app_constants::{
        BACKEND_EXIT_POLL_INTERVAL, BACKEND_PING_TIMEOUT, BACKEND_PORT, GRACEFUL_STOP_TIMEOUT,
        PORT_RECLAIM_SETTLE_DELAY,
    },
    backend_readiness::{self, ReadinessCheck},
    config::ShellConfig,
    error::SupervisorError,
    launch_plan::{self, LaunchPlan},
    notifier::{self, Notifier},
    port_reclaim::{self, PortProcessTable, ReclaimReport, SystemPortTable},
    process_control::{self, StopOutcome},
    runtime_paths,
};

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub shell: ShellConfig,
    pub backend_dir: PathBuf,
    pub port: u16,
    pub settle_delay: Duration,
    pub stop_grace: Duration,
    pub exit_poll_interval: Duration,
    pub ping_timeout: Duration,
}

impl SupervisorConfig {
    pub fn new(shell: ShellConfig, backend_dir: PathBuf) -> Self {
        Self {
            shell,
            backend_dir,
            port: BACKEND_PORT,
            settle_delay: PORT_RECLAIM_SETTLE_DELAY,
            stop_grace: GRACEFUL_STOP_TIMEOUT,
            exit_poll_interval: BACKEND_EXIT_POLL_INTERVAL,
            ping_timeout: BACKEND_PING_TIMEOUT,
        }
    }

    /// Development runs use the checkout layout, packaged runs the bundled resources.
    pub fn from_shell(shell: ShellConfig, resource_dir: Option<&std::path::Path>) -> Self {
        let backend_dir = runtime_paths::resolve_backend_dir(shell.development, resource_dir);
        Self::new(shell, backend_dir)
    }

    fn readiness_check(&self) -> ReadinessCheck {
        ReadinessCheck {
            port: self.port,
            timeout: self.shell.backend_timeout,
            poll_interval: self.shell.ready_poll_interval,
            ping_timeout: self.ping_timeout,
        }
    }
}

#[derive(Debug)]
pub struct BackendProcess {
    pid: u32,
    child: Child,
    started_at: Instant,
}

impl BackendProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

pub(crate) struct AtomicFlagGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> AtomicFlagGuard<'a> {
    pub(crate) fn try_set(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self { flag })
    }
}

impl Drop for AtomicFlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

type SharedProcess = Arc<Mutex<Option<BackendProcess>>>;

fn lock_process(process: &SharedProcess) -> MutexGuard<'_, Option<BackendProcess>> {
    process.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the backend process for the lifetime of the shell.
pub struct Supervisor {
    config: SupervisorConfig,
    process: SharedProcess,
    ports: Arc<dyn PortProcessTable>,
    notifier: Arc<dyn Notifier>,
    is_starting: AtomicBool,
    stopping: AtomicBool,
    last_exit: Arc<Mutex<Option<String>>>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_port_table(config, notifier, Arc::new(SystemPortTable))
    }

    pub fn with_port_table(
        config: SupervisorConfig,
        notifier: Arc<dyn Notifier>,
        ports: Arc<dyn PortProcessTable>,
    ) -> Self {
        Self {
            config,
            process: Arc::new(Mutex::new(None)),
            ports,
            notifier,
            is_starting: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            last_exit: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        lock_process(&self.process).is_some()
    }

    pub fn backend_pid(&self) -> Option<u32> {
        lock_process(&self.process).as_ref().map(BackendProcess::pid)
    }

    /// Reclaims the service port, then spawns the backend.
    ///
    /// Launch failures are reported to the user through the notifier before
    /// the error is returned; the launch is never retried. Once a stop has
    /// begun no new backend is started, and a child spawned concurrently with
    /// the stop is killed instead of stored.
    pub async fn start_backend(&self) -> Result<u32, SupervisorError> {
        let Some(_starting) = AtomicFlagGuard::try_set(&self.is_starting) else {
            return Err(SupervisorError::StartInProgress);
        };
        if self.is_stopping() {
            return Err(SupervisorError::ShuttingDown);
        }
        if let Some(pid) = self.backend_pid() {
            tracing::info!(pid, "backend already running, skipping start");
            return Ok(pid);
        }

        let plan = launch_plan::resolve_launch_plan(&self.config.shell, &self.config.backend_dir)
            .inspect_err(|error| {
                notifier::notify_launch_failure(self.notifier.as_ref(), &error.to_string())
            })?;
        tracing::info!(
            command = ?launch_plan::build_debug_command(&plan),
            cwd = %plan.cwd.display(),
            packaged = plan.packaged_mode,
            "starting backend"
        );

        self.reclaim_port(self.config.port).await;
        if self.is_stopping() {
            tracing::info!("stop requested during port reclaim, not spawning backend");
            return Err(SupervisorError::ShuttingDown);
        }

        let child = self.spawn_backend(&plan)?;
        let pid = child.pid;
        {
            // Checked under the lock: stop_backend raises the flag before taking the handle.
            let mut guard = lock_process(&self.process);
            if self.is_stopping() {
                drop(guard);
                discard_backend(child);
                return Err(SupervisorError::ShuttingDown);
            }
            *lock_process_exit(&self.last_exit) = None;
            *guard = Some(child);
        }
        self.spawn_exit_watch(pid);
        tracing::info!(pid, "backend process spawned");
        Ok(pid)
    }

    fn spawn_backend(&self, plan: &LaunchPlan) -> Result<BackendProcess, SupervisorError> {
        if !plan.cwd.is_dir() {
            let error = SupervisorError::BackendDirMissing(plan.cwd.display().to_string());
            notifier::notify_launch_failure(self.notifier.as_ref(), &error.to_string());
            return Err(error);
        }

        let mut command = Command::new(&plan.cmd);
        command
            .args(&plan.args)
            .current_dir(&plan.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env("PYTHONUNBUFFERED", "1")
            .env(
                "PYTHONIOENCODING",
                env::var("PYTHONIOENCODING").unwrap_or_else(|_| "utf-8".to_string()),
            );
        #[cfg(target_os = "windows")]
        command.creation_flags(CREATE_NO_WINDOW);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::error!(executable = %plan.cmd, "backend runtime not found: {source}");
                notifier::notify_python_missing(self.notifier.as_ref());
                return Err(SupervisorError::ExecutableNotFound {
                    executable: plan.cmd.clone(),
                    source,
                });
            }
            Err(source) => {
                let error = SupervisorError::Spawn {
                    command: launch_plan::build_debug_command(plan),
                    source,
                };
                tracing::error!("{error}");
                notifier::notify_launch_failure(self.notifier.as_ref(), &error.to_string());
                return Err(error);
            }
        };

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, OutputStream::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, OutputStream::Stderr));
        }

        Ok(BackendProcess {
            pid: child.id().unwrap_or_default(),
            child,
            started_at: Instant::now(),
        })
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    fn spawn_exit_watch(&self, pid: u32) {
        let process = Arc::clone(&self.process);
        let last_exit = Arc::clone(&self.last_exit);
        let notifier = Arc::clone(&self.notifier);
        let interval = self.config.exit_poll_interval;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let exited = {
                    let mut guard = lock_process(&process);
                    let Some(current) = guard.as_mut().filter(|current| current.pid == pid) else {
                        // Stopped or replaced by someone else.
                        return;
                    };
                    match current.child.try_wait() {
                        Ok(Some(status)) => guard
                            .take()
                            .map(|exited| (status, exited.started_at.elapsed())),
                        Ok(None) => None,
                        Err(error) => {
                            tracing::warn!(pid, "failed to poll backend process status: {error}");
                            return;
                        }
                    }
                };

                if let Some((status, uptime)) = exited {
                    *lock_process_exit(&last_exit) = Some(status.to_string());
                    handle_backend_exit(notifier.as_ref(), pid, status, uptime);
                    return;
                }
            }
        });
    }

    /// Waits until the backend accepts connections on the service port.
    pub async fn wait_until_ready(&self, cancel: &CancellationToken) -> Result<(), SupervisorError> {
        let process = Arc::clone(&self.process);
        let last_exit = Arc::clone(&self.last_exit);
        backend_readiness::wait_for_backend(self.config.readiness_check(), cancel, || {
            let mut guard = lock_process(&process);
            let Some(current) = guard.as_mut() else {
                // The crash watcher may have reaped the child first.
                return match lock_process_exit(&last_exit).clone() {
                    Some(status) => Ok(Some(status)),
                    None => Err(SupervisorError::NotRunning),
                };
            };
            match current.child.try_wait() {
                Ok(status) => Ok(status.map(|status| status.to_string())),
                Err(error) => Err(SupervisorError::Poll(error)),
            }
        })
        .await
    }

    /// Best-effort: terminates whatever listens on `port`. Never fails.
    pub async fn reclaim_port(&self, port: u16) -> ReclaimReport {
        let report =
            port_reclaim::reclaim_port(self.ports.as_ref(), port, self.config.settle_delay).await;
        if !report.is_clean() {
            tracing::warn!(port, failures = ?report.failures, "port reclaim finished with failures");
        }
        report
    }

    /// Stops the backend if one is held, then reclaims the port regardless.
    /// The supervisor does not start a backend again afterwards.
    pub async fn stop_backend(&self) -> Option<StopOutcome> {
        self.stopping.store(true, Ordering::Release);
        let process = lock_process(&self.process).take();
        let outcome = match process {
            Some(mut process) => {
                tracing::info!(
                    pid = process.pid,
                    uptime_ms = process.started_at.elapsed().as_millis() as u64,
                    "stopping backend"
                );
                let ports = Arc::clone(&self.ports);
                let outcome =
                    process_control::stop_child(&mut process.child, self.config.stop_grace, |pid| {
                        ports.terminate(pid)
                    })
                    .await;
                tracing::info!(pid = process.pid, ?outcome, "backend stopped");
                Some(outcome)
            }
            None => None,
        };

        self.reclaim_port(self.config.port).await;
        outcome
    }

    /// Synchronous teardown for the panic path: kill without waiting.
    pub fn emergency_stop(&self) {
        self.stopping.store(true, Ordering::Release);
        let process = match self.process.try_lock() {
            Ok(mut guard) => guard.take(),
            Err(TryLockError::Poisoned(error)) => error.into_inner().take(),
            Err(TryLockError::WouldBlock) => None,
        };
        if let Some(mut process) = process {
            if let Err(error) = process_control::force_kill(&mut process.child) {
                tracing::error!(pid = process.pid, "{error}");
            }
        }
        port_reclaim::reclaim_port_now(self.ports.as_ref(), self.config.port);
    }
}

fn lock_process_exit(last_exit: &Mutex<Option<String>>) -> MutexGuard<'_, Option<String>> {
    last_exit.lock().unwrap_or_else(PoisonError::into_inner)
}

fn discard_backend(mut process: BackendProcess) {
    tracing::info!(pid = process.pid, "stop began while spawning, killing new backend");
    if let Err(error) = process_control::force_kill(&mut process.child) {
        tracing::warn!(pid = process.pid, "{error}");
    }
}

fn handle_backend_exit(notifier: &dyn Notifier, pid: u32, status: ExitStatus, uptime: Duration) {
    let uptime_ms = uptime.as_millis() as u64;
    match status.code() {
        Some(0) => tracing::info!(pid, uptime_ms, "backend exited cleanly"),
        Some(code) => {
            tracing::error!(pid, code, uptime_ms, "backend crashed");
            notifier::notify_backend_crash(notifier, code);
        }
        None => tracing::warn!(pid, uptime_ms, "backend terminated by signal: {status}"),
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

async fn forward_output<R>(reader: R, stream: OutputStream)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer);
                let line = line.trim_end();
                match stream {
                    OutputStream::Stdout => tracing::info!(target: "backend", "{line}"),
                    OutputStream::Stderr => tracing::warn!(target: "backend", "{line}"),
                }
            }
            Err(error) => {
                tracing::debug!(?stream, "backend output stream closed: {error}");
                break;
            }
        }
    }
}
