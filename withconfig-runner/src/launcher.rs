use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWrite;
use tokio::process::{Child, Command};
use tracing::{info, warn};
use uuid::Uuid;
use withconfig_core::{
    ExitOutcome, LaunchRequest, Result, StreamKind, Termination, WithConfigError,
};

use crate::environment::search_path;
use crate::process::ProcessConfig;
use crate::relay::{join_relay, spawn_relay};

/// Something that can run a [`LaunchRequest`] to completion.
#[async_trait]
pub trait Launch: Send + Sync {
    async fn launch(&self, request: LaunchRequest) -> Result<ExitOutcome>;
}

/// Spawns a child process and relays its output to our own stdout/stderr
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    config: ProcessConfig,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ProcessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Launch `request`, relaying the child's stdout into `stdout` and its
    /// stderr into `stderr`.
    ///
    /// Both relays are joined before the exit status is read, so every byte
    /// the child wrote has been forwarded by the time this returns.
    pub async fn launch_into<O, E>(
        &self,
        request: &LaunchRequest,
        stdout: O,
        stderr: E,
    ) -> Result<ExitOutcome>
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let launch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start_instant = Instant::now();

        info!(
            launch_id = %launch_id,
            command = %request.command,
            args = ?request.args,
            overrides = request.env.len(),
            "Launching command"
        );

        let env = self.config.env_policy.effective_environment(&request.env);
        let cwd = launch_directory(
            self.config.working_directory.as_deref(),
            std::env::current_dir,
        )?;
        let program = resolve_program(&request.command, &env, &cwd)?;

        let mut cmd = Command::new(&program);
        cmd.args(&request.args)
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.config.working_directory.is_some() {
            cmd.current_dir(&cwd);
        }
        // A timed child leads its own group so the deadline reaches everything it starts.
        let own_group = self.config.timeout.is_some();
        #[cfg(unix)]
        if own_group {
            use std::os::unix::process::CommandExt;
            cmd.as_std_mut().process_group(0);
        }

        let mut child = cmd.spawn().map_err(|source| WithConfigError::Spawn {
            command: request.command.clone(),
            source,
        })?;

        let child_stdout = child
            .stdout
            .take()
            .ok_or(WithConfigError::StreamSetup(StreamKind::Stdout))?;
        let child_stderr = child
            .stderr
            .take()
            .ok_or(WithConfigError::StreamSetup(StreamKind::Stderr))?;

        let stdout_relay = spawn_relay(StreamKind::Stdout, child_stdout, stdout);
        let stderr_relay = spawn_relay(StreamKind::Stderr, child_stderr, stderr);

        let relays = async {
            tokio::join!(
                join_relay(StreamKind::Stdout, stdout_relay),
                join_relay(StreamKind::Stderr, stderr_relay)
            )
        };
        tokio::pin!(relays);

        let mut timed_out = false;
        let (stdout_outcome, stderr_outcome) = match self.config.timeout {
            None => relays.await,
            Some(limit) => tokio::select! {
                joined = &mut relays => joined,
                _ = tokio::time::sleep(limit) => {
                    timed_out = true;
                    warn!(
                        launch_id = %launch_id,
                        timeout_ms = limit.as_millis() as u64,
                        "Command timed out, killing child process"
                    );
                    if let Err(e) = kill_child(&mut child, own_group) {
                        warn!(launch_id = %launch_id, error = %e, "Unable to kill child process");
                    }
                    relays.await
                }
            },
        };

        // Both streams are drained; the status can be read without losing output.
        let status = child.wait().await.map_err(WithConfigError::Wait)?;
        let termination = termination_from_status(status);

        let duration_ms = start_instant.elapsed().as_millis() as u64;
        let completed_at = Utc::now();

        info!(
            launch_id = %launch_id,
            command = %request.command,
            exit_code = termination.exit_code(),
            stdout_bytes = stdout_outcome.bytes_forwarded,
            stderr_bytes = stderr_outcome.bytes_forwarded,
            duration_ms,
            "Command finished"
        );

        Ok(ExitOutcome {
            launch_id,
            command: request.command.clone(),
            termination,
            stdout: stdout_outcome,
            stderr: stderr_outcome,
            timed_out,
            duration_ms,
            started_at,
            completed_at,
        })
    }
}

#[async_trait]
impl Launch for ProcessLauncher {
    async fn launch(&self, request: LaunchRequest) -> Result<ExitOutcome> {
        self.launch_into(&request, tokio::io::stdout(), tokio::io::stderr())
            .await
    }
}

/// Find the executable the child would run, searching the `PATH` of the
/// child's own environment.
fn resolve_program(
    command: &str,
    env: &BTreeMap<OsString, OsString>,
    cwd: &Path,
) -> Result<PathBuf> {
    which::which_in(command, search_path(env), cwd).map_err(|e| {
        WithConfigError::CommandNotFound {
            command: command.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Directory the child starts in, used to anchor relative command paths.
///
/// The launcher's own cwd is only required for a relative working directory;
/// without one, an unreadable cwd falls back to `.`.
fn launch_directory<F>(configured: Option<&Path>, current: F) -> Result<PathBuf>
where
    F: FnOnce() -> io::Result<PathBuf>,
{
    match configured {
        Some(dir) if dir.is_absolute() => Ok(dir.to_path_buf()),
        Some(dir) => Ok(current()?.join(dir)),
        None => Ok(current().unwrap_or_else(|_| PathBuf::from("."))),
    }
}

/// SIGKILL the child's whole process group when it leads one, otherwise
/// just the child.
fn kill_child(child: &mut Child, own_group: bool) -> io::Result<()> {
    #[cfg(unix)]
    if own_group {
        if let Some(pid) = child.id() {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                Ok(()) => return Ok(()),
                Err(e) => warn!(pid, error = %e, "Unable to kill process group, killing child only"),
            }
        }
    }
    #[cfg(not(unix))]
    let _ = own_group;

    child.start_kill()
}

fn termination_from_status(status: ExitStatus) -> Termination {
    if let Some(code) = status.code() {
        return Termination::Exited(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Termination::Signaled(signal);
        }
    }

    Termination::Exited(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvPolicy;

    #[tokio::test]
    async fn test_missing_command_is_not_spawned() {
        let launcher = ProcessLauncher::new();
        let request = LaunchRequest::new("with-config-no-such-command");

        let err = launcher
            .launch_into(&request, tokio::io::sink(), tokio::io::sink())
            .await
            .unwrap_err();

        assert!(matches!(err, WithConfigError::CommandNotFound { .. }));
        assert!(err.to_string().contains("with-config-no-such-command"));
        assert!(err.is_launcher_failure());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_isolated_environment_has_no_search_path() {
        let launcher =
            ProcessLauncher::with_config(ProcessConfig::new().with_env_policy(EnvPolicy::Isolated));

        let err = launcher
            .launch_into(&LaunchRequest::new("sh"), tokio::io::sink(), tokio::io::sink())
            .await
            .unwrap_err();
        assert!(matches!(err, WithConfigError::CommandNotFound { .. }));
    }

    fn cwd_gone() -> io::Result<PathBuf> {
        Err(io::Error::new(io::ErrorKind::NotFound, "cwd removed"))
    }

    #[test]
    fn test_launch_directory_without_cwd() {
        assert_eq!(launch_directory(None, cwd_gone).unwrap(), PathBuf::from("."));

        let absolute = std::env::temp_dir();
        assert_eq!(launch_directory(Some(absolute.as_path()), cwd_gone).unwrap(), absolute);

        let err = launch_directory(Some(Path::new("rel")), cwd_gone).unwrap_err();
        assert!(err.is_launcher_failure());
    }

    #[test]
    fn test_launch_directory_joins_relative_dir() {
        let dir = launch_directory(Some(Path::new("sub")), || Ok(PathBuf::from("/work"))).unwrap();
        assert_eq!(dir, PathBuf::from("/work/sub"));
        assert_eq!(
            launch_directory(None, || Ok(PathBuf::from("/work"))).unwrap(),
            PathBuf::from("/work")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_bare_command_resolves_from_dot() {
        // the fallback directory is only consulted for paths with a separator
        let env = EnvPolicy::Inherit.effective_environment(&Default::default());
        assert!(resolve_program("sh", &env, Path::new(".")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_termination_from_signal_status() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(
            termination_from_status(ExitStatus::from_raw(3 << 8)),
            Termination::Exited(3)
        );
        assert_eq!(
            termination_from_status(ExitStatus::from_raw(9)),
            Termination::Signaled(9)
        );
    }
}
