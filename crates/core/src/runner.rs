// Process runner: spawn, capture bounded output, enforce the timeout, always clean up

use crate::error::RunnerError;
use crate::types::{CommandSpec, ExecutionOutcome};
use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

const READ_CHUNK_BYTES: usize = 8192;

/// How long the pipes may stay open once the interpreter itself has exited
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Executes one external process per call
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<ExecutionOutcome, RunnerError>;
}

/// Runner backed by `tokio::process`
#[derive(Debug, Clone)]
pub struct TokioProcessRunner {
    output_limit: usize,
}

impl TokioProcessRunner {
    /// `output_limit` bounds stdout and stderr independently
    pub fn new(output_limit: usize) -> Self {
        Self { output_limit }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ExecutionOutcome, RunnerError> {
        let program = resolve_executable(&spec.executable).ok_or_else(|| RunnerError::NotFound {
            executable: spec.executable.clone(),
        })?;

        let mut command = std::process::Command::new(&program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so a timeout can take down anything the interpreter forked
            command.process_group(0);
        }
        let mut command = Command::from(command);
        command.kill_on_drop(true);

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => RunnerError::NotFound {
                executable: spec.executable.clone(),
            },
            _ => RunnerError::Spawn {
                executable: spec.executable.clone(),
                source,
            },
        })?;
        let pid = child.id();
        tracing::debug!(?pid, program = %program.display(), "spawned interpreter");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.output_limit;
        let mut stdout_captured = Captured::default();
        let mut stderr_captured = Captured::default();

        let collected = tokio::time::timeout(spec.timeout, async {
            let reads = async {
                tokio::try_join!(
                    read_bounded(stdout, limit, &mut stdout_captured),
                    read_bounded(stderr, limit, &mut stderr_captured),
                )
            };
            tokio::pin!(reads);

            let exited = tokio::select! {
                drained = &mut reads => {
                    drained?;
                    None
                }
                status = child.wait() => Some(status?),
            };
            match exited {
                None => child.wait().await,
                Some(status) => {
                    drain_after_exit(&mut reads, pid).await?;
                    Ok(status)
                }
            }
        })
        .await;
        let elapsed = start.elapsed();

        match collected {
            Ok(Ok(status)) => {
                tracing::debug!(?pid, code = ?status.code(), ?elapsed, "interpreter exited");
                Ok(ExecutionOutcome {
                    exit_code: status.code(),
                    stdout: stdout_captured.bytes,
                    stderr: stderr_captured.bytes,
                    stdout_truncated: stdout_captured.truncated,
                    stderr_truncated: stderr_captured.truncated,
                    elapsed,
                    timeout: spec.timeout,
                    timed_out: false,
                })
            }
            Ok(Err(err)) => {
                tracing::warn!(?pid, error = %err, "lost interpreter output, killing process");
                terminate(&mut child, pid).await;
                Err(RunnerError::Io(err))
            }
            Err(_) => {
                tracing::warn!(?pid, timeout = ?spec.timeout, "interpreter timed out, killing process");
                terminate(&mut child, pid).await;
                Ok(ExecutionOutcome {
                    exit_code: None,
                    stdout: stdout_captured.bytes,
                    stderr: stderr_captured.bytes,
                    stdout_truncated: stdout_captured.truncated,
                    stderr_truncated: stderr_captured.truncated,
                    elapsed: start.elapsed(),
                    timeout: spec.timeout,
                    timed_out: true,
                })
            }
        }
    }
}

/// The interpreter has exited but something it started may still hold the
/// pipes open. Wait briefly, then kill the rest of its process group and keep
/// whatever was captured.
async fn drain_after_exit<F>(reads: &mut Pin<&mut F>, pid: Option<u32>) -> std::io::Result<()>
where
    F: Future<Output = std::io::Result<((), ())>>,
{
    if let Ok(drained) = tokio::time::timeout(PIPE_DRAIN_GRACE, reads.as_mut()).await {
        return drained.map(|_| ());
    }

    tracing::debug!(?pid, "descendants still hold the output pipes, killing process group");
    if let Some(pid) = pid {
        kill_process_group(pid);
    }
    match tokio::time::timeout(PIPE_DRAIN_GRACE, reads.as_mut()).await {
        Ok(drained) => drained.map(|_| ()),
        Err(_) => {
            tracing::warn!(?pid, "output pipes still open after kill, returning partial output");
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Read a stream to EOF, keeping at most `limit` bytes. The remainder is
/// drained and dropped so the child never stalls on a full pipe.
async fn read_bounded<R>(
    reader: Option<R>,
    limit: usize,
    captured: &mut Captured,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };

    let mut chunk = [0u8; READ_CHUNK_BYTES];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.bytes.len());
        if n > room {
            captured.truncated = true;
        }
        captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
    }
    Ok(())
}

async fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        kill_process_group(pid);
    }
    // kill() also reaps, so no zombie outlives the call
    if let Err(err) = child.kill().await {
        tracing::warn!(?pid, error = %err, "failed to kill interpreter");
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => tracing::warn!(pid, error = %err, "failed to kill interpreter process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

/// Locate the executable the way a shell would: explicit paths are taken as
/// given, bare names are searched on `PATH`.
pub fn resolve_executable(executable: &Path) -> Option<PathBuf> {
    if executable.as_os_str().is_empty() {
        return None;
    }
    if executable.is_absolute() || executable.components().count() > 1 {
        return executable.is_file().then(|| executable.to_path_buf());
    }

    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .flat_map(|dir| candidates(&dir, executable))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn candidates(dir: &Path, name: &Path) -> Vec<PathBuf> {
    let plain = dir.join(name);
    if name.extension().is_some() {
        vec![plain]
    } else {
        vec![plain.with_extension("exe"), plain]
    }
}

#[cfg(not(windows))]
fn candidates(dir: &Path, name: &Path) -> Vec<PathBuf> {
    vec![dir.join(name)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
