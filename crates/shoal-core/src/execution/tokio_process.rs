use std::process::{ExitStatus, Stdio};
use std::time::{Duration, SystemTime};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::execution::{
    ExecutionResult, ProcessExecutor, ProcessExitStatus, ProcessOutput, ProcessSpawnRequest,
    ProcessWaitFuture, RunningProcess,
};
use crate::models::{CoreError, CoreErrorKind};

/// How long pipes are drained after exit; grandchildren may hold them open.
const PIPE_DRAIN_WINDOW: Duration = Duration::from_millis(250);
/// How long a killed group gets to be reaped before the timeout is reported.
const REAP_WINDOW: Duration = Duration::from_secs(1);

/// Runs docker and ipfs CLIs as real child processes, each in its own
/// process group.
pub struct TokioProcessExecutor;

impl ProcessExecutor for TokioProcessExecutor {
    fn spawn(&self, request: ProcessSpawnRequest) -> ExecutionResult<Box<dyn RunningProcess>> {
        let mut child = Command::new(&request.command.program)
            .args(&request.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
            .map_err(|error| {
                request.error(
                    CoreErrorKind::ProcessFailure,
                    format!("failed to spawn '{}': {error}", request.command.program_name()),
                )
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        tracing::debug!(
            program = %request.command.program_name(),
            pid = ?child.id(),
            engine = ?request.engine,
            storage = ?request.storage,
            job_id = ?request.job_id,
            "spawned process"
        );

        Ok(Box::new(ChildProcess {
            pid: child.id(),
            child,
            stdout,
            stderr,
            started_at: SystemTime::now(),
            request,
        }))
    }
}

struct ChildProcess {
    child: Child,
    pid: Option<u32>,
    stdout: JoinHandle<Vec<u8>>,
    stderr: JoinHandle<Vec<u8>>,
    started_at: SystemTime,
    request: ProcessSpawnRequest,
}

impl ChildProcess {
    async fn finish(mut self) -> ExecutionResult<ProcessOutput> {
        let status = match self.request.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.child.wait()).await {
                Ok(status) => status,
                Err(_) => return Err(self.kill_after_timeout(limit).await),
            },
            None => self.child.wait().await,
        }
        .map_err(|error| {
            self.request.error(
                CoreErrorKind::ProcessFailure,
                format!("failed to wait for process: {error}"),
            )
        })?;

        Ok(ProcessOutput {
            status: exit_status(status),
            stdout: collect(self.stdout).await,
            stderr: collect(self.stderr).await,
            started_at: self.started_at,
            finished_at: SystemTime::now(),
        })
    }

    async fn kill_after_timeout(&mut self, limit: Duration) -> CoreError {
        if let Some(pid) = self.pid
            && let Err(error) = kill_group(pid)
        {
            tracing::warn!(pid, %error, "failed to kill timed out process group");
        }
        let _ = tokio::time::timeout(REAP_WINDOW, self.child.wait()).await;
        self.stdout.abort();
        self.stderr.abort();

        self.request.error(
            CoreErrorKind::Timeout,
            format!(
                "'{}' timed out after {}ms",
                self.request.command.program_name(),
                limit.as_millis()
            ),
        )
    }
}

impl RunningProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn wait(self: Box<Self>) -> ProcessWaitFuture {
        Box::pin((*self).finish())
    }
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer).await;
        }
        buffer
    })
}

async fn collect(reader: JoinHandle<Vec<u8>>) -> Vec<u8> {
    match tokio::time::timeout(PIPE_DRAIN_WINDOW, reader).await {
        Ok(Ok(buffer)) => buffer,
        _ => Vec::new(),
    }
}

fn exit_status(status: ExitStatus) -> ProcessExitStatus {
    status
        .code()
        .map_or(ProcessExitStatus::Terminated, ProcessExitStatus::ExitCode)
}

/// SIGKILLs the child's whole process group. An already-gone group is not an error.
fn kill_group(pid: u32) -> std::io::Result<()> {
    let pgid = -(pid as libc::pid_t);
    // SAFETY: kill(2) takes plain integers and touches no memory we own.
    if unsafe { libc::kill(pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    let error = std::io::Error::last_os_error();
    match error.raw_os_error() {
        Some(libc::ESRCH) => Ok(()),
        _ => Err(error),
    }
}
