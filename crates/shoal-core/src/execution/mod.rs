pub mod output;
pub mod tokio_process;

pub use output::{run_and_collect, run_and_collect_stdout};
pub use tokio_process::TokioProcessExecutor;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::{Duration, SystemTime};

use crate::models::{CoreError, CoreErrorKind, EngineType, StorageSourceType};

pub type ExecutionResult<T> = Result<T, CoreError>;

pub type ProcessWaitFuture = Pin<Box<dyn Future<Output = ExecutionResult<ProcessOutput>> + Send>>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The program's file name, for matching requests in logs and tests.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.program.as_os_str().is_empty() {
            return Err("command program path must not be empty");
        }

        if self
            .args
            .iter()
            .any(|arg| arg.is_empty() || arg.contains('\0'))
        {
            return Err("command args must be non-empty and must not contain NUL bytes");
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProcessSpawnRequest {
    pub engine: Option<EngineType>,
    pub storage: Option<StorageSourceType>,
    pub job_id: Option<String>,
    pub command: CommandSpec,
    pub timeout: Option<Duration>,
    pub requested_at: SystemTime,
}

impl ProcessSpawnRequest {
    pub fn new(command: CommandSpec) -> Self {
        Self {
            engine: None,
            storage: None,
            job_id: None,
            command,
            timeout: None,
            requested_at: SystemTime::now(),
        }
    }

    pub fn engine(mut self, engine: EngineType) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn storage(mut self, storage: StorageSourceType) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> ExecutionResult<()> {
        self.command
            .validate()
            .map_err(|message| self.error(CoreErrorKind::InvalidInput, message))?;

        if let Some(timeout) = self.timeout
            && timeout.is_zero()
        {
            return Err(self.error(
                CoreErrorKind::InvalidInput,
                "timeout must be greater than zero when provided",
            ));
        }

        Ok(())
    }

    /// Builds an error carrying this request's engine, storage and job context.
    pub fn error(&self, kind: CoreErrorKind, message: impl Into<String>) -> CoreError {
        CoreError {
            engine: self.engine,
            storage: self.storage,
            job: self.job_id.clone(),
            kind,
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProcessExitStatus {
    ExitCode(i32),
    Terminated,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProcessOutput {
    pub status: ProcessExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
}

/// A spawned child. `wait` enforces the request timeout and kills the
/// child's process group when it expires.
pub trait RunningProcess: Send {
    fn pid(&self) -> Option<u32>;

    fn wait(self: Box<Self>) -> ProcessWaitFuture;
}

pub trait ProcessExecutor: Send + Sync {
    fn spawn(&self, request: ProcessSpawnRequest) -> ExecutionResult<Box<dyn RunningProcess>>;
}

pub fn spawn_validated(
    executor: &dyn ProcessExecutor,
    request: ProcessSpawnRequest,
) -> ExecutionResult<Box<dyn RunningProcess>> {
    request.validate()?;
    executor.spawn(request)
}
