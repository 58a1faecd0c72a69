#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use shoal_core::config::NodeConfig;
use shoal_core::execution::{
    ExecutionResult, ProcessExecutor, ProcessExitStatus, ProcessOutput, ProcessSpawnRequest,
    ProcessWaitFuture, RunningProcess,
};
use shoal_core::models::{CoreError, CoreErrorKind};

static NEXT_SCRATCH_ID: AtomicU64 = AtomicU64::new(0);

/// A response scripted for requests whose program and first argument match.
#[derive(Clone)]
struct Script {
    program: String,
    first_arg: String,
    outcome: Outcome,
}

#[derive(Clone)]
enum Outcome {
    Exit {
        status: ProcessExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    TimedOut,
}

/// Fake docker/ipfs CLIs. Unscripted requests succeed with empty output.
/// Like the ipfs CLI, any request carrying `--output <path>` creates that
/// directory before exiting, whatever its scripted status.
#[derive(Clone, Default)]
pub struct ScriptedProcessExecutor {
    scripts: Arc<Mutex<Vec<Script>>>,
    requests: Arc<Mutex<Vec<ProcessSpawnRequest>>>,
}

impl ScriptedProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Docker answers the version probe; everything else succeeds silently.
    pub fn healthy() -> Self {
        Self::new().respond("docker", "version", 0, "27.3.1\n", "")
    }

    pub fn respond(self, program: &str, first_arg: &str, code: i32, stdout: &str, stderr: &str) -> Self {
        self.push(Script {
            program: program.to_string(),
            first_arg: first_arg.to_string(),
            outcome: Outcome::Exit {
                status: ProcessExitStatus::ExitCode(code),
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            },
        });
        self
    }

    pub fn terminate(self, program: &str, first_arg: &str) -> Self {
        self.push(Script {
            program: program.to_string(),
            first_arg: first_arg.to_string(),
            outcome: Outcome::Exit {
                status: ProcessExitStatus::Terminated,
                stdout: Vec::new(),
                stderr: Vec::new(),
            },
        });
        self
    }

    /// Matching requests fail their wait with a timeout error.
    pub fn time_out(self, program: &str, first_arg: &str) -> Self {
        self.push(Script {
            program: program.to_string(),
            first_arg: first_arg.to_string(),
            outcome: Outcome::TimedOut,
        });
        self
    }

    fn push(&self, script: Script) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.push(script);
        }
    }

    pub fn requests(&self) -> Vec<ProcessSpawnRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// `program first_arg` for every captured request, in spawn order.
    pub fn invocations(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| {
                format!(
                    "{} {}",
                    request.command.program_name(),
                    request.command.args.first().map(String::as_str).unwrap_or("")
                )
            })
            .collect()
    }

    /// Full argument lists of requests matching `program first_arg`.
    pub fn args_of(&self, program: &str, first_arg: &str) -> Vec<Vec<String>> {
        self.requests()
            .into_iter()
            .filter(|request| {
                request.command.program_name() == program
                    && request.command.args.first().map(String::as_str) == Some(first_arg)
            })
            .map(|request| request.command.args)
            .collect()
    }

    pub fn count(&self, program: &str, first_arg: &str) -> usize {
        let wanted = format!("{program} {first_arg}");
        self.invocations()
            .into_iter()
            .filter(|invocation| *invocation == wanted)
            .count()
    }
}

struct FakeProcess {
    result: ExecutionResult<ProcessOutput>,
}

impl RunningProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(7777)
    }

    fn wait(self: Box<Self>) -> ProcessWaitFuture {
        let result = self.result;
        Box::pin(async move { result })
    }
}

fn output_path(request: &ProcessSpawnRequest) -> Option<PathBuf> {
    let args = &request.command.args;
    args.iter()
        .position(|arg| arg == "--output")
        .and_then(|index| args.get(index + 1))
        .map(PathBuf::from)
}

impl ProcessExecutor for ScriptedProcessExecutor {
    fn spawn(&self, request: ProcessSpawnRequest) -> ExecutionResult<Box<dyn RunningProcess>> {
        let program = request.command.program_name();
        let first_arg = request.command.args.first().cloned().unwrap_or_default();

        let script = self
            .scripts
            .lock()
            .map_err(|_| CoreError::new(CoreErrorKind::Internal, "script lock poisoned"))?
            .iter()
            .find(|script| script.program == program && script.first_arg == first_arg)
            .cloned();

        if let Some(path) = output_path(&request) {
            std::fs::create_dir_all(&path).map_err(|error| {
                CoreError::new(CoreErrorKind::Internal, format!("fake output: {error}"))
            })?;
        }

        let outcome = script.map(|script| script.outcome).unwrap_or(Outcome::Exit {
            status: ProcessExitStatus::ExitCode(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        });
        let now = SystemTime::now();
        let result = match outcome {
            Outcome::Exit {
                status,
                stdout,
                stderr,
            } => Ok(ProcessOutput {
                status,
                stdout,
                stderr,
                started_at: now,
                finished_at: now,
            }),
            Outcome::TimedOut => Err(request.error(CoreErrorKind::Timeout, "process timed out")),
        };

        self.requests
            .lock()
            .map_err(|_| CoreError::new(CoreErrorKind::Internal, "capture lock poisoned"))?
            .push(request);

        Ok(Box::new(FakeProcess { result }))
    }
}

/// A fresh directory under the system temp dir for one test.
pub fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "shoal-test-{label}-{}-{}",
        std::process::id(),
        NEXT_SCRATCH_ID.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::create_dir_all(&dir).expect("scratch dir should be created");
    dir
}

/// Standard-mode config whose results and cache live in a scratch dir.
pub fn test_config(label: &str) -> NodeConfig {
    let root = scratch_dir(label);
    NodeConfig::default()
        .executor_id("test-node")
        .results_root(root.join("results"))
        .cache_root(root.join("cache"))
}
