use crate::execution::{
    ExecutionResult, ProcessExecutor, ProcessExitStatus, ProcessOutput, ProcessSpawnRequest,
    spawn_validated,
};
use crate::models::CoreErrorKind;

/// Spawns the request and waits for it, whatever the exit status.
pub async fn run_and_collect(
    executor: &dyn ProcessExecutor,
    request: ProcessSpawnRequest,
) -> ExecutionResult<ProcessOutput> {
    let process = spawn_validated(executor, request)?;
    process.wait().await
}

/// Spawns the request and returns its stdout, failing on any non-zero exit.
pub async fn run_and_collect_stdout(
    executor: &dyn ProcessExecutor,
    request: ProcessSpawnRequest,
    failure_kind: CoreErrorKind,
) -> ExecutionResult<String> {
    let context = request.clone();
    let output = run_and_collect(executor, request).await?;

    match output.status {
        ProcessExitStatus::ExitCode(0) => String::from_utf8(output.stdout).map_err(|error| {
            context.error(
                CoreErrorKind::InvalidInput,
                format!("process stdout is not valid UTF-8: {error}"),
            )
        }),
        ProcessExitStatus::ExitCode(code) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(context.error(
                failure_kind,
                format!(
                    "'{}' exited with code {code}: {}",
                    context.command.program_name(),
                    stderr.trim()
                ),
            ))
        }
        ProcessExitStatus::Terminated => Err(context.error(
            failure_kind,
            format!(
                "'{}' was terminated by signal",
                context.command.program_name()
            ),
        )),
    }
}
