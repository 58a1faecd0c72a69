use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cleanup::{CleanupFuture, CleanupManager};
use crate::executors::{Executor, ExecutorFuture};
use crate::execution::{
    CommandSpec, ProcessExecutor, ProcessExitStatus, ProcessSpawnRequest, run_and_collect,
    run_and_collect_stdout,
};
use crate::models::{CoreError, CoreErrorKind, CoreResult, EngineType, Job, RunOutput, ShardIndex};
use crate::storage::StorageProviderRegistry;

const DOCKER_COMMAND: &str = "docker";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(60);
const OUTPUTS_MOUNT: &str = "/outputs";

pub const EXECUTOR_LABEL: &str = "shoal.executor";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DockerSettings {
    pub results_root: PathBuf,
    pub run_timeout: Duration,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            results_root: std::env::temp_dir().join("shoal-results"),
            run_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Runs job shards as containers through the docker CLI.
pub struct DockerExecutor {
    id: String,
    storage: Arc<StorageProviderRegistry>,
    process: Arc<dyn ProcessExecutor>,
    settings: DockerSettings,
}

impl DockerExecutor {
    /// Probes the container runtime and registers container teardown.
    ///
    /// Fails with a configuration error when the runtime cannot be reached;
    /// the probe is not retried.
    pub async fn new(
        cleanup: &CleanupManager,
        id: &str,
        storage: Arc<StorageProviderRegistry>,
        process: Arc<dyn ProcessExecutor>,
        settings: DockerSettings,
    ) -> CoreResult<Self> {
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(configuration_error(format!(
                "invalid docker executor id '{id}'"
            )));
        }

        let version = run_and_collect_stdout(
            process.as_ref(),
            docker_version_request(),
            CoreErrorKind::Configuration,
        )
        .await
        .map_err(|error| {
            configuration_error(format!("container runtime is unreachable: {}", error.message))
        })?;

        let cleanup_process = process.clone();
        let cleanup_id = id.to_string();
        cleanup.register(format!("docker containers {id}"), move || {
            Box::pin(remove_labelled_containers(cleanup_process, cleanup_id)) as CleanupFuture
        })?;

        tracing::info!(
            executor_id = %id,
            docker_version = %version.trim(),
            storage_sources = ?storage.sources(),
            "docker executor ready"
        );

        Ok(Self {
            id: id.to_string(),
            storage,
            process,
            settings,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    async fn remove_container(&self, container: &str) {
        let removed = run_and_collect_stdout(
            self.process.as_ref(),
            docker_remove_containers_request(&[container.to_string()]),
            CoreErrorKind::ProcessFailure,
        )
        .await;
        match removed {
            Ok(_) => tracing::info!(container, "removed interrupted container"),
            Err(error) => {
                tracing::warn!(container, %error, "failed to remove interrupted container")
            }
        }
    }

    async fn run_shard(&self, job: &Job, shard: ShardIndex) -> CoreResult<RunOutput> {
        if job.spec.docker.image.is_empty() {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "docker job must name an image",
            )
            .engine(EngineType::Docker)
            .job(&job.id));
        }

        let mut mounts = Vec::new();
        for spec in job.spec.inputs.iter().chain(&job.spec.contexts) {
            let local = self
                .storage
                .resolve(spec)
                .await
                .map_err(|error| error.attribute(EngineType::Docker, &job.id))?;
            mounts.push((local, spec.path.clone()));
        }

        let results_dir = self
            .settings
            .results_root
            .join(container_safe(&job.id))
            .join(format!("shard-{}", shard.0));
        std::fs::create_dir_all(&results_dir).map_err(|error| {
            CoreError::new(
                CoreErrorKind::StorageFailure,
                format!(
                    "failed to create results directory '{}': {error}",
                    results_dir.display()
                ),
            )
            .engine(EngineType::Docker)
            .job(&job.id)
        })?;

        let container = container_name(job, shard);
        let request = docker_run_request(&self.id, job, shard, &mounts, &results_dir)
            .timeout(self.settings.run_timeout);

        // A killed `docker run` client leaves its container behind.
        let output = match run_and_collect(self.process.as_ref(), request).await {
            Ok(output) => output,
            Err(error) => {
                if error.kind == CoreErrorKind::Timeout {
                    self.remove_container(&container).await;
                }
                return Err(error);
            }
        };

        let exit_code = match output.status {
            ProcessExitStatus::ExitCode(code) => code,
            ProcessExitStatus::Terminated => {
                self.remove_container(&container).await;
                return Err(CoreError::new(
                    CoreErrorKind::ProcessFailure,
                    "container was terminated by signal",
                )
                .engine(EngineType::Docker)
                .job(&job.id));
            }
        };

        let run_output = RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code,
            results_dir: Some(results_dir),
        };
        write_run_files(&run_output, &job.id)?;

        tracing::info!(
            job_id = %job.id,
            shard = shard.0,
            exit_code,
            "docker shard finished"
        );
        Ok(run_output)
    }
}

impl Executor for DockerExecutor {
    fn engine(&self) -> EngineType {
        EngineType::Docker
    }

    fn is_installed(&self) -> ExecutorFuture<'_, bool> {
        Box::pin(async move {
            let probe = run_and_collect_stdout(
                self.process.as_ref(),
                docker_version_request(),
                CoreErrorKind::ProcessFailure,
            )
            .await;
            Ok(probe.is_ok())
        })
    }

    fn run<'a>(&'a self, job: &'a Job, shard: ShardIndex) -> ExecutorFuture<'a, RunOutput> {
        Box::pin(self.run_shard(job, shard))
    }
}

pub fn docker_version_request() -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        CommandSpec::new(DOCKER_COMMAND).args(["version", "--format", "{{.Server.Version}}"]),
    )
    .engine(EngineType::Docker)
    .timeout(PROBE_TIMEOUT)
}

pub fn docker_list_containers_request(executor_id: &str) -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        CommandSpec::new(DOCKER_COMMAND)
            .args(["ps", "--all", "--quiet", "--filter"])
            .arg(format!("label={EXECUTOR_LABEL}={executor_id}")),
    )
    .engine(EngineType::Docker)
    .timeout(CLEANUP_TIMEOUT)
}

pub fn docker_remove_containers_request(container_ids: &[String]) -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        CommandSpec::new(DOCKER_COMMAND)
            .args(["rm", "--force"])
            .args(container_ids.iter().cloned()),
    )
    .engine(EngineType::Docker)
    .timeout(CLEANUP_TIMEOUT)
}

pub fn docker_run_request(
    executor_id: &str,
    job: &Job,
    shard: ShardIndex,
    mounts: &[(PathBuf, String)],
    results_dir: &Path,
) -> ProcessSpawnRequest {
    let spec = &job.spec;
    let mut command = CommandSpec::new(DOCKER_COMMAND)
        .args(["run", "--rm", "--name"])
        .arg(container_name(job, shard))
        .arg("--label")
        .arg(format!("{EXECUTOR_LABEL}={executor_id}"));

    if !spec.resources.cpu.is_empty() {
        command = command.arg("--cpus").arg(&spec.resources.cpu);
    }
    if !spec.resources.memory.is_empty() {
        command = command.arg("--memory").arg(&spec.resources.memory);
    }
    for entry in &spec.docker.env {
        command = command.arg("--env").arg(entry);
    }
    for (local, path) in mounts {
        command = command
            .arg("--volume")
            .arg(format!("{}:{path}:ro", local.display()));
    }

    command = command
        .arg("--volume")
        .arg(format!("{}:{OUTPUTS_MOUNT}", results_dir.display()))
        .arg(&spec.docker.image)
        .args(spec.docker.entrypoint.iter().cloned());

    ProcessSpawnRequest::new(command)
        .engine(EngineType::Docker)
        .job_id(&job.id)
}

async fn remove_labelled_containers(
    process: Arc<dyn ProcessExecutor>,
    executor_id: String,
) -> CoreResult<()> {
    let listing = run_and_collect_stdout(
        process.as_ref(),
        docker_list_containers_request(&executor_id),
        CoreErrorKind::ProcessFailure,
    )
    .await?;

    let container_ids = listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    if container_ids.is_empty() {
        return Ok(());
    }

    run_and_collect_stdout(
        process.as_ref(),
        docker_remove_containers_request(&container_ids),
        CoreErrorKind::ProcessFailure,
    )
    .await?;
    tracing::info!(
        executor_id = %executor_id,
        removed = container_ids.len(),
        "removed docker containers"
    );
    Ok(())
}

fn write_run_files(output: &RunOutput, job_id: &str) -> CoreResult<()> {
    let Some(dir) = &output.results_dir else {
        return Ok(());
    };

    let files = [
        ("stdout", output.stdout.clone()),
        ("stderr", output.stderr.clone()),
        ("exitCode", output.exit_code.to_string()),
    ];
    for (name, contents) in files {
        std::fs::write(dir.join(name), contents).map_err(|error| {
            CoreError::new(
                CoreErrorKind::StorageFailure,
                format!("failed to write {name} for job results: {error}"),
            )
            .engine(EngineType::Docker)
            .job(job_id)
        })?;
    }
    Ok(())
}

pub fn container_name(job: &Job, shard: ShardIndex) -> String {
    format!("shoal-{}-{}", container_safe(&job.id), shard.0)
}

fn container_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn configuration_error(message: String) -> CoreError {
    CoreError::new(CoreErrorKind::Configuration, message).engine(EngineType::Docker)
}
