use crate::executors::{Executor, ExecutorFuture, delegates_installed};
use crate::models::{
    CoreError, CoreErrorKind, CoreResult, EngineType, Job, RunOutput, ShardIndex,
    StorageSourceType, StorageSpec,
};
use crate::registry::ExecutorLookup;

pub const PYODIDE_IMAGE: &str = "ghcr.io/shoal-compute/pyodide:0.21.3";
const PYODIDE_JOB_DIR: &str = "/pyodide_inputs/job";

/// Runs deterministic python programs inside a pyodide (WASM) container by
/// rewriting them into docker jobs.
pub struct PythonWasmExecutor {
    executors: ExecutorLookup,
}

impl PythonWasmExecutor {
    pub fn new(executors: ExecutorLookup) -> CoreResult<Self> {
        Ok(Self { executors })
    }

    async fn run_shard(&self, job: &Job, shard: ShardIndex) -> CoreResult<RunOutput> {
        let docker_job = python_wasm_docker_job(job)?;
        let delegate = self
            .executors
            .resolve(EngineType::Docker, EngineType::PythonWasm)
            .map_err(|error| error.job(&job.id))?;

        tracing::debug!(
            job_id = %job.id,
            shard = shard.0,
            image = PYODIDE_IMAGE,
            "delegating python-wasm job to docker"
        );
        delegate.run(&docker_job, shard).await
    }
}

impl Executor for PythonWasmExecutor {
    fn engine(&self) -> EngineType {
        EngineType::PythonWasm
    }

    fn is_installed(&self) -> ExecutorFuture<'_, bool> {
        Box::pin(delegates_installed(&self.executors, EngineType::PythonWasm))
    }

    fn run<'a>(&'a self, job: &'a Job, shard: ShardIndex) -> ExecutorFuture<'a, RunOutput> {
        Box::pin(self.run_shard(job, shard))
    }
}

/// Rewrites a python language job into the docker job that runs it under pyodide.
pub fn python_wasm_docker_job(job: &Job) -> CoreResult<Job> {
    // Every context mounts at the job dir, so only one fits.
    if job.spec.contexts.len() > 1 {
        return Err(CoreError::new(
            CoreErrorKind::InvalidInput,
            format!(
                "python job accepts at most one context, got {}",
                job.spec.contexts.len()
            ),
        )
        .engine(EngineType::PythonWasm)
        .job(&job.id));
    }

    let language = &job.spec.language;
    let entrypoint = if !language.program_path.is_empty() {
        vec![
            "node".to_string(),
            "n.js".to_string(),
            format!("{PYODIDE_JOB_DIR}/{}", language.program_path),
        ]
    } else if !language.command.is_empty() {
        vec![
            "node".to_string(),
            "n.js".to_string(),
            "-c".to_string(),
            language.command.clone(),
        ]
    } else {
        return Err(CoreError::new(
            CoreErrorKind::InvalidInput,
            "python job needs either a command or a program path",
        )
        .engine(EngineType::PythonWasm)
        .job(&job.id));
    };

    let mut docker_job = job.clone();
    docker_job.spec.engine = EngineType::Docker;
    docker_job.spec.docker.image = PYODIDE_IMAGE.to_string();
    docker_job.spec.docker.entrypoint = entrypoint;
    docker_job.spec.contexts = job
        .spec
        .contexts
        .iter()
        .map(|context| StorageSpec {
            path: PYODIDE_JOB_DIR.to_string(),
            ..context.clone()
        })
        .collect();
    if !language.requirements_path.is_empty() {
        docker_job
            .spec
            .docker
            .env
            .push(format!("REQUIREMENTS_PATH={PYODIDE_JOB_DIR}/{}", language.requirements_path));
    }
    if docker_job
        .spec
        .contexts
        .iter()
        .any(|context| context.engine == StorageSourceType::IpfsFuseDocker)
    {
        return Err(CoreError::new(
            CoreErrorKind::InvalidInput,
            "python job contexts cannot use the fuse storage driver",
        )
        .engine(EngineType::PythonWasm)
        .job(&job.id));
    }

    Ok(docker_job)
}

#[cfg(test)]
mod tests {
    use super::{PYODIDE_IMAGE, python_wasm_docker_job};
    use crate::models::{EngineType, Job, JobSpec, StorageSourceType, StorageSpec};

    fn python_job() -> Job {
        let mut spec = JobSpec::new(EngineType::PythonWasm);
        spec.language.language = "python".to_string();
        spec.language.language_version = "3.10".to_string();
        spec.language.deterministic = true;
        Job::new("py-1", spec)
    }

    #[test]
    fn command_jobs_run_inline() {
        let mut job = python_job();
        job.spec.language.command = "print(1)".to_string();

        let docker_job = python_wasm_docker_job(&job).expect("rewrite should succeed");

        assert_eq!(docker_job.spec.engine, EngineType::Docker);
        assert_eq!(docker_job.spec.docker.image, PYODIDE_IMAGE);
        assert_eq!(
            docker_job.spec.docker.entrypoint,
            vec!["node", "n.js", "-c", "print(1)"]
        );
    }

    #[test]
    fn program_jobs_mount_contexts_under_the_job_dir() {
        let mut job = python_job();
        job.spec.language.program_path = "main.py".to_string();
        job.spec.contexts = vec![StorageSpec::new(
            StorageSourceType::IpfsDefault,
            "QmContext",
            "/ignored",
        )];

        let docker_job = python_wasm_docker_job(&job).expect("rewrite should succeed");

        assert_eq!(
            docker_job.spec.docker.entrypoint,
            vec!["node", "n.js", "/pyodide_inputs/job/main.py"]
        );
        assert_eq!(docker_job.spec.contexts[0].path, "/pyodide_inputs/job");
        assert_eq!(docker_job.spec.contexts[0].cid, "QmContext");
    }

    #[test]
    fn more_than_one_context_is_rejected() {
        let mut job = python_job();
        job.spec.language.program_path = "main.py".to_string();
        job.spec.contexts = ["QmFirst", "QmSecond"]
            .into_iter()
            .map(|cid| StorageSpec::new(StorageSourceType::IpfsDefault, cid, "/ctx"))
            .collect();

        let error = python_wasm_docker_job(&job).expect_err("contexts would share a mount");

        assert_eq!(error.kind, crate::models::CoreErrorKind::InvalidInput);
        assert_eq!(error.job.as_deref(), Some("py-1"));
    }

    #[test]
    fn jobs_without_a_program_are_rejected() {
        assert!(python_wasm_docker_job(&python_job()).is_err());
    }
}
