pub mod docker;
pub mod language;
pub mod noop;
pub mod python_wasm;

pub use docker::{
    DockerExecutor, DockerSettings, EXECUTOR_LABEL, container_name, docker_list_containers_request,
    docker_remove_containers_request, docker_run_request, docker_version_request,
};
pub use language::LanguageExecutor;
pub use noop::NoopExecutor;
pub use python_wasm::{PYODIDE_IMAGE, PythonWasmExecutor, python_wasm_docker_job};

use std::future::Future;
use std::pin::Pin;

use crate::catalog;
use crate::models::{CoreError, EngineType, Job, RunOutput, ShardIndex};
use crate::registry::ExecutorLookup;

pub type ExecutorResult<T> = Result<T, CoreError>;

pub type ExecutorFuture<'a, T> = Pin<Box<dyn Future<Output = ExecutorResult<T>> + Send + 'a>>;

/// A job-execution backend.
///
/// Implementations may be invoked concurrently for different shards; each
/// `run` is independent.
pub trait Executor: Send + Sync {
    fn engine(&self) -> EngineType;

    fn is_installed(&self) -> ExecutorFuture<'_, bool>;

    fn run<'a>(&'a self, job: &'a Job, shard: ShardIndex) -> ExecutorFuture<'a, RunOutput>;
}

/// Whether every catalogued delegate of `engine` is registered and installed.
async fn delegates_installed(executors: &ExecutorLookup, engine: EngineType) -> ExecutorResult<bool> {
    for delegate in catalog::delegates(engine) {
        match executors.lookup(*delegate) {
            Some(executor) if executor.is_installed().await? => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}
