pub mod capability;

pub use capability::{CapabilityRegistry, ExecutorLookup, RegistryBuilder};

use std::sync::Arc;

use crate::cleanup::CleanupManager;
use crate::config::{NodeConfig, RegistryMode};
use crate::executors::{DockerExecutor, Executor, LanguageExecutor, NoopExecutor, PythonWasmExecutor};
use crate::execution::ProcessExecutor;
use crate::models::{CoreResult, EngineType};
use crate::storage::build_storage_providers;

/// Builds the registry a production node runs with.
///
/// Storage comes first, then the docker leaf, then each meta-executor, which
/// is inserted as soon as it is constructed. Any failure aborts the build;
/// whatever was already registered with `cleanup` is released by its sweep.
pub async fn standard_executors(
    cleanup: &CleanupManager,
    config: &NodeConfig,
    process: Arc<dyn ProcessExecutor>,
) -> CoreResult<CapabilityRegistry> {
    config.validate()?;

    let storage = Arc::new(build_storage_providers(
        cleanup,
        &config.ipfs_api,
        process.clone(),
        &config.cache_root,
    )?);

    let mut builder = RegistryBuilder::new();

    let docker = DockerExecutor::new(
        cleanup,
        &config.executor_id,
        storage,
        process,
        config.docker_settings(),
    )
    .await?;
    builder.insert(EngineType::Docker, Arc::new(docker))?;

    let language = LanguageExecutor::new(builder.lookup_handle())?;
    builder.insert(EngineType::Language, Arc::new(language))?;

    let python_wasm = PythonWasmExecutor::new(builder.lookup_handle())?;
    builder.insert(EngineType::PythonWasm, Arc::new(python_wasm))?;

    let registry = builder.seal();
    tracing::info!(engines = ?registry.engines(), "standard executors ready");
    Ok(registry)
}

/// Builds a registry where one stub executor serves every engine that
/// standard mode would expose to a job.
pub fn noop_executors(cleanup: &CleanupManager) -> CoreResult<CapabilityRegistry> {
    noop_executors_with(cleanup, Arc::new(NoopExecutor::new()))
}

/// Same as [`noop_executors`], around a caller-held stub so its run count
/// stays observable.
pub fn noop_executors_with(
    _cleanup: &CleanupManager,
    noop: Arc<NoopExecutor>,
) -> CoreResult<CapabilityRegistry> {
    let noop: Arc<dyn Executor> = noop;

    let mut builder = RegistryBuilder::new();
    builder.insert(EngineType::Docker, noop.clone())?;
    builder.insert(EngineType::Noop, noop)?;

    let registry = builder.seal();
    tracing::info!(engines = ?registry.engines(), "noop executors ready");
    Ok(registry)
}

pub async fn build_executors(
    cleanup: &CleanupManager,
    config: &NodeConfig,
    process: Arc<dyn ProcessExecutor>,
) -> CoreResult<CapabilityRegistry> {
    tracing::debug!(mode = %config.mode, "building executors");
    match config.mode {
        RegistryMode::Standard => standard_executors(cleanup, config, process).await,
        RegistryMode::Noop => noop_executors(cleanup),
    }
}
