mod support;

use std::sync::Arc;

use shoal_core::cleanup::CleanupManager;
use shoal_core::executors::{Executor, LanguageExecutor, PYODIDE_IMAGE};
use shoal_core::models::{
    CoreErrorKind, EngineType, Job, JobSpec, ShardIndex, StorageSourceType, StorageSpec,
};
use shoal_core::registry::{RegistryBuilder, standard_executors};
use support::{ScriptedProcessExecutor, scratch_dir, test_config};

fn python_job(id: &str) -> Job {
    let mut spec = JobSpec::new(EngineType::Language);
    spec.language.language = "python".to_string();
    spec.language.language_version = "3.10".to_string();
    spec.language.deterministic = true;
    spec.language.command = "print(1)".to_string();
    Job::new(id, spec)
}

fn docker_job(id: &str) -> Job {
    let mut spec = JobSpec::new(EngineType::Docker);
    spec.docker.image = "ubuntu:24.04".to_string();
    spec.docker.entrypoint = vec!["echo".to_string(), "hello".to_string()];
    spec.inputs = vec![StorageSpec::new(
        StorageSourceType::IpfsDefault,
        "QmInputs",
        "/inputs",
    )];
    Job::new(id, spec)
}

#[tokio::test]
async fn reachable_backend_yields_docker_and_meta_executors() {
    let cleanup = CleanupManager::new();
    let process = ScriptedProcessExecutor::healthy();
    let registry = standard_executors(&cleanup, &test_config("std-ok"), Arc::new(process.clone()))
        .await
        .expect("standard build should succeed");

    assert!(registry.lookup(EngineType::Docker).is_some());
    assert!(registry.lookup(EngineType::Language).is_some());
    assert!(registry.lookup(EngineType::PythonWasm).is_some());
    assert!(registry.lookup(EngineType::Noop).is_none());
    assert_eq!(
        registry.engines(),
        vec![EngineType::Docker, EngineType::Language, EngineType::PythonWasm]
    );
    assert_eq!(process.count("docker", "version"), 1);
    assert_eq!(cleanup.pending(), 2);
}

#[tokio::test]
async fn storage_failure_aborts_before_the_docker_probe() {
    let cleanup = CleanupManager::new();
    let process = ScriptedProcessExecutor::healthy();
    let blocker = scratch_dir("std-blocked").join("not-a-dir");
    std::fs::write(&blocker, b"occupied").expect("blocker file should be written");
    let config = test_config("std-blocked").cache_root(&blocker);

    let error = standard_executors(&cleanup, &config, Arc::new(process.clone()))
        .await
        .expect_err("storage failure should abort the build");

    assert_eq!(error.kind, CoreErrorKind::Configuration);
    assert!(process.requests().is_empty());
    assert_eq!(cleanup.pending(), 0);
}

#[tokio::test]
async fn malformed_network_address_aborts_without_spawning() {
    let cleanup = CleanupManager::new();
    let process = ScriptedProcessExecutor::healthy();
    let config = test_config("std-address").ipfs_api("localhost:5001");

    let error = standard_executors(&cleanup, &config, Arc::new(process.clone()))
        .await
        .expect_err("bad address should abort the build");

    assert_eq!(error.kind, CoreErrorKind::Configuration);
    assert!(process.requests().is_empty());
}

#[tokio::test]
async fn unreachable_container_runtime_is_a_configuration_error() {
    let cleanup = CleanupManager::new();
    let process = ScriptedProcessExecutor::new().respond(
        "docker",
        "version",
        1,
        "",
        "Cannot connect to the Docker daemon",
    );

    let error = standard_executors(&cleanup, &test_config("std-down"), Arc::new(process.clone()))
        .await
        .expect_err("unreachable runtime should abort the build");

    assert_eq!(error.kind, CoreErrorKind::Configuration);
    assert_eq!(error.engine, Some(EngineType::Docker));
    assert!(error.message.contains("Cannot connect to the Docker daemon"));
    assert_eq!(process.count("docker", "version"), 1);

    // The storage provider built before the failure is still released.
    assert_eq!(cleanup.pending(), 1);
    let report = cleanup.cleanup().await;
    assert!(report.is_clean());
    assert_eq!(report.ran, 1);
}

#[tokio::test]
async fn language_job_reaches_docker_through_python_wasm() {
    let cleanup = CleanupManager::new();
    let process = ScriptedProcessExecutor::healthy().respond("docker", "run", 0, "1\n", "");
    let registry = standard_executors(&cleanup, &test_config("std-chain"), Arc::new(process.clone()))
        .await
        .expect("standard build should succeed");

    let language = registry
        .lookup(EngineType::Language)
        .expect("language executor registered");
    let output = language
        .run(&python_job("py-1"), ShardIndex(0))
        .await
        .expect("language job should run");

    assert_eq!(output.stdout, "1\n");
    assert_eq!(output.exit_code, 0);

    let run = process
        .requests()
        .into_iter()
        .find(|request| request.command.args.first().map(String::as_str) == Some("run"))
        .expect("docker run should be spawned");
    let args = run.command.args.join(" ");
    assert!(args.contains(PYODIDE_IMAGE));
    assert!(args.ends_with("node n.js -c print(1)"));
    assert_eq!(run.engine, Some(EngineType::Docker));
    assert_eq!(run.job_id.as_deref(), Some("py-1"));
}

#[tokio::test]
async fn docker_run_mounts_resolved_inputs_and_records_results() {
    let cleanup = CleanupManager::new();
    let process = ScriptedProcessExecutor::healthy().respond("docker", "run", 3, "partial\n", "boom\n");
    let registry = standard_executors(&cleanup, &test_config("std-docker"), Arc::new(process.clone()))
        .await
        .expect("standard build should succeed");

    let docker = registry
        .lookup(EngineType::Docker)
        .expect("docker executor registered");
    let output = docker
        .run(&docker_job("job-7"), ShardIndex(2))
        .await
        .expect("a non-zero exit is reported, not raised");

    assert_eq!(output.exit_code, 3);
    assert_eq!(output.stderr, "boom\n");
    let results_dir = output.results_dir.expect("results dir should be set");
    assert!(results_dir.ends_with("job-7/shard-2"));
    assert_eq!(
        std::fs::read_to_string(results_dir.join("exitCode")).expect("exit code file"),
        "3"
    );

    assert_eq!(
        process.invocations(),
        vec!["docker version", "ipfs --api", "docker run"]
    );
    let run_args = process.requests()[2].command.args.join(" ");
    assert!(run_args.contains("QmInputs:/inputs:ro"));
}

#[tokio::test]
async fn terminated_container_propagates_through_meta_executors_unchanged() {
    let cleanup = CleanupManager::new();
    let process = ScriptedProcessExecutor::healthy().terminate("docker", "run");
    let registry = standard_executors(&cleanup, &test_config("std-killed"), Arc::new(process.clone()))
        .await
        .expect("standard build should succeed");

    let language = registry
        .lookup(EngineType::Language)
        .expect("language executor registered");
    let error = language
        .run(&python_job("py-killed"), ShardIndex(0))
        .await
        .expect_err("terminated container should fail");

    assert_eq!(error.kind, CoreErrorKind::ProcessFailure);
    assert_eq!(error.engine, Some(EngineType::Docker));
    assert_eq!(
        process.args_of("docker", "rm"),
        vec![vec!["rm", "--force", "shoal-py-killed-0"]]
    );
}

#[tokio::test]
async fn timed_out_container_is_removed_and_the_timeout_reported() {
    let cleanup = CleanupManager::new();
    let process = ScriptedProcessExecutor::healthy().time_out("docker", "run");
    let registry = standard_executors(&cleanup, &test_config("std-timeout"), Arc::new(process.clone()))
        .await
        .expect("standard build should succeed");

    let error = registry
        .lookup(EngineType::Docker)
        .expect("docker executor registered")
        .run(&docker_job("job/slow"), ShardIndex(3))
        .await
        .expect_err("timed out container should fail");

    assert_eq!(error.kind, CoreErrorKind::Timeout);
    assert_eq!(error.job.as_deref(), Some("job/slow"));
    assert_eq!(
        process.args_of("docker", "rm"),
        vec![vec!["rm", "--force", "shoal-job-slow-3"]]
    );
}

#[tokio::test]
async fn failed_container_removal_keeps_the_original_error() {
    let cleanup = CleanupManager::new();
    let process = ScriptedProcessExecutor::healthy()
        .time_out("docker", "run")
        .respond("docker", "rm", 1, "", "No such container");
    let registry = standard_executors(&cleanup, &test_config("std-timeout-rm"), Arc::new(process.clone()))
        .await
        .expect("standard build should succeed");

    let error = registry
        .lookup(EngineType::Docker)
        .expect("docker executor registered")
        .run(&docker_job("job-stuck"), ShardIndex(0))
        .await
        .expect_err("timed out container should fail");

    assert_eq!(error.kind, CoreErrorKind::Timeout);
    assert_eq!(process.count("docker", "rm"), 1);
}

#[tokio::test]
async fn missing_delegate_is_a_delegation_error() {
    let mut builder = RegistryBuilder::new();
    let language = LanguageExecutor::new(builder.lookup_handle()).expect("language executor");
    builder
        .insert(EngineType::Language, Arc::new(language))
        .expect("insert should succeed");
    let registry = builder.seal();

    let error = registry
        .lookup(EngineType::Language)
        .expect("language executor registered")
        .run(&python_job("py-orphan"), ShardIndex(0))
        .await
        .expect_err("missing python-wasm delegate should fail");

    assert_eq!(error.kind, CoreErrorKind::Delegation);
    assert_eq!(error.engine, Some(EngineType::Language));
    assert_eq!(error.job.as_deref(), Some("py-orphan"));
}

#[tokio::test]
async fn executor_outliving_its_registry_reports_delegation() {
    let cleanup = CleanupManager::new();
    let registry = standard_executors(
        &cleanup,
        &test_config("std-dropped"),
        Arc::new(ScriptedProcessExecutor::healthy()),
    )
    .await
    .expect("standard build should succeed");

    let python_wasm = registry
        .lookup(EngineType::PythonWasm)
        .expect("python-wasm executor registered");
    drop(registry);

    let mut job = python_job("py-late");
    job.spec.engine = EngineType::PythonWasm;
    let error = python_wasm
        .run(&job, ShardIndex(0))
        .await
        .expect_err("delegate lookup should fail once the registry is gone");

    assert_eq!(error.kind, CoreErrorKind::Delegation);
}

#[tokio::test]
async fn language_executor_rejects_unsupported_requests() {
    let cleanup = CleanupManager::new();
    let registry = standard_executors(
        &cleanup,
        &test_config("std-lang"),
        Arc::new(ScriptedProcessExecutor::healthy()),
    )
    .await
    .expect("standard build should succeed");
    let language = registry
        .lookup(EngineType::Language)
        .expect("language executor registered");

    let mut nondeterministic = python_job("py-random");
    nondeterministic.spec.language.deterministic = false;
    let error = language
        .run(&nondeterministic, ShardIndex(0))
        .await
        .expect_err("non-deterministic jobs are rejected");
    assert_eq!(error.kind, CoreErrorKind::InvalidInput);

    let mut old_python = python_job("py-old");
    old_python.spec.language.language_version = "2.7".to_string();
    let error = language
        .run(&old_python, ShardIndex(0))
        .await
        .expect_err("unsupported versions are rejected");
    assert_eq!(error.kind, CoreErrorKind::UnsupportedEngine);
    assert!(error.message.contains("2.7"));
}

#[tokio::test]
async fn meta_executors_report_installed_when_docker_is() {
    let cleanup = CleanupManager::new();
    let registry = standard_executors(
        &cleanup,
        &test_config("std-installed"),
        Arc::new(ScriptedProcessExecutor::healthy()),
    )
    .await
    .expect("standard build should succeed");

    for engine in registry.engines() {
        let executor = registry.lookup(engine).expect("registered executor");
        assert!(
            executor.is_installed().await.expect("probe should succeed"),
            "{engine} should report installed"
        );
    }
}

#[tokio::test]
async fn cleanup_sweep_removes_labelled_containers_before_the_cache() {
    let cleanup = CleanupManager::new();
    let process = ScriptedProcessExecutor::healthy().respond("docker", "ps", 0, "abc123\ndef456\n", "");
    let _registry = standard_executors(&cleanup, &test_config("std-sweep"), Arc::new(process.clone()))
        .await
        .expect("standard build should succeed");

    let report = cleanup.cleanup().await;

    assert!(report.is_clean());
    assert_eq!(report.ran, 2);
    let remove = process
        .requests()
        .into_iter()
        .find(|request| request.command.args.first().map(String::as_str) == Some("rm"))
        .expect("docker rm should be spawned");
    assert_eq!(remove.command.args, vec!["rm", "--force", "abc123", "def456"]);

    let list = process
        .requests()
        .into_iter()
        .find(|request| request.command.args.first().map(String::as_str) == Some("ps"))
        .expect("docker ps should be spawned");
    assert!(list.command.args.contains(&"label=shoal.executor=test-node".to_string()));
}
